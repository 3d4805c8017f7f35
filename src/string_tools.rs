//! Small string helpers shared by the records, the codec and the sync decoder.

use crate::error::{CacheError, Result};

/// Returns the longest prefix of `src` that fits in `max_len` bytes without splitting a
/// UTF-8 character.
pub fn truncated(src: &str, max_len: usize) -> &str {
    if src.len() <= max_len {
        return src;
    }
    let mut end = max_len;
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    &src[..end]
}

/// Copies `src` into a new owned string holding at most `max_len` bytes.
/// Excess input is silently dropped.
pub fn copy_smaller(src: &str, max_len: usize) -> String {
    truncated(src, max_len).to_owned()
}

/// true if `a` and `b` are equal once both are cut down to `len` bytes
pub fn starts_same(a: &str, b: &str, len: usize) -> bool {
    truncated(a, len) == truncated(b, len)
}

/// Splits `input` on `delimiter`, requiring exactly `expected` pieces.
///
/// An empty input with `expected == 1` yields a single empty piece, the same as a batch
/// holding one empty string would be sent.
///
/// # Errors
/// returns [`CacheError::Protocol`] when the piece count differs from `expected`
pub fn split_exact(input: &str, delimiter: char, expected: usize) -> Result<Vec<&str>> {
    if expected == 0 {
        return if input.is_empty() {
            Ok(Vec::new())
        } else {
            Err(CacheError::Protocol(format!(
                "expected no strings but got {:?}",
                input
            )))
        };
    }

    let pieces: Vec<&str> = input.split(delimiter).collect();
    if pieces.len() != expected {
        return Err(CacheError::Protocol(format!(
            "expected {} '{}' separated strings, found {}",
            expected,
            delimiter,
            pieces.len()
        )));
    }
    Ok(pieces)
}

/// Writes `src` into a fixed-width NUL padded field of `width` bytes. At most `width - 1`
/// bytes of text are kept so the field always ends in a terminator.
pub(crate) fn write_fixed(out: &mut Vec<u8>, src: &str, width: usize) {
    let text = truncated(src, width.saturating_sub(1));
    out.extend_from_slice(text.as_bytes());
    out.resize(out.len() + (width - text.len()), 0);
}

/// Reads a NUL terminated string out of a fixed-width field
pub(crate) fn read_fixed(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8(field[..end].to_vec())
        .map_err(|e| CacheError::Corrupt(format!("invalid utf-8 in stored string: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncated("hello", 3), "hel");
        assert_eq!(truncated("hi", 10), "hi");
        // 'é' is two bytes, cutting at 2 would split it
        assert_eq!(truncated("aé", 2), "a");
        assert_eq!(copy_smaller("she/her/hers", 7), "she/her");
    }

    #[test]
    fn prefix_comparison() {
        assert!(starts_same("they/them/theirs", "they/them/xx", 9));
        assert!(!starts_same("he/him", "she/her", 9));
        assert!(starts_same("", "", 4));
    }

    #[test]
    fn split_requires_exact_count() {
        assert_eq!(split_exact("A;B;C", ';', 3).unwrap(), vec!["A", "B", "C"]);
        assert_eq!(split_exact(";", ';', 2).unwrap(), vec!["", ""]);
        assert_eq!(split_exact("", ';', 1).unwrap(), vec![""]);
        assert!(split_exact("", ';', 0).unwrap().is_empty());
        assert!(split_exact("A;B", ';', 3).is_err());
        assert!(split_exact("A", ';', 0).is_err());
    }

    #[test]
    fn fixed_fields() {
        let mut buf = Vec::new();
        write_fixed(&mut buf, "abcdef", 4);
        assert_eq!(buf, b"abc\0");
        assert_eq!(read_fixed(&buf).unwrap(), "abc");

        let mut buf = Vec::new();
        write_fixed(&mut buf, "", 3);
        assert_eq!(buf, vec![0, 0, 0]);
        assert_eq!(read_fixed(&buf).unwrap(), "");
    }
}
