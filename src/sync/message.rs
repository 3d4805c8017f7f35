use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::frontable::Frontable;
use crate::group::{Group, GroupId};
use crate::palette::PaletteColor;
use crate::string_tools::split_exact;

/// separator used by the phone for string columns
pub const DELIMITER: char = ';';
/// frontables sent per batch by the phone
pub const FRONTABLES_PER_MESSAGE: usize = 32;
/// current fronter hashes sent per batch by the phone
pub const CURRENT_FRONTS_PER_MESSAGE: usize = 16;
/// groups sent per batch by the phone
pub const GROUPS_PER_MESSAGE: usize = 16;

/// One inbound message from the phone: a dictionary of optional tuples.
///
/// A message carrying `NumTotal*` starts a transfer, one carrying `Num*InBatch` delivers a
/// batch of column encoded records. Fixed-width columns hold one value per record (hashes
/// as 4 big-endian bytes), string columns are joined with [`DELIMITER`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundMessage {
    /// begin a frontable transfer of this many records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_total_frontables: Option<u32>,
    /// number of frontables in this batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_frontables_in_batch: Option<u8>,
    /// big-endian hashes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontable_hash: Option<Vec<u8>>,
    /// delimiter joined names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontable_name: Option<String>,
    /// delimiter joined pronouns, empty for custom fronts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontable_pronouns: Option<String>,
    /// 1 for custom fronts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontable_is_custom: Option<Vec<u8>>,
    /// ARGB8 colors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontable_color: Option<Vec<u8>>,

    /// begin a group transfer of this many records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_total_groups: Option<u32>,
    /// number of groups in this batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_groups_in_batch: Option<u8>,
    /// delimiter joined group names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// ARGB8 colors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_color: Option<Vec<u8>>,
    /// 0 = no parent, N = group N-1 of the same batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_parent_index: Option<Vec<u8>>,
    /// per group: a member count byte followed by that many big-endian hashes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_members: Option<Vec<u8>>,

    /// begin a current fronter transfer of this many hashes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_current_fronters: Option<u32>,
    /// number of hashes in this batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_current_fronters_in_batch: Option<u8>,
    /// big-endian hashes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_fronter: Option<Vec<u8>>,
}

impl InboundMessage {
    /// Builds a frontable batch message, the way the phone encodes one.
    /// Records are `(hash, name, pronouns, is_custom, argb)`.
    pub fn frontable_batch(total: Option<u32>, records: &[(u32, &str, &str, bool, u8)]) -> Self {
        InboundMessage {
            num_total_frontables: total,
            num_frontables_in_batch: Some(records.len() as u8),
            frontable_hash: Some(encode_hashes(records.iter().map(|r| r.0))),
            frontable_name: Some(join(records.iter().map(|r| r.1))),
            frontable_pronouns: Some(join(records.iter().map(|r| r.2))),
            frontable_is_custom: Some(records.iter().map(|r| r.3 as u8).collect()),
            frontable_color: Some(records.iter().map(|r| r.4).collect()),
            ..Default::default()
        }
    }

    /// Builds a group batch message. Records are `(name, argb, parent_index, member_hashes)`
    /// with the parent index one-based within this batch.
    pub fn group_batch(total: Option<u32>, records: &[(&str, u8, u8, &[u32])]) -> Self {
        let mut members = Vec::new();
        for (_, _, _, hashes) in records {
            members.push(hashes.len() as u8);
            members.extend(encode_hashes(hashes.iter().copied()));
        }
        InboundMessage {
            num_total_groups: total,
            num_groups_in_batch: Some(records.len() as u8),
            group_name: Some(join(records.iter().map(|r| r.0))),
            group_color: Some(records.iter().map(|r| r.1).collect()),
            group_parent_index: Some(records.iter().map(|r| r.2).collect()),
            group_members: Some(members),
            ..Default::default()
        }
    }

    /// builds a current fronter batch message
    pub fn fronter_batch(total: Option<u32>, hashes: &[u32]) -> Self {
        InboundMessage {
            num_current_fronters: total,
            num_current_fronters_in_batch: Some(hashes.len() as u8),
            current_fronter: Some(encode_hashes(hashes.iter().copied())),
            ..Default::default()
        }
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let separator = DELIMITER.to_string();
    parts
        .map(|p| p.replace(DELIMITER, "_"))
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

fn encode_hashes(hashes: impl Iterator<Item = u32>) -> Vec<u8> {
    hashes.flat_map(u32::to_be_bytes).collect()
}

fn required<'a, T>(column: &'a Option<T>, name: &str) -> Result<&'a T> {
    column
        .as_ref()
        .ok_or_else(|| CacheError::Protocol(format!("batch is missing the {} column", name)))
}

fn check_len(column: &[u8], name: &str, expected: usize) -> Result<()> {
    if column.len() != expected {
        return Err(CacheError::Protocol(format!(
            "{} column holds {} bytes, expected {}",
            name,
            column.len(),
            expected
        )));
    }
    Ok(())
}

/// Splits a column of big-endian 4 byte hashes, requiring exactly `count` of them
pub fn decode_hashes(column: &[u8], name: &str, count: usize) -> Result<Vec<u32>> {
    check_len(column, name, count * 4)?;
    Ok(column
        .chunks_exact(4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Decodes the frontable columns of a batch of `count` records. Every column is checked
/// against `count` before any record is built.
pub fn decode_frontables(msg: &InboundMessage, count: usize) -> Result<Vec<Frontable>> {
    let hashes = decode_hashes(required(&msg.frontable_hash, "FrontableHash")?, "FrontableHash", count)?;
    let names = split_exact(required(&msg.frontable_name, "FrontableName")?, DELIMITER, count)?;
    let pronouns = match &msg.frontable_pronouns {
        Some(column) => split_exact(column, DELIMITER, count)?,
        None => vec![""; count],
    };
    let is_custom = required(&msg.frontable_is_custom, "FrontableIsCustom")?;
    check_len(is_custom, "FrontableIsCustom", count)?;
    let colors = required(&msg.frontable_color, "FrontableColor")?;
    check_len(colors, "FrontableColor", count)?;

    Ok((0..count)
        .map(|i| {
            let pronouns = Some(pronouns[i]).filter(|p| !p.is_empty());
            Frontable::create(
                hashes[i],
                names[i],
                pronouns,
                is_custom[i] != 0,
                PaletteColor::from_argb(colors[i]),
            )
        })
        .collect())
}

/// Decodes the group columns of a batch of `count` records.
///
/// Parent indices are one-based within the batch; `batch_start` (the number of groups
/// received before this batch) turns them into collection positions.
pub fn decode_groups(msg: &InboundMessage, count: usize, batch_start: usize) -> Result<Vec<Group>> {
    let names = split_exact(required(&msg.group_name, "GroupName")?, DELIMITER, count)?;
    let colors = required(&msg.group_color, "GroupColor")?;
    check_len(colors, "GroupColor", count)?;
    let parents = match &msg.group_parent_index {
        Some(column) => {
            check_len(column, "GroupParentIndex", count)?;
            column.clone()
        }
        None => vec![0; count],
    };
    let members = match &msg.group_members {
        Some(column) => decode_group_members(column, count)?,
        None => vec![Vec::new(); count],
    };

    let mut groups = Vec::with_capacity(count);
    for i in 0..count {
        let parent = match parents[i] as usize {
            0 => None,
            p if p - 1 < count && p - 1 != i => Some(GroupId(batch_start + p - 1)),
            p => {
                return Err(CacheError::Protocol(format!(
                    "group {} has invalid parent index {}",
                    i, p
                )))
            }
        };
        let mut group = Group::create(names[i], PaletteColor::from_argb(colors[i]), parent);
        for hash in &members[i] {
            group.add_member(*hash)?;
        }
        groups.push(group);
    }
    Ok(groups)
}

/// Splits the `GroupMembers` column into one hash list per group. The phone stops adding
/// member lists once the column would pass 256 bytes, so missing trailing lists are empty.
fn decode_group_members(column: &[u8], count: usize) -> Result<Vec<Vec<u32>>> {
    let mut out = Vec::with_capacity(count);
    let mut rest = column;
    for _ in 0..count {
        let (&n, tail) = match rest.split_first() {
            Some(split) => split,
            None => {
                out.push(Vec::new());
                continue;
            }
        };
        let len = n as usize * 4;
        if tail.len() < len {
            return Err(CacheError::Protocol(format!(
                "GroupMembers declares {} hashes but only {} bytes remain",
                n,
                tail.len()
            )));
        }
        out.push(decode_hashes(&tail[..len], "GroupMembers", n as usize)?);
        rest = &tail[len..];
    }
    if !rest.is_empty() {
        return Err(CacheError::Protocol(format!(
            "{} trailing bytes in GroupMembers",
            rest.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keys_match_the_phone() {
        let msg: InboundMessage = serde_json::from_str(
            r#"{"NumTotalFrontables":2,"NumFrontablesInBatch":1,"FrontableHash":[0,0,0,9],
                "FrontableName":"Sam","FrontablePronouns":"","FrontableIsCustom":[1],"FrontableColor":[255]}"#,
        )
        .unwrap();
        assert_eq!(msg.num_total_frontables, Some(2));
        assert_eq!(msg.frontable_hash, Some(vec![0, 0, 0, 9]));
        assert_eq!(msg.num_total_groups, None);

        let json = serde_json::to_string(&InboundMessage::fronter_batch(Some(1), &[7])).unwrap();
        assert_eq!(
            json,
            r#"{"NumCurrentFronters":1,"NumCurrentFrontersInBatch":1,"CurrentFronter":[0,0,0,7]}"#
        );
    }

    #[test]
    fn group_members_column() {
        let column = [1, 0, 0, 0, 5, 2, 0, 0, 0, 6, 0, 0, 0, 7];
        assert_eq!(
            decode_group_members(&column, 3).unwrap(),
            vec![vec![5], vec![6, 7], vec![]]
        );
        assert!(decode_group_members(&[3, 0, 0], 1).is_err());
        assert!(decode_group_members(&[0, 9], 1).is_err());
    }

    #[test]
    fn delimiters_in_values_are_replaced() {
        let msg = InboundMessage::frontable_batch(None, &[(1, "a;b", "", false, 0xC0)]);
        assert_eq!(msg.frontable_name.as_deref(), Some("a_b"));
    }
}
