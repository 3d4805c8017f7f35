use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use tracing::{debug, info, instrument, trace};

use super::{check_payload, PersistEngine};
use crate::error::{CacheError, Result};

// stale bytes that trigger a compaction of the log segments
const COMPACTION_THRESHOLD: u64 = 16 * 1024;

/// A [`PersistEngine`] that appends every write to a log of JSON records on disk.
///
/// The log is split into numbered segments (`1.log`, `2.log`, ...) inside the engine's
/// directory, and each open starts a new segment. An in-memory index maps every live key to
/// the span of its latest record. Overwritten and erased records are "stale"; once enough of
/// them pile up, the live records are rewritten into a fresh segment and the older segments
/// are removed.
#[derive(Debug)]
pub struct LogEngine {
    dir: PathBuf,

    // generation of the segment being appended to
    generation: u64,

    // open readers, by segment generation
    segments: RefCell<HashMap<u64, PosReader<File>>>,

    active: PosWriter<File>,

    // key -> span of its latest record
    index: BTreeMap<u32, Span>,

    stale_bytes: u64,
}

impl LogEngine {
    /// Opens the log in `dir`, creating the directory if needed, and replays every existing
    /// segment into the index.
    #[instrument]
    pub fn open(dir: &Path) -> Result<LogEngine> {
        fs::create_dir_all(dir)?;

        let generations = list_generations(dir)?;
        debug!(?generations, "found log segments");

        let mut segments = HashMap::new();
        let mut index = BTreeMap::new();
        let mut stale_bytes = 0;
        for &generation in &generations {
            let mut reader = PosReader::new(File::open(segment_path(dir, generation))?)?;
            stale_bytes += replay_segment(generation, &mut reader, &mut index)?;
            segments.insert(generation, reader);
        }

        let generation = generations.last().map_or(1, |last| last + 1);
        let active = open_segment(dir, generation, &mut segments)?;
        info!(generation, keys = index.len(), stale_bytes, "log engine opened");

        Ok(LogEngine {
            dir: dir.to_path_buf(),
            generation,
            segments: RefCell::new(segments),
            active,
            index,
            stale_bytes,
        })
    }

    /// Rewrites every live record into a new segment and deletes the older segments.
    pub fn compact(&mut self) -> Result<()> {
        // the compacted records go to generation + 1, new appends to generation + 2
        let compacted_gen = self.generation + 1;
        self.generation += 2;
        self.active = open_segment(&self.dir, self.generation, self.segments.get_mut())?;
        let mut out = open_segment(&self.dir, compacted_gen, self.segments.get_mut())?;

        let segments = self.segments.get_mut();
        for span in self.index.values_mut() {
            let reader = segments
                .get_mut(&span.generation)
                .ok_or_else(|| missing_segment(span.generation))?;
            if reader.pos != span.offset {
                reader.seek(SeekFrom::Start(span.offset))?;
            }
            let start = out.pos;
            io::copy(&mut reader.take(span.len), &mut out)?;
            *span = (compacted_gen, start..out.pos).into();
        }
        out.flush()?;

        let old: Vec<u64> = segments.keys().copied().filter(|&g| g < compacted_gen).collect();
        for generation in old {
            segments.remove(&generation);
            fs::remove_file(segment_path(&self.dir, generation))?;
        }
        debug!(compacted_gen, stale_bytes = self.stale_bytes, "log compacted");
        self.stale_bytes = 0;
        Ok(())
    }

    /// appends `record` to the active segment, returning where it landed
    fn append(&mut self, record: &Record) -> Result<Span> {
        let start = self.active.pos;
        serde_json::to_writer(&mut self.active, record)?;
        self.active.flush()?;
        Ok((self.generation, start..self.active.pos).into())
    }
}

impl PersistEngine for LogEngine {
    fn exists(&self, key: u32) -> Result<bool> {
        Ok(self.index.contains_key(&key))
    }

    fn read(&self, key: u32) -> Result<Option<Vec<u8>>> {
        let span = match self.index.get(&key) {
            Some(span) => *span,
            None => return Ok(None),
        };

        let mut segments = self.segments.borrow_mut();
        let reader = segments
            .get_mut(&span.generation)
            .ok_or_else(|| missing_segment(span.generation))?;
        reader.seek(SeekFrom::Start(span.offset))?;
        match serde_json::from_reader(reader.take(span.len))? {
            Record::Put { value, .. } => Ok(Some(value)),
            Record::Erase { .. } => Err(CacheError::Corrupt(format!(
                "index for key {} points at an erase record in segment {}",
                key, span.generation
            ))),
        }
    }

    fn write(&mut self, key: u32, data: &[u8]) -> Result<()> {
        check_payload(key, data)?;
        let span = self.append(&Record::Put {
            key,
            value: data.to_vec(),
        })?;
        trace!(key, len = data.len(), "appended put");

        if let Some(old) = self.index.insert(key, span) {
            self.stale_bytes += old.len;
        }
        if self.stale_bytes > COMPACTION_THRESHOLD {
            self.compact()?;
        }
        Ok(())
    }

    fn delete(&mut self, key: u32) -> Result<()> {
        let old = match self.index.remove(&key) {
            Some(old) => old,
            None => return Ok(()),
        };
        let span = self.append(&Record::Erase { key })?;
        trace!(key, "appended erase");
        // the erase record is itself stale as soon as it is written
        self.stale_bytes += old.len + span.len;
        Ok(())
    }
}

fn missing_segment(generation: u64) -> CacheError {
    CacheError::Corrupt(format!("log segment {} is not open", generation))
}

/// Replays one segment into `index`, returning the number of stale bytes it holds.
fn replay_segment(
    generation: u64,
    reader: &mut PosReader<File>,
    index: &mut BTreeMap<u32, Span>,
) -> Result<u64> {
    let mut offset = reader.seek(SeekFrom::Start(0))?;
    let mut stale = 0;
    let mut records = Deserializer::from_reader(reader).into_iter::<Record>();

    while let Some(record) = records.next() {
        let end = records.byte_offset() as u64;
        let span: Span = (generation, offset..end).into();
        match record? {
            Record::Put { key, .. } => {
                if let Some(old) = index.insert(key, span) {
                    stale += old.len;
                }
            }
            Record::Erase { key } => {
                stale += span.len + index.remove(&key).map_or(0, |old| old.len);
            }
        }
        offset = end;
    }
    Ok(stale)
}

fn segment_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}.log", generation))
}

/// Creates (or reopens) the segment `generation` for appending and registers a reader for it.
fn open_segment(
    dir: &Path,
    generation: u64,
    segments: &mut HashMap<u64, PosReader<File>>,
) -> Result<PosWriter<File>> {
    let path = segment_path(dir, generation);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let writer = PosWriter::new(file)?;
    segments.insert(generation, PosReader::new(File::open(&path)?)?);
    Ok(writer)
}

/// Generations of the `<n>.log` segments in `dir`, oldest first. Other files are ignored.
fn list_generations(dir: &Path) -> Result<Vec<u64>> {
    let mut generations = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "log") {
            continue;
        }
        if let Some(generation) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        {
            generations.push(generation);
        }
    }
    generations.sort_unstable();
    Ok(generations)
}

/// One entry of the log
#[derive(Debug, Serialize, Deserialize)]
enum Record {
    Put { key: u32, value: Vec<u8> },
    Erase { key: u32 },
}

/// Location of a record: segment generation, byte offset and length
#[derive(Debug, Clone, Copy)]
struct Span {
    generation: u64,
    offset: u64,
    len: u64,
}

impl From<(u64, Range<u64>)> for Span {
    fn from((generation, bytes): (u64, Range<u64>)) -> Self {
        Span {
            generation,
            offset: bytes.start,
            len: bytes.end - bytes.start,
        }
    }
}

/// buffered reader that tracks its position in the underlying file
#[derive(Debug)]
struct PosReader<R: Read + Seek> {
    inner: BufReader<R>,
    pos: u64,
}

impl<R: Read + Seek> PosReader<R> {
    fn new(mut file: R) -> Result<Self> {
        let pos = file.stream_position()?;
        Ok(PosReader {
            inner: BufReader::new(file),
            pos,
        })
    }
}

impl<R: Read + Seek> Read for PosReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for PosReader<R> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(target)?;
        Ok(self.pos)
    }
}

/// buffered appender that tracks the end of the underlying file
#[derive(Debug)]
struct PosWriter<W: Write + Seek> {
    inner: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> PosWriter<W> {
    fn new(mut file: W) -> Result<Self> {
        let pos = file.seek(SeekFrom::End(0))?;
        Ok(PosWriter {
            inner: BufWriter::new(file),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for PosWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
