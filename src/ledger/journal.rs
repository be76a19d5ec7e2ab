//! Append-only slot journal
//!
//! Every committed change is written here before it is applied in memory, so
//! the holder sets can be rebuilt after a restart.
//!
//! Frame layout (big-endian):
//! ```text
//! +------------+-----------+------------+--------------------------------+
//! | body_len:4 | len_crc:4 | body_crc:4 | body                           |
//! +------------+-----------+------------+--------------------------------+
//! body: kind:1 | l_len:2 | lesson | r_len:2 | learner
//!
//! 0x01 - Acquire      (lesson, learner)
//! 0x02 - Release      (lesson, learner)
//! 0x03 - LessonEnded  (lesson, empty learner)
//! ```
//!
//! `len_crc` is the CRC32 of the four length bytes, `body_crc` the CRC32 of
//! the body. A frame cut short at the end of the file is a torn write and is
//! dropped on recovery. A checksum mismatch anywhere is corruption.
//!
//! Opening a journal compacts it: the file is rewritten to one acquire frame
//! per live slot whenever it holds anything else.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use super::key::{LearnerId, LessonId, MAX_ID_LEN};
use crate::error::{JournalError, Result};

const KIND_ACQUIRE: u8 = 0x01;
const KIND_RELEASE: u8 = 0x02;
const KIND_LESSON_ENDED: u8 = 0x03;

const HEADER_LEN: usize = 12;
const MAX_BODY_LEN: usize = 1 + 2 + MAX_ID_LEN + 2 + MAX_ID_LEN;

/// A journaled ledger change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    Acquire { lesson: LessonId, learner: LearnerId },
    Release { lesson: LessonId, learner: LearnerId },
    LessonEnded { lesson: LessonId },
}

impl JournalRecord {
    pub fn lesson(&self) -> &LessonId {
        match self {
            JournalRecord::Acquire { lesson, .. }
            | JournalRecord::Release { lesson, .. }
            | JournalRecord::LessonEnded { lesson } => lesson,
        }
    }
}

/// Durable sink for ledger changes
///
/// `append` is called while the lesson's lock is held and must either persist
/// the whole record or return an error.
pub trait Journal: Send + Sync + 'static {
    fn append(&self, record: &JournalRecord) -> io::Result<()>;

    /// Whether `append` blocks on disk I/O
    ///
    /// The ledger moves blocking appends off the async worker when the
    /// runtime allows it.
    fn blocks_on_io(&self) -> bool {
        false
    }
}

/// Journal that persists nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn append(&self, _record: &JournalRecord) -> io::Result<()> {
        Ok(())
    }
}

/// Encode a single record into one frame
pub fn encode(record: &JournalRecord) -> Bytes {
    let (kind, lesson, learner) = match record {
        JournalRecord::Acquire { lesson, learner } => (KIND_ACQUIRE, lesson.as_str(), learner.as_str()),
        JournalRecord::Release { lesson, learner } => (KIND_RELEASE, lesson.as_str(), learner.as_str()),
        JournalRecord::LessonEnded { lesson } => (KIND_LESSON_ENDED, lesson.as_str(), ""),
    };

    let mut body = BytesMut::with_capacity(5 + lesson.len() + learner.len());
    body.put_u8(kind);
    write_str(&mut body, lesson);
    write_str(&mut body, learner);
    seal(&body)
}

/// Prefix a body with its length and checksums
fn seal(body: &[u8]) -> Bytes {
    let len = (body.len() as u32).to_be_bytes();
    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_slice(&len);
    frame.put_u32(crc32fast::hash(&len));
    frame.put_u32(crc32fast::hash(body));
    frame.put_slice(body);
    frame.freeze()
}

/// Ids are capped at `u16::MAX` bytes when they are created
fn write_str(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

/// Records decoded from a journal image
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<JournalRecord>,
    /// Length of the prefix made of complete frames
    pub valid_len: usize,
}

/// Decode every complete frame in `data`
pub fn decode_all(data: &[u8]) -> std::result::Result<Decoded, JournalError> {
    let mut buf = Bytes::copy_from_slice(data);
    let mut decoded = Decoded::default();

    while buf.has_remaining() {
        let offset = data.len() - buf.remaining();
        match decode_frame(&mut buf, offset)? {
            Some(record) => {
                decoded.records.push(record);
                decoded.valid_len = data.len() - buf.remaining();
            }
            None => break,
        }
    }

    Ok(decoded)
}

/// Decode one frame; `Ok(None)` when the buffer ends mid-frame
fn decode_frame(buf: &mut Bytes, offset: usize) -> std::result::Result<Option<JournalRecord>, JournalError> {
    if buf.remaining() < HEADER_LEN {
        return Ok(None);
    }

    let len_bytes = [buf[0], buf[1], buf[2], buf[3]];
    buf.advance(4);
    if buf.get_u32() != crc32fast::hash(&len_bytes) {
        return Err(JournalError::HeaderChecksum(offset));
    }
    let body_len = u32::from_be_bytes(len_bytes) as usize;
    if body_len > MAX_BODY_LEN {
        return Err(JournalError::Malformed(offset));
    }

    let body_crc = buf.get_u32();
    if buf.remaining() < body_len {
        return Ok(None);
    }
    let mut body = buf.split_to(body_len);
    if crc32fast::hash(&body) != body_crc {
        return Err(JournalError::BodyChecksum(offset));
    }

    decode_body(&mut body, offset).map(Some)
}

fn decode_body(body: &mut Bytes, offset: usize) -> std::result::Result<JournalRecord, JournalError> {
    if !body.has_remaining() {
        return Err(JournalError::Malformed(offset));
    }
    let kind = body.get_u8();
    if !matches!(kind, KIND_ACQUIRE | KIND_RELEASE | KIND_LESSON_ENDED) {
        return Err(JournalError::UnknownKind(kind, offset));
    }

    let lesson = read_str(body, offset)?;
    let learner = read_str(body, offset)?;
    if body.has_remaining() {
        return Err(JournalError::Malformed(offset));
    }

    let lesson = LessonId::new(&lesson).map_err(|_| JournalError::EmptyId(offset))?;
    if kind == KIND_LESSON_ENDED {
        return Ok(JournalRecord::LessonEnded { lesson });
    }

    let learner = LearnerId::new(&learner).map_err(|_| JournalError::EmptyId(offset))?;
    Ok(if kind == KIND_ACQUIRE {
        JournalRecord::Acquire { lesson, learner }
    } else {
        JournalRecord::Release { lesson, learner }
    })
}

fn read_str(body: &mut Bytes, offset: usize) -> std::result::Result<String, JournalError> {
    if body.remaining() < 2 {
        return Err(JournalError::Malformed(offset));
    }
    let len = body.get_u16() as usize;
    if body.remaining() < len {
        return Err(JournalError::Malformed(offset));
    }
    let bytes = body.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| JournalError::InvalidUtf8(offset))
}

/// Replay records into the holder set of every lesson that still has one
///
/// Learners keep their admission order.
pub fn live_holders(
    records: impl IntoIterator<Item = JournalRecord>,
) -> BTreeMap<LessonId, Vec<LearnerId>> {
    let mut lessons: BTreeMap<LessonId, Vec<LearnerId>> = BTreeMap::new();

    for record in records {
        match record {
            JournalRecord::Acquire { lesson, learner } => {
                let holders = lessons.entry(lesson).or_default();
                if !holders.contains(&learner) {
                    holders.push(learner);
                }
            }
            JournalRecord::Release { lesson, learner } => {
                if let Some(holders) = lessons.get_mut(&lesson) {
                    holders.retain(|l| *l != learner);
                }
            }
            JournalRecord::LessonEnded { lesson } => {
                lessons.remove(&lesson);
            }
        }
    }

    lessons.retain(|_, holders| !holders.is_empty());
    lessons
}

/// The shortest record sequence that replays to the same holders
pub fn compact(records: impl IntoIterator<Item = JournalRecord>) -> Vec<JournalRecord> {
    live_holders(records)
        .into_iter()
        .flat_map(|(lesson, holders)| {
            holders.into_iter().map(move |learner| JournalRecord::Acquire {
                lesson: lesson.clone(),
                learner,
            })
        })
        .collect()
}

struct JournalFile {
    file: File,
    /// Length of the file covered by complete frames
    len: u64,
}

/// Journal backed by a local append-only file
pub struct FileJournal {
    path: PathBuf,
    inner: Mutex<JournalFile>,
    sync: bool,
}

impl FileJournal {
    /// Open (or create) a journal file and return the live records it holds
    ///
    /// Released slots, ended lessons and a torn trailing frame are compacted
    /// away before the journal accepts new appends.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<JournalRecord>)> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let decoded = decode_all(&data)?;
        let total = decoded.records.len();
        let live = compact(decoded.records);

        if decoded.valid_len < data.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = data.len() - decoded.valid_len,
                "Dropping torn journal tail"
            );
        }

        let (file, len) = if live.len() < total || decoded.valid_len < data.len() {
            drop(file);
            let rewritten = rewrite(&path, &live)?;
            tracing::info!(
                path = %path.display(),
                records = total,
                live = live.len(),
                "Journal compacted"
            );
            rewritten
        } else {
            file.seek(SeekFrom::Start(decoded.valid_len as u64))?;
            (file, decoded.valid_len as u64)
        };

        tracing::info!(
            path = %path.display(),
            records = live.len(),
            "Journal opened"
        );

        let journal = Self {
            path,
            inner: Mutex::new(JournalFile { file, len }),
            sync: true,
        };
        Ok((journal, live))
    }

    /// Whether each append waits for the data to reach the disk (default on)
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the journal file
    pub fn len(&self) -> u64 {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write `records` to a sibling file, fsync it and rename it over `path`
fn rewrite(path: &Path, records: &[JournalRecord]) -> io::Result<(File, u64)> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".compact");
    let staging = PathBuf::from(staging);

    let mut len = 0u64;
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)?;
        for record in records {
            let frame = encode(record);
            file.write_all(&frame)?;
            len += frame.len() as u64;
        }
        file.sync_all()?;
    }
    fs::rename(&staging, path)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(len))?;
    Ok((file, len))
}

impl Journal for FileJournal {
    fn append(&self, record: &JournalRecord) -> io::Result<()> {
        let frame = encode(record);
        let mut inner = self.inner.lock();

        let mut written = inner.file.write_all(&frame);
        if written.is_ok() && self.sync {
            written = inner.file.sync_data();
        }

        match written {
            Ok(()) => {
                inner.len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                // Cut any partial frame so the file stays decodable
                let len = inner.len;
                let rolled_back = inner.file.set_len(len);
                let rewound = inner.file.seek(SeekFrom::Start(len));
                if let Some(err) = rolled_back.err().or(rewound.err()) {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %err,
                        "Failed to roll back partial journal frame"
                    );
                }
                Err(e)
            }
        }
    }

    fn blocks_on_io(&self) -> bool {
        true
    }
}
