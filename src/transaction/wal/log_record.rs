use std::io;
use byteorder::{ByteOrder, NativeEndian};
use thiserror::Error;

use crate::common::types::{PageId, TxnId};
use crate::storage::file::BlockFile;

/// Error type for log record encoding and scanning
#[derive(Error, Debug)]
pub enum LogCodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown record tag {tag:#04x} at offset {offset}")]
    UnknownRecordTag { offset: u64, tag: u8 },
}

pub type Result<T> = std::result::Result<T, LogCodecError>;

const TAG_SIZE: u64 = 1;
const FIELD_SIZE: u64 = 8;
const UPDATE_FIELDS: u64 = 4;

/// Record tags as they appear on disk. Tag 0 doubles as the end-of-log
/// sentinel: appends write the tag byte last, so a torn record tail reads
/// as `Invalid` and stops any scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogRecordType {
    Invalid = 0,
    Abort = 1,
    Commit = 2,
    Update = 3,
    Begin = 4,
    Checkpoint = 5,
    BeginFuzzyCheckpoint = 6,
    EndFuzzyCheckpoint = 7,
}

impl LogRecordType {
    pub const COUNT: usize = 8;

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Invalid),
            1 => Some(Self::Abort),
            2 => Some(Self::Commit),
            3 => Some(Self::Update),
            4 => Some(Self::Begin),
            5 => Some(Self::Checkpoint),
            6 => Some(Self::BeginFuzzyCheckpoint),
            7 => Some(Self::EndFuzzyCheckpoint),
            _ => None,
        }
    }

    pub fn as_tag(self) -> u8 {
        self as u8
    }
}

/// A page mutation with both images; the images always have equal length
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub txn_id: TxnId,
    pub page_id: PageId,
    pub offset: u64,
    pub before_img: Vec<u8>,
    pub after_img: Vec<u8>,
}

/// A fully decoded log record
#[derive(Debug, Clone)]
pub enum LogRecord {
    Begin { txn_id: TxnId },
    Commit { txn_id: TxnId },
    Abort { txn_id: TxnId },
    Update(UpdateRecord),
    Checkpoint,
    BeginFuzzyCheckpoint,
    EndFuzzyCheckpoint,
}

fn push_u64(buf: &mut Vec<u8>, value: u64) {
    let mut bytes = [0u8; FIELD_SIZE as usize];
    NativeEndian::write_u64(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

impl LogRecord {
    pub fn kind(&self) -> LogRecordType {
        match self {
            Self::Begin { .. } => LogRecordType::Begin,
            Self::Commit { .. } => LogRecordType::Commit,
            Self::Abort { .. } => LogRecordType::Abort,
            Self::Update(_) => LogRecordType::Update,
            Self::Checkpoint => LogRecordType::Checkpoint,
            Self::BeginFuzzyCheckpoint => LogRecordType::BeginFuzzyCheckpoint,
            Self::EndFuzzyCheckpoint => LogRecordType::EndFuzzyCheckpoint,
        }
    }

    /// Exact number of bytes this record occupies on disk
    pub fn encoded_len(&self) -> u64 {
        TAG_SIZE
            + match self {
                Self::Begin { .. } | Self::Commit { .. } | Self::Abort { .. } => FIELD_SIZE,
                Self::Update(update) => {
                    UPDATE_FIELDS * FIELD_SIZE + 2 * update.before_img.len() as u64
                }
                _ => 0,
            }
    }

    /// Extend the file and write the record at `offset`. The payload goes
    /// first and the tag byte last, so a crash mid-append leaves a zero tag
    /// where the record would have started. Returns the encoded length.
    pub fn append_at(&self, file: &dyn BlockFile, offset: u64) -> Result<u64> {
        let len = self.encoded_len();
        file.resize(offset + len)?;

        let mut payload = Vec::with_capacity((len - TAG_SIZE) as usize);
        match self {
            Self::Begin { txn_id } | Self::Commit { txn_id } | Self::Abort { txn_id } => {
                push_u64(&mut payload, *txn_id);
            }
            Self::Update(update) => {
                push_u64(&mut payload, update.txn_id);
                push_u64(&mut payload, update.page_id);
                push_u64(&mut payload, update.before_img.len() as u64);
                push_u64(&mut payload, update.offset);
                payload.extend_from_slice(&update.before_img);
                payload.extend_from_slice(&update.after_img);
            }
            _ => {}
        }
        if !payload.is_empty() {
            file.write_block(&payload, offset + TAG_SIZE)?;
        }
        file.write_block(&[self.kind().as_tag()], offset)?;
        Ok(len)
    }
}

/// Fixed fields of an UPDATE record; the images stay on disk until
/// [`LogReader::read_update`] fetches them.
#[derive(Debug, Clone)]
pub struct UpdateHeader {
    pub txn_id: TxnId,
    pub page_id: PageId,
    pub length: u64,
    pub offset: u64,
    images_at: u64,
}

/// A scanned record with update images left unread
#[derive(Debug)]
pub enum LogEntry {
    Begin { txn_id: TxnId },
    Commit { txn_id: TxnId },
    Abort { txn_id: TxnId },
    Update(UpdateHeader),
    Checkpoint,
    BeginFuzzyCheckpoint,
    EndFuzzyCheckpoint,
}

impl LogEntry {
    pub fn kind(&self) -> LogRecordType {
        match self {
            Self::Begin { .. } => LogRecordType::Begin,
            Self::Commit { .. } => LogRecordType::Commit,
            Self::Abort { .. } => LogRecordType::Abort,
            Self::Update(_) => LogRecordType::Update,
            Self::Checkpoint => LogRecordType::Checkpoint,
            Self::BeginFuzzyCheckpoint => LogRecordType::BeginFuzzyCheckpoint,
            Self::EndFuzzyCheckpoint => LogRecordType::EndFuzzyCheckpoint,
        }
    }
}

/// Forward scanner over the record stream in `[0, end)`
pub struct LogReader<'a> {
    file: &'a dyn BlockFile,
    pos: u64,
    end: u64,
}

impl<'a> LogReader<'a> {
    pub fn new(file: &'a dyn BlockFile, end: u64) -> Self {
        Self { file, pos: 0, end }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    fn read_u64(&self, at: u64) -> Result<u64> {
        let mut bytes = [0u8; FIELD_SIZE as usize];
        self.file.read_block(at, &mut bytes)?;
        Ok(NativeEndian::read_u64(&bytes))
    }

    /// Step to the next record. `None` at end of range or on an `Invalid`
    /// tag; any other unrecognized tag is a hard error.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        if self.pos >= self.end {
            return Ok(None);
        }

        let mut tag = [0u8; 1];
        self.file.read_block(self.pos, &mut tag)?;
        let kind = LogRecordType::from_tag(tag[0]).ok_or(LogCodecError::UnknownRecordTag {
            offset: self.pos,
            tag: tag[0],
        })?;

        let entry = match kind {
            LogRecordType::Invalid => return Ok(None),
            LogRecordType::Begin => {
                let txn_id = self.read_u64(self.pos + TAG_SIZE)?;
                self.pos += TAG_SIZE + FIELD_SIZE;
                LogEntry::Begin { txn_id }
            }
            LogRecordType::Commit => {
                let txn_id = self.read_u64(self.pos + TAG_SIZE)?;
                self.pos += TAG_SIZE + FIELD_SIZE;
                LogEntry::Commit { txn_id }
            }
            LogRecordType::Abort => {
                let txn_id = self.read_u64(self.pos + TAG_SIZE)?;
                self.pos += TAG_SIZE + FIELD_SIZE;
                LogEntry::Abort { txn_id }
            }
            LogRecordType::Update => {
                let base = self.pos + TAG_SIZE;
                let txn_id = self.read_u64(base)?;
                let page_id = self.read_u64(base + FIELD_SIZE)?;
                let length = self.read_u64(base + 2 * FIELD_SIZE)?;
                let offset = self.read_u64(base + 3 * FIELD_SIZE)?;
                let images_at = base + UPDATE_FIELDS * FIELD_SIZE;
                self.pos = images_at + 2 * length;
                LogEntry::Update(UpdateHeader {
                    txn_id,
                    page_id,
                    length,
                    offset,
                    images_at,
                })
            }
            LogRecordType::Checkpoint => {
                self.pos += TAG_SIZE;
                LogEntry::Checkpoint
            }
            LogRecordType::BeginFuzzyCheckpoint => {
                self.pos += TAG_SIZE;
                LogEntry::BeginFuzzyCheckpoint
            }
            LogRecordType::EndFuzzyCheckpoint => {
                self.pos += TAG_SIZE;
                LogEntry::EndFuzzyCheckpoint
            }
        };
        Ok(Some(entry))
    }

    /// Fetch both images of a previously scanned update
    pub fn read_update(&self, header: &UpdateHeader) -> Result<UpdateRecord> {
        let mut before_img = vec![0u8; header.length as usize];
        let mut after_img = vec![0u8; header.length as usize];
        self.file.read_block(header.images_at, &mut before_img)?;
        self.file
            .read_block(header.images_at + header.length, &mut after_img)?;
        Ok(UpdateRecord {
            txn_id: header.txn_id,
            page_id: header.page_id,
            offset: header.offset,
            before_img,
            after_img,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::MemoryFile;

    fn append_all(file: &MemoryFile, records: &[LogRecord]) -> u64 {
        let mut offset = 0;
        for record in records {
            offset += record.append_at(file, offset).unwrap();
        }
        offset
    }

    #[test]
    fn roundtrip_all_record_kinds() {
        let file = MemoryFile::new();
        let end = append_all(
            &file,
            &[
                LogRecord::Begin { txn_id: 1 },
                LogRecord::Update(UpdateRecord {
                    txn_id: 1,
                    page_id: 42,
                    offset: 12,
                    before_img: vec![0; 16],
                    after_img: vec![7; 16],
                }),
                LogRecord::Checkpoint,
                LogRecord::BeginFuzzyCheckpoint,
                LogRecord::EndFuzzyCheckpoint,
                LogRecord::Commit { txn_id: 1 },
                LogRecord::Abort { txn_id: 2 },
            ],
        );
        assert_eq!(file.size(), end);

        let mut reader = LogReader::new(&file, end);
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::Begin { txn_id: 1 })
        ));

        let header = match reader.next_entry().unwrap() {
            Some(LogEntry::Update(header)) => header,
            other => panic!("expected update, got {:?}", other),
        };
        assert_eq!(header.txn_id, 1);
        assert_eq!(header.page_id, 42);
        assert_eq!(header.length, 16);
        assert_eq!(header.offset, 12);
        let update = reader.read_update(&header).unwrap();
        assert_eq!(update.before_img, vec![0; 16]);
        assert_eq!(update.after_img, vec![7; 16]);

        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::Checkpoint)
        ));
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::BeginFuzzyCheckpoint)
        ));
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::EndFuzzyCheckpoint)
        ));
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::Commit { txn_id: 1 })
        ));
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::Abort { txn_id: 2 })
        ));
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn zero_tag_terminates_scan() {
        let file = MemoryFile::new();
        let end = append_all(&file, &[LogRecord::Begin { txn_id: 1 }]);
        // space reserved for a record whose tag never made it to disk
        file.resize(end + 64).unwrap();

        let mut reader = LogReader::new(&file, file.size());
        assert!(matches!(
            reader.next_entry().unwrap(),
            Some(LogEntry::Begin { .. })
        ));
        assert!(reader.next_entry().unwrap().is_none());
        assert_eq!(reader.position(), end);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let file = MemoryFile::new();
        file.write_block(&[0x2A], 0).unwrap();
        let mut reader = LogReader::new(&file, file.size());
        assert!(matches!(
            reader.next_entry(),
            Err(LogCodecError::UnknownRecordTag { offset: 0, tag: 0x2A })
        ));
    }

    #[test]
    fn encoded_len_matches_bytes_written() {
        let record = LogRecord::Update(UpdateRecord {
            txn_id: 9,
            page_id: 1,
            offset: 0,
            before_img: vec![1, 2, 3],
            after_img: vec![4, 5, 6],
        });
        assert_eq!(record.encoded_len(), 1 + 32 + 6);

        let file = MemoryFile::new();
        let written = record.append_at(&file, 0).unwrap();
        assert_eq!(written, record.encoded_len());
        assert_eq!(file.size(), written);
    }
}
