use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::common::types::{PageId, TxnId};
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::storage::file::BlockFile;
use crate::transaction::wal::log_record::{
    LogCodecError, LogEntry, LogReader, LogRecord, LogRecordType, UpdateRecord,
};

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] LogCodecError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("before image is {before} bytes but after image is {after}")]
    ImageLengthMismatch { before: usize, after: usize },
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, WalError>;

/// Per-kind record tally; every append bumps exactly one entry
#[derive(Debug, Default)]
pub(super) struct RecordCounters([u64; LogRecordType::COUNT]);

impl RecordCounters {
    pub(super) fn bump(&mut self, kind: LogRecordType) {
        self.0[kind.as_tag() as usize] += 1;
    }

    pub(super) fn of(&self, kind: LogRecordType) -> u64 {
        self.0[kind.as_tag() as usize]
    }

    pub(super) fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub(super) fn reset(&mut self) {
        self.0 = [0; LogRecordType::COUNT];
    }
}

/// Append-only manager of the write-ahead log.
///
/// The log file is the authoritative record of every page mutation: an
/// UPDATE record must be appended before the page itself changes, dirty
/// pages may reach disk at any time (STEAL), and commits force nothing
/// (NO-FORCE). Rollback and crash recovery reconstruct consistent page
/// state from the record stream alone.
pub struct LogManager {
    pub(super) log_file: Arc<dyn BlockFile>,
    pub(super) current_offset: u64,
    pub(super) counters: RecordCounters,
    /// Active transaction -> total record count at the time of its BEGIN.
    /// Entries leave on COMMIT or ABORT; a BTreeMap keeps undo iteration
    /// in transaction-id order.
    pub(super) active_txns: BTreeMap<TxnId, u64>,
    /// Dirty-page snapshot taken at BEGIN_FUZZY_CHECKPOINT, consumed one
    /// step at a time
    fuzzy_pending: Vec<PageId>,
}

impl LogManager {
    /// Bind to a log file, positioned at its current end
    pub fn new(log_file: Arc<dyn BlockFile>) -> Self {
        let current_offset = log_file.size();
        Self {
            log_file,
            current_offset,
            counters: RecordCounters::default(),
            active_txns: BTreeMap::new(),
            fuzzy_pending: Vec::new(),
        }
    }

    /// Swap in a fresh file handle and drop all in-memory state, as after
    /// a restart. Counters and the active-transaction index are rebuilt by
    /// [`recover`](Self::recover).
    pub fn reset(&mut self, log_file: Arc<dyn BlockFile>) {
        self.current_offset = log_file.size();
        self.log_file = log_file;
        self.counters.reset();
        self.active_txns.clear();
        self.fuzzy_pending.clear();
    }

    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let written = record.append_at(self.log_file.as_ref(), self.current_offset)?;
        self.current_offset += written;
        self.counters.bump(record.kind());
        Ok(())
    }

    /// Append a BEGIN record and mark the transaction active
    pub fn log_begin(&mut self, txn_id: TxnId) -> Result<()> {
        let ordinal = self.counters.total();
        self.append(&LogRecord::Begin { txn_id })?;
        self.active_txns.insert(txn_id, ordinal);
        Ok(())
    }

    /// Append a COMMIT record. No pages are forced out.
    pub fn log_commit(&mut self, txn_id: TxnId) -> Result<()> {
        self.append(&LogRecord::Commit { txn_id })?;
        self.active_txns.remove(&txn_id);
        Ok(())
    }

    /// Append an ABORT record, then undo the transaction's updates. The
    /// record goes first so the rollback is bounded by it if we crash
    /// while undoing.
    pub fn log_abort(&mut self, txn_id: TxnId, buffer: &BufferManager) -> Result<()> {
        self.append(&LogRecord::Abort { txn_id })?;
        self.rollback_txn(txn_id, buffer)?;
        self.active_txns.remove(&txn_id);
        Ok(())
    }

    /// Append an UPDATE record carrying both images of the mutated range.
    /// Callers append before touching the page (write-ahead rule).
    pub fn log_update(
        &mut self,
        txn_id: TxnId,
        page_id: PageId,
        offset: u64,
        before_img: &[u8],
        after_img: &[u8],
    ) -> Result<()> {
        if before_img.len() != after_img.len() {
            return Err(WalError::ImageLengthMismatch {
                before: before_img.len(),
                after: after_img.len(),
            });
        }
        self.append(&LogRecord::Update(UpdateRecord {
            txn_id,
            page_id,
            offset,
            before_img: before_img.to_vec(),
            after_img: after_img.to_vec(),
        }))
    }

    /// Quiescent checkpoint: every dirty page is durable before the
    /// CHECKPOINT record is appended, so no earlier update needs redo.
    pub fn checkpoint(&mut self, buffer: &BufferManager) -> Result<()> {
        buffer.flush_all_pages()?;
        self.append(&LogRecord::Checkpoint)
    }

    /// Snapshot the dirty-page set and append BEGIN_FUZZY_CHECKPOINT.
    /// Returns the number of pages to be flushed; the log keeps accepting
    /// records while the caller drives the flushing step by step.
    pub fn begin_fuzzy_checkpoint(&mut self, buffer: &BufferManager) -> Result<usize> {
        self.fuzzy_pending = buffer.get_dirty_page_ids();
        self.append(&LogRecord::BeginFuzzyCheckpoint)?;
        Ok(self.fuzzy_pending.len())
    }

    /// Flush the `step`-th page of the snapshot; out-of-range steps are a
    /// no-op. Steps write no log record.
    pub fn fuzzy_checkpoint_step(&mut self, buffer: &BufferManager, step: usize) -> Result<()> {
        if let Some(&page_id) = self.fuzzy_pending.get(step) {
            buffer.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Append END_FUZZY_CHECKPOINT and drop the snapshot
    pub fn end_fuzzy_checkpoint(&mut self) -> Result<()> {
        self.append(&LogRecord::EndFuzzyCheckpoint)?;
        self.fuzzy_pending.clear();
        Ok(())
    }

    /// Undo every update of `txn_id` logged before its ABORT record (or
    /// before end of log if it has none). Already-finished transactions
    /// are a no-op. Other transactions' records are skipped without
    /// reading their images; the collected before-images are applied in
    /// reverse so overlapping writes restore the earliest pre-state.
    pub fn rollback_txn(&self, txn_id: TxnId, buffer: &BufferManager) -> Result<()> {
        if !self.active_txns.contains_key(&txn_id) {
            return Ok(());
        }

        let file = Arc::clone(&self.log_file);
        let mut reader = LogReader::new(file.as_ref(), self.current_offset);
        let mut undo: Vec<UpdateRecord> = Vec::new();

        while let Some(entry) = reader.next_entry()? {
            match entry {
                LogEntry::Abort { txn_id: t } if t == txn_id => break,
                LogEntry::Update(header) if header.txn_id == txn_id => {
                    undo.push(reader.read_update(&header)?);
                }
                _ => {}
            }
        }

        for update in undo.iter().rev() {
            apply_image(buffer, update.page_id, update.offset, &update.before_img)?;
        }
        Ok(())
    }

    /// Total number of records appended (or replayed by recovery)
    pub fn total_records(&self) -> u64 {
        self.counters.total()
    }

    /// Number of records of one kind
    pub fn records_of_type(&self, kind: LogRecordType) -> u64 {
        self.counters.of(kind)
    }

    /// Byte offset of the next append; equals the log file size
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Whether the transaction has begun and neither committed nor aborted
    pub fn is_active(&self, txn_id: TxnId) -> bool {
        self.active_txns.contains_key(&txn_id)
    }
}

/// Write `image` into the page range starting at `offset`
pub(super) fn apply_image(
    buffer: &BufferManager,
    page_id: PageId,
    offset: u64,
    image: &[u8],
) -> Result<()> {
    let page = buffer.fix_page(page_id)?;
    {
        let mut guard = page.write();
        let start = offset as usize;
        guard.data[start..start + image.len()].copy_from_slice(image);
    }
    buffer.unfix_page(page_id, true)?;
    Ok(())
}
