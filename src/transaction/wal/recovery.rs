use std::collections::BTreeSet;
use std::sync::Arc;
use log::{debug, info};

use crate::common::types::TxnId;
use crate::storage::buffer::BufferManager;
use crate::transaction::wal::log_manager::{apply_image, LogManager, Result};
use crate::transaction::wal::log_record::{LogEntry, LogReader, UpdateRecord};

impl LogManager {
    /// Rebuild in-memory log state and repair page state after a crash.
    ///
    /// One forward scan rebuilds the counters and the active-transaction
    /// index while capturing updates: `since_last_checkpoint` holds
    /// everything after the last durable boundary, and `pending` holds the
    /// window of a fuzzy checkpoint that never saw its END record. A
    /// CHECKPOINT record proves all earlier updates durable and drops both;
    /// END_FUZZY_CHECKPOINT drops only the window opened at its BEGIN.
    ///
    /// After-images are then re-applied, but only for transactions with an
    /// ABORT record on tape: their rollback ran before the crash and may
    /// have been lost, so their pages are rebuilt forward before being
    /// rolled back again. Committed transactions' pages are already durable
    /// and everything else gets undone anyway. Finally every aborted
    /// transaction is rolled back, then every transaction still open at the
    /// crash.
    pub fn recover(&mut self, buffer: &BufferManager) -> Result<()> {
        info!("starting crash recovery");
        self.counters.reset();
        self.active_txns.clear();
        self.current_offset = self.log_file.size();

        let file = Arc::clone(&self.log_file);
        let mut reader = LogReader::new(file.as_ref(), self.current_offset);

        let mut pending: Vec<UpdateRecord> = Vec::new();
        let mut since_last_checkpoint: Vec<UpdateRecord> = Vec::new();
        let mut aborted_txns: BTreeSet<TxnId> = BTreeSet::new();

        while let Some(entry) = reader.next_entry()? {
            match &entry {
                LogEntry::Begin { txn_id } => {
                    let ordinal = self.counters.total();
                    self.active_txns.insert(*txn_id, ordinal);
                }
                LogEntry::Commit { txn_id } => {
                    self.active_txns.remove(txn_id);
                }
                LogEntry::Abort { txn_id } => {
                    // stays in the active index for now; the index minus
                    // this set is what was still open at the crash
                    aborted_txns.insert(*txn_id);
                }
                LogEntry::Update(header) => {
                    since_last_checkpoint.push(reader.read_update(header)?);
                }
                LogEntry::Checkpoint => {
                    pending.clear();
                    since_last_checkpoint.clear();
                }
                LogEntry::BeginFuzzyCheckpoint => {
                    pending = std::mem::take(&mut since_last_checkpoint);
                }
                LogEntry::EndFuzzyCheckpoint => {
                    pending.clear();
                }
            }
            self.counters.bump(entry.kind());
        }

        // an unterminated fuzzy window is not durable: its updates rejoin
        // the tail, in log order
        pending.append(&mut since_last_checkpoint);
        let redo_set = pending;
        debug!(
            "analysis: {} records, {} updates to inspect, {} aborted, {} open",
            self.total_records(),
            redo_set.len(),
            aborted_txns.len(),
            self.active_txns.len()
        );

        for update in &redo_set {
            if aborted_txns.contains(&update.txn_id) {
                apply_image(buffer, update.page_id, update.offset, &update.after_img)?;
            }
        }

        for txn_id in &aborted_txns {
            debug!("undoing aborted transaction {txn_id}");
            self.rollback_txn(*txn_id, buffer)?;
        }
        let open: Vec<TxnId> = self
            .active_txns
            .keys()
            .copied()
            .filter(|txn_id| !aborted_txns.contains(txn_id))
            .collect();
        for txn_id in open {
            debug!("undoing open transaction {txn_id}");
            self.rollback_txn(txn_id, buffer)?;
        }

        info!("recovery complete: {} log records replayed", self.total_records());
        Ok(())
    }
}
