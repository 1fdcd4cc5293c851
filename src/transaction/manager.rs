use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::common::types::{PageId, TxnId};
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::transaction::wal::log_manager::{LogManager, WalError};

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Log error: {0}")]
    Wal(#[from] WalError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Brackets transactions and relays their page modifications.
///
/// The log manager is NO-FORCE; commit durability comes from here: commit
/// appends the COMMIT record and then writes back exactly the pages the
/// transaction reported through [`add_modified_page`](Self::add_modified_page).
pub struct TransactionManager {
    next_txn_id: TxnId,
    modified_pages: HashMap<TxnId, BTreeSet<PageId>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_txn_id: 1,
            modified_pages: HashMap::new(),
        }
    }

    /// Start a transaction: assign an id and append its BEGIN record
    pub fn begin(&mut self, log: &mut LogManager) -> Result<TxnId> {
        let txn_id = self.next_txn_id;
        self.next_txn_id += 1;
        log.log_begin(txn_id)?;
        self.modified_pages.insert(txn_id, BTreeSet::new());
        Ok(txn_id)
    }

    /// Record that the transaction touched `page_id`
    pub fn add_modified_page(&mut self, txn_id: TxnId, page_id: PageId) {
        self.modified_pages.entry(txn_id).or_default().insert(page_id);
    }

    /// Append the COMMIT record, then write back the transaction's pages.
    /// The record goes first: a page must never be durable without its log
    /// records being durable too.
    pub fn commit(
        &mut self,
        txn_id: TxnId,
        log: &mut LogManager,
        buffer: &BufferManager,
    ) -> Result<()> {
        log.log_commit(txn_id)?;
        if let Some(pages) = self.modified_pages.remove(&txn_id) {
            for page_id in pages {
                buffer.flush_page(page_id)?;
            }
        }
        Ok(())
    }

    /// Abort the transaction; the log manager appends ABORT and restores
    /// the before-images of every update
    pub fn abort(
        &mut self,
        txn_id: TxnId,
        log: &mut LogManager,
        buffer: &BufferManager,
    ) -> Result<()> {
        log.log_abort(txn_id, buffer)?;
        self.modified_pages.remove(&txn_id);
        Ok(())
    }

    /// Drop per-transaction state, as after a restart
    pub fn reset(&mut self) {
        self.modified_pages.clear();
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
