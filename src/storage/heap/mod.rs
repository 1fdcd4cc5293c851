use thiserror::Error;

use crate::common::types::{overall_page_id, PagePtr, TxnId};
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::storage::page::{PageError, SlottedPage};
use crate::transaction::wal::log_manager::{LogManager, WalError};

#[derive(Error, Debug)]
pub enum HeapError {
    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Log error: {0}")]
    Wal(#[from] WalError),
}

/// Tuple identifier: segment-local page number in the upper bits, slot in
/// the low 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tid(u64);

impl Tid {
    pub fn new(page: u64, slot: u16) -> Self {
        Self((page << 16) | u64::from(slot))
    }

    pub fn page(&self) -> u64 {
        self.0 >> 16
    }

    pub fn slot(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A growable collection of slotted pages holding fixed-position tuples.
///
/// `write` follows the write-ahead discipline: the update record (with the
/// tuple's before-image) is appended to the log before the page bytes
/// change. Slot-directory bookkeeping done by `allocate` is not logged; a
/// rolled-back tuple therefore reads back as all zeroes.
pub struct HeapSegment {
    segment_id: u64,
    page_count: u64,
}

impl HeapSegment {
    pub fn new(segment_id: u64) -> Self {
        Self {
            segment_id,
            page_count: 0,
        }
    }

    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Reserve a slot of `size` bytes on the first page with room,
    /// appending a fresh page when none has any.
    pub fn allocate(&mut self, size: usize, buffer: &BufferManager) -> Result<Tid, HeapError> {
        for page_no in 0..self.page_count {
            let page_id = overall_page_id(self.segment_id, page_no);
            let page = buffer.fix_page(page_id)?;
            let allocated = {
                let mut guard = page.write();
                let mut slotted = SlottedPage::new(&mut guard.data);
                if slotted.is_initialized() && slotted.has_room(size) {
                    Some(slotted.allocate(size))
                } else {
                    None
                }
            };
            match allocated {
                Some(result) => {
                    buffer.unfix_page(page_id, result.is_ok())?;
                    return Ok(Tid::new(page_no, result?));
                }
                None => buffer.unfix_page(page_id, false)?,
            }
        }

        let page_no = self.page_count;
        let page_id = overall_page_id(self.segment_id, page_no);
        let page = buffer.fix_page(page_id)?;
        let allocated = {
            let mut guard = page.write();
            let mut slotted = SlottedPage::new(&mut guard.data);
            slotted.init();
            slotted.allocate(size)
        };
        buffer.unfix_page(page_id, allocated.is_ok())?;
        let slot = allocated?;
        self.page_count += 1;
        Ok(Tid::new(page_no, slot))
    }

    /// Overwrite the tuple at `tid`, logging before- and after-images first
    pub fn write(
        &self,
        tid: Tid,
        data: &[u8],
        txn_id: TxnId,
        log: &mut LogManager,
        buffer: &BufferManager,
    ) -> Result<(), HeapError> {
        let page_id = overall_page_id(self.segment_id, tid.page());
        let page = buffer.fix_page(page_id)?;
        let result = Self::write_logged(&page, page_id, tid, data, txn_id, log);
        buffer.unfix_page(page_id, result.is_ok())?;
        result
    }

    fn write_logged(
        page: &PagePtr,
        page_id: u64,
        tid: Tid,
        data: &[u8],
        txn_id: TxnId,
        log: &mut LogManager,
    ) -> Result<(), HeapError> {
        let location = {
            let mut guard = page.write();
            SlottedPage::new(&mut guard.data).slot(tid.slot())?
        };
        if location.length as usize != data.len() {
            return Err(PageError::LengthMismatch {
                expected: location.length,
                actual: data.len() as u32,
            }
            .into());
        }

        let start = location.offset as usize;
        let before_img = {
            let guard = page.read();
            guard.data[start..start + data.len()].to_vec()
        };
        log.log_update(txn_id, page_id, u64::from(location.offset), &before_img, data)?;

        let mut guard = page.write();
        guard.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy the tuple at `tid` out of its page
    pub fn read(&self, tid: Tid, buffer: &BufferManager) -> Result<Vec<u8>, HeapError> {
        let page_id = overall_page_id(self.segment_id, tid.page());
        let page = buffer.fix_page(page_id)?;
        let result = {
            let mut guard = page.write();
            let slotted = SlottedPage::new(&mut guard.data);
            slotted.record(tid.slot()).map(<[u8]>::to_vec)
        };
        buffer.unfix_page(page_id, false)?;
        Ok(result?)
    }
}
