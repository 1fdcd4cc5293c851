use std::sync::Arc;
use parking_lot::RwLock;

/// Page ID type. The upper bits identify the owning segment, the lower
/// bits the page within that segment (see [`overall_page_id`]).
pub type PageId = u64;

/// Transaction ID type
pub type TxnId = u64;

/// Number of low bits of a [`PageId`] that address a page within its segment
pub const SEGMENT_SHIFT: u32 = 48;

/// Combine a segment id and a segment-local page number into a global page id
pub fn overall_page_id(segment_id: u64, segment_page: u64) -> PageId {
    (segment_id << SEGMENT_SHIFT) | segment_page
}

/// Segment that owns the given page
pub fn segment_id_of(page_id: PageId) -> u64 {
    page_id >> SEGMENT_SHIFT
}

/// Page number within its segment
pub fn segment_page_of(page_id: PageId) -> u64 {
    page_id & ((1u64 << SEGMENT_SHIFT) - 1)
}

/// In-memory page image
#[derive(Debug, Clone)]
pub struct Page {
    pub page_id: PageId,
    pub data: Vec<u8>,
}

impl Page {
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            page_id,
            data: vec![0; page_size],
        }
    }
}

/// Smart pointer to a page
pub type PagePtr = Arc<RwLock<Page>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_packing_roundtrip() {
        let id = overall_page_id(123, 42);
        assert_eq!(segment_id_of(id), 123);
        assert_eq!(segment_page_of(id), 42);
    }
}
