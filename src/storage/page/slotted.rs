use crate::storage::page::error::PageError;
use crate::storage::page::header::PageHeader;
use crate::storage::page::layout::{slot_position, RecordLocation, HEADER_SIZE, SLOT_SIZE};

/// Mutable slotted-page view over a page's raw bytes. Record data grows up
/// from the header, the slot directory grows down from the end. Records are
/// never deleted or compacted; a slot's bytes are overwritten in place.
pub struct SlottedPage<'a> {
    data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Lay out an empty page
    pub fn init(&mut self) {
        let header = PageHeader::new(self.data.len());
        self.write_header(&header);
    }

    /// A freshly faulted page is all zeroes; an initialized header always
    /// places the free-space offset at or beyond its own end.
    pub fn is_initialized(&self) -> bool {
        self.header().free_space_offset >= HEADER_SIZE as u32
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data[..HEADER_SIZE])
    }

    fn write_header(&mut self, header: &PageHeader) {
        self.data[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    pub fn slot_count(&self) -> u16 {
        self.header().slot_count as u16
    }

    pub fn has_room(&self, len: usize) -> bool {
        self.header().free_space as usize >= len + SLOT_SIZE
    }

    /// Reserve a new slot of `len` bytes and return its index
    pub fn allocate(&mut self, len: usize) -> Result<u16, PageError> {
        let mut header = self.header();
        if (header.free_space as usize) < len + SLOT_SIZE {
            return Err(PageError::InsufficientSpace);
        }

        let slot = header.slot_count as u16;
        let location = RecordLocation {
            offset: header.free_space_offset,
            length: len as u32,
        };
        let pos = slot_position(self.data.len(), slot);
        self.data[pos..pos + SLOT_SIZE].copy_from_slice(&location.to_bytes());

        header.free_space_offset += len as u32;
        header.free_space -= (len + SLOT_SIZE) as u32;
        header.slot_count += 1;
        self.write_header(&header);

        Ok(slot)
    }

    pub fn slot(&self, slot: u16) -> Result<RecordLocation, PageError> {
        if u32::from(slot) >= self.header().slot_count {
            return Err(PageError::InvalidSlot(slot));
        }
        let pos = slot_position(self.data.len(), slot);
        Ok(RecordLocation::from_bytes(&self.data[pos..pos + SLOT_SIZE]))
    }

    pub fn record(&self, slot: u16) -> Result<&[u8], PageError> {
        let location = self.slot(slot)?;
        let start = location.offset as usize;
        Ok(&self.data[start..start + location.length as usize])
    }
}
