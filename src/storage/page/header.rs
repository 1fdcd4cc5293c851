use byteorder::{ByteOrder, LittleEndian};
use crate::storage::page::layout::HEADER_SIZE;

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub slot_count: u32,
    pub free_space_offset: u32,
    pub free_space: u32,
}

impl PageHeader {
    pub fn new(page_size: usize) -> Self {
        Self {
            slot_count: 0,
            free_space_offset: HEADER_SIZE as u32,
            free_space: (page_size - HEADER_SIZE) as u32,
        }
    }

    // Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.slot_count);
        LittleEndian::write_u32(&mut bytes[4..8], self.free_space_offset);
        LittleEndian::write_u32(&mut bytes[8..12], self.free_space);
        bytes
    }

    // Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            slot_count: LittleEndian::read_u32(&bytes[0..4]),
            free_space_offset: LittleEndian::read_u32(&bytes[4..8]),
            free_space: LittleEndian::read_u32(&bytes[8..12]),
        }
    }
}
