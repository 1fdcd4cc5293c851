use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Slot {0} out of range")]
    InvalidSlot(u16),
    #[error("Record is {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: u32 },
}
