pub mod log_manager;
pub mod log_record;
pub mod recovery;

pub use log_manager::{LogManager, WalError};
pub use log_record::{LogRecord, LogRecordType};
