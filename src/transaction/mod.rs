pub mod manager;
pub mod wal;

// Public exports
pub use manager::{TransactionError, TransactionManager};
pub use wal::log_manager::LogManager;
pub use wal::log_record::{LogRecord, LogRecordType};
