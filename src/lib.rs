// Export public modules
pub mod common;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use storage::buffer::BufferManager;
pub use storage::buffer::BufferPoolError;
pub use storage::file::{BlockFile, DiskFile, MemoryFile};
pub use storage::heap::{HeapSegment, Tid};
pub use transaction::wal::log_manager::LogManager;
pub use transaction::wal::log_record::LogRecordType;
pub use transaction::TransactionManager;
