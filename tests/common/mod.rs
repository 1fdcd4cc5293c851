use std::path::Path;
use std::sync::Arc;
use anyhow::Result;
use tempfile::TempDir;

use emberdb::common::types::{overall_page_id, TxnId};
use emberdb::storage::heap::HeapSegment;
use emberdb::storage::page::SlottedPage;
use emberdb::{BlockFile, BufferManager, DiskFile, LogManager, TransactionManager};

pub const PAGE_SIZE: usize = 128;
pub const POOL_CAPACITY: usize = 10;

/// Tuples are (table_id, field) pairs, 16 bytes with bincode's fixed-width
/// integer encoding
pub const TUPLE_SIZE: usize = 16;

/// A storage engine instance on scratch directories
pub struct TestEngine {
    pub buffer: BufferManager,
    pub log: LogManager,
    pub tm: TransactionManager,
    dir: TempDir,
}

fn open_log(dir: &Path) -> Result<Arc<dyn BlockFile>> {
    Ok(Arc::new(DiskFile::open(dir.join("wal.log"))?))
}

pub fn setup() -> Result<TestEngine> {
    let dir = TempDir::new()?;
    let buffer = BufferManager::new(PAGE_SIZE, POOL_CAPACITY, dir.path().join("segments"))?;
    let log = LogManager::new(open_log(dir.path())?);
    Ok(TestEngine {
        buffer,
        log,
        tm: TransactionManager::new(),
        dir,
    })
}

/// Insert one tuple under an open transaction and report the touched page
#[allow(dead_code)]
pub fn insert_row(
    engine: &mut TestEngine,
    heap: &mut HeapSegment,
    txn_id: TxnId,
    table_id: u64,
    field: u64,
) -> Result<()> {
    let tuple = bincode::serialize(&(table_id, field))?;
    assert_eq!(tuple.len(), TUPLE_SIZE);

    let tid = heap.allocate(tuple.len(), &engine.buffer)?;
    heap.write(tid, &tuple, txn_id, &mut engine.log, &engine.buffer)?;
    engine
        .tm
        .add_modified_page(txn_id, overall_page_id(heap.segment_id(), tid.page()));
    Ok(())
}

/// Count tuples in the segment whose field column equals `field`
#[allow(dead_code)]
pub fn count_field(engine: &TestEngine, heap: &HeapSegment, field: u64) -> Result<usize> {
    let mut count = 0;
    for page_no in 0..heap.page_count() {
        let page_id = overall_page_id(heap.segment_id(), page_no);
        let page = engine.buffer.fix_page(page_id)?;
        {
            let mut guard = page.write();
            let slotted = SlottedPage::new(&mut guard.data);
            if slotted.is_initialized() {
                for slot in 0..slotted.slot_count() {
                    let (_table, value): (u64, u64) =
                        bincode::deserialize(slotted.record(slot)?)?;
                    if value == field {
                        count += 1;
                    }
                }
            }
        }
        engine.buffer.unfix_page(page_id, false)?;
    }
    Ok(count)
}

/// The tuple is visible exactly once
#[allow(dead_code)]
pub fn is_present(engine: &TestEngine, heap: &HeapSegment, field: u64) -> Result<bool> {
    Ok(count_field(engine, heap, field)? == 1)
}

/// The tuple is not visible at all
#[allow(dead_code)]
pub fn is_absent(engine: &TestEngine, heap: &HeapSegment, field: u64) -> Result<bool> {
    Ok(count_field(engine, heap, field)? == 0)
}

/// Insert up to two tuples and commit, forcing pages out between the two
/// inserts so the first one is on disk regardless of the commit
#[allow(dead_code)]
pub fn committed_insert(
    engine: &mut TestEngine,
    heap: &mut HeapSegment,
    table_id: u64,
    field_1: Option<u64>,
    field_2: Option<u64>,
) -> Result<()> {
    let txn_id = engine.tm.begin(&mut engine.log)?;
    if let Some(field) = field_1 {
        insert_row(engine, heap, txn_id, table_id, field)?;
    }
    engine.buffer.flush_all_pages()?;
    if let Some(field) = field_2 {
        insert_row(engine, heap, txn_id, table_id, field)?;
    }
    engine.tm.commit(txn_id, &mut engine.log, &engine.buffer)?;
    Ok(())
}

/// Insert up to two tuples, force the dirty pages to disk (defeating
/// NO-STEAL), then abort
#[allow(dead_code)]
pub fn aborted_insert(
    engine: &mut TestEngine,
    heap: &mut HeapSegment,
    table_id: u64,
    field_1: Option<u64>,
    field_2: Option<u64>,
) -> Result<()> {
    let txn_id = engine.tm.begin(&mut engine.log)?;
    if let Some(field) = field_1 {
        insert_row(engine, heap, txn_id, table_id, field)?;
    }
    if let Some(field) = field_2 {
        insert_row(engine, heap, txn_id, table_id, field)?;
    }
    flush_and_abort(engine, txn_id)?;
    Ok(())
}

/// Force dirty pages out first so the abort has stolen pages to undo
#[allow(dead_code)]
pub fn flush_and_abort(engine: &mut TestEngine, txn_id: TxnId) -> Result<()> {
    engine.buffer.flush_all_pages()?;
    engine.tm.abort(txn_id, &mut engine.log, &engine.buffer)?;
    Ok(())
}

/// Simulate a crash-restart: drop every buffered page, rebind the log
/// manager to a freshly opened handle of the same log file, and recover
#[allow(dead_code)]
pub fn crash_and_recover(engine: &mut TestEngine) -> Result<()> {
    engine.buffer.discard_all_pages();
    let log_file = open_log(engine.dir.path())?;
    engine.log.reset(log_file);
    engine.tm.reset();
    engine.log.recover(&engine.buffer)?;
    Ok(())
}
