use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::common::types::{Page, PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::disk::DiskManager;

struct Frame {
    page: PagePtr,
    pin_count: u32,
    dirty: bool,
}

/// Page cache in front of the per-segment disk files.
///
/// Dirty pages may be written back before their transaction commits
/// (STEAL); a frame's dirty mark means "modified since the last
/// `flush_all_pages`", which is the set a fuzzy checkpoint snapshots.
/// `flush_page` writes a page back without clearing that mark.
pub struct BufferManager {
    page_size: usize,
    capacity: usize,
    frames: RwLock<HashMap<PageId, Frame>>,
    disk: DiskManager,
}

impl BufferManager {
    pub fn new(
        page_size: usize,
        capacity: usize,
        dir: impl AsRef<Path>,
    ) -> Result<Self, BufferPoolError> {
        let disk = DiskManager::new(dir, page_size)?;
        Ok(Self {
            page_size,
            capacity,
            frames: RwLock::new(HashMap::new()),
            disk,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pin a page in memory, faulting it in from disk if necessary.
    /// Callers lock the returned page for access and must pair every fix
    /// with an `unfix_page`.
    pub fn fix_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        let mut frames = self.frames.write();

        if let Some(frame) = frames.get_mut(&page_id) {
            frame.pin_count += 1;
            return Ok(frame.page.clone());
        }

        if frames.len() >= self.capacity {
            self.evict_one(&mut frames)?;
        }

        let mut page = Page::new(page_id, self.page_size);
        self.disk.read_page(page_id, &mut page.data)?;
        let ptr: PagePtr = Arc::new(RwLock::new(page));
        frames.insert(
            page_id,
            Frame {
                page: ptr.clone(),
                pin_count: 1,
                dirty: false,
            },
        );
        Ok(ptr)
    }

    /// Unpin a page, optionally marking it modified
    pub fn unfix_page(&self, page_id: PageId, dirty: bool) -> Result<(), BufferPoolError> {
        let mut frames = self.frames.write();
        let frame = frames
            .get_mut(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;
        frame.pin_count = frame.pin_count.saturating_sub(1);
        if dirty {
            frame.dirty = true;
        }
        Ok(())
    }

    /// Write one page back if it has been modified. The dirty mark is kept;
    /// only `flush_all_pages` clears it.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frames = self.frames.read();
        if let Some(frame) = frames.get(&page_id) {
            if frame.dirty {
                let page = frame.page.read();
                self.disk.write_page(page_id, &page.data)?;
            }
        }
        Ok(())
    }

    /// Write back every modified page and clear the dirty marks
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut frames = self.frames.write();
        let mut page_ids: Vec<PageId> = frames
            .iter()
            .filter(|(_, frame)| frame.dirty)
            .map(|(id, _)| *id)
            .collect();
        page_ids.sort_unstable();

        for page_id in page_ids {
            if let Some(frame) = frames.get_mut(&page_id) {
                {
                    let page = frame.page.read();
                    self.disk.write_page(page_id, &page.data)?;
                }
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Sorted snapshot of the pages currently marked dirty
    pub fn get_dirty_page_ids(&self) -> Vec<PageId> {
        let frames = self.frames.read();
        let mut page_ids: Vec<PageId> = frames
            .iter()
            .filter(|(_, frame)| frame.dirty)
            .map(|(id, _)| *id)
            .collect();
        page_ids.sort_unstable();
        page_ids
    }

    /// Drop every frame without writing anything back (crash simulation)
    pub fn discard_all_pages(&self) {
        self.frames.write().clear();
    }

    fn evict_one(&self, frames: &mut HashMap<PageId, Frame>) -> Result<(), BufferPoolError> {
        let victim = frames
            .iter()
            .filter(|(_, frame)| frame.pin_count == 0)
            .map(|(id, _)| *id)
            .min()
            .ok_or(BufferPoolError::NoFreeFrames)?;
        if let Some(frame) = frames.remove(&victim) {
            if frame.dirty {
                let page = frame.page.read();
                self.disk.write_page(victim, &page.data)?;
            }
        }
        Ok(())
    }
}
