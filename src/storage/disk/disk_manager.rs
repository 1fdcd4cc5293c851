use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{segment_id_of, segment_page_of, PageId};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Persists pages in one file per segment under a data directory. A page
/// that was never written reads back as all zeroes.
pub struct DiskManager {
    dir: PathBuf,
    page_size: usize,
    files: Mutex<HashMap<u64, File>>,
}

impl DiskManager {
    pub fn new(dir: impl AsRef<Path>, page_size: usize) -> Result<Self, DiskManagerError> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            page_size,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Read a page from its segment file into `buf`
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        let file = Self::segment_file(&self.dir, &mut files, segment_id_of(page_id))?;
        let offset = segment_page_of(page_id) * self.page_size as u64;

        let file_size = file.metadata()?.len();
        if offset >= file_size {
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Write a page to its segment file, extending the file as needed
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        let file = Self::segment_file(&self.dir, &mut files, segment_id_of(page_id))?;
        let offset = segment_page_of(page_id) * self.page_size as u64;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn segment_file<'m>(
        dir: &Path,
        files: &'m mut HashMap<u64, File>,
        segment_id: u64,
    ) -> Result<&'m mut File, DiskManagerError> {
        match files.entry(segment_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(dir.join(format!("segment_{segment_id}")))?;
                Ok(entry.insert(file))
            }
        }
    }
}
