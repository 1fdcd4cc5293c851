use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use parking_lot::{Mutex, RwLock};

/// Byte-addressable, resizable file. Reads past the logical size fail;
/// writes past it extend the file.
pub trait BlockFile: Send + Sync {
    /// Current logical size in bytes
    fn size(&self) -> u64;

    /// Grow or shrink the file to exactly `new_size` bytes
    fn resize(&self, new_size: u64) -> io::Result<()>;

    /// Fill `dst` from the bytes at `offset`
    fn read_block(&self, offset: u64, dst: &mut [u8]) -> io::Result<()>;

    /// Write `src` at `offset`
    fn write_block(&self, src: &[u8], offset: u64) -> io::Result<()>;
}

struct DiskFileInner {
    file: File,
    size: u64,
}

/// File-system backed block file. The handle lives behind a mutex so that
/// reads and writes can position the cursor without exterior coordination.
pub struct DiskFile {
    inner: Mutex<DiskFileInner>,
}

impl DiskFile {
    /// Open (or create) the file at `path`, keeping existing contents.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            inner: Mutex::new(DiskFileInner { file, size }),
        })
    }
}

impl BlockFile for DiskFile {
    fn size(&self) -> u64 {
        self.inner.lock().size
    }

    fn resize(&self, new_size: u64) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.file.set_len(new_size)?;
        inner.size = new_size;
        Ok(())
    }

    fn read_block(&self, offset: u64, dst: &mut [u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if offset + dst.len() as u64 > inner.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of file",
            ));
        }
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(dst)
    }

    fn write_block(&self, src: &[u8], offset: u64) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(src)?;
        inner.size = inner.size.max(offset + src.len() as u64);
        Ok(())
    }
}

/// In-memory block file used by unit tests
#[derive(Default)]
pub struct MemoryFile {
    data: RwLock<Vec<u8>>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockFile for MemoryFile {
    fn size(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn resize(&self, new_size: u64) -> io::Result<()> {
        self.data.write().resize(new_size as usize, 0);
        Ok(())
    }

    fn read_block(&self, offset: u64, dst: &mut [u8]) -> io::Result<()> {
        let data = self.data.read();
        let start = offset as usize;
        let end = start + dst.len();
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of file",
            ));
        }
        dst.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_block(&self, src: &[u8], offset: u64) -> io::Result<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + src.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(src);
        Ok(())
    }
}
