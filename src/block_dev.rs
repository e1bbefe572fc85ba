use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    /// buf.len() must be equal to block_size().
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;

    /// Writes a block of data to the block device.
    /// buf.len() must be equal to block_size().
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()>;

    /// Flushes any buffered data to the underlying storage.
    /// Called once when a volume is unmounted.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// A disk image stored in a regular host file, one block after another.
#[derive(Debug)]
pub struct FileDisk {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl FileDisk {
    /// Opens an existing image. Trailing bytes that do not fill a whole block are ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| FsError::Open {
            name: path.display().to_string(),
            source,
        };
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks: (len / BLOCK_SIZE as u64) as usize,
        })
    }

    /// Creates (or truncates) an image of `num_blocks` zeroed blocks.
    pub fn create(path: impl AsRef<Path>, num_blocks: usize) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| FsError::Open {
            name: path.display().to_string(),
            source,
        };
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(open_err)?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    fn check(&self, block_id: usize, len: usize) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        if len != BLOCK_SIZE {
            return Err(FsError::BadBufferSize(len));
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        self.check(block_id, buf.len())?;
        let mut file = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        self.check(block_id, buf.len())?;
        let mut file = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
