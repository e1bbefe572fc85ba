use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::path::Path;

use log::{debug, warn};

use crate::config::*;
use crate::descriptor::{Fd, FdTable};
use crate::directory::RootDir;
use crate::fat::Fat;
use crate::file::{fread, fwrite};
use crate::structs::check_name;
use crate::superblock::{read_superblock, write_superblock};
use crate::{BlockDevice, DirEntry, Error, FileDisk, Result, SuperBlock};

/// Only one volume may be mounted per process.
static MOUNTED: AtomicBool = AtomicBool::new(false);

/// Returns whether some volume is currently mounted in this process.
pub fn is_mounted() -> bool {
    MOUNTED.load(Ordering::Acquire)
}

#[derive(Debug)]
struct MountGuard(());

impl MountGuard {
    fn acquire() -> Result<Self> {
        MOUNTED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| MountGuard(()))
            .map_err(|_| Error::AlreadyMounted)
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        MOUNTED.store(false, Ordering::Release);
    }
}

/// Geometry and usage of a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    pub total_blocks: usize,
    pub fat_blocks: usize,
    pub root_dir_block: usize,
    pub data_start: usize,
    pub data_blocks: usize,
    pub free_data_blocks: usize,
    pub free_dir_entries: usize,
    pub max_files: usize,
}

impl fmt::Display for FsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FS Info:")?;
        writeln!(f, "total_blk_count={}", self.total_blocks)?;
        writeln!(f, "fat_blk_count={}", self.fat_blocks)?;
        writeln!(f, "rdir_blk={}", self.root_dir_block)?;
        writeln!(f, "data_blk={}", self.data_start)?;
        writeln!(f, "data_blk_count={}", self.data_blocks)?;
        writeln!(f, "fat_free_ratio={}/{}", self.free_data_blocks, self.data_blocks)?;
        write!(f, "rdir_free_ratio={}/{}", self.free_dir_entries, self.max_files)
    }
}

/// A mounted volume.
///
/// Superblock, FAT and root directory are loaded on mount, changed in memory, and
/// written back by `unmount`. Dropping the session without unmounting loses every
/// metadata change made since the mount.
/// Methods take `&mut self` for anything that mutates; sharing a session between
/// threads needs an outer lock.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    fat: Fat,
    root_dir: RootDir,
    fds: FdTable,
    unmounted: bool,
    _guard: MountGuard,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Writes an empty volume spanning the whole device.
    /// Data blocks are left as they are.
    pub fn format(device: &D) -> Result<()> {
        if device.block_size() != BLOCK_SIZE {
            return Err(Error::InvalidBlockSize(device.block_size()));
        }
        let superblock = SuperBlock::new(device.num_blocks())?;
        write_superblock(device, &superblock)?;
        Fat::new(superblock.data_blocks).store(device, &superblock)?;
        RootDir::new().store(device, &superblock)?;
        device.flush()?;
        debug!(
            "formatted {} blocks: {} FAT block(s), {} data blocks",
            superblock.num_blocks, superblock.fat_blocks, superblock.data_blocks
        );
        Ok(())
    }

    pub fn mount(device: Arc<D>) -> Result<Self> {
        let guard = MountGuard::acquire()?;
        let superblock = read_superblock(&*device)?;
        let fat = Fat::load(&*device, &superblock)?;
        let root_dir = RootDir::load(&*device, &superblock)?;
        debug!(
            "mounted volume: {} blocks, {} data blocks, {} free",
            superblock.num_blocks,
            superblock.data_blocks,
            fat.free_count()
        );
        Ok(Self {
            device,
            superblock,
            fat,
            root_dir,
            fds: FdTable::new(),
            unmounted: false,
            _guard: guard,
        })
    }

    /// Writes superblock, FAT and root directory back, in that order, and releases the volume.
    /// Descriptors still open are discarded.
    pub fn unmount(mut self) -> Result<()> {
        self.unmounted = true;
        let open = self.fds.open_count();
        if open > 0 {
            warn!("unmounting with {} open file descriptor(s)", open);
        }
        write_superblock(&*self.device, &self.superblock)?;
        self.fat.store(&*self.device, &self.superblock)?;
        self.root_dir.store(&*self.device, &self.superblock)?;
        self.device.flush()?;
        debug!("unmounted volume");
        Ok(())
    }

    pub fn info(&self) -> FsInfo {
        FsInfo {
            total_blocks: self.superblock.num_blocks as usize,
            fat_blocks: self.superblock.fat_blocks as usize,
            root_dir_block: self.superblock.root_dir_index as usize,
            data_start: self.superblock.data_start as usize,
            data_blocks: self.superblock.data_blocks as usize,
            free_data_blocks: self.fat.free_count(),
            free_dir_entries: self.root_dir.free_count(),
            max_files: MAX_FILES,
        }
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        let slot = self.root_dir.add(name)?;
        debug!("created {} in slot {}", name, slot);
        Ok(())
    }

    /// Removes a file and frees its blocks. Open files cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let slot = self
            .root_dir
            .lookup(check_name(name)?)
            .ok_or(Error::NotFound)?;
        if self.fds.is_slot_open(slot) {
            return Err(Error::FileBusy);
        }
        let freed = self.fat.free_chain(self.root_dir.get(slot).first_block)?;
        self.root_dir.remove(slot);
        debug!("deleted {}, {} block(s) freed", name, freed);
        Ok(())
    }

    /// Files of the root directory in slot order.
    /// The iterator borrows the session; call again to start over.
    pub fn ls(&self) -> impl Iterator<Item = &DirEntry> + '_ {
        self.root_dir.iter()
    }

    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let slot = self
            .root_dir
            .lookup(check_name(name)?)
            .ok_or(Error::NotFound)?;
        let fd = self.fds.open(slot)?;
        debug!("opened {} as fd {}", name, fd);
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fds.close(fd)?;
        debug!("closed fd {}", fd);
        Ok(())
    }

    /// Current size of the file behind `fd`.
    pub fn stat(&self, fd: Fd) -> Result<usize> {
        let file = self.fds.get(fd)?;
        Ok(self.root_dir.get(file.slot).size as usize)
    }

    /// Moves the cursor of `fd`. The end of the file is the furthest valid position.
    pub fn seek(&mut self, fd: Fd, offset: usize) -> Result<()> {
        let file = self.fds.get_mut(fd)?;
        let size = self.root_dir.get(file.slot).size as usize;
        if offset > size {
            return Err(Error::OffsetOutOfRange { offset, size });
        }
        file.offset = offset;
        Ok(())
    }

    /// Current cursor of `fd`.
    pub fn tell(&self, fd: Fd) -> Result<usize> {
        Ok(self.fds.get(fd)?.offset)
    }

    /// Reads up to `buf.len()` bytes at the cursor and advances it.
    /// Returns fewer bytes near the end of the file, and 0 at the end.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let file = self.fds.get_mut(fd)?;
        let bytes_read = fread(
            &*self.device,
            &self.superblock,
            &self.fat,
            self.root_dir.get(file.slot),
            file.offset,
            buf,
        )?;
        file.offset += bytes_read;
        Ok(bytes_read)
    }

    /// Writes `buf` at the cursor and advances it, extending the file as needed.
    /// A count shorter than `buf.len()` means the volume ran out of blocks.
    /// On a device error the file keeps the bytes already committed, so its size may
    /// grow, but the cursor stays where it was.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let file = self.fds.get_mut(fd)?;
        let bytes_written = fwrite(
            &*self.device,
            &self.superblock,
            &mut self.fat,
            self.root_dir.get_mut(file.slot),
            file.offset,
            buf,
        )?;
        file.offset += bytes_written;
        Ok(bytes_written)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }
}

impl FileSystem<FileDisk> {
    /// Opens a disk image by path and mounts it.
    pub fn open_volume(path: impl AsRef<Path>) -> Result<Self> {
        let disk = FileDisk::open(path)?;
        Self::mount(Arc::new(disk))
    }
}

impl<D: BlockDevice> Drop for FileSystem<D> {
    fn drop(&mut self) {
        if !self.unmounted {
            warn!("volume dropped without unmount, metadata changes are lost");
        }
    }
}
