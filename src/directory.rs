//! The flat root directory: a fixed array of `MAX_FILES` slots stored in one block.
//! Slots are searched from the lowest index, so slot choice is deterministic.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::*;
use crate::BlockDevice;

#[derive(Debug, Clone)]
pub struct RootDir {
    entries: Vec<DirEntry>,
}

impl RootDir {
    pub fn new() -> Self {
        Self {
            entries: vec![DirEntry::NULL; MAX_FILES],
        }
    }

    pub fn load<D: BlockDevice + ?Sized>(device: &D, superblock: &SuperBlock) -> Result<Self> {
        let mut buf = vec![0u8; BLOCK_SIZE * ROOT_DIR_BLOCKS];
        for (i, block) in buf.chunks_mut(BLOCK_SIZE).enumerate() {
            device.read_block(superblock.root_dir_index as usize + i, block)?;
        }
        let entries = buf
            .chunks(DIR_ENTRY_SIZE)
            .take(MAX_FILES)
            .map(DirEntry::decode)
            .collect();
        Ok(Self { entries })
    }

    pub fn store<D: BlockDevice + ?Sized>(&self, device: &D, superblock: &SuperBlock) -> Result<()> {
        let mut buf = vec![0u8; BLOCK_SIZE * ROOT_DIR_BLOCKS];
        for (entry, record) in self.entries.iter().zip(buf.chunks_mut(DIR_ENTRY_SIZE)) {
            entry.encode(record);
        }
        for (i, block) in buf.chunks(BLOCK_SIZE).enumerate() {
            device.write_block(superblock.root_dir_index as usize + i, block)?;
        }
        Ok(())
    }

    /// Slot holding a file with this name.
    pub fn lookup(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.name_eq(name))
    }

    /// Adds an empty file in the lowest free slot and returns the slot.
    pub fn add(&mut self, name: &str) -> Result<usize> {
        let entry = DirEntry::new(name)?;
        if self.lookup(entry.name_bytes()).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self
            .entries
            .iter()
            .position(DirEntry::is_empty)
            .ok_or(FsError::DirectoryFull)?;
        self.entries[slot] = entry;
        Ok(slot)
    }

    /// Clears a slot and returns what it held.
    pub fn remove(&mut self, slot: usize) -> DirEntry {
        core::mem::replace(&mut self.entries[slot], DirEntry::NULL)
    }

    pub fn get(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut DirEntry {
        &mut self.entries[slot]
    }

    /// Files in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> + '_ {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_empty()).count()
    }
}

impl Default for RootDir {
    fn default() -> Self {
        Self::new()
    }
}
