//! The file allocation table.
//! One 16-bit link per data block: 0 marks a free block, FAT_EOC ends a chain,
//! anything else is the index of the next block of the same file.
//! The table lives in memory for the whole mount and is written back on unmount.

use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::config::*;
use crate::error::FsError;
use crate::structs::{read_u16, write_u16};
use crate::{BlockDevice, Result, SuperBlock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<u16>,
}

impl Fat {
    /// A table with every block free except the reserved entry 0.
    pub fn new(data_blocks: u16) -> Self {
        let mut entries = vec![FAT_FREE; data_blocks as usize];
        if let Some(first) = entries.first_mut() {
            *first = FAT_EOC;
        }
        Self { entries }
    }

    /// Reads the FAT region that follows the superblock.
    pub fn load<D: BlockDevice + ?Sized>(device: &D, superblock: &SuperBlock) -> Result<Self> {
        let data_blocks = superblock.data_blocks as usize;
        let mut entries = Vec::with_capacity(superblock.fat_blocks as usize * FAT_ENTRIES_PER_BLOCK);
        let mut buf = vec![0u8; BLOCK_SIZE];
        for i in 0..superblock.fat_blocks as usize {
            device.read_block(1 + i, &mut buf)?;
            entries.extend((0..FAT_ENTRIES_PER_BLOCK).map(|j| read_u16(&buf, j * FAT_ENTRY_SIZE)));
        }
        entries.truncate(data_blocks);

        if entries.first() != Some(&FAT_EOC) {
            return Err(FsError::ChainCorrupted(0));
        }
        Ok(Self { entries })
    }

    /// Writes the table back, zero-padding the unused tail of the last FAT block.
    pub fn store<D: BlockDevice + ?Sized>(&self, device: &D, superblock: &SuperBlock) -> Result<()> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        for i in 0..superblock.fat_blocks as usize {
            buf.fill(0);
            let start = (i * FAT_ENTRIES_PER_BLOCK).min(self.entries.len());
            let end = (start + FAT_ENTRIES_PER_BLOCK).min(self.entries.len());
            for (j, &entry) in self.entries[start..end].iter().enumerate() {
                write_u16(&mut buf, j * FAT_ENTRY_SIZE, entry);
            }
            device.write_block(1 + i, &buf)?;
        }
        Ok(())
    }

    /// Number of entries, which is the number of data blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of an entry, `None` when out of range.
    pub fn entry(&self, index: u16) -> Option<u16> {
        self.entries.get(index as usize).copied()
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|&&e| e == FAT_FREE).count()
    }

    /// Follows one link. Returns `None` at the end of the chain.
    /// A chain that runs through the reserved entry, a free entry or out of
    /// the table is corrupted.
    pub fn next(&self, block: u16) -> Result<Option<u16>> {
        self.check_member(block)?;
        match self.entries[block as usize] {
            FAT_EOC => Ok(None),
            FAT_FREE => Err(FsError::ChainCorrupted(block)),
            next => Ok(Some(next)),
        }
    }

    /// Physical index of the `logical`-th block (0-based) of the chain starting at `first`.
    pub fn resolve(&self, first: u16, logical: usize) -> Result<u16> {
        self.check_member(first)?;
        if logical >= self.entries.len() {
            return Err(FsError::ChainCorrupted(first));
        }
        let mut block = first;
        for _ in 0..logical {
            block = self.next(block)?.ok_or(FsError::ChainCorrupted(block))?;
        }
        Ok(block)
    }

    /// Number of blocks in the chain starting at `first`, 0 for `FAT_EOC`.
    /// A chain longer than the table must loop, and is reported as corrupted.
    pub fn chain_len(&self, first: u16) -> Result<usize> {
        if first == FAT_EOC {
            return Ok(0);
        }
        self.check_member(first)?;
        let mut len = 1;
        let mut block = first;
        while let Some(next) = self.next(block)? {
            len += 1;
            if len >= self.entries.len() {
                return Err(FsError::ChainCorrupted(next));
            }
            block = next;
        }
        Ok(len)
    }

    /// Takes the lowest-numbered free block and marks it as a one-block chain.
    pub fn allocate_one(&mut self) -> Result<u16> {
        let index = self
            .entries
            .iter()
            .position(|&e| e == FAT_FREE)
            .ok_or(FsError::OutOfSpace)?;
        self.entries[index] = FAT_EOC;
        trace!("fat: allocated block {}", index);
        Ok(index as u16)
    }

    /// Allocates a block and links it after `tail`, which must end its chain.
    /// Returns the new tail.
    pub fn extend(&mut self, tail: u16) -> Result<u16> {
        if self.next(tail)?.is_some() {
            return Err(FsError::ChainCorrupted(tail));
        }
        let block = self.allocate_one()?;
        self.entries[tail as usize] = block;
        trace!("fat: linked block {} after {}", block, tail);
        Ok(block)
    }

    /// Returns every block of the chain to the free pool.
    /// The chain is measured first so a corrupted chain is left untouched.
    pub fn free_chain(&mut self, first: u16) -> Result<usize> {
        let len = self.chain_len(first)?;
        let mut block = first;
        for _ in 0..len {
            let next = self.entries[block as usize];
            self.entries[block as usize] = FAT_FREE;
            block = next;
        }
        if len > 0 {
            trace!("fat: freed {} block(s) from {}", len, first);
        }
        Ok(len)
    }

    /// Keeps the first `keep` blocks of the chain and frees the rest.
    /// Returns the (possibly emptied) first block.
    pub fn truncate(&mut self, first: u16, keep: usize) -> Result<u16> {
        if keep == 0 {
            self.free_chain(first)?;
            return Ok(FAT_EOC);
        }
        let tail = self.resolve(first, keep - 1)?;
        if let Some(rest) = self.next(tail)? {
            self.free_chain(rest)?;
            self.entries[tail as usize] = FAT_EOC;
        }
        Ok(first)
    }

    fn check_member(&self, block: u16) -> Result<()> {
        if block == 0 || block as usize >= self.entries.len() {
            return Err(FsError::ChainCorrupted(block));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(fat: &Fat, first: u16) -> Vec<u16> {
        let mut blocks = vec![first];
        let mut block = first;
        while let Some(next) = fat.next(block).unwrap() {
            blocks.push(next);
            block = next;
        }
        blocks
    }

    #[test]
    fn entry_zero_is_reserved() {
        let mut fat = Fat::new(8);
        assert_eq!(fat.entry(0), Some(FAT_EOC));
        assert_eq!(fat.free_count(), 7);
        assert_eq!(fat.allocate_one().unwrap(), 1);
        assert!(matches!(fat.next(0), Err(FsError::ChainCorrupted(0))));
    }

    #[test]
    fn allocation_is_lowest_first() {
        let mut fat = Fat::new(8);
        let a = fat.allocate_one().unwrap();
        let b = fat.allocate_one().unwrap();
        let c = fat.allocate_one().unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
        fat.free_chain(b).unwrap();
        assert_eq!(fat.allocate_one().unwrap(), 2);
    }

    #[test]
    fn extend_and_resolve() {
        let mut fat = Fat::new(16);
        let first = fat.allocate_one().unwrap();
        let other = fat.allocate_one().unwrap();
        let second = fat.extend(first).unwrap();
        let third = fat.extend(second).unwrap();
        assert_eq!(chain(&fat, first), vec![1, 3, 4]);
        assert_eq!(chain(&fat, other), vec![2]);
        assert_eq!(fat.resolve(first, 0).unwrap(), first);
        assert_eq!(fat.resolve(first, 2).unwrap(), third);
        assert!(matches!(fat.resolve(first, 3), Err(FsError::ChainCorrupted(4))));
        assert_eq!(fat.chain_len(first).unwrap(), 3);
        assert_eq!(fat.chain_len(FAT_EOC).unwrap(), 0);
    }

    #[test]
    fn extend_requires_tail() {
        let mut fat = Fat::new(16);
        let first = fat.allocate_one().unwrap();
        fat.extend(first).unwrap();
        assert!(matches!(fat.extend(first), Err(FsError::ChainCorrupted(1))));
    }

    #[test]
    fn exhaustion() {
        let mut fat = Fat::new(4);
        let first = fat.allocate_one().unwrap();
        let tail = fat.extend(first).unwrap();
        let tail = fat.extend(tail).unwrap();
        assert!(matches!(fat.extend(tail), Err(FsError::OutOfSpace)));
        // The failed extension must not have touched the chain.
        assert_eq!(chain(&fat, first), vec![1, 2, 3]);
        assert_eq!(fat.free_count(), 0);
    }

    #[test]
    fn free_and_truncate() {
        let mut fat = Fat::new(16);
        let mut tail = fat.allocate_one().unwrap();
        let first = tail;
        for _ in 0..4 {
            tail = fat.extend(tail).unwrap();
        }
        assert_eq!(fat.truncate(first, 2).unwrap(), first);
        assert_eq!(chain(&fat, first), vec![1, 2]);
        assert_eq!(fat.free_count(), 13);
        assert_eq!(fat.truncate(first, 0).unwrap(), FAT_EOC);
        assert_eq!(fat.free_count(), 15);
        assert_eq!(fat.free_chain(FAT_EOC).unwrap(), 0);
    }

    #[test]
    fn cycles_are_detected() {
        let mut fat = Fat::new(8);
        let first = fat.allocate_one().unwrap();
        let second = fat.extend(first).unwrap();
        fat.entries[second as usize] = first;
        assert!(matches!(fat.chain_len(first), Err(FsError::ChainCorrupted(_))));
        assert!(matches!(fat.free_chain(first), Err(FsError::ChainCorrupted(_))));
        // Nothing was freed.
        assert_eq!(fat.entry(first), Some(second));
    }

    #[test]
    fn free_link_is_corruption() {
        let mut fat = Fat::new(8);
        let first = fat.allocate_one().unwrap();
        fat.entries[first as usize] = 5;
        assert!(matches!(fat.resolve(first, 1), Ok(5)));
        assert!(matches!(fat.resolve(first, 2), Err(FsError::ChainCorrupted(5))));
    }
}
