//! Open file handles.
//! A descriptor only remembers which directory slot it refers to and where its cursor is,
//! so every descriptor of one file sees the same size and chain.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::MAX_OPEN_FILES;
use crate::error::{FsError, Result};

/// File descriptor, an index into the descriptor table.
pub type Fd = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub slot: usize,   // Root directory slot of the file
    pub offset: usize, // Cursor, never beyond the file size
}

#[derive(Debug, Clone)]
pub struct FdTable {
    fds: Vec<Option<OpenFile>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            fds: vec![None; MAX_OPEN_FILES],
        }
    }

    /// Binds the lowest free descriptor to a directory slot, cursor at 0.
    pub fn open(&mut self, slot: usize) -> Result<Fd> {
        let fd = self
            .fds
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.fds[fd] = Some(OpenFile { slot, offset: 0 });
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<OpenFile> {
        self.fds
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.fds
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.fds
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidDescriptor(fd))
    }

    /// Whether any descriptor refers to the given directory slot.
    pub fn is_slot_open(&self, slot: usize) -> bool {
        self.iter().any(|f| f.slot == slot)
    }

    pub fn open_count(&self) -> usize {
        self.iter().count()
    }

    fn iter(&self) -> impl Iterator<Item = &OpenFile> + '_ {
        self.fds.iter().flatten()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_reuse() {
        let mut table = FdTable::new();
        assert_eq!(table.open(3).unwrap(), 0);
        assert_eq!(table.open(3).unwrap(), 1);
        assert_eq!(table.open(5).unwrap(), 2);
        assert_eq!(table.close(1).unwrap().slot, 3);
        assert!(matches!(table.close(1), Err(FsError::InvalidDescriptor(1))));
        assert_eq!(table.open(7).unwrap(), 1);
        assert!(table.is_slot_open(3));
        table.close(0).unwrap();
        assert!(!table.is_slot_open(3));
        assert_eq!(table.open_count(), 2);
    }

    #[test]
    fn bad_descriptors() {
        let mut table = FdTable::new();
        assert!(matches!(table.get(0), Err(FsError::InvalidDescriptor(0))));
        assert!(matches!(
            table.get_mut(MAX_OPEN_FILES),
            Err(FsError::InvalidDescriptor(MAX_OPEN_FILES))
        ));
        assert!(matches!(table.close(usize::MAX), Err(FsError::InvalidDescriptor(_))));
    }

    #[test]
    fn table_full() {
        let mut table = FdTable::new();
        for _ in 0..MAX_OPEN_FILES {
            table.open(0).unwrap();
        }
        assert!(matches!(table.open(0), Err(FsError::TooManyOpenFiles)));
        table.close(MAX_OPEN_FILES - 1).unwrap();
        assert_eq!(table.open(0).unwrap(), MAX_OPEN_FILES - 1);
    }
}
