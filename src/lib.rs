//! Fatlite is a small FAT file system with a single flat root directory.
//! No support for subdirectories, permissions, timestamps, or journaling.
//!
//! Fatlite's linear layout (block size 4096):
//! - Superblock
//! - FAT, one 16-bit link per data block
//! - Root directory, 128 entries in one block
//! - Data blocks
//!
//! Fatlite's layers (from bottom to top):
//! 1. Block Device: Abstraction for low level devices.          | User implemented, or `FileDisk` for image files
//! 2. FAT: Block allocation and chain traversal.                | In memory for the whole mount
//! 3. Root Directory: File names, sizes and first blocks.       | In memory for the whole mount
//! 4. File: Byte-level reads and writes along a chain.          | Per call, through one scratch block
//! 5. FileSystem: Mount session, descriptors and the file API.  | One mounted volume per process
//!
//! Metadata only reaches the device on `FileSystem::unmount`.

extern crate alloc;

mod config;
mod block_dev;
mod structs;
mod superblock;
mod fat;
mod directory;
mod descriptor;
mod file;
mod fs;
mod error;

pub use block_dev::{BlockDevice, FileDisk};
pub use config::*;
pub use superblock::*;
pub use structs::*;
pub use fat::Fat;
pub use directory::RootDir;
pub use descriptor::{Fd, FdTable, OpenFile};
pub use file::*;
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
