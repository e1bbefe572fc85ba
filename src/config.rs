pub const SIGNATURE: &[u8; 8] = b"ECS150FS";

pub const BLOCK_SIZE: usize = 4096;
pub const SUPERBLOCK_ID: usize = 0; // Block ID for the superblock
pub const ROOT_DIR_BLOCKS: usize = 1; // The root directory always fits in one block

pub const FAT_EOC: u16 = 0xFFFF; // End of chain, also "no block allocated"
pub const FAT_FREE: u16 = 0;
pub const FAT_ENTRY_SIZE: usize = 2;
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;

pub const FILENAME_LEN: usize = 16; // Name field width, including the NUL terminator
pub const MAX_FILE_NAME_LEN: usize = FILENAME_LEN - 1;
pub const DIR_ENTRY_SIZE: usize = 32; // name + size (4 bytes) + first block (2 bytes) + padding
pub const MAX_FILES: usize = ROOT_DIR_BLOCKS * BLOCK_SIZE / DIR_ENTRY_SIZE;

pub const MAX_OPEN_FILES: usize = 32;

/// Smallest device that still has a usable data block next to the reserved data block 0.
pub const MIN_DISK_BLOCKS: usize = 5;
