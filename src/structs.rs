//! On-disk structures and their byte layouts.
//! Everything is little-endian and packed by hand, field by field.

use alloc::borrow::Cow;
use alloc::string::String;

use crate::config::*;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub signature: [u8; 8],
    pub num_blocks: u16,     // Total number of blocks on the device
    pub root_dir_index: u16, // Block number of the root directory
    pub data_start: u16,     // Block number where data blocks start
    pub data_blocks: u16,    // Number of data blocks, also the number of FAT entries
    pub fat_blocks: u8,      // Number of blocks occupied by the FAT
}

impl SuperBlock {
    const SIGNATURE_OFF: usize = 0;
    const NUM_BLOCKS_OFF: usize = 8;
    const ROOT_DIR_OFF: usize = 10;
    const DATA_START_OFF: usize = 12;
    const DATA_BLOCKS_OFF: usize = 14;
    const FAT_BLOCKS_OFF: usize = 16;

    /// Lays out a volume covering a whole device of `num_blocks` blocks.
    /// The FAT gets just enough blocks for the data region that remains after it.
    pub fn new(num_blocks: usize) -> Result<Self> {
        if num_blocks < MIN_DISK_BLOCKS || num_blocks > u16::MAX as usize {
            return Err(Error::InvalidGeometry(num_blocks));
        }

        // Each FAT block pays for itself plus FAT_ENTRIES_PER_BLOCK data blocks.
        let available = num_blocks - 1 - ROOT_DIR_BLOCKS;
        let fat_blocks = available.div_ceil(FAT_ENTRIES_PER_BLOCK + 1);
        let data_blocks = available - fat_blocks;

        let root_dir_index = 1 + fat_blocks;
        Ok(Self {
            signature: *SIGNATURE,
            num_blocks: num_blocks as u16,
            root_dir_index: root_dir_index as u16,
            data_start: (root_dir_index + ROOT_DIR_BLOCKS) as u16,
            data_blocks: data_blocks as u16,
            fat_blocks: fat_blocks as u8,
        })
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut signature = [0; 8];
        signature.copy_from_slice(&buf[Self::SIGNATURE_OFF..Self::SIGNATURE_OFF + 8]);
        Self {
            signature,
            num_blocks: read_u16(buf, Self::NUM_BLOCKS_OFF),
            root_dir_index: read_u16(buf, Self::ROOT_DIR_OFF),
            data_start: read_u16(buf, Self::DATA_START_OFF),
            data_blocks: read_u16(buf, Self::DATA_BLOCKS_OFF),
            fat_blocks: buf[Self::FAT_BLOCKS_OFF],
        }
    }

    /// Encodes into `buf`, zeroing the padding up to the end of the block.
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[Self::SIGNATURE_OFF..Self::SIGNATURE_OFF + 8].copy_from_slice(&self.signature);
        write_u16(buf, Self::NUM_BLOCKS_OFF, self.num_blocks);
        write_u16(buf, Self::ROOT_DIR_OFF, self.root_dir_index);
        write_u16(buf, Self::DATA_START_OFF, self.data_start);
        write_u16(buf, Self::DATA_BLOCKS_OFF, self.data_blocks);
        buf[Self::FAT_BLOCKS_OFF] = self.fat_blocks;
    }

    /// Checks the signature and that the recorded geometry is self-consistent
    /// and matches a device of `device_blocks` blocks.
    pub fn validate(&self, device_blocks: usize) -> Result<()> {
        if &self.signature != SIGNATURE {
            return Err(Error::InvalidMagic);
        }
        if self.num_blocks as usize != device_blocks {
            return Err(Error::BlockCountMismatch {
                recorded: self.num_blocks as usize,
                actual: device_blocks,
            });
        }
        if self.data_blocks == 0 || self.data_blocks == FAT_EOC {
            return Err(Error::InvalidSuperBlock("bad data block count"));
        }
        if (self.fat_blocks as usize) * FAT_ENTRIES_PER_BLOCK < self.data_blocks as usize {
            return Err(Error::InvalidSuperBlock("FAT region too small"));
        }
        if self.root_dir_index as usize != 1 + self.fat_blocks as usize {
            return Err(Error::InvalidSuperBlock("bad root directory index"));
        }
        if self.data_start as usize != self.root_dir_index as usize + ROOT_DIR_BLOCKS {
            return Err(Error::InvalidSuperBlock("bad data region index"));
        }
        if self.data_start as usize + self.data_blocks as usize != device_blocks {
            return Err(Error::InvalidSuperBlock("data region does not end at the last block"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; FILENAME_LEN],
    pub size: u32,
    pub first_block: u16, // FAT_EOC when the file owns no block
}

impl DirEntry {
    pub const NULL: Self = Self {
        name: [0; FILENAME_LEN],
        size: 0,
        first_block: FAT_EOC,
    };

    const SIZE_OFF: usize = FILENAME_LEN;
    const FIRST_BLOCK_OFF: usize = FILENAME_LEN + 4;

    pub fn new(name: &str) -> Result<Self> {
        let name = check_name(name)?;
        let mut arr = [0; FILENAME_LEN];
        arr[..name.len()].copy_from_slice(name);
        Ok(Self {
            name: arr,
            ..Self::NULL
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(FILENAME_LEN);
        &self.name[..end]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        !self.is_empty() && self.name_bytes() == name
    }

    /// Decodes one `DIR_ENTRY_SIZE` record. A record with an empty name is a free slot,
    /// whatever its other fields hold.
    pub fn decode(buf: &[u8]) -> Self {
        if buf[0] == 0 {
            return Self::NULL;
        }
        let mut name = [0; FILENAME_LEN];
        name.copy_from_slice(&buf[..FILENAME_LEN]);
        // The last byte is the terminator.
        name[FILENAME_LEN - 1] = 0;
        Self {
            name,
            size: read_u32(buf, Self::SIZE_OFF),
            first_block: read_u16(buf, Self::FIRST_BLOCK_OFF),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..DIR_ENTRY_SIZE].fill(0);
        buf[..FILENAME_LEN].copy_from_slice(&self.name);
        write_u32(buf, Self::SIZE_OFF, self.size);
        write_u16(buf, Self::FIRST_BLOCK_OFF, self.first_block);
    }
}

/// Validates a file name and returns its bytes.
pub fn check_name(name: &str) -> Result<&[u8]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_FILE_NAME_LEN || bytes.contains(&0) {
        return Err(Error::InvalidFileName);
    }
    Ok(bytes)
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn write_u16(buf: &mut [u8], off: usize, value: u16) {
    buf[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn write_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}
