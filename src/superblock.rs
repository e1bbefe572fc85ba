use alloc::vec;

use crate::config::*;
use crate::{error::FsError, BlockDevice, Result, SuperBlock};

pub fn read_superblock<D: BlockDevice + ?Sized>(device: &D) -> Result<SuperBlock> {
    if device.block_size() != BLOCK_SIZE {
        return Err(FsError::InvalidBlockSize(device.block_size()));
    }
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    let superblock = SuperBlock::decode(&buf);
    superblock.validate(device.num_blocks())?;
    Ok(superblock)
}

pub fn write_superblock<D: BlockDevice + ?Sized>(device: &D, superblock: &SuperBlock) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    superblock.encode(&mut buf);
    device.write_block(SUPERBLOCK_ID, &buf)
}
