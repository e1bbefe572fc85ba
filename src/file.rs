//! Byte-level reads and writes on top of FAT chains.
//! Requests rarely line up with blocks, so every stride goes through one block-sized
//! scratch buffer: read the block, patch the bytes, write it back.

use alloc::vec;

use log::{debug, warn};

use crate::config::*;
use crate::error::FsError;
use crate::fat::Fat;
use crate::{BlockDevice, DirEntry, Result, SuperBlock};

/// Reads from a file at `offset` into `buffer`.
/// Stops at the end of the file, so the count may be short.
/// Returns the number of bytes read.
pub fn fread<D: BlockDevice + ?Sized>(
    device: &D,
    superblock: &SuperBlock,
    fat: &Fat,
    entry: &DirEntry,
    offset: usize,
    buffer: &mut [u8],
) -> Result<usize> {
    let size = entry.size as usize;
    if offset >= size || buffer.is_empty() {
        return Ok(0);
    }
    let count = buffer.len().min(size - offset);

    let mut block = match fat.resolve(entry.first_block, offset / BLOCK_SIZE) {
        Ok(block) => block,
        Err(e) => {
            warn!("read of {}: chain ends before offset {} ({})", entry.name(), offset, e);
            return Ok(0);
        }
    };

    let mut bytes_read = 0;
    let mut current_offset = offset;
    let mut block_buf = vec![0u8; BLOCK_SIZE];

    loop {
        let start_offset = current_offset % BLOCK_SIZE;
        let bytes_to_read = (BLOCK_SIZE - start_offset).min(count - bytes_read);

        device.read_block(superblock.data_start as usize + block as usize, &mut block_buf)?;
        buffer[bytes_read..bytes_read + bytes_to_read]
            .copy_from_slice(&block_buf[start_offset..start_offset + bytes_to_read]);

        bytes_read += bytes_to_read;
        current_offset += bytes_to_read;
        if bytes_read == count {
            break;
        }

        block = match fat.next(block) {
            Ok(Some(next)) => next,
            Ok(None) | Err(_) => {
                warn!(
                    "read of {}: chain ends at {} bytes but size is {}",
                    entry.name(),
                    current_offset,
                    size
                );
                break;
            }
        };
    }

    Ok(bytes_read)
}

/// Writes `buffer` into a file at `offset`, growing the chain as needed.
/// `offset` must not be beyond the file size.
///
/// When the volume fills up partway, the bytes that fit are kept and their count is
/// returned. When not even the first byte fits, `OutOfSpace` is returned.
/// On a device error the size covers what was committed, blocks allocated for the
/// failed stride are released, and the error is returned.
pub fn fwrite<D: BlockDevice + ?Sized>(
    device: &D,
    superblock: &SuperBlock,
    fat: &mut Fat,
    entry: &mut DirEntry,
    offset: usize,
    buffer: &[u8],
) -> Result<usize> {
    if buffer.is_empty() {
        return Ok(0);
    }
    let size = entry.size as usize;
    if offset > size {
        return Err(FsError::OffsetOutOfRange { offset, size });
    }
    // A full volume is far below 4 GiB, so the size always fits its 32-bit field.
    let count = buffer.len();

    let mut block = if entry.first_block == FAT_EOC {
        let block = fat.allocate_one()?;
        entry.first_block = block;
        block
    } else if offset > 0 && offset == size && offset % BLOCK_SIZE == 0 {
        // The cursor sits right after a full last block.
        let tail = fat.resolve(entry.first_block, offset / BLOCK_SIZE - 1)?;
        fat.extend(tail)?
    } else {
        fat.resolve(entry.first_block, offset / BLOCK_SIZE)?
    };

    let mut bytes_written = 0;
    let mut current_offset = offset;
    let mut block_buf = vec![0u8; BLOCK_SIZE];

    let outcome = loop {
        let start_offset = current_offset % BLOCK_SIZE;
        let bytes_to_write = (BLOCK_SIZE - start_offset).min(count - bytes_written);
        let block_id = superblock.data_start as usize + block as usize;

        // A whole-block stride overwrites everything, no need to read first.
        if bytes_to_write < BLOCK_SIZE {
            if let Err(e) = device.read_block(block_id, &mut block_buf) {
                break Err(e);
            }
        }
        block_buf[start_offset..start_offset + bytes_to_write]
            .copy_from_slice(&buffer[bytes_written..bytes_written + bytes_to_write]);
        if let Err(e) = device.write_block(block_id, &block_buf) {
            break Err(e);
        }

        bytes_written += bytes_to_write;
        current_offset += bytes_to_write;
        if bytes_written == count {
            break Ok(());
        }

        block = match fat.next(block) {
            Ok(Some(next)) => next,
            Ok(None) => match fat.extend(block) {
                Ok(next) => next,
                Err(FsError::OutOfSpace) => {
                    debug!(
                        "write to {}: volume full, {} of {} bytes written",
                        entry.name(),
                        bytes_written,
                        count
                    );
                    break Ok(());
                }
                Err(e) => break Err(e),
            },
            Err(e) => break Err(e),
        };
    };

    if current_offset > size {
        entry.size = current_offset as u32;
    }

    if let Err(e) = outcome {
        // Only blocks holding committed bytes stay in the chain.
        let keep = (entry.size as usize).div_ceil(BLOCK_SIZE);
        entry.first_block = fat.truncate(entry.first_block, keep)?;
        return Err(e);
    }

    Ok(bytes_written)
}
