//! Common utilities for tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fatlite::{BlockDevice, Error, FileSystem, BLOCK_SIZE};
use log::{Level, LevelFilter, Log, Metadata, Record};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

struct TestLogger;

impl Log for TestLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        let color = match record.level() {
            Level::Error | Level::Warn => ORANGE,
            _ => RESET,
        };
        println!("{}[test] {:5}{} {}", color, record.level(), RESET, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: TestLogger = TestLogger;

/// Only one volume can be mounted per process, and tests run on parallel threads.
static SERIAL: Mutex<()> = Mutex::new(());

/// Installs the logger and serializes the calling test against every other test
/// of the same binary. Keep the guard alive for the whole test.
pub fn setup() -> MutexGuard<'static, ()> {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk of `num_blocks` blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }

    /// Copy of one raw block.
    pub fn block(&self, block_id: usize) -> Vec<u8> {
        let data = self.inner.lock().unwrap();
        data[block_id * BLOCK_SIZE..(block_id + 1) * BLOCK_SIZE].to_vec()
    }

    pub fn set_block(&self, block_id: usize, buf: &[u8]) {
        let mut data = self.inner.lock().unwrap();
        data[block_id * BLOCK_SIZE..(block_id + 1) * BLOCK_SIZE].copy_from_slice(buf);
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::BadBufferSize(buf.len()));
        }
        let start = block_id * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::BadBufferSize(buf.len()));
        }
        let start = block_id * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// A RamDisk that starts failing writes once a budget of successful writes is spent.
pub struct FaultyDisk {
    disk: RamDisk,
    writes_left: AtomicUsize,
}

impl FaultyDisk {
    pub fn new(num_blocks: usize) -> Self {
        FaultyDisk {
            disk: RamDisk::new(num_blocks),
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn fail_after_writes(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }
}

impl BlockDevice for FaultyDisk {
    fn num_blocks(&self) -> usize {
        self.disk.num_blocks()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.disk.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(std::io::Error::other("injected write failure").into());
        }
        if left != usize::MAX {
            self.writes_left.store(left - 1, Ordering::SeqCst);
        }
        self.disk.write_block(block_id, buf)
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A RamDisk that reports 512-byte sectors.
pub struct SectorDisk {
    disk: RamDisk,
}

impl SectorDisk {
    pub fn new(num_blocks: usize) -> Self {
        SectorDisk { disk: RamDisk::new(num_blocks) }
    }
}

impl BlockDevice for SectorDisk {
    fn num_blocks(&self) -> usize {
        self.disk.num_blocks()
    }

    fn block_size(&self) -> usize {
        512
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.disk.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        self.disk.write_block(block_id, buf)
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Formats a fresh RamDisk and mounts it.
pub fn fresh(num_blocks: usize) -> (Arc<RamDisk>, FileSystem<RamDisk>) {
    let disk = Arc::new(RamDisk::new(num_blocks));
    FileSystem::format(&*disk).unwrap();
    let fs = FileSystem::mount(Arc::clone(&disk)).unwrap();
    (disk, fs)
}

/// Deterministic, non-repeating-per-block test data.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32 * 7 + (i / BLOCK_SIZE) as u32) as u8)
        .collect()
}

/// Blocks of a file's chain, in order.
pub fn chain_of<D: BlockDevice>(fs: &FileSystem<D>, first: u16) -> Vec<u16> {
    let mut blocks = Vec::new();
    if first == fatlite::FAT_EOC {
        return blocks;
    }
    blocks.push(first);
    let mut block = first;
    while let Some(next) = fs.fat().next(block).unwrap() {
        assert!(!blocks.contains(&next), "chain revisits block {}", next);
        blocks.push(next);
        block = next;
    }
    blocks
}

/// Every file's chain length matches its size.
pub fn check_chains<D: BlockDevice>(fs: &FileSystem<D>) {
    for entry in fs.ls() {
        let blocks = chain_of(fs, entry.first_block);
        assert_eq!(
            blocks.len(),
            (entry.size as usize).div_ceil(BLOCK_SIZE),
            "chain of {} does not match its size {}",
            entry.name(),
            entry.size
        );
        assert!(blocks.len() < fs.fat().len());
    }
}
