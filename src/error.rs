use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    #[error("device I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("cannot open volume {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("block {0} is out of the device range")]
    InvalidBlockId(usize),
    #[error("block buffer has {0} bytes, expected one full block")]
    BadBufferSize(usize),
    #[error("device block size is {0}, this format requires 4096")]
    InvalidBlockSize(usize),
    #[error("a volume is already mounted in this process")]
    AlreadyMounted,
    #[error("superblock signature does not match")]
    InvalidMagic,
    #[error("superblock records {recorded} blocks but the device has {actual}")]
    BlockCountMismatch { recorded: usize, actual: usize },
    #[error("corrupted superblock: {0}")]
    InvalidSuperBlock(&'static str),
    #[error("device of {0} blocks cannot hold a volume")]
    InvalidGeometry(usize),
    #[error("invalid file name")]
    InvalidFileName,
    #[error("file already exists")]
    AlreadyExists,
    #[error("file not found")]
    NotFound,
    #[error("root directory is full")]
    DirectoryFull,
    #[error("file is open")]
    FileBusy,
    #[error("bad file descriptor {0}")]
    InvalidDescriptor(usize),
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("offset {offset} is beyond the end of file ({size} bytes)")]
    OffsetOutOfRange { offset: usize, size: usize },
    #[error("no free data block left")]
    OutOfSpace,
    #[error("block chain is corrupted at FAT entry {0}")]
    ChainCorrupted(u16),
}

pub type Result<T> = core::result::Result<T, FsError>;
