//! Error types for mtdwriter-core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening the source image
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image file could not be opened
    #[error("Cannot open image file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The image file size could not be determined
    #[error("Cannot get image file size of {path:?}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by [`FlashWriter::write`](crate::FlashWriter::write)
///
/// The first group are precondition failures, reported before the device
/// is touched. The rest happen mid-operation and leave the device partially
/// written.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Device reported an erase block size of zero
    #[error("Device reports an invalid erase size ({erase_size})")]
    InvalidGeometry { erase_size: u64 },

    /// Offset lies past the end of the device
    #[error("devoffset ({offset}) is beyond the end of the device ({total_size})")]
    OffsetOutOfRange { offset: u64, total_size: u64 },

    /// Offset is not a multiple of the erase block size
    #[error("devoffset ({offset}) must be a multiple of erasesize ({erase_size})")]
    MisalignedOffset { offset: u64, erase_size: u64 },

    /// Image does not fit between the offset and the end of the device
    #[error("Image file ({image_len}) is too big for the device ({available})")]
    ImageTooLarge { image_len: u64, available: u64 },

    /// Chunk size is zero or larger than an erase block
    #[error("Chunk size ({chunk_size}) must be between 1 and erasesize ({erase_size})")]
    InvalidChunkSize { chunk_size: usize, erase_size: u64 },

    /// Seeking the device failed
    #[error("lseek in device to {offset:#x} failed: {source}")]
    SeekFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Clearing write protection failed
    #[error("Failed to unlock device range {start:#x}+{len:#x}: {source}")]
    UnlockFailed {
        start: u64,
        len: u64,
        #[source]
        source: io::Error,
    },

    /// Erasing a block failed
    #[error("Erasing device block at {offset:#x} failed: {source}")]
    EraseFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Writing a chunk failed or was short
    #[error("Error writing {len} bytes of image at {offset:#x}: {source}")]
    WriteFailed {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// Flushing written data failed
    #[error("Sync after write at {offset:#x} failed: {source}")]
    SyncFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Reading a chunk back for verification failed or was short
    #[error("Error reading {len} bytes at {offset:#x} for verification: {source}")]
    VerifyReadFailed {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// Read-back data differs from what was written
    #[error(
        "Post-write verification has failed at {offset:#x}: expected {expected:#04x}, found {found:#04x}"
    )]
    VerifyMismatch { offset: u64, expected: u8, found: u8 },
}

impl WriteError {
    /// Whether this error was raised before any device mutation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry { .. }
                | Self::OffsetOutOfRange { .. }
                | Self::MisalignedOffset { .. }
                | Self::ImageTooLarge { .. }
                | Self::InvalidChunkSize { .. }
        )
    }
}

/// Result type for write operations
pub type Result<T> = std::result::Result<T, WriteError>;
