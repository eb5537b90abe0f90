//! Erase/write/verify loop
//!
//! [`FlashWriter`] copies an image onto a flash device chunk by chunk. Each
//! erase block is erased exactly once, right before the first chunk that
//! reaches into it, and every chunk is read back and compared before the
//! next one is written.

use crate::cursor::WriteCursor;
use crate::device::FlashDevice;
use crate::error::{Result, WriteError};
use crate::image::ImageStream;
use log::{debug, info, warn};
use std::io::{self, Read, SeekFrom};

/// Default number of bytes written and verified per iteration
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Tunables for [`FlashWriter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterConfig {
    /// Bytes per write/verify round; must not exceed the erase block size
    ///
    /// `None` picks [`DEFAULT_CHUNK_SIZE`], capped at the erase block size.
    pub chunk_size: Option<usize>,
}

impl WriterConfig {
    /// Config with an explicit chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: Some(chunk_size),
        }
    }

    /// Chunk size used on a device with `erase_size` byte erase blocks
    pub fn chunk_size_for(&self, erase_size: u64) -> usize {
        match self.chunk_size {
            Some(chunk_size) => chunk_size,
            None => usize::try_from(erase_size)
                .map_or(DEFAULT_CHUNK_SIZE, |eb| eb.min(DEFAULT_CHUNK_SIZE)),
        }
    }
}

/// Statistics from a completed write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Bytes written and verified
    pub bytes_written: u64,
    /// Number of write/verify rounds
    pub chunks_written: usize,
    /// Number of erase blocks erased
    pub blocks_erased: usize,
    /// Final erase watermark (absolute device offset)
    pub erase_end: u64,
}

/// Callback for progress reporting during a write
pub trait WriteProgress {
    /// Called once the preconditions hold, with the image length
    fn starting(&mut self, image_len: u64);

    /// Called before the target range is unlocked
    fn unlocking(&mut self, start: u64, len: u64);

    /// Called before an erase block is erased
    fn erasing(&mut self, offset: u64);

    /// Called before a chunk is written
    fn writing(&mut self, offset: u64, len: usize);

    /// Called before written data is flushed
    fn syncing(&mut self);

    /// Called before a chunk is read back
    fn verifying(&mut self, offset: u64, len: usize);

    /// Called after a chunk verified, with the running byte count
    fn chunk_done(&mut self, bytes_written: u64);

    /// Called once the final sync has completed
    fn complete(&mut self, stats: &WriteStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl WriteProgress for NoProgress {
    fn starting(&mut self, _image_len: u64) {}
    fn unlocking(&mut self, _start: u64, _len: u64) {}
    fn erasing(&mut self, _offset: u64) {}
    fn writing(&mut self, _offset: u64, _len: usize) {}
    fn syncing(&mut self) {}
    fn verifying(&mut self, _offset: u64, _len: usize) {}
    fn chunk_done(&mut self, _bytes_written: u64) {}
    fn complete(&mut self, _stats: &WriteStats) {}
}

/// Writes an image to a flash device with erase-on-demand and read-back
/// verification
#[derive(Debug, Clone, Default)]
pub struct FlashWriter {
    config: WriterConfig,
}

impl FlashWriter {
    /// Create a writer with the given configuration
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// The writer configuration
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Validate a write without touching the device
    ///
    /// Checks the geometry bounds and that the chunk size fits inside an
    /// erase block.
    pub fn check<D: FlashDevice + ?Sized>(
        &self,
        device: &D,
        offset: u64,
        image_len: u64,
    ) -> Result<()> {
        let geometry = device.geometry();
        geometry.check_write(offset, image_len)?;

        let chunk_size = self.config.chunk_size_for(geometry.erase_size);
        if chunk_size == 0 || chunk_size as u64 > geometry.erase_size {
            return Err(WriteError::InvalidChunkSize {
                chunk_size,
                erase_size: geometry.erase_size,
            });
        }

        Ok(())
    }

    /// Write `image` to `device` starting at `offset`
    ///
    /// # Arguments
    /// * `image` - Image source, consumed until its declared length or EOF
    /// * `device` - Target device
    /// * `offset` - Device offset, must be erase block aligned
    /// * `progress` - Progress callback (use `NoProgress` if not needed)
    ///
    /// # Errors
    /// Precondition failures are returned before any device call. Any later
    /// failure aborts immediately and leaves the device partially written;
    /// nothing is retried.
    pub fn write<R, D, P>(
        &self,
        image: &mut ImageStream<R>,
        device: &mut D,
        offset: u64,
        progress: &mut P,
    ) -> Result<WriteStats>
    where
        R: Read,
        D: FlashDevice + ?Sized,
        P: WriteProgress,
    {
        self.check(device, offset, image.len())?;

        let geometry = device.geometry();
        let erase_size = geometry.erase_size;
        progress.starting(image.len());

        device
            .seek(SeekFrom::Start(offset))
            .map_err(|source| WriteError::SeekFailed { offset, source })?;

        device.sync().map_err(|source| WriteError::SyncFailed { offset, source })?;

        let unlock_len = geometry.available_from(offset);
        info!("Unlocking device range {:#x}+{:#x}", offset, unlock_len);
        progress.unlocking(offset, unlock_len);
        device
            .unlock(offset, unlock_len)
            .map_err(|source| WriteError::UnlockFailed {
                start: offset,
                len: unlock_len,
                source,
            })?;

        let mut cursor = WriteCursor::new(offset);
        let mut stats = WriteStats::default();
        let chunk_size = self.config.chunk_size_for(erase_size);
        let mut write_buf = vec![0u8; chunk_size];
        let mut test_buf = vec![0u8; chunk_size];

        info!(
            "Writing {} bytes at {:#x} in {} byte chunks",
            image.len(),
            offset,
            chunk_size
        );

        while image.remaining() > 0 {
            let len = match image.read_chunk(&mut write_buf) {
                Ok(0) => {
                    warn!(
                        "Image ended after {} of {} bytes",
                        cursor.bytes_written(),
                        image.len()
                    );
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    // Read errors end the image the same way EOF does
                    warn!(
                        "Reading image failed after {} of {} bytes, treating as end of image: {}",
                        cursor.bytes_written(),
                        image.len(),
                        e
                    );
                    break;
                }
            };
            let chunk_start = cursor.write_pos();
            cursor.advance(len as u64);

            while let Some(block) = cursor.pending_erase() {
                debug!("Erasing block at {:#x}", block);
                progress.erasing(block);
                device
                    .erase(block, erase_size)
                    .map_err(|source| WriteError::EraseFailed {
                        offset: block,
                        source,
                    })?;
                cursor.mark_erased(erase_size);
                stats.blocks_erased += 1;
            }

            let data = &write_buf[..len];

            debug!("Writing {} bytes at {:#x}", len, chunk_start);
            progress.writing(chunk_start, len);
            write_chunk(device, chunk_start, data)?;

            progress.syncing();
            device.sync().map_err(|source| WriteError::SyncFailed {
                offset: chunk_start,
                source,
            })?;

            progress.verifying(chunk_start, len);
            verify_chunk(device, chunk_start, data, &mut test_buf[..len])?;

            stats.chunks_written += 1;
            stats.bytes_written = cursor.bytes_written();
            progress.chunk_done(stats.bytes_written);
        }

        progress.syncing();
        device.sync().map_err(|source| WriteError::SyncFailed {
            offset: cursor.write_pos(),
            source,
        })?;

        stats.erase_end = cursor.erase_pos();

        info!(
            "Wrote {} bytes ({} chunks, {} blocks erased)",
            stats.bytes_written, stats.chunks_written, stats.blocks_erased
        );
        progress.complete(&stats);

        Ok(stats)
    }
}

/// Write one chunk at the current device position; a short write fails
fn write_chunk<D: FlashDevice + ?Sized>(device: &mut D, offset: u64, data: &[u8]) -> Result<()> {
    let written = device
        .write(data)
        .map_err(|source| WriteError::WriteFailed {
            offset,
            len: data.len(),
            source,
        })?;

    if written != data.len() {
        return Err(WriteError::WriteFailed {
            offset,
            len: data.len(),
            source: io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, data.len()),
            ),
        });
    }

    Ok(())
}

/// Seek back over the chunk just written, read it and compare
///
/// Leaves the device positioned right after the chunk.
fn verify_chunk<D: FlashDevice + ?Sized>(
    device: &mut D,
    offset: u64,
    expected: &[u8],
    buf: &mut [u8],
) -> Result<()> {
    let len = expected.len();

    device
        .seek(SeekFrom::Current(-(len as i64)))
        .map_err(|source| WriteError::SeekFailed { offset, source })?;

    let read = device
        .read(buf)
        .map_err(|source| WriteError::VerifyReadFailed {
            offset,
            len,
            source,
        })?;

    if read != len {
        return Err(WriteError::VerifyReadFailed {
            offset,
            len,
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read: {} of {} bytes", read, len),
            ),
        });
    }

    if let Some(i) = expected.iter().zip(buf.iter()).position(|(a, b)| a != b) {
        return Err(WriteError::VerifyMismatch {
            offset: offset + i as u64,
            expected: expected[i],
            found: buf[i],
        });
    }

    Ok(())
}
