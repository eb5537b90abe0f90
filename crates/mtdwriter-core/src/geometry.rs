//! Device geometry and write bounds

use crate::error::{Result, WriteError};

/// Size and erase granularity of a flash device
///
/// Read once after the device is opened and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    /// Total device size in bytes
    pub total_size: u64,
    /// Erase block size in bytes
    pub erase_size: u64,
}

impl DeviceGeometry {
    /// Create a geometry from total size and erase block size
    pub fn new(total_size: u64, erase_size: u64) -> Self {
        Self {
            total_size,
            erase_size,
        }
    }

    /// Number of whole erase blocks on the device
    pub fn block_count(&self) -> u64 {
        if self.erase_size == 0 {
            return 0;
        }
        self.total_size / self.erase_size
    }

    /// Whether `offset` falls on an erase block boundary
    pub fn is_aligned(&self, offset: u64) -> bool {
        self.erase_size != 0 && offset % self.erase_size == 0
    }

    /// Bytes available between `offset` and the end of the device
    pub fn available_from(&self, offset: u64) -> u64 {
        self.total_size.saturating_sub(offset)
    }

    /// Check that an image of `image_len` bytes can be written at `offset`
    ///
    /// Checks, in order: non-zero erase size, offset within the device,
    /// erase block alignment, and that the image fits.
    pub fn check_write(&self, offset: u64, image_len: u64) -> Result<()> {
        if self.erase_size == 0 {
            return Err(WriteError::InvalidGeometry {
                erase_size: self.erase_size,
            });
        }

        if offset > self.total_size {
            return Err(WriteError::OffsetOutOfRange {
                offset,
                total_size: self.total_size,
            });
        }

        if !self.is_aligned(offset) {
            return Err(WriteError::MisalignedOffset {
                offset,
                erase_size: self.erase_size,
            });
        }

        let available = self.available_from(offset);
        if image_len > available {
            return Err(WriteError::ImageTooLarge {
                image_len,
                available,
            });
        }

        Ok(())
    }
}
