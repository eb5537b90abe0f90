//! Flash device traits
//!
//! [`FlashDevice`] models a raw MTD character device: a seekable byte
//! stream plus unlock and erase commands. All operations are blocking and
//! must not return before the underlying driver has completed them.

use crate::geometry::DeviceGeometry;
use crate::registry::MtdEntry;
use std::io::{self, SeekFrom};

/// A raw flash device with a file-like position
pub trait FlashDevice {
    /// Device size and erase block size
    fn geometry(&self) -> DeviceGeometry;

    /// Move the device position, returning the new absolute position
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Read from the current position
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write at the current position (assumes the region is erased)
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush written data so a following read observes it
    fn sync(&mut self) -> io::Result<()>;

    /// Clear write protection on `[start, start + len)`
    ///
    /// Unlocking an already unlocked region must succeed.
    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()>;

    /// Erase `[start, start + len)`, which must be erase block aligned
    fn erase(&mut self, start: u64, len: u64) -> io::Result<()>;
}

impl<D: FlashDevice + ?Sized> FlashDevice for &mut D {
    fn geometry(&self) -> DeviceGeometry {
        (**self).geometry()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        (**self).unlock(start, len)
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        (**self).erase(start, len)
    }
}

/// Opens the device node behind a registry entry
pub trait DeviceOpener {
    /// Device type produced by this opener
    type Device: FlashDevice;
    /// Error returned when the device cannot be opened or queried
    type Error: std::error::Error + 'static;

    /// Open the device for reading and writing and query its geometry
    fn open(&self, entry: &MtdEntry) -> Result<Self::Device, Self::Error>;
}
