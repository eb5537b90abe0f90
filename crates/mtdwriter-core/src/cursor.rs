//! Write position and erase watermark tracking

/// Tracks how far the image has been written and how far the device has
/// been erased during a single write
///
/// `erase_pos` starts at the (erase-block aligned) write offset and only
/// moves forward by whole erase blocks. Everything in `[start, erase_pos)`
/// has been erased in this run. Once a chunk has been accounted for with
/// [`advance`](Self::advance), [`pending_erase`](Self::pending_erase)
/// yields each block that must be erased before the chunk can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCursor {
    start: u64,
    write_pos: u64,
    erase_pos: u64,
}

impl WriteCursor {
    /// Create a cursor positioned at `offset`
    pub fn new(offset: u64) -> Self {
        Self {
            start: offset,
            write_pos: offset,
            erase_pos: offset,
        }
    }

    /// Offset the write started at
    pub fn start(&self) -> u64 {
        self.start
    }

    /// End of the data accounted for so far
    pub fn write_pos(&self) -> u64 {
        self.write_pos
    }

    /// End of the erased region (the watermark)
    pub fn erase_pos(&self) -> u64 {
        self.erase_pos
    }

    /// Bytes accounted for since the start of the write
    pub fn bytes_written(&self) -> u64 {
        self.write_pos - self.start
    }

    /// Account for `len` more bytes about to be written
    pub fn advance(&mut self, len: u64) {
        self.write_pos += len;
    }

    /// Next erase block that must be erased before writing up to `write_pos`
    ///
    /// Returns `None` once the watermark has caught up.
    pub fn pending_erase(&self) -> Option<u64> {
        if self.write_pos > self.erase_pos {
            Some(self.erase_pos)
        } else {
            None
        }
    }

    /// Move the watermark past the block that was just erased
    pub fn mark_erased(&mut self, erase_size: u64) {
        self.erase_pos += erase_size;
    }
}
