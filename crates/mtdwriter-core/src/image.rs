//! Source image stream

use crate::error::ImageError;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A forward-only image source of known length
///
/// The length is fixed when the stream is created (the file size for
/// images opened from disk) and bounds how much will be read.
#[derive(Debug)]
pub struct ImageStream<R> {
    reader: R,
    len: u64,
    consumed: u64,
}

impl ImageStream<File> {
    /// Open an image file and take its size as the image length
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| ImageError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        log::debug!("Opened image {:?} ({} bytes)", path, len);

        Ok(Self::new(file, len))
    }
}

impl<R: Read> ImageStream<R> {
    /// Wrap a reader that will yield `len` bytes
    pub fn new(reader: R, len: u64) -> Self {
        Self {
            reader,
            len,
            consumed: 0,
        }
    }

    /// Declared image length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the declared image length is zero
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.len - self.consumed
    }

    /// Read the next piece of the image into `buf`
    ///
    /// Never reads past the declared length. `Ok(0)` means no more data,
    /// either because the declared length was reached or because the
    /// underlying reader ran dry early.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = std::cmp::min(buf.len() as u64, self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        let n = self.reader.read(&mut buf[..want])?;
        self.consumed += n as u64;
        Ok(n)
    }
}
