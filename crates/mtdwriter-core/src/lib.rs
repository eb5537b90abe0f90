//! mtdwriter-core - Core library for writing images to MTD flash
//!
//! This crate contains the hardware-independent part of mtdwriter: the
//! erase/write/verify loop and the traits that let it run against a real
//! Linux MTD device or an in-memory emulator.
//!
//! # Overview
//!
//! A write proceeds in one pass over the image:
//!
//! 1. Validate the offset and image size against the [`DeviceGeometry`]
//! 2. Unlock the target region of the device
//! 3. For each chunk: erase any erase block the chunk reaches into that has
//!    not been erased yet, write the chunk, sync, read it back and compare
//!
//! Every failure is fatal. There is no retry and no rollback; re-running the
//! whole write is the recovery path.
//!
//! # Example
//!
//! ```ignore
//! use mtdwriter_core::{FlashWriter, ImageStream, NoProgress, WriterConfig};
//!
//! let mut image = ImageStream::open("openwrt.bin")?;
//! let writer = FlashWriter::new(WriterConfig::default());
//! let stats = writer.write(&mut image, &mut device, 0x50000, &mut NoProgress)?;
//! println!("{} bytes written", stats.bytes_written);
//! ```

#![warn(rust_2018_idioms)]

pub mod cursor;
pub mod device;
pub mod error;
pub mod geometry;
pub mod image;
pub mod registry;
pub mod system;
pub mod writer;

pub use cursor::WriteCursor;
pub use device::{DeviceOpener, FlashDevice};
pub use error::{ImageError, WriteError};
pub use geometry::DeviceGeometry;
pub use image::ImageStream;
pub use registry::{find_by_label, DeviceRegistry, MtdEntry, StaticRegistry};
pub use system::SystemController;
pub use writer::{
    FlashWriter, NoProgress, WriteProgress, WriteStats, WriterConfig, DEFAULT_CHUNK_SIZE,
};
