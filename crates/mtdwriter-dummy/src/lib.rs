//! mtdwriter-dummy - In-memory MTD emulator for testing
//!
//! This crate emulates an MTD device in memory so the write path can be
//! exercised without real hardware. The emulated chip behaves like NOR
//! flash: erased bytes read as `0xFF`, programming can only clear bits, and
//! erase works on whole erase blocks.
//!
//! Every device operation is appended to an event log shared by all handles
//! of the same chip, so tests can check call counts and ordering after the
//! handle has been closed.

use mtdwriter_core::{DeviceGeometry, DeviceOpener, FlashDevice, MtdEntry, SystemController};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::rc::Rc;
use thiserror::Error;

/// Errors from the dummy opener
#[derive(Debug, Error)]
pub enum DummyError {
    /// No emulated chip registered for this index
    #[error("No dummy MTD device with index {0}")]
    NoDevice(u32),
}

/// One recorded device or system operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Unlock of a range
    Unlock { start: u64, len: u64 },
    /// Erase of a range
    Erase { start: u64, len: u64 },
    /// Write at an offset
    Write { offset: u64, len: usize },
    /// Sync request
    Sync,
    /// Read at an offset
    Read { offset: u64, len: usize },
    /// Device handle closed
    Close,
    /// Reboot requested
    Reboot,
}

/// Configuration for the dummy chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Chip size in bytes
    pub total_size: u64,
    /// Erase block size in bytes
    pub erase_size: u64,
    /// Whether all blocks start write protected
    pub locked: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            total_size: 8 * 1024 * 1024,
            erase_size: 64 * 1024,
            locked: false,
        }
    }
}

/// Failures to inject into the emulated chip
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Fail every unlock request
    pub fail_unlock: bool,
    /// Fail the erase of the block starting at this offset
    pub fail_erase_at: Option<u64>,
    /// Accept only part of the write that covers this offset
    pub short_write_at: Option<u64>,
    /// Flip a bit of this byte whenever it is read
    pub corrupt_read_at: Option<u64>,
    /// Stop any read that covers this offset right before it
    pub short_read_at: Option<u64>,
    /// Fail any seek that would land on this position
    pub fail_seek_to: Option<u64>,
    /// Fail reboot requests
    pub fail_reboot: bool,
}

#[derive(Debug)]
struct ChipState {
    config: DummyConfig,
    data: Vec<u8>,
    locked: Vec<bool>,
    faults: Faults,
    events: Vec<Event>,
}

/// An emulated flash chip
///
/// Cloning yields another reference to the same chip.
#[derive(Debug, Clone)]
pub struct DummyFlash {
    state: Rc<RefCell<ChipState>>,
}

impl DummyFlash {
    /// Create an erased chip with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let blocks = if config.erase_size == 0 {
            0
        } else {
            config.total_size.div_ceil(config.erase_size) as usize
        };
        let state = ChipState {
            data: vec![0xFF; config.total_size as usize],
            locked: vec![config.locked; blocks],
            faults: Faults::default(),
            events: Vec::new(),
            config,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Create a chip of `blocks` erase blocks of `erase_size` bytes
    pub fn with_blocks(blocks: u64, erase_size: u64) -> Self {
        Self::new(DummyConfig {
            total_size: blocks * erase_size,
            erase_size,
            locked: false,
        })
    }

    /// Fill the chip with `byte`, as if it held an older image
    pub fn fill(&self, byte: u8) {
        self.state.borrow_mut().data.fill(byte);
    }

    /// Replace the injected faults
    pub fn set_faults(&self, faults: Faults) {
        self.state.borrow_mut().faults = faults;
    }

    /// Open a handle positioned at offset 0
    pub fn open(&self) -> DummyMtd {
        DummyMtd {
            flash: self.clone(),
            pos: 0,
        }
    }

    /// A system controller that logs into this chip's event log
    pub fn system(&self) -> RecordingSystem {
        RecordingSystem {
            flash: self.clone(),
        }
    }

    /// Geometry of the chip
    pub fn geometry(&self) -> DeviceGeometry {
        let state = self.state.borrow();
        DeviceGeometry::new(state.config.total_size, state.config.erase_size)
    }

    /// Copy of the chip contents in `[start, start + len)`
    pub fn contents(&self, start: u64, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        let start = start as usize;
        state.data[start..start + len].to_vec()
    }

    /// Whether the block containing `offset` is write protected
    pub fn is_locked(&self, offset: u64) -> bool {
        let state = self.state.borrow();
        state.locked[(offset / state.config.erase_size) as usize]
    }

    /// All recorded events in order
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Start offsets of all erases, in order
    pub fn erased_blocks(&self) -> Vec<u64> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Erase { start, .. } => Some(*start),
                _ => None,
            })
            .collect()
    }

    /// Number of erase calls
    pub fn erase_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Erase { .. }))
    }

    /// Number of write calls
    pub fn write_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Write { .. }))
    }

    /// Number of read calls
    pub fn read_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Read { .. }))
    }

    /// Number of unlock calls
    pub fn unlock_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Unlock { .. }))
    }

    /// Number of reboot requests
    pub fn reboot_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Reboot))
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }
}

impl ChipState {
    fn block_range(&self, start: u64, len: u64) -> std::ops::Range<usize> {
        let eb = self.config.erase_size;
        let first = (start / eb) as usize;
        let last = (start + len).div_ceil(eb) as usize;
        first..last.min(self.locked.len())
    }

    fn check_unlocked(&self, start: u64, len: u64) -> io::Result<()> {
        if self.locked[self.block_range(start, len)].iter().any(|&l| l) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("range {:#x}+{:#x} is locked", start, len),
            ));
        }
        Ok(())
    }
}

/// An open handle on a [`DummyFlash`]
///
/// Dropping the handle records [`Event::Close`].
#[derive(Debug)]
pub struct DummyMtd {
    flash: DummyFlash,
    pos: u64,
}

impl FlashDevice for DummyMtd {
    fn geometry(&self) -> DeviceGeometry {
        self.flash.geometry()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let total = self.flash.geometry().total_size as i128;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => total + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        let target = target as u64;
        if self.flash.state.borrow().faults.fail_seek_to == Some(target) {
            return Err(io::Error::other(format!("seek to {:#x} failed", target)));
        }
        self.pos = target;
        Ok(self.pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let offset = self.pos;
        self.flash.record(Event::Read {
            offset,
            len: buf.len(),
        });

        let state = self.flash.state.borrow();
        let total = state.config.total_size;
        if offset >= total {
            return Ok(0);
        }
        let mut n = std::cmp::min(buf.len() as u64, total - offset) as usize;
        if let Some(short) = state.faults.short_read_at {
            if short >= offset && short < offset + n as u64 {
                n = (short - offset) as usize;
            }
        }
        let start = offset as usize;
        buf[..n].copy_from_slice(&state.data[start..start + n]);

        if let Some(bad) = state.faults.corrupt_read_at {
            if bad >= offset && bad < offset + n as u64 {
                buf[(bad - offset) as usize] ^= 0x01;
            }
        }
        drop(state);

        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let offset = self.pos;
        self.flash.record(Event::Write {
            offset,
            len: data.len(),
        });

        let mut state = self.flash.state.borrow_mut();
        let total = state.config.total_size;
        if offset + data.len() as u64 > total {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("write of {} bytes at {:#x} past end of device", data.len(), offset),
            ));
        }
        state.check_unlocked(offset, data.len() as u64)?;

        let mut n = data.len();
        if let Some(short) = state.faults.short_write_at {
            if short >= offset && short < offset + n as u64 {
                n = (short - offset) as usize;
            }
        }

        // Programming can only clear bits
        let start = offset as usize;
        for (dst, src) in state.data[start..start + n].iter_mut().zip(&data[..n]) {
            *dst &= *src;
        }
        drop(state);

        self.pos += n as u64;
        Ok(n)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flash.record(Event::Sync);
        Ok(())
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        self.flash.record(Event::Unlock { start, len });

        let mut state = self.flash.state.borrow_mut();
        if state.faults.fail_unlock {
            return Err(io::Error::other("unlock rejected"));
        }
        if start + len > state.config.total_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unlock range past end of device",
            ));
        }
        let range = state.block_range(start, len);
        for locked in &mut state.locked[range] {
            *locked = false;
        }
        Ok(())
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        self.flash.record(Event::Erase { start, len });

        let mut state = self.flash.state.borrow_mut();
        let eb = state.config.erase_size;
        if start % eb != 0 || len % eb != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("erase {:#x}+{:#x} is not block aligned", start, len),
            ));
        }
        if start + len > state.config.total_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "erase range past end of device",
            ));
        }
        if state.faults.fail_erase_at == Some(start) {
            return Err(io::Error::other("erase failed"));
        }
        state.check_unlocked(start, len)?;

        let (s, e) = (start as usize, (start + len) as usize);
        state.data[s..e].fill(0xFF);
        Ok(())
    }
}

impl Drop for DummyMtd {
    fn drop(&mut self) {
        self.flash.record(Event::Close);
    }
}

/// Opens registered dummy chips by registry index
#[derive(Debug, Clone, Default)]
pub struct DummyOpener {
    devices: BTreeMap<u32, DummyFlash>,
}

impl DummyOpener {
    /// Create an opener with no devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `flash` as device `index`
    pub fn with_device(mut self, index: u32, flash: DummyFlash) -> Self {
        self.devices.insert(index, flash);
        self
    }
}

impl DeviceOpener for DummyOpener {
    type Device = DummyMtd;
    type Error = DummyError;

    fn open(&self, entry: &MtdEntry) -> Result<DummyMtd, DummyError> {
        let flash = self
            .devices
            .get(&entry.index)
            .ok_or(DummyError::NoDevice(entry.index))?;
        log::debug!("Opened dummy mtd{} ({:?})", entry.index, flash.geometry());
        Ok(flash.open())
    }
}

/// System controller that records reboot requests instead of rebooting
#[derive(Debug, Clone)]
pub struct RecordingSystem {
    flash: DummyFlash,
}

impl SystemController for RecordingSystem {
    fn reboot(&mut self) -> io::Result<()> {
        self.flash.record(Event::Reboot);
        if self.flash.state.borrow().faults.fail_reboot {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "reboot refused"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtdwriter_core::{
        FlashWriter, ImageStream, NoProgress, WriteError, WriteStats, WriterConfig,
    };
    use std::io::Cursor;

    const EB: u64 = 4096;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn image(data: &[u8]) -> ImageStream<Cursor<Vec<u8>>> {
        ImageStream::new(Cursor::new(data.to_vec()), data.len() as u64)
    }

    fn writer() -> FlashWriter {
        FlashWriter::new(WriterConfig::with_chunk_size(1024))
    }

    #[test]
    fn test_program_only_clears_bits() {
        let flash = DummyFlash::with_blocks(4, EB);
        let mut dev = flash.open();
        dev.write(&[0xF0, 0x0F]).unwrap();
        dev.seek(SeekFrom::Start(0)).unwrap();
        dev.write(&[0x3C, 0x3C]).unwrap();
        assert_eq!(flash.contents(0, 2), vec![0x30, 0x0C]);

        dev.erase(0, EB).unwrap();
        assert_eq!(flash.contents(0, 2), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_erase_rejects_misaligned_range() {
        let flash = DummyFlash::with_blocks(4, EB);
        let mut dev = flash.open();
        assert!(dev.erase(EB / 2, EB).is_err());
        assert!(dev.erase(0, EB + 1).is_err());
    }

    #[test]
    fn test_locked_chip_rejects_erase_until_unlocked() {
        let flash = DummyFlash::new(DummyConfig {
            total_size: 4 * EB,
            erase_size: EB,
            locked: true,
        });
        let mut dev = flash.open();
        let err = dev.erase(0, EB).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        dev.unlock(0, 4 * EB).unwrap();
        dev.erase(0, EB).unwrap();
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let flash = DummyFlash::new(DummyConfig {
            total_size: 4 * EB,
            erase_size: EB,
            locked: true,
        });
        let mut dev = flash.open();
        dev.unlock(EB, 3 * EB).unwrap();
        dev.unlock(EB, 3 * EB).unwrap();
        assert!(flash.is_locked(0));
        assert!(!flash.is_locked(EB));
        assert!(!flash.is_locked(3 * EB));
        assert_eq!(flash.unlock_count(), 2);
    }

    #[test]
    fn test_close_recorded_on_drop() {
        let flash = DummyFlash::with_blocks(1, EB);
        drop(flash.open());
        assert_eq!(flash.events(), vec![Event::Close]);
    }

    #[test]
    fn test_opener_unknown_index() {
        let opener = DummyOpener::new().with_device(0, DummyFlash::with_blocks(1, EB));
        let err = opener.open(&MtdEntry::new(3, EB, EB, "x")).unwrap_err();
        assert!(matches!(err, DummyError::NoDevice(3)));
    }

    #[test]
    fn test_three_blocks_at_offset_zero() {
        let flash = DummyFlash::with_blocks(10, EB);
        let data = pattern(3 * EB as usize);
        let mut dev = flash.open();
        // One chunk per erase block
        let writer = FlashWriter::new(WriterConfig::with_chunk_size(EB as usize));

        let stats = writer
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap();

        assert_eq!(flash.erase_count(), 3);
        assert_eq!(flash.write_count(), 3);
        assert_eq!(flash.read_count(), 3);
        assert_eq!(flash.erased_blocks(), vec![0, EB, 2 * EB]);
        assert_eq!(flash.contents(0, data.len()), data);
        assert_eq!(stats.bytes_written, 3 * EB);
        assert_eq!(stats.blocks_erased, 3);
        assert_eq!(stats.chunks_written, 3);
        assert_eq!(stats.erase_end, 3 * EB);
    }

    #[test]
    fn test_small_chunks_erase_each_block_once() {
        let flash = DummyFlash::with_blocks(10, EB);
        flash.fill(0x00);
        let data = pattern(3 * EB as usize);
        let mut dev = flash.open();

        writer()
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap();

        assert_eq!(flash.erased_blocks(), vec![0, EB, 2 * EB]);
        assert_eq!(flash.write_count(), 12);
        assert_eq!(flash.contents(0, data.len()), data);
        // Untouched block keeps its old contents
        assert_eq!(flash.contents(3 * EB, 16), vec![0x00; 16]);
    }

    #[test]
    fn test_erase_precedes_every_write_into_block() {
        let flash = DummyFlash::with_blocks(10, EB);
        let data = pattern(2 * EB as usize + 300);
        let mut dev = flash.open();

        writer()
            .write(&mut image(&data), &mut dev, 4 * EB, &mut NoProgress)
            .unwrap();

        let mut erased: Vec<u64> = Vec::new();
        for event in flash.events() {
            match event {
                Event::Erase { start, len } => {
                    assert_eq!(len, EB);
                    assert!(!erased.contains(&start), "block {:#x} erased twice", start);
                    erased.push(start);
                }
                Event::Write { offset, len } => {
                    let first = offset / EB * EB;
                    let last = (offset + len as u64 - 1) / EB * EB;
                    assert!(erased.contains(&first));
                    assert!(erased.contains(&last));
                }
                _ => {}
            }
        }
        assert_eq!(erased, vec![4 * EB, 5 * EB, 6 * EB]);
    }

    #[test]
    fn test_unlock_covers_offset_to_end() {
        let flash = DummyFlash::new(DummyConfig {
            total_size: 8 * EB,
            erase_size: EB,
            locked: true,
        });
        let data = pattern(100);
        let mut dev = flash.open();

        writer()
            .write(&mut image(&data), &mut dev, 2 * EB, &mut NoProgress)
            .unwrap();

        assert!(flash.events().contains(&Event::Unlock {
            start: 2 * EB,
            len: 6 * EB
        }));
        assert!(flash.is_locked(0));
        assert!(!flash.is_locked(7 * EB));
        assert_eq!(flash.contents(2 * EB, 100), data);
    }

    #[test]
    fn test_misaligned_offset_no_device_calls() {
        let flash = DummyFlash::with_blocks(10, EB);
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(100)), &mut dev, EB / 2, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::MisalignedOffset { .. }));
        assert!(flash.events().is_empty());
    }

    #[test]
    fn test_image_one_byte_too_large_no_device_calls() {
        let flash = DummyFlash::with_blocks(10, EB);
        let mut dev = flash.open();
        let data = pattern(8 * EB as usize + 1);

        let err = writer()
            .write(&mut image(&data), &mut dev, 2 * EB, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::ImageTooLarge { .. }));
        assert!(flash.events().is_empty());
    }

    #[test]
    fn test_readback_mismatch_stops_at_chunk() {
        let flash = DummyFlash::with_blocks(10, EB);
        let data = pattern(3 * EB as usize);
        // Corrupt a byte inside the sixth 1 KiB chunk
        let bad = 5 * 1024 + 17;
        flash.set_faults(Faults {
            corrupt_read_at: Some(bad),
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        match err {
            WriteError::VerifyMismatch {
                offset,
                expected,
                found,
            } => {
                assert_eq!(offset, bad);
                assert_eq!(expected, data[bad as usize]);
                assert_eq!(found, data[bad as usize] ^ 0x01);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(flash.write_count(), 6);
        assert_eq!(flash.read_count(), 6);
        assert_eq!(flash.erased_blocks(), vec![0, EB]);
        // Earlier chunks stay committed
        assert_eq!(flash.contents(0, 5 * 1024), data[..5 * 1024].to_vec());
        assert_eq!(flash.contents(6 * 1024, 1024), vec![0xFF; 1024]);
    }

    #[test]
    fn test_unlock_failure_is_fatal() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            fail_unlock: true,
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(100)), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::UnlockFailed { .. }));
        assert_eq!(flash.erase_count(), 0);
        assert_eq!(flash.write_count(), 0);
    }

    #[test]
    fn test_erase_failure_aborts() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            fail_erase_at: Some(EB),
            ..Faults::default()
        });
        let data = pattern(2 * EB as usize);
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::EraseFailed { offset, .. } if offset == EB));
        assert_eq!(flash.write_count(), 4);
        assert_eq!(flash.contents(0, EB as usize), data[..EB as usize].to_vec());
    }

    #[test]
    fn test_short_write_fails() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            short_write_at: Some(1500),
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(4096)), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(
            err,
            WriteError::WriteFailed {
                offset: 1024,
                len: 1024,
                ..
            }
        ));
        assert_eq!(flash.read_count(), 1);
    }

    #[test]
    fn test_short_readback_fails() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            short_read_at: Some(1500),
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(4096)), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(
            err,
            WriteError::VerifyReadFailed {
                offset: 1024,
                len: 1024,
                ..
            }
        ));
        assert_eq!(flash.write_count(), 2);
        let late_write = |e: &Event| matches!(e, Event::Write { offset, .. } if *offset >= 2048);
        assert!(!flash.events().iter().any(late_write));
    }

    #[test]
    fn test_seek_back_failure_aborts() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            fail_seek_to: Some(1024),
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(4096)), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::SeekFailed { offset: 1024, .. }));
        assert_eq!(flash.write_count(), 2);
        assert_eq!(flash.read_count(), 1);
    }

    #[test]
    fn test_initial_seek_failure_touches_nothing() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.set_faults(Faults {
            fail_seek_to: Some(EB),
            ..Faults::default()
        });
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(100)), &mut dev, EB, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, WriteError::SeekFailed { offset, .. } if offset == EB));
        assert!(flash.events().is_empty());
    }

    #[test]
    fn test_default_chunk_fits_small_erase_blocks() {
        let flash = DummyFlash::with_blocks(16, 512);
        flash.fill(0x00);
        let data = pattern(2048);
        let mut dev = flash.open();

        let stats = FlashWriter::default()
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap();

        assert_eq!(stats.bytes_written, 2048);
        assert_eq!(stats.chunks_written, 4);
        assert_eq!(flash.erased_blocks(), vec![0, 512, 1024, 1536]);
        assert_eq!(flash.contents(0, data.len()), data);
    }

    #[test]
    fn test_explicit_chunk_larger_than_erase_block_rejected() {
        let flash = DummyFlash::with_blocks(16, 512);
        let mut dev = flash.open();

        let err = writer()
            .write(&mut image(&pattern(2048)), &mut dev, 0, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(
            err,
            WriteError::InvalidChunkSize {
                chunk_size: 1024,
                erase_size: 512
            }
        ));
        assert!(flash.events().is_empty());
    }

    #[test]
    fn test_truncated_image_is_lenient() {
        let flash = DummyFlash::with_blocks(4, EB);
        let data = pattern(1500);
        // Declared length is larger than what the reader yields
        let mut stream = ImageStream::new(Cursor::new(data.clone()), 3000);
        let mut dev = flash.open();

        let stats = writer()
            .write(&mut stream, &mut dev, 0, &mut NoProgress)
            .unwrap();

        assert_eq!(stats.bytes_written, 1500);
        assert_eq!(flash.contents(0, 1500), data);
    }

    #[test]
    fn test_image_ending_mid_block_leaves_rest_erased() {
        let flash = DummyFlash::with_blocks(4, EB);
        flash.fill(0x00);
        let data = pattern(EB as usize + 10);
        let mut dev = flash.open();

        let stats = writer()
            .write(&mut image(&data), &mut dev, 0, &mut NoProgress)
            .unwrap();

        assert_eq!(stats.erase_end, 2 * EB);
        assert_eq!(flash.contents(EB + 10, 16), vec![0xFF; 16]);
        assert_eq!(flash.contents(2 * EB, 16), vec![0x00; 16]);
    }

    #[test]
    fn test_empty_image() {
        let flash = DummyFlash::with_blocks(4, EB);
        let mut dev = flash.open();

        let stats = writer()
            .write(&mut image(&[]), &mut dev, EB, &mut NoProgress)
            .unwrap();

        assert_eq!(
            stats,
            WriteStats {
                erase_end: EB,
                ..Default::default()
            }
        );
        assert_eq!(flash.erase_count(), 0);
        assert_eq!(flash.write_count(), 0);
        assert_eq!(flash.unlock_count(), 1);
    }

    #[test]
    fn test_recording_system() {
        let flash = DummyFlash::with_blocks(1, EB);
        let mut system = flash.system();
        system.reboot().unwrap();
        assert_eq!(flash.reboot_count(), 1);

        flash.set_faults(Faults {
            fail_reboot: true,
            ..Faults::default()
        });
        assert!(system.reboot().is_err());
    }
}
