//! Linux MTD device implementation

use crate::error::{LinuxMtdError, Result};
use bitflags::bitflags;
use log::{debug, info, warn};
use mtdwriter_core::{DeviceGeometry, DeviceOpener, FlashDevice, MtdEntry};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Sysfs root for MTD devices
const MTD_SYSFS_ROOT: &str = "/sys/class/mtd";

/// Device root
const DEV_ROOT: &str = "/dev";

bitflags! {
    /// MTD flags from kernel headers (`mtd-abi.h`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MtdFlags: u32 {
        /// Single bits can be flipped
        const BIT_WRITEABLE = 0x800;
        /// Device is writable
        const WRITEABLE     = 0x400;
        /// Device doesn't require erase before write
        const NO_ERASE      = 0x1000;
        /// Power-up locked
        const POWERUP_LOCK  = 0x2000;
    }
}

/// MTD device type from `mtd_info_user.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtdType {
    /// No device
    Absent,
    /// RAM-backed device
    Ram,
    /// Read-only device
    Rom,
    /// NOR flash
    Nor,
    /// NAND flash
    Nand,
    /// DataFlash
    DataFlash,
    /// UBI volume emulated as MTD
    UbiVolume,
    /// MLC NAND flash
    MlcNand,
    /// Anything else
    Unknown(u8),
}

impl From<u8> for MtdType {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Absent,
            1 => Self::Ram,
            2 => Self::Rom,
            3 => Self::Nor,
            4 => Self::Nand,
            6 => Self::DataFlash,
            7 => Self::UbiVolume,
            8 => Self::MlcNand,
            other => Self::Unknown(other),
        }
    }
}

/// Information about an MTD device returned by MEMGETINFO
#[derive(Debug, Clone)]
pub struct MtdInfo {
    /// Device name from sysfs, if available
    pub name: Option<String>,
    /// Device type
    pub mtd_type: MtdType,
    /// Device flags
    pub flags: MtdFlags,
    /// Total size in bytes
    pub total_size: u64,
    /// Erase block size in bytes
    pub erase_size: u64,
    /// Minimal writable unit in bytes
    pub write_size: u64,
    /// OOB bytes per page
    pub oob_size: u64,
}

impl MtdInfo {
    /// Whether the device accepts writes
    pub fn is_writable(&self) -> bool {
        self.flags.contains(MtdFlags::WRITEABLE)
    }

    /// Whether the device must be erased before programming
    pub fn requires_erase(&self) -> bool {
        !self.flags.contains(MtdFlags::NO_ERASE)
    }

    /// Size and erase granularity
    pub fn geometry(&self) -> DeviceGeometry {
        DeviceGeometry::new(self.total_size, self.erase_size)
    }
}

/// MEMGETINFO ioctl result structure
/// Matches struct mtd_info_user from mtd/mtd-abi.h
#[repr(C)]
#[derive(Debug, Default)]
struct MtdInfoUser {
    mtd_type: u8,
    flags: u32,
    size: u32,
    erasesize: u32,
    writesize: u32,
    oobsize: u32,
    #[allow(dead_code)]
    padding: u64,
}

/// MEMERASE/MEMUNLOCK ioctl argument structure
/// Matches struct erase_info_user from mtd/mtd-abi.h
#[repr(C)]
#[allow(dead_code)]
struct EraseInfo {
    start: u32,
    length: u32,
}

impl EraseInfo {
    fn new(start: u64, length: u64) -> io::Result<Self> {
        let start = u32::try_from(start).map_err(|_| out_of_range(start))?;
        let length = u32::try_from(length).map_err(|_| out_of_range(length))?;
        Ok(Self { start, length })
    }
}

fn out_of_range(value: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{:#x} does not fit a 32-bit erase_info_user field", value),
    )
}

// MTD ioctl definitions from mtd/mtd-abi.h
mod ioctl {
    use super::{EraseInfo, MtdInfoUser};
    use nix::{ioctl_read, ioctl_write_ptr};

    const MTD_IOC_MAGIC: u8 = b'M';
    const MTD_IOC_TYPE_MEMGETINFO: u8 = 1;
    const MTD_IOC_TYPE_MEMERASE: u8 = 2;
    const MTD_IOC_TYPE_MEMUNLOCK: u8 = 6;

    // Generate ioctl functions
    ioctl_read!(memgetinfo, MTD_IOC_MAGIC, MTD_IOC_TYPE_MEMGETINFO, MtdInfoUser);
    ioctl_write_ptr!(memerase, MTD_IOC_MAGIC, MTD_IOC_TYPE_MEMERASE, EraseInfo);
    ioctl_write_ptr!(memunlock, MTD_IOC_MAGIC, MTD_IOC_TYPE_MEMUNLOCK, EraseInfo);
}

/// Linux MTD device handle
///
/// Wraps an open `/dev/mtdN` character device. The device position is the
/// file position, so reads and writes go wherever the last seek left it.
/// The file is closed when the handle is dropped.
#[derive(Debug)]
pub struct LinuxMtd {
    /// Device file handle
    file: File,
    /// Path the device was opened from
    path: PathBuf,
    /// Device information
    info: MtdInfo,
}

impl LinuxMtd {
    /// Open MTD device number `index` below `dev_root`
    ///
    /// Tries `<dev_root>/mtd/N` first and falls back to `<dev_root>/mtdN`,
    /// read-write with `O_SYNC`.
    ///
    /// # Errors
    /// Returns an error if no node can be opened or the node does not
    /// answer MEMGETINFO.
    fn open_index(dev_root: &Path, index: u32) -> Result<Self> {
        let candidates = candidate_paths(dev_root, index);
        let mut last_err = None;

        for path in &candidates {
            match open_node(path) {
                Ok(file) => {
                    let mut mtd = Self::from_file(file, path)?;
                    mtd.info.name = read_sysfs_name(index);
                    mtd.log_opened();
                    return Ok(mtd);
                }
                Err(e) => {
                    debug!("Cannot open {}: {}", path.display(), e);
                    last_err = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(LinuxMtdError::OpenFailed {
            tried,
            source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)),
        })
    }

    fn from_file(file: File, path: &Path) -> Result<Self> {
        let mut raw = MtdInfoUser::default();
        // SAFETY: the descriptor is open and `raw` is a properly sized
        // mtd_info_user for the kernel to fill in
        unsafe { ioctl::memgetinfo(file.as_raw_fd(), &mut raw) }.map_err(|source| {
            LinuxMtdError::DeviceInfo {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let info = MtdInfo {
            name: None,
            mtd_type: MtdType::from(raw.mtd_type),
            flags: MtdFlags::from_bits_retain(raw.flags),
            total_size: raw.size as u64,
            erase_size: raw.erasesize as u64,
            write_size: raw.writesize as u64,
            oob_size: raw.oobsize as u64,
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            info,
        })
    }

    fn log_opened(&self) {
        let info = &self.info;
        debug!(
            "{}: type={:?}, flags={:?}, size={}, erase_size={}, write_size={}, oob_size={}",
            self.path.display(),
            info.mtd_type,
            info.flags,
            info.total_size,
            info.erase_size,
            info.write_size,
            info.oob_size
        );

        if !info.is_writable() {
            warn!("{} is not flagged writable", self.path.display());
        }
        if !info.requires_erase() {
            warn!(
                "{} does not require erase; erasing anyway",
                self.path.display()
            );
        }

        info!(
            "Opened {} successfully (name='{}', size={} bytes, erase_size={} bytes)",
            self.path.display(),
            info.name.as_deref().unwrap_or("?"),
            info.total_size,
            info.erase_size
        );
    }
}

fn open_node(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(path)
}

/// Device node paths tried for device `index`, in order
pub fn candidate_paths(dev_root: &Path, index: u32) -> Vec<PathBuf> {
    vec![
        dev_root.join("mtd").join(index.to_string()),
        dev_root.join(format!("mtd{}", index)),
    ]
}

/// Read the partition name from sysfs, if present
fn read_sysfs_name(index: u32) -> Option<String> {
    let path = format!("{}/mtd{}/name", MTD_SYSFS_ROOT, index);
    let content = std::fs::read_to_string(&path).ok()?;

    // Sanitize: remove non-printable characters and trailing whitespace
    let sanitized: String = content
        .chars()
        .take_while(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    Some(sanitized.trim_end().to_string())
}

impl FlashDevice for LinuxMtd {
    fn geometry(&self) -> DeviceGeometry {
        self.info.geometry()
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }

    fn sync(&mut self) -> io::Result<()> {
        // mtdchar has no fsync; flush everything the way sync(1) does
        nix::unistd::sync();
        Ok(())
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        let range = EraseInfo::new(start, len)?;
        // SAFETY: valid descriptor and a properly initialized erase_info_user
        unsafe { ioctl::memunlock(self.file.as_raw_fd(), &range) }?;
        Ok(())
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        let range = EraseInfo::new(start, len)?;
        // SAFETY: valid descriptor and a properly initialized erase_info_user
        unsafe { ioctl::memerase(self.file.as_raw_fd(), &range) }?;
        Ok(())
    }
}

/// Opens registry entries as `/dev/mtd/N` or `/dev/mtdN`
#[derive(Debug, Clone)]
pub struct LinuxMtdOpener {
    dev_root: PathBuf,
}

impl Default for LinuxMtdOpener {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }
}

impl LinuxMtdOpener {
    /// Opener looking for device nodes under `/dev`
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener looking for device nodes under `dev_root`
    pub fn with_dev_root<P: Into<PathBuf>>(dev_root: P) -> Self {
        Self {
            dev_root: dev_root.into(),
        }
    }
}

impl DeviceOpener for LinuxMtdOpener {
    type Device = LinuxMtd;
    type Error = LinuxMtdError;

    fn open(&self, entry: &MtdEntry) -> Result<LinuxMtd> {
        LinuxMtd::open_index(&self.dev_root, entry.index)
    }
}
