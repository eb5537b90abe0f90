//! mtdwriter-linux-mtd - Linux MTD (Memory Technology Device) backend
//!
//! This crate connects the mtdwriter core to the Linux MTD subsystem.
//! MTD partitions are listed in `/proc/mtd` and exposed as character
//! devices at `/dev/mtdN` (or `/dev/mtd/N` on older devfs layouts).
//!
//! # Overview
//!
//! - [`ProcMtdRegistry`] resolves a partition label to a device index
//! - [`LinuxMtdOpener`] opens the device node and queries its geometry with
//!   `MEMGETINFO`
//! - [`LinuxMtd`] implements unlock and erase with `MEMUNLOCK`/`MEMERASE`
//!   and plain `read`/`write`/`lseek` for data
//! - [`LinuxSystem`] reboots the host once a write has succeeded
//!
//! # Example
//!
//! ```ignore
//! use mtdwriter_core::{DeviceOpener, DeviceRegistry, FlashDevice};
//! use mtdwriter_linux_mtd::{LinuxMtdOpener, ProcMtdRegistry};
//!
//! let entry = ProcMtdRegistry::new().lookup("firmware")?.expect("no such partition");
//! let mtd = LinuxMtdOpener::new().open(&entry)?;
//! println!("Size: {} bytes", mtd.geometry().total_size);
//! println!("Erase size: {} bytes", mtd.geometry().erase_size);
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with MTD character device support (`CONFIG_MTD_CHAR`)
//! - Read/write access to the device node, usually root
//! - `CAP_SYS_BOOT` for rebooting
//!
//! # Device Discovery
//!
//! List available MTD devices:
//! ```bash
//! cat /proc/mtd
//! ```

pub mod device;
pub mod error;
pub mod registry;
pub mod system;

// Re-exports
pub use device::{candidate_paths, LinuxMtd, LinuxMtdOpener, MtdFlags, MtdInfo, MtdType};
pub use error::{LinuxMtdError, Result};
pub use registry::{ProcMtdRegistry, PROC_MTD};
pub use system::LinuxSystem;
