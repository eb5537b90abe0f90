//! `/proc/mtd` device registry

use crate::error::{LinuxMtdError, Result};
use mtdwriter_core::{find_by_label, DeviceRegistry, MtdEntry};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Kernel MTD partition listing
pub const PROC_MTD: &str = "/proc/mtd";

/// Registry backed by the kernel's `/proc/mtd` listing
///
/// The listing is re-read on every lookup.
#[derive(Debug, Clone)]
pub struct ProcMtdRegistry {
    path: PathBuf,
}

impl Default for ProcMtdRegistry {
    fn default() -> Self {
        Self {
            path: PathBuf::from(PROC_MTD),
        }
    }
}

impl ProcMtdRegistry {
    /// Registry reading `/proc/mtd`
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry reading a listing in the same format from `path`
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the listing
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceRegistry for ProcMtdRegistry {
    type Error = LinuxMtdError;

    fn lookup(&self, label: &str) -> Result<Option<MtdEntry>> {
        let read_err = |source| LinuxMtdError::RegistryRead {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(read_err)?;
        find_by_label(BufReader::new(file), label).map_err(read_err)
    }
}
