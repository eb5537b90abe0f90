//! Error types for Linux MTD operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Linux MTD-specific errors
#[derive(Debug, Error)]
pub enum LinuxMtdError {
    /// The device registry could not be read
    #[error("Failed to read MTD registry {path:?}: {source}")]
    RegistryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No device node could be opened for the selected device
    #[error("Cannot open device for writing (tried {tried}): {source}")]
    OpenFailed {
        tried: String,
        #[source]
        source: io::Error,
    },

    /// MEMGETINFO failed
    #[error("Cannot get device info for {path:?}: {source}")]
    DeviceInfo {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },
}

/// Result type for Linux MTD operations
pub type Result<T> = std::result::Result<T, LinuxMtdError>;
