//! Host reboot via the `reboot(2)` syscall

use log::info;
use mtdwriter_core::SystemController;
use nix::sys::reboot::{reboot, RebootMode};
use std::io;

/// Reboots the running Linux system
///
/// Requires `CAP_SYS_BOOT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSystem;

impl SystemController for LinuxSystem {
    fn reboot(&mut self) -> io::Result<()> {
        info!("Rebooting...");
        nix::unistd::sync();
        // Only returns on failure
        reboot(RebootMode::RB_AUTOBOOT)
            .map(|never| match never {})
            .map_err(io::Error::from)
    }
}
