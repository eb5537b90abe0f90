//! System control capability

use std::io;

/// Host-level actions taken after a write
pub trait SystemController {
    /// Restart the system immediately
    ///
    /// On real hardware this does not return on success.
    fn reboot(&mut self) -> io::Result<()>;
}

impl<S: SystemController + ?Sized> SystemController for &mut S {
    fn reboot(&mut self) -> io::Result<()> {
        (**self).reboot()
    }
}
