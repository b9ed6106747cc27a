//! Process capability check. See <http://man7.org/linux/man-pages/man2/capset.2.html>.
//!
//! Best effort only: nothing here stops device access, it merely explains why
//! it is about to fail. A process running as root has every capability.

use std::io;

use log::{debug, warn};

pub const CAP_SYS_RAWIO: u32 = 17;
pub const CAP_SYS_ADMIN: u32 = 21;

/// Effective capability set of the calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    effective: u64,
}

impl Capabilities {
    pub fn from_effective(effective: u64) -> Self {
        Capabilities { effective }
    }

    #[cfg(target_os = "linux")]
    pub fn current() -> io::Result<Self> {
        use libc::c_int;

        const LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;

        #[repr(C)]
        struct CapUserHeader {
            version: u32,
            pid: c_int,
        }

        #[repr(C)]
        #[derive(Default, Clone, Copy)]
        struct CapUserData {
            effective: u32,
            permitted: u32,
            inheritable: u32,
        }

        let mut hdr = CapUserHeader {
            version: LINUX_CAPABILITY_VERSION_3,
            pid: 0,
        };
        let mut data = [CapUserData::default(); 2];

        let rc = unsafe {
            libc::syscall(
                libc::SYS_capget,
                &mut hdr as *mut CapUserHeader,
                data.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let effective = u64::from(data[0].effective) | (u64::from(data[1].effective) << 32);
        Ok(Capabilities { effective })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn current() -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "capabilities are Linux only",
        ))
    }

    pub fn has(&self, cap: u32) -> bool {
        cap < 64 && self.effective & (1 << cap) != 0
    }

    /// At least one of `CAP_SYS_RAWIO` / `CAP_SYS_ADMIN` is in effect.
    pub fn can_access_devices(&self) -> bool {
        self.has(CAP_SYS_RAWIO) || self.has(CAP_SYS_ADMIN)
    }
}

/// Read the effective set and warn if device access is going to be refused.
pub fn check_capabilities() -> Option<Capabilities> {
    match Capabilities::current() {
        Ok(caps) => {
            debug!("effective capabilities: {:#x}", caps.effective);
            if !caps.can_access_devices() {
                warn!(
                    "CAP_SYS_RAWIO and CAP_SYS_ADMIN are not in effect, device access will fail. \
                     At least one of them should be in effect for accessing a device."
                );
            }
            Some(caps)
        }
        Err(e) => {
            warn!("capget() has failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits() {
        let none = Capabilities::from_effective(0);
        assert!(!none.can_access_devices());

        let rawio = Capabilities::from_effective(1 << CAP_SYS_RAWIO);
        assert!(rawio.has(CAP_SYS_RAWIO));
        assert!(!rawio.has(CAP_SYS_ADMIN));
        assert!(rawio.can_access_devices());

        let admin = Capabilities::from_effective(1 << CAP_SYS_ADMIN);
        assert!(admin.can_access_devices());

        assert!(!Capabilities::from_effective(u64::MAX).has(64));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn current_process() {
        // capget on our own pid must always succeed
        assert!(Capabilities::current().is_ok());
    }
}
