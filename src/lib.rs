//! Identity and health attributes of SCSI and SATA disks for Linux. For technical information
//! refer to [ATA/ATAPI Command Set](http://t13.org/Documents/UploadedDocuments/docs2017/di529r18-ATAATAPI_Command_Set_-_4.pdf)
//! and the T10 SPC/SBC/SAT documents.
//!
//! # Warning
//!
//! **Commands go straight to the device, bypassing the block layer. The _only_ protection is
//! that the kernel requires `CAP_SYS_RAWIO` or `CAP_SYS_ADMIN` to accept them.** This crate
//! issues read-only commands exclusively.
//!
//! # Supported operations
//!
//! - classify a disk using `INQUIRY` (SCSI op 0x12): a vendor id of `"ATA     "` means a SATA
//!   disk behind a SCSI-ATA translation layer, anything else is treated as plain SCSI,
//! - read capacity using `READ CAPACITY(10)` (SCSI op 0x25),
//! - read rotation rate of plain SCSI disks using `MODE SENSE(6)` (SCSI op 0x1A, page 0x04),
//! - identify SATA drives using `IDENTIFY_DEVICE` (ATA cmd 0xEC) tunneled through
//!   `ATA PASS-THROUGH(16)` (SCSI op 0x85), decoding serial, model, firmware, WWN, sector
//!   sizes, rotation rate, ATA versions and transport.
//!
//! Uses the `SG` subsystem (`SG_IO` ioctl).
//!
//! ```no_run
//! # fn main() -> pakr_smartinfo::Result<()> {
//! let attrs = pakr_smartinfo::query("/dev/sda")?;
//! println!("{}", attrs);
//! # Ok(())
//! # }
//! ```

#![allow(clippy::identity_op)]

use std::sync::OnceLock;

pub mod caps;
pub mod device;
pub mod error;
pub mod identify;
pub mod scan;
pub mod scsi;
pub mod utils;

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
pub mod os;

pub use caps::Capabilities;
pub use device::{
    merge_close, Device, DeviceKind, DiskAttributes, SataDevice, ScsiDevice, DEFAULT_TIMEOUT_MS,
};
#[cfg(target_os = "linux")]
pub use device::{detect, detect_with_timeout, query};
pub use error::{Error, Result};
pub use identify::IdentifyDeviceData;
pub use scsi::{Direction, InquiryResponse};
pub use utils::Endian;

/// Channel able to run one SCSI command at a time against an open device.
///
/// Implementations own the underlying descriptor; [`Transport::close`] releases it exactly
/// once and reports failure instead of swallowing it.
pub trait Transport {
    /// Send `cdb`, moving `data` in `direction`. `sense` must hold at least
    /// [`scsi::SENSE_LEN`] bytes. No retries are attempted.
    ///
    /// Returns the number of bytes actually transferred, which may be less than `data.len()`.
    fn execute(
        &mut self,
        cdb: &[u8],
        direction: Direction,
        data: &mut [u8],
        sense: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize>;

    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Facts about the running process, probed once.
#[derive(Debug, Clone, Copy)]
pub struct HostInfo {
    pub endian: Endian,
    /// `None` when `capget` itself failed.
    pub capabilities: Option<Capabilities>,
}

static HOST_INFO: OnceLock<HostInfo> = OnceLock::new();

/// Probe the host on first call (warning about missing capabilities) and return
/// the cached result afterwards.
pub fn host_info() -> &'static HostInfo {
    HOST_INFO.get_or_init(|| HostInfo {
        endian: Endian::native(),
        capabilities: caps::check_capabilities(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_info_is_stable() {
        let a = host_info();
        let b = host_info();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.endian, Endian::native());
    }
}
