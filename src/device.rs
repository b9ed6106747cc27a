//! Device classification and the per-kind attribute queries.
//!
//! [`detect`] opens a disk, sends INQUIRY and returns either a plain [`ScsiDevice`] or a
//! [`SataDevice`] wrapping one. Both expose the same operations through [`Device`].

use std::fmt;
#[cfg(target_os = "linux")]
use std::path::Path;

use log::{debug, warn};

use crate::{
    error::Result,
    identify::{IdentifyDeviceData, IDENTIFY_LEN},
    scsi::{self, Direction, InquiryResponse, ReadCapacity10},
    utils::{convert_bytes, describe_rotation_rate},
    Transport,
};

#[cfg(target_os = "linux")]
use crate::os::SgHandle;

/// Per-command timeout unless overridden.
pub const DEFAULT_TIMEOUT_MS: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    /// Regular SCSI (including SAS, but excluding SATA)
    #[default]
    Scsi,
    /// SATA disk behind a SCSI-ATA translation layer
    Sata,
}

/// Everything known about one disk. Plain SCSI disks only fill `user_capacity`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskAttributes {
    pub kind: DeviceKind,
    pub inquiry: Option<InquiryResponse>,
    /// Bytes
    pub user_capacity: u64,
    pub logical_sector_size: u32,
    pub physical_sector_size: u32,
    pub serial_number: String,
    pub lu_wwn_device_id: String,
    pub firmware_revision: String,
    pub model_number: String,
    pub rotation_rate: u16,
    pub ata_major_version: String,
    pub ata_minor_version: String,
    pub transport: String,
    /// LBA48 user addressable sectors
    pub sector_count: u64,
    pub smart_supported: bool,
    pub smart_enabled: bool,
}

impl fmt::Display for DiskAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(inquiry) = &self.inquiry {
            writeln!(f, "SCSI INQUIRY: {}", inquiry)?;
        }
        writeln!(
            f,
            "User Capacity: {} bytes ({})",
            self.user_capacity,
            convert_bytes(self.user_capacity)
        )?;

        if self.kind == DeviceKind::Scsi {
            return Ok(());
        }

        writeln!(f, "\nATA IDENTIFY data :")?;
        writeln!(f, "Serial Number: {}", self.serial_number)?;
        writeln!(f, "Model Number: {}", self.model_number)?;
        writeln!(f, "LU WWN Device Id: {}", self.lu_wwn_device_id)?;
        writeln!(f, "Firmware Revision: {}", self.firmware_revision)?;
        writeln!(f, "ATA Major Version: {}", self.ata_major_version)?;
        writeln!(f, "ATA Minor Version: {}", self.ata_minor_version)?;
        writeln!(
            f,
            "Sector Size: {} bytes logical, {} bytes physical",
            self.logical_sector_size, self.physical_sector_size
        )?;
        writeln!(f, "Rotation Rate: {}", describe_rotation_rate(self.rotation_rate))?;
        writeln!(f, "SMART support available: {}", self.smart_supported)?;
        writeln!(f, "SMART support enabled: {}", self.smart_enabled)?;
        writeln!(f, "Transport: {}", self.transport)
    }
}

/// Return `result` unless it succeeded and closing the device did not.
/// A close failure after a failed operation is logged; the operation's error wins.
pub fn merge_close<R>(result: Result<R>, closed: Result<()>) -> Result<R> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            warn!("{}", close);
            Err(e)
        }
    }
}

/// SCSI device reached through a [`Transport`].
#[derive(Debug)]
pub struct ScsiDevice<T> {
    name: String,
    transport: T,
    timeout_ms: u32,
}

#[cfg(target_os = "linux")]
impl ScsiDevice<SgHandle> {
    /// Open device pointed by a specific path.
    pub fn open<P>(dev: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let handle = SgHandle::open(dev.as_ref())?;
        Ok(ScsiDevice::new(dev.as_ref().display().to_string(), handle))
    }
}

impl<T: Transport> ScsiDevice<T> {
    pub fn new<S: Into<String>>(name: S, transport: T) -> Self {
        ScsiDevice {
            name: name.into(),
            transport,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a data-in command and read the reply into `response`. Returns how many bytes the
    /// device filled in; callers decode only that prefix.
    pub fn send_cdb(&mut self, cdb: &[u8], response: &mut [u8]) -> Result<usize> {
        let mut sense = [0u8; scsi::SENSE_LEN];

        debug!("{}: sending cdb {:02x?}", self.name, cdb);
        self.transport.execute(
            cdb,
            Direction::FromDevice,
            response,
            &mut sense,
            self.timeout_ms,
        )
    }

    /// Standard SCSI INQUIRY
    pub fn inquiry(&mut self) -> Result<InquiryResponse> {
        let mut response = [0u8; scsi::INQUIRY_LEN];
        let cdb = scsi::build_inquiry(scsi::INQUIRY_LEN as u16);

        let n = self.send_cdb(&cdb, &mut response)?;
        InquiryResponse::parse(&response[..n])
    }

    /// Total capacity of the disk in bytes
    pub fn read_capacity(&mut self) -> Result<u64> {
        let mut response = [0u8; scsi::READ_CAPACITY_10_LEN];
        let cdb = scsi::build_read_capacity10();

        let n = self.send_cdb(&cdb, &mut response)?;
        Ok(ReadCapacity10::parse(&response[..n])?.capacity())
    }

    /// Raw MODE SENSE(6) reply
    pub fn mode_sense(&mut self, page: u8, sub_page: u8, page_control: u8) -> Result<Vec<u8>> {
        let mut response = vec![0u8; scsi::MODE_SENSE_6_LEN];
        let cdb = scsi::build_mode_sense6(page, sub_page, page_control);

        let n = self.send_cdb(&cdb, &mut response)?;
        response.truncate(n);
        Ok(response)
    }

    /// Rotation rate from the rigid disk geometry page.
    pub fn rotation_rate(&mut self) -> Result<u16> {
        let response = self.mode_sense(
            scsi::RIGID_DISK_GEOMETRY_PAGE,
            0,
            scsi::MODE_PAGE_CONTROL_DEFAULT,
        )?;
        debug!("{}: MODE SENSE buf: {:02x?}", self.name, response);
        scsi::parse_rotation_rate(&response)
    }

    pub fn get_disk_attributes(&mut self) -> Result<DiskAttributes> {
        Ok(DiskAttributes {
            kind: DeviceKind::Scsi,
            user_capacity: self.read_capacity()?,
            ..Default::default()
        })
    }

    /// Human readable summary; rotation rate is added when MODE SENSE yields one.
    pub fn disk_report(&mut self) -> Result<String> {
        let mut report = self.get_disk_attributes()?.to_string();

        match self.rotation_rate() {
            Ok(rate) => {
                report.push_str(&format!("Rotation Rate: {}\n", describe_rotation_rate(rate)))
            }
            Err(e) => warn!("{}: rotation rate not available: {}", self.name, e),
        }
        Ok(report)
    }

    pub fn print_disk_info(&mut self) -> Result<()> {
        print!("{}", self.disk_report()?);
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        debug!("{}: closing", self.name);
        self.transport.close()
    }
}

/// SATA disk behind a SCSI-ATA Translation layer; ATA commands travel in ATA PASS-THROUGH(16).
#[derive(Debug)]
pub struct SataDevice<T> {
    scsi: ScsiDevice<T>,
    inquiry: InquiryResponse,
}

impl<T: Transport> SataDevice<T> {
    /// Wrap `scsi`, keeping the INQUIRY reply it was classified with.
    pub fn new(scsi: ScsiDevice<T>, inquiry: InquiryResponse) -> Self {
        SataDevice { scsi, inquiry }
    }

    pub fn inquiry(&self) -> &InquiryResponse {
        &self.inquiry
    }

    pub fn scsi(&mut self) -> &mut ScsiDevice<T> {
        &mut self.scsi
    }

    /// Get identification record from disk.
    pub fn ata_identify(&mut self) -> Result<IdentifyDeviceData> {
        let mut response = [0u8; IDENTIFY_LEN];
        let cdb = scsi::build_ata_pass_through16(scsi::ATA_IDENTIFY_DEVICE);

        let n = self.scsi.send_cdb(&cdb, &mut response)?;
        IdentifyDeviceData::from_bytes(&response[..n])
    }

    pub fn get_disk_attributes(&mut self) -> Result<DiskAttributes> {
        let user_capacity = self.scsi.read_capacity()?;
        let identify = self.ata_identify()?;
        debug!("{}: {:?}", self.scsi.name, identify);

        let (logical_sector_size, physical_sector_size) = identify.get_sector_size();

        Ok(DiskAttributes {
            kind: DeviceKind::Sata,
            inquiry: Some(self.inquiry),
            user_capacity,
            logical_sector_size,
            physical_sector_size,
            serial_number: identify.get_serial(),
            lu_wwn_device_id: identify.get_wwn(),
            firmware_revision: identify.get_firmware(),
            model_number: identify.get_model(),
            rotation_rate: identify.get_rotation_rate(),
            ata_major_version: identify.get_ata_major_version().to_string(),
            ata_minor_version: identify.get_ata_minor_version().to_string(),
            transport: identify.get_transport(),
            sector_count: identify.get_sector_count(),
            smart_supported: identify.smart_supported(),
            smart_enabled: identify.smart_enabled(),
        })
    }

    pub fn disk_report(&mut self) -> Result<String> {
        Ok(self.get_disk_attributes()?.to_string())
    }

    pub fn print_disk_info(&mut self) -> Result<()> {
        print!("{}", self.disk_report()?);
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.scsi.close()
    }
}

/// A classified disk.
#[derive(Debug)]
pub enum Device<T> {
    Scsi(ScsiDevice<T>),
    Sata(SataDevice<T>),
}

impl<T: Transport> Device<T> {
    /// Pick the variant matching an INQUIRY reply already read from `scsi`.
    pub fn from_inquiry(scsi: ScsiDevice<T>, inquiry: InquiryResponse) -> Self {
        if inquiry.is_ata() {
            debug!("{}: ATA vendor id, using SAT pass-through", scsi.name);
            Device::Sata(SataDevice::new(scsi, inquiry))
        } else {
            debug!("{}: plain SCSI device ({})", scsi.name, inquiry);
            Device::Scsi(scsi)
        }
    }

    /// Send INQUIRY and classify. On failure the device is closed before returning.
    pub fn probe(mut scsi: ScsiDevice<T>) -> Result<Self> {
        match scsi.inquiry() {
            Ok(inquiry) => Ok(Self::from_inquiry(scsi, inquiry)),
            Err(e) => merge_close(Err(e), scsi.close()),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Scsi(_) => DeviceKind::Scsi,
            Device::Sata(_) => DeviceKind::Sata,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Device::Scsi(d) => d.name(),
            Device::Sata(d) => d.scsi.name(),
        }
    }

    pub fn get_disk_attributes(&mut self) -> Result<DiskAttributes> {
        match self {
            Device::Scsi(d) => d.get_disk_attributes(),
            Device::Sata(d) => d.get_disk_attributes(),
        }
    }

    pub fn disk_report(&mut self) -> Result<String> {
        match self {
            Device::Scsi(d) => d.disk_report(),
            Device::Sata(d) => d.disk_report(),
        }
    }

    pub fn print_disk_info(&mut self) -> Result<()> {
        match self {
            Device::Scsi(d) => d.print_disk_info(),
            Device::Sata(d) => d.print_disk_info(),
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            Device::Scsi(d) => d.close(),
            Device::Sata(d) => d.close(),
        }
    }

    /// Read attributes and close the device on every path.
    pub fn into_disk_attributes(mut self) -> Result<DiskAttributes> {
        let attrs = self.get_disk_attributes();
        merge_close(attrs, self.close())
    }
}

/// Open `path` and classify it with INQUIRY.
///
/// An unopenable path yields [`Error::Open`](crate::Error::Open); a failing INQUIRY yields the
/// command error.
#[cfg(target_os = "linux")]
pub fn detect<P: AsRef<Path>>(path: P) -> Result<Device<SgHandle>> {
    detect_with_timeout(path, DEFAULT_TIMEOUT_MS)
}

#[cfg(target_os = "linux")]
pub fn detect_with_timeout<P: AsRef<Path>>(path: P, timeout_ms: u32) -> Result<Device<SgHandle>> {
    let scsi = ScsiDevice::open(path)?.with_timeout(timeout_ms);
    Device::probe(scsi)
}

/// Detect, read attributes and close in one go.
#[cfg(target_os = "linux")]
pub fn query<P: AsRef<Path>>(path: P) -> Result<DiskAttributes> {
    detect(path)?.into_disk_attributes()
}
