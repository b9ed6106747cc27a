//! SCSI generic (`SG_IO`) access to block devices.
//!
//! One ioctl per command, no retries. See <http://sg.danny.cz/sg/p/sg_v3_ho.html>
//! for the `sg_io_hdr_t` layout mirrored by [`SgIoHdr`].

use std::{
    ffi::CString,
    io,
    mem,
    os::raw::c_void,
    path::{Path, PathBuf},
    ptr,
};

use libc::{self, c_int, c_uint, c_ulong, c_ushort, ioctl};
use log::{debug, warn};

use crate::{
    error::{Error, Result},
    scsi::{Direction, SENSE_LEN},
    Transport,
};

/// Longest CDB the sg driver accepts.
pub const MAX_CDB_LEN: usize = 16;

const SG_IO: c_ulong = 0x2285;

const SG_DXFER_NONE: c_int = -1;
const SG_DXFER_TO_DEV: c_int = -2;
const SG_DXFER_FROM_DEV: c_int = -3;
const SG_DXFER_TO_FROM_DEV: c_int = -4;

const SG_INFO_OK_MASK: c_uint = 0x1;
const SG_INFO_OK: c_uint = 0x0;

#[repr(C)]
struct SgIoHdr {
    interface_id: c_int,
    dxfer_direction: c_int,
    cmd_len: u8,
    mx_sb_len: u8,
    iovec_count: c_ushort,
    dxfer_len: c_uint,
    dxferp: *mut c_void,
    cmdp: *mut u8,
    sbp: *mut u8,
    timeout: c_uint,
    flags: c_uint,
    pack_id: c_int,
    usr_ptr: *mut c_void,
    status: u8,
    masked_status: u8,
    msg_status: u8,
    sb_len_wr: u8,
    host_status: c_ushort,
    driver_status: c_ushort,
    resid: c_int,
    duration: c_uint,
    info: c_uint,
}

fn sg_dxfer(direction: Direction) -> c_int {
    match direction {
        Direction::None => SG_DXFER_NONE,
        Direction::ToDevice => SG_DXFER_TO_DEV,
        Direction::FromDevice => SG_DXFER_FROM_DEV,
        Direction::ToFromDevice => SG_DXFER_TO_FROM_DEV,
    }
}

/// Open block device, exclusively owning its descriptor.
#[derive(Debug)]
pub struct SgHandle {
    path: PathBuf,
    fd: c_int,
}

impl SgHandle {
    /// Open `dev` read-write.
    ///
    /// **DO NOT** use _partition_ references here (like `/dev/sda1`). Use **only** _raw disk_
    /// references, like `/dev/sda`.
    pub fn open<P>(dev: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        use std::os::unix::ffi::OsStrExt;

        let path = dev.as_ref().to_path_buf();
        let device = CString::new(path.as_os_str().as_bytes()).map_err(|e| Error::Open {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;

        let h = unsafe { libc::open(device.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if h < 0 {
            return Err(Error::Open {
                path,
                source: io::Error::last_os_error(),
            });
        }

        debug!("opened {} as fd {}", path.display(), h);
        Ok(SgHandle { path, fd: h })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn close_fd(&mut self) -> io::Result<()> {
        if self.fd < 0 {
            return Ok(());
        }

        let fd = mem::replace(&mut self.fd, -1);
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Bytes the driver actually moved, given the residual count it reported.
fn transferred_len(requested: usize, resid: c_int) -> usize {
    let resid = usize::try_from(resid).unwrap_or(0);
    requested.saturating_sub(resid)
}

impl Transport for SgHandle {
    fn execute(
        &mut self,
        cdb: &[u8],
        direction: Direction,
        data: &mut [u8],
        sense: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize> {
        if cdb.is_empty() || cdb.len() > MAX_CDB_LEN {
            return Err(Error::InvalidRequest("CDB must be 1 to 16 bytes long"));
        }
        if sense.len() < SENSE_LEN {
            return Err(Error::InvalidRequest("sense buffer shorter than 32 bytes"));
        }
        let dxfer_len = c_uint::try_from(data.len())
            .map_err(|_| Error::InvalidRequest("data buffer too large"))?;

        let dxferp = if data.is_empty() {
            ptr::null_mut()
        } else {
            data.as_mut_ptr() as *mut c_void
        };

        let mut task = SgIoHdr {
            interface_id: 'S' as c_int,
            dxfer_direction: sg_dxfer(direction),
            cmd_len: cdb.len() as u8,
            mx_sb_len: sense.len().min(u8::MAX as usize) as u8,

            iovec_count: 0,
            dxfer_len,
            dxferp,
            // the driver only reads the CDB
            cmdp: cdb.as_ptr() as *mut u8,
            sbp: sense.as_mut_ptr(),
            timeout: timeout_ms,
            flags: 0,
            pack_id: 0,
            usr_ptr: ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        debug!(
            "{}: SG_IO cdb={:02x?} dir={:?} len={}",
            self.path.display(),
            cdb,
            direction,
            dxfer_len
        );

        let ans = unsafe { ioctl(self.fd, SG_IO, &mut task as *mut SgIoHdr) };
        if ans < 0 {
            return Err(Error::Transport(io::Error::last_os_error()));
        }

        // See http://www.t10.org/lists/2status.htm for SCSI status codes
        if task.info & SG_INFO_OK_MASK != SG_INFO_OK {
            let written = usize::from(task.sb_len_wr).min(sense.len());
            return Err(Error::DeviceStatus {
                scsi_status: task.status,
                host_status: task.host_status,
                driver_status: task.driver_status,
                sense: sense[..written].to_vec(),
            });
        }

        let transferred = transferred_len(data.len(), task.resid);
        debug!(
            "{}: done in {} ms, {} of {} bytes transferred",
            self.path.display(),
            task.duration,
            transferred,
            data.len()
        );
        Ok(transferred)
    }

    fn close(mut self) -> Result<()> {
        self.close_fd().map_err(|source| Error::Close {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for SgHandle {
    /// Release the descriptor unless [`Transport::close`] already did.
    fn drop(&mut self) {
        if let Err(e) = self.close_fd() {
            warn!("cannot close {}: {}", self.path.display(), e);
        }
    }
}
