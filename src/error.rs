//! Error type shared by every layer of the crate.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::scsi;

/// Everything that can go wrong between opening a disk and decoding its replies.
#[derive(Debug, Error)]
pub enum Error {
    /// Device node missing or not accessible with read-write access.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `SG_IO` ioctl was rejected before the device reported any status.
    #[error("SG_IO ioctl failed: {0}")]
    Transport(#[source] io::Error),

    /// The ioctl went through, but the device, the HBA or the driver complained.
    #[error(
        "SCSI status: {scsi_status:#04x}, host status: {host_status:#04x}, driver status: {driver_status:#04x}{}",
        sense_suffix(.sense)
    )]
    DeviceStatus {
        scsi_status: u8,
        host_status: u16,
        driver_status: u16,
        sense: Vec<u8>,
    },

    /// Reply shorter than the command's minimal layout.
    #[error("malformed {command} response: {len} bytes, need at least {need}")]
    MalformedResponse {
        command: &'static str,
        len: usize,
        need: usize,
    },

    /// MODE SENSE answered with a page other than the one requested.
    #[error("MODE SENSE returned page {got:#04x}, requested {expected:#04x}")]
    UnexpectedPage { expected: u8, got: u8 },

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Releasing the device descriptor failed.
    #[error("cannot close {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Sense key carried by a [`Error::DeviceStatus`], if the device wrote sense data.
    pub fn sense_key(&self) -> Option<u8> {
        match self {
            Error::DeviceStatus { sense, .. } => scsi::sense_key(sense),
            _ => None,
        }
    }
}

fn sense_suffix(sense: &[u8]) -> String {
    match scsi::sense_key(sense) {
        Some(key) => format!(", sense key: {}", scsi::sense_key_name(key)),
        None => String::new(),
    }
}
