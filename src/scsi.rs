//! SCSI command descriptor blocks and their replies.
//!
//! Builders never touch the device; parsers refuse replies shorter than the
//! layout they decode. Opcodes and layouts follow SPC-4 / SBC-3 / SAT-3.

use std::fmt;

use crate::error::{Error, Result};

pub const INQUIRY: u8 = 0x12;
pub const MODE_SENSE_6: u8 = 0x1a;
pub const READ_CAPACITY_10: u8 = 0x25;
pub const ATA_PASS_THROUGH_16: u8 = 0x85;

/// ATA command tunneled by [`build_ata_pass_through16`] to read IDENTIFY data.
pub const ATA_IDENTIFY_DEVICE: u8 = 0xec;

/// Minimum length of standard INQUIRY response
pub const INQUIRY_LEN: usize = 36;
pub const READ_CAPACITY_10_LEN: usize = 8;
pub const MODE_SENSE_6_LEN: usize = 64;
/// Sense buffer handed to every command.
pub const SENSE_LEN: usize = 32;

/// Rigid disk drive geometry mode page (SCSI-3).
pub const RIGID_DISK_GEOMETRY_PAGE: u8 = 0x04;
/// Mode page control field: default values.
pub const MODE_PAGE_CONTROL_DEFAULT: u8 = 2;

const ATA_VENDOR_ID: [u8; 8] = *b"ATA     ";

const SG_ATA_PROTO_PIO_IN: u8 = 4 << 1;
const SG_CDB2_TLEN_NSECT: u8 = 2 << 0;
const SG_CDB2_TLEN_SECTORS: u8 = 1 << 2;
const SG_CDB2_TDIR_FROM_DEV: u8 = 1 << 3;

pub type Cdb6 = [u8; 6];
pub type Cdb10 = [u8; 10];
pub type Cdb16 = [u8; 16];

/// Data phase of a command, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    ToDevice,
    FromDevice,
    ToFromDevice,
}

fn ensure_len(command: &'static str, buffer: &[u8], need: usize) -> Result<()> {
    if buffer.len() < need {
        return Err(Error::MalformedResponse {
            command,
            len: buffer.len(),
            need,
        });
    }
    Ok(())
}

/// Standard INQUIRY (EVPD=0) asking for `alloc_len` bytes.
pub fn build_inquiry(alloc_len: u16) -> Cdb6 {
    let mut cdb = [0u8; 6];
    cdb[0] = INQUIRY;
    cdb[3..5].copy_from_slice(&alloc_len.to_be_bytes());
    cdb
}

/// Fixed part of the standard INQUIRY data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InquiryResponse {
    pub peripheral: u8,
    pub version: u8,
    pub vendor_id: [u8; 8],
    pub product_id: [u8; 16],
    pub product_rev: [u8; 4],
}

impl InquiryResponse {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        ensure_len("INQUIRY", buffer, INQUIRY_LEN)?;

        let mut ans = InquiryResponse {
            peripheral: buffer[0],
            version: buffer[2],
            ..Default::default()
        };
        ans.vendor_id.copy_from_slice(&buffer[8..16]);
        ans.product_id.copy_from_slice(&buffer[16..32]);
        ans.product_rev.copy_from_slice(&buffer[32..36]);

        Ok(ans)
    }

    /// Bits 7:5 of byte 0.
    pub fn peripheral_qualifier(&self) -> u8 {
        self.peripheral >> 5
    }

    /// Bits 4:0 of byte 0; 0x00 is a direct access block device.
    pub fn peripheral_device_type(&self) -> u8 {
        self.peripheral & 0x1f
    }

    /// SAT layers report the vendor as `"ATA"` padded with spaces.
    pub fn is_ata(&self) -> bool {
        self.vendor_id == ATA_VENDOR_ID
    }
}

impl fmt::Display for InquiryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  {}",
            String::from_utf8_lossy(&self.vendor_id),
            String::from_utf8_lossy(&self.product_id),
            String::from_utf8_lossy(&self.product_rev)
        )
    }
}

pub fn build_read_capacity10() -> Cdb10 {
    let mut cdb = [0u8; 10];
    cdb[0] = READ_CAPACITY_10;
    cdb
}

/// READ CAPACITY(10) parameter data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCapacity10 {
    /// Max. addressable LBA
    pub last_lba: u32,
    /// Logical block (i.e., sector) size
    pub block_size: u32,
}

impl ReadCapacity10 {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        ensure_len("READ CAPACITY(10)", buffer, READ_CAPACITY_10_LEN)?;

        Ok(ReadCapacity10 {
            last_lba: u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]),
            block_size: u32::from_be_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]),
        })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> u64 {
        (u64::from(self.last_lba) + 1) * u64::from(self.block_size)
    }
}

/// MODE SENSE(6) for `page`/`sub_page`, allocation length [`MODE_SENSE_6_LEN`].
pub fn build_mode_sense6(page: u8, sub_page: u8, page_control: u8) -> Cdb6 {
    let mut cdb = [0u8; 6];
    cdb[0] = MODE_SENSE_6;
    cdb[2] = (page_control << 6) | (page & 0x3f);
    cdb[3] = sub_page;
    cdb[4] = MODE_SENSE_6_LEN as u8;
    cdb
}

/// Medium rotation rate from a MODE SENSE(6) reply carrying the rigid disk
/// geometry page. The page follows the 4-byte header and the block descriptors;
/// the rate is a big-endian word at page offset 20.
pub fn parse_rotation_rate(buffer: &[u8]) -> Result<u16> {
    const COMMAND: &str = "MODE SENSE(6)";

    ensure_len(COMMAND, buffer, 4)?;

    let data_len = usize::from(buffer[0]) + 1;
    let page_offset = 4 + usize::from(buffer[3]);
    let rate_offset = page_offset + 20;
    let need = rate_offset + 2;

    ensure_len(COMMAND, buffer, need)?;
    if data_len < need {
        return Err(Error::MalformedResponse {
            command: COMMAND,
            len: data_len,
            need,
        });
    }

    let page = buffer[page_offset] & 0x3f;
    if page != RIGID_DISK_GEOMETRY_PAGE {
        return Err(Error::UnexpectedPage {
            expected: RIGID_DISK_GEOMETRY_PAGE,
            got: page,
        });
    }

    Ok(u16::from_be_bytes([buffer[rate_offset], buffer[rate_offset + 1]]))
}

/// ATA PASS-THROUGH(16) for a non-data-out ATA command reading one 512-byte
/// block (PIO data-in, BYT_BLOK = 1, T_LENGTH = 2, T_DIR = 1).
pub fn build_ata_pass_through16(ata_command: u8) -> Cdb16 {
    let mut cdb = [0u8; 16];
    cdb[0] = ATA_PASS_THROUGH_16;
    cdb[1] = SG_ATA_PROTO_PIO_IN;
    cdb[2] = SG_CDB2_TLEN_NSECT | SG_CDB2_TLEN_SECTORS | SG_CDB2_TDIR_FROM_DEV;
    cdb[6] = 1; // NSect_L
    cdb[14] = ata_command;
    cdb
}

/// Sense key of fixed (0x70/0x71) or descriptor (0x72/0x73) sense data.
pub fn sense_key(sense: &[u8]) -> Option<u8> {
    let code = sense.first()? & 0x7f;
    match code {
        0x70 | 0x71 => sense.get(2).map(|b| b & 0x0f),
        0x72 | 0x73 => sense.get(1).map(|b| b & 0x0f),
        _ => None,
    }
}

pub fn sense_key_name(key: u8) -> &'static str {
    match key & 0x0f {
        0 => "NO_SENSE",
        1 => "RECOVERED_ERROR",
        2 => "NOT_READY",
        3 => "MEDIUM_ERROR",
        4 => "HARDWARE_ERROR",
        5 => "ILLEGAL_REQUEST",
        6 => "UNIT_ATTENTION",
        7 => "DATA_PROTECT",
        8 => "BLANK_CHECK",
        9 => "VENDOR_SPECIFIC",
        10 => "COPY_ABORTED",
        11 => "ABORTED_COMMAND",
        12 => "EQUAL",
        13 => "VOLUME_OVERFLOW",
        14 => "MISCOMPARE",
        _ => "COMPLETED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry_reply(vendor: &[u8; 8]) -> Vec<u8> {
        let mut buf = vec![0u8; INQUIRY_LEN];
        buf[0] = 0x00;
        buf[2] = 0x05;
        buf[8..16].copy_from_slice(vendor);
        buf[16..32].copy_from_slice(b"Samsung SSD 860 ");
        buf[32..36].copy_from_slice(b"1B6Q");
        buf
    }

    #[test]
    fn inquiry_cdb() {
        assert_eq!(build_inquiry(36), [0x12, 0, 0, 0, 36, 0]);
        assert_eq!(build_inquiry(0x0120), [0x12, 0, 0, 0x01, 0x20, 0]);
    }

    #[test]
    fn inquiry_parse() {
        let inq = InquiryResponse::parse(&inquiry_reply(b"ATA     ")).unwrap();
        assert_eq!(inq.version, 5);
        assert_eq!(inq.peripheral_qualifier(), 0);
        assert_eq!(inq.peripheral_device_type(), 0);
        assert_eq!(&inq.product_id, b"Samsung SSD 860 ");
        assert_eq!(&inq.product_rev, b"1B6Q");
        assert!(inq.is_ata());
        assert_eq!(inq.to_string(), "ATA       Samsung SSD 860   1B6Q");
    }

    #[test]
    fn inquiry_vendor_must_match_exactly() {
        for vendor in [b"ATA    \0", b"SEAGATE ", b" ATA    ", b"ata     "] {
            let inq = InquiryResponse::parse(&inquiry_reply(vendor)).unwrap();
            assert!(!inq.is_ata(), "{:?} classified as ATA", vendor);
        }
    }

    #[test]
    fn inquiry_too_short() {
        let err = InquiryResponse::parse(&[0u8; 20]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedResponse {
                command: "INQUIRY",
                len: 20,
                need: INQUIRY_LEN
            }
        ));
    }

    #[test]
    fn read_capacity() {
        assert_eq!(build_read_capacity10(), [0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        let rc = ReadCapacity10::parse(&[0, 0, 0, 0, 0, 0, 2, 0]).unwrap();
        assert_eq!(rc.capacity(), 512);

        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&234_441_647u32.to_be_bytes());
        buf[4..].copy_from_slice(&512u32.to_be_bytes());
        let rc = ReadCapacity10::parse(&buf).unwrap();
        assert_eq!(rc.last_lba, 234_441_647);
        assert_eq!(rc.capacity(), 120_034_123_776);

        let rc = ReadCapacity10::parse(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0x10, 0]).unwrap();
        assert_eq!(rc.capacity(), 0x1_0000_0000 * 4096);
    }

    #[test]
    fn read_capacity_too_short() {
        assert!(matches!(
            ReadCapacity10::parse(&[0u8; 7]),
            Err(Error::MalformedResponse { len: 7, need: 8, .. })
        ));
    }

    #[test]
    fn mode_sense_cdb() {
        assert_eq!(
            build_mode_sense6(RIGID_DISK_GEOMETRY_PAGE, 0, MODE_PAGE_CONTROL_DEFAULT),
            [0x1a, 0, 0x84, 0, 64, 0]
        );
    }

    fn mode_sense_reply(bd_len: u8, page: u8, rpm: u16) -> Vec<u8> {
        let mut buf = vec![0u8; MODE_SENSE_6_LEN];
        let page_offset = 4 + usize::from(bd_len);
        buf[0] = (page_offset + 24 - 1) as u8;
        buf[3] = bd_len;
        buf[page_offset] = page;
        buf[page_offset + 1] = 0x16;
        buf[page_offset + 20..page_offset + 22].copy_from_slice(&rpm.to_be_bytes());
        buf
    }

    #[test]
    fn rotation_rate() {
        assert_eq!(
            parse_rotation_rate(&mode_sense_reply(8, 0x04, 15000)).unwrap(),
            15000
        );
        assert_eq!(
            parse_rotation_rate(&mode_sense_reply(0, 0x84, 7200)).unwrap(),
            7200
        );
    }

    #[test]
    fn rotation_rate_bounds() {
        assert!(matches!(
            parse_rotation_rate(&[0u8; 3]),
            Err(Error::MalformedResponse { need: 4, .. })
        ));

        // block descriptor length pushes the page past the buffer
        let mut buf = mode_sense_reply(0, 0x04, 7200);
        buf[3] = 60;
        assert!(matches!(
            parse_rotation_rate(&buf),
            Err(Error::MalformedResponse { need: 86, .. })
        ));

        // device returned less data than the page needs
        let mut buf = mode_sense_reply(8, 0x04, 7200);
        buf[0] = 11;
        assert!(matches!(
            parse_rotation_rate(&buf),
            Err(Error::MalformedResponse { len: 12, need: 34, .. })
        ));
    }

    #[test]
    fn rotation_rate_wrong_page() {
        assert!(matches!(
            parse_rotation_rate(&mode_sense_reply(8, 0x08, 7200)),
            Err(Error::UnexpectedPage {
                expected: 0x04,
                got: 0x08
            })
        ));
    }

    #[test]
    fn ata_pass_through_cdb() {
        let cdb = build_ata_pass_through16(ATA_IDENTIFY_DEVICE);
        assert_eq!(cdb[0], 0x85);
        assert_eq!(cdb[1], 0x08);
        assert_eq!(cdb[2], 0x0e);
        assert_eq!(cdb[14], 0xec);
        assert_eq!(cdb.len(), 16);
    }

    #[test]
    fn sense_keys() {
        assert_eq!(sense_key(&[]), None);
        assert_eq!(sense_key(&[0u8; 32]), None);
        assert_eq!(sense_key(&[0x70, 0x00, 0x05]), Some(5));
        assert_eq!(sense_key(&[0xf1, 0x00, 0x23]), Some(3));
        assert_eq!(sense_key(&[0x72, 0x0b, 0x00]), Some(0x0b));
        assert_eq!(sense_key(&[0x70, 0x00]), None);
        assert_eq!(sense_key_name(5), "ILLEGAL_REQUEST");
        assert_eq!(sense_key_name(0x0b), "ABORTED_COMMAND");
    }
}
