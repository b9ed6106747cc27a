//! Decoder of the ATA `IDENTIFY_DEVICE` (0xEC) reply.
//!
//! The reply is described in the table 55 of [ATA/ATAPI Command Set](http://t13.org/Documents/UploadedDocuments/docs2017/di529r18-ATAATAPI_Command_Set_-_4.pdf).
//!
//! Due to a 16-bit bus architecture of ATA, that structure contains 256 16-bit words, not 512
//! bytes. Side effect of this layout is that all strings have pairwise swapped letters. String
//! "Abcdef" is stored in memory as "bAdcfe".
//!
//! Numeric values are stored as LE-LE, that is bytes within word are little-endian and for
//! multi-word values words themselves are also little-endian. This is demonstrated in
//! [`IdentifyDeviceData::get_sector_count`].

use std::{fmt, ops::Range};

use crate::{
    error::{Error, Result},
    utils::most_significant_bit,
};

/// Size of the IDENTIFY DEVICE reply in bytes.
pub const IDENTIFY_LEN: usize = 512;

const IDENTIFY_WORDS: usize = IDENTIFY_LEN / 2;

/// Returned by the version and transport decoders for 0x0000 / 0xFFFF words.
pub const NOT_REPORTED: &str = "not reported";

/// Location of a field in IDENTIFY DEVICE data, in 16-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub word: usize,
    pub words: usize,
}

impl Field {
    const fn new(word: usize, words: usize) -> Self {
        Field { word, words }
    }

    /// Word indices covered by the field.
    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.word..self.word + self.words
    }

    /// Byte offsets covered by the field.
    #[inline]
    pub const fn byte_range(&self) -> Range<usize> {
        self.word * 2..(self.word + self.words) * 2
    }
}

/// Word layout per ATA8-ACS. Every other word is reserved for our purposes.
pub mod layout {
    use super::Field;

    pub const SERIAL_NUMBER: Field = Field::new(10, 10);
    pub const FIRMWARE_REVISION: Field = Field::new(23, 4);
    pub const MODEL_NUMBER: Field = Field::new(27, 20);
    pub const MAJOR_VERSION: Field = Field::new(80, 1);
    pub const MINOR_VERSION: Field = Field::new(81, 1);
    pub const COMMAND_SET_ENABLED: Field = Field::new(85, 1);
    pub const COMMAND_SET_DEFAULT: Field = Field::new(87, 1);
    pub const LBA48_SECTORS: Field = Field::new(100, 4);
    pub const SECTOR_SIZE: Field = Field::new(106, 1);
    pub const WWN: Field = Field::new(108, 4);
    pub const ROTATION_RATE: Field = Field::new(217, 1);
    pub const TRANSPORT_MAJOR: Field = Field::new(222, 1);
}

/// Table 47 of T13/2161-D revision 5. Sorted by code.
static ATA_MINOR_VERSIONS: &[(u16, &str)] = &[
    (0x0001, "ATA-1 X3T9.2/781D prior to revision 4"),
    (0x0002, "ATA-1 published, ANSI X3.221-1994"),
    (0x0003, "ATA-1 X3T9.2/781D revision 4"),
    (0x0004, "ATA-2 published, ANSI X3.279-1996"),
    (0x0005, "ATA-2 X3T10/948D prior to revision 2k"),
    (0x0006, "ATA-3 X3T10/2008D revision 1"),
    (0x0007, "ATA-2 X3T10/948D revision 2k"),
    (0x0008, "ATA-3 X3T10/2008D revision 0"),
    (0x0009, "ATA-2 X3T10/948D revision 3"),
    (0x000a, "ATA-3 published, ANSI X3.298-1997"),
    (0x000b, "ATA-3 X3T10/2008D revision 6"),
    (0x000c, "ATA-3 X3T13/2008D revision 7 and 7a"),
    (0x000d, "ATA/ATAPI-4 X3T13/1153D revision 6"),
    (0x000e, "ATA/ATAPI-4 T13/1153D revision 13"),
    (0x000f, "ATA/ATAPI-4 X3T13/1153D revision 7"),
    (0x0010, "ATA/ATAPI-4 T13/1153D revision 18"),
    (0x0011, "ATA/ATAPI-4 T13/1153D revision 15"),
    (0x0012, "ATA/ATAPI-4 published, ANSI NCITS 317-1998"),
    (0x0013, "ATA/ATAPI-5 T13/1321D revision 3"),
    (0x0014, "ATA/ATAPI-4 T13/1153D revision 14"),
    (0x0015, "ATA/ATAPI-5 T13/1321D revision 1"),
    (0x0016, "ATA/ATAPI-5 published, ANSI NCITS 340-2000"),
    (0x0017, "ATA/ATAPI-4 T13/1153D revision 17"),
    (0x0018, "ATA/ATAPI-6 T13/1410D revision 0"),
    (0x0019, "ATA/ATAPI-6 T13/1410D revision 3a"),
    (0x001a, "ATA/ATAPI-7 T13/1532D revision 1"),
    (0x001b, "ATA/ATAPI-6 T13/1410D revision 2"),
    (0x001c, "ATA/ATAPI-6 T13/1410D revision 1"),
    (0x001d, "ATA/ATAPI-7 published, ANSI INCITS 397-2005"),
    (0x001e, "ATA/ATAPI-7 T13/1532D revision 0"),
    (0x001f, "ACS-3 T13/2161-D revision 3b"),
    (0x0021, "ATA/ATAPI-7 T13/1532D revision 4a"),
    (0x0022, "ATA/ATAPI-6 published, ANSI INCITS 361-2002"),
    (0x0027, "ATA8-ACS T13/1699-D revision 3c"),
    (0x0028, "ATA8-ACS T13/1699-D revision 6"),
    (0x0029, "ATA8-ACS T13/1699-D revision 4"),
    (0x0031, "ACS-2 T13/2015-D revision 2"),
    (0x0033, "ATA8-ACS T13/1699-D revision 3e"),
    (0x0039, "ATA8-ACS T13/1699-D revision 4c"),
    (0x0042, "ATA8-ACS T13/1699-D revision 3f"),
    (0x0052, "ATA8-ACS T13/1699-D revision 3b"),
    (0x005e, "ACS-4 T13/BSR INCITS 529 revision 5"),
    (0x006d, "ACS-3 T13/2161-D revision 5"),
    (0x0082, "ACS-2 published, ANSI INCITS 482-2012"),
    (0x0107, "ATA8-ACS T13/1699-D revision 2d"),
    (0x010a, "ACS-3 published, ANSI INCITS 522-2014"),
    (0x0110, "ACS-2 T13/2015-D revision 3"),
    (0x011b, "ACS-3 T13/2161-D revision 4"),
];

/// ATA standard IDENTIFY_DEVICE structure, kept as 256 host-order words.
#[derive(Copy, Clone)]
pub struct IdentifyDeviceData([u16; IDENTIFY_WORDS]);

impl IdentifyDeviceData {
    /// Decode a raw reply. Only the first 512 bytes are used; a shorter reply is refused.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < IDENTIFY_LEN {
            return Err(Error::MalformedResponse {
                command: "ATA IDENTIFY",
                len: buffer.len(),
                need: IDENTIFY_LEN,
            });
        }

        let mut words = [0u16; IDENTIFY_WORDS];
        for (word, pair) in words.iter_mut().zip(buffer.chunks_exact(2)) {
            *word = u16::from_le_bytes([pair[0], pair[1]]);
        }

        Ok(IdentifyDeviceData(words))
    }

    /// Raw word `n` of the structure, `None` past word 255.
    #[inline]
    pub fn word(&self, n: usize) -> Option<u16> {
        self.0.get(n).copied()
    }

    #[inline]
    fn word_at(&self, field: Field) -> u16 {
        self.0[field.word]
    }

    #[inline]
    fn field(&self, field: Field) -> &[u16] {
        &self.0[field.range()]
    }

    /// Return total (LBA48) sector count of disk
    pub fn get_sector_count(&self) -> u64 {
        self.field(layout::LBA48_SECTORS)
            .iter()
            .rev()
            .fold(0u64, |acc, &w| (acc << 16) | u64::from(w))
    }

    /// Return model info of disk
    pub fn get_model(&self) -> String {
        Self::swap_string(self.field(layout::MODEL_NUMBER))
    }

    /// Return serial number of disk
    pub fn get_serial(&self) -> String {
        Self::swap_string(self.field(layout::SERIAL_NUMBER))
    }

    /// Return firmware revision of disk
    pub fn get_firmware(&self) -> String {
        Self::swap_string(self.field(layout::FIRMWARE_REVISION))
    }

    /// World Wide Name as `"NAA OUI UNIQUE-ID"`.
    pub fn get_wwn(&self) -> String {
        let w = self.field(layout::WWN);
        decode_wwn([w[0], w[1], w[2], w[3]])
    }

    /// Logical and physical sector sizes in bytes.
    pub fn get_sector_size(&self) -> (u32, u32) {
        decode_sector_size(self.word_at(layout::SECTOR_SIZE))
    }

    pub fn get_ata_major_version(&self) -> &'static str {
        decode_major_version(self.word_at(layout::MAJOR_VERSION))
    }

    pub fn get_ata_minor_version(&self) -> &'static str {
        decode_minor_version(self.word_at(layout::MINOR_VERSION))
    }

    /// Physical interconnect, e.g. `"Serial ATA SATA 3.0"`.
    pub fn get_transport(&self) -> String {
        decode_transport(self.word_at(layout::TRANSPORT_MAJOR))
    }

    /// Nominal media rotation rate (word 217): 1 for SSD, RPM otherwise.
    pub fn get_rotation_rate(&self) -> u16 {
        self.word_at(layout::ROTATION_RATE)
    }

    /// SMART availability as the smartinfo tool reports it: word 87 bits 15:14 == 01.
    pub fn smart_supported(&self) -> bool {
        self.word_at(layout::COMMAND_SET_DEFAULT) >> 14 == 1
    }

    pub fn smart_enabled(&self) -> bool {
        self.word_at(layout::COMMAND_SET_ENABLED) & 0x1 != 0
    }

    /// Convert un-swapped range into string assuming it is utf8-ish.
    #[inline]
    fn swap_string(words: &[u16]) -> String {
        let raw: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let swapped = swap_bytes(&raw);
        String::from(String::from_utf8_lossy(&swapped).trim())
    }
}

impl fmt::Debug for IdentifyDeviceData {
    /// Return basic drive information
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyDeviceData")
            .field("sectors", &self.get_sector_count())
            .field("model", &self.get_model())
            .field("firmware", &self.get_firmware())
            .field("serial", &self.get_serial())
            .field("wwn", &self.get_wwn())
            .finish()
    }
}

/// Swap every adjacent byte pair (bytes are always pairwise swapped in ATA strings,
/// regardless of host being LE or BE). A trailing odd byte is kept as is.
pub fn swap_bytes(buffer: &[u8]) -> Vec<u8> {
    let mut ans = Vec::with_capacity(buffer.len());

    for pair in buffer.chunks(2) {
        ans.extend(pair.iter().rev());
    }
    ans
}

/// NAA (4 bits), IEEE OUI (24 bits) and vendor unique id (36 bits) from words 108..=111.
pub fn decode_wwn(w: [u16; 4]) -> String {
    let naa = w[0] >> 12;
    let oui = (u32::from(w[0] & 0x0fff) << 12) | (u32::from(w[1]) >> 4);
    let unique_id =
        ((u64::from(w[1]) & 0xf) << 32) | (u64::from(w[2]) << 16) | u64::from(w[3]);

    format!("{:x} {:06x} {:09x}", naa, oui, unique_id)
}

/// Word 106: logical sector is always reported as 512; physical grows by
/// `2^(word & 0xF)` when bits 15:14 are 01 and bit 13 is set.
pub fn decode_sector_size(word: u16) -> (u32, u32) {
    let logical = 512u32;
    let mut physical = 512u32;

    if word & 0xc000 == 0x4000 && word & 0x2000 != 0 {
        physical <<= u32::from(word & 0x000f);
    }

    (logical, physical)
}

pub fn decode_major_version(word: u16) -> &'static str {
    if word == 0 || word == 0xffff {
        return NOT_REPORTED;
    }

    match most_significant_bit(u64::from(word)) {
        1 => "ATA-1",
        2 => "ATA-2",
        3 => "ATA-3",
        4 => "ATA/ATAPI-4",
        5 => "ATA/ATAPI-5",
        6 => "ATA/ATAPI-6",
        7 => "ATA/ATAPI-7",
        8 => "ATA8-ACS",
        9 => "ACS-2",
        10 => "ACS-3",
        _ => "",
    }
}

/// The minor version word is a code, not a bitmask, hence the table lookup.
pub fn decode_minor_version(word: u16) -> &'static str {
    if word == 0 || word == 0xffff {
        return NOT_REPORTED;
    }

    ATA_MINOR_VERSIONS
        .binary_search_by_key(&word, |&(code, _)| code)
        .map(|idx| ATA_MINOR_VERSIONS[idx].1)
        .unwrap_or("unknown")
}

pub fn decode_transport(word: u16) -> String {
    if word == 0 || word == 0xffff {
        return NOT_REPORTED.to_string();
    }

    let minor = word & 0x0fff;
    match word >> 12 {
        0x0 => "Parallel ATA".to_string(),
        0x1 => {
            let revision = match most_significant_bit(u64::from(minor)) {
                0 => "ATA8-AST",
                1 => "SATA 1.0a",
                2 => "SATA II Ext",
                3 => "SATA 2.5",
                4 => "SATA 2.6",
                5 => "SATA 3.0",
                6 => "SATA 3.1",
                7 => "SATA 3.2",
                _ => return format!("Serial ATA SATA ({:#05x})", minor),
            };
            format!("Serial ATA {}", revision)
        }
        0xe => format!("PCIe ({:#05x})", minor),
        _ => format!("Unknown ({:#06x})", word),
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    fn put_word(buf: &mut [u8], n: usize, value: u16) {
        buf[n * 2..n * 2 + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Store `text` the way a drive does: space padded, each byte pair swapped.
    fn put_string(buf: &mut [u8], field: Field, text: &str) {
        let mut padded = text.as_bytes().to_vec();
        padded.resize(field.words * 2, b' ');
        buf[field.byte_range()].copy_from_slice(&swap_bytes(&padded));
    }

    fn sample() -> [u8; IDENTIFY_LEN] {
        let mut buf = [0u8; IDENTIFY_LEN];
        put_string(&mut buf, layout::SERIAL_NUMBER, "WD-WCC4N1234567");
        put_string(&mut buf, layout::FIRMWARE_REVISION, "82.00A82");
        put_string(&mut buf, layout::MODEL_NUMBER, "WDC WD10EFRX-68FYTN0");
        put_word(&mut buf, 80, 0x03fc);
        put_word(&mut buf, 81, 0x0110);
        put_word(&mut buf, 85, 0x7469);
        put_word(&mut buf, 87, 0x6163);
        put_word(&mut buf, 100, 0x6db0);
        put_word(&mut buf, 101, 0x7470);
        put_word(&mut buf, 106, 0x6003);
        put_word(&mut buf, 108, 0x5001);
        put_word(&mut buf, 109, 0x4ee6);
        put_word(&mut buf, 110, 0x5b1c);
        put_word(&mut buf, 111, 0x0d2f);
        put_word(&mut buf, 217, 5400);
        put_word(&mut buf, 222, 0x10ff);
        buf
    }

    #[test]
    fn check_struct_sizes() {
        assert_eq!(
            mem::size_of::<IdentifyDeviceData>(),
            IDENTIFY_LEN,
            "IdentifyDeviceData size not 512"
        );
    }

    #[test]
    fn layout_fits_in_reply() {
        for field in [
            layout::SERIAL_NUMBER,
            layout::FIRMWARE_REVISION,
            layout::MODEL_NUMBER,
            layout::WWN,
            layout::TRANSPORT_MAJOR,
        ] {
            assert!(field.byte_range().end <= IDENTIFY_LEN);
        }
        assert_eq!(layout::SERIAL_NUMBER.byte_range(), 20..40);
        assert_eq!(layout::FIRMWARE_REVISION.byte_range(), 46..54);
        assert_eq!(layout::MODEL_NUMBER.byte_range(), 54..94);
        assert_eq!(layout::WWN.byte_range(), 216..224);
    }

    #[test]
    fn short_reply_refused() {
        let err = IdentifyDeviceData::from_bytes(&[0u8; 511]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedResponse {
                len: 511,
                need: IDENTIFY_LEN,
                ..
            }
        ));
    }

    #[test]
    fn raw_words() {
        let id = IdentifyDeviceData::from_bytes(&sample()).unwrap();
        assert_eq!(id.word(0), Some(0));
        assert_eq!(id.word(222), Some(0x10ff));
        assert_eq!(id.word(255), Some(0));
        assert_eq!(id.word(256), None);
        assert_eq!(id.word(usize::MAX), None);
    }

    #[test]
    fn strings() {
        let id = IdentifyDeviceData::from_bytes(&sample()).unwrap();
        assert_eq!(id.get_serial(), "WD-WCC4N1234567");
        assert_eq!(id.get_firmware(), "82.00A82");
        assert_eq!(id.get_model(), "WDC WD10EFRX-68FYTN0");
    }

    #[test]
    fn numeric_fields() {
        let id = IdentifyDeviceData::from_bytes(&sample()).unwrap();
        assert_eq!(id.get_sector_count(), 0x7470_6db0);
        assert_eq!(id.get_sector_size(), (512, 4096));
        assert_eq!(id.get_rotation_rate(), 5400);
        assert_eq!(id.get_ata_major_version(), "ACS-2");
        assert_eq!(id.get_ata_minor_version(), "ACS-2 T13/2015-D revision 3");
        assert_eq!(id.get_transport(), "Serial ATA SATA 3.2");
        assert_eq!(id.get_wwn(), "5 0014ee 65b1c0d2f");
        assert!(id.smart_supported());
        assert!(id.smart_enabled());
    }

    #[test]
    fn longer_reply_uses_first_sector() {
        let mut buf = sample().to_vec();
        buf.extend_from_slice(&[0xff; 64]);
        let id = IdentifyDeviceData::from_bytes(&buf).unwrap();
        assert_eq!(id.get_rotation_rate(), 5400);
    }

    #[test]
    fn swap_is_involutive() {
        let data: Vec<u8> = (0u8..=40).collect();
        assert_eq!(swap_bytes(&swap_bytes(&data)), data);
        assert_eq!(swap_bytes(b"bAdcfe"), b"Abcdef".to_vec());
    }

    #[test]
    fn wwn_known_vector() {
        assert_eq!(
            decode_wwn([0x5000, 0xc500, 0x0012, 0x3456]),
            "5 000c50 000123456"
        );
    }

    #[test]
    fn sector_sizes() {
        assert_eq!(decode_sector_size(0x0000), (512, 512));
        assert_eq!(decode_sector_size(0x6001), (512, 1024));
        // bit 13 clear: no multiple reported
        assert_eq!(decode_sector_size(0x4003), (512, 512));
        // bits 15:14 invalid
        assert_eq!(decode_sector_size(0xe003), (512, 512));
        assert_eq!(decode_sector_size(0x600f), (512, 512 << 15));
    }

    #[test]
    fn major_versions() {
        assert_eq!(decode_major_version(0x0000), NOT_REPORTED);
        assert_eq!(decode_major_version(0xffff), NOT_REPORTED);
        assert_eq!(decode_major_version(0x0010), "ATA/ATAPI-4");
        assert_eq!(decode_major_version(0x07fe), "ACS-3");
        assert_eq!(decode_major_version(0x0001), "");
        assert_eq!(decode_major_version(0x0800), "");
    }

    #[test]
    fn minor_versions() {
        assert_eq!(decode_minor_version(0x0000), NOT_REPORTED);
        assert_eq!(decode_minor_version(0xffff), NOT_REPORTED);
        assert_eq!(
            decode_minor_version(0x0082),
            "ACS-2 published, ANSI INCITS 482-2012"
        );
        assert_eq!(decode_minor_version(0x0001), "ATA-1 X3T9.2/781D prior to revision 4");
        assert_eq!(decode_minor_version(0x011b), "ACS-3 T13/2161-D revision 4");
        assert_eq!(decode_minor_version(0xbeef), "unknown");
    }

    #[test]
    fn minor_table_sorted() {
        assert!(ATA_MINOR_VERSIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn transports() {
        assert_eq!(decode_transport(0x0000), NOT_REPORTED);
        assert_eq!(decode_transport(0xffff), NOT_REPORTED);
        assert_eq!(decode_transport(0x0020), "Parallel ATA");
        assert_eq!(decode_transport(0x1000), "Serial ATA ATA8-AST");
        assert_eq!(decode_transport(0x1001), "Serial ATA ATA8-AST");
        assert_eq!(decode_transport(0x1005), "Serial ATA SATA II Ext");
        assert_eq!(decode_transport(0x1020), "Serial ATA SATA 3.0");
        assert_eq!(decode_transport(0x10ff), "Serial ATA SATA 3.2");
        assert_eq!(decode_transport(0x1100), "Serial ATA SATA (0x100)");
        assert_eq!(decode_transport(0xe012), "PCIe (0x012)");
        assert_eq!(decode_transport(0x7abc), "Unknown (0x7abc)");
    }
}
