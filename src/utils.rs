//! Small bit and formatting helpers.

use std::fmt;

/// Byte order of the host running the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of this host.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Little
        } else {
            Endian::Big
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Little => f.write_str("little-endian"),
            Endian::Big => f.write_str("big-endian"),
        }
    }
}

/// Zero-based index of the most significant set bit. Returns 0 for 0.
#[inline]
pub fn most_significant_bit(x: u64) -> u32 {
    if x == 0 {
        0
    } else {
        63 - x.leading_zeros()
    }
}

/// Format a byte count using decimal units with up to 3 significant digits,
/// e.g. `120034123776` -> `"120 GB"`.
pub fn convert_bytes(v: u64) -> String {
    const SUFFIXES: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

    let mut d: u64 = 1;
    let mut i = 0;
    while i < SUFFIXES.len() - 1 && v / d >= 1000 {
        d *= 1000;
        i += 1;
    }

    if i == 0 {
        return format!("{} {}", v, SUFFIXES[0]);
    }

    let scaled = v as f64 / d as f64;
    let precision = match scaled {
        x if x >= 100.0 => 0,
        x if x >= 10.0 => 1,
        _ => 2,
    };
    let mut digits = format!("{:.*}", precision, scaled);
    if digits.contains('.') {
        let trimmed = digits.trim_end_matches('0').trim_end_matches('.').len();
        digits.truncate(trimmed);
    }

    format!("{} {}", digits, SUFFIXES[i])
}

/// Human readable form of IDENTIFY word 217 / MODE SENSE page 4 rotation rate.
pub fn describe_rotation_rate(rate: u16) -> String {
    match rate {
        0 => "not reported".to_string(),
        1 => "Solid State Device".to_string(),
        0x0401..=0xFFFE => format!("{} rpm", rate),
        _ => format!("reserved ({:#06x})", rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb() {
        assert_eq!(most_significant_bit(0), 0);
        assert_eq!(most_significant_bit(1), 0);
        assert_eq!(most_significant_bit(0x0010), 4);
        assert_eq!(most_significant_bit(0x0ff0), 11);
        assert_eq!(most_significant_bit(u64::MAX), 63);
    }

    #[test]
    fn bytes_plain() {
        assert_eq!(convert_bytes(0), "0 B");
        assert_eq!(convert_bytes(512), "512 B");
        assert_eq!(convert_bytes(999), "999 B");
    }

    #[test]
    fn bytes_scaled() {
        assert_eq!(convert_bytes(1000), "1 KB");
        assert_eq!(convert_bytes(1500), "1.5 KB");
        assert_eq!(convert_bytes(12_345_678), "12.3 MB");
        assert_eq!(convert_bytes(120_034_123_776), "120 GB");
        assert_eq!(convert_bytes(4_000_787_030_016), "4 TB");
    }

    #[test]
    fn bytes_no_overflow_at_top() {
        assert_eq!(convert_bytes(u64::MAX), "18.4 EB");
    }

    #[test]
    fn rotation() {
        assert_eq!(describe_rotation_rate(0), "not reported");
        assert_eq!(describe_rotation_rate(1), "Solid State Device");
        assert_eq!(describe_rotation_rate(7200), "7200 rpm");
        assert_eq!(describe_rotation_rate(0x0200), "reserved (0x0200)");
    }

    #[test]
    fn native_endian_matches_target() {
        let probe = u16::from_ne_bytes([1, 0]);
        let expected = if probe == 1 { Endian::Little } else { Endian::Big };
        assert_eq!(Endian::native(), expected);
    }
}
