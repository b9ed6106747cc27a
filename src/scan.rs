//! Discovery of SCSI disk nodes (`/dev/sd*` without a partition number).

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

pub const DEV_DIR: &str = "/dev";

/// `sd` followed by at least one character, not ending in a digit.
pub fn is_disk_name(name: &str) -> bool {
    name.len() > 2 && name.starts_with("sd") && !name.ends_with(|c: char| c.is_ascii_digit())
}

/// All SCSI disks under `/dev`, sorted.
pub fn scan_devices() -> Vec<PathBuf> {
    scan_dir(Path::new(DEV_DIR))
}

/// Disk nodes in `dir`, sorted. An unreadable directory yields no devices.
pub fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut devices: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().map_or(false, is_disk_name))
        .map(|entry| entry.path())
        .collect();
    devices.sort();

    debug!("found {} disk(s) in {}", devices.len(), dir.display());
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(is_disk_name("sda"));
        assert!(is_disk_name("sdab"));
        assert!(!is_disk_name("sd"));
        assert!(!is_disk_name("sda1"));
        assert!(!is_disk_name("sdab12"));
        assert!(!is_disk_name("nvme0n1"));
        assert!(!is_disk_name("sr0"));
    }

    #[test]
    fn directory() {
        let dir = std::env::temp_dir().join(format!("pakr-smartinfo-scan-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["sdb", "sda", "sda1", "sdab", "nvme0n1", "loop0"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let found = scan_dir(&dir);
        assert_eq!(
            found,
            vec![dir.join("sda"), dir.join("sdab"), dir.join("sdb")]
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory() {
        assert!(scan_dir(Path::new("/this/does/not/exist")).is_empty());
    }
}
