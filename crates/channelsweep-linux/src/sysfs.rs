//! Interface and process facts read from `/sys` and `/proc`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const SYS_CLASS_NET: &str = "/sys/class/net";
const PROC_SELF_STATUS: &str = "/proc/self/status";

/// Errors from reading kernel-exported files.
#[derive(Debug, Error)]
pub enum SysfsError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A file was read but its contents were not what the kernel documents.
    #[error("unexpected contents in {path}: {contents:?}")]
    UnexpectedContents {
        /// The file that was read.
        path: PathBuf,
        /// What the file contained.
        contents: String,
    },
}

/// Result type for sysfs lookups.
pub type Result<T> = std::result::Result<T, SysfsError>;

fn phy_regex() -> &'static Regex {
    static PHY: OnceLock<Regex> = OnceLock::new();
    PHY.get_or_init(|| Regex::new(r"^phy\d+$").expect("static phy pattern"))
}

/// Check whether a network interface with this name exists.
#[must_use]
pub fn interface_exists(name: &str) -> bool {
    interface_exists_in(Path::new(SYS_CLASS_NET), name)
}

fn interface_exists_in(root: &Path, name: &str) -> bool {
    // Guard against names that would escape the sysfs directory.
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return false;
    }
    root.join(name).exists()
}

/// Get the physical wireless device (`phyN`) backing an interface.
///
/// # Errors
///
/// Returns an error if the interface has no `phy80211` link (it is not a
/// wireless interface, or does not exist) or the name is malformed.
pub fn phy_name(interface: &str) -> Result<String> {
    phy_name_in(Path::new(SYS_CLASS_NET), interface)
}

fn phy_name_in(root: &Path, interface: &str) -> Result<String> {
    let path = root.join(interface).join("phy80211").join("name");
    let contents = fs::read_to_string(&path).map_err(|source| SysfsError::Read {
        path: path.clone(),
        source,
    })?;
    let phy = contents.trim();
    if !phy_regex().is_match(phy) {
        return Err(SysfsError::UnexpectedContents {
            path,
            contents: phy.to_string(),
        });
    }
    Ok(phy.to_string())
}

/// Get the effective uid of the current process.
///
/// # Errors
///
/// Returns an error if `/proc/self/status` cannot be read or has no `Uid:` line.
pub fn effective_uid() -> Result<u32> {
    let path = PathBuf::from(PROC_SELF_STATUS);
    let status = fs::read_to_string(&path).map_err(|source| SysfsError::Read {
        path: path.clone(),
        source,
    })?;
    parse_effective_uid(&status).ok_or(SysfsError::UnexpectedContents {
        path,
        contents: "no Uid line".to_string(),
    })
}

/// `Uid:` lists real, effective, saved and filesystem uids in that order.
fn parse_effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().nth(1))
        .and_then(|uid| uid.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "channelsweep-linux-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_effective_uid() {
        let status = "Name:\tchsweep\nUmask:\t0022\nUid:\t1000\t0\t0\t0\nGid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(parse_effective_uid(status), Some(0));
    }

    #[test]
    fn test_parse_effective_uid_missing() {
        assert_eq!(parse_effective_uid("Name:\tchsweep\n"), None);
        assert_eq!(parse_effective_uid("Uid:\t1000\n"), None);
    }

    #[test]
    fn test_effective_uid_reads_proc() {
        assert!(effective_uid().is_ok());
    }

    #[test]
    fn test_interface_exists_in() {
        let root = scratch_dir("exists");
        fs::create_dir_all(root.join("wlan1")).unwrap();

        assert!(interface_exists_in(&root, "wlan1"));
        assert!(!interface_exists_in(&root, "wlan2"));
        assert!(!interface_exists_in(&root, ""));
        assert!(!interface_exists_in(&root, ".."));
        assert!(!interface_exists_in(&root, "wlan1/../wlan1"));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_phy_name_in() {
        let root = scratch_dir("phy");
        let phy_dir = root.join("wlan1mon").join("phy80211");
        fs::create_dir_all(&phy_dir).unwrap();
        fs::write(phy_dir.join("name"), "phy1\n").unwrap();

        assert_eq!(phy_name_in(&root, "wlan1mon").unwrap(), "phy1");

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_phy_name_rejects_garbage() {
        let root = scratch_dir("phy-garbage");
        let phy_dir = root.join("wlan0").join("phy80211");
        fs::create_dir_all(&phy_dir).unwrap();
        fs::write(phy_dir.join("name"), "phy1wlan1mon").unwrap();

        let err = phy_name_in(&root, "wlan0").unwrap_err();
        assert!(matches!(err, SysfsError::UnexpectedContents { .. }));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_phy_name_missing_interface() {
        let root = scratch_dir("phy-missing");
        let err = phy_name_in(&root, "eth0").unwrap_err();
        assert!(matches!(err, SysfsError::Read { .. }));
        assert!(err.to_string().contains("phy80211"));
        fs::remove_dir_all(root).unwrap();
    }
}
