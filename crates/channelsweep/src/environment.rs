//! Host capability checks.
//!
//! Before touching any hardware the driver makes sure the external tools are
//! installed and the capture tool is recent enough.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("static version pattern")
    })
}

/// A `major.minor.patch` tool version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version (0 when the tool omits it).
    pub patch: u32,
}

impl ToolVersion {
    /// Create a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Find the first version number in free-form `--version` output.
    ///
    /// `TShark (Wireshark) 3.6.2 (Git v3.6.2 packaged as 3.6.2-2)` yields 3.6.2.
    #[must_use]
    pub fn find_in(output: &str) -> Option<Self> {
        let caps = version_regex().captures(output)?;
        let major = caps[1].parse().ok()?;
        let minor = caps[2].parse().ok()?;
        let patch = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ToolVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let whole = version_regex()
            .find(trimmed)
            .is_some_and(|m| m.start() == 0 && m.end() == trimmed.len());
        if !whole {
            return Err(Error::config_validation(format!(
                "'{trimmed}' is not a version (expected MAJOR.MINOR[.PATCH])"
            )));
        }
        Self::find_in(trimmed).ok_or_else(|| {
            Error::config_validation(format!("version '{trimmed}' is out of range"))
        })
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ToolVersion> for String {
    fn from(v: ToolVersion) -> Self {
        v.to_string()
    }
}

/// What a controller found out about the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentReport {
    /// The tool whose version gates the run.
    pub tool: String,
    /// Its version, if it could be determined.
    pub version: Option<ToolVersion>,
    /// Required tools that are not installed.
    pub missing_tools: Vec<String>,
}

impl EnvironmentReport {
    /// Check the report against a minimum version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnsupported`] naming what is missing or too old.
    pub fn require(&self, minimum: ToolVersion) -> Result<()> {
        if !self.missing_tools.is_empty() {
            return Err(Error::environment_unsupported(format!(
                "required tools not found on PATH: {}",
                self.missing_tools.join(", ")
            )));
        }
        match self.version {
            None => Err(Error::environment_unsupported(format!(
                "could not determine the version of {}",
                self.tool
            ))),
            Some(version) if version < minimum => Err(Error::environment_unsupported(format!(
                "{} {version} is older than the required {minimum}",
                self.tool
            ))),
            Some(_) => Ok(()),
        }
    }
}

/// Locate an executable the way a shell would.
///
/// Names containing a path separator are checked as given; bare names are
/// searched in `PATH`.
#[must_use]
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_tshark_output() {
        let output = "TShark (Wireshark) 3.6.2 (Git v3.6.2 packaged as 3.6.2-2)\n\nCopyright 1998-2022";
        assert_eq!(ToolVersion::find_in(output), Some(ToolVersion::new(3, 6, 2)));
    }

    #[test]
    fn test_find_in_two_part_version() {
        assert_eq!(
            ToolVersion::find_in("Aircrack-ng 1.7"),
            Some(ToolVersion::new(1, 7, 0))
        );
        assert_eq!(ToolVersion::find_in("no digits here"), None);
    }

    #[test]
    fn test_version_ordering() {
        assert!(ToolVersion::new(3, 6, 2) > ToolVersion::new(3, 0, 0));
        assert!(ToolVersion::new(2, 99, 99) < ToolVersion::new(3, 0, 0));
        assert!(ToolVersion::new(3, 0, 1) > ToolVersion::new(3, 0, 0));
        assert_eq!(ToolVersion::new(3, 0, 0), ToolVersion::new(3, 0, 0));
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("3.0".parse::<ToolVersion>().unwrap(), ToolVersion::new(3, 0, 0));
        assert_eq!(
            " 4.2.1 ".parse::<ToolVersion>().unwrap(),
            ToolVersion::new(4, 2, 1)
        );
        assert!("three".parse::<ToolVersion>().is_err());
        assert!("v3.0".parse::<ToolVersion>().is_err());
        assert!("3".parse::<ToolVersion>().is_err());
    }

    #[test]
    fn test_version_serde_as_string() {
        let v = ToolVersion::new(3, 6, 2);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.6.2\"");
        let back: ToolVersion = serde_json::from_str("\"3.6.2\"").unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_report_require_ok() {
        let report = EnvironmentReport {
            tool: "tshark".to_string(),
            version: Some(ToolVersion::new(3, 6, 2)),
            missing_tools: Vec::new(),
        };
        assert!(report.require(ToolVersion::new(3, 0, 0)).is_ok());
        assert!(report.require(ToolVersion::new(3, 6, 2)).is_ok());
    }

    #[test]
    fn test_report_require_too_old() {
        let report = EnvironmentReport {
            tool: "tshark".to_string(),
            version: Some(ToolVersion::new(2, 6, 10)),
            missing_tools: Vec::new(),
        };
        let err = report.require(ToolVersion::new(3, 0, 0)).unwrap_err();
        assert!(err.is_environment_unsupported());
        assert!(err.to_string().contains("2.6.10"));
        assert!(err.to_string().contains("3.0.0"));
    }

    #[test]
    fn test_report_require_missing_tools() {
        let report = EnvironmentReport {
            tool: "tshark".to_string(),
            version: Some(ToolVersion::new(4, 0, 0)),
            missing_tools: vec!["airmon-ng".to_string()],
        };
        let err = report.require(ToolVersion::new(3, 0, 0)).unwrap_err();
        assert!(err.to_string().contains("airmon-ng"));
    }

    #[test]
    fn test_report_require_unknown_version() {
        let report = EnvironmentReport {
            tool: "tshark".to_string(),
            version: None,
            missing_tools: Vec::new(),
        };
        assert!(report.require(ToolVersion::new(3, 0, 0)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("/bin/sh").is_some());
        assert!(find_executable("definitely-not-a-real-tool-xyz").is_none());
        assert!(find_executable("/nonexistent/tool").is_none());
    }
}
