//! Wireless interface identity and the radio state the driver believes it set.
//!
//! The authoritative interface state lives in the kernel. The driver never
//! reads it back; instead every control call reports the state it asked for,
//! and the driver keeps that trail.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::{Error, Result};

/// Linux limits interface names to `IFNAMSIZ - 1` bytes.
const MAX_INTERFACE_NAME_LEN: usize = 15;

fn name_regex() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static interface name pattern"))
}

/// A validated network interface name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Validate an interface name.
    ///
    /// Names are passed as arguments to external tools, so only the
    /// characters the kernel itself allows are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterface`] for empty, overlong or
    /// otherwise malformed names.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty".to_string())
        } else if name.len() > MAX_INTERFACE_NAME_LEN {
            Some(format!("longer than {MAX_INTERFACE_NAME_LEN} characters"))
        } else if name == "." || name == ".." || !name_regex().is_match(&name) {
            Some("contains characters not allowed in interface names".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidInterface { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Derive the predictable interface name systemd/udev assigns to a USB
    /// adapter from its MAC address (`wlx` followed by the 12 hex digits).
    ///
    /// Separators (`:` or `-`) are accepted and stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterface`] unless the address has exactly
    /// 12 hex digits.
    pub fn from_mac(mac: &str) -> Result<Self> {
        let digits: String = mac
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInterface {
                name: mac.to_string(),
                reason: "MAC address must have 12 hex digits".to_string(),
            });
        }
        Self::new(format!("wlx{digits}"))
    }

    /// The interface name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InterfaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for InterfaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for InterfaceId {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        Self::new(name)
    }
}

impl From<InterfaceId> for String {
    fn from(id: InterfaceId) -> Self {
        id.0
    }
}

/// Operating mode of a wireless interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioMode {
    /// Normal station mode.
    Managed,
    /// Monitor mode: all frames on the tuned channel are delivered.
    Monitor,
    /// Not yet known to the driver.
    #[default]
    Unknown,
}

impl fmt::Display for RadioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Monitor => write!(f, "monitor"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The state an interface was asked to be in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioInterfaceState {
    /// The interface the state applies to.
    pub interface: InterfaceId,
    /// Operating mode.
    pub mode: RadioMode,
    /// Tuned channel, if one was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl RadioInterfaceState {
    /// State of an interface the driver has not touched yet.
    #[must_use]
    pub fn unknown(interface: InterfaceId) -> Self {
        Self {
            interface,
            mode: RadioMode::Unknown,
            channel: None,
        }
    }

    /// State right after monitor mode was requested.
    #[must_use]
    pub fn monitor(interface: InterfaceId) -> Self {
        Self {
            interface,
            mode: RadioMode::Monitor,
            channel: None,
        }
    }

    /// The same interface, retuned to `channel`.
    #[must_use]
    pub fn tuned(&self, channel: Channel) -> Self {
        Self {
            interface: self.interface.clone(),
            mode: self.mode,
            channel: Some(channel),
        }
    }

    /// Check whether the interface is believed to be in monitor mode.
    #[must_use]
    pub fn is_monitor(&self) -> bool {
        self.mode == RadioMode::Monitor
    }
}

impl fmt::Display for RadioInterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "{} ({}, channel {channel})", self.interface, self.mode),
            None => write!(f, "{} ({})", self.interface, self.mode),
        }
    }
}
