//! Linux-specific implementation for channelsweep.
//!
//! This crate holds the pieces of channelsweep that only make sense on Linux:
//! reading interface facts out of sysfs and procfs, and parsing the output of
//! the `iw` and `airmon-ng` tools that drive the wireless hardware.

#![cfg(target_os = "linux")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod airmon;
pub mod iw;
pub mod sysfs;

pub use airmon::{parse_adapter_table, parse_monitor_interface, Adapter, MonitorInterface};
pub use iw::{classify_error, parse_channels, IwErrorKind};
pub use sysfs::{effective_uid, interface_exists, phy_name, SysfsError};

/// Initialize Linux-specific components.
///
/// Interface control and raw capture need root (or `CAP_NET_ADMIN` and
/// `CAP_NET_RAW`). A missing privilege is not fatal here because the tools
/// themselves report it, but it is worth a warning up front.
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    match effective_uid() {
        Ok(0) => tracing::debug!("Running with root privileges"),
        Ok(uid) => tracing::warn!(uid, "Not running as root; interface control may be denied"),
        Err(e) => tracing::warn!(error = %e, "Could not determine effective uid"),
    }
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(platform_name(), "Linux");
    }
}
