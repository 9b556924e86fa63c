//! Parsing of `airmon-ng` output.
//!
//! `airmon-ng` prints free-form text meant for humans. The formats handled
//! here are the ones produced by aircrack-ng 1.6 and later:
//!
//! ```text
//! PHY     Interface       Driver          Chipset
//!
//! phy1    wlan1           mt76x0u         MediaTek Inc. MT7610U
//!
//!                 (mac80211 monitor mode vif enabled for [phy1]wlan1 on [phy1]wlan1mon)
//!                 (mac80211 station mode vif disabled for [phy1]wlan1)
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// A wireless adapter listed by `airmon-ng`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    /// Physical device name (`phyN`).
    pub phy: String,
    /// Interface name.
    pub interface: String,
    /// Kernel driver.
    pub driver: String,
    /// Chipset description, possibly empty.
    pub chipset: String,
}

/// The monitor-mode interface reported by `airmon-ng start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInterface {
    /// Physical device name, when the output includes it.
    pub phy: Option<String>,
    /// Name of the interface now in monitor mode.
    pub interface: String,
}

fn adapter_regex() -> &'static Regex {
    static ADAPTER: OnceLock<Regex> = OnceLock::new();
    ADAPTER.get_or_init(|| {
        Regex::new(r"^(phy\d+)\s+([A-Za-z0-9_.-]+)\s+(\S+)\s*(.*?)\s*$")
            .expect("static adapter pattern")
    })
}

fn already_enabled_regex() -> &'static Regex {
    static ALREADY: OnceLock<Regex> = OnceLock::new();
    ALREADY.get_or_init(|| {
        Regex::new(r"monitor mode already enabled for \[(phy\d+)\]([A-Za-z0-9_.-]+)")
            .expect("static already-enabled pattern")
    })
}

fn enabled_regex() -> &'static Regex {
    static ENABLED: OnceLock<Regex> = OnceLock::new();
    ENABLED.get_or_init(|| {
        Regex::new(
            r"monitor mode (?:vif )?enabled (?:for \[phy\d+\][A-Za-z0-9_.-]+ )?on \[(phy\d+)\]([A-Za-z0-9_.-]+)",
        )
        .expect("static enabled pattern")
    })
}

fn bare_enabled_regex() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| {
        Regex::new(r"monitor mode enabled on ([A-Za-z0-9_.-]+)").expect("static bare pattern")
    })
}

/// Parse the adapter table printed by a bare `airmon-ng` invocation.
#[must_use]
pub fn parse_adapter_table(output: &str) -> Vec<Adapter> {
    output
        .lines()
        .filter_map(|line| adapter_regex().captures(line.trim()))
        .map(|caps| Adapter {
            phy: caps[1].to_string(),
            interface: caps[2].to_string(),
            driver: caps[3].to_string(),
            chipset: caps[4].to_string(),
        })
        .collect()
}

/// Find the monitor-mode interface in the output of `airmon-ng start`.
#[must_use]
pub fn parse_monitor_interface(output: &str) -> Option<MonitorInterface> {
    if let Some(caps) = already_enabled_regex().captures(output) {
        return Some(MonitorInterface {
            phy: Some(caps[1].to_string()),
            interface: caps[2].to_string(),
        });
    }
    if let Some(caps) = enabled_regex().captures(output) {
        return Some(MonitorInterface {
            phy: Some(caps[1].to_string()),
            interface: caps[2].to_string(),
        });
    }
    bare_enabled_regex()
        .captures(output)
        .map(|caps| MonitorInterface {
            phy: None,
            interface: caps[1].to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\

PHY\tInterface\tDriver\t\tChipset

phy0\twlan0\t\tbrcmfmac\tBroadcom 43430
phy1\twlx00c0cab400dd\tmt76x0u\t\tMediaTek Inc. MT7610U

";

    #[test]
    fn test_parse_adapter_table() {
        let adapters = parse_adapter_table(TABLE);
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].phy, "phy0");
        assert_eq!(adapters[0].interface, "wlan0");
        assert_eq!(adapters[0].driver, "brcmfmac");
        assert_eq!(adapters[0].chipset, "Broadcom 43430");
        assert_eq!(adapters[1].interface, "wlx00c0cab400dd");
        assert_eq!(adapters[1].driver, "mt76x0u");
        assert_eq!(adapters[1].chipset, "MediaTek Inc. MT7610U");
    }

    #[test]
    fn test_parse_adapter_table_skips_header() {
        let adapters = parse_adapter_table("PHY\tInterface\tDriver\t\tChipset\n");
        assert!(adapters.is_empty());
    }

    #[test]
    fn test_parse_monitor_vif_enabled() {
        let output = "\
PHY\tInterface\tDriver\t\tChipset

phy1\twlan1\t\tmt76x0u\t\tMediaTek Inc. MT7610U

\t\t(mac80211 monitor mode vif enabled for [phy1]wlan1 on [phy1]wlan1mon)
\t\t(mac80211 station mode vif disabled for [phy1]wlan1)
";
        let mon = parse_monitor_interface(output).unwrap();
        assert_eq!(mon.phy.as_deref(), Some("phy1"));
        assert_eq!(mon.interface, "wlan1mon");
    }

    #[test]
    fn test_parse_monitor_already_enabled() {
        let output = "\t\t(mac80211 monitor mode already enabled for [phy1]wlan1mon on [phy1]10)\n";
        let mon = parse_monitor_interface(output).unwrap();
        assert_eq!(mon.phy.as_deref(), Some("phy1"));
        assert_eq!(mon.interface, "wlan1mon");
    }

    #[test]
    fn test_parse_monitor_bare() {
        let output = "Interface\tChipset\t\tDriver\n\nwlan1\t\tRalink\trt2800usb (monitor mode enabled on mon0)\n";
        let mon = parse_monitor_interface(output).unwrap();
        assert_eq!(mon.phy, None);
        assert_eq!(mon.interface, "mon0");
    }

    #[test]
    fn test_parse_monitor_missing() {
        assert!(parse_monitor_interface("No such device").is_none());
    }
}
