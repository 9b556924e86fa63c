//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::channel::ChannelList;
use crate::config::Config;
use crate::error::{Error, Result};

/// Run a channel sweep.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Wireless interface to use (e.g. wlan1)
    #[arg(short, long, value_name = "NAME")]
    pub interface: Option<String>,

    /// MAC address of a USB adapter; its wlx… interface name is tried first
    #[arg(long, value_name = "MAC")]
    pub mac: Option<String>,

    /// Channels to visit, in order (e.g. 1,6,11,36)
    #[arg(long, value_name = "LIST", value_parser = parse_channel_list)]
    pub channels: Option<ChannelList>,

    /// Capture file (replaced on every run)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Seconds to stay on each channel (decimals allowed)
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub dwell: Option<Duration>,

    /// Longest wait for the capture tool to start, in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub warmup: Option<Duration>,

    /// Number of passes over the channel list
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: Option<u32>,

    /// Don't stop network managers before enabling monitor mode
    #[arg(long)]
    pub no_kill: bool,

    /// Skip the installed-tools check
    #[arg(long)]
    pub skip_env_check: bool,

    /// Print what would be done without touching the hardware
    #[arg(long)]
    pub dry_run: bool,

    /// Output the result as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl RunCommand {
    /// Apply the command-line overrides to `config` and revalidate it.
    ///
    /// An explicit `--interface` replaces both the configured name and MAC.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(name) = &self.interface {
            config.interface.name = Some(name.clone());
            config.interface.mac_address.clone_from(&self.mac);
        } else if let Some(mac) = &self.mac {
            config.interface.mac_address = Some(mac.clone());
        }
        if let Some(channels) = &self.channels {
            config.sweep.channels = channels.numbers();
        }
        if let Some(output) = &self.output {
            config.capture.output_path = Some(output.clone());
        }
        if let Some(dwell) = self.dwell {
            config.sweep.dwell_ms = millis(dwell)?;
        }
        if let Some(warmup) = self.warmup {
            config.capture.warmup_ms = millis(warmup)?;
        }
        if let Some(passes) = self.passes {
            config.sweep.passes = passes;
        }
        if self.no_kill {
            config.interface.kill_conflicting = false;
        }
        if self.skip_env_check {
            config.environment.check = false;
        }
        config.validate()
    }
}

/// Check that the host has the required tools.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// List the channels an adapter supports.
#[derive(Debug, Args)]
pub struct ChannelsCommand {
    /// Interface to query (defaults to the configured one)
    #[arg(short, long, value_name = "NAME")]
    pub interface: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Parse a non-negative number of seconds such as `0.5`.
///
/// Timings are kept in whole milliseconds, so the value is rounded to the
/// nearest one. A non-zero value that would round to nothing is refused.
///
/// # Errors
///
/// Returns a message for negative, non-finite, malformed or sub-millisecond
/// values.
pub fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{s}' must be a non-negative number of seconds"));
    }
    let ms = (secs * 1000.0).round();
    if secs > 0.0 && ms < 1.0 {
        return Err(format!("'{s}' is shorter than the 1 ms resolution"));
    }
    // Float to int casts saturate; anything that large is refused later.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ms = ms as u64;
    Ok(Duration::from_millis(ms))
}

fn parse_channel_list(s: &str) -> std::result::Result<ChannelList, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

fn millis(duration: Duration) -> Result<u64> {
    let ms = u64::try_from(duration.as_millis())
        .map_err(|_| Error::config_validation(format!("{duration:?} is too long")))?;
    if ms == 0 && !duration.is_zero() {
        return Err(Error::config_validation(format!(
            "{duration:?} is shorter than the 1 ms resolution"
        )));
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_run() -> RunCommand {
        RunCommand {
            interface: None,
            mac: None,
            channels: None,
            output: None,
            dwell: None,
            warmup: None,
            passes: None,
            no_kill: false,
            skip_env_check: false,
            dry_run: false,
            json: false,
        }
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("0.1").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_seconds("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_seconds("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_seconds_rejects_bad_values() {
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert!(parse_seconds("inf").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_parse_seconds_rounds_to_milliseconds() {
        assert_eq!(parse_seconds("0.3").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_seconds("0.0015").unwrap(), Duration::from_millis(2));
        assert_eq!(parse_seconds("0.001").unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn test_parse_seconds_rejects_sub_millisecond() {
        let err = parse_seconds("0.0009").unwrap_err();
        assert!(err.contains("1 ms"), "{err}");
        assert!(parse_seconds("0.0000001").is_err());
    }

    #[test]
    fn test_apply_rejects_sub_millisecond_dwell() {
        let mut config = Config::default();
        let cmd = RunCommand {
            dwell: Some(Duration::from_micros(900)),
            ..empty_run()
        };
        let err = cmd.apply(&mut config).unwrap_err();
        assert!(err.to_string().contains("1 ms"), "{err}");
    }

    #[test]
    fn test_apply_keeps_parsed_dwell_exactly() {
        let mut config = Config::default();
        let cmd = RunCommand {
            dwell: Some(parse_seconds("0.25").unwrap()),
            warmup: Some(parse_seconds("1.5").unwrap()),
            ..empty_run()
        };
        cmd.apply(&mut config).unwrap();
        assert_eq!(config.dwell(), Duration::from_millis(250));
        assert_eq!(config.warmup(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_parse_channel_list() {
        assert_eq!(parse_channel_list("1, 6,11").unwrap().numbers(), vec![1, 6, 11]);
        assert!(parse_channel_list("").is_err());
        assert!(parse_channel_list("1,15").is_err());
    }

    #[test]
    fn test_apply_without_overrides_keeps_config() {
        let mut config = Config::default();
        empty_run().apply(&mut config).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let cmd = RunCommand {
            channels: Some(ChannelList::from_numbers(&[1, 6, 11]).unwrap()),
            output: Some(PathBuf::from("/tmp/out.pcapng")),
            dwell: Some(Duration::from_millis(100)),
            warmup: Some(Duration::from_secs(2)),
            passes: Some(3),
            no_kill: true,
            skip_env_check: true,
            ..empty_run()
        };
        cmd.apply(&mut config).unwrap();

        assert_eq!(config.sweep.channels, vec![1, 6, 11]);
        assert_eq!(config.output_path(), PathBuf::from("/tmp/out.pcapng"));
        assert_eq!(config.sweep.dwell_ms, 100);
        assert_eq!(config.capture.warmup_ms, 2_000);
        assert_eq!(config.sweep.passes, 3);
        assert!(!config.interface.kill_conflicting);
        assert!(!config.environment.check);
    }

    #[test]
    fn test_apply_interface_replaces_configured_mac() {
        let mut config = Config::default();
        config.interface.mac_address = Some("00c0cab400dd".to_string());
        let cmd = RunCommand {
            interface: Some("wlan2".to_string()),
            ..empty_run()
        };
        cmd.apply(&mut config).unwrap();

        let names: Vec<String> = config
            .interface_candidates()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, vec!["wlan2"]);
    }

    #[test]
    fn test_apply_mac_keeps_configured_name() {
        let mut config = Config::default();
        let cmd = RunCommand {
            mac: Some("00:c0:ca:b4:00:dd".to_string()),
            ..empty_run()
        };
        cmd.apply(&mut config).unwrap();
        assert_eq!(config.interface_candidates().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_rejects_bad_interface() {
        let mut config = Config::default();
        let cmd = RunCommand {
            interface: Some("wlan0; reboot".to_string()),
            ..empty_run()
        };
        assert!(cmd.apply(&mut config).is_err());
    }
}
