//! Command-line interface for channelsweep.
//!
//! This module provides the CLI structure and command handlers for the
//! `chsweep` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{parse_seconds, ChannelsCommand, CheckCommand, ConfigCommand, RunCommand};

/// chsweep - Sweep a Wi-Fi adapter across channels while capturing
///
/// Puts an adapter into monitor mode, records everything it hears to a
/// capture file, and retunes it through a list of channels.
#[derive(Debug, Parser)]
#[command(name = "chsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sweep the channel list while capturing
    Run(RunCommand),

    /// Check that the required tools are installed
    Check(CheckCommand),

    /// List the channels the adapter supports
    Channels(ChannelsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    fn check() -> Command {
        Command::Check(CheckCommand { json: false })
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "chsweep");
    }

    #[test]
    fn test_verbosity_quiet() {
        let cli = Cli {
            config: None,
            verbose: 0,
            quiet: true,
            command: check(),
        };
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_levels() {
        for (verbose, expected) in [
            (0, crate::logging::Verbosity::Normal),
            (1, crate::logging::Verbosity::Verbose),
            (2, crate::logging::Verbosity::Trace),
            (5, crate::logging::Verbosity::Trace),
        ] {
            let cli = Cli {
                config: None,
                verbose,
                quiet: false,
                command: check(),
            };
            assert_eq!(cli.verbosity(), expected);
        }
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["chsweep", "run"]).unwrap();
        match cli.command {
            Command::Run(run) => {
                assert!(run.interface.is_none());
                assert!(run.channels.is_none());
                assert!(!run.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_full() {
        let args = [
            "chsweep",
            "run",
            "-i",
            "wlan1",
            "--channels",
            "1,6,11",
            "--dwell",
            "0.1",
            "--warmup",
            "3",
            "--passes",
            "2",
            "--output",
            "/tmp/sweep.pcapng",
            "--no-kill",
            "--dry-run",
            "--json",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(run.interface.as_deref(), Some("wlan1"));
        assert_eq!(run.channels.unwrap().numbers(), vec![1, 6, 11]);
        assert_eq!(run.dwell, Some(Duration::from_millis(100)));
        assert_eq!(run.warmup, Some(Duration::from_secs(3)));
        assert_eq!(run.passes, Some(2));
        assert_eq!(run.output, Some(PathBuf::from("/tmp/sweep.pcapng")));
        assert!(run.no_kill);
        assert!(run.dry_run);
        assert!(run.json);
    }

    #[test]
    fn test_parse_run_rejects_bad_values() {
        assert!(Cli::try_parse_from(["chsweep", "run", "--channels", ""]).is_err());
        assert!(Cli::try_parse_from(["chsweep", "run", "--channels", "1,99"]).is_err());
        assert!(Cli::try_parse_from(["chsweep", "run", "--dwell", "-1"]).is_err());
        assert!(Cli::try_parse_from(["chsweep", "run", "--passes", "0"]).is_err());
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["chsweep", "check", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Check(CheckCommand { json: true })));
    }

    #[test]
    fn test_parse_channels() {
        let cli = Cli::try_parse_from(["chsweep", "channels", "-i", "wlan2"]).unwrap();
        match cli.command {
            Command::Channels(cmd) => assert_eq!(cmd.interface.as_deref(), Some("wlan2")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["chsweep", "config", "validate", "-f", "/tmp/c.toml"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["chsweep", "-c", "/custom/config.toml", "check"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["chsweep", "run", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["chsweep", "-q", "check"]).unwrap();
        assert!(cli.quiet);
    }
}
