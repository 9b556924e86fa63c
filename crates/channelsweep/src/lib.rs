//! `channelsweep` - Wi-Fi channel-sweep packet capture
//!
//! This library puts a wireless adapter into monitor mode, runs a capture
//! tool writing every frame it hears to a file, and retunes the adapter
//! through a list of channels, stopping the capture at the end.
//!
//! Hardware access goes through the [`DeviceController`] trait; the sweep
//! itself lives in [`sweep`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod capture;
pub mod channel;
pub mod cli;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod logging;
pub mod radio;
pub mod sweep;

pub use capture::{CaptureFingerprint, CaptureResult, RetuneFailure};
pub use channel::{Band, Channel, ChannelList};
pub use config::Config;
pub use controller::{DeviceController, Readiness, RecordingController, StopOutcome};
pub use environment::{EnvironmentReport, ToolVersion};
pub use error::{Error, InterfaceFailureKind, Result};
pub use logging::init_logging;
pub use radio::{InterfaceId, RadioInterfaceState, RadioMode};
pub use sweep::{run_capture_sweep, ChannelSweepDriver, SweepHandle, SweepPlan, SweepState};

#[cfg(target_os = "linux")]
pub use controller::CommandController;
