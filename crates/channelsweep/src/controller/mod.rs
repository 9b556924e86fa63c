//! Device controllers: the seam between the sweep driver and the hardware.
//!
//! The driver never runs a command itself. Everything that touches the
//! wireless interface or the capture process goes through a
//! [`DeviceController`], so tests and dry runs can substitute a controller
//! that only records what it was asked to do.

#[cfg(target_os = "linux")]
pub mod command;
pub mod recording;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::environment::EnvironmentReport;
use crate::error::Result;
use crate::radio::{InterfaceId, RadioInterfaceState};

#[cfg(target_os = "linux")]
pub use command::CommandController;
pub use recording::{ControllerCall, RecordingController};

/// How the driver learned that capture is recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// The capture tool said it started capturing.
    Acknowledged,
    /// No acknowledgment arrived within the warm-up period.
    TimedOut,
    /// The controller cannot observe readiness; the warm-up delay elapsed.
    Assumed,
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Assumed => write!(f, "assumed after warm-up"),
        }
    }
}

/// What happened when the capture process was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StopOutcome {
    /// The process was running and has been terminated.
    Terminated,
    /// The process had already exited on its own.
    AlreadyExited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },
    /// No capture process was running.
    NotRunning,
}

/// Control over the wireless interface and the capture process.
///
/// Every method returns a result instead of firing commands blind, and
/// every state-changing interface call reports the state it set.
///
/// Implementations are used by one driver at a time; concurrent sweeps on
/// the same interface are not supported.
#[async_trait::async_trait]
pub trait DeviceController: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Find out which tools are installed and how recent the capture tool is.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe itself could not run.
    async fn probe_environment(&self) -> Result<EnvironmentReport>;

    /// Channels the adapter can tune to in the current regulatory domain.
    ///
    /// `None` means the controller cannot tell.
    ///
    /// # Errors
    ///
    /// Returns an error if the query failed in a way that makes the
    /// interface unusable.
    async fn supported_channels(&self, interface: &InterfaceId) -> Result<Option<Vec<Channel>>>;

    /// Put the interface into monitor mode.
    ///
    /// The returned state names the monitor interface, which may differ from
    /// `interface` (e.g. `wlan1` becomes `wlan1mon`).
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` or `InterfaceControl` on failure.
    async fn set_monitor_mode(
        &mut self,
        interface: &InterfaceId,
        kill_conflicting: bool,
    ) -> Result<RadioInterfaceState>;

    /// Retune a monitor-mode interface.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` or `InterfaceControl` on failure.
    async fn set_channel(
        &mut self,
        interface: &InterfaceId,
        channel: Channel,
    ) -> Result<RadioInterfaceState>;

    /// Start the capture process writing to `output`.
    ///
    /// # Errors
    ///
    /// Returns `CaptureProcess` if the process cannot be started or a
    /// capture is already running.
    async fn start_capture(&mut self, interface: &InterfaceId, output: &Path) -> Result<()>;

    /// Wait until the capture process is recording, for at most `timeout`.
    ///
    /// The default waits out the whole timeout, for controllers that have
    /// no way to observe readiness.
    ///
    /// # Errors
    ///
    /// Returns an error if no capture was started.
    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Readiness> {
        tokio::time::sleep(timeout).await;
        Ok(Readiness::Assumed)
    }

    /// Check whether the capture process is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state could not be queried.
    async fn capture_alive(&mut self) -> Result<bool>;

    /// Stop the capture process.
    ///
    /// Stopping when nothing is running is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Termination` if a running process could not be stopped.
    async fn stop_capture(&mut self) -> Result<StopOutcome>;
}
