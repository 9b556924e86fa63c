//! A controller that records what it is asked to do instead of doing it.
//!
//! Used for `--dry-run` and throughout the test suite. Its behaviour can be
//! scripted: report an old tool version, refuse certain channels, let the
//! capture process die after some retunes, and so on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::{DeviceController, Readiness, StopOutcome};
use crate::channel::Channel;
use crate::environment::{EnvironmentReport, ToolVersion};
use crate::error::{Error, InterfaceFailureKind, Result};
use crate::radio::{InterfaceId, RadioInterfaceState};
use crate::sweep::SweepHandle;

/// One call made on a [`RecordingController`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ControllerCall {
    /// `probe_environment`
    ProbeEnvironment,
    /// `supported_channels`
    SupportedChannels {
        /// Interface queried.
        interface: String,
    },
    /// `set_monitor_mode`
    SetMonitorMode {
        /// Interface switched.
        interface: String,
        /// Whether conflicting processes were to be stopped.
        kill_conflicting: bool,
    },
    /// `set_channel`
    SetChannel {
        /// Interface retuned.
        interface: String,
        /// Channel number.
        channel: u16,
    },
    /// `start_capture`
    StartCapture {
        /// Interface captured on.
        interface: String,
        /// Capture file.
        output: PathBuf,
    },
    /// `wait_until_ready`
    WaitUntilReady,
    /// `capture_alive`
    CaptureAlive,
    /// `stop_capture`
    StopCapture,
}

impl std::fmt::Display for ControllerCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProbeEnvironment => write!(f, "probe environment"),
            Self::SupportedChannels { interface } => {
                write!(f, "query supported channels of {interface}")
            }
            Self::SetMonitorMode {
                interface,
                kill_conflicting,
            } => {
                if *kill_conflicting {
                    write!(f, "stop conflicting processes; enable monitor mode on {interface}")
                } else {
                    write!(f, "enable monitor mode on {interface}")
                }
            }
            Self::SetChannel { interface, channel } => {
                write!(f, "set {interface} to channel {channel}")
            }
            Self::StartCapture { interface, output } => {
                write!(f, "start capture on {interface} into {}", output.display())
            }
            Self::WaitUntilReady => write!(f, "wait for capture to start"),
            Self::CaptureAlive => write!(f, "check capture is running"),
            Self::StopCapture => write!(f, "stop capture"),
        }
    }
}

/// Records every call and answers from a script.
#[derive(Debug)]
pub struct RecordingController {
    calls: Mutex<Vec<ControllerCall>>,
    report: EnvironmentReport,
    supported: Option<Vec<Channel>>,
    failing_channels: Vec<(Channel, InterfaceFailureKind)>,
    dies_after_retunes: Option<usize>,
    acknowledges_ready: bool,
    monitor_suffix: Option<String>,
    fail_start: bool,
    write_output: bool,
    capturing: bool,
    retunes: usize,
    announce: bool,
    interrupt_on_death: Option<SweepHandle>,
}

impl Default for RecordingController {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingController {
    /// A controller whose every operation succeeds.
    ///
    /// It reports `tshark` 4.2.0 with all tools present, acknowledges
    /// readiness immediately and keeps the interface name unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            report: EnvironmentReport {
                tool: "tshark".to_string(),
                version: Some(ToolVersion::new(4, 2, 0)),
                missing_tools: Vec::new(),
            },
            supported: None,
            failing_channels: Vec::new(),
            dies_after_retunes: None,
            acknowledges_ready: true,
            monitor_suffix: None,
            fail_start: false,
            write_output: false,
            capturing: false,
            retunes: 0,
            announce: false,
            interrupt_on_death: None,
        }
    }

    /// Report this capture tool version.
    #[must_use]
    pub fn with_version(mut self, version: Option<ToolVersion>) -> Self {
        self.report.version = version;
        self
    }

    /// Report a tool as missing.
    #[must_use]
    pub fn with_missing_tool(mut self, tool: impl Into<String>) -> Self {
        self.report.missing_tools.push(tool.into());
        self
    }

    /// Report these channels as supported by the adapter.
    #[must_use]
    pub fn with_supported_channels(mut self, channels: Vec<Channel>) -> Self {
        self.supported = Some(channels);
        self
    }

    /// Fail every retune to `channel` with `kind`.
    #[must_use]
    pub fn failing_channel(mut self, channel: Channel, kind: InterfaceFailureKind) -> Self {
        self.failing_channels.push((channel, kind));
        self
    }

    /// Let the capture process exit once `retunes` channels were set.
    #[must_use]
    pub fn capture_dies_after(mut self, retunes: usize) -> Self {
        self.dies_after_retunes = Some(retunes);
        self
    }

    /// Stop `handle` when the capture dies, as a terminal Ctrl-C that
    /// reaches the capture tool and the sweep together would.
    #[must_use]
    pub fn interrupting_on_death(mut self, handle: SweepHandle) -> Self {
        self.interrupt_on_death = Some(handle);
        self
    }

    /// Never acknowledge readiness, so the driver waits out the warm-up.
    #[must_use]
    pub fn without_ready_ack(mut self) -> Self {
        self.acknowledges_ready = false;
        self
    }

    /// Rename the interface on entering monitor mode, as `airmon-ng` does.
    #[must_use]
    pub fn with_monitor_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.monitor_suffix = Some(suffix.into());
        self
    }

    /// Fail to start the capture process.
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Append a line to the output file whenever capture starts.
    ///
    /// The file is opened in append mode, so runs only start from an empty
    /// file if the caller removed the previous one.
    #[must_use]
    pub fn writing_output(mut self) -> Self {
        self.write_output = true;
        self
    }

    /// Log each call at info level as it happens (for `--dry-run`).
    #[must_use]
    pub fn announcing(mut self) -> Self {
        self.announce = true;
        self
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ControllerCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The channels set so far, in order.
    #[must_use]
    pub fn channels_set(&self) -> Vec<u16> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                ControllerCall::SetChannel { channel, .. } => Some(*channel),
                _ => None,
            })
            .collect()
    }

    /// How many times `call` was made.
    #[must_use]
    pub fn count(&self, call: &ControllerCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: ControllerCall) {
        if self.announce {
            info!("[dry-run] {call}");
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn capture_died(&self) -> bool {
        self.dies_after_retunes
            .is_some_and(|limit| self.retunes >= limit)
    }
}

#[async_trait::async_trait]
impl DeviceController for RecordingController {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn probe_environment(&self) -> Result<EnvironmentReport> {
        self.record(ControllerCall::ProbeEnvironment);
        Ok(self.report.clone())
    }

    async fn supported_channels(&self, interface: &InterfaceId) -> Result<Option<Vec<Channel>>> {
        self.record(ControllerCall::SupportedChannels {
            interface: interface.to_string(),
        });
        Ok(self.supported.clone())
    }

    async fn set_monitor_mode(
        &mut self,
        interface: &InterfaceId,
        kill_conflicting: bool,
    ) -> Result<RadioInterfaceState> {
        self.record(ControllerCall::SetMonitorMode {
            interface: interface.to_string(),
            kill_conflicting,
        });
        let monitor = match &self.monitor_suffix {
            Some(suffix) => InterfaceId::new(format!("{interface}{suffix}"))?,
            None => interface.clone(),
        };
        Ok(RadioInterfaceState::monitor(monitor))
    }

    async fn set_channel(
        &mut self,
        interface: &InterfaceId,
        channel: Channel,
    ) -> Result<RadioInterfaceState> {
        self.record(ControllerCall::SetChannel {
            interface: interface.to_string(),
            channel: channel.number(),
        });
        self.retunes += 1;

        if let Some((_, kind)) = self.failing_channels.iter().find(|(c, _)| *c == channel) {
            return Err(Error::interface_control(
                format!("set channel {channel} on {interface}"),
                *kind,
                "scripted failure",
            ));
        }
        Ok(RadioInterfaceState::monitor(interface.clone()).tuned(channel))
    }

    async fn start_capture(&mut self, interface: &InterfaceId, output: &Path) -> Result<()> {
        self.record(ControllerCall::StartCapture {
            interface: interface.to_string(),
            output: output.to_path_buf(),
        });
        if self.fail_start {
            return Err(Error::capture_process("scripted start failure"));
        }
        if self.capturing {
            return Err(Error::capture_process("a capture is already running"));
        }
        if self.write_output {
            let mut file = OpenOptions::new().create(true).append(true).open(output)?;
            writeln!(file, "capture on {interface}")?;
        }
        self.capturing = true;
        self.retunes = 0;
        Ok(())
    }

    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Readiness> {
        self.record(ControllerCall::WaitUntilReady);
        if !self.capturing {
            return Err(Error::capture_process("capture was not started"));
        }
        if self.acknowledges_ready {
            Ok(Readiness::Acknowledged)
        } else {
            tokio::time::sleep(timeout).await;
            Ok(Readiness::TimedOut)
        }
    }

    async fn capture_alive(&mut self) -> Result<bool> {
        self.record(ControllerCall::CaptureAlive);
        let died = self.capture_died();
        if died {
            if let Some(handle) = &self.interrupt_on_death {
                handle.stop();
            }
        }
        Ok(self.capturing && !died)
    }

    async fn stop_capture(&mut self) -> Result<StopOutcome> {
        self.record(ControllerCall::StopCapture);
        if !self.capturing {
            return Ok(StopOutcome::NotRunning);
        }
        self.capturing = false;
        if self.capture_died() {
            Ok(StopOutcome::AlreadyExited { code: Some(1) })
        } else {
            Ok(StopOutcome::Terminated)
        }
    }
}
