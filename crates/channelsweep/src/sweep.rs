//! The channel-sweep capture driver.
//!
//! A run checks the host, puts the interface into monitor mode, starts a
//! capture, visits every channel in order for the dwell time, and stops the
//! capture again. Once capture has started it is stopped on every exit
//! path: success, cancellation and failure alike.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::capture::{prepare_output, CaptureFingerprint, CaptureResult, RetuneFailure};
use crate::channel::{Channel, ChannelList};
use crate::config::Config;
use crate::controller::{DeviceController, Readiness, StopOutcome};
use crate::environment::ToolVersion;
use crate::error::{Error, Result};
use crate::radio::{InterfaceId, RadioInterfaceState};

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    /// Interface to put into monitor mode.
    pub interface: InterfaceId,
    /// Channels to visit, in order.
    pub channels: ChannelList,
    /// Capture file; replaced on every run.
    pub output_path: PathBuf,
    /// Time spent on each channel.
    pub dwell: Duration,
    /// Longest wait for the capture to start recording.
    pub warmup: Duration,
    /// Number of traversals of the channel list.
    pub passes: u32,
    /// Stop processes that reconfigure the interface behind our back.
    pub kill_conflicting: bool,
    /// Check installed tools before touching the hardware.
    pub check_environment: bool,
    /// Oldest acceptable capture tool version.
    pub min_tool_version: ToolVersion,
    /// Wait for the capture tool's acknowledgment instead of sleeping.
    pub wait_for_ready: bool,
    /// Leave the output file alone (the controller only pretends).
    pub dry_run: bool,
}

impl SweepPlan {
    /// A plan with default timing: 500 ms dwell, 5 s warm-up, one pass.
    #[must_use]
    pub fn new(interface: InterfaceId, channels: ChannelList, output_path: PathBuf) -> Self {
        Self {
            interface,
            channels,
            output_path,
            dwell: Duration::from_millis(500),
            warmup: Duration::from_secs(5),
            passes: 1,
            kill_conflicting: true,
            check_environment: true,
            min_tool_version: ToolVersion::new(3, 0, 0),
            wait_for_ready: true,
            dry_run: false,
        }
    }

    /// Build a plan from configuration for an already-resolved interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured channels or version are invalid.
    pub fn from_config(config: &Config, interface: InterfaceId) -> Result<Self> {
        Ok(Self {
            interface,
            channels: config.channel_list()?,
            output_path: config.output_path(),
            dwell: config.dwell(),
            warmup: config.warmup(),
            passes: config.sweep.passes,
            kill_conflicting: config.interface.kill_conflicting,
            check_environment: config.environment.check,
            min_tool_version: config.min_tool_version()?,
            wait_for_ready: config.capture.wait_for_ready,
            dry_run: false,
        })
    }

    /// Set the dwell time.
    #[must_use]
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    /// Set the warm-up time.
    #[must_use]
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the number of passes.
    #[must_use]
    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes;
        self
    }

    /// Number of channel visits the plan makes.
    #[must_use]
    pub fn total_visits(&self) -> usize {
        self.channels.len() * self.passes as usize
    }

    /// How long an uninterrupted run takes at most, ignoring tool latency.
    #[must_use]
    pub fn expected_duration(&self) -> Duration {
        let visits = u32::try_from(self.total_visits()).unwrap_or(u32::MAX);
        self.warmup + self.dwell.saturating_mul(visits)
    }
}

/// Where a run is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SweepState {
    /// Nothing happened yet.
    Idle,
    /// The host meets the requirements.
    EnvironmentChecked,
    /// Monitor mode was requested.
    MonitorModeRequested,
    /// The capture process is running.
    Capturing,
    /// Tuned to a channel.
    Sweeping {
        /// Zero-based pass.
        pass: u32,
        /// Zero-based position in the channel list.
        index: usize,
        /// The channel.
        channel: Channel,
    },
    /// Capture was stopped and the result reported.
    Stopped,
    /// A fatal error ended the run.
    Aborted,
}

impl std::fmt::Display for SweepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::EnvironmentChecked => write!(f, "environment checked"),
            Self::MonitorModeRequested => write!(f, "monitor mode requested"),
            Self::Capturing => write!(f, "capturing"),
            Self::Sweeping { channel, .. } => write!(f, "sweeping (channel {channel})"),
            Self::Stopped => write!(f, "stopped"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A handle to cancel a running sweep.
///
/// This is a lightweight, cloneable handle; every clone controls the same
/// sweep. A cancelled sweep stops capture and returns what it has.
#[derive(Debug, Clone, Default)]
pub struct SweepHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug, Default)]
struct HandleInner {
    stop: AtomicBool,
    notify: Notify,
}

impl SweepHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the sweep to stop.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// Reset the stop signal.
    pub fn reset(&self) {
        self.inner.stop.store(false, Ordering::SeqCst);
    }

    /// Wait until the stop signal is sent.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.should_stop() {
                return;
            }
            notified.await;
        }
    }
}

/// What the sweep phase produced before capture was stopped.
#[derive(Debug)]
struct SweepProgress {
    readiness: Readiness,
    visited: Vec<Channel>,
    retune_failures: Vec<RetuneFailure>,
    cancelled: bool,
}

/// Drives one run and keeps the states it went through.
#[derive(Debug)]
pub struct ChannelSweepDriver<'a, C: DeviceController + ?Sized> {
    controller: &'a mut C,
    plan: SweepPlan,
    handle: SweepHandle,
    state: SweepState,
    history: Vec<SweepState>,
    radio_states: Vec<RadioInterfaceState>,
}

impl<'a, C: DeviceController + ?Sized> ChannelSweepDriver<'a, C> {
    /// Create a driver. Nothing happens until [`run`](Self::run).
    pub fn new(controller: &'a mut C, plan: SweepPlan, handle: SweepHandle) -> Self {
        Self {
            controller,
            plan,
            handle,
            state: SweepState::Idle,
            history: vec![SweepState::Idle],
            radio_states: Vec::new(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &SweepState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[SweepState] {
        &self.history
    }

    /// The plan being run.
    #[must_use]
    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    /// Run the sweep.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. Capture is stopped before returning
    /// if it was started.
    pub async fn run(&mut self) -> Result<CaptureResult> {
        if self.state != SweepState::Idle {
            return Err(Error::internal("a sweep driver can only run once"));
        }
        let started_at = Utc::now();
        info!(
            interface = %self.plan.interface,
            channels = %self.plan.channels,
            dwell = ?self.plan.dwell,
            passes = self.plan.passes,
            controller = self.controller.name(),
            "Starting channel sweep"
        );

        match self.execute(started_at).await {
            Ok(result) => {
                self.transition(SweepState::Stopped);
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, state = %self.state, "Channel sweep aborted");
                self.transition(SweepState::Aborted);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: SweepState) {
        debug!(from = %self.state, to = %next, "Sweep state change");
        self.history.push(next.clone());
        self.state = next;
    }

    async fn execute(&mut self, started_at: DateTime<Utc>) -> Result<CaptureResult> {
        self.check_environment().await?;
        self.transition(SweepState::EnvironmentChecked);

        self.check_supported_channels().await?;

        self.transition(SweepState::MonitorModeRequested);
        let radio = self
            .controller
            .set_monitor_mode(&self.plan.interface, self.plan.kill_conflicting)
            .await?;
        self.radio_states.push(radio.clone());

        if !self.plan.dry_run {
            prepare_output(&self.plan.output_path)?;
        }
        self.controller
            .start_capture(&radio.interface, &self.plan.output_path)
            .await?;
        self.transition(SweepState::Capturing);

        // From here on the capture must be stopped whatever happens.
        let progress = self.sweep(&radio.interface).await;
        let stopped = self.controller.stop_capture().await;
        let finished_at = Utc::now();

        let (progress, stop) = match (progress, stopped) {
            (Ok(progress), Ok(stop)) => (progress, stop),
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    error!(error = %stop_err, "Could not stop capture after failure");
                }
                return Err(e);
            }
        };

        if progress.cancelled {
            warn!(
                visited = progress.visited.len(),
                planned = self.plan.total_visits(),
                "Sweep cancelled; capture stopped"
            );
        } else {
            info!(visited = progress.visited.len(), "Sweep complete; capture stopped");
        }

        let fingerprint = if self.plan.dry_run {
            None
        } else {
            match CaptureFingerprint::of_file(&self.plan.output_path) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    warn!(error = %e, "Could not fingerprint capture file");
                    None
                }
            }
        };

        Ok(CaptureResult {
            output_path: self.plan.output_path.clone(),
            channels_swept: progress.visited.len(),
            visited: progress.visited,
            retune_failures: progress.retune_failures,
            radio_states: self.radio_states.clone(),
            readiness: progress.readiness,
            stop,
            cancelled: progress.cancelled,
            started_at,
            finished_at,
            fingerprint,
        })
    }

    async fn check_environment(&self) -> Result<()> {
        if !self.plan.check_environment {
            warn!("Skipping environment check");
            return Ok(());
        }
        let report = self.controller.probe_environment().await?;
        report.require(self.plan.min_tool_version)?;
        if let Some(version) = report.version {
            info!(tool = %report.tool, %version, "Environment check passed");
        }
        Ok(())
    }

    async fn check_supported_channels(&self) -> Result<()> {
        let Some(supported) = self
            .controller
            .supported_channels(&self.plan.interface)
            .await?
        else {
            debug!("Supported channels unknown; not checking");
            return Ok(());
        };

        let mut unsupported: Vec<u16> = self
            .plan
            .channels
            .iter()
            .filter(|channel| !supported.contains(channel))
            .map(|channel| channel.number())
            .collect();
        unsupported.sort_unstable();
        unsupported.dedup();

        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedChannels {
                interface: self.plan.interface.to_string(),
                channels: unsupported,
            })
        }
    }

    async fn sweep(&mut self, interface: &InterfaceId) -> Result<SweepProgress> {
        let handle = self.handle.clone();
        let mut progress = SweepProgress {
            readiness: Readiness::Assumed,
            visited: Vec::with_capacity(self.plan.total_visits()),
            retune_failures: Vec::new(),
            cancelled: false,
        };

        let warmup = self.plan.warmup;
        let readiness = if self.plan.wait_for_ready {
            tokio::select! {
                ready = self.controller.wait_until_ready(warmup) => Some(ready?),
                () = handle.cancelled() => None,
            }
        } else if pause(&handle, warmup).await {
            None
        } else {
            Some(Readiness::Assumed)
        };
        match readiness {
            Some(Readiness::TimedOut) => {
                warn!(?warmup, "Capture did not report readiness; continuing anyway");
                progress.readiness = Readiness::TimedOut;
            }
            Some(readiness) => {
                debug!(%readiness, "Capture ready");
                progress.readiness = readiness;
            }
            None => {
                progress.cancelled = true;
                return Ok(progress);
            }
        }

        let channels = self.plan.channels.clone();
        'passes: for pass in 0..self.plan.passes {
            for (index, &channel) in channels.iter().enumerate() {
                if handle.should_stop() {
                    progress.cancelled = true;
                    break 'passes;
                }
                if !self.controller.capture_alive().await? {
                    // An interrupt can reach the tool just before it reaches us.
                    if handle.should_stop() {
                        progress.cancelled = true;
                        break 'passes;
                    }
                    return Err(Error::capture_process(format!(
                        "capture exited before channel {channel} (visited {} of {})",
                        progress.visited.len(),
                        self.plan.total_visits()
                    )));
                }

                self.transition(SweepState::Sweeping {
                    pass,
                    index,
                    channel,
                });
                info!(
                    channel = channel.number(),
                    band = %channel.band(),
                    "Scanning channel {channel}"
                );

                match self.controller.set_channel(interface, channel).await {
                    Ok(state) => self.radio_states.push(state),
                    Err(e) if e.is_fatal_retune() => return Err(e),
                    Err(e) => {
                        warn!(channel = channel.number(), error = %e, "Retune failed; continuing sweep");
                        progress.retune_failures.push(RetuneFailure {
                            channel,
                            message: e.to_string(),
                        });
                    }
                }
                progress.visited.push(channel);

                if pause(&handle, self.plan.dwell).await {
                    progress.cancelled = true;
                    break 'passes;
                }
            }
        }

        Ok(progress)
    }
}

/// Sleep for `duration` unless cancelled first. Returns `true` if cancelled.
async fn pause(handle: &SweepHandle, duration: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        () = handle.cancelled() => true,
    }
}

/// Run one sweep with `controller`.
///
/// # Errors
///
/// See [`ChannelSweepDriver::run`].
pub async fn run_capture_sweep<C: DeviceController + ?Sized>(
    controller: &mut C,
    plan: SweepPlan,
    handle: SweepHandle,
) -> Result<CaptureResult> {
    ChannelSweepDriver::new(controller, plan, handle).run().await
}
