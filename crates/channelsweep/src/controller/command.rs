//! Controller that drives real hardware through `airmon-ng`, `iw` and a
//! capture tool (`tshark` or `dumpcap`).

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use channelsweep_linux::{
    classify_error, parse_adapter_table, parse_channels, parse_monitor_interface, phy_name,
    Adapter, IwErrorKind,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DeviceController, Readiness, StopOutcome};
use crate::channel::Channel;
use crate::config::{Config, StopMode, ToolsConfig};
use crate::environment::{find_executable, EnvironmentReport, ToolVersion};
use crate::error::{Error, InterfaceFailureKind, Result};
use crate::radio::{InterfaceId, RadioInterfaceState};

/// What `tshark` and `dumpcap` print once the capture is running.
const READY_MARKER: &str = "Capturing on";

/// How long a stopped capture's stderr may stay open before the reader is
/// abandoned. Helpers forked by the tool can hold the pipe after it exits.
const STDERR_DRAIN: Duration = Duration::from_secs(1);

/// Combined output of a finished tool invocation.
#[derive(Debug)]
struct ToolOutput {
    success: bool,
    text: String,
}

/// A running capture process.
#[derive(Debug)]
struct CaptureSession {
    child: Child,
    ready: Option<oneshot::Receiver<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

/// Drives the wireless interface and capture process with external tools.
///
/// The capture child is spawned with `kill_on_drop`, so dropping the
/// controller never leaves a capture running.
#[derive(Debug)]
pub struct CommandController {
    tools: ToolsConfig,
    stop_mode: StopMode,
    stop_grace: Duration,
    session: Option<CaptureSession>,
}

impl CommandController {
    /// Create a controller using the given tools.
    #[must_use]
    pub fn new(tools: ToolsConfig, stop_mode: StopMode, stop_grace: Duration) -> Self {
        Self {
            tools,
            stop_mode,
            stop_grace,
            session: None,
        }
    }

    /// Create a controller from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tools.clone(),
            config.capture.stop_mode,
            config.stop_grace(),
        )
    }

    /// Wireless adapters as listed by a bare `airmon-ng`.
    ///
    /// # Errors
    ///
    /// Returns an error if `airmon-ng` cannot be run.
    pub async fn list_adapters(&self) -> Result<Vec<Adapter>> {
        let output = run_tool(&self.tools.airmon_ng, &[]).await?;
        Ok(parse_adapter_table(&output.text))
    }

    async fn interrupt(&self, child: &mut Child) -> Result<()> {
        if let Some(pid) = child.id() {
            let pid = pid.to_string();
            match Command::new("kill").args(["-INT", &pid]).status().await {
                Ok(status) if status.success() => {
                    match tokio::time::timeout(self.stop_grace, child.wait()).await {
                        Ok(Ok(status)) => {
                            debug!(%status, "Capture exited after interrupt");
                            return Ok(());
                        }
                        Ok(Err(e)) => return Err(Error::termination(e.to_string())),
                        Err(_) => warn!(
                            grace = ?self.stop_grace,
                            "Capture ignored the interrupt, killing it"
                        ),
                    }
                }
                Ok(status) => warn!(%status, "kill -INT failed, killing capture"),
                Err(e) => warn!(error = %e, "Could not run kill, killing capture"),
            }
        }
        child
            .kill()
            .await
            .map_err(|e| Error::termination(e.to_string()))
    }
}

#[async_trait::async_trait]
impl DeviceController for CommandController {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn probe_environment(&self) -> Result<EnvironmentReport> {
        let tools = [&self.tools.airmon_ng, &self.tools.iw, &self.tools.capture];
        let missing_tools: Vec<String> = tools
            .iter()
            .filter(|tool| find_executable(tool).is_none())
            .map(|tool| (*tool).clone())
            .collect();

        let version = if find_executable(&self.tools.capture).is_some() {
            match run_tool(&self.tools.capture, &["--version"]).await {
                Ok(output) => ToolVersion::find_in(&output.text),
                Err(e) => {
                    debug!(error = %e, "Could not query capture tool version");
                    None
                }
            }
        } else {
            None
        };

        Ok(EnvironmentReport {
            tool: self.tools.capture.clone(),
            version,
            missing_tools,
        })
    }

    async fn supported_channels(&self, interface: &InterfaceId) -> Result<Option<Vec<Channel>>> {
        let phy = match phy_name(interface.as_str()) {
            Ok(phy) => phy,
            Err(e) => {
                warn!(%interface, error = %e, "Cannot determine the adapter; skipping channel check");
                return Ok(None);
            }
        };

        let output = run_tool(&self.tools.iw, &["phy", &phy, "channels"]).await?;
        if !output.success {
            warn!(%phy, output = %output.text.trim(), "iw could not list channels; skipping channel check");
            return Ok(None);
        }

        let channels: Vec<Channel> = parse_channels(&output.text)
            .into_iter()
            .filter_map(|number| Channel::new(number).ok())
            .collect();
        if channels.is_empty() {
            warn!(%phy, "No usable channels found in iw output; skipping channel check");
            return Ok(None);
        }
        debug!(%phy, count = channels.len(), "Adapter channels listed");
        Ok(Some(channels))
    }

    async fn set_monitor_mode(
        &mut self,
        interface: &InterfaceId,
        kill_conflicting: bool,
    ) -> Result<RadioInterfaceState> {
        if kill_conflicting {
            let output = run_tool(&self.tools.airmon_ng, &["check", "kill"]).await?;
            if !output.success || lacks_privilege(&output.text) {
                return Err(airmon_error("stop conflicting processes", &output.text));
            }
        }

        let operation = format!("enable monitor mode on {interface}");
        let output = run_tool(&self.tools.airmon_ng, &["start", interface.as_str()]).await?;
        if !output.success || lacks_privilege(&output.text) {
            return Err(airmon_error(&operation, &output.text));
        }

        let name = match parse_monitor_interface(&output.text) {
            Some(monitor) => monitor.interface,
            None if output.text.contains("No such device") => {
                return Err(airmon_error(&operation, &output.text));
            }
            None => {
                warn!(%interface, "airmon-ng did not name the monitor interface; keeping the given name");
                interface.to_string()
            }
        };

        let state = RadioInterfaceState::monitor(InterfaceId::new(name)?);
        info!("Monitor mode enabled: {state}");
        Ok(state)
    }

    async fn set_channel(
        &mut self,
        interface: &InterfaceId,
        channel: Channel,
    ) -> Result<RadioInterfaceState> {
        let number = channel.number().to_string();
        let output = run_tool(
            &self.tools.iw,
            &["dev", interface.as_str(), "set", "channel", &number],
        )
        .await?;

        if output.success {
            return Ok(RadioInterfaceState::monitor(interface.clone()).tuned(channel));
        }

        let operation = format!("set channel {channel} on {interface}");
        let message = output.text.trim().to_string();
        Err(match classify_error(&output.text) {
            IwErrorKind::PermissionDenied => Error::permission_denied(operation),
            IwErrorKind::Busy => Error::interface_control(
                operation,
                InterfaceFailureKind::NotInMonitorMode,
                message,
            ),
            IwErrorKind::NoSuchDevice => {
                Error::interface_control(operation, InterfaceFailureKind::NoSuchDevice, message)
            }
            IwErrorKind::InvalidArgument => {
                Error::interface_control(operation, InterfaceFailureKind::IllegalChannel, message)
            }
            IwErrorKind::Other => {
                Error::interface_control(operation, InterfaceFailureKind::CommandFailed, message)
            }
        })
    }

    async fn start_capture(&mut self, interface: &InterfaceId, output: &Path) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            if session.child.try_wait()?.is_none() {
                return Err(Error::capture_process("a capture is already running"));
            }
        }

        let mut child = Command::new(&self.tools.capture)
            .arg("-i")
            .arg(interface.as_str())
            .arg("-w")
            .arg(output)
            .arg("-q")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Own process group: a terminal Ctrl-C reaches us, not the tool.
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    Error::permission_denied(format!("run {}", self.tools.capture))
                }
                _ => Error::capture_process(format!("failed to start {}: {e}", self.tools.capture)),
            })?;

        let (ready, stderr_task) = match child.stderr.take() {
            Some(stderr) => {
                let (tx, rx) = oneshot::channel();
                (Some(rx), Some(tokio::spawn(watch_stderr(stderr, tx))))
            }
            None => (None, None),
        };

        info!(
            pid = ?child.id(),
            %interface,
            output = %output.display(),
            "Started {}",
            self.tools.capture
        );
        self.session = Some(CaptureSession {
            child,
            ready,
            stderr_task,
        });
        Ok(())
    }

    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Readiness> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::capture_process("capture was not started"))?;

        let Some(ready) = session.ready.take() else {
            tokio::time::sleep(timeout).await;
            return Ok(Readiness::Assumed);
        };

        match tokio::time::timeout(timeout, ready).await {
            Ok(Ok(())) => Ok(Readiness::Acknowledged),
            Ok(Err(_)) => {
                debug!("Capture closed stderr before reporting it was capturing");
                Ok(Readiness::TimedOut)
            }
            Err(_) => Ok(Readiness::TimedOut),
        }
    }

    async fn capture_alive(&mut self) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        match session.child.try_wait()? {
            None => Ok(true),
            Some(status) => {
                warn!(%status, "Capture process exited");
                Ok(false)
            }
        }
    }

    async fn stop_capture(&mut self) -> Result<StopOutcome> {
        let Some(mut session) = self.session.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        let exited = session
            .child
            .try_wait()
            .map_err(|e| Error::termination(e.to_string()))?;
        let outcome = match exited {
            Some(status) => StopOutcome::AlreadyExited {
                code: status.code(),
            },
            None => {
                match self.stop_mode {
                    StopMode::Kill => session
                        .child
                        .kill()
                        .await
                        .map_err(|e| Error::termination(e.to_string()))?,
                    StopMode::Interrupt => self.interrupt(&mut session.child).await?,
                }
                StopOutcome::Terminated
            }
        };

        if let Some(mut task) = session.stderr_task.take() {
            match tokio::time::timeout(STDERR_DRAIN, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Capture stderr reader ended abnormally"),
                Err(_) => {
                    debug!("Capture stderr still open after stop; abandoning reader");
                    task.abort();
                }
            }
        }
        debug!(?outcome, "Capture stopped");
        Ok(outcome)
    }
}

/// Run a tool to completion and collect its output.
async fn run_tool(program: &str, args: &[&str]) -> Result<ToolOutput> {
    debug!(program, ?args, "Running");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        debug!(program, status = %output.status, output = %text.trim(), "Tool failed");
    }
    Ok(ToolOutput {
        success: output.status.success(),
        text,
    })
}

fn spawn_error(program: &str, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::NotFound => Error::environment_unsupported(format!("{program} not found")),
        io::ErrorKind::PermissionDenied => Error::permission_denied(format!("run {program}")),
        _ => Error::Io(e),
    }
}

/// Whether tool output says the caller is not privileged enough.
fn lacks_privilege(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["run it as root", "operation not permitted", "permission denied", "a password is required"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn airmon_error(operation: &str, text: &str) -> Error {
    if lacks_privilege(text) {
        Error::permission_denied(operation)
    } else if text.contains("No such device") {
        Error::interface_control(operation, InterfaceFailureKind::NoSuchDevice, text.trim())
    } else {
        Error::interface_control(operation, InterfaceFailureKind::CommandFailed, text.trim())
    }
}

/// Forward the capture tool's stderr to the log and signal readiness.
async fn watch_stderr(stderr: ChildStderr, ready: oneshot::Sender<()>) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(READY_MARKER) {
            if let Some(tx) = ready.take() {
                let _ = tx.send(());
            }
            debug!(target: "channelsweep::capture", "{line}");
        } else if lacks_privilege(line) || line.to_lowercase().contains("error") {
            warn!(target: "channelsweep::capture", "{line}");
        } else {
            debug!(target: "channelsweep::capture", "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Instant;

    /// Stands in for tshark: announces itself, then runs until interrupted.
    const CAPTURING_TOOL: &str = r#"trap 'exit 0' INT
echo "Capturing on '$2'" >&2
while true; do sleep 0.1; done"#;

    fn script(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("channelsweep-command-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn scripted(tool: &Path, stop_mode: StopMode, grace: Duration) -> CommandController {
        let tools = ToolsConfig {
            capture: tool.to_string_lossy().into_owned(),
            ..ToolsConfig::default()
        };
        CommandController::new(tools, stop_mode, grace)
    }

    async fn start(controller: &mut CommandController) {
        let iface = InterfaceId::new("wlan1mon").unwrap();
        let out = std::env::temp_dir().join("channelsweep-command-unused.pcapng");
        controller.start_capture(&iface, &out).await.unwrap();
    }

    fn process_group_of(pid: &str) -> u32 {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
        // Fields after the command name: state, ppid, pgrp.
        let fields = &stat[stat.rfind(')').unwrap() + 2..];
        fields.split_whitespace().nth(2).unwrap().parse().unwrap()
    }

    fn controller_with(capture: &str) -> CommandController {
        let tools = ToolsConfig {
            capture: capture.to_string(),
            ..ToolsConfig::default()
        };
        CommandController::new(tools, StopMode::Kill, Duration::from_millis(200))
    }

    #[test]
    fn test_lacks_privilege() {
        assert!(lacks_privilege("Run it as root"));
        assert!(lacks_privilege("command failed: Operation not permitted (-1)"));
        assert!(lacks_privilege("sudo: a password is required"));
        assert!(!lacks_privilege("monitor mode vif enabled"));
    }

    #[test]
    fn test_airmon_error_kinds() {
        assert!(airmon_error("start", "Run it as root").is_permission_error());
        assert!(matches!(
            airmon_error("start", "wlan9: No such device"),
            Error::InterfaceControl {
                kind: InterfaceFailureKind::NoSuchDevice,
                ..
            }
        ));
        assert!(matches!(
            airmon_error("start", "something odd"),
            Error::InterfaceControl {
                kind: InterfaceFailureKind::CommandFailed,
                ..
            }
        ));
    }

    #[test]
    fn test_spawn_error_not_found() {
        let err = spawn_error("tshark", io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.is_environment_unsupported());
    }

    #[tokio::test]
    async fn test_run_tool_collects_output() {
        let output = run_tool("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.text.contains("out"));
        assert!(output.text.contains("err"));
    }

    #[tokio::test]
    async fn test_run_missing_tool() {
        let err = run_tool("definitely-not-a-real-tool-xyz", &[]).await.unwrap_err();
        assert!(err.is_environment_unsupported());
    }

    #[tokio::test]
    async fn test_stop_without_capture() {
        let mut controller = controller_with("tshark");
        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::NotRunning
        );
        assert!(!controller.capture_alive().await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_requires_capture() {
        let mut controller = controller_with("tshark");
        assert!(controller
            .wait_until_ready(Duration::from_millis(10))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_capture_tool_fails_start() {
        let mut controller = controller_with("definitely-not-a-real-tool-xyz");
        let iface = InterfaceId::new("wlan1mon").unwrap();
        let out = std::env::temp_dir().join("channelsweep-command-unused.pcapng");
        let err = controller.start_capture(&iface, &out).await.unwrap_err();
        assert!(matches!(err, Error::CaptureProcess { .. }));
    }

    #[tokio::test]
    async fn test_probe_reports_missing_tools() {
        let tools = ToolsConfig {
            airmon_ng: "definitely-not-airmon-xyz".to_string(),
            iw: "definitely-not-iw-xyz".to_string(),
            capture: "definitely-not-tshark-xyz".to_string(),
        };
        let controller = CommandController::new(tools, StopMode::Kill, Duration::from_secs(1));
        let report = controller.probe_environment().await.unwrap();
        assert_eq!(report.missing_tools.len(), 3);
        assert_eq!(report.version, None);
    }

    #[tokio::test]
    async fn test_capture_lifecycle_with_kill() {
        let tool = script("capture-kill.sh", CAPTURING_TOOL);
        let mut controller = scripted(&tool, StopMode::Kill, Duration::from_secs(5));
        start(&mut controller).await;

        let readiness = controller
            .wait_until_ready(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(readiness, Readiness::Acknowledged);
        assert!(controller.capture_alive().await.unwrap());

        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::Terminated
        );
        assert!(!controller.capture_alive().await.unwrap());
    }

    #[tokio::test]
    async fn test_capture_lifecycle_with_interrupt() {
        let tool = script("capture-interrupt.sh", CAPTURING_TOOL);
        let mut controller = scripted(&tool, StopMode::Interrupt, Duration::from_secs(5));
        start(&mut controller).await;

        assert_eq!(
            controller
                .wait_until_ready(Duration::from_secs(5))
                .await
                .unwrap(),
            Readiness::Acknowledged
        );
        assert!(controller.capture_alive().await.unwrap());

        let started = Instant::now();
        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::Terminated
        );
        // The trap ends the tool well inside the grace period.
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_interrupt_falls_back_to_kill_after_grace() {
        let tool = script(
            "capture-stubborn.sh",
            r#"trap '' INT
echo "Capturing on '$2'" >&2
while true; do sleep 0.1; done"#,
        );
        let grace = Duration::from_millis(300);
        let mut controller = scripted(&tool, StopMode::Interrupt, grace);
        start(&mut controller).await;
        controller
            .wait_until_ready(Duration::from_secs(5))
            .await
            .unwrap();

        let started = Instant::now();
        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::Terminated
        );
        assert!(started.elapsed() >= grace);
        assert!(!controller.capture_alive().await.unwrap());
    }

    #[tokio::test]
    async fn test_capture_that_exits_early() {
        let tool = script(
            "capture-fails.sh",
            r#"echo "The capture session could not be initiated on '$2'" >&2
exit 2"#,
        );
        let mut controller = scripted(&tool, StopMode::Kill, Duration::from_secs(1));
        start(&mut controller).await;

        let readiness = controller
            .wait_until_ready(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(readiness, Readiness::TimedOut);

        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.capture_alive().await.unwrap() {
            assert!(Instant::now() < deadline, "capture never exited");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::AlreadyExited { code: Some(2) }
        );
    }

    #[tokio::test]
    async fn test_stop_does_not_wait_for_inherited_stderr() {
        // The background sleep keeps the stderr pipe open after the kill.
        let tool = script(
            "capture-forks.sh",
            "sleep 5 &\nwhile true; do sleep 0.1; done",
        );
        let mut controller = scripted(&tool, StopMode::Kill, Duration::from_secs(1));
        start(&mut controller).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        assert_eq!(
            controller.stop_capture().await.unwrap(),
            StopOutcome::Terminated
        );
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_capture_runs_in_its_own_process_group() {
        let tool = script("capture-group.sh", CAPTURING_TOOL);
        let mut controller = scripted(&tool, StopMode::Kill, Duration::from_secs(1));
        start(&mut controller).await;

        let pid = controller
            .session
            .as_ref()
            .and_then(|session| session.child.id())
            .unwrap()
            .to_string();
        let group = process_group_of(&pid);
        assert_eq!(group.to_string(), pid);
        assert_ne!(group, process_group_of("self"));

        controller.stop_capture().await.unwrap();
    }
}
