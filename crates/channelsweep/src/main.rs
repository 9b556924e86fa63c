//! `chsweep` - CLI for channelsweep
//!
//! This binary sweeps a Wi-Fi adapter across channels while a capture tool
//! records what it hears.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

#[cfg(not(target_os = "linux"))]
compile_error!("chsweep drives airmon-ng and iw and only supports Linux");

use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tracing::{info, warn};

use channelsweep::cli::{ChannelsCommand, Cli, Command, ConfigCommand, RunCommand};
use channelsweep::{
    init_logging, run_capture_sweep, CaptureResult, CommandController, Config,
    DeviceController, Error, InterfaceId, RecordingController, SweepHandle, SweepPlan,
};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use channelsweep_linux as platform;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(hint) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<Error>())
                .and_then(Error::hint)
            {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let verbosity = cli.verbosity();

    // These work on the file itself, so a broken config must not stop them.
    if let Command::Config(cmd @ (ConfigCommand::Path | ConfigCommand::Validate { .. })) =
        &cli.command
    {
        init_logging(verbosity, None)?;
        return handle_config_file(cmd, cli.config.as_deref());
    }

    // Load configuration
    let mut config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Initialize logging based on verbosity
    init_logging(verbosity, config.logging.file.as_deref())?;
    platform::init().map_err(|e| anyhow!("platform initialization failed: {e}"))?;

    match cli.command {
        Command::Run(cmd) => handle_run(&mut config, &cmd).await,
        Command::Check(cmd) => handle_check(&config, cmd.json).await,
        Command::Channels(cmd) => handle_channels(&config, &cmd).await,
        Command::Config(ConfigCommand::Show { json }) => handle_show(&config, json),
        Command::Config(cmd) => handle_config_file(&cmd, cli.config.as_deref()),
    }
}

async fn handle_run(config: &mut Config, cmd: &RunCommand) -> anyhow::Result<()> {
    cmd.apply(config)?;

    let interface = if cmd.dry_run {
        // Nothing is touched, so the adapter does not need to be present.
        config.resolve_interface(|_| true)?
    } else {
        config.resolve_interface(platform::interface_exists)?
    };

    let mut plan = SweepPlan::from_config(config, interface)?;
    plan.dry_run = cmd.dry_run;

    let mut controller: Box<dyn DeviceController> = if cmd.dry_run {
        Box::new(RecordingController::new().announcing())
    } else {
        Box::new(CommandController::from_config(config))
    };

    let handle = SweepHandle::new();
    let stopper = handle.clone();
    let signals = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping the sweep");
            stopper.stop();
        }
    });

    info!(
        expected = ?plan.expected_duration(),
        output = %plan.output_path.display(),
        "Sweeping {} channel(s)",
        plan.total_visits()
    );
    let result = run_capture_sweep(controller.as_mut(), plan, handle).await;
    signals.abort();

    print_result(&result?, cmd.json)
}

fn print_result(result: &CaptureResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let visited = result
        .visited
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    println!("Capture sweep {}", if result.cancelled { "cancelled" } else { "complete" });
    println!("-------------------");
    println!("Output:        {}", result.output_path.display());
    println!("Channels:      {} ({visited})", result.channels_swept);
    println!("Readiness:     {}", result.readiness);
    println!(
        "Duration:      {:.1}s",
        result.duration().num_milliseconds() as f64 / 1000.0
    );
    if let Some(fingerprint) = &result.fingerprint {
        println!("Size:          {} bytes", fingerprint.bytes);
        println!("BLAKE3:        {}", fingerprint.digest);
    }
    if !result.retune_failures.is_empty() {
        println!();
        println!("Retune failures:");
        for failure in &result.retune_failures {
            println!("  channel {:>3}: {}", failure.channel, failure.message);
        }
    }
    Ok(())
}

async fn handle_check(config: &Config, json: bool) -> anyhow::Result<()> {
    let controller = CommandController::from_config(config);
    let minimum = config.min_tool_version()?;
    let report = controller.probe_environment().await?;
    let verdict = report.require(minimum);

    let adapters = if report.missing_tools.contains(&config.tools.airmon_ng) {
        Vec::new()
    } else {
        controller.list_adapters().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not list adapters");
            Vec::new()
        })
    };

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "tool": report.tool,
            "version": report.version,
            "min_version": minimum,
            "missing_tools": report.missing_tools,
            "supported": verdict.is_ok(),
            "adapters": adapters.iter().map(|a| serde_json::json!({
                "phy": a.phy,
                "interface": a.interface,
                "driver": a.driver,
                "chipset": a.chipset,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let version = report
            .version
            .map_or_else(|| "unknown".to_string(), |v| v.to_string());
        println!("chsweep environment");
        println!("-------------------");
        println!("Platform:      {}", platform::platform_name());
        println!("Capture tool:  {} {version} (need {minimum})", report.tool);
        if !report.missing_tools.is_empty() {
            println!("Missing:       {}", report.missing_tools.join(", "));
        }
        if adapters.is_empty() {
            println!("Adapters:      none found");
        } else {
            println!("Adapters:");
            for adapter in &adapters {
                println!(
                    "  {:<6} {:<16} {:<12} {}",
                    adapter.phy, adapter.interface, adapter.driver, adapter.chipset
                );
            }
        }
    }

    verdict?;
    Ok(())
}

async fn handle_channels(config: &Config, cmd: &ChannelsCommand) -> anyhow::Result<()> {
    let interface = match &cmd.interface {
        Some(name) => InterfaceId::new(name.as_str())?,
        None => config.resolve_interface(platform::interface_exists)?,
    };

    let controller = CommandController::from_config(config);
    let Some(channels) = controller.supported_channels(&interface).await? else {
        bail!("could not determine the channels supported by {interface}");
    };

    if cmd.json {
        let list: Vec<_> = channels
            .iter()
            .map(|c| {
                serde_json::json!({
                    "channel": c,
                    "frequency_mhz": c.frequency_mhz(),
                    "band": c.band().to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        println!("Channels supported by {interface}:");
        for channel in &channels {
            println!(
                "  {:>3}  {} MHz  {}",
                channel,
                channel.frequency_mhz(),
                channel.band()
            );
        }
    }
    Ok(())
}

fn handle_show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let channels = config
        .sweep
        .channels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Interface]");
    println!(
        "  Name:               {}",
        config.interface.name.as_deref().unwrap_or("(none)")
    );
    println!(
        "  MAC address:        {}",
        config.interface.mac_address.as_deref().unwrap_or("(none)")
    );
    println!("  Kill conflicting:   {}", config.interface.kill_conflicting);
    println!();
    println!("[Sweep]");
    println!("  Channels:           {channels}");
    println!("  Dwell (ms):         {}", config.sweep.dwell_ms);
    println!("  Passes:             {}", config.sweep.passes);
    println!();
    println!("[Capture]");
    println!("  Output path:        {}", config.output_path().display());
    println!("  Warm-up (ms):       {}", config.capture.warmup_ms);
    println!("  Wait for ready:     {}", config.capture.wait_for_ready);
    println!("  Stop mode:          {:?}", config.capture.stop_mode);
    println!();
    println!("[Environment]");
    println!("  Check:              {}", config.environment.check);
    println!("  Min tool version:   {}", config.environment.min_tool_version);
    println!();
    println!("[Tools]");
    println!("  airmon-ng:          {}", config.tools.airmon_ng);
    println!("  iw:                 {}", config.tools.iw);
    println!("  capture:            {}", config.tools.capture);
    Ok(())
}

fn handle_config_file(cmd: &ConfigCommand, config_path: Option<&Path>) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Path => {
            let path = config_path.map_or_else(Config::default_config_path, Path::to_path_buf);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .clone()
                .or_else(|| config_path.map(Path::to_path_buf))
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            if !path.exists() {
                println!("No file at that path; checking the built-in defaults.");
            }
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
        ConfigCommand::Show { .. } => bail!("`config show` needs the loaded configuration"),
    }
    Ok(())
}
