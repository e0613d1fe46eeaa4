//! Kozy Control Panel - Main entry point
//!
//! Supervises the depth camera, servo drives, and microcontroller of a
//! robotics rig, streams camera frames, and keeps a searchable log console.

mod config;
mod console;
mod context;
mod controller;
mod presenter;
mod shell;
mod ticker;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::{ConsoleLayer, LogConsole};
use context::PanelContext;
use controller::{Command, Controller};
use kozy_capture::SimulatedCamera;
use kozy_core::{CameraDriver, Channel, ModuleId, Severity, StreamConfig};
use kozy_serial::SystemSerial;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ticker::TokioTicker;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "kozy")]
#[command(about = "Robotics control panel: device discovery, camera streaming, log console")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "kozy.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Use the simulated camera instead of a hardware driver
    #[arg(long)]
    simulated: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone)]
enum Mode {
    /// Detect all modules once and print their status
    Detect,
    /// Handshake with the microcontroller and print its code
    Connect {
        /// Overall handshake timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Stream from the camera for a fixed time
    Stream {
        /// WIDTHxHEIGHT, defaults to the configured value
        #[arg(long)]
        resolution: Option<String>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long, default_value = "5")]
        seconds: u64,
    },
    /// Interactive console (default)
    Console,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging: terminal output plus the in-process console
    let log_console = Arc::new(LogConsole::default());
    let level = LevelFilter::from_level(parse_level(&args.log_level));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(ConsoleLayer::new(log_console.clone()))
        .try_init()?;

    info!("Kozy Control Panel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config);
    if args.simulated {
        config.camera.simulated = true;
    }
    log_console.set_capacity(config.console.capacity);
    debug!(capacity = log_console.capacity(), "Log console ready");

    let mode = args.mode.clone().unwrap_or(Mode::Console);

    // Validate overrides before anything touches hardware
    let stream_override = match &mode {
        Mode::Stream {
            resolution, fps, ..
        } if resolution.is_some() || fps.is_some() => {
            let resolution = resolution
                .clone()
                .unwrap_or_else(|| config.stream.resolution.clone());
            Some(StreamConfig::parse(&resolution, fps.unwrap_or(config.stream.fps))?)
        }
        _ => None,
    };

    let driver: Option<Arc<dyn CameraDriver>> = if config.camera.simulated {
        info!("Using simulated camera");
        Some(Arc::new(SimulatedCamera::new()))
    } else {
        warn!("No camera SDK driver available, run with --simulated to stream");
        None
    };

    // Wire up the controller, its tick source, and the presenter
    let ctx = PanelContext::new();
    let (commands, queue) = mpsc::channel(64);
    let ticker = TokioTicker::new(tokio::runtime::Handle::current(), commands.clone());
    let controller = Controller::new(
        ctx.clone(),
        config.clone(),
        args.config.clone(),
        driver,
        Arc::new(SystemSerial),
        Box::new(ticker),
    );
    let presenter = tokio::spawn(presenter::run(ctx.subscribe()));
    drop(ctx);
    let worker = tokio::task::spawn_blocking(move || controller.run(queue));

    match &mode {
        Mode::Detect => {
            commands.send(Command::DetectDevices).await?;
            commands.send(Command::Shutdown).await?;
        }
        Mode::Connect { timeout_ms } => {
            commands
                .send(Command::ConnectMicrocontroller {
                    timeout: timeout_ms.map(Duration::from_millis),
                })
                .await?;
            commands.send(Command::Shutdown).await?;
        }
        Mode::Stream { seconds, .. } => {
            if let Some(stream) = stream_override {
                commands.send(Command::SetStream(stream)).await?;
            }
            commands.send(Command::StartStream).await?;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(*seconds)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            commands.send(Command::StopStream).await?;
            commands.send(Command::Shutdown).await?;
        }
        Mode::Console => {
            commands.send(Command::DetectDevices).await?;
            if config.microcontroller.auto_connect {
                info!("Auto-connecting to microcontroller...");
                commands
                    .send(Command::ConnectMicrocontroller { timeout: None })
                    .await?;
            }
            shell::run(commands.clone(), log_console.clone()).await;
        }
    }
    drop(commands);

    let stats = worker.await?;
    let presenter = presenter.await?;

    match mode {
        Mode::Connect { .. } => {
            let pico = ModuleId::microcontroller();
            let last = presenter.statuses().iter().rev().find(|r| r.module == pico);
            match last {
                Some(report) if report.severity == Severity::Good => println!("{}", report.text),
                _ => bail!("Microcontroller handshake failed"),
            }
        }
        Mode::Stream { .. } => {
            println!(
                "color: {} frames, depth: {} frames, dropped: {}",
                stats.color_frames,
                stats.depth_frames,
                stats.dropped_ticks + stats.dropped_frames
            );
            println!(
                "displayed: {} color, {} depth",
                presenter.image_count(Channel::Color),
                presenter.image_count(Channel::Depth)
            );
            if let Some(image) = presenter.latest(Channel::Depth) {
                println!("last depth image: {}x{}", image.width, image.height);
            }
        }
        Mode::Detect | Mode::Console => {}
    }

    Ok(())
}
