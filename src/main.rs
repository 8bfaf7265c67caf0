//! pixelwatch - watch a screen region for alert colors
//!
//! Main entry point for the console application.
//!
//! # Execution Flow
//!
//! 1. Parse the command line and initialize logging → logs/pixelwatch.<date>
//! 2. Load config.yaml and select the active profile (flag, default, or prompt)
//! 3. Optionally save a PNG preview of the capture region
//! 4. Create the tokio runtime, audio player, screen capturer and supervisor
//! 5. Start the scanner (and the reminder cycle if requested)
//! 6. Read console commands until `quit` or Ctrl-C. If stdin closes first,
//!    keep scanning until Ctrl-C
//! 7. Cancel both loops, log metrics, shut the runtime down
//!
//! Configuration errors are fatal: the process prints the error and exits
//! non-zero before any loop starts.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use pixelwatch::config::{self, ConfigManager, DEFAULT_CONFIG_FILE};
use pixelwatch::control::{self, ConsoleExit};
use pixelwatch::engine::LoopKind;
use pixelwatch::services::{
    AlertPlayer, RodioOutput, ScreenCapturer, XcapCapturer, save_frame_png,
};
use pixelwatch::{APP_NAME, ActiveConfig, LoopSupervisor, VERSION};
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for each loop to exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "pixelwatch", version, about = "Watch a screen region for alert colors")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: Utf8PathBuf,

    /// Profile to activate (skips the DefaultProfile setting and the prompt)
    #[arg(short, long)]
    profile: Option<String>,

    /// Start the periodic reminder cycle immediately
    #[arg(long)]
    cycle: bool,

    /// Save a PNG of the capture region before scanning
    #[arg(long)]
    preview: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Directory for rotating log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Write a starter config file if none exists, then exit
    #[arg(long)]
    init: bool,

    /// Print the bounds of every active display, then exit
    #[arg(long)]
    list_displays: bool,

    /// Print the mouse position every few seconds until Ctrl-C (Windows only)
    #[arg(long)]
    cursor: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = pixelwatch::logging::setup_logging(&cli.log_dir, APP_NAME, cli.debug, true)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(&cli.config);

    if cli.init {
        if config_manager.write_starter_if_missing()? {
            println!("Wrote starter config to {}", config_manager.config_path());
        } else {
            println!("{} already exists, left unchanged", config_manager.config_path());
        }
        return Ok(());
    }

    if cli.list_displays {
        return list_displays();
    }

    if cli.cursor {
        return cursor_readout();
    }

    println!("This program runs indefinitely, type 'quit' or press Ctrl+C to exit.");

    let watch_config = config_manager
        .load()
        .context("Configuration error, cannot start")?;

    let profile_name = match cli
        .profile
        .clone()
        .or_else(|| watch_config.settings.default_profile.clone())
    {
        Some(name) => name,
        None => config::prompt_profile(
            &watch_config,
            std::io::stdin().lock(),
            std::io::stdout(),
        )?,
    };
    println!("Selected: {profile_name}");

    let active = config_manager.activate(&watch_config, &profile_name)?;
    let capturer = Arc::new(XcapCapturer::new());

    if cli.preview || active.settings.save_preview {
        save_region_preview(&capturer, &active);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("pixelwatch-worker")
        .build()?;

    let player = Arc::new(AlertPlayer::new(RodioOutput::new()));
    let supervisor = Arc::new(LoopSupervisor::new(
        runtime.handle().clone(),
        capturer,
        player,
        &active,
    ));
    let start_cycle = cli.cycle || active.settings.cycle_on_startup;

    runtime.block_on(async {
        tokio::spawn(control::print_events(supervisor.subscribe()));

        println!("Starting main loop");
        supervisor.set_intent(LoopKind::Scan, true);
        if start_cycle {
            supervisor.set_intent(LoopKind::Cycle, true);
        }
        println!("{}", control::HELP_TEXT);

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let console_exit = tokio::select! {
            result = control::run_console(Arc::clone(&supervisor), stdin) => match result {
                Ok(exit) => Some(exit),
                Err(err) => {
                    tracing::error!("Console input failed: {}", err);
                    Some(ConsoleExit::InputClosed)
                }
            },
            _ = wait_for_interrupt() => None,
        };

        // Unattended runs (no tty, stdin redirected) scan until interrupted
        if console_exit == Some(ConsoleExit::InputClosed) {
            wait_for_interrupt().await;
        }
        tracing::info!("Shutting down");

        supervisor.shutdown(SHUTDOWN_TIMEOUT).await;
    });

    supervisor.metrics().log_summary();

    // Stdin reads may still be parked on a blocking thread
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    tracing::info!("Ending program");
    Ok(())
}

/// Resolve on Ctrl-C. Without a signal handler the process runs until killed.
async fn wait_for_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received"),
        Err(err) => {
            tracing::error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

fn list_displays() -> Result<()> {
    let displays = XcapCapturer::new()
        .displays()
        .context("Failed to enumerate displays")?;

    println!("Number of Active Displays: {}", displays.len());
    for display in displays {
        println!(
            "#{} {}: x={} y={} {}x{}",
            display.index, display.name, display.x, display.y, display.width, display.height
        );
    }
    Ok(())
}

/// Print the cursor position until Ctrl-C.
#[cfg(windows)]
fn cursor_readout() -> Result<()> {
    use pixelwatch::engine::cancel_pair;
    use pixelwatch::services::{CURSOR_INTERVAL, system_cursor, track_cursor};

    println!("Printing the cursor position, press Ctrl+C to exit.");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (cancel, token) = cancel_pair();
        let tracker = track_cursor(system_cursor, CURSOR_INTERVAL, std::io::stdout(), token);
        tokio::pin!(tracker);

        tokio::select! {
            result = &mut tracker => return result.context("Cursor tracking failed"),
            _ = wait_for_interrupt() => cancel.cancel(),
        }
        tracker.await.context("Cursor tracking failed")
    })
}

#[cfg(not(windows))]
fn cursor_readout() -> Result<()> {
    anyhow::bail!("--cursor is only supported on Windows")
}

/// Capture the region once and save it to the working directory for visual checking.
/// Failures are logged; the scan loop reports capture problems audibly anyway.
fn save_region_preview(capturer: &XcapCapturer, active: &ActiveConfig) {
    let frame = match capturer.capture(&active.region) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!("Region preview capture failed: {}", err);
            return;
        }
    };

    let path = Utf8PathBuf::from(format!(
        "{}_{}x{}.png",
        active.profile_name,
        frame.width(),
        frame.height()
    ));
    match save_frame_png(&frame, &path) {
        Ok(()) => println!("Saved region preview to {path}"),
        Err(err) => tracing::warn!("Failed to save region preview {}: {}", path, err),
    }
}
