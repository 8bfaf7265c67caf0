//! Console control surface.
//!
//! Translates stdin commands into supervisor calls and renders engine events
//! as console output. This is the only presentation layer; a GUI would sit
//! in the same place and call the same [`LoopSupervisor`] methods.
//!
//! Commands (one per line, case-insensitive):
//! - `scan on` / `scan off`
//! - `cycle on` / `cycle off`
//! - empty line or `resume`: release a paused scanner
//! - `status`, `help`, `quit`

use crate::engine::{EngineEvent, LoopKind, StopReason};
use crate::supervisor::LoopSupervisor;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

pub const HELP_TEXT: &str =
    "Commands: scan on|off, cycle on|off, <Enter>/resume, status, help, quit";

/// Width of the reminder progress bar, in cells
const PROGRESS_BAR_WIDTH: usize = 30;

/// A parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetIntent(LoopKind, bool),
    Resume,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Expected 'on' or 'off' after '{0}'")]
    MissingToggle(String),
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ControlCommand, CommandError> {
    let line = line.trim().to_ascii_lowercase();
    let mut words = line.split_whitespace();

    let Some(verb) = words.next() else {
        return Ok(ControlCommand::Resume);
    };

    let kind = match verb {
        "scan" | "scanner" => LoopKind::Scan,
        "cycle" | "reminder" => LoopKind::Cycle,
        "resume" | "r" => return Ok(ControlCommand::Resume),
        "status" | "s" => return Ok(ControlCommand::Status),
        "help" | "?" => return Ok(ControlCommand::Help),
        "quit" | "exit" | "q" => return Ok(ControlCommand::Quit),
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    match words.next() {
        Some("on" | "start") => Ok(ControlCommand::SetIntent(kind, true)),
        Some("off" | "stop") => Ok(ControlCommand::SetIntent(kind, false)),
        _ => Err(CommandError::MissingToggle(verb.to_string())),
    }
}

/// Whether the console loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply a command to the supervisor.
pub fn apply_command(supervisor: &LoopSupervisor, command: ControlCommand) -> Flow {
    match command {
        ControlCommand::SetIntent(kind, desired) => {
            supervisor.set_intent(kind, desired);
        }
        ControlCommand::Resume => supervisor.resume_scan(),
        ControlCommand::Status => println!("{}", status_line(supervisor)),
        ControlCommand::Help => println!("{HELP_TEXT}"),
        ControlCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

pub fn status_line(supervisor: &LoopSupervisor) -> String {
    let state = |kind| {
        if supervisor.is_running(kind) {
            "running"
        } else {
            "stopped"
        }
    };
    format!(
        "scanner: {}, reminder cycle: {}",
        state(LoopKind::Scan),
        state(LoopKind::Cycle)
    )
}

/// Why the console stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The user asked to quit
    Quit,
    /// End of input (no tty, or stdin redirected). The loops keep running.
    InputClosed,
}

/// Read commands until `quit` or end of input.
///
/// End of input only ends command reading; it never stops a loop.
pub async fn run_console<R>(
    supervisor: Arc<LoopSupervisor>,
    input: R,
) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(command) => {
                tracing::debug!("Console command: {:?}", command);
                if apply_command(&supervisor, command) == Flow::Quit {
                    return Ok(ConsoleExit::Quit);
                }
            }
            Err(err) => println!("{err}. {HELP_TEXT}"),
        }
    }
    tracing::info!("Console input closed, loops keep running until interrupted");
    Ok(ConsoleExit::InputClosed)
}

/// Print engine events until the channel closes.
pub async fn print_events(mut events: broadcast::Receiver<EngineEvent>) {
    let mut progress = ProgressThrottle::default();
    loop {
        match events.recv().await {
            Ok(EngineEvent::CycleProgress { fraction }) => {
                if let Some(bar) = progress.step(fraction) {
                    println!("{bar}");
                }
            }
            Ok(event) => {
                if let Some(text) = describe_event(&event) {
                    println!("{text}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Console missed {} engine events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Console text for an event. Progress is rendered by [`ProgressThrottle`].
pub fn describe_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::LoopStarted { kind } => Some(format!("Started {kind}")),
        EngineEvent::LoopStopped { kind, reason } => Some(match reason {
            StopReason::Cancelled => format!("Stopped {kind}"),
            StopReason::StoppedOnMatch => {
                format!("Stopped {kind} after a match, use 'scan on' to restart")
            }
            StopReason::Failed(message) => {
                format!("{kind} failed: {message}. Use '{} on' to restart", command_word(*kind))
            }
        }),
        EngineEvent::MatchFound { label, rgb } => Some(format!(
            "Found: {label} ({}, {}, {})",
            rgb[0], rgb[1], rgb[2]
        )),
        EngineEvent::ScanPaused => Some("Press the Enter Key to Resume".to_string()),
        EngineEvent::ScanResumed => Some("Resuming Scanning".to_string()),
        EngineEvent::ReminderPlayed => Some("Reminder".to_string()),
        EngineEvent::CycleProgress { .. } => None,
    }
}

/// Emits a progress bar only when the reminder wait crosses a new tenth.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last_tenth: Option<u32>,
}

impl ProgressThrottle {
    pub fn step(&mut self, fraction: f32) -> Option<String> {
        let tenth = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        match self.last_tenth {
            // A drop means a new wait has started
            Some(last) if tenth == last => None,
            Some(last) if tenth < last => {
                self.last_tenth = Some(tenth);
                None
            }
            _ => {
                self.last_tenth = Some(tenth);
                (tenth > 0).then(|| render_progress_bar(fraction, PROGRESS_BAR_WIDTH))
            }
        }
    }
}

fn command_word(kind: LoopKind) -> &'static str {
    match kind {
        LoopKind::Scan => "scan",
        LoopKind::Cycle => "cycle",
    }
}

/// Render `fraction` as a fixed-width text bar, e.g. `[#####     ]  50%`.
pub fn render_progress_bar(fraction: f32, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * width as f32).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        " ".repeat(width - filled),
        (fraction * 100.0).round() as u32
    )
}
