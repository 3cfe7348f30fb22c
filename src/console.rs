//! Terminal adapters: operator input parsing, the display sink, and the
//! bell used as the metronome click.

use std::io::Write;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    alerts::Alert,
    clock::format_elapsed,
    metronome::Click,
    session::{Command, SessionSnapshot, SessionState, SessionSummary},
    timeline::EventLogEntry,
};

pub const USAGE: &str = "commands: start pause resume end | cpr epi shock | clear cancel | \
metronome | status [json] | log | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    Session(Command),
    ToggleMetronome,
    Status { json: bool },
    Timeline,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace().map(str::to_ascii_lowercase);
    let first = words.next()?;
    let input = match first.as_str() {
        "start" => ConsoleInput::Session(Command::Start),
        "pause" => ConsoleInput::Session(Command::Pause),
        "resume" => ConsoleInput::Session(Command::Resume),
        "end" => ConsoleInput::Session(Command::End),
        "cpr" => ConsoleInput::Session(Command::Cpr),
        "epi" | "epinephrine" => ConsoleInput::Session(Command::Epinephrine),
        "shock" => ConsoleInput::Session(Command::Shock),
        "clear" => ConsoleInput::Session(Command::ClearLog),
        "cancel" => ConsoleInput::Session(Command::CancelReminders),
        "metronome" | "m" => ConsoleInput::ToggleMetronome,
        "status" | "s" => ConsoleInput::Status {
            json: words.next().as_deref() == Some("json"),
        },
        "log" | "timeline" => ConsoleInput::Timeline,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        _ => return None,
    };
    Some(input)
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let rhythm = if snapshot.rhythm_active {
        format_elapsed(snapshot.rhythm_seconds)
    } else {
        "--:--".to_string()
    };
    format!(
        "[{}] elapsed {}  rhythm {}  cycles {}  epi {}  shocks {}  reminders {}",
        snapshot.state,
        format_elapsed(snapshot.elapsed_seconds),
        rhythm,
        snapshot.counters.cycles,
        snapshot.counters.epinephrine_doses,
        snapshot.counters.shocks,
        snapshot.pending_reminders,
    )
}

pub fn render_entry(entry: &EventLogEntry) -> String {
    format!("{}  {}", entry.timestamp, entry.description)
}

pub fn render_summary(summary: &SessionSummary) -> String {
    format!(
        "Summary:\nCycles: {}\nEpinephrine: {}\nShocks: {}\nDuration: {}",
        summary.cycles,
        summary.epinephrine_doses,
        summary.shocks,
        format_elapsed(summary.elapsed_seconds),
    )
}

pub fn render_alert(alert: &Alert) -> String {
    format!("*** {} *** {}", alert.title().to_uppercase(), alert.message())
}

/// Prints alerts as they arrive, timeline entries as they are appended, and
/// a status line every `heartbeat_every` seconds of running time.
pub async fn display_loop(
    mut snapshots: watch::Receiver<SessionSnapshot>,
    mut alerts: mpsc::UnboundedReceiver<Alert>,
    heartbeat_every: u32,
    cancel_token: CancellationToken,
) {
    let mut shown_entries = snapshots.borrow().log.len();
    let mut last_elapsed = snapshots.borrow().elapsed_seconds;
    let heartbeat_every = u64::from(heartbeat_every.max(1));

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            alert = alerts.recv() => match alert {
                Some(alert) => println!("{}", render_alert(&alert)),
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();

                if snapshot.log.len() < shown_entries {
                    println!("-- timeline cleared --");
                    shown_entries = 0;
                }
                for entry in &snapshot.log[shown_entries..] {
                    println!("{}", render_entry(entry));
                }
                shown_entries = snapshot.log.len();

                if snapshot.state == SessionState::Running
                    && snapshot.elapsed_seconds != last_elapsed
                    && snapshot.elapsed_seconds % heartbeat_every == 0
                {
                    println!("{}", render_status(&snapshot));
                }
                last_elapsed = snapshot.elapsed_seconds;
            }
        }
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct BellClick;

impl Click for BellClick {
    fn click(&self) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .context("failed to write metronome click to terminal")
    }
}
