pub mod alerts;
pub mod clock;
pub mod console;
pub mod metronome;
pub mod session;
pub mod settings;
pub mod timeline;
pub mod timer;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use alerts::{AlertSink, ChannelAlertSink};
use clock::SystemClock;
use console::{parse_input, ConsoleInput, USAGE};
use metronome::Metronome;
use session::{Command, SessionController, SessionError, SessionMachine};
use settings::Settings;

pub use session::{SessionSnapshot, SessionState, SessionSummary};

/// Interactive console: reads operator commands from stdin until `quit` or EOF.
pub async fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("code timer starting up...");

    let settings = Settings::from_env()?;
    let (alert_sink, alert_rx) = ChannelAlertSink::new();
    let alerts: Arc<dyn AlertSink> = Arc::new(alert_sink);

    let machine = SessionMachine::new(&settings, Arc::new(SystemClock));
    let (controller, session_task) = SessionController::spawn(machine, &settings, alerts.clone());

    let mut metronome = Metronome::new(
        settings.metronome_interval(),
        Arc::new(console::BellClick),
        alerts.clone(),
    );

    let display_token = CancellationToken::new();
    let display_task = tokio::spawn(console::display_loop(
        controller.subscribe(),
        alert_rx,
        settings.heartbeat_every_ticks,
        display_token.clone(),
    ));

    println!("{USAGE}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read operator input")? {
        let Some(input) = parse_input(&line) else {
            if !line.trim().is_empty() {
                println!("unknown command: {}", line.trim());
            }
            continue;
        };

        match input {
            ConsoleInput::Quit => break,
            ConsoleInput::Help => println!("{USAGE}"),
            ConsoleInput::ToggleMetronome => {
                let on = metronome.toggle().await?;
                println!("metronome {}", if on { "on" } else { "off" });
            }
            ConsoleInput::Status { json } => {
                let snapshot = controller.snapshot().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                } else {
                    println!("{}", console::render_status(&snapshot));
                }
            }
            ConsoleInput::Timeline => {
                let snapshot = controller.snapshot().await?;
                for entry in &snapshot.log {
                    println!("{}", console::render_entry(entry));
                }
            }
            ConsoleInput::Session(command) => match controller.dispatch(command).await {
                Ok(outcome) => {
                    if let (Command::End, Some(summary)) = (command, outcome.summary) {
                        println!("{}", console::render_summary(&summary));
                    }
                }
                // Same as pressing a disabled button.
                Err(err @ SessionError::InvalidTransition { .. }) => debug!("{err}"),
                Err(err) => return Err(err.into()),
            },
        }
    }

    metronome.stop().await?;
    controller.shutdown();
    session_task.await.context("session task failed to join")?;
    display_token.cancel();
    display_task.await.context("display task failed to join")?;

    info!("code timer shut down");
    Ok(())
}
