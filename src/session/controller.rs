use std::{future, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{alerts::AlertSink, settings::Settings};

use super::{
    error::SessionError,
    machine::{Outcome, SessionMachine},
    state::{Command, SessionSnapshot, SessionSummary},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const COMMAND_QUEUE_DEPTH: usize = 64;

enum Input {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Outcome, SessionError>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Handle to the task that owns the [`SessionMachine`].
///
/// Operator commands, one-second ticks and reminder deadlines all go through
/// a single `select!` loop, so no two of them ever interleave. Readers get
/// snapshots through [`subscribe`](Self::subscribe); a new one is published
/// after every mutation.
#[derive(Clone)]
pub struct SessionController {
    tx: mpsc::Sender<Input>,
    snapshots: watch::Receiver<SessionSnapshot>,
    cancel_token: CancellationToken,
}

impl SessionController {
    pub fn spawn(
        machine: SessionMachine,
        settings: &Settings,
        alerts: Arc<dyn AlertSink>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(session_loop(
            machine,
            rx,
            snapshot_tx,
            alerts,
            settings.tick_interval(),
            cancel_token.clone(),
        ));

        (
            Self {
                tx,
                snapshots: snapshot_rx,
                cancel_token,
            },
            handle,
        )
    }

    /// Runs one command to completion. Alerts it raised have already been
    /// handed to the sink when this returns.
    pub async fn dispatch(&self, command: Command) -> Result<Outcome, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Input::Command {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn end(&self) -> Result<SessionSummary, SessionError> {
        let outcome = self.dispatch(Command::End).await?;
        Ok(outcome.summary.unwrap_or_default())
    }

    /// A snapshot taken in queue order, after everything sent before it.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Input::Snapshot(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

enum Step {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Outcome, SessionError>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Tick,
    AlarmDue,
    Stop,
}

async fn session_loop(
    mut machine: SessionMachine,
    mut rx: mpsc::Receiver<Input>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    alerts: Arc<dyn AlertSink>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker: Option<Interval> = None;

    loop {
        if machine.is_ticking() {
            if ticker.is_none() {
                // First tick one full period after start/resume.
                let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
                ticker = Some(interval);
                log_debug!("tick source armed");
            }
        } else if ticker.take().is_some() {
            log_debug!("tick source disarmed");
        }

        let deadline = machine.next_alarm_deadline();

        let step = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Step::Stop,
            input = rx.recv() => match input {
                Some(Input::Command { command, reply }) => Step::Command { command, reply },
                Some(Input::Snapshot(reply)) => Step::Snapshot(reply),
                None => Step::Stop,
            },
            _ = next_tick(&mut ticker) => Step::Tick,
            _ = alarm(deadline) => Step::AlarmDue,
        };

        match step {
            Step::Stop => {
                log_info!("session loop shutting down");
                break;
            }
            Step::Snapshot(reply) => {
                let _ = reply.send(machine.snapshot());
            }
            Step::Command { command, reply } => {
                let result = machine.apply(command, Instant::now());
                match &result {
                    Ok(outcome) => {
                        log_debug!("{} applied, now {}", command, machine.state());
                        deliver(outcome, alerts.as_ref());
                        snapshot_tx.send_replace(machine.snapshot());
                    }
                    Err(err) => log_warn!("dropped command: {}", err),
                }
                let _ = reply.send(result);
            }
            Step::Tick => {
                let outcome = machine.tick();
                deliver(&outcome, alerts.as_ref());
                snapshot_tx.send_replace(machine.snapshot());
            }
            Step::AlarmDue => {
                let outcome = machine.fire_due(Instant::now());
                deliver(&outcome, alerts.as_ref());
                snapshot_tx.send_replace(machine.snapshot());
            }
        }
    }
}

fn deliver(outcome: &Outcome, alerts: &dyn AlertSink) {
    for alert in &outcome.alerts {
        alerts.raise(alert.clone());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn alarm(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alerts::{Alert, ChannelAlertSink},
        clock::ManualClock,
        session::state::SessionState,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    fn spawn() -> (SessionController, JoinHandle<()>, UnboundedReceiver<Alert>) {
        let settings = Settings::default();
        let machine = SessionMachine::new(&settings, Arc::new(ManualClock::at(8, 0, 0)));
        let (sink, rx) = ChannelAlertSink::new();
        let (controller, handle) = SessionController::spawn(machine, &settings, Arc::new(sink));
        (controller, handle, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_ticks_once_per_second_while_running() {
        let (controller, _handle, _alerts) = spawn();
        controller.dispatch(Command::Start).await.unwrap();

        time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(controller.snapshot().await.unwrap().elapsed_seconds, 10);

        controller.dispatch(Command::Pause).await.unwrap();
        time::sleep(Duration::from_secs(100)).await;
        let paused = controller.snapshot().await.unwrap();
        assert_eq!(paused.elapsed_seconds, 10);
        assert_eq!(paused.state, SessionState::Paused);

        controller.dispatch(Command::Resume).await.unwrap();
        assert_eq!(controller.snapshot().await.unwrap().elapsed_seconds, 10);

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(controller.snapshot().await.unwrap().elapsed_seconds, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_reports_invalid_transition() {
        let (controller, _handle, mut alerts) = spawn();
        controller.dispatch(Command::Start).await.unwrap();
        assert_eq!(alerts.try_recv().unwrap(), Alert::StartReminder);

        let err = controller.dispatch(Command::Start).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert!(alerts.try_recv().is_err());
        assert_eq!(controller.snapshot().await.unwrap().log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reminder_fires_on_wall_clock_despite_pause() {
        let (controller, _handle, mut alerts) = spawn();
        controller.dispatch(Command::Start).await.unwrap();
        controller.dispatch(Command::Epinephrine).await.unwrap();
        controller.dispatch(Command::Pause).await.unwrap();
        let _ = alerts.try_recv();

        time::sleep(Duration::from_millis(179_500)).await;
        assert!(alerts.try_recv().is_err());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(alerts.try_recv().unwrap(), Alert::EpinephrineReminder);
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.pending_reminders, 0);
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_every_published_change() {
        let (controller, _handle, _alerts) = spawn();
        let mut rx = controller.subscribe();
        assert_eq!(rx.borrow().state, SessionState::Idle);

        controller.dispatch(Command::Start).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, SessionState::Running);

        time::sleep(Duration::from_millis(1_500)).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().elapsed_seconds, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_handle() {
        let (controller, handle, _alerts) = spawn();
        controller.shutdown();
        handle.await.unwrap();
        assert_eq!(
            controller.dispatch(Command::Shock).await.unwrap_err(),
            SessionError::Closed
        );
    }
}
