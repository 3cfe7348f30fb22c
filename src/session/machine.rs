//! The session state machine.
//!
//! Synchronous and single-owner: every command, tick and alarm expiry runs
//! to completion before the next one is looked at. The async
//! [`SessionController`](super::controller::SessionController) is what
//! serializes them; tests drive this type directly.

use std::{sync::Arc, time::Duration};

use log::{debug, info};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    alerts::Alert,
    clock::Clock,
    settings::Settings,
    timeline::{self, EventLog},
    timer::{TimerEngine, TimerFired, TimerHandle},
};

use super::{
    error::SessionError,
    state::{Command, SessionCounters, SessionSnapshot, SessionState, SessionSummary},
};

/// Side effects a step produced for the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub alerts: Vec<Alert>,
    pub summary: Option<SessionSummary>,
}

impl Outcome {
    fn alert(alert: Alert) -> Self {
        Self {
            alerts: vec![alert],
            summary: None,
        }
    }

    fn merge(&mut self, other: Outcome) {
        self.alerts.extend(other.alerts);
        if other.summary.is_some() {
            self.summary = other.summary;
        }
    }
}

#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    session_id: Option<String>,
    counters: SessionCounters,
    /// A compression cycle is under way: set by CPR, cleared by the rhythm
    /// check or End. Survives Pause so Resume can pick the countdown back up.
    cycle_active: bool,
    timers: TimerEngine,
    log: EventLog,
    epinephrine_delay: Duration,
}

impl SessionMachine {
    pub fn new(settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            counters: SessionCounters::default(),
            cycle_active: false,
            timers: TimerEngine::new(settings.rhythm_check_secs),
            log: EventLog::new(clock),
            epinephrine_delay: settings.epinephrine_reminder(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timers.seconds(TimerHandle::Elapsed)
    }

    pub fn rhythm_seconds(&self) -> u64 {
        self.timers.seconds(TimerHandle::RhythmCheck)
    }

    pub fn is_rhythm_running(&self) -> bool {
        self.timers.is_running(TimerHandle::RhythmCheck)
    }

    /// True while the one-second tick source should be armed.
    pub fn is_ticking(&self) -> bool {
        self.timers.is_ticking()
    }

    pub fn next_alarm_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            elapsed_seconds: self.elapsed_seconds(),
            rhythm_seconds: self.rhythm_seconds(),
            rhythm_active: self.cycle_active,
            counters: self.counters,
            pending_reminders: self.timers.pending(TimerHandle::EpinephrineReminder),
            log: self.log.entries().to_vec(),
        }
    }

    pub fn apply(&mut self, command: Command, now: Instant) -> Result<Outcome, SessionError> {
        if !command.allowed_in(self.state) {
            debug!("rejected {} while {}", command, self.state);
            return Err(SessionError::InvalidTransition {
                command,
                state: self.state,
            });
        }

        let outcome = match command {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::End => self.end(),
            Command::Cpr => self.compressions(),
            Command::Epinephrine => self.epinephrine(now),
            Command::Shock => self.shock(),
            Command::ClearLog => {
                self.log.clear();
                Outcome::default()
            }
            Command::CancelReminders => self.cancel_reminders(),
        };
        Ok(outcome)
    }

    /// One second of session time. Ignored unless Running.
    pub fn tick(&mut self) -> Outcome {
        let mut outcome = Outcome::default();
        if self.state != SessionState::Running {
            return outcome;
        }
        for fired in self.timers.tick() {
            outcome.merge(self.on_fired(fired));
        }
        outcome
    }

    /// Fires every one-shot alarm due at `now`, whatever the session state.
    pub fn fire_due(&mut self, now: Instant) -> Outcome {
        let mut outcome = Outcome::default();
        for fired in self.timers.fire_due(now) {
            outcome.merge(self.on_fired(fired));
        }
        outcome
    }

    fn on_fired(&mut self, fired: TimerFired) -> Outcome {
        match fired {
            TimerFired::RhythmCheckExpired => {
                self.timers.pause(TimerHandle::RhythmCheck);
                self.timers.reset(TimerHandle::RhythmCheck);
                self.cycle_active = false;
                self.log.append(timeline::RHYTHM_CHECKED);
                info!("rhythm check due (session {:?})", self.session_id);
                Outcome::alert(Alert::RhythmCheck)
            }
            TimerFired::OneShot {
                id,
                handle: TimerHandle::EpinephrineReminder,
            } => {
                self.log.append(timeline::EPINEPHRINE_REMINDER);
                info!("epinephrine reminder {} fired", id);
                Outcome::alert(Alert::EpinephrineReminder)
            }
            TimerFired::OneShot { id, handle } => {
                debug!("ignoring {} for {}", id, handle.as_str());
                Outcome::default()
            }
        }
    }

    fn start(&mut self) -> Outcome {
        let session_id = Uuid::new_v4().to_string();
        info!("code session {} started", session_id);

        self.timers.reset(TimerHandle::Elapsed);
        self.timers.start(TimerHandle::Elapsed);
        if self.cycle_active {
            self.timers.start(TimerHandle::RhythmCheck);
        }
        self.counters = SessionCounters::default();
        self.session_id = Some(session_id);
        self.state = SessionState::Running;
        self.log.append(timeline::CODE_STARTED);
        Outcome::alert(Alert::StartReminder)
    }

    fn pause(&mut self) -> Outcome {
        self.timers.pause(TimerHandle::Elapsed);
        self.timers.pause(TimerHandle::RhythmCheck);
        self.state = SessionState::Paused;
        self.log.append(timeline::CODE_PAUSED);
        info!(
            "code session {:?} paused at {}s",
            self.session_id,
            self.elapsed_seconds()
        );
        Outcome::default()
    }

    fn resume(&mut self) -> Outcome {
        self.timers.resume(TimerHandle::Elapsed);
        if self.cycle_active {
            self.timers.resume(TimerHandle::RhythmCheck);
        }
        self.state = SessionState::Running;
        info!(
            "code session {:?} resumed at {}s",
            self.session_id,
            self.elapsed_seconds()
        );
        Outcome::default()
    }

    fn end(&mut self) -> Outcome {
        self.timers.pause(TimerHandle::Elapsed);
        self.timers.pause(TimerHandle::RhythmCheck);

        let summary = SessionSummary::from_counters(self.counters, self.elapsed_seconds());
        self.log.append(timeline::CODE_ENDED);
        info!(
            "code session {:?} ended: {} cycles, {} epinephrine, {} shocks over {}s",
            self.session_id,
            summary.cycles,
            summary.epinephrine_doses,
            summary.shocks,
            summary.elapsed_seconds
        );

        self.timers.reset(TimerHandle::Elapsed);
        self.timers.reset(TimerHandle::RhythmCheck);
        self.counters = SessionCounters::default();
        self.cycle_active = false;
        self.session_id = None;
        self.state = SessionState::Idle;

        Outcome {
            alerts: Vec::new(),
            summary: Some(summary),
        }
    }

    fn compressions(&mut self) -> Outcome {
        self.timers.reset(TimerHandle::RhythmCheck);
        self.cycle_active = true;
        if self.state == SessionState::Running {
            self.timers.start(TimerHandle::RhythmCheck);
        }
        if self.state != SessionState::Idle {
            self.counters.cycles += 1;
        }
        self.log.append(timeline::COMPRESSIONS_STARTED);
        Outcome::default()
    }

    fn epinephrine(&mut self, now: Instant) -> Outcome {
        if self.state != SessionState::Idle {
            self.counters.epinephrine_doses += 1;
        }
        self.log.append(timeline::EPINEPHRINE_GIVEN);
        let id = self.timers.schedule_one_shot(
            TimerHandle::EpinephrineReminder,
            self.epinephrine_delay,
            now,
        );
        debug!(
            "epinephrine reminder {} armed for {}s",
            id,
            self.epinephrine_delay.as_secs()
        );
        Outcome::default()
    }

    fn shock(&mut self) -> Outcome {
        if self.state != SessionState::Idle {
            self.counters.shocks += 1;
        }
        self.log.append(timeline::SHOCK_DELIVERED);
        Outcome::default()
    }

    fn cancel_reminders(&mut self) -> Outcome {
        let cancelled = self.timers.cancel_all(TimerHandle::EpinephrineReminder);
        if cancelled > 0 {
            self.log.append(timeline::EPINEPHRINE_REMINDERS_CANCELLED);
            info!("cancelled {} pending epinephrine reminder(s)", cancelled);
        }
        Outcome::default()
    }
}
