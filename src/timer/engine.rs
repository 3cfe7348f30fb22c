//! The three logical timers behind a session.
//!
//! Elapsed and RhythmCheck are [`CounterTimer`]s advanced by [`TimerEngine::tick`],
//! which the controller calls once per second while the session runs.
//! Epinephrine reminders are one-shot alarms keyed by wall-clock deadline;
//! they ignore pause state entirely. The engine never decides what a fire
//! means: it hands back [`TimerFired`] values and the session machine maps
//! them to log entries and alerts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::state::{CounterTimer, TimerHandle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AlarmId(u64);

impl std::fmt::Display for AlarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alarm#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    RhythmCheckExpired,
    OneShot { id: AlarmId, handle: TimerHandle },
}

#[derive(Debug, Clone)]
struct PendingAlarm {
    id: AlarmId,
    handle: TimerHandle,
    deadline: Instant,
}

#[derive(Debug)]
pub struct TimerEngine {
    elapsed: CounterTimer,
    rhythm: CounterTimer,
    alarms: Vec<PendingAlarm>,
    next_alarm: u64,
}

impl TimerEngine {
    pub fn new(rhythm_check_secs: u64) -> Self {
        Self {
            elapsed: CounterTimer::new(),
            rhythm: CounterTimer::with_threshold(rhythm_check_secs),
            alarms: Vec::new(),
            next_alarm: 0,
        }
    }

    fn counter_mut(&mut self, handle: TimerHandle) -> Option<&mut CounterTimer> {
        match handle {
            TimerHandle::Elapsed => Some(&mut self.elapsed),
            TimerHandle::RhythmCheck => Some(&mut self.rhythm),
            TimerHandle::EpinephrineReminder => None,
        }
    }

    pub fn counter(&self, handle: TimerHandle) -> Option<&CounterTimer> {
        match handle {
            TimerHandle::Elapsed => Some(&self.elapsed),
            TimerHandle::RhythmCheck => Some(&self.rhythm),
            TimerHandle::EpinephrineReminder => None,
        }
    }

    pub fn seconds(&self, handle: TimerHandle) -> u64 {
        self.counter(handle).map_or(0, |c| c.elapsed_seconds)
    }

    pub fn is_running(&self, handle: TimerHandle) -> bool {
        self.counter(handle).is_some_and(|c| c.running)
    }

    pub fn start(&mut self, handle: TimerHandle) {
        if let Some(counter) = self.counter_mut(handle) {
            counter.start();
        }
    }

    pub fn pause(&mut self, handle: TimerHandle) {
        if let Some(counter) = self.counter_mut(handle) {
            counter.pause();
        }
    }

    pub fn resume(&mut self, handle: TimerHandle) {
        if let Some(counter) = self.counter_mut(handle) {
            counter.resume();
        }
    }

    pub fn reset(&mut self, handle: TimerHandle) {
        if let Some(counter) = self.counter_mut(handle) {
            counter.reset();
        }
    }

    /// True while any counter wants a one-second tick.
    pub fn is_ticking(&self) -> bool {
        self.elapsed.running || self.rhythm.running
    }

    pub fn tick(&mut self) -> Vec<TimerFired> {
        let mut fired = Vec::new();
        self.elapsed.advance();
        if self.rhythm.advance() {
            fired.push(TimerFired::RhythmCheckExpired);
        }
        fired
    }

    pub fn schedule_one_shot(
        &mut self,
        handle: TimerHandle,
        delay: Duration,
        now: Instant,
    ) -> AlarmId {
        self.next_alarm += 1;
        let id = AlarmId(self.next_alarm);
        self.alarms.push(PendingAlarm {
            id,
            handle,
            deadline: now + delay,
        });
        id
    }

    /// Returns `false` when the alarm already fired or was never scheduled.
    pub fn cancel_one_shot(&mut self, id: AlarmId) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        self.alarms.len() != before
    }

    pub fn cancel_all(&mut self, handle: TimerHandle) -> usize {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.handle != handle);
        before - self.alarms.len()
    }

    pub fn pending(&self, handle: TimerHandle) -> usize {
        self.alarms.iter().filter(|a| a.handle == handle).count()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.alarms.iter().map(|alarm| alarm.deadline).min()
    }

    /// Removes and reports every alarm whose deadline is at or before `now`,
    /// earliest first; equal deadlines keep scheduling order.
    pub fn fire_due(&mut self, now: Instant) -> Vec<TimerFired> {
        let mut due: Vec<PendingAlarm> = Vec::new();
        self.alarms.retain(|alarm| {
            if alarm.deadline <= now {
                due.push(alarm.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|alarm| (alarm.deadline, alarm.id));
        due.into_iter()
            .map(|alarm| TimerFired::OneShot {
                id: alarm.id,
                handle: alarm.handle,
            })
            .collect()
    }
}
