use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TimerHandle {
    Elapsed,
    RhythmCheck,
    EpinephrineReminder,
}

impl TimerHandle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerHandle::Elapsed => "elapsed",
            TimerHandle::RhythmCheck => "rhythm-check",
            TimerHandle::EpinephrineReminder => "epinephrine-reminder",
        }
    }
}

/// A whole-second counter advanced by the engine's tick.
///
/// With a threshold the counter is a countdown in disguise: the tick that
/// reaches it reports the crossing once and parks the counter at the
/// threshold. It stays parked until `reset`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CounterTimer {
    pub elapsed_seconds: u64,
    pub running: bool,
    pub threshold: Option<u64>,
    #[serde(skip)]
    expired: bool,
}

impl CounterTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            threshold: Some(threshold),
            ..Self::default()
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Idempotent. Continues from the current value.
    pub fn start(&mut self) {
        if !self.expired {
            self.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Zeroes the counter and re-arms the threshold; running state is kept.
    pub fn reset(&mut self) {
        self.elapsed_seconds = 0;
        self.expired = false;
    }

    /// One second of running time. Returns `true` on the tick that reaches
    /// the threshold.
    pub fn advance(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        match self.threshold {
            Some(limit) if self.elapsed_seconds >= limit => {
                self.elapsed_seconds = limit;
                self.running = false;
                self.expired = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_idempotent_and_pause_keeps_value() {
        let mut timer = CounterTimer::new();
        timer.start();
        timer.advance();
        timer.start();
        timer.advance();
        assert_eq!(timer.elapsed_seconds, 2);

        timer.pause();
        assert!(!timer.advance());
        assert_eq!(timer.elapsed_seconds, 2);

        timer.resume();
        timer.advance();
        assert_eq!(timer.elapsed_seconds, 3);
    }

    #[test]
    fn reset_zeroes_without_changing_running() {
        let mut timer = CounterTimer::new();
        timer.start();
        timer.advance();
        timer.reset();
        assert_eq!(timer.elapsed_seconds, 0);
        assert!(timer.running);

        timer.pause();
        timer.reset();
        assert!(!timer.running);
    }

    #[test]
    fn threshold_fires_once_and_parks() {
        let mut timer = CounterTimer::with_threshold(3);
        timer.start();
        assert!(!timer.advance());
        assert!(!timer.advance());
        assert!(timer.advance());
        assert_eq!(timer.elapsed_seconds, 3);
        assert!(!timer.running);
        assert!(timer.is_expired());

        // Parked until reset.
        timer.start();
        assert!(!timer.advance());
        assert_eq!(timer.elapsed_seconds, 3);

        timer.reset();
        timer.start();
        assert!(!timer.advance());
        assert_eq!(timer.elapsed_seconds, 1);
    }
}
