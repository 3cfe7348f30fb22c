use serde::{Deserialize, Serialize};

use crate::timeline::EventLogEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Start,
    Pause,
    Resume,
    End,
    Cpr,
    Epinephrine,
    Shock,
    ClearLog,
    CancelReminders,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "Start",
            Command::Pause => "Pause",
            Command::Resume => "Resume",
            Command::End => "End",
            Command::Cpr => "CPR",
            Command::Epinephrine => "Epinephrine",
            Command::Shock => "Shock",
            Command::ClearLog => "Clear",
            Command::CancelReminders => "CancelReminders",
        }
    }

    /// Whether `state` accepts this command. Only the session-lifecycle
    /// commands are gated.
    pub fn allowed_in(&self, state: SessionState) -> bool {
        match self {
            Command::Start => state == SessionState::Idle,
            Command::Pause => state == SessionState::Running,
            Command::Resume => state == SessionState::Paused,
            Command::End => matches!(state, SessionState::Running | SessionState::Paused),
            Command::Cpr
            | Command::Epinephrine
            | Command::Shock
            | Command::ClearLog
            | Command::CancelReminders => true,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub cycles: u32,
    pub epinephrine_doses: u32,
    pub shocks: u32,
}

impl SessionCounters {
    pub fn total(&self) -> u64 {
        u64::from(self.cycles) + u64::from(self.epinephrine_doses) + u64::from(self.shocks)
    }
}

/// Counters as they stood when End was issued.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub cycles: u32,
    pub epinephrine_doses: u32,
    pub shocks: u32,
    pub elapsed_seconds: u64,
}

impl SessionSummary {
    pub fn from_counters(counters: SessionCounters, elapsed_seconds: u64) -> Self {
        Self {
            cycles: counters.cycles,
            epinephrine_doses: counters.epinephrine_doses,
            shocks: counters.shocks,
            elapsed_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub state: SessionState,
    pub elapsed_seconds: u64,
    pub rhythm_seconds: u64,
    pub rhythm_active: bool,
    pub counters: SessionCounters,
    pub pending_reminders: usize,
    pub log: Vec<EventLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_commands_are_gated() {
        use SessionState::*;
        assert!(Command::Start.allowed_in(Idle));
        assert!(!Command::Start.allowed_in(Running));
        assert!(!Command::Start.allowed_in(Paused));
        assert!(Command::Pause.allowed_in(Running));
        assert!(!Command::Pause.allowed_in(Paused));
        assert!(Command::Resume.allowed_in(Paused));
        assert!(!Command::Resume.allowed_in(Running));
        assert!(!Command::End.allowed_in(Idle));
        assert!(Command::End.allowed_in(Paused));

        for state in [Idle, Running, Paused] {
            assert!(Command::Cpr.allowed_in(state));
            assert!(Command::Epinephrine.allowed_in(state));
            assert!(Command::Shock.allowed_in(state));
            assert!(Command::ClearLog.allowed_in(state));
        }
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = SessionSummary::from_counters(
            SessionCounters {
                cycles: 2,
                epinephrine_doses: 1,
                shocks: 3,
            },
            95,
        );
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["epinephrineDoses"], 1);
        assert_eq!(json["elapsedSeconds"], 95);
    }
}
