use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub rhythm_check_secs: u64,
    pub epinephrine_reminder_secs: u64,
    pub tick_interval_ms: u64,
    pub metronome_interval_ms: u64,
    /// How many ticks between console status lines.
    pub heartbeat_every_ticks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rhythm_check_secs: 120,
            epinephrine_reminder_secs: 180,
            tick_interval_ms: 1_000,
            metronome_interval_ms: 500,
            heartbeat_every_ticks: 10,
        }
    }
}

impl Settings {
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// `CODE_TIMER_SETTINGS` names the settings file; `CODE_TIMER_DEBUG`
    /// forces a heartbeat on every tick.
    pub fn from_env() -> Result<Self> {
        let mut settings = match std::env::var_os("CODE_TIMER_SETTINGS") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Settings::default(),
        };

        let debug_mode = std::env::var("CODE_TIMER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            settings.heartbeat_every_ticks = 1;
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rhythm_check_secs == 0 {
            bail!("rhythmCheckSecs must be greater than zero");
        }
        if self.epinephrine_reminder_secs == 0 {
            bail!("epinephrineReminderSecs must be greater than zero");
        }
        if self.tick_interval_ms == 0 {
            bail!("tickIntervalMs must be greater than zero");
        }
        if self.metronome_interval_ms == 0 {
            bail!("metronomeIntervalMs must be greater than zero");
        }
        if self.heartbeat_every_ticks == 0 {
            bail!("heartbeatEveryTicks must be greater than zero");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn epinephrine_reminder(&self) -> Duration {
        Duration::from_secs(self.epinephrine_reminder_secs)
    }

    pub fn metronome_interval(&self) -> Duration {
        Duration::from_millis(self.metronome_interval_ms)
    }
}
