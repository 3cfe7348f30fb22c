//! Operator-facing alerts raised by the core and its peers.
//!
//! The core never waits for an alert to be acknowledged. Sinks must not block.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Alert {
    /// Raised on Start.
    StartReminder,
    /// Raised when the rhythm-check countdown expires.
    RhythmCheck,
    EpinephrineReminder,
    /// A collaborator outside the core (e.g. the metronome) failed.
    PeerFailure { peer: String, message: String },
}

impl Alert {
    pub fn title(&self) -> &str {
        match self {
            Alert::StartReminder => "Reminder",
            Alert::RhythmCheck => "Rhythm Check",
            Alert::EpinephrineReminder => "Epinephrine Reminder",
            Alert::PeerFailure { .. } => "Device Problem",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Alert::StartReminder => "Chest compressions and epinephrine must be immediately started. \
                Enter CPR and Epinephrine when given."
                .to_string(),
            Alert::RhythmCheck => {
                "Rhythm checked. Don't forget to enter CPR to restart the timer.".to_string()
            }
            Alert::EpinephrineReminder => {
                "Administer epinephrine now! Don't forget to enter Epinephrine when given."
                    .to_string()
            }
            Alert::PeerFailure { peer, message } => format!("{peer} stopped: {message}"),
        }
    }
}

pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Forwards alerts into an unbounded channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn raise(&self, alert: Alert) {
        let _ = self.tx.send(alert);
    }
}

/// Writes alerts through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn raise(&self, alert: Alert) {
        match alert {
            Alert::PeerFailure { .. } => log::error!("{}: {}", alert.title(), alert.message()),
            _ => log::warn!("{}: {}", alert.title(), alert.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_in_order_and_survives_dropped_receiver() {
        let (sink, mut rx) = ChannelAlertSink::new();
        sink.raise(Alert::StartReminder);
        sink.raise(Alert::RhythmCheck);
        assert_eq!(rx.try_recv().unwrap(), Alert::StartReminder);
        assert_eq!(rx.try_recv().unwrap(), Alert::RhythmCheck);

        drop(rx);
        sink.raise(Alert::EpinephrineReminder);
    }

    #[test]
    fn peer_failure_message_names_the_peer() {
        let alert = Alert::PeerFailure {
            peer: "metronome".into(),
            message: "no output device".into(),
        };
        assert_eq!(alert.message(), "metronome stopped: no output device");
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "peerFailure");
    }

    #[test]
    fn log_sink_accepts_every_kind_without_a_logger() {
        let sink = LogAlertSink;
        sink.raise(Alert::StartReminder);
        sink.raise(Alert::PeerFailure {
            peer: "metronome".into(),
            message: "gone".into(),
        });
    }
}
