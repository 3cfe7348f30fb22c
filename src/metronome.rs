//! Compression-rate metronome.
//!
//! Lives beside the session core, not inside it: toggling it never touches
//! session state, and a failing click output is reported as an alert and
//! stops only the metronome.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::alerts::{Alert, AlertSink};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Produces one audible beat.
pub trait Click: Send + Sync {
    fn click(&self) -> Result<()>;
}

pub struct Metronome {
    interval: Duration,
    click: Arc<dyn Click>,
    alerts: Arc<dyn AlertSink>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    running: Arc<AtomicBool>,
}

impl Metronome {
    pub fn new(interval: Duration, click: Arc<dyn Click>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            interval,
            click,
            alerts,
            handle: None,
            cancel_token: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// False once stopped, including when the beat loop gave up on its own.
    pub fn is_on(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&mut self) -> Result<()> {
        if self.is_on() {
            bail!("metronome already running");
        }
        // A loop that stopped itself leaves a finished handle behind.
        self.handle = None;
        self.cancel_token = None;

        let cancel_token = CancellationToken::new();
        self.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(beat_loop(
            self.interval,
            self.click.clone(),
            self.alerts.clone(),
            cancel_token.clone(),
            self.running.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("metronome on ({}ms)", self.interval.as_millis());
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("metronome task failed to join")?;
            log_info!("metronome off");
        }
        Ok(())
    }

    /// Returns whether the metronome is on afterwards.
    pub async fn toggle(&mut self) -> Result<bool> {
        if self.is_on() {
            self.stop().await?;
        } else {
            self.start()?;
        }
        Ok(self.is_on())
    }
}

async fn beat_loop(
    period: Duration,
    click: Arc<dyn Click>,
    alerts: Arc<dyn AlertSink>,
    cancel_token: CancellationToken,
    running: Arc<AtomicBool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = click.click() {
                    log_error!("metronome click failed: {err:#}");
                    alerts.raise(Alert::PeerFailure {
                        peer: "metronome".into(),
                        message: format!("{err:#}"),
                    });
                    break;
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ChannelAlertSink;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingClick {
        beats: AtomicUsize,
        fail_after: Option<usize>,
    }

    impl Click for CountingClick {
        fn click(&self) -> Result<()> {
            let n = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_after {
                Some(limit) if n > limit => Err(anyhow!("output device unplugged")),
                _ => Ok(()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn beats_at_interval_until_toggled_off() {
        let click = Arc::new(CountingClick::default());
        let (sink, mut alerts) = ChannelAlertSink::new();
        let mut metronome = Metronome::new(Duration::from_millis(500), click.clone(), Arc::new(sink));

        assert!(metronome.toggle().await.unwrap());
        time::sleep(Duration::from_millis(1_250)).await;
        assert!(!metronome.toggle().await.unwrap());

        // Beats at 0, 500 and 1000 ms.
        assert_eq!(click.beats.load(Ordering::SeqCst), 3);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(click.beats.load(Ordering::SeqCst), 3);
        assert!(alerts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn click_failure_stops_metronome_and_raises_alert() {
        let click = Arc::new(CountingClick {
            fail_after: Some(2),
            ..CountingClick::default()
        });
        let (sink, mut alerts) = ChannelAlertSink::new();
        let mut metronome = Metronome::new(Duration::from_millis(500), click, Arc::new(sink));

        metronome.start().unwrap();
        time::sleep(Duration::from_secs(3)).await;

        assert!(!metronome.is_on());
        match alerts.try_recv().unwrap() {
            Alert::PeerFailure { peer, message } => {
                assert_eq!(peer, "metronome");
                assert!(message.contains("unplugged"));
            }
            other => panic!("unexpected alert {other:?}"),
        }

        // Can be switched back on after a failure.
        metronome.start().unwrap();
        assert!(metronome.is_on());
        metronome.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_is_rejected() {
        let mut metronome = Metronome::new(
            Duration::from_millis(500),
            Arc::new(CountingClick::default()),
            Arc::new(ChannelAlertSink::new().0),
        );
        metronome.start().unwrap();
        assert!(metronome.start().is_err());
        metronome.stop().await.unwrap();
        assert!(!metronome.is_on());
    }
}
