//! Dialog log poller (spec §4.1.1): drives `MonitorState`/`LastSeenTime`
//! and hands accepted records to the Orchestrator.

use crate::state::{LastSeenTime, MonitorState, MONITOR_POLLING_MODE};
use conversant_speaker::dialog::DialogRecord;
use conversant_speaker::SpeakerClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const TRIGGER_PERIOD: Duration = Duration::from_millis(100);
const POLLING_PERIOD: Duration = Duration::from_millis(1000);
const IDLE_PERIOD: Duration = Duration::from_millis(200);
const WATCHDOG_PERIOD: Duration = Duration::from_secs(5);
const FETCH_LIMIT: u32 = 5;

pub struct DialogPoller {
    speaker: Arc<dyn SpeakerClient>,
    monitor: Arc<MonitorState>,
    last_seen: Arc<LastSeenTime>,
    initialized: AtomicBool,
}

impl DialogPoller {
    pub fn new(speaker: Arc<dyn SpeakerClient>, monitor: Arc<MonitorState>, last_seen: Arc<LastSeenTime>) -> Self {
        Self { speaker, monitor, last_seen, initialized: AtomicBool::new(false) }
    }

    /// Runs until `shutdown` is cancelled. Accepted records are pushed on
    /// `sink`; the watchdog guarantees `MonitorState` drains even if a
    /// poll never completes within 5s of it being bumped.
    pub async fn run(self: Arc<Self>, sink: mpsc::Sender<DialogRecord>, shutdown: tokio_util::sync::CancellationToken) {
        let watchdog = self.clone();
        let watchdog_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(WATCHDOG_PERIOD);
            loop {
                tokio::select! {
                    _ = watchdog_shutdown.cancelled() => return,
                    _ = ticker.tick() => watchdog.monitor.decrement_after_poll(),
                }
            }
        });

        loop {
            if shutdown.is_cancelled() {
                return;
            }
            let mode = self.monitor.get();
            if mode <= 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(IDLE_PERIOD) => continue,
                }
            }

            if let Err(e) = self.poll_once(&sink).await {
                tracing::warn!(error = %e, "dialog poll failed, retrying next tick");
            }
            self.monitor.decrement_after_poll();

            let period = if mode == MONITOR_POLLING_MODE { POLLING_PERIOD } else { TRIGGER_PERIOD };
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(period) => {}
            }
        }
    }

    async fn poll_once(&self, sink: &mpsc::Sender<DialogRecord>) -> Result<(), conversant_speaker::SpeakerError> {
        let mut records = self.speaker.get_latest_ask(FETCH_LIMIT).await?;
        records.sort_by(|a, b| b.time.cmp(&a.time));
        let Some(newest) = records.into_iter().next() else {
            return Ok(());
        };

        if !self.initialized.swap(true, Ordering::SeqCst) {
            self.last_seen.set(newest.time);
            return Ok(());
        }

        if self.last_seen.advance_if_newer(newest.time) {
            let _ = sink.send(newest).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conversant_speaker::{Device, SpeakerError, SpeakerStatus};

    struct ScriptedSpeaker {
        batches: parking_lot::Mutex<Vec<Vec<DialogRecord>>>,
    }

    fn record(time: i64, query: &str) -> DialogRecord {
        DialogRecord { query: query.into(), time, request_id: "r".into(), answers: vec![] }
    }

    #[async_trait]
    impl SpeakerClient for ScriptedSpeaker {
        async fn login(&self) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn device_list(&self) -> Result<Vec<Device>, SpeakerError> {
            Ok(vec![])
        }
        async fn text_to_speech(&self, _text: &str) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn play_url(&self, _url: &str) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn play_music_url(&self, _url: &str) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn pause_player(&self) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn stop_player(&self) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn set_volume(&self, _value: i32) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn get_status(&self) -> Result<SpeakerStatus, SpeakerError> {
            Ok(SpeakerStatus::default())
        }
        async fn wake_up(&self) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn miot_action(&self, _s: i32, _i: i32, _a: Vec<serde_json::Value>) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn miot_get_prop(&self, _s: i32, _i: i32) -> Result<serde_json::Value, SpeakerError> {
            Ok(serde_json::Value::Null)
        }
        async fn miot_set_prop(&self, _s: i32, _i: i32, _v: serde_json::Value) -> Result<(), SpeakerError> {
            Ok(())
        }
        async fn get_latest_ask(&self, _limit: u32) -> Result<Vec<DialogRecord>, SpeakerError> {
            let mut batches = self.batches.lock();
            if batches.is_empty() {
                return Ok(vec![]);
            }
            Ok(batches.remove(0))
        }
    }

    #[tokio::test]
    async fn first_record_only_initializes_last_seen() {
        let speaker = Arc::new(ScriptedSpeaker { batches: parking_lot::Mutex::new(vec![vec![record(100, "hi")]]) });
        let monitor = Arc::new(MonitorState::new_trigger_mode());
        monitor.increment(1);
        let last_seen = Arc::new(LastSeenTime::new());
        let poller = Arc::new(DialogPoller::new(speaker, monitor, last_seen.clone()));
        let (tx, mut rx) = mpsc::channel(4);
        poller.poll_once(&tx).await.unwrap();
        assert_eq!(last_seen.get(), 100);
        drop(tx);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn later_record_fires_and_advances() {
        let speaker = Arc::new(ScriptedSpeaker {
            batches: parking_lot::Mutex::new(vec![vec![record(100, "hi")], vec![record(200, "again")]]),
        });
        let monitor = Arc::new(MonitorState::new_trigger_mode());
        let last_seen = Arc::new(LastSeenTime::new());
        let poller = Arc::new(DialogPoller::new(speaker, monitor, last_seen.clone()));
        let (tx, mut rx) = mpsc::channel(4);
        poller.poll_once(&tx).await.unwrap();
        poller.poll_once(&tx).await.unwrap();
        assert_eq!(last_seen.get(), 200);
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.time, 200);
    }
}
