//! Speaker Mute Loop (spec §4.2): a cooperative interrupter that
//! repeatedly pauses the speaker until the Orchestrator releases the
//! floor, including the "thinking filler" countdown that delays release
//! until the filler utterance has finished.

use crate::state::{MuteState, MUTE_ACTIVE, MUTE_THINKING_PLAYED};
use conversant_speaker::SpeakerClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

const PAUSE_INTERVAL: Duration = Duration::from_millis(250);

pub struct MuteLoop {
    state: Arc<MuteState>,
    speaker: Arc<dyn SpeakerClient>,
}

impl MuteLoop {
    pub fn new(state: Arc<MuteState>, speaker: Arc<dyn SpeakerClient>) -> Self {
        Self { state, speaker }
    }

    pub fn state(&self) -> Arc<MuteState> {
        self.state.clone()
    }

    /// No-op if already `Muted` (or thinking). First call pauses
    /// immediately, then spawns the 250ms pause loop (spec "Start
    /// rules").
    pub fn start(&self, cancel: CancellationToken) {
        if !self.state.try_start() {
            return;
        }
        let speaker = self.speaker.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let _ = speaker.pause_player().await;
            let mut ticker = interval(PAUSE_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if state.get() == MUTE_ACTIVE {
                            return;
                        }
                        let _ = speaker.pause_player().await;
                    }
                }
            }
        });
    }

    /// Schedules the thinking-filler countdown: `ThinkingPlaying(n < -1)`
    /// ticking once per second toward `ThinkingPlayed(-1)` (spec §4.1
    /// "Thinking filler").
    pub fn begin_thinking(&self, estimated_seconds: f64) {
        let ticks = estimated_seconds.ceil().max(1.0) as i64;
        self.state.set(-(1 + ticks));
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let current = state.get();
                if current >= MUTE_THINKING_PLAYED {
                    return;
                }
                state.set(current + 1);
            }
        });
    }

    /// `activeSpeakerVoice(0)`: releases the floor. From `Muted`, this is
    /// immediate. From `ThinkingPlaying`, busy-waits (bounded by the
    /// remaining thinking seconds or cancellation) until `ThinkingPlayed`,
    /// then clears to `Active`. A no-op while already `Active` (spec §8).
    pub async fn release(&self, cancel: &CancellationToken) {
        loop {
            let current = self.state.get();
            if current == MUTE_ACTIVE {
                return;
            }
            if current == MUTE_THINKING_PLAYED || current == crate::state::MUTE_MUTED {
                self.state.set(MUTE_ACTIVE);
                return;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state.set(MUTE_ACTIVE);
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversant_speaker::{Device, SpeakerError, SpeakerStatus};
    use conversant_speaker::dialog::DialogRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSpeaker {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl SpeakerClient for FakeSpeaker {
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
            self.pauses.fetch_add(1, Ordering::SeqCst);
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
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn starting_twice_leaves_exactly_one_loop() {
        let speaker = Arc::new(FakeSpeaker { pauses: AtomicUsize::new(0) });
        let mute_loop = MuteLoop::new(Arc::new(MuteState::new()), speaker);
        let cancel = CancellationToken::new();
        mute_loop.start(cancel.clone());
        mute_loop.start(cancel.clone());
        assert_eq!(mute_loop.state.get(), crate::state::MUTE_MUTED);
        cancel.cancel();
    }

    #[tokio::test]
    async fn release_while_active_is_a_no_op() {
        let speaker = Arc::new(FakeSpeaker { pauses: AtomicUsize::new(0) });
        let mute_loop = MuteLoop::new(Arc::new(MuteState::new()), speaker);
        let cancel = CancellationToken::new();
        mute_loop.release(&cancel).await;
        assert_eq!(mute_loop.state.get(), MUTE_ACTIVE);
    }

    #[tokio::test]
    async fn release_waits_for_thinking_to_finish() {
        let speaker = Arc::new(FakeSpeaker { pauses: AtomicUsize::new(0) });
        let state = Arc::new(MuteState::new());
        state.try_start();
        let mute_loop = MuteLoop::new(state.clone(), speaker);
        mute_loop.begin_thinking(1.0);
        assert!(mute_loop.state.is_thinking_playing());
        let cancel = CancellationToken::new();
        mute_loop.release(&cancel).await;
        assert_eq!(mute_loop.state.get(), MUTE_ACTIVE);
    }
}
