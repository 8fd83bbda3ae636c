//! `Message`, `ConversationState`, `MuteState`, `MonitorState` (spec §3).
//! `ConversationState` is replaced wholesale on each new turn rather than
//! mutated in place, per the data model's lifecycle note.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn to_chat_message(&self) -> conversant_llm::ChatMessage {
        match self.role {
            Role::User => conversant_llm::ChatMessage::user(self.content.clone()),
            Role::Assistant => conversant_llm::ChatMessage::assistant(self.content.clone()),
            Role::System => conversant_llm::ChatMessage::system(self.content.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Normal,
    ChatNoTts,
    ChatTts,
}

/// Per-turn conversational state. A new turn constructs a fresh value
/// (carrying forward `history`/`in_conversation` from the prior one when
/// continuous mode is active) rather than mutating the old one in place.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub in_conversation: bool,
    pub history: Vec<Message>,
    pub system_prompt: String,
    pub last_seen_time: i64,
    pub last_tts_duration_ms: i64,
    pub chat_mode: ChatMode,
}

impl ConversationState {
    pub fn new(default_prompt: impl Into<String>) -> Self {
        Self {
            in_conversation: false,
            history: Vec::new(),
            system_prompt: default_prompt.into(),
            last_seen_time: 0,
            last_tts_duration_ms: 0,
            chat_mode: ChatMode::Normal,
        }
    }
}

/// `{Active=0, Muted=1, ThinkingPlayed=-1, ThinkingPlaying=n<-1}` (spec
/// §3). A raw `i64` rather than an enum: `ThinkingPlaying` carries a
/// countdown in its own value, matching the spec's domain exactly and
/// avoiding a lossy enum<->int round trip at the mutex boundary.
pub struct MuteState {
    value: parking_lot::Mutex<i64>,
}

pub const MUTE_ACTIVE: i64 = 0;
pub const MUTE_MUTED: i64 = 1;
pub const MUTE_THINKING_PLAYED: i64 = -1;

impl MuteState {
    pub fn new() -> Self {
        Self { value: parking_lot::Mutex::new(MUTE_ACTIVE) }
    }

    pub fn get(&self) -> i64 {
        *self.value.lock()
    }

    pub fn set(&self, v: i64) {
        *self.value.lock() = v;
    }

    pub fn is_active(&self) -> bool {
        self.get() == MUTE_ACTIVE
    }

    pub fn is_muted_or_thinking(&self) -> bool {
        self.get() != MUTE_ACTIVE
    }

    /// `ThinkingPlaying = n < -1`; ticks toward `ThinkingPlayed = -1`.
    pub fn is_thinking_playing(&self) -> bool {
        self.get() < MUTE_THINKING_PLAYED
    }

    /// Compare-and-swap from `Active` to `Muted`; returns whether this
    /// call was the one that performed the transition (spec §8 "starting
    /// Mute Loop twice leaves exactly one loop goroutine").
    pub fn try_start(&self) -> bool {
        let mut guard = self.value.lock();
        if *guard == MUTE_ACTIVE {
            *guard = MUTE_MUTED;
            true
        } else {
            false
        }
    }
}

impl Default for MuteState {
    fn default() -> Self {
        Self::new()
    }
}

/// `0`=idle, `>0`=pending triggers awaiting poll, `0xFFFF`=polling mode.
pub struct MonitorState(AtomicI64);

pub const MONITOR_POLLING_MODE: i64 = 0xFFFF;

impl MonitorState {
    pub fn new_polling_mode() -> Self {
        Self(AtomicI64::new(MONITOR_POLLING_MODE))
    }

    pub fn new_trigger_mode() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.get() > 0
    }

    pub fn increment(&self, step: i64) {
        self.0.fetch_add(step.max(1), Ordering::SeqCst);
    }

    /// Decrements by one after a poll completes, unless we're in the
    /// fixed polling-mode sentinel which never drains.
    pub fn decrement_after_poll(&self) {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                if v == MONITOR_POLLING_MODE || v <= 0 {
                    Some(v)
                } else {
                    Some(v - 1)
                }
            })
            .ok();
    }
}

/// Monotonic last-seen-time guard for the dialog poller (spec invariant
/// "a DialogRecord with time <= lastSeenTime is never re-processed").
pub struct LastSeenTime(AtomicI64);

impl LastSeenTime {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, v: i64) {
        self.0.store(v, Ordering::SeqCst);
    }

    /// Advances to `v` iff `v` is newer; returns whether it advanced.
    pub fn advance_if_newer(&self, v: i64) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| if v > cur { Some(v) } else { None })
            .is_ok()
    }
}

impl Default for LastSeenTime {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-turn execution counter, exposed for tests asserting a turn
/// terminates through exactly one path (spec §8).
#[derive(Default)]
pub struct TurnCounter(AtomicU32);

impl TurnCounter {
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// A turn's cancellation handle: closing it signals every `select!` the
/// turn's tasks are waiting on (spec §4.1 "Cancellation").
pub fn new_cancellation() -> (mpsc::Sender<()>, tokio_util::sync::CancellationToken) {
    let token = tokio_util::sync::CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let child = token.clone();
    tokio::spawn(async move {
        let _ = rx.recv().await;
        child.cancel();
    });
    (tx, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_state_try_start_is_idempotent() {
        let mute = MuteState::new();
        assert!(mute.try_start());
        assert!(!mute.try_start());
        assert_eq!(mute.get(), MUTE_MUTED);
    }

    #[test]
    fn active_speaker_voice_zero_while_already_active_is_a_no_op() {
        let mute = MuteState::new();
        assert!(mute.is_active());
        mute.set(MUTE_ACTIVE);
        assert!(mute.is_active());
    }

    #[test]
    fn last_seen_time_only_advances_forward() {
        let t = LastSeenTime::new();
        assert!(t.advance_if_newer(100));
        assert!(!t.advance_if_newer(50));
        assert_eq!(t.get(), 100);
    }

    #[test]
    fn monitor_state_polling_mode_sentinel_never_drains() {
        let m = MonitorState::new_polling_mode();
        m.decrement_after_poll();
        assert_eq!(m.get(), MONITOR_POLLING_MODE);
    }

    #[test]
    fn monitor_state_trigger_mode_decrements_after_poll() {
        let m = MonitorState::new_trigger_mode();
        m.increment(2);
        m.decrement_after_poll();
        assert_eq!(m.get(), 1);
    }
}
