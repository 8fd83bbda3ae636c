//! The Conversation Orchestrator, Speaker Mute Loop, and Streaming TTS
//! Segmenter: the hub wiring `conversant-speaker`, `conversant-llm`, and
//! `conversant-script` together.

pub mod bot_api_impl;
pub mod mute;
pub mod orchestrator;
pub mod poller;
pub mod query_interceptor;
pub mod segmenter;
pub mod state;

pub use bot_api_impl::{CoreAiBridge, CoreBotApi};
pub use mute::MuteLoop;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use poller::DialogPoller;
pub use query_interceptor::{QueryInterceptor, ScriptQueryInterceptor};
pub use segmenter::{segmenter, SegmenterReader, SegmenterWriter};
pub use state::{
    new_cancellation, ChatMode, ConversationState, LastSeenTime, Message, MonitorState, MuteState, Role, TurnCounter,
    MONITOR_POLLING_MODE, MUTE_ACTIVE, MUTE_MUTED, MUTE_THINKING_PLAYED,
};
