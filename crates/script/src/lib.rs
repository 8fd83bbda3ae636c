//! Embedded Script Host: sandboxed rhai engines, a `bot.*` API bridging
//! into the speaker and LLM clients owned by `conversant-core`, and a
//! persisted `storage` key/value map shared across every script run.

mod bot;
mod bot_api;
mod duration;
mod error;
mod host;
mod pool;
mod storage;

pub use bot_api::{AiBridge, BotApi};
pub use duration::estimate_tts_seconds;
pub use error::ScriptError;
pub use host::{ScriptHost, TaskRequest, TaskResponse};
pub use storage::Storage;
