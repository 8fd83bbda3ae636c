//! Trait seams the script host calls through without depending on either
//! `conversant-llm` or `conversant-speaker` directly. `conversant-core`
//! implements both against the real clients, which keeps this crate a
//! leaf and avoids a script <-> llm <-> script cycle (the LLM Adapter
//! Layer has its own, narrower rhai use inside `conversant-llm`).

use async_trait::async_trait;

/// Routes a script's `bot.askAI(query)` call into the configured LLM
/// backend and returns its reply as plain text.
#[async_trait]
pub trait AiBridge: Send + Sync {
    async fn ask(&self, query: String) -> Result<String, String>;
}

/// The speaker-facing half of `bot.*`: everything that ultimately talks to
/// the Speaker Client or to the orchestrator's mute/monitor state.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Speak `text`. If `wait` is true, block the script until playback
    /// is expected to finish (per the TTS-duration estimate).
    async fn tts(&self, text: String, wait: bool) -> Result<(), String>;

    /// Run a named miot action with string arguments.
    async fn action(&self, name: String, args: Vec<String>) -> Result<String, String>;

    /// Play a URL through the speaker (music or arbitrary audio).
    async fn play_url(&self, url: String) -> Result<(), String>;

    /// Wake the speaker as if the wake word had just been spoken.
    async fn wake_up(&self) -> Result<(), String>;

    /// Force-stop whatever the speaker is currently playing.
    async fn stop_speaker(&self) -> Result<(), String>;

    /// Park the calling task for `seconds`, cooperating with cancellation.
    async fn wait(&self, seconds: f64);

    /// Advance the Mute Loop's monitor/thinking state by one step.
    async fn monitor(&self, step: i64);
}
