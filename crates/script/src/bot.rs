//! The `bot` object injected into every script: a thin, cloneable handle
//! that bridges rhai's synchronous call convention onto the async
//! `BotApi`/`AiBridge` trait objects by driving them on the current Tokio
//! runtime from the blocking thread the script itself runs on.

use rhai::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::bot_api::{AiBridge, BotApi};
use crate::duration::estimate_tts_seconds;

#[derive(Clone)]
pub struct BotHandle {
    pub(crate) bot: Arc<dyn BotApi>,
    pub(crate) ai: Arc<dyn AiBridge>,
    pub(crate) handle: Handle,
}

impl BotHandle {
    fn tts(&mut self, text: String, wait: bool) -> bool {
        self.handle.block_on(self.bot.tts(text, wait)).is_ok()
    }

    fn ask_ai(&mut self, query: String) -> String {
        self.handle.block_on(self.ai.ask(query)).unwrap_or_default()
    }

    fn action(&mut self, name: String, args: rhai::Array) -> String {
        let args = args.into_iter().map(|d| d.to_string()).collect();
        self.handle.block_on(self.bot.action(name, args)).unwrap_or_default()
    }

    fn play_url(&mut self, url: String) -> bool {
        self.handle.block_on(self.bot.play_url(url)).is_ok()
    }

    fn wake_up(&mut self) -> bool {
        self.handle.block_on(self.bot.wake_up()).is_ok()
    }

    fn stop_speaker(&mut self) -> bool {
        self.handle.block_on(self.bot.stop_speaker()).is_ok()
    }

    fn wait(&mut self, seconds: f64) {
        self.handle.block_on(self.bot.wait(seconds));
    }

    fn monitor(&mut self, step: i64) {
        self.handle.block_on(self.bot.monitor(step));
    }

    /// Estimated seconds a speaker would take to read `text` aloud,
    /// without actually speaking it. Used by scripts to pace their own
    /// `bot.wait()` calls around a `bot.tts(text, false)`.
    fn elapsed(&mut self, text: String) -> f64 {
        estimate_tts_seconds(&text)
    }

    /// Plain thread sleep, for scripts that want a fixed pause unrelated
    /// to speech timing. Safe to call from the blocking thread a script
    /// runs on; does not block the async reactor.
    fn sleep(&mut self, seconds: f64) {
        std::thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
    }
}

pub fn register_bot_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<BotHandle>("Bot")
        .register_fn("tts", BotHandle::tts)
        .register_fn("askAI", BotHandle::ask_ai)
        .register_fn("action", BotHandle::action)
        .register_fn("playurl", BotHandle::play_url)
        .register_fn("wakeup", BotHandle::wake_up)
        .register_fn("stopspeaker", BotHandle::stop_speaker)
        .register_fn("wait", BotHandle::wait)
        .register_fn("monitor", BotHandle::monitor)
        .register_fn("elapsed", BotHandle::elapsed)
        .register_fn("sleep", BotHandle::sleep);
}
