//! Concrete `BotApi`/`AiBridge` wiring the script host's `bot.*` surface
//! into the real `SpeakerClient`/`LlmClient`, kept in `conversant-core`
//! so `conversant-script` stays a leaf crate (see module docs on
//! `conversant_script::bot_api`).

use crate::mute::MuteLoop;
use crate::state::MonitorState;
use async_trait::async_trait;
use conversant_llm::{ChatMessage, LlmClient};
use conversant_script::{AiBridge, BotApi};
use conversant_speaker::SpeakerClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct CoreBotApi {
    speaker: Arc<dyn SpeakerClient>,
    mute: Arc<MuteLoop>,
    monitor: Arc<MonitorState>,
    cancel: CancellationToken,
}

impl CoreBotApi {
    pub fn new(speaker: Arc<dyn SpeakerClient>, mute: Arc<MuteLoop>, monitor: Arc<MonitorState>, cancel: CancellationToken) -> Self {
        Self { speaker, mute, monitor, cancel }
    }
}

#[async_trait]
impl BotApi for CoreBotApi {
    async fn tts(&self, text: String, wait: bool) -> Result<(), String> {
        self.speaker.text_to_speech(&text).await.map_err(|e| e.to_string())?;
        if wait {
            let seconds = conversant_script::estimate_tts_seconds(&text);
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {}
            }
        }
        Ok(())
    }

    async fn action(&self, name: String, args: Vec<String>) -> Result<String, String> {
        let (siid, iid) = parse_action_name(&name)?;
        let values = args.into_iter().map(serde_json::Value::String).collect();
        self.speaker.miot_action(siid, iid, values).await.map_err(|e| e.to_string())?;
        Ok(String::new())
    }

    async fn play_url(&self, url: String) -> Result<(), String> {
        self.speaker.play_url(&url).await.map_err(|e| e.to_string())
    }

    async fn wake_up(&self) -> Result<(), String> {
        self.speaker.wake_up().await.map_err(|e| e.to_string())
    }

    async fn stop_speaker(&self) -> Result<(), String> {
        self.speaker.stop_player().await.map_err(|e| e.to_string())
    }

    async fn wait(&self, seconds: f64) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))) => {}
        }
    }

    async fn monitor(&self, step: i64) {
        self.monitor.increment(step);
        let _ = &self.mute;
    }
}

/// `bot.action("5.1", [...])`: the id pair addressed as `"<siid>.<iid>"`.
fn parse_action_name(name: &str) -> Result<(i32, i32), String> {
    let (siid, iid) = name.split_once('.').ok_or_else(|| format!("malformed action name: {name}"))?;
    let siid: i32 = siid.parse().map_err(|_| format!("malformed siid in action name: {name}"))?;
    let iid: i32 = iid.parse().map_err(|_| format!("malformed iid in action name: {name}"))?;
    Ok((siid, iid))
}

pub struct CoreAiBridge {
    llm: Arc<LlmClient>,
    system_prompt: String,
}

impl CoreAiBridge {
    pub fn new(llm: Arc<LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self { llm, system_prompt: system_prompt.into() }
    }
}

#[async_trait]
impl AiBridge for CoreAiBridge {
    async fn ask(&self, query: String) -> Result<String, String> {
        let messages = vec![ChatMessage::system(self.system_prompt.clone()), ChatMessage::user(query)];
        let response = self.llm.chat(&messages).await.map_err(|e| e.to_string())?;
        Ok(response.text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action_name_splits_siid_and_iid() {
        assert_eq!(parse_action_name("5.1").unwrap(), (5, 1));
        assert!(parse_action_name("garbage").is_err());
    }
}
