//! Conversation Orchestrator (spec §4.1): the turn state machine driven
//! by accepted `DialogRecord`s from the poller.

use crate::mute::MuteLoop;
use crate::query_interceptor::QueryInterceptor;
use crate::segmenter::segmenter;
use crate::state::{new_cancellation, ConversationState, LastSeenTime, Message, MonitorState, MONITOR_POLLING_MODE};
use conversant_llm::{ChatMessage, LlmClient, StreamChunk};
use conversant_speaker::dialog::DialogRecord;
use conversant_speaker::SpeakerClient;
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

const THINKING_DELAY: Duration = Duration::from_millis(600);
const WAIT_FOR_SPEAKER_ANSWER_TRIES: u32 = 20;
const WAIT_FOR_SPEAKER_ANSWER_PERIOD: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct OrchestratorConfig {
    pub default_prompt: String,
    pub trigger_keywords: Vec<String>,
    pub change_prompt_keywords: Vec<String>,
    pub start_conversation_keywords: Vec<String>,
    pub end_conversation_keywords: Vec<String>,
    pub thinking_phrases: Vec<String>,
    pub dont_know_phrases: Vec<String>,
    pub mute_xiaoai: bool,
    pub wake_word: String,
    pub prompt_change_ack: String,
    pub stream: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_prompt: "你是一个智能助理".into(),
            trigger_keywords: vec![],
            change_prompt_keywords: vec![],
            start_conversation_keywords: vec!["开始持续对话".into()],
            end_conversation_keywords: vec!["结束持续对话".into()],
            thinking_phrases: vec!["让我想一下".into(), "这个问题有点难，我再想想".into()],
            dont_know_phrases: vec![
                "被你问住了".into(),
                "把我难住了".into(),
                "我暂时还回答不上".into(),
                "换个话题".into(),
            ],
            mute_xiaoai: false,
            wake_word: "小爱同学".into(),
            prompt_change_ack: "好的".into(),
            stream: true,
        }
    }
}

pub struct Orchestrator {
    speaker: Arc<dyn SpeakerClient>,
    llm: Arc<LlmClient>,
    mute: Arc<MuteLoop>,
    monitor: Arc<MonitorState>,
    last_seen: Arc<LastSeenTime>,
    config: OrchestratorConfig,
    conversation: Mutex<ConversationState>,
    current_cancel: parking_lot::Mutex<Option<mpsc::Sender<()>>>,
    query_interceptor: Option<Arc<dyn QueryInterceptor>>,
}

impl Orchestrator {
    pub fn new(
        speaker: Arc<dyn SpeakerClient>,
        llm: Arc<LlmClient>,
        mute: Arc<MuteLoop>,
        monitor: Arc<MonitorState>,
        last_seen: Arc<LastSeenTime>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Self::with_query_interceptor(speaker, llm, mute, monitor, last_seen, config, None)
    }

    /// Like [`Self::new`], additionally wiring in the query interceptor
    /// call site (spec §4.5 item 1, §2 "F triggers B for query scripts").
    pub fn with_query_interceptor(
        speaker: Arc<dyn SpeakerClient>,
        llm: Arc<LlmClient>,
        mute: Arc<MuteLoop>,
        monitor: Arc<MonitorState>,
        last_seen: Arc<LastSeenTime>,
        config: OrchestratorConfig,
        query_interceptor: Option<Arc<dyn QueryInterceptor>>,
    ) -> Arc<Self> {
        let conversation = Mutex::new(ConversationState::new(config.default_prompt.clone()));
        Arc::new(Self {
            speaker,
            llm,
            mute,
            monitor,
            last_seen,
            config,
            conversation,
            current_cancel: parking_lot::Mutex::new(None),
            query_interceptor,
        })
    }

    /// Starting a new turn closes the previous turn's cancellation channel
    /// (spec §4.1 "Cancellation"). Runs the turn on its own task so the
    /// poller loop is never blocked by it.
    pub fn handle_record(self: &Arc<Self>, record: DialogRecord) {
        let (tx, token) = new_cancellation();
        *self.current_cancel.lock() = Some(tx);
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_turn(record, token).await {
                tracing::warn!(error = %e, "turn aborted");
            }
        });
    }

    async fn run_turn(self: &Arc<Self>, record: DialogRecord, cancel: CancellationToken) -> Result<(), String> {
        if let Some(interceptor) = &self.query_interceptor {
            if interceptor.intercept(&record.query).await {
                return Ok(());
            }
        }
        if self.handle_control_command(&record, &cancel).await? {
            return Ok(());
        }
        if self.handle_prompt_change(&record, &cancel).await? {
            return Ok(());
        }

        let speaker_answer = record.answer_text().unwrap_or_default().to_string();
        let is_failure = self.is_dont_know(&speaker_answer);

        let should_mute = {
            let conversation = self.conversation.lock().await;
            conversation.in_conversation
                || self.config.mute_xiaoai
                || is_failure
                || self.monitor.get() == MONITOR_POLLING_MODE
        };
        if should_mute {
            self.mute.start(cancel.clone());
        }

        let in_conversation = self.conversation.lock().await.in_conversation;
        let bare_wake = record.query.trim() == self.config.wake_word;
        let ask_llm = (in_conversation && !bare_wake)
            || self
                .config
                .trigger_keywords
                .iter()
                .any(|k| record.query.starts_with(k.as_str()));

        if !ask_llm {
            return Ok(());
        }

        if should_mute && !speaker_answer.is_empty() {
            self.schedule_thinking_filler(&cancel);
        }

        let query = strip_any_prefix(&record.query, &self.config.trigger_keywords);
        let user_turn = if !speaker_answer.is_empty() && !is_failure {
            judge_and_rewrite_prompt(&query, &speaker_answer)
        } else {
            query.clone()
        };

        let messages = {
            let conversation = self.conversation.lock().await;
            let mut messages = vec![ChatMessage::system(conversation.system_prompt.clone())];
            messages.extend(conversation.history.iter().map(Message::to_chat_message));
            messages.push(ChatMessage::user(user_turn));
            messages
        };

        let answer = if self.config.stream {
            match self.stream_answer(&messages, &cancel).await {
                Ok(text) => text,
                Err(e) if !should_mute => {
                    tracing::warn!(error = %e, "llm stream unreachable, falling back to speaker's own answer");
                    self.wait_for_speakers_own_answer(&record, &cancel).await;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        } else {
            match self.llm.chat(&messages).await {
                Ok(resp) => {
                    let text = resp.text().to_string();
                    self.speaker.text_to_speech(&text).await.map_err(|e| e.to_string())?;
                    self.last_seen.set(chrono::Utc::now().timestamp_millis());
                    text
                }
                Err(e) if !should_mute => {
                    tracing::warn!(error = %e, "llm unreachable, falling back to speaker's own answer");
                    self.wait_for_speakers_own_answer(&record, &cancel).await;
                    return Ok(());
                }
                Err(_) => return Ok(()),
            }
        };

        self.mute.release(&cancel).await;
        self.post_turn(&query, &answer).await;
        Ok(())
    }

    async fn handle_control_command(&self, record: &DialogRecord, cancel: &CancellationToken) -> Result<bool, String> {
        let mut conversation = self.conversation.lock().await;
        if conversation.in_conversation
            && self.config.end_conversation_keywords.iter().any(|k| record.query.starts_with(k.as_str()))
        {
            self.speaker.pause_player().await.map_err(|e| e.to_string())?;
            conversation.system_prompt = self.config.default_prompt.clone();
            conversation.history.clear();
            conversation.in_conversation = false;
            return Ok(true);
        }
        if conversation.in_conversation && record.query.trim() == self.config.wake_word {
            // Wake-word alone is absorbed silently while already continuous.
            return Ok(true);
        }
        if !conversation.in_conversation
            && self.config.start_conversation_keywords.iter().any(|k| record.query.starts_with(k.as_str()))
        {
            conversation.in_conversation = true;
            conversation.history.clear();
            drop(conversation);
            self.mute.start(cancel.clone());
            return Ok(true);
        }
        Ok(false)
    }

    async fn handle_prompt_change(&self, record: &DialogRecord, cancel: &CancellationToken) -> Result<bool, String> {
        let matched = self.config.change_prompt_keywords.iter().find(|k| record.query.starts_with(k.as_str())).cloned();
        let Some(keyword) = matched else {
            return Ok(false);
        };
        let new_prompt = record.query.strip_prefix(keyword.as_str()).unwrap_or(&record.query).trim().to_string();
        self.speaker.pause_player().await.map_err(|e| e.to_string())?;
        let mut conversation = self.conversation.lock().await;
        conversation.system_prompt = new_prompt;
        drop(conversation);
        let _ = cancel;
        self.speaker.text_to_speech(&self.config.prompt_change_ack).await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    fn is_dont_know(&self, answer: &str) -> bool {
        !answer.is_empty() && self.config.dont_know_phrases.iter().any(|phrase| answer.contains(phrase.as_str()))
    }

    /// Fires a random thinking phrase after 600ms, only if the Mute Loop is
    /// still active at that instant (spec §4.1 "Thinking filler").
    fn schedule_thinking_filler(self: &Arc<Self>, cancel: &CancellationToken) {
        let this = self.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(THINKING_DELAY) => {}
            }
            if !this.mute.state().is_muted_or_thinking() {
                return;
            }
            let phrase = this
                .config
                .thinking_phrases
                .choose(&mut rand::thread_rng())
                .cloned()
                .unwrap_or_else(|| "让我想一下".to_string());
            let seconds = conversant_script::estimate_tts_seconds(&phrase);
            this.mute.begin_thinking(seconds);
            let _ = this.speaker.text_to_speech(&phrase).await;
        });
    }

    /// Streams the LLM's reply, dispatching each Segmenter fragment to the
    /// Speaker as it becomes available (spec §4.1 "Streaming to speech").
    async fn stream_answer(self: &Arc<Self>, messages: &[ChatMessage], cancel: &CancellationToken) -> Result<String, String> {
        let mut stream = self.llm.chat_stream(messages).await.map_err(|e| e.to_string())?;
        let (writer, mut reader) = segmenter(self.mute.state());
        let mut full_text = String::new();

        let speaker = self.speaker.clone();
        let mute = self.mute.clone();
        let last_seen = self.last_seen.clone();
        let cancel_for_dispatch = cancel.clone();
        let dispatch = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_for_dispatch.cancelled() => return,
                    fragment = reader.next_fragment() => {
                        match fragment {
                            Some(text) => {
                                if speaker.text_to_speech(&text).await.is_ok() {
                                    mute.release(&cancel_for_dispatch).await;
                                    // Prevents the poller from mistaking this
                                    // dispatched fragment's echo for a fresh turn.
                                    last_seen.set(chrono::Utc::now().timestamp_millis());
                                }
                            }
                            None => return,
                        }
                    }
                }
            }
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    writer.close();
                    let _ = dispatch.await;
                    return Ok(full_text);
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(StreamChunk::Delta(delta))) => {
                            full_text.push_str(&delta);
                            writer.push(&delta);
                        }
                        Some(Ok(StreamChunk::Done)) => break,
                        Some(Err(e)) => {
                            writer.close();
                            let _ = dispatch.await;
                            return Err(e.to_string());
                        }
                        None => break,
                    }
                }
            }
        }
        writer.close();
        let _ = dispatch.await;
        Ok(full_text)
    }

    async fn wait_for_speakers_own_answer(&self, record: &DialogRecord, cancel: &CancellationToken) {
        if !record.answer_text().unwrap_or_default().is_empty() {
            return;
        }
        for _ in 0..WAIT_FOR_SPEAKER_ANSWER_TRIES {
            if cancel.is_cancelled() {
                return;
            }
            if let Ok(records) = self.speaker.get_latest_ask(1).await {
                if records.iter().any(|r| r.answer_text().is_some_and(|t| !t.is_empty())) {
                    return;
                }
            }
            tokio::time::sleep(WAIT_FOR_SPEAKER_ANSWER_PERIOD).await;
        }
    }

    async fn post_turn(&self, query: &str, answer: &str) {
        let mut conversation = self.conversation.lock().await;
        if !conversation.in_conversation {
            return;
        }
        conversation.history.push(Message::user(query.to_string()));
        conversation.history.push(Message::assistant(answer.to_string()));
        drop(conversation);
        let _ = self.speaker.wake_up().await;
    }
}

fn strip_any_prefix(query: &str, prefixes: &[String]) -> String {
    for p in prefixes {
        if let Some(rest) = query.strip_prefix(p.as_str()) {
            return rest.trim().to_string();
        }
    }
    query.trim().to_string()
}

fn judge_and_rewrite_prompt(query: &str, speaker_answer: &str) -> String {
    format!(
        "用户问: {query}\n语音助手的回答是: \"{speaker_answer}\"。如果这个回答是错误的或没有实际回答问题，请重新回答；如果回答正确，请原样重复。"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conversant_speaker::{Device, SpeakerError, SpeakerStatus};

    struct SilentSpeaker;

    #[async_trait]
    impl SpeakerClient for SilentSpeaker {
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
            Ok(vec![])
        }
    }

    fn test_orchestrator() -> Arc<Orchestrator> {
        let speaker: Arc<dyn SpeakerClient> = Arc::new(SilentSpeaker);
        let mute = Arc::new(MuteLoop::new(Arc::new(crate::state::MuteState::new()), speaker.clone()));
        let llm = Arc::new(LlmClient::new(
            conversant_llm::LlmConfig {
                base_url: "http://localhost".into(),
                model: "test".into(),
                api_key: None,
                options: serde_json::Map::new(),
            },
            None,
        ));
        let monitor = Arc::new(MonitorState::new_trigger_mode());
        let last_seen = Arc::new(crate::state::LastSeenTime::new());
        Orchestrator::new(speaker, llm, mute, monitor, last_seen, OrchestratorConfig::default())
    }

    #[test]
    fn dont_know_heuristic_matches_configured_phrases() {
        let orchestrator_fn = |answer: &str| {
            let config = OrchestratorConfig::default();
            !answer.is_empty() && config.dont_know_phrases.iter().any(|p| answer.contains(p.as_str()))
        };
        assert!(orchestrator_fn("我暂时还回答不上这个问题"));
        assert!(!orchestrator_fn("北京今天晴天"));
    }

    #[tokio::test]
    async fn end_conversation_restores_default_prompt() {
        let orchestrator = test_orchestrator();
        {
            let mut c = orchestrator.conversation.lock().await;
            c.in_conversation = true;
            c.system_prompt = "你是一只猫".into();
        }
        let record = DialogRecord { query: "结束持续对话".into(), time: 1, request_id: "r".into(), answers: vec![] };
        let cancel = CancellationToken::new();
        let handled = orchestrator.handle_control_command(&record, &cancel).await.unwrap();
        assert!(handled);
        let c = orchestrator.conversation.lock().await;
        assert!(!c.in_conversation);
        assert_eq!(c.system_prompt, orchestrator.config.default_prompt);
    }

    #[tokio::test]
    async fn prompt_change_strips_keyword_and_trims() {
        let mut orchestrator = test_orchestrator();
        Arc::get_mut(&mut orchestrator).unwrap().config.change_prompt_keywords = vec!["你是".into()];
        let record = DialogRecord { query: "你是一只猫".into(), time: 1, request_id: "r".into(), answers: vec![] };
        let cancel = CancellationToken::new();
        let handled = orchestrator.handle_prompt_change(&record, &cancel).await.unwrap();
        assert!(handled);
        let c = orchestrator.conversation.lock().await;
        assert_eq!(c.system_prompt, "一只猫");
    }
}
