//! The canonical LLM client (spec §4.6 "LLM Client"): one configured
//! backend, a streaming variant, and the adapter hook.

use crate::adapter::LlmAdapter;
use crate::auth::ApiKey;
use crate::chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, StreamChunk};
use crate::error::LLMError;
use futures::{Stream, TryStreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

/// Static configuration resolved from the config file + env overrides.
#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<ApiKey>,
    pub options: serde_json::Map<String, Value>,
}

pub struct LlmClient {
    config: LlmConfig,
    adapter: Option<LlmAdapter>,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig, adapter: Option<LlmAdapter>) -> Self {
        Self {
            config,
            adapter,
            http: reqwest::Client::new(),
        }
    }

    fn build_request(&self, messages: &[ChatMessage], stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            stream,
            options: self.config.options.clone(),
        }
    }

    fn wire_body(
        &self,
        request: &ChatCompletionRequest,
        headers: &mut HashMap<String, String>,
    ) -> Result<Value, LLMError> {
        let mut body = match &self.adapter {
            Some(a) => a.transform_request(request, headers)?,
            None => default_wire_body(request),
        };
        if let Value::Object(ref mut map) = body {
            for (k, v) in &request.options {
                map.insert(k.clone(), v.clone());
            }
        }
        Ok(body)
    }

    fn post(&self, path_is_full_url: bool) -> reqwest::RequestBuilder {
        let url = if path_is_full_url {
            self.config.base_url.clone()
        } else {
            format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
        };
        self.http.post(url)
    }

    /// Batch (non-streaming) call. Messages are `system prompt, history,
    /// user turn` as assembled by the orchestrator.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletionResponse, LLMError> {
        let request = self.build_request(messages, false);
        let mut headers = HashMap::new();
        let body = self.wire_body(&request, &mut headers)?;

        let mut rb = self.post(false).json(&body);
        if let Some(key) = &self.config.api_key {
            rb = rb.header("Authorization", key.authorization_header());
        }
        for (k, v) in headers {
            rb = rb.header(k, v);
        }

        let resp = rb.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::ProviderError(format!("{status}: {text}")));
        }
        let backend_body: Value = resp.json().await?;

        match &self.adapter {
            Some(a) => a.transform_response(&backend_body),
            None => default_parse_response(&backend_body),
        }
    }

    /// Streaming call. Each element is a [`StreamChunk`]; the caller (the
    /// Orchestrator) feeds `Delta` text into the TTS segmenter and stops on
    /// `Done` or stream EOF (spec §4.1 "Streaming to speech").
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk, LLMError>> + Send>>, LLMError> {
        let request = self.build_request(messages, true);
        let mut headers = HashMap::new();
        let body = self.wire_body(&request, &mut headers)?;

        let mut rb = self.post(false).json(&body);
        if let Some(key) = &self.config.api_key {
            rb = rb.header("Authorization", key.authorization_header());
        }
        for (k, v) in headers {
            rb = rb.header(k, v);
        }

        let resp = rb.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::ProviderError(format!("{status}: {text}")));
        }

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let reader = StreamReader::new(byte_stream);
        let lines = tokio::io::BufReader::new(reader).lines();
        let adapter = self.adapter.clone();

        let stream = futures::stream::unfold(lines, move |mut lines| {
            let adapter = adapter.clone();
            async move {
                loop {
                    match lines.next_line().await {
                        Ok(Some(raw)) => {
                            let line = raw.trim();
                            if line.is_empty() {
                                continue;
                            }
                            let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
                            if payload == "[DONE]" {
                                return Some((Ok(StreamChunk::Done), lines));
                            }
                            let value: Value = match serde_json::from_str(payload) {
                                Ok(v) => v,
                                Err(e) => return Some((Err(LLMError::from(e)), lines)),
                            };
                            let chunk = match &adapter {
                                Some(a) => a.transform_stream_line(&value),
                                None => default_parse_stream_chunk(&value),
                            };
                            match chunk {
                                Ok(Some(c)) => return Some((Ok(c), lines)),
                                Ok(None) => continue,
                                Err(e) => return Some((Err(e), lines)),
                            }
                        }
                        Ok(None) => return None,
                        Err(e) => return Some((Err(LLMError::HttpError(e.to_string())), lines)),
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Default passthrough wire shape when no `<model>.adapter` script is
/// configured: plain OpenAI-compatible chat-completions body.
fn default_wire_body(request: &ChatCompletionRequest) -> Value {
    serde_json::json!({
        "model": request.model,
        "messages": request.messages,
        "stream": request.stream,
    })
}

fn default_parse_response(body: &Value) -> Result<ChatCompletionResponse, LLMError> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LLMError::ResponseFormatError {
            message: "missing choices[0].message.content".into(),
            raw_response: body.to_string(),
        })?
        .to_string();
    let finish_reason = body["choices"][0]["finish_reason"].as_str().map(|s| match s {
        "stop" => crate::chat::FinishReason::Stop,
        "length" => crate::chat::FinishReason::Length,
        _ => crate::chat::FinishReason::Other,
    });
    Ok(ChatCompletionResponse {
        message: ChatMessage::assistant(content),
        finish_reason,
        usage: serde_json::from_value(body["usage"].clone()).ok(),
    })
}

fn default_parse_stream_chunk(value: &Value) -> Result<Option<StreamChunk>, LLMError> {
    if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
        if !delta.is_empty() {
            return Ok(Some(StreamChunk::Delta(delta.to_string())));
        }
    }
    Ok(None)
}

pub type SharedLlmClient = Arc<LlmClient>;
