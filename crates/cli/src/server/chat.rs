//! `POST /chat` (spec §6): a one-shot LLM turn outside the dialog-log
//! poller, used by the embedded chat page — JSON `{message}` when
//! `stream` is false, an SSE stream of chunks terminated by
//! `data: [DONE]` otherwise.

use crate::state::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use conversant_llm::{ChatMessage, StreamChunk};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub play_query: bool,
    #[serde(default)]
    pub play_answer: bool,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.play_query {
        let _ = state.speaker.text_to_speech(&req.message).await;
    }

    let system_prompt = state.config.read().await.prompt.clone();
    let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(req.message)];

    if !req.stream {
        return match state.llm.chat(&messages).await {
            Ok(resp) => {
                let text = resp.text().to_string();
                if req.play_answer {
                    let _ = state.speaker.text_to_speech(&text).await;
                }
                Json(ChatResponse { message: text }).into_response()
            }
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        };
    }

    match state.llm.chat_stream(&messages).await {
        Ok(upstream) => Sse::new(sse_body(upstream, state, req.play_answer)).keep_alive(KeepAlive::default()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn sse_body(
    upstream: std::pin::Pin<Box<dyn Stream<Item = Result<StreamChunk, conversant_llm::LLMError>> + Send>>,
    state: AppState,
    play_answer: bool,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let sent_done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let full_text = std::sync::Arc::new(parking_lot::Mutex::new(String::new()));

    let body_done = sent_done.clone();
    let body_text = full_text.clone();
    let body = upstream.filter_map(move |item| {
        let sent_done = body_done.clone();
        let full_text = body_text.clone();
        let state = state.clone();
        async move {
            match item {
                Ok(StreamChunk::Delta(delta)) => {
                    full_text.lock().push_str(&delta);
                    Some(Event::default().data(serde_json::json!({ "message": delta }).to_string()))
                }
                Ok(StreamChunk::Done) => {
                    sent_done.store(true, std::sync::atomic::Ordering::SeqCst);
                    if play_answer {
                        let answer = full_text.lock().clone();
                        let speaker = state.speaker.clone();
                        tokio::spawn(async move {
                            let _ = speaker.text_to_speech(&answer).await;
                        });
                    }
                    Some(Event::default().data("[DONE]"))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "chat stream errored mid-stream");
                    None
                }
            }
        }
    });

    let tail = futures::stream::once(async move {
        if sent_done.load(std::sync::atomic::Ordering::SeqCst) {
            None
        } else {
            Some(Event::default().data("[DONE]"))
        }
    });

    body.chain(tail).filter_map(|event| async move { event.map(Ok) })
}
