//! `GET /ws` (spec §6): forwards [`conversant_music::PlayerEvent`]s to the
//! browser so the web UI can show what's currently playing without polling.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use conversant_music::PlayerEvent;
use serde::Serialize;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| forward_events(socket, state))
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsEvent<'a> {
    NowPlaying { track: &'a conversant_music::Track },
    Stopped,
    PlaylistExhausted,
}

async fn forward_events(mut socket: WebSocket, state: AppState) {
    let mut events = state.music.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let payload = match &event {
                    PlayerEvent::NowPlaying(track) => WsEvent::NowPlaying { track },
                    PlayerEvent::Stopped => WsEvent::Stopped,
                    PlayerEvent::PlaylistExhausted => WsEvent::PlaylistExhausted,
                };
                let Ok(text) = serde_json::to_string(&payload) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
