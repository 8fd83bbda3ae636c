//! `POST /submit-config` (spec §6): persists the posted config over
//! whatever's on disk and wakes the main loop to reload it.

use crate::config::AppConfig;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct SubmitConfigResponse {
    pub message: String,
}

pub async fn submit_config(
    State(state): State<AppState>,
    Json(body): Json<AppConfig>,
) -> Result<Json<SubmitConfigResponse>, (StatusCode, String)> {
    write_config_file(&state, &body).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    *state.config.write().await = body;
    state.reload.notify_waiters();
    Ok(Json(SubmitConfigResponse { message: "config saved".to_string() }))
}

fn write_config_file(state: &AppState, config: &AppConfig) -> anyhow::Result<()> {
    let is_toml = state.config_path.extension().and_then(|e| e.to_str()) == Some("toml");
    let text = if is_toml { toml::to_string_pretty(config)? } else { serde_json::to_string_pretty(config)? };
    std::fs::write(state.config_path.as_path(), text)?;
    Ok(())
}
