//! `/query/*` (spec §6, §4.5 item 1): edit and smoke-test the single
//! `query.bot` interceptor script that runs ahead of every dialog turn.

use crate::scripts;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

pub async fn read_script(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    scripts::read_script(&scripts::query_script_path(&state.scripts_dir)).map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}

pub async fn save_script(State(state): State<AppState>, body: String) -> Result<StatusCode, (StatusCode, String)> {
    scripts::save_script(&scripts::query_script_path(&state.scripts_dir), &body).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::OK)
}

/// Same file, posted under its own endpoint (spec §6 lists `/query/save`
/// alongside `/query/script` `POST`) — kept distinct so the web UI can
/// "save" without round-tripping through the editor's GET/POST pair.
pub async fn save_named(State(state): State<AppState>, body: String) -> Result<StatusCode, (StatusCode, String)> {
    save_script(State(state), body).await
}

#[derive(Debug, Deserialize)]
pub struct TestQueryRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct TestQueryResponse {
    pub handled: bool,
}

pub async fn test_script(State(state): State<AppState>, Json(body): Json<TestQueryRequest>) -> Result<Json<TestQueryResponse>, (StatusCode, String)> {
    let source = scripts::read_script(&scripts::query_script_path(&state.scripts_dir)).map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    let handled = state
        .script_host
        .run_query_interceptor(&source, body.query)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(TestQueryResponse { handled }))
}
