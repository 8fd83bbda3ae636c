//! `/task/*` (spec §6, §4.5 item 2): edit, smoke-test, and actually serve
//! the `.bot` scripts bound to arbitrary HTTP paths under `/task/{name}`.

use crate::scripts;
use crate::state::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use conversant_script::TaskRequest;
use std::collections::HashMap;

pub async fn read_script(State(state): State<AppState>, Path(name): Path<String>) -> Result<String, (StatusCode, String)> {
    scripts::read_script(&scripts::task_script_path(&state.scripts_dir, &name)).map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}

pub async fn save_script(State(state): State<AppState>, Path(name): Path<String>, body: String) -> Result<StatusCode, (StatusCode, String)> {
    scripts::save_script(&scripts::task_script_path(&state.scripts_dir, &name), &body)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::OK)
}

/// Runs the named script against a synthetic `GET /task/{name}` request so
/// the web UI can smoke-test edits before they're wired to a real caller.
pub async fn test_script(State(state): State<AppState>, Path(name): Path<String>, body: String) -> Result<Response, (StatusCode, String)> {
    let source = scripts::read_script(&scripts::task_script_path(&state.scripts_dir, &name))
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    let request = TaskRequest { method: "GET".into(), url: format!("/task/{name}"), body, ..Default::default() };
    let response = state.script_host.run_task(&source, request).await.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(task_response_to_http(response))
}

/// Catch-all `/task/{name}` handler: translates the real incoming request
/// into a [`TaskRequest`] and the script's [`TaskResponse`] back into an
/// axum response, honoring the script's single-write-wins `res.redirect`.
pub async fn run_task(State(state): State<AppState>, Path(name): Path<String>, Query(query): Query<HashMap<String, String>>, request: Request<Body>) -> Result<Response, (StatusCode, String)> {
    let source = scripts::read_script(&scripts::task_script_path(&state.scripts_dir, &name))
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let headers = headers_to_map(request.headers());
    let body_bytes = to_bytes(request.into_body(), 1024 * 1024).await.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let body = String::from_utf8_lossy(&body_bytes).to_string();

    let task_request = TaskRequest { method, url: uri, headers, body, params: HashMap::new(), query };
    let response = state.script_host.run_task(&source, task_request).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(task_response_to_http(response))
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn task_response_to_http(response: conversant_script::TaskResponse) -> Response {
    if let Some(location) = response.redirect {
        return axum::response::Redirect::to(&location).into_response();
    }
    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.headers {
        builder = builder.header(key, value);
    }
    builder.body(Body::from(response.body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
