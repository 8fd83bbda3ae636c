//! The HTTP/WebSocket surface (spec §6 "EXTERNAL INTERFACES"): axum router
//! construction wiring every handler family to shared [`AppState`].

mod chat;
mod config_endpoint;
mod gcron;
mod monitor;
mod query;
mod task;
mod ws;

use crate::state::AppState;
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let music_service = ServeDir::new(state.music_root.as_path());

    Router::new()
        .nest_service("/music", music_service)
        .route("/submit-config", post(config_endpoint::submit_config))
        .route("/chat", post(chat::chat))
        .route("/monitor", get(monitor::monitor).post(monitor::monitor))
        .route("/gcron/save", post(gcron::save))
        .route("/gcron/delete", post(gcron::delete))
        .route("/gcron/list", get(gcron::list))
        .route("/gcron/setactive", get(gcron::set_active))
        .route("/gcron/getnexttime", get(gcron::get_next_time))
        .route("/gcron/getlunar", get(gcron::get_lunar))
        .route("/task/script/{name}", get(task::read_script).post(task::save_script))
        .route("/task/test/{name}", post(task::test_script))
        .route("/task/{name}", any(task::run_task))
        .route("/query/script", get(query::read_script).post(query::save_script))
        .route("/query/test", post(query::test_script))
        .route("/query/save", post(query::save_named))
        .route("/ws", get(ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
