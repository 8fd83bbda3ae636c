//! `GET|POST /monitor` (spec §6): bumps `MonitorState`, used by the
//! out-of-scope packet-capture "trigger mode" sidecar to wake the dialog
//! poller without continuous polling.

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
pub struct MonitorQuery {
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

#[derive(Serialize)]
pub struct MonitorResponse {
    pub monitor: i64,
}

pub async fn monitor(State(state): State<AppState>, Query(query): Query<MonitorQuery>) -> Json<MonitorResponse> {
    state.monitor.increment(query.step);
    Json(MonitorResponse { monitor: state.monitor.get() })
}
