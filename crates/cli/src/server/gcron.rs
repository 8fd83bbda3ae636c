//! `/gcron/*` (spec §6): CRUD over `clockNNNN.json` cron descriptors plus
//! two read-only calendar lookups (`getnexttime`, `getlunar`) layered
//! directly over `crates/cron`'s scheduling math.

use crate::scripts;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Datelike;
use conversant_cron::{CronJob, PeriodSchedule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SaveCronRequest {
    pub job: CronJob,
    pub script: String,
}

#[derive(Serialize)]
pub struct SaveCronResponse {
    pub filename: String,
}

pub async fn save(
    State(state): State<AppState>,
    Json(mut body): Json<SaveCronRequest>,
) -> Result<Json<SaveCronResponse>, (StatusCode, String)> {
    if body.job.filename.is_empty() {
        body.job.filename = scripts::next_cron_filename(&state.scripts_dir);
    }
    scripts::save_cron_job(&state.scripts_dir, &body.job.filename, &body.job, &body.script)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.cron.remove(&body.job.filename);
    state.cron.add(body.job.clone());
    Ok(Json(SaveCronResponse { filename: body.job.filename }))
}

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: String,
}

pub async fn delete(State(state): State<AppState>, Query(q): Query<FilenameQuery>) -> StatusCode {
    state.cron.remove(&q.filename);
    match scripts::delete_cron_job(&state.scripts_dir, &q.filename) {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<CronJob>> {
    Json(state.cron.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct SetActiveQuery {
    pub filename: String,
    pub active: u8,
}

pub async fn set_active(State(state): State<AppState>, Query(q): Query<SetActiveQuery>) -> Result<StatusCode, (StatusCode, String)> {
    let mut jobs = state.cron.snapshot();
    let Some(job) = jobs.iter_mut().find(|j| j.filename == q.filename) else {
        return Err((StatusCode::NOT_FOUND, format!("no such cron job: {}", q.filename)));
    };
    job.is_active = q.active != 0;
    let job = job.clone();
    let script = scripts::read_script(&scripts::job_script_path(&state.scripts_dir, &job.filename))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    scripts::save_cron_job(&state.scripts_dir, &job.filename, &job, &script)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.cron.remove(&job.filename);
    state.cron.add(job);
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct GetNextTimeQuery {
    pub filename: String,
}

#[derive(Serialize)]
pub struct NextTimeResponse {
    pub next: Option<chrono::NaiveDateTime>,
}

pub async fn get_next_time(State(state): State<AppState>, Query(q): Query<GetNextTimeQuery>) -> Result<Json<NextTimeResponse>, (StatusCode, String)> {
    let jobs = state.cron.snapshot();
    let Some(job) = jobs.iter().find(|j| j.filename == q.filename) else {
        return Err((StatusCode::NOT_FOUND, format!("no such cron job: {}", q.filename)));
    };
    let schedule = PeriodSchedule::new(job, &state.holidays, 0);
    let next = schedule.next_after(chrono::Local::now().naive_local()).await;
    Ok(Json(NextTimeResponse { next }))
}

#[derive(Debug, Deserialize)]
pub struct GetLunarQuery {
    pub time: chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Serialize)]
pub struct LunarResponse {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap: bool,
    pub display: String,
}

pub async fn get_lunar(Query(q): Query<GetLunarQuery>) -> Result<Json<LunarResponse>, (StatusCode, String)> {
    let date = q.time.date_naive();
    let lunar = conversant_cron::solar_to_lunar(date).ok_or((StatusCode::BAD_REQUEST, "date outside the 1900-2099 lunar table".to_string()))?;
    let display = lunar.display_string(date.year());
    Ok(Json(LunarResponse { year: lunar.year, month: lunar.month, day: lunar.day, is_leap: lunar.is_leap, display }))
}
