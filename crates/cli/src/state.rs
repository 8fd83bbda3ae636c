//! Shared state handed to every axum handler (spec §6 "EXTERNAL
//! INTERFACES"), plus the pieces a handler needs that don't belong to
//! any one crate: the config file's own path/contents and the reload
//! signal `/submit-config` fires.

use crate::config::AppConfig;
use conversant_core::{MonitorState, MuteLoop, Orchestrator};
use conversant_cron::{CronEngine, HolidayCalendar};
use conversant_llm::LlmClient;
use conversant_music::MusicPlayer;
use conversant_script::ScriptHost;
use conversant_speaker::SpeakerClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub config_path: Arc<PathBuf>,
    pub scripts_dir: Arc<PathBuf>,
    pub music_root: Arc<PathBuf>,
    pub speaker: Arc<dyn SpeakerClient>,
    pub llm: Arc<LlmClient>,
    pub orchestrator: Arc<Orchestrator>,
    pub mute: Arc<MuteLoop>,
    pub monitor: Arc<MonitorState>,
    pub script_host: Arc<ScriptHost>,
    pub cron: Arc<CronEngine>,
    pub holidays: HolidayCalendar,
    pub music: Arc<MusicPlayer>,
    /// Bumped by `/submit-config`; the main loop reloads credentials and
    /// keyword lists from it (spec §6 "notify main loop to reload").
    pub reload: Arc<Notify>,
}
