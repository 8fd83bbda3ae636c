//! Wires every crate's client/engine together into one running process
//! (spec §6), grounded in the teacher's `main.rs` "build provider, then
//! build everything that depends on it" sequencing.

use crate::config::AppConfig;
use crate::cron_handler::ScriptCronHandler;
use crate::scripts;
use crate::state::AppState;
use anyhow::{Context, Result};
use conversant_core::{
    CoreAiBridge, CoreBotApi, DialogPoller, LastSeenTime, MonitorState, MuteLoop, MuteState, Orchestrator,
    OrchestratorConfig, QueryInterceptor, ScriptQueryInterceptor,
};
use conversant_cron::{CronEngine, HolidayCalendar};
use conversant_llm::{auth::ApiKey, LlmAdapter, LlmClient, LlmConfig};
use conversant_music::{MusicPlayer, MusicPlayerConfig};
use conversant_script::{ScriptHost, Storage};
use conversant_speaker::{MiSpeakerClient, SpeakerClient, SpeakerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio_util::sync::CancellationToken;

const ENGINE_POOL_SIZE: usize = 4;

pub struct Runtime {
    pub state: AppState,
}

/// Builds every subsystem from `config` and starts the poller → orchestrator
/// pipeline and the cron engine as background tasks. Returns the shared
/// [`AppState`] the HTTP server is built against.
pub async fn build(config: AppConfig, config_path: PathBuf, trigger_mode: bool, web_addr: Option<&str>) -> Result<Runtime> {
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| conversant_utils::config_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let scripts_dir = config_dir.join("scripts");
    std::fs::create_dir_all(&scripts_dir).context("creating scripts directory")?;

    let speaker: Arc<dyn SpeakerClient> = Arc::new(MiSpeakerClient::new(SpeakerConfig {
        account: config.account.clone(),
        password: config.password.clone(),
        hardware: config.hardware.clone(),
        mi_did: config.mi_did.clone(),
        use_command: config.use_command,
        token_path: config_dir.join("session.json"),
    }));

    let (adapter_name, model) = config.split_bot();
    let adapter = match adapter_name {
        Some(name) => {
            let path = scripts::adapter_script_path(&scripts_dir, name);
            match scripts::read_script(&path) {
                Ok(source) => Some(LlmAdapter::compile(&source).context("compiling LLM adapter script")?),
                Err(e) => {
                    tracing::warn!(adapter = name, error = %e, "adapter script not found, using passthrough wire format");
                    None
                }
            }
        }
        None => None,
    };
    let llm_config = LlmConfig {
        base_url: config.proxy.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        model: model.to_string(),
        api_key: config.openai_key.clone().map(ApiKey::new),
        options: config.gpt_options.clone(),
    };
    let llm = Arc::new(LlmClient::new(llm_config, adapter));

    let mute_state = Arc::new(MuteState::new());
    let mute = Arc::new(MuteLoop::new(mute_state, speaker.clone()));
    let monitor = Arc::new(if trigger_mode { MonitorState::new_trigger_mode() } else { MonitorState::new_polling_mode() });
    let last_seen = Arc::new(LastSeenTime::new());

    let storage = Storage::load(config_dir.join("botdata.storage")).context("loading bot storage")?;
    let script_cancel = CancellationToken::new();
    let bot_api = Arc::new(CoreBotApi::new(speaker.clone(), mute.clone(), monitor.clone(), script_cancel));
    let ai_bridge = Arc::new(CoreAiBridge::new(llm.clone(), config.prompt.clone()));
    let script_host = Arc::new(ScriptHost::new(ENGINE_POOL_SIZE, storage, bot_api, ai_bridge));

    let query_interceptor: Option<Arc<dyn QueryInterceptor>> = Some(Arc::new(ScriptQueryInterceptor::new(
        script_host.clone(),
        scripts::query_script_path(&scripts_dir),
    )));

    let orchestrator_config = OrchestratorConfig {
        default_prompt: config.prompt.clone(),
        trigger_keywords: config.keyword.clone(),
        change_prompt_keywords: config.change_prompt_keyword.clone(),
        start_conversation_keywords: config.start_conversation.clone(),
        end_conversation_keywords: config.end_conversation.clone(),
        thinking_phrases: config.thinking.clone(),
        mute_xiaoai: config.mute_xiaoai,
        stream: config.stream,
        ..Default::default()
    };
    let orchestrator = Orchestrator::with_query_interceptor(
        speaker.clone(),
        llm.clone(),
        mute.clone(),
        monitor.clone(),
        last_seen.clone(),
        orchestrator_config,
        query_interceptor,
    );

    spawn_poller(speaker.clone(), monitor.clone(), last_seen.clone(), orchestrator.clone());

    let holidays = HolidayCalendar::new(config_dir.join("holidays"));
    let cron_handler = Arc::new(ScriptCronHandler::new(scripts_dir.clone(), script_host.clone()));
    let jobs: Vec<_> = scripts::discover_cron_jobs(&scripts_dir).into_iter().map(|e| e.job).collect();
    let cron = Arc::new(CronEngine::spawn(jobs, holidays.clone(), cron_handler));

    let music_root = PathBuf::from(config.music_root.clone().unwrap_or_else(|| config_dir.join("music").to_string_lossy().to_string()));
    std::fs::create_dir_all(&music_root).context("creating music root directory")?;
    let server_base_url = format!("http://{}/music", web_addr.unwrap_or("127.0.0.1:4000"));
    let music = Arc::new(MusicPlayer::start(
        speaker.clone(),
        MusicPlayerConfig {
            music_root: music_root.clone(),
            server_base_url,
            history_path: config_dir.join("history.txt"),
            favorite_path: config_dir.join("favorite.txt"),
        },
    ));

    let state = AppState {
        config: Arc::new(RwLock::new(config)),
        config_path: Arc::new(config_path),
        scripts_dir: Arc::new(scripts_dir),
        music_root: Arc::new(music_root),
        speaker,
        llm,
        orchestrator,
        mute,
        monitor,
        script_host,
        cron,
        holidays,
        music,
        reload: Arc::new(Notify::new()),
    };

    Ok(Runtime { state })
}

/// Drains accepted [`conversant_speaker::dialog::DialogRecord`]s from the
/// poller into the orchestrator, each on its own turn task (spec §4.1.1
/// "hands accepted records to the Orchestrator").
fn spawn_poller(
    speaker: Arc<dyn SpeakerClient>,
    monitor: Arc<MonitorState>,
    last_seen: Arc<LastSeenTime>,
    orchestrator: Arc<Orchestrator>,
) {
    let poller = Arc::new(DialogPoller::new(speaker, monitor, last_seen));
    let (tx, mut rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    tokio::spawn(async move {
        poller.run(tx, shutdown).await;
    });
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            orchestrator.handle_record(record);
        }
    });
}

