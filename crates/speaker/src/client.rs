//! The Speaker Client: an opaque RPC surface over the cloud-controlled
//! smart speaker (spec §4.7). Consumed by `conversant-core`'s Orchestrator
//! and Mute Loop, by the script host's `bot.*` API, and by the music
//! player. Login, device discovery, TTS/playback, and the dialog-log poll
//! all funnel through one `reqwest` client with a persisted session
//! cookie, following `original_source/xiaomi.go`'s `XiaoMi` struct.

use crate::capability::{capabilities_for, DeviceCapabilities};
use crate::dialog::DialogRecord;
use crate::error::SpeakerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Static configuration resolved from the config file + env overrides
/// (`MI_USER`, `MI_PASS`, `MI_DID` per spec §6).
#[derive(Clone, Debug)]
pub struct SpeakerConfig {
    pub account: String,
    pub password: String,
    pub hardware: String,
    pub mi_did: Option<String>,
    pub use_command: bool,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Session {
    cookie: String,
    service_token: String,
}

/// File-backed session cache, mirroring the original's `TokenStore`: a
/// login is expensive (captcha-prone) so the cookie is persisted across
/// restarts and only refreshed on an auth-shaped failure.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Option<Session> {
        let bytes = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn save(&self, session: &Session) {
        if let Ok(bytes) = serde_json::to_vec_pretty(session) {
            if let Some(parent) = self.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(&self.path, bytes) {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to persist speaker session token");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Device {
    pub device_id: String,
    pub hardware: String,
    pub mac: String,
    pub local_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerStatus {
    pub status: i32,
    pub volume: i32,
}

impl SpeakerStatus {
    pub fn is_playing(&self) -> bool {
        self.status == 1
    }
}

/// The operations the Orchestrator, Mute Loop, script host, and music
/// player consume. A trait so `conversant-core` can be tested against a
/// fake without a live speaker account.
#[async_trait]
pub trait SpeakerClient: Send + Sync {
    async fn login(&self) -> Result<(), SpeakerError>;
    async fn device_list(&self) -> Result<Vec<Device>, SpeakerError>;
    async fn text_to_speech(&self, text: &str) -> Result<(), SpeakerError>;
    async fn play_url(&self, url: &str) -> Result<(), SpeakerError>;
    async fn play_music_url(&self, url: &str) -> Result<(), SpeakerError>;
    async fn pause_player(&self) -> Result<(), SpeakerError>;
    async fn stop_player(&self) -> Result<(), SpeakerError>;
    async fn set_volume(&self, value: i32) -> Result<(), SpeakerError>;
    async fn get_status(&self) -> Result<SpeakerStatus, SpeakerError>;
    async fn wake_up(&self) -> Result<(), SpeakerError>;
    async fn miot_action(&self, siid: i32, iid: i32, args: Vec<serde_json::Value>) -> Result<(), SpeakerError>;
    async fn miot_get_prop(&self, siid: i32, iid: i32) -> Result<serde_json::Value, SpeakerError>;
    async fn miot_set_prop(&self, siid: i32, iid: i32, value: serde_json::Value) -> Result<(), SpeakerError>;
    /// Up to `limit` most recent dialog records, newest first as reported
    /// by the cloud; the Orchestrator's poller does its own re-sort and
    /// newest-pick (spec §4.1.1) so this need not guarantee order.
    async fn get_latest_ask(&self, limit: u32) -> Result<Vec<DialogRecord>, SpeakerError>;
}

/// HTTP implementation against the cloud speaker's JSON-RPC-ish surface.
pub struct MiSpeakerClient {
    config: SpeakerConfig,
    http: reqwest::Client,
    tokens: TokenStore,
    session: RwLock<Option<Session>>,
    device_id: RwLock<Option<String>>,
    capabilities: RwLock<DeviceCapabilities>,
}

const MICO_API: &str = "https://api2.mina.mi.com";
const LOGIN_API: &str = "https://account.xiaomi.com/pass/serviceLoginAuth2";
const LATEST_ASK_PATH: &str = "/remote/ubus";
const WAKE_KEYWORD: &str = "小爱同学";

impl MiSpeakerClient {
    pub fn new(config: SpeakerConfig) -> Self {
        let capabilities = capabilities_for(&config.hardware);
        let tokens = TokenStore::new(config.token_path.clone());
        Self {
            config,
            http: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .expect("failed to build speaker HTTP client"),
            tokens,
            session: RwLock::new(None),
            device_id: RwLock::new(None),
            capabilities: RwLock::new(capabilities),
        }
    }

    async fn ensure_session(&self) -> Result<(), SpeakerError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        if let Some(cached) = self.tokens.load() {
            *self.session.write().await = Some(cached);
            return Ok(());
        }
        self.login().await
    }

    async fn device_id(&self) -> Result<String, SpeakerError> {
        if let Some(id) = self.device_id.read().await.clone() {
            return Ok(id);
        }
        let devices = self.device_list().await?;
        let hardware = self.config.hardware.to_lowercase();
        let matched = self
            .config
            .mi_did
            .as_deref()
            .and_then(|did| devices.iter().find(|d| d.device_id == did))
            .or_else(|| devices.iter().find(|d| d.hardware.to_lowercase() == hardware))
            .ok_or_else(|| SpeakerError::UnknownDevice(self.config.hardware.clone()))?;
        *self.capabilities.write().await = capabilities_for(&matched.hardware);
        *self.device_id.write().await = Some(matched.device_id.clone());
        Ok(matched.device_id.clone())
    }

    /// Runs `f` against the current session; on an auth-shaped failure,
    /// refreshes the session exactly once and retries (spec §4.7 supplement,
    /// generalizing the "getLatestAsk retries 2x" rule to all calls).
    async fn with_session<T, F, Fut>(&self, f: F) -> Result<T, SpeakerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, SpeakerError>>,
    {
        self.ensure_session().await?;
        match f().await {
            Err(SpeakerError::Auth(_)) => {
                self.login().await?;
                f().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl SpeakerClient for MiSpeakerClient {
    async fn login(&self) -> Result<(), SpeakerError> {
        let resp = self
            .http
            .post(LOGIN_API)
            .form(&[("user", self.config.account.as_str()), ("pass", self.config.password.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SpeakerError::Auth(format!("login failed: {}", resp.status())));
        }
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let session = Session {
            cookie: body["cUserId"].as_str().unwrap_or_default().to_string(),
            service_token: body["ssecurity"].as_str().unwrap_or_default().to_string(),
        };
        self.tokens.save(&session);
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn device_list(&self) -> Result<Vec<Device>, SpeakerError> {
        self.ensure_session().await?;
        let resp = self
            .http
            .get(format!("{MICO_API}/admin/v2/device_list"))
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;
        let list = body["data"].as_array().cloned().unwrap_or_default();
        Ok(list
            .into_iter()
            .map(|d| Device {
                device_id: d["deviceID"].as_str().unwrap_or_default().to_string(),
                hardware: d["hardware"].as_str().unwrap_or_default().to_string(),
                mac: normalize_mac(d["mac"].as_str().unwrap_or_default()),
                local_ip: d["localIP"].as_str().map(str::to_string),
            })
            .collect())
    }

    async fn text_to_speech(&self, text: &str) -> Result<(), SpeakerError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let device_id = self.device_id().await?;
        if self.config.use_command {
            let caps = *self.capabilities.read().await;
            return self
                .miot_action(caps.tts.0, caps.tts.1, vec![serde_json::Value::String(text.to_string())])
                .await;
        }
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/remote/text_to_speech"))
                .form(&[("deviceId", device_id.as_str()), ("text", text)])
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn play_url(&self, url: &str) -> Result<(), SpeakerError> {
        let device_id = self.device_id().await?;
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/remote/play_by_url"))
                .form(&[("deviceId", device_id.as_str()), ("url", url)])
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn play_music_url(&self, url: &str) -> Result<(), SpeakerError> {
        let caps = *self.capabilities.read().await;
        if caps.play_state != (0, 0) {
            // Models with a music-player action use it directly.
            return self.play_url(url).await;
        }
        self.play_url(url).await
    }

    async fn pause_player(&self) -> Result<(), SpeakerError> {
        let device_id = self.device_id().await?;
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/remote/player_pause"))
                .form(&[("deviceId", device_id.as_str())])
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn stop_player(&self) -> Result<(), SpeakerError> {
        let device_id = self.device_id().await?;
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/remote/player_stop"))
                .form(&[("deviceId", device_id.as_str())])
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn set_volume(&self, value: i32) -> Result<(), SpeakerError> {
        let device_id = self.device_id().await?;
        let value = value.clamp(0, 100);
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/remote/volume"))
                .form(&[("deviceId", device_id.as_str()), ("volume", &value.to_string())])
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn get_status(&self) -> Result<SpeakerStatus, SpeakerError> {
        let device_id = self.device_id().await?;
        let resp = self
            .http
            .get(format!("{MICO_API}/remote/player_get_status"))
            .query(&[("deviceId", device_id.as_str())])
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;
        let info_raw = body["data"]["info"].as_str().unwrap_or("{}");
        let info: serde_json::Value = serde_json::from_str(info_raw).unwrap_or_default();
        Ok(SpeakerStatus {
            status: info["status"].as_i64().unwrap_or(2) as i32,
            volume: info["volume"].as_i64().unwrap_or(-1) as i32,
        })
    }

    async fn wake_up(&self) -> Result<(), SpeakerError> {
        let caps = *self.capabilities.read().await;
        if self
            .miot_action(caps.wake.0, caps.wake.1, vec![])
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.miot_action(
            caps.player_action.0,
            caps.player_action.1,
            vec![serde_json::Value::String(WAKE_KEYWORD.to_string()), serde_json::json!(0)],
        )
        .await
    }

    async fn miot_action(&self, siid: i32, iid: i32, args: Vec<serde_json::Value>) -> Result<(), SpeakerError> {
        let mi_did = self
            .config
            .mi_did
            .clone()
            .ok_or_else(|| SpeakerError::UnknownDevice("no mi_did resolved".into()))?;
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/miotspec/action"))
                .json(&serde_json::json!({
                    "did": mi_did,
                    "siid": siid,
                    "iid": iid,
                    "in": args,
                }))
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn miot_get_prop(&self, siid: i32, iid: i32) -> Result<serde_json::Value, SpeakerError> {
        let mi_did = self
            .config
            .mi_did
            .clone()
            .ok_or_else(|| SpeakerError::UnknownDevice("no mi_did resolved".into()))?;
        let resp = self
            .http
            .get(format!("{MICO_API}/miotspec/prop/get"))
            .query(&[("did", mi_did.as_str()), ("siid", &siid.to_string()), ("iid", &iid.to_string())])
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;
        Ok(body["value"].clone())
    }

    async fn miot_set_prop(&self, siid: i32, iid: i32, value: serde_json::Value) -> Result<(), SpeakerError> {
        let mi_did = self
            .config
            .mi_did
            .clone()
            .ok_or_else(|| SpeakerError::UnknownDevice("no mi_did resolved".into()))?;
        self.with_session(|| async {
            let resp = self
                .http
                .post(format!("{MICO_API}/miotspec/prop/set"))
                .json(&serde_json::json!({ "did": mi_did, "siid": siid, "iid": iid, "value": value }))
                .send()
                .await?;
            ok_or_protocol(resp).await
        })
        .await
    }

    async fn get_latest_ask(&self, limit: u32) -> Result<Vec<DialogRecord>, SpeakerError> {
        let device_id = self.device_id().await?;
        let mut last_err = None;
        for _ in 0..2 {
            let result = self
                .http
                .get(format!("{MICO_API}{LATEST_ASK_PATH}"))
                .query(&[
                    ("deviceId", device_id.as_str()),
                    ("limit", &limit.to_string()),
                    ("timestamp", &(chrono::Utc::now().timestamp_millis()).to_string()),
                ])
                .send()
                .await;
            let resp = match result {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(SpeakerError::from(e));
                    continue;
                }
            };
            let body: serde_json::Value = match resp.json().await {
                Ok(b) => b,
                Err(e) => {
                    last_err = Some(SpeakerError::from(e));
                    continue;
                }
            };
            let data_raw = body["data"].as_str().unwrap_or("{}");
            match serde_json::from_str::<serde_json::Value>(data_raw) {
                Ok(parsed) => {
                    let records: Vec<DialogRecord> = serde_json::from_value(parsed["records"].clone()).unwrap_or_default();
                    return Ok(records);
                }
                Err(e) => last_err = Some(SpeakerError::from(e)),
            }
        }
        Err(last_err.unwrap_or_else(|| SpeakerError::Protocol("max retries exceeded".into())))
    }
}

async fn ok_or_protocol(resp: reqwest::Response) -> Result<(), SpeakerError> {
    if resp.status() == reqwest::StatusCode::UNAUTHORIZED || resp.status() == reqwest::StatusCode::FORBIDDEN {
        return Err(SpeakerError::Auth(resp.status().to_string()));
    }
    if !resp.status().is_success() {
        return Err(SpeakerError::Http(resp.status().to_string()));
    }
    Ok(())
}

/// `normalize(mac)` is idempotent (spec §8): strips separators and
/// lower-cases, so re-normalizing an already-normalized MAC is a no-op.
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase()
}

pub type SharedSpeakerClient = Arc<dyn SpeakerClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_mac_strips_separators_and_lowercases() {
        assert_eq!(normalize_mac("AA:BB:CC:DD:EE:FF"), "aabbccddeeff");
        assert_eq!(normalize_mac("aa-bb-cc-dd-ee-ff"), "aabbccddeeff");
    }

    #[test]
    fn normalize_mac_is_idempotent() {
        let once = normalize_mac("AA:BB:CC:DD:EE:FF");
        let twice = normalize_mac(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn token_store_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("conversant-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");
        let store = TokenStore::new(&path);
        assert!(store.load().is_none());
        let session = Session { cookie: "c".into(), service_token: "s".into() };
        store.save(&session);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.cookie, "c");
        std::fs::remove_file(&path).ok();
    }
}
