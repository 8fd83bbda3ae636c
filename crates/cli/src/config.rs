//! The config file shape (spec §6): fields recognized from JSON or TOML,
//! plus the `env > file` override rule for the speaker/LLM credentials.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub hardware: String,
    pub account: String,
    pub password: String,
    #[serde(default)]
    pub mi_did: Option<String>,
    /// `"<adapter>=<model>"` or a bare `<model>`.
    #[serde(default)]
    pub bot: String,
    #[serde(default)]
    pub openai_key: Option<String>,
    #[serde(default)]
    pub openai_backend: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub gpt_options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub keyword: Vec<String>,
    #[serde(default)]
    pub change_prompt_keyword: Vec<String>,
    #[serde(default)]
    pub thinking: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub mute_xiaoai: bool,
    #[serde(default)]
    pub use_command: bool,
    #[serde(default)]
    pub start_conversation: Vec<String>,
    #[serde(default)]
    pub end_conversation: Vec<String>,
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Local music library root; not in the teacher's Go config but
    /// needed by the music player's discovery (spec §4.8).
    #[serde(default)]
    pub music_root: Option<String>,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Applies `MI_USER`, `MI_PASS`, `MI_DID`, `OPENAI_API_KEY`,
    /// `OPENAI_MODEL`, `OPENAI_BASE_URL` over whatever the file set
    /// (spec §6 "precedence: env > file").
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MI_USER") {
            self.account = v;
        }
        if let Ok(v) = std::env::var("MI_PASS") {
            self.password = v;
        }
        if let Ok(v) = std::env::var("MI_DID") {
            self.mi_did = Some(v);
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.openai_key = Some(v);
        }
        if let Ok(v) = std::env::var("OPENAI_MODEL") {
            self.bot = v;
        }
        if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
            self.proxy = Some(v);
        }
    }

    /// Splits `bot` into `(adapter_name, model)`: `"foo=bar"` yields
    /// `(Some("foo"), "bar")`; a bare model yields `(None, "bar")`.
    pub fn split_bot(&self) -> (Option<&str>, &str) {
        match self.bot.split_once('=') {
            Some((adapter, model)) => (Some(adapter), model),
            None => (None, self.bot.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPolicy(pub HashMap<String, bool>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_bot_recognizes_adapter_prefix() {
        let mut cfg = AppConfig::default();
        cfg.bot = "custom=gpt-4o".into();
        assert_eq!(cfg.split_bot(), (Some("custom"), "gpt-4o"));
    }

    #[test]
    fn split_bot_defaults_to_no_adapter() {
        let mut cfg = AppConfig::default();
        cfg.bot = "gpt-4o".into();
        assert_eq!(cfg.split_bot(), (None, "gpt-4o"));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut cfg = AppConfig { account: "file-user".into(), ..Default::default() };
        std::env::set_var("MI_USER", "env-user");
        cfg.apply_env_overrides();
        std::env::remove_var("MI_USER");
        assert_eq!(cfg.account, "env-user");
    }
}
