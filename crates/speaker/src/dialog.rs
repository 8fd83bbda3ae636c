//! Shape of a speaker-reported dialog turn (`original_source/xiaomi.go`
//! `Record`/`Records`): what `getLatestAsk` returns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogAnswerTts {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogAnswer {
    #[serde(rename = "type")]
    pub kind: String,
    pub tts: Option<DialogAnswerTts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogRecord {
    pub query: String,
    pub time: i64,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub answers: Vec<DialogAnswer>,
}

impl DialogRecord {
    pub fn answer_text(&self) -> Option<&str> {
        self.answers.iter().find_map(|a| a.tts.as_ref()).map(|t| t.text.as_str())
    }
}
