//! Credential resolution for the configured LLM backend.
//!
//! The config file (and its `OPENAI_API_KEY` env override, per spec §6)
//! supplies a single static key; this is a much narrower need than the
//! teacher's OAuth-capable resolver, so it's kept to the static case only.

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"<redacted>").finish()
    }
}
