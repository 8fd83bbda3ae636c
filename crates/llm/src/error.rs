use std::fmt;

/// Errors that can occur while talking to the configured LLM backend.
#[derive(Debug)]
pub enum LLMError {
    /// HTTP transport error (connection refused, TLS failure, timeout, ...).
    HttpError(String),
    /// The backend rejected our credentials.
    AuthError(String),
    /// We built a request the backend considers malformed.
    InvalidRequest(String),
    /// The backend returned a well-formed error payload.
    ProviderError(String),
    /// A response couldn't be parsed into the canonical shape.
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// `serde_json` failed to (de)serialize a value.
    JsonError(String),
    /// The adapter script failed or returned something that doesn't fit the
    /// canonical shape.
    AdapterError(String),
}

impl fmt::Display for LLMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMError::HttpError(e) => write!(f, "HTTP error: {e}"),
            LLMError::AuthError(e) => write!(f, "auth error: {e}"),
            LLMError::InvalidRequest(e) => write!(f, "invalid request: {e}"),
            LLMError::ProviderError(e) => write!(f, "provider error: {e}"),
            LLMError::ResponseFormatError {
                message,
                raw_response,
            } => write!(f, "response format error: {message} (raw: {raw_response})"),
            LLMError::JsonError(e) => write!(f, "json error: {e}"),
            LLMError::AdapterError(e) => write!(f, "adapter error: {e}"),
        }
    }
}

impl std::error::Error for LLMError {}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!("{err} at line {} column {}", err.line(), err.column()))
    }
}

impl From<url::ParseError> for LLMError {
    fn from(err: url::ParseError) -> Self {
        LLMError::InvalidRequest(format!("invalid url: {err}"))
    }
}
