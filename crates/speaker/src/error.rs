use std::fmt;

#[derive(Debug)]
pub enum SpeakerError {
    Http(String),
    Auth(String),
    UnknownDevice(String),
    Protocol(String),
}

impl fmt::Display for SpeakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerError::Http(e) => write!(f, "speaker http error: {e}"),
            SpeakerError::Auth(e) => write!(f, "speaker auth error: {e}"),
            SpeakerError::UnknownDevice(e) => write!(f, "unknown device: {e}"),
            SpeakerError::Protocol(e) => write!(f, "speaker protocol error: {e}"),
        }
    }
}

impl std::error::Error for SpeakerError {}

impl From<reqwest::Error> for SpeakerError {
    fn from(e: reqwest::Error) -> Self {
        SpeakerError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for SpeakerError {
    fn from(e: serde_json::Error) -> Self {
        SpeakerError::Protocol(e.to_string())
    }
}
