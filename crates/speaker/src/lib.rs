pub mod capability;
pub mod client;
pub mod dialog;
pub mod error;

pub use capability::{capabilities_for, DeviceCapabilities};
pub use client::{Device, SpeakerClient, SpeakerConfig, SpeakerStatus, TokenStore};
pub use dialog::{DialogAnswer, DialogAnswerTts, DialogRecord};
pub use error::SpeakerError;
