pub mod config;
pub mod logging;

pub use config::{config_dir, find_config_in_home, load_config, resolve_config_path};
