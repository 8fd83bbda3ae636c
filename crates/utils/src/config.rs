//! Config-file discovery (spec §6), generalized from the teacher's
//! `find_config_in_home` pattern: an explicit `-c` path wins, else a
//! well-known directory under the user's home is searched by filename.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("no home directory found"))?;
    Ok(home.join(".conversant"))
}

/// Searches `~/.conversant/<filename>` in order for the first existing
/// file among `filenames` (e.g. `["conversant.toml", "conversant.json"]`).
pub fn find_config_in_home(filenames: &[&str]) -> Result<PathBuf> {
    let dir = config_dir()?;
    for filename in filenames {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(anyhow!("no config file found in {:?}", dir))
}

/// Resolves the config path: an explicit `-c <path>` wins outright,
/// otherwise falls back to the home-directory search.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }
    find_config_in_home(&["conversant.toml", "conversant.json"])
}

/// Loads and parses a config file by extension (`.toml` or `.json`), per
/// spec §6 "JSON or TOML, chosen by extension".
pub fn load_config<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&raw).with_context(|| format!("failed to parse TOML config {}", path.display())),
        _ => serde_json::from_str(&raw).with_context(|| format!("failed to parse JSON config {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn loads_json_by_extension() {
        let dir = std::env::temp_dir().join(format!("conversant-utils-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.json");
        std::fs::write(&path, r#"{"name": "hi"}"#).unwrap();
        let parsed: Sample = load_config(&path).unwrap();
        assert_eq!(parsed, Sample { name: "hi".into() });
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn loads_toml_by_extension() {
        let dir = std::env::temp_dir().join(format!("conversant-utils-test-toml-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.toml");
        std::fs::write(&path, "name = \"hi\"\n").unwrap();
        let parsed: Sample = load_config(&path).unwrap();
        assert_eq!(parsed, Sample { name: "hi".into() });
        std::fs::remove_file(&path).ok();
    }
}
