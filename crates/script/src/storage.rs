//! `storage`: a flat key/value map persisted to disk and visible, under a
//! single writer lock, to every script run regardless of which pooled
//! engine executes it (spec §4.5 "Storage").

use parking_lot::Mutex;
use rhai::{Dynamic, Map};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ScriptError;

#[derive(Clone)]
pub struct Storage {
    inner: Arc<Mutex<serde_json::Map<String, Value>>>,
    path: Option<PathBuf>,
}

impl Storage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(serde_json::Map::new())),
            path: None,
        }
    }

    /// Load `botdata.storage` from `path` if it exists; start empty otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref().to_path_buf();
        let map = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| ScriptError::Io(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(e) => return Err(ScriptError::Io(e.to_string())),
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(map)),
            path: Some(path),
        })
    }

    /// Best-effort save; a failure here is logged by the caller and the
    /// in-memory state keeps the write so it is retried on the next save.
    pub fn save(&self) -> Result<(), ScriptError> {
        let Some(path) = &self.path else { return Ok(()) };
        let guard = self.inner.lock();
        let text = serde_json::to_string_pretty(&*guard).map_err(|e| ScriptError::Io(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ScriptError::Io(e.to_string()))
    }

    /// Snapshot the whole map as an `rhai::Map` for injection as the
    /// script's `storage` global.
    pub fn snapshot(&self) -> Map {
        let guard = self.inner.lock();
        guard
            .iter()
            .map(|(k, v)| (k.as_str().into(), json_to_dynamic(v)))
            .collect()
    }

    /// Commit a (possibly mutated) snapshot back into the shared map, then
    /// persist it. Called once after a script run completes, still holding
    /// the single-writer invariant since only one script body executes at
    /// a time per pooled engine checkout.
    pub fn commit(&self, map: Map) -> Result<(), ScriptError> {
        {
            let mut guard = self.inner.lock();
            guard.clear();
            for (k, v) in map {
                guard.insert(k.to_string(), dynamic_to_json(v));
            }
        }
        self.save()
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

fn json_to_dynamic(value: &Value) -> Dynamic {
    rhai::serde::to_dynamic(value).unwrap_or(Dynamic::UNIT)
}

fn dynamic_to_json(value: Dynamic) -> Value {
    rhai::serde::from_dynamic(&value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_in_one_snapshot_is_visible_in_the_next() {
        let storage = Storage::new();
        let mut map = storage.snapshot();
        map.insert("count".into(), Dynamic::from(1_i64));
        storage.commit(map).unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(snapshot.get("count").unwrap().as_int().unwrap(), 1);
    }

    #[test]
    fn persists_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botdata.storage");

        let storage = Storage::load(&path).unwrap();
        let mut map = storage.snapshot();
        map.insert("greeting".into(), Dynamic::from("hi".to_string()));
        storage.commit(map).unwrap();

        let reloaded = Storage::load(&path).unwrap();
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.get("greeting").unwrap().clone().into_string().unwrap(), "hi");
    }
}
