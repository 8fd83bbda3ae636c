//! `history.txt`/`favorite.txt`: bounded, most-recent-first JSON arrays of
//! [`Track`] (spec §6). Write failures are logged and non-fatal (spec §7
//! "Persistence failure"): the in-memory list stays authoritative and the
//! next successful write catches up.

use crate::track::Track;
use std::path::{Path, PathBuf};

const MAX_ENTRIES: usize = 200;

pub struct TrackList {
    path: PathBuf,
    entries: Vec<Track>,
}

impl TrackList {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn entries(&self) -> &[Track] {
        &self.entries
    }

    /// Inserts at the front, deduplicating by (path, name); caps at
    /// [`MAX_ENTRIES`]. Persists immediately.
    pub fn push_front(&mut self, track: Track) {
        self.entries.retain(|t| !(t.path == track.path && t.name == track.name));
        self.entries.insert(0, track);
        self.entries.truncate(MAX_ENTRIES);
        self.persist();
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.entries.iter().any(|t| t.path == track.path && t.name == track.name)
    }

    pub fn remove(&mut self, track: &Track) {
        self.entries.retain(|t| !(t.path == track.path && t.name == track.name));
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_vec_pretty(&self.entries) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&self.path, &bytes) {
                    tracing::warn!(error = %e, path = %self.path.display(), "failed to persist track list");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize track list"),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Track {
        Track { name: name.into(), path: "".into(), is_dir: false, is_fav: false }
    }

    #[test]
    fn push_front_dedupes_and_orders_most_recent_first() {
        let dir = std::env::temp_dir().join(format!("conversant-music-hist-{}", std::process::id()));
        let path = dir.join("history.txt");
        let mut list = TrackList::load(&path);
        list.push_front(track("a.mp3"));
        list.push_front(track("b.mp3"));
        list.push_front(track("a.mp3"));
        assert_eq!(list.entries().len(), 2);
        assert_eq!(list.entries()[0].name, "a.mp3");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn persisted_list_round_trips() {
        let dir = std::env::temp_dir().join(format!("conversant-music-hist2-{}", std::process::id()));
        let path = dir.join("favorite.txt");
        let mut list = TrackList::load(&path);
        list.push_front(track("song.mp3"));
        let reloaded = TrackList::load(&path);
        assert_eq!(reloaded.entries().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
