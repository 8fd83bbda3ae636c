//! `Track` and local directory listing (`original_source/music/filelist.go`
//! `FileItem`): the music player's view of the configured local audio
//! directory tree.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "mp4", "ogg", "aac"];

/// One file or directory under the configured music root, as persisted
/// in `history.txt`/`favorite.txt` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    /// Path relative to the music root, directory portion only (the
    /// original's `FileItem.Path`); `name` is the leaf.
    pub path: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    #[serde(rename = "isFav")]
    #[serde(default)]
    pub is_fav: bool,
}

impl Track {
    /// Absolute filesystem path under `root`.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path).join(&self.name)
    }

    fn is_audio_file(entry_name: &str) -> bool {
        Path::new(entry_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Lists `dir` (relative to `root`) non-recursively: subdirectories first,
/// then playable audio files, both alphabetical. Non-audio files are
/// skipped entirely, matching the original lister's filter.
pub fn list_dir(root: &Path, dir: &str) -> std::io::Result<Vec<Track>> {
    let abs = if dir.is_empty() { root.to_path_buf() } else { root.join(dir) };
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(&abs)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name().to_string_lossy().to_string();
        if file_type.is_dir() {
            dirs.push(Track { name, path: dir.to_string(), is_dir: true, is_fav: false });
        } else if Track::is_audio_file(&name) {
            files.push(Track { name, path: dir.to_string(), is_dir: false, is_fav: false });
        }
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.extend(files);
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_subdirs_before_files_alphabetically() {
        let dir = std::env::temp_dir().join(format!("conversant-music-test-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("zzz_subdir")).unwrap();
        std::fs::write(dir.join("a.mp3"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();

        let tracks = list_dir(&dir, "").unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_dir);
        assert_eq!(tracks[0].name, "zzz_subdir");
        assert!(!tracks[1].is_dir);
        assert_eq!(tracks[1].name, "a.mp3");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn full_path_joins_root_dir_and_name() {
        let track = Track { name: "song.mp3".into(), path: "albums/foo".into(), is_dir: false, is_fav: false };
        let full = track.full_path(Path::new("/music"));
        assert_eq!(full, Path::new("/music/albums/foo/song.mp3"));
    }
}
