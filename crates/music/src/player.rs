//! The run loop driving the Speaker Client through a playlist
//! (`original_source/music/playmusic.go`'s `Play`): sequential, shuffle,
//! and repeat modes, advancing on the probed track duration or an
//! explicit skip/stop, publishing now-playing events for whatever
//! transport the binary wires up (spec §4.8).

use crate::duration::probe_duration;
use crate::persistence::TrackList;
use crate::track::{list_dir, Track};
use conversant_speaker::SpeakerClient;
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Sequential,
    RepeatOne,
    RepeatAll,
    Shuffle,
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    NowPlaying(Track),
    Stopped,
    /// `"-end-"` in the original: the playlist ran out in a non-repeating
    /// mode.
    PlaylistExhausted,
}

#[derive(Debug)]
enum Command {
    Play { dir: String, mode: PlayMode },
    Skip { forward: bool },
    Stop,
}

#[derive(Default)]
struct PlayerState {
    playlist: Vec<Track>,
    current_index: usize,
    mode: PlayMode,
}

pub struct MusicPlayerConfig {
    pub music_root: PathBuf,
    /// Base URL the speaker can fetch tracks from, e.g.
    /// `http://192.168.1.5:8090/music` (the binary serves `music_root`
    /// under this prefix; spec §4.8 "small embedded static file HTTP
    /// range-request handler").
    pub server_base_url: String,
    pub history_path: PathBuf,
    pub favorite_path: PathBuf,
}

pub struct MusicPlayer {
    state: Arc<Mutex<PlayerState>>,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PlayerEvent>,
    favorites: Arc<Mutex<TrackList>>,
}

impl MusicPlayer {
    pub fn start(speaker: Arc<dyn SpeakerClient>, config: MusicPlayerConfig) -> Self {
        let state = Arc::new(Mutex::new(PlayerState::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(32);
        let history = Arc::new(Mutex::new(TrackList::load(&config.history_path)));
        let favorites = Arc::new(Mutex::new(TrackList::load(&config.favorite_path)));

        tokio::spawn(run_loop(speaker, config, state.clone(), rx, events_tx.clone(), history));

        Self { state, commands: tx, events: events_tx, favorites }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn play(&self, dir: impl Into<String>, mode: PlayMode) {
        let _ = self.commands.send(Command::Play { dir: dir.into(), mode });
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn skip(&self, forward: bool) {
        let _ = self.commands.send(Command::Skip { forward });
    }

    pub fn now_playing(&self) -> Option<Track> {
        let state = self.state.lock();
        state.playlist.get(state.current_index).cloned()
    }

    pub fn favorite(&self, track: Track) {
        let mut favorites = self.favorites.lock();
        if !favorites.contains(&track) {
            favorites.push_front(track);
        }
    }

    pub fn unfavorite(&self, track: &Track) {
        self.favorites.lock().remove(track);
    }

    pub fn favorites_snapshot(&self) -> Vec<Track> {
        self.favorites.lock().entries().to_vec()
    }
}

async fn run_loop(
    speaker: Arc<dyn SpeakerClient>,
    config: MusicPlayerConfig,
    state: Arc<Mutex<PlayerState>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<PlayerEvent>,
    history: Arc<Mutex<TrackList>>,
) {
    // `skip_tx` lets an in-flight track's wait be interrupted; recreated
    // per `Play` so a stale skip signal from a finished playlist can't
    // leak into the next one.
    let mut skip_tx: Option<mpsc::Sender<bool>> = None;
    let mut stop_tx: Option<mpsc::Sender<()>> = None;

    loop {
        match commands.recv().await {
            None => return,
            Some(Command::Stop) => {
                if let Some(tx) = stop_tx.take() {
                    let _ = tx.send(()).await;
                }
                let _ = speaker.stop_player().await;
                let _ = events.send(PlayerEvent::Stopped);
            }
            Some(Command::Skip { forward }) => {
                if let Some(tx) = &skip_tx {
                    let _ = tx.send(forward).await;
                }
            }
            Some(Command::Play { dir, mode }) => {
                if let Some(tx) = stop_tx.take() {
                    let _ = tx.send(()).await;
                }
                let playlist = match list_dir(&config.music_root, &dir) {
                    Ok(entries) => entries.into_iter().filter(|t| !t.is_dir).collect::<Vec<_>>(),
                    Err(e) => {
                        tracing::warn!(error = %e, dir, "failed to list music directory");
                        continue;
                    }
                };
                if playlist.is_empty() {
                    continue;
                }

                {
                    let mut s = state.lock();
                    s.playlist = playlist;
                    s.current_index = 0;
                    s.mode = mode;
                }

                let (new_skip_tx, skip_rx) = mpsc::channel(1);
                let (new_stop_tx, stop_rx) = mpsc::channel(1);
                skip_tx = Some(new_skip_tx);
                stop_tx = Some(new_stop_tx);

                tokio::spawn(playback_task(
                    speaker.clone(),
                    config.music_root.clone(),
                    config.server_base_url.clone(),
                    state.clone(),
                    events.clone(),
                    history.clone(),
                    skip_rx,
                    stop_rx,
                ));
            }
        }
    }
}

async fn playback_task(
    speaker: Arc<dyn SpeakerClient>,
    music_root: PathBuf,
    base_url: String,
    state: Arc<Mutex<PlayerState>>,
    events: broadcast::Sender<PlayerEvent>,
    history: Arc<Mutex<TrackList>>,
    mut skip_rx: mpsc::Receiver<bool>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        let (track, mode) = {
            let s = state.lock();
            match s.playlist.get(s.current_index).cloned() {
                Some(t) => (t, s.mode),
                None => break,
            }
        };

        history.lock().push_front(track.clone());
        let _ = events.send(PlayerEvent::NowPlaying(track.clone()));

        let full_path = track.full_path(&music_root);
        let duration = probe_duration(&full_path).unwrap_or(Duration::from_secs(180));
        let url = build_url(&base_url, &track);

        if speaker.play_music_url(&url).await.is_err() {
            tracing::warn!(track = %track.name, "failed to start playback, skipping");
            if !advance(&state, mode, true) {
                break;
            }
            continue;
        }

        tokio::select! {
            _ = stop_rx.recv() => return,
            forward = skip_rx.recv() => {
                let forward = forward.unwrap_or(true);
                if !advance(&state, mode, forward) {
                    break;
                }
            }
            _ = tokio::time::sleep(duration) => {
                if !advance(&state, mode, true) {
                    break;
                }
            }
        }
    }

    let _ = events.send(PlayerEvent::PlaylistExhausted);
}

/// Moves `current_index` per `mode`; returns `false` when the playback
/// loop should exit (non-repeating mode ran off the end of the list).
fn advance(state: &Arc<Mutex<PlayerState>>, mode: PlayMode, forward: bool) -> bool {
    let mut s = state.lock();
    let total = s.playlist.len();
    if total == 0 {
        return false;
    }
    match mode {
        PlayMode::RepeatOne => true,
        PlayMode::Sequential => {
            if forward {
                s.current_index += 1;
            } else if s.current_index == 0 {
                s.current_index = total - 1;
            } else {
                s.current_index -= 1;
            }
            s.current_index < total
        }
        PlayMode::RepeatAll => {
            if forward {
                s.current_index = (s.current_index + 1) % total;
            } else {
                s.current_index = (s.current_index + total - 1) % total;
            }
            true
        }
        PlayMode::Shuffle => {
            if total <= 1 {
                return false;
            }
            let mut rng = rand::thread_rng();
            s.current_index = rng.gen_range(0..total);
            true
        }
    }
}

fn build_url(base_url: &str, track: &Track) -> String {
    let base = base_url.trim_end_matches('/');
    let mut parts: Vec<&str> = Vec::new();
    if !track.path.is_empty() {
        parts.push(track.path.trim_matches('/'));
    }
    parts.push(&track.name);
    format!("{base}/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, path: &str) -> Track {
        Track { name: name.into(), path: path.into(), is_dir: false, is_fav: false }
    }

    #[test]
    fn build_url_joins_base_path_and_name() {
        let url = build_url("http://host:8090/music/", &track("song.mp3", "albums/foo"));
        assert_eq!(url, "http://host:8090/music/albums/foo/song.mp3");
    }

    #[test]
    fn build_url_handles_root_level_tracks() {
        let url = build_url("http://host:8090/music", &track("song.mp3", ""));
        assert_eq!(url, "http://host:8090/music/song.mp3");
    }

    #[test]
    fn sequential_mode_stops_at_playlist_end() {
        let state = Arc::new(Mutex::new(PlayerState {
            playlist: vec![track("a", ""), track("b", "")],
            current_index: 1,
            mode: PlayMode::Sequential,
        }));
        assert!(!advance(&state, PlayMode::Sequential, true));
    }

    #[test]
    fn repeat_all_wraps_around() {
        let state = Arc::new(Mutex::new(PlayerState {
            playlist: vec![track("a", ""), track("b", "")],
            current_index: 1,
            mode: PlayMode::RepeatAll,
        }));
        assert!(advance(&state, PlayMode::RepeatAll, true));
        assert_eq!(state.lock().current_index, 0);
    }

    #[test]
    fn repeat_one_never_advances_index() {
        let state = Arc::new(Mutex::new(PlayerState {
            playlist: vec![track("a", "")],
            current_index: 0,
            mode: PlayMode::RepeatOne,
        }));
        assert!(advance(&state, PlayMode::RepeatOne, true));
        assert_eq!(state.lock().current_index, 0);
    }
}
