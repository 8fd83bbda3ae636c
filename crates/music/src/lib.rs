pub mod duration;
pub mod persistence;
pub mod player;
pub mod track;

pub use persistence::TrackList;
pub use player::{MusicPlayer, MusicPlayerConfig, PlayMode, PlayerEvent};
pub use track::{list_dir, Track};
