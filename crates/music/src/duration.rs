//! Audio-duration probing (`original_source/music/musicinfo.go`
//! `GetAudioDuration`): format-specific parsing via `symphonia` rather than
//! shelling out to `ffprobe`.

use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Probes `path`'s container for its total playback duration. Returns
/// `None` if the file can't be read or has no decodable audio track;
/// the player treats that as "skip to the next track" (original's
/// `goto nextMusic` on a duration error).
pub fn probe_duration(path: &Path) -> Option<Duration> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;
    let track = probed.format.default_track()?;
    let params = &track.codec_params;
    let frames = params.n_frames?;
    let rate = params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(frames as f64 / rate as f64))
}
