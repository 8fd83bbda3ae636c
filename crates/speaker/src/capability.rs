//! Per-hardware-model siid/piid table (`original_source/xiaomi.go`'s
//! `HardwareCommandDict`): different speaker models expose the same
//! logical actions (TTS, generic action, wake, playback state) under
//! different MIoT service/property indices.

use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct DeviceCapabilities {
    pub tts: (i32, i32),
    pub player_action: (i32, i32),
    pub wake: (i32, i32),
    pub play_state: (i32, i32),
}

const DEFAULT: DeviceCapabilities =
    DeviceCapabilities { tts: (5, 1), player_action: (5, 4), wake: (5, 3), play_state: (2, 2) };

fn table() -> &'static HashMap<&'static str, DeviceCapabilities> {
    static TABLE: OnceLock<HashMap<&'static str, DeviceCapabilities>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        // xiaomi.wifispeaker.lx04 "小爱音箱 Pro"
        m.insert("lx04", DeviceCapabilities { tts: (5, 1), player_action: (5, 4), wake: (5, 3), play_state: (2, 2) });
        // xiaomi.wifispeaker.lx5a "小爱音箱Play 增强版"
        m.insert("lx5a", DeviceCapabilities { tts: (5, 3), player_action: (5, 1), wake: (5, 2), play_state: (3, 1) });
        // xiaomi.wifispeaker.l09a "小米AI音箱"
        m.insert("l09a", DEFAULT);
        m
    })
}

/// Looks up the capability row for `hardware` (the device model suffix
/// reported by the device list, e.g. `"LX04"`), case-insensitively.
/// Unknown hardware logs a warning and falls back to the most common
/// siid/piid pairing rather than failing outright.
pub fn capabilities_for(hardware: &str) -> DeviceCapabilities {
    let key = hardware.to_lowercase();
    match table().get(key.as_str()) {
        Some(caps) => *caps,
        None => {
            tracing::warn!(hardware = %hardware, "no capability table entry, using default siid/piid pairing");
            DEFAULT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hardware_is_case_insensitive() {
        let a = capabilities_for("lx04");
        let b = capabilities_for("LX04");
        assert_eq!(a.tts, b.tts);
    }

    #[test]
    fn unknown_hardware_falls_back_to_default() {
        let caps = capabilities_for("totally-unknown-model");
        assert_eq!(caps.tts, DEFAULT.tts);
    }
}
