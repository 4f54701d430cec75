//! User preference record.
//!
//! # Invariants
//! - Settings are replaced as a whole; there is no per-field patch API.
//! - `music_volume` stays within `0..=100`.

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_MUSIC_VOLUME: u8 = 50;
pub const MAX_MUSIC_VOLUME: u8 = 100;
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// Flat preference record persisted with the event state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub voice_enabled: bool,
    pub notifications_enabled: bool,
    pub particles_enabled: bool,
    #[serde(deserialize_with = "deserialize_volume")]
    pub music_volume: u8,
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voice_enabled: false,
            notifications_enabled: false,
            particles_enabled: true,
            music_volume: DEFAULT_MUSIC_VOLUME,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Settings {
    /// Returns a copy with out-of-range values pulled back into bounds.
    pub fn normalized(mut self) -> Self {
        self.music_volume = self.music_volume.min(MAX_MUSIC_VOLUME);
        if self.timezone.trim().is_empty() {
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }
        self
    }
}

// Older blobs store the slider value as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum VolumeRepr {
    Number(f64),
    Text(String),
}

fn deserialize_volume<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match VolumeRepr::deserialize(deserializer)? {
        VolumeRepr::Number(value) => value,
        VolumeRepr::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid musicVolume `{text}`")))?,
    };
    if raw.is_nan() {
        return Ok(DEFAULT_MUSIC_VOLUME);
    }
    // Clamped before the cast, so the value always fits.
    Ok(raw.round().clamp(0.0, f64::from(MAX_MUSIC_VOLUME)) as u8)
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "voiceEnabled": true })).unwrap();
        assert!(settings.voice_enabled);
        assert!(settings.particles_enabled);
        assert_eq!(settings.music_volume, 50);
        assert_eq!(settings.timezone, "Asia/Shanghai");
    }

    #[test]
    fn volume_accepts_text_and_clamps() {
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "musicVolume": "75" })).unwrap();
        assert_eq!(settings.music_volume, 75);

        let loud: Settings =
            serde_json::from_value(serde_json::json!({ "musicVolume": 400 })).unwrap();
        assert_eq!(loud.music_volume, 100);
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["notificationsEnabled"], false);
        assert_eq!(json["musicVolume"], 50);
    }
}
