use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TtsError;

/// Pad marker; also the designated unknown-token id unless the map
/// carries an explicit [`UNKNOWN_PHONEME`] entry.
pub const PAD_PHONEME: &str = "_";
/// Begin-of-sequence marker.
pub const BOS_PHONEME: &str = "^";
/// End-of-sequence marker.
pub const EOS_PHONEME: &str = "$";
/// Optional explicit unknown-token entry.
pub const UNKNOWN_PHONEME: &str = "<unk>";
/// Inter-word separator.
pub const WORD_SEPARATOR: &str = " ";

/// Fallback for voices that omit `max_input_length` in their config.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 510;

#[derive(Debug, Clone, Deserialize)]
struct AudioSection {
    sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct InferenceSection {
    length_scale: f32,
    noise_scale: f32,
    noise_w: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct RawVoiceConfig {
    audio: AudioSection,
    mel_channels: usize,
    #[serde(default = "default_num_speakers")]
    num_speakers: usize,
    phoneme_id_map: HashMap<String, i64>,
    inference: InferenceSection,
    #[serde(default)]
    max_input_length: Option<usize>,
}

fn default_num_speakers() -> usize {
    1
}

/// Immutable voice metadata parsed from the voice's JSON config.
///
/// Holds everything the pipeline needs to know about a voice that is not
/// baked into the model weights: output sample rate, acoustic channel
/// width, the phoneme-id vocabulary and the default synthesis scales.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub sample_rate: u32,
    pub mel_channels: usize,
    pub num_speakers: usize,
    pub default_length_scale: f32,
    pub default_noise_scale: f32,
    pub default_noise_w: f32,
    pub max_input_length: usize,
    phoneme_id_map: HashMap<String, i64>,
    pad_id: i64,
    bos_id: i64,
    eos_id: i64,
    unknown_id: i64,
}

impl VoiceConfig {
    /// Parse and validate a voice config from a JSON file.
    pub fn load(config_path: &Path) -> Result<Self, TtsError> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            TtsError::Load(format!(
                "cannot read voice config {}: {e}",
                config_path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a voice config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TtsError> {
        let raw: RawVoiceConfig = serde_json::from_str(json)
            .map_err(|e| TtsError::Config(format!("failed to parse JSON: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawVoiceConfig) -> Result<Self, TtsError> {
        if raw.audio.sample_rate == 0 {
            return Err(TtsError::Config("sample_rate must be > 0".to_string()));
        }
        if raw.mel_channels == 0 {
            return Err(TtsError::Config("mel_channels must be > 0".to_string()));
        }
        if raw.num_speakers == 0 {
            return Err(TtsError::Config("num_speakers must be >= 1".to_string()));
        }
        for (name, value) in [
            ("length_scale", raw.inference.length_scale),
            ("noise_scale", raw.inference.noise_scale),
            ("noise_w", raw.inference.noise_w),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TtsError::Config(format!(
                    "inference.{name} must be a positive number, got {value}"
                )));
            }
        }

        let map = &raw.phoneme_id_map;
        validate_dense_ids(map)?;

        let pad_id = require_special(map, PAD_PHONEME)?;
        let bos_id = require_special(map, BOS_PHONEME)?;
        let eos_id = require_special(map, EOS_PHONEME)?;
        let unknown_id = map.get(UNKNOWN_PHONEME).copied().unwrap_or(pad_id);

        Ok(Self {
            sample_rate: raw.audio.sample_rate,
            mel_channels: raw.mel_channels,
            num_speakers: raw.num_speakers,
            default_length_scale: raw.inference.length_scale,
            default_noise_scale: raw.inference.noise_scale,
            default_noise_w: raw.inference.noise_w,
            max_input_length: raw.max_input_length.unwrap_or(DEFAULT_MAX_INPUT_LENGTH),
            phoneme_id_map: raw.phoneme_id_map,
            pad_id,
            bos_id,
            eos_id,
            unknown_id,
        })
    }

    /// Map a phoneme token to its model id.
    ///
    /// Unknown tokens map to the designated unknown id rather than being
    /// dropped, so output length stays reproducible for diagnostic runs.
    pub fn phoneme_id(&self, phoneme: &str) -> i64 {
        self.phoneme_id_map
            .get(phoneme)
            .copied()
            .unwrap_or(self.unknown_id)
    }

    pub fn vocab_size(&self) -> usize {
        self.phoneme_id_map.len()
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    pub fn bos_id(&self) -> i64 {
        self.bos_id
    }

    pub fn eos_id(&self) -> i64 {
        self.eos_id
    }

    pub fn unknown_id(&self) -> i64 {
        self.unknown_id
    }
}

fn require_special(map: &HashMap<String, i64>, key: &str) -> Result<i64, TtsError> {
    map.get(key)
        .copied()
        .ok_or_else(|| TtsError::Config(format!("phoneme_id_map is missing the {key:?} entry")))
}

/// Ids must be dense 0..N-1: the acoustic model's embedding table is indexed
/// directly by id, so gaps or duplicates mean a broken export.
fn validate_dense_ids(map: &HashMap<String, i64>) -> Result<(), TtsError> {
    let mut ids: Vec<i64> = map.values().copied().collect();
    ids.sort_unstable();
    for (expected, &id) in ids.iter().enumerate() {
        if id != expected as i64 {
            return Err(TtsError::Config(format!(
                "phoneme ids must be dense 0..{}, found {id} at rank {expected}",
                map.len().saturating_sub(1)
            )));
        }
    }
    Ok(())
}

/// Minimal valid voice config shared by unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_config_json() -> String {
    r#"{
        "audio": { "sample_rate": 22050 },
        "mel_channels": 80,
        "num_speakers": 2,
        "phoneme_id_map": {
            "_": 0, "^": 1, "$": 2, " ": 3,
            "a": 4, "b": 5, "h": 6, "l": 7, "o": 8, "w": 9, "r": 10, "d": 11
        },
        "inference": { "length_scale": 1.0, "noise_scale": 0.667, "noise_w": 0.8 }
    }"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_config() {
        let config = VoiceConfig::from_json(&test_config_json()).unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.mel_channels, 80);
        assert_eq!(config.num_speakers, 2);
        assert_eq!(config.max_input_length, DEFAULT_MAX_INPUT_LENGTH);
        assert_eq!(config.phoneme_id(" "), 3);
        assert_eq!(config.pad_id(), 0);
        assert_eq!(config.bos_id(), 1);
        assert_eq!(config.eos_id(), 2);
    }

    #[test]
    fn unknown_phoneme_maps_to_unknown_id_not_dropped() {
        let config = VoiceConfig::from_json(&test_config_json()).unwrap();
        assert_eq!(config.phoneme_id("ʒ"), config.unknown_id());
        assert_eq!(config.unknown_id(), config.pad_id());
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let json = test_config_json().replace("22050", "0");
        let err = VoiceConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, TtsError::Config(_)));
    }

    #[test]
    fn rejects_missing_bos_marker() {
        let json = test_config_json().replace(r#""^": 1,"#, r#""x": 1,"#);
        let err = VoiceConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, TtsError::Config(m) if m.contains("\"^\"")));
    }

    #[test]
    fn rejects_non_dense_ids() {
        let json = test_config_json().replace(r#""d": 11"#, r#""d": 40"#);
        let err = VoiceConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, TtsError::Config(m) if m.contains("dense")));
    }

    #[test]
    fn rejects_negative_noise_scale() {
        let json = test_config_json().replace("0.667", "-0.5");
        let err = VoiceConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, TtsError::Config(m) if m.contains("noise_scale")));
    }
}
