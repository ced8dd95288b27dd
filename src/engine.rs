//! Engine construction and synthesis parameters.

use std::path::Path;
use std::sync::Arc;

use derive_builder::Builder;

use crate::acoustic::{AcousticModel, AcousticScales, OnnxAcousticModel};
use crate::config::VoiceConfig;
use crate::error::TtsError;
use crate::lexicon::LexiconBundle;
use crate::session::Session;
use crate::vocoder::{OnnxVocoder, Vocoder};

/// File name of the acoustic network inside the model directory.
const ACOUSTIC_MODEL_FILE: &str = "acoustic.onnx";
/// File name of the vocoder network inside the model directory.
const VOCODER_MODEL_FILE: &str = "vocoder.onnx";

/// Options for engine construction.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// CPU threads per ONNX session. `None` uses the runtime default.
    pub num_threads: Option<usize>,
}

/// Per-request synthesis options. Unset fields fall back to the voice
/// config's defaults when the session starts.
///
/// Build directly or via [`SynthesisParamsBuilder`]:
///
/// ```
/// use larynx::SynthesisParamsBuilder;
///
/// let params = SynthesisParamsBuilder::default()
///     .speech_rate(Some(1.2))
///     .seed(Some(42))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(default)]
pub struct SynthesisParams {
    /// Speech rate multiplier; frame durations scale by `1 / rate`.
    pub speech_rate: Option<f32>,
    /// Latent noise scale for naturalness variation.
    pub noise_scale: Option<f32>,
    /// Duration noise width.
    pub noise_w: Option<f32>,
    /// Speaker id for multi-speaker voices.
    pub speaker: Option<i64>,
    /// Lexicon locale; defaults to the engine's default locale.
    pub locale: Option<String>,
    /// Seed for the session's noise source. Unset draws from entropy, so
    /// repeated requests vary; set it for reproducible output.
    pub seed: Option<u64>,
}

/// Parameters after validation against a voice config.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedParams {
    pub scales: AcousticScales,
    pub speaker: Option<i64>,
    pub locale: String,
    pub seed: Option<u64>,
}

impl SynthesisParams {
    /// Validate and fill defaults from the voice config.
    pub(crate) fn resolve(
        &self,
        config: &VoiceConfig,
        default_locale: &str,
    ) -> Result<ResolvedParams, TtsError> {
        let speech_rate = self.speech_rate.unwrap_or(1.0);
        if !speech_rate.is_finite() || speech_rate <= 0.0 {
            return Err(TtsError::InvalidParameters(format!(
                "speech_rate must be > 0, got {speech_rate}"
            )));
        }

        let noise_scale = self.noise_scale.unwrap_or(config.default_noise_scale);
        let noise_w = self.noise_w.unwrap_or(config.default_noise_w);
        for (name, value) in [("noise_scale", noise_scale), ("noise_w", noise_w)] {
            if !value.is_finite() || value < 0.0 {
                return Err(TtsError::InvalidParameters(format!(
                    "{name} must be >= 0, got {value}"
                )));
            }
        }

        let speaker = match self.speaker {
            Some(id) if id < 0 || id as usize >= config.num_speakers => {
                return Err(TtsError::InvalidParameters(format!(
                    "speaker id {id} out of range for a voice with {} speakers",
                    config.num_speakers
                )));
            }
            Some(id) => Some(id),
            None if config.num_speakers > 1 => Some(0),
            None => None,
        };

        Ok(ResolvedParams {
            scales: AcousticScales {
                noise_scale,
                length_scale: config.default_length_scale / speech_rate,
                noise_w,
            },
            speaker,
            locale: self
                .locale
                .clone()
                .unwrap_or_else(|| default_locale.to_string()),
            seed: self.seed,
        })
    }
}

/// A loaded voice: model weights, vocabulary, lexicon and defaults.
///
/// Immutable once constructed and safe to share read-only across threads;
/// wrap it in an [`Arc`] and spawn a [`Session`] per request. The engine
/// must outlive every session created from it, which the `Arc` handed to
/// each session guarantees. Native resources are released when the last
/// reference drops.
pub struct Engine {
    config: VoiceConfig,
    lexicon: LexiconBundle,
    acoustic: Box<dyn AcousticModel>,
    vocoder: Box<dyn Vocoder>,
    default_locale: String,
}

impl Engine {
    /// Load a voice with default options.
    ///
    /// `model_dir` must contain `acoustic.onnx` and `vocoder.onnx`;
    /// `config_path` is the voice's JSON metadata; `lexicon_dir` is the
    /// phonetic bundle directory.
    pub fn load(
        model_dir: &Path,
        config_path: &Path,
        lexicon_dir: &Path,
    ) -> Result<Arc<Self>, TtsError> {
        Self::load_with_options(model_dir, config_path, lexicon_dir, EngineOptions::default())
    }

    /// Load a voice with explicit options.
    pub fn load_with_options(
        model_dir: &Path,
        config_path: &Path,
        lexicon_dir: &Path,
        options: EngineOptions,
    ) -> Result<Arc<Self>, TtsError> {
        let config = VoiceConfig::load(config_path)?;
        let lexicon = LexiconBundle::load(lexicon_dir)?;

        let acoustic_path = model_file(model_dir, ACOUSTIC_MODEL_FILE)?;
        let vocoder_path = model_file(model_dir, VOCODER_MODEL_FILE)?;

        let acoustic = OnnxAcousticModel::load(
            &acoustic_path,
            config.mel_channels,
            config.max_input_length,
            options.num_threads,
        )?;
        let vocoder = OnnxVocoder::load(&vocoder_path, config.mel_channels, options.num_threads)?;

        let engine = Self::from_parts(config, lexicon, Box::new(acoustic), Box::new(vocoder));
        log::info!(
            "Voice loaded: {} Hz, {} speakers, locales {:?}",
            engine.config.sample_rate,
            engine.config.num_speakers,
            engine.lexicon.locale_names()
        );
        Ok(Arc::new(engine))
    }

    pub(crate) fn from_parts(
        config: VoiceConfig,
        lexicon: LexiconBundle,
        acoustic: Box<dyn AcousticModel>,
        vocoder: Box<dyn Vocoder>,
    ) -> Self {
        let default_locale = if lexicon.has_locale("en") {
            "en".to_string()
        } else {
            lexicon
                .locale_names()
                .first()
                .map(|s| s.to_string())
                .unwrap_or_default()
        };
        Self {
            config,
            lexicon,
            acoustic,
            vocoder,
            default_locale,
        }
    }

    /// Create a session for one synthesis request.
    pub fn new_session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// The loaded voice's metadata.
    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// The loaded phonetic bundle.
    pub fn lexicon(&self) -> &LexiconBundle {
        &self.lexicon
    }

    /// Locale used when a request does not name one.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub(crate) fn acoustic(&self) -> &dyn AcousticModel {
        self.acoustic.as_ref()
    }

    pub(crate) fn vocoder(&self) -> &dyn Vocoder {
        self.vocoder.as_ref()
    }
}

fn model_file(model_dir: &Path, name: &str) -> Result<std::path::PathBuf, TtsError> {
    let path = model_dir.join(name);
    if !path.exists() {
        return Err(TtsError::Load(format!(
            "{name} not found in {}",
            model_dir.display()
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_json;

    fn config() -> VoiceConfig {
        VoiceConfig::from_json(&test_config_json()).unwrap()
    }

    #[test]
    fn defaults_come_from_voice_config() {
        let config = config();
        let resolved = SynthesisParams::default().resolve(&config, "en").unwrap();
        assert_eq!(resolved.scales.noise_scale, config.default_noise_scale);
        assert_eq!(resolved.scales.noise_w, config.default_noise_w);
        assert_eq!(resolved.scales.length_scale, config.default_length_scale);
        assert_eq!(resolved.locale, "en");
        // Two-speaker test voice: default speaker is 0.
        assert_eq!(resolved.speaker, Some(0));
    }

    #[test]
    fn speech_rate_inverts_into_length_scale() {
        let config = config();
        let params = SynthesisParamsBuilder::default()
            .speech_rate(Some(2.0))
            .build()
            .unwrap();
        let resolved = params.resolve(&config, "en").unwrap();
        assert_eq!(resolved.scales.length_scale, 0.5);
    }

    #[test]
    fn negative_speech_rate_is_invalid() {
        let params = SynthesisParams {
            speech_rate: Some(-1.0),
            ..Default::default()
        };
        let err = params.resolve(&config(), "en").unwrap_err();
        assert!(matches!(err, TtsError::InvalidParameters(_)));
    }

    #[test]
    fn negative_noise_scale_is_invalid() {
        let params = SynthesisParams {
            noise_scale: Some(-0.1),
            ..Default::default()
        };
        assert!(matches!(
            params.resolve(&config(), "en"),
            Err(TtsError::InvalidParameters(_))
        ));
    }

    #[test]
    fn speaker_id_must_be_in_range() {
        let params = SynthesisParams {
            speaker: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            params.resolve(&config(), "en"),
            Err(TtsError::InvalidParameters(_))
        ));

        let params = SynthesisParams {
            speaker: Some(1),
            ..Default::default()
        };
        assert_eq!(params.resolve(&config(), "en").unwrap().speaker, Some(1));
    }
}
