//! # larynx
//!
//! Offline streaming text-to-speech synthesis with ONNX voices.
//!
//! ## Features
//!
//! - **Streaming synthesis**: pull audio chunk by chunk so long text starts
//!   playing before synthesis finishes
//! - **Local inference**: acoustic model and vocoder run on-device via ONNX
//!   Runtime, no network required
//! - **Deterministic when seeded**: a per-session noise source makes output
//!   reproducible for a fixed seed
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! larynx = "0.3"
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use larynx::{Engine, SynthesisParams};
//!
//! let engine = Engine::load(
//!     Path::new("voices/ljspeech"),
//!     Path::new("voices/ljspeech/voice.json"),
//!     Path::new("voices/lexicon"),
//! )?;
//!
//! let mut session = engine.new_session();
//! session.start("Hello, world!", SynthesisParams::default())?;
//! while let Some(chunk) = session.next()? {
//!     play(&chunk.to_pcm16_bytes(), chunk.sample_rate);
//! }
//! # Ok::<(), larynx::TtsError>(())
//! ```
//!
//! One [`Engine`] loads a voice once and is shared read-only across any
//! number of concurrent [`Session`]s; each session synthesizes exactly one
//! request.

pub mod acoustic;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod normalizer;
pub mod session;
pub mod vocoder;

pub use acoustic::{AcousticFrame, AcousticModel, AcousticScales};
pub use audio::{f32_to_pcm16, pcm16_to_f32, AudioChunk, SynthesisResult};
pub use config::VoiceConfig;
pub use engine::{Engine, EngineOptions, SynthesisParams, SynthesisParamsBuilder};
pub use error::TtsError;
pub use lexicon::LexiconBundle;
pub use normalizer::{Normalizer, Utterance};
pub use session::{CancelToken, Session, SessionState};
pub use vocoder::Vocoder;
