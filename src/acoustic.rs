//! Acoustic model inference: phoneme ids in, mel frames out.
//!
//! The ONNX backend expects a Piper-style graph: `input` `[1, T]` i64,
//! `input_lengths` `[1]` i64, `scales` `[3]` f32 (`noise_scale`,
//! `length_scale`, `noise_w`), `noise` `[1, T]` f32 latent noise, and an
//! optional `sid` `[1]` i64 for multi-speaker voices. The single output is
//! mel spectrogram `[1, mel_channels, frames]` f32.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array1, Array2, Axis, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::TtsError;

/// Per-request scales fed to the acoustic net, already resolved against the
/// voice defaults. `length_scale` is `1 / speech_rate`.
#[derive(Debug, Clone, Copy)]
pub struct AcousticScales {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
}

/// Mel spectrogram for one utterance: `[channels, frames]`, consumed once
/// by the vocoder.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticFrame {
    mel: Array2<f32>,
}

impl AcousticFrame {
    pub fn new(mel: Array2<f32>) -> Self {
        Self { mel }
    }

    pub fn channels(&self) -> usize {
        self.mel.shape()[0]
    }

    pub fn frames(&self) -> usize {
        self.mel.shape()[1]
    }

    pub fn mel(&self) -> &Array2<f32> {
        &self.mel
    }
}

/// Converts a phoneme id sequence into acoustic features.
///
/// Implementations take `&self` so one model can serve many sessions; the
/// ONNX backend serializes runs internally. `noise` must hold one standard
/// normal draw per input id — passing it in keeps inference deterministic
/// under a caller-owned seed.
pub trait AcousticModel: Send + Sync {
    fn infer(
        &self,
        phoneme_ids: &[i64],
        scales: AcousticScales,
        speaker: Option<i64>,
        noise: &[f32],
    ) -> Result<AcousticFrame, TtsError>;
}

/// ONNX-backed acoustic model.
pub struct OnnxAcousticModel {
    session: Mutex<Session>,
    mel_channels: usize,
    max_input_length: usize,
}

impl OnnxAcousticModel {
    pub fn load(
        onnx_path: &Path,
        mel_channels: usize,
        max_input_length: usize,
        num_threads: Option<usize>,
    ) -> Result<Self, TtsError> {
        log::info!("Loading acoustic model from {}", onnx_path.display());
        let session = init_session(onnx_path, num_threads)?;
        Ok(Self {
            session: Mutex::new(session),
            mel_channels,
            max_input_length,
        })
    }
}

impl AcousticModel for OnnxAcousticModel {
    fn infer(
        &self,
        phoneme_ids: &[i64],
        scales: AcousticScales,
        speaker: Option<i64>,
        noise: &[f32],
    ) -> Result<AcousticFrame, TtsError> {
        let seq_len = phoneme_ids.len();
        if seq_len == 0 {
            return Err(TtsError::Inference("empty phoneme sequence".to_string()));
        }
        if seq_len > self.max_input_length {
            return Err(TtsError::Inference(format!(
                "input length {seq_len} exceeds model context {}",
                self.max_input_length
            )));
        }
        if noise.len() != seq_len {
            return Err(TtsError::Inference(format!(
                "noise length {} does not match input length {seq_len}",
                noise.len()
            )));
        }

        let input = Array2::from_shape_vec((1, seq_len), phoneme_ids.to_vec())?;
        let lengths = ndarray::arr1(&[seq_len as i64]);
        let scale_arr = ndarray::arr1(&[scales.noise_scale, scales.length_scale, scales.noise_w]);
        let noise_arr = Array2::from_shape_vec((1, seq_len), noise.to_vec())?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| TtsError::Inference("acoustic session lock poisoned".to_string()))?;

        let output = if let Some(sid) = speaker {
            let sid_arr: Array1<i64> = ndarray::arr1(&[sid]);
            let inputs = inputs![
                "input" => TensorRef::from_array_view(input.view())?,
                "input_lengths" => TensorRef::from_array_view(lengths.view())?,
                "scales" => TensorRef::from_array_view(scale_arr.view())?,
                "noise" => TensorRef::from_array_view(noise_arr.view())?,
                "sid" => TensorRef::from_array_view(sid_arr.view())?,
            ];
            session.run(inputs)?
        } else {
            let inputs = inputs![
                "input" => TensorRef::from_array_view(input.view())?,
                "input_lengths" => TensorRef::from_array_view(lengths.view())?,
                "scales" => TensorRef::from_array_view(scale_arr.view())?,
                "noise" => TensorRef::from_array_view(noise_arr.view())?,
            ];
            session.run(inputs)?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| TtsError::Inference("acoustic model produced no output".to_string()))?;
        let mel = first_output.1.try_extract_array::<f32>()?;
        let mel = mel.into_dimensionality::<Ix3>()?;

        if mel.shape()[0] != 1 || mel.shape()[1] != self.mel_channels {
            return Err(TtsError::Inference(format!(
                "unexpected mel shape {:?}, expected [1, {}, frames]",
                mel.shape(),
                self.mel_channels
            )));
        }

        Ok(AcousticFrame::new(mel.index_axis(Axis(0), 0).to_owned()))
    }
}

pub(crate) fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
) -> Result<Session, TtsError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}
