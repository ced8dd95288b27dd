//! Vocoder inference: mel frames in, raw waveform out.
//!
//! The ONNX backend expects a graph with a single `mel` input
//! `[1, mel_channels, frames]` f32 and a waveform output whose length is
//! the frame count times the model's fixed upsampling factor.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Axis;
use ort::inputs;
use ort::session::Session;
use ort::value::TensorRef;

use crate::acoustic::{init_session, AcousticFrame};
use crate::error::TtsError;

/// Converts acoustic features into raw audio samples.
pub trait Vocoder: Send + Sync {
    fn vocode(&self, frame: &AcousticFrame) -> Result<Vec<f32>, TtsError>;
}

/// ONNX-backed vocoder.
pub struct OnnxVocoder {
    session: Mutex<Session>,
    mel_channels: usize,
}

impl OnnxVocoder {
    pub fn load(
        onnx_path: &Path,
        mel_channels: usize,
        num_threads: Option<usize>,
    ) -> Result<Self, TtsError> {
        log::info!("Loading vocoder from {}", onnx_path.display());
        let session = init_session(onnx_path, num_threads)?;
        Ok(Self {
            session: Mutex::new(session),
            mel_channels,
        })
    }
}

impl Vocoder for OnnxVocoder {
    fn vocode(&self, frame: &AcousticFrame) -> Result<Vec<f32>, TtsError> {
        if frame.channels() != self.mel_channels {
            return Err(TtsError::Inference(format!(
                "mel frame has {} channels, vocoder expects {}",
                frame.channels(),
                self.mel_channels
            )));
        }
        if frame.frames() == 0 {
            return Ok(Vec::new());
        }

        let mel = frame.mel().view().insert_axis(Axis(0));

        let mut session = self
            .session
            .lock()
            .map_err(|_| TtsError::Inference("vocoder session lock poisoned".to_string()))?;

        let inputs = inputs![
            "mel" => TensorRef::from_array_view(mel)?,
        ];
        let output = session.run(inputs)?;

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| TtsError::Inference("vocoder produced no output".to_string()))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}
