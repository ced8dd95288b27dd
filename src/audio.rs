//! Audio output types and PCM encoding.

use std::path::Path;

use crate::error::TtsError;

/// One streamed unit of synthesized audio.
///
/// Samples are mono floats in `[-1.0, 1.0]`. `is_final` marks the last chunk
/// of a session's stream; exactly one chunk per successful non-empty request
/// carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub is_final: bool,
}

impl AudioChunk {
    /// Duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to 16-bit signed PCM: `round(clamp(s, -1, 1) * 32767)`.
    pub fn to_pcm16(&self) -> Vec<i16> {
        f32_to_pcm16(&self.samples)
    }

    /// Convert to 16-bit little-endian PCM bytes, the conventional mono
    /// container layout downstream players consume directly.
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in self.to_pcm16() {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

/// The fully collected result of a synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to 16-bit signed PCM samples.
    pub fn to_pcm16(&self) -> Vec<i16> {
        f32_to_pcm16(&self.samples)
    }

    /// Write the audio to a 16-bit PCM mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), TtsError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for sample in self.to_pcm16() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Encode float samples as 16-bit signed PCM.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect()
}

/// Decode 16-bit signed PCM back to floats in `[-1.0, 1.0]`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32767.0).collect()
}
