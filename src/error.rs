/// Errors produced by voice loading, normalization and synthesis.
///
/// The variants fall into four categories with distinct recovery stories:
/// `Load`/`Config` are fatal to engine construction, `ResourceMissing` is
/// fatal to normalization, `InvalidParameters` is recoverable by retrying
/// `start` with corrected options, and `Inference` marks a session as failed
/// until it is discarded.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("failed to load voice: {0}")]
    Load(String),
    #[error("invalid voice config: {0}")]
    Config(String),
    #[error("phonetic resource missing: {0}")]
    ResourceMissing(String),
    #[error("invalid synthesis parameters: {0}")]
    InvalidParameters(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}
