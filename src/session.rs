//! Streaming synthesis sessions.
//!
//! A [`Session`] drives one synthesis request through the pipeline
//! incrementally: normalize once up front, then one acoustic-model and
//! vocoder pass per [`next`](Session::next) call, yielding audio chunk by
//! chunk so playback can start before the full text is synthesized.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::audio::{AudioChunk, SynthesisResult};
use crate::engine::{Engine, ResolvedParams, SynthesisParams};
use crate::error::TtsError;
use crate::normalizer::{Normalizer, Utterance};

/// Session lifecycle. `Exhausted`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Exhausted,
    Failed,
    Cancelled,
}

/// Cancels a session from any thread.
///
/// Setting the flag races safely with an in-flight `next()`: cancellation
/// takes effect at the next chunk boundary, never mid-inference.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One synthesis request: `start` once, pull chunks with `next` until
/// end-of-stream. Sessions are never reused; discard and create a fresh one
/// to retry after a failure.
pub struct Session {
    engine: Arc<Engine>,
    state: SessionState,
    queue: VecDeque<Utterance>,
    params: Option<ResolvedParams>,
    rng: Option<StdRng>,
    failure: Option<String>,
    cancelled: Arc<AtomicBool>,
    /// Scratch noise buffer reused across `next()` calls.
    noise: Vec<f32>,
}

impl Session {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            state: SessionState::Idle,
            queue: VecDeque::new(),
            params: None,
            rng: None,
            failure: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            noise: Vec::new(),
        }
    }

    /// Validate parameters, normalize the text and queue its utterances.
    ///
    /// Empty text is not an error: the session goes straight to `Exhausted`
    /// and `next()` reports end-of-stream without any inference. Invalid
    /// parameters leave the session `Idle` so nothing else changes.
    pub fn start(&mut self, text: &str, params: SynthesisParams) -> Result<(), TtsError> {
        if self.state != SessionState::Idle {
            return Err(TtsError::InvalidParameters(format!(
                "session already started (state {:?}); create a new session per request",
                self.state
            )));
        }

        let resolved = params.resolve(self.engine.config(), self.engine.default_locale())?;

        let normalizer = Normalizer::new(self.engine.config(), self.engine.lexicon());
        let utterances = normalizer.utterances(text, &resolved.locale)?;
        self.queue = utterances.collect();

        self.rng = Some(match resolved.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        self.params = Some(resolved);

        self.state = if self.cancelled.load(Ordering::SeqCst) {
            SessionState::Cancelled
        } else if self.queue.is_empty() {
            log::debug!("Request normalized to zero utterances, nothing to synthesize");
            SessionState::Exhausted
        } else {
            log::debug!("Session started with {} queued utterances", self.queue.len());
            SessionState::Active
        };
        Ok(())
    }

    /// Produce the next audio chunk, or `None` at end-of-stream.
    ///
    /// Blocks the calling thread for one inference pass. After a failure the
    /// same error is re-raised on every subsequent call; after cancellation
    /// or exhaustion this returns `None` without touching the models.
    pub fn next(&mut self) -> Result<Option<AudioChunk>, TtsError> {
        match self.state {
            SessionState::Idle => Err(TtsError::InvalidParameters(
                "session not started; call start() first".to_string(),
            )),
            SessionState::Exhausted | SessionState::Cancelled => Ok(None),
            SessionState::Failed => Err(TtsError::Inference(
                self.failure
                    .clone()
                    .unwrap_or_else(|| "session failed".to_string()),
            )),
            SessionState::Active => {
                if self.cancelled.load(Ordering::SeqCst) {
                    self.state = SessionState::Cancelled;
                    return Ok(None);
                }
                match self.synthesize_next() {
                    Ok(chunk) => Ok(Some(chunk)),
                    Err(err) => {
                        // Runtime failures always surface as Inference, even
                        // when the backend raised a wrapped error, and every
                        // later call re-raises the same message.
                        let message = match err {
                            TtsError::Inference(message) => message,
                            other => other.to_string(),
                        };
                        self.failure = Some(message.clone());
                        self.state = SessionState::Failed;
                        Err(TtsError::Inference(message))
                    }
                }
            }
        }
    }

    fn synthesize_next(&mut self) -> Result<AudioChunk, TtsError> {
        // Queue is non-empty while Active, and params/rng are set by start().
        let utterance = self.queue.pop_front().ok_or_else(|| {
            TtsError::Inference("active session with empty utterance queue".to_string())
        })?;
        let params = self
            .params
            .clone()
            .ok_or_else(|| TtsError::Inference("active session without parameters".to_string()))?;

        self.fill_noise(utterance.len())?;

        let frame = self.engine.acoustic().infer(
            &utterance.phoneme_ids,
            params.scales,
            params.speaker,
            &self.noise,
        )?;
        let mut samples = self.engine.vocoder().vocode(&frame)?;
        for sample in &mut samples {
            *sample = sample.clamp(-1.0, 1.0);
        }

        let is_final = self.queue.is_empty();
        if is_final {
            self.state = SessionState::Exhausted;
        }

        log::debug!(
            "Synthesized {} samples ({} utterances remaining)",
            samples.len(),
            self.queue.len()
        );

        Ok(AudioChunk {
            samples,
            sample_rate: self.engine.config().sample_rate,
            is_final,
        })
    }

    fn fill_noise(&mut self, len: usize) -> Result<(), TtsError> {
        let rng = self
            .rng
            .as_mut()
            .ok_or_else(|| TtsError::Inference("active session without rng".to_string()))?;
        self.noise.clear();
        self.noise.reserve(len);
        for _ in 0..len {
            self.noise.push(rng.sample(StandardNormal));
        }
        Ok(())
    }

    /// Cancel the request. Idempotent; later `next()` calls return
    /// end-of-stream without further model computation. Terminal states
    /// other than `Cancelled` are left as they are.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if matches!(self.state, SessionState::Idle | SessionState::Active) {
            self.state = SessionState::Cancelled;
        }
    }

    /// Token for cancelling this session from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pull chunks to completion and collect them into one result.
    pub fn drain(&mut self) -> Result<SynthesisResult, TtsError> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.next()? {
            samples.extend_from_slice(&chunk.samples);
        }
        Ok(SynthesisResult {
            samples,
            sample_rate: self.engine.config().sample_rate,
        })
    }
}
