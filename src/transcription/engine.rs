//! # Transcription Engine
//!
//! The `Transcriber` trait is the seam between the request pipeline and the
//! speech-to-text machinery. The composition root decides which
//! implementation a process runs with; nothing downstream knows or cares
//! which one it got.
//!
//! ## Implementations:
//! - **WhisperTranscriber**: real inference with a Candle Whisper model,
//!   loaded once per process and shared across requests
//! - **FixedTranscriber**: constant output for the testing profile and unit
//!   tests, so the pipeline is exercisable without the model download

use crate::config::ModelsConfig;
use crate::device;
use crate::error::{AppError, AppResult};
use crate::transcription::audio;
use crate::transcription::model::{ModelSize, WhisperModel};
use anyhow::Result;
use std::path::Path;
use std::sync::Mutex;

/// Placeholder transcript produced by [`FixedTranscriber::default`].
pub const FIXED_TRANSCRIPT: &str = "This is a test transcription";

/// A speech-to-text capability: file path in, transcript out.
///
/// ## Contract:
/// - A path that does not reference an existing file fails with a
///   not-found error
/// - Each call transcribes one file independently; no retry, no timeout,
///   no batching
/// - Implementations are shared across request handlers and must be safe
///   to call from multiple threads
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> AppResult<String>;

    /// Human-readable engine name for logs and diagnostics.
    fn name(&self) -> &str;
}

/// The real engine: a Whisper model behind a lock.
///
/// ## Concurrency:
/// The Candle forward pass mutates decoder state and is not reentrant, so
/// calls take an exclusive lock and concurrent requests transcribe one at
/// a time. Callers run `transcribe` on the blocking pool; a slow inference
/// occupies one blocking thread, not the async executor.
pub struct WhisperTranscriber {
    model: Mutex<WhisperModel>,
    language: String,
    name: String,
}

impl WhisperTranscriber {
    /// Load the configured model once; reused for every request thereafter.
    pub async fn load(models: &ModelsConfig) -> Result<Self> {
        let size: ModelSize = models.whisper_model.parse()?;
        let preference = models.device.parse().unwrap_or_default();
        let device = device::select_device(preference);

        let model = WhisperModel::load(size, device).await?;

        Ok(Self {
            model: Mutex::new(model),
            language: models.language.clone(),
            name: format!("whisper-{}", size),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio_path: &Path) -> AppResult<String> {
        if !audio_path.exists() {
            return Err(AppError::NotFound(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        let samples = audio::load_mono_16k(audio_path)?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| AppError::Internal("Transcription model lock poisoned".to_string()))?;

        let text = model.transcribe(&samples, Some(&self.language))?;
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fixed-output engine for tests and the `testing` profile.
///
/// Keeps the same contract as the real engine (missing path is still an
/// error) so pipeline behavior does not diverge between profiles.
pub struct FixedTranscriber {
    text: String,
}

impl FixedTranscriber {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for FixedTranscriber {
    fn default() -> Self {
        Self::new(FIXED_TRANSCRIPT)
    }
}

impl Transcriber for FixedTranscriber {
    fn transcribe(&self, audio_path: &Path) -> AppResult<String> {
        if !audio_path.exists() {
            return Err(AppError::NotFound(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
