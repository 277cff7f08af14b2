//! # Transcription Module
//!
//! Speech-to-text over uploaded audio files using Whisper models via the
//! Candle-rs framework (pure Rust, no FFI bindings to whisper.cpp).
//!
//! ## Key Components:
//! - **Transcriber trait**: the seam the request pipeline depends on
//! - **WhisperTranscriber**: the real engine; loads a model once at startup
//!   and serializes inference behind a lock
//! - **FixedTranscriber**: fixed-output implementation for tests and the
//!   testing profile
//! - **Audio loading**: WAV decode, mono downmix, 16 kHz resample
//!
//! ## Whisper Model Sizes:
//! - **tiny**: ~39MB, fastest but least accurate
//! - **base**: ~74MB, good balance for development
//! - **small**: ~244MB, better accuracy
//! - **medium**: ~769MB, good technical vocabulary
//! - **large**: ~1550MB, best accuracy but slowest

pub mod audio;
pub mod engine;
pub mod model;

pub use engine::{FixedTranscriber, Transcriber, WhisperTranscriber, FIXED_TRANSCRIPT};
pub use model::ModelSize;
