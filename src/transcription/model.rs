//! # Whisper Model
//!
//! Loading and running Whisper checkpoints with Candle-rs. Model files come
//! from the HuggingFace hub and are cached locally, so only the first start
//! with a given size downloads anything.
//!
//! ## Loading Process:
//! 1. Resolve the hub repository for the configured size
//! 2. Download (or reuse cached) config, tokenizer, and safetensors weights
//! 3. Build the model on the selected device
//! 4. Run a short silence through it to confirm it works

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;

/// Available Whisper model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace model repository for this size.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate checkpoint size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// A loaded Whisper model ready for inference.
///
/// The forward pass mutates decoder state, so callers hold the model behind
/// a lock and run one transcription at a time.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    size: ModelSize,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
}

impl WhisperModel {
    /// Download (if needed) and load a Whisper model.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        tracing::info!("Loading Whisper {} model ({} MB)...", size, size.size_mb());
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::ApiBuilder;

            let mut builder = ApiBuilder::new().with_progress(false);
            if let Ok(token) = std::env::var("HF_TOKEN") {
                builder = builder.with_token(Some(token));
            }
            builder
                .build()
                .map_err(|e| anyhow!("Failed to initialize HuggingFace API: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", size.repo_name(), e))?;
        let model_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let mel_filters = Self::mel_filter_bank(&config);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        let mut loaded = Self {
            model,
            config,
            device,
            size,
            tokenizer,
            mel_filters,
        };
        loaded.validate()?;

        Ok(loaded)
    }

    /// Transcribe mono 16 kHz samples to text.
    ///
    /// Greedy decoding with a repetition guard; no timestamps, no
    /// temperature fallback. Audio longer than 30 seconds is truncated to
    /// the model's window.
    pub fn transcribe(&mut self, audio_data: &[f32], language: Option<&str>) -> Result<String> {
        if audio_data.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let start_time = std::time::Instant::now();

        let mel = self.pcm_to_mel(audio_data)?;
        let mel = mel.unsqueeze(0)?;

        let encoder_output = self.model.encoder.forward(&mel, false)?;

        let mut tokens = vec![SOT_TOKEN];
        if let Some(lang) = language {
            if let Some(lang_token) = language_token(lang) {
                tokens.push(lang_token);
            }
        }
        tokens.push(TRANSCRIBE_TOKEN);

        let prompt_len = tokens.len();
        let mut output_tokens = Vec::new();

        const MAX_TOKENS: usize = 224;
        for _ in 0..MAX_TOKENS {
            let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let logits = self.model.decoder.forward(&token_tensor, &encoder_output, false)?;

            let last_logits = logits.i((.., tokens.len() - 1, ..))?;
            let next_token = last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?;

            if next_token == EOT_TOKEN {
                break;
            }

            if is_repetitive(&output_tokens, next_token) {
                tracing::debug!("Stopping decode on repetition after {} tokens", output_tokens.len());
                break;
            }

            tokens.push(next_token);
            output_tokens.push(next_token);
        }
        debug_assert_eq!(tokens.len(), prompt_len + output_tokens.len());

        let text = self.decode_tokens(&output_tokens)?;

        tracing::debug!(
            "Whisper {} transcribed {:.2}s of audio in {:.2}s",
            self.size,
            audio_data.len() as f64 / 16000.0,
            start_time.elapsed().as_secs_f64(),
        );

        Ok(text)
    }

    /// Convert PCM audio into the model's log-mel input tensor.
    ///
    /// Pads or truncates to the 30-second window (3000 frames) every
    /// Whisper checkpoint was trained on.
    fn pcm_to_mel(&self, pcm_data: &[f32]) -> Result<Tensor> {
        let target_len = 30 * 16000;
        let mut padded = vec![0.0f32; target_len];
        let copy_len = pcm_data.len().min(target_len);
        padded[..copy_len].copy_from_slice(&pcm_data[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let n_frames = 3000;

        let mut mel_data = vec![0.0f32; n_mels * n_frames];

        let frame_size = padded.len() / n_frames;
        for frame in 0..n_frames {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded.len());

            for mel_bin in 0..n_mels {
                let row = &self.mel_filters[mel_bin * N_FFT..(mel_bin + 1) * N_FFT];
                let mut energy = 0.0f32;
                for (k, sample) in padded[start..end].iter().enumerate() {
                    let gain = row.get(k).copied().unwrap_or(0.0);
                    energy += sample.abs() * gain;
                }
                // -80 dB floor keeps the log finite on silence
                mel_data[mel_bin * n_frames + frame] =
                    (energy / frame_size as f32).ln().max(-11.5129);
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, n_frames), &self.device)?)
    }

    /// Triangular mel filter bank sized to the model configuration.
    fn mel_filter_bank(config: &Config) -> Vec<f32> {
        let n_mels = config.num_mel_bins as usize;
        let mut filters = vec![0.0f32; N_FFT * n_mels];

        for i in 0..n_mels {
            let center = (i + 1) * N_FFT / (n_mels + 1);
            let width = N_FFT / (n_mels + 1);

            for j in 0..N_FFT {
                if j >= center.saturating_sub(width) && j <= center + width {
                    let distance = (j as i32 - center as i32).unsigned_abs() as f32;
                    filters[i * N_FFT + j] = (1.0 - distance / width as f32).max(0.0);
                }
            }
        }

        filters
    }

    /// Run a second of silence through the model to confirm it loaded.
    fn validate(&mut self) -> Result<()> {
        let silence = vec![0.0f32; 16000];
        let result = self.transcribe(&silence, Some("en"))?;
        tracing::debug!("Model validation passed, test output: '{}'", result);
        Ok(())
    }

    /// Decode tokens to text, stripping Whisper's special markers.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");

        Ok(cleaned.trim().to_string())
    }
}

/// FFT size used by all 16 kHz Whisper checkpoints.
const N_FFT: usize = 400;

/// Whisper special token ids (stable across the openai checkpoints).
const SOT_TOKEN: u32 = 50258;
const EOT_TOKEN: u32 = 50257;
const TRANSCRIBE_TOKEN: u32 = 50359;

/// Language token id for an ISO 639-1 hint, if the language is supported.
fn language_token(language: &str) -> Option<u32> {
    match language.to_lowercase().as_str() {
        "en" | "english" => Some(50259),
        "zh" | "chinese" => Some(50260),
        "de" | "german" => Some(50261),
        "es" | "spanish" => Some(50262),
        "ru" | "russian" => Some(50263),
        "ko" | "korean" => Some(50264),
        "fr" | "french" => Some(50265),
        "ja" | "japanese" => Some(50266),
        "pt" | "portuguese" => Some(50267),
        "it" | "italian" => Some(50274),
        _ => None,
    }
}

/// Detect degenerate decoding loops.
///
/// Triggers on a token repeated three times in a row, or the last three
/// tokens repeating the three before them.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    let n = tokens.len();

    if n >= 2 && tokens[n - 1] == new_token && tokens[n - 2] == new_token {
        return true;
    }

    if n >= 5 {
        let candidate = [tokens[n - 2], tokens[n - 1], new_token];
        let previous = &tokens[n - 5..n - 2];
        if previous == candidate {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!("MEDIUM".parse::<ModelSize>().unwrap(), ModelSize::Medium);
        assert!("huge".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_display_round_trip() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_language_token_mapping() {
        assert_eq!(language_token("en"), Some(50259));
        assert_eq!(language_token("English"), Some(50259));
        assert_eq!(language_token("xx"), None);
    }

    #[test]
    fn test_repetition_guard() {
        assert!(!is_repetitive(&[], 5));
        assert!(!is_repetitive(&[1, 2], 3));
        // Immediate triple
        assert!(is_repetitive(&[9, 7, 7], 7));
        // Pattern repeat: [1,2,3] then [1,2] + incoming 3
        assert!(is_repetitive(&[1, 2, 3, 1, 2], 3));
        assert!(!is_repetitive(&[1, 2, 3, 1, 2], 4));
    }
}
