//! # Audio File Loading
//!
//! Turns an audio file on disk into the representation the Whisper model
//! consumes: mono 32-bit float samples at 16 kHz in the range [-1.0, 1.0].

use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;

/// Sample rate every Whisper variant expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Load a WAV file and prepare it for inference.
///
/// ## Process:
/// 1. Parse the WAV container and PCM payload
/// 2. Convert samples to f32 in [-1.0, 1.0]
/// 3. Downmix interleaved channels to mono by averaging
/// 4. Resample to 16 kHz
pub fn load_mono_16k(path: &Path) -> Result<Vec<f32>> {
    let mut file = File::open(path)
        .map_err(|e| anyhow!("Failed to open audio file {}: {}", path.display(), e))?;

    let (header, data) = wav::read(&mut file)
        .map_err(|e| anyhow!("Failed to decode WAV file {}: {}", path.display(), e))?;

    let samples = to_float_samples(data)?;
    if samples.is_empty() {
        return Err(anyhow!("Audio file {} contains no samples", path.display()));
    }

    let mono = downmix_to_mono(&samples, header.channel_count as usize);
    Ok(resample(&mono, header.sampling_rate, WHISPER_SAMPLE_RATE))
}

/// Convert whatever bit depth the container carries to normalized f32.
fn to_float_samples(data: wav::BitDepth) -> Result<Vec<f32>> {
    let samples = match data {
        wav::BitDepth::Eight(v) => v
            .into_iter()
            // 8-bit WAV is unsigned, centered on 128
            .map(|s| (s as f32 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(v) => v.into_iter().map(|s| s as f32 / 32768.0).collect(),
        wav::BitDepth::TwentyFour(v) => v.into_iter().map(|s| s as f32 / 8_388_608.0).collect(),
        wav::BitDepth::ThirtyTwoFloat(v) => v,
        wav::BitDepth::Empty => Vec::new(),
    };
    Ok(samples)
}

/// Average interleaved channels into a single mono stream.
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampling between arbitrary rates.
fn resample(samples: &[f32], src_rate: u32, target_rate: u32) -> Vec<f32> {
    if src_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / src_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < samples.len() {
            samples[src_idx] + frac * (samples[src_idx + 1] - samples[src_idx])
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0.0
        };

        resampled.push(sample);
    }

    resampled
}
