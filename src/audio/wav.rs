//! WAV export and PCM conversion helpers.

use crate::error::{MemovoxError, Result};
use std::path::Path;

/// Write normalized mono samples to a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| MemovoxError::AudioCapture {
            message: format!("Failed to create WAV file: {}", e),
        })?;

    for &sample in samples {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(pcm)
            .map_err(|e| MemovoxError::AudioCapture {
                message: format!("Failed to write WAV sample: {}", e),
            })?;
    }

    writer.finalize().map_err(|e| MemovoxError::AudioCapture {
        message: format!("Failed to finalize WAV file: {}", e),
    })
}

/// Read a 16-bit PCM WAV file back into normalized mono samples.
///
/// Multi-channel files are mixed down by averaging.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| MemovoxError::AudioCapture {
        message: format!("Failed to open WAV file: {}", e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let pcm: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| MemovoxError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono = mix_to_mono(&pcm, channels);
    let samples = mono.iter().map(|&s| s as f32 / 32768.0).collect();
    Ok((samples, spec.sample_rate))
}

/// Mix interleaved multi-channel PCM down to mono by averaging.
pub fn mix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear resampling between arbitrary rates.
pub fn resample(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = samples[idx] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac) as i16);
    }

    out
}

/// Mix multi-channel PCM to mono and resample to the target rate.
pub fn to_mono_at_rate(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono = mix_to_mono(samples, channels);
    resample(&mono, source_rate, target_rate)
}
