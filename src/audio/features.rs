use anyhow::Result;

use super::decode::AudioData;
use super::resample::resample;
use super::spectrogram::{MelSpectrogram, Spectrogram};
use crate::config::DspConfig;
use crate::error::PrepError;

/// Zero mean, unit peak: `(x - mean) / max|x - mean|`.
pub fn normalize(samples: &[f32]) -> Result<Vec<f32>, PrepError> {
    let degenerate = || PrepError::DegenerateSignal { len: samples.len() };
    if samples.is_empty() {
        return Err(degenerate());
    }

    let mean = (samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64) as f32;
    let peak = samples
        .iter()
        .map(|&s| (s - mean).abs())
        .fold(0.0f32, f32::max);

    if peak == 0.0 || !peak.is_finite() {
        return Err(degenerate());
    }

    Ok(samples.iter().map(|&s| (s - mean) / peak).collect())
}

/// Full feature path for one song: resample, normalize, log-mel, context padding.
pub fn extract_spectrogram(audio: &AudioData, dsp: &DspConfig) -> Result<Spectrogram> {
    let samples = resample(&audio.samples, audio.sample_rate, dsp.sample_rate)?;
    let normalized = normalize(&samples)?;
    let spectrogram = MelSpectrogram::new(dsp).compute(&normalized)?;
    let unpadded = spectrogram.frames();
    let padded = spectrogram.pad_to_context(dsp.context_window);

    log::debug!(
        "Spectrogram: {} bands x {} frames (padded from {})",
        padded.mel_bands(),
        padded.frames(),
        unpadded
    );

    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    #[test]
    fn normalize_centres_and_scales() {
        let out = normalize(&[1.0, 2.0, 3.0, 6.0]).unwrap();
        // mean 3, peak |6-3| = 3
        assert_eq!(out, vec![-2.0 / 3.0, -1.0 / 3.0, 0.0, 1.0]);
        let peak = out.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert_eq!(peak, 1.0);
    }

    #[test]
    fn silence_is_degenerate() {
        assert!(matches!(
            normalize(&[0.0; 128]),
            Err(PrepError::DegenerateSignal { len: 128 })
        ));
        // DC offset only: zero after mean removal
        assert!(normalize(&[0.25; 16]).is_err());
        assert!(normalize(&[]).is_err());
    }

    #[test]
    fn extracted_frames_are_context_multiple() {
        let dsp = DspConfig {
            sample_rate: 8_000,
            fft_size: 256,
            hop_size: 80,
            mel_bands: 20,
            context_window: 7,
            ..DspConfig::default()
        };
        let audio = AudioData {
            samples: (0..8_000).map(|i| (i as f32 * 0.01).sin()).collect(),
            sample_rate: 8_000,
        };
        let spec = extract_spectrogram(&audio, &dsp).unwrap();
        let unpadded = 1 + 8_000 / 80;
        assert_eq!(spec.data.shape()[0], 1);
        assert_eq!(spec.mel_bands(), 20);
        assert_eq!(spec.frames() % 7, 0);
        assert!(spec
            .data
            .slice(s![.., .., unpadded..])
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn extraction_is_deterministic() {
        let dsp = DspConfig {
            sample_rate: 16_000,
            fft_size: 128,
            hop_size: 64,
            mel_bands: 8,
            ..DspConfig::default()
        };
        let audio = AudioData {
            samples: (0..4_000).map(|i| ((i * 7 % 13) as f32 / 13.0) - 0.5).collect(),
            sample_rate: 8_000,
        };
        let a = extract_spectrogram(&audio, &dsp).unwrap();
        let b = extract_spectrogram(&audio, &dsp).unwrap();
        assert_eq!(a, b);
    }
}
