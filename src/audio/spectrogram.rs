use anyhow::Result;
use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use super::fft::{power_spectrum, PowerSpectrum};
use crate::config::DspConfig;

const AMIN: f32 = 1e-10;

/// Log-mel spectrogram with shape `[1, mel_bands, frames]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    pub data: Array3<f32>,
}

impl Spectrogram {
    pub fn mel_bands(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[2]
    }

    /// Right-pad the frame axis with zeros to the smallest multiple of `context`.
    pub fn pad_to_context(self, context: usize) -> Spectrogram {
        let frames = self.frames();
        let padded = padded_len(frames, context);
        if padded == frames {
            return self;
        }
        let mut data = Array3::<f32>::zeros((1, self.mel_bands(), padded));
        data.slice_mut(s![.., .., ..frames]).assign(&self.data);
        Spectrogram { data }
    }

    /// Start frame index of every context chunk.
    pub fn chunk_indices(&self, context: usize) -> Vec<usize> {
        (0..self.frames() / context).collect()
    }
}

/// Smallest multiple of `context` that is >= `len`.
pub fn padded_len(len: usize, context: usize) -> usize {
    len.div_ceil(context) * context
}

/// STFT frame count for a centred transform.
pub fn frame_count(num_samples: usize, fft_size: usize, hop_size: usize) -> usize {
    let padded = num_samples + 2 * (fft_size / 2);
    if padded < fft_size {
        return 0;
    }
    1 + (padded - fft_size) / hop_size
}

/// Hamming-windowed centred STFT, HTK mel filterbank, power to dB.
pub struct MelSpectrogram {
    fft_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    /// `[fft_size/2 + 1, mel_bands]`
    filterbank: Array2<f32>,
    fft: Box<dyn PowerSpectrum>,
}

impl MelSpectrogram {
    pub fn new(dsp: &DspConfig) -> Self {
        let n_freqs = dsp.fft_size / 2 + 1;
        Self {
            fft_size: dsp.fft_size,
            hop_size: dsp.hop_size,
            window: hamming_window(dsp.fft_size),
            filterbank: mel_filterbank(
                n_freqs,
                dsp.f_min,
                dsp.f_max(),
                dsp.mel_bands,
                dsp.sample_rate,
            ),
            fft: power_spectrum(dsp.backend, dsp.fft_size),
        }
    }

    /// Unpadded log-mel spectrogram of a mono signal.
    pub fn compute(&mut self, samples: &[f32]) -> Result<Spectrogram> {
        let n_freqs = self.fft_size / 2 + 1;
        let n_mels = self.filterbank.shape()[1];
        let n_frames = if samples.is_empty() {
            0
        } else {
            frame_count(samples.len(), self.fft_size, self.hop_size)
        };
        let pad = (self.fft_size / 2) as isize;

        let mut power = Array2::<f32>::zeros((n_frames, n_freqs));
        let mut frame = vec![0.0f32; self.fft_size];
        let mut bins = vec![0.0f32; n_freqs];

        for t in 0..n_frames {
            let start = (t * self.hop_size) as isize - pad;
            for (i, slot) in frame.iter_mut().enumerate() {
                let idx = reflect_index(start + i as isize, samples.len());
                *slot = samples[idx] * self.window[i];
            }
            self.fft.power(&mut frame, &mut bins)?;
            power
                .row_mut(t)
                .iter_mut()
                .zip(bins.iter())
                .for_each(|(p, &b)| *p = b);
        }

        // [mels, freqs] x [freqs, frames]
        let mel = self.filterbank.t().dot(&power.t());
        let db = mel.mapv(|p| 10.0 * p.max(AMIN).log10());
        debug_assert_eq!(db.shape(), &[n_mels, n_frames]);

        Ok(Spectrogram {
            data: db.insert_axis(Axis(0)),
        })
    }
}

/// torch-style reflect padding (edge sample not repeated).
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Periodic Hamming window, `0.54 - 0.46 cos(2πn/N)`.
pub fn hamming_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()
        })
        .collect()
}

fn hz_to_mel(f: f32) -> f32 {
    2595.0 * (1.0 + f / 700.0).log10()
}

fn mel_to_hz(m: f32) -> f32 {
    700.0 * (10f32.powf(m / 2595.0) - 1.0)
}

/// Triangular HTK filters over linearly spaced FFT bins, shape `[n_freqs, n_mels]`.
pub fn mel_filterbank(
    n_freqs: usize,
    f_min: f32,
    f_max: f32,
    n_mels: usize,
    sample_rate: u32,
) -> Array2<f32> {
    let nyquist = sample_rate as f32 / 2.0;
    let all_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| {
            if n_freqs > 1 {
                nyquist * i as f32 / (n_freqs - 1) as f32
            } else {
                0.0
            }
        })
        .collect();

    let m_min = hz_to_mel(f_min);
    let m_max = hz_to_mel(f_max);
    let f_pts: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(m_min + (m_max - m_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut fb = Array2::<f32>::zeros((n_freqs, n_mels));
    for m in 0..n_mels {
        let (lower, center, upper) = (f_pts[m], f_pts[m + 1], f_pts[m + 2]);
        for (k, &f) in all_freqs.iter().enumerate() {
            let down = (f - lower) / (center - lower);
            let up = (upper - f) / (upper - center);
            fb[[k, m]] = down.min(up).max(0.0);
        }
    }
    fb
}
