use crate::config::DspConfig;

/// Per-frame onset targets plus the count of onsets past the last frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    pub targets: Vec<f32>,
    pub dropped: usize,
}

impl Alignment {
    pub fn onset_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(|(i, _)| i)
    }
}

/// Frame index of an onset, librosa `time_to_frames` style:
/// `floor((trunc(t * sr) - n_fft / 2) / hop)`. May be negative.
pub fn onset_frame(seconds: f64, dsp: &DspConfig) -> i64 {
    let sample = (seconds * dsp.sample_rate as f64) as i64;
    let offset = (dsp.fft_size / 2) as i64;
    (sample - offset).div_euclid(dsp.hop_size as i64)
}

/// Binary frame targets of length `frames`.
///
/// Frames before 0 clamp to 0; frames at or past `frames` are dropped.
pub fn align_onsets(onsets: &[f64], dsp: &DspConfig, frames: usize) -> Alignment {
    let mut targets = vec![0.0f32; frames];
    let mut dropped = 0;

    for &onset in onsets {
        let frame = onset_frame(onset, dsp).max(0) as usize;
        match targets.get_mut(frame) {
            Some(t) => *t = 1.0,
            None => dropped += 1,
        }
    }

    Alignment { targets, dropped }
}
