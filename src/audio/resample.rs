use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio to `target_rate`.
///
/// Sample 0 stays at t = 0 and the output holds exactly
/// `ceil(len * target / source)` samples.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        1.0,
        SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        },
        CHUNK_SIZE,
        1,
    )
    .context("Failed to build resampler")?;

    let mut out: Vec<f32> = Vec::with_capacity(expected + CHUNK_SIZE);

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= samples.len() {
        let n = resampler.input_frames_next();
        let chunk = resampler
            .process(&[&samples[pos..pos + n]], None)
            .context("Resampling failed")?;
        out.extend_from_slice(&chunk[0]);
        pos += n;
    }

    if pos < samples.len() {
        let chunk = resampler
            .process_partial(Some(&[&samples[pos..]][..]), None)
            .context("Resampling failed")?;
        out.extend_from_slice(&chunk[0]);
    }

    // Flush the filter tail
    while out.len() < expected {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .context("Resampling failed")?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    out.resize(expected, 0.0);

    log::debug!(
        "Resampled {} -> {} samples ({}Hz -> {}Hz)",
        samples.len(),
        out.len(),
        source_rate,
        target_rate
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 44_100, 44_100).unwrap(), samples);
    }

    #[test]
    fn output_length_follows_ratio() {
        let samples = vec![0.0f32; 22_050];
        let out = resample(&samples, 22_050, 44_100).unwrap();
        assert_eq!(out.len(), 44_100);

        let samples = vec![0.0f32; 4_801];
        let out = resample(&samples, 48_000, 44_100).unwrap();
        assert_eq!(out.len(), (4_801.0f64 * 44_100.0 / 48_000.0).ceil() as usize);
    }

    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    /// Impulse at 0.5 s must still peak at 0.5 s after conversion.
    fn assert_impulse_kept(source_rate: u32, target_rate: u32) {
        let mut samples = vec![0.0f32; source_rate as usize];
        samples[source_rate as usize / 2] = 1.0;
        let out = resample(&samples, source_rate, target_rate).unwrap();
        let peak = peak_index(&out) as i64;
        let expected = target_rate as i64 / 2;
        assert!(
            (peak - expected).abs() <= 3,
            "{} -> {}: peak at {}, expected {}",
            source_rate,
            target_rate,
            peak,
            expected
        );
    }

    #[test]
    fn preserves_impulse_position_upsampling() {
        assert_impulse_kept(8_000, 16_000);
        assert_impulse_kept(22_050, 44_100);
    }

    #[test]
    fn preserves_impulse_position_downsampling() {
        assert_impulse_kept(48_000, 44_100);
    }
}
