use anyhow::{anyhow, Result};
use realfft::RealFftPlanner;
use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

use crate::config::FftBackend;

/// Power spectrum `|X_k|^2`, `k in 0..=n/2`, of one windowed frame.
pub trait PowerSpectrum: Send {
    fn fft_size(&self) -> usize;

    /// `frame` holds `fft_size` windowed samples and may be clobbered;
    /// `out` receives `fft_size / 2 + 1` bins.
    fn power(&mut self, frame: &mut [f32], out: &mut [f32]) -> Result<()>;
}

pub fn power_spectrum(backend: FftBackend, fft_size: usize) -> Box<dyn PowerSpectrum> {
    match backend {
        FftBackend::Rustfft => Box::new(ComplexFft::new(fft_size)),
        FftBackend::Realfft => Box::new(RealFft::new(fft_size)),
    }
}

pub struct ComplexFft {
    fft: Arc<dyn rustfft::Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl ComplexFft {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }
}

impl PowerSpectrum for ComplexFft {
    fn fft_size(&self) -> usize {
        self.buffer.len()
    }

    fn power(&mut self, frame: &mut [f32], out: &mut [f32]) -> Result<()> {
        for (c, &s) in self.buffer.iter_mut().zip(frame.iter()) {
            *c = Complex::new(s, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (o, c) in out.iter_mut().zip(self.buffer.iter()) {
            *o = c.norm_sqr();
        }
        Ok(())
    }
}

pub struct RealFft {
    fft: Arc<dyn realfft::RealToComplex<f32>>,
    spectrum: Vec<Complex<f32>>,
}

impl RealFft {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let spectrum = fft.make_output_vec();
        Self { fft, spectrum }
    }
}

impl PowerSpectrum for RealFft {
    fn fft_size(&self) -> usize {
        self.fft.len()
    }

    fn power(&mut self, frame: &mut [f32], out: &mut [f32]) -> Result<()> {
        self.fft
            .process(frame, &mut self.spectrum)
            .map_err(|e| anyhow!("Real FFT failed: {}", e))?;
        for (o, c) in out.iter_mut().zip(self.spectrum.iter()) {
            *o = c.norm_sqr();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(backend: FftBackend, input: &[f32]) -> Vec<f32> {
        let mut fft = power_spectrum(backend, input.len());
        let mut frame = input.to_vec();
        let mut out = vec![0.0; input.len() / 2 + 1];
        fft.power(&mut frame, &mut out).unwrap();
        out
    }

    #[test]
    fn backends_agree() {
        let input: Vec<f32> = (0..256)
            .map(|i| (i as f32 * 0.07).sin() + 0.3 * (i as f32 * 0.61).cos())
            .collect();
        let a = run(FftBackend::Rustfft, &input);
        let b = run(FftBackend::Realfft, &input);
        assert_eq!(a.len(), 129);
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_relative_eq!(*x, *y, epsilon = 1e-2, max_relative = 1e-3);
        }
    }

    #[test]
    fn pure_tone_lands_in_its_bin() {
        let n = 64;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / n as f32).cos())
            .collect();
        let out = run(FftBackend::Realfft, &input);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 8);
        // |X_8| = n/2 for a unit cosine
        approx::assert_relative_eq!(out[8], (n as f32 / 2.0).powi(2), max_relative = 1e-4);
    }
}
