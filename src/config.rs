use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PrepError;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub dsp: DspConfig,
    #[serde(default)]
    pub coordinates: CoordinateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DspConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// STFT window length in samples
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Samples between consecutive frames
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_mel_bands")]
    pub mel_bands: usize,
    #[serde(default = "default_f_min")]
    pub f_min: f32,
    /// Upper filterbank edge; Nyquist when unset
    #[serde(default)]
    pub f_max: Option<f32>,
    /// Frames per training example; spectrograms are padded to a multiple of this
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default)]
    pub backend: FftBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FftBackend {
    /// Complex FFT over a zero-imaginary buffer
    #[default]
    Rustfft,
    /// Real-input FFT
    Realfft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinateConfig {
    #[serde(default)]
    pub pad_x: f32,
    #[serde(default)]
    pub pad_y: f32,
    #[serde(default)]
    pub bias: f32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            fft_size: default_fft_size(),
            hop_size: default_hop_size(),
            mel_bands: default_mel_bands(),
            f_min: default_f_min(),
            f_max: None,
            context_window: default_context_window(),
            backend: FftBackend::default(),
        }
    }
}

impl Default for CoordinateConfig {
    fn default() -> Self {
        Self {
            pad_x: 0.0,
            pad_y: 0.0,
            bias: 0.0,
        }
    }
}

fn default_root() -> PathBuf { PathBuf::from("./dataset/osu") }
fn default_sample_rate() -> u32 { 44_100 }
fn default_fft_size() -> usize { 1024 }
fn default_hop_size() -> usize { 512 }
fn default_mel_bands() -> usize { 80 }
fn default_f_min() -> f32 { 20.0 }
fn default_context_window() -> usize { 16 }

impl DspConfig {
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn f_max(&self) -> f32 {
        self.f_max.unwrap_or_else(|| self.nyquist())
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        let invalid = |msg: String| Err(PrepError::InvalidConfig(msg));
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        if self.fft_size < 2 || self.fft_size % 2 != 0 {
            return invalid(format!("fft_size must be even and >= 2, got {}", self.fft_size));
        }
        if self.hop_size == 0 {
            return invalid("hop_size must be >= 1".into());
        }
        if self.mel_bands == 0 {
            return invalid("mel_bands must be >= 1".into());
        }
        if self.context_window == 0 {
            return invalid("context_window must be >= 1".into());
        }
        let f_max = self.f_max();
        if !(self.f_min >= 0.0 && self.f_min < f_max && f_max <= self.nyquist()) {
            return invalid(format!(
                "expected 0 <= f_min < f_max <= {}, got f_min={} f_max={}",
                self.nyquist(),
                self.f_min,
                f_max
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), PrepError> {
        self.dsp.validate()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Explicit path wins, then `./beatprep.toml`, then the platform config dir.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("beatprep.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("beatprep").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
