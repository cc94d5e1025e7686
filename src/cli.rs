use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::FftBackend;

#[derive(Parser, Debug)]
#[command(name = "beatprep", about = "Onset-detection dataset preparation for osu! beatmaps")]
pub struct Cli {
    /// Config file (defaults to ./beatprep.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dataset root holding raw/ and extracted/
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Worker threads for per-song extraction
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse every beatmap into extracted/<song>/beatmap.json
    Records,
    /// Compute spectrograms and onset targets for every extracted record
    Features(DspArgs),
    /// Pad all coordinate sequences into extracted/coordinates.json
    Coords(CoordArgs),
    /// Run records, features and coords in order
    All {
        #[command(flatten)]
        dsp: DspArgs,
        #[command(flatten)]
        coords: CoordArgs,
    },
    /// Score per-frame predictions against a song's targets
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Default)]
pub struct DspArgs {
    /// FFT implementation
    #[arg(long, value_enum)]
    pub backend: Option<FftBackend>,

    /// Target sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Context window in frames
    #[arg(long)]
    pub context: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct CoordArgs {
    /// Fill value for padded x coordinates
    #[arg(long)]
    pub pad_x: Option<f32>,

    /// Fill value for padded y coordinates
    #[arg(long)]
    pub pad_y: Option<f32>,

    /// Constant added to every batched coordinate
    #[arg(long, allow_hyphen_values = true)]
    pub bias: Option<f32>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Song name under extracted/
    #[arg(long)]
    pub song: String,

    /// JSON array of per-frame onset probabilities
    #[arg(long)]
    pub predictions: PathBuf,

    /// Detection threshold
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Allowed offset between detection and target, in frames
    #[arg(long, default_value_t = 1)]
    pub tolerance: usize,

    /// Peak-picking half window in frames
    #[arg(long, default_value_t = 1)]
    pub window: usize,

    /// Exact frame-by-frame comparison
    #[arg(long)]
    pub naive: bool,
}
