mod audio;
mod beatmap;
mod cli;
mod config;
mod dataset;
mod error;
mod eval;
mod labels;
mod timing;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, CoordArgs, DspArgs, EvaluateArgs};
use config::Config;
use dataset::pipeline::{self, EvalParams};
use dataset::{DatasetLayout, FsSongAssets, RunSummary};
use labels::CoordinateFill;
use timing::ScopedTimer;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            // An explicitly requested file must load
            Err(err) if cli.config.is_some() => return Err(err),
            Err(err) => {
                log::warn!("Ignoring config {}: {:#}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    if let Some(root) = cli.root.clone() {
        config.dataset.root = root;
    }

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker pool")?;
    }

    let layout = DatasetLayout::new(config.dataset.root.clone());
    let assets = FsSongAssets::new(layout.clone());
    log::info!("Dataset root: {}", layout.root().display());

    match cli.command {
        Command::Records => {
            config.validate()?;
            let summary = {
                let _timer = ScopedTimer::new("records");
                pipeline::extract_all_records(&layout, &assets)?
            };
            finish("records", &summary)
        }
        Command::Features(dsp) => {
            apply_dsp_args(&mut config, &dsp);
            config.validate()?;
            let summary = {
                let _timer = ScopedTimer::new("features");
                pipeline::extract_all_features(&layout, &assets, &config.dsp)?
            };
            finish("features", &summary)
        }
        Command::Coords(coords) => {
            apply_coord_args(&mut config, &coords);
            config.validate()?;
            let _timer = ScopedTimer::new("coords");
            pipeline::batch_dataset(&layout, CoordinateFill::from(&config.coordinates))?;
            Ok(())
        }
        Command::All { dsp, coords } => {
            apply_dsp_args(&mut config, &dsp);
            apply_coord_args(&mut config, &coords);
            config.validate()?;
            let _timer = ScopedTimer::new("all");

            let records = pipeline::extract_all_records(&layout, &assets)?;
            finish("records", &records)?;
            let features = pipeline::extract_all_features(&layout, &assets, &config.dsp)?;
            finish("features", &features)?;
            pipeline::batch_dataset(&layout, CoordinateFill::from(&config.coordinates))?;
            Ok(())
        }
        Command::Evaluate(args) => evaluate(&layout, &args),
    }
}

fn apply_dsp_args(config: &mut Config, args: &DspArgs) {
    if let Some(backend) = args.backend {
        config.dsp.backend = backend;
    }
    if let Some(sample_rate) = args.sample_rate {
        config.dsp.sample_rate = sample_rate;
    }
    if let Some(context) = args.context {
        config.dsp.context_window = context;
    }
}

fn apply_coord_args(config: &mut Config, args: &CoordArgs) {
    if let Some(pad_x) = args.pad_x {
        config.coordinates.pad_x = pad_x;
    }
    if let Some(pad_y) = args.pad_y {
        config.coordinates.pad_y = pad_y;
    }
    if let Some(bias) = args.bias {
        config.coordinates.bias = bias;
    }
}

fn finish(label: &str, summary: &RunSummary) -> Result<()> {
    summary.log(label);
    if summary.nothing_succeeded() {
        anyhow::bail!("{}: all {} songs failed", label, summary.failed.len());
    }
    Ok(())
}

fn evaluate(layout: &DatasetLayout, args: &EvaluateArgs) -> Result<()> {
    let predictions: Vec<f32> = dataset::artifacts::read_json(&args.predictions)?;
    let params = EvalParams {
        threshold: args.threshold,
        tolerance_frames: args.tolerance,
        window: args.window,
        naive: args.naive,
    };
    let counts = pipeline::evaluate_song(layout, &args.song, &predictions, &params)?;
    let scores = counts.scores();
    log::info!(
        "{}: tp={} fp={} fn={}",
        args.song,
        counts.true_positives,
        counts.false_positives,
        counts.false_negatives
    );
    println!(
        "F-score {:.4}  precision {:.4}  recall {:.4}",
        scores.fscore, scores.precision, scores.recall
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(succeeded: usize, failures: usize) -> RunSummary {
        RunSummary {
            succeeded,
            failed: (0..failures)
                .map(|i| (format!("song{}", i), "boom".to_string()))
                .collect(),
        }
    }

    #[test]
    fn coordinate_flags_override_config() {
        let mut config = Config::default();
        let args = CoordArgs {
            pad_x: None,
            pad_y: Some(1.0),
            bias: Some(0.25),
        };
        apply_coord_args(&mut config, &args);
        assert_eq!(config.coordinates.pad_x, 0.0);
        assert_eq!(config.coordinates.pad_y, 1.0);
        assert_eq!(config.coordinates.bias, 0.25);
    }

    #[test]
    fn finish_fails_only_when_every_song_failed() {
        let err = finish("features", &summary(0, 3)).unwrap_err();
        assert!(err.to_string().contains("all 3 songs failed"));
        assert!(finish("features", &summary(2, 1)).is_ok());
        assert!(finish("features", &summary(0, 0)).is_ok());
    }
}
