use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Mutex;

use super::artifacts::{read_json, write_json, FeatureArtifact};
use super::assets::SongAssets;
use super::layout::DatasetLayout;
use crate::audio::{decode_audio, extract_spectrogram};
use crate::beatmap::{parse_beatmap, BeatmapRecord};
use crate::config::DspConfig;
use crate::error::PrepError;
use crate::eval::{self, Counts};
use crate::labels::{align_onsets, batch_coordinates, CoordinateBatch, CoordinateFill};

/// Outcome of a per-song batch run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    /// `(song, error chain)`, sorted by song
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// At least one song ran and none succeeded.
    pub fn nothing_succeeded(&self) -> bool {
        self.succeeded == 0 && !self.failed.is_empty()
    }

    pub fn log(&self, label: &str) {
        log::info!(
            "{}: {} succeeded, {} failed ({} songs)",
            label,
            self.succeeded,
            self.failed.len(),
            self.total()
        );
        for (song, err) in &self.failed {
            log::error!("  {}: {}", song, err);
        }
    }
}

/// Run `task` over every song on the rayon pool, collecting failures.
pub fn run_songs<F>(label: &str, songs: &[String], task: F) -> Result<RunSummary>
where
    F: Fn(&str) -> Result<()> + Sync,
{
    let pb = ProgressBar::new(songs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message(label.to_string());

    let failed = Mutex::new(Vec::new());
    let succeeded: usize = songs
        .par_iter()
        .map(|song| {
            let result = task(song);
            pb.inc(1);
            match result {
                Ok(()) => {
                    log::debug!("{}: {} done", label, song);
                    1
                }
                Err(err) => {
                    if let Ok(mut failed) = failed.lock() {
                        failed.push((song.clone(), format!("{:#}", err)));
                    }
                    0
                }
            }
        })
        .sum();

    pb.finish_and_clear();

    let mut failed = failed
        .into_inner()
        .map_err(|_| anyhow::anyhow!("Failure list lock poisoned"))?;
    failed.sort();

    Ok(RunSummary { succeeded, failed })
}

/// Parse one song's beatmap and write its record.
pub fn extract_record(
    layout: &DatasetLayout,
    assets: &dyn SongAssets,
    song: &str,
) -> Result<BeatmapRecord> {
    let record_path = layout.record_path(song);
    let parsed = assets
        .beatmap(song)
        .and_then(|reader| parse_beatmap(song, reader).map_err(anyhow::Error::from));
    let record = match parsed {
        Ok(record) => record,
        Err(err) => {
            remove_stale(&record_path);
            remove_stale(&layout.features_path(song));
            remove_stale(&layout.targets_path(song));
            return Err(err);
        }
    };
    layout.ensure_extracted_song_dir(song)?;
    record.write_json(&record_path)?;
    log::debug!("{}: {} hit objects", song, record.len());
    Ok(record)
}

/// Drop an artifact from an earlier run of a song that now fails.
fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove stale {}: {}", path.display(), e),
    }
}

/// Compute one song's spectrogram and frame targets from its audio and record.
pub fn extract_features(
    layout: &DatasetLayout,
    assets: &dyn SongAssets,
    dsp: &DspConfig,
    song: &str,
) -> Result<FeatureArtifact> {
    let result = compute_features(layout, assets, dsp, song);
    if result.is_err() {
        remove_stale(&layout.features_path(song));
        remove_stale(&layout.targets_path(song));
    }
    result
}

fn compute_features(
    layout: &DatasetLayout,
    assets: &dyn SongAssets,
    dsp: &DspConfig,
    song: &str,
) -> Result<FeatureArtifact> {
    let record_path = layout.record_path(song);
    if !record_path.exists() {
        return Err(PrepError::missing(song, "beatmap record").into());
    }
    let record = BeatmapRecord::read_json(&record_path)?;
    let audio = decode_audio(assets.audio(song)?)?;
    let spectrogram = extract_spectrogram(&audio, dsp)
        .with_context(|| format!("Feature extraction failed for '{}'", song))?;

    let alignment = align_onsets(&record.onsets, dsp, spectrogram.frames());
    if alignment.dropped > 0 {
        log::warn!(
            "{}: dropped {} of {} onsets past the last frame ({})",
            song,
            alignment.dropped,
            record.len(),
            spectrogram.frames()
        );
    }

    let indices = spectrogram.chunk_indices(dsp.context_window);
    let artifact = FeatureArtifact {
        spectrogram,
        indices,
    };

    layout.ensure_extracted_song_dir(song)?;
    write_json(&layout.features_path(song), &artifact)?;
    write_json(&layout.targets_path(song), &alignment.targets)?;
    Ok(artifact)
}

pub fn extract_all_records(layout: &DatasetLayout, assets: &dyn SongAssets) -> Result<RunSummary> {
    let songs = layout.raw_songs()?;
    log::info!("Extracting beatmap records for {} songs", songs.len());
    run_songs("records", &songs, |song| {
        extract_record(layout, assets, song).map(|_| ())
    })
}

pub fn extract_all_features(
    layout: &DatasetLayout,
    assets: &dyn SongAssets,
    dsp: &DspConfig,
) -> Result<RunSummary> {
    let songs = layout.raw_songs()?;
    log::info!("Extracting features for {} songs", songs.len());
    run_songs("features", &songs, |song| {
        extract_features(layout, assets, dsp, song).map(|_| ())
    })
}

/// Pad every record's coordinates into one batch. Any failure is fatal.
pub fn batch_dataset(layout: &DatasetLayout, fill: CoordinateFill) -> Result<CoordinateBatch> {
    let raw = layout.raw_songs()?;
    let songs = layout.recorded_songs()?;
    if songs.len() < raw.len() {
        log::warn!(
            "Batching {} of {} songs; the rest have no record",
            songs.len(),
            raw.len()
        );
    }
    let records = songs
        .iter()
        .map(|song| BeatmapRecord::read_json(&layout.record_path(song)))
        .collect::<Result<Vec<_>>>()?;

    let batch = batch_coordinates(&records, fill)?;
    layout.ensure_extracted_dir()?;
    batch.write_json(&layout.coordinates_path())?;
    log::info!(
        "Batched coordinates: {} songs x 2 x {} steps",
        batch.songs.len(),
        batch.max_len()
    );
    Ok(batch)
}

pub struct EvalParams {
    pub threshold: f32,
    pub tolerance_frames: usize,
    pub window: usize,
    pub naive: bool,
}

/// Score a JSON list of per-frame predictions against a song's targets.
pub fn evaluate_song(
    layout: &DatasetLayout,
    song: &str,
    predictions: &[f32],
    params: &EvalParams,
) -> Result<Counts> {
    let targets: Vec<f32> = read_json(&layout.targets_path(song))?;
    let counts = if params.naive {
        eval::evaluate_frame_naive(predictions, &targets, params.threshold)?
    } else {
        eval::evaluate_frame(
            predictions,
            &targets,
            params.threshold,
            params.tolerance_frames,
            params.window,
        )?
    };
    Ok(counts)
}
