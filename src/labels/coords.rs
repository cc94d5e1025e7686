use anyhow::{Context, Result};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::beatmap::BeatmapRecord;
use crate::config::CoordinateConfig;
use crate::error::PrepError;

/// Per-axis padding values and a uniform additive bias.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateFill {
    pub pad_x: f32,
    pub pad_y: f32,
    pub bias: f32,
}

impl From<&CoordinateConfig> for CoordinateFill {
    fn from(config: &CoordinateConfig) -> Self {
        Self {
            pad_x: config.pad_x,
            pad_y: config.pad_y,
            bias: config.bias,
        }
    }
}

impl Default for CoordinateFill {
    fn default() -> Self {
        Self {
            pad_x: 0.0,
            pad_y: 0.0,
            bias: 0.0,
        }
    }
}

/// `[num_songs, 2, max_len]` coordinate targets, rows in `songs` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBatch {
    pub songs: Vec<String>,
    pub lengths: Vec<usize>,
    pub coords: Array3<f32>,
}

impl CoordinateBatch {
    pub fn max_len(&self) -> usize {
        self.coords.shape()[2]
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize coordinate batch")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write coordinate batch: {}", path.display()))
    }
}

pub fn batch_coordinates(
    records: &[BeatmapRecord],
    fill: CoordinateFill,
) -> Result<CoordinateBatch, PrepError> {
    if records.is_empty() {
        return Err(PrepError::EmptyDataset);
    }

    for record in records {
        if record.xs.len() != record.ys.len() {
            return Err(PrepError::malformed(
                0,
                format!(
                    "record '{}' has {} xs but {} ys",
                    record.name,
                    record.xs.len(),
                    record.ys.len()
                ),
            ));
        }
    }

    let max_len = records.iter().map(|r| r.xs.len()).max().unwrap_or(0);
    let mut coords = Array3::<f32>::zeros((records.len(), 2, max_len));

    for (i, record) in records.iter().enumerate() {
        let n = record.xs.len();
        for (axis, (values, pad)) in [(&record.xs, fill.pad_x), (&record.ys, fill.pad_y)]
            .into_iter()
            .enumerate()
        {
            let mut row = coords.slice_mut(s![i, axis, ..]);
            for (slot, &v) in row.iter_mut().zip(values.iter()) {
                *slot = v as f32;
            }
            row.slice_mut(s![n..]).fill(pad);
        }
    }

    if fill.bias != 0.0 {
        coords += fill.bias;
    }

    Ok(CoordinateBatch {
        songs: records.iter().map(|r| r.name.clone()).collect(),
        lengths: records.iter().map(|r| r.xs.len()).collect(),
        coords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, len: usize) -> BeatmapRecord {
        BeatmapRecord {
            name: name.into(),
            onsets: (0..len).map(|i| i as f64).collect(),
            xs: (0..len).map(|i| 0.1 * (i + 1) as f64).collect(),
            ys: (0..len).map(|i| 0.05 * (i + 1) as f64).collect(),
        }
    }

    #[test]
    fn pads_to_longest_song() {
        let records = vec![record("a", 5), record("b", 8), record("c", 3)];
        let batch = batch_coordinates(&records, CoordinateFill::default()).unwrap();
        assert_eq!(batch.coords.shape(), &[3, 2, 8]);
        assert_eq!(batch.max_len(), 8);
        assert_eq!(batch.lengths, vec![5, 8, 3]);
        assert_eq!(batch.songs, vec!["a", "b", "c"]);

        // real values kept, tail padded
        approx::assert_relative_eq!(batch.coords[[0, 0, 4]], 0.5);
        approx::assert_relative_eq!(batch.coords[[1, 1, 7]], 0.4);
        assert!(batch.coords.slice(s![2, .., 3..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn per_axis_fill_values() {
        let records = vec![record("a", 1), record("b", 3)];
        let fill = CoordinateFill {
            pad_x: 0.0,
            pad_y: 1.0,
            bias: 0.0,
        };
        let batch = batch_coordinates(&records, fill).unwrap();
        assert_eq!(batch.coords.slice(s![0, 0, 1..]).to_vec(), vec![0.0, 0.0]);
        assert_eq!(batch.coords.slice(s![0, 1, 1..]).to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn bias_applies_everywhere() {
        let records = vec![record("a", 1), record("b", 2)];
        let fill = CoordinateFill {
            bias: 2.0,
            ..CoordinateFill::default()
        };
        let batch = batch_coordinates(&records, fill).unwrap();
        assert_eq!(batch.coords[[0, 0, 1]], 2.0);
        approx::assert_relative_eq!(batch.coords[[1, 0, 0]], 2.1);
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let err = batch_coordinates(&[], CoordinateFill::default()).unwrap_err();
        assert!(matches!(err, PrepError::EmptyDataset));
    }

    #[test]
    fn mismatched_axes_are_rejected() {
        let mut bad = record("bad", 3);
        bad.ys.pop();
        assert!(matches!(
            batch_coordinates(&[bad], CoordinateFill::default()),
            Err(PrepError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn all_empty_records_give_zero_width() {
        let batch =
            batch_coordinates(&[record("a", 0), record("b", 0)], CoordinateFill::default()).unwrap();
        assert_eq!(batch.coords.shape(), &[2, 2, 0]);
    }
}
