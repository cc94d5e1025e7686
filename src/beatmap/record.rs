use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One song's hit objects: onset seconds and playfield-normalized coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatmapRecord {
    pub name: String,
    pub onsets: Vec<f64>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl BeatmapRecord {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            onsets: Vec::new(),
            xs: Vec::new(),
            ys: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize beatmap record")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write record: {}", path.display()))
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read record: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record: {}", path.display()))
    }
}
