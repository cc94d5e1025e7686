use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const RECORD_FILE: &str = "beatmap.json";
pub const FEATURES_FILE: &str = "features.json";
pub const TARGETS_FILE: &str = "targets.json";
pub const COORDINATES_FILE: &str = "coordinates.json";

/// `<root>/raw/<song>/` inputs, `<root>/extracted/<song>/` artifacts.
#[derive(Clone, Debug)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn raw_song_dir(&self, song: &str) -> PathBuf {
        self.raw_dir().join(song)
    }

    pub fn extracted_song_dir(&self, song: &str) -> PathBuf {
        self.extracted_dir().join(song)
    }

    pub fn record_path(&self, song: &str) -> PathBuf {
        self.extracted_song_dir(song).join(RECORD_FILE)
    }

    pub fn features_path(&self, song: &str) -> PathBuf {
        self.extracted_song_dir(song).join(FEATURES_FILE)
    }

    pub fn targets_path(&self, song: &str) -> PathBuf {
        self.extracted_song_dir(song).join(TARGETS_FILE)
    }

    pub fn coordinates_path(&self) -> PathBuf {
        self.extracted_dir().join(COORDINATES_FILE)
    }

    pub fn ensure_extracted_dir(&self) -> Result<PathBuf> {
        let dir = self.extracted_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        Ok(dir)
    }

    pub fn ensure_extracted_song_dir(&self, song: &str) -> Result<PathBuf> {
        let dir = self.extracted_song_dir(song);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Songs with a raw input directory, sorted by name.
    pub fn raw_songs(&self) -> Result<Vec<String>> {
        list_song_dirs(&self.raw_dir())
    }

    /// Raw songs that also have an extracted record, sorted by name.
    ///
    /// Records left behind by songs removed from `raw/` are not listed.
    pub fn recorded_songs(&self) -> Result<Vec<String>> {
        Ok(self
            .raw_songs()?
            .into_iter()
            .filter(|song| self.record_path(song).exists())
            .collect())
    }
}

fn list_song_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.exists() {
        log::warn!("Dataset directory does not exist: {}", dir.display());
        return Ok(names);
    }
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_string()),
                None => log::warn!("Skipping non UTF-8 song directory: {:?}", entry.path()),
            }
        }
    }
    names.sort();
    Ok(names)
}
