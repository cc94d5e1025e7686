use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::layout::DatasetLayout;
use crate::audio::AudioSource;
use crate::error::PrepError;

pub const BEATMAP_EXTENSIONS: &[&str] = &["osu"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "flac"];

/// Resolves a song name to readable beatmap and audio inputs.
pub trait SongAssets: Sync {
    fn beatmap(&self, song: &str) -> Result<Box<dyn BufRead + Send>>;
    fn audio(&self, song: &str) -> Result<AudioSource>;
}

/// Looks up inputs under `raw/<song>/` by file extension.
pub struct FsSongAssets {
    layout: DatasetLayout,
}

impl FsSongAssets {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    fn find(&self, song: &str, extensions: &[&str], kind: &'static str) -> Result<PathBuf> {
        let dir = self.layout.raw_song_dir(song);
        let mut matches = files_with_extensions(&dir, extensions)
            .map_err(|e| e.context(PrepError::missing(song, kind)))?;
        if matches.is_empty() {
            return Err(PrepError::missing(song, kind).into());
        }
        if matches.len() > 1 {
            log::warn!(
                "Song '{}' has {} {} files, using {}",
                song,
                matches.len(),
                kind,
                matches[0].display()
            );
        }
        Ok(matches.swap_remove(0))
    }
}

impl SongAssets for FsSongAssets {
    fn beatmap(&self, song: &str) -> Result<Box<dyn BufRead + Send>> {
        let path = self.find(song, BEATMAP_EXTENSIONS, "beatmap")?;
        let file = File::open(&path)
            .with_context(|| format!("Failed to open beatmap: {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn audio(&self, song: &str) -> Result<AudioSource> {
        let path = self.find(song, AUDIO_EXTENSIONS, "audio")?;
        let file = File::open(&path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        Ok(AudioSource {
            source: Box::new(file),
            extension: extension_of(&path),
            label: path.display().to_string(),
        })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Files in `dir` whose extension is in `extensions`, ordered by the
/// extension list then by file name.
fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut found: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read song directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let rank = extension_of(&path)
            .and_then(|ext| extensions.iter().position(|e| *e == ext));
        if let Some(rank) = rank {
            found.push((rank, path));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
pub(crate) use memory::MemorySongAssets;
