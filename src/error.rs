use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("song '{song}': no {kind} file found")]
    MissingFile { song: String, kind: &'static str },
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("degenerate signal ({len} samples): zero peak after mean removal")]
    DegenerateSignal { len: usize },
    #[error("cannot batch an empty dataset")]
    EmptyDataset,
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl PrepError {
    pub fn malformed<T: Into<String>>(line: usize, reason: T) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn missing(song: &str, kind: &'static str) -> Self {
        Self::MissingFile {
            song: song.to_string(),
            kind,
        }
    }
}
