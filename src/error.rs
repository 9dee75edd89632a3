use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the record, artifact, and configuration layers.
#[derive(Debug, Error)]
pub enum ChairsError {
    #[error("subdivision '{subdivision}' in {jurisdiction} normalizes to an empty id")]
    EmptySlug {
        jurisdiction: String,
        subdivision: String,
    },
    #[error("invalid jurisdiction code '{0}' (expected two ASCII letters)")]
    InvalidJurisdiction(String),
    #[error("unknown source '{0}'")]
    UnknownSource(String),
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("malformed JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChairsError>;
