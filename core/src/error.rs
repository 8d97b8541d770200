//! Error types for corpus indexing.
//!
//! Configuration and precondition errors are fatal. `SourceUnavailable` is
//! reported through [`crate::ingest::IngestReport`] instead of aborting.
//! `MalformedRecord` is logged and skipped by the line-oriented readers; a
//! truncated sort run is fatal.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WvError {
    /// Missing component parameter, unknown component or weighting method.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source unavailable: {source_uri}: {reason}")]
    SourceUnavailable { source_uri: String, reason: String },

    #[error("malformed record in {}:{line}: {reason}", .file.display())]
    MalformedRecord {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    /// An artifact that a stage depends on has not been produced yet.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WvError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        WvError::Configuration(msg.into())
    }

    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        WvError::Precondition(msg.into())
    }

    pub fn malformed<P: Into<PathBuf>, S: Into<String>>(file: P, line: usize, reason: S) -> Self {
        WvError::MalformedRecord {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WvError>;
