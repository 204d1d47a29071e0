//! Per-file failures. None of these abort a run; the processor counts them
//! and moves on to the next sidecar.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read sidecar {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse sidecar {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("exiftool failed on {path}: {message}")]
    Tool { path: PathBuf, message: String },
    #[error("path contains invalid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    #[error("unexpected exiftool output for {path}: {output}")]
    Unexpected { path: PathBuf, output: String },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create backup directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not find a free backup name for {0}")]
    NoFreeName(PathBuf),
    #[error("{0} is not inside the scanned root")]
    OutsideRoot(PathBuf),
}
