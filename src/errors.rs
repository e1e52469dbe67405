use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Failure taxonomy for a backup run.
///
/// Config/dump/upload errors are fatal and re-raised after cleanup has run;
/// cleanup errors are caught and logged by the orchestrator and never replace
/// the run's primary outcome.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    // Tool could not be started at all (missing, permission denied, ...).
    #[error("Failed to start mongodump: {0}")]
    DumpSpawn(#[source] std::io::Error),

    #[error("mongodump failed with {status}: {stderr}")]
    DumpFailed { status: ExitStatus, stderr: String },

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Cleanup of {path} failed: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
