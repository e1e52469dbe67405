// mongobackup/src/utils/fsops.rs
use anyhow::Result;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::errors::AppError;

/// Creates the directory (and any missing parents) if it does not exist yet.
pub async fn ensure_directory_exists(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await.map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    println!("📂 Temporary backup directory ensured: {}", path.display());
    Ok(())
}

/// Deletes a single file. An already-absent file is treated as success so the
/// call stays idempotent; any other failure is propagated for the caller to
/// decide on (the orchestrator suppresses it during cleanup).
pub async fn remove_local_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            println!("🗑 Deleted local backup file: {}", path.display());
            Ok(())
        }
        Err(source) if source.kind() == ErrorKind::NotFound => {
            println!("Local backup file already absent: {}", path.display());
            Ok(())
        }
        Err(source) => Err(AppError::Cleanup {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

/// Recursively deletes a directory, ignoring it if already absent.
pub async fn remove_directory(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            println!("🗑 Deleted temporary backup directory: {}", path.display());
            Ok(())
        }
        Err(source) if source.kind() == ErrorKind::NotFound => {
            println!("Temporary backup directory already absent: {}", path.display());
            Ok(())
        }
        Err(source) => Err(AppError::Cleanup {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}
