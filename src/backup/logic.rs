// mongobackup/src/backup/logic.rs
//
// The orchestration core: one strictly sequential dump-upload run wrapped in
// a protected region whose cleanup (file removal, then directory removal)
// executes exactly once on every exit path. Nothing is ever retried; any step
// failure aborts the run and is surfaced to the caller after cleanup has run.

use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use super::{db_dump, s3_upload};
use crate::config::BackupEnv;
use crate::errors::AppError;
use crate::utils::fsops;

const TEMP_BACKUP_DIR_NAME: &str = "tmp_mongo_backups";

/// Runs one complete backup: configuration, dump, upload, cleanup.
pub(crate) async fn execute_backup_process() -> Result<()> {
    let backup_dir = env::temp_dir().join(TEMP_BACKUP_DIR_NAME);

    run_with_guaranteed_cleanup(&backup_dir, async |artifact_path: &mut Option<PathBuf>| {
        let env_config = BackupEnv::load()?;

        let artifact = db_dump::create_mongo_backup(&env_config.mongo_uri, &backup_dir).await?;
        // Recorded before the upload so cleanup finds the file even when the
        // upload fails.
        *artifact_path = Some(artifact.file_path.clone());

        let outcome = s3_upload::upload_file_to_s3(
            &env_config.storage_config(),
            &env_config.s3_bucket_name,
            &artifact.file_path,
            &artifact.file_name,
        )
        .await?;
        if let Some(e_tag) = outcome.e_tag {
            println!("Uploaded object ETag: {e_tag}");
        }
        Ok(())
    })
    .await
}

/// The protected region. `steps` records the artifact path into the slot it
/// is handed as soon as the path is known; once `steps` resolves (success or
/// failure alike), the local file and the working directory are both targeted
/// for removal. Cleanup failures are logged and suppressed independently so
/// the directory removal always runs and the primary outcome is never
/// replaced by a cleanup error.
pub(crate) async fn run_with_guaranteed_cleanup<F>(backup_dir: &Path, steps: F) -> Result<()>
where
    F: AsyncFnOnce(&mut Option<PathBuf>) -> Result<()>,
{
    let mut artifact_path: Option<PathBuf> = None;

    let outcome = steps(&mut artifact_path).await;

    if let Err(error) = &outcome {
        log_backup_failure(error);
    }

    if let Some(path) = &artifact_path {
        if let Err(cleanup_error) = fsops::remove_local_file(path).await {
            eprintln!("⚠️ Cleanup failed but continuing: {cleanup_error:?}");
        }
    }
    if let Err(cleanup_error) = fsops::remove_directory(backup_dir).await {
        eprintln!("⚠️ Cleanup failed but continuing: {cleanup_error:?}");
    }

    outcome
}

/// Structured failures get their message and full chain logged; anything else
/// is logged verbatim without assuming it carries more detail.
fn log_backup_failure(error: &anyhow::Error) {
    eprintln!("❌ Backup failed: {error}");
    if let Some(app_error) = error.downcast_ref::<AppError>() {
        eprintln!("Error details: {app_error}");
        eprintln!("Error chain: {error:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run_dir(root: &Path) -> PathBuf {
        let dir = root.join("tmp_mongo_backups");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_artifact(dir: &Path) -> PathBuf {
        let file = dir.join("mongodb-backup-2024-03-07T14-30-05-000Z.gz");
        std::fs::write(&file, b"archive bytes").unwrap();
        file
    }

    #[tokio::test]
    async fn successful_run_still_removes_file_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());
        let file = make_artifact(&backup_dir);

        let result = run_with_guaranteed_cleanup(&backup_dir, async |slot: &mut Option<PathBuf>| {
            *slot = Some(file.clone());
            Ok(())
        })
        .await;

        assert!(result.is_ok());
        assert!(!file.exists());
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn upload_failure_cleans_the_recorded_artifact_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());
        let file = make_artifact(&backup_dir);

        let result = run_with_guaranteed_cleanup(&backup_dir, async |slot: &mut Option<PathBuf>| {
            *slot = Some(file.clone());
            Err(AppError::Upload("transfer failed".to_string()).into())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: transfer failed");
        assert!(!file.exists());
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn dump_failure_before_any_artifact_still_removes_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());

        let result = run_with_guaranteed_cleanup(&backup_dir, async |_: &mut Option<PathBuf>| {
            Err(AppError::Backup("database connection failed".to_string()).into())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("database connection failed"));
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn config_failure_skips_file_removal_and_removes_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());

        let result = run_with_guaranteed_cleanup(&backup_dir, async |slot: &mut Option<PathBuf>| {
            // Configuration loading fails before any artifact exists, so the
            // slot is never written.
            assert!(slot.is_none());
            Err(AppError::Config("MONGO_URL environment variable is not set".to_string()).into())
        })
        .await;

        assert!(
            result
                .unwrap_err()
                .downcast_ref::<AppError>()
                .is_some_and(|e| matches!(e, AppError::Config(_)))
        );
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn cleanup_runs_when_the_directory_was_never_created() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = root.path().join("never-created");

        let result = run_with_guaranteed_cleanup(&backup_dir, async |_: &mut Option<PathBuf>| {
            Err(AppError::Config("MONGO_URL environment variable is not set".to_string()).into())
        })
        .await;

        // Removing the absent directory is not an error and must not replace
        // the configuration failure.
        assert!(result.is_err());
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn failing_file_removal_is_suppressed_and_directory_removal_still_runs() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());
        // A directory recorded as the artifact path makes remove_file fail
        // with something other than NotFound.
        let stubborn = backup_dir.join("not-a-file");
        std::fs::create_dir(&stubborn).unwrap();

        let result = run_with_guaranteed_cleanup(&backup_dir, async |slot: &mut Option<PathBuf>| {
            *slot = Some(stubborn.clone());
            Ok(())
        })
        .await;

        // The run still resolves successfully and the directory sweep removed
        // everything, including the stubborn entry.
        assert!(result.is_ok());
        assert!(!backup_dir.exists());
    }

    #[tokio::test]
    async fn structured_errors_survive_the_protected_region_intact() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());

        let err = run_with_guaranteed_cleanup(&backup_dir, async |_: &mut Option<PathBuf>| {
            Err(AppError::Upload("transfer failed".to_string()).into())
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Upload(_))
        ));
    }

    #[tokio::test]
    async fn opaque_errors_are_returned_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let backup_dir = make_run_dir(root.path());

        let err = run_with_guaranteed_cleanup(&backup_dir, async |_: &mut Option<PathBuf>| {
            Err(anyhow::anyhow!("a plain string"))
        })
        .await
        .unwrap_err();

        // Not one of our structured variants; the message must come back
        // exactly as raised.
        assert!(err.downcast_ref::<AppError>().is_none());
        assert_eq!(err.to_string(), "a plain string");
    }
}
