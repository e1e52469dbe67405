mod logic;
pub(crate) mod db_dump; // mongodump invocation and artifact handling
pub(crate) mod s3_upload; // S3 client and multipart upload

use anyhow::Result;

/// Public entry point for the backup process.
///
/// Reads its configuration from the environment and performs one
/// dump-upload-cleanup run.
pub async fn run_backup_flow() -> Result<()> {
    logic::execute_backup_process().await
}
