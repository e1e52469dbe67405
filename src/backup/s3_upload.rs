// mongobackup/src/backup/s3_upload.rs
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use s3::types::{CompletedMultipartUpload, CompletedPart};
use std::io::Write;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::config::StorageConfig;
use crate::errors::AppError;

const PART_SIZE: usize = 8 * 1024 * 1024;

/// Result metadata returned by the storage service. The orchestrator treats
/// it as opaque beyond its presence.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub e_tag: Option<String>,
}

/// Uploads a local file to `bucket/s3_key` on an S3-compatible service.
///
/// Small files go up in a single PutObject; anything larger than one part is
/// sent as a multipart upload with per-part progress. A failed multipart
/// upload is aborted server-side before the error propagates.
pub async fn upload_file_to_s3(
    storage: &StorageConfig,
    bucket: &str,
    file_path: &Path,
    s3_key: &str,
) -> Result<UploadOutcome> {
    println!(
        "Uploading {} to S3 bucket {} with key {}...",
        file_path.display(),
        bucket,
        s3_key
    );

    let client = build_client(storage).await;
    let total_bytes = tokio::fs::metadata(file_path)
        .await
        .with_context(|| format!("Failed to read metadata of {}", file_path.display()))?
        .len();

    let outcome = if total_bytes <= PART_SIZE as u64 {
        put_object(&client, bucket, file_path, s3_key, total_bytes).await
    } else {
        multipart_upload(&client, bucket, file_path, s3_key, total_bytes).await
    }?;

    println!("✅ File uploaded successfully to S3: s3://{bucket}/{s3_key}");
    Ok(outcome)
}

async fn build_client(storage: &StorageConfig) -> s3::Client {
    let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
        .region(Region::new(storage.region.clone()))
        .credentials_provider(s3::config::Credentials::new(
            &storage.access_key_id,
            &storage.secret_access_key,
            None,     // session_token
            None,     // expiry
            "Static", // provider_name
        ));
    if let Some(endpoint_url) = &storage.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    s3::Client::new(&loader.load().await)
}

async fn put_object(
    client: &s3::Client,
    bucket: &str,
    file_path: &Path,
    s3_key: &str,
    total_bytes: u64,
) -> Result<UploadOutcome> {
    let body = ByteStream::from_path(file_path).await.with_context(|| {
        format!("Failed to open {} for upload", file_path.display())
    })?;

    let response = client
        .put_object()
        .bucket(bucket)
        .key(s3_key)
        .body(body)
        .send()
        .await
        .map_err(|e| AppError::Upload(format!("PutObject of {s3_key} failed: {e}")))?;

    report_progress(total_bytes, total_bytes);
    println!();

    Ok(UploadOutcome {
        e_tag: response.e_tag().map(str::to_string),
    })
}

async fn multipart_upload(
    client: &s3::Client,
    bucket: &str,
    file_path: &Path,
    s3_key: &str,
    total_bytes: u64,
) -> Result<UploadOutcome> {
    let created = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(s3_key)
        .send()
        .await
        .map_err(|e| AppError::Upload(format!("Failed to start multipart upload of {s3_key}: {e}")))?;
    let upload_id = created
        .upload_id()
        .context("S3 returned no upload id for the multipart upload")?
        .to_string();

    match stream_parts(client, bucket, file_path, s3_key, &upload_id, total_bytes).await {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            // Leave nothing half-uploaded on the server; the abort's own
            // failure must not mask the upload error.
            if let Err(abort_error) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(s3_key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                eprintln!("⚠️ Failed to abort multipart upload {upload_id}: {abort_error}");
            }
            Err(error)
        }
    }
}

async fn stream_parts(
    client: &s3::Client,
    bucket: &str,
    file_path: &Path,
    s3_key: &str,
    upload_id: &str,
    total_bytes: u64,
) -> Result<UploadOutcome> {
    let mut file = File::open(file_path)
        .await
        .with_context(|| format!("Failed to open {} for upload", file_path.display()))?;

    let mut completed_parts = Vec::new();
    let mut uploaded_bytes: u64 = 0;
    let mut part_number: i32 = 1;

    loop {
        let chunk = read_part(&mut file, PART_SIZE).await?;
        if chunk.is_empty() {
            break;
        }
        let chunk_len = chunk.len() as u64;

        let part = client
            .upload_part()
            .bucket(bucket)
            .key(s3_key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(chunk))
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!("Failed to upload part {part_number} of {s3_key}: {e}"))
            })?;

        completed_parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(part.e_tag().map(str::to_string))
                .build(),
        );
        uploaded_bytes += chunk_len;
        report_progress(uploaded_bytes, total_bytes);
        part_number += 1;
    }
    println!();

    let completed = CompletedMultipartUpload::builder()
        .set_parts(Some(completed_parts))
        .build();
    let response = client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(s3_key)
        .upload_id(upload_id)
        .multipart_upload(completed)
        .send()
        .await
        .map_err(|e| {
            AppError::Upload(format!("Failed to complete multipart upload of {s3_key}: {e}"))
        })?;

    Ok(UploadOutcome {
        e_tag: response.e_tag().map(str::to_string),
    })
}

/// Fills a buffer of up to `max` bytes, stopping early only at end of file.
async fn read_part(file: &mut File, max: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; max];
    let mut filled = 0;
    while filled < max {
        let n = file
            .read(&mut buffer[filled..])
            .await
            .context("Failed to read backup file for upload")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

/// Best-effort, purely observational progress output. Nothing is emitted when
/// the total size is unknown.
fn report_progress(loaded_bytes: u64, total_bytes: u64) {
    if let Some(line) = progress_line(loaded_bytes, total_bytes) {
        print!("\r{line}");
        let _ = std::io::stdout().flush();
    }
}

fn progress_line(loaded_bytes: u64, total_bytes: u64) -> Option<String> {
    if total_bytes == 0 {
        return None;
    }
    let percentage = (loaded_bytes as f64 / total_bytes as f64 * 100.0).round();
    let loaded_mb = loaded_bytes as f64 / 1024.0 / 1024.0;
    let total_mb = total_bytes as f64 / 1024.0 / 1024.0;
    Some(format!(
        "Upload progress: {percentage:.0}% ({loaded_mb:.2}/{total_mb:.2} MB)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_reports_percentage_and_megabytes() {
        let line = progress_line(4 * 1024 * 1024, 8 * 1024 * 1024).unwrap();
        assert_eq!(line, "Upload progress: 50% (4.00/8.00 MB)");
    }

    #[test]
    fn progress_line_rounds_to_whole_percent() {
        let line = progress_line(1, 3).unwrap();
        assert!(line.starts_with("Upload progress: 33%"), "{line}");
    }

    #[test]
    fn progress_line_is_suppressed_without_a_total() {
        assert_eq!(progress_line(1024, 0), None);
    }

    #[tokio::test]
    async fn read_part_caps_each_chunk_and_drains_the_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("dump.gz");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut file = File::open(&path).await.unwrap();
        assert_eq!(read_part(&mut file, 4).await.unwrap(), b"0123");
        assert_eq!(read_part(&mut file, 4).await.unwrap(), b"4567");
        assert_eq!(read_part(&mut file, 4).await.unwrap(), b"89");
        assert!(read_part(&mut file, 4).await.unwrap().is_empty());
    }
}
