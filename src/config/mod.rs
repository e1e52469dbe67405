// mongobackup/src/config/mod.rs
use anyhow::Result;
use std::env;

use crate::errors::AppError;

/// Everything a single backup run needs, read once from the environment.
#[derive(Debug, Clone)]
pub struct BackupEnv {
    pub mongo_uri: String,
    pub s3_bucket_name: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_region: String,
    pub aws_endpoint_url: Option<String>,
}

/// The subset of settings the S3 uploader needs to build its client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl BackupEnv {
    /// Loads and validates the environment, stopping at the first missing
    /// required variable.
    pub fn load() -> Result<Self> {
        Ok(BackupEnv {
            mongo_uri: required_var("MONGO_URL")?,
            s3_bucket_name: required_var("S3_BUCKET_NAME")?,
            aws_access_key_id: required_var("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: required_var("AWS_SECRET_ACCESS_KEY")?,
            aws_region: required_var("AWS_REGION")?,
            aws_endpoint_url: optional_var("AWS_ENDPOINT_URL"),
        })
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            region: self.aws_region.clone(),
            access_key_id: self.aws_access_key_id.clone(),
            secret_access_key: self.aws_secret_access_key.clone(),
            endpoint_url: self.aws_endpoint_url.clone(),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!("{name} environment variable is not set")).into()),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
