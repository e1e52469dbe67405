//! MongoDB Backup Tool
//!
//! Dumps a MongoDB database with mongodump, uploads the gzip archive to an
//! S3-compatible bucket and always cleans up the local artifacts afterwards.

mod backup;
mod config;
mod errors;
mod utils;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    match backup::run_backup_flow().await {
        Ok(_) => {
            println!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ A critical error occurred at the top level: {e:?}");
            ExitCode::FAILURE
        }
    }
}
