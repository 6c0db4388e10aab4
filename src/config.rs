use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::admin::AdminCredentials;
use crate::ingest::MAX_UPLOAD_BYTES;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "changeme";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub admin: AdminCredentials,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub public_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub backup_retention: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let admin_username = lookup("ADMIN_USERNAME").unwrap_or_else(|| {
            warn!("⚠️  ADMIN_USERNAME not set, using the built-in default");
            DEFAULT_ADMIN_USERNAME.to_string()
        });
        let admin_password = lookup("ADMIN_PASSWORD").unwrap_or_else(|| {
            warn!("⚠️  ADMIN_PASSWORD not set, using the built-in default");
            DEFAULT_ADMIN_PASSWORD.to_string()
        });

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .context("Failed to parse PORT")?,
            admin: AdminCredentials::new(admin_username, admin_password),
            data_dir: lookup("FARE_DATA_DIR")
                .unwrap_or_else(|| "./data".to_string())
                .into(),
            uploads_dir: lookup("FARE_UPLOADS_DIR")
                .unwrap_or_else(|| "./uploads".to_string())
                .into(),
            public_dir: lookup("FARE_PUBLIC_DIR")
                .unwrap_or_else(|| "./public".to_string())
                .into(),
            max_upload_bytes: lookup("FARE_MAX_UPLOAD_BYTES")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("Failed to parse FARE_MAX_UPLOAD_BYTES")?
                .unwrap_or(MAX_UPLOAD_BYTES),
            backup_retention: lookup("FARE_BACKUP_RETENTION")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("Failed to parse FARE_BACKUP_RETENTION")?,
        })
    }
}
