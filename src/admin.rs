use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{FareError, Result};
use crate::fare_models::{FareDataset, UploadSummary};
use crate::ingest::{ingest_upload, SpreadsheetUpload};
use crate::store::FareStore;

#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        AdminCredentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    // Plain equality against the configured identity; no hashing scheme is in place.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Everything pulled out of the upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub username: String,
    pub password: String,
    pub file: Option<SpreadsheetUpload>,
}

/// Runs one upload through authenticate, ingest, validate, persist and report.
///
/// The form (and with it the uploaded temp file) is consumed, so the temp file is
/// removed on every exit path.
pub fn process_upload(
    credentials: &AdminCredentials,
    store: &FareStore,
    form: UploadForm,
    max_upload_bytes: u64,
) -> Result<UploadSummary> {
    let UploadForm {
        username,
        password,
        file,
    } = form;

    if !credentials.verify(&username, &password) {
        warn!("🔒 Rejected upload with invalid admin credentials");
        return Err(FareError::Unauthorized);
    }

    let upload = file.ok_or_else(|| FareError::Validation("No file uploaded".to_string()))?;

    let routes = match ingest_upload(&upload, max_upload_bytes) {
        Ok(routes) => routes,
        Err(FareError::Io(e)) => {
            error!("❌ Could not read uploaded file: {}", e);
            return Err(processing_failed(e));
        }
        Err(e) => return Err(e),
    };
    discard_upload(upload);

    let dataset = FareDataset::from_routes(routes, Utc::now());
    if dataset.is_empty() {
        return Err(FareError::EmptyResult);
    }

    store.replace(&dataset).map_err(|e| {
        error!("❌ Failed to persist uploaded dataset: {}", e);
        processing_failed(e)
    })?;

    let summary = dataset.summary();
    info!(
        "✅ Fare table replaced: {} routes, {} stops",
        summary.total_routes, summary.total_stops
    );
    Ok(summary)
}

fn processing_failed(details: impl ToString) -> FareError {
    FareError::internal_with_details(
        "Failed to process Excel file. Please check the file format and try again.",
        details,
    )
}

// Dropping also deletes; closing first lets a failed delete be logged.
fn discard_upload(upload: SpreadsheetUpload) {
    let path = upload.path().to_path_buf();
    if let Err(e) = upload.file.close() {
        warn!("⚠️  Could not remove uploaded file {:?}: {}", path, e);
    }
}
