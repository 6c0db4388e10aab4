use actix_files::{Files, NamedFile};
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::admin::{process_upload, AdminCredentials, LoginRequest, UploadForm};
use crate::config::AppConfig;
use crate::error::FareError;
use crate::fare_models::{ApiResponse, SearchResponse};
use crate::ingest::SpreadsheetUpload;
use crate::store::FareStore;

const FILE_FIELD: &str = "excelFile";
const MAX_TEXT_FIELD_BYTES: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FareStore>,
    pub admin: AdminCredentials,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self, FareError> {
        std::fs::create_dir_all(&config.uploads_dir)?;
        let store = FareStore::open(&config.data_dir, config.backup_retention)?;

        Ok(AppState {
            store: Arc::new(store),
            admin: config.admin.clone(),
            uploads_dir: config.uploads_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    from: Option<String>,
    to: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        FareError::Validation(format!("Invalid request body: {}", err)).into()
    }))
    .route("/health", web::get().to(health_check))
    .service(
        web::scope("/api")
            .route("/fare-data", web::get().to(get_fare_data))
            .route("/search-fare", web::get().to(search_fare))
            .route("/admin/login", web::post().to(admin_login))
            .route("/admin/upload", web::post().to(upload_fare_table)),
    );
}

/// Static pages. Register after `configure`, the file service claims `/`.
pub fn configure_frontend(public_dir: PathBuf) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        if !public_dir.is_dir() {
            warn!("⚠️  Public directory {:?} not found, frontend disabled", public_dir);
            return;
        }

        let admin_page = public_dir.join("admin.html");
        cfg.route(
            "/admin",
            web::get().to(move || NamedFile::open_async(admin_page.clone())),
        )
        .service(Files::new("/", public_dir).index_file("index.html"));
    }
}

// ============================================================================
// API Endpoints
// ============================================================================

async fn get_fare_data(state: web::Data<AppState>) -> Result<HttpResponse, FareError> {
    let store = state.store.clone();
    let dataset = run_blocking(move || store.read()).await.map_err(|e| {
        error!("❌ Error reading fare data: {}", e);
        FareError::internal("Failed to read fare data")
    })?;

    debug!(
        "📊 Fare data requested: {} routes, {} stops",
        dataset.routes.len(),
        dataset.stops.len()
    );
    Ok(HttpResponse::Ok().json(dataset))
}

async fn search_fare(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, FareError> {
    let SearchQuery { from, to } = query.into_inner();
    let (Some(from), Some(to)) = (
        from.filter(|s| !s.is_empty()),
        to.filter(|s| !s.is_empty()),
    ) else {
        return Err(FareError::Validation(
            "From and To parameters are required".to_string(),
        ));
    };

    let store = state.store.clone();
    let dataset = run_blocking(move || store.load())
        .await
        .map_err(|e| {
            error!("❌ Search fare error: {}", e);
            FareError::internal("Failed to search fare")
        })?
        .ok_or_else(|| FareError::NotFound("Fare data not found".to_string()))?;

    let found = dataset.find_fare(&from, &to);
    match &found {
        Some(m) => debug!("🔎 {} → {}: {:?} match, fare {}", from, to, m.kind, m.route.fare),
        None => debug!("🔎 {} → {}: no route", from, to),
    }

    Ok(HttpResponse::Ok().json(SearchResponse::from(found)))
}

async fn admin_login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, FareError> {
    if !state.admin.verify(&body.username, &body.password) {
        warn!("🔒 Failed admin login attempt");
        return Err(FareError::Unauthorized);
    }

    info!("🔓 Admin logged in");
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Login successful")))
}

async fn upload_fare_table(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, FareError> {
    let form = read_upload_form(&mut payload, &state.uploads_dir, state.max_upload_bytes).await?;

    let store = state.store.clone();
    let admin = state.admin.clone();
    let max_bytes = state.max_upload_bytes;
    let summary = run_blocking(move || process_upload(&admin, &store, form, max_bytes)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Excel file uploaded and converted successfully",
        summary,
    )))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "Bus Fare Finder",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

async fn run_blocking<T, F>(task: F) -> Result<T, FareError>
where
    F: FnOnce() -> Result<T, FareError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        error!("❌ Blocking task panicked: {}", e);
        FareError::internal("Background task failed")
    })?
}

fn malformed(err: MultipartError) -> FareError {
    FareError::Validation(format!("Malformed upload: {}", err))
}

/// Streams the multipart body: the spreadsheet goes to a temp file, the rest into memory.
///
/// Once the file passes `max_bytes` the rest of the body is left unread; the ingest
/// stage rejects the oversized upload after authentication.
async fn read_upload_form(
    payload: &mut Multipart,
    uploads_dir: &Path,
    max_bytes: u64,
) -> Result<UploadForm, FareError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let upload = save_file_field(&mut field, uploads_dir, max_bytes).await?;
                let oversized = upload.size > max_bytes;
                form.file = Some(upload);
                if oversized {
                    warn!("⚠️  Upload over {} bytes, rest of the form ignored", max_bytes);
                    break;
                }
            }
            "username" => form.username = read_text_field(&mut field).await?,
            "password" => form.password = read_text_field(&mut field).await?,
            _ => {
                while field.try_next().await.map_err(malformed)?.is_some() {}
            }
        }
    }

    Ok(form)
}

async fn save_file_field(
    field: &mut Field,
    uploads_dir: &Path,
    max_bytes: u64,
) -> Result<SpreadsheetUpload, FareError> {
    let original_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or_default()
        .to_string();
    let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".tmp")
        .tempfile_in(uploads_dir)?;

    let mut size: u64 = 0;
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        size += chunk.len() as u64;
        if size > max_bytes {
            break;
        }
        file.write_all(&chunk)?;
    }
    file.flush()?;

    Ok(SpreadsheetUpload {
        file,
        original_name,
        content_type,
        size,
    })
}

async fn read_text_field(field: &mut Field) -> Result<String, FareError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if bytes.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(FareError::Validation("Form field too large".to_string()));
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes)
        .map_err(|_| FareError::Validation("Form field is not valid UTF-8".to_string()))
}
