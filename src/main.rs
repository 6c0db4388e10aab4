// Bus fare lookup server with admin spreadsheet upload and a static web UI.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fare_finder_web::config::AppConfig;
use fare_finder_web::handlers::{self, AppState};

// ============================================================================
// Server Setup
// ============================================================================

fn print_banner(config: &AppConfig) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║   🚌 Bus Fare Finder                                       ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
    println!("🌐 Server running on: http://{}:{}", config.host, config.port);
    println!("📁 Data directory:    {:?}", config.data_dir);
    println!("📤 Uploads directory: {:?}\n", config.uploads_dir);

    println!("📍 Available Routes:");
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│   GET  /                       - Fare search UI             │");
    println!("│   GET  /admin                  - Admin UI                   │");
    println!("│   GET  /health                 - Health check               │");
    println!("│   GET  /api/fare-data          - Full fare table            │");
    println!("│   GET  /api/search-fare        - Fare between two stops     │");
    println!("│   POST /api/admin/login        - Check admin credentials    │");
    println!("│   POST /api/admin/upload       - Replace fare table (xlsx)  │");
    println!("└─────────────────────────────────────────────────────────────┘\n");
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let app_state = AppState::new(&config).context("Failed to prepare data directories")?;
    info!("Admin user: {}", config.admin.username());

    print_banner(&config);

    let public_dir = config.public_dir.clone();
    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(handlers::configure)
            .configure(handlers::configure_frontend(public_dir.clone()))
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    actix_web::rt::System::new().block_on(run_server(config))
}
