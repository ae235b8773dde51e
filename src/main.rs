use std::process::ExitCode;

use tracing::{error, info, warn};

use jotter::web::WebServer;
use jotter::{Config, Database, FileStorage};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = jotter::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        jotter::logging::init_console_only(&config.logging.level);
    }

    info!("Jotter - personal notes and file storage");

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&config.database.path, config.database.max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    let storage = match FileStorage::new(&config.storage.path) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to initialize file storage: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("File storage initialized at: {}", config.storage.path);
    match storage.cleanup_empty_dirs() {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed empty blob directories"),
        Err(e) => warn!("Failed to clean up blob directories: {e}"),
    }

    let server = match WebServer::new(&config, db, storage) {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Server configured on {}", server.addr());
    if let Err(e) = server.run().await {
        error!("Web server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
