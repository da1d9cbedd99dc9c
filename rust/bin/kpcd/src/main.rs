//! `kpcd` — the certificate registry server binary.
//!
//! Usage:
//!   kpcd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/kpc/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod bootstrap;
mod config;
mod login;
mod routes;

use std::sync::Arc;

use clap::Parser;
use jsonwebtoken::{DecodingKey, Validation};
use kpc::service::KpcService;
use kpc::KpcModule;
use kpc_core::Module;
use tracing::info;

use auth_middleware::JwtState;
use config::ServerConfig;
use routes::AppState;

/// Kimberley Process certificate registry server.
#[derive(Parser, Debug)]
#[command(name = "kpcd", about = "Kimberley Process certificate registry server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    bootstrap::verify_config(&server_config)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = kpc_core::ServiceConfig {
        data_dir: Some(data_dir),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    let sql = kpc_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
        .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?;

    let service = KpcService::new(Box::new(sql), server_config.registry.receipt_number_seed)
        .map_err(|e| anyhow::anyhow!("failed to initialize registry: {}", e))?;
    let module = KpcModule::new(service);
    info!("Registry module initialized");

    let jwt_state = Arc::new(JwtState {
        decoding_key: DecodingKey::from_secret(server_config.jwt.secret.as_bytes()),
        validation: Validation::default(),
    });

    let app_state = AppState {
        jwt_state,
        server_config: Arc::new(server_config),
        service: module.service(),
    };

    let app = routes::build_router(app_state, vec![(module.name(), module.routes())]);

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("kpcd listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
