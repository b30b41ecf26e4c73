//! radmem HTTP API server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radmem_api::{parse_allowed_origins, router, AppConfig, AppState, StoreBackend};
use radmem_db::{Database, FilesystemBackend};
use radmem_inference::{ClipEmbeddingBackend, Embedder, OllamaBackend};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "radmem_api=debug,tower_http=debug")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "radmem_api=debug,radmem_search=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("radmem-api.log");
        let (non_blocking, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(file_dir, file_name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            // no ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let db = match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            Database::in_memory(config.embed_dim)
        }
        StoreBackend::Postgres => {
            let db =
                Database::connect(&config.database_url, config.embed_dim, &config.pool_config())
                    .await?;
            db.migrate().await?;
            db
        }
    };
    db.ensure_collections().await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let config = AppConfig::from_env()?;
    let db = open_database(&config).await?;

    let uploads = FilesystemBackend::new(&config.upload_dir);
    uploads.validate().await?;
    let history_files = FilesystemBackend::new(&config.history_dir);
    history_files.validate().await?;

    let embedding = ClipEmbeddingBackend::with_config(
        config.embed_url.clone(),
        config.embed_model.clone(),
        config.embed_dim,
        config.embed_timeout_secs,
    )?;
    let embedder = Embedder::new(Arc::new(embedding), config.embed_concurrency);

    let generation = OllamaBackend::with_config(
        config.ollama_base.clone(),
        config.gen_model.clone(),
        config.gen_timeout_secs,
    )?;
    match generation.health_check().await {
        Ok(true) => info!(base_url = %config.ollama_base, model = %config.gen_model, "Generation backend reachable"),
        _ => warn!(base_url = %config.ollama_base, "Generation backend unreachable; chat replies will use the fallback text"),
    }

    let state = AppState::new(db, embedder, Arc::new(generation), uploads, history_files);
    let app = router(
        state,
        parse_allowed_origins(&config.allowed_origins),
        config.max_upload_bytes,
    );

    let addr: SocketAddr = config.bind_address().parse()?;
    info!(%addr, store = ?config.store_backend, "radmem-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
