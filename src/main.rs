//! # Voice Notes Backend - Main Application Entry Point
//!
//! An HTTP backend that accepts uploaded audio files, transcribes them with
//! a Whisper model, persists the transcripts, and answers queries over the
//! stored records.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **error**: the crate error type and its HTTP mapping
//! - **state**: shared application state handed to every handler
//! - **files**: upload persistence under collision-resistant names
//! - **storage**: the transcription record table and its gateway
//! - **transcription**: the Transcriber seam and its engines
//! - **handlers**: the transcription pipeline and query endpoints
//! - **health / middleware**: health checks, request logging, metrics
//!
//! `main` is the composition root: it builds every component exactly once
//! (including the transcription engine, which is expensive to initialize)
//! and wires them together through `AppState`.

mod config;
mod device;
mod error;
mod files;
mod handlers;
mod health;
mod middleware;
mod state;
mod storage;
mod transcription;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::{FixedTranscriber, Transcriber, WhisperTranscriber};

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-notes-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.environment);
    info!("Upload directory: {}", config.storage.upload_dir);
    info!("Database: {}", config.storage.database_url);

    config.ensure_directories()?;

    let pool = storage::connect(&config.storage.database_url).await?;
    let store = storage::TranscriptionStore::new(pool);
    store
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize database schema: {}", e))?;

    let files = files::FileStore::new(&config.storage.upload_dir);

    // The composition root picks the engine; nothing downstream branches on
    // the profile again. The testing profile skips the model download and
    // runs the pipeline against fixed output.
    let engine: Arc<dyn Transcriber> = if config.environment.is_testing() {
        info!("Testing profile active, using fixed transcription output");
        Arc::new(FixedTranscriber::default())
    } else {
        Arc::new(WhisperTranscriber::load(&config.models).await?)
    };
    info!("Transcription engine ready: {}", engine.name());

    let app_state = AppState::new(config.clone(), store, files, engine);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal.
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` controls the filter; the default keeps this crate at debug
/// and actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_notes_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and flip the shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag until it is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
