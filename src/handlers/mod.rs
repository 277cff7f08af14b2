//! HTTP request handlers and route registration.

pub mod transcriptions;

use actix_web::web;

pub use transcriptions::{
    get_transcription, list_transcriptions, search_transcriptions, transcribe,
};

/// Register every route of the HTTP surface.
///
/// Shared between `main` and the handler tests so both always exercise the
/// same routing table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(crate::health::health_check))
        .route("/metrics", web::get().to(crate::health::detailed_metrics))
        .route("/transcribe", web::post().to(transcribe))
        .route("/transcriptions", web::get().to(list_transcriptions))
        .route("/search", web::get().to(search_transcriptions))
        .route("/transcriptions/{id}", web::get().to(get_transcription));
}
