//! # Application State Management
//!
//! Shared state handed to every HTTP request handler: the immutable
//! configuration, the injected pipeline components (file store, engine,
//! persistence gateway), and the request metrics counters.
//!
//! ## Composition:
//! Everything in here is constructed once in `main` and passed in; no
//! component constructs itself lazily or reads global state. Handlers get
//! the same engine instance regardless of which implementation the
//! composition root selected.
//!
//! ## Thread Safety:
//! Configuration never changes after startup, so it is shared as a plain
//! clone. Metrics are the only mutable state and sit behind `Arc<RwLock>`;
//! every request takes a short write lock to bump counters.

use crate::config::AppConfig;
use crate::files::FileStore;
use crate::storage::TranscriptionStore;
use crate::transcription::Transcriber;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Configuration, fixed at startup
    pub config: Arc<AppConfig>,

    /// Persistence gateway over transcription records
    pub store: TranscriptionStore,

    /// Upload file store
    pub files: FileStore,

    /// The transcription engine selected by the composition root
    pub engine: Arc<dyn Transcriber>,

    /// Request metrics, updated by middleware
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Request metrics collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses since server start
    pub error_count: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance counters for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: TranscriptionStore,
        files: FileStore,
        engine: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            files,
            engine,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record one finished request against its endpoint counters.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for serialization.
    ///
    /// Clones so the lock is released before response generation.
    pub fn metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
