//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! The configuration is built once at startup, validated, and then shared
//! read-only with every component that needs it. There is no runtime
//! mutation; changing configuration means restarting the process.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, HOST, PORT, DATABASE_URL, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Deployment profile selecting environment-specific behavior.
///
/// The `testing` profile makes the composition root inject the fixed-output
/// transcriber instead of loading the Whisper model; nothing inside the
/// production engine ever inspects this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(anyhow::anyhow!("Unknown environment: {}", other)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", name)
    }
}

impl Environment {
    /// Whether this profile runs with the fixed-output transcriber.
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }
}

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active deployment profile (development/testing/production)
    pub environment: Environment,

    /// Framework secret (kept for parity with conventional web app config;
    /// request handling does not use it)
    pub secret_key: String,

    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelsConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind to ("127.0.0.1" for development,
///   "0.0.0.0" to accept connections from any address)
/// - `port`: TCP port number to listen on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Storage configuration: where uploads and transcripts live.
///
/// ## Fields:
/// - `database_url`: SQLite connection string (e.g. "sqlite://instance/voice_notes.db")
/// - `upload_dir`: directory receiving uploaded audio files
/// - `max_upload_bytes`: per-file size cap enforced while reading the upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

/// Speech-to-text model configuration.
///
/// ## Fields:
/// - `whisper_model`: Whisper variant to load ("tiny", "base", "small",
///   "medium", "large")
/// - `language`: ISO 639-1 language hint passed to the decoder
/// - `device`: inference device preference ("auto", "cpu", "cuda", "metal")
///
/// ## Model size trade-offs:
/// Smaller models load and transcribe faster with lower accuracy; larger
/// models need more memory and time per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub whisper_model: String,
    pub language: String,
    pub device: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            secret_key: "hard to guess string".to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                database_url: "sqlite://instance/voice_notes.db".to_string(),
                upload_dir: "uploads".to_string(),
                max_upload_bytes: 16 * 1024 * 1024, // 16 MiB per uploaded file
            },
            models: ModelsConfig {
                whisper_model: "tiny".to_string(),
                language: "en".to_string(),
                device: "auto".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_ENVIRONMENT=testing`: select the testing profile
    /// - `APP_SERVER_HOST=0.0.0.0`: override server host
    /// - `HOST`, `PORT`, `DATABASE_URL`: deployment-platform conventions that
    ///   override their nested equivalents
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly set these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(db_url) = env::var("DATABASE_URL") {
            settings = settings.set_override("storage.database_url", db_url)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching bad values here gives one clear startup error instead of a
    /// confusing failure deep inside the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.upload_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Upload directory cannot be empty"));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.storage.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("Database URL cannot be empty"));
        }

        Ok(())
    }

    /// Create the directories the application writes to.
    ///
    /// Makes the upload directory and the database file's parent directory,
    /// so a fresh checkout starts without manual setup. In-memory databases
    /// have no parent directory and are skipped.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage.upload_dir)?;

        if let Some(db_path) = self.database_file_path() {
            if let Some(parent) = Path::new(&db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        Ok(())
    }

    /// Extract the filesystem path from the SQLite URL, if it has one.
    fn database_file_path(&self) -> Option<String> {
        let url = self.storage.database_url.as_str();
        let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
        if rest.starts_with(":memory:") || rest.is_empty() {
            return None;
        }
        // Drop query parameters like ?mode=rwc
        let path = rest.split('?').next().unwrap_or(rest);
        Some(path.to_string())
    }
}
