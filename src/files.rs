//! # Upload File Store
//!
//! Persists uploaded audio payloads to the configured upload directory.
//! Client-supplied names are sanitized to a filesystem-safe form and the
//! on-disk name is a freshly generated UUID plus the original extension,
//! so concurrent uploads can never collide without any locking.

use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Result of saving one uploaded file.
#[derive(Debug, Clone)]
pub struct SavedUpload {
    /// Sanitized client-supplied filename (what the user called the file)
    pub original_filename: String,

    /// Generated on-disk name: `<uuid-v4><original extension>`
    pub unique_filename: String,

    /// Full path of the stored file
    pub path: PathBuf,
}

/// Saves uploaded byte payloads under collision-resistant names.
#[derive(Debug, Clone)]
pub struct FileStore {
    upload_dir: PathBuf,
}

impl FileStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Save one uploaded file to disk.
    ///
    /// ## Process:
    /// 1. Sanitize the client-supplied name
    /// 2. Derive `<uuid><ext>` as the storage name
    /// 3. Write the bytes into the upload directory
    ///
    /// A write failure (unwritable directory, full disk) propagates as a
    /// server error; there is no cleanup or retry.
    pub fn save(&self, client_filename: &str, bytes: &[u8]) -> AppResult<SavedUpload> {
        let original_filename = sanitize_filename(client_filename);
        let unique_filename = unique_storage_name(&original_filename);
        let path = self.upload_dir.join(&unique_filename);

        std::fs::write(&path, bytes).map_err(|e| {
            AppError::Internal(format!(
                "Failed to write upload to {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            original = %original_filename,
            stored = %unique_filename,
            size_bytes = bytes.len(),
            "Saved uploaded file"
        );

        Ok(SavedUpload {
            original_filename,
            unique_filename,
            path,
        })
    }
}

/// Reduce a client-supplied filename to a filesystem-safe form.
///
/// Takes the final path component (defeating `../../etc/passwd` style
/// names), keeps ASCII alphanumerics plus `.`, `_`, `-`, and maps every
/// other character to `_`. A name with nothing safe left falls back to the
/// fixed stem `upload` so the stored filename is never empty.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // A name of only dots or underscores carries no information.
    if cleaned.chars().all(|c| c == '.' || c == '_') {
        return "upload".to_string();
    }

    cleaned
}

/// Build the on-disk name: a random UUID keeping the original extension.
fn unique_storage_name(sanitized: &str) -> String {
    match Path::new(sanitized).extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_string_lossy()),
        None => Uuid::new_v4().to_string(),
    }
}
