//! # Transcription Record
//!
//! The persisted representation of one transcribed upload, and the public
//! view every endpoint serializes. Records are immutable after creation;
//! there are no update or delete operations anywhere in the service.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the `transcriptions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transcription {
    /// Assigned by the storage engine on insert; never reused
    pub id: i64,

    /// Sanitized original client-supplied filename
    pub filename: String,

    /// Generated on-disk name (UUID + original extension)
    pub unique_filename: String,

    /// Transcript output; may be empty but is always present
    pub text: String,

    /// Creation time, drives the newest-first default ordering
    pub created_at: DateTime<Utc>,
}

/// Public JSON view of a record: exactly these five fields, with the
/// timestamp rendered as an ISO-8601 string.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionView {
    pub id: i64,
    pub filename: String,
    pub unique_filename: String,
    pub text: String,
    pub created_at: String,
}

impl Transcription {
    pub fn to_view(&self) -> TranscriptionView {
        TranscriptionView {
            id: self.id,
            filename: self.filename.clone(),
            unique_filename: self.unique_filename.clone(),
            text: self.text.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_view_serializes_iso8601_timestamp() {
        let record = Transcription {
            id: 1,
            filename: "clip.wav".to_string(),
            unique_filename: "0000-1111.wav".to_string(),
            text: "hello".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        };

        let view = record.to_view();
        assert_eq!(view.created_at, "2024-05-01T12:30:00+00:00");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["filename"], "clip.wav");
        assert_eq!(json["unique_filename"], "0000-1111.wav");
        assert_eq!(json["text"], "hello");
        // The public view has exactly five fields.
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
