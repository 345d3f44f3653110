//! Pending media domain entity
//!
//! A `PendingMedia` row is a photo (or any binary attachment) captured for a
//! task while the device may be offline. Rows are created on capture, flipped
//! to `uploaded` once the remote API acknowledges them, and removed only by
//! explicit cleanup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{MediaId, TaskId};

/// Free-form key/value metadata attached to captured media
pub type MediaMetadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// MediaContent - input for a capture
// ============================================================================

/// Binary content of a capture, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    filename: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl MediaContent {
    /// Creates new media content
    ///
    /// # Errors
    /// Returns `DomainError::InvalidMedia` if the filename is blank or
    /// contains a path separator, or if the content is empty
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, DomainError> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(DomainError::InvalidMedia("filename cannot be empty".into()));
        }
        if filename.contains('/') || filename.contains('\\') {
            return Err(DomainError::InvalidMedia(format!(
                "filename must not contain path separators: {filename}"
            )));
        }
        if bytes.is_empty() {
            return Err(DomainError::InvalidMedia(format!(
                "content of {filename} is empty"
            )));
        }

        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            guess_mime_type(&filename).to_string()
        } else {
            mime_type
        };

        Ok(Self {
            filename,
            mime_type,
            bytes,
        })
    }

    /// Creates content, inferring the MIME type from the file extension
    pub fn from_filename(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DomainError> {
        Self::new(filename, "", bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Guesses a MIME type from a filename extension, falling back to
/// `application/octet-stream`
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// PendingMedia entity
// ============================================================================

/// A persisted capture awaiting (or having completed) upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMedia {
    pub id: MediaId,
    pub task_id: TaskId,
    #[serde(skip_serializing, default)]
    pub content: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub captured_at: DateTime<Utc>,
    pub uploaded: bool,
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: MediaMetadata,
}

impl PendingMedia {
    /// Returns a lightweight reference suitable for events and logs
    pub fn media_ref(&self) -> MediaRef {
        MediaRef {
            id: self.id,
            task_id: self.task_id.clone(),
            filename: self.filename.clone(),
        }
    }

    /// Returns true if this row still needs to be uploaded
    pub fn is_pending(&self) -> bool {
        !self.uploaded
    }
}

/// Identifying fields of a media row, without the binary content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: MediaId,
    pub task_id: TaskId,
    pub filename: String,
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} (task {})", self.id, self.filename, self.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_content_validation() {
        assert!(MediaContent::new("", "image/jpeg", vec![1]).is_err());
        assert!(MediaContent::new("a/b.jpg", "image/jpeg", vec![1]).is_err());
        assert!(MediaContent::new("b.jpg", "image/jpeg", vec![]).is_err());

        let content = MediaContent::new("b.jpg", "image/jpeg", vec![1, 2, 3]).unwrap();
        assert_eq!(content.byte_size(), 3);
        assert_eq!(content.filename(), "b.jpg");
    }

    #[test]
    fn test_mime_type_guessing() {
        let content = MediaContent::from_filename("IMG_0001.JPG", vec![0xFF]).unwrap();
        assert_eq!(content.mime_type(), "image/jpeg");

        assert_eq!(guess_mime_type("plan.png"), "image/png");
        assert_eq!(guess_mime_type("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_pending_media_ref() {
        let media = PendingMedia {
            id: MediaId::new(4),
            task_id: TaskId::new("T").unwrap(),
            content: vec![1, 2],
            filename: "a.jpg".into(),
            mime_type: "image/jpeg".into(),
            byte_size: 2,
            captured_at: Utc::now(),
            uploaded: false,
            uploaded_at: None,
            metadata: MediaMetadata::new(),
        };

        assert!(media.is_pending());
        let r = media.media_ref();
        assert_eq!(r.id, MediaId::new(4));
        assert_eq!(r.to_string(), "#4 a.jpg (task T)");
    }
}
