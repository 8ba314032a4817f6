//! Media allow-list and size ceiling.

use bulletin_editor_core::EditorError;
use mime_sniffer::MimeTypeSniffer;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::upload::MediaBlob;

const FALLBACK_TYPE: &str = "application/octet-stream";

/// Which blobs may be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPolicy {
    pub allowed_types: Vec<SmolStr>,
    pub max_bytes: u64,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            allowed_types: ["image/png", "image/jpeg", "image/gif", "image/webp"]
                .into_iter()
                .map(SmolStr::new_static)
                .collect(),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl MediaPolicy {
    /// Type of the blob as sniffed from its bytes, falling back to the
    /// declared type, then to `application/octet-stream`.
    pub fn effective_type(blob: &MediaBlob) -> SmolStr {
        if let Some(sniffed) = blob.data.sniff_mime_type() {
            return SmolStr::new(sniffed);
        }
        blob.declared_type
            .as_ref()
            .map(|t| SmolStr::new(t.trim().to_ascii_lowercase()))
            .unwrap_or_else(|| SmolStr::new_static(FALLBACK_TYPE))
    }

    /// True if the blob looks like an image of any kind, allowed or not.
    pub fn is_image(blob: &MediaBlob) -> bool {
        Self::effective_type(blob).starts_with("image/")
    }

    /// Check a blob against the policy, returning its effective type.
    pub fn validate(&self, blob: &MediaBlob) -> Result<SmolStr, EditorError> {
        let mime = Self::effective_type(blob);
        if !self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&mime)) {
            return Err(EditorError::UnsupportedMediaType {
                mime: mime.to_string(),
            });
        }
        if blob.len() > self.max_bytes {
            return Err(EditorError::MediaTooLarge {
                size: blob.len(),
                limit: self.max_bytes,
            });
        }
        Ok(mime)
    }
}
