//! Upload service contract.

use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use bulletin_editor_core::{EditorError, MediaKey};
use bytes::Bytes;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// A file handed to the editor by the toolbar, a paste or a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub name: Option<SmolStr>,
    /// Type claimed by the host. Only used when sniffing the bytes is inconclusive.
    pub declared_type: Option<SmolStr>,
    pub alt: Option<SmolStr>,
    pub data: Bytes,
}

impl MediaBlob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            declared_type: None,
            alt: None,
            data: data.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, mime: impl Into<SmolStr>) -> Self {
        self.declared_type = Some(mime.into());
        self
    }

    pub fn with_alt(mut self, alt: impl Into<SmolStr>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What the service hands back for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Opaque reference key, embedded in the document.
    pub key: MediaKey,
    pub url: SmolStr,
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UploadError {
    /// The service refused the blob (its own size or type rules).
    #[error("rejected by upload service: {0}")]
    #[diagnostic(code(bulletin::upload::rejected))]
    Rejected(String),

    #[error("transport failure: {0}")]
    #[diagnostic(code(bulletin::upload::transport))]
    Transport(String),
}

impl From<UploadError> for EditorError {
    fn from(err: UploadError) -> Self {
        EditorError::Upload(err.to_string())
    }
}

/// Stores blobs and hands back reference keys.
///
/// The pipeline calls this at most once per insertion attempt and never
/// retries; retry policy belongs to the service.
pub trait UploadService {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>>;
}

impl<T: UploadService> UploadService for &T {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>> {
        (**self).upload(blob)
    }
}

impl<T: UploadService> UploadService for Rc<T> {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>> {
        (**self).upload(blob)
    }
}

impl<T: UploadService> UploadService for Arc<T> {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>> {
        (**self).upload(blob)
    }
}
