//! bulletin-editor-media: getting images into a bulletin document.
//!
//! This crate provides:
//! - `UploadService` - the contract for storing blobs and issuing reference keys
//! - `MediaPolicy` - type allow-list and size ceiling, checked on sniffed bytes
//! - `MediaPipeline` - ordered single-slot insertion with selection capture
//! - paste, drop and drag-over entry points

pub mod entry;
pub mod pipeline;
pub mod policy;
pub mod upload;

pub use entry::{DropOutcome, IgnoreReason, IgnoredFile, accepts_drag};
pub use pipeline::{
    InsertionOutcome, InsertionSource, InsertionState, MediaPipeline, PendingInsertion,
};
pub use policy::MediaPolicy;
pub use upload::{MediaBlob, UploadError, UploadService, UploadedMedia};

#[cfg(test)]
mod test_support;
