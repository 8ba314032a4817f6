//! Error types for editor operations.

use miette::Diagnostic;
use thiserror::Error;

use crate::node::MediaKey;

/// Errors surfaced by the editing engine.
///
/// None of these are fatal to the editing surface: every operation that
/// returns one leaves the document tree exactly as it was.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    /// Blob type is not on the media allow-list.
    #[error("unsupported media type: {mime}")]
    #[diagnostic(
        code(bulletin::media::unsupported_type),
        help("only PNG, JPEG, GIF and WebP images can be embedded")
    )]
    UnsupportedMediaType { mime: String },

    /// Blob exceeds the size ceiling.
    #[error("media is {size} bytes, limit is {limit} bytes")]
    #[diagnostic(code(bulletin::media::too_large))]
    MediaTooLarge { size: u64, limit: u64 },

    /// Upload service rejected the blob or the transport failed.
    #[error("upload failed: {0}")]
    #[diagnostic(code(bulletin::media::upload))]
    Upload(String),

    /// Unknown command name or bad argument.
    #[error("invalid command: {0}")]
    #[diagnostic(code(bulletin::command::invalid))]
    InvalidCommand(String),

    /// The selection no longer points into the tree.
    #[error("selection is no longer attached to the document")]
    #[diagnostic(code(bulletin::selection::unavailable))]
    SelectionUnavailable,

    /// Initial HTML could not be parsed.
    #[error("malformed HTML at byte {offset}: {reason}")]
    #[diagnostic(
        code(bulletin::hydrate::malformed),
        help("the editor was reset to an empty document")
    )]
    MalformedHydrationInput { offset: usize, reason: String },

    /// A reference key was issued twice.
    #[error("media key {0} is already in the document")]
    #[diagnostic(code(bulletin::media::duplicate_key))]
    DuplicateMediaKey(MediaKey),

    /// Link dialog submitted with an empty name or URL.
    #[error("link name and URL are both required")]
    #[diagnostic(code(bulletin::link::incomplete))]
    LinkFieldsIncomplete,

    #[error("link dialog is not open")]
    #[diagnostic(code(bulletin::link::not_open))]
    DialogNotOpen,

    /// The editing surface was torn down.
    #[error("editing surface is unmounted")]
    #[diagnostic(code(bulletin::surface::unmounted))]
    SurfaceUnmounted,
}

impl EditorError {
    /// Validation errors are raised before any state transition.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType { .. } | Self::MediaTooLarge { .. } | Self::InvalidCommand(_)
        )
    }
}
