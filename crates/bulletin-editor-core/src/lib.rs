//! bulletin-editor-core: rich-text editing engine for board posts.
//!
//! This crate provides:
//! - `DocumentTree` - arena tree of blocks, text runs and media, with a step journal
//! - `SelectionTracker` - live selection plus held captures mapped through edits
//! - `inspect` - format state at a selection, for toolbar highlighting
//! - `execute` - inline and block commands
//! - `EditorSurface` - one mounted editor: hydrate, serialize, events, notifications
//! - `LinkDialog` - the two-state link insertion flow
//!
//! The crate has no host dependencies. Hosts feed it [`HostEvent`]s and
//! render the HTML it produces.

pub mod actions;
pub mod config;
pub mod document;
pub mod error;
pub mod execute;
pub mod format;
pub mod html;
pub mod link;
pub mod node;
pub mod selection;
pub mod sink;
pub mod tree;
pub mod types;

pub use actions::{Command, InlineFlag};
pub use config::EditorConfig;
pub use document::{EditorSurface, HostEvent, MediaInsertion};
pub use error::EditorError;
pub use execute::{
    delete_backward, delete_selection, ensure_editable, execute, execute_named, insert_run,
    insert_text, split_block,
};
pub use format::{FormatState, inspect};
pub use html::{PLACEHOLDER_CLASS, parse_html, render, serialize};
pub use link::LinkDialog;
pub use node::{
    BlockKind, Color, HeadingLevel, InlineStyle, Link, MediaKey, MediaNode, NodeKind, TextRun,
};
pub use selection::SelectionTracker;
pub use sink::{DocumentSink, SavedDocument};
pub use smol_str::SmolStr;
pub use tree::{DocumentTree, Step, map_position};
pub use types::{CaptureId, NodeId, Position, Selection};
