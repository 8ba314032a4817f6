//! Core editor types: node identity, positions, selections and capture handles.
//!
//! These types are plain values. Whether a position still points at something
//! real is a question only the [`DocumentTree`](crate::DocumentTree) can answer.

use std::fmt;

/// Stable identifier of a node in the document tree.
///
/// Identifiers are allocated from a counter that only ever grows, including
/// across wholesale re-hydration, so a stale id can never alias a new node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw numeric value, useful for display attributes and logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A point inside a leaf node.
///
/// For text runs the offset counts chars (NOT bytes). For media nodes the
/// offset is `0` (before the image) or `1` (after it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// Document order of the two ends is only known to the tree, see
/// [`DocumentTree::ordered`](crate::DocumentTree::ordered).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Where selection started
    pub anchor: Position,
    /// Where cursor is now
    pub head: Position,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(at: Position) -> Self {
        Self { anchor: at, head: at }
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Collapse onto the head.
    pub fn collapse_to_head(self) -> Self {
        Self::collapsed(self.head)
    }
}

/// Handle for a selection held across an asynchronous detour.
///
/// Held selections are re-derived through every tree mutation until released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureId(pub(crate) u64);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture#{}", self.0)
    }
}
