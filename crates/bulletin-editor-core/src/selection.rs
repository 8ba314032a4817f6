//! Selection tracking across tree mutations and asynchronous detours.
//!
//! The tracker owns the live selection reported by the host, plus any number
//! of held captures. A held capture is taken synchronously when a gesture
//! starts something asynchronous (an upload, the link dialog) and is mapped
//! through every later tree mutation until it is released, so it keeps
//! pointing at the same logical place even while other edits land.

use std::collections::BTreeMap;

use crate::tree::{DocumentTree, Step};
use crate::types::{CaptureId, Selection};

#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    live: Option<Selection>,
    held: BTreeMap<CaptureId, Option<Selection>>,
    next_capture: u64,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the live selection, `None` if nothing is selected.
    pub fn capture(&self) -> Option<Selection> {
        self.live
    }

    /// Re-apply a captured selection.
    ///
    /// Returns `false` if it references detached nodes; the live selection is
    /// left alone in that case.
    pub fn restore(&mut self, tree: &DocumentTree, selection: Selection) -> bool {
        if tree.is_valid(&selection) {
            self.live = Some(selection);
            true
        } else {
            false
        }
    }

    /// Set the live selection as reported by the host. Stale selections are dropped.
    pub fn set(&mut self, tree: &DocumentTree, selection: Option<Selection>) {
        self.live = selection.filter(|s| tree.is_valid(s));
    }

    /// Hold the live selection until [`release`](Self::release).
    pub fn hold(&mut self) -> CaptureId {
        let id = CaptureId(self.next_capture);
        self.next_capture += 1;
        self.held.insert(id, self.live);
        id
    }

    /// Current mapped value of a held capture.
    pub fn held(&self, id: CaptureId) -> Option<Selection> {
        self.held.get(&id).copied().flatten()
    }

    pub fn is_held(&self, id: CaptureId) -> bool {
        self.held.contains_key(&id)
    }

    /// Stop tracking a capture, returning its last mapped value.
    pub fn release(&mut self, id: CaptureId) -> Option<Selection> {
        self.held.remove(&id).flatten()
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Map the live selection and every held capture across `steps`.
    pub fn remap(&mut self, tree: &DocumentTree, steps: &[Step]) {
        if steps.is_empty() {
            return;
        }
        let map = |sel: Option<Selection>| sel.and_then(|s| s.map(steps)).filter(|s| tree.is_valid(s));
        self.live = map(self.live);
        for held in self.held.values_mut() {
            *held = map(*held);
        }
    }

    /// Forget every position, keeping capture handles alive.
    ///
    /// Used when the tree is replaced wholesale.
    pub fn invalidate(&mut self) {
        self.live = None;
        for held in self.held.values_mut() {
            *held = None;
        }
    }
}
