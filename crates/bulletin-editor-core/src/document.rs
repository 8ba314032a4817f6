//! The editing surface.
//!
//! `EditorSurface` owns one document tree and everything scoped to it: the
//! selection tracker, placeholder state, pending inline style, and the
//! listeners the host registers for change and format notifications. All
//! mutation goes through it, and every mutation ends in [`commit`], which
//! re-derives held selections, notifies listeners if the serialized HTML
//! changed, and re-emits the format state.
//!
//! [`commit`]: EditorSurface::commit

use std::collections::HashSet;

use crate::actions::{Command, InlineFlag};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::execute::{self, ensure_editable, flag_mut};
use crate::format::{FormatState, inspect};
use crate::html;
use crate::node::{InlineStyle, Link, MediaKey, MediaNode, NodeKind, TextRun};
use crate::selection::SelectionTracker;
use crate::sink::{DocumentSink, SavedDocument};
use crate::tree::DocumentTree;
use crate::types::{CaptureId, NodeId, Position, Selection};

type ChangeListener = Box<dyn FnMut(&str)>;
type FormatListener = Box<dyn FnMut(&FormatState)>;

/// Events reported by the host surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent<'a> {
    TextInput(&'a str),
    /// Enter.
    InsertParagraph,
    DeleteBackward,
    SelectionChange(Option<Selection>),
    Focus,
    Blur,
}

/// Result of inserting a media node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInsertion {
    pub node: NodeId,
    /// The requested position was gone and the image went to the end of the document.
    pub degraded: bool,
}

pub struct EditorSurface {
    tree: DocumentTree,
    tracker: SelectionTracker,
    config: EditorConfig,
    placeholder_visible: bool,
    focused: bool,
    mounted: bool,
    pending_style: Option<InlineStyle>,
    issued_keys: HashSet<MediaKey>,
    last_emitted: String,
    change_listeners: Vec<ChangeListener>,
    format_listeners: Vec<FormatListener>,
}

impl std::fmt::Debug for EditorSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSurface")
            .field("tree", &self.tree)
            .field("selection", &self.tracker.capture())
            .field("placeholder_visible", &self.placeholder_visible)
            .field("focused", &self.focused)
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl Default for EditorSurface {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSurface {
    /// Mount an empty surface. The placeholder shows until focus.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            tree: DocumentTree::new(),
            tracker: SelectionTracker::new(),
            config,
            placeholder_visible: true,
            focused: false,
            mounted: true,
            pending_style: None,
            issued_keys: HashSet::new(),
            last_emitted: String::new(),
            change_listeners: Vec::new(),
            format_listeners: Vec::new(),
        }
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_placeholder_visible(&self) -> bool {
        self.placeholder_visible
    }

    fn ensure_mounted(&self) -> Result<(), EditorError> {
        if self.mounted {
            Ok(())
        } else {
            Err(EditorError::SurfaceUnmounted)
        }
    }

    // === Content lifecycle ===

    /// Replace the document with parsed HTML.
    ///
    /// A value identical to the current serialization is a no-op. Hydration
    /// never notifies change listeners: the host already has the value. On
    /// malformed input the surface falls back to an empty document with the
    /// placeholder shown, and the error is returned for reporting.
    pub fn hydrate(&mut self, html: &str) -> Result<(), EditorError> {
        self.ensure_mounted()?;
        if html == self.serialize() {
            return Ok(());
        }

        let next_id = self.tree.next_id();
        let result = html::parse_html(html, &self.config, next_id);
        self.tracker.invalidate();
        self.pending_style = None;

        match result {
            Ok(tree) => {
                tracing::debug!(bytes = html.len(), "hydrated document");
                self.tree = tree;
                self.placeholder_visible = !self.tree.has_content() && !self.focused;
                self.last_emitted = self.serialize();
                self.issued_keys.extend(self.tree.media_keys());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "hydration failed, resetting to an empty document");
                self.tree = DocumentTree::with_next_id(next_id);
                self.placeholder_visible = true;
                self.last_emitted = String::new();
                Err(e)
            }
        }
    }

    /// Persisted HTML. Pure function of the tree; the placeholder never appears.
    pub fn serialize(&self) -> String {
        html::serialize(&self.tree, &self.config)
    }

    /// Display HTML, including node ids and the placeholder when visible.
    pub fn render(&self) -> String {
        html::render(&self.tree, &self.config, self.placeholder_visible)
    }

    /// Every media reference key, in document order.
    pub fn extract_media_keys(&self) -> Vec<MediaKey> {
        self.tree.media_keys()
    }

    /// Show the placeholder if the document has no text and no media.
    pub fn ensure_placeholder(&mut self) {
        if !self.tree.has_content() {
            self.placeholder_visible = true;
        }
    }

    /// Hide the placeholder and put the caret in an empty editable block.
    pub fn clear_placeholder_on_focus(&mut self) -> Option<Selection> {
        if !self.placeholder_visible {
            return self.tracker.capture();
        }
        self.placeholder_visible = false;
        let caret = ensure_editable(&mut self.tree).map(Selection::collapsed);
        self.commit(caret);
        caret
    }

    pub fn on_change(&mut self, listener: impl FnMut(&str) + 'static) {
        self.change_listeners.push(Box::new(listener));
    }

    pub fn on_format(&mut self, listener: impl FnMut(&FormatState) + 'static) {
        self.format_listeners.push(Box::new(listener));
    }

    /// Hand the persisted document to a sink.
    pub fn save<S: DocumentSink>(&self, sink: &mut S) -> Result<SavedDocument, S::Error> {
        let document = SavedDocument {
            html: self.serialize(),
            media_keys: self.extract_media_keys(),
        };
        sink.receive(document.clone())?;
        Ok(document)
    }

    /// Tear the surface down. The tree is discarded and every later mutation
    /// fails with [`EditorError::SurfaceUnmounted`].
    pub fn unmount(&mut self) {
        tracing::debug!("unmounting editor surface");
        self.mounted = false;
        self.tree = DocumentTree::with_next_id(self.tree.next_id());
        self.tracker.invalidate();
        self.change_listeners.clear();
        self.format_listeners.clear();
    }

    // === Selection ===

    pub fn selection(&self) -> Option<Selection> {
        self.tracker.capture()
    }

    /// Apply a host-reported selection change. Clears any pending style.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.tracker.set(&self.tree, selection);
        self.pending_style = None;
        self.emit_format();
    }

    /// Immutable snapshot of the live selection.
    pub fn capture(&self) -> Option<Selection> {
        self.tracker.capture()
    }

    /// Re-apply a snapshot. `false` if it no longer points into the tree.
    pub fn restore(&mut self, selection: Selection) -> bool {
        let restored = self.tracker.restore(&self.tree, selection);
        if restored {
            self.emit_format();
        }
        restored
    }

    /// Hold the live selection across an asynchronous detour.
    pub fn hold_capture(&mut self) -> CaptureId {
        self.tracker.hold()
    }

    pub fn held_capture(&self, id: CaptureId) -> Option<Selection> {
        self.tracker.held(id)
    }

    pub fn release_capture(&mut self, id: CaptureId) -> Option<Selection> {
        self.tracker.release(id)
    }

    /// Text covered by the live selection.
    pub fn selected_text(&self) -> String {
        self.tracker
            .capture()
            .map(|s| self.tree.text_in(&s))
            .unwrap_or_default()
    }

    /// Move the caret to the end of the document.
    pub fn select_end(&mut self) -> Option<Selection> {
        let caret = self.tree.end_position().map(Selection::collapsed);
        self.set_selection(caret);
        caret
    }

    // === Format ===

    /// Current format state, including any pending style.
    pub fn format_state(&self) -> FormatState {
        let Some(selection) = self.tracker.capture() else {
            return FormatState::default();
        };
        let mut state = inspect(&self.tree, &selection);
        if let Some(pending) = &self.pending_style {
            state.bold = pending.bold;
            state.italic = pending.italic;
            state.underline = pending.underline;
        }
        state
    }

    pub fn pending_style(&self) -> Option<&InlineStyle> {
        self.pending_style.as_ref()
    }

    fn emit_format(&mut self) {
        if self.format_listeners.is_empty() {
            return;
        }
        let state = self.format_state();
        for listener in &mut self.format_listeners {
            listener(&state);
        }
    }

    // === Editing ===

    /// Selection to edit at: the live one, or a caret in a fresh paragraph if
    /// the document has nowhere to put one.
    fn editing_selection(&mut self) -> Result<Selection, EditorError> {
        if let Some(selection) = self.tracker.capture() {
            return Ok(selection);
        }
        if self.tree.start_position().is_none() {
            return ensure_editable(&mut self.tree)
                .map(Selection::collapsed)
                .ok_or(EditorError::SelectionUnavailable);
        }
        Err(EditorError::SelectionUnavailable)
    }

    /// Execute a command on the live selection.
    pub fn execute(&mut self, command: &Command) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let selection = self.editing_selection()?;
        self.execute_at(command, selection)
    }

    /// Parse and execute a command by name on the live selection.
    pub fn execute_named(&mut self, name: &str, arg: Option<&str>) -> Result<Selection, EditorError> {
        let command = Command::parse(name, arg)?;
        self.execute(&command)
    }

    /// Execute a command on an explicit selection.
    pub fn execute_at(
        &mut self,
        command: &Command,
        selection: Selection,
    ) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;

        if let Command::Toggle(flag) = command
            && selection.is_collapsed()
            && self.tree.is_valid(&selection)
        {
            self.toggle_pending(selection.head, *flag);
            return Ok(selection);
        }

        let selection = execute::execute(&mut self.tree, command, selection)?;
        self.commit(Some(selection));
        Ok(selection)
    }

    fn toggle_pending(&mut self, caret: Position, flag: InlineFlag) {
        let mut style = self.pending_style.take().unwrap_or_else(|| {
            let state = inspect(&self.tree, &Selection::collapsed(caret));
            let mut style = self
                .tree
                .text(caret.node)
                .map(|r| r.style.clone())
                .unwrap_or_default();
            style.bold = state.bold;
            style.italic = state.italic;
            style.underline = state.underline;
            style
        });
        let value = flag_mut(&mut style, flag);
        *value = !*value;
        tracing::debug!(?flag, "pending style toggled");
        self.pending_style = Some(style);
        self.emit_format();
    }

    /// Typed text at the live selection.
    pub fn insert_text(&mut self, text: &str) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let selection = self.editing_selection()?;
        let style = self.pending_style.take();
        let selection = execute::insert_text(&mut self.tree, selection, text, style.as_ref())?;
        self.commit(Some(selection));
        Ok(selection)
    }

    pub fn insert_paragraph(&mut self) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let selection = self.editing_selection()?;
        let selection = execute::split_block(&mut self.tree, selection)?;
        self.commit(Some(selection));
        Ok(selection)
    }

    pub fn delete_backward(&mut self) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let selection = self.editing_selection()?;
        let selection = execute::delete_backward(&mut self.tree, selection)?;
        self.commit(Some(selection));
        Ok(selection)
    }

    pub fn delete_selection(&mut self) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let selection = self.editing_selection()?;
        let selection = execute::delete_selection(&mut self.tree, selection)?;
        self.commit(Some(selection));
        Ok(selection)
    }

    /// Where a restored selection lands, falling back to the end of the document.
    fn landing(&mut self, at: Option<Selection>) -> Result<(Selection, bool), EditorError> {
        if let Some(selection) = at
            && self.tracker.restore(&self.tree, selection)
        {
            return Ok((selection, false));
        }
        tracing::warn!(
            error = %EditorError::SelectionUnavailable,
            "captured selection is gone, inserting at end of document"
        );
        let end = match self.tree.end_position() {
            Some(end) => end,
            None => ensure_editable(&mut self.tree).ok_or(EditorError::SelectionUnavailable)?,
        };
        Ok((Selection::collapsed(end), true))
    }

    /// Insert an image at a captured selection.
    ///
    /// Lands at the start of the selection, which is left in place. A stale or
    /// missing selection falls back to the end of the document and is reported
    /// as `degraded`, not as an error.
    pub fn insert_media(
        &mut self,
        media: MediaNode,
        at: Option<Selection>,
    ) -> Result<MediaInsertion, EditorError> {
        self.ensure_mounted()?;
        let key = media.key().clone();
        if self.issued_keys.contains(&key) || self.tree.find_media(&key).is_some() {
            return Err(EditorError::DuplicateMediaKey(key));
        }

        let (selection, degraded) = self.landing(at)?;
        let start = self
            .tree
            .ordered(&selection)
            .map(|(start, _)| start)
            .ok_or(EditorError::SelectionUnavailable)?;
        let node = self
            .tree
            .insert_leaf_at(start, NodeKind::Media(media))
            .ok_or(EditorError::SelectionUnavailable)?;
        if let Some(parent) = self.tree.parent(node) {
            self.tree.normalize_inlines(parent);
        }
        self.issued_keys.insert(key.clone());
        tracing::info!(key = %key, degraded, "inserted media");

        self.placeholder_visible = false;
        self.commit(Some(Selection::collapsed(Position::new(node, 1))));
        Ok(MediaInsertion { node, degraded })
    }

    /// Insert a linked run named `name` at a captured selection, replacing it.
    pub fn insert_link(
        &mut self,
        name: &str,
        href: &str,
        at: Option<Selection>,
    ) -> Result<Selection, EditorError> {
        self.ensure_mounted()?;
        let (selection, _) = self.landing(at)?;
        let link = Link::new(href, self.config.link_target.clone());
        let run = TextRun::styled(name, InlineStyle::default(), Some(link));
        let selection = execute::insert_run(&mut self.tree, selection, run)?;
        self.placeholder_visible = false;
        self.commit(Some(selection));
        Ok(selection)
    }

    /// Dispatch a host event.
    pub fn handle_event(&mut self, event: HostEvent<'_>) -> Result<(), EditorError> {
        match event {
            HostEvent::TextInput(text) => self.insert_text(text).map(|_| ()),
            HostEvent::InsertParagraph => self.insert_paragraph().map(|_| ()),
            HostEvent::DeleteBackward => self.delete_backward().map(|_| ()),
            HostEvent::SelectionChange(selection) => {
                self.set_selection(selection);
                Ok(())
            }
            HostEvent::Focus => {
                self.focused = true;
                self.clear_placeholder_on_focus();
                Ok(())
            }
            HostEvent::Blur => {
                self.focused = false;
                self.ensure_placeholder();
                Ok(())
            }
        }
    }

    /// Finish a mutation: re-derive held selections, set the live selection,
    /// notify on changed HTML and re-emit the format state.
    fn commit(&mut self, selection: Option<Selection>) {
        let steps = self.tree.take_steps();
        self.tracker.remap(&self.tree, &steps);
        if let Some(selection) = selection {
            self.tracker.restore(&self.tree, selection);
        }
        if self.tree.has_content() {
            self.placeholder_visible = false;
        }

        let html = self.serialize();
        if html != self.last_emitted {
            for listener in &mut self.change_listeners {
                listener(&html);
            }
            self.last_emitted = html;
        }
        self.emit_format();
    }
}
