//! Link dialog flow.
//!
//! Opening the dialog holds the selection on the surface, since typing into
//! the dialog's fields costs the editor its focus. Confirming inserts a
//! linked run at the held selection; cancelling releases it untouched.

use crate::document::EditorSurface;
use crate::error::EditorError;
use crate::types::{CaptureId, Selection};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum DialogState {
    #[default]
    Closed,
    Open {
        capture: CaptureId,
        name: String,
        url: String,
    },
}

/// State of the link dialog for one surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkDialog {
    state: DialogState,
}

impl LinkDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DialogState::Open { .. })
    }

    /// Open the dialog, holding the current selection. The name field is
    /// prefilled with the selected text.
    ///
    /// Reopening an open dialog releases the old hold first.
    pub fn open(&mut self, surface: &mut EditorSurface) {
        if let DialogState::Open { capture, .. } = &self.state {
            surface.release_capture(*capture);
        }
        let capture = surface.hold_capture();
        let name = surface.selected_text();
        tracing::debug!(%capture, "link dialog opened");
        self.state = DialogState::Open {
            capture,
            name,
            url: String::new(),
        };
    }

    pub fn name(&self) -> Option<&str> {
        match &self.state {
            DialogState::Open { name, .. } => Some(name),
            DialogState::Closed => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.state {
            DialogState::Open { url, .. } => Some(url),
            DialogState::Closed => None,
        }
    }

    pub fn set_name(&mut self, value: impl Into<String>) -> Result<(), EditorError> {
        match &mut self.state {
            DialogState::Open { name, .. } => {
                *name = value.into();
                Ok(())
            }
            DialogState::Closed => Err(EditorError::DialogNotOpen),
        }
    }

    pub fn set_url(&mut self, value: impl Into<String>) -> Result<(), EditorError> {
        match &mut self.state {
            DialogState::Open { url, .. } => {
                *url = value.into();
                Ok(())
            }
            DialogState::Closed => Err(EditorError::DialogNotOpen),
        }
    }

    /// Insert the link and close.
    ///
    /// With an empty name or URL the dialog stays open and nothing is
    /// inserted.
    pub fn confirm(&mut self, surface: &mut EditorSurface) -> Result<Selection, EditorError> {
        let DialogState::Open { name, url, .. } = &self.state else {
            return Err(EditorError::DialogNotOpen);
        };
        if name.trim().is_empty() || url.trim().is_empty() {
            return Err(EditorError::LinkFieldsIncomplete);
        }

        let DialogState::Open { capture, name, url } = std::mem::take(&mut self.state) else {
            return Err(EditorError::DialogNotOpen);
        };
        let at = surface.release_capture(capture);
        surface.insert_link(&name, url.trim(), at)
    }

    /// Close without touching the document.
    pub fn cancel(&mut self, surface: &mut EditorSurface) {
        if let DialogState::Open { capture, .. } = std::mem::take(&mut self.state) {
            surface.release_capture(capture);
            tracing::debug!(%capture, "link dialog cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;

    fn surface_with(html: &str) -> EditorSurface {
        let mut surface = EditorSurface::new(EditorConfig::default());
        surface.hydrate(html).unwrap();
        surface
    }

    #[test]
    fn test_confirm_inserts_link_at_held_selection() {
        let mut surface = surface_with("<p>see here</p>");
        let end = surface.tree().end_position().unwrap();
        surface.set_selection(Some(Selection::collapsed(end)));

        let mut dialog = LinkDialog::new();
        dialog.open(&mut surface);
        assert_eq!(dialog.name(), Some(""));

        // Focus moves to the dialog; the editor loses its selection.
        surface.set_selection(None);
        dialog.set_name(" docs").unwrap();
        dialog.set_url("https://cs.example.edu").unwrap();
        dialog.confirm(&mut surface).unwrap();

        assert!(!dialog.is_open());
        insta::assert_snapshot!(
            surface.serialize(),
            @r#"<p>see here<a href="https://cs.example.edu" target="_blank"> docs</a></p>"#
        );
    }

    #[test]
    fn test_selected_text_prefills_name_and_is_replaced() {
        let mut surface = surface_with("<p>read the notes</p>");
        let run = surface.tree().leaves()[0];
        surface.set_selection(Some(Selection::new(
            crate::types::Position::new(run, 9),
            crate::types::Position::new(run, 14),
        )));

        let mut dialog = LinkDialog::new();
        dialog.open(&mut surface);
        assert_eq!(dialog.name(), Some("notes"));
        dialog.set_url("/notes").unwrap();
        dialog.confirm(&mut surface).unwrap();

        insta::assert_snapshot!(
            surface.serialize(),
            @r#"<p>read the <a href="/notes" target="_blank">notes</a></p>"#
        );
    }

    #[test]
    fn test_empty_fields_are_rejected_and_dialog_stays_open() {
        let mut surface = surface_with("<p>x</p>");
        let before = surface.serialize();
        let mut dialog = LinkDialog::new();
        dialog.open(&mut surface);

        dialog.set_name("name").unwrap();
        assert_eq!(
            dialog.confirm(&mut surface),
            Err(EditorError::LinkFieldsIncomplete)
        );
        assert!(dialog.is_open());
        assert_eq!(surface.serialize(), before);
    }

    #[test]
    fn test_cancel_leaves_document_untouched() {
        let mut surface = surface_with("<p>x</p>");
        let before = surface.serialize();
        let mut dialog = LinkDialog::new();
        dialog.open(&mut surface);
        dialog.set_name("n").unwrap();
        dialog.set_url("u").unwrap();
        dialog.cancel(&mut surface);

        assert!(!dialog.is_open());
        assert_eq!(surface.serialize(), before);
        assert_eq!(dialog.confirm(&mut surface), Err(EditorError::DialogNotOpen));
        assert_eq!(dialog.set_url("u"), Err(EditorError::DialogNotOpen));
    }
}
