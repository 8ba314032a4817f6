//! Document sink contract.
//!
//! The sink receives the persisted document on save. Reconciling temporary
//! media ownership against `media_keys` is the sink's business, not the
//! editor's.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::node::MediaKey;

/// What a save hands to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDocument {
    pub html: String,
    /// Every embedded media key, in document order.
    pub media_keys: Vec<MediaKey>,
}

/// Receives saved documents.
pub trait DocumentSink {
    type Error;

    fn receive(&mut self, document: SavedDocument) -> Result<(), Self::Error>;
}

/// Unit type implementation - discards the document.
impl DocumentSink for () {
    type Error = Infallible;

    fn receive(&mut self, _document: SavedDocument) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Collects every saved document.
impl DocumentSink for Vec<SavedDocument> {
    type Error = Infallible;

    fn receive(&mut self, document: SavedDocument) -> Result<(), Infallible> {
        self.push(document);
        Ok(())
    }
}

impl<T: DocumentSink> DocumentSink for &mut T {
    type Error = T::Error;

    fn receive(&mut self, document: SavedDocument) -> Result<(), Self::Error> {
        (**self).receive(document)
    }
}
