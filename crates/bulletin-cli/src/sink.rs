use std::io::Write;

use bulletin_editor_core::{DocumentSink, SavedDocument};

/// Writes each saved document as pretty-printed JSON.
pub struct JsonSink<W> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DocumentSink for JsonSink<W> {
    type Error = serde_json::Error;

    fn receive(&mut self, document: SavedDocument) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out).map_err(serde_json::Error::io)
    }
}
