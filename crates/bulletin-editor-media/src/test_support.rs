//! Scripted upload service for tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use bulletin_editor_core::MediaKey;
use tokio::sync::oneshot;

use crate::upload::{MediaBlob, UploadError, UploadService, UploadedMedia};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// PNG signature followed by `padding` zero bytes.
pub fn png(padding: usize) -> Vec<u8> {
    let mut data = PNG_SIGNATURE.to_vec();
    data.resize(PNG_SIGNATURE.len() + padding, 0);
    data
}

pub fn named_png(name: &str) -> MediaBlob {
    MediaBlob::new(png(16)).with_name(name)
}

pub type Completion = oneshot::Sender<Result<UploadedMedia, UploadError>>;

/// Upload service whose uploads finish when the test says so.
///
/// Uploads of blobs with a scripted name wait on that name's channel; any
/// other blob succeeds immediately with its name as the key.
#[derive(Default)]
pub struct ScriptedUploader {
    waiting: RefCell<HashMap<String, oneshot::Receiver<Result<UploadedMedia, UploadError>>>>,
    started: RefCell<Vec<String>>,
    calls: Cell<usize>,
}

impl ScriptedUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads of `name` wait for the returned sender.
    pub fn script(&self, name: &str) -> Completion {
        let (tx, rx) = oneshot::channel();
        self.waiting.borrow_mut().insert(name.to_owned(), rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Names in the order their uploads started.
    pub fn started(&self) -> Vec<String> {
        self.started.borrow().clone()
    }
}

pub fn stored(key: &str) -> Result<UploadedMedia, UploadError> {
    Ok(UploadedMedia {
        key: MediaKey::new(key),
        url: format!("/files/{key}.png").into(),
    })
}

impl UploadService for ScriptedUploader {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>> {
        self.calls.set(self.calls.get() + 1);
        let name = blob.name.as_deref().unwrap_or("unnamed").to_owned();
        self.started.borrow_mut().push(name.clone());
        let waiting = self.waiting.borrow_mut().remove(&name);
        async move {
            match waiting {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(UploadError::Transport("script dropped".into()))),
                None => stored(&name),
            }
        }
    }
}
