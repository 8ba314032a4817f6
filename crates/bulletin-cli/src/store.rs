//! Filesystem-backed upload service.
//!
//! Blobs are written to a directory under a key derived from their blake3
//! hash. A second copy of the same bytes gets a suffixed key, so a key is
//! never handed out twice.

use std::path::PathBuf;

use bulletin_editor_core::MediaKey;
use bulletin_editor_media::{MediaBlob, MediaPolicy, UploadError, UploadService, UploadedMedia};
use smol_str::{SmolStr, format_smolstr};

const KEY_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
    base_url: SmolStr,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            base_url: SmolStr::new(base_url.trim_end_matches('/')),
        }
    }

    fn extension(mime: &str) -> &'static str {
        match mime {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    /// First free key for these bytes.
    async fn free_key(&self, data: &[u8], ext: &str) -> Result<SmolStr, UploadError> {
        let hash = blake3::hash(data).to_hex();
        let base = &hash.as_str()[..KEY_LEN];
        let mut key = SmolStr::new(base);
        let mut n = 1;
        while tokio::fs::try_exists(self.dir.join(format!("{key}.{ext}")))
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?
        {
            key = format_smolstr!("{base}-{n}");
            n += 1;
        }
        Ok(key)
    }
}

impl UploadService for FsStore {
    fn upload(&self, blob: MediaBlob) -> impl Future<Output = Result<UploadedMedia, UploadError>> {
        async move {
            let mime = MediaPolicy::effective_type(&blob);
            let ext = Self::extension(&mime);
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| UploadError::Transport(e.to_string()))?;

            let key = self.free_key(&blob.data, ext).await?;
            let file = format!("{key}.{ext}");
            tokio::fs::write(self.dir.join(&file), &blob.data)
                .await
                .map_err(|e| UploadError::Transport(e.to_string()))?;
            tracing::debug!(%key, bytes = blob.len(), "stored blob");

            Ok(UploadedMedia {
                key: MediaKey::new(key),
                url: format_smolstr!("{}/{file}", self.base_url),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\0";

    #[tokio::test]
    async fn test_same_bytes_get_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "/files/");

        let first = store.upload(MediaBlob::new(PNG)).await.unwrap();
        let second = store.upload(MediaBlob::new(PNG)).await.unwrap();

        assert_eq!(first.key.as_str().len(), KEY_LEN);
        assert_eq!(second.key.as_str(), format!("{}-1", first.key));
        assert_eq!(first.url, format!("/files/{}.png", first.key));
        assert!(dir.path().join(format!("{}.png", second.key)).exists());
    }
}
