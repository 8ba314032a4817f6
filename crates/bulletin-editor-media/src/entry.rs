//! Clipboard and drag-and-drop entry points.

use bulletin_editor_core::EditorError;
use smol_str::SmolStr;

use crate::pipeline::{InsertionOutcome, InsertionSource, MediaPipeline};
use crate::policy::MediaPolicy;
use crate::upload::{MediaBlob, UploadService};

/// Why a dropped file was not inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Failed the media policy.
    Rejected(EditorError),
    /// Only the first image of a drop is inserted.
    BeyondFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredFile {
    pub name: Option<SmolStr>,
    pub reason: IgnoreReason,
}

/// Result of dropping files onto the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    /// `None` when no dropped file was an acceptable image.
    pub inserted: Option<InsertionOutcome>,
    pub ignored: Vec<IgnoredFile>,
}

/// Whether a drag carrying these data types should be accepted.
///
/// Accepts file drags and image payloads so the host can show a drop cursor.
pub fn accepts_drag<'a>(types: impl IntoIterator<Item = &'a str>) -> bool {
    types
        .into_iter()
        .any(|t| t.eq_ignore_ascii_case("files") || t.to_ascii_lowercase().starts_with("image/"))
}

impl<U: UploadService> MediaPipeline<U> {
    /// Handle a paste. Returns `None` if the clipboard holds no image, in
    /// which case the host pastes as usual.
    ///
    /// Only the first image item is inserted.
    pub fn paste(
        &self,
        items: Vec<MediaBlob>,
    ) -> Option<impl Future<Output = Result<InsertionOutcome, EditorError>> + '_> {
        let image = items.into_iter().find(MediaPolicy::is_image)?;
        Some(self.insert(image, InsertionSource::Paste))
    }

    /// Handle a drop of one or more files.
    ///
    /// The first file that passes the media policy is inserted; every other
    /// file is reported back in [`DropOutcome::ignored`].
    pub fn drop_files(
        &self,
        files: Vec<MediaBlob>,
    ) -> impl Future<Output = Result<DropOutcome, EditorError>> + '_ {
        let mut chosen = None;
        let mut ignored = Vec::new();
        for file in files {
            let reason = if chosen.is_some() {
                IgnoreReason::BeyondFirst
            } else {
                match self.policy().validate(&file) {
                    Ok(_) => {
                        chosen = Some(file);
                        continue;
                    }
                    Err(e) => IgnoreReason::Rejected(e),
                }
            };
            tracing::warn!(name = ?file.name, ?reason, "dropped file ignored");
            ignored.push(IgnoredFile {
                name: file.name,
                reason,
            });
        }

        let pending = chosen.map(|file| (self.begin(InsertionSource::Drop), file));
        async move {
            let inserted = match pending {
                Some((pending, file)) => Some(pending?.complete(file).await?),
                None => None,
            };
            Ok(DropOutcome { inserted, ignored })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_drag() {
        assert!(accepts_drag(["text/plain", "Files"]));
        assert!(accepts_drag(["image/png"]));
        assert!(!accepts_drag(["text/plain", "text/html"]));
        assert!(!accepts_drag(std::iter::empty()));
    }
}
