use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Text shown while the document is empty and unfocused.
    pub placeholder: String,
    /// Attribute on `<img>` carrying the media reference key.
    pub media_key_attribute: SmolStr,
    /// `target` given to links inserted through the link dialog.
    pub link_target: Option<SmolStr>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            placeholder: "Write your post here...".to_owned(),
            media_key_attribute: SmolStr::new_static("data-media-key"),
            link_target: Some(SmolStr::new_static("_blank")),
        }
    }
}
