//! Node payloads stored in the document tree.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Heading level, always within `1..=6`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=6).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Block node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlockKind {
    #[default]
    Paragraph,
    Heading(HeadingLevel),
    UnorderedList,
    OrderedList,
    ListItem,
}

impl BlockKind {
    /// Blocks whose children are inline leaves.
    pub fn is_textblock(self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading(_) | Self::ListItem)
    }

    pub fn is_list(self) -> bool {
        matches!(self, Self::UnorderedList | Self::OrderedList)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Paragraph => "p",
            Self::Heading(level) => match level.get() {
                1 => "h1",
                2 => "h2",
                3 => "h3",
                4 => "h4",
                5 => "h5",
                _ => "h6",
            },
            Self::UnorderedList => "ul",
            Self::OrderedList => "ol",
            Self::ListItem => "li",
        }
    }

    /// Map an element name to a block kind. `div` is read as a paragraph,
    /// contenteditable hosts emit it for plain lines.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "p" | "div" => Self::Paragraph,
            "ul" => Self::UnorderedList,
            "ol" => Self::OrderedList,
            "li" => Self::ListItem,
            _ => {
                let level = tag.strip_prefix('h')?.parse::<u8>().ok()?;
                Self::Heading(HeadingLevel::new(level)?)
            }
        };
        Some(kind)
    }
}

/// A CSS color value accepted for foreground/background styling.
///
/// Only literal colors are accepted: hex notation, `rgb()`/`rgba()`/`hsl()`
/// functions and named colors. Custom properties and anything that could break
/// out of a `style` attribute are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color(SmolStr);

impl Color {
    pub fn parse(input: &str) -> Option<Self> {
        let value = input.trim().to_ascii_lowercase();
        if value.is_empty() || value.len() > 64 {
            return None;
        }

        let valid = if let Some(hex) = value.strip_prefix('#') {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        } else if let Some(args) = ["rgb(", "rgba(", "hsl(", "hsla("]
            .iter()
            .find_map(|f| value.strip_prefix(f))
        {
            args.strip_suffix(')').is_some_and(|inner| {
                inner
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, ',' | ' ' | '.' | '%' | '/'))
            })
        } else {
            value.chars().all(|c| c.is_ascii_alphabetic())
        };

        valid.then(|| Self(SmolStr::new(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inline style attributes carried by a text run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
    pub background: Option<Color>,
}

impl InlineStyle {
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// Anchor wrapping a text run.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub href: SmolStr,
    pub target: Option<SmolStr>,
}

impl Link {
    pub fn new(href: impl Into<SmolStr>, target: Option<SmolStr>) -> Self {
        Self {
            href: href.into(),
            target,
        }
    }
}

/// Run of text sharing one style and optional link.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TextRun {
    pub text: String,
    pub style: InlineStyle,
    pub link: Option<Link>,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn styled(text: impl Into<String>, style: InlineStyle, link: Option<Link>) -> Self {
        Self {
            text: text.into(),
            style,
            link,
        }
    }

    /// Length in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Same style and same link, i.e. the two runs could be one.
    pub fn same_format(&self, other: &TextRun) -> bool {
        self.style == other.style && self.link == other.link
    }

    pub(crate) fn byte_index(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

/// Reference key issued by the upload service.
///
/// Keys are opaque and immutable: there is deliberately no way to change the
/// key of an existing media node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaKey(SmolStr);

impl MediaKey {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Embedded image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaNode {
    key: MediaKey,
    url: SmolStr,
    alt: Option<SmolStr>,
}

impl MediaNode {
    pub fn new(key: MediaKey, url: impl Into<SmolStr>) -> Self {
        Self {
            key,
            url: url.into(),
            alt: None,
        }
    }

    pub fn with_alt(mut self, alt: impl Into<SmolStr>) -> Self {
        let alt = alt.into();
        self.alt = (!alt.is_empty()).then_some(alt);
        self
    }

    pub fn key(&self) -> &MediaKey {
        &self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn alt(&self) -> Option<&str> {
        self.alt.as_deref()
    }
}

/// What a tree node holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The editable surface itself.
    Root,
    Block(BlockKind),
    Text(TextRun),
    Media(MediaNode),
}

impl NodeKind {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Media(_))
    }

    pub fn block(&self) -> Option<BlockKind> {
        match self {
            Self::Block(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_level_bounds() {
        assert!(HeadingLevel::new(0).is_none());
        assert_eq!(HeadingLevel::new(1).map(HeadingLevel::get), Some(1));
        assert_eq!(HeadingLevel::new(6).map(HeadingLevel::get), Some(6));
        assert!(HeadingLevel::new(7).is_none());
    }

    #[test]
    fn test_block_kind_tags() {
        assert_eq!(BlockKind::from_tag("h3").map(BlockKind::tag), Some("h3"));
        assert_eq!(BlockKind::from_tag("div"), Some(BlockKind::Paragraph));
        assert_eq!(BlockKind::from_tag("h7"), None);
        assert_eq!(BlockKind::from_tag("span"), None);
        assert!(BlockKind::ListItem.is_textblock());
        assert!(!BlockKind::OrderedList.is_textblock());
        assert!(BlockKind::OrderedList.is_list());
    }

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("#FF0000").map(|c| c.to_string()), Some("#ff0000".into()));
        assert!(Color::parse("rgb(10, 20, 30)").is_some());
        assert!(Color::parse("navy").is_some());
        assert!(Color::parse("#12").is_none());
        assert!(Color::parse("var(--accent)").is_none());
        assert!(Color::parse("red; position: fixed").is_none());
        assert!(Color::parse("").is_none());
    }

    #[test]
    fn test_text_run_byte_index() {
        let run = TextRun::new("héllo");
        assert_eq!(run.char_len(), 5);
        assert_eq!(run.byte_index(2), 3);
        assert_eq!(run.byte_index(5), run.text.len());
    }

    #[test]
    fn test_media_alt_empty_is_none() {
        let media = MediaNode::new(MediaKey::new("k1"), "/files/k1").with_alt("");
        assert_eq!(media.alt(), None);
        assert_eq!(media.key().as_str(), "k1");
    }
}
