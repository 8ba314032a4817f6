//! Editor commands.
//!
//! `Command` is the semantic operation applied by [`execute`](crate::execute).
//! Hosts that dispatch by name (toolbar buttons, keyboard shortcuts) go
//! through [`Command::parse`], which accepts both the `execCommand`-style
//! names browsers use and the kebab-case names used by the toolbar.

use smol_str::SmolStr;

use crate::error::EditorError;
use crate::node::{Color, HeadingLevel};

/// Which inline flag a toggle command flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineFlag {
    Bold,
    Italic,
    Underline,
}

/// A command the executor can apply to a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // === Inline ===
    Toggle(InlineFlag),
    Color(Color),
    BackgroundColor(Color),
    /// Clear every inline style. Links are kept.
    RemoveFormatting,
    Link {
        href: SmolStr,
        target: Option<SmolStr>,
    },
    Unlink,

    // === Block ===
    Heading(HeadingLevel),
    Paragraph,
    UnorderedList,
    OrderedList,
}

impl Command {
    /// Parse a command by name with an optional argument.
    ///
    /// Rejects unknown names, missing arguments and bad argument values
    /// with [`EditorError::InvalidCommand`].
    pub fn parse(name: &str, arg: Option<&str>) -> Result<Self, EditorError> {
        let arg = arg.map(str::trim).filter(|a| !a.is_empty());
        let require = |what: &str| {
            arg.ok_or_else(|| EditorError::InvalidCommand(format!("{name} requires {what}")))
        };
        let color = |value: &str| {
            Color::parse(value)
                .ok_or_else(|| EditorError::InvalidCommand(format!("{value:?} is not a color")))
        };

        let command = match name {
            "bold" => Self::Toggle(InlineFlag::Bold),
            "italic" => Self::Toggle(InlineFlag::Italic),
            "underline" => Self::Toggle(InlineFlag::Underline),
            "foreColor" | "color" => Self::Color(color(require("a color")?)?),
            "hiliteColor" | "backColor" | "background-color" => {
                Self::BackgroundColor(color(require("a color")?)?)
            }
            "removeFormat" | "remove-formatting" => Self::RemoveFormatting,
            "createLink" | "link" => Self::Link {
                href: SmolStr::new(require("a URL")?),
                target: None,
            },
            "unlink" => Self::Unlink,
            "formatBlock" => Self::parse_block_tag(require("a block tag")?)?,
            "heading" => {
                let level = require("a level")?
                    .parse::<u8>()
                    .ok()
                    .and_then(HeadingLevel::new)
                    .ok_or_else(|| {
                        EditorError::InvalidCommand("heading level must be 1 to 6".into())
                    })?;
                Self::Heading(level)
            }
            "paragraph" => Self::Paragraph,
            "insertUnorderedList" | "unordered-list" => Self::UnorderedList,
            "insertOrderedList" | "ordered-list" => Self::OrderedList,
            _ => return Err(EditorError::InvalidCommand(format!("unknown command {name:?}"))),
        };
        Ok(command)
    }

    /// `formatBlock` argument: `p`, `h1`..`h6`, optionally in angle brackets.
    fn parse_block_tag(tag: &str) -> Result<Self, EditorError> {
        let tag = tag
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_ascii_lowercase();
        match tag.as_str() {
            "p" => Ok(Self::Paragraph),
            _ => tag
                .strip_prefix('h')
                .and_then(|l| l.parse::<u8>().ok())
                .and_then(HeadingLevel::new)
                .map(Self::Heading)
                .ok_or_else(|| EditorError::InvalidCommand(format!("cannot format block as {tag:?}"))),
        }
    }

    /// Inline commands act on selected text; block commands on enclosing blocks.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Self::Toggle(_)
                | Self::Color(_)
                | Self::BackgroundColor(_)
                | Self::RemoveFormatting
                | Self::Link { .. }
                | Self::Unlink
        )
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }
}
