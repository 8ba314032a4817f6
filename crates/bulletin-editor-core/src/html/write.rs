//! HTML output for document trees.
//!
//! [`serialize`] is the persisted form handed to the document sink: only the
//! document's own elements and the media key attribute. [`render`] is the
//! display form, which adds transient `data-node-id` attributes and the
//! placeholder markup. Hydration strips both.

use std::fmt::{self, Write as FmtWrite};

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::EditorConfig;
use crate::html::parse::PLACEHOLDER_CLASS;
use crate::node::{Link, NodeKind, TextRun};
use crate::tree::DocumentTree;
use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Persist,
    Display,
}

/// Serialize the tree to its persisted HTML form.
///
/// A tree with no text and no media serializes to the empty string.
pub fn serialize(tree: &DocumentTree, config: &EditorConfig) -> String {
    if !tree.has_content() {
        return String::new();
    }
    let mut writer = HtmlWriter::new(tree, config, Mode::Persist);
    // Writing into a String cannot fail.
    let _ = writer.write_children(tree.root());
    writer.out
}

/// Render the tree for display, with node ids and the placeholder if visible.
pub fn render(tree: &DocumentTree, config: &EditorConfig, placeholder_visible: bool) -> String {
    let mut writer = HtmlWriter::new(tree, config, Mode::Display);
    let _ = if placeholder_visible {
        writer.write_placeholder()
    } else {
        writer.write_children(tree.root())
    };
    writer.out
}

struct HtmlWriter<'a> {
    tree: &'a DocumentTree,
    config: &'a EditorConfig,
    mode: Mode,
    out: String,
}

impl<'a> HtmlWriter<'a> {
    fn new(tree: &'a DocumentTree, config: &'a EditorConfig, mode: Mode) -> Self {
        Self {
            tree,
            config,
            mode,
            out: String::new(),
        }
    }

    fn write_placeholder(&mut self) -> fmt::Result {
        write!(
            self.out,
            r#"<p class="{PLACEHOLDER_CLASS}" data-placeholder="true">{}</p>"#,
            encode_text(&self.config.placeholder)
        )
    }

    fn write_node_id(&mut self, id: NodeId) -> fmt::Result {
        if self.mode == Mode::Display {
            write!(self.out, r#" data-node-id="{}""#, id.get())?;
        }
        Ok(())
    }

    /// Write the children of a block or the root.
    ///
    /// Consecutive runs sharing a link are grouped under one anchor.
    fn write_children(&mut self, parent: NodeId) -> fmt::Result {
        let tree = self.tree;
        let children = tree.children(parent);
        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            match tree.kind(child) {
                Some(NodeKind::Block(kind)) => {
                    write!(self.out, "<{}", kind.tag())?;
                    self.write_node_id(child)?;
                    self.out.push('>');
                    self.write_children(child)?;
                    write!(self.out, "</{}>", kind.tag())?;
                    i += 1;
                }
                Some(NodeKind::Text(run)) => match &run.link {
                    Some(link) => {
                        let group = children[i..]
                            .iter()
                            .take_while(|&&c| {
                                tree.text(c).is_some_and(|r| r.link.as_ref() == Some(link))
                            })
                            .count();
                        self.write_link(link, &children[i..i + group])?;
                        i += group;
                    }
                    None => {
                        self.write_run(run)?;
                        i += 1;
                    }
                },
                Some(NodeKind::Media(media)) => {
                    write!(
                        self.out,
                        r#"<img src="{}""#,
                        encode_double_quoted_attribute(media.url())
                    )?;
                    if let Some(alt) = media.alt() {
                        write!(self.out, r#" alt="{}""#, encode_double_quoted_attribute(alt))?;
                    }
                    write!(
                        self.out,
                        r#" {}="{}""#,
                        self.config.media_key_attribute,
                        encode_double_quoted_attribute(media.key().as_str())
                    )?;
                    self.write_node_id(child)?;
                    self.out.push('>');
                    i += 1;
                }
                Some(NodeKind::Root) | None => i += 1,
            }
        }
        Ok(())
    }

    fn write_link(&mut self, link: &Link, runs: &[NodeId]) -> fmt::Result {
        write!(
            self.out,
            r#"<a href="{}""#,
            encode_double_quoted_attribute(&link.href)
        )?;
        if let Some(target) = &link.target {
            write!(
                self.out,
                r#" target="{}""#,
                encode_double_quoted_attribute(target)
            )?;
        }
        self.out.push('>');
        let tree = self.tree;
        for &id in runs {
            if let Some(run) = tree.text(id) {
                self.write_run(run)?;
            }
        }
        self.out.push_str("</a>");
        Ok(())
    }

    fn write_run(&mut self, run: &TextRun) -> fmt::Result {
        let style = &run.style;
        let mut closers: Vec<&str> = Vec::new();

        if style.color.is_some() || style.background.is_some() {
            let mut css = Vec::new();
            if let Some(color) = &style.color {
                css.push(format!("color: {color}"));
            }
            if let Some(background) = &style.background {
                css.push(format!("background-color: {background}"));
            }
            write!(self.out, r#"<span style="{}">"#, css.join("; "))?;
            closers.push("</span>");
        }
        for (on, open, close) in [
            (style.bold, "<strong>", "</strong>"),
            (style.italic, "<em>", "</em>"),
            (style.underline, "<u>", "</u>"),
        ] {
            if on {
                self.out.push_str(open);
                closers.push(close);
            }
        }

        self.out.push_str(&encode_text(&run.text));
        for close in closers.into_iter().rev() {
            self.out.push_str(close);
        }
        Ok(())
    }
}
