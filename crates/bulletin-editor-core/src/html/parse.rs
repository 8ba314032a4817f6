//! HTML fragment hydration.
//!
//! Two passes: a small strict tokenizer builds a generic element tree, then
//! a builder walks it and emits document nodes, flattening anything the
//! document model has no kind for. Mismatched or unclosed tags are rejected
//! with the byte offset where parsing gave up.

use smol_str::SmolStr;

use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::node::{BlockKind, Color, InlineStyle, Link, MediaKey, MediaNode, NodeKind, TextRun};
use crate::tree::DocumentTree;
use crate::types::NodeId;

/// Class carried by the rendered placeholder paragraph.
pub const PLACEHOLDER_CLASS: &str = "bulletin-placeholder";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template", "noscript"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Dom {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: SmolStr,
    attrs: Vec<(SmolStr, String)>,
    children: Vec<Dom>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn is_placeholder(&self) -> bool {
        self.attr("data-placeholder").is_some()
            || self
                .attr("class")
                .is_some_and(|c| c.split_whitespace().any(|c| c == PLACEHOLDER_CLASS))
    }
}

/// Parse an HTML fragment into a fresh tree whose ids start at `next_id`.
pub fn parse_html(
    input: &str,
    config: &EditorConfig,
    next_id: u64,
) -> Result<DocumentTree, EditorError> {
    let dom = tokenize(input)?;
    let mut builder = Builder::new(DocumentTree::with_next_id(next_id), config);
    builder.walk_all(&dom, &Context::default());
    Ok(builder.finish())
}

// === Tokenizer ===

struct Open {
    element: Element,
    offset: usize,
}

fn malformed(offset: usize, reason: impl Into<String>) -> EditorError {
    EditorError::MalformedHydrationInput {
        offset,
        reason: reason.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Dom>, EditorError> {
    let mut top: Vec<Dom> = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut pos = 0;

    fn push(stack: &mut [Open], top: &mut Vec<Dom>, node: Dom) {
        match stack.last_mut() {
            Some(open) => open.element.children.push(node),
            None => top.push(node),
        }
    }

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(lt) = rest.find('<') else {
            push(&mut stack, &mut top, Dom::Text(decode(rest)));
            break;
        };
        if lt > 0 {
            push(&mut stack, &mut top, Dom::Text(decode(&rest[..lt])));
        }
        let tag_start = pos + lt;
        let tag = &input[tag_start..];

        if let Some(comment) = tag.strip_prefix("<!--") {
            let end = comment
                .find("-->")
                .ok_or_else(|| malformed(tag_start, "unterminated comment"))?;
            pos = tag_start + 4 + end + 3;
            continue;
        }
        if tag.starts_with("<!") || tag.starts_with("<?") {
            let end = tag
                .find('>')
                .ok_or_else(|| malformed(tag_start, "unterminated declaration"))?;
            pos = tag_start + end + 1;
            continue;
        }

        let is_close = tag.starts_with("</");
        let name_start = if is_close { 2 } else { 1 };
        if !tag[name_start..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            // A bare '<' in text.
            push(&mut stack, &mut top, Dom::Text("<".to_owned()));
            pos = tag_start + 1;
            continue;
        }
        let end = find_tag_end(tag).ok_or_else(|| malformed(tag_start, "unterminated tag"))?;
        let body = &tag[name_start..end];
        pos = tag_start + end + 1;

        if is_close {
            let name = body.trim().to_ascii_lowercase();
            if VOID_ELEMENTS.contains(&name.as_str()) {
                continue;
            }
            let Some(open) = stack.pop() else {
                return Err(malformed(tag_start, format!("unexpected </{name}>")));
            };
            if open.element.name != name {
                return Err(malformed(
                    tag_start,
                    format!("</{name}> does not close <{}>", open.element.name),
                ));
            }
            push(&mut stack, &mut top, Dom::Element(open.element));
            continue;
        }

        let self_closing = body.trim_end().ends_with('/');
        let body = body.trim_end().trim_end_matches('/');
        let element = parse_start_tag(body);

        if VOID_ELEMENTS.contains(&element.name.as_str()) || self_closing {
            push(&mut stack, &mut top, Dom::Element(element));
        } else if SKIPPED_ELEMENTS.contains(&element.name.as_str()) {
            let close = format!("</{}", element.name);
            let skip = input[pos..]
                .to_ascii_lowercase()
                .find(&close)
                .ok_or_else(|| malformed(tag_start, format!("unclosed <{}>", element.name)))?;
            let after = pos + skip;
            let end = input[after..]
                .find('>')
                .ok_or_else(|| malformed(after, "unterminated tag"))?;
            pos = after + end + 1;
        } else {
            stack.push(Open {
                element,
                offset: tag_start,
            });
        }
    }

    if let Some(open) = stack.pop() {
        return Err(malformed(
            open.offset,
            format!("unclosed <{}>", open.element.name),
        ));
    }
    Ok(top)
}

/// Index of the `>` ending the tag at the start of `tag`, skipping quoted values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (None, '<') => return None,
            _ => {}
        }
    }
    None
}

fn parse_start_tag(body: &str) -> Element {
    let name_end = body
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(body.len());
    let name = SmolStr::new(body[..name_end].to_ascii_lowercase());
    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = SmolStr::new(rest[..key_end].to_ascii_lowercase());
        rest = rest[key_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = &after_eq[1..];
                    let close = inner.find(q).unwrap_or(inner.len());
                    (&inner[..close], inner.get(close + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining.trim_start();
            decode(value)
        } else {
            String::new()
        };

        if !key.is_empty() {
            attrs.push((key, value));
        }
    }

    Element {
        name,
        attrs,
        children: Vec::new(),
    }
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

// === Builder ===

#[derive(Clone, Default)]
struct Context {
    style: InlineStyle,
    link: Option<Link>,
}

struct Builder<'a> {
    tree: DocumentTree,
    config: &'a EditorConfig,
    /// Textblock currently receiving inline content.
    current: Option<NodeId>,
    /// Kinds of the open textblock elements, innermost last.
    frames: Vec<BlockKind>,
    /// Open list nodes, innermost last.
    lists: Vec<NodeId>,
    /// `<br>`s seen in the current textblock since its last inline content.
    breaks: usize,
}

impl<'a> Builder<'a> {
    fn new(tree: DocumentTree, config: &'a EditorConfig) -> Self {
        Self {
            tree,
            config,
            current: None,
            frames: Vec::new(),
            lists: Vec::new(),
            breaks: 0,
        }
    }

    fn finish(mut self) -> DocumentTree {
        let root = self.tree.root();
        let mut containers = vec![root];
        for block in self.tree.children(root).to_vec() {
            match self.tree.block_kind(block) {
                Some(kind) if kind.is_list() => {
                    containers.extend_from_slice(self.tree.children(block));
                }
                Some(_) => containers.push(block),
                None => {}
            }
        }
        for container in containers {
            self.tree.normalize_inlines(container);
        }
        self.tree.take_steps();
        self.tree
    }

    fn walk_all(&mut self, nodes: &[Dom], ctx: &Context) {
        for (i, node) in nodes.iter().enumerate() {
            match node {
                Dom::Text(text) => {
                    let inline_follows = nodes.get(i + 1).is_some_and(|next| !is_block(next));
                    self.text(text, ctx, inline_follows);
                }
                Dom::Element(element) => self.element(element, ctx),
            }
        }
    }

    fn text(&mut self, text: &str, ctx: &Context, inline_follows: bool) {
        if text.is_empty() {
            return;
        }
        if text.trim().is_empty() {
            // Outside a block, whitespace only counts between two loose
            // inline nodes. After a line break it would start the next line.
            let between_inlines = inline_follows && self.loose_tail();
            if (self.current.is_none() && !between_inlines) || self.breaks > 0 {
                return;
            }
        }
        let run = TextRun::styled(text, ctx.style.clone(), ctx.link.clone());
        self.inline(NodeKind::Text(run));
    }

    /// True if the last node at the root is loose inline content.
    fn loose_tail(&self) -> bool {
        self.lists.is_empty()
            && self.frames.is_empty()
            && self
                .tree
                .children(self.tree.root())
                .last()
                .is_some_and(|&last| !matches!(self.tree.kind(last), Some(NodeKind::Block(_))))
    }

    /// Continue the current textblock in a sibling of the same kind, once
    /// per pending `<br>`.
    fn apply_breaks(&mut self) {
        let breaks = std::mem::take(&mut self.breaks);
        let Some(current) = self.current else { return };
        let (Some(kind), Some(outer)) = (self.tree.block_kind(current), self.tree.parent(current))
        else {
            return;
        };
        for _ in 0..breaks {
            let Some(block) = self.tree.push(outer, NodeKind::Block(kind)) else {
                return;
            };
            if let Some(previous) = self.current.replace(block)
                && self.tree.children(previous).is_empty()
            {
                self.tree.push(previous, NodeKind::Text(TextRun::default()));
            }
        }
    }

    fn inline(&mut self, kind: NodeKind) {
        if self.breaks > 0 {
            self.apply_breaks();
        }
        let parent = match self.current {
            Some(current) => current,
            None => match (self.frames.last().copied(), self.lists.last().copied()) {
                (Some(BlockKind::ListItem) | None, Some(list)) => {
                    match self.tree.push(list, NodeKind::Block(BlockKind::ListItem)) {
                        Some(item) => {
                            self.current = Some(item);
                            item
                        }
                        None => return,
                    }
                }
                (Some(kind), _) => {
                    let root = self.tree.root();
                    match self.tree.push(root, NodeKind::Block(kind)) {
                        Some(block) => {
                            self.current = Some(block);
                            block
                        }
                        None => return,
                    }
                }
                (None, None) => self.tree.root(),
            },
        };
        self.tree.push(parent, kind);
    }

    fn element(&mut self, element: &Element, ctx: &Context) {
        if element.is_placeholder() {
            return;
        }
        let name = element.name.as_str();

        if name == "img" {
            self.image(element);
            return;
        }
        if name == "br" {
            if self.current.is_some() {
                self.breaks += 1;
            }
            return;
        }
        if matches!(name, "ul" | "ol") {
            self.list(element, ctx);
            return;
        }
        if name == "li" {
            self.list_item(element, ctx);
            return;
        }
        if let Some(kind) = BlockKind::from_tag(name) {
            self.textblock(kind, element, ctx);
            return;
        }

        let mut inner = ctx.clone();
        match name {
            "b" | "strong" => inner.style.bold = true,
            "i" | "em" => inner.style.italic = true,
            "u" | "ins" => inner.style.underline = true,
            "span" => apply_css(&mut inner.style, element.attr("style")),
            "font" => {
                if let Some(color) = element.attr("color").and_then(Color::parse) {
                    inner.style.color = Some(color);
                }
            }
            "a" => {
                if let Some(href) = element.attr("href").filter(|h| !h.is_empty()) {
                    let target = element
                        .attr("target")
                        .filter(|t| !t.is_empty())
                        .map(SmolStr::new);
                    inner.link = Some(Link::new(href, target));
                }
            }
            _ => tracing::debug!(tag = name, "unwrapping unknown element"),
        }
        if name != "span" {
            // Inline style on any element still counts.
            apply_css(&mut inner.style, element.attr("style"));
        }
        self.walk_all(&element.children, &inner);
    }

    fn image(&mut self, element: &Element) {
        let key = element
            .attr(&self.config.media_key_attribute)
            .filter(|k| !k.is_empty());
        let (Some(key), Some(src)) = (key, element.attr("src")) else {
            tracing::warn!(
                src = element.attr("src").unwrap_or_default(),
                "skipping image without a media key"
            );
            return;
        };
        let mut media = MediaNode::new(MediaKey::new(key), src);
        if let Some(alt) = element.attr("alt") {
            media = media.with_alt(alt);
        }
        self.inline(NodeKind::Media(media));
    }

    fn textblock(&mut self, kind: BlockKind, element: &Element, ctx: &Context) {
        // Blocks inside a list item fold into the item.
        if self.frames.last() == Some(&BlockKind::ListItem) {
            self.walk_all(&element.children, ctx);
            return;
        }
        let root = self.tree.root();
        self.breaks = 0;
        self.current = self.tree.push(root, NodeKind::Block(kind));
        let opened = self.current;
        self.frames.push(kind);
        self.walk_all(&element.children, ctx);
        self.frames.pop();
        self.seal(opened);
    }

    fn list(&mut self, element: &Element, ctx: &Context) {
        self.breaks = 0;
        // Nested lists flatten into the enclosing one.
        if !self.lists.is_empty() {
            self.current = None;
            self.walk_all(&element.children, ctx);
            self.current = None;
            return;
        }
        let kind = if element.name == "ol" {
            BlockKind::OrderedList
        } else {
            BlockKind::UnorderedList
        };
        let root = self.tree.root();
        let Some(list) = self.tree.push(root, NodeKind::Block(kind)) else {
            return;
        };
        self.current = None;
        self.lists.push(list);
        // Frames do not cross a list boundary.
        let frames = std::mem::take(&mut self.frames);
        self.walk_all(&element.children, ctx);
        self.frames = frames;
        self.lists.pop();
        self.current = None;
    }

    fn list_item(&mut self, element: &Element, ctx: &Context) {
        let Some(&list) = self.lists.last() else {
            // Stray item outside any list reads as a paragraph.
            self.textblock(BlockKind::Paragraph, element, ctx);
            return;
        };
        self.breaks = 0;
        self.current = self.tree.push(list, NodeKind::Block(BlockKind::ListItem));
        let opened = self.current;
        self.frames.push(BlockKind::ListItem);
        self.walk_all(&element.children, ctx);
        self.frames.pop();
        self.seal(opened);
    }

    /// Close a block opened eagerly, giving it an empty run if nothing landed in it.
    fn seal(&mut self, opened: Option<NodeId>) {
        if let Some(block) = opened
            && self.tree.children(block).is_empty()
        {
            self.tree.push(block, NodeKind::Text(TextRun::default()));
        }
        self.current = None;
        self.breaks = 0;
    }
}

/// Whether a node opens a block of its own rather than flowing inline.
fn is_block(node: &Dom) -> bool {
    match node {
        Dom::Text(_) => false,
        Dom::Element(element) => {
            let name = element.name.as_str();
            element.is_placeholder()
                || matches!(name, "ul" | "ol" | "li")
                || BlockKind::from_tag(name).is_some()
        }
    }
}

/// Apply `color` and `background(-color)` declarations from a style attribute.
fn apply_css(style: &mut InlineStyle, css: Option<&str>) {
    let Some(css) = css else { return };
    for declaration in css.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let color = Color::parse(value);
        match property.trim().to_ascii_lowercase().as_str() {
            "color" => style.color = color.or(style.color.take()),
            "background-color" | "background" => {
                style.background = color.or(style.background.take())
            }
            "font-weight" => {
                let v = value.trim();
                style.bold = v == "bold" || v.parse::<u16>().is_ok_and(|w| w >= 600);
            }
            "font-style" => style.italic = value.trim() == "italic",
            "text-decoration" | "text-decoration-line" => {
                style.underline = value.contains("underline")
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<DocumentTree, EditorError> {
        parse_html(input, &EditorConfig::default(), 0)
    }

    #[test]
    fn test_tokenize_attributes() {
        let dom = tokenize(r#"<a href="/x?a=1&amp;b=2" target='_blank' data-flag>t</a>"#).unwrap();
        let Dom::Element(a) = &dom[0] else {
            panic!("expected element");
        };
        assert_eq!(a.attr("href"), Some("/x?a=1&b=2"));
        assert_eq!(a.attr("target"), Some("_blank"));
        assert_eq!(a.attr("data-flag"), Some(""));
        assert_eq!(a.children, vec![Dom::Text("t".into())]);
    }

    #[test]
    fn test_mismatched_tag_reports_offset() {
        let err = parse("<p><b>x</p>").unwrap_err();
        assert_eq!(
            err,
            EditorError::MalformedHydrationInput {
                offset: 7,
                reason: "</p> does not close <b>".into(),
            }
        );
    }

    #[test]
    fn test_unclosed_and_unterminated() {
        assert!(matches!(
            parse("<p>open"),
            Err(EditorError::MalformedHydrationInput { offset: 0, .. })
        ));
        assert!(matches!(
            parse("<p>x</p><img src=\"a"),
            Err(EditorError::MalformedHydrationInput { offset: 8, .. })
        ));
    }

    #[test]
    fn test_scripts_and_comments_are_skipped() {
        let tree = parse("<p>a<!-- note --><script>alert('<p>')</script>b</p>").unwrap();
        assert_eq!(tree.text_content(), "ab");
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let tree = parse("<p>1 < 2</p>").unwrap();
        assert_eq!(tree.text_content(), "1 < 2");
    }

    #[test]
    fn test_image_without_key_is_skipped() {
        let tree = parse(r#"<p><img src="/a.png">x</p>"#).unwrap();
        assert!(tree.media_keys().is_empty());
        assert_eq!(tree.text_content(), "x");
    }

    #[test]
    fn test_empty_paragraph_gets_empty_run() {
        let tree = parse("<p></p>").unwrap();
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.children(p).len(), 1);
        assert_eq!(tree.text(tree.children(p)[0]).map(|r| r.text.as_str()), Some(""));
    }

    #[test]
    fn test_css_declarations() {
        let mut style = InlineStyle::default();
        apply_css(
            &mut style,
            Some("color: #FF0000; background-color: var(--x); font-weight: 700"),
        );
        assert_eq!(style.color.as_ref().map(Color::as_str), Some("#ff0000"));
        assert_eq!(style.background, None);
        assert!(style.bold);
    }
}
