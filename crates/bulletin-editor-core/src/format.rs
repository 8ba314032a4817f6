//! Format state inspection.
//!
//! Pure function of tree and selection, recomputed on every event rather
//! than cached.

use crate::node::{BlockKind, InlineStyle};
use crate::tree::DocumentTree;
use crate::types::{Position, Selection};

/// Active formatting at a selection, as a toolbar would display it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FormatState {
    pub block_kind: BlockKind,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub unordered_list: bool,
    pub ordered_list: bool,
}

/// Compute the format state for a selection.
///
/// Walks from the common ancestor of both ends up to the root: the nearest
/// block decides `block_kind` (paragraph if none), and any list on the way sets
/// the matching list flag. An inline flag is set for a range only when every
/// run it covers carries it; a caret reads the run typing would continue. A
/// stale selection yields the default state.
pub fn inspect(tree: &DocumentTree, selection: &Selection) -> FormatState {
    let Some((start, end)) = tree.ordered(selection) else {
        return FormatState::default();
    };
    let Some(common) = tree.common_ancestor(start.node, end.node) else {
        return FormatState::default();
    };

    let mut state = FormatState::default();
    let mut found_block = false;
    for id in std::iter::once(common).chain(tree.ancestors(common)) {
        let Some(kind) = tree.block_kind(id) else {
            continue;
        };
        if !found_block {
            state.block_kind = kind;
            found_block = true;
        }
        match kind {
            BlockKind::UnorderedList => state.unordered_list = true,
            BlockKind::OrderedList => state.ordered_list = true,
            _ => {}
        }
    }

    let covered: Vec<&InlineStyle> = if selection.is_collapsed() {
        Vec::new()
    } else {
        tree.runs_covering(start, end)
            .into_iter()
            .filter_map(|run| tree.text(run))
            .map(|run| &run.style)
            .collect()
    };
    if !covered.is_empty() {
        state.bold = covered.iter().all(|s| s.bold);
        state.italic = covered.iter().all(|s| s.italic);
        state.underline = covered.iter().all(|s| s.underline);
    } else if let Some(style) = style_at(tree, start, selection.is_collapsed()) {
        state.bold = style.bold;
        state.italic = style.italic;
        state.underline = style.underline;
    }
    state
}

/// Style of the run that typing at (or selecting from) `pos` would continue.
fn style_at(tree: &DocumentTree, pos: Position, collapsed: bool) -> Option<&InlineStyle> {
    let run = tree.text(pos.node)?;
    let len = run.char_len();
    let siblings = tree.parent(pos.node).map(|p| tree.children(p)).unwrap_or(&[]);
    let index = siblings.iter().position(|&c| c == pos.node)?;

    let neighbor = if collapsed && pos.offset == 0 {
        index.checked_sub(1).and_then(|i| siblings.get(i))
    } else if !collapsed && pos.offset == len && len > 0 {
        siblings.get(index + 1)
    } else {
        None
    };

    Some(
        neighbor
            .and_then(|&n| tree.text(n))
            .map_or(&run.style, |r| &r.style),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{HeadingLevel, NodeKind, TextRun};

    #[test]
    fn test_stale_selection_gives_default() {
        let tree = DocumentTree::new();
        let mut other = DocumentTree::new();
        let root = other.root();
        let run = other.push(root, NodeKind::Text(TextRun::new("x"))).unwrap();
        let state = inspect(&tree, &Selection::collapsed(Position::new(run, 0)));
        assert_eq!(state, FormatState::default());
    }

    #[test]
    fn test_heading_and_bold() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let h = tree
            .push(root, NodeKind::Block(BlockKind::Heading(HeadingLevel::new(2).unwrap())))
            .unwrap();
        let mut bold = TextRun::new("Notice");
        bold.style.bold = true;
        let run = tree.push(h, NodeKind::Text(bold)).unwrap();

        let sel = Selection::new(Position::new(run, 0), Position::new(run, 6));
        let state = inspect(&tree, &sel);
        assert_eq!(state.block_kind, BlockKind::Heading(HeadingLevel::new(2).unwrap()));
        assert!(state.bold);
        assert!(!state.italic);
        assert!(!state.unordered_list);
    }

    #[test]
    fn test_list_flags_and_caret_at_run_start() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let ol = tree.push(root, NodeKind::Block(BlockKind::OrderedList)).unwrap();
        let li = tree.push(ol, NodeKind::Block(BlockKind::ListItem)).unwrap();
        let mut italic = TextRun::new("one");
        italic.style.italic = true;
        tree.push(li, NodeKind::Text(italic)).unwrap();
        let plain = tree.push(li, NodeKind::Text(TextRun::new(" two"))).unwrap();

        // Caret right after the italic run continues italic.
        let state = inspect(&tree, &Selection::collapsed(Position::new(plain, 0)));
        assert_eq!(state.block_kind, BlockKind::ListItem);
        assert!(state.ordered_list);
        assert!(!state.unordered_list);
        assert!(state.italic);

        let state = inspect(&tree, &Selection::collapsed(Position::new(plain, 2)));
        assert!(!state.italic);
    }

    #[test]
    fn test_inline_flags_need_every_covered_run() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let p = tree.push(root, NodeKind::Block(BlockKind::Paragraph)).unwrap();
        let mut bold = TextRun::new("ab");
        bold.style.bold = true;
        bold.style.underline = true;
        let strong = tree.push(p, NodeKind::Text(bold)).unwrap();
        let mut under = TextRun::new("cd");
        under.style.underline = true;
        let plain = tree.push(p, NodeKind::Text(under)).unwrap();

        let whole = Selection::new(Position::new(strong, 0), Position::new(plain, 2));
        let state = inspect(&tree, &whole);
        assert!(!state.bold);
        assert!(state.underline);

        let first = Selection::new(Position::new(strong, 0), Position::new(strong, 2));
        assert!(inspect(&tree, &first).bold);

        // Starting at the end of the bold run covers only the plain one.
        let second = Selection::new(Position::new(strong, 2), Position::new(plain, 2));
        assert!(!inspect(&tree, &second).bold);
    }

    #[test]
    fn test_loose_root_text_defaults_to_paragraph() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let run = tree.push(root, NodeKind::Text(TextRun::new("loose"))).unwrap();
        let state = inspect(&tree, &Selection::collapsed(Position::new(run, 2)));
        assert_eq!(state.block_kind, BlockKind::Paragraph);
    }
}
