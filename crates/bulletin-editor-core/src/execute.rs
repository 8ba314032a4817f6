//! Command execution for document trees.
//!
//! Every entry point validates its input before touching the tree, so an
//! `Err` always means the tree is unchanged. Successful calls return the
//! selection re-derived through whatever the operation did.

use crate::actions::{Command, InlineFlag};
use crate::error::EditorError;
use crate::node::{BlockKind, InlineStyle, Link, NodeKind, TextRun};
use crate::tree::{DocumentTree, map_position};
use crate::types::{NodeId, Position, Selection};

/// Execute a command on a selection.
///
/// This is the central dispatch point for formatting operations. Inline
/// commands on a collapsed selection are a no-op here; the surface turns
/// them into a pending style for the next typed text.
pub fn execute(
    tree: &mut DocumentTree,
    command: &Command,
    selection: Selection,
) -> Result<Selection, EditorError> {
    let mark = tree.mark();
    let (base, start, end) = resolve(tree, selection)?;
    tracing::debug!(?command, collapsed = base.is_collapsed(), "executing command");

    if command.is_inline() {
        if start != end {
            apply_inline(tree, command, start, end);
        }
    } else {
        apply_block(tree, command, start, end);
    }
    Ok(finish(tree, mark, base))
}

/// Parse and execute a command by name.
pub fn execute_named(
    tree: &mut DocumentTree,
    name: &str,
    arg: Option<&str>,
    selection: Selection,
) -> Result<Selection, EditorError> {
    let command = Command::parse(name, arg)?;
    execute(tree, &command, selection)
}

/// Make sure the tree has somewhere to put a caret.
///
/// A tree with no leaves gets an empty paragraph. Returns the first position.
pub fn ensure_editable(tree: &mut DocumentTree) -> Option<Position> {
    if let Some(start) = tree.start_position() {
        return Some(start);
    }
    let root = tree.root();
    let paragraph = tree.push(root, NodeKind::Block(BlockKind::Paragraph))?;
    let run = tree.push(paragraph, NodeKind::Text(TextRun::default()))?;
    Some(Position::new(run, 0))
}

/// Validate the selection and order its ends.
///
/// An empty tree has no valid positions at all, so any selection is replaced
/// by a caret in a fresh paragraph.
fn resolve(
    tree: &mut DocumentTree,
    selection: Selection,
) -> Result<(Selection, Position, Position), EditorError> {
    if tree.start_position().is_none() {
        let at = ensure_editable(tree).ok_or(EditorError::SelectionUnavailable)?;
        return Ok((Selection::collapsed(at), at, at));
    }
    let (start, end) = tree
        .ordered(&selection)
        .ok_or(EditorError::SelectionUnavailable)?;
    Ok((selection, start, end))
}

/// Map `base` across everything since `mark`, falling back to the end of the document.
fn finish(tree: &DocumentTree, mark: usize, base: Selection) -> Selection {
    base.map(tree.steps_since(mark))
        .filter(|s| tree.is_valid(s))
        .or_else(|| tree.end_position().map(Selection::collapsed))
        .unwrap_or(base)
}

/// Caret already expressed in the current tree.
fn finish_at(tree: &DocumentTree, caret: Position) -> Selection {
    let caret = Selection::collapsed(caret);
    if tree.is_valid(&caret) {
        caret
    } else {
        tree.end_position().map_or(caret, Selection::collapsed)
    }
}

// === Inline ===

fn apply_inline(tree: &mut DocumentTree, command: &Command, start: Position, end: Position) {
    let runs = isolate(tree, start, end);
    if runs.is_empty() {
        return;
    }

    if let Command::Toggle(flag) = command {
        let all_set = runs
            .iter()
            .filter_map(|&r| tree.text(r))
            .all(|r| flag_of(&r.style, *flag));
        for &run in &runs {
            if let Some(r) = tree.text_mut(run) {
                *flag_mut(&mut r.style, *flag) = !all_set;
            }
        }
    } else {
        for &run in &runs {
            let Some(r) = tree.text_mut(run) else { continue };
            match command {
                Command::Color(color) => r.style.color = Some(color.clone()),
                Command::BackgroundColor(color) => r.style.background = Some(color.clone()),
                Command::RemoveFormatting => r.style = InlineStyle::default(),
                Command::Link { href, target } => {
                    r.link = Some(Link::new(href.clone(), target.clone()))
                }
                Command::Unlink => r.link = None,
                _ => {}
            }
        }
    }

    normalize_parents(tree, &runs);
}

/// Split runs so `start..end` is covered by whole runs, and return them.
fn isolate(tree: &mut DocumentTree, start: Position, end: Position) -> Vec<NodeId> {
    let mut start = start;
    let mut end = end;

    // End first, so the start position stays valid.
    if let Some(len) = tree.text(end.node).map(TextRun::char_len)
        && end.offset > 0
        && end.offset < len
    {
        tree.split_run(end.node, end.offset);
    }
    if let Some(len) = tree.text(start.node).map(TextRun::char_len)
        && start.offset > 0
        && start.offset < len
        && let Some(right) = tree.split_run(start.node, start.offset)
    {
        if end.node == start.node {
            end = Position::new(right, end.offset - start.offset);
        }
        start = Position::new(right, 0);
    }

    tree.runs_covering(start, end)
}

fn flag_of(style: &InlineStyle, flag: InlineFlag) -> bool {
    match flag {
        InlineFlag::Bold => style.bold,
        InlineFlag::Italic => style.italic,
        InlineFlag::Underline => style.underline,
    }
}

pub(crate) fn flag_mut(style: &mut InlineStyle, flag: InlineFlag) -> &mut bool {
    match flag {
        InlineFlag::Bold => &mut style.bold,
        InlineFlag::Italic => &mut style.italic,
        InlineFlag::Underline => &mut style.underline,
    }
}

fn normalize_parents(tree: &mut DocumentTree, leaves: &[NodeId]) {
    let mut parents: Vec<NodeId> = Vec::new();
    for &leaf in leaves {
        if let Some(p) = tree.parent(leaf)
            && !parents.contains(&p)
        {
            parents.push(p);
        }
    }
    for p in parents {
        tree.normalize_inlines(p);
    }
}

// === Block ===

fn apply_block(tree: &mut DocumentTree, command: &Command, start: Position, end: Position) {
    let leaves = tree.leaves_between(start.node, end.node);
    let mut blocks: Vec<NodeId> = Vec::new();
    for leaf in leaves {
        if let Some(block) = tree.ensure_textblock(leaf)
            && !blocks.contains(&block)
        {
            blocks.push(block);
        }
    }

    for block in blocks {
        match command {
            Command::Heading(level) => to_textblock(tree, block, BlockKind::Heading(*level)),
            Command::Paragraph => to_textblock(tree, block, BlockKind::Paragraph),
            Command::UnorderedList => to_list_item(tree, block, BlockKind::UnorderedList),
            Command::OrderedList => to_list_item(tree, block, BlockKind::OrderedList),
            _ => {}
        }
    }
}

fn to_textblock(tree: &mut DocumentTree, block: NodeId, kind: BlockKind) {
    if tree.block_kind(block) == Some(BlockKind::ListItem) {
        lift_item(tree, block, kind);
    } else {
        tree.set_block_kind(block, kind);
    }
}

/// Move a list item out of its list as a `kind` block, splitting the list around it.
fn lift_item(tree: &mut DocumentTree, item: NodeId, kind: BlockKind) {
    let Some(list) = tree.parent(item) else { return };
    let (Some(list_kind), Some(outer), Some(list_index), Some(item_index)) = (
        tree.block_kind(list),
        tree.parent(list),
        tree.index_in_parent(list),
        tree.index_in_parent(item),
    ) else {
        return;
    };

    let tail = tree.children(list)[item_index + 1..].to_vec();
    tree.attach(outer, list_index + 1, item);
    tree.set_block_kind(item, kind);

    if !tail.is_empty()
        && let Some(rest) = tree.insert_child(outer, list_index + 2, NodeKind::Block(list_kind))
    {
        for (i, child) in tail.into_iter().enumerate() {
            tree.attach(rest, i, child);
        }
    }
    if tree.children(list).is_empty() {
        tree.remove_subtree(list, None);
    }
}

fn to_list_item(tree: &mut DocumentTree, block: NodeId, list_kind: BlockKind) {
    if tree.block_kind(block) == Some(BlockKind::ListItem) {
        let current = tree.parent(block).and_then(|l| tree.block_kind(l));
        if current == Some(list_kind) {
            return;
        }
        lift_item(tree, block, BlockKind::Paragraph);
    }

    let (Some(parent), Some(index)) = (tree.parent(block), tree.index_in_parent(block)) else {
        return;
    };
    tree.set_block_kind(block, BlockKind::ListItem);

    let previous = index
        .checked_sub(1)
        .map(|i| tree.children(parent)[i])
        .filter(|&p| tree.block_kind(p) == Some(list_kind));
    let list = match previous {
        Some(list) => {
            let len = tree.children(list).len();
            tree.attach(list, len, block);
            list
        }
        None => match tree.wrap_children(parent, index..index + 1, list_kind) {
            Some(list) => list,
            None => return,
        },
    };

    // Join with a following list of the same kind.
    let next = tree
        .index_in_parent(list)
        .and_then(|i| tree.children(parent).get(i + 1).copied())
        .filter(|&n| tree.block_kind(n) == Some(list_kind));
    if let Some(next) = next {
        for child in tree.children(next).to_vec() {
            let len = tree.children(list).len();
            tree.attach(list, len, child);
        }
        tree.remove_subtree(next, None);
    }
}

// === Text ===

/// Insert typed text, replacing a non-collapsed selection.
///
/// The text continues the run it lands in, unless `style` asks for a
/// different style, in which case it becomes a new run. A `'\n'` splits the
/// block.
pub fn insert_text(
    tree: &mut DocumentTree,
    selection: Selection,
    text: &str,
    style: Option<&InlineStyle>,
) -> Result<Selection, EditorError> {
    let (_, start, end) = resolve(tree, selection)?;
    // Replacement text takes the style of the first replaced run.
    let replaced = match style {
        None if start != end => tree
            .runs_covering(start, end)
            .first()
            .and_then(|&run| tree.text(run))
            .map(|run| run.style.clone()),
        _ => None,
    };
    let style = style.or(replaced.as_ref());
    let mut caret = delete_range(tree, start, end);

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            caret = split_block_at(tree, caret);
        }
        caret = insert_line(tree, caret, line, style);
    }
    Ok(finish_at(tree, caret))
}

fn insert_line(
    tree: &mut DocumentTree,
    caret: Position,
    line: &str,
    style: Option<&InlineStyle>,
) -> Position {
    if line.is_empty() {
        return caret;
    }
    let len = line.chars().count();

    let continues_run = tree
        .text(caret.node)
        .is_some_and(|r| style.is_none_or(|s| *s == r.style));
    let placed = if continues_run {
        tree.insert_text(caret.node, caret.offset, line);
        Some(Position::new(caret.node, caret.offset + len))
    } else {
        let (inherited, link) = inherited_format(tree, caret);
        let run = TextRun::styled(line, style.cloned().unwrap_or(inherited), link);
        tree.insert_leaf_at(caret, NodeKind::Text(run))
            .map(|leaf| Position::new(leaf, len))
    };
    let Some(placed) = placed else { return caret };

    let mark = tree.mark();
    if let Some(parent) = tree.parent(placed.node) {
        tree.normalize_inlines(parent);
    }
    map_position(placed, tree.steps_since(mark)).unwrap_or(placed)
}

/// Style and link typing at `caret` would continue.
fn inherited_format(tree: &DocumentTree, caret: Position) -> (InlineStyle, Option<Link>) {
    if let Some(run) = tree.text(caret.node) {
        return (run.style.clone(), run.link.clone());
    }
    // Next to media: borrow from the neighbouring run on the caret's side.
    let Some(parent) = tree.parent(caret.node) else {
        return Default::default();
    };
    let siblings = tree.children(parent);
    let neighbor = tree.index_in_parent(caret.node).and_then(|i| {
        if caret.offset == 0 {
            i.checked_sub(1).and_then(|j| siblings.get(j))
        } else {
            siblings.get(i + 1)
        }
    });
    neighbor
        .and_then(|&n| tree.text(n))
        .map(|r| (r.style.clone(), r.link.clone()))
        .unwrap_or_default()
}

/// Insert a run at the selection, replacing it if non-collapsed.
pub fn insert_run(
    tree: &mut DocumentTree,
    selection: Selection,
    run: TextRun,
) -> Result<Selection, EditorError> {
    let (_, start, end) = resolve(tree, selection)?;
    let caret = delete_range(tree, start, end);
    let len = run.char_len();
    let Some(leaf) = tree.insert_leaf_at(caret, NodeKind::Text(run)) else {
        return Ok(finish_at(tree, caret));
    };
    let placed = Position::new(leaf, len);
    let mark = tree.mark();
    if let Some(parent) = tree.parent(leaf) {
        tree.normalize_inlines(parent);
    }
    let placed = map_position(placed, tree.steps_since(mark)).unwrap_or(placed);
    Ok(finish_at(tree, placed))
}

/// Split the block at the caret (Enter).
pub fn split_block(tree: &mut DocumentTree, selection: Selection) -> Result<Selection, EditorError> {
    let (_, start, end) = resolve(tree, selection)?;
    let caret = delete_range(tree, start, end);
    let caret = split_block_at(tree, caret);
    Ok(finish_at(tree, caret))
}

fn split_block_at(tree: &mut DocumentTree, caret: Position) -> Position {
    let Some(block) = tree.ensure_textblock(caret.node) else {
        return caret;
    };
    let (Some(outer), Some(block_index), Some(index), Some(len)) = (
        tree.parent(block),
        tree.index_in_parent(block),
        tree.index_in_parent(caret.node),
        tree.leaf_len(caret.node),
    ) else {
        return caret;
    };

    let boundary = if caret.offset == 0 && len > 0 {
        index
    } else if caret.offset >= len {
        index + 1
    } else {
        match tree.split_run(caret.node, caret.offset) {
            Some(_) => index + 1,
            None => return caret,
        }
    };

    let kind = match tree.block_kind(block) {
        Some(BlockKind::ListItem) => BlockKind::ListItem,
        _ => BlockKind::Paragraph,
    };
    let tail = tree.children(block)[boundary..].to_vec();
    let Some(next) = tree.insert_child(outer, block_index + 1, NodeKind::Block(kind)) else {
        return caret;
    };
    for (i, child) in tail.into_iter().enumerate() {
        tree.attach(next, i, child);
    }
    tree.normalize_inlines(block);
    tree.normalize_inlines(next);

    tree.children(next)
        .first()
        .map_or(caret, |&first| Position::new(first, 0))
}

/// Delete the selected range. A collapsed selection is returned unchanged.
pub fn delete_selection(
    tree: &mut DocumentTree,
    selection: Selection,
) -> Result<Selection, EditorError> {
    let (_, start, end) = resolve(tree, selection)?;
    let caret = delete_range(tree, start, end);
    Ok(finish_at(tree, caret))
}

/// Backspace: delete the selection, or the character or image before the
/// caret, or join the block with the one before it.
pub fn delete_backward(
    tree: &mut DocumentTree,
    selection: Selection,
) -> Result<Selection, EditorError> {
    let (base, start, end) = resolve(tree, selection)?;
    if start != end {
        let caret = delete_range(tree, start, end);
        return Ok(finish_at(tree, caret));
    }
    let Some(previous) = step_back(tree, start) else {
        return Ok(base);
    };
    let caret = delete_range(tree, previous, start);
    Ok(finish_at(tree, caret))
}

/// Position one deletable unit before `pos`.
fn step_back(tree: &DocumentTree, pos: Position) -> Option<Position> {
    if pos.offset > 0 {
        return Some(Position::new(pos.node, pos.offset - 1));
    }
    let leaves = tree.leaves();
    let mut index = leaves.iter().position(|&l| l == pos.node)?;
    loop {
        let previous = leaves.get(index.checked_sub(1)?).copied()?;
        let len = tree.leaf_len(previous)?;
        if tree.parent(previous) != tree.parent(pos.node) {
            // Block boundary: joining is the deletion.
            return Some(Position::new(previous, len));
        }
        if len > 0 {
            return Some(Position::new(previous, len - 1));
        }
        index -= 1;
    }
}

/// Delete `start..end` (document order) and return the collapsed caret.
///
/// The start is first anchored on a leaf that survives the deletion, so every
/// removed leaf can collapse onto it. Blocks emptied along the way are removed
/// and the block holding `end` is merged into the block holding `start`.
pub(crate) fn delete_range(tree: &mut DocumentTree, start: Position, end: Position) -> Position {
    if start == end {
        return start;
    }
    let (Some(start_block), Some(end_block)) = (
        tree.ensure_textblock(start.node),
        tree.ensure_textblock(end.node),
    ) else {
        return start;
    };

    let start = match tree.kind(start.node) {
        Some(NodeKind::Media(_)) if start.offset == 0 => anchor_before(tree, start.node),
        _ => start,
    };

    for leaf in tree.leaves_between(start.node, end.node) {
        let is_text = tree.text(leaf).is_some();
        let len = tree.leaf_len(leaf).unwrap_or(0);
        if leaf == start.node && leaf == end.node {
            tree.delete_text(leaf, start.offset, end.offset);
        } else if leaf == start.node {
            if is_text {
                tree.delete_text(leaf, start.offset, len);
            }
        } else if leaf == end.node {
            if is_text {
                tree.delete_text(leaf, 0, end.offset);
            } else if end.offset >= len {
                tree.remove_leaf(leaf, Some(start));
            }
        } else {
            tree.remove_leaf(leaf, Some(start));
        }
    }

    if start_block != end_block && tree.contains(end_block) {
        for child in tree.children(end_block).to_vec() {
            let len = tree.children(start_block).len();
            tree.attach(start_block, len, child);
        }
        tree.remove_subtree(end_block, Some(start));
    }
    tree.prune(Some(start_block));

    let mark = tree.mark();
    tree.normalize_inlines(start_block);
    map_position(start, tree.steps_since(mark)).unwrap_or(start)
}

/// A position just before `media` that is not inside it.
fn anchor_before(tree: &mut DocumentTree, media: NodeId) -> Position {
    let (Some(parent), Some(index)) = (tree.parent(media), tree.index_in_parent(media)) else {
        return Position::new(media, 0);
    };
    if let Some(previous) = index.checked_sub(1).map(|i| tree.children(parent)[i])
        && tree.text(previous).is_some()
    {
        return tree.end_of(previous);
    }
    tree.insert_child(parent, index, NodeKind::Text(TextRun::default()))
        .map_or(Position::new(media, 0), |run| Position::new(run, 0))
}

#[cfg(test)]
mod tests;
