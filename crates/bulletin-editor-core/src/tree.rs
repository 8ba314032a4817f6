//! Arena-backed document tree.
//!
//! Nodes live in a map keyed by [`NodeId`]; structure is kept as parent links
//! plus ordered child lists. Every mutation that can move or invalidate a
//! [`Position`] is recorded as a [`Step`] in the tree's journal, so selections
//! taken before a mutation can be re-derived afterwards instead of reused.
//!
//! Shape rules maintained by the editing operations:
//! - the root holds blocks, and occasionally loose inline leaves from hydrated input
//! - lists hold only list items
//! - paragraphs, headings and list items hold only inline leaves, and never zero of them
//!   (an empty textblock holds one empty run)

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

use crate::node::{BlockKind, MediaKey, MediaNode, NodeKind, TextRun};
use crate::types::{NodeId, Position, Selection};

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A primitive mutation, kept so positions can be mapped across it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// `len` chars inserted into `run` at `at`. Positions at `at` move right.
    InsertText { run: NodeId, at: usize, len: usize },
    /// Chars `start..end` removed from `run`.
    DeleteText { run: NodeId, start: usize, end: usize },
    /// Text of `run` from `at` onwards moved into the new run `into`.
    Split { run: NodeId, at: usize, into: NodeId },
    /// Run `from` appended onto `into`, whose previous length was `shift`.
    Merge { from: NodeId, into: NodeId, shift: usize },
    /// New leaf of length `len` inserted at `at`. Positions equal to `at` move past it.
    InsertLeaf {
        at: Position,
        leaf: NodeId,
        len: usize,
    },
    /// Leaf removed. Positions inside it collapse onto `to`, or die if `None`.
    RemoveLeaf { leaf: NodeId, to: Option<Position> },
}

impl Step {
    /// Map a position across this step.
    pub fn map(&self, pos: Position) -> Option<Position> {
        let mapped = match *self {
            Step::InsertText { run, at, len } if pos.node == run && pos.offset >= at => {
                Position::new(run, pos.offset + len)
            }
            Step::DeleteText { run, start, end } if pos.node == run => {
                if pos.offset >= end {
                    Position::new(run, pos.offset - (end - start))
                } else if pos.offset > start {
                    Position::new(run, start)
                } else {
                    pos
                }
            }
            Step::Split { run, at, into } if pos.node == run && pos.offset >= at => {
                Position::new(into, pos.offset - at)
            }
            Step::Merge { from, into, shift } if pos.node == from => {
                Position::new(into, pos.offset + shift)
            }
            Step::InsertLeaf { at, leaf, len } if pos == at => Position::new(leaf, len),
            Step::RemoveLeaf { leaf, to } if pos.node == leaf => return to,
            _ => pos,
        };
        Some(mapped)
    }
}

/// Map a position across a sequence of steps, oldest first.
pub fn map_position(pos: Position, steps: &[Step]) -> Option<Position> {
    steps.iter().try_fold(pos, |pos, step| step.map(pos))
}

impl Selection {
    /// Re-derive this selection after `steps`. `None` if either end was lost.
    pub fn map(self, steps: &[Step]) -> Option<Selection> {
        Some(Selection::new(
            map_position(self.anchor, steps)?,
            map_position(self.head, steps)?,
        ))
    }
}

/// The document tree.
#[derive(Clone, Debug)]
pub struct DocumentTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    journal: Vec<Step>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// Create an empty tree holding only the root.
    pub fn new() -> Self {
        Self::with_next_id(0)
    }

    /// Create an empty tree whose ids start at `next_id`.
    ///
    /// Used when a tree replaces another wholesale so ids of the old tree are
    /// never handed out again.
    pub fn with_next_id(next_id: u64) -> Self {
        let root = NodeId(next_id);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            root,
            next_id: next_id + 1,
            journal: Vec::new(),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&id).map(|n| &n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(&id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&TextRun> {
        match self.kind(id)? {
            NodeKind::Text(run) => Some(run),
            _ => None,
        }
    }

    pub fn media(&self, id: NodeId) -> Option<&MediaNode> {
        match self.kind(id)? {
            NodeKind::Media(media) => Some(media),
            _ => None,
        }
    }

    pub fn block_kind(&self, id: NodeId) -> Option<BlockKind> {
        self.kind(id)?.block()
    }

    pub fn is_textblock(&self, id: NodeId) -> bool {
        self.block_kind(id).is_some_and(BlockKind::is_textblock)
    }

    /// Length of a leaf in position units: chars for text, 1 for media.
    pub fn leaf_len(&self, id: NodeId) -> Option<usize> {
        match self.kind(id)? {
            NodeKind::Text(run) => Some(run.char_len()),
            NodeKind::Media(_) => Some(1),
            _ => None,
        }
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// True when `id` exists and its ancestor chain reaches the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || (self.contains(id) && self.ancestors(id).any(|a| a == self.root))
    }

    /// All leaves in document order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(self.root, &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            if self.kind(child).is_some_and(NodeKind::is_leaf) {
                out.push(child);
            } else {
                self.collect_leaves(child, out);
            }
        }
    }

    pub fn is_valid_position(&self, pos: Position) -> bool {
        self.leaf_len(pos.node).is_some_and(|len| pos.offset <= len) && self.is_attached(pos.node)
    }

    /// Both ends of the selection point into attached leaves.
    pub fn is_valid(&self, selection: &Selection) -> bool {
        self.is_valid_position(selection.anchor) && self.is_valid_position(selection.head)
    }

    /// Compare two valid positions in document order.
    pub fn compare(&self, a: Position, b: Position) -> Option<Ordering> {
        if a.node == b.node {
            return Some(a.offset.cmp(&b.offset));
        }
        let leaves = self.leaves();
        let ia = leaves.iter().position(|&l| l == a.node)?;
        let ib = leaves.iter().position(|&l| l == b.node)?;
        Some(ia.cmp(&ib))
    }

    /// Selection ends in document order, `None` if the selection is stale.
    pub fn ordered(&self, selection: &Selection) -> Option<(Position, Position)> {
        if !self.is_valid(selection) {
            return None;
        }
        match self.compare(selection.anchor, selection.head)? {
            Ordering::Greater => Some((selection.head, selection.anchor)),
            _ => Some((selection.anchor, selection.head)),
        }
    }

    pub fn start_position(&self) -> Option<Position> {
        self.leaves().first().map(|&l| Position::new(l, 0))
    }

    pub fn end_position(&self) -> Option<Position> {
        self.leaves().last().map(|&l| self.end_of(l))
    }

    pub(crate) fn end_of(&self, leaf: NodeId) -> Position {
        Position::new(leaf, self.leaf_len(leaf).unwrap_or(0))
    }

    /// Concatenated text of every run, without block separators.
    pub fn text_content(&self) -> String {
        self.leaves()
            .into_iter()
            .filter_map(|l| self.text(l))
            .map(|r| r.text.as_str())
            .collect()
    }

    /// Text covered by a selection, empty if the selection is stale.
    pub fn text_in(&self, selection: &Selection) -> String {
        let Some((start, end)) = self.ordered(selection) else {
            return String::new();
        };
        let mut out = String::new();
        for leaf in self.leaves_between(start.node, end.node) {
            let Some(run) = self.text(leaf) else { continue };
            let from = if leaf == start.node { start.offset } else { 0 };
            let to = if leaf == end.node {
                end.offset
            } else {
                run.char_len()
            };
            if from < to {
                out.push_str(&run.text[run.byte_index(from)..run.byte_index(to)]);
            }
        }
        out
    }

    /// True if the tree holds any text or any media.
    pub fn has_content(&self) -> bool {
        self.leaves().into_iter().any(|l| match self.kind(l) {
            Some(NodeKind::Text(run)) => !run.text.is_empty(),
            Some(NodeKind::Media(_)) => true,
            _ => false,
        })
    }

    /// Media reference keys in document order.
    pub fn media_keys(&self) -> Vec<MediaKey> {
        self.leaves()
            .into_iter()
            .filter_map(|l| self.media(l))
            .map(|m| m.key().clone())
            .collect()
    }

    pub fn find_media(&self, key: &MediaKey) -> Option<NodeId> {
        self.leaves()
            .into_iter()
            .find(|&l| self.media(l).is_some_and(|m| m.key() == key))
    }

    /// Nearest node that has both `a` and `b` as descendants (or is one of them).
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let chain: Vec<NodeId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        std::iter::once(b)
            .chain(self.ancestors(b))
            .find(|n| chain.contains(n))
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Leaves from `start` to `end` inclusive, in document order.
    pub fn leaves_between(&self, start: NodeId, end: NodeId) -> Vec<NodeId> {
        let leaves = self.leaves();
        let (Some(i), Some(j)) = (
            leaves.iter().position(|&l| l == start),
            leaves.iter().position(|&l| l == end),
        ) else {
            return Vec::new();
        };
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        leaves[i..=j].to_vec()
    }

    /// Non-empty text runs with at least one character inside `start..end`.
    pub fn runs_covering(&self, start: Position, end: Position) -> Vec<NodeId> {
        self.leaves_between(start.node, end.node)
            .into_iter()
            .filter(|&leaf| {
                let Some(len) = self.text(leaf).map(TextRun::char_len) else {
                    return false;
                };
                let starts_after = leaf == start.node && start.offset >= len;
                let ends_before = leaf == end.node && end.offset == 0;
                len > 0 && !starts_after && !ends_before
            })
            .collect()
    }

    // === Journal ===

    /// Current journal length, to pass to [`steps_since`](Self::steps_since) later.
    pub fn mark(&self) -> usize {
        self.journal.len()
    }

    pub fn steps_since(&self, mark: usize) -> &[Step] {
        self.journal.get(mark..).unwrap_or(&[])
    }

    /// Drain every recorded step.
    pub fn take_steps(&mut self) -> Vec<Step> {
        std::mem::take(&mut self.journal)
    }

    // === Construction ===

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                parent,
                children: Vec::new(),
            },
        );
        id
    }

    /// Append a new child under `parent`.
    ///
    /// Appending never moves an existing position, so nothing is journaled.
    /// Returns `None` if `parent` does not exist or is a leaf.
    pub fn push(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, kind)
    }

    pub(crate) fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        kind: NodeKind,
    ) -> Option<NodeId> {
        if self.kind(parent).is_none_or(NodeKind::is_leaf) {
            return None;
        }
        let id = self.alloc(kind, Some(parent));
        let node = self.nodes.get_mut(&parent)?;
        let index = index.min(node.children.len());
        node.children.insert(index, id);
        Some(id)
    }

    pub(crate) fn text_mut(&mut self, id: NodeId) -> Option<&mut TextRun> {
        match &mut self.nodes.get_mut(&id)?.kind {
            NodeKind::Text(run) => Some(run),
            _ => None,
        }
    }

    pub(crate) fn set_block_kind(&mut self, id: NodeId, kind: BlockKind) {
        if let Some(node) = self.nodes.get_mut(&id)
            && matches!(node.kind, NodeKind::Block(_))
        {
            node.kind = NodeKind::Block(kind);
        }
    }

    // === Text primitives ===

    pub(crate) fn insert_text(&mut self, run: NodeId, at: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(r) = self.text_mut(run) else { return };
        let at = at.min(r.char_len());
        let byte = r.byte_index(at);
        r.text.insert_str(byte, text);
        let len = text.chars().count();
        self.journal.push(Step::InsertText { run, at, len });
    }

    pub(crate) fn delete_text(&mut self, run: NodeId, start: usize, end: usize) {
        let Some(r) = self.text_mut(run) else { return };
        let end = end.min(r.char_len());
        if start >= end {
            return;
        }
        let (bs, be) = (r.byte_index(start), r.byte_index(end));
        r.text.replace_range(bs..be, "");
        self.journal.push(Step::DeleteText { run, start, end });
    }

    /// Split a run at `at`, returning the new right-hand run.
    pub(crate) fn split_run(&mut self, run: NodeId, at: usize) -> Option<NodeId> {
        let parent = self.parent(run)?;
        let index = self.index_in_parent(run)?;
        let r = self.text_mut(run)?;
        let at = at.min(r.char_len());
        let tail = r.text.split_off(r.byte_index(at));
        let right = TextRun::styled(tail, r.style.clone(), r.link.clone());
        let into = self.insert_child(parent, index + 1, NodeKind::Text(right))?;
        self.journal.push(Step::Split { run, at, into });
        Some(into)
    }

    /// Append `from` onto `into` and drop `from`.
    pub(crate) fn merge_runs(&mut self, into: NodeId, from: NodeId) {
        let Some(tail) = self.text(from).map(|r| r.text.clone()) else {
            return;
        };
        let Some(r) = self.text_mut(into) else { return };
        let shift = r.char_len();
        r.text.push_str(&tail);
        self.detach(from);
        self.nodes.remove(&from);
        self.journal.push(Step::Merge { from, into, shift });
    }

    // === Leaf primitives ===

    /// Insert a new leaf at a position, splitting a text run if needed.
    pub(crate) fn insert_leaf_at(&mut self, at: Position, kind: NodeKind) -> Option<NodeId> {
        let parent = self.parent(at.node)?;
        let index = self.index_in_parent(at.node)?;
        let len = self.leaf_len(at.node)?;
        let new_len = match &kind {
            NodeKind::Text(run) => run.char_len(),
            NodeKind::Media(_) => 1,
            _ => return None,
        };

        let is_text = self.text(at.node).is_some();
        let (index, journal_at) = if is_text && at.offset > 0 && at.offset < len {
            self.split_run(at.node, at.offset)?;
            (index + 1, None)
        } else if at.offset == 0 && len > 0 {
            (index, Some(at))
        } else {
            (index + 1, Some(Position::new(at.node, at.offset.min(len))))
        };

        let leaf = self.insert_child(parent, index, kind)?;
        if let Some(at) = journal_at {
            self.journal.push(Step::InsertLeaf {
                at,
                leaf,
                len: new_len,
            });
        }
        Some(leaf)
    }

    /// Remove a leaf, collapsing positions inside it onto `to`.
    pub(crate) fn remove_leaf(&mut self, leaf: NodeId, to: Option<Position>) {
        if !self.kind(leaf).is_some_and(NodeKind::is_leaf) {
            return;
        }
        self.detach(leaf);
        self.nodes.remove(&leaf);
        self.journal.push(Step::RemoveLeaf { leaf, to });
    }

    /// Remove a node and everything under it.
    pub(crate) fn remove_subtree(&mut self, id: NodeId, to: Option<Position>) {
        if id == self.root {
            return;
        }
        let mut leaves = Vec::new();
        self.collect_leaves(id, &mut leaves);
        self.detach(id);
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.remove(&n) {
                stack.extend(node.children);
            }
        }
        for leaf in leaves {
            self.journal.push(Step::RemoveLeaf { leaf, to });
        }
    }

    /// Best position to collapse onto when `leaf` goes away.
    pub(crate) fn neighbor_position(&self, leaf: NodeId) -> Option<Position> {
        let leaves = self.leaves();
        let i = leaves.iter().position(|&l| l == leaf)?;
        let same_parent = |other: NodeId| self.parent(other) == self.parent(leaf);
        let prev = i.checked_sub(1).map(|j| leaves[j]);
        let next = leaves.get(i + 1).copied();
        match (prev, next) {
            (Some(p), _) if same_parent(p) => Some(self.end_of(p)),
            (_, Some(n)) if same_parent(n) => Some(Position::new(n, 0)),
            (Some(p), _) => Some(self.end_of(p)),
            (_, Some(n)) => Some(Position::new(n, 0)),
            _ => None,
        }
    }

    // === Structure primitives ===
    // Moving nodes never changes a leaf's identity or offsets, so nothing here is journaled.

    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else { return };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    pub(crate) fn attach(&mut self, parent: NodeId, index: usize, id: NodeId) {
        self.detach(id);
        let Some(node) = self.nodes.get_mut(&parent) else {
            return;
        };
        let index = index.min(node.children.len());
        node.children.insert(index, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
        }
    }

    /// Move `parent`'s children in `range` into a new block inserted in their place.
    pub(crate) fn wrap_children(
        &mut self,
        parent: NodeId,
        range: Range<usize>,
        kind: BlockKind,
    ) -> Option<NodeId> {
        let moved: Vec<NodeId> = self.children(parent).get(range.clone())?.to_vec();
        let wrapper = self.insert_child(parent, range.start, NodeKind::Block(kind))?;
        for (i, child) in moved.into_iter().enumerate() {
            self.attach(wrapper, i, child);
        }
        Some(wrapper)
    }

    /// Make sure `leaf` sits in a textblock, wrapping its run of loose root
    /// siblings in a paragraph if it does not. Returns the textblock.
    pub(crate) fn ensure_textblock(&mut self, leaf: NodeId) -> Option<NodeId> {
        let parent = self.parent(leaf)?;
        if self.is_textblock(parent) {
            return Some(parent);
        }
        let siblings = self.children(parent).to_vec();
        let index = siblings.iter().position(|&c| c == leaf)?;
        let is_inline = |id: &NodeId| self.kind(*id).is_some_and(NodeKind::is_leaf);
        let start = siblings[..index]
            .iter()
            .rposition(|c| !is_inline(c))
            .map_or(0, |i| i + 1);
        let end = siblings[index..]
            .iter()
            .position(|c| !is_inline(c))
            .map_or(siblings.len(), |i| index + i);
        self.wrap_children(parent, start..end, BlockKind::Paragraph)
    }

    /// Merge equal adjacent runs in a container and drop empty runs that have siblings.
    /// A textblock left with no children gets an empty run.
    pub(crate) fn normalize_inlines(&mut self, container: NodeId) {
        while self.children(container).len() > 1 {
            let empty = self
                .children(container)
                .iter()
                .copied()
                .find(|&c| self.text(c).is_some_and(|r| r.text.is_empty()));
            let Some(empty) = empty else { break };
            let to = self.neighbor_position(empty);
            self.remove_leaf(empty, to);
        }

        let mut i = 0;
        while i + 1 < self.children(container).len() {
            let (a, b) = (self.children(container)[i], self.children(container)[i + 1]);
            let mergeable = match (self.text(a), self.text(b)) {
                (Some(ra), Some(rb)) => ra.same_format(rb),
                _ => false,
            };
            if mergeable {
                self.merge_runs(a, b);
            } else {
                i += 1;
            }
        }

        if self.children(container).is_empty() && self.is_textblock(container) {
            self.push(container, NodeKind::Text(TextRun::default()));
        }
    }

    /// Remove empty lists and childless textblocks, except `keep`.
    pub(crate) fn prune(&mut self, keep: Option<NodeId>) {
        let blocks: Vec<NodeId> = self.children(self.root).to_vec();
        for block in blocks {
            self.prune_node(block, keep);
        }
    }

    fn prune_node(&mut self, id: NodeId, keep: Option<NodeId>) {
        let Some(kind) = self.block_kind(id) else {
            return;
        };
        if kind.is_list() {
            for child in self.children(id).to_vec() {
                self.prune_node(child, keep);
            }
        }
        if self.children(id).is_empty() && Some(id) != keep {
            self.remove_subtree(id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::InlineStyle;

    fn paragraph_with(tree: &mut DocumentTree, runs: &[&str]) -> (NodeId, Vec<NodeId>) {
        let root = tree.root();
        let p = tree
            .push(root, NodeKind::Block(BlockKind::Paragraph))
            .unwrap();
        let ids = runs
            .iter()
            .map(|t| tree.push(p, NodeKind::Text(TextRun::new(*t))).unwrap())
            .collect();
        (p, ids)
    }

    #[test]
    fn test_ids_never_reused_across_trees() {
        let mut tree = DocumentTree::new();
        let (p, _) = paragraph_with(&mut tree, &["a"]);
        let next = DocumentTree::with_next_id(tree.next_id());
        assert!(next.root().get() > p.get());
    }

    #[test]
    fn test_insert_text_moves_positions_at_or_after() {
        let mut tree = DocumentTree::new();
        let (_, runs) = paragraph_with(&mut tree, &["hello"]);
        let mark = tree.mark();
        tree.insert_text(runs[0], 2, "XY");
        assert_eq!(tree.text(runs[0]).unwrap().text, "heXYllo");
        let steps = tree.steps_since(mark);
        assert_eq!(
            map_position(Position::new(runs[0], 1), steps),
            Some(Position::new(runs[0], 1))
        );
        assert_eq!(
            map_position(Position::new(runs[0], 2), steps),
            Some(Position::new(runs[0], 4))
        );
    }

    #[test]
    fn test_delete_text_collapses_inside() {
        let mut tree = DocumentTree::new();
        let (_, runs) = paragraph_with(&mut tree, &["abcdef"]);
        let mark = tree.mark();
        tree.delete_text(runs[0], 1, 4);
        assert_eq!(tree.text(runs[0]).unwrap().text, "aef");
        let steps = tree.steps_since(mark);
        assert_eq!(map_position(Position::new(runs[0], 3), steps).map(|p| p.offset), Some(1));
        assert_eq!(map_position(Position::new(runs[0], 5), steps).map(|p| p.offset), Some(2));
    }

    #[test]
    fn test_split_and_merge_mapping() {
        let mut tree = DocumentTree::new();
        let (p, runs) = paragraph_with(&mut tree, &["abcdef"]);
        let mark = tree.mark();
        let right = tree.split_run(runs[0], 2).unwrap();
        assert_eq!(tree.children(p), &[runs[0], right]);
        assert_eq!(tree.text(right).unwrap().text, "cdef");

        let pos = Position::new(runs[0], 4);
        let after_split = map_position(pos, tree.steps_since(mark)).unwrap();
        assert_eq!(after_split, Position::new(right, 2));

        tree.merge_runs(runs[0], right);
        assert!(!tree.contains(right));
        let after_merge = map_position(pos, tree.steps_since(mark)).unwrap();
        assert_eq!(after_merge, Position::new(runs[0], 4));
    }

    #[test]
    fn test_insert_leaf_mid_run_keeps_caret_after() {
        let mut tree = DocumentTree::new();
        let (p, runs) = paragraph_with(&mut tree, &["beforeafter"]);
        let caret = Position::new(runs[0], 6);
        let mark = tree.mark();
        let media = MediaNode::new(MediaKey::new("a"), "/a.png");
        let leaf = tree.insert_leaf_at(caret, NodeKind::Media(media)).unwrap();

        let children = tree.children(p).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], leaf);
        assert_eq!(tree.text(children[0]).unwrap().text, "before");
        assert_eq!(tree.text(children[2]).unwrap().text, "after");

        let mapped = map_position(caret, tree.steps_since(mark)).unwrap();
        assert_eq!(tree.compare(Position::new(leaf, 1), mapped), Some(Ordering::Less));
    }

    #[test]
    fn test_insert_leaf_at_run_end_moves_equal_position() {
        let mut tree = DocumentTree::new();
        let (_, runs) = paragraph_with(&mut tree, &["text"]);
        let caret = Position::new(runs[0], 4);
        let mark = tree.mark();
        let media = MediaNode::new(MediaKey::new("a"), "/a.png");
        let leaf = tree.insert_leaf_at(caret, NodeKind::Media(media)).unwrap();
        assert_eq!(
            map_position(caret, tree.steps_since(mark)),
            Some(Position::new(leaf, 1))
        );
    }

    #[test]
    fn test_normalize_drops_empties_and_merges() {
        let mut tree = DocumentTree::new();
        let (p, runs) = paragraph_with(&mut tree, &["ab", "", "cd"]);
        let mark = tree.mark();
        tree.normalize_inlines(p);
        assert_eq!(tree.children(p), &[runs[0]]);
        assert_eq!(tree.text(runs[0]).unwrap().text, "abcd");
        let mapped = map_position(Position::new(runs[2], 1), tree.steps_since(mark));
        assert_eq!(mapped, Some(Position::new(runs[0], 3)));
    }

    #[test]
    fn test_normalize_keeps_distinct_formats() {
        let mut tree = DocumentTree::new();
        let (p, runs) = paragraph_with(&mut tree, &["ab", "cd"]);
        tree.text_mut(runs[1]).unwrap().style = InlineStyle {
            bold: true,
            ..Default::default()
        };
        tree.normalize_inlines(p);
        assert_eq!(tree.children(p).len(), 2);
    }

    #[test]
    fn test_remove_subtree_maps_to_target() {
        let mut tree = DocumentTree::new();
        let (_, first) = paragraph_with(&mut tree, &["keep"]);
        let (p2, second) = paragraph_with(&mut tree, &["gone"]);
        let target = Position::new(first[0], 4);
        let mark = tree.mark();
        tree.remove_subtree(p2, Some(target));
        assert!(!tree.contains(second[0]));
        assert_eq!(
            map_position(Position::new(second[0], 2), tree.steps_since(mark)),
            Some(target)
        );
    }

    #[test]
    fn test_ensure_textblock_wraps_loose_group() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let a = tree.push(root, NodeKind::Text(TextRun::new("a"))).unwrap();
        let b = tree.push(root, NodeKind::Text(TextRun::new("b"))).unwrap();
        let (p, _) = paragraph_with(&mut tree, &["c"]);
        let wrapper = tree.ensure_textblock(b).unwrap();
        assert_eq!(tree.children(root), &[wrapper, p]);
        assert_eq!(tree.children(wrapper), &[a, b]);
        assert_eq!(tree.block_kind(wrapper), Some(BlockKind::Paragraph));
    }

    #[test]
    fn test_stale_selection_is_invalid() {
        let mut tree = DocumentTree::new();
        let (p, runs) = paragraph_with(&mut tree, &["x"]);
        let sel = Selection::collapsed(Position::new(runs[0], 1));
        assert!(tree.is_valid(&sel));
        tree.remove_subtree(p, None);
        assert!(!tree.is_valid(&sel));
        assert_eq!(tree.ordered(&sel), None);
    }
}
