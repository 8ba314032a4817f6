//! Command executor behaviour.

use super::*;
use crate::config::EditorConfig;
use crate::format::{FormatState, inspect};
use crate::html::{parse_html, serialize};
use crate::node::{Color, HeadingLevel};

fn hydrate(html: &str) -> DocumentTree {
    parse_html(html, &EditorConfig::default(), 0).expect("parse failed")
}

fn html(tree: &DocumentTree) -> String {
    serialize(tree, &EditorConfig::default())
}

/// Position `n` units into the document, counting text chars and media.
fn at(tree: &DocumentTree, mut n: usize) -> Position {
    for leaf in tree.leaves() {
        let len = tree.leaf_len(leaf).unwrap();
        if n <= len {
            return Position::new(leaf, n);
        }
        n -= len;
    }
    panic!("offset past end of document");
}

fn range(tree: &DocumentTree, from: usize, to: usize) -> Selection {
    Selection::new(at(tree, from), at(tree, to))
}

fn heading(level: u8) -> Command {
    Command::Heading(HeadingLevel::new(level).unwrap())
}

#[test]
fn test_bold_then_heading() {
    let mut tree = DocumentTree::new();
    let caret = ensure_editable(&mut tree).unwrap();
    let typed = insert_text(&mut tree, Selection::collapsed(caret), "Notice", None).unwrap();
    assert_eq!(typed.head.offset, 6);

    let selection = range(&tree, 0, 6);
    let selection = execute(&mut tree, &Command::Toggle(InlineFlag::Bold), selection).unwrap();
    let selection = execute(&mut tree, &heading(2), selection).unwrap();

    insta::assert_snapshot!(html(&tree), @"<h2><strong>Notice</strong></h2>");
    assert_eq!(
        inspect(&tree, &selection),
        FormatState {
            block_kind: BlockKind::Heading(HeadingLevel::new(2).unwrap()),
            bold: true,
            ..FormatState::default()
        }
    );
}

#[test]
fn test_list_wrapping_is_idempotent() {
    let mut tree = hydrate("<p>one</p>");
    let caret = Selection::collapsed(at(&tree, 1));
    let caret = execute(&mut tree, &Command::UnorderedList, caret).unwrap();
    execute(&mut tree, &Command::UnorderedList, caret).unwrap();
    insta::assert_snapshot!(html(&tree), @"<ul><li>one</li></ul>");
}

#[test]
fn test_switching_list_kind_splits_the_list() {
    let mut tree = hydrate("<ul><li>a</li><li>b</li><li>c</li></ul>");
    let caret = Selection::collapsed(at(&tree, 2));
    let caret = execute(&mut tree, &Command::OrderedList, caret).unwrap();
    insta::assert_snapshot!(
        html(&tree),
        @"<ul><li>a</li></ul><ol><li>b</li></ol><ul><li>c</li></ul>"
    );
    let state = inspect(&tree, &caret);
    assert!(state.ordered_list);
    assert!(!state.unordered_list);
}

#[test]
fn test_paragraph_lifts_item_out_of_list() {
    let mut tree = hydrate("<ul><li>a</li><li>b</li><li>c</li></ul>");
    let caret = Selection::collapsed(at(&tree, 2));
    execute(&mut tree, &Command::Paragraph, caret).unwrap();
    insta::assert_snapshot!(
        html(&tree),
        @"<ul><li>a</li></ul><p>b</p><ul><li>c</li></ul>"
    );
}

#[test]
fn test_list_item_joins_neighbouring_lists() {
    let mut tree = hydrate("<ul><li>a</li></ul><p>b</p><ul><li>c</li></ul>");
    let caret = Selection::collapsed(at(&tree, 2));
    execute(&mut tree, &Command::UnorderedList, caret).unwrap();
    insta::assert_snapshot!(html(&tree), @"<ul><li>a</li><li>b</li><li>c</li></ul>");
}

#[test]
fn test_block_command_covers_every_touched_block() {
    let mut tree = hydrate("<p>a</p><p>b</p>");
    let selection = Selection::new(at(&tree, 0), tree.end_position().unwrap());
    execute(&mut tree, &heading(3), selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<h3>a</h3><h3>b</h3>");
}

#[test]
fn test_block_command_wraps_loose_root_content() {
    let mut tree = hydrate("hello <b>world</b><p>next</p>");
    let caret = Selection::collapsed(at(&tree, 1));
    let caret = execute(&mut tree, &heading(1), caret).unwrap();
    insta::assert_snapshot!(
        html(&tree),
        @"<h1>hello <strong>world</strong></h1><p>next</p>"
    );
    assert!(tree.is_valid(&caret));
}

#[test]
fn test_block_command_on_empty_tree_makes_a_block() {
    let mut tree = DocumentTree::new();
    let root = tree.root();
    let nowhere = Selection::collapsed(Position::new(root, 0));
    let caret = execute(&mut tree, &heading(2), nowhere).unwrap();
    assert!(tree.is_valid(&caret));
    let block = tree.parent(caret.head.node).unwrap();
    assert_eq!(
        tree.block_kind(block),
        Some(BlockKind::Heading(HeadingLevel::new(2).unwrap()))
    );
}

#[test]
fn test_partial_bold_splits_and_toggles_back() {
    let mut tree = hydrate("<p>hello world</p>");
    let selection = range(&tree, 6, 11);
    let bold = Command::Toggle(InlineFlag::Bold);

    let selection = execute(&mut tree, &bold, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>hello <strong>world</strong></p>");
    assert_eq!(tree.text_in(&selection), "world");

    let selection = execute(&mut tree, &bold, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>hello world</p>");
    assert_eq!(tree.leaves().len(), 1);
    assert_eq!(tree.text_in(&selection), "world");
}

#[test]
fn test_toggle_on_mixed_selection_sets_everywhere() {
    let mut tree = hydrate("<p>a<strong>b</strong></p>");
    let selection = Selection::new(at(&tree, 0), tree.end_position().unwrap());
    execute(&mut tree, &Command::Toggle(InlineFlag::Bold), selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p><strong>ab</strong></p>");
}

#[test]
fn test_collapsed_inline_command_is_a_noop() {
    let mut tree = hydrate("<p>abc</p>");
    let caret = Selection::collapsed(at(&tree, 1));
    let result = execute(&mut tree, &Command::Toggle(InlineFlag::Italic), caret).unwrap();
    assert_eq!(result, caret);
    insta::assert_snapshot!(html(&tree), @"<p>abc</p>");
}

#[test]
fn test_colors_and_remove_formatting() {
    let mut tree = hydrate("<p>red</p>");
    let selection = range(&tree, 0, 3);
    let selection = execute(
        &mut tree,
        &Command::Color(Color::parse("Red").unwrap()),
        selection,
    )
    .unwrap();
    let selection = execute(
        &mut tree,
        &Command::BackgroundColor(Color::parse("#FF0").unwrap()),
        selection,
    )
    .unwrap();
    insta::assert_snapshot!(
        html(&tree),
        @r#"<p><span style="color: red; background-color: #ff0">red</span></p>"#
    );

    execute(&mut tree, &Command::RemoveFormatting, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>red</p>");
}

#[test]
fn test_remove_formatting_merges_runs() {
    let mut tree = hydrate(r#"<p><strong><em>x</em></strong><span style="color: red">y</span></p>"#);
    let selection = Selection::new(at(&tree, 0), tree.end_position().unwrap());
    execute(&mut tree, &Command::RemoveFormatting, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>xy</p>");
    assert_eq!(tree.leaves().len(), 1);
}

#[test]
fn test_link_and_unlink() {
    let mut tree = hydrate("<p>go here</p>");
    let selection = range(&tree, 3, 7);
    let link = Command::Link {
        href: "/x".into(),
        target: None,
    };
    let selection = execute(&mut tree, &link, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @r#"<p>go <a href="/x">here</a></p>"#);

    execute(&mut tree, &Command::Unlink, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>go here</p>");
}

#[test]
fn test_invalid_command_leaves_tree_unchanged() {
    let mut tree = hydrate("<p>abc</p>");
    let selection = range(&tree, 0, 3);
    let err = execute_named(&mut tree, "strikethrough", None, selection).unwrap_err();
    assert!(matches!(err, EditorError::InvalidCommand(_)));
    let err = execute_named(&mut tree, "formatBlock", Some("h9"), selection).unwrap_err();
    assert!(matches!(err, EditorError::InvalidCommand(_)));
    insta::assert_snapshot!(html(&tree), @"<p>abc</p>");
    assert!(tree.take_steps().is_empty());
}

#[test]
fn test_stale_selection_is_rejected() {
    let mut tree = hydrate("<p>abc</p>");
    let gone = Selection::collapsed(Position::new(NodeId(999), 0));
    assert_eq!(
        execute(&mut tree, &heading(1), gone),
        Err(EditorError::SelectionUnavailable)
    );
    insta::assert_snapshot!(html(&tree), @"<p>abc</p>");
}

#[test]
fn test_named_commands_dispatch() {
    let mut tree = hydrate("<p>abc</p>");
    let selection = range(&tree, 0, 3);
    let selection = execute_named(&mut tree, "underline", None, selection).unwrap();
    execute_named(&mut tree, "formatBlock", Some("<h4>"), selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<h4><u>abc</u></h4>");
}

#[test]
fn test_delete_across_blocks_merges_them() {
    let mut tree = hydrate("<p>hello</p><p>world</p>");
    let selection = range(&tree, 2, 8);
    let caret = delete_selection(&mut tree, selection).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>held</p>");
    assert_eq!(caret.head.offset, 2);
    assert!(tree.is_valid(&caret));
}

#[test]
fn test_delete_backward() {
    let mut tree = hydrate("<p>ab</p><p>cd</p>");
    // Start of the second block: joins.
    let caret = Selection::collapsed(Position::new(tree.leaves()[1], 0));
    let caret = delete_backward(&mut tree, caret).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>abcd</p>");
    assert_eq!(caret.head, at(&tree, 2));

    let caret = delete_backward(&mut tree, caret).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>acd</p>");
    assert_eq!(caret.head, at(&tree, 1));
}

#[test]
fn test_delete_backward_at_document_start_is_a_noop() {
    let mut tree = hydrate("<p>ab</p>");
    let caret = Selection::collapsed(at(&tree, 0));
    assert_eq!(delete_backward(&mut tree, caret), Ok(caret));
    insta::assert_snapshot!(html(&tree), @"<p>ab</p>");
}

#[test]
fn test_insert_text_with_newline_splits_block() {
    let mut tree = hydrate("<p>ab</p>");
    let caret = Selection::collapsed(at(&tree, 1));
    let caret = insert_text(&mut tree, caret, "X\nY", None).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>aX</p><p>Yb</p>");
    assert_eq!(tree.text(caret.head.node).unwrap().text, "Yb");
    assert_eq!(caret.head.offset, 1);
}

#[test]
fn test_insert_text_replaces_selection_and_inherits_style() {
    let mut tree = hydrate("<p><em>old text</em></p>");
    let selection = range(&tree, 0, 3);
    insert_text(&mut tree, selection, "new", None).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p><em>new text</em></p>");
}

#[test]
fn test_typing_over_styled_selection_keeps_its_style() {
    let mut tree = hydrate("<p>가<strong>나</strong>다</p>");
    let selection = range(&tree, 1, 2);
    insert_text(&mut tree, selection, "라\n마", None).unwrap();
    insta::assert_snapshot!(
        html(&tree),
        @"<p>가<strong>라</strong></p><p><strong>마</strong>다</p>"
    );
}

#[test]
fn test_insert_text_with_explicit_style_starts_a_run() {
    let mut tree = hydrate("<p>ab</p>");
    let caret = Selection::collapsed(at(&tree, 2));
    let bold = InlineStyle {
        bold: true,
        ..InlineStyle::default()
    };
    insert_text(&mut tree, caret, "c", Some(&bold)).unwrap();
    insta::assert_snapshot!(html(&tree), @"<p>ab<strong>c</strong></p>");
}

#[test]
fn test_split_block_in_list_item_makes_new_item() {
    let mut tree = hydrate("<ul><li>one</li></ul>");
    let caret = Selection::collapsed(at(&tree, 3));
    let caret = split_block(&mut tree, caret).unwrap();
    let caret = insert_text(&mut tree, caret, "two", None).unwrap();
    insta::assert_snapshot!(html(&tree), @"<ul><li>one</li><li>two</li></ul>");
    assert!(inspect(&tree, &caret).unordered_list);
}
