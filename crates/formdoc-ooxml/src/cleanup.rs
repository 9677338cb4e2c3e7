//! Cleanup passes run after all content is in place
//!
//! The passes work on body-level blocks. Paragraphs carrying section
//! properties or graphics are never deleted: the first would break the page
//! layout of a whole section, the second would lose images.

use std::sync::OnceLock;

use regex::Regex;

use crate::table_markup::NBSP;
use crate::wml::{visit_paragraphs_mut, Block, Paragraph};
use crate::xml::Node;

/// Any `<<...>>` marker
pub(crate) fn marker_pattern() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"<<[^>]+>>").ok()).as_ref()
}

/// Text left over from list numbering and bullets once markers are gone
fn decorative_pattern() -> Option<&'static Regex> {
    static DECORATIVE: OnceLock<Option<Regex>> = OnceLock::new();
    DECORATIVE
        .get_or_init(|| Regex::new(r"^[\d.\-)(\s•·◦▪▫○●*]+$").ok())
        .as_ref()
}

fn is_protected(paragraph: &Paragraph) -> bool {
    paragraph.has_section_properties() || paragraph.has_graphics()
}

/// Strip markers that were never filled
///
/// A body-level paragraph left blank or purely decorative is deleted;
/// paragraphs inside tables and containers are only stripped. Returns the
/// number of paragraphs deleted.
pub(crate) fn clean_unused_markers(blocks: &mut Vec<Block>, pattern: &Regex) -> usize {
    let decorative = decorative_pattern();
    let before = blocks.len();

    blocks.retain_mut(|block| {
        let Block::Paragraph(paragraph) = block else {
            return true;
        };
        let text = paragraph.text();
        if !pattern.is_match(&text) {
            return true;
        }
        if !is_protected(paragraph) {
            let rest = pattern.replace_all(&text, "");
            let rest = rest.trim();
            if rest.is_empty() || decorative.is_some_and(|re| re.is_match(rest)) {
                return false;
            }
        }
        paragraph.strip_matches(pattern);
        true
    });
    let removed = before - blocks.len();

    for block in blocks.iter_mut() {
        if matches!(block, Block::Table(_) | Block::Container(_)) {
            visit_paragraphs_mut(std::slice::from_mut(block), &mut |p| {
                p.strip_matches(pattern);
            });
        }
    }
    removed
}

/// Delete body-level paragraphs with no visible text
///
/// A paragraph holding a non-breaking space is kept, since it was put
/// there on purpose (table spacers, emptied marker paragraphs).
pub(crate) fn clean_empty_paragraphs(blocks: &mut Vec<Block>) -> usize {
    let before = blocks.len();
    blocks.retain(|block| {
        let Block::Paragraph(paragraph) = block else {
            return true;
        };
        let text = paragraph.text();
        if !text.replace(NBSP, "").trim().is_empty() || text.contains(NBSP) {
            return true;
        }
        is_protected(paragraph)
    });
    before - blocks.len()
}

fn is_empty_paragraph(block: &Block) -> bool {
    match block {
        Block::Paragraph(p) => p.is_blank() && !is_protected(p),
        _ => false,
    }
}

/// Whitespace between blocks, ignored when looking at neighbours
fn is_filler(block: &Block) -> bool {
    matches!(block, Block::Opaque(node) if node.is_whitespace())
        || matches!(block, Block::Opaque(Node::Comment(_)))
}

/// Remove leading and trailing empty paragraphs and collapse runs of
/// empty paragraphs to one
pub(crate) fn clean_document_spacing(blocks: &mut Vec<Block>) -> usize {
    let before = blocks.len();

    // Leading
    let mut i = 0;
    while i < blocks.len() {
        if is_empty_paragraph(&blocks[i]) {
            blocks.remove(i);
        } else if is_filler(&blocks[i]) || matches!(blocks[i], Block::Section(_)) {
            i += 1;
        } else {
            break;
        }
    }

    // Consecutive
    let mut previous_empty = false;
    blocks.retain(|block| {
        if is_filler(block) {
            return true;
        }
        let empty = is_empty_paragraph(block);
        let keep = !(empty && previous_empty);
        previous_empty = empty;
        keep
    });

    // Trailing
    let mut i = blocks.len();
    while i > 0 {
        i -= 1;
        if is_empty_paragraph(&blocks[i]) {
            blocks.remove(i);
        } else if !(is_filler(&blocks[i]) || matches!(blocks[i], Block::Section(_))) {
            break;
        }
    }

    before - blocks.len()
}
