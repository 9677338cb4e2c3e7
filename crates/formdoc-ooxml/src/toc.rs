//! Table of contents resolution
//!
//! The template holds an index between two marker paragraphs. Each index
//! entry carries a numbered marker `<<N>>`, and the same marker sits on the
//! heading it points at further down. There is no layout engine, so page
//! numbers are estimated by counting explicit page breaks: hard breaks,
//! breaks Word rendered last time it saved, and sections starting on a new
//! page. The estimate is wrong whenever text flows onto a new page by itself.

use std::sync::OnceLock;

use regex::Regex;

use crate::settings::TocSettings;
use crate::wml::{visit_paragraphs_mut, Block, Paragraph};

fn entry_pattern() -> Option<&'static Regex> {
    static ENTRY: OnceLock<Option<Regex>> = OnceLock::new();
    ENTRY.get_or_init(|| Regex::new(r"<<(\d+)>>").ok()).as_ref()
}

/// Page numbers typed by hand at the end of an entry
fn trailing_page_pattern() -> Option<&'static Regex> {
    static TRAILING: OnceLock<Option<Regex>> = OnceLock::new();
    TRAILING
        .get_or_init(|| Regex::new(r"[.\s]+\d+$").ok())
        .as_ref()
}

/// What a TOC pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TocSummary {
    /// Entries found between the index markers
    pub entries: usize,
    /// Entries whose heading was found and got a page number
    pub paginated: usize,
}

#[derive(Debug)]
struct Entry {
    /// Position among body-level paragraphs
    position: usize,
    marker: String,
    title: String,
}

/// Resolve the index between `settings.start_marker` and
/// `settings.end_marker`, if both are present
///
/// The index ends at the first end marker and starts at the last start
/// marker before it, so earlier mentions of the start marker are ignored.
pub(crate) fn resolve_toc(
    blocks: &mut Vec<Block>,
    settings: &TocSettings,
) -> Option<TocSummary> {
    let entry_re = entry_pattern()?;
    let paragraphs: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.as_paragraph().map(|_| i))
        .collect();
    let contains =
        |pos: usize, marker: &str| paragraph_text(blocks, paragraphs[pos]).contains(marker);
    let end = (0..paragraphs.len()).find(|&pos| contains(pos, &settings.end_marker))?;
    let start = (0..end)
        .rev()
        .find(|&pos| contains(pos, &settings.start_marker))?;

    let entries: Vec<Entry> = (start + 1..end)
        .filter_map(|pos| {
            let text = paragraph_text(blocks, paragraphs[pos]);
            let number = entry_re.captures(&text)?.get(1)?.as_str().to_string();
            Some(Entry {
                position: pos,
                marker: format!("<<{}>>", number),
                title: entry_re.replace_all(&text, "").trim().to_string(),
            })
        })
        .collect();

    let mut summary = TocSummary {
        entries: entries.len(),
        paginated: 0,
    };

    if entries.is_empty() {
        for (pos, marker) in [(start, &settings.start_marker), (end, &settings.end_marker)] {
            if let Some(p) = paragraph_mut(blocks, paragraphs[pos]) {
                p.replace_all(marker, "");
            }
        }
        return Some(summary);
    }

    // Each heading starts a page
    for entry in &entries {
        let Some(target) = (end + 1..paragraphs.len())
            .find(|&pos| paragraph_text(blocks, paragraphs[pos]).contains(&entry.marker))
        else {
            continue;
        };
        let broken = has_page_break(blocks, paragraphs[target])
            || (target > 0 && has_page_break(blocks, paragraphs[target - 1]));
        if broken {
            continue;
        }
        if target > 0 {
            if let Some(p) = paragraph_mut(blocks, paragraphs[target - 1]) {
                p.push_page_break();
            }
        } else if let Some(p) = paragraph_mut(blocks, paragraphs[target]) {
            p.prepend_page_break();
        }
    }

    // Count breaks up to each heading
    let breaks_in_index = (0..=end)
        .filter(|&pos| has_page_break(blocks, paragraphs[pos]))
        .count();
    let mut pages: Vec<Option<usize>> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mut breaks = breaks_in_index;
        let mut page = None;
        for pos in end + 1..paragraphs.len() {
            if has_page_break(blocks, paragraphs[pos]) {
                breaks += 1;
            }
            if paragraph_text(blocks, paragraphs[pos]).contains(&entry.marker) {
                page = Some(1 + breaks);
                break;
            }
        }
        pages.push(page);
    }

    // Rewrite entries
    let mut removed = Vec::new();
    for (entry, page) in entries.iter().zip(&pages) {
        match page {
            Some(page) => {
                let line = entry_line(&entry.title, *page, settings.width);
                if let Some(p) = paragraph_mut(blocks, paragraphs[entry.position]) {
                    p.set_text(&line);
                }
                summary.paginated += 1;
            }
            None => removed.push(paragraphs[entry.position]),
        }
    }

    // Numbered markers are not meant to be seen
    visit_paragraphs_mut(blocks, &mut |p| {
        p.strip_matches(entry_re);
    });

    for (pos, marker) in [(start, &settings.start_marker), (end, &settings.end_marker)] {
        if let Some(p) = paragraph_mut(blocks, paragraphs[pos]) {
            p.replace_all(marker, "");
            let keep = p.has_section_properties() || p.has_page_break() || p.has_graphics();
            if p.is_blank() && !keep {
                removed.push(paragraphs[pos]);
            }
        }
    }
    if start > 0 {
        if let Some(p) = paragraph_mut(blocks, paragraphs[start - 1]) {
            p.push_page_break();
        }
    }

    removed.sort_unstable();
    removed.dedup();
    for index in removed.into_iter().rev() {
        blocks.remove(index);
    }

    Some(summary)
}

fn paragraph_text(blocks: &[Block], index: usize) -> String {
    blocks
        .get(index)
        .and_then(Block::as_paragraph)
        .map(Paragraph::text)
        .unwrap_or_default()
}

fn paragraph_mut(blocks: &mut [Block], index: usize) -> Option<&mut Paragraph> {
    blocks.get_mut(index).and_then(Block::as_paragraph_mut)
}

fn has_page_break(blocks: &[Block], index: usize) -> bool {
    blocks
        .get(index)
        .and_then(Block::as_paragraph)
        .is_some_and(Paragraph::has_page_break)
}

/// `"{title} {dots} {page}"`, dot-filled to `width` characters
fn entry_line(title: &str, page: usize, width: usize) -> String {
    let title = match trailing_page_pattern() {
        Some(re) => re.replace(title, "").trim().to_string(),
        None => title.trim().to_string(),
    };
    let page = page.to_string();
    let fill = width
        .saturating_sub(title.chars().count() + page.len() + 2)
        .max(3);
    format!("{} {} {}", title, ".".repeat(fill), page)
}
