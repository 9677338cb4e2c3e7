//! Text operations on paragraphs
//!
//! A paragraph's logical text is the concatenation of its `w:t` nodes in
//! document order. Word splits text into runs freely (spell checking,
//! revision ids, formatting changes), so a marker like `<<Nombre>>` may be
//! spread over several nodes. Every search here runs over the concatenation
//! and maps the match back onto the nodes it overlaps.

use regex::Regex;

use crate::wml::{
    BreakKind, Paragraph, ParagraphChild, Run, RunChild, TextNode, GRAPHIC_ELEMENTS,
};

/// Result of splitting a run at a token
#[derive(Debug)]
pub(crate) struct RunSplit {
    /// Content that followed the token, if any
    pub tail: Option<Run>,
}

impl Paragraph {
    /// Logical text of the paragraph
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }

    /// Whether the logical text is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Whether any run holds a drawing, picture or VML shape
    pub fn has_graphics(&self) -> bool {
        children_have_graphics(&self.children)
    }

    /// Whether the paragraph forces a new page
    ///
    /// Counts explicit page breaks, rendered page breaks left by Word and
    /// section properties that start a new page.
    pub fn has_page_break(&self) -> bool {
        if self
            .section_properties()
            .is_some_and(|s| s.starts_new_page())
        {
            return true;
        }
        children_have_page_break(&self.children)
    }

    /// All text nodes, in document order
    pub fn text_nodes_mut(&mut self) -> Vec<&mut TextNode> {
        let mut nodes = Vec::new();
        collect_text_nodes(&mut self.children, &mut nodes);
        nodes
    }

    /// Replace the first occurrence of `marker` at or after byte offset
    /// `from` of the logical text
    ///
    /// Returns the offset just past the inserted value.
    pub fn replace_from(&mut self, from: usize, marker: &str, value: &str) -> Option<usize> {
        if marker.is_empty() {
            return None;
        }
        let mut nodes = self.text_nodes_mut();

        let mut offsets = Vec::with_capacity(nodes.len());
        let mut full = String::new();
        for node in &nodes {
            offsets.push(full.len());
            full.push_str(&node.text);
        }
        let marker_start = from + full.get(from..)?.find(marker)?;
        let marker_end = marker_start + marker.len();

        for (node, &start) in nodes.iter_mut().zip(&offsets) {
            let end = start + node.text.len();
            if end <= marker_start || start >= marker_end {
                continue;
            }
            let before = if start < marker_start {
                &node.text[..marker_start - start]
            } else {
                ""
            };
            let after = if marker_end < end {
                &node.text[marker_end - start..]
            } else {
                ""
            };

            let spliced = if start <= marker_start && end >= marker_end {
                format!("{}{}{}", before, value, after)
            } else if start <= marker_start {
                format!("{}{}", before, value)
            } else if end >= marker_end {
                after.to_string()
            } else {
                String::new()
            };
            node.set_text(spliced);
        }

        Some(marker_start + value.len())
    }

    /// Replace every occurrence of `marker`, returning how many were replaced
    ///
    /// Text inserted by a replacement is never searched again, so a value
    /// containing its own marker cannot loop.
    pub fn replace_all(&mut self, marker: &str, value: &str) -> usize {
        let mut from = 0;
        let mut count = 0;
        while let Some(next) = self.replace_from(from, marker, value) {
            from = next;
            count += 1;
        }
        count
    }

    /// Remove every match of `pattern` from the logical text
    pub fn strip_matches(&mut self, pattern: &Regex) -> usize {
        let mut from = 0;
        let mut count = 0;
        loop {
            let text = self.text();
            let Some(found) = text.get(from..).and_then(|rest| pattern.find(rest)) else {
                break;
            };
            if found.as_str().is_empty() {
                break;
            }
            let start = from + found.start();
            match self.replace_from(start, found.as_str(), "") {
                Some(next) => {
                    from = next;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Set the whole text of the paragraph
    ///
    /// The first text node receives the text and every other text node is
    /// removed. A paragraph without text gets a new text node in its first
    /// run, or a new run.
    pub fn set_text(&mut self, text: &str) {
        let mut placed = false;
        for_each_run_mut(&mut self.children, &mut |run| {
            run.children.retain_mut(|child| match child {
                RunChild::Text(node) if !placed => {
                    placed = true;
                    node.set_text(text);
                    true
                }
                RunChild::Text(_) => false,
                _ => true,
            });
        });
        if placed {
            return;
        }
        match first_run_mut(&mut self.children) {
            Some(run) => run.children.push(RunChild::Text(TextNode::new(text))),
            None => self
                .children
                .push(ParagraphChild::Run(Run::with_text(text))),
        }
    }

    /// Append a run holding a page break
    pub fn push_page_break(&mut self) {
        self.children
            .push(ParagraphChild::Run(Run::with_break(BreakKind::Page)));
    }

    /// Insert a run holding a page break before all other content
    pub fn prepend_page_break(&mut self) {
        self.children
            .insert(0, ParagraphChild::Run(Run::with_break(BreakKind::Page)));
    }

    /// Turn every `token` in a text node into a page break
    ///
    /// The run holding the token keeps the text before it; a page-break run
    /// follows, then a run with the same properties holding the rest.
    pub fn expand_page_breaks(&mut self, token: &str) -> usize {
        if token.is_empty() {
            return 0;
        }
        expand_breaks(&mut self.children, token)
    }
}

impl Run {
    /// Split at the first text node containing `token`
    pub(crate) fn split_at_token(&mut self, token: &str) -> Option<RunSplit> {
        let (at, pos) = self.children.iter().enumerate().find_map(|(i, child)| match child {
            RunChild::Text(node) => node.text.find(token).map(|pos| (i, pos)),
            _ => None,
        })?;

        let mut moved = self.children.split_off(at + 1);
        let RunChild::Text(node) = &mut self.children[at] else {
            return None;
        };
        let after = node.text[pos + token.len()..].to_string();
        let before = node.text[..pos].to_string();
        node.set_text(before);

        if !after.is_empty() {
            moved.insert(0, RunChild::Text(TextNode::new(&after)));
        }
        if moved.is_empty() {
            return Some(RunSplit { tail: None });
        }
        Some(RunSplit {
            tail: Some(Run {
                tag: self.tag.clone(),
                properties: self.properties.clone(),
                children: moved,
            }),
        })
    }
}

fn expand_breaks(children: &mut Vec<ParagraphChild>, token: &str) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < children.len() {
        let split = match &mut children[i] {
            ParagraphChild::Run(run) => run.split_at_token(token),
            ParagraphChild::Group(group) => {
                count += expand_breaks(&mut group.children, token);
                None
            }
            ParagraphChild::Opaque(_) => None,
        };
        match split {
            Some(RunSplit { tail }) => {
                children.insert(i + 1, ParagraphChild::Run(Run::with_break(BreakKind::Page)));
                if let Some(tail) = tail {
                    children.insert(i + 2, ParagraphChild::Run(tail));
                }
                count += 1;
                // The tail may hold further tokens
                i += 2;
            }
            None => i += 1,
        }
    }
    count
}

fn collect_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for c in &run.children {
                    if let RunChild::Text(node) = c {
                        out.push_str(&node.text);
                    }
                }
            }
            ParagraphChild::Group(group) => collect_text(&group.children, out),
            ParagraphChild::Opaque(_) => {}
        }
    }
}

fn collect_text_nodes<'a>(children: &'a mut [ParagraphChild], out: &mut Vec<&'a mut TextNode>) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for c in &mut run.children {
                    if let RunChild::Text(node) = c {
                        out.push(node);
                    }
                }
            }
            ParagraphChild::Group(group) => collect_text_nodes(&mut group.children, out),
            ParagraphChild::Opaque(_) => {}
        }
    }
}

fn for_each_run_mut(children: &mut [ParagraphChild], f: &mut dyn FnMut(&mut Run)) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => f(run),
            ParagraphChild::Group(group) => for_each_run_mut(&mut group.children, f),
            ParagraphChild::Opaque(_) => {}
        }
    }
}

fn first_run_mut(children: &mut [ParagraphChild]) -> Option<&mut Run> {
    for child in children {
        match child {
            ParagraphChild::Run(run) => return Some(run),
            ParagraphChild::Group(group) => {
                if let Some(run) = first_run_mut(&mut group.children) {
                    return Some(run);
                }
            }
            ParagraphChild::Opaque(_) => {}
        }
    }
    None
}

fn children_have_graphics(children: &[ParagraphChild]) -> bool {
    children.iter().any(|child| match child {
        ParagraphChild::Run(run) => run.children.iter().any(|c| match c {
            RunChild::Graphic(_) => true,
            RunChild::Opaque(node) => node.contains_named(GRAPHIC_ELEMENTS),
            RunChild::Text(_) | RunChild::Break(_) | RunChild::RenderedPageBreak(_) => false,
        }),
        ParagraphChild::Group(group) => children_have_graphics(&group.children),
        ParagraphChild::Opaque(node) => node.contains_named(GRAPHIC_ELEMENTS),
    })
}

fn children_have_page_break(children: &[ParagraphChild]) -> bool {
    children.iter().any(|child| match child {
        ParagraphChild::Run(run) => run.children.iter().any(|c| match c {
            RunChild::Break(b) => b.kind() == BreakKind::Page,
            RunChild::RenderedPageBreak(_) => true,
            RunChild::Text(_) | RunChild::Graphic(_) | RunChild::Opaque(_) => false,
        }),
        ParagraphChild::Group(group) => children_have_page_break(&group.children),
        ParagraphChild::Opaque(_) => false,
    })
}
