//! Typed WordprocessingML tree
//!
//! Parts are converted from the generic [`xml`](crate::xml) tree into typed
//! blocks, paragraphs and runs. Only what the engine reasons about gets a
//! variant of its own (section properties, breaks, graphics); everything
//! else is carried as an opaque node and written back unchanged.

use crate::error::{OoxmlError, Result};
use crate::xml::{Element, Node, Tag, XmlDocument};

/// Elements that make a paragraph hold graphics
pub const GRAPHIC_ELEMENTS: &[&str] = &["w:drawing", "w:pict", "v:shape", "v:imagedata"];

/// Block-level wrappers whose content is more blocks
const CONTAINER_ELEMENTS: &[&str] = &["w:sdt", "w:sdtContent", "w:customXml"];

/// Paragraph-level wrappers whose content is more runs
const GROUP_ELEMENTS: &[&str] = &[
    "w:hyperlink",
    "w:smartTag",
    "w:fldSimple",
    "w:sdt",
    "w:sdtContent",
    "w:customXml",
    "w:ins",
    "w:moveTo",
];

// ============================================================================
// Types
// ============================================================================

/// Block-level content of a body, table cell or header/footer
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    /// Body-level `w:sectPr`
    Section(SectionProperties),
    /// `w:sdt`, `w:sdtContent` or `w:customXml`
    Container(Container),
    Opaque(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub tag: Tag,
    pub properties: Option<ParagraphProperties>,
    pub children: Vec<ParagraphChild>,
}

/// `w:pPr`, with its section properties pulled out
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphProperties {
    pub tag: Tag,
    pub children: Vec<Node>,
    pub section: Option<SectionProperties>,
    /// Position of `w:sectPr` among `children`
    section_at: usize,
}

/// `w:sectPr`
#[derive(Debug, Clone, PartialEq)]
pub struct SectionProperties {
    pub element: Element,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParagraphChild {
    Run(Run),
    /// Hyperlinks, smart tags, simple fields and other run wrappers
    Group(Group),
    Opaque(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub tag: Tag,
    pub children: Vec<ParagraphChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub tag: Tag,
    /// `w:rPr`
    pub properties: Option<Element>,
    pub children: Vec<RunChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunChild {
    Text(TextNode),
    Break(Break),
    RenderedPageBreak(Tag),
    /// `w:drawing`, `w:pict` or `w:object`
    Graphic(Element),
    Opaque(Node),
}

/// `w:t`
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub tag: Tag,
    pub text: String,
}

/// `w:br`
#[derive(Debug, Clone, PartialEq)]
pub struct Break {
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Page,
    Column,
    TextWrapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub tag: Tag,
    pub children: Vec<TableChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableChild {
    Row(TableRow),
    Opaque(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub tag: Tag,
    pub children: Vec<RowChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowChild {
    Cell(TableCell),
    Opaque(Node),
}

/// `w:tc`; its `w:tcPr` is kept as an opaque block
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub tag: Tag,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub tag: Tag,
    pub blocks: Vec<Block>,
}

// ============================================================================
// Construction
// ============================================================================

impl Block {
    pub fn from_node(node: Node) -> Self {
        let Node::Element(element) = node else {
            return Block::Opaque(node);
        };
        match element.name() {
            "w:p" => Block::Paragraph(Paragraph::from_element(element)),
            "w:tbl" => Block::Table(Table::from_element(element)),
            "w:sectPr" => Block::Section(SectionProperties { element }),
            name if CONTAINER_ELEMENTS.contains(&name) => {
                let Element { tag, children } = element;
                Block::Container(Container {
                    tag,
                    blocks: children.into_iter().map(Block::from_node).collect(),
                })
            }
            _ => Block::Opaque(Node::Element(element)),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_paragraph_mut(&mut self) -> Option<&mut Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    /// Remove section properties from this block and everything inside it
    ///
    /// A body-level `Section` block cannot remove itself; callers drop it.
    pub fn strip_section_properties(&mut self) {
        match self {
            Block::Paragraph(p) => p.strip_section_properties(),
            Block::Table(t) => {
                for child in &mut t.children {
                    match child {
                        TableChild::Row(row) => {
                            for cell in &mut row.children {
                                match cell {
                                    RowChild::Cell(cell) => strip_blocks(&mut cell.blocks),
                                    RowChild::Opaque(node) => {
                                        node.remove_named("w:sectPr");
                                    }
                                }
                            }
                        }
                        TableChild::Opaque(node) => {
                            node.remove_named("w:sectPr");
                        }
                    }
                }
            }
            Block::Container(c) => strip_blocks(&mut c.blocks),
            Block::Opaque(node) => {
                node.remove_named("w:sectPr");
            }
            Block::Section(_) => {}
        }
    }

    pub fn write(&self, out: &mut String) {
        match self {
            Block::Paragraph(p) => p.write(out),
            Block::Table(t) => t.write(out),
            Block::Section(s) => s.element.write(out),
            Block::Container(c) => {
                write_wrapped(&c.tag, out, c.blocks.is_empty(), |out| {
                    c.blocks.iter().for_each(|b| b.write(out))
                });
            }
            Block::Opaque(node) => node.write(out),
        }
    }
}

/// Drop nested `Section` blocks and strip the rest
fn strip_blocks(blocks: &mut Vec<Block>) {
    blocks.retain(|b| !matches!(b, Block::Section(_)));
    blocks.iter_mut().for_each(Block::strip_section_properties);
}

impl Paragraph {
    /// An empty `w:p`
    pub fn new() -> Self {
        Self {
            tag: Tag::new("w:p"),
            properties: None,
            children: Vec::new(),
        }
    }

    /// A paragraph holding one run of text
    pub fn with_text(text: &str) -> Self {
        let mut paragraph = Self::new();
        paragraph.children.push(ParagraphChild::Run(Run::with_text(text)));
        paragraph
    }

    pub fn from_element(element: Element) -> Self {
        let Element { tag, children } = element;
        let mut properties = None;
        let mut kids = Vec::new();
        for child in children {
            match child {
                Node::Element(e) if e.tag.is("w:pPr") && properties.is_none() => {
                    properties = Some(ParagraphProperties::from_element(e));
                }
                other => kids.push(ParagraphChild::from_node(other)),
            }
        }
        Self {
            tag,
            properties,
            children: kids,
        }
    }

    pub fn section_properties(&self) -> Option<&SectionProperties> {
        self.properties.as_ref().and_then(|p| p.section.as_ref())
    }

    pub fn has_section_properties(&self) -> bool {
        self.section_properties().is_some()
    }

    fn strip_section_properties(&mut self) {
        if let Some(properties) = &mut self.properties {
            properties.section = None;
            for node in &mut properties.children {
                node.remove_named("w:sectPr");
            }
        }
        strip_children(&mut self.children);
    }

    pub fn write(&self, out: &mut String) {
        let empty = self.properties.is_none() && self.children.is_empty();
        write_wrapped(&self.tag, out, empty, |out| {
            if let Some(properties) = &self.properties {
                properties.write(out);
            }
            self.children.iter().for_each(|c| c.write(out));
        });
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_children(children: &mut [ParagraphChild]) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for c in &mut run.children {
                    match c {
                        RunChild::Graphic(e) => {
                            e.remove_named("w:sectPr");
                        }
                        RunChild::Opaque(node) => {
                            node.remove_named("w:sectPr");
                        }
                        _ => {}
                    }
                }
            }
            ParagraphChild::Group(g) => strip_children(&mut g.children),
            ParagraphChild::Opaque(node) => {
                node.remove_named("w:sectPr");
            }
        }
    }
}

impl ParagraphProperties {
    fn from_element(element: Element) -> Self {
        let Element { tag, children } = element;
        let mut section = None;
        let mut section_at = 0;
        let mut kept = Vec::new();
        for child in children {
            match child {
                Node::Element(e) if e.tag.is("w:sectPr") && section.is_none() => {
                    section_at = kept.len();
                    section = Some(SectionProperties { element: e });
                }
                other => kept.push(other),
            }
        }
        Self {
            tag,
            children: kept,
            section,
            section_at,
        }
    }

    fn write(&self, out: &mut String) {
        let empty = self.children.is_empty() && self.section.is_none();
        write_wrapped(&self.tag, out, empty, |out| {
            let at = self.section_at.min(self.children.len());
            self.children[..at].iter().for_each(|n| n.write(out));
            if let Some(section) = &self.section {
                section.element.write(out);
            }
            self.children[at..].iter().for_each(|n| n.write(out));
        });
    }
}

impl SectionProperties {
    /// Value of `w:type`, absent meaning a new page
    pub fn break_type(&self) -> Option<&str> {
        self.element
            .find_child("w:type")
            .and_then(|t| t.attr("w:val"))
    }

    /// Whether the section begins on a new page
    pub fn starts_new_page(&self) -> bool {
        matches!(
            self.break_type(),
            None | Some("nextPage") | Some("evenPage") | Some("oddPage")
        )
    }
}

impl ParagraphChild {
    fn from_node(node: Node) -> Self {
        match node {
            Node::Element(e) if e.tag.is("w:r") => ParagraphChild::Run(Run::from_element(e)),
            Node::Element(e) if GROUP_ELEMENTS.contains(&e.name()) => {
                let Element { tag, children } = e;
                ParagraphChild::Group(Group {
                    tag,
                    children: children.into_iter().map(ParagraphChild::from_node).collect(),
                })
            }
            other => ParagraphChild::Opaque(other),
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            ParagraphChild::Run(run) => run.write(out),
            ParagraphChild::Group(g) => {
                write_wrapped(&g.tag, out, g.children.is_empty(), |out| {
                    g.children.iter().for_each(|c| c.write(out))
                });
            }
            ParagraphChild::Opaque(node) => node.write(out),
        }
    }
}

impl Run {
    /// A run without properties
    pub fn new() -> Self {
        Self {
            tag: Tag::new("w:r"),
            properties: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(text: &str) -> Self {
        let mut run = Self::new();
        run.children.push(RunChild::Text(TextNode::new(text)));
        run
    }

    /// A run holding a single `w:br` of the given type
    pub fn with_break(kind: BreakKind) -> Self {
        let mut run = Self::new();
        run.children.push(RunChild::Break(Break::new(kind)));
        run
    }

    pub fn from_element(element: Element) -> Self {
        let Element { tag, children } = element;
        let mut properties = None;
        let mut kids = Vec::new();
        for child in children {
            match child {
                Node::Element(e) if e.tag.is("w:rPr") && properties.is_none() => {
                    properties = Some(e);
                }
                other => kids.push(RunChild::from_node(other)),
            }
        }
        Self {
            tag,
            properties,
            children: kids,
        }
    }

    pub fn write(&self, out: &mut String) {
        let empty = self.properties.is_none() && self.children.is_empty();
        write_wrapped(&self.tag, out, empty, |out| {
            if let Some(properties) = &self.properties {
                properties.write(out);
            }
            self.children.iter().for_each(|c| c.write(out));
        });
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

impl RunChild {
    fn from_node(node: Node) -> Self {
        let Node::Element(e) = node else {
            return RunChild::Opaque(node);
        };
        match e.name() {
            "w:t" => {
                let text = e.text();
                RunChild::Text(TextNode { tag: e.tag, text })
            }
            "w:br" if e.children.is_empty() => RunChild::Break(Break { tag: e.tag }),
            "w:lastRenderedPageBreak" => RunChild::RenderedPageBreak(e.tag),
            "w:drawing" | "w:pict" | "w:object" => RunChild::Graphic(e),
            _ => RunChild::Opaque(Node::Element(e)),
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            RunChild::Text(t) => t.write(out),
            RunChild::Break(b) => b.tag.write_open(out, true),
            RunChild::RenderedPageBreak(tag) => tag.write_open(out, true),
            RunChild::Graphic(e) => e.write(out),
            RunChild::Opaque(node) => node.write(out),
        }
    }
}

impl TextNode {
    pub fn new(text: &str) -> Self {
        let mut node = Self {
            tag: Tag::new("w:t"),
            text: String::new(),
        };
        node.set_text(text);
        node
    }

    /// Replace the text, keeping `xml:space` in step with it
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        if needs_preserve(&self.text) {
            self.tag.set_attr("xml:space", "preserve");
        } else {
            self.tag.remove_attr("xml:space");
        }
    }

    fn write(&self, out: &mut String) {
        write_wrapped(&self.tag, out, self.text.is_empty(), |out| {
            out.push_str(&crate::xml::escape_text(&self.text))
        });
    }
}

/// Leading or trailing space, newline or tab
fn needs_preserve(text: &str) -> bool {
    text.starts_with(' ') || text.ends_with(' ') || text.contains('\n') || text.contains('\t')
}

impl Break {
    pub fn new(kind: BreakKind) -> Self {
        let tag = Tag::new("w:br");
        let tag = match kind {
            BreakKind::Page => tag.with_attr("w:type", "page"),
            BreakKind::Column => tag.with_attr("w:type", "column"),
            BreakKind::TextWrapping => tag,
        };
        Self { tag }
    }

    pub fn kind(&self) -> BreakKind {
        match self.tag.attr("w:type") {
            Some("page") => BreakKind::Page,
            Some("column") => BreakKind::Column,
            _ => BreakKind::TextWrapping,
        }
    }
}

impl Table {
    pub fn from_element(element: Element) -> Self {
        let Element { tag, children } = element;
        let children = children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.tag.is("w:tr") => TableChild::Row(TableRow::from_element(e)),
                other => TableChild::Opaque(other),
            })
            .collect();
        Self { tag, children }
    }

    pub fn rows(&self) -> impl Iterator<Item = &TableRow> {
        self.children.iter().filter_map(|c| match c {
            TableChild::Row(row) => Some(row),
            TableChild::Opaque(_) => None,
        })
    }

    pub fn write(&self, out: &mut String) {
        write_wrapped(&self.tag, out, self.children.is_empty(), |out| {
            for child in &self.children {
                match child {
                    TableChild::Row(row) => row.write(out),
                    TableChild::Opaque(node) => node.write(out),
                }
            }
        });
    }
}

impl TableRow {
    fn from_element(element: Element) -> Self {
        let Element { tag, children } = element;
        let children = children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.tag.is("w:tc") => {
                    let Element { tag, children } = e;
                    RowChild::Cell(TableCell {
                        tag,
                        blocks: children.into_iter().map(Block::from_node).collect(),
                    })
                }
                other => RowChild::Opaque(other),
            })
            .collect();
        Self { tag, children }
    }

    pub fn cells(&self) -> impl Iterator<Item = &TableCell> {
        self.children.iter().filter_map(|c| match c {
            RowChild::Cell(cell) => Some(cell),
            RowChild::Opaque(_) => None,
        })
    }

    fn write(&self, out: &mut String) {
        write_wrapped(&self.tag, out, self.children.is_empty(), |out| {
            for child in &self.children {
                match child {
                    RowChild::Cell(cell) => {
                        write_wrapped(&cell.tag, out, cell.blocks.is_empty(), |out| {
                            cell.blocks.iter().for_each(|b| b.write(out))
                        });
                    }
                    RowChild::Opaque(node) => node.write(out),
                }
            }
        });
    }
}

fn write_wrapped(tag: &Tag, out: &mut String, empty: bool, body: impl FnOnce(&mut String)) {
    if empty {
        tag.write_open(out, true);
        return;
    }
    tag.write_open(out, false);
    body(out);
    tag.write_close(out);
}

// ============================================================================
// Parts
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum PartLayout {
    /// Blocks are direct children of the root (`w:hdr`, `w:ftr`)
    Flat,
    /// Blocks live in `w:body` (`w:document`)
    Body {
        before: Vec<Node>,
        body: Tag,
        after: Vec<Node>,
    },
}

/// A parsed document, header or footer part
#[derive(Debug, Clone, PartialEq)]
pub struct WordPart {
    declaration: Option<String>,
    root: Tag,
    layout: PartLayout,
    pub blocks: Vec<Block>,
}

impl WordPart {
    /// Parse a header or footer part
    pub fn parse(xml: &[u8], part: &str) -> Result<Self> {
        let XmlDocument { declaration, root } = XmlDocument::parse(xml, part)?;
        let Element { tag, children } = root;

        let body_at = children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.tag.is("w:body")));
        let (layout, blocks) = match body_at {
            Some(at) => {
                let mut before = children;
                let mut after = before.split_off(at);
                let body = after.remove(0);
                let Node::Element(Element {
                    tag: body,
                    children: content,
                }) = body
                else {
                    return Err(OoxmlError::InvalidStructure(format!("{}: bad w:body", part)));
                };
                (
                    PartLayout::Body {
                        before,
                        body,
                        after,
                    },
                    content.into_iter().map(Block::from_node).collect(),
                )
            }
            None => (
                PartLayout::Flat,
                children.into_iter().map(Block::from_node).collect(),
            ),
        };

        Ok(Self {
            declaration,
            root: tag,
            layout,
            blocks,
        })
    }

    /// Parse a main document part, which must have a `w:body`
    pub fn parse_document(xml: &[u8], part: &str) -> Result<Self> {
        let parsed = Self::parse(xml, part)?;
        if parsed.layout == PartLayout::Flat {
            return Err(OoxmlError::InvalidStructure(format!(
                "{}: no w:body element",
                part
            )));
        }
        Ok(parsed)
    }

    /// Serialize the part
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(declaration) = &self.declaration {
            out.push_str("<?");
            out.push_str(declaration);
            out.push_str("?>\r\n");
        }
        match &self.layout {
            PartLayout::Flat => {
                write_wrapped(&self.root, &mut out, self.blocks.is_empty(), |out| {
                    self.blocks.iter().for_each(|b| b.write(out))
                });
            }
            PartLayout::Body {
                before,
                body,
                after,
            } => {
                self.root.write_open(&mut out, false);
                before.iter().for_each(|n| n.write(&mut out));
                write_wrapped(body, &mut out, self.blocks.is_empty(), |out| {
                    self.blocks.iter().for_each(|b| b.write(out))
                });
                after.iter().for_each(|n| n.write(&mut out));
                self.root.write_close(&mut out);
            }
        }
        out
    }

    /// Logical text of every paragraph, one per line
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        visit_paragraphs(&self.blocks, &mut |p| lines.push(p.text()));
        lines.join("\n")
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Where a paragraph sits: indices through nested block lists, then its
/// index in the innermost list
///
/// A table contributes three indices (block, row, cell); a container one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: Vec<usize>,
    pub index: usize,
}

/// Call `f` on every paragraph, in document order, including those in
/// table cells and containers
pub fn visit_paragraphs(blocks: &[Block], f: &mut dyn FnMut(&Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for row in t.rows() {
                    for cell in row.cells() {
                        visit_paragraphs(&cell.blocks, f);
                    }
                }
            }
            Block::Container(c) => visit_paragraphs(&c.blocks, f),
            Block::Section(_) | Block::Opaque(_) => {}
        }
    }
}

/// Mutable counterpart of [`visit_paragraphs`]
pub fn visit_paragraphs_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for child in &mut t.children {
                    if let TableChild::Row(row) = child {
                        for cell in &mut row.children {
                            if let RowChild::Cell(cell) = cell {
                                visit_paragraphs_mut(&mut cell.blocks, f);
                            }
                        }
                    }
                }
            }
            Block::Container(c) => visit_paragraphs_mut(&mut c.blocks, f),
            Block::Section(_) | Block::Opaque(_) => {}
        }
    }
}

/// Location of the first paragraph, in document order, matching `pred`
pub fn find_paragraph(blocks: &[Block], pred: &dyn Fn(&Paragraph) -> bool) -> Option<Location> {
    let mut path = Vec::new();
    let index = find_in(blocks, pred, &mut path)?;
    Some(Location { path, index })
}

fn find_in(
    blocks: &[Block],
    pred: &dyn Fn(&Paragraph) -> bool,
    path: &mut Vec<usize>,
) -> Option<usize> {
    for (i, block) in blocks.iter().enumerate() {
        match block {
            Block::Paragraph(p) if pred(p) => return Some(i),
            Block::Table(t) => {
                for (ri, child) in t.children.iter().enumerate() {
                    let TableChild::Row(row) = child else { continue };
                    for (ci, cell) in row.children.iter().enumerate() {
                        let RowChild::Cell(cell) = cell else { continue };
                        path.extend([i, ri, ci]);
                        if let Some(found) = find_in(&cell.blocks, pred, path) {
                            return Some(found);
                        }
                        path.truncate(path.len() - 3);
                    }
                }
            }
            Block::Container(c) => {
                path.push(i);
                if let Some(found) = find_in(&c.blocks, pred, path) {
                    return Some(found);
                }
                path.pop();
            }
            _ => {}
        }
    }
    None
}

/// The block list a [`Location`] path leads to
pub fn block_list_mut<'a>(
    blocks: &'a mut Vec<Block>,
    path: &[usize],
) -> Option<&'a mut Vec<Block>> {
    let Some((&first, rest)) = path.split_first() else {
        return Some(blocks);
    };
    match blocks.get_mut(first)? {
        Block::Table(table) => {
            let (&row, rest) = rest.split_first()?;
            let (&cell, rest) = rest.split_first()?;
            let TableChild::Row(row) = table.children.get_mut(row)? else {
                return None;
            };
            let RowChild::Cell(cell) = row.children.get_mut(cell)? else {
                return None;
            };
            block_list_mut(&mut cell.blocks, rest)
        }
        Block::Container(container) => block_list_mut(&mut container.blocks, rest),
        _ => None,
    }
}

/// Remove paragraphs for which `keep` is false, at any depth
///
/// A table cell left without paragraphs gets an empty one, since Word
/// requires at least one. Returns the number removed.
pub fn retain_paragraphs(
    blocks: &mut Vec<Block>,
    keep: &mut dyn FnMut(&Paragraph) -> bool,
) -> usize {
    let before = blocks.len();
    blocks.retain(|b| match b {
        Block::Paragraph(p) => keep(p),
        _ => true,
    });
    let mut removed = before - blocks.len();

    for block in blocks.iter_mut() {
        match block {
            Block::Table(t) => {
                for child in &mut t.children {
                    let TableChild::Row(row) = child else { continue };
                    for cell in &mut row.children {
                        let RowChild::Cell(cell) = cell else { continue };
                        removed += retain_paragraphs(&mut cell.blocks, keep);
                        if !cell.blocks.iter().any(|b| matches!(b, Block::Paragraph(_))) {
                            cell.blocks.push(Block::Paragraph(Paragraph::new()));
                        }
                    }
                }
            }
            Block::Container(c) => removed += retain_paragraphs(&mut c.blocks, keep),
            _ => {}
        }
    }
    removed
}
