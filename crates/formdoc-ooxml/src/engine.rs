//! Document engine
//!
//! A [`DocumentEngine`] owns one template package in memory. Content passes
//! mutate the typed document tree in place and [`DocumentEngine::save`]
//! serializes it back into a package. The passes are meant to run in this
//! order, each at most once:
//!
//! 1. [`replace_variables`](DocumentEngine::replace_variables)
//! 2. [`insert_tables`](DocumentEngine::insert_tables)
//! 3. [`insert_fragments`](DocumentEngine::insert_fragments)
//! 4. [`remove_paragraphs_containing`](DocumentEngine::remove_paragraphs_containing)
//! 5. [`expand_page_breaks`](DocumentEngine::expand_page_breaks)
//! 6. [`resolve_toc`](DocumentEngine::resolve_toc)
//! 7. [`clean_unused_markers`](DocumentEngine::clean_unused_markers)
//! 8. [`clean_empty_paragraphs`](DocumentEngine::clean_empty_paragraphs) and
//!    [`clean_document_spacing`](DocumentEngine::clean_document_spacing)

use std::path::Path;

use formdoc_core::context::{display_value, document_variables, is_blank};
use formdoc_core::diagnostics::codes;
use formdoc_core::tables::BuiltTable;
use formdoc_core::{Context, Diagnostics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::archive::{OoxmlArchive, DOCUMENT_PART};
use crate::cleanup;
use crate::error::{OoxmlError, Result};
use crate::settings::{TableSettings, TocSettings};
use crate::table_markup::{column_break_paragraph, table_blocks, NBSP};
use crate::toc::{self, TocSummary};
use crate::wml::{
    block_list_mut, find_paragraph, retain_paragraphs, visit_paragraphs, visit_paragraphs_mut,
    Block, Location, WordPart,
};
use crate::xml;

/// A document fragment to splice at a marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRef {
    pub marker: String,
    /// Path relative to the fragment base directory
    pub file: String,
}

/// Elements whose count must not drop between load and save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureCounts {
    pub drawings: usize,
    pub sections: usize,
}

impl StructureCounts {
    pub fn of(xml: &[u8]) -> Self {
        Self {
            drawings: xml::count_elements(xml, &["w:drawing"]),
            sections: xml::count_elements(xml, &["w:sectPr"]),
        }
    }
}

/// A header or footer part and its text at load time
#[derive(Debug)]
struct HeaderFooter {
    path: String,
    part: WordPart,
    original_text: String,
}

/// In-memory editor for one DOCX package
#[derive(Debug)]
pub struct DocumentEngine {
    archive: OoxmlArchive,
    document: WordPart,
    headers_footers: Vec<HeaderFooter>,
    initial: StructureCounts,
    diagnostics: Diagnostics,
}

impl DocumentEngine {
    /// Load a template package from disk
    pub fn load<P: AsRef<Path>>(path: P, diagnostics: Diagnostics) -> Result<Self> {
        let archive = OoxmlArchive::open(path)?;
        Self::from_archive(archive, diagnostics)
    }

    /// Load a template package held in memory
    pub fn from_bytes(bytes: &[u8], diagnostics: Diagnostics) -> Result<Self> {
        Self::from_archive(OoxmlArchive::from_bytes(bytes)?, diagnostics)
    }

    pub fn from_archive(archive: OoxmlArchive, diagnostics: Diagnostics) -> Result<Self> {
        let document_xml = archive.document_xml()?;
        let initial = StructureCounts::of(document_xml);
        let document = WordPart::parse_document(document_xml, DOCUMENT_PART)?;

        let mut headers_footers = Vec::new();
        for path in archive.header_footer_parts() {
            let Some(bytes) = archive.get(&path) else {
                continue;
            };
            let part = WordPart::parse(bytes, &path)?;
            let original_text = part.text();
            headers_footers.push(HeaderFooter {
                path,
                part,
                original_text,
            });
        }

        diagnostics.debug(format!(
            "loaded template: {} blocks, {} header/footer parts, {} drawings, {} sections",
            document.blocks.len(),
            headers_footers.len(),
            initial.drawings,
            initial.sections
        ));

        Ok(Self {
            archive,
            document,
            headers_footers,
            initial,
            diagnostics,
        })
    }

    /// Body-level blocks of the main document
    pub fn blocks(&self) -> &[Block] {
        &self.document.blocks
    }

    /// Text of every paragraph in the main document, tables included, in
    /// document order
    pub fn paragraph_texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        visit_paragraphs(&self.document.blocks, &mut |p| texts.push(p.text()));
        texts
    }

    /// Counts taken when the template was loaded
    pub fn initial_counts(&self) -> StructureCounts {
        self.initial
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Replace each context key, taken as a literal marker, with its value
    ///
    /// Directive keys, blank values, lists and maps are skipped. Headers and
    /// footers get the same replacement and then lose any marker left over.
    /// Returns the number of replacements in the main document.
    pub fn replace_variables(&mut self, context: &Context) -> usize {
        let replacements: Vec<(&str, String)> = document_variables(context)
            .filter(|(_, value)| {
                !is_blank(value) && !matches!(value, Value::Array(_) | Value::Object(_))
            })
            .map(|(marker, value)| (marker.as_str(), display_value(value)))
            .collect();

        let mut total = 0;
        for (marker, value) in &replacements {
            let mut count = 0;
            visit_paragraphs_mut(&mut self.document.blocks, &mut |p| {
                count += p.replace_all(marker, value);
            });
            if count == 0 {
                self.diagnostics
                    .debug(format!("marker {} not present in document", marker));
            }
            total += count;
        }

        let pattern = cleanup::marker_pattern();
        for hf in &mut self.headers_footers {
            visit_paragraphs_mut(&mut hf.part.blocks, &mut |p| {
                for (marker, value) in &replacements {
                    p.replace_all(marker, value);
                }
                if let Some(pattern) = pattern {
                    p.strip_matches(pattern);
                }
            });
        }

        self.diagnostics
            .info(format!("replaced {} marker occurrences", total));
        total
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Insert built tables after the paragraphs holding their markers
    ///
    /// The marker is removed from its paragraph, which is kept (holding a
    /// non-breaking space if nothing else is left). Returns the number of
    /// tables inserted.
    pub fn insert_tables<'a, I>(&mut self, tables: I, settings: &TableSettings) -> usize
    where
        I: IntoIterator<Item = (&'a String, &'a BuiltTable)>,
    {
        let mut inserted = 0;
        for (marker, table) in tables {
            let Some(Location { path, mut index }) = self.locate(marker) else {
                self.diagnostics.warning(
                    codes::MARKER_NOT_FOUND,
                    format!("table marker {} not found in document", marker),
                );
                continue;
            };
            let Some(list) = block_list_mut(&mut self.document.blocks, &path) else {
                continue;
            };

            if settings
                .special
                .iter()
                .any(|s| &s.marker == marker && s.column_break_before)
            {
                list.insert(index, Block::Paragraph(column_break_paragraph()));
                index += 1;
            }

            let [table_block, spacer] = table_blocks(table);
            list.insert(index + 1, table_block);
            list.insert(index + 2, spacer);

            if let Some(paragraph) = list[index].as_paragraph_mut() {
                paragraph.replace_all(marker, "");
                if paragraph.is_blank() {
                    paragraph.set_text(NBSP);
                }
            }
            self.diagnostics.debug(format!(
                "inserted table {} ({} rows) at {}",
                table.table_id,
                table.rows.len(),
                marker
            ));
            inserted += 1;
        }
        inserted
    }

    // ========================================================================
    // Fragments
    // ========================================================================

    /// Splice each fragment, resolved against `base_dir`, at its marker
    ///
    /// Returns the number of fragments spliced.
    pub fn insert_fragments(&mut self, fragments: &[FragmentRef], base_dir: &Path) -> usize {
        fragments
            .iter()
            .filter(|f| self.insert_fragment(&f.marker, &base_dir.join(&f.file)))
            .count()
    }

    /// Splice the body of the package at `path` after the paragraph holding
    /// `marker`
    ///
    /// Section properties of the fragment are dropped so the host keeps its
    /// page layout. A missing marker, file or unreadable package is a
    /// warning and leaves the document unchanged.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn insert_fragment(&mut self, marker: &str, path: &Path) -> bool {
        let blocks = match load_fragment(path) {
            Ok(blocks) => blocks,
            Err(err) => {
                self.diagnostics.warning(
                    codes::FRAGMENT_MISSING,
                    format!("fragment {} for {} skipped: {}", path.display(), marker, err),
                );
                return false;
            }
        };
        let Some(Location { path: list_path, index }) = self.locate(marker) else {
            self.diagnostics.warning(
                codes::MARKER_NOT_FOUND,
                format!("fragment marker {} not found in document", marker),
            );
            return false;
        };
        let Some(list) = block_list_mut(&mut self.document.blocks, &list_path) else {
            return false;
        };

        let count = blocks.len();
        for (offset, block) in blocks.into_iter().enumerate() {
            list.insert(index + 1 + offset, block);
        }

        let remove_host = match list[index].as_paragraph_mut() {
            Some(host) => {
                host.replace_all(marker, "");
                host.is_blank() && !host.has_section_properties() && !host.has_graphics()
            }
            None => false,
        };
        if remove_host {
            list.remove(index);
        }

        self.diagnostics.debug(format!(
            "spliced {} blocks from {} at {}",
            count,
            path.display(),
            marker
        ));
        true
    }

    // ========================================================================
    // Conditional sections and page breaks
    // ========================================================================

    /// Delete every paragraph whose text contains any of `texts`
    pub fn remove_paragraphs_containing(&mut self, texts: &[String]) -> usize {
        if texts.is_empty() {
            return 0;
        }
        let removed = retain_paragraphs(&mut self.document.blocks, &mut |p| {
            let text = p.text();
            !texts.iter().any(|t| text.contains(t.as_str()))
        });
        self.diagnostics
            .debug(format!("removed {} conditional paragraphs", removed));
        removed
    }

    /// Turn every `token` in the document into a page break
    pub fn expand_page_breaks(&mut self, token: &str) -> usize {
        let mut count = 0;
        visit_paragraphs_mut(&mut self.document.blocks, &mut |p| {
            count += p.expand_page_breaks(token);
        });
        count
    }

    // ========================================================================
    // Table of contents
    // ========================================================================

    /// Fill in the index between the configured markers
    ///
    /// Returns `None` when the document has no index.
    pub fn resolve_toc(&mut self, settings: &TocSettings) -> Option<TocSummary> {
        let summary = toc::resolve_toc(&mut self.document.blocks, settings)?;
        self.diagnostics.debug(format!(
            "index resolved: {} of {} entries paginated",
            summary.paginated, summary.entries
        ));
        Some(summary)
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Strip markers that were never filled, deleting paragraphs left with
    /// nothing meaningful
    pub fn clean_unused_markers(&mut self) -> usize {
        let Some(pattern) = cleanup::marker_pattern() else {
            return 0;
        };
        let removed = cleanup::clean_unused_markers(&mut self.document.blocks, pattern);
        for hf in &mut self.headers_footers {
            visit_paragraphs_mut(&mut hf.part.blocks, &mut |p| {
                p.strip_matches(pattern);
            });
        }
        removed
    }

    pub fn clean_empty_paragraphs(&mut self) -> usize {
        cleanup::clean_empty_paragraphs(&mut self.document.blocks)
    }

    /// Trim empty paragraphs at both ends and collapse runs of them
    pub fn clean_document_spacing(&mut self) -> usize {
        cleanup::clean_document_spacing(&mut self.document.blocks)
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Serialize the document into a package
    ///
    /// Header and footer parts are rewritten only when their text changed;
    /// every other part keeps its original bytes.
    pub fn save(mut self) -> Result<Vec<u8>> {
        let xml = self.document.to_xml();
        let after = StructureCounts::of(xml.as_bytes());
        if after.drawings < self.initial.drawings {
            self.diagnostics.warning(
                codes::STRUCTURE_LOSS,
                format!(
                    "document lost drawings: {} at load, {} at save",
                    self.initial.drawings, after.drawings
                ),
            );
        }
        if after.sections < self.initial.sections {
            self.diagnostics.warning(
                codes::STRUCTURE_LOSS,
                format!(
                    "document lost section properties: {} at load, {} at save",
                    self.initial.sections, after.sections
                ),
            );
        }
        self.archive.set_string(DOCUMENT_PART, xml);

        for hf in &self.headers_footers {
            if hf.part.text() != hf.original_text {
                self.archive.set_string(hf.path.clone(), hf.part.to_xml());
            }
        }
        self.archive.to_bytes()
    }

    fn locate(&self, marker: &str) -> Option<Location> {
        find_paragraph(&self.document.blocks, &|p| p.text().contains(marker))
    }
}

/// Body blocks of a fragment package, without section properties
fn load_fragment(path: &Path) -> Result<Vec<Block>> {
    if !path.is_file() {
        return Err(OoxmlError::MissingFile(path.display().to_string()));
    }
    let archive = OoxmlArchive::open(path)?;
    let part = WordPart::parse_document(archive.document_xml()?, DOCUMENT_PART)?;

    let mut blocks: Vec<Block> = part
        .blocks
        .into_iter()
        .filter(|b| !matches!(b, Block::Section(_)))
        .filter(|b| !matches!(b, Block::Opaque(node) if node.is_whitespace()))
        .collect();
    blocks.iter_mut().for_each(Block::strip_section_properties);
    Ok(blocks)
}
