//! Shared test fixtures for formdoc-ooxml
//!
//! Packages are built in memory so tests never depend on binary files.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// WordprocessingML main namespace
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Build a DOCX package from a document part and any extra parts
///
/// # Panics
///
/// Panics if the in-memory ZIP cannot be written.
pub fn create_docx(document_xml: &str, parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let standard: [(&str, &[u8]); 3] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document_xml.as_bytes()),
    ];
    for (name, contents) in standard.iter().chain(parts) {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents).unwrap();
    }

    zip.finish().unwrap();
    buffer.into_inner()
}

/// A `word/document.xml` with the given body content
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
        W_NS, body
    )
}

/// A header part with the given content
pub fn header_xml(content: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="{}">{}</w:hdr>"#,
        W_NS, content
    )
}

/// A paragraph with one run holding `text`
pub fn paragraph(text: &str) -> String {
    runs(&[text])
}

/// A paragraph with one run per piece, so text is split across nodes the
/// way Word splits it
pub fn runs(pieces: &[&str]) -> String {
    let mut xml = String::from("<w:p>");
    for piece in pieces {
        xml.push_str(r#"<w:r><w:t xml:space="preserve">"#);
        xml.push_str(&crate::xml::escape_text(piece));
        xml.push_str("</w:t></w:r>");
    }
    xml.push_str("</w:p>");
    xml
}

/// A paragraph holding an inline drawing
pub fn drawing_paragraph() -> String {
    r#"<w:p><w:r><w:drawing><wp:inline><wp:extent cx="100" cy="100"/></wp:inline></w:drawing></w:r></w:p>"#
        .to_string()
}
