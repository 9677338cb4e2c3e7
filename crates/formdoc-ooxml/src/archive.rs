//! Package handling for DOCX files
//!
//! A DOCX file is a ZIP archive of XML parts and media. The whole package is
//! held in memory; parts the engine does not touch are written back with
//! their original bytes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{OoxmlError, Result};

/// Main document part
pub const DOCUMENT_PART: &str = "word/document.xml";

/// An unpacked OOXML package
#[derive(Debug, Clone, Default)]
pub struct OoxmlArchive {
    /// All parts of the package, keyed by path
    files: HashMap<String, Vec<u8>>,
}

impl OoxmlArchive {
    /// Open and unpack a package file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Unpack a package held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            // Skip directories
            if name.ends_with('/') {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            files.insert(name, contents);
        }

        Ok(Self { files })
    }

    /// Get a part's contents by path
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    /// Get a part's contents as a string
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Get the main document content (word/document.xml)
    pub fn document_xml(&self) -> Result<&[u8]> {
        self.get(DOCUMENT_PART)
            .ok_or_else(|| OoxmlError::MissingFile(DOCUMENT_PART.to_string()))
    }

    /// Header and footer parts (`word/header*.xml`, `word/footer*.xml`), sorted
    pub fn header_footer_parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = self
            .files
            .keys()
            .filter(|path| is_header_footer_part(path))
            .cloned()
            .collect();
        parts.sort();
        parts
    }

    /// Check if a part exists in the package
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// List all parts in the package
    pub fn file_list(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|s| s.as_str())
    }

    /// Set or update a part's contents
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        self.files.insert(path.into(), contents);
    }

    /// Set a part's contents from a string
    pub fn set_string(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into().into_bytes());
    }

    /// Write the package into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Write the package to any writer
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // Sort keys for deterministic output
        let mut paths: Vec<_> = self.files.keys().collect();
        paths.sort();

        for path in paths {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(&self.files[path])?;
        }

        zip.finish()?;
        Ok(())
    }
}

fn is_header_footer_part(path: &str) -> bool {
    let Some(name) = path.strip_prefix("word/") else {
        return false;
    };
    !name.contains('/')
        && name.ends_with(".xml")
        && (name.starts_with("header") || name.starts_with("footer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_operations() {
        let mut archive = OoxmlArchive::default();
        archive.set_string("word/document.xml", "<w:document/>");
        assert!(archive.contains("word/document.xml"));
        assert_eq!(
            archive.get_string("word/document.xml"),
            Some("<w:document/>".to_string())
        );
        assert_eq!(archive.document_xml().unwrap(), b"<w:document/>");
    }

    #[test]
    fn test_missing_document_part() {
        let archive = OoxmlArchive::default();
        match archive.document_xml() {
            Err(OoxmlError::MissingFile(part)) => assert_eq!(part, DOCUMENT_PART),
            other => panic!("expected MissingFile, got {:?}", other),
        }
    }

    #[test]
    fn test_header_footer_parts() {
        let mut archive = OoxmlArchive::default();
        for path in [
            "word/footer1.xml",
            "word/header2.xml",
            "word/header1.xml",
            "word/_rels/header1.xml.rels",
            "word/document.xml",
            "customXml/header1.xml",
        ] {
            archive.set_string(path, "<x/>");
        }
        assert_eq!(
            archive.header_footer_parts(),
            vec!["word/footer1.xml", "word/header1.xml", "word/header2.xml"]
        );
    }

    #[test]
    fn test_roundtrip_keeps_bytes() {
        let mut archive = OoxmlArchive::default();
        archive.set("word/media/image1.png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]);
        archive.set_string("word/document.xml", "<w:document/>");

        let bytes = archive.to_bytes().unwrap();
        let restored = OoxmlArchive::from_bytes(&bytes).unwrap();
        assert_eq!(
            restored.get("word/media/image1.png"),
            Some(&[0x89, b'P', b'N', b'G', 0, 1, 2][..])
        );
        assert_eq!(restored.file_list().count(), 2);
    }
}
