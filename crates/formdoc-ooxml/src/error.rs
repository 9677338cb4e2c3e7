//! Error types for package and render operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing a package
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// Error reading or writing the ZIP archive
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Error reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing XML content
    #[error("XML parsing error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    /// Required part not found in the package
    #[error("Required file not found: {0}")]
    MissingFile(String),

    /// Part parsed but does not have the expected shape
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),
}

/// Result type for package operations
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Errors surfaced by [`render_report`](crate::render::render_report)
#[derive(Error, Debug)]
pub enum RenderError {
    /// Template package does not exist
    #[error("template not found: {0}")]
    TemplateNotFound(PathBuf),

    /// Template could not be loaded or the document could not be serialized
    #[error(transparent)]
    Package(#[from] OoxmlError),

    /// Output directory could not be created or the file could not be written
    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
