//! # formdoc-ooxml
//!
//! Direct manipulation of Word (DOCX) packages for formdoc.
//!
//! This crate provides functionality to:
//! - Read a template package and parse its parts into a typed tree
//! - Replace `<<markers>>`, even when Word split them across runs
//! - Insert tables, splice document fragments and resolve a table of contents
//! - Clean up leftovers and write the package back without touching
//!   unrelated parts
//!
//! ## Example: Rendering a Template
//!
//! ```no_run
//! use std::path::Path;
//! use formdoc_core::{Context, Diagnostics};
//! use formdoc_ooxml::{render_report, RenderOptions};
//!
//! let mut context = Context::new();
//! context.insert("<<Nombre entidad>>".into(), "Empresa Ejemplo S.A.".into());
//!
//! let output = render_report(
//!     Path::new("plantilla.docx"),
//!     &context,
//!     "Informe Empresa Ejemplo",
//!     &RenderOptions::new("salida"),
//!     &Diagnostics::default(),
//! )?;
//! println!("{}", output.display());
//! # Ok::<(), formdoc_ooxml::RenderError>(())
//! ```

pub mod archive;
mod cleanup;
pub mod engine;
pub mod error;
mod paragraph;
pub mod render;
pub mod settings;
pub mod table_markup;
#[doc(hidden)]
pub mod test_utils;
mod toc;
pub mod wml;
pub mod xml;

pub use archive::OoxmlArchive;
pub use engine::{DocumentEngine, FragmentRef, StructureCounts};
pub use error::{OoxmlError, RenderError, Result};
pub use render::{render_report, safe_filename, RenderOptions};
pub use settings::EngineSettings;
pub use toc::TocSummary;
pub use wml::{Block, Paragraph, Run, WordPart};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
