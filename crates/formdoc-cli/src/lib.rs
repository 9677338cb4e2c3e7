//! formdoc CLI - Command-line interface library
//!
//! This library provides the CLI functionality for formdoc, including:
//! - Render: Build a report's context from its answers and write the DOCX
//! - Check: Load and validate a report configuration
//! - Eval: Evaluate a condition expression against a set of variables
//! - Reports: List the metadata records of past renders
//!
//! # Library Usage
//!
//! ```ignore
//! use formdoc_cli::{render_command, RenderRequest};
//!
//! let mut request = RenderRequest::new("reports/informe_auditoria", "outputs");
//! request.input = Some("respuestas.yaml".into());
//! let output = render_command(&request)?;
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # Render a report from a YAML answers file
//! formdoc render reports/informe_auditoria --input respuestas.yaml
//!
//! # Render again from a recorded run
//! formdoc render reports/informe_auditoria --from-record meta_20240301_101500_AB12CD
//!
//! # Check a report configuration
//! formdoc check reports/informe_auditoria --format json
//! ```

pub mod app;
pub mod metadata;

// Re-export main entry point and types
pub use app::{
    check_command, eval_command, load_settings, load_variables, render_command, reports_command,
};
pub use app::{run_cli, OutputFormat, RenderRequest};
pub use metadata::{MetadataStore, ReportMetadata};
