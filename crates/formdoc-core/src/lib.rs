//! formdoc-core - Conditional document assembly
//!
//! Core library for formdoc: a safe expression evaluator, the
//! condition/block engine that picks text variants, the Jinja-compatible
//! text renderer, table building and validation, the typed report
//! configuration and the registry of report context builders.
//!
//! # Example
//!
//! ```
//! use formdoc_core::blocks::resolve_block;
//! use formdoc_core::schema::BlockDefinition;
//! use formdoc_core::{Context, Diagnostics};
//!
//! let yaml = r#"
//! id: opinion
//! reglas:
//!   - cuando: tipo_opinion == 'favorable'
//!     plantilla: Opinión favorable
//!   - plantilla: Otra opinión
//! "#;
//! let block: BlockDefinition = serde_yaml::from_str(yaml).unwrap();
//!
//! let mut ctx = Context::new();
//! ctx.insert("tipo_opinion".into(), "favorable".into());
//! let template = resolve_block(&block, &ctx, &Diagnostics::default());
//! assert_eq!(template, Some("Opinión favorable"));
//! ```

pub mod blocks;
pub mod conditions;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod expr;
pub mod form;
pub mod report;
pub mod reports;
pub mod schema;
pub mod tables;
pub mod template;

pub use blocks::{resolve_all_blocks, resolve_block, BlockProcessor};
pub use conditions::{
    build_condition, debug_condition, evaluate_all, evaluate_any, evaluate_condition,
    should_show_field, variables_in_expression, ConditionDebug,
};
pub use config::ReportConfig;
pub use context::Context;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Diagnostics, Severity};
pub use error::{ConfigError, ReportError};
pub use report::{ContextBuilder, ReportRegistry};
pub use template::{TemplateError, TemplateRenderer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
