//! Report context builders and their registry
//!
//! A report's manifest names the builder that turns form answers into the
//! render context. Builders are registered explicitly at startup; the
//! registry never loads anything dynamically.
//!
//! # Example
//!
//! ```
//! use formdoc_core::report::ReportRegistry;
//!
//! let registry = ReportRegistry::with_builtins();
//! assert!(registry.get("generic").is_ok());
//! assert!(registry.get("informe_auditoria").is_ok());
//! assert!(registry.get("unknown").is_err());
//! ```

use indexmap::IndexMap;

use crate::config::ReportConfig;
use crate::context::Context;
use crate::diagnostics::Diagnostics;
use crate::error::ReportError;
use crate::reports::{AuditReportBuilder, GenericBuilder};

/// Builds the render context of a report from its inputs
pub trait ContextBuilder: Send + Sync {
    /// Id the manifest refers to
    fn id(&self) -> &str;

    /// Build the `marker → value` context, directives included
    fn build_context(
        &self,
        inputs: &Context,
        config: &ReportConfig,
        diagnostics: &Diagnostics,
    ) -> Result<Context, ReportError>;
}

/// Context builders by id
pub struct ReportRegistry {
    builders: IndexMap<String, Box<dyn ContextBuilder>>,
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ReportRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            builders: IndexMap::new(),
        }
    }

    /// Create a registry holding the built-in builders
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GenericBuilder));
        registry.register(Box::new(AuditReportBuilder));
        registry
    }

    /// Add a builder, replacing any builder with the same id
    pub fn register(&mut self, builder: Box<dyn ContextBuilder>) {
        self.builders.insert(builder.id().to_string(), builder);
    }

    /// Look up a builder
    pub fn get(&self, id: &str) -> Result<&dyn ContextBuilder, ReportError> {
        self.builders
            .get(id)
            .map(|b| b.as_ref())
            .ok_or_else(|| ReportError::UnknownBuilder(id.to_string()))
    }

    /// Ids of all registered builders, in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Build the context of a report with the builder its manifest names
    pub fn build_context(
        &self,
        inputs: &Context,
        config: &ReportConfig,
        diagnostics: &Diagnostics,
    ) -> Result<Context, ReportError> {
        let builder = self.get(&config.manifest.builder)?;
        diagnostics.debug(format!(
            "building context for '{}' with builder '{}'",
            config.manifest.id,
            builder.id()
        ));
        builder.build_context(inputs, config, diagnostics)
    }
}
