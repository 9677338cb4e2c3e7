//! Render pipeline: context + template package → output document
//!
//! [`render_report`] runs every engine pass in order and writes the result
//! only once the whole document has been built, so a failed render never
//! leaves a partial file behind.

use std::fs;
use std::path::{Path, PathBuf};

use formdoc_core::context::{display_value, keys, str_directive};
use formdoc_core::diagnostics::codes;
use formdoc_core::tables::{TableBuilder, TablesConfig};
use formdoc_core::template::clean_context_formatting;
use formdoc_core::{Context, Diagnostics};
use serde_json::Value;
use tracing::instrument;

use crate::engine::{DocumentEngine, FragmentRef};
use crate::error::RenderError;
use crate::settings::EngineSettings;

const MAX_FILENAME_CHARS: usize = 200;
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const DEFAULT_FILENAME: &str = "informe";

/// Where and how to render
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Directory the document is written to; created if missing
    pub output_dir: PathBuf,
    pub settings: EngineSettings,
}

impl RenderOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Render `template` with `context` into `options.output_dir`
///
/// Returns the path of the written document.
#[instrument(
    skip(template, context, options, diagnostics),
    fields(template = %template.display())
)]
pub fn render_report(
    template: &Path,
    context: &Context,
    output_name: &str,
    options: &RenderOptions,
    diagnostics: &Diagnostics,
) -> Result<PathBuf, RenderError> {
    if !template.is_file() {
        return Err(RenderError::TemplateNotFound(template.to_path_buf()));
    }
    let output_path = options.output_dir.join(safe_filename(output_name));

    let context = clean_context_formatting(context);
    let settings = &options.settings;
    let mut engine = DocumentEngine::load(template, diagnostics.clone())?;

    engine.replace_variables(&context);
    insert_tables(&mut engine, &context, settings, diagnostics);
    insert_fragments(&mut engine, &context, diagnostics);

    if !discrepancies_developed(&context, settings) {
        engine.remove_paragraphs_containing(&settings.discrepancies.texts);
    }
    engine.expand_page_breaks(&settings.markers.page_break);
    engine.resolve_toc(&settings.toc);
    engine.clean_unused_markers();
    engine.clean_empty_paragraphs();
    engine.clean_document_spacing();

    let bytes = engine.save()?;

    fs::create_dir_all(&options.output_dir).map_err(|source| RenderError::Output {
        path: options.output_dir.clone(),
        source,
    })?;
    fs::write(&output_path, bytes).map_err(|source| RenderError::Output {
        path: output_path.clone(),
        source,
    })?;

    diagnostics.info(format!("document written to {}", output_path.display()));
    Ok(output_path)
}

/// Build configured tables when both the layout and the inputs are present
fn insert_tables(
    engine: &mut DocumentEngine,
    context: &Context,
    settings: &EngineSettings,
    diagnostics: &Diagnostics,
) {
    let Some(layout) = context.get(keys::TABLE_CONFIG).filter(|v| !v.is_null()) else {
        return;
    };
    let Some(table_inputs) = context
        .get(keys::TABLE_INPUTS)
        .and_then(Value::as_object)
        .filter(|inputs| !inputs.is_empty())
    else {
        return;
    };
    let simple_inputs = context
        .get(keys::SIMPLE_INPUTS)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let config = TablesConfig::from_value(layout, diagnostics);
    let built = TableBuilder::new(&config, &simple_inputs)
        .with_diagnostics(diagnostics.clone())
        .build_all(table_inputs);
    engine.insert_tables(&built, &settings.tables);
}

/// Splice `_docs_to_insert`, resolved against the parent of `_config_dir`
fn insert_fragments(engine: &mut DocumentEngine, context: &Context, diagnostics: &Diagnostics) {
    let Some(entries) = context.get(keys::DOCS_TO_INSERT).and_then(Value::as_array) else {
        return;
    };
    let fragments: Vec<FragmentRef> = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(fragment) => Some(fragment),
            Err(err) => {
                diagnostics.warning(
                    codes::CONFIG_ENTRY_SKIPPED,
                    format!("invalid fragment entry {}: {}", entry, err),
                );
                None
            }
        })
        .collect();
    if fragments.is_empty() {
        return;
    }

    let base_dir = str_directive(context, keys::CONFIG_DIR)
        .map(Path::new)
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    engine.insert_fragments(&fragments, base_dir);
}

/// Whether the discrepancies annex stays in the document
fn discrepancies_developed(context: &Context, settings: &EngineSettings) -> bool {
    let discrepancies = &settings.discrepancies;
    context
        .get(keys::CONDITION_INPUTS)
        .and_then(|inputs| inputs.get(&discrepancies.condition_key))
        .is_some_and(|value| display_value(value).trim() == discrepancies.affirmative)
}

/// Make a file name safe for every platform and give it a `.docx`
/// extension
pub fn safe_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let mut name = replaced.trim().to_string();
    if name.is_empty() {
        name = DEFAULT_FILENAME.to_string();
    }
    if !name.ends_with(".docx") {
        name.push_str(".docx");
    }
    name
}
