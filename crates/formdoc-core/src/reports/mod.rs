//! Built-in context builders
//!
//! Both builders end the same way: plain variables become `<<name>>`
//! markers, configured markers receive their field's value and the engine
//! directives are attached. [`finish_context`] does that part.

mod audit;

pub use audit::{auxiliary_variables, issue_count, AuditReportBuilder};

use serde_json::{json, Map, Value};

use crate::blocks::BlockProcessor;
use crate::config::ReportConfig;
use crate::context::{display_value, is_reserved_key, keys, Context};
use crate::diagnostics::Diagnostics;
use crate::error::ReportError;
use crate::form::normalize_boolean_value;
use crate::report::ContextBuilder;

/// Wrap a variable name as a marker
pub fn marker_for(name: &str) -> String {
    format!("<<{}>>", name)
}

/// Inputs, blocks rendered, markers exposed
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericBuilder;

impl ContextBuilder for GenericBuilder {
    fn id(&self) -> &str {
        "generic"
    }

    fn build_context(
        &self,
        inputs: &Context,
        config: &ReportConfig,
        diagnostics: &Diagnostics,
    ) -> Result<Context, ReportError> {
        let mut values = plain_inputs(inputs);
        let processor = BlockProcessor::new(config.blocks.clone(), diagnostics.clone());
        for (id, text) in processor.process_all(&values) {
            values.insert(id, Value::String(text));
        }
        Ok(finish_context(values, inputs, config, diagnostics))
    }
}

/// Non-directive entries of the inputs
pub(crate) fn plain_inputs(inputs: &Context) -> Context {
    inputs
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Turn computed values into the render context
///
/// * a field with a `marker` maps it to the field's value;
/// * a conditional variable with a `marker` maps it to the selected
///   option's report title;
/// * every other value `k` is exposed as `<<k>>`;
/// * directives for the document engine are added last.
pub fn finish_context(
    values: Context,
    inputs: &Context,
    config: &ReportConfig,
    diagnostics: &Diagnostics,
) -> Context {
    let mut context = Context::new();

    for field in &config.fields {
        if let (Some(marker), Some(value)) = (&field.marker, values.get(&field.id)) {
            context.insert(marker.clone(), value.clone());
        }
    }
    for variable in &config.conditional_variables {
        let (Some(marker), Some(value)) = (&variable.marker, values.get(&variable.id)) else {
            continue;
        };
        let text = variable.report_text(&display_value(value));
        context.insert(marker.clone(), Value::String(text));
    }

    for (key, value) in &values {
        if is_reserved_key(key) {
            continue;
        }
        let marker = if key.starts_with("<<") {
            key.clone()
        } else {
            marker_for(key)
        };
        context.entry(marker).or_insert_with(|| value.clone());
    }

    let docs = documents_to_insert(&values, config, diagnostics);

    let condition_inputs: Map<String, Value> = config
        .conditional_variables
        .iter()
        .filter_map(|v| values.get(&v.id).map(|value| (v.id.clone(), value.clone())))
        .collect();
    let simple_inputs: Map<String, Value> = plain_inputs(inputs)
        .into_iter()
        .filter(|(key, _)| !condition_inputs.contains_key(key))
        .collect();

    context.insert(keys::USE_XML_ENGINE.into(), Value::Bool(true));
    context.insert(
        keys::CONFIG_DIR.into(),
        Value::String(config.config_dir.display().to_string()),
    );
    if !config.table_layout.is_null() {
        context.insert(keys::TABLE_CONFIG.into(), config.table_layout.clone());
    }
    context.insert(
        keys::TABLE_INPUTS.into(),
        inputs
            .get(keys::TABLE_INPUTS)
            .cloned()
            .unwrap_or_else(|| json!({})),
    );
    context.insert(keys::SIMPLE_INPUTS.into(), Value::Object(simple_inputs));
    context.insert(keys::CONDITION_INPUTS.into(), Value::Object(condition_inputs));
    context.insert(keys::DOCS_TO_INSERT.into(), Value::Array(docs));
    for (key, value) in &values {
        if is_reserved_key(key) && !context.contains_key(key) {
            context.insert(key.clone(), value.clone());
        }
    }
    context
}

/// Fragments of the conditional variables answered affirmatively
fn documents_to_insert(
    values: &Context,
    config: &ReportConfig,
    diagnostics: &Diagnostics,
) -> Vec<Value> {
    config
        .conditional_variables
        .iter()
        .filter_map(|variable| {
            let file = variable.word_file.as_ref()?;
            let answer = values.get(&variable.id).map(display_value)?;
            if normalize_boolean_value(&answer) != "sí" {
                return None;
            }
            let marker = variable
                .marker
                .clone()
                .unwrap_or_else(|| marker_for(&variable.id));
            diagnostics.debug(format!("fragment '{}' queued at {}", file, marker));
            Some(json!({ "marker": marker, "file": file }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GeneralConfig, Manifest};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    pub(crate) fn config_from(
        yaml_fields: &str,
        yaml_conditions: &str,
        yaml_blocks: &str,
    ) -> ReportConfig {
        let manifest: Manifest = serde_yaml::from_str(
            "id: prueba\nnombre: Prueba\nversion: '1'\npaths:\n  template: t.docx\n  config_dir: config\n",
        )
        .unwrap();
        ReportConfig {
            manifest,
            report_dir: PathBuf::from("/informes/prueba"),
            config_dir: PathBuf::from("/informes/prueba/config"),
            fields: serde_yaml::from_str(yaml_fields).unwrap(),
            conditional_variables: serde_yaml::from_str(yaml_conditions).unwrap(),
            blocks: serde_yaml::from_str(yaml_blocks).unwrap(),
            tables: Vec::new(),
            table_layout: Value::Null,
            general: GeneralConfig::default(),
        }
    }

    #[test]
    fn test_generic_context() {
        let config = config_from(
            "- id: empresa\n  nombre: Empresa\n  marker: <<Nombre de la empresa>>\n",
            "- id: anexo\n  nombre: Anexo\n  marker: <<Anexo>>\n  word_file: anexo.docx\n  opciones:\n    - valor: si\n      etiqueta: Sí\n      titulo_informe: Con anexo\n    - valor: no\n      etiqueta: No\n",
            "- id: saludo\n  reglas:\n    - cuando: empresa\n      plantilla: Hola {{ empresa }}\n",
        );
        let inputs: Context = serde_json::from_value(json!({
            "empresa": "ACME",
            "anexo": "si",
            "_table_inputs": {"t": {}}
        }))
        .unwrap();
        let ctx = GenericBuilder
            .build_context(&inputs, &config, &Diagnostics::default())
            .unwrap();

        assert_eq!(ctx["<<Nombre de la empresa>>"], json!("ACME"));
        assert_eq!(ctx["<<empresa>>"], json!("ACME"));
        assert_eq!(ctx["<<saludo>>"], json!("Hola ACME"));
        assert_eq!(ctx["<<Anexo>>"], json!("Con anexo"));
        assert_eq!(ctx["<<anexo>>"], json!("si"));
        assert_eq!(
            ctx[keys::DOCS_TO_INSERT],
            json!([{"marker": "<<Anexo>>", "file": "anexo.docx"}])
        );
        assert_eq!(ctx[keys::TABLE_INPUTS], json!({"t": {}}));
        assert_eq!(ctx[keys::CONDITION_INPUTS], json!({"anexo": "si"}));
        assert_eq!(ctx[keys::SIMPLE_INPUTS], json!({"empresa": "ACME"}));
        assert_eq!(ctx[keys::USE_XML_ENGINE], json!(true));
        assert!(!ctx.contains_key(keys::TABLE_CONFIG));
        assert!(!ctx.contains_key("empresa"));
    }

    #[test]
    fn test_negative_answer_queues_no_fragment() {
        let config = config_from(
            "[]",
            "- id: anexo\n  nombre: Anexo\n  word_file: anexo.docx\n",
            "[]",
        );
        let inputs: Context = serde_json::from_value(json!({"anexo": "No"})).unwrap();
        let ctx = GenericBuilder
            .build_context(&inputs, &config, &Diagnostics::default())
            .unwrap();
        assert_eq!(ctx[keys::DOCS_TO_INSERT], json!([]));
    }
}
