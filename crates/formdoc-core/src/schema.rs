//! Typed configuration records
//!
//! These mirror the YAML files of a report directory. Field names follow the
//! Spanish keys used in configuration, with English aliases where the loader
//! accepts both spellings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Simple fields
// ============================================================================

/// Input control of a simple field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    #[serde(alias = "text")]
    Texto,
    #[serde(alias = "textarea")]
    TextoLargo,
    #[serde(alias = "number")]
    Numero,
    #[serde(alias = "select")]
    Lista,
    #[serde(alias = "date")]
    Fecha,
    /// Any control the engine has no special handling for
    #[serde(other)]
    Otro,
}

/// Visibility dependency on another variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub variable: String,
    /// Value the variable must have
    #[serde(default)]
    pub valor: Option<String>,
    /// Value the variable must not have
    #[serde(default)]
    pub valor_no: Option<String>,
}

/// A simple form field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "nombre", alias = "label")]
    pub label: String,
    #[serde(rename = "tipo", alias = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default, alias = "required")]
    pub requerido: bool,
    #[serde(default, alias = "optional")]
    pub opcional: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub ayuda: Option<String>,
    #[serde(default)]
    pub seccion: Option<String>,
    #[serde(default)]
    pub grupo: Option<String>,
    #[serde(default)]
    pub opciones: Option<Vec<String>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub calculado: bool,
    #[serde(default = "default_scope")]
    pub ambito: String,
    #[serde(default)]
    pub dependencia: Option<Dependency>,
    #[serde(default)]
    pub condicion_padre: Option<String>,
}

fn default_scope() -> String {
    "global".to_string()
}

impl Field {
    /// Options declared for a list field, empty otherwise
    pub fn options(&self) -> &[String] {
        self.opciones.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// Conditional variables
// ============================================================================

/// Control used to pick a conditional option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Exclusive choice
    #[default]
    Radio,
    Select,
}

/// One choice of a conditional variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOption {
    #[serde(deserialize_with = "string_or_scalar")]
    pub valor: String,
    pub etiqueta: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub es_default: bool,
    #[serde(default)]
    pub titulo_informe: Option<String>,
    /// Sub-fields shown when this option is selected
    #[serde(default)]
    pub variables_asociadas: Vec<String>,
}

/// A variable whose value selects text variants and local fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalVariable {
    pub id: String,
    #[serde(rename = "nombre", alias = "label")]
    pub label: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub tipo_control: ControlKind,
    #[serde(default)]
    pub marker: Option<String>,
    /// Fragment spliced into the document when the answer is affirmative
    #[serde(default)]
    pub word_file: Option<String>,
    #[serde(default)]
    pub requerido: bool,
    #[serde(default)]
    pub seccion: Option<String>,
    #[serde(default)]
    pub opciones: Vec<ConditionalOption>,
    #[serde(default)]
    pub dependencia: Option<Dependency>,
}

impl ConditionalVariable {
    /// The option whose `valor` equals `value`
    pub fn option(&self, value: &str) -> Option<&ConditionalOption> {
        self.opciones.iter().find(|o| o.valor == value)
    }

    /// The option flagged as default, else the first one
    pub fn default_option(&self) -> Option<&ConditionalOption> {
        self.opciones
            .iter()
            .find(|o| o.es_default)
            .or_else(|| self.opciones.first())
    }

    /// Text that represents `value` in the report
    ///
    /// The selected option's `titulo_informe`, falling back to its label,
    /// falling back to the raw value.
    pub fn report_text(&self, value: &str) -> String {
        match self.option(value) {
            Some(option) => option
                .titulo_informe
                .clone()
                .unwrap_or_else(|| option.etiqueta.clone()),
            None => value.to_string(),
        }
    }
}

// ============================================================================
// Text blocks
// ============================================================================

/// Condition of a rule: an expression or its structured form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Expression(String),
    Structured(StructuredCondition),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Expression("True".to_string())
    }
}

/// Structured condition grammar used by form-building tools
///
/// Variants are tried in declaration order; anything else lands in
/// `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredCondition {
    Equal {
        campo: String,
        igual: Value,
    },
    NotEqual {
        campo: String,
        no_igual: Value,
    },
    Greater {
        campo: String,
        mayor: Value,
    },
    Less {
        campo: String,
        menor: Value,
    },
    And {
        and: Vec<StructuredCondition>,
    },
    Or {
        or: Vec<StructuredCondition>,
    },
    Not {
        not: Box<StructuredCondition>,
    },
    Unrecognized(Value),
}

/// A condition/template pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub cuando: Condition,
    pub plantilla: String,
}

/// A named, ordered list of rules; the first matching rule wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub id: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub reglas: Vec<Rule>,
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    #[default]
    Texto,
    Numero,
    Fecha,
    Lista,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableColumn {
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub tipo: ColumnKind,
    #[serde(default)]
    pub requerido: bool,
    #[serde(default)]
    pub opciones: Option<Vec<String>>,
}

/// Form-level table schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub columnas: Vec<TableColumn>,
    #[serde(default)]
    pub min_filas: usize,
    #[serde(default)]
    pub max_filas: Option<usize>,
}

// ============================================================================
// Manifest and general configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPaths {
    /// Template package, relative to the report directory
    pub template: String,
    /// Configuration directory, relative to the report directory
    pub config_dir: String,
}

/// Report manifest (`manifest.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub nombre: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub version: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub autor: Option<String>,
    pub paths: ManifestPaths,
    /// Registered context builder
    #[serde(default = "default_builder")]
    pub builder: String,
}

fn default_builder() -> String {
    "generic".to_string()
}

impl Manifest {
    /// Ids may only contain letters, digits and underscores
    pub fn has_valid_id(&self) -> bool {
        is_valid_identifier(&self.id)
    }
}

/// Check that `id` is non-empty and made of letters, digits and `_`
pub fn is_valid_identifier(id: &str) -> bool {
    let stripped: String = id.chars().filter(|c| *c != '_').collect();
    !stripped.is_empty() && stripped.chars().all(char::is_alphanumeric)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    pub tipo: String,
    pub mensaje: String,
    #[serde(default)]
    pub regla: Option<String>,
}

/// Optional `general.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub version: String,
    #[serde(default)]
    pub validaciones: Vec<ValidationRule>,
    #[serde(default)]
    pub secciones_orden: Vec<String>,
}

/// Accept `1.0` or `true` where a string is expected
fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {}",
            other
        ))),
    }
}
