//! Report configuration loading
//!
//! A report directory holds a `manifest.yaml` naming a template package and
//! a configuration directory. The configuration directory holds the YAML
//! files describing fields, conditional variables, text blocks and tables:
//!
//! ```text
//! informe/
//! ├── manifest.yaml
//! ├── plantilla.docx
//! └── config/
//!     ├── variables_simples.yaml
//!     ├── variables_condicionales.yaml
//!     ├── bloques_texto.yaml
//!     ├── bloques_texto_anexos.yaml
//!     ├── tablas.yaml
//!     └── general.yaml
//! ```
//!
//! Only the manifest is required. An entry that does not deserialize is
//! skipped with a warning; a file that is not valid YAML is an error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::conditions::condition_expression;
use crate::diagnostics::{codes, Diagnostics};
use crate::error::{ConfigError, Result};
use crate::expr::is_valid_expression;
use crate::schema::{
    BlockDefinition, ConditionalVariable, Field, FieldKind, GeneralConfig, Manifest,
    TableDefinition,
};
use crate::tables::TablesConfig;

/// Section name of fields that declare none
pub const DEFAULT_SECTION: &str = "Sin sección";

const MANIFEST_FILE: &str = "manifest.yaml";
const SIMPLE_FILE: &str = "variables_simples.yaml";
const CONDITIONAL_FILE: &str = "variables_condicionales.yaml";
const BLOCKS_PREFIX: &str = "bloques_texto";
const TABLES_FILE: &str = "tablas.yaml";
const GENERAL_FILE: &str = "general.yaml";

/// Everything a report directory declares
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub manifest: Manifest,
    pub report_dir: PathBuf,
    pub config_dir: PathBuf,
    pub fields: Vec<Field>,
    pub conditional_variables: Vec<ConditionalVariable>,
    pub blocks: Vec<BlockDefinition>,
    pub tables: Vec<TableDefinition>,
    /// Raw `{"tables": ...}` layout configuration, `Null` when absent
    pub table_layout: Value,
    pub general: GeneralConfig,
}

impl ReportConfig {
    /// Load the configuration of a report directory
    pub fn load(report_dir: impl AsRef<Path>, diagnostics: &Diagnostics) -> Result<Self> {
        let report_dir = report_dir.as_ref().to_path_buf();
        let manifest_path = report_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ConfigError::ManifestNotFound(manifest_path));
        }
        let content = read_file(&manifest_path)?;
        let manifest: Manifest =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: manifest_path.clone(),
                source,
            })?;
        diagnostics.info(format!(
            "manifest loaded: {} (v{})",
            manifest.nombre, manifest.version
        ));

        let config_dir = report_dir.join(&manifest.paths.config_dir);
        if !config_dir.is_dir() {
            return Err(ConfigError::ConfigDirNotFound(config_dir));
        }

        let simple = read_yaml(&config_dir.join(SIMPLE_FILE), diagnostics)?;
        let fields = entries::<Field>(
            first_key(&simple, &["variables_simples", "simple_variables"]),
            "field",
            diagnostics,
        );

        let conditional = read_yaml(&config_dir.join(CONDITIONAL_FILE), diagnostics)?;
        let conditional_variables = entries::<ConditionalVariable>(
            first_key(&conditional, &["variables_condicionales", "conditions"]),
            "conditional variable",
            diagnostics,
        );

        let mut blocks = Vec::new();
        for path in block_files(&config_dir)? {
            let data = read_yaml(&path, diagnostics)?;
            let list = match &data {
                Value::Array(_) => Some(&data),
                other => other.get("bloques_texto"),
            };
            blocks.extend(entries::<BlockDefinition>(list, "block", diagnostics));
        }

        let tables_data = read_yaml(&config_dir.join(TABLES_FILE), diagnostics)?;
        let tables = entries::<TableDefinition>(tables_data.get("tablas"), "table", diagnostics);
        let table_layout = match tables_data.get("tables") {
            Some(layout) => serde_json::json!({ "tables": layout }),
            None => Value::Null,
        };

        let general_data = read_yaml(&config_dir.join(GENERAL_FILE), diagnostics)?;
        let general = if general_data.is_null() {
            GeneralConfig::default()
        } else {
            serde_json::from_value(general_data).unwrap_or_else(|err| {
                diagnostics.warning(
                    codes::CONFIG_ENTRY_SKIPPED,
                    format!("{} ignored: {}", GENERAL_FILE, err),
                );
                GeneralConfig::default()
            })
        };

        diagnostics.info(format!(
            "configuration loaded for '{}': {} fields, {} conditional variables, {} blocks, {} tables",
            manifest.id,
            fields.len(),
            conditional_variables.len(),
            blocks.len(),
            tables.len()
        ));

        Ok(Self {
            manifest,
            report_dir,
            config_dir,
            fields,
            conditional_variables,
            blocks,
            tables,
            table_layout,
            general,
        })
    }

    /// Template package path
    pub fn template_path(&self) -> PathBuf {
        self.report_dir.join(&self.manifest.paths.template)
    }

    /// Parsed table layouts
    pub fn tables_config(&self, diagnostics: &Diagnostics) -> TablesConfig {
        TablesConfig::from_value(&self.table_layout, diagnostics)
    }

    /// Find a simple field by id
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Find a conditional variable by id
    pub fn conditional_variable(&self, id: &str) -> Option<&ConditionalVariable> {
        self.conditional_variables.iter().find(|v| v.id == id)
    }

    /// Collect semantic problems; `Ok` when there are none
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !self.manifest.has_valid_id() {
            problems.push(format!(
                "manifest id '{}' may only contain letters, digits and '_'",
                self.manifest.id
            ));
        }

        let variable_ids = self
            .fields
            .iter()
            .map(|f| f.id.as_str())
            .chain(self.conditional_variables.iter().map(|v| v.id.as_str()));
        duplicates("variable", variable_ids, &mut problems);
        duplicates("block", self.blocks.iter().map(|b| b.id.as_str()), &mut problems);
        duplicates("table", self.tables.iter().map(|t| t.id.as_str()), &mut problems);

        for field in &self.fields {
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    problems.push(format!("field '{}': min {} > max {}", field.id, min, max));
                }
            }
            if field.kind == FieldKind::Lista && field.options().is_empty() {
                problems.push(format!("field '{}': list without options", field.id));
            }
            if let Some(condition) = &field.condicion_padre {
                if !condition.trim().is_empty() && !is_valid_expression(condition.trim()) {
                    problems.push(format!(
                        "field '{}': condicion_padre does not parse: {}",
                        field.id, condition
                    ));
                }
            }
        }

        let quiet = Diagnostics::collecting().0;
        for block in &self.blocks {
            for (index, rule) in block.reglas.iter().enumerate() {
                let condition = condition_expression(&rule.cuando, &quiet);
                if !condition.trim().is_empty() && !is_valid_expression(condition.trim()) {
                    problems.push(format!(
                        "block '{}', rule {}: condition does not parse: {}",
                        block.id,
                        index + 1,
                        condition
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Fields grouped by section
    ///
    /// Sections listed in `secciones_orden` come first, in that order; the
    /// rest follow in order of first appearance.
    pub fn fields_by_section(&self) -> IndexMap<String, Vec<&Field>> {
        let mut sections: IndexMap<String, Vec<&Field>> = IndexMap::new();
        for name in &self.general.secciones_orden {
            sections.insert(name.clone(), Vec::new());
        }
        for field in &self.fields {
            let section = field.seccion.as_deref().unwrap_or(DEFAULT_SECTION);
            sections.entry(section.to_string()).or_default().push(field);
        }
        sections.retain(|_, fields| !fields.is_empty());
        sections
    }
}

// ============================================================================
// File helpers
// ============================================================================

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a YAML file into a JSON value; a missing file is `Null`
fn read_yaml(path: &Path, diagnostics: &Diagnostics) -> Result<Value> {
    if !path.is_file() {
        diagnostics.debug(format!("{} not found, using defaults", path.display()));
        return Ok(Value::Null);
    }
    let content = read_file(path)?;
    let value: Option<Value> =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(value.unwrap_or(Value::Null))
}

/// `bloques_texto*.yaml` files of a directory, sorted by name
fn block_files(config_dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(config_dir).map_err(|source| ConfigError::Io {
        path: config_dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "yaml")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(BLOCKS_PREFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn first_key<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| data.get(*key))
}

/// Deserialize each element of a list, skipping the ones that fail
fn entries<T: DeserializeOwned>(
    list: Option<&Value>,
    what: &str,
    diagnostics: &Diagnostics,
) -> Vec<T> {
    let Some(items) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
                diagnostics.warning(
                    codes::CONFIG_ENTRY_SKIPPED,
                    format!("{} '{}' skipped: {}", what, id, err),
                );
                None
            }
        })
        .collect()
}

fn duplicates<'a>(what: &str, ids: impl Iterator<Item = &'a str>, problems: &mut Vec<String>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            problems.push(format!("duplicate {} id '{}'", what, id));
        }
    }
}
