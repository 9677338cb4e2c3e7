//! Table layout configuration (`tablas.yaml`, key `tables`)

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::{codes, Diagnostics};

/// One table row keyed by column id
pub type Row = serde_json::Map<String, Value>;

/// Default number of instances of a per-instance table
pub const DEFAULT_MAX_INSTANCES: u32 = 10;

/// How a table is laid out from its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Configured rows, values looked up per row and column
    FixedRows,
    /// One table per instance `n`, marker taken from a pattern
    PerInstance,
    /// Current versus previous year with optional variation
    Comparative,
    /// Free rows plus computed footer rows
    Totals,
    /// Free rows passed through
    List,
}

/// Value type of a column, used for cell formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Integer,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    #[serde(default)]
    pub header: String,
    /// Header with `{key}` placeholders filled from the table headers
    #[serde(default)]
    pub header_template: Option<String>,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Header text, with `{key}` placeholders substituted from `headers`
    pub fn header_text(&self, headers: &IndexMap<String, String>) -> String {
        match &self.header_template {
            Some(template) => headers.iter().fold(template.clone(), |text, (key, value)| {
                text.replace(&format!("{{{}}}", key), value)
            }),
            None => self.header.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// `manual` or `calculated`; calculated values arrive precomputed
    #[serde(default)]
    pub input_mode: Option<String>,
    #[serde(default)]
    pub calculate_variacion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FooterKind {
    Sum,
    PercentOfTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterRowSpec {
    pub row_type: FooterKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sum_columns: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl FooterRowSpec {
    /// Columns a footer fills: `sum_columns`, else `columns`
    pub fn target_columns(&self) -> &[String] {
        if self.sum_columns.is_empty() {
            &self.columns
        } else {
            &self.sum_columns
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceRange {
    #[serde(default)]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableParameters {
    #[serde(default)]
    pub n: Option<InstanceRange>,
}

/// Layout configuration of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub kind: Option<LayoutKind>,
    #[serde(default)]
    pub marker: Option<String>,
    /// Marker with an `{n}` placeholder, for per-instance tables
    #[serde(default)]
    pub marker_pattern: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub rows: Vec<RowSpec>,
    #[serde(default)]
    pub footer_rows: Vec<FooterRowSpec>,
    #[serde(default)]
    pub remove_empty_rows: bool,
    #[serde(default)]
    pub parameters: TableParameters,
}

impl TableConfig {
    /// Explicit `kind`, else inferred from the shape of the configuration
    pub fn layout(&self) -> LayoutKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        if self.marker_pattern.is_some() {
            LayoutKind::PerInstance
        } else if self.rows.iter().any(|r| r.calculate_variacion) {
            LayoutKind::Comparative
        } else if !self.footer_rows.is_empty() {
            LayoutKind::Totals
        } else if !self.rows.is_empty() {
            LayoutKind::FixedRows
        } else {
            LayoutKind::List
        }
    }

    /// Highest instance number of a per-instance table
    pub fn max_instances(&self) -> u32 {
        self.parameters
            .n
            .as_ref()
            .and_then(|n| n.max)
            .unwrap_or(DEFAULT_MAX_INSTANCES)
    }
}

/// All table layouts of a report, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TablesConfig {
    pub tables: IndexMap<String, TableConfig>,
}

impl TablesConfig {
    /// Read the `tables` map of a configuration value
    ///
    /// Entries that do not describe a valid table are skipped with a
    /// warning; the rest still load.
    pub fn from_value(value: &Value, diagnostics: &Diagnostics) -> Self {
        let mut tables = IndexMap::new();
        let Some(entries) = value.get("tables").and_then(Value::as_object) else {
            return Self { tables };
        };
        for (id, entry) in entries {
            match serde_json::from_value::<TableConfig>(entry.clone()) {
                Ok(config) => {
                    tables.insert(id.clone(), config);
                }
                Err(err) => diagnostics.warning(
                    codes::CONFIG_ENTRY_SKIPPED,
                    format!("table '{}' skipped: {}", id, err),
                ),
            }
        }
        Self { tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> TableConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_layout_inference_order() {
        assert_eq!(
            config(json!({
                "marker_pattern": "<<T{n}>>",
                "rows": [{"id": "a", "calculate_variacion": true}]
            }))
            .layout(),
            LayoutKind::PerInstance
        );
        assert_eq!(
            config(json!({
                "rows": [{"id": "a", "calculate_variacion": true}],
                "footer_rows": [{"row_type": "sum"}]
            }))
            .layout(),
            LayoutKind::Comparative
        );
        assert_eq!(
            config(json!({"rows": [{"id": "a"}], "footer_rows": [{"row_type": "sum"}]})).layout(),
            LayoutKind::Totals
        );
        assert_eq!(config(json!({"rows": [{"id": "a"}]})).layout(), LayoutKind::FixedRows);
        assert_eq!(config(json!({})).layout(), LayoutKind::List);
        assert_eq!(
            config(json!({"kind": "list", "rows": [{"id": "a"}]})).layout(),
            LayoutKind::List
        );
    }

    #[test]
    fn test_header_template() {
        let column = ColumnSpec {
            id: "ejercicio_actual".into(),
            header: "Actual".into(),
            header_template: Some("Ejercicio {ejercicio_actual}".into()),
            column_type: ColumnType::Number,
        };
        let mut headers = IndexMap::new();
        headers.insert("ejercicio_actual".to_string(), "2024".to_string());
        assert_eq!(column.header_text(&headers), "Ejercicio 2024");
    }

    #[test]
    fn test_from_value_skips_invalid_entries() {
        let (diagnostics, sink) = Diagnostics::collecting();
        let value = json!({
            "tables": {
                "buena": {"marker": "<<Tabla>>"},
                "mala": {"columns": "no es una lista"}
            }
        });
        let cfg = TablesConfig::from_value(&value, &diagnostics);
        assert_eq!(cfg.tables.len(), 1);
        assert!(cfg.tables.contains_key("buena"));
        assert_eq!(sink.count_code(codes::CONFIG_ENTRY_SKIPPED), 1);
    }

    #[test]
    fn test_max_instances_default() {
        assert_eq!(config(json!({})).max_instances(), DEFAULT_MAX_INSTANCES);
        assert_eq!(
            config(json!({"parameters": {"n": {"max": 3}}})).max_instances(),
            3
        );
    }
}
