//! Table data builder
//!
//! Turns raw table inputs into ready-to-render tables keyed by the marker
//! each table replaces.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::model::{ColumnSpec, FooterKind, LayoutKind, Row, TableConfig, TablesConfig};
use crate::context::{as_number, display_value, is_blank, Context};
use crate::diagnostics::{codes, Diagnostics};

const DEFAULT_CURRENT_YEAR: &str = "2023";
const DEFAULT_PREVIOUS_YEAR: &str = "2022";

static NULL: Value = Value::Null;

/// A table ready to be rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltTable {
    pub table_id: String,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
    pub footer_rows: Vec<Row>,
    /// Values for `{key}` placeholders in column header templates
    pub headers: IndexMap<String, String>,
}

impl BuiltTable {
    fn new(table_id: impl Into<String>, config: &TableConfig, rows: Vec<Row>) -> Self {
        Self {
            table_id: table_id.into(),
            columns: config.columns.clone(),
            rows,
            footer_rows: Vec::new(),
            headers: IndexMap::new(),
        }
    }
}

/// Builds every configured table from the table inputs
pub struct TableBuilder<'a> {
    config: &'a TablesConfig,
    simple_inputs: &'a Context,
    diagnostics: Diagnostics,
}

impl<'a> TableBuilder<'a> {
    pub fn new(config: &'a TablesConfig, simple_inputs: &'a Context) -> Self {
        Self {
            config,
            simple_inputs,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Build all tables, keyed by marker, in configuration order
    pub fn build_all(&self, table_inputs: &Context) -> IndexMap<String, BuiltTable> {
        let mut built = IndexMap::new();
        for (table_id, config) in &self.config.tables {
            let layout = config.layout();
            if layout == LayoutKind::PerInstance {
                built.extend(self.build_per_instance(table_id, config, table_inputs));
                continue;
            }

            let Some(marker) = config.marker.clone() else {
                self.diagnostics.warning(
                    codes::CONFIG_ENTRY_SKIPPED,
                    format!("table '{}' has no marker, skipped", table_id),
                );
                continue;
            };
            let data = table_inputs.get(table_id.as_str()).unwrap_or(&NULL);
            let table = match layout {
                LayoutKind::FixedRows => self.build_fixed_rows(table_id, config, data),
                LayoutKind::Comparative => self.build_comparative(table_id, config, data),
                LayoutKind::Totals => self.build_totals(table_id, config, data),
                LayoutKind::List => BuiltTable::new(table_id.as_str(), config, object_rows(data)),
                LayoutKind::PerInstance => continue,
            };
            built.insert(marker, table);
        }
        built
    }

    fn build_fixed_rows(&self, table_id: &str, config: &TableConfig, data: &Value) -> BuiltTable {
        let rows = config
            .rows
            .iter()
            .map(|row_spec| {
                let mut row = Row::new();
                row.insert("label".into(), Value::String(row_spec.label.clone()));
                for column in &config.columns {
                    let value = data
                        .get(&row_spec.id)
                        .and_then(|r| r.get(&column.id))
                        .cloned()
                        .unwrap_or_else(empty);
                    row.insert(column.id.clone(), value);
                }
                row
            })
            .collect();
        BuiltTable::new(table_id, config, rows)
    }

    fn build_per_instance(
        &self,
        table_id: &str,
        config: &TableConfig,
        table_inputs: &Context,
    ) -> Vec<(String, BuiltTable)> {
        let Some(pattern) = &config.marker_pattern else {
            return Vec::new();
        };
        let mut tables = Vec::new();
        for n in 1..=config.max_instances() {
            let instance_id = format!("{}_{}", table_id, n);
            let data = match table_inputs.get(&instance_id) {
                Some(data) if is_truthy(data) => data,
                _ => continue,
            };

            let rows = config
                .rows
                .iter()
                .map(|row_spec| {
                    let mut row = Row::new();
                    row.insert("label".into(), Value::String(row_spec.id.clone()));
                    for column in &config.columns {
                        let value = data.get(&column.id).cloned().unwrap_or_else(empty);
                        row.insert(column.id.clone(), value);
                    }
                    row
                })
                .collect();

            let marker = pattern.replace("{n}", &n.to_string());
            tables.push((marker, BuiltTable::new(instance_id, config, rows)));
        }
        tables
    }

    fn build_comparative(&self, table_id: &str, config: &TableConfig, data: &Value) -> BuiltTable {
        let current = self
            .first_input(&["ejercicio_corto", "ejercicio_completo"])
            .unwrap_or_else(|| DEFAULT_CURRENT_YEAR.to_string());
        let previous = self
            .first_input(&["ejercicio_anterior"])
            .unwrap_or_else(|| DEFAULT_PREVIOUS_YEAR.to_string());

        let rows = config
            .rows
            .iter()
            .map(|row_spec| {
                let values = data.get(&row_spec.id);
                let current_value = values
                    .and_then(|v| v.get("ejercicio_actual"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let previous_value = values
                    .and_then(|v| v.get("ejercicio_anterior"))
                    .cloned()
                    .unwrap_or(Value::Null);

                let change = if row_spec.calculate_variacion {
                    variation(&current_value, &previous_value)
                } else {
                    Value::Null
                };

                let mut row = Row::new();
                row.insert("partida".into(), Value::String(row_spec.label.clone()));
                row.insert("ejercicio_actual".into(), current_value);
                row.insert("ejercicio_anterior".into(), previous_value);
                row.insert("variacion".into(), change);
                row
            })
            .collect();

        let mut table = BuiltTable::new(table_id, config, rows);
        table
            .headers
            .insert("ejercicio_actual".into(), extract_year(&current));
        table
            .headers
            .insert("ejercicio_anterior".into(), extract_year(&previous));
        table
    }

    fn build_totals(&self, table_id: &str, config: &TableConfig, data: &Value) -> BuiltTable {
        let mut rows = object_rows(data);
        if config.remove_empty_rows {
            rows.retain(|row| {
                config
                    .columns
                    .iter()
                    .any(|c| row.get(&c.id).is_some_and(|v| !is_blank(v)))
            });
        }

        let label_column = config.columns.first().map(|c| c.id.clone());
        let mut footer_rows = Vec::new();
        for footer in &config.footer_rows {
            let mut footer_row = Row::new();
            if let Some(column) = &label_column {
                footer_row.insert(column.clone(), Value::String(footer.label.clone()));
            }
            match footer.row_type {
                FooterKind::Sum => {
                    for column in &footer.sum_columns {
                        footer_row.insert(column.clone(), column_sum(&rows, column));
                    }
                }
                FooterKind::PercentOfTotal => {
                    for column in footer.target_columns() {
                        footer_row.insert(column.clone(), empty());
                    }
                }
            }
            footer_rows.push(footer_row);
        }

        let mut table = BuiltTable::new(table_id, config, rows);
        table.footer_rows = footer_rows;
        table
    }

    /// First non-blank simple input among `keys`, as text
    fn first_input(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.simple_inputs.get(*key))
            .find(|value| !is_blank(value) && is_truthy(value))
            .map(display_value)
    }
}

fn empty() -> Value {
    Value::String(String::new())
}

/// Python-style truthiness of an input value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Array entries that are objects, as rows
fn object_rows(data: &Value) -> Vec<Row> {
    data.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// `(current - previous) / previous * 100`, null when not computable
fn variation(current: &Value, previous: &Value) -> Value {
    match (as_number(current), as_number(previous)) {
        (Some(current), Some(previous)) if previous != 0.0 => {
            float_value((current - previous) / previous * 100.0)
        }
        _ => Value::Null,
    }
}

/// Sum of a column; numeric strings count, anything else is 0
fn column_sum(rows: &[Row], column: &str) -> Value {
    let mut int_total: i64 = 0;
    let mut float_total = 0.0;
    let mut all_integers = true;
    for value in rows.iter().filter_map(|row| row.get(column)) {
        match value {
            Value::Number(n) if n.is_i64() => {
                let i = n.as_i64().unwrap_or_default();
                int_total = int_total.saturating_add(i);
                float_total += i as f64;
            }
            Value::Bool(b) => {
                int_total += i64::from(*b);
                float_total += f64::from(u8::from(*b));
            }
            other => {
                if let Some(f) = as_number(other) {
                    all_integers = false;
                    float_total += f;
                }
            }
        }
    }
    if all_integers {
        Value::from(int_total)
    } else {
        float_value(float_total)
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// First four-digit number in a text, or the text itself
pub fn extract_year(text: &str) -> String {
    static YEAR: OnceLock<Option<Regex>> = OnceLock::new();
    let year = YEAR.get_or_init(|| Regex::new(r"\d{4}").ok());
    year.as_ref()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| text.to_string())
}

/// Convenience for building a row from key/value pairs
pub fn row_from<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect::<Map<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tables(value: Value) -> TablesConfig {
        TablesConfig::from_value(&json!({ "tables": value }), &Diagnostics::default())
    }

    fn inputs(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_fixed_rows() {
        let cfg = tables(json!({
            "analisis_indirecto_global": {
                "marker": "<<Tabla global>>",
                "columns": [{"id": "importe", "header": "Importe", "type": "number"}],
                "rows": [{"id": "ventas", "label": "Ventas"}, {"id": "costes", "label": "Costes"}]
            }
        }));
        let simple = Context::new();
        let built = TableBuilder::new(&cfg, &simple).build_all(&inputs(json!({
            "analisis_indirecto_global": {"ventas": {"importe": 100}}
        })));
        let table = &built["<<Tabla global>>"];
        assert_eq!(table.rows[0]["label"], json!("Ventas"));
        assert_eq!(table.rows[0]["importe"], json!(100));
        assert_eq!(table.rows[1]["importe"], json!(""));
    }

    #[test]
    fn test_per_instance_skips_missing_data() {
        let cfg = tables(json!({
            "analisis_indirecto_operacion": {
                "marker_pattern": "<<Tabla operacion {n}>>",
                "parameters": {"n": {"max": 3}},
                "columns": [{"id": "nombre_operacion"}],
                "rows": [{"id": "margen"}]
            }
        }));
        let simple = Context::new();
        let built = TableBuilder::new(&cfg, &simple).build_all(&inputs(json!({
            "analisis_indirecto_operacion_2": {"nombre_operacion": "Servicios"},
            "analisis_indirecto_operacion_3": {}
        })));
        assert_eq!(built.len(), 1);
        let table = &built["<<Tabla operacion 2>>"];
        assert_eq!(table.table_id, "analisis_indirecto_operacion_2");
        assert_eq!(table.rows[0]["label"], json!("margen"));
        assert_eq!(table.rows[0]["nombre_operacion"], json!("Servicios"));
    }

    #[test]
    fn test_comparative_headers_and_variation() {
        let cfg = tables(json!({
            "partidas_contables": {
                "marker": "<<Partidas>>",
                "rows": [
                    {"id": "ingresos", "label": "Ingresos", "calculate_variacion": true},
                    {"id": "gastos", "label": "Gastos", "calculate_variacion": true},
                    {"id": "otros", "label": "Otros"}
                ]
            }
        }));
        let simple = inputs(json!({"ejercicio_corto": "Ejercicio 2024", "ejercicio_anterior": ""}));
        let built = TableBuilder::new(&cfg, &simple).build_all(&inputs(json!({
            "partidas_contables": {
                "ingresos": {"ejercicio_actual": 150, "ejercicio_anterior": 100},
                "gastos": {"ejercicio_actual": 50, "ejercicio_anterior": 0},
                "otros": {"ejercicio_actual": 1, "ejercicio_anterior": 2}
            }
        })));
        let table = &built["<<Partidas>>"];
        assert_eq!(table.headers["ejercicio_actual"], "2024");
        assert_eq!(table.headers["ejercicio_anterior"], "2022");
        assert_eq!(table.rows[0]["partida"], json!("Ingresos"));
        assert_eq!(table.rows[0]["variacion"], json!(50.0));
        assert_eq!(table.rows[1]["variacion"], Value::Null);
        assert_eq!(table.rows[2]["variacion"], Value::Null);
    }

    #[test]
    fn test_totals_with_sum_footer() {
        let cfg = tables(json!({
            "operaciones_vinculadas": {
                "marker": "<<Operaciones>>",
                "remove_empty_rows": true,
                "columns": [{"id": "tipo_operacion"}, {"id": "importe", "type": "number"}],
                "footer_rows": [
                    {"row_type": "sum", "label": "Total", "sum_columns": ["importe"]},
                    {"row_type": "percent_of_total", "label": "Peso", "columns": ["importe"]}
                ]
            }
        }));
        let simple = Context::new();
        let built = TableBuilder::new(&cfg, &simple).build_all(&inputs(json!({
            "operaciones_vinculadas": [
                {"tipo_operacion": "Venta", "importe": 100},
                {"tipo_operacion": "", "importe": ""},
                {"tipo_operacion": "Compra", "importe": "50.5"},
                {"tipo_operacion": "Otro", "importe": "n/a"}
            ]
        })));
        let table = &built["<<Operaciones>>"];
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.footer_rows[0]["tipo_operacion"], json!("Total"));
        assert_eq!(table.footer_rows[0]["importe"], json!(150.5));
        assert_eq!(table.footer_rows[1]["tipo_operacion"], json!("Peso"));
        assert_eq!(table.footer_rows[1]["importe"], json!(""));
    }

    #[test]
    fn test_list_passthrough_and_missing_marker() {
        let (diagnostics, sink) = Diagnostics::collecting();
        let cfg = tables(json!({
            "riesgos_pt": {"marker": "<<Riesgos>>", "columns": [{"id": "riesgo"}]},
            "sin_marcador": {"columns": [{"id": "x"}]}
        }));
        let simple = Context::new();
        let built = TableBuilder::new(&cfg, &simple)
            .with_diagnostics(diagnostics)
            .build_all(&inputs(json!({"riesgos_pt": [{"riesgo": "Alto"}, "ignorado"]})));
        assert_eq!(built.len(), 1);
        assert_eq!(built["<<Riesgos>>"].rows, vec![row_from([("riesgo", json!("Alto"))])]);
        assert_eq!(sink.count_code(codes::CONFIG_ENTRY_SKIPPED), 1);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("Ejercicio 2023/2024"), "2023");
        assert_eq!(extract_year("sin año"), "sin año");
    }

    #[test]
    fn test_integer_sum_counts_booleans() {
        let rows = vec![
            row_from([("x", json!(1))]),
            row_from([("x", json!(2))]),
            row_from([("x", json!(true))]),
        ];
        assert_eq!(column_sum(&rows, "x"), json!(4));
    }
}
