//! Row helpers: templates, conversion, filtering, sorting, aggregation, export

use std::cmp::Ordering;
use std::str::FromStr;

use serde_json::Value;

use super::model::Row;
use crate::conditions::evaluate_condition;
use crate::context::{as_number, display_value};
use crate::diagnostics::{codes, Diagnostics};
use crate::schema::{ColumnKind, TableDefinition};

/// A row with the default value of every column
///
/// Numbers start at 0, lists at their first option, everything else empty.
pub fn create_empty_row(definition: &TableDefinition) -> Row {
    definition
        .columnas
        .iter()
        .map(|column| {
            let value = match column.tipo {
                ColumnKind::Numero => Value::from(0),
                ColumnKind::Lista => column
                    .opciones
                    .as_ref()
                    .and_then(|o| o.first())
                    .map(|o| Value::String(o.clone()))
                    .unwrap_or_else(|| Value::String(String::new())),
                _ => Value::String(String::new()),
            };
            (column.id.clone(), value)
        })
        .collect()
}

/// `count` empty rows
pub fn create_table_template(definition: &TableDefinition, count: usize) -> Vec<Row> {
    (0..count).map(|_| create_empty_row(definition)).collect()
}

/// Positional rows to keyed records; rows of the wrong width are skipped
pub fn rows_to_records(
    rows: &[Vec<Value>],
    column_ids: &[String],
    diagnostics: &Diagnostics,
) -> Vec<Row> {
    rows.iter()
        .filter_map(|row| {
            if row.len() != column_ids.len() {
                diagnostics.warning(
                    codes::TABLE_ROW_SKIPPED,
                    format!(
                        "row has {} cells, expected {}; skipped",
                        row.len(),
                        column_ids.len()
                    ),
                );
                return None;
            }
            Some(
                column_ids
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect(),
            )
        })
        .collect()
}

/// Keyed records to positional rows, missing cells as `""`
pub fn records_to_rows(records: &[Row], column_ids: &[String]) -> Vec<Vec<Value>> {
    records
        .iter()
        .map(|record| {
            column_ids
                .iter()
                .map(|id| {
                    record
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new()))
                })
                .collect()
        })
        .collect()
}

/// Rows for which `condition` holds, each row serving as the context
pub fn filter_rows(rows: &[Row], condition: &str, diagnostics: &Diagnostics) -> Vec<Row> {
    rows.iter()
        .filter(|row| evaluate_condition(condition, row, diagnostics))
        .cloned()
        .collect()
}

/// Stable sort by one column; rows come back unchanged if the column mixes
/// numbers and text
pub fn sort_rows(rows: &[Row], column: &str, descending: bool) -> Vec<Row> {
    let empty = Value::String(String::new());
    let key = |row: &Row| row.get(column).cloned().unwrap_or_else(|| empty.clone());

    let keys: Vec<Value> = rows.iter().map(key).collect();
    let all_numbers = keys.iter().all(|k| k.is_number() || k.is_boolean());
    let all_strings = keys.iter().all(Value::is_string);
    if !all_numbers && !all_strings {
        return rows.to_vec();
    }

    let mut indexed: Vec<(Value, &Row)> = keys.into_iter().zip(rows).collect();
    indexed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_keys(a, b);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    indexed.into_iter().map(|(_, row)| row.clone()).collect()
}

fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => {
            let a = as_number(a).unwrap_or(f64::NAN);
            let b = as_number(b).unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

/// Column aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Aggregate::Sum),
            "avg" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "count" => Ok(Aggregate::Count),
            other => Err(format!("unknown aggregation '{}'", other)),
        }
    }
}

/// Aggregate the numeric cells of a column; `None` when there are none
pub fn aggregate_column(rows: &[Row], column: &str, op: Aggregate) -> Option<f64> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_null())
        .filter_map(as_number)
        .collect();
    if values.is_empty() {
        return None;
    }
    let result = match op {
        Aggregate::Sum => values.iter().sum(),
        Aggregate::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregate::Count => values.len() as f64,
    };
    Some(result)
}

// ============================================================================
// Export
// ============================================================================

fn cell_text(row: &Row, column: &str) -> String {
    row.get(column).map(display_value).unwrap_or_default()
}

/// Markdown table with the column names as header
pub fn to_markdown(definition: &TableDefinition, rows: &[Row]) -> String {
    let headers: Vec<&str> = definition.columnas.iter().map(|c| c.nombre.as_str()).collect();
    let mut lines = vec![
        format!("| {} |", headers.join(" | ")),
        format!("| {} |", vec!["---"; headers.len()].join(" | ")),
    ];
    for row in rows {
        let cells: Vec<String> = definition
            .columnas
            .iter()
            .map(|c| cell_text(row, &c.id))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// HTML table; header and cell text is escaped
pub fn to_html(definition: &TableDefinition, rows: &[Row]) -> String {
    let mut html = String::from("<table>\n  <thead>\n    <tr>\n");
    for column in &definition.columnas {
        html.push_str(&format!("      <th>{}</th>\n", escape_html(&column.nombre)));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in rows {
        html.push_str("    <tr>\n");
        for column in &definition.columnas {
            html.push_str(&format!(
                "      <td>{}</td>\n",
                escape_html(&cell_text(row, &column.id))
            ));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::row_from;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn definition() -> TableDefinition {
        serde_yaml::from_str(
            r#"
id: ops
nombre: Operaciones
columnas:
  - id: nombre
    nombre: Nombre
    tipo: texto
  - id: importe
    nombre: Importe
    tipo: numero
  - id: tipo
    nombre: Tipo
    tipo: lista
    opciones: [Venta, Compra]
"#,
        )
        .unwrap()
    }

    fn rows() -> Vec<Row> {
        vec![
            row_from([("nombre", json!("b")), ("importe", json!(20))]),
            row_from([("nombre", json!("a")), ("importe", json!("5"))]),
            row_from([("nombre", json!("c")), ("importe", json!("n/a"))]),
        ]
    }

    #[test]
    fn test_empty_row_defaults() {
        let row = create_empty_row(&definition());
        assert_eq!(row["nombre"], json!(""));
        assert_eq!(row["importe"], json!(0));
        assert_eq!(row["tipo"], json!("Venta"));
        assert_eq!(create_table_template(&definition(), 3).len(), 3);
    }

    #[test]
    fn test_record_conversion() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let (diagnostics, sink) = Diagnostics::collecting();
        let records = rows_to_records(
            &[vec![json!(1), json!(2)], vec![json!(3)]],
            &ids,
            &diagnostics,
        );
        assert_eq!(records, vec![row_from([("a", json!(1)), ("b", json!(2))])]);
        assert_eq!(sink.count_code(codes::TABLE_ROW_SKIPPED), 1);

        let back = records_to_rows(&[row_from([("b", json!("x"))])], &ids);
        assert_eq!(back, vec![vec![json!(""), json!("x")]]);
    }

    #[test]
    fn test_filter_rows() {
        let diagnostics = Diagnostics::default();
        let filtered = filter_rows(&rows(), "nombre in ['a', 'c']", &diagnostics);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_sort_rows() {
        let sorted = sort_rows(&rows(), "nombre", true);
        let names: Vec<String> = sorted.iter().map(|r| cell_text(r, "nombre")).collect();
        assert_eq!(names, vec!["c", "b", "a"]);

        // Mixed kinds leave the order untouched
        let unsorted = sort_rows(&rows(), "importe", false);
        assert_eq!(unsorted, rows());
    }

    #[test]
    fn test_aggregate_ignores_non_numeric() {
        assert_eq!(aggregate_column(&rows(), "importe", Aggregate::Sum), Some(25.0));
        assert_eq!(aggregate_column(&rows(), "importe", Aggregate::Avg), Some(12.5));
        assert_eq!(aggregate_column(&rows(), "importe", Aggregate::Min), Some(5.0));
        assert_eq!(aggregate_column(&rows(), "importe", Aggregate::Count), Some(2.0));
        assert_eq!(aggregate_column(&rows(), "falta", Aggregate::Max), None);
        assert_eq!("avg".parse::<Aggregate>(), Ok(Aggregate::Avg));
        assert!("median".parse::<Aggregate>().is_err());
    }

    #[test]
    fn test_markdown_and_html() {
        let rows = vec![row_from([("nombre", json!("<b>&")), ("importe", json!(1.5))])];
        assert_eq!(
            to_markdown(&definition(), &rows),
            "| Nombre | Importe | Tipo |\n| --- | --- | --- |\n| <b>& | 1.5 |  |"
        );
        let html = to_html(&definition(), &rows);
        assert!(html.contains("<td>&lt;b&gt;&amp;</td>"));
        assert!(html.contains("<th>Importe</th>"));
    }
}
