//! Row data validation against a table definition

use serde_json::Value;

use super::model::Row;
use crate::context::display_value;
use crate::schema::{ColumnKind, TableColumn, TableDefinition};

/// Validate rows against a definition; never fails, returns the messages
pub fn validate_table_data(definition: &TableDefinition, rows: &[Row]) -> (bool, Vec<String>) {
    let mut errors = Vec::new();
    let count = rows.len();

    if count < definition.min_filas {
        errors.push(format!(
            "Tabla '{}': se requieren al menos {} filas, pero solo hay {}",
            definition.id, definition.min_filas, count
        ));
    }
    if let Some(max) = definition.max_filas.filter(|max| *max > 0) {
        if count > max {
            errors.push(format!(
                "Tabla '{}': máximo {} filas permitidas, pero hay {}",
                definition.id, max, count
            ));
        }
    }

    for (index, row) in rows.iter().enumerate() {
        errors.extend(validate_table_row(definition, row, index));
    }

    (errors.is_empty(), errors)
}

/// Messages for one row; `index` is zero-based, messages count from 1
pub fn validate_table_row(definition: &TableDefinition, row: &Row, index: usize) -> Vec<String> {
    let mut errors = Vec::new();
    for column in &definition.columnas {
        let Some(value) = row.get(&column.id) else {
            if column.requerido {
                errors.push(format!(
                    "Tabla '{}', fila {}: falta columna requerida '{}'",
                    definition.id,
                    index + 1,
                    column.nombre
                ));
            }
            continue;
        };
        if let Some(error) = validate_column_value(column, value) {
            errors.push(format!(
                "Tabla '{}', fila {}: {}",
                definition.id,
                index + 1,
                error
            ));
        }
    }
    errors
}

fn validate_column_value(column: &TableColumn, value: &Value) -> Option<String> {
    match column.tipo {
        ColumnKind::Numero if !is_numeric(value) => Some(format!(
            "Columna '{}' debe ser numérica, pero es '{}'",
            column.nombre,
            display_value(value)
        )),
        ColumnKind::Lista => {
            let options = column.opciones.as_deref().unwrap_or_default();
            let listed = value
                .as_str()
                .is_some_and(|v| options.iter().any(|o| o == v));
            if options.is_empty() || listed {
                None
            } else {
                Some(format!(
                    "Columna '{}' debe ser una de {}, pero es '{}'",
                    column.nombre,
                    display_value(&Value::from(options.to_vec())),
                    display_value(value)
                ))
            }
        }
        _ => None,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Bool(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}
