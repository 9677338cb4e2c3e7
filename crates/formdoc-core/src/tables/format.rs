//! Cell value formatting

use serde_json::Value;

use super::model::ColumnType;
use crate::context::display_value;

/// Format a cell for a column type
///
/// Null and `""` format as empty. A value that does not fit the column
/// type falls back to its display form.
pub fn format_cell(value: &Value, column_type: ColumnType) -> String {
    match value {
        Value::Null => return String::new(),
        Value::String(s) if s.is_empty() => return String::new(),
        _ => {}
    }

    let formatted = match column_type {
        ColumnType::Percent => {
            let number = match value {
                Value::String(s) => s.replace('%', "").trim().parse::<f64>().ok(),
                other => number_of(other),
            };
            number.map(|n| format!("{:.2}%", n))
        }
        ColumnType::Number => number_of(value).map(|n| group_thousands(n, 2)),
        ColumnType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| format!("{}", f.trunc()))),
            Value::Bool(b) => Some(i64::from(*b).to_string()),
            Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i.to_string()),
            _ => None,
        },
        ColumnType::Text => None,
    };

    formatted.unwrap_or_else(|| display_value(value))
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// `1234567.891` with 2 decimals becomes `1,234,567.89`
pub fn group_thousands(number: f64, decimals: usize) -> String {
    if !number.is_finite() {
        return number.to_string();
    }
    let fixed = format!("{:.*}", decimals, number.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(fixed.len() + digits.len() / 3 + 1);
    if number < 0.0 {
        grouped.push('-');
    }
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_format() {
        assert_eq!(format_cell(&json!(1234567.891), ColumnType::Number), "1,234,567.89");
        assert_eq!(format_cell(&json!(-1500), ColumnType::Number), "-1,500.00");
        assert_eq!(format_cell(&json!("999.5"), ColumnType::Number), "999.50");
        assert_eq!(format_cell(&json!(0), ColumnType::Number), "0.00");
    }

    #[test]
    fn test_percent_format() {
        assert_eq!(format_cell(&json!("12.5%"), ColumnType::Percent), "12.50%");
        assert_eq!(format_cell(&json!(3), ColumnType::Percent), "3.00%");
    }

    #[test]
    fn test_integer_format() {
        assert_eq!(format_cell(&json!(12.9), ColumnType::Integer), "12");
        assert_eq!(format_cell(&json!(" 7 "), ColumnType::Integer), "7");
        assert_eq!(format_cell(&json!("7.5"), ColumnType::Integer), "7.5");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(format_cell(&json!("n/a"), ColumnType::Number), "n/a");
        assert_eq!(format_cell(&Value::Null, ColumnType::Number), "");
        assert_eq!(format_cell(&json!(""), ColumnType::Percent), "");
        assert_eq!(format_cell(&json!(2.0), ColumnType::Text), "2.0");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(100.0, 2), "100.00");
        assert_eq!(group_thousands(1000.0, 0), "1,000");
        assert_eq!(group_thousands(123456.0, 2), "123,456.00");
    }
}
