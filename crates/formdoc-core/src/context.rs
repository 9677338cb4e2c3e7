//! Render context
//!
//! A [`Context`] is an insertion-ordered map from variable name to a
//! JSON-like value. Keys starting with [`RESERVED_PREFIX`] carry engine
//! directives and never reach the document as text.

use serde_json::{Map, Value};

/// Flat mapping of variable (or marker) to value
pub type Context = Map<String, Value>;

/// Prefix of directive keys
pub const RESERVED_PREFIX: char = '_';

/// Directive keys understood by the render pipeline
pub mod keys {
    pub const USE_XML_ENGINE: &str = "_use_xml_engine";
    pub const CONFIG_DIR: &str = "_config_dir";
    pub const TABLE_INPUTS: &str = "_table_inputs";
    pub const SIMPLE_INPUTS: &str = "_simple_inputs";
    pub const CONDITION_INPUTS: &str = "_condition_inputs";
    pub const DOCS_TO_INSERT: &str = "_docs_to_insert";
    pub const TABLE_CONFIG: &str = "_cfg_tab";
    pub const ISSUE_COUNT: &str = "_n_issues";
}

/// Check if a key is an engine directive
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Iterate over the non-directive entries of a context
pub fn document_variables(context: &Context) -> impl Iterator<Item = (&String, &Value)> {
    context.iter().filter(|(k, _)| !is_reserved_key(k))
}

/// Textual form of a value as it should appear in a document
///
/// Integers print without a fraction, whole floats keep one decimal
/// (`2.0`), booleans print as `True`/`False` and null as `None`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => display_float(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(repr_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{}': {}", k, repr_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Quoted form used for nested values inside lists and maps
fn repr_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        other => display_value(other),
    }
}

/// Format a float with at least one decimal place
pub fn display_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Check if a value is null, empty or whitespace-only text
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Interpret a value as a number
///
/// Numeric strings (with optional surrounding whitespace) are accepted,
/// booleans count as 0/1.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Look up a string directive, ignoring non-string values
pub fn str_directive<'a>(context: &'a Context, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("_cfg_tab"));
        assert!(!is_reserved_key("<<Nombre>>"));
        assert!(!is_reserved_key("tipo_opinion"));
    }

    #[test]
    fn test_document_variables_skips_directives() {
        let mut ctx = Context::new();
        ctx.insert("_config_dir".into(), json!("/tmp"));
        ctx.insert("nombre".into(), json!("ACME"));
        let keys: Vec<&String> = document_variables(&ctx).map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["nombre"]);
    }

    #[test]
    fn test_display_value_scalars() {
        assert_eq!(display_value(&json!(2024)), "2024");
        assert_eq!(display_value(&json!(2.0)), "2.0");
        assert_eq!(display_value(&json!(0.1)), "0.1");
        assert_eq!(display_value(&json!(true)), "True");
        assert_eq!(display_value(&Value::Null), "None");
        assert_eq!(display_value(&json!("texto")), "texto");
    }

    #[test]
    fn test_display_value_collections() {
        assert_eq!(display_value(&json!(["a", 1])), "['a', 1]");
        assert_eq!(display_value(&json!({"k": "v"})), "{'k': 'v'}");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("   ")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!("x")));
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(as_number(&json!(3)), Some(3.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&Value::Null), None);
    }
}
