//! Form answer helpers: field visibility, validation and normalization

use serde_json::Value;

use crate::conditions::evaluate_condition;
use crate::context::{as_number, display_float, Context};
use crate::diagnostics::Diagnostics;
use crate::schema::{Field, FieldKind};

/// Decide whether a field is shown for the current answers
///
/// Computed fields are never shown. `condicion_padre` takes precedence over
/// `dependencia`; a field with neither is visible.
pub fn field_visible(field: &Field, context: &Context, diagnostics: &Diagnostics) -> bool {
    if field.calculado {
        return false;
    }
    if let Some(condition) = field.condicion_padre.as_deref().filter(|c| !c.is_empty()) {
        return evaluate_condition(condition, context, diagnostics);
    }
    if let Some(dependency) = &field.dependencia {
        let parent = context.get(&dependency.variable).and_then(Value::as_str);
        if let Some(valor) = dependency.valor.as_deref().filter(|v| !v.is_empty()) {
            return parent == Some(valor);
        }
        if let Some(valor_no) = dependency.valor_no.as_deref().filter(|v| !v.is_empty()) {
            return parent != Some(valor_no);
        }
    }
    true
}

/// Validate answers against field definitions
///
/// Returns whether the data is valid and every problem found, in field
/// order.
pub fn validate_form_data(fields: &[Field], data: &Context) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    for field in fields {
        let Some(value) = data.get(&field.id) else {
            if field.requerido {
                errors.push(format!("Campo requerido faltante: {}", field.label));
            }
            continue;
        };

        match field.kind {
            FieldKind::Numero => match as_number(value) {
                Some(number) => {
                    if let Some(min) = field.min.filter(|min| number < *min) {
                        errors.push(format!(
                            "{}: valor mínimo es {}",
                            field.label,
                            display_float(min)
                        ));
                    }
                    if let Some(max) = field.max.filter(|max| number > *max) {
                        errors.push(format!(
                            "{}: valor máximo es {}",
                            field.label,
                            display_float(max)
                        ));
                    }
                }
                None => errors.push(format!("{}: debe ser un número", field.label)),
            },
            FieldKind::Lista if !field.options().is_empty() => {
                let listed = value
                    .as_str()
                    .is_some_and(|v| field.options().iter().any(|o| o == v));
                if !listed {
                    errors.push(format!("{}: valor no válido", field.label));
                }
            }
            _ => {}
        }
    }

    (errors.is_empty(), errors)
}

const YES: [&str; 8] = ["SI", "SÍ", "S", "YES", "Y", "TRUE", "T", "1"];
const NO: [&str; 5] = ["NO", "N", "FALSE", "F", "0"];

/// Map the usual spellings of yes/no to `sí`/`no`
///
/// Anything else comes back trimmed.
pub fn normalize_boolean_value(value: &str) -> String {
    let trimmed = value.trim();
    let upper = trimmed.to_uppercase();
    if YES.contains(&upper.as_str()) {
        "sí".to_string()
    } else if NO.contains(&upper.as_str()) {
        "no".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase, strip Spanish accents and replace spaces with `_`
pub fn normalize_variable_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            ' ' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(yaml: &str) -> Field {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn context(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_visibility_rules() {
        let diagnostics = Diagnostics::default();
        let ctx = context(json!({"tipo_opinion": "salvedades"}));

        let computed = field("id: a\nnombre: A\ncalculado: true\n");
        assert!(!field_visible(&computed, &ctx, &diagnostics));

        let by_condition = field("id: a\nnombre: A\ncondicion_padre: tipo_opinion == 'favorable'\n");
        assert!(!field_visible(&by_condition, &ctx, &diagnostics));

        let by_value = field("id: a\nnombre: A\ndependencia:\n  variable: tipo_opinion\n  valor: salvedades\n");
        assert!(field_visible(&by_value, &ctx, &diagnostics));

        let by_not_value = field("id: a\nnombre: A\ndependencia:\n  variable: tipo_opinion\n  valor_no: salvedades\n");
        assert!(!field_visible(&by_not_value, &ctx, &diagnostics));

        assert!(field_visible(&field("id: a\nnombre: A\n"), &ctx, &diagnostics));
    }

    #[test]
    fn test_validate_form_data() {
        let fields = vec![
            field("id: empresa\nnombre: Empresa\nrequerido: true\n"),
            field("id: importe\nnombre: Importe\ntipo: numero\nmin: 0\nmax: 100\n"),
            field("id: plazo\nnombre: Plazo\ntipo: numero\n"),
            field("id: tipo\nnombre: Tipo\ntipo: lista\nopciones: [A, B]\n"),
        ];
        let data = context(json!({"importe": "150", "plazo": "pronto", "tipo": "C"}));
        let (valid, errors) = validate_form_data(&fields, &data);
        assert!(!valid);
        assert_eq!(
            errors,
            vec![
                "Campo requerido faltante: Empresa",
                "Importe: valor máximo es 100.0",
                "Plazo: debe ser un número",
                "Tipo: valor no válido",
            ]
        );

        let data = context(json!({"empresa": "ACME", "importe": 5, "tipo": "A"}));
        assert_eq!(validate_form_data(&fields, &data), (true, vec![]));
    }

    #[test]
    fn test_normalize_boolean_value() {
        assert_eq!(normalize_boolean_value("SI"), "sí");
        assert_eq!(normalize_boolean_value(" sí "), "sí");
        assert_eq!(normalize_boolean_value("true"), "sí");
        assert_eq!(normalize_boolean_value("0"), "no");
        assert_eq!(normalize_boolean_value("No"), "no");
        assert_eq!(normalize_boolean_value(" quizá "), "quizá");
    }

    #[test]
    fn test_normalize_variable_name() {
        assert_eq!(normalize_variable_name("Comisión"), "comision");
        assert_eq!(
            normalize_variable_name("Órgano de Administración"),
            "organo_de_administracion"
        );
    }
}
