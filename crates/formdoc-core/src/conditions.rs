//! Condition evaluation
//!
//! Conditions fail closed: a condition that does not parse or does not
//! evaluate is reported through the diagnostics handle and counts as false.
//! Structured conditions fail open: an unrecognized shape becomes `True`.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::context::{display_value, Context};
use crate::diagnostics::{codes, Diagnostics};
use crate::expr::{self, ExprError};
use crate::schema::{Condition, StructuredCondition};

/// Evaluate a condition to a boolean
///
/// An empty or whitespace-only condition is true.
pub fn evaluate_condition(condition: &str, context: &Context, diagnostics: &Diagnostics) -> bool {
    match try_evaluate(condition, context, diagnostics) {
        Ok(result) => result,
        Err(err) => {
            report_error(condition, &err, diagnostics);
            false
        }
    }
}

fn try_evaluate(
    condition: &str,
    context: &Context,
    diagnostics: &Diagnostics,
) -> Result<bool, ExprError> {
    if condition.trim().is_empty() {
        return Ok(true);
    }
    let parsed = expr::parse_expression(condition.trim())?;
    let value = expr::evaluate(&parsed, context, diagnostics)?;
    Ok(value.is_truthy())
}

fn report_error(condition: &str, err: &ExprError, diagnostics: &Diagnostics) {
    let code = match err {
        ExprError::Syntax { .. } => codes::EXPR_SYNTAX,
        ExprError::Type(_) => codes::EXPR_EVAL,
    };
    diagnostics.error(code, format!("condition '{}': {}", condition, err));
}

/// True if at least one condition holds; false for an empty list
pub fn evaluate_any<S: AsRef<str>>(
    conditions: &[S],
    context: &Context,
    diagnostics: &Diagnostics,
) -> bool {
    conditions
        .iter()
        .any(|c| evaluate_condition(c.as_ref(), context, diagnostics))
}

/// True if every condition holds; true for an empty list
pub fn evaluate_all<S: AsRef<str>>(
    conditions: &[S],
    context: &Context,
    diagnostics: &Diagnostics,
) -> bool {
    conditions
        .iter()
        .all(|c| evaluate_condition(c.as_ref(), context, diagnostics))
}

/// Decide whether a field with an optional dependency condition is shown
pub fn should_show_field(
    field_id: &str,
    dependency: Option<&str>,
    context: &Context,
    diagnostics: &Diagnostics,
) -> bool {
    match dependency {
        Some(condition) if !condition.trim().is_empty() => {
            let shown = evaluate_condition(condition, context, diagnostics);
            diagnostics.debug(format!("field '{}' visible: {}", field_id, shown));
            shown
        }
        _ => true,
    }
}

/// Sorted, unique variable names referenced by an expression
///
/// Empty when the expression does not parse.
pub fn variables_in_expression(condition: &str, diagnostics: &Diagnostics) -> Vec<String> {
    match expr::parse_expression(condition) {
        Ok(parsed) => parsed.variables().into_iter().collect(),
        Err(err) => {
            report_error(condition, &err, diagnostics);
            Vec::new()
        }
    }
}

// ============================================================================
// Structured conditions
// ============================================================================

/// Expression text of a rule condition
pub fn condition_expression<'a>(
    condition: &'a Condition,
    diagnostics: &Diagnostics,
) -> Cow<'a, str> {
    match condition {
        Condition::Expression(text) => Cow::Borrowed(text.as_str()),
        Condition::Structured(structured) => Cow::Owned(build_condition(structured, diagnostics)),
    }
}

/// Convert a structured condition into expression text
pub fn build_condition(condition: &StructuredCondition, diagnostics: &Diagnostics) -> String {
    match condition {
        StructuredCondition::Equal { campo, igual } => format!("{} == {}", campo, literal(igual)),
        StructuredCondition::NotEqual { campo, no_igual } => {
            format!("{} != {}", campo, literal(no_igual))
        }
        StructuredCondition::Greater { campo, mayor } => format!("{} > {}", campo, literal(mayor)),
        StructuredCondition::Less { campo, menor } => format!("{} < {}", campo, literal(menor)),
        StructuredCondition::And { and } => join(and, " and ", diagnostics),
        StructuredCondition::Or { or } => join(or, " or ", diagnostics),
        StructuredCondition::Not { not } => format!("(not {})", build_condition(not, diagnostics)),
        StructuredCondition::Unrecognized(raw) => {
            diagnostics.warning(
                codes::UNKNOWN_CONDITION,
                format!("unrecognized structured condition {}, using True", raw),
            );
            "True".to_string()
        }
    }
}

fn join(parts: &[StructuredCondition], separator: &str, diagnostics: &Diagnostics) -> String {
    let parts: Vec<String> = parts
        .iter()
        .map(|part| build_condition(part, diagnostics))
        .collect();
    format!("({})", parts.join(separator))
}

/// Literal text for a value: strings quoted, everything else bare
fn literal(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        other => display_value(other),
    }
}

// ============================================================================
// Debugging
// ============================================================================

/// Evaluation trace of a single condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionDebug {
    pub condition: String,
    pub is_valid: bool,
    pub variables_used: Vec<String>,
    pub result: bool,
    pub error: Option<String>,
}

/// Evaluate a condition and report what happened
pub fn debug_condition(
    condition: &str,
    context: &Context,
    diagnostics: &Diagnostics,
) -> ConditionDebug {
    let (result, error) = match try_evaluate(condition, context, diagnostics) {
        Ok(result) => (result, None),
        Err(err) => (false, Some(err.to_string())),
    };
    let variables_used = match expr::parse_expression(condition) {
        Ok(parsed) => parsed.variables().into_iter().collect(),
        Err(_) => Vec::new(),
    };
    ConditionDebug {
        condition: condition.to_string(),
        is_valid: expr::is_valid_expression(condition),
        variables_used,
        result,
        error,
    }
}
