//! Text templates and text clean-up
//!
//! Block templates use Jinja syntax (`{{ var }}`, `{% if %}`) and are
//! rendered with `minijinja` in lenient mode, so an undefined variable
//! renders as nothing.

use std::sync::OnceLock;

use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::context::{is_reserved_key, Context};

/// Template rendering failure
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),
}

/// Jinja-compatible string renderer
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        Self { env }
    }

    /// Render `template` against `context`
    pub fn render_str(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        let ctx = minijinja::Value::from_serialize(context);
        Ok(self.env.render_str(template, ctx)?)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Text clean-up
// ============================================================================

/// Normalize line endings and blank lines
///
/// Lines are right-trimmed, runs of blank lines collapse to one and leading
/// and trailing blank lines are removed.
pub fn clean_blank_lines(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in normalized.split('\n').map(str::trim_end) {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { "" } else { line });
        previous_blank = blank;
    }

    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Clean every text value of a context
///
/// Directive keys are kept as they are, strings go through
/// [`clean_blank_lines`] and null becomes the empty string.
pub fn clean_context_formatting(context: &Context) -> Context {
    context
        .iter()
        .map(|(key, value)| {
            let cleaned = if is_reserved_key(key) {
                value.clone()
            } else {
                match value {
                    Value::String(s) => Value::String(clean_blank_lines(s)),
                    Value::Null => Value::String(String::new()),
                    other => other.clone(),
                }
            };
            (key.clone(), cleaned)
        })
        .collect()
}

// ============================================================================
// Plural markers
// ============================================================================

/// Words written with an optional plural suffix, as (marked, singular, plural)
const PLURAL_WORDS: &[(&str, &str, &str)] = &[
    ("la(s)", "la", "las"),
    ("descrita(s)", "descrita", "descritas"),
    ("indicada(s)", "indicada", "indicadas"),
    ("cuestión(es)", "cuestión", "cuestiones"),
    ("incorrección(es)", "incorrección", "incorrecciones"),
    ("limitación(es)", "limitación", "limitaciones"),
    ("material(es)", "material", "materiales"),
];

struct PluralRule {
    pattern: Regex,
    singular: String,
    plural: String,
}

fn plural_rules() -> &'static [PluralRule] {
    static RULES: OnceLock<Vec<PluralRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut rules = Vec::new();
        let words = PLURAL_WORDS
            .iter()
            .copied()
            .chain(std::iter::once(("una/varias", "una", "varias")));
        for (marked, singular, plural) in words {
            for (marked, singular, plural) in [
                (marked.to_string(), singular.to_string(), plural.to_string()),
                (capitalize(marked), capitalize(singular), capitalize(plural)),
            ] {
                let pattern = format!(r"\b{}", regex::escape(&marked));
                if let Ok(pattern) = Regex::new(&pattern) {
                    rules.push(PluralRule {
                        pattern,
                        singular,
                        plural,
                    });
                }
            }
        }
        rules
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Check if a text contains any plural marker
pub fn has_plural_markers(text: &str) -> bool {
    text.contains("(s)") || text.contains("(es)") || text.contains("una/varias")
}

/// Resolve Spanish singular/plural markers for a count of `n`
///
/// `la(s) cuestión(es)` becomes `la cuestión` for one item and
/// `las cuestiones` otherwise; `una/varias` becomes `una` or `varias`.
pub fn apply_plural_markers(text: &str, n: i64) -> String {
    let mut result = text.to_string();
    for rule in plural_rules() {
        let replacement = if n == 1 { &rule.singular } else { &rule.plural };
        result = rule
            .pattern
            .replace_all(&result, regex::NoExpand(replacement))
            .into_owned();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_render_variables_and_conditionals() {
        let renderer = TemplateRenderer::new();
        let mut ctx = Context::new();
        ctx.insert("entidad".into(), json!("ACME S.A."));
        ctx.insert("consolidadas".into(), json!(true));
        let out = renderer
            .render_str(
                "Hemos auditado {{ entidad }}{% if consolidadas %} y sociedades dependientes{% endif %}.",
                &ctx,
            )
            .unwrap();
        assert_eq!(out, "Hemos auditado ACME S.A. y sociedades dependientes.");
    }

    #[test]
    fn test_render_undefined_is_empty() {
        let renderer = TemplateRenderer::new();
        let out = renderer.render_str("[{{ nada }}]", &Context::new()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_render_syntax_error() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.render_str("{% if %}", &Context::new()).is_err());
    }

    #[test]
    fn test_clean_blank_lines() {
        let text = "\r\n\n  \nPrimero   \r\n\n\n\nSegundo\n\n";
        assert_eq!(clean_blank_lines(text), "Primero\n\nSegundo");
        assert_eq!(clean_blank_lines(""), "");
        assert_eq!(clean_blank_lines("\n\n"), "");
    }

    #[test]
    fn test_clean_context_formatting() {
        let mut ctx = Context::new();
        ctx.insert("_config_dir".into(), json!("  keep  \n\n\n"));
        ctx.insert("texto".into(), json!("a\n\n\nb  "));
        ctx.insert("nulo".into(), Value::Null);
        ctx.insert("numero".into(), json!(3));
        let cleaned = clean_context_formatting(&ctx);
        assert_eq!(cleaned["_config_dir"], json!("  keep  \n\n\n"));
        assert_eq!(cleaned["texto"], json!("a\n\nb"));
        assert_eq!(cleaned["nulo"], json!(""));
        assert_eq!(cleaned["numero"], json!(3));
    }

    #[test]
    fn test_plural_markers_singular_and_plural() {
        let text = "la(s) cuestión(es) descrita(s) y una/varias incorrección(es) material(es)";
        assert_eq!(
            apply_plural_markers(text, 1),
            "la cuestión descrita y una incorrección material"
        );
        assert_eq!(
            apply_plural_markers(text, 3),
            "las cuestiones descritas y varias incorrecciones materiales"
        );
    }

    #[test]
    fn test_plural_markers_capitalized() {
        assert_eq!(
            apply_plural_markers("Una/varias limitación(es) al alcance. La(s) indicada(s).", 2),
            "Varias limitaciones al alcance. Las indicadas."
        );
    }

    #[test]
    fn test_has_plural_markers() {
        assert!(has_plural_markers("la(s)"));
        assert!(!has_plural_markers("sin marcas"));
    }
}
