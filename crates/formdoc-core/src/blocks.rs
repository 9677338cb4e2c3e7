//! Conditional text blocks
//!
//! A block is a priority list of rules. Rules are tried in order and the
//! first whose condition holds supplies the block's template; a block with
//! no matching rule resolves to the empty string.

use indexmap::IndexMap;

use crate::conditions::{condition_expression, evaluate_condition};
use crate::context::Context;
use crate::diagnostics::{codes, Diagnostics};
use crate::schema::BlockDefinition;
use crate::template::TemplateRenderer;

/// Template of the first rule whose condition holds
pub fn resolve_block<'a>(
    block: &'a BlockDefinition,
    context: &Context,
    diagnostics: &Diagnostics,
) -> Option<&'a str> {
    for rule in &block.reglas {
        let condition = condition_expression(&rule.cuando, diagnostics);
        if evaluate_condition(&condition, context, diagnostics) {
            diagnostics.debug(format!("block '{}': '{}' matched", block.id, condition));
            return Some(rule.plantilla.as_str());
        }
    }
    diagnostics.debug(format!("block '{}': no rule matched", block.id));
    None
}

/// Unrendered template of every block, `""` for blocks with no match
pub fn resolve_all_blocks(
    blocks: &[BlockDefinition],
    context: &Context,
    diagnostics: &Diagnostics,
) -> IndexMap<String, String> {
    blocks
        .iter()
        .map(|block| {
            let template = resolve_block(block, context, diagnostics).unwrap_or_default();
            (block.id.clone(), template.to_string())
        })
        .collect()
}

/// Resolves blocks and renders the winning templates
pub struct BlockProcessor {
    blocks: Vec<BlockDefinition>,
    renderer: TemplateRenderer,
    diagnostics: Diagnostics,
}

impl BlockProcessor {
    pub fn new(blocks: Vec<BlockDefinition>, diagnostics: Diagnostics) -> Self {
        Self {
            blocks,
            renderer: TemplateRenderer::new(),
            diagnostics,
        }
    }

    pub fn blocks(&self) -> &[BlockDefinition] {
        &self.blocks
    }

    /// Find a block by id
    pub fn block(&self, id: &str) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Matching template of the block `id`, unrendered
    pub fn winning_template(&self, id: &str, context: &Context) -> Option<&str> {
        self.block(id)
            .and_then(|block| resolve_block(block, context, &self.diagnostics))
    }

    /// Render a template, trimmed; a failure renders as `""`
    pub fn render(&self, template: &str, context: &Context) -> String {
        match self.renderer.render_str(template, context) {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                self.diagnostics
                    .error(codes::TEMPLATE_RENDER, format!("rendering template: {}", err));
                String::new()
            }
        }
    }

    /// Rendered text of one block
    pub fn process_block(&self, block: &BlockDefinition, context: &Context) -> String {
        match resolve_block(block, context, &self.diagnostics) {
            Some(template) => self.render(template, context),
            None => String::new(),
        }
    }

    /// Rendered text of every block, keyed by block id
    pub fn process_all(&self, context: &Context) -> IndexMap<String, String> {
        self.blocks
            .iter()
            .map(|block| (block.id.clone(), self.process_block(block, context)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Condition, Rule};
    use serde_json::json;

    fn rule(cuando: &str, plantilla: &str) -> Rule {
        Rule {
            cuando: Condition::Expression(cuando.to_string()),
            plantilla: plantilla.to_string(),
        }
    }

    fn opinion_block() -> BlockDefinition {
        BlockDefinition {
            id: "parrafo_opinion".into(),
            descripcion: None,
            reglas: vec![
                rule("tipo_opinion == 'favorable'", "En nuestra opinión, {{ entidad }} ..."),
                rule("tipo_opinion == 'salvedades'", "Excepto por ..."),
                rule("True", "Fallback"),
            ],
        }
    }

    fn ctx(opinion: &str) -> Context {
        let mut ctx = Context::new();
        ctx.insert("tipo_opinion".into(), json!(opinion));
        ctx.insert("entidad".into(), json!("ACME"));
        ctx
    }

    #[test]
    fn test_first_match_wins() {
        let block = BlockDefinition {
            id: "b".into(),
            descripcion: None,
            reglas: vec![rule("True", "primero"), rule("True", "segundo")],
        };
        let diagnostics = Diagnostics::default();
        assert_eq!(
            resolve_block(&block, &Context::new(), &diagnostics),
            Some("primero")
        );
    }

    #[test]
    fn test_fallback_rule() {
        let diagnostics = Diagnostics::default();
        assert_eq!(
            resolve_block(&opinion_block(), &ctx("denegada"), &diagnostics),
            Some("Fallback")
        );
    }

    #[test]
    fn test_unresolved_block_is_empty() {
        let block = BlockDefinition {
            id: "vacio".into(),
            descripcion: None,
            reglas: vec![rule("False", "nunca")],
        };
        let diagnostics = Diagnostics::default();
        let resolved = resolve_all_blocks(&[block], &Context::new(), &diagnostics);
        assert_eq!(resolved["vacio"], "");
    }

    #[test]
    fn test_processor_renders_and_trims() {
        let processor = BlockProcessor::new(vec![opinion_block()], Diagnostics::default());
        let out = processor.process_all(&ctx("favorable"));
        assert_eq!(out["parrafo_opinion"], "En nuestra opinión, ACME ...");
    }

    #[test]
    fn test_render_failure_is_empty() {
        let (diagnostics, sink) = Diagnostics::collecting();
        let block = BlockDefinition {
            id: "roto".into(),
            descripcion: None,
            reglas: vec![rule("True", "{% if %}")],
        };
        let processor = BlockProcessor::new(vec![block], diagnostics);
        assert_eq!(processor.process_all(&Context::new())["roto"], "");
        assert_eq!(sink.count_code(codes::TEMPLATE_RENDER), 1);
    }

    #[test]
    fn test_structured_rule_condition() {
        let block: BlockDefinition = serde_yaml::from_str(
            r#"
id: estructurado
reglas:
  - cuando:
      campo: tipo_opinion
      igual: salvedades
    plantilla: con salvedades
  - plantilla: por defecto
"#,
        )
        .unwrap();
        let diagnostics = Diagnostics::default();
        assert_eq!(
            resolve_block(&block, &ctx("salvedades"), &diagnostics),
            Some("con salvedades")
        );
        assert_eq!(
            resolve_block(&block, &ctx("favorable"), &diagnostics),
            Some("por defecto")
        );
    }
}
