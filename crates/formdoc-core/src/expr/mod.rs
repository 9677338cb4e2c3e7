//! Safe condition expressions
//!
//! Conditions in report configuration are written in a small
//! Python-flavoured language: comparisons (chained), `and`/`or`/`not`,
//! membership and identity tests, literals, lists and tuples. Nothing else
//! parses, so an expression can never call a function, reach an attribute
//! or import a module.
//!
//! ```
//! use formdoc_core::expr::{evaluate, parse_expression, Value};
//! use formdoc_core::{Context, Diagnostics};
//!
//! let mut ctx = Context::new();
//! ctx.insert("tipo_opinion".into(), "favorable".into());
//!
//! let expr = parse_expression("tipo_opinion in ('favorable', 'salvedades')").unwrap();
//! let value = evaluate(&expr, &ctx, &Diagnostics::default()).unwrap();
//! assert_eq!(value, Value::Bool(true));
//! ```

pub mod ast;
mod eval;
pub mod lexer;
mod parser;
mod value;

pub use ast::{BoolOp, CompareOp, Expr, Literal, UnaryOp};
pub use eval::Evaluator;
pub use value::Value;

use thiserror::Error;

use crate::context::Context;
use crate::diagnostics::Diagnostics;

/// Errors raised while parsing or evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("type error: {0}")]
    Type(String),
}

impl ExprError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExprError>;

/// Parse an expression string
pub fn parse_expression(source: &str) -> Result<Expr> {
    parser::parse(source)
}

/// Evaluate a parsed expression against a context
pub fn evaluate(expr: &Expr, context: &Context, diagnostics: &Diagnostics) -> Result<Value> {
    Evaluator::new(context, diagnostics).eval(expr)
}

/// Check if the parser accepts `source`
pub fn is_valid_expression(source: &str) -> bool {
    parser::parse(source).is_ok()
}
