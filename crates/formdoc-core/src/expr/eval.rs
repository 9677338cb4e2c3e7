//! Tree-walking evaluator

use std::cmp::Ordering;

use super::ast::{BoolOp, CompareOp, Expr, UnaryOp};
use super::value::Value;
use super::{ExprError, Result};
use crate::context::Context;
use crate::diagnostics::{codes, Diagnostics};

/// Evaluates expressions against a read-only context
pub struct Evaluator<'a> {
    context: &'a Context,
    diagnostics: &'a Diagnostics,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a Context, diagnostics: &'a Diagnostics) -> Self {
        Self {
            context,
            diagnostics,
        }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Variable(name) => Ok(self.lookup(name)),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            Expr::Compare { left, comparisons } => self.compare_chain(left, comparisons),
            Expr::BoolOp { op, operands } => self.bool_op(*op, operands),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
        }
    }

    fn lookup(&self, name: &str) -> Value {
        match self.context.get(name) {
            Some(value) => Value::from(value),
            None => {
                self.diagnostics.warning(
                    codes::UNDEFINED_VARIABLE,
                    format!("undefined variable '{}' in expression, using None", name),
                );
                Value::None
            }
        }
    }

    fn eval_all(&self, items: &[Expr]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    /// `a < b < c` evaluates `b` once and stops at the first false link
    fn compare_chain(&self, left: &Expr, comparisons: &[(CompareOp, Expr)]) -> Result<Value> {
        let mut current = self.eval(left)?;
        for (op, right) in comparisons {
            let next = self.eval(right)?;
            if !compare(*op, &current, &next)? {
                return Ok(Value::Bool(false));
            }
            current = next;
        }
        Ok(Value::Bool(true))
    }

    fn bool_op(&self, op: BoolOp, operands: &[Expr]) -> Result<Value> {
        let mut last = Value::None;
        for operand in operands {
            last = self.eval(operand)?;
            let decided = match op {
                BoolOp::And => !last.is_truthy(),
                BoolOp::Or => last.is_truthy(),
            };
            if decided {
                return Ok(last);
            }
        }
        Ok(last)
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
        (UnaryOp::Pos, value @ (Value::Int(_) | Value::Float(_))) => Ok(value),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
        (UnaryOp::Neg, Value::Int(i)) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(i as f64)))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (op, value) => Err(ExprError::Type(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.kind()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool> {
        Ok(left.order(right)?.is_some_and(accept))
    };
    match op {
        CompareOp::Eq => Ok(left.loose_eq(right)),
        CompareOp::NotEq => Ok(!left.loose_eq(right)),
        CompareOp::Lt => ordered(Ordering::is_lt),
        CompareOp::LtE => ordered(Ordering::is_le),
        CompareOp::Gt => ordered(Ordering::is_gt),
        CompareOp::GtE => ordered(Ordering::is_ge),
        CompareOp::In => left.contained_in(right),
        CompareOp::NotIn => Ok(!left.contained_in(right)?),
        CompareOp::Is => Ok(left.is_identical(right)),
        CompareOp::IsNot => Ok(!left.is_identical(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use serde_json::json;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("tipo_opinion".into(), json!("favorable"));
        ctx.insert("num_salvedades".into(), json!(2));
        ctx.insert("importe".into(), json!(1500.5));
        ctx.insert("tiene_pn".into(), json!(true));
        ctx.insert("vacio".into(), json!(""));
        ctx.insert("lista".into(), json!(["a", "b"]));
        ctx.insert("mapa".into(), json!({"k": 1}));
        ctx
    }

    fn eval(source: &str) -> Result<Value> {
        let context = ctx();
        let diagnostics = Diagnostics::default();
        let expr = parse_expression(source)?;
        Evaluator::new(&context, &diagnostics).eval(&expr)
    }

    fn truthy(source: &str) -> bool {
        eval(source).unwrap().is_truthy()
    }

    #[test]
    fn test_chained_comparisons() {
        assert!(truthy("1 < 2 < 3"));
        assert!(!truthy("1 < 3 < 2"));
        assert!(truthy("0 <= num_salvedades <= 10"));
    }

    #[test]
    fn test_string_equality() {
        assert!(truthy("tipo_opinion == 'favorable'"));
        assert!(truthy("tipo_opinion != \"desfavorable\""));
    }

    #[test]
    fn test_numeric_comparisons_mix_kinds() {
        assert!(truthy("importe > 1500"));
        assert!(truthy("num_salvedades == 2.0"));
        assert!(truthy("tiene_pn == 1"));
    }

    #[test]
    fn test_membership() {
        assert!(truthy("tipo_opinion in ['favorable', 'salvedades']"));
        assert!(truthy("'fav' in tipo_opinion"));
        assert!(truthy("'c' not in lista"));
        assert!(truthy("'k' in mapa"));
    }

    #[test]
    fn test_identity() {
        assert!(truthy("sin_definir is None"));
        assert!(truthy("tiene_pn is True"));
        assert!(truthy("vacio is not None"));
    }

    #[test]
    fn test_bool_ops_return_operands() {
        assert_eq!(eval("vacio or 'defecto'").unwrap(), Value::Str("defecto".into()));
        assert_eq!(eval("num_salvedades and vacio").unwrap(), Value::Str("".into()));
        assert_eq!(eval("not vacio").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_type_errors() {
        assert!(!truthy("False and 'a' < 1"));
        assert!(truthy("True or 'a' < 1"));
    }

    #[test]
    fn test_chain_stops_at_first_false_link() {
        // The second link would be a type error if evaluated
        assert!(!truthy("2 < 1 < 'x'"));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(eval("'a' < 1"), Err(ExprError::Type(_))));
        assert!(matches!(eval("1 in 5"), Err(ExprError::Type(_))));
        assert!(matches!(eval("-'x'"), Err(ExprError::Type(_))));
    }

    #[test]
    fn test_unary_sign() {
        assert_eq!(eval("-num_salvedades").unwrap(), Value::Int(-2));
        assert_eq!(eval("+True").unwrap(), Value::Int(1));
        assert_eq!(eval("--1.5").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_undefined_variable_warns() {
        let context = Context::new();
        let (diagnostics, sink) = Diagnostics::collecting();
        let expr = parse_expression("desconocida == 'x'").unwrap();
        let value = Evaluator::new(&context, &diagnostics).eval(&expr).unwrap();
        assert_eq!(value, Value::Bool(false));
        assert_eq!(sink.count_code(codes::UNDEFINED_VARIABLE), 1);
    }
}
