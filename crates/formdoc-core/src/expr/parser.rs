//! Recursive-descent parser for condition expressions
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (chained),
//! unary sign, atoms.

use super::ast::{BoolOp, CompareOp, Expr, Literal, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::ExprError;

/// Maximum nesting of parentheses, brackets and unary operators
const MAX_DEPTH: usize = 64;

/// Parse an expression string into an [`Expr`]
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError::syntax(0, "empty expression"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: source.len(),
    };
    let expr = parser.expression()?;

    match parser.peek() {
        None => Ok(expr),
        Some(_) => Err(parser.unexpected()),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Error for the token at the cursor, naming the rejected construct
    fn unexpected(&self) -> ExprError {
        let offset = self.offset();
        let message = match self.peek() {
            None => "unexpected end of expression".to_string(),
            Some(Token::LParen) => "function calls are not allowed".to_string(),
            Some(Token::LBracket) => "subscripts are not allowed".to_string(),
            Some(Token::Symbol(s)) if s == "." => "attribute access is not allowed".to_string(),
            Some(Token::Symbol(s)) if s == "=" => "assignment is not allowed".to_string(),
            Some(Token::Plus) | Some(Token::Minus) => "arithmetic is not allowed".to_string(),
            Some(Token::Symbol(s))
                if matches!(s.as_str(), "*" | "/" | "%" | "@" | "&" | "|" | "^" | "~") =>
            {
                format!("operator '{}' is not allowed", s)
            }
            Some(token) => format!("unexpected token '{}'", token.describe()),
        };
        ExprError::syntax(offset, message)
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::syntax(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    // ========================================================================
    // Grammar
    // ========================================================================

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let expr = self.or_expr();
        self.ascend();
        expr
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let first = self.and_expr()?;
        let mut operands = vec![first];
        while self.eat(&Token::Or) {
            operands.push(self.and_expr()?);
        }
        Ok(fold_bool(BoolOp::Or, operands))
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let first = self.not_expr()?;
        let mut operands = vec![first];
        while self.eat(&Token::And) {
            operands.push(self.not_expr()?);
        }
        Ok(fold_bool(BoolOp::And, operands))
    }

    fn not_expr(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let operand = self.not_expr();
            self.ascend();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.unary()?;
        let mut comparisons = Vec::new();

        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::LtE) => CompareOp::LtE,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::GtE) => CompareOp::GtE,
                Some(Token::In) => CompareOp::In,
                Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                    self.pos += 1;
                    CompareOp::NotIn
                }
                Some(Token::Is) if self.peek_at(1) == Some(&Token::Not) => {
                    self.pos += 1;
                    CompareOp::IsNot
                }
                Some(Token::Is) => CompareOp::Is,
                _ => break,
            };
            self.pos += 1;
            comparisons.push((op, self.unary()?));
        }

        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.atom(),
        };
        self.pos += 1;
        self.descend()?;
        let operand = self.unary();
        self.ascend();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        let expr = match self.advance() {
            Some(Token::Int(i)) => Expr::Literal(Literal::Int(i)),
            Some(Token::Float(f)) => Expr::Literal(Literal::Float(f)),
            Some(Token::Str(s)) => Expr::Literal(Literal::Str(s)),
            Some(Token::True) => Expr::Literal(Literal::Bool(true)),
            Some(Token::False) => Expr::Literal(Literal::Bool(false)),
            Some(Token::None) => Expr::Literal(Literal::None),
            Some(Token::Name(name)) => Expr::Variable(name),
            Some(Token::LParen) => self.parenthesized()?,
            Some(Token::LBracket) => Expr::List(self.sequence(Token::RBracket)?),
            Some(_) => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
            None => return Err(ExprError::syntax(offset, "unexpected end of expression")),
        };

        // Postfix constructs are outside the grammar
        match self.peek() {
            Some(Token::LParen) | Some(Token::LBracket) => Err(self.unexpected()),
            Some(Token::Symbol(s)) if s == "." => Err(self.unexpected()),
            _ => Ok(expr),
        }
    }

    /// After `(`: empty tuple, grouping, or tuple
    fn parenthesized(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }

        let first = self.expression()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }

        self.expect(Token::Comma)?;
        let mut items = vec![first];
        items.extend(self.sequence(Token::RParen)?);
        Ok(Expr::Tuple(items))
    }

    /// Comma-separated items up to `close`, trailing comma allowed
    fn sequence(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma)?;
        }
    }
}

fn fold_bool(op: BoolOp, mut operands: Vec<Expr>) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        Expr::BoolOp { op, operands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    fn int(i: i64) -> Expr {
        Expr::Literal(Literal::Int(i))
    }

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse("tipo_opinion == 'favorable'").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Box::new(var("tipo_opinion")),
                comparisons: vec![(
                    CompareOp::Eq,
                    Expr::Literal(Literal::Str("favorable".into()))
                )],
            }
        );
    }

    #[test]
    fn test_parse_chained_comparison() {
        let expr = parse("1 < x <= 3").unwrap();
        match expr {
            Expr::Compare { comparisons, .. } => {
                assert_eq!(comparisons.len(), 2);
                assert_eq!(comparisons[0].0, CompareOp::Lt);
                assert_eq!(comparisons[1].0, CompareOp::LtE);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence() {
        // not binds looser than ==, and looser than or's operands
        let expr = parse("a or not b == 1 and c").unwrap();
        match expr {
            Expr::BoolOp { op: BoolOp::Or, operands } => {
                assert_eq!(operands[0], var("a"));
                match &operands[1] {
                    Expr::BoolOp { op: BoolOp::And, operands } => {
                        assert!(matches!(
                            operands[0],
                            Expr::Unary { op: UnaryOp::Not, .. }
                        ));
                        assert_eq!(operands[1], var("c"));
                    }
                    other => panic!("expected and, got {:?}", other),
                }
            }
            other => panic!("expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_in_and_is_not() {
        let expr = parse("x not in [1, 2] and y is not None").unwrap();
        let Expr::BoolOp { operands, .. } = expr else {
            panic!("expected and");
        };
        assert!(matches!(
            &operands[0],
            Expr::Compare { comparisons, .. } if comparisons[0].0 == CompareOp::NotIn
        ));
        assert!(matches!(
            &operands[1],
            Expr::Compare { comparisons, .. } if comparisons[0].0 == CompareOp::IsNot
        ));
    }

    #[test]
    fn test_parse_tuples_and_grouping() {
        assert_eq!(parse("(1)").unwrap(), int(1));
        assert_eq!(parse("(1,)").unwrap(), Expr::Tuple(vec![int(1)]));
        assert_eq!(parse("()").unwrap(), Expr::Tuple(vec![]));
        assert_eq!(parse("[1, 2,]").unwrap(), Expr::List(vec![int(1), int(2)]));
    }

    #[test]
    fn test_parse_unary_sign() {
        assert_eq!(
            parse("-1").unwrap(),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(int(1)),
            }
        );
    }

    #[test]
    fn test_rejects_calls() {
        let err = parse("__import__('os')").unwrap_err();
        assert!(err.to_string().contains("function calls are not allowed"));
    }

    #[test]
    fn test_rejects_attribute_access() {
        let err = parse("x.__class__").unwrap_err();
        assert!(err.to_string().contains("attribute access"));
    }

    #[test]
    fn test_rejects_subscript() {
        assert!(parse("x[0] == 1").is_err());
    }

    #[test]
    fn test_rejects_arithmetic() {
        assert!(parse("a + b").is_err());
        assert!(parse("a * 2 > 1").is_err());
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn test_rejects_ternary_and_lambda() {
        assert!(parse("a if b else c").is_err());
        assert!(parse("lambda: 1").is_err());
    }

    #[test]
    fn test_rejects_empty_and_unbalanced() {
        assert!(parse("").is_err());
        assert!(parse("(a == 1").is_err());
        assert!(parse("a ==").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
    }

    #[test]
    fn test_variables() {
        let expr = parse("b == 1 and a in ['x'] or b").unwrap();
        let names: Vec<String> = expr.variables().into_iter().collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
