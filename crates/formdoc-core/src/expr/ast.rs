//! Expression tree
//!
//! The node set is closed: anything the grammar does not describe (calls,
//! attribute access, subscripts, arithmetic) cannot be represented and is
//! rejected while parsing.

use std::collections::BTreeSet;

/// A parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal constant
    Literal(Literal),
    /// Reference to a context variable
    Variable(String),
    /// `not x`, `-x`, `+x`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Chained comparison: `a < b <= c` is `a < b and b <= c`
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(CompareOp, Expr)>,
    },
    /// Short-circuit `and`/`or` over two or more operands
    BoolOp { op: BoolOp, operands: Vec<Expr> },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtE => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtE => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }
}

impl Expr {
    /// Names of all variables referenced by the expression
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable(name) => {
                names.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Compare { left, comparisons } => {
                left.collect_variables(names);
                for (_, right) in comparisons {
                    right.collect_variables(names);
                }
            }
            Expr::BoolOp { operands, .. } | Expr::List(operands) | Expr::Tuple(operands) => {
                for operand in operands {
                    operand.collect_variables(names);
                }
            }
        }
    }
}
