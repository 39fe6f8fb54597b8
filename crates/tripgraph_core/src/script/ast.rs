//! Expression tree for compiled scoring bodies.

use crate::script::parser::parse_program;
use crate::script::ScriptError;

/// Compiled scoring body: zero or more `let` bindings followed by one
/// result expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub bindings: Vec<(String, Expr)>,
    pub result: Expr,
}

impl Program {
    /// Compiles source text into an expression tree.
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        parse_program(source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Flag(bool),
    /// Reference to a `let` binding.
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Builtin call, e.g. `attr("price", 0)`.
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// Membership: scalar in list, or substring of text.
    In,
}
