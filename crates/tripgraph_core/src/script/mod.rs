//! Scoring-language compiler and interpreter.
//!
//! # Responsibility
//! - Parse user-authored rule bodies into an immutable expression tree.
//! - Evaluate that tree against one element's attributes and one resolved
//!   parameter map, under fuel and wall-clock budgets.
//!
//! # Invariants
//! - The language has no loops, no recursion, no user-defined functions,
//!   and no I/O; its only capabilities are reading `attrs`/`params` and
//!   pure arithmetic/string operations.
//! - Evaluation of a fixed program against fixed inputs is deterministic.
//!
//! The surface is a small expression language:
//!
//! ```text
//! let rating = attr("rating", 0);
//! if rating >= param("floor", 4.5) then rating else 0
//! ```

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, Program, UnaryOp};
pub use eval::{EvalBudget, Value};

use std::fmt::{Display, Formatter};

/// Error raised while compiling or evaluating a scoring body.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Lexical or syntactic error, with a byte offset into the source.
    Parse { offset: usize, message: String },
    /// An operation was applied to operands of the wrong type.
    Type { message: String },
    /// Reference to a name with no `let` binding.
    UnknownIdent(String),
    /// Call to a builtin the language does not provide.
    UnknownFunction(String),
    /// Builtin called with the wrong number of arguments.
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },
    /// `attr`/`param` lookup without a default for an absent key.
    MissingKey { kind: &'static str, key: String },
    DivisionByZero,
    /// Step budget exhausted.
    FuelExhausted,
    /// Wall-clock budget exhausted.
    Timeout,
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { offset, message } => {
                write!(f, "parse error at offset {offset}: {message}")
            }
            Self::Type { message } => write!(f, "type error: {message}"),
            Self::UnknownIdent(name) => write!(f, "unknown identifier `{name}`"),
            Self::UnknownFunction(name) => write!(f, "unknown function `{name}`"),
            Self::Arity {
                name,
                expected,
                got,
            } => write!(f, "`{name}` expects {expected} argument(s), got {got}"),
            Self::MissingKey { kind, key } => {
                write!(f, "{kind} `{key}` is absent and no default was given")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::FuelExhausted => write!(f, "evaluation step budget exhausted"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::error::Error for ScriptError {}
