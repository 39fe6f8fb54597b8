//! Sandboxed execution of user-authored scoring bodies.
//!
//! # Responsibility
//! - Compile a rule's scoring body once and run it per element under
//!   resource limits.
//! - Fold every failure mode into a [`ScoreOutcome`] so one bad body never
//!   aborts a whole evaluation pass.
//!
//! # Invariants
//! - `score > 0` means matched, `score == 0` means not matched.
//! - Negative or non-finite scores are reported as failures, never as
//!   matches.

use crate::model::value::AttrMap;
use crate::script::{EvalBudget, Program, ScriptError, Value};
use std::time::Duration;

/// Resource limits applied to one scoring invocation.
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    /// Wall-clock cap per invocation.
    pub timeout: Duration,
    /// Evaluation step cap per invocation.
    pub fuel: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(50),
            fuel: 10_000,
        }
    }
}

/// Result of scoring one element against one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Positive raw score.
    Matched(f64),
    /// The body evaluated cleanly to zero.
    NotMatched,
    /// The body could not produce a usable score.
    Failed(String),
}

/// Scores one element's attributes under a resolved parameter map.
pub trait Scorer {
    fn score(&self, attrs: &AttrMap, params: &AttrMap) -> ScoreOutcome;
}

/// [`Scorer`] backed by a compiled scoring-language program.
#[derive(Debug, Clone)]
pub struct ScriptScorer {
    program: Program,
    limits: SandboxLimits,
}

impl ScriptScorer {
    /// Compiles `source` once; later scoring reuses the expression tree.
    pub fn compile(source: &str, limits: SandboxLimits) -> Result<Self, ScriptError> {
        let program = Program::parse(source)?;
        Ok(Self { program, limits })
    }
}

impl Scorer for ScriptScorer {
    fn score(&self, attrs: &AttrMap, params: &AttrMap) -> ScoreOutcome {
        let mut budget = EvalBudget::new(self.limits.fuel, Some(self.limits.timeout));
        match self.program.evaluate(attrs, params, &mut budget) {
            Ok(Value::Number(score)) if score == 0.0 => ScoreOutcome::NotMatched,
            Ok(Value::Number(score)) if score > 0.0 && score.is_finite() => {
                ScoreOutcome::Matched(score)
            }
            Ok(Value::Number(score)) => ScoreOutcome::Failed(format!("invalid score {score}")),
            Ok(other) => ScoreOutcome::Failed(format!(
                "scoring body must produce a number, got {other:?}"
            )),
            Err(err) => ScoreOutcome::Failed(err.to_string()),
        }
    }
}
