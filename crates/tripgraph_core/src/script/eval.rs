//! Tree-walking evaluator with fuel and wall-clock budgets.
//!
//! # Invariants
//! - Every expression node charges one unit of fuel before evaluating.
//! - The wall clock is sampled every [`DEADLINE_CHECK_INTERVAL`] charges,
//!   so a hung body is cut off close to its deadline without paying for a
//!   clock read per node.
//! - Evaluation never mutates the attribute or parameter maps.

use crate::model::value::{AttrMap, AttrValue, Scalar};
use crate::script::ast::{BinaryOp, Expr, Program, UnaryOp};
use crate::script::ScriptError;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEADLINE_CHECK_INTERVAL: u64 = 8;

/// Runtime value produced while evaluating a scoring body.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Flag(bool),
    List(Vec<Scalar>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::List(_) => "list",
        }
    }
}

impl From<&AttrValue> for Value {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::Scalar(Scalar::Number(n)) => Self::Number(*n),
            AttrValue::Scalar(Scalar::Text(t)) => Self::Text(t.clone()),
            AttrValue::Scalar(Scalar::Flag(b)) => Self::Flag(*b),
            AttrValue::List(items) => Self::List(items.clone()),
        }
    }
}

/// Per-invocation resource budget.
#[derive(Debug, Clone)]
pub struct EvalBudget {
    fuel: u64,
    deadline: Option<Instant>,
    charges: u64,
}

impl EvalBudget {
    /// Budget with a step limit and an optional wall-clock limit starting now.
    pub fn new(fuel: u64, timeout: Option<Duration>) -> Self {
        Self {
            fuel,
            deadline: timeout.map(|limit| Instant::now() + limit),
            charges: 0,
        }
    }

    fn charge(&mut self) -> Result<(), ScriptError> {
        if self.fuel == 0 {
            return Err(ScriptError::FuelExhausted);
        }
        self.fuel -= 1;
        self.charges += 1;
        if self.charges % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(ScriptError::Timeout);
                }
            }
        }
        Ok(())
    }
}

impl Program {
    /// Evaluates this program against one element's attributes and one
    /// resolved parameter map.
    pub fn evaluate(
        &self,
        attrs: &AttrMap,
        params: &AttrMap,
        budget: &mut EvalBudget,
    ) -> Result<Value, ScriptError> {
        let mut scope = Scope {
            attrs,
            params,
            bindings: HashMap::new(),
        };
        for (name, expr) in &self.bindings {
            let value = eval_expr(expr, &scope, budget)?;
            scope.bindings.insert(name.clone(), value);
        }
        eval_expr(&self.result, &scope, budget)
    }
}

struct Scope<'a> {
    attrs: &'a AttrMap,
    params: &'a AttrMap,
    bindings: HashMap<String, Value>,
}

fn eval_expr(expr: &Expr, scope: &Scope<'_>, budget: &mut EvalBudget) -> Result<Value, ScriptError> {
    budget.charge()?;

    match expr {
        Expr::Number(value) => Ok(Value::Number(*value)),
        Expr::Text(value) => Ok(Value::Text(value.clone())),
        Expr::Flag(value) => Ok(Value::Flag(*value)),
        Expr::Var(name) => scope
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownIdent(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, scope, budget)?;
            match op {
                UnaryOp::Neg => match value {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => Err(type_error(&format!("cannot negate {}", other.type_name()))),
                },
                UnaryOp::Not => Ok(Value::Flag(!truthy(&value)?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, scope, budget),
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_value = eval_expr(cond, scope, budget)?;
            if truthy(&cond_value)? {
                eval_expr(then_branch, scope, budget)
            } else {
                eval_expr(else_branch, scope, budget)
            }
        }
        Expr::Call { name, args } => eval_call(name, args, scope, budget),
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Scope<'_>,
    budget: &mut EvalBudget,
) -> Result<Value, ScriptError> {
    // `and`/`or` short-circuit; everything else is strict.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs_truthy = truthy(&eval_expr(lhs, scope, budget)?)?;
        return match (op, lhs_truthy) {
            (BinaryOp::And, false) => Ok(Value::Flag(false)),
            (BinaryOp::Or, true) => Ok(Value::Flag(true)),
            _ => Ok(Value::Flag(truthy(&eval_expr(rhs, scope, budget)?)?)),
        };
    }

    let left = eval_expr(lhs, scope, budget)?;
    let right = eval_expr(rhs, scope, budget)?;

    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
            (a, b) => Err(binary_type_error("+", &a, &b)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numeric_operands(op_symbol(op), left, right)?;
            match op {
                BinaryOp::Sub => Ok(Value::Number(a - b)),
                BinaryOp::Mul => Ok(Value::Number(a * b)),
                BinaryOp::Div if b == 0.0 => Err(ScriptError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Number(a / b)),
                BinaryOp::Rem if b == 0.0 => Err(ScriptError::DivisionByZero),
                BinaryOp::Rem => Ok(Value::Number(a % b)),
                _ => unreachable!(),
            }
        }
        BinaryOp::Eq => Ok(Value::Flag(values_equal(&left, &right)?)),
        BinaryOp::Ne => Ok(Value::Flag(!values_equal(&left, &right)?)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare_values(op_symbol(op), &left, &right)?;
            Ok(Value::Flag(match op {
                BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
                BinaryOp::Le => ordering != std::cmp::Ordering::Greater,
                BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
                BinaryOp::Ge => ordering != std::cmp::Ordering::Less,
                _ => unreachable!(),
            }))
        }
        BinaryOp::In => membership(&left, &right),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(
    name: &str,
    args: &[Expr],
    scope: &Scope<'_>,
    budget: &mut EvalBudget,
) -> Result<Value, ScriptError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval_expr(arg, scope, budget)?);
    }

    match name {
        "attr" => lookup(scope.attrs, "attribute", "attr", values),
        "param" => lookup(scope.params, "parameter", "param", values),
        "has" => {
            let [key] = take_args::<1>("has", "1", values)?;
            let key = text_arg("has", key)?;
            Ok(Value::Flag(scope.attrs.contains_key(&key)))
        }
        "len" => {
            let [value] = take_args::<1>("len", "1", values)?;
            match value {
                Value::List(items) => Ok(Value::Number(items.len() as f64)),
                Value::Text(text) => Ok(Value::Number(text.chars().count() as f64)),
                other => Err(type_error(&format!(
                    "`len` expects a list or text, got {}",
                    other.type_name()
                ))),
            }
        }
        "min" => {
            let [a, b] = take_args::<2>("min", "2", values)?;
            let (a, b) = numeric_operands("min", a, b)?;
            Ok(Value::Number(a.min(b)))
        }
        "max" => {
            let [a, b] = take_args::<2>("max", "2", values)?;
            let (a, b) = numeric_operands("max", a, b)?;
            Ok(Value::Number(a.max(b)))
        }
        "abs" => {
            let [value] = take_args::<1>("abs", "1", values)?;
            Ok(Value::Number(number_arg("abs", value)?.abs()))
        }
        "clamp" => {
            let [value, lo, hi] = take_args::<3>("clamp", "3", values)?;
            let n = number_arg("clamp", value)?;
            let lo = number_arg("clamp", lo)?;
            let hi = number_arg("clamp", hi)?;
            // f64::clamp panics on NaN bounds; min/max never do.
            Ok(Value::Number(n.max(lo.min(hi)).min(hi.max(lo))))
        }
        other => Err(ScriptError::UnknownFunction(other.to_string())),
    }
}

/// `attr`/`param`: key lookup with optional default.
fn lookup(
    map: &AttrMap,
    kind: &'static str,
    name: &'static str,
    values: Vec<Value>,
) -> Result<Value, ScriptError> {
    let got = values.len();
    let mut values = values.into_iter();
    let (key, default) = match (values.next(), values.next(), values.next()) {
        (Some(key), default, None) => (text_arg(name, key)?, default),
        _ => {
            return Err(ScriptError::Arity {
                name,
                expected: "1 or 2",
                got,
            });
        }
    };

    match map.get(&key) {
        Some(value) => Ok(Value::from(value)),
        None => default.ok_or(ScriptError::MissingKey { kind, key }),
    }
}

fn take_args<const N: usize>(
    name: &'static str,
    expected: &'static str,
    values: Vec<Value>,
) -> Result<[Value; N], ScriptError> {
    let got = values.len();
    values.try_into().map_err(|_| ScriptError::Arity {
        name,
        expected,
        got,
    })
}

fn text_arg(name: &str, value: Value) -> Result<String, ScriptError> {
    match value {
        Value::Text(text) => Ok(text),
        other => Err(type_error(&format!(
            "`{name}` key must be text, got {}",
            other.type_name()
        ))),
    }
}

fn number_arg(name: &str, value: Value) -> Result<f64, ScriptError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(type_error(&format!(
            "`{name}` expects a number, got {}",
            other.type_name()
        ))),
    }
}

fn numeric_operands(op: &str, left: Value, right: Value) -> Result<(f64, f64), ScriptError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        (a, b) => Err(binary_type_error(op, &a, &b)),
    }
}

fn values_equal(left: &Value, right: &Value) -> Result<bool, ScriptError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Text(a), Value::Text(b)) => Ok(a == b),
        (Value::Flag(a), Value::Flag(b)) => Ok(a == b),
        (a, b) => Err(binary_type_error("==", a, b)),
    }
}

fn compare_values(
    op: &str,
    left: &Value,
    right: &Value,
) -> Result<std::cmp::Ordering, ScriptError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| type_error("cannot order NaN")),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (a, b) => Err(binary_type_error(op, a, b)),
    }
}

/// `x in list` tests scalar membership; `x in text` tests substring.
fn membership(left: &Value, right: &Value) -> Result<Value, ScriptError> {
    match (left, right) {
        (needle, Value::List(items)) => {
            let found = items.iter().any(|item| match (needle, item) {
                (Value::Number(a), Scalar::Number(b)) => a == b,
                (Value::Text(a), Scalar::Text(b)) => a == b,
                (Value::Flag(a), Scalar::Flag(b)) => a == b,
                _ => false,
            });
            Ok(Value::Flag(found))
        }
        (Value::Text(needle), Value::Text(haystack)) => {
            Ok(Value::Flag(haystack.contains(needle.as_str())))
        }
        (a, b) => Err(binary_type_error("in", a, b)),
    }
}

fn truthy(value: &Value) -> Result<bool, ScriptError> {
    match value {
        Value::Flag(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        other => Err(type_error(&format!(
            "{} is not usable as a condition",
            other.type_name()
        ))),
    }
}

fn type_error(message: &str) -> ScriptError {
    ScriptError::Type {
        message: message.to_string(),
    }
}

fn binary_type_error(op: &str, left: &Value, right: &Value) -> ScriptError {
    type_error(&format!(
        "`{op}` cannot combine {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::In => "in",
    }
}

#[cfg(test)]
mod tests {
    use super::{EvalBudget, Value};
    use crate::model::value::{AttrMap, AttrValue, Scalar};
    use crate::script::ast::Program;
    use crate::script::ScriptError;
    use std::time::Duration;

    fn attrs() -> AttrMap {
        let mut map = AttrMap::new();
        map.insert("price".to_string(), AttrValue::number(300.0));
        map.insert("rating".to_string(), AttrValue::number(4.6));
        map.insert(
            "seasons".to_string(),
            AttrValue::list([Scalar::Text("spring".into()), Scalar::Text("autumn".into())]),
        );
        map.insert("closed_on_monday".to_string(), AttrValue::flag(true));
        map
    }

    fn run(source: &str) -> Result<Value, ScriptError> {
        run_with_params(source, AttrMap::new())
    }

    fn run_with_params(source: &str, params: AttrMap) -> Result<Value, ScriptError> {
        let program = Program::parse(source)?;
        let mut budget = EvalBudget::new(10_000, Some(Duration::from_millis(50)));
        program.evaluate(&attrs(), &params, &mut budget)
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        assert_eq!(run("1 + 2 * 3"), Ok(Value::Number(7.0)));
        assert_eq!(run("(1 + 2) * 3"), Ok(Value::Number(9.0)));
    }

    #[test]
    fn let_bindings_are_visible_in_order() {
        assert_eq!(
            run("let a = 2; let b = a * 3; b + 1"),
            Ok(Value::Number(7.0))
        );
    }

    #[test]
    fn attr_lookup_with_and_without_default() {
        assert_eq!(run("attr(\"price\")"), Ok(Value::Number(300.0)));
        assert_eq!(run("attr(\"missing\", 7)"), Ok(Value::Number(7.0)));
        assert_eq!(
            run("attr(\"missing\")"),
            Err(ScriptError::MissingKey {
                kind: "attribute",
                key: "missing".to_string()
            })
        );
    }

    #[test]
    fn param_overlay_is_respected_by_lookup() {
        let mut params = AttrMap::new();
        params.insert("limit".to_string(), AttrValue::number(200.0));
        assert_eq!(
            run_with_params("if attr(\"price\") < param(\"limit\", 500) then 1 else 0", params),
            Ok(Value::Number(0.0))
        );
    }

    #[test]
    fn list_membership_and_substring() {
        assert_eq!(
            run("if \"autumn\" in attr(\"seasons\") then 1 else 0"),
            Ok(Value::Number(1.0))
        );
        assert_eq!(run("\"bc\" in \"abcd\""), Ok(Value::Flag(true)));
    }

    #[test]
    fn flags_and_numbers_are_truthy_conditions() {
        assert_eq!(
            run("if attr(\"closed_on_monday\", false) then 1 else 0"),
            Ok(Value::Number(1.0))
        );
        assert_eq!(run("if 0 then 1 else 2"), Ok(Value::Number(2.0)));
        assert!(matches!(
            run("if \"text\" then 1 else 2"),
            Err(ScriptError::Type { .. })
        ));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(run("1 / 0"), Err(ScriptError::DivisionByZero));
        assert_eq!(run("1 % 0"), Err(ScriptError::DivisionByZero));
    }

    #[test]
    fn short_circuit_skips_rhs_errors() {
        assert_eq!(run("false and (1 / 0)"), Ok(Value::Flag(false)));
        assert_eq!(run("true or (1 / 0)"), Ok(Value::Flag(true)));
    }

    #[test]
    fn builtin_family() {
        assert_eq!(run("min(2, 5)"), Ok(Value::Number(2.0)));
        assert_eq!(run("max(2, 5)"), Ok(Value::Number(5.0)));
        assert_eq!(run("abs(-3)"), Ok(Value::Number(3.0)));
        assert_eq!(run("clamp(12, 0, 10)"), Ok(Value::Number(10.0)));
        assert_eq!(run("len(attr(\"seasons\"))"), Ok(Value::Number(2.0)));
        assert_eq!(run("len(\"abc\")"), Ok(Value::Number(3.0)));
        assert_eq!(run("has(\"price\")"), Ok(Value::Flag(true)));
        assert_eq!(run("has(\"nope\")"), Ok(Value::Flag(false)));
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert_eq!(
            run("fetch(\"http\")"),
            Err(ScriptError::UnknownFunction("fetch".to_string()))
        );
    }

    #[test]
    fn fuel_budget_cuts_off_evaluation() {
        let program = Program::parse("1 + 2 + 3 + 4 + 5 + 6 + 7 + 8").expect("parse");
        let mut budget = EvalBudget::new(3, None);
        assert_eq!(
            program.evaluate(&attrs(), &AttrMap::new(), &mut budget),
            Err(ScriptError::FuelExhausted)
        );
    }

    #[test]
    fn expired_deadline_reports_timeout() {
        let program = Program::parse("1 + 2 + 3 + 4 + 5 + 6 + 7 + 8 + 9").expect("parse");
        let mut budget = EvalBudget::new(10_000, Some(Duration::ZERO));
        assert_eq!(
            program.evaluate(&attrs(), &AttrMap::new(), &mut budget),
            Err(ScriptError::Timeout)
        );
    }

    #[test]
    fn same_inputs_same_outputs() {
        let program = Program::parse(
            "let rating = attr(\"rating\", 0); if rating >= 4.5 then rating else 0",
        )
        .expect("parse");
        let first = program.evaluate(
            &attrs(),
            &AttrMap::new(),
            &mut EvalBudget::new(10_000, None),
        );
        let second = program.evaluate(
            &attrs(),
            &AttrMap::new(),
            &mut EvalBudget::new(10_000, None),
        );
        assert_eq!(first, second);
        assert_eq!(first, Ok(Value::Number(4.6)));
    }
}
