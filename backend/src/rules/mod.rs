//! Rule expression language for facility configuration.
//!
//! Facilities are configured declaratively: a generic rule carries a
//! boolean condition plus a list of assignments, and is applied to every
//! facility whose attributes satisfy the condition. Conditions and numeric
//! settings are small prefix-notation expressions that deserialize straight
//! from JSON:
//!
//! ```json
//! {
//!     "cond": [">", "total_capacity", 50],
//!     "set_to": [
//!         {"uncertainty": {"mu": 0.0, "sigma": ["*", "total_capacity", 0.2]}}
//!     ]
//! }
//! ```
//!
//! An expression is either a scalar literal, an attribute name resolved
//! against the facility's attribute environment, or a three-element array
//! `[operator, lhs, rhs]` whose operands follow the same rule recursively.
//! Evaluation is a pure function of (expression, environment); anything
//! that goes wrong is a configuration error, fatal at load time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Errors raised while evaluating a rule expression.
///
/// All of these indicate a malformed configuration and are fatal at load
/// time; expressions are never evaluated after initialization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleError {
    #[error("expression must be a scalar literal, an attribute name, or an [operator, lhs, rhs] form")]
    Malformed,

    #[error("operator {op} expects numeric operands, got {lhs} and {rhs}")]
    NumericOperands { op: Op, lhs: RuleValue, rhs: RuleValue },

    #[error("operator {op} expects boolean operands, got {lhs} and {rhs}")]
    BooleanOperands { op: Op, lhs: RuleValue, rhs: RuleValue },

    #[error("division by zero")]
    DivisionByZero,

    #[error("rule condition must evaluate to a boolean, got {0}")]
    ConditionNotBoolean(RuleValue),

    #[error("expression must evaluate to a number, got {0}")]
    NotANumber(RuleValue),
}

/// Binary operator table.
///
/// The table is closed: an operator symbol outside this set is rejected
/// when the expression is deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "**")]
    Pow,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::And => "and",
            Op::Or => "or",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "=",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Pow => "**",
        };
        write!(f, "{}", symbol)
    }
}

/// A rule expression.
///
/// `Apply` deserializes from a three-element JSON array and `Literal` from
/// any scalar; a bare string doubles as an attribute reference, resolved
/// against the environment at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    /// `[operator, lhs, rhs]`
    Apply(Op, Box<Expr>, Box<Expr>),
    /// Scalar literal or attribute name
    Literal(serde_json::Value),
}

/// A value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Num(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Num(n) => write!(f, "{}", n),
            RuleValue::Bool(b) => write!(f, "{}", b),
            RuleValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl RuleValue {
    fn from_json(value: &serde_json::Value) -> Result<Self, RuleError> {
        match value {
            serde_json::Value::Number(n) => {
                n.as_f64().map(RuleValue::Num).ok_or(RuleError::Malformed)
            }
            serde_json::Value::Bool(b) => Ok(RuleValue::Bool(*b)),
            serde_json::Value::String(s) => Ok(RuleValue::Text(s.clone())),
            _ => Err(RuleError::Malformed),
        }
    }
}

/// Attribute environment an expression is evaluated against.
///
/// Built from the facility under configuration (`total_capacity`,
/// `total_occupancy`, `id`, `lane`, `edge`, `end_pos`).
pub type Environment = HashMap<String, RuleValue>;

/// If the value is a string matching an environment key, substitute the
/// bound value. Applied after every recursive evaluation, so an operand
/// can name an attribute directly.
fn resolve(value: RuleValue, env: &Environment) -> RuleValue {
    if let RuleValue::Text(name) = &value {
        if let Some(bound) = env.get(name) {
            return bound.clone();
        }
    }
    value
}

/// Evaluate an expression against an environment.
///
/// # Example
/// ```
/// use parking_monitor_core_rs::rules::{evaluate, Environment, Expr, RuleValue};
///
/// let expr: Expr = serde_json::from_str(r#"["*", "total_capacity", 0.2]"#).unwrap();
/// let mut env = Environment::new();
/// env.insert("total_capacity".to_string(), RuleValue::Num(50.0));
/// assert_eq!(evaluate(&expr, &env).unwrap(), RuleValue::Num(10.0));
/// ```
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<RuleValue, RuleError> {
    match expr {
        Expr::Literal(value) => Ok(resolve(RuleValue::from_json(value)?, env)),
        Expr::Apply(op, lhs, rhs) => {
            let lhs = resolve(evaluate(lhs, env)?, env);
            let rhs = resolve(evaluate(rhs, env)?, env);
            apply(*op, lhs, rhs)
        }
    }
}

/// Evaluate an expression that must produce a boolean (rule conditions).
pub fn evaluate_condition(expr: &Expr, env: &Environment) -> Result<bool, RuleError> {
    match evaluate(expr, env)? {
        RuleValue::Bool(b) => Ok(b),
        other => Err(RuleError::ConditionNotBoolean(other)),
    }
}

/// Evaluate an expression that must produce a number (mu/sigma settings).
pub fn evaluate_number(expr: &Expr, env: &Environment) -> Result<f64, RuleError> {
    match evaluate(expr, env)? {
        RuleValue::Num(n) => Ok(n),
        other => Err(RuleError::NotANumber(other)),
    }
}

fn apply(op: Op, lhs: RuleValue, rhs: RuleValue) -> Result<RuleValue, RuleError> {
    use RuleValue::{Bool, Num};

    match op {
        Op::And | Op::Or => match (lhs, rhs) {
            (Bool(a), Bool(b)) => Ok(Bool(match op {
                Op::And => a && b,
                _ => a || b,
            })),
            (lhs, rhs) => Err(RuleError::BooleanOperands { op, lhs, rhs }),
        },
        // Equality compares across types and is simply false on a mismatch.
        Op::Eq => Ok(Bool(lhs == rhs)),
        Op::Gt | Op::Ge | Op::Le | Op::Lt => match (lhs, rhs) {
            (Num(a), Num(b)) => Ok(Bool(match op {
                Op::Gt => a > b,
                Op::Ge => a >= b,
                Op::Le => a <= b,
                _ => a < b,
            })),
            (lhs, rhs) => Err(RuleError::NumericOperands { op, lhs, rhs }),
        },
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => match (lhs, rhs) {
            (Num(a), Num(b)) => {
                let result = match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => {
                        if b == 0.0 {
                            return Err(RuleError::DivisionByZero);
                        }
                        a / b
                    }
                    _ => a.powf(b),
                };
                Ok(Num(result))
            }
            (lhs, rhs) => Err(RuleError::NumericOperands { op, lhs, rhs }),
        },
    }
}

// ============================================================================
// Configuration rule types
// ============================================================================

/// Gaussian uncertainty setting, with mu/sigma given as expressions so they
/// can reference facility attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyExpr {
    pub mu: Expr,
    pub sigma: Expr,
}

/// One assignment in a rule's `set_to` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAssignment {
    /// Replace the facility's uncertainty setting.
    Uncertainty(UncertaintyExpr),
    /// Replace the per-class capacity split.
    CapacityByClass(BTreeMap<String, i64>),
    /// Replace the per-class reservation counts (reservation sets start
    /// empty).
    SubscriptionsByClass(BTreeMap<String, i64>),
}

/// A generic configuration rule, applied to every facility whose condition
/// holds. Rules are applied in declaration order; later rules overwrite
/// earlier ones. Specific per-facility overrides are applied afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericRule {
    /// Boolean condition evaluated against the facility's attributes.
    pub cond: Expr,
    /// Assignments applied when the condition holds.
    pub set_to: Vec<RuleAssignment>,
}
