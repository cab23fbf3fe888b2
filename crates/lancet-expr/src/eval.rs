//! Formula evaluation
//!
//! A pure AST walk over immutable context. Missing item references
//! substitute zero while the walk counts how many references were seen and
//! how many had values; the missing-value policy turns those counters into
//! the final defined/undefined verdict. Division by zero makes a sub-term
//! undefined, and undefined propagates through every operator.

use std::collections::HashMap;

use lancet_core::{Formula, ItemId, MissingValuePolicy, Value};

use crate::ast::{AggregateFn, BinaryOp, Expr, UnaryOp};
use crate::context::ValueContext;
use crate::deps::{self, ItemSet};
use crate::error::ConditionError;
use crate::functions;
use crate::parser::{parse, ParseMode, ParsedFormula};

/// Evaluate an aggregate formula against a context. `None` is the
/// first-class *undefined* result; this never errors.
pub fn evaluate(formula: &Formula, ctx: &ValueContext) -> Option<f64> {
    let parsed = match parse(&formula.expression, ParseMode::Aggregate) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::warn!("formula {:?} failed to parse: {err}", formula.expression);
            return None;
        }
    };
    evaluate_parsed(&parsed, ctx, formula.policy)
}

/// Evaluate an already-parsed aggregate formula.
pub fn evaluate_parsed(
    parsed: &ParsedFormula,
    ctx: &ValueContext,
    policy: MissingValuePolicy,
) -> Option<f64> {
    let mut eval = Evaluator::new(ctx);
    let value = match eval.eval(parsed.root()) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("formula {:?} failed to evaluate: {err}", parsed.source());
            return None;
        }
    };
    match policy {
        MissingValuePolicy::SkipIfAnyMissing if eval.values < eval.items => return None,
        MissingValuePolicy::SkipIfAllMissing if eval.items > 0 && eval.values == 0 => {
            return None
        }
        _ => {}
    }
    value.and_then(|v| v.as_number()).filter(|n| n.is_finite())
}

/// Evaluate a rule condition to a boolean: true iff the result is defined
/// and truthy. A reference to an undeclared variable is an error; the
/// caller logs it and skips the rule.
pub fn evaluate_condition(
    parsed: &ParsedFormula,
    ctx: &ValueContext,
) -> Result<bool, ConditionError> {
    let mut eval = Evaluator::new(ctx);
    let value = eval.eval(parsed.root())?;
    Ok(value.map(|v| v.is_truthy()).unwrap_or(false))
}

/// Evaluate a rule-mode formula to its raw value, for effect data.
pub fn evaluate_value(
    parsed: &ParsedFormula,
    ctx: &ValueContext,
) -> Result<Option<Value>, ConditionError> {
    Evaluator::new(ctx).eval(parsed.root())
}

struct Evaluator<'a> {
    ctx: &'a ValueContext,
    /// Item references seen outside aggregate arguments
    items: u32,
    /// ... of which had a value
    values: u32,
    /// Sample map replacing the base item map inside aggregate calls
    sample: Option<&'a HashMap<ItemId, f64>>,
    in_aggregate: bool,
}

impl<'a> Evaluator<'a> {
    fn new(ctx: &'a ValueContext) -> Self {
        Self {
            ctx,
            items: 0,
            values: 0,
            sample: None,
            in_aggregate: false,
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Option<Value>, ConditionError> {
        match expr {
            Expr::Number(n) => Ok(Some(Value::Number(*n))),
            Expr::Text(s) => Ok(Some(Value::Text(s.clone()))),
            Expr::Bool(b) => Ok(Some(Value::Bool(*b))),
            Expr::Item(id) => Ok(self.resolve_item(id)),
            Expr::Variable(name) => match self.ctx.variables.get(name) {
                Some(variable) => Ok(variable.value.clone()),
                None => Err(ConditionError::UnknownVariable { name: name.clone() }),
            },
            Expr::Env(name) => match self.ctx.environment.get(name) {
                Some(value) => Ok(Some(value.clone())),
                None => Err(ConditionError::UnknownEnvironment { name: name.clone() }),
            },
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(apply_unary(*op, value))
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(apply_binary(left, *op, right))
            }
            Expr::Aggregate { func, args } => self.eval_aggregate(*func, args),
            Expr::D2 { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                Ok(functions::apply_d2(*func, &values))
            }
        }
    }

    /// Item lookup in the current scope. Outside aggregates a missing item
    /// substitutes zero and feeds the policy counters; inside an aggregate
    /// it makes that sample undefined so the reduction drops it.
    fn resolve_item(&mut self, id: &ItemId) -> Option<Value> {
        let resolved = self.lookup(id, self.sample);
        if self.in_aggregate {
            return resolved.map(Value::Number);
        }
        self.items += 1;
        match resolved {
            Some(value) => {
                self.values += 1;
                Some(Value::Number(value))
            }
            None => Some(Value::Number(0.0)),
        }
    }

    fn lookup(&self, id: &ItemId, sample: Option<&HashMap<ItemId, f64>>) -> Option<f64> {
        match id {
            ItemId::Constant { constant } => self.ctx.constants.get(constant).copied(),
            ItemId::OrgUnitGroupCount { group } => self.ctx.org_unit_counts.get(group).copied(),
            ItemId::Days => self.ctx.days,
            _ => ValueContext::resolve_in(sample.unwrap_or(&self.ctx.items), id),
        }
    }

    /// Aggregate call: arguments are evaluated once per sample map and the
    /// reduction runs over the defined results. Without sample maps the
    /// arguments evaluate once against the base context. A nested call
    /// reduces within the sample currently in scope.
    fn eval_aggregate(
        &mut self,
        func: AggregateFn,
        args: &[Expr],
    ) -> Result<Option<Value>, ConditionError> {
        if !self.in_aggregate {
            // Count each referenced item once toward the missing-value
            // policy; it counts as found if any sample supplies it.
            let mut set = ItemSet::default();
            for arg in args {
                deps::walk(arg, &mut set, true);
            }
            for id in &set.items {
                self.items += 1;
                let found = if self.ctx.samples.is_empty() {
                    self.lookup(id, None).is_some()
                } else {
                    self.ctx.samples.iter().any(|s| self.lookup(id, Some(s)).is_some())
                };
                if found {
                    self.values += 1;
                }
            }
        }

        let ctx = self.ctx;
        let saved_sample = self.sample;
        let saved_flag = self.in_aggregate;
        self.in_aggregate = true;
        let mut collected = Vec::new();

        if saved_flag || ctx.samples.is_empty() {
            // Nested call or no sampling configured: current scope only.
            for arg in args {
                if let Some(n) = self.defined_number(arg)? {
                    collected.push(n);
                }
            }
        } else {
            for sample in &ctx.samples {
                self.sample = Some(sample);
                for arg in args {
                    if let Some(n) = self.defined_number(arg)? {
                        collected.push(n);
                    }
                }
            }
        }

        self.sample = saved_sample;
        self.in_aggregate = saved_flag;
        Ok(functions::reduce(func, &collected).map(Value::Number))
    }

    fn defined_number(&mut self, arg: &Expr) -> Result<Option<f64>, ConditionError> {
        Ok(self
            .eval(arg)?
            .and_then(|v| v.as_number())
            .filter(|n| n.is_finite()))
    }
}

fn apply_unary(op: UnaryOp, value: Option<Value>) -> Option<Value> {
    let value = value?;
    match op {
        UnaryOp::Neg => value
            .as_number()
            .filter(|n| n.is_finite())
            .map(|n| Value::Number(-n)),
        UnaryOp::Not => Some(Value::Bool(!value.is_truthy())),
    }
}

fn apply_binary(left: Option<Value>, op: BinaryOp, right: Option<Value>) -> Option<Value> {
    // Undefined propagates through every operator.
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return None,
    };

    match op {
        BinaryOp::Add => numeric(&left, &right, |a, b| Some(a + b)),
        BinaryOp::Sub => numeric(&left, &right, |a, b| Some(a - b)),
        BinaryOp::Mul => numeric(&left, &right, |a, b| Some(a * b)),
        BinaryOp::Div => numeric(&left, &right, |a, b| if b == 0.0 { None } else { Some(a / b) }),
        BinaryOp::Mod => numeric(&left, &right, |a, b| if b == 0.0 { None } else { Some(a % b) }),
        BinaryOp::Eq => Some(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::Ne => Some(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::Gt => ordering(&left, &right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => ordering(&left, &right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::Lt => ordering(&left, &right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => ordering(&left, &right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::And => Some(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Some(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn numeric(left: &Value, right: &Value, op: impl Fn(f64, f64) -> Option<f64>) -> Option<Value> {
    let a = left.as_number().filter(|n| n.is_finite())?;
    let b = right.as_number().filter(|n| n.is_finite())?;
    op(a, b).filter(|n| n.is_finite()).map(Value::Number)
}

/// Equality: numeric when both sides have a numeric view, rendered text
/// otherwise (which also covers booleans and ISO dates).
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => left.render() == right.render(),
    }
}

/// Ordering: numeric when both sides have a numeric view; lexicographic
/// between two texts, which orders ISO dates chronologically.
fn ordering(left: &Value, right: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Option<Value> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).map(|o| Value::Bool(test(o))),
        _ => match (left, right) {
            (Value::Text(a), Value::Text(b)) => Some(Value::Bool(test(a.cmp(b)))),
            _ => None,
        },
    }
}
