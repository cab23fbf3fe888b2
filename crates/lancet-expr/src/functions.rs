//! Aggregate reductions and `d2:` function bodies
//!
//! Reductions operate on the per-sample values the evaluator already
//! collected; `d2:` functions operate on evaluated argument values. Both
//! express failure as `None` (undefined), never as an error.

use chrono::{Datelike, Duration, NaiveDate};

use lancet_core::Value;

use crate::ast::{AggregateFn, D2Fn};

/// Reduce the non-missing samples of an aggregate call.
pub(crate) fn reduce(func: AggregateFn, samples: &[f64]) -> Option<f64> {
    match func {
        AggregateFn::Count => Some(samples.len() as f64),
        AggregateFn::Sum => Some(samples.iter().sum()),
        AggregateFn::Avg => mean(samples),
        AggregateFn::Min => samples.iter().copied().reduce(f64::min),
        AggregateFn::Max => samples.iter().copied().reduce(f64::max),
        AggregateFn::Stddev => {
            let mean = mean(samples)?;
            let variance =
                samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
            Some(variance.sqrt())
        }
        AggregateFn::Median => {
            if samples.is_empty() {
                return None;
            }
            let mut sorted = samples.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 1 {
                Some(sorted[mid])
            } else {
                Some((sorted[mid - 1] + sorted[mid]) / 2.0)
            }
        }
    }
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Apply a `d2:` function to its evaluated arguments.
///
/// `d2:hasValue` is handled by the evaluator itself because it inspects
/// definedness rather than a value.
pub(crate) fn apply_d2(func: D2Fn, args: &[Option<Value>]) -> Option<Value> {
    match func {
        D2Fn::HasValue => {
            let defined = matches!(args.first(), Some(Some(v)) if !v.is_blank());
            Some(Value::Bool(defined))
        }
        D2Fn::Floor => unary_numeric(args, f64::floor),
        D2Fn::Ceil => unary_numeric(args, f64::ceil),
        D2Fn::Round => unary_numeric(args, f64::round),
        D2Fn::Modulus => {
            let a = numeric_arg(args, 0)?;
            let b = numeric_arg(args, 1)?;
            if b == 0.0 {
                None
            } else {
                Some(Value::Number(a % b))
            }
        }
        D2Fn::Concatenate => {
            let mut out = String::new();
            for arg in args {
                if let Some(value) = arg {
                    out.push_str(&value.render());
                }
            }
            Some(Value::Text(out))
        }
        D2Fn::Length => {
            let value = args.first()?.as_ref()?;
            Some(Value::Number(value.render().chars().count() as f64))
        }
        D2Fn::AddDays => {
            let date = date_arg(args, 0)?;
            let days = numeric_arg(args, 1)?;
            let shifted = date.checked_add_signed(Duration::days(days as i64))?;
            Some(Value::Text(shifted.format("%Y-%m-%d").to_string()))
        }
        D2Fn::DaysBetween => {
            let from = date_arg(args, 0)?;
            let to = date_arg(args, 1)?;
            Some(Value::Number((to - from).num_days() as f64))
        }
        D2Fn::YearsBetween => {
            let from = date_arg(args, 0)?;
            let to = date_arg(args, 1)?;
            Some(Value::Number(whole_years_between(from, to) as f64))
        }
    }
}

fn unary_numeric(args: &[Option<Value>], op: fn(f64) -> f64) -> Option<Value> {
    let n = numeric_arg(args, 0)?;
    let result = op(n);
    if result.is_finite() {
        Some(Value::Number(result))
    } else {
        None
    }
}

fn numeric_arg(args: &[Option<Value>], index: usize) -> Option<f64> {
    args.get(index)?.as_ref()?.as_number().filter(|n| n.is_finite())
}

fn date_arg(args: &[Option<Value>], index: usize) -> Option<NaiveDate> {
    let value = args.get(index)?.as_ref()?;
    parse_date(&value.render())
}

/// ISO `YYYY-MM-DD`; anything else is undefined.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Whole calendar years from `from` to `to`, negative when `to` is earlier.
fn whole_years_between(from: NaiveDate, to: NaiveDate) -> i32 {
    if to < from {
        return -whole_years_between(to, from);
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}
