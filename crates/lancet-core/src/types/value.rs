//! Runtime value types for rule variables and computed effect data
//!
//! Field values arrive from tracker payloads as raw text; the `ValueType`
//! declared on the field decides how that text is typed and compared.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Relative tolerance for numeric equality checks.
pub const NUMERIC_TOLERANCE: f64 = 1e-9;

/// Runtime value of a rule variable or a computed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Numeric value (f64, covers integer-typed fields as well)
    Number(f64),
    /// Text value (also carries dates, as ISO `YYYY-MM-DD` text)
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    ///
    /// Booleans coerce to 1/0; text coerces when it parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Truthiness used by boolean rule conditions: a value is true iff it
    /// is numeric and non-zero, the boolean `true`, or text spelling either.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::Text(s) => match s.trim() {
                "true" => true,
                "false" => false,
                other => other.parse::<f64>().map(|n| n != 0.0).unwrap_or(false),
            },
        }
    }

    /// True for text values that are empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the value the way it is written back into a field bag.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }

    /// Strictly parse raw field text under a declared value type.
    pub fn parse_typed(raw: &str, value_type: ValueType) -> Result<Value> {
        let trimmed = raw.trim();
        match value_type {
            ValueType::Number | ValueType::Integer => trimmed
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| CoreError::TypeError(format!("not a number: {raw:?}"))),
            ValueType::Boolean => match trimmed {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(CoreError::TypeError(format!("not a boolean: {raw:?}"))),
            },
            ValueType::Text | ValueType::Date => Ok(Value::Text(raw.to_string())),
        }
    }

    /// Lenient variant of [`Value::parse_typed`]: raw text that does not
    /// parse under its declared type is kept verbatim as text.
    pub fn of_raw(raw: &str, value_type: ValueType) -> Value {
        match Value::parse_typed(raw, value_type) {
            Ok(value) => value,
            Err(err) => {
                log::debug!("keeping raw text for {value_type:?} field: {err}");
                Value::Text(raw.to_string())
            }
        }
    }
}

/// Declared type of a field (data element or tracked-entity attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Text,
    Number,
    Integer,
    Boolean,
    Date,
}

impl ValueType {
    /// Returns true for types compared numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Integer)
    }
}

/// Numeric equality with a relative tolerance, scaled so values near zero
/// still compare against an absolute bound.
pub fn nearly_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= NUMERIC_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Type-aware equality between two raw field texts.
///
/// Numeric fields compare as doubles within [`NUMERIC_TOLERANCE`]; if either
/// side fails to parse the comparison is false. Every other type compares as
/// trimmed text.
pub fn values_equal(left: &str, right: &str, value_type: ValueType) -> bool {
    if value_type.is_numeric() {
        match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
            (Ok(a), Ok(b)) => nearly_equal(a, b),
            _ => false,
        }
    } else {
        left.trim() == right.trim()
    }
}

/// Render a double the way effect data is written: whole numbers without a
/// trailing fraction, everything else in shortest form.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
