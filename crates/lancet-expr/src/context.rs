//! Evaluation context
//!
//! All inputs to evaluation travel in one immutable `ValueContext`. The
//! engine builds a fresh context per entity and per pass; nothing in here
//! is shared mutable state.

use std::collections::HashMap;

use lancet_core::{ItemId, Value, ValueType};

/// The typed value of one rule variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    /// Current value; `None` when the source had nothing to offer
    pub value: Option<Value>,
    /// Declared type of the backing field
    pub value_type: ValueType,
}

impl VariableValue {
    /// A declared variable that currently has no value.
    pub fn empty(value_type: ValueType) -> Self {
        Self {
            value: None,
            value_type,
        }
    }

    pub fn new(value: Value, value_type: ValueType) -> Self {
        Self {
            value: Some(value),
            value_type,
        }
    }

    /// Build from raw field text, typed per the declared value type.
    pub fn of_raw(raw: &str, value_type: ValueType) -> Self {
        Self {
            value: Some(Value::of_raw(raw, value_type)),
            value_type,
        }
    }
}

/// Immutable inputs for one evaluation
#[derive(Debug, Clone, Default)]
pub struct ValueContext {
    /// Dimensional item values for the base period
    pub items: HashMap<ItemId, f64>,
    /// Constant values by uid
    pub constants: HashMap<String, f64>,
    /// Org-unit-group member counts by uid
    pub org_unit_counts: HashMap<String, f64>,
    /// Day count of the evaluation period, when one is in scope
    pub days: Option<f64>,
    /// Per-sample item values, one map per sampled period, oldest first
    pub samples: Vec<HashMap<ItemId, f64>>,
    /// Rule variable table by name
    pub variables: HashMap<String, VariableValue>,
    /// Environment values (`V{...}`) by name
    pub environment: HashMap<String, Value>,
}

impl ValueContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemId, value: f64) -> Self {
        self.items.insert(item, value);
        self
    }

    pub fn with_constant(mut self, uid: impl Into<String>, value: f64) -> Self {
        self.constants.insert(uid.into(), value);
        self
    }

    pub fn with_org_unit_count(mut self, uid: impl Into<String>, count: f64) -> Self {
        self.org_unit_counts.insert(uid.into(), count);
        self
    }

    pub fn with_days(mut self, days: f64) -> Self {
        self.days = Some(days);
        self
    }

    /// Append one sampled period's value map.
    pub fn with_sample(mut self, sample: HashMap<ItemId, f64>) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: VariableValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: Value) -> Self {
        self.environment.insert(name.into(), value);
        self
    }

    /// Direct or wildcard-expanded lookup in the given item map.
    ///
    /// A wildcard reference sums every matching concrete item; it resolves
    /// to nothing when no item matches.
    pub(crate) fn resolve_in(map: &HashMap<ItemId, f64>, id: &ItemId) -> Option<f64> {
        if id.has_wildcard() {
            let mut sum = 0.0;
            let mut found = false;
            for (key, value) in map {
                if id.matches(key) {
                    sum += value;
                    found = true;
                }
            }
            if found {
                Some(sum)
            } else {
                None
            }
        } else {
            map.get(id).copied()
        }
    }
}
