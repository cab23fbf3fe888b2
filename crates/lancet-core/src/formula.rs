//! Formula definitions
//!
//! A formula is an immutable expression string plus the policy that decides
//! what happens when referenced items have no value in the evaluation
//! context.

use serde::{Deserialize, Serialize};

/// What to do when referenced items are missing from the value map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingValuePolicy {
    /// The result is undefined as soon as one referenced item is missing.
    SkipIfAnyMissing,
    /// The result is undefined only when every referenced item is missing;
    /// otherwise missing items count as zero.
    SkipIfAllMissing,
    /// Missing items always count as zero and the formula always computes.
    #[default]
    NeverSkip,
}

/// An aggregate formula: expression text plus missing-value policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Expression source text
    pub expression: String,
    /// Missing-value policy applied at evaluation time
    #[serde(default)]
    pub policy: MissingValuePolicy,
}

impl Formula {
    /// Create a formula with the default `NeverSkip` policy.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            policy: MissingValuePolicy::default(),
        }
    }

    /// Set the missing-value policy.
    pub fn with_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_never_skip() {
        let formula = Formula::new("#{abcdefghij1} + 2");
        assert_eq!(formula.policy, MissingValuePolicy::NeverSkip);
    }

    #[test]
    fn test_with_policy() {
        let formula =
            Formula::new("#{abcdefghij1}").with_policy(MissingValuePolicy::SkipIfAnyMissing);
        assert_eq!(formula.policy, MissingValuePolicy::SkipIfAnyMissing);
    }

    #[test]
    fn test_serde_defaults_policy() {
        let formula: Formula = serde_json::from_str(r#"{"expression": "1 + 2"}"#).unwrap();
        assert_eq!(formula.policy, MissingValuePolicy::NeverSkip);
    }
}
