//! Validation issues and UI hints produced when effects are applied

use serde::{Deserialize, Serialize};

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One validation finding for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Uid of the rule whose effect raised the issue
    pub rule: String,
    /// Field the issue is about, when it is about one
    pub field: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            field: None,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            field: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Attach the field the issue is about.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Form-rendering hint emitted by hide actions; never mutates data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiHint {
    HideField { field: String },
    HideSection { section: String },
}
