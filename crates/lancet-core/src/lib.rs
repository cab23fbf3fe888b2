//! Lancet Core - Shared types for the Lancet rule and formula engine
//!
//! This crate provides the fundamental types used across the Lancet
//! workspace:
//! - Runtime values and declared field types
//! - Dimensional item references
//! - Formula and missing-value policy definitions
//! - The program-rule model (rules, actions, variables, effects)
//! - Validation issues and UI hints
//! - Error types

pub mod error;
pub mod formula;
pub mod issue;
pub mod item;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use formula::{Formula, MissingValuePolicy};
pub use issue::{Issue, Severity, UiHint};
pub use item::ItemId;
pub use rule::{Rule, RuleAction, RuleEffect, RuleSet, RuleVariable, VariableSource};
pub use types::{Value, ValueType};
