//! Lancet Rules - Program-rule evaluation for tracker data
//!
//! This crate evaluates program rules against enrollments and their
//! events, then applies the resulting effects to an entity snapshot:
//! field assignment, validation issues, notifications and UI hints.
//!
//! The flow is two stages. [`RuleEngine`] builds the variable table for
//! the entity under evaluation, walks the rules in priority order and
//! produces an ordered [`Evaluation`]. [`EffectApplier`] then applies
//! those effects against the form snapshot, talking to whatever template,
//! delivery-log and notifier services the host attached.

pub mod apply;
pub mod engine;
pub mod entity;
pub mod error;
pub mod services;

mod variables;

// Re-export main types
pub use apply::{ApplyReport, EffectApplier};
pub use engine::{EngineConfig, Evaluation, RuleEngine, SkippedRule};
pub use entity::{EntitySnapshot, RuleEnrollment, RuleEvent};
pub use error::{EngineError, Result};
pub use services::{
    DeliveryLog, FieldTypes, MemoryDeliveryLog, MemoryFieldTypes, MemoryNotifier,
    MemoryTemplateStore, MessageTemplate, Notifier, OutboundMessage, TemplateStore,
};
