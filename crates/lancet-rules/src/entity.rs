//! Tracker entities under evaluation
//!
//! Plain data carriers the host builds from its own storage. The engine
//! never loads anything itself; an evaluation sees exactly the enrollment
//! and events it is handed.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One captured event of an enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvent {
    /// Event uid
    pub event: String,
    /// Stage the event belongs to
    pub program_stage: String,
    pub event_date: NaiveDate,
    /// Data element uid -> raw captured value
    #[serde(default)]
    pub data_values: HashMap<String, String>,
}

impl RuleEvent {
    pub fn new(
        event: impl Into<String>,
        program_stage: impl Into<String>,
        event_date: NaiveDate,
    ) -> Self {
        Self {
            event: event.into(),
            program_stage: program_stage.into(),
            event_date,
            data_values: HashMap::new(),
        }
    }

    /// Record a captured data value.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.data_values.insert(field.into(), value.into());
        self
    }
}

/// A program enrollment with its tracked-entity attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEnrollment {
    /// Enrollment uid
    pub enrollment: String,
    /// Program uid
    pub program: String,
    pub enrollment_date: NaiveDate,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    /// Attribute uid -> raw value
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl RuleEnrollment {
    pub fn new(
        enrollment: impl Into<String>,
        program: impl Into<String>,
        enrollment_date: NaiveDate,
    ) -> Self {
        Self {
            enrollment: enrollment.into(),
            program: program.into(),
            enrollment_date,
            incident_date: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_incident_date(mut self, date: NaiveDate) -> Self {
        self.incident_date = Some(date);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }
}

/// The mutable form state that effects apply onto: an event's data values
/// or an enrollment's attributes, keyed by field uid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Uid of the event or enrollment being validated
    pub entity: String,
    /// Completed entities additionally fire `on_complete` diagnostics
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl EntitySnapshot {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            completed: false,
            values: HashMap::new(),
        }
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// True when the field is absent or holds only whitespace.
    pub fn is_blank(&self, field: &str) -> bool {
        self.value(field).map_or(true, |v| v.trim().is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }
}
