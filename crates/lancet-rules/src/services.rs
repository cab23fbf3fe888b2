//! Host collaborator traits
//!
//! The applier talks to the host through these seams: template lookup,
//! delivery deduplication, dispatch and field metadata. Memory-backed
//! implementations are provided for testing and development; production
//! hosts wire their own stores behind the same traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lancet_core::ValueType;

use crate::error::Result;

/// A notification template referenced by `SendMessage` / `ScheduleMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Template uid
    pub id: String,
    pub subject: String,
    pub body: String,
    /// Repeatable templates bypass the once-per-entity delivery guard
    #[serde(default)]
    pub send_repeatable: bool,
}

impl MessageTemplate {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            body: body.into(),
            send_repeatable: false,
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.send_repeatable = true;
        self
    }
}

/// A rendered notification handed to the dispatch collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Template uid the message came from
    pub template: String,
    /// Uid of the entity the rule fired for
    pub entity: String,
    pub subject: String,
    pub body: String,
    /// Target date for scheduled messages
    pub scheduled_for: Option<NaiveDate>,
}

/// Template lookup by uid
pub trait TemplateStore: Send + Sync {
    fn template(&self, id: &str) -> Option<MessageTemplate>;
}

/// External record of which (template, entity) pairs were already notified
pub trait DeliveryLog: Send + Sync {
    fn was_sent(&self, template: &str, entity: &str) -> bool;

    fn record(&self, template: &str, entity: &str);
}

/// Dispatch seam; the library never performs transport itself
pub trait Notifier: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Field metadata: declared value type per data element or attribute uid.
/// `None` means the field is not on the form under validation.
pub trait FieldTypes: Send + Sync {
    fn value_type(&self, field: &str) -> Option<ValueType>;
}

/// In-memory template store
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, MessageTemplate>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: MessageTemplate) -> Self {
        self.templates.insert(template.id.clone(), template);
        self
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn template(&self, id: &str) -> Option<MessageTemplate> {
        self.templates.get(id).cloned()
    }
}

/// In-memory delivery log
#[derive(Debug, Default)]
pub struct MemoryDeliveryLog {
    sent: Mutex<HashSet<(String, String)>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeliveryLog for MemoryDeliveryLog {
    fn was_sent(&self, template: &str, entity: &str) -> bool {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.contains(&(template.to_string(), entity.to_string()))
    }

    fn record(&self, template: &str, entity: &str) {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.insert((template.to_string(), entity.to_string()));
    }
}

/// Recording notifier that keeps every dispatched message
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages dispatched so far, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push(message.clone());
        Ok(())
    }
}

/// In-memory field dictionary
#[derive(Debug, Clone, Default)]
pub struct MemoryFieldTypes {
    fields: HashMap<String, ValueType>,
}

impl MemoryFieldTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.insert(field.into(), value_type);
        self
    }
}

impl FieldTypes for MemoryFieldTypes {
    fn value_type(&self, field: &str) -> Option<ValueType> {
        self.fields.get(field).copied()
    }
}
