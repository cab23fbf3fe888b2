//! Effect application
//!
//! Takes the ordered effect list from an evaluation pass and applies it to
//! one entity snapshot: assigns write field values, validation actions
//! collect issues, notification actions dispatch through the configured
//! services, hide actions collect UI hints. Effects apply strictly in
//! engine order, so an `Assign` always lands before a `SetMandatory`
//! checking the same field.

mod assign;
mod hide;
mod mandatory;
mod message;
mod show;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lancet_core::{Issue, RuleAction, RuleEffect, Severity, UiHint};

use crate::engine::EngineConfig;
use crate::entity::EntitySnapshot;
use crate::services::{DeliveryLog, FieldTypes, Notifier, TemplateStore};

/// Everything applying one effect list produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub issues: Vec<Issue>,
    pub hints: Vec<UiHint>,
}

impl ApplyReport {
    /// True when any issue is an error; hosts block completion on this.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }
}

/// Applies rule effects to entity snapshots
pub struct EffectApplier {
    config: EngineConfig,
    field_types: Option<Arc<dyn FieldTypes>>,
    templates: Option<Arc<dyn TemplateStore>>,
    delivery_log: Option<Arc<dyn DeliveryLog>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl EffectApplier {
    /// Create an applier with default config and no services attached.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            field_types: None,
            templates: None,
            delivery_log: None,
            notifier: None,
        }
    }

    /// Set the form-field type lookup; without it assigns treat every
    /// field as an existing text field.
    pub fn with_field_types(mut self, field_types: Arc<dyn FieldTypes>) -> Self {
        self.field_types = Some(field_types);
        self
    }

    /// Set the message template store.
    pub fn with_templates(mut self, templates: Arc<dyn TemplateStore>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set the delivery log used to deduplicate notifications.
    pub fn with_delivery_log(mut self, delivery_log: Arc<dyn DeliveryLog>) -> Self {
        self.delivery_log = Some(delivery_log);
        self
    }

    /// Set the notification dispatcher.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Apply every effect to the snapshot, in order.
    pub fn apply(&self, effects: &[RuleEffect], entity: &mut EntitySnapshot) -> ApplyReport {
        let mut report = ApplyReport::default();
        for effect in effects {
            match &effect.action {
                RuleAction::Assign { field, .. } => {
                    assign::apply(self, effect, field, entity, &mut report);
                }
                RuleAction::SetMandatory { field } => {
                    mandatory::apply(effect, field, entity, &mut report);
                }
                RuleAction::ShowError {
                    field,
                    content,
                    on_complete,
                    ..
                } => show::apply(
                    effect,
                    Severity::Error,
                    field.as_deref(),
                    content,
                    *on_complete,
                    entity,
                    &mut report,
                ),
                RuleAction::ShowWarning {
                    field,
                    content,
                    on_complete,
                    ..
                } => show::apply(
                    effect,
                    Severity::Warning,
                    field.as_deref(),
                    content,
                    *on_complete,
                    entity,
                    &mut report,
                ),
                RuleAction::SendMessage { template } => {
                    message::send(self, effect, template, entity, &mut report);
                }
                RuleAction::ScheduleMessage { template, .. } => {
                    message::schedule(self, effect, template, entity, &mut report);
                }
                RuleAction::HideField { field } => hide::field(field, &mut report),
                RuleAction::HideSection { section } => hide::section(section, &mut report),
            }
        }
        tracing::debug!(
            issues = report.issues.len(),
            hints = report.hints.len(),
            "effects applied"
        );
        report
    }
}

impl Default for EffectApplier {
    fn default() -> Self {
        Self::new()
    }
}
