//! `Assign` effects: write computed values into entity fields
//!
//! A write is always reported as a warning issue so hosts can tell users
//! the field was calculated. Writing over a different existing value is a
//! conflict unless the engine config allows overwrites.

use lancet_core::types::values_equal;
use lancet_core::{Issue, RuleEffect, ValueType};

use crate::entity::EntitySnapshot;

use super::{ApplyReport, EffectApplier};

pub(super) fn apply(
    applier: &EffectApplier,
    effect: &RuleEffect,
    field: &str,
    entity: &mut EntitySnapshot,
    report: &mut ApplyReport,
) {
    let Some(assigned) = effect.data.as_deref() else {
        tracing::debug!(rule = %effect.rule, field, "assign produced no value, skipping");
        return;
    };
    // A host that supplies field types also defines which fields exist on
    // the form; assigns to unknown fields are dropped without an issue.
    if let Some(types) = &applier.field_types {
        if types.value_type(field).is_none() {
            tracing::debug!(field, "assigned field not on the form, skipping");
            return;
        }
    }

    if entity.is_blank(field) {
        entity.set(field, assigned);
        report.issues.push(assigned_warning(effect, field));
        return;
    }

    let existing = entity.value(field).unwrap_or_default().to_owned();
    if values_match(applier, field, &existing, assigned) {
        report.issues.push(assigned_warning(effect, field));
    } else if applier.config.allow_assign_overwrite {
        entity.set(field, assigned);
        report.issues.push(assigned_warning(effect, field));
    } else {
        report.issues.push(
            Issue::error(
                effect.rule.clone(),
                format!("field already holds '{existing}', not overwriting"),
            )
            .with_field(field),
        );
    }
}

fn assigned_warning(effect: &RuleEffect, field: &str) -> Issue {
    Issue::warning(effect.rule.clone(), "value assigned by rule").with_field(field)
}

/// Compare under the field's declared type; no declared type means text.
fn values_match(applier: &EffectApplier, field: &str, existing: &str, assigned: &str) -> bool {
    let value_type = applier
        .field_types
        .as_ref()
        .and_then(|types| types.value_type(field))
        .unwrap_or(ValueType::Text);
    values_equal(existing, assigned, value_type)
}
