//! `SetMandatory` effects: require a field to be filled

use lancet_core::{Issue, RuleEffect};

use crate::entity::EntitySnapshot;

use super::ApplyReport;

pub(super) fn apply(
    effect: &RuleEffect,
    field: &str,
    entity: &EntitySnapshot,
    report: &mut ApplyReport,
) {
    if entity.is_blank(field) {
        report.issues.push(
            Issue::error(effect.rule.clone(), "field is mandatory and has no value")
                .with_field(field),
        );
    }
}
