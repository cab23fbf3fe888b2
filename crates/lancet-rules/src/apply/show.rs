//! `ShowError` and `ShowWarning` effects
//!
//! The issue message is the static content with the effect's evaluated
//! data appended. `on_complete` actions only fire once the snapshot is
//! marked completed.

use lancet_core::{Issue, RuleEffect, Severity};

use crate::entity::EntitySnapshot;

use super::ApplyReport;

pub(super) fn apply(
    effect: &RuleEffect,
    severity: Severity,
    field: Option<&str>,
    content: &str,
    on_complete: bool,
    entity: &EntitySnapshot,
    report: &mut ApplyReport,
) {
    if on_complete && !entity.completed {
        tracing::debug!(rule = %effect.rule, "entity not completed, holding message back");
        return;
    }
    let mut message = content.to_owned();
    if let Some(data) = effect.data.as_deref() {
        message.push_str(data);
    }
    let mut issue = match severity {
        Severity::Error => Issue::error(effect.rule.clone(), message),
        Severity::Warning => Issue::warning(effect.rule.clone(), message),
    };
    if let Some(field) = field {
        issue = issue.with_field(field);
    }
    report.issues.push(issue);
}
