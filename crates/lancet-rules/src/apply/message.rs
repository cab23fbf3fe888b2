//! `SendMessage` and `ScheduleMessage` effects
//!
//! Both resolve the template, consult the delivery log so one (template,
//! entity) pair is notified once, and hand the message to the configured
//! notifier. Templates flagged repeatable bypass the log. Failed dispatch
//! degrades to a warning issue so one broken channel cannot fail the
//! whole batch.

use chrono::NaiveDate;

use lancet_core::{Issue, RuleEffect};

use crate::entity::EntitySnapshot;
use crate::services::OutboundMessage;

use super::{ApplyReport, EffectApplier};

pub(super) fn send(
    applier: &EffectApplier,
    effect: &RuleEffect,
    template_id: &str,
    entity: &EntitySnapshot,
    report: &mut ApplyReport,
) {
    dispatch(applier, effect, template_id, None, entity, report);
}

pub(super) fn schedule(
    applier: &EffectApplier,
    effect: &RuleEffect,
    template_id: &str,
    entity: &EntitySnapshot,
    report: &mut ApplyReport,
) {
    let scheduled_for = match effect.data.as_deref().map(|d| d.parse::<NaiveDate>()) {
        Some(Ok(date)) => date,
        _ => {
            report.issues.push(Issue::warning(
                effect.rule.clone(),
                "schedule date did not evaluate to an ISO date",
            ));
            return;
        }
    };
    dispatch(applier, effect, template_id, Some(scheduled_for), entity, report);
}

fn dispatch(
    applier: &EffectApplier,
    effect: &RuleEffect,
    template_id: &str,
    scheduled_for: Option<NaiveDate>,
    entity: &EntitySnapshot,
    report: &mut ApplyReport,
) {
    let Some(notifier) = &applier.notifier else {
        tracing::debug!(template = template_id, "no notifier configured, skipping message");
        return;
    };
    let template = match applier
        .templates
        .as_ref()
        .and_then(|store| store.template(template_id))
    {
        Some(template) => template,
        None => {
            tracing::warn!(template = template_id, "unknown message template, skipping");
            return;
        }
    };

    let already_sent = applier
        .delivery_log
        .as_ref()
        .map_or(false, |log| log.was_sent(template_id, &entity.entity));
    if already_sent && !template.send_repeatable {
        tracing::debug!(
            template = template_id,
            entity = %entity.entity,
            "already delivered, skipping"
        );
        return;
    }

    let outbound = OutboundMessage {
        template: template.id.clone(),
        entity: entity.entity.clone(),
        subject: template.subject.clone(),
        body: template.body.clone(),
        scheduled_for,
    };
    match notifier.send(&outbound) {
        Ok(()) => {
            if let Some(log) = &applier.delivery_log {
                log.record(template_id, &entity.entity);
            }
        }
        Err(err) => {
            report.issues.push(Issue::warning(
                effect.rule.clone(),
                format!("notification dispatch failed: {err}"),
            ));
        }
    }
}
