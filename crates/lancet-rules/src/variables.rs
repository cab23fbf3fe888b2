//! Variable table construction
//!
//! Turns declared rule variables plus an enrollment's captured data into
//! the `name -> value` table rule conditions read, and fills the `V{...}`
//! environment table. Event-sourced variables follow the event list sorted
//! by date ascending, ties kept in input order; "newest" is the last event
//! in that order carrying the field, "previous" the last one positioned
//! before the current event.

use chrono::NaiveDate;

use lancet_core::{RuleSet, Value, VariableSource};
use lancet_expr::{ValueContext, VariableValue};

use crate::entity::{RuleEnrollment, RuleEvent};

/// Everything one evaluation pass sees
pub(crate) struct EvalScope<'a> {
    pub enrollment: Option<&'a RuleEnrollment>,
    pub events: &'a [RuleEvent],
    pub current_event: Option<&'a RuleEvent>,
    pub today: NaiveDate,
}

pub(crate) fn build_context(scope: &EvalScope, rule_set: &RuleSet) -> ValueContext {
    let mut ctx = ValueContext::new();
    ctx.constants = rule_set.constants.clone();

    let mut ordered: Vec<&RuleEvent> = scope.events.iter().collect();
    ordered.sort_by_key(|e| e.event_date);
    let current_index = scope
        .current_event
        .and_then(|current| ordered.iter().position(|e| e.event == current.event));

    for variable in &rule_set.variables {
        let raw = match variable.source {
            VariableSource::CurrentEvent => scope
                .current_event
                .and_then(|event| event.data_values.get(&variable.field)),
            VariableSource::PreviousEvent => {
                let older = match current_index {
                    Some(index) => &ordered[..index],
                    // Current event not in the list: fall back to dates.
                    None => match scope.current_event {
                        Some(current) => {
                            let first_same_or_later = ordered
                                .iter()
                                .position(|e| e.event_date >= current.event_date)
                                .unwrap_or(ordered.len());
                            &ordered[..first_same_or_later]
                        }
                        None => &[],
                    },
                };
                newest_value(older, &variable.field)
            }
            VariableSource::NewestEvent => newest_value(&ordered, &variable.field),
            VariableSource::NewestStageEvent => match &variable.program_stage {
                Some(stage) => {
                    let staged: Vec<&RuleEvent> = ordered
                        .iter()
                        .copied()
                        .filter(|e| &e.program_stage == stage)
                        .collect();
                    newest_value(&staged, &variable.field)
                }
                None => {
                    tracing::warn!(
                        variable = %variable.name,
                        "newest-stage-event variable has no program stage"
                    );
                    None
                }
            },
            VariableSource::Attribute => scope
                .enrollment
                .and_then(|enrollment| enrollment.attributes.get(&variable.field)),
            // Populated by Assign actions during the pass, never here.
            VariableSource::CalculatedValue => None,
        };

        let value = match raw {
            Some(raw) => VariableValue::of_raw(raw, variable.value_type),
            None => VariableValue::empty(variable.value_type),
        };
        ctx.variables.insert(variable.name.clone(), value);
    }

    fill_environment(&mut ctx, scope);
    ctx
}

/// Value of the field on the latest event carrying it.
fn newest_value<'a>(events: &[&'a RuleEvent], field: &str) -> Option<&'a String> {
    events
        .iter()
        .rev()
        .find_map(|event| event.data_values.get(field))
}

fn fill_environment(ctx: &mut ValueContext, scope: &EvalScope) {
    let env = &mut ctx.environment;
    env.insert("current_date".into(), date_value(scope.today));
    env.insert(
        "event_count".into(),
        Value::Number(scope.events.len() as f64),
    );
    env.insert(
        "enrollment_count".into(),
        Value::Number(if scope.enrollment.is_some() { 1.0 } else { 0.0 }),
    );

    if let Some(event) = scope.current_event {
        env.insert("event_date".into(), date_value(event.event_date));
        env.insert("due_date".into(), date_value(event.event_date));
    }
    if let Some(enrollment) = scope.enrollment {
        env.insert(
            "enrollment_date".into(),
            date_value(enrollment.enrollment_date),
        );
        env.insert(
            "enrollment_id".into(),
            Value::Text(enrollment.enrollment.clone()),
        );
        if let Some(incident) = enrollment.incident_date {
            env.insert("incident_date".into(), date_value(incident));
        }
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}
