//! Rule engine
//!
//! One evaluation pass walks a program's rules in priority order against an
//! immutable entity scope. The pass moves through explicit phases: compile
//! every formula fresh, evaluate conditions (applying `Assign` results to
//! the variable table so later conditions see them), then collect the
//! ordered effect list. Rule-level failures are recorded as skip
//! diagnostics, never aborting the other rules.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use lancet_core::{Rule, RuleAction, RuleEffect, RuleSet, VariableSource};
use lancet_expr::{
    evaluate_condition, evaluate_value, parse, ParseMode, ParsedFormula, ValueContext,
    VariableValue,
};

use crate::entity::{RuleEnrollment, RuleEvent};
use crate::variables::{self, EvalScope};

/// Engine switches, passed explicitly rather than read from ambient state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow `Assign` to overwrite a non-empty, different field value.
    /// Off by default: conflicting assigns become `Error` issues.
    #[serde(default)]
    pub allow_assign_overwrite: bool,
}

/// Outcome of one pass: effects in engine order plus skip diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub effects: Vec<RuleEffect>,
    pub skipped: Vec<SkippedRule>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// A rule that could not be evaluated this pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRule {
    /// Rule uid
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Compile,
    EvaluateConditions,
    CollectEffects,
    Done,
}

/// Evaluates program rules against enrollments and events
pub struct RuleEngine {
    config: EngineConfig,
    today: NaiveDate,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            today: Local::now().date_naive(),
        }
    }

    /// Pin the evaluation date; defaults to the construction date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate the rules that apply to one event. `events` is the
    /// enrollment's full event list, current event included.
    pub fn evaluate_event(
        &self,
        rule_set: &RuleSet,
        enrollment: Option<&RuleEnrollment>,
        events: &[RuleEvent],
        current_event: &RuleEvent,
    ) -> Evaluation {
        let scoped = scoped_rules(rule_set, enrollment, Some(current_event));
        let scope = EvalScope {
            enrollment,
            events,
            current_event: Some(current_event),
            today: self.today,
        };
        let ctx = variables::build_context(&scope, rule_set);
        run_pass(scoped, ctx, rule_set)
    }

    /// Evaluate the stage-unbound rules against the enrollment itself.
    pub fn evaluate_enrollment(
        &self,
        rule_set: &RuleSet,
        enrollment: &RuleEnrollment,
        events: &[RuleEvent],
    ) -> Evaluation {
        let scoped = scoped_rules(rule_set, Some(enrollment), None);
        let scope = EvalScope {
            enrollment: Some(enrollment),
            events,
            current_event: None,
            today: self.today,
        };
        let ctx = variables::build_context(&scope, rule_set);
        run_pass(scoped, ctx, rule_set)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Rules in scope for this pass, sorted by ascending priority with absent
/// priority last; ties keep declaration order.
fn scoped_rules<'a>(
    rule_set: &'a RuleSet,
    enrollment: Option<&RuleEnrollment>,
    current_event: Option<&RuleEvent>,
) -> Vec<&'a Rule> {
    let mut scoped: Vec<&Rule> = rule_set
        .rules
        .iter()
        .filter(|rule| match (&rule.program_stage, current_event) {
            (None, _) => true,
            (Some(stage), Some(event)) => stage == &event.program_stage,
            (Some(_), None) => false,
        })
        .filter(|rule| enrollment.map_or(true, |e| rule.program == e.program))
        .collect();
    scoped.sort_by_key(|rule| rule.priority.map_or(i64::MAX, i64::from));
    scoped
}

fn run_pass(scoped: Vec<&Rule>, mut ctx: ValueContext, rule_set: &RuleSet) -> Evaluation {
    let mut phase = Phase::Compile;
    tracing::debug!(?phase, rules = scoped.len(), "pass started");
    let mut skipped = Vec::new();
    let compiled = compile(&scoped, &mut skipped);

    phase = Phase::EvaluateConditions;
    tracing::debug!(?phase, compiled = compiled.len());
    let mut triggered: Vec<(usize, Vec<Option<String>>)> = Vec::new();
    for (index, entry) in compiled.iter().enumerate() {
        match evaluate_condition(&entry.condition, &ctx) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                tracing::warn!(rule = %entry.rule.id, error = %err, "skipping rule");
                skipped.push(SkippedRule {
                    rule: entry.rule.id.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        }

        // Compute action data at this rule's position, so an Assign is
        // visible to every later condition and data formula in the pass.
        let mut data_values = Vec::with_capacity(entry.rule.actions.len());
        for (action, data_formula) in entry.rule.actions.iter().zip(&entry.data) {
            let data = data_formula.as_ref().and_then(|parsed| {
                match evaluate_value(parsed, &ctx) {
                    Ok(value) => value.map(|v| v.render()),
                    Err(err) => {
                        tracing::warn!(
                            rule = %entry.rule.id,
                            error = %err,
                            "action data failed to evaluate"
                        );
                        None
                    }
                }
            });
            if let (RuleAction::Assign { field, .. }, Some(raw)) = (action, &data) {
                refresh_variables(&mut ctx, rule_set, field, raw);
            }
            data_values.push(data);
        }
        triggered.push((index, data_values));
    }

    phase = Phase::CollectEffects;
    tracing::debug!(?phase, triggered = triggered.len());
    let mut effects = Vec::new();
    for (index, data_values) in triggered {
        let rule = compiled[index].rule;
        for (action, data) in rule.actions.iter().zip(data_values) {
            effects.push(RuleEffect::new(rule.id.clone(), action.clone(), data));
        }
    }

    phase = Phase::Done;
    tracing::debug!(?phase, effects = effects.len(), skipped = skipped.len());
    Evaluation { effects, skipped }
}

struct CompiledRule<'a> {
    rule: &'a Rule,
    condition: ParsedFormula,
    /// Parsed data formulas aligned with the rule's actions
    data: Vec<Option<ParsedFormula>>,
}

/// Parse conditions and action data fresh each pass; a rule with any
/// malformed formula is skipped whole, with a diagnostic.
fn compile<'a>(scoped: &[&'a Rule], skipped: &mut Vec<SkippedRule>) -> Vec<CompiledRule<'a>> {
    let mut compiled = Vec::with_capacity(scoped.len());
    'rules: for rule in scoped {
        let condition = match parse(&rule.condition, ParseMode::RuleCondition) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(rule = %rule.id, error = %err, "condition failed to parse");
                skipped.push(SkippedRule {
                    rule: rule.id.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let mut data = Vec::with_capacity(rule.actions.len());
        for action in &rule.actions {
            match action.data_formula() {
                Some(text) => match parse(text, ParseMode::RuleCondition) {
                    Ok(parsed) => data.push(Some(parsed)),
                    Err(err) => {
                        tracing::warn!(rule = %rule.id, error = %err, "action data failed to parse");
                        skipped.push(SkippedRule {
                            rule: rule.id.clone(),
                            reason: err.to_string(),
                        });
                        continue 'rules;
                    }
                },
                None => data.push(None),
            }
        }
        compiled.push(CompiledRule {
            rule,
            condition,
            data,
        });
    }
    compiled
}

/// After an assign lands, refresh the variables that read the assigned
/// field on the entity under evaluation, plus any variable the action
/// targets by name.
fn refresh_variables(ctx: &mut ValueContext, rule_set: &RuleSet, field: &str, raw: &str) {
    for variable in &rule_set.variables {
        let by_field = variable.field == field
            && matches!(
                variable.source,
                VariableSource::CurrentEvent
                    | VariableSource::Attribute
                    | VariableSource::CalculatedValue
            );
        let by_name = variable.name == field;
        if by_field || by_name {
            tracing::debug!(variable = %variable.name, "refreshed after assign");
            ctx.variables.insert(
                variable.name.clone(),
                VariableValue::of_raw(raw, variable.value_type),
            );
        }
    }
}
