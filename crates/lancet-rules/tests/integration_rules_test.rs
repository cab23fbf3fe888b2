//! Integration tests for rule evaluation and effect application
//!
//! Rule metadata arrives as YAML, the way hosts ship it, and every test
//! drives the full path: build the variable table, evaluate the rules,
//! apply the effects to a form snapshot.

use std::sync::Arc;

use chrono::NaiveDate;

use lancet_core::{RuleSet, Severity, ValueType};
use lancet_rules::{
    EffectApplier, EngineConfig, EntitySnapshot, MemoryDeliveryLog, MemoryFieldTypes,
    MemoryNotifier, MemoryTemplateStore, MessageTemplate, RuleEngine, RuleEnrollment, RuleEvent,
};

fn rule_set(yaml: &str) -> RuleSet {
    serde_yaml::from_str(yaml).expect("fixture parses")
}

fn date(text: &str) -> NaiveDate {
    text.parse().expect("fixture date")
}

fn engine() -> RuleEngine {
    RuleEngine::new().with_today(date("2021-06-15"))
}

// ============================================================================
// Assign chains
// ============================================================================

const GROWTH_RULES: &str = r##"
variables:
  - name: weight
    field: de-weight
    value_type: Number
    source: CurrentEvent
  - name: double_weight
    field: de-double
    value_type: Number
    source: CurrentEvent
rules:
  - id: doubler
    program: prog-growth
    priority: 1
    condition: "d2:hasValue(#{weight})"
    actions:
      - !Assign
        field: de-double
        value: "#{weight} * 2"
  - id: checker
    program: prog-growth
    priority: 2
    condition: "#{double_weight} > 150"
    actions:
      - !ShowWarning
        field: de-double
        content: "doubled weight is "
        data: "#{double_weight}"
"##;

#[test]
fn test_assign_result_drives_later_rule_and_lands_on_the_form() {
    let rules = rule_set(GROWTH_RULES);
    let event =
        RuleEvent::new("ev-1", "stage-1", date("2021-06-10")).with_value("de-weight", "80");

    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);
    assert_eq!(evaluation.effects.len(), 2);
    assert!(evaluation.skipped.is_empty());

    let applier = EffectApplier::new().with_field_types(Arc::new(
        MemoryFieldTypes::new()
            .with_field("de-weight", ValueType::Number)
            .with_field("de-double", ValueType::Number),
    ));
    let mut form = EntitySnapshot::new("tei-1");
    let report = applier.apply(&evaluation.effects, &mut form);

    assert_eq!(form.value("de-double"), Some("160"));
    assert!(!report.has_errors());
    let shown = report
        .issues
        .iter()
        .find(|issue| issue.rule == "checker")
        .expect("checker warning present");
    assert_eq!(shown.message, "doubled weight is 160");
}

#[test]
fn test_below_threshold_only_assigns() {
    let rules = rule_set(GROWTH_RULES);
    let event =
        RuleEvent::new("ev-1", "stage-1", date("2021-06-10")).with_value("de-weight", "60");

    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);
    assert_eq!(evaluation.effects.len(), 1);
    assert_eq!(evaluation.effects[0].rule, "doubler");
    assert_eq!(evaluation.effects[0].data.as_deref(), Some("120"));
}

const DOSE_RULES: &str = r#"
variables:
  - name: weight
    field: de-weight
    value_type: Number
    source: CurrentEvent
rules:
  - id: dose-calc
    program: prog-vacc
    condition: "d2:hasValue(#{weight})"
    actions:
      - !Assign
        field: de-dose
        value: "d2:round(#{weight} / 10)"
"#;

#[test]
fn test_assign_conflicts_follow_the_overwrite_config() {
    let rules = rule_set(DOSE_RULES);
    let event =
        RuleEvent::new("ev-1", "stage-1", date("2021-06-10")).with_value("de-weight", "52");
    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);
    assert_eq!(evaluation.effects[0].data.as_deref(), Some("5"));

    let types = Arc::new(
        MemoryFieldTypes::new()
            .with_field("de-weight", ValueType::Number)
            .with_field("de-dose", ValueType::Number),
    );
    let applier = EffectApplier::new().with_field_types(types.clone());

    // Blank field: the value lands, flagged as a warning.
    let mut blank = EntitySnapshot::new("tei-1");
    let report = applier.apply(&evaluation.effects, &mut blank);
    assert_eq!(blank.value("de-dose"), Some("5"));
    assert!(!report.has_errors());

    // Numerically equal value: warning, field kept as entered.
    let mut same = EntitySnapshot::new("tei-2").with_value("de-dose", "5.0");
    let report = applier.apply(&evaluation.effects, &mut same);
    assert_eq!(same.value("de-dose"), Some("5.0"));
    assert!(!report.has_errors());

    // Conflicting value: error, field untouched.
    let mut conflicting = EntitySnapshot::new("tei-3").with_value("de-dose", "7");
    let report = applier.apply(&evaluation.effects, &mut conflicting);
    assert_eq!(conflicting.value("de-dose"), Some("7"));
    assert!(report.has_errors());

    // Same conflict with overwrites enabled: the computed value wins.
    let overwriting = EffectApplier::with_config(EngineConfig {
        allow_assign_overwrite: true,
    })
    .with_field_types(types);
    let mut conflicting = EntitySnapshot::new("tei-4").with_value("de-dose", "7");
    let report = overwriting.apply(&evaluation.effects, &mut conflicting);
    assert_eq!(conflicting.value("de-dose"), Some("5"));
    assert!(!report.has_errors());
}

#[test]
fn test_mandatory_field_satisfied_by_earlier_assign() {
    let rules = rule_set(
        r#"
variables:
  - name: weight
    field: de-weight
    value_type: Number
    source: CurrentEvent
rules:
  - id: dose-calc
    program: prog-vacc
    priority: 1
    condition: "d2:hasValue(#{weight})"
    actions:
      - !Assign
        field: de-dose
        value: "d2:round(#{weight} / 10)"
  - id: dose-required
    program: prog-vacc
    priority: 2
    condition: "true"
    actions:
      - !SetMandatory
        field: de-dose
"#,
    );
    let event =
        RuleEvent::new("ev-1", "stage-1", date("2021-06-10")).with_value("de-weight", "52");

    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);
    let mut form = EntitySnapshot::new("tei-1");
    let report = EffectApplier::new().apply(&evaluation.effects, &mut form);

    assert_eq!(form.value("de-dose"), Some("5"));
    assert!(!report.has_errors());
}

// ============================================================================
// Conditions over variables, history and environment
// ============================================================================

const HEMOGLOBIN_RULES: &str = r##"
variables:
  - name: hemoglobin
    field: de-hb
    value_type: Number
    source: CurrentEvent
rules:
  - id: hb-high
    program: prog-anc
    condition: "d2:hasValue(#{hemoglobin}) && #{hemoglobin} > 10"
    actions:
      - !ShowWarning
        field: de-hb
        content: "hemoglobin above threshold: "
        data: "#{hemoglobin}"
"##;

#[test]
fn test_has_value_guard_paired_with_comparison() {
    let rules = rule_set(HEMOGLOBIN_RULES);

    let filled = RuleEvent::new("ev-1", "stage-1", date("2021-06-10")).with_value("de-hb", "15");
    let evaluation = engine().evaluate_event(&rules, None, &[filled.clone()], &filled);
    assert_eq!(evaluation.effects.len(), 1);

    let blank = RuleEvent::new("ev-2", "stage-1", date("2021-06-10"));
    let evaluation = engine().evaluate_event(&rules, None, &[blank.clone()], &blank);
    assert!(evaluation.effects.is_empty());
    assert!(evaluation.skipped.is_empty());
}

#[test]
fn test_previous_event_feeds_trend_warning() {
    let rules = rule_set(
        r##"
variables:
  - name: current_hb
    field: de-hb
    value_type: Number
    source: CurrentEvent
  - name: previous_hb
    field: de-hb
    value_type: Number
    source: PreviousEvent
rules:
  - id: hb-trend
    program: prog-anc
    condition: "d2:hasValue(#{previous_hb}) && #{current_hb} < #{previous_hb}"
    actions:
      - !ShowWarning
        field: de-hb
        content: "hemoglobin dropping, was "
        data: "#{previous_hb}"
"##,
    );
    let earlier =
        RuleEvent::new("ev-1", "stage-anc", date("2021-06-01")).with_value("de-hb", "11");
    let current =
        RuleEvent::new("ev-2", "stage-anc", date("2021-06-10")).with_value("de-hb", "9");
    let events = vec![earlier, current.clone()];

    let evaluation = engine().evaluate_event(&rules, None, &events, &current);
    assert_eq!(evaluation.effects.len(), 1);

    let mut form = EntitySnapshot::new("tei-1");
    let report = EffectApplier::new().apply(&evaluation.effects, &mut form);
    assert_eq!(report.issues[0].message, "hemoglobin dropping, was 11");
    assert_eq!(report.issues[0].severity, Severity::Warning);
}

#[test]
fn test_enrollment_pass_reads_attributes_and_dates() {
    let rules = rule_set(
        r#"
variables:
  - name: birth_date
    field: at-bd
    value_type: Date
    source: Attribute
rules:
  - id: underage
    program: prog-anc
    condition: "d2:yearsBetween(A{birth_date}, V{enrollment_date}) < 18"
    actions:
      - !ShowError
        content: "client under 18 at enrollment"
"#,
    );
    let enrollment = RuleEnrollment::new("en-1", "prog-anc", date("2021-06-01"))
        .with_attribute("at-bd", "2005-03-01");

    let evaluation = engine().evaluate_enrollment(&rules, &enrollment, &[]);
    assert_eq!(evaluation.effects.len(), 1);

    let mut form = EntitySnapshot::new("tei-1");
    let report = EffectApplier::new().apply(&evaluation.effects, &mut form);
    assert!(report.has_errors());
    assert_eq!(report.issues[0].message, "client under 18 at enrollment");
}

#[test]
fn test_stage_scoped_rule_only_fires_for_its_stage() {
    let rules = rule_set(
        r#"
rules:
  - id: delivery-only
    program: prog-anc
    program_stage: stage-delivery
    condition: "true"
    actions:
      - !HideField
        field: de-apgar
"#,
    );

    let anc_visit = RuleEvent::new("ev-1", "stage-anc", date("2021-06-10"));
    let evaluation = engine().evaluate_event(&rules, None, &[anc_visit.clone()], &anc_visit);
    assert!(evaluation.effects.is_empty());

    let delivery = RuleEvent::new("ev-2", "stage-delivery", date("2021-06-12"));
    let evaluation = engine().evaluate_event(&rules, None, &[delivery.clone()], &delivery);
    assert_eq!(evaluation.effects.len(), 1);
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn test_messages_deduplicate_across_passes() {
    let rules = rule_set(
        r#"
rules:
  - id: visit-reminder
    program: prog-anc
    condition: "V{event_count} >= 1"
    actions:
      - !SendMessage
        template: tmpl-reminder
"#,
    );
    let event = RuleEvent::new("ev-1", "stage-anc", date("2021-06-10"));
    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);

    let notifier = Arc::new(MemoryNotifier::new());
    let applier = EffectApplier::new()
        .with_templates(Arc::new(MemoryTemplateStore::new().with_template(
            MessageTemplate::new("tmpl-reminder", "Visit due", "Please come in"),
        )))
        .with_delivery_log(Arc::new(MemoryDeliveryLog::new()))
        .with_notifier(notifier.clone());

    let mut form = EntitySnapshot::new("tei-1");
    applier.apply(&evaluation.effects, &mut form);
    applier.apply(&evaluation.effects, &mut form);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].entity, "tei-1");
    assert_eq!(sent[0].subject, "Visit due");
}

#[test]
fn test_schedule_message_carries_computed_date() {
    let rules = rule_set(
        r#"
rules:
  - id: follow-up
    program: prog-anc
    condition: "true"
    actions:
      - !ScheduleMessage
        template: tmpl-followup
        date: "d2:addDays(V{enrollment_date}, '7')"
"#,
    );
    let enrollment = RuleEnrollment::new("en-1", "prog-anc", date("2021-06-01"));

    let evaluation = engine().evaluate_enrollment(&rules, &enrollment, &[]);
    assert_eq!(evaluation.effects[0].data.as_deref(), Some("2021-06-08"));

    let notifier = Arc::new(MemoryNotifier::new());
    let applier = EffectApplier::new()
        .with_templates(Arc::new(MemoryTemplateStore::new().with_template(
            MessageTemplate::new("tmpl-followup", "Follow-up", "See you soon"),
        )))
        .with_delivery_log(Arc::new(MemoryDeliveryLog::new()))
        .with_notifier(notifier.clone());

    let mut form = EntitySnapshot::new("tei-1");
    let report = applier.apply(&evaluation.effects, &mut form);

    assert!(report.issues.is_empty());
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].scheduled_for, Some(date("2021-06-08")));
}

// ============================================================================
// Failure isolation
// ============================================================================

#[test]
fn test_broken_condition_reported_and_rest_still_runs() {
    let rules = rule_set(
        r##"
rules:
  - id: broken
    program: prog-anc
    condition: "#{weight} >"
    actions:
      - !HideField
        field: de-1
  - id: fine
    program: prog-anc
    condition: "true"
    actions:
      - !HideField
        field: de-2
"##,
    );
    let event = RuleEvent::new("ev-1", "stage-anc", date("2021-06-10"));

    let evaluation = engine().evaluate_event(&rules, None, &[event.clone()], &event);
    assert_eq!(evaluation.effects.len(), 1);
    assert_eq!(evaluation.effects[0].rule, "fine");
    assert_eq!(evaluation.skipped.len(), 1);
    assert_eq!(evaluation.skipped[0].rule, "broken");
}
