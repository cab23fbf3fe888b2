//! End-to-end formula tests
//!
//! Exercises the public surface the way an indicator service would: parse
//! once, extract dependencies, build a context from them, evaluate under a
//! missing-value policy.

use std::collections::HashMap;

use lancet_core::{Formula, ItemId, MissingValuePolicy, Value, ValueType};
use lancet_expr::*;

// =============================================================================
// Aggregate formulas
// =============================================================================

#[test]
fn test_parse_extract_fetch_evaluate() {
    let parsed = parse(
        "#{abcdefghij1.klmnopqrst1} + D{abcdefghij2.abcdefghij3} * 2",
        ParseMode::Aggregate,
    )
    .unwrap();

    let set = parsed.items();
    assert_eq!(set.items.len(), 2);
    assert!(set
        .items
        .contains(&ItemId::data_operand("abcdefghij1", "klmnopqrst1")));
    assert!(set
        .items
        .contains(&ItemId::program_data_element("abcdefghij2", "abcdefghij3")));

    // Pretend to fetch exactly what the set asked for.
    let mut ctx = ValueContext::new();
    for id in &set.items {
        ctx = ctx.with_item(id.clone(), 10.0);
    }

    assert_eq!(
        evaluate_parsed(&parsed, &ctx, MissingValuePolicy::SkipIfAnyMissing),
        Some(30.0)
    );
}

#[test]
fn test_each_reference_kind_resolves() {
    let ctx = ValueContext::new()
        .with_item(ItemId::data_operand("abcdefghij1", "klmnopqrst1"), 4.0)
        .with_item(ItemId::program_attribute("abcdefghij2", "abcdefghij3"), 5.0)
        .with_item(ItemId::program_indicator("abcdefghij4"), 6.0)
        .with_item(
            ItemId::reporting_rate("abcdefghij5", "ACTUAL_REPORTS"),
            90.0,
        );

    let cases = [
        ("#{abcdefghij1.klmnopqrst1}", 4.0),
        ("A{abcdefghij2.abcdefghij3}", 5.0),
        ("I{abcdefghij4}", 6.0),
        ("R{abcdefghij5.ACTUAL_REPORTS}", 90.0),
    ];
    for (text, expected) in cases {
        let formula = Formula::new(text).with_policy(MissingValuePolicy::SkipIfAnyMissing);
        assert_eq!(evaluate(&formula, &ctx), Some(expected), "{text}");
    }
}

#[test]
fn test_self_subtraction_is_zero() {
    let ctx = ValueContext::new().with_item(ItemId::data_operand("abcdefghij1", "klmnopqrst1"), 12.0);
    let formula = Formula::new("#{abcdefghij1.klmnopqrst1} - #{abcdefghij1.klmnopqrst1}");
    assert_eq!(evaluate(&formula, &ctx), Some(0.0));
}

#[test]
fn test_coverage_style_ratio() {
    let ctx = ValueContext::new()
        .with_item(ItemId::data_item("abcdefghij1"), 80.0)
        .with_item(ItemId::data_item("abcdefghij2"), 200.0);
    let formula = Formula::new("100 * #{abcdefghij1} / #{abcdefghij2}")
        .with_policy(MissingValuePolicy::SkipIfAnyMissing);
    assert_eq!(evaluate(&formula, &ctx), Some(40.0));

    // Zero denominator leaves the indicator undefined rather than infinite.
    let zero = ValueContext::new()
        .with_item(ItemId::data_item("abcdefghij1"), 80.0)
        .with_item(ItemId::data_item("abcdefghij2"), 0.0);
    assert_eq!(evaluate(&formula, &zero), None);
}

#[test]
fn test_wildcard_operand_sums_every_match() {
    let ctx = ValueContext::new()
        .with_item(ItemId::data_operand("abcdefghij1", "klmnopqrst1"), 1.0)
        .with_item(ItemId::data_operand("abcdefghij1", "klmnopqrst2"), 2.0)
        .with_item(ItemId::data_operand("abcdefghij2", "klmnopqrst1"), 4.0);
    let formula = Formula::new("#{abcdefghij1.*}");
    assert_eq!(evaluate(&formula, &ctx), Some(3.0));

    // A total reference does not match operand-keyed values.
    let total = Formula::new("#{abcdefghij1}").with_policy(MissingValuePolicy::SkipIfAnyMissing);
    assert_eq!(evaluate(&total, &ctx), None);
}

#[test]
fn test_median_over_samples() {
    let item = ItemId::data_item("abcdefghij1");
    let mut ctx = ValueContext::new();
    for value in [7.0, 1.0, 3.0, 5.0] {
        let mut sample = HashMap::new();
        sample.insert(item.clone(), value);
        ctx = ctx.with_sample(sample);
    }
    let formula = Formula::new("MEDIAN(#{abcdefghij1})");
    assert_eq!(evaluate(&formula, &ctx), Some(4.0));
}

#[test]
fn test_policy_applies_to_whole_formula() {
    // Policy is a property of the formula, not of single references: one
    // missing reference under SkipIfAnyMissing hides the defined ones too.
    let ctx = ValueContext::new().with_item(ItemId::data_item("abcdefghij1"), 100.0);
    let formula = Formula::new("#{abcdefghij1} + #{abcdefghij2} + #{abcdefghij3}");

    assert_eq!(
        evaluate(
            &formula.clone().with_policy(MissingValuePolicy::SkipIfAnyMissing),
            &ctx
        ),
        None
    );
    assert_eq!(
        evaluate(
            &formula.clone().with_policy(MissingValuePolicy::SkipIfAllMissing),
            &ctx
        ),
        Some(100.0)
    );
    assert_eq!(evaluate(&formula, &ctx), Some(100.0));
}

// =============================================================================
// Rule conditions
// =============================================================================

fn rule_ctx() -> ValueContext {
    ValueContext::new()
        .with_variable("current_weight", VariableValue::of_raw("82", ValueType::Number))
        .with_variable("first_name", VariableValue::of_raw("John", ValueType::Text))
        .with_variable("last_name", VariableValue::of_raw("Doe", ValueType::Text))
        .with_variable("symptoms", VariableValue::empty(ValueType::Text))
        .with_env("event_date", Value::Text("2021-03-01".into()))
        .with_env("enrollment_date", Value::Text("2021-02-01".into()))
}

fn holds(text: &str, ctx: &ValueContext) -> bool {
    let parsed = parse(text, ParseMode::RuleCondition).unwrap();
    evaluate_condition(&parsed, ctx).unwrap()
}

#[test]
fn test_condition_over_variables_and_environment() {
    let ctx = rule_ctx();
    assert!(holds("#{current_weight} > 80", &ctx));
    assert!(holds("V{event_date} > V{enrollment_date}", &ctx));
    assert!(holds(
        "d2:daysBetween(V{enrollment_date}, V{event_date}) == 28",
        &ctx
    ));
    assert!(!holds("d2:hasValue(#{symptoms})", &ctx));
    // An empty variable makes the comparison undefined, hence false.
    assert!(!holds("#{symptoms} == 'fever'", &ctx));
}

#[test]
fn test_effect_data_expression() {
    let ctx = rule_ctx();
    let parsed = parse(
        "d2:concatenate(#{first_name}, ' ', #{last_name})",
        ParseMode::RuleCondition,
    )
    .unwrap();
    assert_eq!(
        evaluate_value(&parsed, &ctx).unwrap(),
        Some(Value::Text("John Doe".into()))
    );

    let parsed = parse("d2:round(#{current_weight} / 3)", ParseMode::RuleCondition).unwrap();
    assert_eq!(
        evaluate_value(&parsed, &ctx).unwrap(),
        Some(Value::Number(27.0))
    );
}

#[test]
fn test_unknown_variable_reported_not_swallowed() {
    let ctx = rule_ctx();
    let parsed = parse("#{not_declared} > 1", ParseMode::RuleCondition).unwrap();
    assert_eq!(
        evaluate_condition(&parsed, &ctx),
        Err(ConditionError::UnknownVariable {
            name: "not_declared".into()
        })
    );
}

#[test]
fn test_parse_error_converts_for_rule_flow() {
    let err: ConditionError = parse("#{a} &&", ParseMode::RuleCondition)
        .unwrap_err()
        .into();
    assert!(matches!(err, ConditionError::Parse(_)));
}
