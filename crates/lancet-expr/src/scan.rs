//! Reference scanning
//!
//! Turns a `sigil{...}` group into an AST node, validating identifiers on
//! the way. Which sigils are legal, and whether the braces hold UID
//! segments or a variable name, depends on the parse mode.

use lancet_core::item::WILDCARD;
use lancet_core::ItemId;

use crate::ast::Expr;
use crate::error::{ParseError, Result};
use crate::parser::ParseMode;

/// An 11-character UID: first character alphabetic, the rest alphanumeric.
pub fn is_uid(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 11
        && bytes[0].is_ascii_alphabetic()
        && bytes[1..].iter().all(|b| b.is_ascii_alphanumeric())
}

fn is_uid_or_wildcard(token: &str) -> bool {
    token == WILDCARD || is_uid(token)
}

/// Reporting-rate metric position: an upper-case metric word or `*`.
fn is_metric(token: &str) -> bool {
    token == WILDCARD
        || (!token.is_empty()
            && token
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b == b'_'))
}

fn check_uid(token: &str) -> Result<String> {
    if is_uid(token) {
        Ok(token.to_string())
    } else {
        Err(ParseError::InvalidIdentifier {
            token: token.to_string(),
        })
    }
}

fn check_uid_or_wildcard(token: &str) -> Result<String> {
    if is_uid_or_wildcard(token) {
        Ok(token.to_string())
    } else {
        Err(ParseError::InvalidIdentifier {
            token: token.to_string(),
        })
    }
}

/// Rule variable names: free identifiers, spaces allowed, no nested braces
/// and no dots (dots belong to the aggregate syntax).
fn check_variable_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let ok = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ');
    if ok {
        Ok(trimmed.to_string())
    } else {
        Err(ParseError::InvalidIdentifier {
            token: name.to_string(),
        })
    }
}

/// Environment variable names are snake_case words.
fn check_env_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let ok = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(trimmed.to_string())
    } else {
        Err(ParseError::InvalidIdentifier {
            token: name.to_string(),
        })
    }
}

/// Parse one complete reference group (`input` spans sigil through closing
/// brace) into an AST node.
pub(crate) fn parse_reference(input: &str, mode: ParseMode) -> Result<Expr> {
    let brace = match input.find('{') {
        Some(pos) => pos,
        None => {
            return Err(ParseError::NotWellFormed {
                reason: format!("expected a brace group in {input:?}"),
            })
        }
    };
    if !input.ends_with('}') {
        return Err(ParseError::NotWellFormed {
            reason: format!("unterminated reference {input:?}"),
        });
    }
    let sigil = &input[..brace];
    let inner = &input[brace + 1..input.len() - 1];
    if inner.contains('{') || inner.contains('}') {
        return Err(ParseError::NotWellFormed {
            reason: format!("nested braces in {input:?}"),
        });
    }

    let unknown = || ParseError::UnknownVariable {
        text: input.to_string(),
    };

    match (sigil, mode) {
        ("#", ParseMode::Aggregate) => {
            let segments: Vec<&str> = inner.split('.').collect();
            match segments.as_slice() {
                [element] => Ok(Expr::Item(ItemId::DataItem {
                    element: check_uid(element)?,
                    category_combo: None,
                    attribute_combo: None,
                })),
                [element, combo] => Ok(Expr::Item(ItemId::DataItem {
                    element: check_uid(element)?,
                    category_combo: Some(check_uid_or_wildcard(combo)?),
                    attribute_combo: None,
                })),
                [element, combo, attribute] => Ok(Expr::Item(ItemId::DataItem {
                    element: check_uid(element)?,
                    category_combo: Some(check_uid_or_wildcard(combo)?),
                    attribute_combo: Some(check_uid_or_wildcard(attribute)?),
                })),
                _ => Err(ParseError::NotWellFormed {
                    reason: format!("too many segments in {input:?}"),
                }),
            }
        }
        ("#", ParseMode::RuleCondition) => Ok(Expr::Variable(check_variable_name(inner)?)),
        ("D", ParseMode::Aggregate) => {
            let segments: Vec<&str> = inner.split('.').collect();
            match segments.as_slice() {
                [program, element] => Ok(Expr::Item(ItemId::ProgramDataElement {
                    program: check_uid(program)?,
                    element: check_uid(element)?,
                })),
                _ => Err(ParseError::NotWellFormed {
                    reason: format!("expected program.dataElement in {input:?}"),
                }),
            }
        }
        ("A", ParseMode::Aggregate) => {
            let segments: Vec<&str> = inner.split('.').collect();
            match segments.as_slice() {
                [program, attribute] => Ok(Expr::Item(ItemId::ProgramAttribute {
                    program: check_uid(program)?,
                    attribute: check_uid(attribute)?,
                })),
                _ => Err(ParseError::NotWellFormed {
                    reason: format!("expected program.attribute in {input:?}"),
                }),
            }
        }
        ("A", ParseMode::RuleCondition) => Ok(Expr::Variable(check_variable_name(inner)?)),
        ("I", ParseMode::Aggregate) => Ok(Expr::Item(ItemId::ProgramIndicator {
            indicator: check_uid(inner)?,
        })),
        ("R", ParseMode::Aggregate) => {
            let segments: Vec<&str> = inner.split('.').collect();
            match segments.as_slice() {
                [data_set, metric] if is_metric(metric) => {
                    Ok(Expr::Item(ItemId::ReportingRate {
                        data_set: check_uid(data_set)?,
                        metric: metric.to_string(),
                    }))
                }
                [_, metric] => Err(ParseError::InvalidIdentifier {
                    token: metric.to_string(),
                }),
                _ => Err(ParseError::NotWellFormed {
                    reason: format!("expected dataSet.METRIC in {input:?}"),
                }),
            }
        }
        ("C", _) => Ok(Expr::Item(ItemId::Constant {
            constant: check_uid(inner)?,
        })),
        ("OUG", ParseMode::Aggregate) => Ok(Expr::Item(ItemId::OrgUnitGroupCount {
            group: check_uid(inner)?,
        })),
        ("V", ParseMode::RuleCondition) => Ok(Expr::Env(check_env_name(inner)?)),
        _ => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_validation() {
        assert!(is_uid("abcdefghij1"));
        assert!(is_uid("A1234567890"));
        assert!(!is_uid("1bcdefghij1")); // first char must be alphabetic
        assert!(!is_uid("abcdefghij")); // too short
        assert!(!is_uid("abcdefghij12")); // too long
        assert!(!is_uid("abcdefghi_1")); // bad charset
    }

    #[test]
    fn test_data_item_forms() {
        let expr = parse_reference("#{abcdefghij1}", ParseMode::Aggregate).unwrap();
        assert_eq!(expr, Expr::Item(ItemId::data_item("abcdefghij1")));

        let expr = parse_reference("#{abcdefghij1.klmnopqrst1}", ParseMode::Aggregate).unwrap();
        assert_eq!(
            expr,
            Expr::Item(ItemId::data_operand("abcdefghij1", "klmnopqrst1"))
        );

        let expr =
            parse_reference("#{abcdefghij1.klmnopqrst1.uvwxyzabcd1}", ParseMode::Aggregate)
                .unwrap();
        match expr {
            Expr::Item(ItemId::DataItem {
                attribute_combo, ..
            }) => assert_eq!(attribute_combo.as_deref(), Some("uvwxyzabcd1")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_segments() {
        let expr = parse_reference("#{abcdefghij1.*}", ParseMode::Aggregate).unwrap();
        assert_eq!(expr, Expr::Item(ItemId::data_operand("abcdefghij1", "*")));
    }

    #[test]
    fn test_invalid_identifier() {
        let err = parse_reference("#{abcdefghij1.999}", ParseMode::Aggregate).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidIdentifier {
                token: "999".into()
            }
        );

        let err = parse_reference("#{*}", ParseMode::Aggregate).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_other_sigils() {
        assert_eq!(
            parse_reference("C{abcdefghij1}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::constant("abcdefghij1"))
        );
        assert_eq!(
            parse_reference("OUG{abcdefghij1}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::org_unit_group("abcdefghij1"))
        );
        assert_eq!(
            parse_reference("I{abcdefghij1}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::program_indicator("abcdefghij1"))
        );
        assert_eq!(
            parse_reference("D{abcdefghij1.klmnopqrst1}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::program_data_element("abcdefghij1", "klmnopqrst1"))
        );
    }

    #[test]
    fn test_reporting_rate_metric() {
        assert_eq!(
            parse_reference("R{abcdefghij1.REPORTING_RATE}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::reporting_rate("abcdefghij1", "REPORTING_RATE"))
        );
        assert_eq!(
            parse_reference("R{abcdefghij1.*}", ParseMode::Aggregate).unwrap(),
            Expr::Item(ItemId::reporting_rate("abcdefghij1", "*"))
        );
        assert!(parse_reference("R{abcdefghij1.reporting}", ParseMode::Aggregate).is_err());
    }

    #[test]
    fn test_unknown_sigil_carries_text() {
        let err = parse_reference("X{abcdefghij1}", ParseMode::Aggregate).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownVariable {
                text: "X{abcdefghij1}".into()
            }
        );
    }

    #[test]
    fn test_rule_mode_variable_names() {
        assert_eq!(
            parse_reference("#{ProgramRuleVariableA}", ParseMode::RuleCondition).unwrap(),
            Expr::Variable("ProgramRuleVariableA".into())
        );
        assert_eq!(
            parse_reference("#{current weight}", ParseMode::RuleCondition).unwrap(),
            Expr::Variable("current weight".into())
        );
        assert_eq!(
            parse_reference("A{attribute var}", ParseMode::RuleCondition).unwrap(),
            Expr::Variable("attribute var".into())
        );
        assert!(parse_reference("#{has.dots}", ParseMode::RuleCondition).is_err());
    }

    #[test]
    fn test_env_reference() {
        assert_eq!(
            parse_reference("V{event_date}", ParseMode::RuleCondition).unwrap(),
            Expr::Env("event_date".into())
        );
        assert!(parse_reference("V{Event Date}", ParseMode::RuleCondition).is_err());
        // Environment variables do not exist in aggregate formulas.
        assert!(matches!(
            parse_reference("V{event_date}", ParseMode::Aggregate).unwrap_err(),
            ParseError::UnknownVariable { .. }
        ));
    }

    #[test]
    fn test_mode_gating() {
        // UID-addressed program attributes only exist in aggregate mode.
        assert!(matches!(
            parse_reference("D{abcdefghij1.klmnopqrst1}", ParseMode::RuleCondition).unwrap_err(),
            ParseError::UnknownVariable { .. }
        ));
        // Constants work in both modes.
        assert!(parse_reference("C{abcdefghij1}", ParseMode::RuleCondition).is_ok());
    }
}
