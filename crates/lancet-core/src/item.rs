//! Dimensional item references
//!
//! Every data reference a formula can make is one of the closed `ItemId`
//! kinds below. Identifiers are 11-character UIDs; the literal `"*"` in a
//! combo segment is a wildcard that expands over the concrete items present
//! in a value map.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard segment accepted wherever a UID may appear.
pub const WILDCARD: &str = "*";

/// A reference to one dimensional item in a formula
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemId {
    /// `#{element}`, `#{element.coc}` or `#{element.coc.aoc}`
    DataItem {
        element: String,
        category_combo: Option<String>,
        attribute_combo: Option<String>,
    },
    /// `D{program.element}`
    ProgramDataElement { program: String, element: String },
    /// `A{program.attribute}`
    ProgramAttribute { program: String, attribute: String },
    /// `I{indicator}`
    ProgramIndicator { indicator: String },
    /// `R{dataSet.METRIC}`
    ReportingRate { data_set: String, metric: String },
    /// `C{constant}`
    Constant { constant: String },
    /// `OUG{group}`
    OrgUnitGroupCount { group: String },
    /// `[days]`
    Days,
}

impl ItemId {
    /// Data element total: `#{element}`.
    pub fn data_item(element: impl Into<String>) -> Self {
        ItemId::DataItem {
            element: element.into(),
            category_combo: None,
            attribute_combo: None,
        }
    }

    /// Data element operand: `#{element.coc}`.
    pub fn data_operand(element: impl Into<String>, category_combo: impl Into<String>) -> Self {
        ItemId::DataItem {
            element: element.into(),
            category_combo: Some(category_combo.into()),
            attribute_combo: None,
        }
    }

    pub fn program_data_element(program: impl Into<String>, element: impl Into<String>) -> Self {
        ItemId::ProgramDataElement {
            program: program.into(),
            element: element.into(),
        }
    }

    pub fn program_attribute(program: impl Into<String>, attribute: impl Into<String>) -> Self {
        ItemId::ProgramAttribute {
            program: program.into(),
            attribute: attribute.into(),
        }
    }

    pub fn program_indicator(indicator: impl Into<String>) -> Self {
        ItemId::ProgramIndicator {
            indicator: indicator.into(),
        }
    }

    pub fn reporting_rate(data_set: impl Into<String>, metric: impl Into<String>) -> Self {
        ItemId::ReportingRate {
            data_set: data_set.into(),
            metric: metric.into(),
        }
    }

    pub fn constant(constant: impl Into<String>) -> Self {
        ItemId::Constant {
            constant: constant.into(),
        }
    }

    pub fn org_unit_group(group: impl Into<String>) -> Self {
        ItemId::OrgUnitGroupCount {
            group: group.into(),
        }
    }

    /// Returns true if any segment of this reference is the `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        match self {
            ItemId::DataItem {
                element,
                category_combo,
                attribute_combo,
            } => {
                element == WILDCARD
                    || category_combo.as_deref() == Some(WILDCARD)
                    || attribute_combo.as_deref() == Some(WILDCARD)
            }
            ItemId::ReportingRate { metric, .. } => metric == WILDCARD,
            _ => false,
        }
    }

    /// Wildcard expansion test: does this (possibly wildcarded) reference
    /// cover the given concrete item?
    ///
    /// A `*` segment matches any present segment; an absent segment matches
    /// only an absent one, so `#{de}` and `#{de.*}` stay distinct keys.
    pub fn matches(&self, concrete: &ItemId) -> bool {
        fn seg(pattern: &str, value: &str) -> bool {
            pattern == WILDCARD || pattern == value
        }
        fn opt_seg(pattern: &Option<String>, value: &Option<String>) -> bool {
            match (pattern, value) {
                (None, None) => true,
                (Some(p), Some(v)) => seg(p, v),
                _ => false,
            }
        }

        match (self, concrete) {
            (
                ItemId::DataItem {
                    element: pe,
                    category_combo: pc,
                    attribute_combo: pa,
                },
                ItemId::DataItem {
                    element: ce,
                    category_combo: cc,
                    attribute_combo: ca,
                },
            ) => seg(pe, ce) && opt_seg(pc, cc) && opt_seg(pa, ca),
            (
                ItemId::ReportingRate {
                    data_set: pd,
                    metric: pm,
                },
                ItemId::ReportingRate {
                    data_set: cd,
                    metric: cm,
                },
            ) => seg(pd, cd) && seg(pm, cm),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::DataItem {
                element,
                category_combo,
                attribute_combo,
            } => {
                write!(f, "#{{{element}")?;
                if let Some(coc) = category_combo {
                    write!(f, ".{coc}")?;
                }
                if let Some(aoc) = attribute_combo {
                    write!(f, ".{aoc}")?;
                }
                write!(f, "}}")
            }
            ItemId::ProgramDataElement { program, element } => {
                write!(f, "D{{{program}.{element}}}")
            }
            ItemId::ProgramAttribute { program, attribute } => {
                write!(f, "A{{{program}.{attribute}}}")
            }
            ItemId::ProgramIndicator { indicator } => write!(f, "I{{{indicator}}}"),
            ItemId::ReportingRate { data_set, metric } => {
                write!(f, "R{{{data_set}.{metric}}}")
            }
            ItemId::Constant { constant } => write!(f, "C{{{constant}}}"),
            ItemId::OrgUnitGroupCount { group } => write!(f, "OUG{{{group}}}"),
            ItemId::Days => write!(f, "[days]"),
        }
    }
}
