//! Dependency extraction
//!
//! Walks a parsed formula and reports what it reads, so callers can fetch
//! data before evaluating. Items referenced inside aggregate arguments are
//! additionally tagged as needing a per-sample series. The `[days]` marker
//! resolves from the context directly and is not part of the set.

use std::collections::HashSet;

use lancet_core::ItemId;

use crate::ast::Expr;
use crate::parser::ParsedFormula;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSet {
    /// Every item the formula references
    pub items: HashSet<ItemId>,
    /// Subset referenced inside aggregate arguments
    pub sample_items: HashSet<ItemId>,
    /// Rule-variable names the formula references
    pub variables: HashSet<String>,
}

impl ItemSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.variables.is_empty()
    }

    /// Constant ids among the referenced items.
    pub fn constants(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|id| match id {
            ItemId::Constant { constant } => Some(constant.as_str()),
            _ => None,
        })
    }

    /// Organisation-unit group ids among the referenced items.
    pub fn org_unit_groups(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|id| match id {
            ItemId::OrgUnitGroupCount { group } => Some(group.as_str()),
            _ => None,
        })
    }
}

/// Collect everything a parsed formula reads.
pub fn collect_items(parsed: &ParsedFormula) -> ItemSet {
    let mut set = ItemSet::default();
    walk(parsed.root(), &mut set, false);
    set
}

pub(crate) fn walk(expr: &Expr, set: &mut ItemSet, in_sample: bool) {
    match expr {
        Expr::Item(ItemId::Days) => {}
        Expr::Item(id) => {
            set.items.insert(id.clone());
            if in_sample {
                set.sample_items.insert(id.clone());
            }
        }
        Expr::Variable(name) => {
            set.variables.insert(name.clone());
        }
        Expr::Unary { operand, .. } => walk(operand, set, in_sample),
        Expr::Binary { left, right, .. } => {
            walk(left, set, in_sample);
            walk(right, set, in_sample);
        }
        Expr::Aggregate { args, .. } => {
            for arg in args {
                walk(arg, set, true);
            }
        }
        Expr::D2 { args, .. } => {
            for arg in args {
                walk(arg, set, in_sample);
            }
        }
        Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) | Expr::Env(_) => {}
    }
}
