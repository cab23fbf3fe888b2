//! Formula parsing and evaluation
//!
//! One grammar serves two dialects. *Aggregate* formulas reference data
//! items by uid (`#{deuid.cocuid}`, `D{prog.de}`, `R{dataset.ACTUAL}`) and
//! may call `SUM`/`AVG`/... over sampled periods. *Rule conditions*
//! reference program rule variables by name (`#{current_weight}`), call
//! `d2:` helpers and read `V{...}` environment values.
//!
//! Parsing produces an [`ast::Expr`] tree; evaluation walks it against a
//! [`ValueContext`]. Aggregate evaluation never fails, it answers
//! `Option<f64>` where `None` means *undefined*; condition evaluation can
//! report an unknown variable so the caller can skip the rule.

pub mod ast;
mod context;
mod deps;
mod error;
mod eval;
mod functions;
pub mod matcher;
mod parser;
mod scan;

pub use context::{ValueContext, VariableValue};
pub use deps::{collect_items, ItemSet};
pub use error::{ConditionError, ParseError, Result};
pub use eval::{evaluate, evaluate_condition, evaluate_parsed, evaluate_value};
pub use parser::{parse, ParseMode, ParsedFormula};
