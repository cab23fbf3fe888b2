//! Expression AST
//!
//! A parsed formula is a tree of `Expr` nodes. The same AST serves both
//! formula families; the parse mode decides which node kinds can actually
//! occur (aggregate formulas never contain variables or `d2:` calls, rule
//! conditions never contain dimensional data items other than constants).

use serde::{Deserialize, Serialize};

use lancet_core::ItemId;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation (-)
    Neg,
    /// Logical not (!)
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Returns true if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le
        )
    }

    /// Returns true if this is an arithmetic operator
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Returns true if this is a logical operator
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Source spelling of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Aggregate functions reducing per-sample values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Stddev,
    Median,
}

impl AggregateFn {
    /// Look a function up by its source spelling, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(AggregateFn::Sum),
            "AVG" | "AVERAGE" => Some(AggregateFn::Avg),
            "COUNT" => Some(AggregateFn::Count),
            "MIN" => Some(AggregateFn::Min),
            "MAX" => Some(AggregateFn::Max),
            "STDDEV" => Some(AggregateFn::Stddev),
            "MEDIAN" => Some(AggregateFn::Median),
            _ => None,
        }
    }

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Count => "COUNT",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
            AggregateFn::Stddev => "STDDEV",
            AggregateFn::Median => "MEDIAN",
        }
    }
}

/// Built-in `d2:` functions available to rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum D2Fn {
    HasValue,
    Floor,
    Ceil,
    Round,
    Modulus,
    Concatenate,
    Length,
    AddDays,
    DaysBetween,
    YearsBetween,
}

impl D2Fn {
    /// Look a function up by the name following the `d2:` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hasValue" => Some(D2Fn::HasValue),
            "floor" => Some(D2Fn::Floor),
            "ceil" => Some(D2Fn::Ceil),
            "round" => Some(D2Fn::Round),
            "modulus" => Some(D2Fn::Modulus),
            "concatenate" => Some(D2Fn::Concatenate),
            "length" => Some(D2Fn::Length),
            "addDays" => Some(D2Fn::AddDays),
            "daysBetween" => Some(D2Fn::DaysBetween),
            "yearsBetween" => Some(D2Fn::YearsBetween),
            _ => None,
        }
    }

    /// Full source spelling, `d2:` prefix included
    pub fn name(&self) -> &'static str {
        match self {
            D2Fn::HasValue => "d2:hasValue",
            D2Fn::Floor => "d2:floor",
            D2Fn::Ceil => "d2:ceil",
            D2Fn::Round => "d2:round",
            D2Fn::Modulus => "d2:modulus",
            D2Fn::Concatenate => "d2:concatenate",
            D2Fn::Length => "d2:length",
            D2Fn::AddDays => "d2:addDays",
            D2Fn::DaysBetween => "d2:daysBetween",
            D2Fn::YearsBetween => "d2:yearsBetween",
        }
    }

    /// Accepted argument count range (min, max); `None` max = variadic.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            D2Fn::HasValue | D2Fn::Floor | D2Fn::Ceil | D2Fn::Round | D2Fn::Length => {
                (1, Some(1))
            }
            D2Fn::Modulus | D2Fn::AddDays | D2Fn::DaysBetween | D2Fn::YearsBetween => {
                (2, Some(2))
            }
            D2Fn::Concatenate => (1, None),
        }
    }
}

/// One node of a parsed formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// String literal (rule conditions only)
    Text(String),
    /// Boolean literal (rule conditions only)
    Bool(bool),
    /// Dimensional item reference, including `C{...}` and `[days]`
    Item(ItemId),
    /// Rule variable reference: `#{name}` / `A{name}` in rule conditions
    Variable(String),
    /// Environment variable reference: `V{name}` in rule conditions
    Env(String),
    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Aggregate function call over per-sample sub-expressions
    Aggregate { func: AggregateFn, args: Vec<Expr> },
    /// `d2:` function call
    D2 { func: D2Fn, args: Vec<Expr> },
}

impl Expr {
    /// Create a binary operation
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a unary operation
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}
