//! Formula parser
//!
//! Recursive descent over precedence tiers. Each tier splits the input at
//! the rightmost top-level occurrence of its operators (depth- and
//! quote-aware), which makes binary operators left-associative; what
//! remains is a primary: a literal, a group, a reference or a function
//! call.

use serde::{Deserialize, Serialize};

use lancet_core::ItemId;

use crate::ast::{AggregateFn, BinaryOp, D2Fn, Expr, UnaryOp};
use crate::deps::{self, ItemSet};
use crate::error::{ParseError, Result};
use crate::matcher;
use crate::scan;

/// Which formula family is being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    /// Indicator / validation-rule / predictor formulas: UID-addressed data
    /// references and aggregate functions
    Aggregate,
    /// Program-rule conditions and action data: named variables, `V{...}`
    /// environment values, literals and `d2:` functions
    RuleCondition,
}

/// A successfully parsed formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFormula {
    pub(crate) source: String,
    pub(crate) mode: ParseMode,
    pub(crate) root: Expr,
}

impl ParsedFormula {
    /// Original formula text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Root of the expression tree
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Everything the formula references, without evaluating it.
    pub fn items(&self) -> ItemSet {
        deps::collect_items(self)
    }
}

/// Parse a formula. Failures are structured validation outcomes, never
/// panics.
pub fn parse(text: &str, mode: ParseMode) -> Result<ParsedFormula> {
    if !matcher::is_balanced(text) {
        return Err(ParseError::NotWellFormed {
            reason: format!("unbalanced delimiters in {text:?}"),
        });
    }
    let parser = Parser { mode };
    let root = parser.parse_expr(text)?;
    Ok(ParsedFormula {
        source: text.to_string(),
        mode,
        root,
    })
}

// Tier tables, loosest binding first; multi-character operators are listed
// before their one-character prefixes so the longest match wins.
const TIERS: [&[(&str, BinaryOp)]; 5] = [
    &[("||", BinaryOp::Or)],
    &[("&&", BinaryOp::And)],
    &[
        ("==", BinaryOp::Eq),
        ("!=", BinaryOp::Ne),
        (">=", BinaryOp::Ge),
        ("<=", BinaryOp::Le),
        (">", BinaryOp::Gt),
        ("<", BinaryOp::Lt),
    ],
    &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Mod)],
];

struct Parser {
    mode: ParseMode,
}

impl Parser {
    fn parse_expr(&self, input: &str) -> Result<Expr> {
        self.parse_tier(input, 0)
    }

    fn parse_tier(&self, input: &str, tier: usize) -> Result<Expr> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::NotWellFormed {
                reason: "empty operand".into(),
            });
        }
        if tier >= TIERS.len() {
            return self.parse_primary(input);
        }
        match split_rightmost(input, TIERS[tier]) {
            Some((left, op, right)) => {
                let left = self.parse_tier(left, tier)?;
                let right = self.parse_tier(right, tier + 1)?;
                Ok(Expr::binary(left, op, right))
            }
            None => self.parse_tier(input, tier + 1),
        }
    }

    fn parse_primary(&self, input: &str) -> Result<Expr> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::NotWellFormed {
                reason: "empty operand".into(),
            });
        }
        if let Some(rest) = input.strip_prefix('!') {
            return Ok(Expr::unary(UnaryOp::Not, self.parse_primary(rest)?));
        }
        if let Some(rest) = input.strip_prefix('-') {
            return Ok(Expr::unary(UnaryOp::Neg, self.parse_primary(rest)?));
        }
        if input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            if let Ok(number) = input.parse::<f64>() {
                return Ok(Expr::Number(number));
            }
        }
        if input.starts_with('(') {
            return match matcher::find_boundary(input, 1) {
                Some(pos) if pos == input.len() - 1 && input.as_bytes()[pos] == b')' => {
                    self.parse_expr(&input[1..pos])
                }
                _ => Err(ParseError::NotWellFormed {
                    reason: format!("malformed group: {input:?}"),
                }),
            };
        }
        if input.starts_with('[') {
            return if input == "[days]" {
                Ok(Expr::Item(ItemId::Days))
            } else {
                Err(ParseError::NotWellFormed {
                    reason: format!("unrecognized bracket literal: {input:?}"),
                })
            };
        }
        if input.starts_with('\'') || input.starts_with('"') {
            return self.parse_string(input);
        }
        if input == "true" || input == "false" {
            return if self.mode == ParseMode::RuleCondition {
                Ok(Expr::Bool(input == "true"))
            } else {
                Err(ParseError::NotWellFormed {
                    reason: format!("boolean literal {input:?} not allowed here"),
                })
            };
        }
        if input.ends_with('}') && input.contains('{') {
            return scan::parse_reference(input, self.mode);
        }
        if input.ends_with(')') && input.contains('(') {
            return self.parse_call(input);
        }
        Err(ParseError::NotWellFormed {
            reason: format!("unrecognized operand: {input:?}"),
        })
    }

    fn parse_string(&self, input: &str) -> Result<Expr> {
        if self.mode == ParseMode::Aggregate {
            return Err(ParseError::NotWellFormed {
                reason: "string literal not allowed in aggregate formulas".into(),
            });
        }
        let quote = &input[..1];
        let body = &input[1..];
        if !body.is_empty() && body.ends_with(quote) && !body[..body.len() - 1].contains(quote) {
            Ok(Expr::Text(body[..body.len() - 1].to_string()))
        } else {
            Err(ParseError::NotWellFormed {
                reason: format!("malformed string literal: {input:?}"),
            })
        }
    }

    fn parse_call(&self, input: &str) -> Result<Expr> {
        let open = match input.find('(') {
            Some(pos) => pos,
            None => {
                return Err(ParseError::NotWellFormed {
                    reason: format!("unrecognized operand: {input:?}"),
                })
            }
        };
        let name = &input[..open];
        let name_ok = name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
        if !name_ok {
            return Err(ParseError::NotWellFormed {
                reason: format!("unrecognized operand: {input:?}"),
            });
        }
        match matcher::find_boundary(input, open + 1) {
            Some(pos) if pos == input.len() - 1 && input.as_bytes()[pos] == b')' => {}
            _ => {
                return Err(ParseError::NotWellFormed {
                    reason: format!("malformed argument list: {input:?}"),
                })
            }
        }
        let inner = &input[open + 1..input.len() - 1];
        let pieces = split_args(inner)?;
        let mut args = Vec::with_capacity(pieces.len());
        for piece in pieces {
            args.push(self.parse_expr(piece)?);
        }

        match self.mode {
            ParseMode::Aggregate => {
                let func =
                    AggregateFn::from_name(name).ok_or_else(|| ParseError::UnknownFunction {
                        name: name.to_string(),
                    })?;
                if args.is_empty() {
                    return Err(ParseError::NotWellFormed {
                        reason: format!("{} requires at least one argument", func.name()),
                    });
                }
                Ok(Expr::Aggregate { func, args })
            }
            ParseMode::RuleCondition => {
                let func = name
                    .strip_prefix("d2:")
                    .and_then(D2Fn::from_name)
                    .ok_or_else(|| ParseError::UnknownFunction {
                        name: name.to_string(),
                    })?;
                let (min, max) = func.arity();
                let count_ok = args.len() >= min && max.map_or(true, |m| args.len() <= m);
                if !count_ok {
                    return Err(ParseError::NotWellFormed {
                        reason: format!("{} called with {} arguments", func.name(), args.len()),
                    });
                }
                Ok(Expr::D2 { func, args })
            }
        }
    }
}

/// Split the rightmost top-level occurrence of any tier operator.
fn split_rightmost<'a>(
    input: &'a str,
    ops: &[(&str, BinaryOp)],
) -> Option<(&'a str, BinaryOp, &'a str)> {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = bytes.len();
    while i > 0 {
        i -= 1;
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => {
                quote = Some(b);
                continue;
            }
            b')' | b']' | b'}' => {
                depth += 1;
                continue;
            }
            b'(' | b'[' | b'{' => {
                depth -= 1;
                continue;
            }
            _ => {}
        }
        if depth != 0 {
            continue;
        }
        for (symbol, op) in ops {
            if input[i..].starts_with(symbol) && operator_fits(bytes, i, symbol) {
                return Some((&input[..i], *op, &input[i + symbol.len()..]));
            }
        }
    }
    None
}

/// Reject `+`/`-` positions that are sign context rather than a binary
/// operator: start of input, right after another operator or an opening
/// delimiter, or the exponent sign of a numeric literal.
fn operator_fits(bytes: &[u8], i: usize, symbol: &str) -> bool {
    if symbol != "+" && symbol != "-" {
        return true;
    }
    let mut p = i;
    while p > 0 {
        p -= 1;
        let prev = bytes[p];
        if prev == b' ' {
            continue;
        }
        if matches!(
            prev,
            b'+' | b'-'
                | b'*'
                | b'/'
                | b'%'
                | b'<'
                | b'>'
                | b'='
                | b'!'
                | b'&'
                | b'|'
                | b'('
                | b'['
                | b','
        ) {
            return false;
        }
        if (prev == b'e' || prev == b'E') && p > 0 && (bytes[p - 1].is_ascii_digit() || bytes[p - 1] == b'.')
        {
            return false;
        }
        return true;
    }
    false
}

/// Split a function argument list at top-level commas.
fn split_args(inner: &str) -> Result<Vec<&str>> {
    let mut args = Vec::new();
    if inner.trim().is_empty() {
        return Ok(args);
    }
    let mut start = 0;
    loop {
        match matcher::find_boundary(inner, start) {
            Some(pos) if inner.as_bytes()[pos] == b',' => {
                args.push(&inner[start..pos]);
                start = pos + 1;
            }
            Some(pos) => {
                return Err(ParseError::NotWellFormed {
                    reason: format!("unexpected {:?} in argument list", &inner[pos..=pos]),
                })
            }
            None => {
                args.push(&inner[start..]);
                return Ok(args);
            }
        }
    }
}
