//! Shared runtime types

pub mod value;

pub use value::{format_number, nearly_equal, values_equal, Value, ValueType};
