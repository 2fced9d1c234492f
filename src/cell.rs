//! # Cell Values and Coercion
//!
//! A [`Cell`] is the value of one row in a scalar column. The coercion
//! functions in this module are pure: given an input cell they decide, per
//! column discipline, what actually gets stored.
//!
//! ## Coercion Chain
//!
//! Numeric parsing is attempted first, falling back to text:
//!
//! ```text
//! input ──> integer? ──> Int
//!             │
//!             └──> float? ──> whole number ──> Int
//!                     │           │
//!                     │           └──> Float
//!                     └──> Text
//! ```
//!
//! The textual forms `"nan"` and `"inf"` are deliberately *not* treated as
//! numbers by the dynamic chain, so a column of labels containing the word
//! "nan" stays textual. The float chain, by contrast, accepts them, because
//! a float column has a natural invalid marker (NaN) to normalize into.

use eyre::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypeMismatch;

/// One scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

/// Type tag for isinstance-style comparisons against a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellType {
    Int,
    Float,
    Text,
    Missing,
}

impl Cell {
    /// Numeric view of this cell, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn type_of(&self) -> CellType {
        match self {
            Cell::Int(_) => CellType::Int,
            Cell::Float(_) => CellType::Float,
            Cell::Text(_) => CellType::Text,
            Cell::Missing => CellType::Missing,
        }
    }

    /// Value equality across the numeric variants: `Int(2)` equals
    /// `Float(2.0)`. NaN is not equal to anything here; the comparison layer
    /// adds its reflexive-NaN rule on top.
    pub fn loose_eq(&self, other: &Cell) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Cell::Text(a), Cell::Text(b)) => a == b,
                (Cell::Missing, Cell::Missing) => true,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Cell::Missing,
        }
    }
}

/// True when `f` is a whole number that fits an `i64` exactly.
fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
}

/// Parses `s` as a float, refusing the textual forms of NaN and infinity.
fn parse_finite(s: &str) -> Option<f64> {
    let f = s.trim().parse::<f64>().ok()?;
    f.is_finite().then_some(f)
}

/// Coercion for the dynamic column: numbers normalize (whole floats become
/// ints), everything else stays text or missing. Never fails.
pub fn coerce_dynamic(value: Cell) -> Cell {
    match value {
        Cell::Int(i) => Cell::Int(i),
        Cell::Float(f) if is_integral(f) => Cell::Int(f as i64),
        Cell::Float(f) => Cell::Float(f),
        Cell::Text(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Cell::Int(i);
            }
            match parse_finite(&s) {
                Some(f) if is_integral(f) => Cell::Int(f as i64),
                Some(f) => Cell::Float(f),
                None => Cell::Text(s),
            }
        }
        Cell::Missing => Cell::Missing,
    }
}

/// Coercion for the float column: anything that does not parse as a number
/// becomes the invalid marker (NaN). Textual `nan`/`inf` are accepted here.
pub fn coerce_float(value: &Cell) -> f64 {
    match value {
        Cell::Int(i) => *i as f64,
        Cell::Float(f) => *f,
        Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Cell::Missing => f64::NAN,
    }
}

/// Coercion for the int column: strict. Floats truncate toward zero,
/// numeric text parses, everything else is a type error.
pub fn coerce_int(value: &Cell) -> Result<i64> {
    match value {
        Cell::Int(i) => Ok(*i),
        Cell::Float(f) if f.is_finite() => Ok(*f as i64),
        Cell::Text(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Ok(i);
            }
            if let Some(f) = parse_finite(s) {
                return Ok(f as i64);
            }
            bail!(TypeMismatch {
                expected: "an integer",
                value: format!("'{}'", s),
            })
        }
        other => bail!(TypeMismatch {
            expected: "an integer",
            value: format!("{:?}", other),
        }),
    }
}
