//! # Total Order for Heterogeneous Cells
//!
//! Sorting a dynamic column means ranking numbers, text, missing values, and
//! NaN against each other. This module defines the one total order every
//! column variant reproduces, so cross-variant sorts agree:
//!
//! ```text
//! numbers (ascending, +inf included) < text (lexical) < missing < NaN
//! ```
//!
//! Numeric text ranks as its numeric value (`"12"` sorts between 11 and 13),
//! matching the coercion chain. The order is total and the sort is stable,
//! so re-sorting an already sorted column is the identity.

use std::cmp::Ordering;

use crate::cell::Cell;

/// Rank of one cell inside the fixed total order.
#[derive(Debug, Clone, PartialEq)]
pub enum SortClass {
    Number(f64),
    Text(String),
    Missing,
    Nan,
}

impl SortClass {
    fn rank(&self) -> u8 {
        match self {
            SortClass::Number(_) => 0,
            SortClass::Text(_) => 1,
            SortClass::Missing => 2,
            SortClass::Nan => 3,
        }
    }
}

impl Eq for SortClass {}

impl PartialOrd for SortClass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortClass {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortClass::Number(a), SortClass::Number(b)) => {
                // NaN never reaches this arm; it is classified as Nan.
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortClass::Text(a), SortClass::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Classifies a cell into the total order. Text that parses as a number
/// (including `nan`/`inf`) is ranked numerically.
pub fn sort_class(cell: &Cell) -> SortClass {
    match cell {
        Cell::Int(i) => SortClass::Number(*i as f64),
        Cell::Float(f) if f.is_nan() => SortClass::Nan,
        Cell::Float(f) => SortClass::Number(*f),
        Cell::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_nan() => SortClass::Nan,
            Ok(f) => SortClass::Number(f),
            Err(_) => SortClass::Text(s.clone()),
        },
        Cell::Missing => SortClass::Missing,
    }
}

/// Classifies a raw float, as stored by numeric and multidimensional columns.
pub fn sort_class_f64(f: f64) -> SortClass {
    if f.is_nan() {
        SortClass::Nan
    } else {
        SortClass::Number(f)
    }
}
