//! # Error Values
//!
//! Typed error values for the failure taxonomy of the engine:
//!
//! | kind | raised when |
//! |------|-------------|
//! | [`TypeMismatch`] | a cell value cannot be coerced for a strictly typed column, or a key kind is invalid for the target |
//! | [`LengthMismatch`] | a sequence is assigned or compared to a span of a different length |
//! | [`ShapeMismatch`] | a multidimensional assignment does not match the selected region |
//! | [`ColumnNotFound`] | a column name is absent from a table |
//! | [`RowOutOfRange`] | a row position is outside the table |
//! | [`LineageMismatch`] | two tables (or a column and a table) do not share a version lineage |
//! | [`FormatError`] | a binary container is missing required entries |
//!
//! All of these are raised through `eyre` with `bail!`, so callers can match
//! on the concrete type via `Report::downcast_ref` when they need to
//! distinguish kinds. Resource conditions (memory pressure, oversized
//! columns) never surface here; they degrade to safe defaults and log a
//! warning instead.

use std::fmt;

/// A value has an unsuitable type for the target column or key position.
#[derive(Debug)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub value: String,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.value)
    }
}

impl std::error::Error for TypeMismatch {}

/// A sequence was applied to a span of a different length.
#[derive(Debug)]
pub struct LengthMismatch {
    pub expected: usize,
    pub got: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sequence has incorrect length: expected {}, got {}",
            self.expected, self.got
        )
    }
}

impl std::error::Error for LengthMismatch {}

/// A multidimensional value does not match the shape of the selected region.
#[derive(Debug)]
pub struct ShapeMismatch {
    pub expected: Vec<usize>,
    pub got: Vec<usize>,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape mismatch: expected {:?}, got {:?}",
            self.expected, self.got
        )
    }
}

impl std::error::Error for ShapeMismatch {}

/// No column with the requested name exists in the table.
#[derive(Debug)]
pub struct ColumnNotFound {
    pub name: String,
}

impl fmt::Display for ColumnNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column '{}' not found", self.name)
    }
}

impl std::error::Error for ColumnNotFound {}

/// A row position is outside the valid range of the table.
#[derive(Debug)]
pub struct RowOutOfRange {
    pub position: usize,
    pub length: usize,
}

impl fmt::Display for RowOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row position {} out of range (length={})",
            self.position, self.length
        )
    }
}

impl std::error::Error for RowOutOfRange {}

/// Two tables, or a column and a table, belong to different lineages.
#[derive(Debug)]
pub struct LineageMismatch;

impl fmt::Display for LineageMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tables do not share a version lineage")
    }
}

impl std::error::Error for LineageMismatch {}

/// A binary container is structurally invalid.
#[derive(Debug)]
pub struct FormatError {
    pub reason: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid container: {}", self.reason)
    }
}

impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = LengthMismatch {
            expected: 3,
            got: 5,
        };
        assert_eq!(
            err.to_string(),
            "sequence has incorrect length: expected 3, got 5"
        );

        let err = ColumnNotFound {
            name: "rt".to_string(),
        };
        assert_eq!(err.to_string(), "column 'rt' not found");
    }

    #[test]
    fn downcast_through_eyre() {
        let report = eyre::Report::new(RowOutOfRange {
            position: 9,
            length: 3,
        });
        let err = report.downcast_ref::<RowOutOfRange>().unwrap();
        assert_eq!(err.position, 9);
    }
}
