//! Strictly typed scalar columns.
//!
//! [`IntColumn`] refuses values it cannot read as an integer; its default is
//! zero, so it has no way to express "missing". [`FloatColumn`] accepts
//! anything and normalizes the unreadable to NaN, which doubles as its
//! default and its missing marker.

use eyre::Result;

use crate::cell::{coerce_float, coerce_int, Cell};
use crate::context::TableId;
use crate::index::{RowId, RowIndex};

#[derive(Debug, Clone)]
pub struct IntColumn {
    rowid: RowIndex,
    owner: TableId,
    values: Vec<i64>,
}

impl IntColumn {
    pub fn new(rowid: RowIndex, owner: TableId) -> Self {
        let values = vec![0; rowid.len()];
        Self {
            rowid,
            owner,
            values,
        }
    }

    pub fn from_values(rowid: RowIndex, owner: TableId, values: Vec<i64>) -> Self {
        debug_assert_eq!(rowid.len(), values.len());
        Self {
            rowid,
            owner,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn rowid(&self) -> &RowIndex {
        &self.rowid
    }

    pub fn owner(&self) -> TableId {
        self.owner
    }

    pub fn set_owner(&mut self, owner: TableId) {
        self.owner = owner;
    }

    pub fn get(&self, pos: usize) -> i64 {
        self.values[pos]
    }

    pub fn cell(&self, pos: usize) -> Cell {
        Cell::Int(self.values[pos])
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn set_cell(&mut self, pos: usize, value: &Cell) -> Result<()> {
        self.values[pos] = coerce_int(value)?;
        Ok(())
    }

    pub fn grow(&mut self, fresh: &[RowId]) {
        for &id in fresh {
            self.rowid.push(id);
            self.values.push(0);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.rowid.truncate(len);
        self.values.truncate(len);
    }

    pub fn gather_positions(&self, positions: &[usize]) -> Self {
        Self {
            rowid: self.rowid.gather_positions(positions),
            owner: self.owner,
            values: positions.iter().map(|&p| self.values[p]).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloatColumn {
    rowid: RowIndex,
    owner: TableId,
    values: Vec<f64>,
}

impl FloatColumn {
    pub fn new(rowid: RowIndex, owner: TableId) -> Self {
        let values = vec![f64::NAN; rowid.len()];
        Self {
            rowid,
            owner,
            values,
        }
    }

    pub fn from_values(rowid: RowIndex, owner: TableId, values: Vec<f64>) -> Self {
        debug_assert_eq!(rowid.len(), values.len());
        Self {
            rowid,
            owner,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn rowid(&self) -> &RowIndex {
        &self.rowid
    }

    pub fn owner(&self) -> TableId {
        self.owner
    }

    pub fn set_owner(&mut self, owner: TableId) {
        self.owner = owner;
    }

    pub fn get(&self, pos: usize) -> f64 {
        self.values[pos]
    }

    pub fn cell(&self, pos: usize) -> Cell {
        Cell::Float(self.values[pos])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn set_cell(&mut self, pos: usize, value: &Cell) {
        self.values[pos] = coerce_float(value);
    }

    pub fn grow(&mut self, fresh: &[RowId]) {
        for &id in fresh {
            self.rowid.push(id);
            self.values.push(f64::NAN);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.rowid.truncate(len);
        self.values.truncate(len);
    }

    pub fn gather_positions(&self, positions: &[usize]) -> Self {
        Self {
            rowid: self.rowid.gather_positions(positions),
            owner: self.owner,
            values: positions.iter().map(|&p| self.values[p]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::index::RowIndex;

    #[test]
    fn int_column_defaults_to_zero_and_stays_strict() {
        let ctx = Context::new();
        let mut c = IntColumn::new(RowIndex::from_count(2), ctx.next_stamp());
        assert_eq!(c.get(0), 0);
        c.set_cell(0, &Cell::from("4.7")).unwrap();
        assert_eq!(c.get(0), 4);
        assert!(c.set_cell(1, &Cell::Missing).is_err());
        assert_eq!(c.get(1), 0);
    }

    #[test]
    fn float_column_normalizes_invalid_to_nan() {
        let ctx = Context::new();
        let mut c = FloatColumn::new(RowIndex::from_count(2), ctx.next_stamp());
        assert!(c.get(0).is_nan());
        c.set_cell(0, &Cell::from("1.5"));
        c.set_cell(1, &Cell::from("oops"));
        assert_eq!(c.get(0), 1.5);
        assert!(c.get(1).is_nan());
    }
}
