//! Dynamic column: every cell is a [`Cell`], coercion never fails.

use crate::cell::{coerce_dynamic, Cell};
use crate::context::TableId;
use crate::index::{RowId, RowIndex};

/// The permissive column variant. Numbers normalize through the dynamic
/// coercion chain, everything else is stored as text or missing.
#[derive(Debug, Clone)]
pub struct MixedColumn {
    rowid: RowIndex,
    owner: TableId,
    cells: Vec<Cell>,
}

impl MixedColumn {
    pub fn new(rowid: RowIndex, owner: TableId) -> Self {
        let cells = vec![Cell::Missing; rowid.len()];
        Self {
            rowid,
            owner,
            cells,
        }
    }

    pub fn from_cells(rowid: RowIndex, owner: TableId, cells: Vec<Cell>) -> Self {
        debug_assert_eq!(rowid.len(), cells.len());
        Self {
            rowid,
            owner,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
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

    pub fn cell(&self, pos: usize) -> &Cell {
        &self.cells[pos]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn set_cell(&mut self, pos: usize, value: Cell) {
        self.cells[pos] = coerce_dynamic(value);
    }

    /// Appends default (missing) rows under the given fresh identities.
    pub fn grow(&mut self, fresh: &[RowId]) {
        for &id in fresh {
            self.rowid.push(id);
            self.cells.push(Cell::Missing);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.rowid.truncate(len);
        self.cells.truncate(len);
    }

    /// A new column over the given positions, in their given order.
    pub fn gather_positions(&self, positions: &[usize]) -> Self {
        Self {
            rowid: self.rowid.gather_positions(positions),
            owner: self.owner,
            cells: positions.iter().map(|&p| self.cells[p].clone()).collect(),
        }
    }
}
