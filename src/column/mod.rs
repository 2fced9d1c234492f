//! # Column Hierarchy
//!
//! A [`Column`] is one named, typed sequence of cells sharing a table's row
//! identities. Four variants cover the storage disciplines:
//!
//! | variant | cell | coercion | default |
//! |---------|------|----------|---------|
//! | `Mixed` | [`Cell`] | never fails, falls back to text/missing | missing |
//! | `Int` | `i64` | strict, non-integer input is an error | 0 |
//! | `Float` | `f64` | invalid input becomes NaN | NaN |
//! | `MultiDim` | `f64` array | numeric only | NaN or 0 |
//!
//! This module holds the variant-dispatching surface: keyed access,
//! comparison into row-identity selections, broadcast arithmetic, summary
//! statistics, and the structural operations tables drive (grow, truncate,
//! gather). The variant internals live in the sibling modules.
//!
//! ## Comparison Semantics
//!
//! Comparisons yield the identities of matching rows; a row whose cell is
//! incomparable with the target (text against a number under an ordering
//! op) is excluded, never an error. Two deliberate IEEE deviations, for
//! selection ergonomics: NaN equals NaN, and infinity equals infinity.

mod mixed;
mod multidim;
mod numeric;

pub use mixed::MixedColumn;
pub use multidim::{AxisKey, MultiDimColumn, NdAssign, NdView};
pub use numeric::{FloatColumn, IntColumn};

use eyre::{bail, ensure, Result};
use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use crate::cell::{coerce_dynamic, coerce_float, coerce_int, Cell, CellType};
use crate::context::{Context, TableId};
use crate::error::{LengthMismatch, LineageMismatch, RowOutOfRange, ShapeMismatch, TypeMismatch};
use crate::index::{RowId, RowIndex};
use crate::sort::sort_class;
use crate::table::Table;

/// Construction spec for a new column.
#[derive(Debug, Clone)]
pub enum ColumnVariant {
    Mixed,
    Int,
    Float,
    MultiDim {
        shape: Vec<usize>,
        default_nan: bool,
    },
    Series {
        depth: usize,
    },
}

/// One table column.
#[derive(Debug)]
pub enum Column {
    Mixed(MixedColumn),
    Int(IntColumn),
    Float(FloatColumn),
    MultiDim(MultiDimColumn),
}

/// Row-axis key for column access.
#[derive(Debug)]
pub enum Key<'a> {
    /// One position: a single cell.
    Pos(usize),
    /// A position range: a sliced column.
    Range(Range<usize>),
    /// Explicit positions, in order: a gathered column.
    Seq(Vec<usize>),
    /// The ellipsis: the column-wide mean.
    All,
    /// Rows matched by identity against a same-lineage table.
    Rows(&'a Table),
}

/// Result of a keyed read.
#[derive(Debug)]
pub enum Keyed {
    Cell(Cell),
    Array { values: Vec<f64>, shape: Vec<usize> },
    Column(Column),
    Reduced(f64),
}

/// Value for a keyed write.
#[derive(Debug)]
pub enum Assign<'a> {
    /// Broadcast to every selected row.
    Scalar(Cell),
    /// One value per selected row, exact length.
    Seq(Vec<Cell>),
    /// Whole-column copy from a same-variant column.
    Column(&'a Column),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Right-hand side of a comparison.
pub enum Target {
    Scalar(Cell),
    /// One value per row, exact length.
    Seq(Vec<Cell>),
    /// Membership test (equality ops only).
    Set(Vec<Cell>),
    /// Cell type test (equality ops only).
    Type(CellType),
    /// Arbitrary per-cell test (equality ops only).
    Predicate(Box<dyn Fn(&Cell) -> bool>),
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Scalar(c) => f.debug_tuple("Scalar").field(c).finish(),
            Target::Seq(s) => f.debug_tuple("Seq").field(s).finish(),
            Target::Set(s) => f.debug_tuple("Set").field(s).finish(),
            Target::Type(t) => f.debug_tuple("Type").field(t).finish(),
            Target::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
}

/// Right-hand side of an arithmetic op.
#[derive(Debug, Clone)]
pub enum Operand {
    Scalar(Cell),
    /// One value per row, exact length.
    Seq(Vec<Cell>),
}

/// Summary statistic selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Mean,
    Median,
    Std,
    Min,
    Max,
    Sum,
}

impl Column {
    /// A default-filled column of the given variant over `rowid`.
    pub fn new(
        ctx: &Arc<Context>,
        variant: &ColumnVariant,
        rowid: RowIndex,
        owner: TableId,
    ) -> Result<Column> {
        Ok(match variant {
            ColumnVariant::Mixed => Column::Mixed(MixedColumn::new(rowid, owner)),
            ColumnVariant::Int => Column::Int(IntColumn::new(rowid, owner)),
            ColumnVariant::Float => Column::Float(FloatColumn::new(rowid, owner)),
            ColumnVariant::MultiDim { shape, default_nan } => Column::MultiDim(
                MultiDimColumn::new(ctx.clone(), rowid, owner, shape, *default_nan)?,
            ),
            ColumnVariant::Series { depth } => {
                Column::MultiDim(MultiDimColumn::series(ctx.clone(), rowid, owner, *depth)?)
            }
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Mixed(c) => c.len(),
            Column::Int(c) => c.len(),
            Column::Float(c) => c.len(),
            Column::MultiDim(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rowid(&self) -> &RowIndex {
        match self {
            Column::Mixed(c) => c.rowid(),
            Column::Int(c) => c.rowid(),
            Column::Float(c) => c.rowid(),
            Column::MultiDim(c) => c.rowid(),
        }
    }

    pub fn owner(&self) -> TableId {
        match self {
            Column::Mixed(c) => c.owner(),
            Column::Int(c) => c.owner(),
            Column::Float(c) => c.owner(),
            Column::MultiDim(c) => c.owner(),
        }
    }

    pub fn set_owner(&mut self, owner: TableId) {
        match self {
            Column::Mixed(c) => c.set_owner(owner),
            Column::Int(c) => c.set_owner(owner),
            Column::Float(c) => c.set_owner(owner),
            Column::MultiDim(c) => c.set_owner(owner),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Column::Mixed(_) => "mixed",
            Column::Int(_) => "int",
            Column::Float(_) => "float",
            Column::MultiDim(_) => "multidim",
        }
    }

    /// The construction spec that would recreate this column's variant.
    pub fn variant(&self) -> ColumnVariant {
        match self {
            Column::Mixed(_) => ColumnVariant::Mixed,
            Column::Int(_) => ColumnVariant::Int,
            Column::Float(_) => ColumnVariant::Float,
            Column::MultiDim(c) => ColumnVariant::MultiDim {
                shape: c.shape().to_vec(),
                default_nan: c.default_nan(),
            },
        }
    }

    /// Deep copy. Fallible because a non-resident column copies through a
    /// fresh backing file.
    pub fn duplicate(&self) -> Result<Column> {
        Ok(match self {
            Column::Mixed(c) => Column::Mixed(c.clone()),
            Column::Int(c) => Column::Int(c.clone()),
            Column::Float(c) => Column::Float(c.clone()),
            Column::MultiDim(c) => Column::MultiDim(c.duplicate()?),
        })
    }

    /// The scalar cell at `pos`. Multidimensional columns have no scalar
    /// cells.
    pub(crate) fn cell_at(&self, pos: usize) -> Result<Cell> {
        match self {
            Column::Mixed(c) => Ok(c.cell(pos).clone()),
            Column::Int(c) => Ok(c.cell(pos)),
            Column::Float(c) => Ok(c.cell(pos)),
            Column::MultiDim(_) => bail!(TypeMismatch {
                expected: "a scalar column",
                value: "a multidimensional column".to_string(),
            }),
        }
    }

    fn resolve_positions(&self, key: &Key<'_>) -> Result<Vec<usize>> {
        let len = self.len();
        let check = |p: usize| -> Result<usize> {
            ensure!(
                p < len,
                RowOutOfRange {
                    position: p,
                    length: len,
                }
            );
            Ok(p)
        };
        match key {
            Key::Pos(p) => Ok(vec![check(*p)?]),
            Key::Range(r) => {
                ensure!(
                    r.end <= len,
                    RowOutOfRange {
                        position: r.end,
                        length: len,
                    }
                );
                Ok(r.clone().collect())
            }
            Key::Seq(positions) => positions.iter().map(|&p| check(p)).collect(),
            Key::All => Ok((0..len).collect()),
            Key::Rows(table) => {
                ensure!(table.id() == self.owner(), LineageMismatch);
                table
                    .rowindex()
                    .iter()
                    .map(|id| match self.rowid().try_position_of(id) {
                        Some(p) => Ok(p),
                        None => bail!(LineageMismatch),
                    })
                    .collect()
            }
        }
    }

    /// Keyed read. `Pos` yields one cell (one array for multidimensional
    /// columns), `All` the column-wide mean, everything else a new column.
    pub fn get(&self, key: &Key<'_>) -> Result<Keyed> {
        match key {
            Key::Pos(p) => match self {
                Column::MultiDim(c) => Ok(Keyed::Array {
                    values: c.cell(*p)?,
                    shape: c.shape().to_vec(),
                }),
                _ => {
                    ensure!(
                        *p < self.len(),
                        RowOutOfRange {
                            position: *p,
                            length: self.len(),
                        }
                    );
                    Ok(Keyed::Cell(self.cell_at(*p)?))
                }
            },
            Key::All => Ok(Keyed::Reduced(self.stat(Stat::Mean)?)),
            _ => {
                let positions = self.resolve_positions(key)?;
                Ok(Keyed::Column(self.gather_positions(&positions)?))
            }
        }
    }

    /// Keyed write. Scalars broadcast; sequences require the exact selected
    /// length; whole-column copies require `Key::All` and a same-variant
    /// source.
    pub fn set(&mut self, key: &Key<'_>, value: &Assign<'_>) -> Result<()> {
        if let Assign::Column(src) = value {
            ensure!(
                matches!(key, Key::All),
                TypeMismatch {
                    expected: "a whole-column target for a column assignment",
                    value: format!("{:?}", key),
                }
            );
            return self.copy_from(src);
        }
        let positions = self.resolve_positions(key)?;
        match value {
            Assign::Scalar(cell) => self.set_broadcast(&positions, cell),
            Assign::Seq(cells) => {
                ensure!(
                    cells.len() == positions.len(),
                    LengthMismatch {
                        expected: positions.len(),
                        got: cells.len(),
                    }
                );
                for (pos, cell) in positions.iter().zip(cells) {
                    self.set_one(*pos, cell)?;
                }
                Ok(())
            }
            Assign::Column(_) => unreachable!(),
        }
    }

    pub(crate) fn set_one(&mut self, pos: usize, cell: &Cell) -> Result<()> {
        match self {
            Column::Mixed(c) => {
                c.set_cell(pos, cell.clone());
                Ok(())
            }
            Column::Int(c) => c.set_cell(pos, cell),
            Column::Float(c) => {
                c.set_cell(pos, cell);
                Ok(())
            }
            Column::MultiDim(_) => bail!(TypeMismatch {
                expected: "an array cell for a multidimensional column",
                value: format!("{:?}", cell),
            }),
        }
    }

    fn set_broadcast(&mut self, positions: &[usize], cell: &Cell) -> Result<()> {
        if let Column::MultiDim(c) = self {
            // A scalar fills every element of the selected rows.
            let v = coerce_float(cell);
            let keys = [AxisKey::Take(positions.to_vec())];
            return c.set_nd(&keys, NdAssign::Scalar(v));
        }
        for &pos in positions {
            self.set_one(pos, cell)?;
        }
        Ok(())
    }

    fn copy_from(&mut self, src: &Column) -> Result<()> {
        ensure!(
            src.len() == self.len(),
            LengthMismatch {
                expected: self.len(),
                got: src.len(),
            }
        );
        match (self, src) {
            (Column::Mixed(dst), Column::Mixed(src)) => {
                *dst = MixedColumn::from_cells(
                    dst.rowid().clone(),
                    dst.owner(),
                    src.cells().to_vec(),
                );
                Ok(())
            }
            (Column::Int(dst), Column::Int(src)) => {
                *dst =
                    IntColumn::from_values(dst.rowid().clone(), dst.owner(), src.values().to_vec());
                Ok(())
            }
            (Column::Float(dst), Column::Float(src)) => {
                *dst = FloatColumn::from_values(
                    dst.rowid().clone(),
                    dst.owner(),
                    src.values().to_vec(),
                );
                Ok(())
            }
            (Column::MultiDim(dst), Column::MultiDim(src)) => {
                ensure!(
                    dst.shape() == src.shape(),
                    ShapeMismatch {
                        expected: dst.shape().to_vec(),
                        got: src.shape().to_vec(),
                    }
                );
                // The destination keeps its own identities and owner.
                let mut copy = src.duplicate()?;
                copy.set_owner(dst.owner());
                copy.set_rowid(dst.rowid().clone());
                *dst = copy;
                Ok(())
            }
            (dst, src) => bail!(TypeMismatch {
                expected: dst.variant_name(),
                value: format!("a {} column", src.variant_name()),
            }),
        }
    }

    /// Identities of rows matching the comparison, in table order. Rows
    /// whose cell is incomparable with the target are excluded.
    pub fn matching_rowids(&self, op: CmpOp, target: &Target) -> Result<Vec<RowId>> {
        if let Column::MultiDim(_) = self {
            bail!(TypeMismatch {
                expected: "a scalar column",
                value: "a comparison on a multidimensional column".to_string(),
            });
        }
        if let Target::Seq(cells) = target {
            ensure!(
                cells.len() == self.len(),
                LengthMismatch {
                    expected: self.len(),
                    got: cells.len(),
                }
            );
        }
        let eq_only = matches!(op, CmpOp::Eq | CmpOp::Ne);
        if matches!(target, Target::Set(_) | Target::Type(_) | Target::Predicate(_)) {
            ensure!(
                eq_only,
                TypeMismatch {
                    expected: "an equality comparison",
                    value: format!("{:?} against {:?}", op, target),
                }
            );
        }
        let mut out = Vec::new();
        for pos in 0..self.len() {
            let cell = self.cell_at(pos)?;
            let hit = match target {
                Target::Scalar(t) => compare_cells(op, &cell, t),
                Target::Seq(cells) => compare_cells(op, &cell, &cells[pos]),
                Target::Set(members) => {
                    let member = members.iter().any(|m| cells_equal(&cell, m));
                    (op == CmpOp::Eq) == member
                }
                Target::Type(t) => (op == CmpOp::Eq) == (cell.type_of() == *t),
                Target::Predicate(pred) => (op == CmpOp::Eq) == pred(&cell),
            };
            if hit {
                out.push(self.rowid().ids()[pos]);
            }
        }
        Ok(out)
    }

    /// Broadcast arithmetic into a fresh column sharing row identities.
    pub fn arith(&self, op: ArithOp, operand: &Operand) -> Result<Column> {
        if let Operand::Seq(cells) = operand {
            ensure!(
                cells.len() == self.len(),
                LengthMismatch {
                    expected: self.len(),
                    got: cells.len(),
                }
            );
        }
        match self {
            Column::Mixed(c) => {
                let cells: Vec<Cell> = (0..c.len())
                    .map(|pos| soft_apply(op, c.cell(pos), operand_cell(operand, pos)))
                    .collect();
                Ok(Column::Mixed(MixedColumn::from_cells(
                    c.rowid().clone(),
                    c.owner(),
                    cells,
                )))
            }
            Column::Int(c) => {
                let mut values = Vec::with_capacity(c.len());
                for pos in 0..c.len() {
                    let b = coerce_int(operand_cell(operand, pos))?;
                    values.push(int_apply(op, c.get(pos), b)?);
                }
                Ok(Column::Int(IntColumn::from_values(
                    c.rowid().clone(),
                    c.owner(),
                    values,
                )))
            }
            Column::Float(c) => {
                let values: Vec<f64> = (0..c.len())
                    .map(|pos| float_apply(op, c.get(pos), coerce_float(operand_cell(operand, pos))))
                    .collect();
                Ok(Column::Float(FloatColumn::from_values(
                    c.rowid().clone(),
                    c.owner(),
                    values,
                )))
            }
            Column::MultiDim(c) => {
                let out = match operand {
                    Operand::Scalar(cell) => {
                        let b = coerce_float(cell);
                        c.map_elements(|v| float_apply(op, v, b))?
                    }
                    Operand::Seq(cells) => {
                        let per_row: Vec<f64> = cells.iter().map(coerce_float).collect();
                        c.map_rows(&per_row, |v, b| float_apply(op, v, b))?
                    }
                };
                Ok(Column::MultiDim(out))
            }
        }
    }

    /// Summary statistic over the finite numeric cells. For
    /// multidimensional columns this reduces over every element of every
    /// row. Zero valid values yield NaN.
    pub fn stat(&self, stat: Stat) -> Result<f64> {
        match self {
            Column::Mixed(c) => Ok(summarize(
                c.cells().iter().filter_map(|cell| cell.as_f64()),
                stat,
            )),
            Column::Int(c) => Ok(summarize(c.values().iter().map(|&v| v as f64), stat)),
            Column::Float(c) => Ok(summarize(c.values().iter().copied(), stat)),
            Column::MultiDim(c) => c.grand_reduce(stat),
        }
    }

    pub fn mean(&self) -> Result<f64> {
        self.stat(Stat::Mean)
    }

    pub fn median(&self) -> Result<f64> {
        self.stat(Stat::Median)
    }

    pub fn std(&self) -> Result<f64> {
        self.stat(Stat::Std)
    }

    pub fn min(&self) -> Result<f64> {
        self.stat(Stat::Min)
    }

    pub fn max(&self) -> Result<f64> {
        self.stat(Stat::Max)
    }

    pub fn sum(&self) -> Result<f64> {
        self.stat(Stat::Sum)
    }

    /// Distinct cell values, sorted by the fixed total order. NaN counts as
    /// one value.
    pub fn unique(&self) -> Result<Vec<Cell>> {
        if let Column::MultiDim(_) = self {
            bail!(TypeMismatch {
                expected: "a scalar column",
                value: "unique() on a multidimensional column".to_string(),
            });
        }
        let mut cells: Vec<Cell> = (0..self.len())
            .map(|pos| self.cell_at(pos))
            .collect::<Result<_>>()?;
        cells.sort_by(|a, b| sort_class(a).cmp(&sort_class(b)));
        cells.dedup_by(|a, b| cells_equal(a, b));
        Ok(cells)
    }

    /// Number of distinct cell values.
    pub fn count(&self) -> Result<usize> {
        Ok(self.unique()?.len())
    }

    /// Positions in ascending order of the fixed total order; stable, so
    /// ties keep their table order.
    pub fn sorted_positions(&self) -> Result<Vec<usize>> {
        if let Column::MultiDim(_) = self {
            bail!(TypeMismatch {
                expected: "a scalar column",
                value: "sorting by a multidimensional column".to_string(),
            });
        }
        let classes: Vec<_> = (0..self.len())
            .map(|pos| self.cell_at(pos).map(|c| sort_class(&c)))
            .collect::<Result<_>>()?;
        let mut positions: Vec<usize> = (0..self.len()).collect();
        positions.sort_by(|&a, &b| classes[a].cmp(&classes[b]));
        Ok(positions)
    }

    /// Appends default-filled rows under the given fresh identities.
    pub fn grow(&mut self, fresh: &[RowId]) -> Result<()> {
        match self {
            Column::Mixed(c) => c.grow(fresh),
            Column::Int(c) => c.grow(fresh),
            Column::Float(c) => c.grow(fresh),
            Column::MultiDim(c) => c.grow(fresh)?,
        }
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) -> Result<()> {
        match self {
            Column::Mixed(c) => c.truncate(len),
            Column::Int(c) => c.truncate(len),
            Column::Float(c) => c.truncate(len),
            Column::MultiDim(c) => c.truncate(len)?,
        }
        Ok(())
    }

    /// A new column over the given positions, in their given order.
    pub fn gather_positions(&self, positions: &[usize]) -> Result<Column> {
        Ok(match self {
            Column::Mixed(c) => Column::Mixed(c.gather_positions(positions)),
            Column::Int(c) => Column::Int(c.gather_positions(positions)),
            Column::Float(c) => Column::Float(c.gather_positions(positions)),
            Column::MultiDim(c) => Column::MultiDim(c.gather_positions(positions)?),
        })
    }

    /// A new column over the given row identities, in their given order.
    /// Every identity must be a member of this column's index.
    pub fn select_ids(&self, ids: &[RowId]) -> Result<Column> {
        let positions = ids
            .iter()
            .map(|&id| match self.rowid().try_position_of(id) {
                Some(p) => Ok(p),
                None => bail!(LineageMismatch),
            })
            .collect::<Result<Vec<_>>>()?;
        self.gather_positions(&positions)
    }
}

fn operand_cell(operand: &Operand, pos: usize) -> &Cell {
    match operand {
        Operand::Scalar(cell) => cell,
        Operand::Seq(cells) => &cells[pos],
    }
}

/// Equality with the reflexive-NaN deviation. Infinities compare equal
/// through ordinary float equality.
fn cells_equal(a: &Cell, b: &Cell) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        if x.is_nan() && y.is_nan() {
            return true;
        }
    }
    a.loose_eq(b)
}

/// Ordering between two cells, or `None` when they are incomparable.
fn cells_ordered(a: &Cell, b: &Cell) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Cell::Text(x), Cell::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_cells(op: CmpOp, cell: &Cell, target: &Cell) -> bool {
    match op {
        CmpOp::Eq => cells_equal(cell, target),
        CmpOp::Ne => !cells_equal(cell, target),
        CmpOp::Lt => cells_ordered(cell, target) == Some(Ordering::Less),
        CmpOp::Le => matches!(
            cells_ordered(cell, target),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        CmpOp::Gt => cells_ordered(cell, target) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(
            cells_ordered(cell, target),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
    }
}

fn float_apply(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::FloorDiv => (a / b).floor(),
        ArithOp::Rem => a - b * (a / b).floor(),
        ArithOp::Pow => a.powf(b),
    }
}

/// Integer arithmetic with floor-division semantics: the quotient rounds
/// toward negative infinity and the remainder takes the divisor's sign.
fn int_apply(op: ArithOp, a: i64, b: i64) -> Result<i64> {
    match op {
        ArithOp::Add => Ok(a.wrapping_add(b)),
        ArithOp::Sub => Ok(a.wrapping_sub(b)),
        ArithOp::Mul => Ok(a.wrapping_mul(b)),
        ArithOp::Div | ArithOp::FloorDiv => {
            ensure!(b != 0, "integer division by zero");
            let q = a / b;
            let r = a % b;
            Ok(if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q })
        }
        ArithOp::Rem => {
            ensure!(b != 0, "integer modulo by zero");
            let r = a % b;
            Ok(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        ArithOp::Pow => Ok((a as f64).powf(b as f64) as i64),
    }
}

/// Soft arithmetic for the dynamic column: numeric pairs compute, text
/// concatenates under addition, and everything else passes the original
/// cell through unchanged.
fn soft_apply(op: ArithOp, a: &Cell, b: &Cell) -> Cell {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return coerce_dynamic(Cell::Float(float_apply(op, x, y)));
    }
    if op == ArithOp::Add {
        if let (Cell::Text(x), Cell::Text(y)) = (a, b) {
            return Cell::Text(format!("{}{}", x, y));
        }
    }
    a.clone()
}

/// One summary statistic over the finite values of an iterator. Non-finite
/// values are skipped; an empty (or all-invalid) input yields NaN, and so
/// does a standard deviation of fewer than two values (ddof = 1).
pub fn summarize(values: impl Iterator<Item = f64>, stat: Stat) -> f64 {
    let mut valid: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let n = valid.len() as f64;
    match stat {
        Stat::Sum => valid.iter().sum(),
        Stat::Mean => valid.iter().sum::<f64>() / n,
        Stat::Min => valid.iter().copied().fold(f64::INFINITY, f64::min),
        Stat::Max => valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Stat::Median => {
            valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let mid = valid.len() / 2;
            if valid.len() % 2 == 1 {
                valid[mid]
            } else {
                (valid[mid - 1] + valid[mid]) / 2.0
            }
        }
        Stat::Std => {
            if valid.len() < 2 {
                return f64::NAN;
            }
            let mean = valid.iter().sum::<f64>() / n;
            let var = valid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        }
    }
}
