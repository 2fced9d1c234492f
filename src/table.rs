//! # Tables
//!
//! A [`Table`] is an insertion-ordered set of named columns over one
//! [`RowIndex`], stamped with a [`TableId`] version. The stamp is the
//! lineage identity: selections and merges copy it, every mutation draws a
//! fresh one and re-stamps the columns, so two tables with equal stamps are
//! guaranteed to share row identities and can be merged or used as row keys
//! for each other's columns.
//!
//! ```text
//! t ──select──> s        (same stamp, subset of ids)
//! t ──mutate──> t'       (fresh stamp, same ids)
//! t ──concat──> u        (fresh stamp, fresh ids 0..n)
//! s & s', s | s', s ^ s' (set algebra over ids, stamps must match)
//! ```
//!
//! Merging prefers rows from `self` and takes the remainder from `other`,
//! with merged identities in ascending order.

use eyre::{bail, ensure, Result};
use hashbrown::HashSet;
use indexmap::IndexMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::column::{CmpOp, Column, ColumnVariant, Key, Keyed, Target};
use crate::context::{Context, TableId};
use crate::error::{ColumnNotFound, LineageMismatch, RowOutOfRange, TypeMismatch};
use crate::index::{RowId, RowIndex};

/// Ordered, versioned collection of columns over shared row identities.
pub struct Table {
    ctx: Arc<Context>,
    stamp: TableId,
    rowindex: RowIndex,
    cols: IndexMap<String, Column>,
    default_variant: ColumnVariant,
}

/// Positional view of one row.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    pos: usize,
}

impl<'a> Row<'a> {
    pub fn id(&self) -> RowId {
        self.table.rowindex.ids()[self.pos]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn cell(&self, name: &str) -> Result<Keyed> {
        self.table.col(name)?.get(&Key::Pos(self.pos))
    }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl Table {
    /// An empty-column table of `length` default-identified rows. New
    /// columns default to the dynamic variant.
    pub fn new(ctx: &Arc<Context>, length: usize) -> Table {
        Self::with_default(ctx, length, ColumnVariant::Mixed)
    }

    /// Like [`Table::new`] with an explicit default column variant.
    pub fn with_default(ctx: &Arc<Context>, length: usize, default_variant: ColumnVariant) -> Table {
        Table {
            ctx: ctx.clone(),
            stamp: ctx.next_stamp(),
            rowindex: RowIndex::from_count(length),
            cols: IndexMap::new(),
            default_variant,
        }
    }

    pub(crate) fn from_parts(
        ctx: Arc<Context>,
        stamp: TableId,
        rowindex: RowIndex,
        cols: IndexMap<String, Column>,
        default_variant: ColumnVariant,
    ) -> Table {
        Table {
            ctx,
            stamp,
            rowindex,
            cols,
            default_variant,
        }
    }

    pub fn id(&self) -> TableId {
        self.stamp
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.rowindex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rowindex.is_empty()
    }

    pub fn rowindex(&self) -> &RowIndex {
        &self.rowindex
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cols.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.cols.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn column_count(&self) -> usize {
        self.cols.len()
    }

    /// Draws a fresh stamp and propagates it to every column. Called by
    /// every mutation.
    fn mutate(&mut self) {
        self.stamp = self.ctx.next_stamp();
        for col in self.cols.values_mut() {
            col.set_owner(self.stamp);
        }
    }

    fn check_name(name: &str) -> Result<()> {
        ensure!(
            valid_name(name),
            TypeMismatch {
                expected: "a valid column name",
                value: format!("'{}'", name),
            }
        );
        Ok(())
    }

    /// Inserts a default-filled column of the table's default variant,
    /// replacing any existing column of the same name in place.
    pub fn insert_default(&mut self, name: &str) -> Result<()> {
        let variant = self.default_variant.clone();
        self.insert(name, &variant)
    }

    /// Inserts a default-filled column of the given variant, replacing any
    /// existing column of the same name in place.
    pub fn insert(&mut self, name: &str, variant: &ColumnVariant) -> Result<()> {
        Self::check_name(name)?;
        self.mutate();
        let col = Column::new(&self.ctx, variant, self.rowindex.clone(), self.stamp)?;
        self.cols.insert(name.to_string(), col);
        Ok(())
    }

    /// Adopts an existing column. The column must belong to this table's
    /// lineage and carry the same row identities.
    pub fn insert_column(&mut self, name: &str, col: Column) -> Result<()> {
        Self::check_name(name)?;
        ensure!(col.owner() == self.stamp, LineageMismatch);
        ensure!(col.rowid() == &self.rowindex, LineageMismatch);
        self.mutate();
        let mut col = col;
        col.set_owner(self.stamp);
        self.cols.insert(name.to_string(), col);
        Ok(())
    }

    pub fn col(&self, name: &str) -> Result<&Column> {
        match self.cols.get(name) {
            Some(col) => Ok(col),
            None => bail!(ColumnNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Mutable column access. Counts as a mutation: the table is re-stamped
    /// before the reference is handed out.
    pub fn col_mut(&mut self, name: &str) -> Result<&mut Column> {
        ensure!(
            self.cols.contains_key(name),
            ColumnNotFound {
                name: name.to_string(),
            }
        );
        self.mutate();
        match self.cols.get_mut(name) {
            Some(col) => Ok(col),
            None => bail!(ColumnNotFound {
                name: name.to_string(),
            }),
        }
    }

    pub fn remove_col(&mut self, name: &str) -> Result<Column> {
        match self.cols.shift_remove(name) {
            Some(col) => {
                self.mutate();
                Ok(col)
            }
            None => bail!(ColumnNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Renames a column in place, preserving its position.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        Self::check_name(new)?;
        ensure!(
            !self.cols.contains_key(new),
            TypeMismatch {
                expected: "an unused column name",
                value: format!("'{}'", new),
            }
        );
        let Some(idx) = self.cols.get_index_of(old) else {
            bail!(ColumnNotFound {
                name: old.to_string(),
            });
        };
        let (_, col) = match self.cols.shift_remove_index(idx) {
            Some(entry) => entry,
            None => bail!(ColumnNotFound {
                name: old.to_string(),
            }),
        };
        self.cols.insert_before(idx, new.to_string(), col);
        self.mutate();
        Ok(())
    }

    /// Grows with fresh identities or shrinks by truncation.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        if length > self.len() {
            let fresh = self.rowindex.extend_fresh(length - self.len());
            for col in self.cols.values_mut() {
                col.grow(&fresh)?;
            }
        } else {
            self.rowindex.truncate(length);
            for col in self.cols.values_mut() {
                col.truncate(length)?;
            }
        }
        self.mutate();
        Ok(())
    }

    /// Deletes the rows at the given positions; everything else survives
    /// with its identity intact.
    pub fn remove_rows(&mut self, positions: &[usize]) -> Result<()> {
        let len = self.len();
        for &p in positions {
            ensure!(
                p < len,
                RowOutOfRange {
                    position: p,
                    length: len,
                }
            );
        }
        let drop: HashSet<usize> = positions.iter().copied().collect();
        let keep: Vec<usize> = (0..len).filter(|p| !drop.contains(p)).collect();
        self.rowindex = self.rowindex.gather_positions(&keep);
        for col in self.cols.values_mut() {
            *col = col.gather_positions(&keep)?;
        }
        self.mutate();
        Ok(())
    }

    pub fn row(&self, pos: usize) -> Result<Row<'_>> {
        ensure!(
            pos < self.len(),
            RowOutOfRange {
                position: pos,
                length: self.len(),
            }
        );
        Ok(Row { table: self, pos })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.len()).map(move |pos| Row { table: self, pos })
    }

    /// A sub-table over the given identities, in their given order. The
    /// stamp is copied: the selection stays in this table's lineage.
    pub fn select_rowids(&self, ids: &[RowId]) -> Result<Table> {
        let mut cols = IndexMap::with_capacity(self.cols.len());
        for (name, col) in &self.cols {
            cols.insert(name.clone(), col.select_ids(ids)?);
        }
        Ok(Table {
            ctx: self.ctx.clone(),
            stamp: self.stamp,
            rowindex: RowIndex::from_ids(ids.to_vec()),
            cols,
            default_variant: self.default_variant.clone(),
        })
    }

    /// A sub-table over the given positions, in their given order.
    pub fn slice_positions(&self, positions: &[usize]) -> Result<Table> {
        let ids: Vec<RowId> = positions
            .iter()
            .map(|&p| {
                ensure!(
                    p < self.len(),
                    RowOutOfRange {
                        position: p,
                        length: self.len(),
                    }
                );
                Ok(self.rowindex.ids()[p])
            })
            .collect::<Result<_>>()?;
        self.select_rowids(&ids)
    }

    pub fn slice_range(&self, range: Range<usize>) -> Result<Table> {
        let positions: Vec<usize> = range.collect();
        self.slice_positions(&positions)
    }

    /// Rows whose cell in `name` matches the comparison, as a sub-table in
    /// this table's lineage.
    pub fn select(&self, name: &str, op: CmpOp, target: &Target) -> Result<Table> {
        let ids = self.col(name)?.matching_rowids(op, target)?;
        self.select_rowids(&ids)
    }

    /// A new table ordered by the named column under the fixed total order.
    pub fn sort_by(&self, name: &str) -> Result<Table> {
        let positions = self.col(name)?.sorted_positions()?;
        self.slice_positions(&positions)
    }

    /// Stacks two tables into a fresh lineage: fresh stamp, fresh row
    /// identities, the union of the columns, defaults where a side lacks a
    /// column. Columns sharing a name but not a variant fall back to the
    /// dynamic variant.
    pub fn concat(&self, other: &Table) -> Result<Table> {
        let total = self.len() + other.len();
        let mut out = Table::with_default(&self.ctx, total, self.default_variant.clone());
        let mut names: Vec<&str> = self.cols.keys().map(String::as_str).collect();
        for name in other.cols.keys() {
            if !self.cols.contains_key(name) {
                names.push(name);
            }
        }
        for name in names {
            let a = self.cols.get(name);
            let b = other.cols.get(name);
            let variant = concat_variant(a, b)?;
            let mut col = Column::new(&out.ctx, &variant, out.rowindex.clone(), out.stamp)?;
            if let Some(a) = a {
                copy_rows(&mut col, 0, a)?;
            }
            if let Some(b) = b {
                copy_rows(&mut col, self.len(), b)?;
            }
            out.cols.insert(name.to_string(), col);
        }
        Ok(out)
    }

    /// Rows present in both tables.
    pub fn intersect(&self, other: &Table) -> Result<Table> {
        ensure!(self.stamp == other.stamp, LineageMismatch);
        let ids = self.rowindex.intersect(&other.rowindex);
        self.merge(other, &ids)
    }

    /// Rows present in either table.
    pub fn union(&self, other: &Table) -> Result<Table> {
        ensure!(self.stamp == other.stamp, LineageMismatch);
        let ids = self.rowindex.union(&other.rowindex);
        self.merge(other, &ids)
    }

    /// Rows present in exactly one table.
    pub fn symdiff(&self, other: &Table) -> Result<Table> {
        ensure!(self.stamp == other.stamp, LineageMismatch);
        let ids = self.rowindex.symdiff(&other.rowindex);
        self.merge(other, &ids)
    }

    /// Assembles the given identities, taking each row from `self` when
    /// present and from `other` otherwise. Both tables must share a
    /// lineage; the result copies the stamp.
    pub fn merge(&self, other: &Table, ids: &[RowId]) -> Result<Table> {
        ensure!(self.stamp == other.stamp, LineageMismatch);
        let rowindex = RowIndex::from_ids(ids.to_vec());
        let mut cols = IndexMap::with_capacity(self.cols.len());
        for (name, col) in &self.cols {
            let other_col = other.cols.get(name);
            let mut merged = Column::new(&self.ctx, &col.variant(), rowindex.clone(), self.stamp)?;
            for (pos, &id) in ids.iter().enumerate() {
                if let Some(p) = col.rowid().try_position_of(id) {
                    copy_one(&mut merged, pos, col, p)?;
                } else if let Some(oc) = other_col {
                    if let Some(p) = oc.rowid().try_position_of(id) {
                        copy_one(&mut merged, pos, oc, p)?;
                    }
                }
            }
            cols.insert(name.clone(), merged);
        }
        Ok(Table {
            ctx: self.ctx.clone(),
            stamp: self.stamp,
            rowindex,
            cols,
            default_variant: self.default_variant.clone(),
        })
    }
}

/// The variant a concatenated column takes: the shared variant when both
/// sides agree, the present side's otherwise, the dynamic fallback when two
/// scalar variants disagree.
fn concat_variant(a: Option<&Column>, b: Option<&Column>) -> Result<ColumnVariant> {
    match (a, b) {
        (Some(a), Some(b)) => match (a, b) {
            (Column::MultiDim(x), Column::MultiDim(y)) => {
                ensure!(
                    x.shape() == y.shape(),
                    crate::error::ShapeMismatch {
                        expected: x.shape().to_vec(),
                        got: y.shape().to_vec(),
                    }
                );
                Ok(a.variant())
            }
            (Column::MultiDim(_), _) | (_, Column::MultiDim(_)) => bail!(TypeMismatch {
                expected: "two multidimensional columns of one shape",
                value: format!("{} and {}", a.variant_name(), b.variant_name()),
            }),
            _ if a.variant_name() == b.variant_name() => Ok(a.variant()),
            _ => Ok(ColumnVariant::Mixed),
        },
        (Some(a), None) => Ok(a.variant()),
        (None, Some(b)) => Ok(b.variant()),
        (None, None) => Ok(ColumnVariant::Mixed),
    }
}

/// Copies every row of `src` into `dst` starting at `offset`.
fn copy_rows(dst: &mut Column, offset: usize, src: &Column) -> Result<()> {
    for pos in 0..src.len() {
        copy_one(dst, offset + pos, src, pos)?;
    }
    Ok(())
}

/// Copies one row across columns. Scalar cells coerce per the destination's
/// discipline; multidimensional rows copy whole cells.
fn copy_one(dst: &mut Column, dpos: usize, src: &Column, spos: usize) -> Result<()> {
    match (dst, src) {
        (Column::MultiDim(dst), Column::MultiDim(src)) => {
            let cell = src.cell(spos)?;
            dst.set_cell(dpos, &cell)
        }
        (Column::MultiDim(_), src) => bail!(TypeMismatch {
            expected: "matching column variants",
            value: format!("a {} column", src.variant_name()),
        }),
        (dst, Column::MultiDim(_)) => bail!(TypeMismatch {
            expected: "matching column variants",
            value: format!("a {} column", dst.variant_name()),
        }),
        (dst, src) => {
            let cell = src.cell_at(spos)?;
            dst.set_one(dpos, &cell)
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_ROWS: usize = 20;
        write!(f, "#")?;
        for name in self.cols.keys() {
            write!(f, "\t{}", name)?;
        }
        writeln!(f)?;
        for (pos, &id) in self.rowindex.ids().iter().enumerate().take(MAX_ROWS) {
            write!(f, "{}", id)?;
            for col in self.cols.values() {
                match col.cell_at(pos) {
                    Ok(cell) => write!(f, "\t{}", cell)?,
                    Err(_) => write!(f, "\t<{}>", col.variant_name())?,
                }
            }
            writeln!(f)?;
        }
        if self.len() > MAX_ROWS {
            writeln!(f, "… ({} rows)", self.len())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("stamp", &self.stamp)
            .field("rows", &self.len())
            .field("columns", &self.cols.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::column::Assign;

    fn table_abc(ctx: &Arc<Context>) -> Table {
        let mut t = Table::new(ctx, 3);
        t.insert("a", &ColumnVariant::Int).unwrap();
        t.col_mut("a")
            .unwrap()
            .set(
                &Key::All,
                &Assign::Seq(vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]),
            )
            .unwrap();
        t
    }

    #[test]
    fn selection_copies_the_stamp_and_mutation_refreshes_it() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let sub = t.slice_range(0..2).unwrap();
        assert_eq!(sub.id(), t.id());

        let mut t = t;
        let before = t.id();
        t.col_mut("a")
            .unwrap()
            .set(&Key::Pos(0), &Assign::Scalar(Cell::Int(9)))
            .unwrap();
        assert_ne!(t.id(), before);
        assert_eq!(t.col("a").unwrap().owner(), t.id());
    }

    #[test]
    fn select_returns_matching_sub_table() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let sub = t
            .select("a", CmpOp::Gt, &Target::Scalar(Cell::Int(1)))
            .unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.rowindex().ids(), &[1, 2]);
        assert_eq!(sub.id(), t.id());
    }

    #[test]
    fn merge_prefers_self_rows() {
        let ctx = Context::new();
        let mut t = table_abc(&ctx);
        t.insert("b", &ColumnVariant::Mixed).unwrap();
        let left = t
            .select("a", CmpOp::Le, &Target::Scalar(Cell::Int(2)))
            .unwrap();
        let mut right = t
            .select("a", CmpOp::Ge, &Target::Scalar(Cell::Int(2)))
            .unwrap();
        // Distinguish the shared row (id 1) on the right side.
        right
            .cols
            .get_mut("a")
            .unwrap()
            .set(&Key::Pos(0), &Assign::Scalar(Cell::Int(99)))
            .unwrap();

        let merged = left.union(&right).unwrap();
        assert_eq!(merged.rowindex().ids(), &[0, 1, 2]);
        match merged.col("a").unwrap() {
            Column::Int(c) => assert_eq!(c.values(), &[1, 2, 3]),
            other => panic!("expected int, got {:?}", other),
        }
    }

    #[test]
    fn set_algebra_requires_shared_lineage() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let u = table_abc(&ctx);
        assert!(t.intersect(&u).is_err());
        let sub = t.slice_range(0..1).unwrap();
        assert!(t.intersect(&sub).is_ok());
    }

    #[test]
    fn union_of_complementary_selections_restores_the_table() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let low = t
            .select("a", CmpOp::Eq, &Target::Scalar(Cell::Int(2)))
            .unwrap();
        let high = t
            .select("a", CmpOp::Eq, &Target::Scalar(Cell::Int(3)))
            .unwrap();
        let both = low.union(&high).unwrap();
        assert_eq!(both.rowindex().ids(), &[1, 2]);
    }

    #[test]
    fn grow_then_shrink_keeps_surviving_ids() {
        let ctx = Context::new();
        let mut t = Table::new(&ctx, 0);
        t.insert("a", &ColumnVariant::Float).unwrap();
        t.set_length(5).unwrap();
        assert_eq!(t.rowindex().ids(), &[0, 1, 2, 3, 4]);
        t.set_length(2).unwrap();
        assert_eq!(t.rowindex().ids(), &[0, 1]);
        assert_eq!(t.col("a").unwrap().len(), 2);
    }

    #[test]
    fn remove_rows_preserves_identities() {
        let ctx = Context::new();
        let mut t = table_abc(&ctx);
        t.remove_rows(&[1]).unwrap();
        assert_eq!(t.rowindex().ids(), &[0, 2]);
        match t.col("a").unwrap() {
            Column::Int(c) => assert_eq!(c.values(), &[1, 3]),
            other => panic!("expected int, got {:?}", other),
        }
    }

    #[test]
    fn concat_unions_columns_with_defaults() {
        let ctx = Context::new();
        let mut t = Table::new(&ctx, 2);
        t.insert("a", &ColumnVariant::Int).unwrap();
        t.insert("b", &ColumnVariant::Mixed).unwrap();
        let mut u = Table::new(&ctx, 2);
        u.insert("a", &ColumnVariant::Int).unwrap();
        u.insert("c", &ColumnVariant::Float).unwrap();

        let cat = t.concat(&u).unwrap();
        assert_eq!(cat.len(), 4);
        assert_eq!(cat.rowindex().ids(), &[0, 1, 2, 3]);
        assert_ne!(cat.id(), t.id());
        let names: Vec<&str> = cat.column_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // b is missing on the right side, c on the left.
        match cat.col("b").unwrap() {
            Column::Mixed(c) => assert!(c.cell(3).is_missing()),
            other => panic!("expected mixed, got {:?}", other),
        }
        match cat.col("c").unwrap() {
            Column::Float(c) => assert!(c.get(0).is_nan()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn concat_mismatched_scalar_variants_fall_back_to_mixed() {
        let ctx = Context::new();
        let mut t = Table::new(&ctx, 1);
        t.insert("a", &ColumnVariant::Int).unwrap();
        let mut u = Table::new(&ctx, 1);
        u.insert("a", &ColumnVariant::Mixed).unwrap();
        u.col_mut("a")
            .unwrap()
            .set(&Key::Pos(0), &Assign::Scalar(Cell::from("x")))
            .unwrap();
        let cat = t.concat(&u).unwrap();
        match cat.col("a").unwrap() {
            Column::Mixed(c) => {
                assert_eq!(*c.cell(0), Cell::Int(0));
                assert_eq!(*c.cell(1), Cell::from("x"));
            }
            other => panic!("expected mixed, got {:?}", other),
        }
    }

    #[test]
    fn rename_preserves_position_and_checks_collisions() {
        let ctx = Context::new();
        let mut t = Table::new(&ctx, 1);
        t.insert("a", &ColumnVariant::Int).unwrap();
        t.insert("b", &ColumnVariant::Int).unwrap();
        t.rename("a", "z").unwrap();
        let names: Vec<&str> = t.column_names().collect();
        assert_eq!(names, vec!["z", "b"]);
        assert!(t.rename("z", "b").is_err());
        assert!(t.rename("z", "9bad").is_err());
        assert!(t.rename("missing", "ok").is_err());
    }

    #[test]
    fn sort_by_uses_the_total_order() {
        let ctx = Context::new();
        let mut t = Table::new(&ctx, 4);
        t.insert("a", &ColumnVariant::Mixed).unwrap();
        t.col_mut("a")
            .unwrap()
            .set(
                &Key::All,
                &Assign::Seq(vec![
                    Cell::from("b"),
                    Cell::Int(2),
                    Cell::Missing,
                    Cell::Int(1),
                ]),
            )
            .unwrap();
        let sorted = t.sort_by("a").unwrap();
        assert_eq!(sorted.rowindex().ids(), &[3, 1, 0, 2]);
    }

    #[test]
    fn foreign_columns_are_rejected() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let mut u = Table::new(&ctx, 3);
        let stolen = t.col("a").unwrap().duplicate().unwrap();
        assert!(u.insert_column("a", stolen).is_err());
    }

    #[test]
    fn row_view_reads_by_name() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let row = t.row(1).unwrap();
        assert_eq!(row.id(), 1);
        match row.cell("a").unwrap() {
            Keyed::Cell(Cell::Int(v)) => assert_eq!(v, 2),
            other => panic!("expected int cell, got {:?}", other),
        }
        assert!(t.row(9).is_err());
    }

    #[test]
    fn rows_selection_key_gathers_by_identity() {
        let ctx = Context::new();
        let t = table_abc(&ctx);
        let sub = t
            .select("a", CmpOp::Ne, &Target::Scalar(Cell::Int(2)))
            .unwrap();
        let keyed = t.col("a").unwrap().get(&Key::Rows(&sub)).unwrap();
        match keyed {
            Keyed::Column(col) => {
                assert_eq!(col.len(), 2);
                assert_eq!(col.rowid().ids(), &[0, 2]);
            }
            other => panic!("expected column, got {:?}", other),
        }
        // A foreign table is not a valid row key.
        let foreign = Table::new(&ctx, 3);
        assert!(t.col("a").unwrap().get(&Key::Rows(&foreign)).is_err());
    }
}
