//! # Multidimensional Column
//!
//! Each cell of a [`MultiDimColumn`] is an n-dimensional `f64` array of a
//! fixed per-column shape; the column as a whole is one flat row-major
//! buffer of `rows * cell_len` elements. A series column is the
//! one-cell-axis case with a resizable depth.
//!
//! The buffer lives behind the residency manager: every access and mutation
//! first calls `touch`, which records recency, may restore residency, and
//! may evict colder columns. Reads and writes work identically whether the
//! buffer is in memory or memory-mapped.
//!
//! ## Advanced Indexing
//!
//! [`get_nd`]/[`set_nd`] take one [`AxisKey`] per axis (row axis first,
//! missing trailing keys mean "all"). Axes select independently, as an
//! outer product, never zipped:
//!
//! ```text
//! key            keeps axis?   meaning
//! All            yes           every index
//! At(i)          collapsed     single index
//! Take(vec)      yes           listed indices, in order
//! Label(l)       collapsed     single index, by axis label
//! Labels(vec)    yes           listed labels, in order
//! Reduce         averaged      mean over the axis, ignoring non-finite
//! ```
//!
//! Reduced axes pool into one flat mean per surviving lane, so stacking a
//! reduction on every axis yields the column's grand mean.
//!
//! The result collapses by what remains: nothing → scalar; row axis only →
//! float column; cell axes only → one array; otherwise a smaller
//! multidimensional column sharing row identities with the selection.
//!
//! [`get_nd`]: MultiDimColumn::get_nd
//! [`set_nd`]: MultiDimColumn::set_nd

use eyre::{bail, ensure, Result};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::column::{summarize, Column, Stat};
use crate::context::{Context, TableId};
use crate::error::{RowOutOfRange, ShapeMismatch, TypeMismatch};
use crate::index::{RowId, RowIndex};
use crate::residency::{ColumnHandle, NdBuffer};

use super::numeric::FloatColumn;

/// Per-axis selector for advanced indexing.
#[derive(Debug, Clone)]
pub enum AxisKey {
    All,
    At(usize),
    Take(Vec<usize>),
    Label(String),
    Labels(Vec<String>),
    Reduce,
}

/// Result of an advanced indexing read.
#[derive(Debug)]
pub enum NdView {
    Scalar(f64),
    Array { values: Vec<f64>, shape: Vec<usize> },
    Column(Column),
}

/// Value for an advanced indexing write.
#[derive(Debug, Clone, Copy)]
pub enum NdAssign<'a> {
    Scalar(f64),
    Array {
        values: &'a [f64],
        shape: &'a [usize],
    },
}

struct AxisSel {
    indices: Vec<usize>,
    reduce: bool,
    collapse: bool,
}

pub struct MultiDimColumn {
    rowid: RowIndex,
    owner: TableId,
    /// Cell shape, without the row axis.
    shape: SmallVec<[usize; 3]>,
    /// One optional label list per cell axis.
    labels: Vec<Option<Vec<String>>>,
    default_nan: bool,
    buffer: Arc<Mutex<NdBuffer>>,
    handle: ColumnHandle,
    ctx: Arc<Context>,
}

impl MultiDimColumn {
    /// A column of default-filled cells of the given shape. The initial
    /// residency state follows the fit heuristic: a column too large for
    /// available memory starts life on a backing file and is never fully
    /// materialized.
    pub fn new(
        ctx: Arc<Context>,
        rowid: RowIndex,
        owner: TableId,
        shape: &[usize],
        default_nan: bool,
    ) -> Result<Self> {
        ensure!(
            !shape.is_empty(),
            TypeMismatch {
                expected: "at least one cell axis",
                value: "an empty shape".to_string(),
            }
        );
        let cell_len: usize = shape.iter().product();
        let rows = rowid.len();
        let fill = if default_nan { f64::NAN } else { 0.0 };
        let cfg = ctx.config();
        let size = (rows * cell_len * 8) as u64;
        let buf = if ctx.residency().prefers_resident(size, &cfg) {
            NdBuffer::new_resident(rows, cell_len, fill)
        } else {
            let chunk = cfg.chunk_rows((cell_len * 8) as u64);
            NdBuffer::new_mapped(rows, cell_len, fill, &cfg.tmp_dir, chunk)?
        };
        Ok(Self::from_buffer(
            ctx,
            rowid,
            owner,
            shape,
            default_nan,
            vec![None; shape.len()],
            buf,
        ))
    }

    /// A series column: one resizable depth axis.
    pub fn series(
        ctx: Arc<Context>,
        rowid: RowIndex,
        owner: TableId,
        depth: usize,
    ) -> Result<Self> {
        Self::new(ctx, rowid, owner, &[depth], true)
    }

    /// Wraps an already-populated buffer, registering it with the residency
    /// manager.
    pub(crate) fn from_buffer(
        ctx: Arc<Context>,
        rowid: RowIndex,
        owner: TableId,
        shape: &[usize],
        default_nan: bool,
        labels: Vec<Option<Vec<String>>>,
        buf: NdBuffer,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(buf));
        let handle = ctx.residency().register(&buffer);
        Self {
            rowid,
            owner,
            shape: SmallVec::from_slice(shape),
            labels,
            default_nan,
            buffer,
            handle,
            ctx,
        }
    }

    fn fill(&self) -> f64 {
        if self.default_nan {
            f64::NAN
        } else {
            0.0
        }
    }

    fn touch(&self, try_to_load: bool) -> Result<()> {
        self.ctx
            .residency()
            .touch(self.handle, try_to_load, &self.ctx.config())
    }

    pub fn len(&self) -> usize {
        self.rowid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rowid.is_empty()
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

    pub(crate) fn set_rowid(&mut self, rowid: RowIndex) {
        debug_assert_eq!(rowid.len(), self.rowid.len());
        self.rowid = rowid;
    }

    /// Cell shape, without the row axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn default_nan(&self) -> bool {
        self.default_nan
    }

    fn cell_len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Depth of a series column (its single cell axis).
    pub fn depth(&self) -> usize {
        self.shape[0]
    }

    pub fn loaded(&self) -> bool {
        self.buffer.lock().loaded()
    }

    pub(crate) fn buffer(&self) -> &Arc<Mutex<NdBuffer>> {
        &self.buffer
    }

    /// Forces the residency state, bypassing the fit heuristic.
    pub fn set_loaded(&self, loaded: bool) -> Result<()> {
        let cfg = self.ctx.config();
        if loaded {
            self.ctx.residency().force_resident(self.handle, &cfg)
        } else {
            self.ctx.residency().force_unloaded(self.handle, &cfg)
        }
    }

    /// Labels of one cell axis.
    pub fn labels(&self, axis: usize) -> Option<&[String]> {
        self.labels.get(axis)?.as_deref()
    }

    pub fn set_labels(&mut self, axis: usize, labels: Vec<String>) -> Result<()> {
        ensure!(
            axis < self.shape.len(),
            TypeMismatch {
                expected: "a cell axis index",
                value: format!("axis {} of a {}-axis cell", axis, self.shape.len()),
            }
        );
        ensure!(
            labels.len() == self.shape[axis],
            ShapeMismatch {
                expected: vec![self.shape[axis]],
                got: vec![labels.len()],
            }
        );
        self.labels[axis] = Some(labels);
        Ok(())
    }

    /// One row's cell, copied out.
    pub fn cell(&self, pos: usize) -> Result<Vec<f64>> {
        ensure!(
            pos < self.len(),
            RowOutOfRange {
                position: pos,
                length: self.len(),
            }
        );
        self.touch(true)?;
        Ok(self.buffer.lock().row(pos).to_vec())
    }

    /// Replaces one row's cell.
    pub fn set_cell(&mut self, pos: usize, values: &[f64]) -> Result<()> {
        ensure!(
            pos < self.len(),
            RowOutOfRange {
                position: pos,
                length: self.len(),
            }
        );
        ensure!(
            values.len() == self.cell_len(),
            ShapeMismatch {
                expected: self.shape.to_vec(),
                got: vec![values.len()],
            }
        );
        self.touch(true)?;
        self.buffer.lock().row_mut(pos).copy_from_slice(values);
        Ok(())
    }

    /// Fills every element of the column with one value.
    pub fn fill_with(&mut self, value: f64) -> Result<()> {
        self.touch(true)?;
        self.buffer.lock().as_mut_slice().fill(value);
        Ok(())
    }

    /// Broadcasts one cell array to every row.
    pub fn set_all_rows(&mut self, values: &[f64]) -> Result<()> {
        ensure!(
            values.len() == self.cell_len(),
            ShapeMismatch {
                expected: self.shape.to_vec(),
                got: vec![values.len()],
            }
        );
        self.touch(true)?;
        let mut guard = self.buffer.lock();
        for r in 0..guard.rows() {
            guard.row_mut(r).copy_from_slice(values);
        }
        Ok(())
    }

    fn dim(&self, axis: usize) -> usize {
        if axis == 0 {
            self.rowid.len()
        } else {
            self.shape[axis - 1]
        }
    }

    fn label_index(&self, axis: usize, label: &str) -> Result<usize> {
        if axis == 0 {
            bail!(TypeMismatch {
                expected: "a positional key on the row axis",
                value: format!("label '{}'", label),
            });
        }
        let known = self.labels[axis - 1].as_deref().unwrap_or(&[]);
        match known.iter().position(|l| l == label) {
            Some(i) => Ok(i),
            None => bail!(TypeMismatch {
                expected: "a known axis label",
                value: format!("'{}'", label),
            }),
        }
    }

    fn resolve_axis(&self, axis: usize, key: &AxisKey) -> Result<AxisSel> {
        let dim = self.dim(axis);
        let check = |i: usize| -> Result<usize> {
            ensure!(
                i < dim,
                RowOutOfRange {
                    position: i,
                    length: dim,
                }
            );
            Ok(i)
        };
        let sel = match key {
            AxisKey::All => AxisSel {
                indices: (0..dim).collect(),
                reduce: false,
                collapse: false,
            },
            AxisKey::At(i) => AxisSel {
                indices: vec![check(*i)?],
                reduce: false,
                collapse: true,
            },
            AxisKey::Take(list) => AxisSel {
                indices: list
                    .iter()
                    .map(|&i| check(i))
                    .collect::<Result<Vec<_>>>()?,
                reduce: false,
                collapse: false,
            },
            AxisKey::Label(l) => AxisSel {
                indices: vec![self.label_index(axis, l)?],
                reduce: false,
                collapse: true,
            },
            AxisKey::Labels(list) => AxisSel {
                indices: list
                    .iter()
                    .map(|l| self.label_index(axis, l))
                    .collect::<Result<Vec<_>>>()?,
                reduce: false,
                collapse: false,
            },
            AxisKey::Reduce => AxisSel {
                indices: (0..dim).collect(),
                reduce: true,
                collapse: false,
            },
        };
        Ok(sel)
    }

    fn resolve_keys(&self, keys: &[AxisKey]) -> Result<Vec<AxisSel>> {
        let ndim = self.shape.len() + 1;
        ensure!(
            keys.len() <= ndim,
            TypeMismatch {
                expected: "at most one key per axis",
                value: format!("{} keys for {} axes", keys.len(), ndim),
            }
        );
        (0..ndim)
            .map(|axis| self.resolve_axis(axis, keys.get(axis).unwrap_or(&AxisKey::All)))
            .collect()
    }

    /// Reads a sub-array selected per axis. See the module docs for how the
    /// result collapses.
    pub fn get_nd(&self, keys: &[AxisKey]) -> Result<NdView> {
        let sels = self.resolve_keys(keys)?;
        let ndim = sels.len();
        let strides = self.strides();

        self.touch(true)?;
        let dims: Vec<usize> = sels.iter().map(|s| s.indices.len()).collect();
        let out_len: usize = dims.iter().product();
        let mut values = Vec::with_capacity(out_len);
        {
            let guard = self.buffer.lock();
            let data = guard.as_slice();
            let mut idx = vec![0usize; ndim];
            for _ in 0..out_len {
                let mut off = 0;
                for a in 0..ndim {
                    off += sels[a].indices[idx[a]] * strides[a];
                }
                values.push(data[off]);
                for a in (0..ndim).rev() {
                    idx[a] += 1;
                    if idx[a] < dims[a] {
                        break;
                    }
                    idx[a] = 0;
                }
            }
        }

        // Reduced axes pool into one flat mean, so a reduction stacked on
        // every axis agrees with the grand reduction.
        let reduced: Vec<bool> = sels.iter().map(|s| s.reduce).collect();
        if reduced.contains(&true) {
            values = reduce_mean_axes(&values, &dims, &reduced);
        }
        let kept: Vec<usize> = (0..ndim).filter(|&a| !reduced[a]).collect();

        // Collapsed axes have length one and drop out of the result shape.
        let remaining: Vec<usize> = kept
            .iter()
            .copied()
            .filter(|&a| !sels[a].collapse)
            .collect();
        let row_kept = remaining.contains(&0);
        let cell_axes: Vec<usize> = remaining.iter().copied().filter(|&a| a != 0).collect();

        if remaining.is_empty() {
            return Ok(NdView::Scalar(values[0]));
        }
        let cell_shape: Vec<usize> = cell_axes
            .iter()
            .map(|&a| sels[a].indices.len())
            .collect();
        if !row_kept {
            return Ok(NdView::Array {
                values,
                shape: cell_shape,
            });
        }
        let rowid = self.rowid.gather_positions(&sels[0].indices);
        if cell_axes.is_empty() {
            let col = FloatColumn::from_values(rowid, self.owner, values);
            return Ok(NdView::Column(Column::Float(col)));
        }
        let labels = cell_axes
            .iter()
            .map(|&a| {
                self.labels[a - 1]
                    .as_ref()
                    .map(|l| sels[a].indices.iter().map(|&i| l[i].clone()).collect())
            })
            .collect();
        let rows = rowid.len();
        let cell_len: usize = cell_shape.iter().product();
        let mut buf = NdBuffer::new_resident(rows, cell_len, 0.0);
        buf.as_mut_slice().copy_from_slice(&values);
        let col = MultiDimColumn::from_buffer(
            self.ctx.clone(),
            rowid,
            self.owner,
            &cell_shape,
            self.default_nan,
            labels,
            buf,
        );
        Ok(NdView::Column(Column::MultiDim(col)))
    }

    /// Writes a scalar or an array into a sub-array selected per axis.
    pub fn set_nd(&mut self, keys: &[AxisKey], value: NdAssign<'_>) -> Result<()> {
        let sels = self.resolve_keys(keys)?;
        for sel in &sels {
            ensure!(
                !sel.reduce,
                TypeMismatch {
                    expected: "a selecting key",
                    value: "a reduction in an assignment target".to_string(),
                }
            );
        }
        let ndim = sels.len();
        let strides = self.strides();
        let dims: Vec<usize> = sels.iter().map(|s| s.indices.len()).collect();
        let target_len: usize = dims.iter().product();

        if let NdAssign::Array { values, shape } = value {
            let expected: Vec<usize> = (0..ndim)
                .filter(|&a| !sels[a].collapse)
                .map(|a| dims[a])
                .collect();
            ensure!(
                shape == expected.as_slice() && values.len() == target_len,
                ShapeMismatch {
                    expected,
                    got: shape.to_vec(),
                }
            );
        }

        self.touch(true)?;
        let mut guard = self.buffer.lock();
        let data = guard.as_mut_slice();
        let mut idx = vec![0usize; ndim];
        for n in 0..target_len {
            let mut off = 0;
            for a in 0..ndim {
                off += sels[a].indices[idx[a]] * strides[a];
            }
            data[off] = match value {
                NdAssign::Scalar(v) => v,
                NdAssign::Array { values, .. } => values[n],
            };
            for a in (0..ndim).rev() {
                idx[a] += 1;
                if idx[a] < dims[a] {
                    break;
                }
                idx[a] = 0;
            }
        }
        Ok(())
    }

    /// Element strides over `(rows, shape…)`, row-major.
    fn strides(&self) -> Vec<usize> {
        let ndim = self.shape.len() + 1;
        let mut strides = vec![1usize; ndim];
        for a in (0..ndim - 1).rev() {
            strides[a] = strides[a + 1] * self.dim(a + 1);
        }
        strides
    }

    /// Resizes the depth axis of a series column in place, padding new
    /// elements with NaN or truncating. Residency state is preserved.
    pub fn set_depth(&mut self, depth: usize) -> Result<()> {
        ensure!(
            self.shape.len() == 1,
            TypeMismatch {
                expected: "a series column",
                value: format!("a column with {} cell axes", self.shape.len()),
            }
        );
        if depth == self.shape[0] {
            return Ok(());
        }
        self.touch(false)?;
        let cfg = self.ctx.config();
        let rows = self.len();
        let mut guard = self.buffer.lock();
        let keep = guard.cell_len().min(depth);
        let mut next = if guard.loaded() {
            NdBuffer::new_resident(rows, depth, f64::NAN)
        } else {
            let chunk = cfg.chunk_rows((depth * 8).max(8) as u64);
            NdBuffer::new_mapped(rows, depth, f64::NAN, &cfg.tmp_dir, chunk)?
        };
        for r in 0..rows {
            next.row_mut(r)[..keep].copy_from_slice(&guard.row(r)[..keep]);
        }
        *guard = next;
        drop(guard);
        self.shape[0] = depth;
        if let Some(l) = &mut self.labels[0] {
            l.truncate(depth);
            if l.len() != depth {
                self.labels[0] = None;
            }
        }
        Ok(())
    }

    /// One value per row: the statistic over all of the row's elements,
    /// ignoring non-finite ones.
    pub fn row_reduce(&self, stat: Stat) -> Result<Vec<f64>> {
        self.touch(true)?;
        let guard = self.buffer.lock();
        Ok((0..guard.rows())
            .map(|r| summarize(guard.row(r).iter().copied(), stat))
            .collect())
    }

    /// The statistic over every element of every row.
    pub(crate) fn grand_reduce(&self, stat: Stat) -> Result<f64> {
        self.touch(true)?;
        let guard = self.buffer.lock();
        Ok(summarize(guard.as_slice().iter().copied(), stat))
    }

    /// Elementwise map into a fresh column sharing row identities.
    pub(crate) fn map_elements(&self, f: impl Fn(f64) -> f64) -> Result<Self> {
        let out = self.duplicate()?;
        out.touch(true)?;
        let mut guard = out.buffer.lock();
        for v in guard.as_mut_slice() {
            *v = f(*v);
        }
        drop(guard);
        Ok(out)
    }

    /// Elementwise map with one right-hand value per row.
    pub(crate) fn map_rows(
        &self,
        row_operands: &[f64],
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self> {
        ensure!(
            row_operands.len() == self.len(),
            crate::error::LengthMismatch {
                expected: self.len(),
                got: row_operands.len(),
            }
        );
        let out = self.duplicate()?;
        out.touch(true)?;
        let mut guard = out.buffer.lock();
        for (r, &b) in row_operands.iter().enumerate() {
            for v in guard.row_mut(r) {
                *v = f(*v, b);
            }
        }
        drop(guard);
        Ok(out)
    }

    /// A deep copy preserving the residency state.
    pub fn duplicate(&self) -> Result<Self> {
        self.touch(false)?;
        let cfg = self.ctx.config();
        let guard = self.buffer.lock();
        let rows = guard.rows();
        let cell_len = guard.cell_len();
        let mut next = if guard.loaded() {
            NdBuffer::new_resident(rows, cell_len, 0.0)
        } else {
            let chunk = cfg.chunk_rows(guard.bytes_per_row().max(8));
            NdBuffer::new_mapped(rows, cell_len, 0.0, &cfg.tmp_dir, chunk)?
        };
        let len = guard.len();
        let chunk = cfg.chunk_rows(guard.bytes_per_row().max(8)) * cell_len.max(1);
        let src = guard.as_slice();
        let dst = next.as_mut_slice();
        for start in (0..len).step_by(chunk.max(1)) {
            let end = (start + chunk.max(1)).min(len);
            dst[start..end].copy_from_slice(&src[start..end]);
        }
        drop(guard);
        Ok(Self::from_buffer(
            self.ctx.clone(),
            self.rowid.clone(),
            self.owner,
            &self.shape,
            self.default_nan,
            self.labels.clone(),
            next,
        ))
    }

    /// Appends default-filled rows under the given fresh identities.
    pub fn grow(&mut self, fresh: &[RowId]) -> Result<()> {
        self.touch(false)?;
        let cfg = self.ctx.config();
        let fill = self.fill();
        let mut guard = self.buffer.lock();
        let chunk = cfg.chunk_rows(guard.bytes_per_row().max(8));
        let rows = guard.rows() + fresh.len();
        guard.resize_rows(rows, fill, &cfg.tmp_dir, chunk)?;
        drop(guard);
        for &id in fresh {
            self.rowid.push(id);
        }
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) -> Result<()> {
        self.touch(false)?;
        let cfg = self.ctx.config();
        let fill = self.fill();
        let mut guard = self.buffer.lock();
        let chunk = cfg.chunk_rows(guard.bytes_per_row().max(8));
        guard.resize_rows(len, fill, &cfg.tmp_dir, chunk)?;
        drop(guard);
        self.rowid.truncate(len);
        Ok(())
    }

    /// A new column over the given positions, in their given order.
    pub fn gather_positions(&self, positions: &[usize]) -> Result<Self> {
        self.touch(true)?;
        let cfg = self.ctx.config();
        let cell_len = self.cell_len();
        let size = (positions.len() * cell_len * 8) as u64;
        let mut next = if self.ctx.residency().prefers_resident(size, &cfg) {
            NdBuffer::new_resident(positions.len(), cell_len, 0.0)
        } else {
            let chunk = cfg.chunk_rows((cell_len * 8).max(8) as u64);
            NdBuffer::new_mapped(positions.len(), cell_len, 0.0, &cfg.tmp_dir, chunk)?
        };
        {
            let guard = self.buffer.lock();
            for (out, &pos) in positions.iter().enumerate() {
                next.row_mut(out).copy_from_slice(guard.row(pos));
            }
        }
        Ok(Self::from_buffer(
            self.ctx.clone(),
            self.rowid.gather_positions(positions),
            self.owner,
            &self.shape,
            self.default_nan,
            self.labels.clone(),
            next,
        ))
    }
}

impl Drop for MultiDimColumn {
    fn drop(&mut self) {
        self.ctx.residency().unregister(self.handle);
    }
}

impl std::fmt::Debug for MultiDimColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiDimColumn")
            .field("rows", &self.len())
            .field("shape", &self.shape)
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// Flat mean over the reduced axes of a dense row-major array, ignoring
/// non-finite elements. All reduced axes pool into one mean per surviving
/// lane, so reducing every axis yields the grand mean. All-invalid lanes
/// yield NaN.
fn reduce_mean_axes(values: &[f64], dims: &[usize], reduced: &[bool]) -> Vec<f64> {
    let out_len: usize = dims
        .iter()
        .zip(reduced)
        .filter_map(|(&d, &r)| (!r).then_some(d))
        .product();
    let mut sums = vec![0.0; out_len];
    let mut counts = vec![0usize; out_len];
    let ndim = dims.len();
    let mut idx = vec![0usize; ndim];
    for &v in values {
        let mut out = 0usize;
        for a in 0..ndim {
            if !reduced[a] {
                out = out * dims[a] + idx[a];
            }
        }
        if v.is_finite() {
            sums[out] += v;
            counts[out] += 1;
        }
        for a in (0..ndim).rev() {
            idx[a] += 1;
            if idx[a] < dims[a] {
                break;
            }
            idx[a] = 0;
        }
    }
    sums.iter()
        .zip(&counts)
        .map(|(&s, &c)| if c == 0 { f64::NAN } else { s / c as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn series(ctx: &Arc<Context>, rows: usize, depth: usize) -> MultiDimColumn {
        MultiDimColumn::series(
            ctx.clone(),
            RowIndex::from_count(rows),
            ctx.next_stamp(),
            depth,
        )
        .unwrap()
    }

    #[test]
    fn cells_default_to_nan_and_round_trip() {
        let ctx = Context::new();
        let mut col = series(&ctx, 2, 3);
        assert!(col.cell(0).unwrap().iter().all(|v| v.is_nan()));
        col.set_cell(1, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(col.cell(1).unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(col.set_cell(1, &[1.0]).is_err());
    }

    #[test]
    fn advanced_indexing_collapses_by_remaining_shape() {
        let ctx = Context::new();
        let mut col = series(&ctx, 2, 3);
        col.set_cell(0, &[1.0, 2.0, 3.0]).unwrap();
        col.set_cell(1, &[4.0, 5.0, 6.0]).unwrap();

        match col.get_nd(&[AxisKey::At(1), AxisKey::At(2)]).unwrap() {
            NdView::Scalar(v) => assert_eq!(v, 6.0),
            other => panic!("expected scalar, got {:?}", other),
        }
        match col.get_nd(&[AxisKey::All, AxisKey::At(0)]).unwrap() {
            NdView::Column(Column::Float(f)) => assert_eq!(f.values(), &[1.0, 4.0]),
            other => panic!("expected float column, got {:?}", other),
        }
        match col.get_nd(&[AxisKey::At(0)]).unwrap() {
            NdView::Array { values, shape } => {
                assert_eq!(values, vec![1.0, 2.0, 3.0]);
                assert_eq!(shape, vec![3]);
            }
            other => panic!("expected array, got {:?}", other),
        }
        match col
            .get_nd(&[AxisKey::All, AxisKey::Take(vec![2, 0])])
            .unwrap()
        {
            NdView::Column(Column::MultiDim(m)) => {
                assert_eq!(m.shape(), &[2]);
                assert_eq!(m.cell(0).unwrap(), vec![3.0, 1.0]);
            }
            other => panic!("expected multidim column, got {:?}", other),
        }
    }

    #[test]
    fn reduce_averages_ignoring_nan() {
        let ctx = Context::new();
        let mut col = series(&ctx, 2, 2);
        col.set_cell(0, &[1.0, f64::NAN]).unwrap();
        col.set_cell(1, &[3.0, 5.0]).unwrap();
        // Mean over the depth axis per row.
        match col.get_nd(&[AxisKey::All, AxisKey::Reduce]).unwrap() {
            NdView::Column(Column::Float(f)) => assert_eq!(f.values(), &[1.0, 4.0]),
            other => panic!("expected float column, got {:?}", other),
        }
        // Reducing both axes pools every finite element into one mean,
        // which is exactly the grand mean.
        match col.get_nd(&[AxisKey::Reduce, AxisKey::Reduce]).unwrap() {
            NdView::Scalar(v) => {
                assert_eq!(v, 3.0);
                assert_eq!(v, col.grand_reduce(Stat::Mean).unwrap());
            }
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn label_selection_on_cell_axes() {
        let ctx = Context::new();
        let mut col = series(&ctx, 1, 2);
        col.set_labels(0, vec!["x".into(), "y".into()]).unwrap();
        col.set_cell(0, &[7.0, 9.0]).unwrap();
        match col
            .get_nd(&[AxisKey::All, AxisKey::Label("y".into())])
            .unwrap()
        {
            NdView::Column(Column::Float(f)) => assert_eq!(f.values(), &[9.0]),
            other => panic!("expected float column, got {:?}", other),
        }
        assert!(col
            .get_nd(&[AxisKey::All, AxisKey::Label("z".into())])
            .is_err());
    }

    #[test]
    fn set_nd_broadcasts_and_checks_shape() {
        let ctx = Context::new();
        let mut col = series(&ctx, 2, 3);
        col.set_nd(&[AxisKey::All, AxisKey::At(1)], NdAssign::Scalar(8.0))
            .unwrap();
        assert_eq!(col.cell(0).unwrap()[1], 8.0);
        assert_eq!(col.cell(1).unwrap()[1], 8.0);

        col.set_nd(
            &[AxisKey::At(0), AxisKey::Take(vec![0, 2])],
            NdAssign::Array {
                values: &[1.0, 2.0],
                shape: &[2],
            },
        )
        .unwrap();
        assert_eq!(col.cell(0).unwrap()[0], 1.0);
        assert_eq!(col.cell(0).unwrap()[2], 2.0);

        let bad = col.set_nd(
            &[AxisKey::All, AxisKey::All],
            NdAssign::Array {
                values: &[1.0],
                shape: &[1],
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn depth_resize_pads_nan_and_truncates() {
        let ctx = Context::new();
        let mut col = series(&ctx, 1, 2);
        col.set_cell(0, &[1.0, 2.0]).unwrap();
        col.set_depth(4).unwrap();
        let cell = col.cell(0).unwrap();
        assert_eq!(&cell[..2], &[1.0, 2.0]);
        assert!(cell[2].is_nan() && cell[3].is_nan());
        col.set_depth(1).unwrap();
        assert_eq!(col.cell(0).unwrap(), vec![1.0]);
    }

    #[test]
    fn row_reductions_ignore_non_finite() {
        let ctx = Context::new();
        let mut col = series(&ctx, 2, 3);
        col.set_cell(0, &[1.0, 3.0, f64::NAN]).unwrap();
        col.set_cell(1, &[f64::NAN, f64::NAN, f64::NAN]).unwrap();
        let means = col.row_reduce(Stat::Mean).unwrap();
        assert_eq!(means[0], 2.0);
        assert!(means[1].is_nan());
    }

    #[test]
    fn grow_fills_defaults_and_truncate_drops() {
        let ctx = Context::new();
        let mut col = series(&ctx, 1, 2);
        col.set_cell(0, &[1.0, 1.0]).unwrap();
        col.grow(&[5]).unwrap();
        assert_eq!(col.len(), 2);
        assert_eq!(col.rowid().ids(), &[0, 5]);
        assert!(col.cell(1).unwrap().iter().all(|v| v.is_nan()));
        col.truncate(1).unwrap();
        assert_eq!(col.len(), 1);
    }
}
