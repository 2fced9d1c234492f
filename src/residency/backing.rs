//! # Dual-Residency Column Buffers
//!
//! An [`NdBuffer`] is the flat `f64` storage behind a multidimensional
//! column: `rows * cell_len` elements, row-major. It lives in one of two
//! states:
//!
//! - **Resident**: a plain in-process `Vec<f64>`.
//! - **Mapped**: a memory-mapped temporary file, created lazily on the first
//!   non-resident initialization and deleted as soon as residency is
//!   restored or the buffer drops.
//!
//! Transitions copy the data chunk-wise — never more than one chunk of rows
//! is duplicated at a time — so paging a column larger than free memory
//! stays bounded. Reads and writes work identically in both states; the OS
//! pages mapped data on demand.
//!
//! ## Empty Buffers
//!
//! A zero-length file cannot be mapped, so zero-element buffers are always
//! resident. They are also always below the always-load threshold, so the
//! residency heuristic never asks to unload them.

use eyre::{Result, WrapErr};
use memmap2::MmapMut;
use std::path::Path;
use tempfile::NamedTempFile;

const ELEM: usize = std::mem::size_of::<f64>();

/// Reinterprets raw mapped bytes as `f64` elements.
///
/// # Safety (internal)
///
/// Callers pass slices taken from an `mmap` created by this module. The map
/// base is page-aligned (so f64-aligned), the length is always a multiple of
/// eight bytes, and every bit pattern is a valid `f64`.
fn bytes_as_f64(bytes: &[u8]) -> &[f64] {
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<f64>(), 0);
    debug_assert_eq!(bytes.len() % ELEM, 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f64, bytes.len() / ELEM) }
}

fn bytes_as_f64_mut(bytes: &mut [u8]) -> &mut [f64] {
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<f64>(), 0);
    debug_assert_eq!(bytes.len() % ELEM, 0);
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f64, bytes.len() / ELEM) }
}

enum Backing {
    Resident(Vec<f64>),
    Mapped {
        map: MmapMut,
        // Held only so the file outlives the map and is deleted on drop.
        _file: NamedTempFile,
    },
}

/// Flat row-major storage for one multidimensional column.
pub struct NdBuffer {
    rows: usize,
    cell_len: usize,
    backing: Backing,
}

fn map_temp_file(tmp_dir: &Path, bytes: u64) -> Result<(MmapMut, NamedTempFile)> {
    let file = tempfile::Builder::new()
        .prefix(".coldeck-")
        .suffix(".memmap")
        .tempfile_in(tmp_dir)
        .wrap_err_with(|| format!("failed to create backing file in '{}'", tmp_dir.display()))?;
    file.as_file()
        .set_len(bytes)
        .wrap_err_with(|| format!("failed to size backing file to {} bytes", bytes))?;
    // SAFETY: MmapMut::map_mut is unsafe because externally modified files
    // lead to undefined behavior. This is safe because:
    // 1. The file was just created by us, unlinked-on-drop, and never shared
    // 2. Its size is fixed before mapping and only changes via remapping
    // 3. The map's lifetime is tied to the NamedTempFile stored alongside it
    let map = unsafe {
        MmapMut::map_mut(file.as_file())
            .wrap_err_with(|| format!("failed to memory-map '{}'", file.path().display()))?
    };
    Ok((map, file))
}

impl NdBuffer {
    /// A resident buffer filled with `fill`.
    pub fn new_resident(rows: usize, cell_len: usize, fill: f64) -> Self {
        Self {
            rows,
            cell_len,
            backing: Backing::Resident(vec![fill; rows * cell_len]),
        }
    }

    /// A mapped (non-resident) buffer filled with `fill`, backed by a fresh
    /// temporary file under `tmp_dir`.
    pub fn new_mapped(
        rows: usize,
        cell_len: usize,
        fill: f64,
        tmp_dir: &Path,
        chunk_rows: usize,
    ) -> Result<Self> {
        let len = rows * cell_len;
        if len == 0 {
            return Ok(Self::new_resident(rows, cell_len, fill));
        }
        let (mut map, file) = map_temp_file(tmp_dir, (len * ELEM) as u64)?;
        let chunk = chunk_rows.max(1) * cell_len;
        let elems = bytes_as_f64_mut(&mut map[..]);
        for start in (0..len).step_by(chunk) {
            let end = (start + chunk).min(len);
            elems[start..end].fill(fill);
        }
        Ok(Self {
            rows,
            cell_len,
            backing: Backing::Mapped { map, _file: file },
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_len(&self) -> usize {
        self.cell_len
    }

    pub fn len(&self) -> usize {
        self.rows * self.cell_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_size(&self) -> u64 {
        (self.len() * ELEM) as u64
    }

    pub fn bytes_per_row(&self) -> u64 {
        (self.cell_len * ELEM) as u64
    }

    pub fn loaded(&self) -> bool {
        matches!(self.backing, Backing::Resident(_))
    }

    pub fn as_slice(&self) -> &[f64] {
        match &self.backing {
            Backing::Resident(v) => &v[..self.len()],
            Backing::Mapped { map, .. } => &bytes_as_f64(&map[..])[..self.len()],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        let len = self.len();
        match &mut self.backing {
            Backing::Resident(v) => &mut v[..len],
            Backing::Mapped { map, .. } => &mut bytes_as_f64_mut(&mut map[..])[..len],
        }
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cell_len;
        &self.as_slice()[start..start + self.cell_len]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.cell_len;
        let end = start + self.cell_len;
        &mut self.as_mut_slice()[start..end]
    }

    /// Copies the mapped file into a fresh in-process array, chunk by chunk,
    /// then deletes the backing file. No-op when already resident.
    pub fn load(&mut self, chunk_rows: usize) -> Result<()> {
        if self.loaded() {
            return Ok(());
        }
        let len = self.len();
        let chunk = chunk_rows.max(1) * self.cell_len;
        let mut resident = Vec::with_capacity(len);
        {
            let src = self.as_slice();
            for start in (0..len).step_by(chunk) {
                let end = (start + chunk).min(len);
                resident.extend_from_slice(&src[start..end]);
            }
        }
        self.backing = Backing::Resident(resident);
        Ok(())
    }

    /// Copies the live array out to a newly created memory-mapped temp file,
    /// chunk by chunk, then drops the in-process copy. No-op when already
    /// mapped, or when the buffer is empty.
    pub fn unload(&mut self, tmp_dir: &Path, chunk_rows: usize) -> Result<()> {
        if !self.loaded() || self.is_empty() {
            return Ok(());
        }
        let len = self.len();
        let chunk = chunk_rows.max(1) * self.cell_len;
        let (mut map, file) = map_temp_file(tmp_dir, (len * ELEM) as u64)?;
        {
            let src = self.as_slice();
            let dst = bytes_as_f64_mut(&mut map[..]);
            for start in (0..len).step_by(chunk) {
                let end = (start + chunk).min(len);
                dst[start..end].copy_from_slice(&src[start..end]);
            }
        }
        self.backing = Backing::Mapped { map, _file: file };
        Ok(())
    }

    /// Changes the row count in place, preserving the current residency
    /// state. Growth fills new rows with `fill`; shrinking truncates.
    pub fn resize_rows(
        &mut self,
        new_rows: usize,
        fill: f64,
        tmp_dir: &Path,
        chunk_rows: usize,
    ) -> Result<()> {
        let old_len = self.len();
        let new_len = new_rows * self.cell_len;
        match &mut self.backing {
            Backing::Resident(v) => {
                v.resize(new_len, fill);
                self.rows = new_rows;
            }
            Backing::Mapped { .. } => {
                if new_len <= old_len {
                    // The file stays oversized; the logical row count bounds
                    // every slice we hand out.
                    self.rows = new_rows;
                    return Ok(());
                }
                let chunk = chunk_rows.max(1) * self.cell_len;
                let (mut map, file) = map_temp_file(tmp_dir, (new_len * ELEM) as u64)?;
                {
                    let src = self.as_slice();
                    let dst = bytes_as_f64_mut(&mut map[..]);
                    for start in (0..old_len).step_by(chunk) {
                        let end = (start + chunk).min(old_len);
                        dst[start..end].copy_from_slice(&src[start..end]);
                    }
                    dst[old_len..new_len].fill(fill);
                }
                self.backing = Backing::Mapped { map, _file: file };
                self.rows = new_rows;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NdBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdBuffer")
            .field("rows", &self.rows)
            .field("cell_len", &self.cell_len)
            .field("loaded", &self.loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unload_then_load_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = NdBuffer::new_resident(5, 3, 0.0);
        for (i, v) in buf.as_mut_slice().iter_mut().enumerate() {
            *v = i as f64 * 0.5;
        }
        let before: Vec<f64> = buf.as_slice().to_vec();

        buf.unload(dir.path(), 2).unwrap();
        assert!(!buf.loaded());
        assert_eq!(buf.as_slice(), &before[..]);

        buf.load(2).unwrap();
        assert!(buf.loaded());
        assert_eq!(buf.as_slice(), &before[..]);
    }

    #[test]
    fn mapped_buffer_is_fill_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let buf = NdBuffer::new_mapped(4, 2, f64::NAN, dir.path(), 1).unwrap();
        assert!(!buf.loaded());
        assert!(buf.as_slice().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn backing_file_is_removed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = NdBuffer::new_mapped(4, 2, 0.0, dir.path(), 8).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        buf.load(8).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn resize_preserves_content_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = NdBuffer::new_mapped(2, 2, 1.0, dir.path(), 8).unwrap();
        buf.resize_rows(4, f64::NAN, dir.path(), 8).unwrap();
        assert!(!buf.loaded());
        assert_eq!(buf.rows(), 4);
        assert_eq!(&buf.as_slice()[..4], &[1.0, 1.0, 1.0, 1.0]);
        assert!(buf.as_slice()[4..].iter().all(|v| v.is_nan()));

        buf.resize_rows(1, f64::NAN, dir.path(), 8).unwrap();
        assert_eq!(buf.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn empty_buffer_stays_resident() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = NdBuffer::new_mapped(0, 3, 0.0, dir.path(), 8).unwrap();
        assert!(buf.loaded());
        buf.unload(dir.path(), 8).unwrap();
        assert!(buf.loaded());
    }
}
