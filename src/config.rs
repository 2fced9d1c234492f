//! # Engine Configuration
//!
//! This module centralizes the recognized configuration options and their
//! defaults. Options govern the residency heuristic and the chunked I/O
//! paths; they are read at every decision point, so changes made at runtime
//! through [`crate::Context::update_config`] take effect immediately.
//!
//! ## Option Table
//!
//! | option | effect | default |
//! |--------|--------|---------|
//! | `min_mem_free_rel` | fraction of total memory that must stay free after loading a column | 0.5 |
//! | `min_mem_free_abs` | absolute bytes that must stay free after loading a column | 4 GiB |
//! | `always_load_max_size` | columns at or below this byte size are always resident | 128 MiB |
//! | `never_load_min_size` | columns at or above this byte size are never resident | unlimited |
//! | `save_chunk_size` | byte budget per I/O chunk when paging columns to or from disk | 128 MiB |
//! | `tmp_dir` | directory for backing files and container extraction | system temp dir |
//!
//! ## Dependency Notes
//!
//! `save_chunk_size` is a budget, not a row count: the chunk row count is
//! derived per column as `save_chunk_size / bytes_per_row` (floored, minimum
//! one row), so wide columns page in fewer rows per chunk than narrow ones.
//! `always_load_max_size` should stay below `never_load_min_size`; when the
//! bands overlap, the always-load band wins because it is tested first.

use std::path::PathBuf;

pub const DEFAULT_MIN_MEM_FREE_REL: f64 = 0.5;
pub const DEFAULT_MIN_MEM_FREE_ABS: u64 = 4 * 1024 * 1024 * 1024;
pub const DEFAULT_ALWAYS_LOAD_MAX_SIZE: u64 = 128 * 1024 * 1024;
pub const DEFAULT_NEVER_LOAD_MIN_SIZE: u64 = u64::MAX;
pub const DEFAULT_SAVE_CHUNK_SIZE: u64 = 128 * 1024 * 1024;

/// Process-wide engine options. One instance lives in the
/// [`crate::Context`]; everything else reads it, nothing else owns it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum fraction of total memory that must remain free after loading
    /// a column.
    pub min_mem_free_rel: f64,
    /// Minimum absolute number of bytes that must remain free after loading
    /// a column.
    pub min_mem_free_abs: u64,
    /// Byte size below which a column is always resident.
    pub always_load_max_size: u64,
    /// Byte size above which a column is never resident.
    pub never_load_min_size: u64,
    /// Byte budget per I/O chunk when paging columns to or from disk.
    pub save_chunk_size: u64,
    /// Directory for memory-mapped backing files and container extraction.
    pub tmp_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_mem_free_rel: DEFAULT_MIN_MEM_FREE_REL,
            min_mem_free_abs: DEFAULT_MIN_MEM_FREE_ABS,
            always_load_max_size: DEFAULT_ALWAYS_LOAD_MAX_SIZE,
            never_load_min_size: DEFAULT_NEVER_LOAD_MIN_SIZE,
            save_chunk_size: DEFAULT_SAVE_CHUNK_SIZE,
            tmp_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Number of rows per I/O chunk for a column with the given per-row byte
    /// size. Always at least one row, so a single oversized row still moves.
    pub fn chunk_rows(&self, bytes_per_row: u64) -> usize {
        if bytes_per_row == 0 {
            return 1;
        }
        ((self.save_chunk_size / bytes_per_row).max(1)) as usize
    }
}
