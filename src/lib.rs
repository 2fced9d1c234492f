//! # coldeck - Out-of-Core Columnar Tables
//!
//! coldeck is an embedded tabular data engine built around stable row
//! identities and transparent memory management. Tables hold named, typed
//! columns; large numeric columns page themselves out to memory-mapped
//! temporary files under memory pressure and page back in on access, so a
//! working set larger than RAM stays usable through one unchanged API.
//!
//! ## Quick Start
//!
//! ```ignore
//! use coldeck::{Assign, Cell, CmpOp, ColumnVariant, Context, Key, Table, Target};
//!
//! let ctx = Context::new();
//! let mut dm = Table::new(&ctx, 3);
//! dm.insert("rt", &ColumnVariant::Float)?;
//! dm.col_mut("rt")?.set(
//!     &Key::All,
//!     &Assign::Seq(vec![0.31.into(), 0.45.into(), 0.28.into()]),
//! )?;
//!
//! let fast = dm.select("rt", CmpOp::Lt, &Target::Scalar(Cell::Float(0.4)))?;
//! assert_eq!(fast.len(), 2);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │            Table (lineage)           │
//! ├──────────────────────────────────────┤
//! │  Column: Mixed │ Int │ Float │ NDim  │
//! ├──────────────────────────────────────┤
//! │   RowIndex (stable row identities)   │
//! ├──────────────────────────────────────┤
//! │  ResidencyManager (LRU, heuristic)   │
//! ├──────────────────────────────────────┤
//! │  NdBuffer: Vec<f64> ⇄ mmap tempfile  │
//! └──────────────────────────────────────┘
//! ```
//!
//! Selections are first-class: comparing a column yields the identities of
//! the matching rows, and sub-tables built from them stay correlated with
//! their ancestors through the shared version stamp. Tables round-trip
//! through a compressed archive that streams non-resident columns without
//! ever materializing them.
//!
//! ## Module Overview
//!
//! - [`table`]: tables, rows, selection, merging, concatenation
//! - [`column`]: the column variants, comparison, arithmetic, statistics
//! - [`index`]: stable row identities and the cached position map
//! - [`residency`]: the touch ledger, fit heuristic, and dual backing
//! - [`container`]: the compressed archive format
//! - [`context`]: shared configuration and lineage stamps

pub mod cell;
pub mod column;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod index;
pub mod residency;
pub mod sort;
pub mod table;

pub use cell::{Cell, CellType};
pub use column::{
    ArithOp, Assign, AxisKey, CmpOp, Column, ColumnVariant, Key, Keyed, MultiDimColumn, NdAssign,
    NdView, Operand, Stat, Target,
};
pub use config::Config;
pub use container::{read_container, write_container};
pub use context::{Context, TableId};
pub use index::{RowId, RowIndex};
pub use residency::ResidencyManager;
pub use table::{Row, Table};
