//! # Engine Context
//!
//! The [`Context`] bundles the three process-wide services every table
//! shares: the tunable configuration, the residency manager, and the
//! lineage stamp allocator. Tables hold an `Arc<Context>` and thread it
//! into every column they create, so one engine instance governs memory
//! for all of its tables at once.
//!
//! ## Lineage Stamps
//!
//! A [`TableId`] is an opaque stamp identifying one mutation state of one
//! table. Selections and merges copy their source's stamp; mutations draw
//! a fresh one from the context's counter. Two tables with equal stamps
//! are guaranteed to descend from the same mutation state and therefore
//! share row identities.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::residency::ResidencyManager;

/// Lineage stamp. Equal stamps mean a shared mutation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u64);

impl TableId {
    /// Raw stamp value, for naming archive entries.
    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// Shared engine state: configuration, residency, stamp allocation.
pub struct Context {
    config: RwLock<Config>,
    residency: ResidencyManager,
    next_stamp: AtomicU64,
}

impl Context {
    /// A context with default configuration and a real memory probe.
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::default())
    }

    /// A context with explicit configuration.
    pub fn with_config(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            residency: ResidencyManager::new(),
            next_stamp: AtomicU64::new(0),
        })
    }

    /// A context with explicit configuration and an explicit residency
    /// manager, for deterministic memory-pressure tests.
    pub fn with_residency(config: Config, residency: ResidencyManager) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            residency,
            next_stamp: AtomicU64::new(0),
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Applies an in-place configuration change. Takes effect for every
    /// subsequent residency decision; existing residency states are not
    /// revisited eagerly.
    pub fn update_config(&self, f: impl FnOnce(&mut Config)) {
        f(&mut self.config.write());
    }

    pub fn residency(&self) -> &ResidencyManager {
        &self.residency
    }

    /// Draws a fresh lineage stamp.
    pub fn next_stamp(&self) -> TableId {
        TableId(self.next_stamp.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &*self.config.read())
            .field("residency", &self.residency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_unique_per_context() {
        let ctx = Context::new();
        let a = ctx.next_stamp();
        let b = ctx.next_stamp();
        assert_ne!(a, b);
    }

    #[test]
    fn config_updates_are_visible_to_snapshots() {
        let ctx = Context::new();
        ctx.update_config(|c| c.save_chunk_size = 1024);
        assert_eq!(ctx.config().save_chunk_size, 1024);
    }
}
