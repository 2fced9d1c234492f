//! # Residency Management
//!
//! The residency manager is the process-wide ledger that decides, for every
//! large multidimensional column, whether its data lives in memory or on a
//! memory-mapped backing file — and which column to page out when memory
//! runs short.
//!
//! ## Architecture
//!
//! ```text
//! MultiDimColumn ──touch()──> ResidencyManager
//!      │                        │
//!      │ Arc<Mutex<NdBuffer>>   │ slot arena (Weak handles, generation counted)
//!      │                        │ recency order (LRU front … MRU back)
//!      └── NdBuffer ←──────── eviction walk: unload least-recently-used
//! ```
//!
//! Columns register their buffer and keep a [`ColumnHandle`] — a slot index
//! plus generation. The ledger holds only `Weak` references: a dropped
//! column is dead in the arena the moment its buffer drops, the eviction
//! walk prunes it, and nothing here ever keeps a column alive.
//!
//! ## Fit Heuristic
//!
//! Three bands, tested in order:
//!
//! 1. size ≤ `always_load_max_size` → resident
//! 2. size ≥ `never_load_min_size` → non-resident
//! 3. otherwise resident only if `available - size` clears *both*
//!    `min_mem_free_abs` and `min_mem_free_rel * total`
//!
//! When memory introspection is unavailable the heuristic fails open:
//! everything fits, nothing is evicted, correctness is never blocked.
//!
//! ## Eviction State Machine
//!
//! The eviction pass runs under an explicit `Idle → Evicting → Idle` state
//! machine. A touch arriving while a pass is in progress is a no-op, which
//! prevents an eviction from cascading into further evictions.
//!
//! ## Locking Discipline
//!
//! Touch the manager *before* locking a column buffer. The manager locks
//! buffers (its own and eviction victims') while it holds the ledger lock;
//! a caller that already holds a buffer lock when touching would deadlock
//! against itself.

mod backing;

pub use backing::NdBuffer;

use eyre::Result;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use sysinfo::System;
use tracing::{debug, warn};

use crate::config::Config;

/// `(total, available)` bytes, or `None` when introspection is unavailable.
pub type MemoryProbe = Box<dyn Fn() -> Option<(u64, u64)> + Send + Sync>;

/// Generation-counted handle into the ledger's slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHandle {
    slot: usize,
    gen: u64,
}

struct Slot {
    gen: u64,
    buf: Weak<Mutex<NdBuffer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvictPhase {
    Idle,
    Evicting,
}

struct Ledger {
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Recency order: least-recently-used first.
    order: Vec<ColumnHandle>,
    phase: EvictPhase,
}

impl Ledger {
    fn upgrade(&self, h: ColumnHandle) -> Option<Arc<Mutex<NdBuffer>>> {
        let slot = self.slots.get(h.slot)?;
        if slot.gen != h.gen {
            return None;
        }
        slot.buf.upgrade()
    }

    fn move_to_mru(&mut self, h: ColumnHandle) {
        if let Some(pos) = self.order.iter().position(|&x| x == h) {
            self.order.remove(pos);
        }
        self.order.push(h);
    }

    fn remove(&mut self, h: ColumnHandle) {
        if let Some(pos) = self.order.iter().position(|&x| x == h) {
            self.order.remove(pos);
        }
        if let Some(slot) = self.slots.get_mut(h.slot) {
            if slot.gen == h.gen {
                slot.buf = Weak::new();
                slot.gen += 1;
                self.free.push(h.slot);
            }
        }
    }
}

/// Process-wide ledger of multidimensional column buffers and their
/// recency order.
pub struct ResidencyManager {
    ledger: Mutex<Ledger>,
    probe: MemoryProbe,
}

impl ResidencyManager {
    /// A manager probing real system memory through `sysinfo`.
    pub fn new() -> Self {
        let sys = Mutex::new(System::new());
        Self::with_probe(Box::new(move || {
            let mut sys = sys.lock();
            sys.refresh_memory();
            let total = sys.total_memory();
            if total == 0 {
                return None;
            }
            Some((total, sys.available_memory()))
        }))
    }

    /// A manager with an injected memory probe. Deterministic probes are the
    /// testing seam, the way a fixed limit is for a memory budget.
    pub fn with_probe(probe: MemoryProbe) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                slots: Vec::new(),
                free: Vec::new(),
                order: Vec::new(),
                phase: EvictPhase::Idle,
            }),
            probe,
        }
    }

    /// Registers a buffer and returns its handle. The new entry starts at
    /// the most-recently-used end.
    pub fn register(&self, buf: &Arc<Mutex<NdBuffer>>) -> ColumnHandle {
        let mut led = self.ledger.lock();
        let handle = match led.free.pop() {
            Some(slot) => {
                let gen = led.slots[slot].gen;
                led.slots[slot].buf = Arc::downgrade(buf);
                ColumnHandle { slot, gen }
            }
            None => {
                led.slots.push(Slot {
                    gen: 0,
                    buf: Arc::downgrade(buf),
                });
                ColumnHandle {
                    slot: led.slots.len() - 1,
                    gen: 0,
                }
            }
        };
        led.order.push(handle);
        handle
    }

    /// Drops a ledger entry. Safe to call with a stale handle.
    pub fn unregister(&self, h: ColumnHandle) {
        self.ledger.lock().remove(h);
    }

    /// Number of entries whose column is still alive.
    pub fn tracked(&self) -> usize {
        let led = self.ledger.lock();
        led.order.iter().filter(|&&h| led.upgrade(h).is_some()).count()
    }

    /// Whether a buffer of `size` bytes may be resident right now, without
    /// evicting anything.
    pub fn prefers_resident(&self, size: u64, cfg: &Config) -> bool {
        self.fits(size, cfg)
    }

    fn fits(&self, size: u64, cfg: &Config) -> bool {
        if size <= cfg.always_load_max_size {
            return true;
        }
        if size >= cfg.never_load_min_size {
            return false;
        }
        let Some((total, available)) = (self.probe)() else {
            // Introspection unavailable: fail open, never block correctness.
            return true;
        };
        let projected = available.saturating_sub(size);
        projected > cfg.min_mem_free_abs
            && (projected as f64) > cfg.min_mem_free_rel * total as f64
    }

    /// Records an access to the column behind `h` and re-evaluates its
    /// residency.
    ///
    /// Moves the entry to the most-recently-used end; when the column does
    /// not fit in available memory, runs one eviction pass over the
    /// least-recently-used resident columns; when it fits and `try_to_load`
    /// is set, restores residency. A touch during an in-progress eviction
    /// pass is a no-op.
    pub fn touch(&self, h: ColumnHandle, try_to_load: bool, cfg: &Config) -> Result<()> {
        let mut led = self.ledger.lock();
        if led.phase == EvictPhase::Evicting {
            return Ok(());
        }
        let Some(buf) = led.upgrade(h) else {
            led.remove(h);
            return Ok(());
        };
        led.move_to_mru(h);
        let size = buf.lock().byte_size();
        if !self.fits(size, cfg) {
            self.run_eviction(&mut led, h, size, cfg)?;
        }
        if try_to_load && self.fits(size, cfg) {
            let mut guard = buf.lock();
            if !guard.loaded() {
                let chunk = cfg.chunk_rows(guard.bytes_per_row());
                guard.load(chunk)?;
                debug!(bytes = size, "column restored to residency");
            }
        }
        Ok(())
    }

    /// Walks the ledger from least-recently-used, unloading resident columns
    /// other than `touched` until `size` bytes fit or candidates run out.
    /// Dead entries encountered on the way are pruned.
    fn run_eviction(
        &self,
        led: &mut Ledger,
        touched: ColumnHandle,
        size: u64,
        cfg: &Config,
    ) -> Result<()> {
        led.phase = EvictPhase::Evicting;
        let walk = led.order.clone();
        let mut dead = Vec::new();
        for cand in walk {
            if self.fits(size, cfg) {
                break;
            }
            if cand == touched {
                continue;
            }
            let Some(other) = led.upgrade(cand) else {
                dead.push(cand);
                continue;
            };
            let mut guard = other.lock();
            if !guard.loaded() {
                continue;
            }
            let chunk = cfg.chunk_rows(guard.bytes_per_row());
            if let Err(err) = guard.unload(&cfg.tmp_dir, chunk) {
                led.phase = EvictPhase::Idle;
                return Err(err);
            }
            debug!(bytes = guard.byte_size(), "evicted column to backing file");
        }
        for h in dead {
            led.remove(h);
        }
        led.phase = EvictPhase::Idle;
        Ok(())
    }

    /// Forces the column behind `h` into residency, bypassing the fit
    /// heuristic. A column larger than total system memory logs a warning
    /// and proceeds anyway; the allocation is allowed to fail later.
    pub fn force_resident(&self, h: ColumnHandle, cfg: &Config) -> Result<()> {
        let mut led = self.ledger.lock();
        let Some(buf) = led.upgrade(h) else {
            return Ok(());
        };
        led.move_to_mru(h);
        drop(led);
        let mut guard = buf.lock();
        if let Some((total, _)) = (self.probe)() {
            if guard.byte_size() > total {
                warn!(
                    bytes = guard.byte_size(),
                    total,
                    "forcing residency of a column larger than total system memory"
                );
            }
        }
        let chunk = cfg.chunk_rows(guard.bytes_per_row());
        guard.load(chunk)
    }

    /// Forces the column behind `h` out to its backing file.
    pub fn force_unloaded(&self, h: ColumnHandle, cfg: &Config) -> Result<()> {
        let led = self.ledger.lock();
        let Some(buf) = led.upgrade(h) else {
            return Ok(());
        };
        drop(led);
        let mut guard = buf.lock();
        let chunk = cfg.chunk_rows(guard.bytes_per_row());
        guard.unload(&cfg.tmp_dir, chunk)
    }
}

impl Default for ResidencyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResidencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let led = self.ledger.lock();
        f.debug_struct("ResidencyManager")
            .field("entries", &led.order.len())
            .field("phase", &led.phase)
            .finish()
    }
}
