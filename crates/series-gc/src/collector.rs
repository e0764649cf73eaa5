//! Collector: heap, root set and cycle driver in one value.

use std::path::Path;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::config::GcConfig;
use crate::dump::MemDump;
use crate::error::{GcError, GcResult};
use crate::heap::Heap;
use crate::mark::{MarkStack, Marker};
use crate::node::SeriesId;
use crate::pool::PoolKind;
use crate::roots::{Roots, SeriesGuard, ValueGuard};
use crate::sweep::sweep;
use crate::value::Value;

/// Collection statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Number of completed cycles
    pub collections: u64,
    /// Nodes reclaimed by the last cycle
    pub last_reclaimed: usize,
    /// Nodes reclaimed over the collector's lifetime
    pub total_reclaimed: usize,
    /// Nodes marked by the last cycle
    pub last_marked: usize,
    /// Pause of the last cycle
    pub last_pause: Duration,
    /// Time spent in cycles
    pub total_pause: Duration,
    /// Lifetime reclaim count per pool
    pub reclaimed_by_pool: FxHashMap<PoolKind, usize>,
}

/// Mark-and-sweep collector.
///
/// Owns the heap and the root set. Cycles run only when asked for; an
/// exhausted ballast just raises [`Heap::recycle_requested`], which the
/// embedder polls with [`Collector::collect_if_requested`] at safe points.
pub struct Collector {
    heap: Heap,
    roots: Roots,
    mark_stack: MarkStack,
    config: GcConfig,
    active: bool,
    disabled: usize,
    stats: GcStats,
}

impl Collector {
    /// Create a collector with empty pools and roots.
    pub fn new(config: GcConfig) -> Self {
        Self {
            heap: Heap::new(&config),
            roots: Roots::new(config.guard_capacity),
            mark_stack: MarkStack::with_capacity(config.mark_stack_capacity),
            config,
            active: true,
            disabled: 0,
            stats: GcStats::default(),
        }
    }

    /// The heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap, for allocation.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The root set.
    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// The root set, for pushing frames, devices and stack values.
    pub fn roots_mut(&mut self) -> &mut Roots {
        &mut self.roots
    }

    /// Configuration in use.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Collection statistics.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    /// Protect a managed series until it is unguarded or a cycle completes.
    pub fn guard_series(&mut self, series: SeriesId) -> SeriesGuard {
        self.roots.guard_series(&self.heap, series)
    }

    /// Release the most recent series guard.
    pub fn unguard_series(&mut self, guard: SeriesGuard) {
        self.roots.unguard_series(guard);
    }

    /// Protect a value until it is unguarded or a cycle completes.
    pub fn guard_value(&mut self, value: Value) -> ValueGuard {
        self.roots.guard_value(&self.heap, value)
    }

    /// Release the most recent value guard.
    pub fn unguard_value(&mut self, guard: ValueGuard) -> Option<Value> {
        self.roots.unguard_value(guard)
    }

    /// Run `f` with `series` guarded.
    pub fn with_guarded_series<R>(&mut self, series: SeriesId, f: impl FnOnce(&mut Self) -> R) -> R {
        let guard = self.guard_series(series);
        let result = f(self);
        self.unguard_series(guard);
        result
    }

    /// Run `f` with `value` guarded.
    pub fn with_guarded_value<R>(&mut self, value: Value, f: impl FnOnce(&mut Self) -> R) -> R {
        let guard = self.guard_value(value);
        let result = f(self);
        self.unguard_value(guard);
        result
    }

    /// Install (or clear) the permanent root context.
    pub fn set_root_context(&mut self, varlist: Option<SeriesId>) -> GcResult<()> {
        self.check_managed(varlist)?;
        self.roots.set_root_context(&self.heap, varlist);
        Ok(())
    }

    /// Install (or clear) the per-task root context.
    pub fn set_task_context(&mut self, varlist: Option<SeriesId>) -> GcResult<()> {
        self.check_managed(varlist)?;
        self.roots.set_task_context(&self.heap, varlist);
        Ok(())
    }

    fn check_managed(&self, varlist: Option<SeriesId>) -> GcResult<()> {
        match varlist {
            Some(varlist) if !self.heap.is_managed(varlist) => Err(GcError::NotManaged(varlist.addr())),
            _ => Ok(()),
        }
    }

    /// Install the host mark hook, replacing any previous one.
    pub fn set_mark_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Marker<'_>) + 'static,
    {
        self.roots.set_mark_hook(Some(Box::new(hook)));
    }

    /// Remove the host mark hook.
    pub fn clear_mark_hook(&mut self) {
        self.roots.set_mark_hook(None);
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Suppress cycles until a matching [`Collector::enable`].
    pub fn disable(&mut self) {
        self.disabled += 1;
    }

    /// Undo one [`Collector::disable`].
    pub fn enable(&mut self) {
        debug_assert!(self.disabled > 0, "enable without matching disable");
        self.disabled = self.disabled.saturating_sub(1);
    }

    /// Whether cycles are currently suppressed.
    pub fn is_disabled(&self) -> bool {
        self.disabled > 0 || !self.active
    }

    /// Turn collection on or off; boot code runs with it off.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    // ------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------

    /// Run a regular cycle. Returns the number of nodes reclaimed.
    pub fn collect(&mut self) -> usize {
        self.collect_core(false, None)
    }

    /// Run a cycle if allocation asked for one and nothing suppresses it.
    pub fn collect_if_requested(&mut self) -> Option<usize> {
        if self.heap.recycle_requested() && !self.is_disabled() {
            Some(self.collect())
        } else {
            None
        }
    }

    /// Run a cycle, optionally reporting every traced edge into `dump`.
    ///
    /// A shutdown cycle skips marking, so every managed node is reclaimed,
    /// and leaves the ballast and guards alone. While collection is disabled
    /// the request is recorded and 0 is returned.
    pub fn collect_core(&mut self, shutdown: bool, mut dump: Option<&mut MemDump>) -> usize {
        if self.is_disabled() {
            #[cfg(feature = "gc_logging")]
            tracing::trace!(
                target: "series_gc::gc",
                disabled = self.disabled,
                active = self.active,
                "GC cycle deferred"
            );
            self.heap.request_recycle();
            return 0;
        }

        let start = Instant::now();

        // Natives' argument lists become arrays before anything is frozen
        for frame in self.roots.variadic_frames_mut() {
            frame.reify_feed(&mut self.heap);
        }

        self.disabled += 1;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "series_gc::gc",
            shutdown,
            roots = self.roots.count(),
            live = self.heap.managed_count(),
            ballast = self.heap.ballast().ballast(),
            remaining = self.heap.ballast().remaining(),
            "GC cycle starting"
        );

        let marked = if shutdown {
            0
        } else {
            let mut marker = Marker::new(&self.heap, &mut self.mark_stack, dump.as_deref_mut());
            self.roots.mark(&mut marker);
            marker.marked()
        };
        self.mark_stack.assert_empty();

        let swept = sweep(&mut self.heap, shutdown, dump);

        if !shutdown {
            let change = self.heap.ballast_mut().adjust(&self.config.policy);
            #[cfg(feature = "gc_logging")]
            {
                if change != crate::ballast::BallastChange::Unchanged {
                    tracing::debug!(target: "series_gc::gc", ?change, "ballast resized");
                }
            }
            #[cfg(not(feature = "gc_logging"))]
            let _ = change;

            let released = self.roots.release_guards();
            #[cfg(feature = "gc_logging")]
            {
                if released > 0 {
                    tracing::trace!(target: "series_gc::gc", released, "outstanding guards released");
                }
            }
            #[cfg(not(feature = "gc_logging"))]
            let _ = released;
        }

        self.disabled -= 1;
        self.heap.clear_recycle_signal();

        let elapsed = start.elapsed();
        let reclaimed = swept.total();
        self.stats.collections += 1;
        self.stats.last_reclaimed = reclaimed;
        self.stats.total_reclaimed += reclaimed;
        self.stats.last_marked = marked;
        self.stats.last_pause = elapsed;
        self.stats.total_pause += elapsed;
        for (pool, count) in swept.by_pool() {
            *self.stats.reclaimed_by_pool.entry(pool).or_default() += count;
        }

        #[cfg(feature = "gc_logging")]
        {
            let live = self.heap.managed_count();
            if self.config.watch_recycle {
                tracing::info!(
                    target: "series_gc::gc",
                    collection = self.stats.collections,
                    reclaimed,
                    marked,
                    pause_us = elapsed.as_micros() as u64,
                    live,
                    "GC cycle complete"
                );
            } else {
                tracing::debug!(
                    target: "series_gc::gc",
                    collection = self.stats.collections,
                    reclaimed,
                    marked,
                    pause_us = elapsed.as_micros() as u64,
                    live,
                    "GC cycle complete"
                );
            }
        }

        reclaimed
    }

    /// Run a cycle that writes a memory usage dump to `path`.
    pub fn dump_memory_usage(&mut self, path: impl AsRef<Path>) -> GcResult<usize> {
        let mut dump = MemDump::create(path)?;
        let reclaimed = self.collect_core(false, Some(&mut dump));
        dump.finish()?;
        Ok(reclaimed)
    }

    /// Run a cycle and return its dump as text.
    pub fn collect_with_dump(&mut self) -> GcResult<(usize, String)> {
        let mut dump = MemDump::in_memory();
        let reclaimed = self.collect_core(false, Some(&mut dump));
        let text = dump.finish()?.unwrap_or_default();
        Ok((reclaimed, text))
    }

    /// Final cycle: reclaim every managed node and drop the root set.
    pub fn shutdown(mut self) -> usize {
        self.disabled = 0;
        self.active = true;
        self.roots.set_mark_hook(None);
        self.collect_core(true, None)
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}
