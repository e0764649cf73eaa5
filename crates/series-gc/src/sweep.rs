//! Sweep phase
//!
//! Walks every pool once. Managed nodes that were not marked (or every
//! managed node, at shutdown) are destroyed; survivors have their mark bit
//! cleared for the next cycle.

use crate::dump::{DumpEntry, MemDump};
use crate::error::{Violation, fatal};
use crate::heap::Heap;
use crate::node::{AddrSpace, NodeAddr, NodeFlags};
use crate::pool::{Pool, PoolKind};
use crate::value::{DumpKind, Kind};

/// Nodes reclaimed per pool by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Swept {
    /// Series nodes
    pub series: usize,
    /// Gobs
    pub gobs: usize,
    /// Routine descriptors
    pub routines: usize,
    /// Library handles
    pub libs: usize,
}

impl Swept {
    /// All nodes reclaimed.
    pub fn total(&self) -> usize {
        self.series + self.gobs + self.routines + self.libs
    }

    /// Per-pool counts.
    pub fn by_pool(&self) -> [(PoolKind, usize); 4] {
        [
            (PoolKind::Series, self.series),
            (PoolKind::Gob, self.gobs),
            (PoolKind::Routine, self.routines),
            (PoolKind::Library, self.libs),
        ]
    }
}

/// Sweep every pool.
///
/// Routine descriptors go first: their teardown reads series that the series
/// sweep may free.
pub(crate) fn sweep(heap: &mut Heap, shutdown: bool, mut dump: Option<&mut MemDump>) -> Swept {
    if let Some(dump) = dump.as_deref_mut() {
        dump.comment("Sweep");
    }
    let routines = sweep_pool(
        heap,
        Heap::routine_pool,
        Heap::free_routine,
        AddrSpace::Routine,
        DumpKind::RoutineInfo.code(),
        dump.as_deref_mut(),
    );
    let series = sweep_series(heap, shutdown, dump.as_deref_mut());
    let gobs = sweep_pool(
        heap,
        Heap::gob_pool,
        Heap::free_gob,
        AddrSpace::Gob,
        Kind::Gob.code(),
        dump.as_deref_mut(),
    );
    let libs = sweep_pool(
        heap,
        Heap::lib_pool,
        Heap::close_library,
        AddrSpace::Library,
        Kind::Library.code(),
        dump,
    );
    Swept {
        series,
        gobs,
        routines,
        libs,
    }
}

fn sweep_series(heap: &mut Heap, shutdown: bool, mut dump: Option<&mut MemDump>) -> usize {
    let mut count = 0;
    let capacity = heap.series_pool().capacity() as u32;
    for index in 0..capacity {
        let header = heap.series_pool().header(index);
        if !header.contains(NodeFlags::VALID) {
            continue;
        }
        let addr = NodeAddr::node(AddrSpace::Series, index);

        if !header.contains(NodeFlags::MANAGED) {
            if header.contains(NodeFlags::MARKED) {
                let (kind, size) = heap
                    .series_pool()
                    .get(index)
                    .map_or((0, 0), |series| (series_kind(series.is_array()), series.total_bytes()));
                fatal(Violation::MarkedUnmanaged { addr, kind, size });
            }
            continue;
        }

        if !shutdown && header.contains(NodeFlags::MARKED) {
            heap.series_pool().remove_flags(index, NodeFlags::MARKED);
            continue;
        }
        if !shutdown && header.contains(NodeFlags::ROOT) {
            fatal(Violation::RootUnreached { addr });
        }

        let series = heap.kill_series(index);
        if let Some(dump) = dump.as_deref_mut() {
            dump.entry(&DumpEntry {
                addr,
                parent: None,
                kind: series_kind(series.is_array()),
                size: series.total_bytes(),
                edge: Some("<swept>"),
                name: None,
            });
        }
        count += 1;
    }
    count
}

fn series_kind(is_array: bool) -> i32 {
    if is_array {
        DumpKind::Array.code()
    } else {
        DumpKind::Series.code()
    }
}

/// Sweep a pool whose nodes are always collector-owned.
fn sweep_pool<T>(
    heap: &mut Heap,
    pool: fn(&Heap) -> &Pool<T>,
    free: fn(&mut Heap, u32),
    space: AddrSpace,
    kind: i32,
    mut dump: Option<&mut MemDump>,
) -> usize {
    let mut count = 0;
    let capacity = pool(heap).capacity() as u32;
    for index in 0..capacity {
        let header = pool(heap).header(index);
        if !header.contains(NodeFlags::VALID) {
            continue;
        }
        if header.contains(NodeFlags::MARKED) {
            pool(heap).remove_flags(index, NodeFlags::MARKED);
            continue;
        }
        free(heap, index);
        if let Some(dump) = dump.as_deref_mut() {
            dump.entry(&DumpEntry {
                addr: NodeAddr::node(space, index),
                parent: None,
                kind,
                size: pool(heap).wide(),
                edge: Some("<swept>"),
                name: None,
            });
        }
        count += 1;
    }
    count
}
