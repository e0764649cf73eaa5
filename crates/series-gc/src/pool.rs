//! Fixed-size node pools.
//!
//! A pool hands out uniformly sized nodes from a chain of segments. Free
//! nodes are threaded into a singly linked list through their own slots, so
//! allocation and release are both O(1).
//!
//! ## Layout
//!
//! ```text
//! Pool<T>
//! ┌───────────────┐   ┌───────────────┐
//! │ segment 0     │   │ segment 1     │   ... (never returned to the system)
//! │ [hdr | body]  │   │ [hdr | body]  │
//! │ [hdr | next]──┼──►│ [hdr | next]  │   free list threaded through bodies
//! └───────────────┘   └───────────────┘
//! ```
//!
//! Headers are kept in a `Cell` so that the mark phase can flip mark bits
//! while the node bodies are only borrowed shared.

use std::cell::Cell;
use std::fmt;

use crate::error::{Violation, fatal};
use crate::node::NodeFlags;

/// Size classes for dynamic series buffers, in bytes.
///
/// Buffers are rounded up to the nearest class; anything above the last
/// class is allocated at its exact size.
const SIZE_CLASSES: &[usize] = &[
    16, 32, 48, 64, 96, 128, 192, 256, 384, 512, 1024, 2048, 4096, 8192,
];

/// Buffers bigger than this are not rounded to a size class.
pub const LARGE_BUFFER_THRESHOLD: usize = 8192;

/// Find the size class index for a buffer size.
/// Returns `None` for large buffers.
#[inline]
pub fn size_class_index(size: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|&sc| sc >= size)
}

/// Round a buffer size up to its size class.
#[inline]
pub fn round_to_size_class(size: usize) -> usize {
    match size_class_index(size) {
        Some(index) => SIZE_CLASSES[index],
        None => size,
    }
}

/// Which pool a node comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Series nodes
    Series,
    /// Graphical objects
    Gob,
    /// Routine descriptors
    Routine,
    /// Library handles
    Library,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolKind::Series => "series",
            PoolKind::Gob => "gob",
            PoolKind::Routine => "routine",
            PoolKind::Library => "library",
        })
    }
}

enum Body<T> {
    Free { next: Option<u32> },
    Live(T),
}

struct Slot<T> {
    header: Cell<NodeFlags>,
    body: Body<T>,
}

/// Occupancy snapshot of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Pool identity
    pub kind: PoolKind,
    /// Node size in bytes
    pub wide: usize,
    /// Nodes per segment
    pub units: usize,
    /// Number of segments
    pub segments: usize,
    /// Nodes in use
    pub has: usize,
    /// Nodes on the free list
    pub free: usize,
}

/// Segmented arena of `T` nodes.
pub struct Pool<T> {
    kind: PoolKind,
    units: usize,
    segments: Vec<Box<[Slot<T>]>>,
    free_head: Option<u32>,
    free: usize,
}

impl<T> Pool<T> {
    /// Create an empty pool. No segment is allocated until the first node.
    pub fn new(kind: PoolKind, units: usize) -> Self {
        Self {
            kind,
            units: units.max(1),
            segments: Vec::new(),
            free_head: None,
            free: 0,
        }
    }

    /// Size of one node.
    pub fn wide(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Total number of slots across all segments.
    pub fn capacity(&self) -> usize {
        self.segments.len() * self.units
    }

    /// Number of live nodes.
    pub fn has(&self) -> usize {
        self.capacity() - self.free
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.kind,
            wide: self.wide(),
            units: self.units,
            segments: self.segments.len(),
            has: self.has(),
            free: self.free,
        }
    }

    /// Take a node off the free list, growing the pool if it is empty.
    ///
    /// The header is reset to just [`NodeFlags::VALID`].
    pub fn alloc(&mut self, value: T) -> u32 {
        if self.free_head.is_none() {
            self.grow();
        }
        let Some(index) = self.free_head else {
            fatal(Violation::PoolExhausted {
                pool: self.kind,
                units: self.units,
            });
        };
        let kind = self.kind;
        let slot = self.slot_mut(index);
        let next = match slot.body {
            Body::Free { next } => next,
            Body::Live(_) => fatal(Violation::FreeListCorrupt { pool: kind, index }),
        };
        slot.header.set(NodeFlags::VALID);
        slot.body = Body::Live(value);
        self.free_head = next;
        self.free -= 1;
        index
    }

    /// Return a node to the free list and hand back its body.
    ///
    /// The header becomes all zero bits.
    pub fn release(&mut self, index: u32) -> T {
        let head = self.free_head;
        let kind = self.kind;
        let slot = self.slot_mut(index);
        let body = std::mem::replace(&mut slot.body, Body::Free { next: head });
        let value = match body {
            Body::Live(value) => value,
            Body::Free { .. } => fatal(Violation::Dangling { pool: kind, index }),
        };
        slot.header.set(NodeFlags::empty());
        self.free_head = Some(index);
        self.free += 1;
        value
    }

    /// Body of a live node.
    pub fn get(&self, index: u32) -> Option<&T> {
        match &self.slot(index)?.body {
            Body::Live(value) => Some(value),
            Body::Free { .. } => None,
        }
    }

    /// Mutable body of a live node.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let units = self.units;
        let slot = self
            .segments
            .get_mut(index as usize / units)?
            .get_mut(index as usize % units)?;
        match &mut slot.body {
            Body::Live(value) => Some(value),
            Body::Free { .. } => None,
        }
    }

    /// Header of any slot; empty for free or out of range slots.
    #[inline]
    pub fn header(&self, index: u32) -> NodeFlags {
        self.slot(index)
            .map(|slot| slot.header.get())
            .unwrap_or_else(NodeFlags::empty)
    }

    /// Set header bits on a live node.
    #[inline]
    pub fn insert_flags(&self, index: u32, flags: NodeFlags) {
        if let Some(slot) = self.slot(index) {
            slot.header.set(slot.header.get() | flags);
        }
    }

    /// Clear header bits on a live node.
    #[inline]
    pub fn remove_flags(&self, index: u32, flags: NodeFlags) {
        if let Some(slot) = self.slot(index) {
            slot.header.set(slot.header.get() - flags);
        }
    }

    /// Set the mark bit. Returns `false` if it was already set.
    #[inline]
    pub fn mark(&self, index: u32) -> bool {
        let header = self.header(index);
        if header.contains(NodeFlags::MARKED) {
            return false;
        }
        self.insert_flags(index, NodeFlags::MARKED);
        true
    }

    /// Indices of every live node, in pool order.
    pub fn live_indices(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.capacity() as u32).filter(|&i| self.header(i).contains(NodeFlags::VALID))
    }

    fn slot(&self, index: u32) -> Option<&Slot<T>> {
        self.segments
            .get(index as usize / self.units)?
            .get(index as usize % self.units)
    }

    fn slot_mut(&mut self, index: u32) -> &mut Slot<T> {
        let units = self.units;
        let kind = self.kind;
        match self
            .segments
            .get_mut(index as usize / units)
            .and_then(|segment| segment.get_mut(index as usize % units))
        {
            Some(slot) => slot,
            None => fatal(Violation::Dangling { pool: kind, index }),
        }
    }

    fn grow(&mut self) {
        let base = self.capacity();
        let exhausted = Violation::PoolExhausted {
            pool: self.kind,
            units: self.units,
        };
        if base + self.units > u32::MAX as usize {
            fatal(exhausted);
        }
        if self.segments.try_reserve(1).is_err() {
            fatal(exhausted);
        }
        let mut slots = Vec::new();
        if slots.try_reserve_exact(self.units).is_err() {
            fatal(exhausted);
        }
        let last = base + self.units - 1;
        for i in base..=last {
            let next = if i == last {
                self.free_head
            } else {
                Some(i as u32 + 1)
            };
            slots.push(Slot {
                header: Cell::new(NodeFlags::empty()),
                body: Body::Free { next },
            });
        }
        self.segments.push(slots.into_boxed_slice());
        self.free_head = Some(base as u32);
        self.free += self.units;

        #[cfg(feature = "gc_logging")]
        tracing::trace!(
            target: "series_gc::pool",
            pool = %self.kind,
            segments = self.segments.len(),
            units = self.units,
            "pool grew"
        );
    }
}
