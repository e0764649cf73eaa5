//! Node headers and handles.
//!
//! Every pooled node carries a [`NodeFlags`] header word. Series nodes add two
//! more words: [`SeriesFlags`] (what the series *is*, fixed at creation) and
//! [`SeriesInfo`] (mutable state bits).

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Identity and lifecycle bits shared by every pooled node.
    ///
    /// A header of all zero bits is the canonical free state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Slot is in use.
        const VALID = 1 << 0;
        /// Inline content is empty (acts as the terminator).
        const END = 1 << 1;
        /// Node is cell-sized: at most one value slot, no dynamic buffer.
        const CELL = 1 << 2;
        /// Lifetime is owned by the collector.
        const MANAGED = 1 << 3;
        /// Reached during the current cycle.
        const MARKED = 1 << 4;
        /// Registered as a root context varlist.
        const ROOT = 1 << 5;
    }
}

bitflags! {
    /// Subtype identity of a series, set when it is made.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeriesFlags: u16 {
        /// Holds value cells.
        const ARRAY = 1 << 0;
        /// Variable list of a context.
        const VARLIST = 1 << 1;
        /// Parameter list of a function.
        const PARAMLIST = 1 << 2;
        /// Key list of a context.
        const KEYLIST = 1 << 3;
        /// Key/value pair list of a map.
        const PAIRLIST = 1 << 4;
        /// Variables live on the frame stack.
        const STACK = 1 << 5;
        /// Cannot grow or shrink.
        const FIXED_SIZE = 1 << 6;
        /// Bytes are UTF-8 text.
        const UTF8_STRING = 1 << 7;
    }
}

bitflags! {
    /// Mutable state bits of a series.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeriesInfo: u16 {
        /// Content lives in a separately allocated buffer.
        const HAS_DYNAMIC = 1 << 0;
        /// Content may not be modified.
        const LOCKED = 1 << 1;
        /// Stack level backing the variables has been dropped.
        const INACCESSIBLE = 1 << 2;
        /// Keylist is referenced by more than one varlist.
        const SHARED_KEYLIST = 1 << 3;
        /// Buffer is owned by foreign code, not by this heap.
        const EXTERNAL = 1 << 4;
    }
}

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $space:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Slot index inside the owning pool.
            #[inline]
            pub fn index(self) -> u32 {
                self.0
            }

            /// Diagnostic address of the node.
            #[inline]
            pub fn addr(self) -> NodeAddr {
                NodeAddr::node($space, self.0)
            }
        }
    };
}

node_id!(
    /// Handle to a series node.
    SeriesId,
    AddrSpace::Series
);
node_id!(
    /// Handle to a graphical object.
    GobId,
    AddrSpace::Gob
);
node_id!(
    /// Handle to a routine descriptor.
    RoutineId,
    AddrSpace::Routine
);
node_id!(
    /// Handle to a loaded library.
    LibId,
    AddrSpace::Library
);

/// Address regions used to label nodes and root slots in diagnostics.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrSpace {
    /// Series pool
    Series = 1,
    /// Gob pool
    Gob = 2,
    /// Routine descriptor pool
    Routine = 3,
    /// Library pool
    Library = 4,
    /// Series guard list
    SeriesGuard = 5,
    /// Value guard list
    ValueGuard = 6,
    /// Data stack
    DataStack = 7,
    /// Call frames
    Frame = 8,
    /// Single-value root slots (callback error)
    RootSlot = 9,
    /// Device request lists
    Device = 10,
    /// Values reported by the host hook
    Host = 11,
}

/// Synthetic, stable address of a node or of one slot inside it.
///
/// Layout: `space:8 | index:32 | slot:24`. Slot 0 is the node itself, slot
/// `n + 1` is its `n`th cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddr(u64);

impl NodeAddr {
    const SLOT_MASK: u64 = (1 << 24) - 1;

    /// Highest cell index with an address of its own.
    pub const MAX_SLOT: usize = (1 << 24) - 2;

    /// Address of a whole node.
    pub const fn node(space: AddrSpace, index: u32) -> Self {
        Self(((space as u64) << 56) | ((index as u64) << 24))
    }

    /// Address of the `slot`th cell inside this node.
    ///
    /// Slots past [`NodeAddr::MAX_SLOT`] all share the last address rather
    /// than wrapping onto the node or its early cells.
    pub const fn cell(self, slot: usize) -> Self {
        let slot = if slot < Self::MAX_SLOT { slot as u64 + 1 } else { Self::SLOT_MASK };
        Self((self.0 & !Self::SLOT_MASK) | slot)
    }

    /// Raw address bits.
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Interned word spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub(crate) u32);
