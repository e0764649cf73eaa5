//! Collector error types
//!
//! Two families: [`Violation`] is an internal consistency break that aborts
//! through [`fatal`], [`GcError`] is a recoverable error returned to callers.

use thiserror::Error;

use crate::node::NodeAddr;
use crate::pool::PoolKind;

/// Broken collector invariants. Never recoverable.
#[derive(Debug, Error)]
pub enum Violation {
    /// A traced edge led to a node the collector does not own
    #[error("link to unmanaged node {addr} (kind {kind}, {size} bytes) reached by GC")]
    Unmanaged {
        /// Node address
        addr: NodeAddr,
        /// Dump kind code of the edge
        kind: i32,
        /// Node size in bytes
        size: usize,
    },

    /// A varlist was traced but its keylist was left unmarked
    #[error("varlist {addr} marked without its keylist {keylist}")]
    KeylistUnmarked {
        /// Varlist address
        addr: NodeAddr,
        /// Keylist address
        keylist: NodeAddr,
    },

    /// A varlist has no keylist in its link field
    #[error("varlist {addr} has no keylist")]
    MissingKeylist {
        /// Varlist address
        addr: NodeAddr,
    },

    /// A keylist is shorter than the varlist it describes
    #[error("keylist {keylist} has {keys} keys but array {addr} has {vars} slots")]
    KeylistTooShort {
        /// Array address
        addr: NodeAddr,
        /// Keylist address
        keylist: NodeAddr,
        /// Keylist length
        keys: usize,
        /// Array length
        vars: usize,
    },

    /// A worklist entry was popped without its mark bit set
    #[error("worklist entry {addr} was never marked")]
    UnmarkedWorklistEntry {
        /// Entry address
        addr: NodeAddr,
    },

    /// The worklist held entries outside a propagation pass
    #[error("mark worklist holds {len} entries outside propagation")]
    WorklistNotEmpty {
        /// Pending entries
        len: usize,
    },

    /// An unmanaged node carried a mark bit into the sweep
    #[error("unmanaged node {addr} (kind {kind}, {size} bytes) is marked at sweep")]
    MarkedUnmanaged {
        /// Node address
        addr: NodeAddr,
        /// Dump kind code
        kind: i32,
        /// Node size in bytes
        size: usize,
    },

    /// A root context was found unmarked by a regular sweep
    #[error("root node {addr} was not reached by the mark phase")]
    RootUnreached {
        /// Node address
        addr: NodeAddr,
    },

    /// A series that is not an array was queued as one
    #[error("series {addr} queued for deep marking is not an array")]
    NotAnArray {
        /// Series address
        addr: NodeAddr,
    },

    /// A series with a foreign-owned buffer was queued for deep marking
    #[error("external series {addr} queued for deep marking")]
    ExternalArray {
        /// Series address
        addr: NodeAddr,
    },

    /// Guards were released out of LIFO order
    #[error("guard released out of order: depth {depth}, stack holds {len}")]
    GuardOrder {
        /// Depth recorded by the guard
        depth: usize,
        /// Current guard stack length
        len: usize,
    },

    /// Guarded entity is not owned by the collector
    #[error("guarded node {addr} is not managed")]
    GuardUnmanaged {
        /// Node address
        addr: NodeAddr,
    },

    /// A frame still reads from an unreified variadic feed
    #[error("frame {depth} still holds an unreified variadic feed")]
    UnreifiedFeed {
        /// Frame depth from the bottom
        depth: usize,
    },

    /// A pool could not allocate a new segment
    #[error("{pool} pool could not grow by {units} units")]
    PoolExhausted {
        /// Pool identity
        pool: PoolKind,
        /// Segment size
        units: usize,
    },

    /// The free list pointed at a live node
    #[error("{pool} free list points at live node {index}")]
    FreeListCorrupt {
        /// Pool identity
        pool: PoolKind,
        /// Slot index
        index: u32,
    },

    /// A handle referred to a freed slot
    #[error("dangling {pool} handle {index}")]
    Dangling {
        /// Pool identity
        pool: PoolKind,
        /// Slot index
        index: u32,
    },

    /// A managed series was freed by hand
    #[error("managed series {addr} freed outside the sweep")]
    FreeManaged {
        /// Series address
        addr: NodeAddr,
    },
}

/// Report a violation and abort the current thread.
#[cold]
#[track_caller]
pub fn fatal(violation: Violation) -> ! {
    #[cfg(feature = "gc_logging")]
    tracing::error!(target: "series_gc::gc", %violation, "GC consistency violation");
    panic!("{violation}")
}

/// Recoverable errors surfaced by heap operations and diagnostics.
#[derive(Debug, Error)]
pub enum GcError {
    /// Series has its locked bit set
    #[error("series {0} is locked")]
    Locked(NodeAddr),

    /// Series cannot change size
    #[error("series {0} has a fixed size")]
    FixedSize(NodeAddr),

    /// Operation needs value cells
    #[error("series {0} does not hold value cells")]
    NotAnArray(NodeAddr),

    /// Operation needs a collector-owned series
    #[error("series {0} is not managed")]
    NotManaged(NodeAddr),

    /// Index past the tail
    #[error("index {index} out of range for series {addr} of length {len}")]
    OutOfRange {
        /// Series address
        addr: NodeAddr,
        /// Requested index
        index: usize,
        /// Series length
        len: usize,
    },

    /// Diagnostic output failed
    #[error("dump I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for collector operations
pub type GcResult<T> = Result<T, GcError>;
