//! # Series GC
//!
//! Mark-and-sweep garbage collector with pooled node allocation for a
//! series-based dynamic language runtime.
//!
//! ## Design
//!
//! - **Pools**: Segmented fixed-size node arenas with free lists; handles are
//!   slot indices, never addresses
//! - **Mark**: Explicit worklist, so native stack depth does not grow with
//!   heap depth
//! - **Roots**: Guard stacks, root/task contexts, data stack, frames, devices
//!   and a host hook
//! - **Ballast**: Allocation allowance between cycles, resized after each
//!   cycle from what the program actually kept
//! - **Dump**: CSV export of every traced edge for offline memory analysis

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod ballast;
pub mod collector;
pub mod config;
pub mod dump;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod gob;
pub mod heap;
pub mod mark;
pub mod node;
pub mod pool;
pub mod roots;
pub mod series;
pub mod sweep;
pub mod value;

pub use ballast::{Ballast, BallastChange};
pub use collector::{Collector, GcStats};
pub use config::{BallastPolicy, GcConfig, MEM_BALLAST};
pub use dump::{DUMP_HEADER, DumpEntry, MemDump};
pub use error::{GcError, GcResult, Violation};
pub use frame::{Feed, Frame, FrameMode};
pub use heap::Heap;
pub use mark::{MarkStack, Marker, Origin};
pub use node::{GobId, LibId, NodeAddr, NodeFlags, RoutineId, SeriesFlags, SeriesId, SeriesInfo, Symbol};
pub use pool::{PoolKind, PoolStats};
pub use roots::{Device, HostHandle, HostRoots, MarkHook, Roots, SeriesGuard, ValueGuard};
pub use series::Series;
pub use value::{ContextKind, DumpKind, Kind, Value};
