//! Collector configuration

/// Default ballast, also the floor it never shrinks below (3MB)
pub const MEM_BALLAST: usize = 3_000_000;

/// Thresholds that drive ballast resizing, as integer ratios.
///
/// After a cycle, consumption above `grow_above` of the ballast grows it and
/// consumption below `shrink_below` shrinks it; either way the new ballast
/// is `resize` times the consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallastPolicy {
    /// Grow when used > ballast * num / den (default: 9/10)
    pub grow_above: (i64, i64),
    /// Shrink when used < ballast * num / den (default: 3/4)
    pub shrink_below: (i64, i64),
    /// New ballast = used * num / den (default: 5/4)
    pub resize: (i64, i64),
}

impl Default for BallastPolicy {
    fn default() -> Self {
        Self {
            grow_above: (9, 10),
            shrink_below: (3, 4),
            resize: (5, 4),
        }
    }
}

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Initial ballast and shrink floor in bytes (default: 3MB)
    pub ballast: usize,
    /// Ballast resize policy
    pub policy: BallastPolicy,
    /// Series nodes per pool segment (default: 4096)
    pub series_units: usize,
    /// Gobs per pool segment (default: 128)
    pub gob_units: usize,
    /// Routine descriptors per pool segment (default: 64)
    pub routine_units: usize,
    /// Library handles per pool segment (default: 32)
    pub lib_units: usize,
    /// Initial capacity of each guard list (default: 15)
    pub guard_capacity: usize,
    /// Initial capacity of the mark worklist (default: 100)
    pub mark_stack_capacity: usize,
    /// Report every cycle at info level
    pub watch_recycle: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            ballast: MEM_BALLAST,
            policy: BallastPolicy::default(),
            series_units: 4096,
            gob_units: 128,
            routine_units: 64,
            lib_units: 32,
            guard_capacity: 15,
            mark_stack_capacity: 100,
            watch_recycle: false,
        }
    }
}
