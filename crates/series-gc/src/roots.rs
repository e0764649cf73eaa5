//! Root set registry
//!
//! Everything the mark phase starts from: guard stacks, the root and task
//! contexts, the data stack, the callback error slot, device request lists,
//! the frame stack and the host hook.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::collector::Collector;
use crate::error::{Violation, fatal};
use crate::frame::Frame;
use crate::heap::Heap;
use crate::mark::{Marker, Origin};
use crate::node::{AddrSpace, NodeAddr, NodeFlags, SeriesFlags, SeriesId};
use crate::value::{DumpKind, Request, Value};

/// Host callback run once per regular cycle, after the built-in roots.
pub type MarkHook = Box<dyn FnMut(&mut Marker<'_>)>;

/// Token for a guarded series. Release it with `unguard_series`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a guard should be released once the series is reachable elsewhere"]
pub struct SeriesGuard {
    depth: usize,
    epoch: u64,
}

/// Token for a guarded value. Release it with `unguard_value`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a guard should be released once the value is reachable elsewhere"]
pub struct ValueGuard {
    depth: usize,
    epoch: u64,
}

/// A device with I/O requests in flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    /// Device name, used in dumps
    pub name: String,
    /// Requests not yet completed
    pub pending: Vec<Request>,
}

/// The root set.
pub struct Roots {
    series_guard: Vec<SeriesId>,
    value_guard: Vec<Value>,
    /// Bumped when a cycle releases the outstanding guards
    epoch: u64,
    root_context: Option<SeriesId>,
    task_context: Option<SeriesId>,
    /// Call stack, bottom first
    pub frames: Vec<Frame>,
    /// Devices with pending requests
    pub devices: Vec<Device>,
    /// Error raised inside a callback, kept until the callback returns
    pub callback_error: Value,
    /// Values pushed by natives
    pub data_stack: Vec<Value>,
    mark_hook: Option<MarkHook>,
}

impl std::fmt::Debug for Roots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roots")
            .field("series_guard", &self.series_guard.len())
            .field("value_guard", &self.value_guard.len())
            .field("epoch", &self.epoch)
            .field("root_context", &self.root_context)
            .field("task_context", &self.task_context)
            .field("frames", &self.frames.len())
            .field("devices", &self.devices.len())
            .field("data_stack", &self.data_stack.len())
            .field("mark_hook", &self.mark_hook.is_some())
            .finish()
    }
}

impl Roots {
    /// Empty registry; guard lists start with `guard_capacity` slots.
    pub fn new(guard_capacity: usize) -> Self {
        Self {
            series_guard: Vec::with_capacity(guard_capacity),
            value_guard: Vec::with_capacity(guard_capacity),
            epoch: 0,
            root_context: None,
            task_context: None,
            frames: Vec::new(),
            devices: Vec::new(),
            callback_error: Value::None,
            data_stack: Vec::new(),
            mark_hook: None,
        }
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    pub(crate) fn guard_series(&mut self, heap: &Heap, series: SeriesId) -> SeriesGuard {
        if !heap.is_managed(series) {
            fatal(Violation::GuardUnmanaged {
                addr: series.addr(),
            });
        }
        self.series_guard.push(series);
        SeriesGuard {
            depth: self.series_guard.len() - 1,
            epoch: self.epoch,
        }
    }

    pub(crate) fn unguard_series(&mut self, guard: SeriesGuard) {
        if guard.epoch != self.epoch {
            return;
        }
        check_lifo(guard.depth, self.series_guard.len());
        self.series_guard.pop();
    }

    pub(crate) fn guard_value(&mut self, heap: &Heap, value: Value) -> ValueGuard {
        if !heap.value_is_managed(&value) {
            let addr = value.primary_series().map_or(NodeAddr::node(AddrSpace::ValueGuard, 0), SeriesId::addr);
            fatal(Violation::GuardUnmanaged { addr });
        }
        self.value_guard.push(value);
        ValueGuard {
            depth: self.value_guard.len() - 1,
            epoch: self.epoch,
        }
    }

    pub(crate) fn unguard_value(&mut self, guard: ValueGuard) -> Option<Value> {
        if guard.epoch != self.epoch {
            return None;
        }
        check_lifo(guard.depth, self.value_guard.len());
        self.value_guard.pop()
    }

    /// Drop every outstanding guard; tokens issued before this are stale.
    pub(crate) fn release_guards(&mut self) -> usize {
        let released = self.series_guard.len() + self.value_guard.len();
        self.series_guard.clear();
        self.value_guard.clear();
        self.epoch += 1;
        released
    }

    /// Guards currently held.
    pub fn guard_depth(&self) -> (usize, usize) {
        (self.series_guard.len(), self.value_guard.len())
    }

    // ------------------------------------------------------------------
    // Contexts and hook
    // ------------------------------------------------------------------

    /// Permanent root context.
    pub fn root_context(&self) -> Option<SeriesId> {
        self.root_context
    }

    /// Per-task root context.
    pub fn task_context(&self) -> Option<SeriesId> {
        self.task_context
    }

    pub(crate) fn set_root_context(&mut self, heap: &Heap, varlist: Option<SeriesId>) {
        let old = std::mem::replace(&mut self.root_context, varlist);
        retarget_root(heap, old, varlist);
    }

    pub(crate) fn set_task_context(&mut self, heap: &Heap, varlist: Option<SeriesId>) {
        let old = std::mem::replace(&mut self.task_context, varlist);
        retarget_root(heap, old, varlist);
    }

    pub(crate) fn set_mark_hook(&mut self, hook: Option<MarkHook>) -> Option<MarkHook> {
        std::mem::replace(&mut self.mark_hook, hook)
    }

    /// Frames that still need their feed reified.
    pub(crate) fn variadic_frames_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.iter_mut().filter(|frame| frame.is_variadic())
    }

    /// Number of root entries, for logging.
    pub fn count(&self) -> usize {
        self.series_guard.len()
            + self.value_guard.len()
            + self.data_stack.len()
            + usize::from(self.root_context.is_some())
            + usize::from(self.task_context.is_some())
            + self.frames.len()
            + self.devices.len()
            + 1
    }

    // ------------------------------------------------------------------
    // Mark
    // ------------------------------------------------------------------

    /// Trace every root group, draining the worklist after each.
    pub(crate) fn mark(&mut self, marker: &mut Marker<'_>) {
        let heap = marker.heap();

        let guards = NodeAddr::node(AddrSpace::SeriesGuard, 0);
        for &series in &self.series_guard {
            let origin = Origin::edge(guards, "<guard>");
            let s = heap.series(series);
            if s.flags().contains(SeriesFlags::VARLIST) {
                marker.queue_context(series, origin);
            } else if s.is_array() {
                marker.queue_array(series, None, DumpKind::Series.code(), origin);
            } else {
                marker.mark_series_only(series, DumpKind::Series.code(), origin);
            }
        }
        marker.propagate();

        let guards = NodeAddr::node(AddrSpace::ValueGuard, 0);
        for (i, value) in self.value_guard.iter().enumerate() {
            marker.queue_value(value, guards.cell(i), Origin::edge(guards, "<guard>"));
        }
        marker.propagate();

        marker.comment("Mark data stack");
        let stack = NodeAddr::node(AddrSpace::DataStack, 0);
        for (i, value) in self.data_stack.iter().enumerate() {
            marker.queue_value(value, stack.cell(i), Origin::edge(stack, "<data-stack>"));
        }
        marker.propagate();

        if let Some(root) = self.root_context {
            marker.queue_context(root, Origin::root("Root-Context"));
            marker.propagate();
        }
        if let Some(task) = self.task_context {
            marker.queue_context(task, Origin::root("Task-Context"));
            marker.propagate();
        }

        let slot = NodeAddr::node(AddrSpace::RootSlot, 0);
        marker.queue_value(&self.callback_error, slot, Origin::root("Callback-Error"));
        marker.propagate();

        marker.comment("Mark devices");
        for (d, device) in self.devices.iter().enumerate() {
            let at = NodeAddr::node(AddrSpace::Device, d as u32);
            for request in &device.pending {
                if let Some(port) = request.port {
                    marker.queue_context(port, Origin::edge(at, "<req-port>").named(Some(&device.name)));
                }
            }
        }
        marker.propagate();

        marker.comment("Mark frames");
        let mut above = None;
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            frame.mark(depth, above, marker);
            marker.propagate();
            above = Some(Frame::addr(depth));
        }

        if let Some(hook) = self.mark_hook.as_mut() {
            marker.comment("Mark host roots");
            hook(marker);
            marker.propagate();
        }
    }
}

fn check_lifo(depth: usize, len: usize) {
    if len == 0 || depth != len - 1 {
        fatal(Violation::GuardOrder { depth, len });
    }
}

fn retarget_root(heap: &Heap, old: Option<SeriesId>, new: Option<SeriesId>) {
    if let Some(old) = old.filter(|old| heap.is_live(*old)) {
        heap.series_pool().remove_flags(old.index(), NodeFlags::ROOT);
    }
    if let Some(new) = new {
        heap.series_pool().insert_flags(new.index(), NodeFlags::ROOT);
    }
}

/// Values held by host-side wrappers, shared across the host's objects.
///
/// Clone it freely; all clones see the same table. Install it once with
/// [`HostRoots::hook`] so every cycle treats the held values as roots.
#[derive(Debug, Clone, Default)]
pub struct HostRoots {
    slots: Arc<Mutex<Vec<Option<Value>>>>,
}

/// Slot in a [`HostRoots`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(usize);

impl HostRoots {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `value` alive until released.
    pub fn hold(&self, value: Value) -> HostHandle {
        let mut slots = self.slots.lock();
        if let Some(free) = slots.iter().position(Option::is_none) {
            slots[free] = Some(value);
            return HostHandle(free);
        }
        slots.push(Some(value));
        HostHandle(slots.len() - 1)
    }

    /// Stop holding a value. Returns it if the handle was live.
    pub fn release(&self, handle: HostHandle) -> Option<Value> {
        self.slots.lock().get_mut(handle.0).and_then(Option::take)
    }

    /// Copy of a held value.
    pub fn get(&self, handle: HostHandle) -> Option<Value> {
        self.slots.lock().get(handle.0).cloned().flatten()
    }

    /// Values currently held.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// True if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install as the collector's mark hook, replacing any previous one.
    pub fn install(&self, collector: &mut Collector) {
        collector.roots_mut().set_mark_hook(Some(self.hook()));
    }

    /// Mark hook reporting every held value.
    pub fn hook(&self) -> MarkHook {
        let slots = Arc::clone(&self.slots);
        Box::new(move |marker: &mut Marker<'_>| {
            for value in slots.lock().iter().flatten() {
                marker.mark_value(value);
            }
        })
    }
}
