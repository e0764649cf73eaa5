//! Call frames as seen by the collector.
//!
//! A frame is a root: everything it is evaluating, every argument it has
//! gathered and the context it may have been promoted to stay alive while it
//! is on the stack.

use std::collections::VecDeque;

use crate::error::{Violation, fatal};
use crate::heap::Heap;
use crate::mark::{Marker, Origin};
use crate::node::{AddrSpace, NodeAddr, SeriesId, Symbol};
use crate::value::{DumpKind, Value};

/// Where a frame reads its next values from.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// Position inside a managed array
    Array {
        /// Source array
        array: SeriesId,
        /// Read position
        index: usize,
    },
    /// Exhausted
    End,
    /// Values passed by native code that have no array behind them yet
    Variadic(VecDeque<Value>),
}

/// How much of a frame is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMode {
    /// A function call: every slot is traced
    #[default]
    Call,
    /// Only keeps its source array and pending value alive
    GuardArrayOnly,
}

/// One activation record.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Paramlist of the function being called
    pub paramlist: Option<SeriesId>,
    /// Source of upcoming values
    pub feed: Feed,
    /// Value fetched but not yet consumed
    pub value: Option<Value>,
    /// Output slot
    pub out: Value,
    /// Traced slots
    pub mode: FrameMode,
    /// Feed pulled from by a varargs parameter
    pub subfeed: Option<SeriesId>,
    /// Context the arguments were promoted to, if any
    pub context: Option<SeriesId>,
    /// Arguments gathered so far
    pub args: Vec<Value>,
    /// Parameter being fulfilled
    pub param: Option<Value>,
    /// Refinement being fulfilled
    pub refine: Option<Value>,
    /// Word the function was invoked through
    pub label: Option<Symbol>,
}

impl Frame {
    /// Frame for a call to the function owning `paramlist`.
    pub fn call(paramlist: SeriesId, feed: Feed) -> Self {
        Self {
            paramlist: Some(paramlist),
            ..Self::native(feed)
        }
    }

    /// Frame of native code that has no paramlist of its own.
    pub fn native(feed: Feed) -> Self {
        Self {
            paramlist: None,
            feed,
            value: None,
            out: Value::Unset,
            mode: FrameMode::Call,
            subfeed: None,
            context: None,
            args: Vec::new(),
            param: None,
            refine: None,
            label: None,
        }
    }

    /// Frame that only protects the array it is reading.
    pub fn guard_array(array: SeriesId, index: usize) -> Self {
        Self {
            mode: FrameMode::GuardArrayOnly,
            ..Self::native(Feed::Array { array, index })
        }
    }

    /// Builder-style label.
    pub fn with_label(mut self, label: Symbol) -> Self {
        self.label = Some(label);
        self
    }

    /// True while the frame reads from values with no array behind them.
    pub fn is_variadic(&self) -> bool {
        matches!(self.feed, Feed::Variadic(_))
    }

    /// Move the pending variadic values into a managed array and read from
    /// it instead. Returns the new array, if one was made.
    pub fn reify_feed(&mut self, heap: &mut Heap) -> Option<SeriesId> {
        let Feed::Variadic(values) = &mut self.feed else {
            return None;
        };
        let values: Vec<Value> = values.drain(..).collect();
        let array = heap.make_array(values);
        heap.manage(array);
        self.feed = Feed::Array { array, index: 0 };
        Some(array)
    }

    /// Address of the frame `depth` levels above the bottom of the stack.
    pub fn addr(depth: usize) -> NodeAddr {
        NodeAddr::node(AddrSpace::Frame, depth as u32)
    }

    /// Trace this frame. `depth` counts from the bottom of the stack and
    /// `above` is the frame that called into this one, if any.
    pub(crate) fn mark(&self, depth: usize, above: Option<NodeAddr>, marker: &mut Marker<'_>) {
        let heap = marker.heap();
        let at = Self::addr(depth);
        let name = self.label.and_then(|label| heap.symbol_name(label));
        let origin = match above {
            Some(above) => Origin::edge(above, "<prior>"),
            None => Origin {
                parent: None,
                edge: Some("<TG_Frame_Stack>"),
                name: None,
            },
        };
        marker.entry(at, origin.named(name), DumpKind::Call.code(), 0);

        match &self.feed {
            Feed::Array { array, .. } => {
                marker.queue_array(*array, None, DumpKind::Array.code(), Origin::edge(at, "<source>"));
            }
            Feed::End => {}
            Feed::Variadic(_) => fatal(Violation::UnreifiedFeed { depth }),
        }

        // A value fetched from a native's arguments may not be managed yet
        if let Some(value) = self.value.as_ref().filter(|value| heap.value_is_managed(value)) {
            marker.queue_value(value, at.cell(0), Origin::edge(at, "<value>"));
        }

        if self.mode == FrameMode::GuardArrayOnly {
            return;
        }

        if let Some(subfeed) = self.subfeed {
            marker.queue_subfeed(subfeed, Origin::edge(at, "<subfeed>"));
        }
        if let Some(paramlist) = self.paramlist {
            marker.queue_array(
                paramlist,
                Some(paramlist),
                DumpKind::Array.code(),
                Origin::edge(at, "<paramlist>"),
            );
        }

        marker.queue_value(&self.out, at.cell(1), Origin::edge(at, "<out>"));
        for (i, arg) in self.args.iter().enumerate() {
            marker.queue_value(arg, at.cell(4 + i), Origin::edge(at, "<arg>"));
        }

        if let Some(context) = self.context {
            if heap.is_managed(context) {
                marker.queue_context(context, Origin::edge(at, "<context>"));
            } else if let Some(keylist) = heap.series(context).keylist() {
                // Unmanaged varlist: the frame owns it, the keylist may be shared
                marker.queue_array(
                    keylist,
                    Some(keylist),
                    DumpKind::Keylist.code(),
                    Origin::edge(at, "<keylist>"),
                );
            }
        }

        for (slot, value) in [(2, &self.param), (3, &self.refine)] {
            if let Some(value) = value.as_ref().filter(|value| heap.value_is_managed(value)) {
                marker.queue_value(value, at.cell(slot), Origin::edge(at, "<param>"));
            }
        }
    }
}
