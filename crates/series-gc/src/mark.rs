//! Mark worklist and deep tracer
//!
//! Tracing never recurses on data depth. Arrays, gobs and struct layouts
//! reached from a value are *queued*: their mark bit is set first, then they are pushed on
//! the [`MarkStack`]. [`Marker::propagate`] pops entries and traces their
//! cells, which can only queue more work. Native stack depth therefore stays
//! constant no matter how deeply the heap is nested.
//!
//! The mark bit doubles as the visited set, which is what stops cycles
//! through gob parents, self-referencing structs and recursive blocks.

use crate::dump::{DumpEntry, MemDump};
use crate::error::{Violation, fatal};
use crate::ffi::{FieldType, RoutineTarget, StructMirror};
use crate::gob::GobData;
use crate::heap::Heap;
use crate::node::{AddrSpace, GobId, LibId, NodeAddr, NodeFlags, RoutineId, SeriesFlags, SeriesId, SeriesInfo};
use crate::pool::PoolKind;
use crate::series::Series;
use crate::value::{
    Binding, ContextKind, DumpKind, EventModel, FunctionBody, Kind, Value, VarargsSource,
};

const CELL_SIZE: usize = std::mem::size_of::<Value>();
const NODE_SIZE: usize = std::mem::size_of::<Series>();

/// Deferred tracing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkEntry {
    /// Marked array whose cells still need tracing
    Array {
        array: SeriesId,
        keylist: Option<SeriesId>,
        dump: bool,
    },
    /// Marked gob whose links still need tracing
    Gob(GobId),
    /// Struct field descriptors whose value cells still need tracing
    Fields {
        fields: SeriesId,
        cells: SeriesId,
        base: usize,
    },
}

/// Explicit stack of marked-but-untraced nodes.
#[derive(Debug, Default)]
pub struct MarkStack {
    entries: Vec<MarkEntry>,
}

impl MarkStack {
    /// Empty stack with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Abort unless the stack is drained.
    pub(crate) fn assert_empty(&self) {
        if !self.entries.is_empty() {
            fatal(Violation::WorklistNotEmpty {
                len: self.entries.len(),
            });
        }
    }
}

/// Where a traced reference came from, for dump rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Origin<'n> {
    /// Node or slot holding the reference
    pub parent: Option<NodeAddr>,
    /// Edge label
    pub edge: Option<&'static str>,
    /// Word or root name
    pub name: Option<&'n str>,
}

impl<'n> Origin<'n> {
    /// A named root with no parent.
    pub fn root(name: &'n str) -> Self {
        Self {
            parent: None,
            edge: None,
            name: Some(name),
        }
    }

    /// Labelled edge out of `parent`.
    pub fn edge(parent: NodeAddr, edge: &'static str) -> Self {
        Self {
            parent: Some(parent),
            edge: Some(edge),
            name: None,
        }
    }

    /// Same origin under another name.
    pub fn named(self, name: Option<&'n str>) -> Self {
        Self { name, ..self }
    }
}

/// Tracing state for one mark phase.
///
/// Handed to the host mark hook, which reports its values with
/// [`Marker::mark_value`]. The marker cannot allocate, so a hook cannot
/// start a nested cycle.
pub struct Marker<'a> {
    heap: &'a Heap,
    stack: &'a mut MarkStack,
    dump: Option<&'a mut MemDump>,
    marked: usize,
    host_slots: u32,
}

impl<'a> Marker<'a> {
    pub(crate) fn new(heap: &'a Heap, stack: &'a mut MarkStack, dump: Option<&'a mut MemDump>) -> Self {
        Self {
            heap,
            stack,
            dump,
            marked: 0,
            host_slots: 0,
        }
    }

    /// Nodes newly marked so far.
    pub fn marked(&self) -> usize {
        self.marked
    }

    /// Heap being traced.
    pub fn heap(&self) -> &'a Heap {
        self.heap
    }

    /// Report a host-held value as live.
    pub fn mark_value(&mut self, value: &Value) {
        let at = NodeAddr::node(AddrSpace::Host, self.host_slots);
        self.host_slots += 1;
        let origin = Origin {
            parent: None,
            edge: Some("<host>"),
            name: None,
        };
        self.queue_value(value, at, origin);
    }

    /// Write a dump comment, if dumping.
    pub fn comment(&mut self, text: &str) {
        if let Some(dump) = self.dump.as_deref_mut() {
            dump.comment(text);
        }
    }

    pub(crate) fn entry(&mut self, addr: NodeAddr, origin: Origin<'_>, kind: i32, size: usize) {
        if let Some(dump) = self.dump.as_deref_mut() {
            dump.entry(&DumpEntry {
                addr,
                parent: origin.parent,
                kind,
                size,
                edge: origin.edge,
                name: origin.name,
            });
        }
    }

    fn live_series(&self, id: SeriesId) -> &'a Series {
        match self.heap.get_series(id) {
            Some(series) => series,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Series,
                index: id.index(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Queueing
    // ------------------------------------------------------------------

    /// Mark an array and defer tracing its cells.
    ///
    /// `keylist` names the cells in dumps and bounds the array's length.
    pub fn queue_array(&mut self, array: SeriesId, keylist: Option<SeriesId>, kind: i32, origin: Origin<'_>) {
        let heap = self.heap;
        let addr = array.addr();
        let series = self.live_series(array);
        let header = heap.header(array);
        let already = header.contains(NodeFlags::MARKED);
        let size = if already {
            0
        } else if kind == DumpKind::Keylist.code() {
            NODE_SIZE + series.len() * CELL_SIZE
        } else {
            NODE_SIZE
        };
        self.entry(addr, origin, kind, size);
        if already {
            return;
        }

        if !header.contains(NodeFlags::MANAGED) {
            fatal(Violation::Unmanaged {
                addr,
                kind,
                size: series.total_bytes(),
            });
        }
        if !series.is_array() {
            fatal(Violation::NotAnArray { addr });
        }
        if series.info().contains(SeriesInfo::EXTERNAL) {
            fatal(Violation::ExternalArray { addr });
        }
        if let Some(keylist) = keylist {
            let keys = self.live_series(keylist).len();
            if series.len() > keys {
                fatal(Violation::KeylistTooShort {
                    addr,
                    keylist: keylist.addr(),
                    keys,
                    vars: series.len(),
                });
            }
        }

        heap.series_pool().insert_flags(array.index(), NodeFlags::MARKED);
        self.marked += 1;

        // Popped stack levels leave the node behind but not its cells
        if series.flags().contains(SeriesFlags::STACK) && series.info().contains(SeriesInfo::INACCESSIBLE) {
            return;
        }

        self.stack.entries.push(MarkEntry::Array {
            array,
            keylist,
            dump: kind != DumpKind::Keylist.code(),
        });
    }

    /// Queue a context: keylist first, then the varlist.
    pub fn queue_context(&mut self, varlist: SeriesId, origin: Origin<'_>) {
        let Some(keylist) = self.live_series(varlist).keylist() else {
            fatal(Violation::MissingKeylist {
                addr: varlist.addr(),
            });
        };
        self.queue_array(
            keylist,
            Some(keylist),
            DumpKind::Keylist.code(),
            Origin::edge(varlist.addr(), "<keylist>"),
        );
        self.queue_array(varlist, Some(keylist), DumpKind::Array.code(), origin);
    }

    /// Mark a series without looking inside it.
    pub fn mark_series_only(&mut self, id: SeriesId, kind: i32, origin: Origin<'_>) {
        let heap = self.heap;
        let addr = id.addr();
        let series = self.live_series(id);
        let header = heap.header(id);
        let already = header.contains(NodeFlags::MARKED);
        let size = if already { 0 } else { series.total_bytes() };
        self.entry(addr, origin, kind, size);
        if already {
            return;
        }
        if !header.contains(NodeFlags::MANAGED) {
            fatal(Violation::Unmanaged { addr, kind, size });
        }
        heap.series_pool().insert_flags(id.index(), NodeFlags::MARKED);
        self.marked += 1;
    }

    /// Mark a gob and defer tracing its links.
    pub fn queue_gob(&mut self, gob: GobId, origin: Origin<'_>) {
        let heap = self.heap;
        if !heap.gob_is_live(gob) {
            fatal(Violation::Dangling {
                pool: PoolKind::Gob,
                index: gob.index(),
            });
        }
        let addr = gob.addr();
        let already = heap.gob_pool().header(gob.index()).contains(NodeFlags::MARKED);
        let size = if already { 0 } else { std::mem::size_of::<crate::gob::Gob>() };
        self.entry(addr, origin, Kind::Gob.code(), size);
        if already {
            return;
        }
        heap.gob_pool().mark(gob.index());
        self.marked += 1;
        self.stack.entries.push(MarkEntry::Gob(gob));
    }

    /// Trace one value cell located at `at`.
    pub fn queue_value(&mut self, value: &Value, at: NodeAddr, origin: Origin<'_>) {
        let heap = self.heap;
        let name = match (origin.name, value) {
            (Some(name), _) => Some(name),
            (None, Value::Word { symbol, .. }) => heap.symbol_name(*symbol),
            (None, _) => None,
        };
        self.entry(at, origin.named(name), value.kind().code(), CELL_SIZE);

        let array = DumpKind::Array.code();
        match value {
            Value::Unset
            | Value::None
            | Value::Bar
            | Value::LitBar
            | Value::Logic(_)
            | Value::Integer(_)
            | Value::Decimal(_)
            | Value::Percent(_)
            | Value::Money(_)
            | Value::Char(_)
            | Value::Pair(..)
            | Value::Tuple(_)
            | Value::Time(_)
            | Value::Date(_)
            | Value::Typeset { .. }
            | Value::Handle(_) => {}

            Value::Datatype { spec, .. } => {
                if let Some(spec) = spec {
                    self.queue_array(*spec, None, array, Origin::edge(at, "<spec>"));
                }
            }

            Value::Word { binding, .. } => match binding {
                Binding::Relative(paramlist) => {
                    self.queue_array(*paramlist, Some(*paramlist), array, Origin::edge(at, "<bound-to>"));
                }
                Binding::Context(varlist) => {
                    self.queue_context(*varlist, Origin::edge(at, "<bound-to>"));
                }
                // Pickups point at slots the frame walker already covers
                Binding::Pickup | Binding::Unbound => {}
            },

            Value::String { series, .. } => {
                self.mark_series_only(*series, DumpKind::Series.code(), Origin::edge(at, "<series>"));
            }

            Value::Array { array: id, .. } => {
                self.queue_array(*id, None, array, Origin::edge(at, "<series>"));
            }

            Value::Map { pairlist } => {
                self.queue_array(*pairlist, None, array, Origin::edge(at, "<pairlist>"));
                if let Some(hashlist) = self.live_series(*pairlist).hashlist() {
                    self.mark_series_only(hashlist, DumpKind::Hash.code(), Origin::edge(at, "<hashlist>"));
                }
            }

            Value::Context { kind, varlist, spec } => {
                self.queue_context(*varlist, Origin::edge(at, "<context>").named(name));
                // A frame's call is either on the stack or gone
                match spec {
                    Some(spec) if *kind != ContextKind::Frame => {
                        self.queue_context(*spec, Origin::edge(at, "<context-spec>"));
                    }
                    _ => {}
                }
            }

            Value::Function(func) => {
                match func.body {
                    FunctionBody::User(body) | FunctionBody::Command(body) => {
                        self.queue_array(body, None, array, Origin::edge(at, "<func-body>"));
                    }
                    FunctionBody::Routine(routine) | FunctionBody::Callback(routine) => {
                        self.queue_routine(routine, Origin::edge(at, "<INFO>").named(name));
                    }
                    FunctionBody::Specialized(exemplar) => {
                        self.queue_context(exemplar, Origin::edge(at, "<special>"));
                    }
                    FunctionBody::Native | FunctionBody::Action => {}
                }
                self.queue_array(func.spec, None, array, Origin::edge(at, "<spec>"));
                self.queue_array(func.paramlist, Some(func.paramlist), array, Origin::edge(at, "<paramlist>"));
            }

            Value::Varargs(source) => {
                let subfeed = match *source {
                    VarargsSource::Array1(array1) => {
                        let subfeed = self.live_series(array1).subfeed();
                        self.queue_array(array1, None, array, Origin::edge(at, "<varargs-array1>"));
                        subfeed
                    }
                    VarargsSource::Frame(varlist) => {
                        let subfeed = self.live_series(varlist).subfeed();
                        self.queue_context(varlist, Origin::edge(at, "<varargs-frame>"));
                        subfeed
                    }
                };
                if let Some(subfeed) = subfeed {
                    self.queue_subfeed(subfeed, Origin::edge(at, "<subfeed>"));
                }
            }

            Value::Library { handle, spec } => {
                self.queue_array(*spec, None, array, Origin::edge(at, "<spec>"));
                self.mark_library(*handle, Origin::edge(at, "<handle>"));
            }

            Value::Struct(mirror) => self.queue_struct(mirror, at, origin.named(name)),

            Value::Gob { gob, .. } => self.queue_gob(*gob, Origin::edge(at, "<REBGOB>")),

            Value::Event(model) => self.queue_event(model, at),
        }
    }

    /// Queue a subfeed, which is either a context varlist or a plain array.
    pub(crate) fn queue_subfeed(&mut self, subfeed: SeriesId, origin: Origin<'_>) {
        if self.live_series(subfeed).is_varlist() {
            self.queue_context(subfeed, origin);
        } else {
            self.queue_array(subfeed, None, DumpKind::Array.code(), origin);
        }
    }

    fn mark_library(&mut self, handle: LibId, origin: Origin<'_>) {
        let heap = self.heap;
        if !heap.library_is_live(handle) {
            fatal(Violation::Dangling {
                pool: PoolKind::Library,
                index: handle.index(),
            });
        }
        if heap.lib_pool().mark(handle.index()) {
            self.marked += 1;
            self.entry(
                handle.addr(),
                origin,
                Kind::Library.code(),
                std::mem::size_of::<crate::ffi::LibHandle>(),
            );
        }
    }

    fn queue_event(&mut self, model: &EventModel, at: NodeAddr) {
        match model {
            EventModel::Gui(gob) => {
                if let Some(gob) = gob {
                    self.queue_gob(*gob, Origin::edge(at, "<gob>"));
                }
            }
            EventModel::Port(varlist) | EventModel::Object(varlist) => {
                self.queue_context(*varlist, Origin::edge(at, "<port/object/ser>"));
            }
            EventModel::DropFile { files } => {
                if let Some(files) = files {
                    self.queue_array(*files, None, DumpKind::Series.code(), Origin::edge(at, "<port/object/ser>"));
                }
            }
            EventModel::Device(requests) => {
                for request in requests {
                    if let Some(port) = request.port {
                        self.queue_context(port, Origin::edge(at, "<port>"));
                    }
                }
            }
        }
    }

    /// Mark a struct mirror's series and queue its field descriptors.
    fn queue_struct(&mut self, mirror: &StructMirror, at: NodeAddr, origin: Origin<'_>) {
        let heap = self.heap;
        let stu = DumpKind::Stu.code();
        let series = DumpKind::Series.code();
        let done = heap.header(mirror.data).contains(NodeFlags::MARKED);
        let size = if done { 0 } else { std::mem::size_of::<StructMirror>() };
        self.entry(at, origin, stu, size);
        if done {
            return;
        }

        self.queue_array(mirror.spec, None, DumpKind::Array.code(), Origin::edge(at, "<spec>"));
        self.mark_series_only(mirror.fields, series, Origin::edge(at, "<fields>"));
        self.mark_series_only(mirror.data, series, Origin::edge(at, "<data>"));
        self.mark_series_only(mirror.cells, series, Origin::edge(at, "<cells>"));

        self.stack.entries.push(MarkEntry::Fields {
            fields: mirror.fields,
            cells: mirror.cells,
            base: mirror.offset,
        });
    }

    /// Trace a routine descriptor.
    pub(crate) fn queue_routine(&mut self, routine: RoutineId, origin: Origin<'_>) {
        let heap = self.heap;
        let info = heap.routine(routine);
        let addr = routine.addr();
        let already = heap.routine_pool().header(routine.index()).contains(NodeFlags::MARKED);

        self.comment("Dumping Routine/Callback");
        let size = if already { 0 } else { std::mem::size_of::<crate::ffi::RoutineInfo>() };
        self.entry(addr, origin, DumpKind::RoutineInfo.code(), size);
        if already {
            return;
        }
        heap.routine_pool().mark(routine.index());
        self.marked += 1;

        let array = DumpKind::Array.code();
        let series = DumpKind::Series.code();
        self.queue_array(info.spec, None, array, Origin::edge(addr, "<spec>"));
        self.mark_series_only(info.arg_types, series, Origin::edge(addr, "<ffi-arg-types>"));
        self.queue_array(info.arg_structs, None, array, Origin::edge(addr, "<ffi-arg-structs>"));
        self.mark_series_only(info.extra_mem, series, Origin::edge(addr, "<extra-mem>"));

        match info.target {
            RoutineTarget::Callback { func } => {
                // Unset while the callback is still being constructed
                if let Some(paramlist) = func {
                    self.comment("Dumping the paramlist of a callback");
                    self.queue_array(paramlist, Some(paramlist), array, Origin::edge(addr, "<rebfunc>"));
                }
            }
            RoutineTarget::Foreign {
                lib,
                variadic,
                fixed_args,
                all_args,
            } => {
                if variadic {
                    if let Some(fixed) = fixed_args {
                        self.queue_array(fixed, None, array, Origin::edge(addr, "<fixed-args>"));
                    }
                    if let Some(all) = all_args {
                        self.queue_array(all, None, array, Origin::edge(addr, "<all-args>"));
                    }
                }
                if let Some(lib) = lib {
                    self.comment("Dumping the library referenced by the routine");
                    self.mark_library(lib, Origin::edge(addr, "<library>"));
                }
            }
        }
        self.comment("Done dumping Routine/Callback");
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Drain the worklist until every queued node has been traced.
    pub fn propagate(&mut self) {
        self.comment("Propagate all GC marks");
        while let Some(entry) = self.stack.entries.pop() {
            match entry {
                MarkEntry::Array { array, keylist, dump } => self.mark_array_deep(array, keylist, dump),
                MarkEntry::Gob(gob) => self.trace_gob(gob),
                MarkEntry::Fields { fields, cells, base } => self.trace_fields(fields, cells, base),
            }
        }
    }

    fn mark_array_deep(&mut self, array: SeriesId, keylist: Option<SeriesId>, dump: bool) {
        let heap = self.heap;
        let addr = array.addr();
        if !heap.header(array).contains(NodeFlags::MARKED) {
            fatal(Violation::UnmarkedWorklistEntry { addr });
        }
        let series = self.live_series(array);
        if series.is_varlist() {
            match series.keylist() {
                Some(own) if heap.header(own).contains(NodeFlags::MARKED) => {}
                Some(own) => fatal(Violation::KeylistUnmarked {
                    addr,
                    keylist: own.addr(),
                }),
                None => fatal(Violation::MissingKeylist { addr }),
            }
        }

        let keys = keylist.map(|keylist| self.live_series(keylist).cells());
        let silenced = if dump { None } else { self.dump.take() };
        let dumping = self.dump.is_some();

        for (i, value) in series.cells().iter().enumerate() {
            let name = if dumping {
                keys.and_then(|keys| keys.get(i)).and_then(|key| match key {
                    Value::Typeset {
                        symbol: Some(symbol),
                        ..
                    }
                    | Value::Word { symbol, .. } => heap.symbol_name(*symbol),
                    _ => None,
                })
            } else {
                None
            };
            self.queue_value(value, addr.cell(i), Origin::edge(addr, "<has>").named(name));
        }

        if silenced.is_some() {
            self.dump = silenced;
        }
    }

    /// Trace the value cells one layout of a struct covers.
    ///
    /// Nested layouts share the parent's cells at an accumulated offset and
    /// go back on the worklist.
    fn trace_fields(&mut self, fields: SeriesId, cells: SeriesId, base: usize) {
        let heap = self.heap;
        let values = self.live_series(cells).cells();
        let cells_addr = cells.addr();
        let fields_addr = fields.addr();
        for (i, field) in self.live_series(fields).fields().iter().enumerate() {
            let field_addr = fields_addr.cell(i);
            let name = field.name.and_then(|symbol| heap.symbol_name(symbol));
            self.entry(
                field_addr,
                Origin::edge(fields_addr, "<field>").named(name),
                DumpKind::Field.code(),
                0,
            );
            match field.ty {
                FieldType::Struct { fields: nested, spec } => {
                    self.mark_series_only(nested, DumpKind::Field.code(), Origin::edge(field_addr, "<fields>"));
                    self.queue_array(spec, None, DumpKind::Array.code(), Origin::edge(field_addr, "<spec>"));
                    self.stack.entries.push(MarkEntry::Fields {
                        fields: nested,
                        cells,
                        base: base + field.offset,
                    });
                }
                FieldType::Value if field.done => {
                    for k in 0..field.dimension {
                        let index = base + field.offset + k;
                        if let Some(value) = values.get(index) {
                            self.queue_value(
                                value,
                                cells_addr.cell(index),
                                Origin::edge(cells_addr, "<rebval>").named(name),
                            );
                        }
                    }
                }
                FieldType::Value | FieldType::Primitive => {}
            }
        }
    }

    fn trace_gob(&mut self, id: GobId) {
        let heap = self.heap;
        let gob = heap.gob(id);
        let addr = id.addr();

        if let Some(pane) = gob.pane {
            self.mark_series_only(pane, DumpKind::Series.code(), Origin::edge(addr, "<pane>"));
            for child in self.live_series(pane).gobs() {
                self.queue_gob(*child, Origin::edge(pane.addr(), "<has>"));
            }
        }

        if let Some(parent) = gob.parent {
            self.queue_gob(parent, Origin::edge(addr, "<parent>"));
        }

        if let Some(content) = gob.content {
            let code = gob.kind.content_code();
            if gob.kind.has_byte_content() {
                self.mark_series_only(content, code, Origin::edge(addr, "<content>"));
            } else if gob.kind.has_block_content() {
                self.queue_array(content, None, code, Origin::edge(addr, "<content>"));
            }
        }

        let edge = Origin::edge(addr, "<gob-data>");
        match gob.data {
            GobData::None => {}
            GobData::Integer(_) => {
                self.entry(addr.cell(0), edge, Kind::Integer.code(), CELL_SIZE);
            }
            GobData::Object(varlist) => self.queue_context(varlist, edge),
            GobData::String(series) | GobData::Binary(series) => {
                self.mark_series_only(series, DumpKind::Series.code(), edge);
            }
            GobData::Block(block) => {
                self.queue_array(block, None, DumpKind::Array.code(), edge);
            }
        }
    }
}
