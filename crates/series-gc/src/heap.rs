//! Heap: the node pools plus everything allocation needs to know.
//!
//! Every constructor returns an *unmanaged* node. The caller either frees it
//! or hands it to the collector with one of the `manage*` calls; from then on
//! only the sweep may destroy it.

use rustc_hash::FxHashMap;

use crate::ballast::Ballast;
use crate::config::GcConfig;
use crate::error::{GcError, GcResult, Violation, fatal};
use crate::ffi::{LibHandle, RoutineInfo, StructField, StructMirror};
use crate::gob::Gob;
use crate::node::{
    GobId, LibId, NodeFlags, RoutineId, SeriesFlags, SeriesId, SeriesInfo, Symbol,
};
use crate::pool::{Pool, PoolKind, PoolStats};
use crate::series::{Content, Dynamic, Link, Misc, Series};
use crate::value::{ContextKind, FunctionBody, FunctionRef, Value};

const CELL_WIDE: usize = std::mem::size_of::<Value>();

/// Word spelling interner.
#[derive(Debug, Default)]
struct Symbols {
    names: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Symbol>,
}

impl Symbols {
    fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&symbol) = self.lookup.get(name) {
            return symbol;
        }
        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.into());
        self.lookup.insert(name.into(), symbol);
        symbol
    }

    fn name(&self, symbol: Symbol) -> Option<&str> {
        self.names.get(symbol.0 as usize).map(|name| &**name)
    }
}

/// All pooled nodes and the allocation allowance.
pub struct Heap {
    series: Pool<Series>,
    gobs: Pool<Gob>,
    routines: Pool<RoutineInfo>,
    libs: Pool<LibHandle>,
    symbols: Symbols,
    ballast: Ballast,
    /// Set when the ballast runs out or a cycle was deferred
    recycle_signal: bool,
}

impl Heap {
    /// Create an empty heap.
    pub fn new(config: &GcConfig) -> Self {
        Self {
            series: Pool::new(PoolKind::Series, config.series_units),
            gobs: Pool::new(PoolKind::Gob, config.gob_units),
            routines: Pool::new(PoolKind::Routine, config.routine_units),
            libs: Pool::new(PoolKind::Library, config.lib_units),
            symbols: Symbols::default(),
            ballast: Ballast::new(config.ballast),
            recycle_signal: false,
        }
    }

    // ------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------

    /// Intern a word spelling.
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Spelling of an interned word.
    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        self.symbols.name(symbol)
    }

    // ------------------------------------------------------------------
    // Accounting
    // ------------------------------------------------------------------

    /// Allocation allowance.
    pub fn ballast(&self) -> &Ballast {
        &self.ballast
    }

    pub(crate) fn ballast_mut(&mut self) -> &mut Ballast {
        &mut self.ballast
    }

    /// True once allocation has asked for a cycle.
    pub fn recycle_requested(&self) -> bool {
        self.recycle_signal
    }

    pub(crate) fn request_recycle(&mut self) {
        self.recycle_signal = true;
    }

    pub(crate) fn clear_recycle_signal(&mut self) {
        self.recycle_signal = false;
    }

    fn charge(&mut self, bytes: usize) {
        if self.ballast.charge(bytes) && !self.recycle_signal {
            #[cfg(feature = "gc_logging")]
            tracing::trace!(
                target: "series_gc::gc",
                remaining = self.ballast.remaining(),
                "ballast exhausted, recycle requested"
            );
            self.recycle_signal = true;
        }
    }

    fn charged_bytes(series: &Series) -> usize {
        if series.info.contains(SeriesInfo::EXTERNAL) {
            std::mem::size_of::<Series>()
        } else {
            series.total_bytes()
        }
    }

    /// Occupancy of every pool.
    pub fn pool_stats(&self) -> [PoolStats; 4] {
        [
            self.series.stats(),
            self.gobs.stats(),
            self.routines.stats(),
            self.libs.stats(),
        ]
    }

    /// Nodes whose lifetime belongs to the collector.
    ///
    /// Gobs, routine descriptors and libraries are always collector-owned.
    pub fn managed_count(&self) -> usize {
        let series = self
            .series
            .live_indices()
            .filter(|&i| self.series.header(i).contains(NodeFlags::MANAGED))
            .count();
        series + self.gobs.has() + self.routines.has() + self.libs.has()
    }

    // ------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------

    fn alloc_series(&mut self, series: Series) -> SeriesId {
        let bytes = Self::charged_bytes(&series);
        let singular = series.is_singular();
        let empty = series.is_empty();
        let index = self.series.alloc(series);
        if singular {
            self.series.insert_flags(index, NodeFlags::CELL);
            if empty {
                self.series.insert_flags(index, NodeFlags::END);
            }
        }
        self.charge(bytes);
        SeriesId(index)
    }

    fn alloc_array(&mut self, flags: SeriesFlags, values: Vec<Value>) -> SeriesId {
        let content = if values.len() <= 1 {
            Content::Singular(values.into_iter().next())
        } else {
            let units = values.len();
            Content::Cells(Dynamic::with_data(values, units))
        };
        self.alloc_series(Series::new(flags | SeriesFlags::ARRAY, CELL_WIDE, content))
    }

    /// Array of value cells. Zero or one cell is stored inline.
    pub fn make_array(&mut self, values: Vec<Value>) -> SeriesId {
        self.alloc_array(SeriesFlags::empty(), values)
    }

    /// Empty array with a dynamic buffer for at least `capacity` cells.
    pub fn make_array_with_capacity(&mut self, capacity: usize) -> SeriesId {
        let content = Content::Cells(Dynamic::with_data(Vec::new(), capacity));
        self.alloc_series(Series::new(SeriesFlags::ARRAY, CELL_WIDE, content))
    }

    /// UTF-8 string series.
    pub fn make_string(&mut self, text: &str) -> SeriesId {
        let content = Content::Bytes(Dynamic::with_data(text.as_bytes().to_vec(), text.len()));
        self.alloc_series(Series::new(SeriesFlags::UTF8_STRING, 1, content))
    }

    /// Binary series.
    pub fn make_binary(&mut self, bytes: Vec<u8>) -> SeriesId {
        let units = bytes.len();
        let content = Content::Bytes(Dynamic::with_data(bytes, units));
        self.alloc_series(Series::new(SeriesFlags::empty(), 1, content))
    }

    /// Binary whose buffer is owned by foreign code; only the node is charged.
    pub fn make_external_binary(&mut self, bytes: Vec<u8>) -> SeriesId {
        let units = bytes.len();
        let content = Content::Bytes(Dynamic::with_data(bytes, units));
        let mut series = Series::new(SeriesFlags::FIXED_SIZE, 1, content);
        series.info |= SeriesInfo::EXTERNAL;
        self.alloc_series(series)
    }

    /// Series of struct field descriptors.
    pub fn make_fields(&mut self, fields: Vec<StructField>) -> SeriesId {
        let wide = std::mem::size_of::<StructField>();
        self.alloc_series(Series::new(SeriesFlags::FIXED_SIZE, wide, Content::Fields(fields)))
    }

    /// Pane series listing child gobs.
    pub fn make_pane(&mut self, children: Vec<GobId>) -> SeriesId {
        let wide = std::mem::size_of::<GobId>();
        self.alloc_series(Series::new(SeriesFlags::empty(), wide, Content::Gobs(children)))
    }

    /// Context with the given words and values.
    ///
    /// Slot 0 of the varlist holds the context's own archetype value and
    /// slot 0 of the keylist is the root key. Returns the varlist.
    pub fn make_context(&mut self, kind: ContextKind, fields: &[(Symbol, Value)]) -> SeriesId {
        self.build_context(kind, fields, SeriesFlags::empty())
    }

    /// Context whose variables live on the frame stack.
    pub fn make_stack_context(&mut self, kind: ContextKind, fields: &[(Symbol, Value)]) -> SeriesId {
        self.build_context(kind, fields, SeriesFlags::STACK)
    }

    fn build_context(
        &mut self,
        kind: ContextKind,
        fields: &[(Symbol, Value)],
        extra: SeriesFlags,
    ) -> SeriesId {
        let mut keys = Vec::with_capacity(fields.len() + 1);
        keys.push(Value::Unset);
        keys.extend(fields.iter().map(|(symbol, _)| Value::Typeset {
            bits: u64::MAX,
            symbol: Some(*symbol),
        }));
        let keylist = self.alloc_array(SeriesFlags::KEYLIST, keys);

        let mut vars = Vec::with_capacity(fields.len() + 1);
        vars.push(Value::Unset);
        vars.extend(fields.iter().map(|(_, value)| value.clone()));
        let varlist = self.alloc_array(SeriesFlags::VARLIST | extra, vars);

        self.init_varlist(varlist, keylist, kind);
        varlist
    }

    fn init_varlist(&mut self, varlist: SeriesId, keylist: SeriesId, kind: ContextKind) {
        let series = self.series_mut(varlist);
        series.link = Link::Keylist(keylist);
        if let Some(archetype) = series.cell_mut(0) {
            *archetype = Value::Context {
                kind,
                varlist,
                spec: None,
            };
        }
    }

    /// New context with a copy of `proto`'s variables, sharing its keylist.
    pub fn derive_context(&mut self, proto: SeriesId) -> SeriesId {
        let (kind, keylist, vars) = {
            let series = self.series(proto);
            let kind = match series.cells().first() {
                Some(Value::Context { kind, .. }) => *kind,
                _ => ContextKind::Object,
            };
            let Some(keylist) = series.keylist() else {
                fatal(Violation::MissingKeylist { addr: proto.addr() });
            };
            (kind, keylist, series.cells().to_vec())
        };
        let varlist = self.alloc_array(SeriesFlags::VARLIST, vars);
        self.init_varlist(varlist, keylist, kind);
        self.series_mut(keylist).info |= SeriesInfo::SHARED_KEYLIST;
        varlist
    }

    /// Mark a stack context's variables as gone.
    pub fn drop_stack_vars(&mut self, varlist: SeriesId) {
        let series = self.series_mut(varlist);
        if series.flags.contains(SeriesFlags::STACK) {
            series.info |= SeriesInfo::INACCESSIBLE;
        }
    }

    /// Function whose paramlist names `params`. Slot 0 holds the function.
    pub fn make_function(
        &mut self,
        spec: SeriesId,
        params: &[Symbol],
        body: FunctionBody,
    ) -> FunctionRef {
        let mut cells = Vec::with_capacity(params.len() + 1);
        cells.push(Value::Unset);
        cells.extend(params.iter().map(|symbol| Value::Typeset {
            bits: u64::MAX,
            symbol: Some(*symbol),
        }));
        let paramlist = self.alloc_array(SeriesFlags::PARAMLIST, cells);
        let func = FunctionRef {
            paramlist,
            spec,
            body,
        };
        if let Some(slot) = self.series_mut(paramlist).cell_mut(0) {
            *slot = Value::Function(func);
        }
        func
    }

    /// Map over alternating key/value cells, optionally with a hash index.
    /// Returns the pairlist.
    pub fn make_map(&mut self, pairs: Vec<Value>, hashed: bool) -> SeriesId {
        let count = pairs.len() / 2;
        let pairlist = self.alloc_array(SeriesFlags::PAIRLIST, pairs);
        if hashed {
            let slots: Vec<u8> = (0..count as u32).flat_map(u32::to_le_bytes).collect();
            let units = slots.len();
            let index = Series::new(
                SeriesFlags::empty(),
                4,
                Content::Bytes(Dynamic::with_data(slots, units)),
            );
            let hashlist = self.alloc_series(index);
            self.series_mut(pairlist).link = Link::Hashlist(hashlist);
        }
        pairlist
    }

    /// Attach (or clear) the subfeed of a varargs source.
    pub fn set_subfeed(&mut self, source: SeriesId, subfeed: Option<SeriesId>) {
        self.series_mut(source).misc = match subfeed {
            Some(subfeed) => Misc::Subfeed(subfeed),
            None => Misc::None,
        };
    }

    /// Struct mirror over `data_len` zeroed bytes and the given value cells.
    pub fn make_struct(
        &mut self,
        spec: SeriesId,
        fields: Vec<StructField>,
        data_len: usize,
        cells: Vec<Value>,
    ) -> StructMirror {
        let fields = self.make_fields(fields);
        let data = self.make_binary(vec![0; data_len]);
        self.series_mut(data).flags |= SeriesFlags::FIXED_SIZE;
        let cells = self.make_array(cells);
        StructMirror {
            spec,
            fields,
            data,
            cells,
            offset: 0,
        }
    }

    /// Hand a series to the collector.
    pub fn manage(&mut self, id: SeriesId) {
        if self.series.get(id.0).is_none() {
            fatal(Violation::Dangling {
                pool: PoolKind::Series,
                index: id.0,
            });
        }
        self.series.insert_flags(id.0, NodeFlags::MANAGED);
    }

    /// Hand a context's varlist and keylist to the collector.
    pub fn manage_context(&mut self, varlist: SeriesId) {
        let Some(keylist) = self.series(varlist).keylist() else {
            fatal(Violation::MissingKeylist {
                addr: varlist.addr(),
            });
        };
        self.manage(keylist);
        self.manage(varlist);
    }

    /// Hand a map's pairlist and hash index to the collector.
    pub fn manage_map(&mut self, pairlist: SeriesId) {
        if let Some(hashlist) = self.series(pairlist).hashlist() {
            self.manage(hashlist);
        }
        self.manage(pairlist);
    }

    /// Hand every series of a struct mirror to the collector.
    pub fn manage_struct(&mut self, mirror: &StructMirror) {
        self.manage(mirror.fields);
        self.manage(mirror.data);
        self.manage(mirror.cells);
    }

    /// Free an unmanaged series immediately.
    pub fn free_series(&mut self, id: SeriesId) {
        if self.series.header(id.0).contains(NodeFlags::MANAGED) {
            fatal(Violation::FreeManaged { addr: id.addr() });
        }
        self.kill_series(id.0);
    }

    pub(crate) fn kill_series(&mut self, index: u32) -> Series {
        let series = self.series.release(index);
        self.ballast.credit(Self::charged_bytes(&series));
        series
    }

    /// Series body; aborts on a freed handle.
    pub fn series(&self, id: SeriesId) -> &Series {
        match self.series.get(id.0) {
            Some(series) => series,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Series,
                index: id.0,
            }),
        }
    }

    fn series_mut(&mut self, id: SeriesId) -> &mut Series {
        match self.series.get_mut(id.0) {
            Some(series) => series,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Series,
                index: id.0,
            }),
        }
    }

    /// Series body, if the handle is still live.
    pub fn get_series(&self, id: SeriesId) -> Option<&Series> {
        self.series.get(id.0)
    }

    /// Whether the series is still allocated.
    pub fn is_live(&self, id: SeriesId) -> bool {
        self.series.header(id.0).contains(NodeFlags::VALID)
    }

    /// Header bits of a series node.
    pub fn header(&self, id: SeriesId) -> NodeFlags {
        self.series.header(id.0)
    }

    /// Whether the collector owns the series.
    pub fn is_managed(&self, id: SeriesId) -> bool {
        self.series.header(id.0).contains(NodeFlags::MANAGED)
    }

    /// Whether a value only refers to collector-owned series.
    pub fn value_is_managed(&self, value: &Value) -> bool {
        value
            .primary_series()
            .is_none_or(|series| self.is_managed(series))
    }

    /// Set the locked bit; later mutation fails with [`GcError::Locked`].
    pub fn lock(&mut self, id: SeriesId) {
        self.series_mut(id).info |= SeriesInfo::LOCKED;
    }

    fn edit_series<R>(
        &mut self,
        id: SeriesId,
        resizes: bool,
        edit: impl FnOnce(&mut Series) -> GcResult<R>,
    ) -> GcResult<R> {
        let series = self.series_mut(id);
        if series.info.contains(SeriesInfo::LOCKED) {
            return Err(GcError::Locked(id.addr()));
        }
        if resizes && series.flags.contains(SeriesFlags::FIXED_SIZE) {
            return Err(GcError::FixedSize(id.addr()));
        }
        let before = Self::charged_bytes(series);
        let result = edit(series)?;
        let after = Self::charged_bytes(series);
        let singular = series.is_singular();
        let empty = series.is_empty();

        let cell_bits = NodeFlags::CELL | NodeFlags::END;
        self.series.remove_flags(id.0, cell_bits);
        if singular {
            self.series.insert_flags(id.0, NodeFlags::CELL);
            if empty {
                self.series.insert_flags(id.0, NodeFlags::END);
            }
        }
        if after > before {
            self.charge(after - before);
        } else {
            self.ballast.credit(before - after);
        }
        Ok(result)
    }

    /// Append a cell to an array.
    pub fn append(&mut self, id: SeriesId, value: Value) -> GcResult<()> {
        self.edit_series(id, true, |series| {
            if !series.is_array() {
                return Err(GcError::NotAnArray(id.addr()));
            }
            series.push_cell(value);
            Ok(())
        })
    }

    /// Overwrite one cell of an array.
    pub fn set_cell(&mut self, id: SeriesId, index: usize, value: Value) -> GcResult<()> {
        self.edit_series(id, false, |series| {
            if !series.is_array() {
                return Err(GcError::NotAnArray(id.addr()));
            }
            let len = series.len();
            match series.cell_mut(index) {
                Some(cell) => {
                    *cell = value;
                    Ok(())
                }
                None => Err(GcError::OutOfRange {
                    addr: id.addr(),
                    index,
                    len,
                }),
            }
        })
    }

    /// Append raw bytes to a byte series.
    pub fn append_bytes(&mut self, id: SeriesId, bytes: &[u8]) -> GcResult<()> {
        self.edit_series(id, true, |series| {
            if series.is_array() {
                return Err(GcError::NotAnArray(id.addr()));
            }
            series.push_bytes(bytes);
            Ok(())
        })
    }

    /// Drop units from the head by biasing the buffer. Returns units removed.
    pub fn remove_head(&mut self, id: SeriesId, units: usize) -> GcResult<usize> {
        self.edit_series(id, true, |series| Ok(series.remove_head(units)))
    }

    pub(crate) fn series_pool(&self) -> &Pool<Series> {
        &self.series
    }

    // ------------------------------------------------------------------
    // Gobs
    // ------------------------------------------------------------------

    /// Allocate a gob. Gobs are always collector-owned.
    pub fn make_gob(&mut self, gob: Gob) -> GobId {
        self.charge(std::mem::size_of::<Gob>());
        GobId(self.gobs.alloc(gob))
    }

    /// Gob body; aborts on a freed handle.
    pub fn gob(&self, id: GobId) -> &Gob {
        match self.gobs.get(id.0) {
            Some(gob) => gob,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Gob,
                index: id.0,
            }),
        }
    }

    /// Mutable gob body.
    pub fn gob_mut(&mut self, id: GobId) -> &mut Gob {
        match self.gobs.get_mut(id.0) {
            Some(gob) => gob,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Gob,
                index: id.0,
            }),
        }
    }

    /// Whether the gob is still allocated.
    pub fn gob_is_live(&self, id: GobId) -> bool {
        self.gobs.header(id.0).contains(NodeFlags::VALID)
    }

    pub(crate) fn gob_pool(&self) -> &Pool<Gob> {
        &self.gobs
    }

    pub(crate) fn free_gob(&mut self, index: u32) {
        self.gobs.release(index);
        self.ballast.credit(std::mem::size_of::<Gob>());
    }

    // ------------------------------------------------------------------
    // Routines and libraries
    // ------------------------------------------------------------------

    /// Allocate a routine descriptor.
    pub fn make_routine(&mut self, info: RoutineInfo) -> RoutineId {
        self.charge(std::mem::size_of::<RoutineInfo>());
        RoutineId(self.routines.alloc(info))
    }

    /// Routine descriptor; aborts on a freed handle.
    pub fn routine(&self, id: RoutineId) -> &RoutineInfo {
        match self.routines.get(id.0) {
            Some(info) => info,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Routine,
                index: id.0,
            }),
        }
    }

    /// Mutable routine descriptor.
    pub fn routine_mut(&mut self, id: RoutineId) -> &mut RoutineInfo {
        match self.routines.get_mut(id.0) {
            Some(info) => info,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Routine,
                index: id.0,
            }),
        }
    }

    /// Whether the routine descriptor is still allocated.
    pub fn routine_is_live(&self, id: RoutineId) -> bool {
        self.routines.header(id.0).contains(NodeFlags::VALID)
    }

    pub(crate) fn routine_pool(&self) -> &Pool<RoutineInfo> {
        &self.routines
    }

    /// Tear down a routine descriptor.
    ///
    /// Teardown releases the call interface described by the argument type
    /// series, so that series must still be allocated here.
    pub(crate) fn free_routine(&mut self, index: u32) {
        let info = self.routines.release(index);
        let arg_count = self.series(info.arg_types).len();
        let extra_bytes = self.series(info.extra_mem).total_bytes();
        self.ballast.credit(std::mem::size_of::<RoutineInfo>());

        #[cfg(feature = "gc_logging")]
        tracing::trace!(
            target: "series_gc::gc",
            routine = index,
            args = arg_count,
            extra_bytes,
            callback = info.is_callback(),
            "routine descriptor freed"
        );
        #[cfg(not(feature = "gc_logging"))]
        let _ = (arg_count, extra_bytes);
    }

    /// Open a library handle.
    pub fn open_library(&mut self, path: &str) -> LibId {
        self.charge(std::mem::size_of::<LibHandle>());
        LibId(self.libs.alloc(LibHandle {
            path: path.to_owned(),
            open: true,
        }))
    }

    /// Library handle; aborts on a freed handle.
    pub fn library(&self, id: LibId) -> &LibHandle {
        match self.libs.get(id.0) {
            Some(lib) => lib,
            None => fatal(Violation::Dangling {
                pool: PoolKind::Library,
                index: id.0,
            }),
        }
    }

    /// Whether the library handle is still allocated.
    pub fn library_is_live(&self, id: LibId) -> bool {
        self.libs.header(id.0).contains(NodeFlags::VALID)
    }

    pub(crate) fn lib_pool(&self) -> &Pool<LibHandle> {
        &self.libs
    }

    /// Close and release a library handle.
    pub(crate) fn close_library(&mut self, index: u32) {
        let mut lib = self.libs.release(index);
        lib.open = false;
        self.ballast.credit(std::mem::size_of::<LibHandle>());

        #[cfg(feature = "gc_logging")]
        tracing::trace!(target: "series_gc::gc", path = %lib.path, "library closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(&GcConfig::default())
    }

    fn routine(heap: &mut Heap) -> (RoutineId, SeriesId) {
        let spec = heap.make_array(Vec::new());
        let arg_types = heap.make_binary(vec![1, 2]);
        let arg_structs = heap.make_array(Vec::new());
        let extra_mem = heap.make_binary(vec![0; 8]);
        let routine = heap.make_routine(RoutineInfo {
            spec,
            arg_types,
            arg_structs,
            extra_mem,
            target: crate::ffi::RoutineTarget::Callback { func: None },
        });
        (routine, extra_mem)
    }

    #[test]
    fn test_free_routine_reads_live_series() {
        let mut heap = heap();
        let (routine, extra_mem) = routine(&mut heap);
        heap.free_routine(routine.index());
        assert!(!heap.routine_is_live(routine));
        assert!(heap.is_live(extra_mem));
    }

    #[test]
    #[should_panic(expected = "dangling")]
    fn test_free_routine_after_its_series_is_fatal() {
        let mut heap = heap();
        let (routine, extra_mem) = routine(&mut heap);
        heap.free_series(extra_mem);
        heap.free_routine(routine.index());
    }

    #[test]
    fn test_new_series_are_unmanaged() {
        let mut heap = heap();
        let a = heap.make_array(vec![Value::Integer(1)]);
        assert!(heap.is_live(a));
        assert!(!heap.is_managed(a));
        heap.manage(a);
        assert!(heap.is_managed(a));
        assert_eq!(heap.managed_count(), 1);
    }

    #[test]
    fn test_singular_header_bits() {
        let mut heap = heap();
        let empty = heap.make_array(Vec::new());
        assert!(heap.header(empty).contains(NodeFlags::CELL | NodeFlags::END));

        heap.append(empty, Value::None).unwrap();
        assert!(heap.header(empty).contains(NodeFlags::CELL));
        assert!(!heap.header(empty).contains(NodeFlags::END));

        heap.append(empty, Value::None).unwrap();
        assert!(!heap.header(empty).contains(NodeFlags::CELL));
        assert_eq!(heap.series(empty).len(), 2);
    }

    #[test]
    fn test_context_layout() {
        let mut heap = heap();
        let x = heap.intern("x");
        let y = heap.intern("y");
        let ctx = heap.make_context(
            ContextKind::Object,
            &[(x, Value::Integer(1)), (y, Value::Integer(2))],
        );
        let varlist = heap.series(ctx);
        assert!(varlist.is_varlist());
        assert_eq!(varlist.len(), 3);
        assert_eq!(
            varlist.cells()[0],
            Value::Context {
                kind: ContextKind::Object,
                varlist: ctx,
                spec: None
            }
        );
        let keylist = varlist.keylist().unwrap();
        assert_eq!(heap.series(keylist).len(), 3);
        assert!(heap.series(keylist).flags().contains(SeriesFlags::KEYLIST));
    }

    #[test]
    fn test_derive_context_shares_keylist() {
        let mut heap = heap();
        let a = heap.intern("a");
        let proto = heap.make_context(ContextKind::Object, &[(a, Value::None)]);
        let child = heap.derive_context(proto);
        let keylist = heap.series(proto).keylist().unwrap();
        assert_eq!(heap.series(child).keylist(), Some(keylist));
        assert!(heap.series(keylist).info().contains(SeriesInfo::SHARED_KEYLIST));
        assert_eq!(heap.series(child).cells()[0], Value::object(child));
    }

    #[test]
    fn test_function_paramlist_holds_itself() {
        let mut heap = heap();
        let spec = heap.make_array(Vec::new());
        let arg = heap.intern("arg");
        let func = heap.make_function(spec, &[arg], FunctionBody::Native);
        let paramlist = heap.series(func.paramlist);
        assert_eq!(paramlist.cells()[0], Value::Function(func));
        assert_eq!(paramlist.len(), 2);
    }

    #[test]
    fn test_locked_series_rejects_edits() {
        let mut heap = heap();
        let a = heap.make_array(vec![Value::None]);
        heap.lock(a);
        assert!(matches!(heap.append(a, Value::None), Err(GcError::Locked(_))));
        assert!(matches!(
            heap.set_cell(a, 0, Value::Bar),
            Err(GcError::Locked(_))
        ));
    }

    #[test]
    fn test_edit_errors() {
        let mut heap = heap();
        let s = heap.make_string("abc");
        assert!(matches!(heap.append(s, Value::None), Err(GcError::NotAnArray(_))));
        let a = heap.make_array(vec![Value::None]);
        assert!(matches!(
            heap.set_cell(a, 4, Value::None),
            Err(GcError::OutOfRange { index: 4, len: 1, .. })
        ));
        let ext = heap.make_external_binary(vec![1, 2]);
        assert!(matches!(heap.append_bytes(ext, b"x"), Err(GcError::FixedSize(_))));
    }

    #[test]
    fn test_ballast_charged_and_credited() {
        let mut heap = heap();
        let before = heap.ballast().remaining();
        let s = heap.make_string("some text");
        assert!(heap.ballast().remaining() < before);
        heap.free_series(s);
        assert_eq!(heap.ballast().remaining(), before);
    }

    #[test]
    fn test_exhausted_ballast_requests_recycle() {
        let config = GcConfig {
            ballast: 256,
            ..GcConfig::default()
        };
        let mut heap = Heap::new(&config);
        assert!(!heap.recycle_requested());
        heap.make_binary(vec![0; 1024]);
        assert!(heap.recycle_requested());
    }

    #[test]
    #[should_panic(expected = "freed outside the sweep")]
    fn test_free_managed_is_fatal() {
        let mut heap = heap();
        let a = heap.make_array(Vec::new());
        heap.manage(a);
        heap.free_series(a);
    }

    #[test]
    fn test_map_with_hashlist() {
        let mut heap = heap();
        let pairlist = heap.make_map(vec![Value::Integer(1), Value::Integer(2)], true);
        let hashlist = heap.series(pairlist).hashlist().unwrap();
        heap.manage_map(pairlist);
        assert!(heap.is_managed(hashlist));
        assert_eq!(heap.series(hashlist).len(), 1);
    }

    #[test]
    fn test_bias_removal() {
        let mut heap = heap();
        let b = heap.make_binary(b"abcdef".to_vec());
        assert_eq!(heap.remove_head(b, 2).unwrap(), 2);
        assert_eq!(heap.series(b).bytes(), b"cdef");
    }
}
