//! Value cells
//!
//! [`Value`] is a closed enum with one variant per datatype family. Anything
//! that references heap nodes does so through pool handles, so a value is
//! plain data that can be copied into guard lists and host tables freely.

use crate::ffi::StructMirror;
use crate::node::{GobId, LibId, SeriesId, Symbol};

/// Datatype tags, numbered the way diagnostics report them.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Kind {
    Unset = 0,
    None,
    Bar,
    LitBar,
    Logic,
    Integer,
    Decimal,
    Percent,
    Money,
    Char,
    Pair,
    Tuple,
    Time,
    Date,
    Datatype,
    Typeset,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    Issue,
    String,
    Binary,
    File,
    Email,
    Url,
    Tag,
    Bitset,
    Image,
    Vector,
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    Map,
    Object,
    Module,
    Port,
    Frame,
    Error,
    Function,
    Varargs,
    Library,
    Struct,
    Gob,
    Event,
    Handle,
}

/// One past the last datatype code.
pub const KIND_MAX: i32 = Kind::Handle as i32 + 1;

impl Kind {
    /// Numeric code used in memory dumps.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Node roles that have no datatype of their own, as reported in dumps.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpKind {
    /// Byte or opaque series
    Series = KIND_MAX + 4,
    /// Value array
    Array,
    /// Context (varlist + keylist)
    Context,
    /// Context keylist
    Keylist,
    /// Context varlist
    Varlist,
    /// Struct field descriptor
    Field,
    /// Struct mirror
    Stu,
    /// Map hash index
    Hash,
    /// Data stack chunk
    Chunk,
    /// Call frame
    Call,
    /// Routine descriptor
    RoutineInfo,
}

impl DumpKind {
    /// Numeric code used in memory dumps.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Word flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WordKind {
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    Issue,
}

/// What a word is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Not bound
    Unbound,
    /// Bound to a context, identified by its varlist
    Context(SeriesId),
    /// Relative to a function, identified by its paramlist
    Relative(SeriesId),
    /// Refinement pickup marker left by argument fulfillment
    Pickup,
}

/// Byte-holding series flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StringKind {
    String,
    Binary,
    File,
    Email,
    Url,
    Tag,
    Bitset,
    Image,
    Vector,
}

/// Value array flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ArrayKind {
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
}

/// Context flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ContextKind {
    Object,
    Module,
    Port,
    Frame,
    Error,
}

/// Function dispatch classes and what each one owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionBody {
    /// Built-in native
    Native,
    /// Datatype action
    Action,
    /// Interpreted function with a body block
    User(SeriesId),
    /// Extension command with a body block
    Command(SeriesId),
    /// Foreign routine
    Routine(crate::node::RoutineId),
    /// Foreign-callable wrapper around a function
    Callback(crate::node::RoutineId),
    /// Specialization holding its exemplar context varlist
    Specialized(SeriesId),
}

/// A function value. The paramlist's slot 0 holds the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    /// Parameter list (doubles as the function's identity)
    pub paramlist: SeriesId,
    /// Spec block
    pub spec: SeriesId,
    /// Class-specific payload
    pub body: FunctionBody,
}

/// Where a varargs value pulls its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarargsSource {
    /// Single-element array shared between copies made with MAKE
    Array1(SeriesId),
    /// Frame context of the call that is feeding the values
    Frame(SeriesId),
}

/// Event payload, selected by the event's model.
#[derive(Debug, Clone, PartialEq)]
pub enum EventModel {
    /// Interface event about a gob
    Gui(Option<GobId>),
    /// Port event, holding the port context varlist
    Port(SeriesId),
    /// Object event, holding the object context varlist
    Object(SeriesId),
    /// File drop; the file block is only owned once it has been copied
    DropFile {
        /// Copied block of files
        files: Option<SeriesId>,
    },
    /// Device completion, holding the request chain
    Device(Vec<Request>),
}

/// An I/O request as seen by the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Port context varlist the request reports back to
    pub port: Option<SeriesId>,
}

/// A value cell.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Value {
    Unset,
    None,
    Bar,
    LitBar,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Percent(f64),
    Money(f64),
    Char(char),
    Pair(f32, f32),
    Tuple([u8; 8]),
    Time(i64),
    Date(i64),
    Datatype {
        kind: Kind,
        spec: Option<SeriesId>,
    },
    Typeset {
        bits: u64,
        symbol: Option<Symbol>,
    },
    Word {
        kind: WordKind,
        symbol: Symbol,
        binding: Binding,
    },
    String {
        kind: StringKind,
        series: SeriesId,
        index: usize,
    },
    Array {
        kind: ArrayKind,
        array: SeriesId,
        index: usize,
    },
    Map {
        pairlist: SeriesId,
    },
    Context {
        kind: ContextKind,
        varlist: SeriesId,
        spec: Option<SeriesId>,
    },
    Function(FunctionRef),
    Varargs(VarargsSource),
    Library {
        handle: LibId,
        spec: SeriesId,
    },
    Struct(Box<StructMirror>),
    Gob {
        gob: GobId,
        index: usize,
    },
    Event(Box<EventModel>),
    Handle(usize),
}

impl Value {
    /// Block value at the head of `array`.
    pub fn block(array: SeriesId) -> Self {
        Value::Array {
            kind: ArrayKind::Block,
            array,
            index: 0,
        }
    }

    /// String value at the head of `series`.
    pub fn string(series: SeriesId) -> Self {
        Value::String {
            kind: StringKind::String,
            series,
            index: 0,
        }
    }

    /// Object value for a context varlist.
    pub fn object(varlist: SeriesId) -> Self {
        Value::Context {
            kind: ContextKind::Object,
            varlist,
            spec: None,
        }
    }

    /// Plain word.
    pub fn word(symbol: Symbol, binding: Binding) -> Self {
        Value::Word {
            kind: WordKind::Word,
            symbol,
            binding,
        }
    }

    /// Datatype tag of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Unset => Kind::Unset,
            Value::None => Kind::None,
            Value::Bar => Kind::Bar,
            Value::LitBar => Kind::LitBar,
            Value::Logic(_) => Kind::Logic,
            Value::Integer(_) => Kind::Integer,
            Value::Decimal(_) => Kind::Decimal,
            Value::Percent(_) => Kind::Percent,
            Value::Money(_) => Kind::Money,
            Value::Char(_) => Kind::Char,
            Value::Pair(..) => Kind::Pair,
            Value::Tuple(_) => Kind::Tuple,
            Value::Time(_) => Kind::Time,
            Value::Date(_) => Kind::Date,
            Value::Datatype { .. } => Kind::Datatype,
            Value::Typeset { .. } => Kind::Typeset,
            Value::Word { kind, .. } => match kind {
                WordKind::Word => Kind::Word,
                WordKind::SetWord => Kind::SetWord,
                WordKind::GetWord => Kind::GetWord,
                WordKind::LitWord => Kind::LitWord,
                WordKind::Refinement => Kind::Refinement,
                WordKind::Issue => Kind::Issue,
            },
            Value::String { kind, .. } => match kind {
                StringKind::String => Kind::String,
                StringKind::Binary => Kind::Binary,
                StringKind::File => Kind::File,
                StringKind::Email => Kind::Email,
                StringKind::Url => Kind::Url,
                StringKind::Tag => Kind::Tag,
                StringKind::Bitset => Kind::Bitset,
                StringKind::Image => Kind::Image,
                StringKind::Vector => Kind::Vector,
            },
            Value::Array { kind, .. } => match kind {
                ArrayKind::Block => Kind::Block,
                ArrayKind::Group => Kind::Group,
                ArrayKind::Path => Kind::Path,
                ArrayKind::SetPath => Kind::SetPath,
                ArrayKind::GetPath => Kind::GetPath,
                ArrayKind::LitPath => Kind::LitPath,
            },
            Value::Map { .. } => Kind::Map,
            Value::Context { kind, .. } => match kind {
                ContextKind::Object => Kind::Object,
                ContextKind::Module => Kind::Module,
                ContextKind::Port => Kind::Port,
                ContextKind::Frame => Kind::Frame,
                ContextKind::Error => Kind::Error,
            },
            Value::Function(_) => Kind::Function,
            Value::Varargs(_) => Kind::Varargs,
            Value::Library { .. } => Kind::Library,
            Value::Struct(_) => Kind::Struct,
            Value::Gob { .. } => Kind::Gob,
            Value::Event(_) => Kind::Event,
            Value::Handle(_) => Kind::Handle,
        }
    }

    /// The series this value would be judged "managed" by, if any.
    ///
    /// Used for in-flight frame slots, which may point at values whose
    /// backing series is still under construction.
    pub fn primary_series(&self) -> Option<SeriesId> {
        match self {
            Value::Datatype { spec, .. } => *spec,
            Value::String { series, .. } => Some(*series),
            Value::Array { array, .. } => Some(*array),
            Value::Map { pairlist } => Some(*pairlist),
            Value::Context { varlist, .. } => Some(*varlist),
            Value::Function(func) => Some(func.paramlist),
            Value::Varargs(VarargsSource::Array1(array)) => Some(*array),
            Value::Varargs(VarargsSource::Frame(varlist)) => Some(*varlist),
            Value::Library { spec, .. } => Some(*spec),
            Value::Struct(mirror) => Some(mirror.data),
            Value::Word {
                binding: Binding::Context(series) | Binding::Relative(series),
                ..
            } => Some(*series),
            _ => None,
        }
    }
}
