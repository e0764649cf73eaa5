//! Foreign interface nodes: struct mirrors, routine descriptors, libraries.

use crate::node::{LibId, SeriesId, Symbol};

/// A struct value: a view of foreign memory described by field descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMirror {
    /// Spec block the struct was made from
    pub spec: SeriesId,
    /// Series of [`StructField`] descriptors
    pub fields: SeriesId,
    /// Binary holding the raw bytes of the struct
    pub data: SeriesId,
    /// Array holding the cells of value-typed fields
    pub cells: SeriesId,
    /// Offset of this view into `data` and `cells`
    pub offset: usize,
}

/// How a struct field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Fixed-width C scalar
    Primitive,
    /// Nested struct with its own descriptors and spec
    Struct {
        /// Series of nested [`StructField`] descriptors
        fields: SeriesId,
        /// Nested spec block
        spec: SeriesId,
    },
    /// A value cell stored in the mirror's `cells` array
    Value,
}

/// One field of a struct layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field name
    pub name: Option<Symbol>,
    /// Storage kind
    pub ty: FieldType,
    /// Offset inside the parent: bytes for primitives, cells for values and
    /// nested structs
    pub offset: usize,
    /// Element count
    pub dimension: usize,
    /// Element size in bytes
    pub size: usize,
    /// Layout has been fully initialized
    pub done: bool,
}

impl StructField {
    /// Scalar field.
    pub fn primitive(name: Option<Symbol>, offset: usize, size: usize) -> Self {
        Self {
            name,
            ty: FieldType::Primitive,
            offset,
            dimension: 1,
            size,
            done: true,
        }
    }

    /// Value-typed field of `dimension` cells starting at cell `offset`.
    pub fn value(name: Option<Symbol>, offset: usize, dimension: usize) -> Self {
        Self {
            name,
            ty: FieldType::Value,
            offset,
            dimension,
            size: std::mem::size_of::<crate::value::Value>(),
            done: true,
        }
    }

    /// Nested struct field.
    pub fn nested(name: Option<Symbol>, offset: usize, fields: SeriesId, spec: SeriesId) -> Self {
        Self {
            name,
            ty: FieldType::Struct { fields, spec },
            offset,
            dimension: 1,
            size: 0,
            done: true,
        }
    }
}

/// Which side of the foreign boundary a routine sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineTarget {
    /// Foreign function called from the runtime
    Foreign {
        /// Library the entry point was loaded from
        lib: Option<LibId>,
        /// Accepts a variable argument list
        variadic: bool,
        /// Fixed arguments block of a variadic routine
        fixed_args: Option<SeriesId>,
        /// Full arguments block of the last variadic call
        all_args: Option<SeriesId>,
    },
    /// Runtime function exposed to foreign code
    Callback {
        /// Paramlist of the wrapped function, once construction finished
        func: Option<SeriesId>,
    },
}

/// Descriptor backing a routine or callback function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineInfo {
    /// Spec block
    pub spec: SeriesId,
    /// Binary of argument type codes
    pub arg_types: SeriesId,
    /// Array of struct arguments and return value
    pub arg_structs: SeriesId,
    /// Binary of memory owned by the call interface
    pub extra_mem: SeriesId,
    /// Foreign function or callback
    pub target: RoutineTarget,
}

impl RoutineInfo {
    /// Whether this descriptor wraps a runtime function.
    pub fn is_callback(&self) -> bool {
        matches!(self.target, RoutineTarget::Callback { .. })
    }
}

/// A dynamically loaded library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibHandle {
    /// Path the library was opened from
    pub path: String,
    /// Library has not been closed yet
    pub open: bool,
}
