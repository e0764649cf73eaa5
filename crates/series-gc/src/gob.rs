//! Graphical objects
//!
//! Gobs form an arbitrary graph through `parent` and `pane` links, so the
//! tracer relies on the gob mark bit to stop at nodes it has already seen.

use crate::node::{GobId, SeriesId};
use crate::value::KIND_MAX;

/// Content type of a gob.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum GobKind {
    #[default]
    None = 0,
    Color,
    Image,
    String,
    Draw,
    Text,
    Effect,
}

impl GobKind {
    /// Content is a byte series (image pixels or text).
    pub fn has_byte_content(self) -> bool {
        matches!(self, GobKind::Image | GobKind::String)
    }

    /// Content is a dialect block.
    pub fn has_block_content(self) -> bool {
        matches!(self, GobKind::Draw | GobKind::Text | GobKind::Effect)
    }

    /// Dump kind code reported for this gob's content.
    pub fn content_code(self) -> i32 {
        self as i32 + KIND_MAX
    }
}

/// User data attached to a gob.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GobData {
    /// No data
    #[default]
    None,
    /// Integer payload
    Integer(i64),
    /// Object context varlist
    Object(SeriesId),
    /// String series
    String(SeriesId),
    /// Binary series
    Binary(SeriesId),
    /// Block array
    Block(SeriesId),
}

/// A graphical object node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gob {
    /// Content type
    pub kind: GobKind,
    /// Series listing child gobs
    pub pane: Option<SeriesId>,
    /// Enclosing gob
    pub parent: Option<GobId>,
    /// Content series, interpreted per `kind`
    pub content: Option<SeriesId>,
    /// Attached user data
    pub data: GobData,
    /// Position
    pub offset: (f32, f32),
    /// Extent
    pub size: (f32, f32),
}

impl Gob {
    /// Empty gob of the given content type.
    pub fn new(kind: GobKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}
