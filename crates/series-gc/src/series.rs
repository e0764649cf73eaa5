//! Series nodes
//!
//! A series is the general container: a byte string, an array of value
//! cells, a list of struct field descriptors or a gob pane. Small arrays keep
//! their single cell inside the node; everything else owns a dynamic buffer
//! whose capacity is rounded to the pool size classes.

use crate::ffi::StructField;
use crate::node::{GobId, SeriesFlags, SeriesId, SeriesInfo};
use crate::pool::{LARGE_BUFFER_THRESHOLD, round_to_size_class};
use crate::value::Value;

/// A growable buffer with a head bias.
///
/// `bias` units at the front have been logically removed and are no longer
/// part of the series.
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamic<T> {
    data: Vec<T>,
    bias: usize,
}

impl<T> Dynamic<T> {
    /// Buffer holding `data`, with room for at least `units` elements.
    pub fn with_data(mut data: Vec<T>, units: usize) -> Self {
        let wide = std::mem::size_of::<T>().max(1);
        let want = units.max(data.len());
        let capacity = round_to_size_class(want * wide) / wide;
        data.reserve_exact(capacity.saturating_sub(data.len()));
        Self { data, bias: 0 }
    }

    /// Live elements.
    pub fn live(&self) -> &[T] {
        &self.data[self.bias..]
    }

    /// Mutable live elements.
    pub fn live_mut(&mut self) -> &mut [T] {
        &mut self.data[self.bias..]
    }

    /// Units removed from the head.
    pub fn bias(&self) -> usize {
        self.bias
    }

    /// Allocated units, including the biased head.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn push(&mut self, value: T) {
        if self.data.len() == self.data.capacity() {
            let wide = std::mem::size_of::<T>().max(1);
            let want = (self.data.len() + 1) * wide;
            let bytes = if want > LARGE_BUFFER_THRESHOLD {
                want.max(self.data.len() * wide * 2)
            } else {
                round_to_size_class(want)
            };
            self.data.reserve_exact(bytes / wide - self.data.len());
        }
        self.data.push(value);
    }

    fn remove_head(&mut self, count: usize) -> usize {
        let count = count.min(self.data.len() - self.bias);
        self.bias += count;
        count
    }
}

/// What a series holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Zero or one cell kept inside the node
    Singular(Option<Value>),
    /// Value cells in a dynamic buffer
    Cells(Dynamic<Value>),
    /// Raw bytes, `wide` bytes per unit
    Bytes(Dynamic<u8>),
    /// Struct field descriptors
    Fields(Vec<StructField>),
    /// Child gobs of a pane
    Gobs(Vec<GobId>),
}

/// First auxiliary relation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Link {
    /// Nothing
    #[default]
    None,
    /// Keylist of a varlist
    Keylist(SeriesId),
    /// Hash index of a map pairlist
    Hashlist(SeriesId),
}

/// Second auxiliary relation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Misc {
    /// Nothing
    #[default]
    None,
    /// Subfeed of a varargs source (array or context varlist)
    Subfeed(SeriesId),
}

/// A series node body.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub(crate) flags: SeriesFlags,
    pub(crate) info: SeriesInfo,
    pub(crate) wide: usize,
    pub(crate) content: Content,
    pub(crate) link: Link,
    pub(crate) misc: Misc,
}

impl Series {
    pub(crate) fn new(flags: SeriesFlags, wide: usize, content: Content) -> Self {
        let mut info = SeriesInfo::empty();
        if !matches!(content, Content::Singular(_)) {
            info |= SeriesInfo::HAS_DYNAMIC;
        }
        Self {
            flags,
            info,
            wide,
            content,
            link: Link::None,
            misc: Misc::None,
        }
    }

    /// Subtype bits.
    pub fn flags(&self) -> SeriesFlags {
        self.flags
    }

    /// State bits.
    pub fn info(&self) -> SeriesInfo {
        self.info
    }

    /// Bytes per unit.
    pub fn wide(&self) -> usize {
        self.wide
    }

    /// Holds value cells.
    pub fn is_array(&self) -> bool {
        self.flags.contains(SeriesFlags::ARRAY)
    }

    /// Variable list of a context.
    pub fn is_varlist(&self) -> bool {
        self.flags.contains(SeriesFlags::VARLIST)
    }

    /// Raw content.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Length in units.
    pub fn len(&self) -> usize {
        match &self.content {
            Content::Singular(cell) => usize::from(cell.is_some()),
            Content::Cells(cells) => cells.live().len(),
            Content::Bytes(bytes) => bytes.live().len() / self.wide.max(1),
            Content::Fields(fields) => fields.len(),
            Content::Gobs(gobs) => gobs.len(),
        }
    }

    /// True when the series has no units.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value cells; empty for non-arrays.
    pub fn cells(&self) -> &[Value] {
        match &self.content {
            Content::Singular(Some(cell)) => std::slice::from_ref(cell),
            Content::Cells(cells) => cells.live(),
            _ => &[],
        }
    }

    /// Byte content; empty for non-byte series.
    pub fn bytes(&self) -> &[u8] {
        match &self.content {
            Content::Bytes(bytes) => bytes.live(),
            _ => &[],
        }
    }

    /// Struct field descriptors; empty for other series.
    pub fn fields(&self) -> &[StructField] {
        match &self.content {
            Content::Fields(fields) => fields,
            _ => &[],
        }
    }

    /// Gobs of a pane; empty for other series.
    pub fn gobs(&self) -> &[GobId] {
        match &self.content {
            Content::Gobs(gobs) => gobs,
            _ => &[],
        }
    }

    /// Keylist of a varlist.
    pub fn keylist(&self) -> Option<SeriesId> {
        match self.link {
            Link::Keylist(keylist) => Some(keylist),
            _ => None,
        }
    }

    /// Hash index of a pairlist.
    pub fn hashlist(&self) -> Option<SeriesId> {
        match self.link {
            Link::Hashlist(hashlist) => Some(hashlist),
            _ => None,
        }
    }

    /// Subfeed of a varargs source.
    pub fn subfeed(&self) -> Option<SeriesId> {
        match self.misc {
            Misc::Subfeed(subfeed) => Some(subfeed),
            Misc::None => None,
        }
    }

    /// Bytes of content storage owned by this series (excluding the node).
    pub fn content_bytes(&self) -> usize {
        match &self.content {
            Content::Singular(_) => 0,
            Content::Cells(cells) => cells.capacity() * std::mem::size_of::<Value>(),
            Content::Bytes(bytes) => bytes.capacity(),
            Content::Fields(fields) => fields.capacity() * std::mem::size_of::<StructField>(),
            Content::Gobs(gobs) => gobs.capacity() * std::mem::size_of::<GobId>(),
        }
    }

    /// Node plus content storage, in bytes.
    pub fn total_bytes(&self) -> usize {
        std::mem::size_of::<Series>() + self.content_bytes()
    }

    /// True when the content is the inline single-cell form.
    pub fn is_singular(&self) -> bool {
        matches!(self.content, Content::Singular(_))
    }

    pub(crate) fn push_cell(&mut self, value: Value) {
        match &mut self.content {
            Content::Singular(slot @ None) => *slot = Some(value),
            Content::Singular(slot @ Some(_)) => {
                let mut data = Vec::with_capacity(2);
                data.extend(slot.take());
                data.push(value);
                self.content = Content::Cells(Dynamic::with_data(data, 2));
                self.info |= SeriesInfo::HAS_DYNAMIC;
            }
            Content::Cells(cells) => cells.push(value),
            _ => {}
        }
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> Option<&mut Value> {
        match &mut self.content {
            Content::Singular(Some(cell)) if index == 0 => Some(cell),
            Content::Cells(cells) => cells.live_mut().get_mut(index),
            _ => None,
        }
    }

    pub(crate) fn push_bytes(&mut self, data: &[u8]) {
        if let Content::Bytes(bytes) = &mut self.content {
            for &b in data {
                bytes.push(b);
            }
        }
    }

    pub(crate) fn remove_head(&mut self, units: usize) -> usize {
        match &mut self.content {
            Content::Singular(slot) => {
                if units > 0 && slot.is_some() {
                    *slot = None;
                    1
                } else {
                    0
                }
            }
            Content::Cells(cells) => cells.remove_head(units),
            Content::Bytes(bytes) => bytes.remove_head(units * self.wide) / self.wide.max(1),
            Content::Fields(fields) => {
                let n = units.min(fields.len());
                fields.drain(..n);
                n
            }
            Content::Gobs(gobs) => {
                let n = units.min(gobs.len());
                gobs.drain(..n);
                n
            }
        }
    }
}
