//! Memory usage dump
//!
//! A dump is a CSV stream written while a cycle traces the heap: one row per
//! traced edge, one row per swept node, and `#` comment lines between
//! phases. Rows are `addr,parent,kind,size,edge,name` with `(nil)` for a
//! missing parent and `(null)` for a missing edge or name.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::GcResult;
use crate::node::NodeAddr;

/// Header comment written at the top of a dump file.
pub const DUMP_HEADER: &str = "Addr,parent,type,size,name";

/// One dump row.
#[derive(Debug, Clone, Copy)]
pub struct DumpEntry<'a> {
    /// Node or slot being reported
    pub addr: NodeAddr,
    /// Node holding the reference
    pub parent: Option<NodeAddr>,
    /// Datatype or dump kind code
    pub kind: i32,
    /// Bytes attributed to this row
    pub size: usize,
    /// Label of the edge from parent to node
    pub edge: Option<&'a str>,
    /// Word or root name
    pub name: Option<&'a str>,
}

enum Sink {
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::File(file) => file.write(buf),
            Sink::Memory(bytes) => bytes.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::File(file) => file.flush(),
            Sink::Memory(_) => Ok(()),
        }
    }
}

/// Destination of a memory dump.
///
/// Write errors do not interrupt the cycle; the first one is kept and
/// returned by [`MemDump::finish`].
pub struct MemDump {
    out: Sink,
    error: Option<io::Error>,
    rows: usize,
}

impl MemDump {
    /// Dump into a new file at `path`, starting with the header comment.
    pub fn create(path: impl AsRef<Path>) -> GcResult<Self> {
        let file = File::create(path)?;
        let mut dump = Self {
            out: Sink::File(BufWriter::new(file)),
            error: None,
            rows: 0,
        };
        dump.comment(DUMP_HEADER);
        Ok(dump)
    }

    /// Dump into memory, starting with the header comment.
    pub fn in_memory() -> Self {
        let mut dump = Self {
            out: Sink::Memory(Vec::new()),
            error: None,
            rows: 0,
        };
        dump.comment(DUMP_HEADER);
        dump
    }

    /// Rows written so far (comments excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write a `#` comment line.
    pub fn comment(&mut self, text: &str) {
        let result = writeln!(self.out, "#{text}");
        self.record(result);
    }

    /// Write one row. Self-edges are skipped.
    pub fn entry(&mut self, entry: &DumpEntry<'_>) {
        if entry.parent == Some(entry.addr) {
            return;
        }
        let edge = entry.edge.unwrap_or("(null)");
        let name = entry.name.unwrap_or("(null)");
        let result = match entry.parent {
            Some(parent) => writeln!(
                self.out,
                "{},{},{},{},{},{}",
                entry.addr, parent, entry.kind, entry.size, edge, name
            ),
            None => writeln!(
                self.out,
                "{},(nil),{},{},{},{}",
                entry.addr, entry.kind, entry.size, edge, name
            ),
        };
        self.record(result);
        self.rows += 1;
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    /// Flush and report the first write error. In-memory dumps hand back
    /// their text.
    pub fn finish(mut self) -> GcResult<Option<String>> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }
        self.out.flush()?;
        match self.out {
            Sink::File(_) => Ok(None),
            Sink::Memory(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }
}
