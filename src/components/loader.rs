//! Boot loader.
//!
//! At start time the loader copies its image through the `out` port, word
//! by word, then hands the entry address to the core on `entry` and raises
//! `start`. Both wires are optional; an unbound wire is skipped.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::component::{Component, Ctx};
use crate::error::{SimError, SimResult};
use crate::event::{MemRequest, Message};
use crate::port::{PortDesc, PortKind};

/// Bytes per write request issued while loading.
const LOAD_CHUNK: usize = 4;

/// A contiguous piece of the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub addr: u64,
    pub data: Vec<u8>,
}

/// Writes an image into memory and boots a core.
#[derive(Debug)]
pub struct ImageLoader {
    segments: Vec<Segment>,
    entry: u64,
    bytes_loaded: u64,
    booted: bool,
}

impl ImageLoader {
    /// Creates a loader with no segments that boots at `entry`.
    pub fn new(entry: u64) -> Self {
        Self {
            segments: Vec::new(),
            entry,
            bytes_loaded: 0,
            booted: false,
        }
    }

    /// Adds a segment to load at `addr`.
    pub fn with_segment(mut self, addr: u64, data: impl Into<Vec<u8>>) -> Self {
        self.segments.push(Segment {
            addr,
            data: data.into(),
        });
        self
    }

    /// Loads a raw binary file at `base`.
    pub fn from_binary_file(path: impl AsRef<Path>, base: u64, entry: u64) -> io::Result<Self> {
        let data = fs::read(path)?;
        Ok(Self::new(entry).with_segment(base, data))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn entry(&self) -> u64 {
        self.entry
    }

    /// Bytes written so far.
    pub fn bytes_loaded(&self) -> u64 {
        self.bytes_loaded
    }

    /// True once the start signal has been raised.
    pub fn booted(&self) -> bool {
        self.booted
    }

    fn load_segment(&mut self, index: usize, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let segment = &self.segments[index];
        let mut addr = segment.addr;
        for chunk in segment.data.chunks(LOAD_CHUNK) {
            let resp = ctx.request("out", MemRequest::write(addr, chunk))?;
            if resp.fault {
                return Err(SimError::LoadFailed { addr });
            }
            addr += chunk.len() as u64;
            self.bytes_loaded += chunk.len() as u64;
        }
        debug!(
            loader = ctx.path(),
            addr = format_args!("{:#x}", segment.addr),
            size = segment.data.len(),
            "segment loaded"
        );
        Ok(())
    }
}

impl Component for ImageLoader {
    fn type_name(&self) -> &'static str {
        "loader"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::output("out", PortKind::Memory),
            PortDesc::output("start", PortKind::Wire),
            PortDesc::output("entry", PortKind::Wire),
        ]
    }

    fn start(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        for index in 0..self.segments.len() {
            self.load_segment(index, ctx)?;
        }

        if ctx.is_bound("entry") {
            ctx.send("entry", Message::Wire(self.entry))?;
        }
        if ctx.is_bound("start") {
            ctx.send("start", Message::Wire(1))?;
        }
        self.booted = true;
        info!(
            loader = ctx.path(),
            entry = format_args!("{:#x}", self.entry),
            bytes = self.bytes_loaded,
            "image loaded"
        );
        Ok(())
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "segments": self.segments.len(),
            "bytes_loaded": self.bytes_loaded,
            "entry": self.entry,
            "booted": self.booted,
        })
    }
}
