//! Simple RAM model.
//!
//! Serves reads and writes on local offsets `[0, size)`; routers in front
//! of it are expected to strip the global base (`rm_base`). Every access is
//! reported to the power model as `read_<bits>` / `write_<bits>`.
//!
//! With `power_trigger` enabled, a 32-bit write to offset 0 controls power
//! capture: `0xabbaabba` opens a measurement window over the whole graph
//! and `0xdeadbeef` closes it. The word is stored like any other write.

use serde::Serialize;
use tracing::warn;

use crate::component::{Component, Ctx};
use crate::error::SimResult;
use crate::event::{AccessKind, MemRequest, MemResponse};
use crate::port::{PortDesc, PortKind};
use crate::types::SimTime;

/// Value that opens a power capture window.
pub const CAPTURE_START: u32 = 0xabba_abba;
/// Value that closes a power capture window.
pub const CAPTURE_STOP: u32 = 0xdead_beef;

/// Access counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MemoryStats {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub faults: u64,
}

/// Byte-addressable memory.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    latency: SimTime,
    power_trigger: bool,
    stats: MemoryStats,
}

impl Memory {
    /// Creates a zero-filled memory of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            latency: 0,
            power_trigger: false,
            stats: MemoryStats::default(),
        }
    }

    /// Sets the access latency reported in responses.
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    /// Enables the power capture trigger at offset 0.
    pub fn with_power_trigger(mut self, enable: bool) -> Self {
        self.power_trigger = enable;
        self
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Raw contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reads a little-endian word at `offset`, if in range.
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Access counters.
    pub fn memory_stats(&self) -> &MemoryStats {
        &self.stats
    }

    fn range(&self, req: &MemRequest) -> Option<std::ops::Range<usize>> {
        let len = match req.kind {
            AccessKind::Read => req.size as usize,
            AccessKind::Write => {
                if req.data.len() != req.size as usize {
                    return None;
                }
                req.data.len()
            }
        };
        let start = usize::try_from(req.addr).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    fn check_trigger(&self, req: &MemRequest, ctx: &mut Ctx<'_>) {
        if !self.power_trigger || req.kind != AccessKind::Write || req.addr != 0 || req.size != 4 {
            return;
        }
        let Ok(bytes) = <[u8; 4]>::try_from(req.data.as_slice()) else {
            return;
        };
        match u32::from_le_bytes(bytes) {
            CAPTURE_START => ctx.power_capture_start(),
            CAPTURE_STOP => ctx.power_capture_stop(),
            _ => {}
        }
    }
}

impl Component for Memory {
    fn type_name(&self) -> &'static str {
        "memory"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("input", PortKind::Memory),
            PortDesc::input("clock", PortKind::Clock),
            PortDesc::input("power", PortKind::Power),
            PortDesc::input("voltage", PortKind::Power),
        ]
    }

    fn on_request(
        &mut self,
        _port: &str,
        req: MemRequest,
        ctx: &mut Ctx<'_>,
    ) -> SimResult<MemResponse> {
        let Some(range) = self.range(&req) else {
            self.stats.faults += 1;
            warn!(
                memory = ctx.path(),
                offset = format_args!("{:#x}", req.addr),
                size = req.size,
                "out-of-bounds access"
            );
            return Ok(MemResponse::fault().with_latency(self.latency));
        };

        ctx.power_event(&req.operation());

        let resp = match req.kind {
            AccessKind::Read => {
                self.stats.reads += 1;
                self.stats.bytes_read += range.len() as u64;
                MemResponse::data(self.data[range].to_vec())
            }
            AccessKind::Write => {
                self.stats.writes += 1;
                self.stats.bytes_written += range.len() as u64;
                self.data[range].copy_from_slice(&req.data);
                self.check_trigger(&req, ctx);
                MemResponse::ack()
            }
        };
        Ok(resp.with_latency(self.latency))
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "size": self.data.len(),
            "reads": self.stats.reads,
            "writes": self.stats.writes,
            "bytes_read": self.stats.bytes_read,
            "bytes_written": self.stats.bytes_written,
            "faults": self.stats.faults,
        })
    }
}
