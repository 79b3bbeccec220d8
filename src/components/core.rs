//! Fetch-only core.
//!
//! Stands in for a CPU on boards that only need realistic instruction
//! traffic: no decode, no execution. Once `fetch_enable` is raised, every
//! clock edge reads the 32-bit word at `pc` through `fetch` and moves `pc`
//! forward by 4. Only the most recent fetches are kept for inspection.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::component::{Component, Ctx};
use crate::error::SimResult;
use crate::event::{MemRequest, Message};
use crate::port::{PortDesc, PortKind};

/// Number of recent fetches kept by default.
pub const DEFAULT_TRACE_DEPTH: usize = 64;

/// A core that fetches but never executes.
#[derive(Debug)]
pub struct FetchCore {
    pc: u64,
    enabled: bool,
    halted: bool,
    max_fetches: Option<u64>,
    fetches: u64,
    trace_depth: usize,
    trace: VecDeque<(u64, u32)>,
}

impl Default for FetchCore {
    fn default() -> Self {
        Self {
            pc: 0,
            enabled: false,
            halted: false,
            max_fetches: None,
            fetches: 0,
            trace_depth: DEFAULT_TRACE_DEPTH,
            trace: VecDeque::new(),
        }
    }
}

impl FetchCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the last `depth` fetches; 0 disables the trace.
    pub fn with_trace_depth(mut self, depth: usize) -> Self {
        self.trace_depth = depth;
        while self.trace.len() > depth {
            self.trace.pop_front();
        }
        self
    }

    /// Asks the simulator to stop after `max` successful fetches.
    pub fn with_max_fetches(mut self, max: u64) -> Self {
        self.max_fetches = Some(max);
        self
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// True after a fetch fault or once the fetch budget is spent.
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Number of successful fetches.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// Address and value of the most recent fetches, oldest first.
    pub fn fetched(&self) -> Vec<(u64, u32)> {
        self.trace.iter().copied().collect()
    }

    fn fetch(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let resp = ctx.request("fetch", MemRequest::read(self.pc, 4))?;
        let word = match resp.as_u32() {
            Some(word) if !resp.fault => word,
            _ => {
                self.halted = true;
                warn!(
                    core = ctx.path(),
                    pc = format_args!("{:#x}", self.pc),
                    "fetch fault, halting"
                );
                return Ok(());
            }
        };

        debug!(
            core = ctx.path(),
            pc = format_args!("{:#x}", self.pc),
            word = format_args!("{word:#010x}"),
            "fetch"
        );
        self.fetches += 1;
        if self.trace_depth > 0 {
            if self.trace.len() == self.trace_depth {
                self.trace.pop_front();
            }
            self.trace.push_back((self.pc, word));
        }
        self.pc = self.pc.wrapping_add(4);

        if self.max_fetches == Some(self.fetches) {
            self.halted = true;
            info!(core = ctx.path(), fetches = self.fetches, "fetch budget reached");
            ctx.request_stop();
        }
        Ok(())
    }
}

impl Component for FetchCore {
    fn type_name(&self) -> &'static str {
        "fetch_core"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("fetch_enable", PortKind::Wire),
            PortDesc::input("entry", PortKind::Wire),
            PortDesc::input("clock", PortKind::Clock),
            PortDesc::output("fetch", PortKind::Memory),
            PortDesc::output("data", PortKind::Memory),
        ]
    }

    fn on_message(&mut self, port: &str, msg: Message, ctx: &mut Ctx<'_>) -> SimResult<()> {
        match (port, msg) {
            ("entry", Message::Wire(addr)) => self.pc = addr,
            ("fetch_enable", Message::Wire(level)) => {
                self.enabled = level != 0;
                debug!(core = ctx.path(), enabled = self.enabled, "fetch enable");
            }
            ("clock", Message::Clock(_)) if self.enabled && !self.halted => self.fetch(ctx)?,
            _ => {}
        }
        Ok(())
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "pc": self.pc,
            "fetches": self.fetches,
            "halted": self.halted,
        })
    }
}
