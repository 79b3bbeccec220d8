//! Mock components for testing.
//!
//! These components provide simple, predictable behaviors useful for
//! testing the simulation framework.

use crate::component::{Component, Ctx};
use crate::error::SimResult;
use crate::event::{Message, PowerCommand};
use crate::port::{PortDesc, PortKind};
use crate::types::SimTime;

/// Records everything arriving on its `clock`, `wire` and `power` inputs.
#[derive(Debug, Default)]
pub struct Counter {
    edge_times: Vec<SimTime>,
    wire_values: Vec<(SimTime, u64)>,
    power_commands: Vec<(SimTime, PowerCommand)>,
}

impl Counter {
    /// Creates an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clock edges received.
    pub fn edges(&self) -> u64 {
        self.edge_times.len() as u64
    }

    /// Arrival time of every clock edge.
    pub fn edge_times(&self) -> &[SimTime] {
        &self.edge_times
    }

    /// Arrival time and value of every wire message.
    pub fn wire_values(&self) -> &[(SimTime, u64)] {
        &self.wire_values
    }

    /// Arrival time of every power command.
    pub fn power_commands(&self) -> &[(SimTime, PowerCommand)] {
        &self.power_commands
    }
}

impl Component for Counter {
    fn type_name(&self) -> &'static str {
        "counter"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::input("clock", PortKind::Clock),
            PortDesc::input("wire", PortKind::Wire),
            PortDesc::input("power", PortKind::Power),
        ]
    }

    fn on_message(&mut self, _port: &str, msg: Message, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let now = ctx.now();
        match msg {
            Message::Clock(_) => self.edge_times.push(now),
            Message::Wire(value) => self.wire_values.push((now, value)),
            Message::Power(cmd) => self.power_commands.push((now, cmd)),
            Message::Request(_) => {}
        }
        Ok(())
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "edges": self.edge_times.len(),
            "wire_values": self.wire_values.len(),
            "power_commands": self.power_commands.len(),
        })
    }
}

/// Emits `value` on its `out` port every `period`.
#[derive(Debug)]
pub struct Pulse {
    period: SimTime,
    value: u64,
    latency: SimTime,
    remaining: Option<u64>,
    emitted: u64,
}

impl Pulse {
    /// Creates a free-running pulse source.
    pub fn new(period: SimTime, value: u64) -> Self {
        Self {
            period,
            value,
            latency: 0,
            remaining: None,
            emitted: 0,
        }
    }

    /// Stops after `count` pulses.
    pub fn with_count(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }

    /// Sets the latency of the `out` port.
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    /// Number of pulses sent.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Component for Pulse {
    fn type_name(&self) -> &'static str {
        "pulse"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![PortDesc::output("out", PortKind::Wire).with_latency(self.latency)]
    }

    fn start(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        if self.remaining != Some(0) {
            ctx.schedule(self.period, 0)?;
        }
        Ok(())
    }

    fn on_timer(&mut self, _tag: u64, ctx: &mut Ctx<'_>) -> SimResult<()> {
        ctx.send("out", Message::Wire(self.value))?;
        self.emitted += 1;

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                return Ok(());
            }
        }
        ctx.schedule(self.period, 0)?;
        Ok(())
    }
}
