//! Power control driver.
//!
//! Replays a time-stamped script of power commands: state changes go out
//! on `power`, voltage and temperature changes on `voltage`. Bind those to
//! the `Power` inputs of a component carrying a power model and the engine
//! applies them to its operating point.
//!
//! Script syntax, entries separated by `,` or `;`:
//!
//! ```text
//! 0=on, 20000=voltage:0.8, 40000=temperature:85, 60000=off
//! ```
//!
//! Times are picoseconds (decimal or `0x` hex).

use tracing::debug;

use crate::component::{Component, Ctx};
use crate::config::parse_u64;
use crate::error::{SimError, SimResult};
use crate::event::{Message, PowerCommand, PowerState};
use crate::port::{PortDesc, PortKind};
use crate::types::{SimTime, PRIORITY_NORMAL};

/// Drives `power` and `voltage` outputs from a script.
#[derive(Debug, Default)]
pub struct PowerSequencer {
    steps: Vec<(SimTime, PowerCommand)>,
    sent: usize,
}

impl PowerSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command to send at `at`. Steps are replayed in time order.
    pub fn with_step(mut self, at: SimTime, cmd: PowerCommand) -> Self {
        let pos = self.steps.partition_point(|(t, _)| *t <= at);
        self.steps.insert(pos, (at, cmd));
        self
    }

    /// Parses a `time=command` script.
    ///
    /// # Errors
    /// `InvalidPowerScript` naming the first malformed entry.
    pub fn from_script(script: &str) -> SimResult<Self> {
        let mut sequencer = Self::new();
        for entry in script.split([',', ';']).map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = |reason: String| SimError::InvalidPowerScript {
                entry: entry.to_string(),
                reason,
            };
            let (time, cmd) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected 'time=command'".to_string()))?;
            let time = parse_u64(time.trim())
                .ok_or_else(|| invalid(format!("invalid time '{}'", time.trim())))?;
            let cmd = parse_command(cmd.trim()).map_err(invalid)?;
            sequencer = sequencer.with_step(time, cmd);
        }
        Ok(sequencer)
    }

    pub fn steps(&self) -> &[(SimTime, PowerCommand)] {
        &self.steps
    }

    /// Number of commands sent so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

fn parse_command(text: &str) -> Result<PowerCommand, String> {
    let number = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid number '{value}'"))
    };
    match text.split_once(':') {
        None => match text.to_ascii_lowercase().as_str() {
            "on" => Ok(PowerCommand::SetState(PowerState::On)),
            "off" => Ok(PowerCommand::SetState(PowerState::Off)),
            _ => Err(format!("unknown power command '{text}'")),
        },
        Some((key, value)) => match key.trim().to_ascii_lowercase().as_str() {
            "voltage" => Ok(PowerCommand::SetVoltage(number(value)?)),
            "temperature" => Ok(PowerCommand::SetTemperature(number(value)?)),
            _ => Err(format!("unknown power command '{text}'")),
        },
    }
}

impl Component for PowerSequencer {
    fn type_name(&self) -> &'static str {
        "power_sequencer"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![
            PortDesc::output("power", PortKind::Power),
            PortDesc::output("voltage", PortKind::Power),
        ]
    }

    fn start(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let now = ctx.now();
        for (index, (at, _)) in self.steps.iter().enumerate() {
            ctx.schedule_at((*at).max(now), index as u64, PRIORITY_NORMAL)?;
        }
        Ok(())
    }

    fn on_timer(&mut self, tag: u64, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let Some(&(_, cmd)) = self.steps.get(tag as usize) else {
            return Ok(());
        };
        let port = match cmd {
            PowerCommand::SetState(_) => "power",
            PowerCommand::SetVoltage(_) | PowerCommand::SetTemperature(_) => "voltage",
        };
        debug!(sequencer = ctx.path(), ?cmd, "power command");
        if ctx.is_bound(port) {
            ctx.send(port, Message::Power(cmd))?;
        }
        self.sent += 1;
        Ok(())
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "steps": self.steps.len(),
            "sent": self.sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::mock::Counter;
    use crate::graph::GraphBuilder;
    use crate::types::ns;

    #[test]
    fn test_parse_script() {
        let seq = PowerSequencer::from_script("20000=voltage:0.8; 0=on, 0x9c40 = off,").unwrap();
        assert_eq!(
            seq.steps(),
            &[
                (0, PowerCommand::SetState(PowerState::On)),
                (20_000, PowerCommand::SetVoltage(0.8)),
                (40_000, PowerCommand::SetState(PowerState::Off)),
            ]
        );

        assert!(PowerSequencer::from_script("").unwrap().steps().is_empty());
        for bad in ["10", "x=on", "10=sleep", "10=voltage:high"] {
            assert!(
                matches!(
                    PowerSequencer::from_script(&format!("0=on, {bad}")),
                    Err(SimError::InvalidPowerScript { ref entry, .. }) if entry == bad
                ),
                "accepted: {bad}"
            );
        }
    }

    #[test]
    fn test_replay() {
        let seq = PowerSequencer::new()
            .with_step(ns(30), PowerCommand::SetState(PowerState::Off))
            .with_step(ns(10), PowerCommand::SetTemperature(85.0));

        let mut graph = GraphBuilder::new();
        let seq = graph.add_component(None, "seq", seq).unwrap();
        let state = graph.add_component(None, "state", Counter::new()).unwrap();
        let supply = graph.add_component(None, "supply", Counter::new()).unwrap();
        graph.connect(seq, "power", state, "power").unwrap();
        graph.connect(seq, "voltage", supply, "power").unwrap();

        let mut sim = graph.build();
        sim.run().unwrap();

        assert_eq!(
            sim.component::<Counter>(state).unwrap().power_commands(),
            &[(ns(30), PowerCommand::SetState(PowerState::Off))]
        );
        assert_eq!(
            sim.component::<Counter>(supply).unwrap().power_commands(),
            &[(ns(10), PowerCommand::SetTemperature(85.0))]
        );
        assert_eq!(sim.component::<PowerSequencer>(seq).unwrap().sent(), 2);
    }
}
