//! Clock domain component.
//!
//! A `ClockDomain` emits a rising edge on its `clock` output every period.
//! Edges are ordinary timer events with `PRIORITY_CLOCK`, so an edge is
//! dispatched before any other work scheduled for the same instant and
//! shares the one global timeline with everything else.

use serde::Serialize;
use tracing::{debug, info};

use crate::component::{Component, Ctx};
use crate::error::{SimError, SimResult};
use crate::event::{ClockEdge, Message};
use crate::port::{PortDesc, PortKind};
use crate::types::{EventId, SimTime, PRIORITY_CLOCK, PS_PER_S};

/// Name of the edge output port.
pub const CLOCK_OUTPUT: &str = "clock";

const EDGE_TIMER: u64 = 0;

/// Converts a frequency in Hz to a period in picoseconds, rounded to the
/// nearest picosecond.
///
/// # Errors
/// `InvalidFrequency` for non-finite or non-positive frequencies, and for
/// frequencies above 2 THz whose period rounds to zero.
pub fn period_from_frequency(frequency: f64) -> SimResult<SimTime> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(SimError::InvalidFrequency { frequency });
    }
    let period = (PS_PER_S as f64 / frequency).round();
    if period < 1.0 || period > SimTime::MAX as f64 {
        return Err(SimError::InvalidFrequency { frequency });
    }
    Ok(period as SimTime)
}

/// Whether the domain is producing edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    #[default]
    Stopped,
    Running,
}

/// Periodic clock source.
#[derive(Debug)]
pub struct ClockDomain {
    frequency: f64,
    period: SimTime,
    state: ClockState,
    cycles: u64,
    pending: Option<EventId>,
}

impl ClockDomain {
    /// Creates a domain running at `frequency` Hz.
    ///
    /// # Errors
    /// `InvalidFrequency`, see [`period_from_frequency`].
    pub fn new(frequency: f64) -> SimResult<Self> {
        let period = period_from_frequency(frequency)?;
        Ok(Self {
            frequency,
            period,
            state: ClockState::Stopped,
            cycles: 0,
            pending: None,
        })
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Period in picoseconds.
    pub fn period(&self) -> SimTime {
        self.period
    }

    /// Number of edges emitted so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    fn arm(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let at = ctx.now().saturating_add(self.period);
        self.pending = Some(ctx.schedule_at(at, EDGE_TIMER, PRIORITY_CLOCK)?);
        Ok(())
    }
}

impl Component for ClockDomain {
    fn type_name(&self) -> &'static str {
        "clock"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![PortDesc::output(CLOCK_OUTPUT, PortKind::Clock)]
    }

    fn start(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        info!(
            clock = ctx.path(),
            frequency = self.frequency,
            period_ps = self.period,
            "clock domain started"
        );
        self.state = ClockState::Running;
        self.arm(ctx)
    }

    fn on_timer(&mut self, _tag: u64, ctx: &mut Ctx<'_>) -> SimResult<()> {
        self.pending = None;
        if self.state != ClockState::Running {
            return Ok(());
        }

        self.cycles += 1;
        let edge = ClockEdge {
            cycle: self.cycles,
            period: self.period,
        };
        ctx.send(CLOCK_OUTPUT, Message::Clock(edge))?;
        self.arm(ctx)
    }

    fn finish(&mut self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        if let Some(id) = self.pending.take() {
            ctx.cancel(id)?;
        }
        self.state = ClockState::Stopped;
        debug!(clock = ctx.path(), cycles = self.cycles, "clock domain stopped");
        Ok(())
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "frequency_hz": self.frequency,
            "period_ps": self.period,
            "cycles": self.cycles,
            "state": self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_rounding() {
        assert_eq!(period_from_frequency(100e6).unwrap(), 10_000);
        assert_eq!(period_from_frequency(1e9).unwrap(), 1_000);
        // 3 GHz -> 333.33 ps
        assert_eq!(period_from_frequency(3e9).unwrap(), 333);
        // 1.5 THz -> 0.67 ps rounds to 1
        assert_eq!(period_from_frequency(1.5e12).unwrap(), 1);
    }

    #[test]
    fn test_invalid_frequencies() {
        for f in [0.0, -1.0, f64::NAN, f64::INFINITY, 3e12] {
            assert!(
                matches!(
                    period_from_frequency(f),
                    Err(SimError::InvalidFrequency { .. })
                ),
                "{f} should be rejected"
            );
        }
        assert!(ClockDomain::new(0.0).is_err());
    }

    #[test]
    fn test_new_domain_is_stopped() {
        let clock = ClockDomain::new(50e6).unwrap();
        assert_eq!(clock.period(), 20_000);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.cycles(), 0);
    }
}
