//! Core type definitions for the simulation framework.
//!
//! This module defines the fundamental types used throughout the simulation engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time in picoseconds.
///
/// All events, clock edges and port latencies use the same `SimTime`
/// representation, so every component shares one timeline.
pub type SimTime = u64;

/// Picoseconds per nanosecond.
pub const PS_PER_NS: SimTime = 1_000;
/// Picoseconds per microsecond.
pub const PS_PER_US: SimTime = 1_000_000;
/// Picoseconds per millisecond.
pub const PS_PER_MS: SimTime = 1_000_000_000;
/// Picoseconds per second.
pub const PS_PER_S: SimTime = 1_000_000_000_000;

/// Converts nanoseconds to `SimTime`.
#[inline]
pub const fn ns(value: u64) -> SimTime {
    value * PS_PER_NS
}

/// Converts microseconds to `SimTime`.
#[inline]
pub const fn us(value: u64) -> SimTime {
    value * PS_PER_US
}

/// Converts milliseconds to `SimTime`.
#[inline]
pub const fn ms(value: u64) -> SimTime {
    value * PS_PER_MS
}

/// Dispatch priority among events sharing a timestamp. Lower runs first.
pub type Priority = u8;

/// Priority used for clock edges, so an edge precedes work scheduled for the same instant.
pub const PRIORITY_CLOCK: Priority = 0;

/// Default priority for timers and deferred port deliveries.
pub const PRIORITY_NORMAL: Priority = 128;

/// Stable handle of a component inside the simulator arena.
///
/// Handles are dense indices assigned in creation order and never reused
/// during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Creates a handle from an arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the arena index of this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a scheduled event, unique for the lifetime of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub(crate) u64);

impl EventId {
    /// Returns the raw sequence number.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_helpers() {
        assert_eq!(ns(10), 10_000);
        assert_eq!(us(1), 1_000_000);
        assert_eq!(ms(2), 2 * PS_PER_MS);
        assert_eq!(PS_PER_S / PS_PER_US, 1_000_000);
    }

    #[test]
    fn test_component_id() {
        let id = ComponentId::from_index(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "#42");
        assert!(ComponentId::from_index(1) < ComponentId::from_index(2));
    }

    #[test]
    fn test_priority_order() {
        assert!(PRIORITY_CLOCK < PRIORITY_NORMAL);
    }
}
