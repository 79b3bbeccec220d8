//! Event and payload definitions for the simulation framework.
//!
//! Events are the only way simulated time passes: timers a component sets
//! for itself and port deliveries that travel through a non-zero latency
//! binding both become [`Event`]s owned by the queue until dispatch.

use serde::{Deserialize, Serialize};

use crate::port::PortKind;
use crate::types::{ComponentId, EventId, Priority, SimTime};

/// Direction of a memory transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    /// Returns the prefix used for power operation names (`read_32`, `write_8`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        }
    }
}

/// A memory-mapped access travelling through `Memory` ports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemRequest {
    /// Target address, global or local depending on the routers crossed.
    pub addr: u64,
    /// Access size in bytes.
    pub size: u32,
    /// Read or write.
    pub kind: AccessKind,
    /// Write payload; empty for reads.
    pub data: Vec<u8>,
}

impl MemRequest {
    /// Creates a read of `size` bytes at `addr`.
    pub fn read(addr: u64, size: u32) -> Self {
        Self {
            addr,
            size,
            kind: AccessKind::Read,
            data: Vec::new(),
        }
    }

    /// Creates a write of `data` at `addr`.
    pub fn write(addr: u64, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            addr,
            size: data.len() as u32,
            kind: AccessKind::Write,
            data,
        }
    }

    /// Creates a little-endian 32-bit write.
    pub fn write_u32(addr: u64, value: u32) -> Self {
        Self::write(addr, value.to_le_bytes())
    }

    /// Returns the power operation name for this access, e.g. `read_32`.
    pub fn operation(&self) -> String {
        format!("{}_{}", self.kind.as_str(), u64::from(self.size) * 8)
    }
}

/// Completion of a [`MemRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemResponse {
    /// Read data; empty for writes.
    pub data: Vec<u8>,
    /// Set when the access could not be served.
    pub fault: bool,
    /// Latency accumulated along the path, in picoseconds.
    pub latency: SimTime,
}

impl MemResponse {
    /// A successful read carrying `data`.
    pub fn data(data: Vec<u8>) -> Self {
        Self {
            data,
            fault: false,
            latency: 0,
        }
    }

    /// A successful write acknowledgement.
    pub fn ack() -> Self {
        Self::default()
    }

    /// A failed access.
    pub fn fault() -> Self {
        Self {
            fault: true,
            ..Self::default()
        }
    }

    /// Adds `latency` to the accumulated latency.
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency += latency;
        self
    }

    /// Interprets the first four data bytes as a little-endian word.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// A rising clock edge as seen by a bound component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockEdge {
    /// Cycle number, starting at 1 for the first edge.
    pub cycle: u64,
    /// Clock period in picoseconds.
    pub period: SimTime,
}

/// Power state of a component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    On,
    Off,
}

/// Command carried on power control ports (`o_POWER_CTRL`-style wiring).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PowerCommand {
    /// Switches the component on or off.
    SetState(PowerState),
    /// Changes the supply voltage, in volts.
    SetVoltage(f64),
    /// Changes the temperature, in degrees Celsius.
    SetTemperature(f64),
}

/// Payload sent through a port binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// A memory transaction.
    Request(MemRequest),
    /// A signal level or value (start, entry address, interrupt lines).
    Wire(u64),
    /// A clock edge.
    Clock(ClockEdge),
    /// A power control command.
    Power(PowerCommand),
}

impl Message {
    /// Returns the port kind able to carry this message.
    pub fn kind(&self) -> PortKind {
        match self {
            Message::Request(_) => PortKind::Memory,
            Message::Wire(_) => PortKind::Wire,
            Message::Clock(_) => PortKind::Clock,
            Message::Power(_) => PortKind::Power,
        }
    }
}

/// What happens when an event fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A timer the target set for itself; `tag` is opaque to the engine.
    Timer { tag: u64 },
    /// A message that crossed a latency binding into input port `port`.
    Deliver { port: usize, message: Message },
}

/// A time-stamped unit of work owned by the event queue until it fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier returned by `schedule`, used for cancellation.
    pub id: EventId,
    /// Simulation time at which the event fires.
    pub time: SimTime,
    /// Tie-breaker among events with the same time; lower first.
    pub priority: Priority,
    /// Component that scheduled the event and may cancel it.
    pub source: ComponentId,
    /// Component whose handler receives the payload.
    pub target: ComponentId,
    /// The event payload.
    pub payload: EventPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_helpers() {
        let req = MemRequest::read(0x500, 4);
        assert_eq!(req.kind, AccessKind::Read);
        assert_eq!(req.operation(), "read_32");

        let req = MemRequest::write_u32(0x10, 0xdead_beef);
        assert_eq!(req.size, 4);
        assert_eq!(req.data, vec![0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(req.operation(), "write_32");

        let req = MemRequest::write(0, vec![1u8]);
        assert_eq!(req.operation(), "write_8");
    }

    #[test]
    fn test_operation_name_for_large_accesses() {
        assert_eq!(MemRequest::read(0, 0x2000_0000).operation(), "read_4294967296");
        assert_eq!(MemRequest::read(0, u32::MAX).operation(), "read_34359738360");
    }

    #[test]
    fn test_response_helpers() {
        let resp = MemResponse::data(vec![0x78, 0x56, 0x34, 0x12]).with_latency(5);
        assert_eq!(resp.as_u32(), Some(0x1234_5678));
        assert_eq!(resp.latency, 5);
        assert!(!resp.fault);

        assert!(MemResponse::fault().fault);
        assert_eq!(MemResponse::ack().as_u32(), None);
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::Wire(1).kind(), PortKind::Wire);
        assert_eq!(
            Message::Request(MemRequest::read(0, 4)).kind(),
            PortKind::Memory
        );
        assert_eq!(
            Message::Clock(ClockEdge { cycle: 1, period: 10 }).kind(),
            PortKind::Clock
        );
        assert_eq!(
            Message::Power(PowerCommand::SetVoltage(0.8)).kind(),
            PortKind::Power
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = Event {
            id: EventId(7),
            time: 100,
            priority: 128,
            source: ComponentId::from_index(1),
            target: ComponentId::from_index(2),
            payload: EventPayload::Deliver {
                port: 0,
                message: Message::Wire(42),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }
}
