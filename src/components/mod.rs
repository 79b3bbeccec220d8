//! Built-in component models.
//!
//! These are the collaborators a small board needs around the engine:
//! memories, a boot loader, a fetch-only core stand-in, a power control
//! driver and hierarchy containers. They are usable directly or as
//! references for implementing custom components.
//!
//! # Available Components
//!
//! - [`Memory`] - Bounds-checked RAM with power events and capture triggers
//! - [`ImageLoader`] - Writes an image through the interconnect and boots a core
//! - [`FetchCore`] - Fetches one word per clock edge once enabled
//! - [`PowerSequencer`] - Replays a timed script of power commands
//! - [`Group`] - Port-less hierarchy container
//!
//! ## Test helpers (mock)
//! - [`Counter`] - Records clock edges, wire values and power commands
//! - [`Pulse`] - Emits a wire value periodically

pub mod core;
pub mod group;
pub mod loader;
pub mod memory;
pub mod mock;
pub mod power_ctrl;

pub use self::core::FetchCore;
pub use group::Group;
pub use loader::{ImageLoader, Segment};
pub use memory::Memory;
pub use mock::{Counter, Pulse};
pub use power_ctrl::PowerSequencer;
