//! # socweave
//!
//! A discrete-event engine for assembling and running virtual SoCs out of
//! reusable component models.
//!
//! ## Design Principles
//!
//! - **Component Graph**: A board is a hierarchy of components (core,
//!   interconnect, memories, loader, clock domains) connected port to port.
//!   Bindings are the only path between components.
//! - **Single Timeline**: Time only advances through a global event queue
//!   ordered by `(time, priority, sequence)`, in picoseconds. Runs are
//!   deterministic.
//! - **Memory-Mapped Routing**: Routers forward transactions through an
//!   address map, optionally rebasing them to target-local offsets.
//! - **Power Accounting**: Components carry power tables indexed by
//!   temperature, voltage and load; the engine integrates energy per
//!   operation and per clock cycle.
//!
//! ## Quick Start
//!
//! ```rust
//! use socweave::components::{Counter, Memory};
//! use socweave::event::MemRequest;
//! use socweave::{ns, ClockDomain, GraphBuilder, Router};
//!
//! let mut graph = GraphBuilder::new();
//! let clock = graph.add_component(None, "clock", ClockDomain::new(100e6).unwrap()).unwrap();
//! let ico = graph.add_component(None, "ico", Router::new()).unwrap();
//! let mem = graph.add_component(None, "mem", Memory::new(0x1000)).unwrap();
//! let ticks = graph.add_component(None, "ticks", Counter::new()).unwrap();
//!
//! let target = graph.input(mem, "input").unwrap();
//! graph.map(ico, "mem", target, 0x8000_0000, 0x1000, true).unwrap();
//! graph.bind_clock(clock, ticks).unwrap();
//! let ico_input = graph.input(ico, "input").unwrap();
//!
//! let mut sim = graph.build();
//! let resp = sim.debug_request(ico_input, MemRequest::write_u32(0x8000_0010, 7)).unwrap();
//! assert!(!resp.fault);
//!
//! sim.run_until(ns(100)).unwrap();
//! assert_eq!(sim.component::<Counter>(ticks).unwrap().edges(), 10);
//!
//! let stats = sim.export_stats();
//! println!("Final time: {}", stats["engine"]["current_time"]);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use socweave::{assemble, create_default_registry, BoardConfig};
//!
//! let config = BoardConfig::from_file("board.yaml")?;
//! let mut sim = assemble(&config, &create_default_registry())?;
//! sim.run_until(config.simulation.max_time)?;
//! ```

pub mod types;
pub mod error;
pub mod event;
pub mod queue;
pub mod port;
pub mod component;
pub mod graph;
pub mod router;
pub mod power;
pub mod clock;
pub mod engine;
pub mod config;
pub mod registry;
pub mod stats;
pub mod components;

// Re-export commonly used types
pub use types::{ms, ns, us, ComponentId, EventId, Priority, SimTime, PRIORITY_CLOCK, PRIORITY_NORMAL};
pub use error::{ErrorCategory, SimError, SimResult};
pub use event::{MemRequest, MemResponse, Message, PowerCommand, PowerState};
pub use port::{InputRef, OutputRef, PortDesc, PortDirection, PortKind};
pub use component::{Component, Ctx};
pub use graph::GraphBuilder;
pub use router::{Router, RouterConfig};
pub use power::{OperatingPoint, PowerModel, PowerReport, PowerTable};
pub use clock::ClockDomain;
pub use engine::{EngineStats, RunOutcome, SimPhase, Simulator};
pub use config::{BoardConfig, BoardConfigBuilder, ConfigError};
pub use registry::{assemble, create_default_registry, ComponentRegistry};
pub use stats::{SimulationStats, Timer};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// socweave::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
