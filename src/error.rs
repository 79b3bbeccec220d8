//! Error taxonomy for graph construction and simulation.
//!
//! Errors fall into four families. Configuration errors abort graph
//! construction, routing errors are turned into fault responses by the
//! router, scheduling errors are fatal to a run, and model-data errors only
//! cost a power sample.

use thiserror::Error;

use crate::config::ConfigError;
use crate::port::PortKind;
use crate::types::{EventId, SimTime};

/// Broad class of a [`SimError`], used to decide whether a run can continue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected while building the graph; construction is aborted.
    Configuration,
    /// Address decoding failed; surfaced to the initiator as a fault.
    Routing,
    /// Inconsistent event order; the run cannot continue.
    Scheduling,
    /// Missing power data; the sample is skipped.
    ModelData,
    /// Misuse of the port interface from inside a handler.
    Runtime,
}

/// All errors produced by the engine.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("component '{path}' already exists")]
    DuplicateComponent { path: String },

    #[error("invalid component name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("unknown component '{name}'")]
    UnknownComponent { name: String },

    #[error("unknown component type '{type_name}'")]
    UnknownComponentType { type_name: String },

    #[error("invalid attribute '{key}' on '{component}': {reason}")]
    InvalidAttribute {
        component: String,
        key: String,
        reason: String,
    },

    #[error("port '{port}' already declared on '{component}'")]
    DuplicatePort { component: String, port: String },

    #[error("component '{component}' has no port '{port}'")]
    UnknownPort { component: String, port: String },

    #[error("cannot bind {output} ({output_kind}) to {input} ({input_kind})")]
    TypeMismatch {
        output: String,
        input: String,
        output_kind: PortKind,
        input_kind: PortKind,
    },

    #[error("input {input} is already driven by {existing}")]
    AlreadyBound { input: String, existing: String },

    #[error("mapping '{name}' [{base:#x}, +{size:#x}) on '{router}' overlaps '{existing}'")]
    Overlap {
        router: String,
        name: String,
        base: u64,
        size: u64,
        existing: String,
    },

    #[error("invalid mapping '{name}' on '{router}': {reason}")]
    InvalidMapping {
        router: String,
        name: String,
        reason: String,
    },

    #[error("'{router}' maps {target} with conflicting rm_base settings")]
    InconsistentRebase { router: String, target: String },

    #[error("routing cycle: {}", path.join(" -> "))]
    RoutingCycle { path: Vec<String> },

    #[error("component '{component}' is not a router")]
    NotARouter { component: String },

    #[error("invalid clock frequency {frequency} Hz")]
    InvalidFrequency { frequency: f64 },

    #[error("invalid power table: {reason}")]
    InvalidPowerTable { reason: String },

    #[error("invalid power script entry '{entry}': {reason}")]
    InvalidPowerScript { entry: String, reason: String },

    #[error("power model already attached to '{component}'")]
    PowerAlreadyAttached { component: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unmapped address {addr:#x}")]
    UnmappedAddress { addr: u64 },

    #[error("cannot schedule at {requested} ps, simulation time is already {now} ps")]
    PastDeadline { requested: SimTime, now: SimTime },

    #[error("{id} is not pending")]
    UnknownEvent { id: EventId },

    #[error("{id} was scheduled by '{owner}', not '{requester}'")]
    NotEventOwner {
        id: EventId,
        owner: String,
        requester: String,
    },

    #[error("no cost data for '{operation}': {reason}")]
    NoCostData { operation: String, reason: String },

    #[error("output '{port}' of '{component}' is not bound")]
    Unbound { component: String, port: String },

    #[error("request port '{port}' of '{component}' has {count} bindings, expected one")]
    MultipleTargets {
        component: String,
        port: String,
        count: usize,
    },

    #[error("port '{port}' expects {expected} payloads, got {found}")]
    PayloadKind {
        port: String,
        expected: PortKind,
        found: PortKind,
    },

    #[error("component '{component}' re-entered during its own dispatch")]
    Reentrant { component: String },

    #[error("loader fault while writing {addr:#x}")]
    LoadFailed { addr: u64 },

    #[error("simulation was aborted by an earlier error")]
    Aborted,

    #[error("simulation already finished")]
    Finished,
}

impl SimError {
    /// Returns the family this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SimError::UnmappedAddress { .. } => ErrorCategory::Routing,
            SimError::PastDeadline { .. }
            | SimError::UnknownEvent { .. }
            | SimError::NotEventOwner { .. } => ErrorCategory::Scheduling,
            SimError::NoCostData { .. } => ErrorCategory::ModelData,
            SimError::Unbound { .. }
            | SimError::MultipleTargets { .. }
            | SimError::PayloadKind { .. }
            | SimError::Reentrant { .. }
            | SimError::LoadFailed { .. }
            | SimError::Aborted
            | SimError::Finished => ErrorCategory::Runtime,
            _ => ErrorCategory::Configuration,
        }
    }

    /// Returns true if the simulation may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Routing | ErrorCategory::ModelData
        )
    }
}

/// Result type used throughout the engine.
pub type SimResult<T> = Result<T, SimError>;
