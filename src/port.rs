//! Port declarations and the binding registry.
//!
//! Ports are typed, directional endpoints owned by exactly one component.
//! An output may fan out to any number of inputs; an input is driven by at
//! most one output. Output ports carry a latency that decides whether a
//! `send` is delivered inline or through the event queue.
//!
//! # Example
//!
//! ```
//! use socweave::port::{PortDesc, PortKind};
//!
//! let port = PortDesc::output("o_data", PortKind::Memory).with_latency(2_000);
//! assert_eq!(port.latency, 2_000);
//! assert!(port.is_output());
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::types::{ComponentId, SimTime};

/// Direction of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// Payload kind a port carries. Bound ports must agree on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Memory transactions (requests with synchronous responses)
    Memory,
    /// Signal levels and values
    Wire,
    /// Clock edges
    Clock,
    /// Power and voltage control commands
    Power,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortKind::Memory => "memory",
            PortKind::Wire => "wire",
            PortKind::Clock => "clock",
            PortKind::Power => "power",
        };
        f.write_str(name)
    }
}

/// Static description of a port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDesc {
    /// Name, unique among ports of the same direction on a component
    pub name: String,
    /// Input or output
    pub direction: PortDirection,
    /// Payload kind
    pub kind: PortKind,
    /// Delivery latency for outputs (0 = inline)
    #[serde(default)]
    pub latency: SimTime,
}

impl PortDesc {
    /// Describes an input port.
    pub fn input(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            kind,
            latency: 0,
        }
    }

    /// Describes a zero-latency output port.
    pub fn output(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            kind,
            latency: 0,
        }
    }

    /// Sets the delivery latency of an output port.
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    /// Returns true for output ports.
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

/// Handle of an input port: component plus index into its input table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputRef {
    pub component: ComponentId,
    pub index: usize,
}

/// Handle of an output port: component plus index into its output table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub component: ComponentId,
    pub index: usize,
}

/// Ordered input and output port tables of one component.
#[derive(Clone, Debug, Default)]
pub struct PortTable {
    inputs: Vec<PortDesc>,
    outputs: Vec<PortDesc>,
}

impl PortTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a port, returning its index within its direction.
    ///
    /// `owner` only feeds the diagnostic.
    ///
    /// # Errors
    /// `DuplicatePort` if a port of the same direction has the same name.
    pub fn declare(&mut self, owner: &str, desc: PortDesc) -> SimResult<usize> {
        let side = match desc.direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if side.iter().any(|p| p.name == desc.name) {
            return Err(SimError::DuplicatePort {
                component: owner.to_string(),
                port: desc.name,
            });
        }
        side.push(desc);
        Ok(side.len() - 1)
    }

    /// Looks up an input port index by name.
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Looks up an output port index by name.
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Returns the input port at `index`.
    pub fn input(&self, index: usize) -> Option<&PortDesc> {
        self.inputs.get(index)
    }

    /// Returns the output port at `index`.
    pub fn output(&self, index: usize) -> Option<&PortDesc> {
        self.outputs.get(index)
    }

    /// All input ports in declaration order.
    pub fn inputs(&self) -> &[PortDesc] {
        &self.inputs
    }

    /// All output ports in declaration order.
    pub fn outputs(&self) -> &[PortDesc] {
        &self.outputs
    }
}

/// Registry of output → input bindings.
///
/// Fan-out order is bind order, which keeps delivery deterministic.
#[derive(Clone, Debug, Default)]
pub struct BindingTable {
    fanout: HashMap<OutputRef, Vec<InputRef>>,
    driver: HashMap<InputRef, OutputRef>,
}

impl BindingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a binding after checking kinds and the single-driver rule.
    ///
    /// `out_desc` / `in_desc` are the declarations of both ends and
    /// `out_name` / `in_name` their printable paths.
    ///
    /// # Errors
    /// `TypeMismatch` if the kinds differ; `AlreadyBound` if the input is
    /// already driven.
    pub fn bind(
        &mut self,
        output: OutputRef,
        out_desc: &PortDesc,
        out_name: &str,
        input: InputRef,
        in_desc: &PortDesc,
        in_name: &str,
    ) -> SimResult<()> {
        if out_desc.kind != in_desc.kind {
            return Err(SimError::TypeMismatch {
                output: out_name.to_string(),
                input: in_name.to_string(),
                output_kind: out_desc.kind,
                input_kind: in_desc.kind,
            });
        }
        if let Some(existing) = self.driver.get(&input) {
            return Err(SimError::AlreadyBound {
                input: in_name.to_string(),
                existing: format!("{}.out[{}]", existing.component, existing.index),
            });
        }

        self.driver.insert(input, output);
        self.fanout.entry(output).or_default().push(input);
        Ok(())
    }

    /// Inputs bound to `output`, in bind order.
    pub fn targets(&self, output: OutputRef) -> &[InputRef] {
        self.fanout.get(&output).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The output driving `input`, if any.
    pub fn driver(&self, input: InputRef) -> Option<OutputRef> {
        self.driver.get(&input).copied()
    }

    /// Total number of bindings.
    pub fn len(&self) -> usize {
        self.driver.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.driver.is_empty()
    }
}
