//! Graph construction.
//!
//! `GraphBuilder` is the only way to create components, bind ports and
//! program routers. `build()` hands the finished graph to a [`Simulator`];
//! from then on the topology is fixed.
//!
//! # Example
//!
//! ```
//! use socweave::components::memory::Memory;
//! use socweave::graph::GraphBuilder;
//! use socweave::router::Router;
//!
//! let mut graph = GraphBuilder::new();
//! let soc = graph.add_component(None, "soc", socweave::components::group::Group::new()).unwrap();
//! let ico = graph.add_component(Some(soc), "ico", Router::new()).unwrap();
//! let mem = graph.add_component(Some(soc), "mem", Memory::new(0x1000)).unwrap();
//!
//! let mem_in = graph.input(mem, "input").unwrap();
//! graph.map(ico, "mem", mem_in, 0x8000_0000, 0x1000, true).unwrap();
//!
//! let sim = graph.build();
//! assert_eq!(sim.find("soc/mem"), Some(mem));
//! ```

use std::collections::HashMap;

use tracing::{debug, info};

use crate::component::Component;
use crate::engine::{ComponentCounters, ComponentInfo, ComponentSlot, Simulator};
use crate::error::{SimError, SimResult};
use crate::port::{InputRef, OutputRef, PortDesc, PortKind, PortTable};
use crate::power::{PowerModel, PowerTable};
use crate::router::{RouteTarget, Router};
use crate::types::{ComponentId, SimTime};
use crate::clock::CLOCK_OUTPUT;

/// Name of the clock input every clocked component declares.
pub const CLOCK_INPUT: &str = "clock";

fn validate_name(name: &str) -> SimResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') {
        Some("'/' separates path segments")
    } else if name.contains('.') {
        Some("'.' separates component and port")
    } else if name.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SimError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Builder for a hardware graph.
pub struct GraphBuilder {
    sim: Simulator,
    /// Router → mapped components, for cycle detection
    route_edges: HashMap<ComponentId, Vec<ComponentId>>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            sim: Simulator::new(),
            route_edges: HashMap::new(),
        }
    }

    /// Number of components added so far.
    pub fn component_count(&self) -> usize {
        self.sim.slots.len()
    }

    /// Looks a component up by its full path.
    pub fn find(&self, path: &str) -> Option<ComponentId> {
        self.sim.find(path)
    }

    /// Full path of `id`.
    pub fn path_of(&self, id: ComponentId) -> &str {
        self.sim.path_of(id)
    }

    /// Port table of `id`.
    pub fn ports(&self, id: ComponentId) -> Option<&PortTable> {
        self.sim.ports(id)
    }

    // ========================================================================
    // Components and ports
    // ========================================================================

    /// Adds a component under `parent` (or as a root) and declares its ports.
    ///
    /// # Errors
    /// `InvalidName`, `UnknownComponent` for a bad parent,
    /// `DuplicateComponent` if the path is taken, `DuplicatePort` if the
    /// component's own port table repeats a name.
    pub fn add_component<C: Component + 'static>(
        &mut self,
        parent: Option<ComponentId>,
        name: &str,
        component: C,
    ) -> SimResult<ComponentId> {
        self.add_boxed(parent, name, Box::new(component))
    }

    /// Type-erased variant of [`add_component`](Self::add_component).
    pub fn add_boxed(
        &mut self,
        parent: Option<ComponentId>,
        name: &str,
        component: Box<dyn Component>,
    ) -> SimResult<ComponentId> {
        validate_name(name)?;
        let path = match parent {
            Some(p) => {
                let slot = self.slot(p)?;
                format!("{}/{}", slot.info.path, name)
            }
            None => name.to_string(),
        };
        if self.sim.paths.contains_key(&path) {
            return Err(SimError::DuplicateComponent { path });
        }

        let mut ports = PortTable::new();
        for desc in component.ports() {
            ports.declare(&path, desc)?;
        }

        let id = ComponentId::from_index(self.sim.slots.len());
        debug!(component = %path, kind = component.type_name(), %id, "component added");
        self.sim.slots.push(ComponentSlot {
            info: ComponentInfo {
                name: name.to_string(),
                path: path.clone(),
                type_name: component.type_name(),
                parent,
                children: Vec::new(),
                ports,
            },
            component: Some(component),
            power: None,
            counters: ComponentCounters::default(),
        });
        self.sim.paths.insert(path, id);
        if let Some(p) = parent {
            self.sim.slots[p.index()].info.children.push(id);
        }
        Ok(id)
    }

    fn slot(&self, id: ComponentId) -> SimResult<&ComponentSlot> {
        self.sim
            .slots
            .get(id.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: id.to_string(),
            })
    }

    fn slot_mut(&mut self, id: ComponentId) -> SimResult<&mut ComponentSlot> {
        self.sim
            .slots
            .get_mut(id.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: id.to_string(),
            })
    }

    fn declare(&mut self, component: ComponentId, desc: PortDesc) -> SimResult<usize> {
        validate_name(&desc.name)?;
        let slot = self.slot_mut(component)?;
        slot.info.ports.declare(&slot.info.path, desc)
    }

    /// Declares an extra input port on `component`.
    pub fn declare_input_port(
        &mut self,
        component: ComponentId,
        name: &str,
        kind: PortKind,
    ) -> SimResult<InputRef> {
        let index = self.declare(component, PortDesc::input(name, kind))?;
        Ok(InputRef { component, index })
    }

    /// Declares an extra zero-latency output port on `component`.
    pub fn declare_output_port(
        &mut self,
        component: ComponentId,
        name: &str,
        kind: PortKind,
    ) -> SimResult<OutputRef> {
        self.declare_output_port_with_latency(component, name, kind, 0)
    }

    /// Declares an extra output port with a delivery latency.
    pub fn declare_output_port_with_latency(
        &mut self,
        component: ComponentId,
        name: &str,
        kind: PortKind,
        latency: SimTime,
    ) -> SimResult<OutputRef> {
        let desc = PortDesc::output(name, kind).with_latency(latency);
        let index = self.declare(component, desc)?;
        Ok(OutputRef { component, index })
    }

    /// Looks up input port `name` of `component`.
    pub fn input(&self, component: ComponentId, name: &str) -> SimResult<InputRef> {
        let slot = self.slot(component)?;
        let index = slot
            .info
            .ports
            .find_input(name)
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: name.to_string(),
            })?;
        Ok(InputRef { component, index })
    }

    /// Looks up output port `name` of `component`.
    pub fn output(&self, component: ComponentId, name: &str) -> SimResult<OutputRef> {
        let slot = self.slot(component)?;
        let index = slot
            .info
            .ports
            .find_output(name)
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: name.to_string(),
            })?;
        Ok(OutputRef { component, index })
    }

    fn input_desc(&self, input: InputRef) -> SimResult<(PortDesc, String)> {
        let slot = self.slot(input.component)?;
        let desc = slot
            .info
            .ports
            .input(input.index)
            .cloned()
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: format!("in[{}]", input.index),
            })?;
        let name = format!("{}.{}", slot.info.path, desc.name);
        Ok((desc, name))
    }

    fn output_desc(&self, output: OutputRef) -> SimResult<(PortDesc, String)> {
        let slot = self.slot(output.component)?;
        let desc = slot
            .info
            .ports
            .output(output.index)
            .cloned()
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: format!("out[{}]", output.index),
            })?;
        let name = format!("{}.{}", slot.info.path, desc.name);
        Ok((desc, name))
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Binds `output` to `input`.
    ///
    /// # Errors
    /// `TypeMismatch` if the kinds differ, `AlreadyBound` if `input` already
    /// has a driver.
    pub fn bind(&mut self, output: OutputRef, input: InputRef) -> SimResult<()> {
        let (out_desc, out_name) = self.output_desc(output)?;
        let (in_desc, in_name) = self.input_desc(input)?;
        self.sim
            .bindings
            .bind(output, &out_desc, &out_name, input, &in_desc, &in_name)?;
        debug!(from = %out_name, to = %in_name, "bound");
        Ok(())
    }

    /// Binds ports by name.
    pub fn connect(
        &mut self,
        from: ComponentId,
        output: &str,
        to: ComponentId,
        input: &str,
    ) -> SimResult<()> {
        let output = self.output(from, output)?;
        let input = self.input(to, input)?;
        self.bind(output, input)
    }

    /// Binds the edge output of clock `domain` to the `clock` input of `component`.
    pub fn bind_clock(&mut self, domain: ComponentId, component: ComponentId) -> SimResult<()> {
        self.connect(domain, CLOCK_OUTPUT, component, CLOCK_INPUT)
    }

    // ========================================================================
    // Router programming
    // ========================================================================

    fn router_mut(&mut self, id: ComponentId) -> SimResult<&mut Router> {
        let slot = self.slot_mut(id)?;
        let path = &slot.info.path;
        match slot.component.as_deref_mut().and_then(|c| c.as_router_mut()) {
            Some(router) => Ok(router),
            None => Err(SimError::NotARouter {
                component: path.clone(),
            }),
        }
    }

    /// Finds a chain of route edges from `from` to `to`, both included.
    fn route_path(&self, from: ComponentId, to: ComponentId) -> Option<Vec<ComponentId>> {
        let mut stack = vec![vec![from]];
        let mut seen = vec![from];
        while let Some(chain) = stack.pop() {
            let last = *chain.last()?;
            if last == to {
                return Some(chain);
            }
            for next in self.route_edges.get(&last).into_iter().flatten() {
                if !seen.contains(next) {
                    seen.push(*next);
                    let mut longer = chain.clone();
                    longer.push(*next);
                    stack.push(longer);
                }
            }
        }
        None
    }

    /// Maps `[base, base + size)` of `router` to `target`.
    ///
    /// The first mapping towards a given input creates a router output port
    /// named `name` and binds it; further mappings towards the same input
    /// reuse that port. Nothing is modified unless every check passes.
    ///
    /// # Errors
    /// - `NotARouter` if `router` is not a router
    /// - `TypeMismatch` if `target` is not a memory port
    /// - `DuplicatePort` if `name` is already a router output
    /// - `AlreadyBound` if `target` is driven by another output
    /// - `InvalidMapping` / `Overlap` for a bad range
    /// - `InconsistentRebase` if `rm_base` disagrees with an earlier mapping
    ///   to `target` and the router does not allow it
    /// - `RoutingCycle` if the mapping closes a loop between routers
    pub fn map(
        &mut self,
        router: ComponentId,
        name: &str,
        target: InputRef,
        base: u64,
        size: u64,
        rm_base: bool,
    ) -> SimResult<()> {
        validate_name(name)?;
        let router_path = self.slot(router)?.info.path.clone();
        let (in_desc, in_name) = self.input_desc(target)?;

        // Checks that only need the router.
        let reuse = {
            let r = self.router_mut(router)?;
            r.address_map().check(&router_path, name, base, size)?;

            let allow_mixed = r.config().allow_mixed_rebase;
            let mut reuse = None;
            for entry in r.address_map().entries() {
                if entry.target.input != target {
                    continue;
                }
                if entry.rm_base != rm_base && !allow_mixed {
                    return Err(SimError::InconsistentRebase {
                        router: router_path,
                        target: in_name,
                    });
                }
                reuse = Some(entry.target.output);
            }
            reuse
        };

        if in_desc.kind != PortKind::Memory {
            return Err(SimError::TypeMismatch {
                output: format!("{router_path}.{name}"),
                input: in_name,
                output_kind: PortKind::Memory,
                input_kind: in_desc.kind,
            });
        }
        if reuse.is_none() {
            if self.slot(router)?.info.ports.find_output(name).is_some() {
                return Err(SimError::DuplicatePort {
                    component: router_path,
                    port: name.to_string(),
                });
            }
            if let Some(existing) = self.sim.bindings.driver(target) {
                let (_, existing) = self.output_desc(existing)?;
                return Err(SimError::AlreadyBound {
                    input: in_name,
                    existing,
                });
            }
        }

        if let Some(chain) = self.route_path(target.component, router) {
            let mut path: Vec<String> = std::iter::once(router)
                .chain(chain)
                .map(|id| self.sim.path_of(id).to_string())
                .collect();
            path.dedup();
            if path.len() == 1 {
                path.push(router_path);
            }
            return Err(SimError::RoutingCycle { path });
        }

        // Commit.
        let output = match reuse {
            Some(index) => index,
            None => {
                let out = self.declare_output_port(router, name, PortKind::Memory)?;
                self.bind(out, target)?;
                out.index
            }
        };
        self.router_mut(router)?.address_map_mut().map(
            &router_path,
            name,
            base,
            size,
            rm_base,
            RouteTarget {
                output,
                input: target,
            },
        )?;

        let edges = self.route_edges.entry(router).or_default();
        if !edges.contains(&target.component) {
            edges.push(target.component);
        }
        debug!(
            router = %router_path,
            mapping = name,
            base = format_args!("{base:#x}"),
            size = format_args!("{size:#x}"),
            rm_base,
            target = %in_name,
            "mapped"
        );
        Ok(())
    }

    // ========================================================================
    // Power
    // ========================================================================

    /// Attaches a parsed power table to `component`.
    ///
    /// # Errors
    /// `PowerAlreadyAttached` if the component already has one.
    pub fn attach_power(&mut self, component: ComponentId, table: PowerTable) -> SimResult<()> {
        let slot = self.slot_mut(component)?;
        if slot.power.is_some() {
            return Err(SimError::PowerAlreadyAttached {
                component: slot.info.path.clone(),
            });
        }
        slot.power = Some(PowerModel::new(table));
        Ok(())
    }

    /// Parses `properties` as a power table and attaches it to `component`.
    ///
    /// # Errors
    /// `InvalidPowerTable` if the value does not follow the table schema.
    pub fn add_properties(
        &mut self,
        component: ComponentId,
        properties: &serde_json::Value,
    ) -> SimResult<()> {
        self.slot(component)?;
        let table = PowerTable::from_value(properties)?;
        self.attach_power(component, table)
    }

    /// Finishes construction.
    pub fn build(self) -> Simulator {
        info!(
            components = self.sim.slots.len(),
            bindings = self.sim.bindings.len(),
            "graph built"
        );
        self.sim
    }
}
