//! Simulation engine.
//!
//! The `Simulator` owns every component in an arena indexed by
//! [`ComponentId`], the immutable binding table produced by the
//! [`GraphBuilder`](crate::graph::GraphBuilder), the per-component power
//! models, and the global [`EventQueue`]. The run loop is single-threaded:
//! it pops the earliest event, takes the target out of its slot, runs the
//! handler to completion and puts it back.
//!
//! Deliveries through zero-latency ports happen inline, inside the sender's
//! dispatch. A delivery that would re-enter a component already on the
//! dispatch stack fails with `Reentrant`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::component::{Component, Ctx};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventPayload, MemRequest, MemResponse, Message};
use crate::port::{BindingTable, InputRef, OutputRef, PortDesc, PortKind, PortTable};
use crate::power::{CaptureRecorder, CaptureWindow, PowerModel, PowerReport};
use crate::queue::{EventQueue, QueueStats};
use crate::stats::{ComponentStats, SimulationStats};
use crate::types::{ComponentId, EventId, Priority, SimTime, PRIORITY_NORMAL};

/// Lifecycle of a simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimPhase {
    /// Built, components not started yet
    #[default]
    Ready,
    /// `start` hooks ran; events are being dispatched
    Running,
    /// `finish` hooks ran
    Finished,
    /// A fatal error reached the run loop
    Aborted,
}

/// Why a run returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The time limit was reached
    LimitReached,
    /// No events are left
    QueueDrained,
    /// A component called `request_stop`
    StopRequested,
}

/// Statistics collected by the simulation engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Events popped from the queue and dispatched
    pub events_dispatched: u64,
    /// Timer events among them
    pub timers_fired: u64,
    /// Messages delivered within the sender's dispatch
    pub inline_deliveries: u64,
    /// Messages delivered through the queue
    pub deferred_deliveries: u64,
    /// Memory transactions issued through `request`
    pub requests: u64,
    /// Power samples without cost data
    pub power_misses: u64,
}

/// Per-component activity counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCounters {
    /// Memory transactions served
    pub requests: u64,
    /// Wire, clock and power messages handled
    pub messages: u64,
    /// Clock edges received
    pub clock_edges: u64,
    /// Own timers fired
    pub timers: u64,
}

/// Static part of a slot: identity, hierarchy and ports.
#[derive(Debug)]
pub(crate) struct ComponentInfo {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) type_name: &'static str,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) ports: PortTable,
}

pub(crate) struct ComponentSlot {
    pub(crate) info: ComponentInfo,
    /// `None` while the component is being dispatched
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) power: Option<PowerModel>,
    pub(crate) counters: ComponentCounters,
}

/// The discrete-event simulator.
///
/// # Example
///
/// ```
/// use socweave::clock::ClockDomain;
/// use socweave::components::mock::Counter;
/// use socweave::graph::GraphBuilder;
/// use socweave::types::us;
///
/// let mut graph = GraphBuilder::new();
/// let clock = graph.add_component(None, "clock", ClockDomain::new(100e6).unwrap()).unwrap();
/// let counter = graph.add_component(None, "counter", Counter::new()).unwrap();
/// graph.bind_clock(clock, counter).unwrap();
///
/// let mut sim = graph.build();
/// sim.run_until(us(1)).unwrap();
/// assert_eq!(sim.component::<Counter>(counter).unwrap().edges(), 100);
/// ```
pub struct Simulator {
    pub(crate) slots: Vec<ComponentSlot>,
    pub(crate) paths: HashMap<String, ComponentId>,
    pub(crate) bindings: BindingTable,
    queue: EventQueue,
    phase: SimPhase,
    stop_requested: bool,
    captures: CaptureRecorder,
    stats: EngineStats,
}

impl Simulator {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            paths: HashMap::new(),
            bindings: BindingTable::new(),
            queue: EventQueue::new(),
            phase: SimPhase::Ready,
            stop_requested: false,
            captures: CaptureRecorder::new(),
            stats: EngineStats::default(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.slots.len()
    }

    /// Looks a component up by its full path (e.g. `board/soc/mem`).
    pub fn find(&self, path: &str) -> Option<ComponentId> {
        self.paths.get(path).copied()
    }

    /// Full path of `id`.
    pub fn path_of(&self, id: ComponentId) -> &str {
        self.slots
            .get(id.index())
            .map(|slot| slot.info.path.as_str())
            .unwrap_or("<unknown>")
    }

    /// Local name of `id`.
    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.slots.get(id.index()).map(|slot| slot.info.name.as_str())
    }

    /// Model name of `id`.
    pub fn type_of(&self, id: ComponentId) -> Option<&'static str> {
        self.slots.get(id.index()).map(|slot| slot.info.type_name)
    }

    /// Parent of `id`, if it is not a root.
    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.slots.get(id.index()).and_then(|slot| slot.info.parent)
    }

    /// Children of `id` in creation order.
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.slots
            .get(id.index())
            .map(|slot| slot.info.children.as_slice())
            .unwrap_or(&[])
    }

    /// Port table of `id`.
    pub fn ports(&self, id: ComponentId) -> Option<&PortTable> {
        self.slots.get(id.index()).map(|slot| &slot.info.ports)
    }

    /// The binding table.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Downcasts component `id` to its concrete type.
    ///
    /// Returns `None` for a wrong type or while the component is being dispatched.
    pub fn component<T: Component + 'static>(&self, id: ComponentId) -> Option<&T> {
        self.slots
            .get(id.index())?
            .component
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutable variant of [`component`](Self::component).
    pub fn component_mut<T: Component + 'static>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())?
            .component
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Activity counters of `id`.
    pub fn counters(&self, id: ComponentId) -> Option<&ComponentCounters> {
        self.slots.get(id.index()).map(|slot| &slot.counters)
    }

    /// Power model attached to `id`.
    pub fn power_model(&self, id: ComponentId) -> Option<&PowerModel> {
        self.slots.get(id.index())?.power.as_ref()
    }

    /// Energy accumulated by `id`.
    pub fn power_report(&self, id: ComponentId) -> Option<&PowerReport> {
        self.power_model(id).map(PowerModel::report)
    }

    /// Closed power capture windows.
    pub fn captures(&self) -> &[CaptureWindow] {
        self.captures.windows()
    }

    /// True while a power capture window is open.
    pub fn capture_open(&self) -> bool {
        self.captures.is_open()
    }

    /// Engine counters.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Queue counters.
    pub fn queue_stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    /// Number of live events.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn ensure_live(&self) -> SimResult<()> {
        match self.phase {
            SimPhase::Aborted => Err(SimError::Aborted),
            SimPhase::Finished => Err(SimError::Finished),
            SimPhase::Ready | SimPhase::Running => Ok(()),
        }
    }

    fn abort(&mut self, err: SimError) -> SimError {
        error!(time = self.now(), error = %err, "simulation aborted");
        self.phase = SimPhase::Aborted;
        err
    }

    /// Runs every component's `start` hook at the current time, in creation
    /// order. Called implicitly by the first run.
    pub fn start(&mut self) -> SimResult<()> {
        self.ensure_live()?;
        if self.phase == SimPhase::Running {
            return Ok(());
        }

        self.phase = SimPhase::Running;
        info!(
            components = self.slots.len(),
            bindings = self.bindings.len(),
            "simulation started"
        );
        for index in 0..self.slots.len() {
            let id = ComponentId::from_index(index);
            if let Err(err) = self.with_component(id, |c, ctx| c.start(ctx)) {
                return Err(self.abort(err));
            }
        }
        Ok(())
    }

    /// Dispatches every event due at or before `limit`, then advances the
    /// current time to `limit`.
    ///
    /// A `request_stop` from a component makes it return early, leaving the
    /// current time at the stopping event. Any error is fatal.
    pub fn run_until(&mut self, limit: SimTime) -> SimResult<RunOutcome> {
        self.ensure_live()?;
        self.start()?;

        loop {
            if self.stop_requested {
                self.stop_requested = false;
                info!(time = self.now(), "stop requested");
                return Ok(RunOutcome::StopRequested);
            }
            let Some(event) = self.queue.pop_until(limit) else {
                break;
            };
            if let Err(err) = self.dispatch(event) {
                return Err(self.abort(err));
            }
        }

        if self.queue.is_empty() {
            if limit != SimTime::MAX {
                self.queue.advance_to(limit);
            }
            return Ok(RunOutcome::QueueDrained);
        }
        self.queue.advance_to(limit);
        Ok(RunOutcome::LimitReached)
    }

    /// Runs until the queue drains or a component requests a stop.
    ///
    /// Free-running clocks never drain the queue; use
    /// [`run_until`](Self::run_until) for those graphs.
    pub fn run(&mut self) -> SimResult<RunOutcome> {
        self.run_until(SimTime::MAX)
    }

    /// Runs for `duration` past the current time.
    pub fn run_for(&mut self, duration: SimTime) -> SimResult<RunOutcome> {
        let limit = self.now().saturating_add(duration);
        self.run_until(limit)
    }

    /// Dispatches the next event, if any. Returns false once the queue is empty.
    ///
    /// A stop requested by that event is consumed here, since `step` already
    /// returns after one event.
    pub fn step(&mut self) -> SimResult<bool> {
        self.ensure_live()?;
        self.start()?;

        let Some(event) = self.queue.pop_until(SimTime::MAX) else {
            return Ok(false);
        };
        if let Err(err) = self.dispatch(event) {
            return Err(self.abort(err));
        }
        if std::mem::take(&mut self.stop_requested) {
            debug!(time = self.now(), "stop requested during step");
        }
        Ok(true)
    }

    /// Runs every component's `finish` hook and closes the simulator.
    pub fn finish(&mut self) -> SimResult<()> {
        self.ensure_live()?;
        for index in 0..self.slots.len() {
            let id = ComponentId::from_index(index);
            if let Err(err) = self.with_component(id, |c, ctx| c.finish(ctx)) {
                return Err(self.abort(err));
            }
        }
        self.phase = SimPhase::Finished;
        info!(
            time = self.now(),
            events = self.stats.events_dispatched,
            "simulation finished"
        );
        Ok(())
    }

    /// Schedules `message` to arrive on `input` at time `at`, as if driven
    /// from outside the graph.
    pub fn post(&mut self, at: SimTime, input: InputRef, message: Message) -> SimResult<EventId> {
        self.ensure_live()?;
        let desc = self.input_desc(input)?;
        if desc.kind != message.kind() {
            return Err(SimError::PayloadKind {
                port: format!("{}.{}", self.path_of(input.component), desc.name),
                expected: desc.kind,
                found: message.kind(),
            });
        }
        self.queue.schedule(
            at,
            PRIORITY_NORMAL,
            input.component,
            input.component,
            EventPayload::Deliver {
                port: input.index,
                message,
            },
        )
    }

    /// Serves a memory transaction on `input` immediately, outside of any
    /// dispatch. Useful to inspect or preload memories.
    pub fn debug_request(&mut self, input: InputRef, req: MemRequest) -> SimResult<MemResponse> {
        self.ensure_live()?;
        self.serve(input, req)
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Takes component `id` out of its slot, runs `f` with a context for it
    /// and puts it back.
    fn with_component<R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Component, &mut Ctx<'_>) -> SimResult<R>,
    ) -> SimResult<R> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: id.to_string(),
            })?;
        let mut component = slot
            .component
            .take()
            .ok_or_else(|| SimError::Reentrant {
                component: slot.info.path.clone(),
            })?;

        let result = {
            let mut ctx = Ctx::new(self, id);
            f(&mut *component, &mut ctx)
        };

        self.slots[id.index()].component = Some(component);
        result
    }

    fn dispatch(&mut self, event: Event) -> SimResult<()> {
        self.stats.events_dispatched += 1;
        trace!(
            time = event.time,
            component = self.path_of(event.target),
            id = %event.id,
            "dispatch"
        );

        match event.payload {
            EventPayload::Timer { tag } => {
                self.stats.timers_fired += 1;
                if let Some(slot) = self.slots.get_mut(event.target.index()) {
                    slot.counters.timers += 1;
                }
                self.with_component(event.target, |c, ctx| c.on_timer(tag, ctx))
            }
            EventPayload::Deliver { port, message } => {
                self.stats.deferred_deliveries += 1;
                let input = InputRef {
                    component: event.target,
                    index: port,
                };
                self.deliver(input, message)
            }
        }
    }

    fn input_desc(&self, input: InputRef) -> SimResult<&PortDesc> {
        let slot = self
            .slots
            .get(input.component.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: input.component.to_string(),
            })?;
        slot.info
            .ports
            .input(input.index)
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: format!("in[{}]", input.index),
            })
    }

    fn output_desc(&self, output: OutputRef) -> SimResult<&PortDesc> {
        let slot = self
            .slots
            .get(output.component.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: output.component.to_string(),
            })?;
        slot.info
            .ports
            .output(output.index)
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: format!("out[{}]", output.index),
            })
    }

    fn port_path(&self, component: ComponentId, port: &str) -> String {
        format!("{}.{}", self.path_of(component), port)
    }

    /// Hands `message` to the component owning `input`.
    ///
    /// Power commands update the power model and clock edges accrue
    /// background energy before the handler runs.
    fn deliver(&mut self, input: InputRef, message: Message) -> SimResult<()> {
        let port = self.input_desc(input)?.name.clone();

        if let Message::Request(req) = message {
            let resp = self.serve(input, req)?;
            if resp.fault {
                debug!(
                    port = %self.port_path(input.component, &port),
                    "posted request faulted"
                );
            }
            return Ok(());
        }

        let slot = &mut self.slots[input.component.index()];
        slot.counters.messages += 1;
        match &message {
            Message::Clock(edge) => {
                slot.counters.clock_edges += 1;
                if let Some(model) = slot.power.as_mut() {
                    if let Err(err) = model.account_background(edge.period) {
                        self.stats.power_misses += 1;
                        debug!(component = %slot.info.path, error = %err, "background power not sampled");
                    }
                }
            }
            Message::Power(cmd) => {
                if let Some(model) = slot.power.as_mut() {
                    model.apply(*cmd);
                    debug!(component = %slot.info.path, command = ?cmd, "power command applied");
                }
            }
            Message::Wire(_) | Message::Request(_) => {}
        }

        self.with_component(input.component, |c, ctx| c.on_message(&port, message, ctx))
    }

    /// Runs the `on_request` handler behind `input`.
    fn serve(&mut self, input: InputRef, req: MemRequest) -> SimResult<MemResponse> {
        let desc = self.input_desc(input)?;
        if desc.kind != PortKind::Memory {
            return Err(SimError::PayloadKind {
                port: self.port_path(input.component, &desc.name),
                expected: desc.kind,
                found: PortKind::Memory,
            });
        }
        let port = desc.name.clone();
        self.slots[input.component.index()].counters.requests += 1;
        self.with_component(input.component, |c, ctx| c.on_request(&port, req, ctx))
    }

    // ========================================================================
    // Context services
    // ========================================================================

    pub(crate) fn schedule_timer(
        &mut self,
        id: ComponentId,
        at: SimTime,
        tag: u64,
        priority: Priority,
    ) -> SimResult<EventId> {
        self.queue
            .schedule(at, priority, id, id, EventPayload::Timer { tag })
    }

    pub(crate) fn cancel(&mut self, owner: ComponentId, id: EventId) -> SimResult<()> {
        self.queue.cancel(owner, id).map(|_| ())
    }

    pub(crate) fn output_ref(&self, id: ComponentId, port: &str) -> SimResult<OutputRef> {
        let slot = self
            .slots
            .get(id.index())
            .ok_or_else(|| SimError::UnknownComponent {
                name: id.to_string(),
            })?;
        let index = slot
            .info
            .ports
            .find_output(port)
            .ok_or_else(|| SimError::UnknownPort {
                component: slot.info.path.clone(),
                port: port.to_string(),
            })?;
        Ok(OutputRef {
            component: id,
            index,
        })
    }

    pub(crate) fn is_output_bound(&self, id: ComponentId, port: &str) -> bool {
        self.output_ref(id, port)
            .map(|output| !self.bindings.targets(output).is_empty())
            .unwrap_or(false)
    }

    /// Sends `message` to every input bound to `output`.
    ///
    /// Zero-latency outputs deliver inline, in bind order. Other outputs
    /// schedule one `Deliver` event per target at `now + latency`.
    pub(crate) fn send(&mut self, output: OutputRef, message: Message) -> SimResult<()> {
        let desc = self.output_desc(output)?;
        if desc.kind != message.kind() {
            return Err(SimError::PayloadKind {
                port: self.port_path(output.component, &desc.name),
                expected: desc.kind,
                found: message.kind(),
            });
        }
        let latency = desc.latency;
        let targets = self.bindings.targets(output).to_vec();

        if latency == 0 {
            for input in targets {
                self.stats.inline_deliveries += 1;
                self.deliver(input, message.clone())?;
            }
            return Ok(());
        }

        let at = self.now().saturating_add(latency);
        for input in targets {
            self.queue.schedule(
                at,
                PRIORITY_NORMAL,
                output.component,
                input.component,
                EventPayload::Deliver {
                    port: input.index,
                    message: message.clone(),
                },
            )?;
        }
        Ok(())
    }

    /// Issues a synchronous memory transaction through `output`.
    ///
    /// The output must be a `Memory` port bound to exactly one input. The
    /// port latency is added to the response.
    pub(crate) fn request(&mut self, output: OutputRef, req: MemRequest) -> SimResult<MemResponse> {
        let desc = self.output_desc(output)?;
        if desc.kind != PortKind::Memory {
            return Err(SimError::PayloadKind {
                port: self.port_path(output.component, &desc.name),
                expected: desc.kind,
                found: PortKind::Memory,
            });
        }
        let latency = desc.latency;

        let input = match self.bindings.targets(output) {
            [input] => *input,
            [] => {
                return Err(SimError::Unbound {
                    component: self.path_of(output.component).to_string(),
                    port: desc.name.clone(),
                })
            }
            many => {
                return Err(SimError::MultipleTargets {
                    component: self.path_of(output.component).to_string(),
                    port: desc.name.clone(),
                    count: many.len(),
                })
            }
        };

        self.stats.requests += 1;
        let resp = self.serve(input, req)?;
        Ok(resp.with_latency(latency))
    }

    /// Opens a capture window on behalf of trigger `id`.
    pub(crate) fn capture_start(&mut self, id: ComponentId) {
        let now = self.now();
        let trigger = self.path_of(id).to_string();
        let totals = self.slots.iter().filter_map(|slot| {
            let model = slot.power.as_ref()?;
            Some((slot.info.path.as_str(), model.report().total_pj()))
        });
        if self.captures.start(&trigger, now, totals) {
            info!(trigger = %trigger, time = now, "power capture started");
        } else {
            debug!(trigger = %trigger, time = now, "power capture already open");
        }
    }

    /// Closes the open capture window, if any.
    pub(crate) fn capture_stop(&mut self, id: ComponentId) {
        let now = self.now();
        let totals = self.slots.iter().filter_map(|slot| {
            let model = slot.power.as_ref()?;
            Some((slot.info.path.as_str(), model.report().total_pj()))
        });
        let closed = self
            .captures
            .stop(now, totals)
            .map(|window| window.energy_pj);
        match closed {
            Some(energy_pj) => info!(
                component = %self.path_of(id),
                time = now,
                energy_pj,
                "power capture stopped"
            ),
            None => debug!(component = %self.path_of(id), "power capture stop without start"),
        }
    }

    /// Samples access operation `op` on the power model of `id`.
    pub(crate) fn power_event(&mut self, id: ComponentId, op: &str) -> Option<f64> {
        let slot = self.slots.get_mut(id.index())?;
        let model = slot.power.as_mut()?;
        match model.account_operation(op) {
            Ok(energy) => Some(energy),
            Err(err) => {
                self.stats.power_misses += 1;
                debug!(component = %slot.info.path, operation = op, error = %err, "no power data");
                None
            }
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Per-component statistics in creation order.
    pub fn component_stats(&self) -> Vec<ComponentStats> {
        self.slots
            .iter()
            .map(|slot| ComponentStats {
                path: slot.info.path.clone(),
                type_name: slot.info.type_name.to_string(),
                counters: slot.counters.clone(),
                model: slot
                    .component
                    .as_ref()
                    .map(|c| c.stats())
                    .unwrap_or(serde_json::Value::Null),
                power: slot.power.as_ref().map(|m| m.report().clone()),
            })
            .collect()
    }

    /// Snapshot of all statistics.
    pub fn collect_stats(&self) -> SimulationStats {
        SimulationStats {
            final_time: self.now(),
            phase: self.phase,
            engine: self.stats.clone(),
            queue: self.queue.stats().clone(),
            components: self.component_stats(),
            captures: self.captures.windows().to_vec(),
            ..SimulationStats::default()
        }
    }

    /// Exports statistics as a JSON value.
    pub fn export_stats(&self) -> serde_json::Value {
        let mut components = serde_json::Map::new();
        for stats in self.component_stats() {
            components.insert(
                stats.path.clone(),
                serde_json::json!({
                    "type": stats.type_name,
                    "counters": stats.counters,
                    "model": stats.model,
                    "power": stats.power,
                }),
            );
        }

        let queue = self.queue.stats();
        serde_json::json!({
            "engine": {
                "current_time": self.now(),
                "phase": self.phase,
                "events_dispatched": self.stats.events_dispatched,
                "timers_fired": self.stats.timers_fired,
                "inline_deliveries": self.stats.inline_deliveries,
                "deferred_deliveries": self.stats.deferred_deliveries,
                "requests": self.stats.requests,
                "power_misses": self.stats.power_misses,
                "component_count": self.slots.len(),
                "binding_count": self.bindings.len(),
            },
            "queue": {
                "scheduled": queue.scheduled,
                "dispatched": queue.dispatched,
                "cancelled": queue.cancelled,
                "peak_depth": queue.peak_depth,
                "pending": self.queue.len(),
            },
            "components": components,
            "captures": self.captures.windows(),
        })
    }
}
