//! The `Component` trait and its dispatch context.
//!
//! Components are the schedulable units of the hardware graph. Each one is
//! a local state machine that reacts to deliveries on its input ports and to
//! its own timers, and talks to the rest of the graph only through its
//! output ports. Handlers run to completion; waiting is expressed by
//! scheduling a timer, never by blocking.

use std::any::Any;

use crate::engine::Simulator;
use crate::error::SimResult;
use crate::event::{MemRequest, MemResponse, Message};
use crate::port::PortDesc;
use crate::router::Router;
use crate::types::{ComponentId, EventId, Priority, SimTime, PRIORITY_NORMAL};

/// Upcast helper so concrete component state can be inspected after a run.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The core trait that all simulation components implement.
///
/// Only `type_name` is required; every hook has a no-op default.
pub trait Component: AsAny + Send {
    /// Short model name used in diagnostics and statistics (e.g. `"memory"`).
    fn type_name(&self) -> &'static str;

    /// The fixed port table of this component type.
    fn ports(&self) -> Vec<PortDesc> {
        Vec::new()
    }

    /// Called once at time 0, before the first clock edge.
    fn start(&mut self, _ctx: &mut Ctx<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Serves a memory transaction arriving on input `port`.
    ///
    /// The default answers every request with a fault.
    fn on_request(
        &mut self,
        _port: &str,
        _req: MemRequest,
        _ctx: &mut Ctx<'_>,
    ) -> SimResult<MemResponse> {
        Ok(MemResponse::fault())
    }

    /// Handles a wire, clock or power message arriving on input `port`.
    fn on_message(&mut self, _port: &str, _msg: Message, _ctx: &mut Ctx<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Handles a timer this component scheduled for itself.
    fn on_timer(&mut self, _tag: u64, _ctx: &mut Ctx<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Called once when the simulation is torn down.
    fn finish(&mut self, _ctx: &mut Ctx<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Model-specific statistics.
    fn stats(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Returns the router behind this component, if it is one.
    fn as_router_mut(&mut self) -> Option<&mut Router> {
        None
    }
}

/// Handle a component uses during its own dispatch.
///
/// All effects on the rest of the graph go through the context, which
/// keeps the queue the only source of time and the bindings the only path
/// between components.
pub struct Ctx<'a> {
    sim: &'a mut Simulator,
    id: ComponentId,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(sim: &'a mut Simulator, id: ComponentId) -> Self {
        Self { sim, id }
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    /// Handle of the component being dispatched.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Full path of the component being dispatched.
    pub fn path(&self) -> &str {
        self.sim.path_of(self.id)
    }

    /// Schedules `on_timer(tag)` after `delay`.
    pub fn schedule(&mut self, delay: SimTime, tag: u64) -> SimResult<EventId> {
        let at = self.now().saturating_add(delay);
        self.schedule_at(at, tag, PRIORITY_NORMAL)
    }

    /// Schedules `on_timer(tag)` at absolute time `at`.
    ///
    /// # Errors
    /// `PastDeadline` if `at` is before the current time.
    pub fn schedule_at(&mut self, at: SimTime, tag: u64, priority: Priority) -> SimResult<EventId> {
        self.sim.schedule_timer(self.id, at, tag, priority)
    }

    /// Withdraws a timer or deferred delivery this component scheduled.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        self.sim.cancel(self.id, id)
    }

    /// Returns true if output `port` has at least one binding.
    pub fn is_bound(&self, port: &str) -> bool {
        self.sim.is_output_bound(self.id, port)
    }

    /// Sends `msg` to every input bound to output `port`.
    pub fn send(&mut self, port: &str, msg: Message) -> SimResult<()> {
        let output = self.sim.output_ref(self.id, port)?;
        self.sim.send(output, msg)
    }

    /// Issues a memory transaction on output `port` and waits for its response.
    pub fn request(&mut self, port: &str, req: MemRequest) -> SimResult<MemResponse> {
        let output = self.sim.output_ref(self.id, port)?;
        self.sim.request(output, req)
    }

    /// Issues a memory transaction on the output port at `index`.
    pub fn request_index(&mut self, index: usize, req: MemRequest) -> SimResult<MemResponse> {
        let output = crate::port::OutputRef {
            component: self.id,
            index,
        };
        self.sim.request(output, req)
    }

    /// Records one occurrence of power operation `op` (e.g. `read_32`).
    ///
    /// Returns the energy in pJ, or `None` if the component has no power
    /// model or the table has no data for the current operating point.
    pub fn power_event(&mut self, op: &str) -> Option<f64> {
        self.sim.power_event(self.id, op)
    }

    /// Opens a power capture window covering every powered component.
    /// An already open window is kept.
    pub fn power_capture_start(&mut self) {
        self.sim.capture_start(self.id);
    }

    /// Closes the open power capture window; ignored if none is open.
    pub fn power_capture_stop(&mut self) {
        self.sim.capture_stop(self.id);
    }

    /// Asks the simulator to return after the current event.
    pub fn request_stop(&mut self) {
        self.sim.request_stop();
    }
}
