//! Address-decoding interconnect.
//!
//! This module provides:
//! 1. **`AddressMap`:** non-overlapping `[base, base + size)` ranges kept
//!    sorted by base, decoded with a binary search.
//! 2. **`Router`:** a component forwarding memory transactions from any of
//!    its inputs to the output port owning the address, optionally
//!    rewriting the address to an offset local to the mapping (`rm_base`).
//!
//! Routers may be mapped into other routers; the graph builder rejects
//! mappings that would close a cycle.

use serde::Serialize;
use tracing::{debug, warn};

use crate::component::{Component, Ctx};
use crate::error::{SimError, SimResult};
use crate::event::{MemRequest, MemResponse};
use crate::port::{InputRef, PortDesc, PortKind};
use crate::types::SimTime;

/// Name of the default initiator-side input of a router.
pub const ROUTER_INPUT: &str = "input";

/// One mapped range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEntry<T> {
    /// Mapping name, used for diagnostics
    pub name: String,
    /// First address of the range
    pub base: u64,
    /// Size of the range in bytes (non-zero)
    pub size: u64,
    /// Rewrite forwarded addresses to `addr - base`
    pub rm_base: bool,
    /// Where hits are sent
    pub target: T,
}

impl<T> MapEntry<T> {
    /// One past the last address, widened so `base + size` cannot overflow.
    pub fn end(&self) -> u128 {
        self.base as u128 + self.size as u128
    }

    /// Returns true if `addr` falls inside the range.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && (addr as u128) < self.end()
    }

    fn overlaps(&self, base: u64, size: u64) -> bool {
        let end = base as u128 + size as u128;
        (base as u128) < self.end() && (self.base as u128) < end
    }
}

/// Result of decoding an address.
#[derive(Debug, PartialEq, Eq)]
pub struct Routed<'a, T> {
    /// The entry that owns the address
    pub entry: &'a MapEntry<T>,
    /// The address to forward (local offset when `rm_base` is set)
    pub addr: u64,
}

/// Sorted set of non-overlapping mappings.
#[derive(Clone, Debug)]
pub struct AddressMap<T> {
    entries: Vec<MapEntry<T>>,
}

impl<T> Default for AddressMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> AddressMap<T> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `[base, base + size)` could be added, without adding it.
    ///
    /// `owner` only feeds the diagnostic.
    pub fn check(&self, owner: &str, name: &str, base: u64, size: u64) -> SimResult<()> {
        if size == 0 {
            return Err(SimError::InvalidMapping {
                router: owner.to_string(),
                name: name.to_string(),
                reason: "size must be non-zero".to_string(),
            });
        }
        if base as u128 + size as u128 > u64::MAX as u128 + 1 {
            return Err(SimError::InvalidMapping {
                router: owner.to_string(),
                name: name.to_string(),
                reason: format!("range {base:#x} + {size:#x} exceeds the address space"),
            });
        }

        // Only the neighbours of the insertion point can overlap.
        let idx = self.entries.partition_point(|e| e.base < base);
        let neighbours = idx.checked_sub(1).into_iter().chain(Some(idx));
        for i in neighbours {
            if let Some(entry) = self.entries.get(i) {
                if entry.overlaps(base, size) {
                    return Err(SimError::Overlap {
                        router: owner.to_string(),
                        name: name.to_string(),
                        base,
                        size,
                        existing: entry.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Registers a mapping. The map is left untouched on error.
    ///
    /// # Errors
    /// `Overlap` if the range intersects an existing entry,
    /// `InvalidMapping` for an empty or out-of-space range.
    pub fn map(
        &mut self,
        owner: &str,
        name: impl Into<String>,
        base: u64,
        size: u64,
        rm_base: bool,
        target: T,
    ) -> SimResult<()> {
        let name = name.into();
        self.check(owner, &name, base, size)?;

        let idx = self.entries.partition_point(|e| e.base < base);
        self.entries.insert(
            idx,
            MapEntry {
                name,
                base,
                size,
                rm_base,
                target,
            },
        );
        Ok(())
    }

    /// Decodes an access of `size` bytes at `addr`.
    ///
    /// # Errors
    /// `UnmappedAddress` if no entry contains `addr`, or if the access runs
    /// past the end of the entry containing it (the error then names the
    /// first byte outside the entry).
    pub fn route(&self, addr: u64, size: u32) -> SimResult<Routed<'_, T>> {
        let idx = self.entries.partition_point(|e| e.base <= addr);
        let entry = idx
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .filter(|e| e.contains(addr))
            .ok_or(SimError::UnmappedAddress { addr })?;

        let last = addr as u128 + size.max(1) as u128;
        if last > entry.end() {
            return Err(SimError::UnmappedAddress {
                addr: entry.end().min(u64::MAX as u128) as u64,
            });
        }

        let forwarded = if entry.rm_base { addr - entry.base } else { addr };
        Ok(Routed {
            entry,
            addr: forwarded,
        })
    }

    /// Entries sorted by base address.
    pub fn entries(&self) -> &[MapEntry<T>] {
        &self.entries
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a router mapping leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteTarget {
    /// Index of the router output port created for the mapping
    pub output: usize,
    /// The input port bound to that output
    pub input: InputRef,
}

/// Router parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Latency added to every routed response, in picoseconds
    pub latency: SimTime,
    /// Accept mappings to one target with different `rm_base` settings
    pub allow_mixed_rebase: bool,
}

/// Router counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RouterStats {
    /// Transactions forwarded to a target
    pub routed: u64,
    /// Transactions answered with a fault because nothing owns the address
    pub unmapped: u64,
}

/// Memory-mapped interconnect component.
#[derive(Debug, Default)]
pub struct Router {
    config: RouterConfig,
    map: AddressMap<RouteTarget>,
    stats: RouterStats,
}

impl Router {
    /// Creates a router with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router with the given configuration.
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the per-transaction latency.
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.config.latency = latency;
        self
    }

    /// Allows one target to be mapped with different `rm_base` settings.
    pub fn allow_mixed_rebase(mut self, allow: bool) -> Self {
        self.config.allow_mixed_rebase = allow;
        self
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The decoding table.
    pub fn address_map(&self) -> &AddressMap<RouteTarget> {
        &self.map
    }

    pub(crate) fn address_map_mut(&mut self) -> &mut AddressMap<RouteTarget> {
        &mut self.map
    }

    /// Decodes `addr` without forwarding anything.
    pub fn route(&self, addr: u64, size: u32) -> SimResult<Routed<'_, RouteTarget>> {
        self.map.route(addr, size)
    }

    /// Router counters.
    pub fn router_stats(&self) -> &RouterStats {
        &self.stats
    }
}

impl Component for Router {
    fn type_name(&self) -> &'static str {
        "router"
    }

    fn ports(&self) -> Vec<PortDesc> {
        vec![PortDesc::input(ROUTER_INPUT, PortKind::Memory)]
    }

    fn on_request(
        &mut self,
        port: &str,
        mut req: MemRequest,
        ctx: &mut Ctx<'_>,
    ) -> SimResult<MemResponse> {
        let (output, forwarded, name) = match self.map.route(req.addr, req.size) {
            Ok(routed) => (routed.entry.target.output, routed.addr, routed.entry.name.clone()),
            Err(SimError::UnmappedAddress { addr }) => {
                self.stats.unmapped += 1;
                warn!(
                    router = ctx.path(),
                    input = port,
                    addr = format_args!("{addr:#x}"),
                    "unmapped access"
                );
                return Ok(MemResponse::fault().with_latency(self.config.latency));
            }
            Err(err) => return Err(err),
        };

        debug!(
            router = ctx.path(),
            mapping = %name,
            from = format_args!("{:#x}", req.addr),
            to = format_args!("{forwarded:#x}"),
            "route"
        );
        self.stats.routed += 1;
        req.addr = forwarded;

        let resp = ctx.request_index(output, req)?;
        Ok(resp.with_latency(self.config.latency))
    }

    fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "mappings": self.map.len(),
            "routed": self.stats.routed,
            "unmapped": self.stats.unmapped,
        })
    }

    fn as_router_mut(&mut self) -> Option<&mut Router> {
        Some(self)
    }
}
