//! Integration tests for memory-mapped routing.
//!
//! These tests verify:
//! - Decoding and base removal through one and two router levels
//! - Unmapped accesses fault without aborting
//! - Mapping validation is atomic, cycles are rejected
//! - Decoding hits exactly the owning range for any address

use proptest::prelude::*;

use socweave::components::Memory;
use socweave::event::MemRequest;
use socweave::router::AddressMap;
use socweave::{ComponentId, GraphBuilder, InputRef, Router, SimError, Simulator};

fn mem_input(graph: &GraphBuilder, mem: ComponentId) -> InputRef {
    graph.input(mem, "input").unwrap()
}

/// ico -> {mem @ 0x0, periph @ 0x2000_0000 (no rebase), sub @ 0x1000_0000 -> mem2}
fn two_level() -> (Simulator, InputRef, ComponentId, ComponentId, ComponentId) {
    let mut graph = GraphBuilder::new();
    let ico = graph.add_component(None, "ico", Router::new().with_latency(100)).unwrap();
    let sub = graph.add_component(None, "sub", Router::new().with_latency(50)).unwrap();
    let mem = graph.add_component(None, "mem", Memory::new(0x1000)).unwrap();
    let mem2 = graph.add_component(None, "mem2", Memory::new(0x1000)).unwrap();
    let periph = graph
        .add_component(None, "periph", Memory::new(0x100))
        .unwrap();

    let target = mem_input(&graph, mem);
    graph.map(ico, "mem", target, 0x0, 0x1000, true).unwrap();
    let target = graph.input(sub, "input").unwrap();
    graph.map(ico, "sub", target, 0x1000_0000, 0x10_0000, true).unwrap();
    let target = mem_input(&graph, mem2);
    graph.map(sub, "mem2", target, 0x8_0000, 0x1000, true).unwrap();
    let target = mem_input(&graph, periph);
    graph.map(ico, "periph", target, 0x2000_0000, 0x100, false).unwrap();

    let input = graph.input(ico, "input").unwrap();
    (graph.build(), input, mem, mem2, periph)
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_two_level_routing() {
    let (mut sim, ico, mem, mem2, periph) = two_level();

    let resp = sim
        .debug_request(ico, MemRequest::write_u32(0x10, 0xaa))
        .unwrap();
    assert_eq!(resp.latency, 100);

    let resp = sim
        .debug_request(ico, MemRequest::write_u32(0x1008_0020, 0xbb))
        .unwrap();
    assert!(!resp.fault);
    assert_eq!(resp.latency, 150);

    // Without rebase the global address reaches the target unchanged.
    let resp = sim
        .debug_request(ico, MemRequest::write_u32(0x2000_0004, 0xcc))
        .unwrap();
    assert!(resp.fault);

    assert_eq!(sim.component::<Memory>(mem).unwrap().read_u32(0x10), Some(0xaa));
    assert_eq!(sim.component::<Memory>(mem2).unwrap().read_u32(0x20), Some(0xbb));
    let periph = sim.component::<Memory>(periph).unwrap();
    assert_eq!(periph.memory_stats().faults, 1);
    assert_eq!(periph.read_u32(0x4), Some(0));
}

#[test]
fn test_unmapped_access_faults() {
    let (mut sim, ico, ..) = two_level();

    let resp = sim.debug_request(ico, MemRequest::read(0x4000_0000, 4)).unwrap();
    assert!(resp.fault);
    assert_eq!(resp.latency, 100);

    // Hole inside the sub-router's window.
    let resp = sim.debug_request(ico, MemRequest::read(0x1000_0000, 4)).unwrap();
    assert!(resp.fault);
    assert_eq!(resp.latency, 150);

    let ico_id = sim.find("ico").unwrap();
    let router = sim.component::<Router>(ico_id).unwrap();
    assert_eq!(router.router_stats().unmapped, 1);
    assert_eq!(sim.phase(), socweave::SimPhase::Ready);
}

#[test]
fn test_shared_target_reuses_output() {
    let mut graph = GraphBuilder::new();
    let ico = graph.add_component(None, "ico", Router::new()).unwrap();
    let mem = graph.add_component(None, "mem", Memory::new(0x100)).unwrap();
    let target = mem_input(&graph, mem);

    graph.map(ico, "low", target, 0x0, 0x100, true).unwrap();
    graph.map(ico, "alias", target, 0x1000, 0x100, true).unwrap();
    assert_eq!(graph.ports(ico).unwrap().outputs().len(), 1);

    assert!(matches!(
        graph.map(ico, "raw", target, 0x2000, 0x100, false),
        Err(SimError::InconsistentRebase { .. })
    ));

    let input = graph.input(ico, "input").unwrap();
    let mut sim = graph.build();
    sim.debug_request(input, MemRequest::write_u32(0x1008, 7)).unwrap();
    let resp = sim.debug_request(input, MemRequest::read(0x8, 4)).unwrap();
    assert_eq!(resp.as_u32(), Some(7));
}

#[test]
fn test_mixed_rebase_when_allowed() {
    let mut graph = GraphBuilder::new();
    let ico = graph
        .add_component(None, "ico", Router::new().allow_mixed_rebase(true))
        .unwrap();
    let mem = graph.add_component(None, "mem", Memory::new(0x100)).unwrap();
    let target = mem_input(&graph, mem);
    graph.map(ico, "rebased", target, 0x1000, 0x100, true).unwrap();
    graph.map(ico, "raw", target, 0x0, 0x100, false).unwrap();
    assert_eq!(graph.ports(ico).unwrap().outputs().len(), 1);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_map_errors_leave_graph_untouched() {
    let mut graph = GraphBuilder::new();
    let ico = graph.add_component(None, "ico", Router::new()).unwrap();
    let mem = graph.add_component(None, "mem", Memory::new(0x100)).unwrap();
    let mem2 = graph.add_component(None, "mem2", Memory::new(0x100)).unwrap();
    let target = mem_input(&graph, mem);
    let target2 = mem_input(&graph, mem2);
    graph.map(ico, "mem", target, 0x0, 0x100, true).unwrap();

    assert!(matches!(
        graph.map(ico, "mem2", target2, 0x80, 0x100, true),
        Err(SimError::Overlap { .. })
    ));
    assert!(matches!(
        graph.map(ico, "mem2", target2, 0x1000, 0, true),
        Err(SimError::InvalidMapping { .. })
    ));
    assert!(matches!(
        graph.map(ico, "mem", target2, 0x1000, 0x100, true),
        Err(SimError::DuplicatePort { .. })
    ));
    assert!(matches!(
        graph.map(mem, "x", target2, 0x0, 0x100, true),
        Err(SimError::NotARouter { .. })
    ));
    let clock = graph.input(mem2, "clock").unwrap();
    assert!(matches!(
        graph.map(ico, "clk", clock, 0x1000, 0x100, true),
        Err(SimError::TypeMismatch { .. })
    ));

    assert_eq!(graph.ports(ico).unwrap().outputs().len(), 1);
    let sim = graph.build();
    let router = sim.component::<Router>(ico).unwrap();
    assert_eq!(router.address_map().len(), 1);
    assert!(sim.bindings().driver(target2).is_none());
}

#[test]
fn test_routing_cycles() {
    let mut graph = GraphBuilder::new();
    let a = graph.add_component(None, "a", Router::new()).unwrap();
    let b = graph.add_component(None, "b", Router::new()).unwrap();
    let c = graph.add_component(None, "c", Router::new()).unwrap();

    let a_in = graph.input(a, "input").unwrap();
    let b_in = graph.input(b, "input").unwrap();
    let c_in = graph.input(c, "input").unwrap();

    match graph.map(a, "self", a_in, 0x0, 0x100, true) {
        Err(SimError::RoutingCycle { path }) => assert_eq!(path, vec!["a", "a"]),
        other => panic!("expected a routing cycle, got {other:?}"),
    }

    graph.map(a, "to_b", b_in, 0x0, 0x100, true).unwrap();
    graph.map(b, "to_c", c_in, 0x0, 0x100, true).unwrap();
    match graph.map(c, "to_a", a_in, 0x0, 0x100, true) {
        Err(SimError::RoutingCycle { path }) => {
            assert_eq!(path, vec!["c", "a", "b", "c"])
        }
        other => panic!("expected a routing cycle, got {other:?}"),
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Lays `(gap, size)` pairs out back to back from address `start`.
fn layout(start: u64, spans: &[(u64, u64)]) -> Vec<(u64, u64)> {
    let mut cursor = start;
    spans
        .iter()
        .map(|&(gap, size)| {
            let base = cursor + gap;
            cursor = base + size;
            (base, size)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_route_hits_exactly_the_owning_range(
        start in 0u64..4,
        spans in prop::collection::vec((0u64..0x400, 1u64..0x400), 1..16),
        rotate in 0usize..16,
        random in prop::collection::vec(0u64..0x10000, 0..32)
    ) {
        let ranges = layout(start, &spans);
        let mut map = AddressMap::new();
        // Insertion order must not matter.
        let count = ranges.len();
        for k in 0..count {
            let i = (k + rotate) % count;
            let (base, size) = ranges[i];
            map.map("ico", format!("m{i}"), base, size, i % 2 == 0, i).unwrap();
        }
        prop_assert_eq!(map.len(), count);

        let mut addrs = random;
        for &(base, size) in &ranges {
            addrs.extend(base.checked_sub(1));
            addrs.extend([base, base + size - 1, base + size]);
        }

        for addr in addrs {
            let owner = ranges
                .iter()
                .position(|&(base, size)| addr >= base && addr < base + size);
            match (owner, map.route(addr, 1)) {
                (Some(i), Ok(routed)) => {
                    prop_assert_eq!(routed.entry.target, i);
                    let (base, _) = ranges[i];
                    let expected = if i % 2 == 0 { addr - base } else { addr };
                    prop_assert_eq!(routed.addr, expected);
                }
                (None, Err(SimError::UnmappedAddress { addr: missed })) => {
                    prop_assert_eq!(missed, addr);
                }
                (owner, result) => {
                    prop_assert!(false, "{:#x}: owner {:?}, routed {:?}", addr, owner, result);
                }
            }
        }
    }

    #[test]
    fn prop_rebased_writes_land_at_offset(
        slot in 0u64..4,
        offset in 0u64..0xffc,
        value in any::<u32>()
    ) {
        let mut graph = GraphBuilder::new();
        let ico = graph.add_component(None, "ico", Router::new()).unwrap();
        let mut mems = Vec::new();
        for i in 0..4u64 {
            let mem = graph.add_component(None, &format!("mem{i}"), Memory::new(0x1000)).unwrap();
            let target = mem_input(&graph, mem);
            graph.map(ico, &format!("m{i}"), target, i * 0x1000_0000, 0x1000, true).unwrap();
            mems.push(mem);
        }
        let input = graph.input(ico, "input").unwrap();
        let mut sim = graph.build();

        let addr = slot * 0x1000_0000 + offset;
        let resp = sim.debug_request(input, MemRequest::write_u32(addr, value)).unwrap();
        prop_assert!(!resp.fault);

        for (i, mem) in mems.iter().enumerate() {
            let word = sim.component::<Memory>(*mem).unwrap().read_u32(offset as usize);
            let expected = if i as u64 == slot { value } else { 0 };
            prop_assert_eq!(word, Some(expected));
        }
    }

    #[test]
    fn prop_overlap_never_partially_commits(
        ranges in prop::collection::vec((0u64..64, 1u64..16), 1..12)
    ) {
        let mut graph = GraphBuilder::new();
        let ico = graph.add_component(None, "ico", Router::new()).unwrap();
        let mut accepted: Vec<(u64, u64)> = Vec::new();

        for (i, (base, size)) in ranges.into_iter().enumerate() {
            let mem = graph.add_component(None, &format!("mem{i}"), Memory::new(16)).unwrap();
            let target = mem_input(&graph, mem);
            let overlaps = accepted
                .iter()
                .any(|(b, s)| base < b + s && *b < base + size);

            let result = graph.map(ico, &format!("m{i}"), target, base, size, true);
            prop_assert_eq!(result.is_ok(), !overlaps);
            if result.is_ok() {
                accepted.push((base, size));
            }
            prop_assert_eq!(graph.ports(ico).unwrap().outputs().len(), accepted.len());
        }
    }
}
