//! End-to-end tests on a small RV64-style board.
//!
//! The board mirrors a typical virtual platform: a fetch core and a boot
//! loader share one interconnect in front of two memories and a
//! power-controlled peripheral, all clocked at 100 MHz. It is built once
//! through the graph API and once from a YAML description.

use std::fs;

use socweave::components::memory::{CAPTURE_START, CAPTURE_STOP};
use socweave::components::{FetchCore, Group, ImageLoader, Memory, PowerSequencer};
use socweave::config::ComponentConfig;
use socweave::{
    assemble, create_default_registry, ns, BoardConfig, BoardConfigBuilder, ClockDomain,
    GraphBuilder, InputRef, MemRequest, PortKind, PowerCommand, PowerState, Router, RunOutcome,
    SimError, Simulator,
};

const FETCHES: u64 = 8;

fn image() -> Vec<u8> {
    (0..FETCHES as u32)
        .flat_map(|i| (0x0000_0013u32 + (i << 20)).to_le_bytes())
        .collect()
}

fn memory_power() -> serde_json::Value {
    serde_json::json!({
        "background": {
            "dynamic": { "type": "linear", "unit": "W", "values": { "25": { "1.2": { "any": "0.0001" } } } },
            "leakage": { "type": "linear", "unit": "W", "values": { "25": { "1.2": { "any": "0.000001" } } } }
        },
        "read_32": {
            "dynamic": { "type": "linear", "unit": "pJ", "values": { "25": { "1.2": { "any": "1.5" } } } }
        },
        "write_32": {
            "dynamic": { "type": "linear", "unit": "pJ", "values": { "25": { "1.2": { "any": "2.5" } } } }
        }
    })
}

fn build_board() -> Simulator {
    let mut graph = GraphBuilder::new();
    let board = graph.add_component(None, "board", Group::new()).unwrap();
    let soc = graph.add_component(Some(board), "soc", Group::new()).unwrap();

    let clock = graph
        .add_component(Some(soc), "clock", ClockDomain::new(100e6).unwrap())
        .unwrap();
    let ico = graph.add_component(Some(soc), "ico", Router::new()).unwrap();
    let mem = graph
        .add_component(Some(soc), "mem", Memory::new(0x10_0000))
        .unwrap();
    let mem2 = graph
        .add_component(
            Some(soc),
            "mem2",
            Memory::new(0x10_0000).with_power_trigger(true),
        )
        .unwrap();
    let comp = graph.add_component(Some(soc), "comp", Memory::new(0x1000)).unwrap();
    let ctrl = graph
        .add_component(
            Some(soc),
            "ctrl",
            PowerSequencer::new()
                .with_step(ns(40), PowerCommand::SetVoltage(0.8))
                .with_step(ns(60), PowerCommand::SetState(PowerState::Off)),
        )
        .unwrap();
    let host = graph
        .add_component(
            Some(soc),
            "host",
            FetchCore::new().with_max_fetches(FETCHES),
        )
        .unwrap();
    let loader = graph
        .add_component(
            Some(soc),
            "loader",
            ImageLoader::new(0).with_segment(0, image()),
        )
        .unwrap();

    graph.add_properties(mem, &memory_power()).unwrap();
    graph.add_properties(comp, &memory_power()).unwrap();

    graph.declare_input_port(ico, "fetch", PortKind::Memory).unwrap();
    graph.declare_input_port(ico, "data", PortKind::Memory).unwrap();

    graph.connect(host, "fetch", ico, "fetch").unwrap();
    graph.connect(host, "data", ico, "data").unwrap();
    graph.connect(loader, "out", ico, "input").unwrap();
    graph.connect(loader, "start", host, "fetch_enable").unwrap();
    graph.connect(loader, "entry", host, "entry").unwrap();
    graph.connect(ctrl, "power", comp, "power").unwrap();
    graph.connect(ctrl, "voltage", comp, "voltage").unwrap();

    for target in [host, mem, mem2, comp] {
        graph.bind_clock(clock, target).unwrap();
    }

    let input = graph.input(mem, "input").unwrap();
    graph.map(ico, "mem", input, 0x0, 0x10_0000, true).unwrap();
    let input = graph.input(mem2, "input").unwrap();
    graph.map(ico, "mem2", input, 0x1000_0000, 0x10_0000, true).unwrap();
    let input = graph.input(comp, "input").unwrap();
    graph.map(ico, "comp", input, 0x2000_0000, 0x1000, true).unwrap();

    graph.build()
}

const BOARD_YAML: &str = r#"
simulation:
  max_time: 1000000
  log_level: warn

components:
  - { name: board, type: group }
  - { name: soc, parent: board, type: group }
  - name: clock
    parent: board/soc
    type: clock
    attrs: { frequency: "100e6" }
  - { name: ico, parent: board/soc, type: router }
  - name: mem
    parent: board/soc
    type: memory
    attrs: { size: "0x100000" }
    power_file: memory_power.json
  - name: mem2
    parent: board/soc
    type: memory
    attrs: { size: "0x100000", power_trigger: "true" }
  - name: comp
    parent: board/soc
    type: memory
    attrs: { size: "0x1000" }
    power_file: memory_power.json
  - name: ctrl
    parent: board/soc
    type: power_sequencer
    attrs: { script: "40000=voltage:0.8, 60000=off" }
  - name: host
    parent: board/soc
    type: fetch_core
    attrs: { max_fetches: "8" }
  - name: loader
    parent: board/soc
    type: loader
    attrs: { binary: image.bin, base: "0x0", entry: "0x0" }

ports:
  - { component: board/soc/ico, name: fetch, direction: input, kind: memory }
  - { component: board/soc/ico, name: data, direction: input, kind: memory }

bindings:
  - { from: board/soc/host.fetch, to: board/soc/ico.fetch }
  - { from: board/soc/host.data, to: board/soc/ico.data }
  - { from: board/soc/loader.out, to: board/soc/ico.input }
  - { from: board/soc/loader.start, to: board/soc/host.fetch_enable }
  - { from: board/soc/loader.entry, to: board/soc/host.entry }
  - { from: board/soc/ctrl.power, to: board/soc/comp.power }
  - { from: board/soc/ctrl.voltage, to: board/soc/comp.voltage }

clocks:
  - domain: board/soc/clock
    targets: [board/soc/host, board/soc/mem, board/soc/mem2, board/soc/comp]

mappings:
  - { router: board/soc/ico, name: mem, target: board/soc/mem.input, base: 0x0, size: "0x100000", rm_base: true }
  - { router: board/soc/ico, name: mem2, target: board/soc/mem2.input, base: "0x1000_0000", size: 0x100000, rm_base: true }
  - { router: board/soc/ico, name: comp, target: board/soc/comp.input, base: 0x20000000, size: 4096, rm_base: true }
"#;

fn board_from_yaml() -> (tempfile::TempDir, BoardConfig, Simulator) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("image.bin"), image()).unwrap();
    fs::write(
        dir.path().join("memory_power.json"),
        serde_json::to_string_pretty(&memory_power()).unwrap(),
    )
    .unwrap();
    let board = dir.path().join("board.yaml");
    fs::write(&board, BOARD_YAML).unwrap();

    let config = BoardConfig::from_file(&board).unwrap();
    let sim = assemble(&config, &create_default_registry()).unwrap();
    (dir, config, sim)
}

// ============================================================================
// Boot
// ============================================================================

fn check_boot(sim: &mut Simulator) {
    let outcome = sim.run_until(ns(1000)).unwrap();
    assert_eq!(outcome, RunOutcome::StopRequested);
    assert_eq!(sim.now(), ns(80));

    let host = sim.find("board/soc/host").unwrap();
    let host = sim.component::<FetchCore>(host).unwrap();
    let expected: Vec<(u64, u32)> = image()
        .chunks(4)
        .enumerate()
        .map(|(i, w)| (i as u64 * 4, u32::from_le_bytes([w[0], w[1], w[2], w[3]])))
        .collect();
    assert_eq!(host.fetched(), expected);
    assert_eq!(host.fetches(), FETCHES);
    assert_eq!(host.pc(), FETCHES * 4);

    let loader = sim.find("board/soc/loader").unwrap();
    assert!(sim.component::<ImageLoader>(loader).unwrap().booted());
}

#[test]
fn test_programmatic_board_boots() {
    let mut sim = build_board();
    check_boot(&mut sim);
}

#[test]
fn test_yaml_board_boots() {
    let (_dir, config, mut sim) = board_from_yaml();
    assert_eq!(config.simulation.max_time, 1_000_000);
    assert_eq!(sim.component_count(), 10);
    check_boot(&mut sim);
}

#[test]
fn test_both_boards_agree() {
    let mut built = build_board();
    let (_dir, _, mut loaded) = board_from_yaml();
    built.run_until(ns(1000)).unwrap();
    loaded.run_until(ns(1000)).unwrap();

    assert_eq!(built.stats(), loaded.stats());
    let built = built.export_stats();
    let loaded = loaded.export_stats();
    assert_eq!(built["components"], loaded["components"]);
}

// ============================================================================
// Power
// ============================================================================

#[test]
fn test_board_energy() {
    let mut sim = build_board();
    sim.run_until(ns(1000)).unwrap();

    let mem = sim.find("board/soc/mem").unwrap();
    let report = sim.power_report(mem).unwrap();
    // 8 loader writes, 8 fetches, 8 edges
    assert_eq!(report.operations["write_32"].count, FETCHES);
    assert_eq!(report.operations["read_32"].count, FETCHES);
    assert!((report.total_pj() - (20.0 + 12.0 + 8.08)).abs() < 1e-9);

    // comp: 4 edges at 1.2 V, then misses at 0.8 V until switched off at 60 ns
    let comp = sim.find("board/soc/comp").unwrap();
    let report = sim.power_report(comp).unwrap();
    assert!((report.background_pj - 4.0).abs() < 1e-9);
    assert_eq!(report.misses, 4);

    let stats = sim.collect_stats();
    assert_eq!(stats.components.len(), 10);
    assert!(stats.total_energy_pj() > 40.0);
    assert!(stats.power_to_csv().contains("board/soc/mem,"));
}

#[test]
fn test_stats_after_run() {
    let mut sim = build_board();
    sim.run_until(ns(1000)).unwrap();
    sim.finish().unwrap();

    let stats = sim.export_stats();
    assert_eq!(stats["engine"]["phase"], "finished");
    assert_eq!(stats["engine"]["current_time"], ns(80));
    assert_eq!(stats["components"]["board/soc/host"]["model"]["fetches"], FETCHES);
    assert_eq!(stats["components"]["board/soc/ico"]["model"]["routed"], 2 * FETCHES);
}

#[test]
fn test_capture_window_spans_the_soc() {
    let mut sim = build_board();
    sim.run_until(ns(20)).unwrap();

    let ico = sim.find("board/soc/ico").unwrap();
    let input = InputRef {
        component: ico,
        index: 0,
    };
    sim.debug_request(input, MemRequest::write_u32(0x1000_0000, CAPTURE_START))
        .unwrap();
    assert_eq!(sim.run_until(ns(1000)).unwrap(), RunOutcome::StopRequested);
    sim.debug_request(input, MemRequest::write_u32(0x1000_0000, CAPTURE_STOP))
        .unwrap();

    let window = &sim.captures()[0];
    assert_eq!(window.trigger, "board/soc/mem2");
    assert_eq!((window.start, window.end), (ns(20), ns(80)));
    // Fetches from mem land inside a window opened on mem2.
    assert!(window.components["board/soc/mem"] >= 1.5);
    assert!(window.components.contains_key("board/soc/comp"));
    // mem2 only marks the window; it has no power table.
    assert!(!window.components.contains_key("board/soc/mem2"));
    let sum: f64 = window.components.values().sum();
    assert!((window.energy_pj - sum).abs() < 1e-9);
}

#[test]
fn test_reports_written_to_output_dir() {
    let (dir, mut config, mut sim) = board_from_yaml();
    assert_eq!(config.report_dir(), None);

    config.simulation.collect_stats = true;
    config.simulation.output_dir = Some("results".to_string());
    let out = config.report_dir().unwrap();
    assert_eq!(out, dir.path().join("results"));

    sim.run_until(config.simulation.max_time).unwrap();
    let files = sim.collect_stats().write_reports(&out).unwrap();
    assert_eq!(files.len(), 3);
    let power = fs::read_to_string(out.join("power.csv")).unwrap();
    assert!(power.contains("board/soc/mem,"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_bad_boards_are_rejected() {
    let registry = create_default_registry();

    let config = BoardConfigBuilder::new()
        .component(ComponentConfig::new("mem", "dram"))
        .build()
        .unwrap();
    assert!(matches!(
        assemble(&config, &registry),
        Err(SimError::UnknownComponentType { .. })
    ));

    let config = BoardConfigBuilder::new()
        .component(ComponentConfig::new("ctrl", "power_sequencer").attr("script", "10=sleep"))
        .build()
        .unwrap();
    assert!(matches!(
        assemble(&config, &registry),
        Err(SimError::InvalidPowerScript { .. })
    ));

    let config = BoardConfigBuilder::new()
        .component(ComponentConfig::new("mem", "memory").attr("size", "lots"))
        .build()
        .unwrap();
    assert!(matches!(
        assemble(&config, &registry),
        Err(SimError::InvalidAttribute { .. })
    ));

    let config = BoardConfigBuilder::new()
        .component(ComponentConfig::new("ico", "router"))
        .component(ComponentConfig::new("a", "memory").attr("size", "0x100"))
        .component(ComponentConfig::new("b", "memory").attr("size", "0x100"))
        .map("ico", "a", "a.input", 0x0, 0x100, true)
        .map("ico", "b", "b.input", 0x80, 0x100, true)
        .build()
        .unwrap();
    assert!(matches!(
        assemble(&config, &registry),
        Err(SimError::Overlap { .. })
    ));

    assert!(BoardConfigBuilder::new()
        .bind("ghost.out", "mem.input")
        .build()
        .is_err());
}

#[test]
fn test_loader_fault_aborts_boot() {
    let mut graph = GraphBuilder::new();
    let ico = graph.add_component(None, "ico", Router::new()).unwrap();
    let mem = graph.add_component(None, "mem", Memory::new(0x10)).unwrap();
    let loader = graph
        .add_component(
            None,
            "loader",
            ImageLoader::new(0).with_segment(0x1000, vec![0; 4]),
        )
        .unwrap();
    let input = graph.input(mem, "input").unwrap();
    graph.map(ico, "mem", input, 0x0, 0x10, true).unwrap();
    graph.connect(loader, "out", ico, "input").unwrap();

    let mut sim = graph.build();
    assert!(matches!(
        sim.run_until(ns(10)),
        Err(SimError::LoadFailed { addr: 0x1000 })
    ));
    assert_eq!(sim.phase(), socweave::SimPhase::Aborted);
}
