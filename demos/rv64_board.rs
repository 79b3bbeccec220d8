//! RV64 Board Example
//!
//! Builds a small virtual platform and boots it:
//! - A fetch core and a boot loader sharing one interconnect (`ico`)
//! - Two memories and a power-controlled peripheral behind it
//! - A 100 MHz clock domain driving the whole SoC
//! - Power tables on the memories, with a capture window opened and closed
//!   by writes to the trigger word of `mem2`
//!
//! Pass a board file to run it instead of the built-in board. Its
//! `collect_stats` and `output_dir` settings decide whether the summary is
//! printed and where the JSON/CSV reports go:
//!
//! ```text
//! cargo run --example rv64_board -- demos/board.yaml
//! ```

use std::env;
use std::process::ExitCode;

use socweave::components::memory::{CAPTURE_START, CAPTURE_STOP};
use socweave::components::{FetchCore, Group, ImageLoader, Memory, PowerSequencer};
use socweave::{
    assemble, create_default_registry, init_logging, ns, us, BoardConfig, BoardConfigBuilder,
    ClockDomain, GraphBuilder, InputRef, MemRequest, PortKind, PowerCommand, PowerState, Router,
    SimResult, Simulator, Timer,
};

const CLOCK_FREQUENCY: f64 = 100e6;
const MEM_BASE: u64 = 0x0000_0000;
const MEM2_BASE: u64 = 0x1000_0000;
const COMP_BASE: u64 = 0x2000_0000;
const MEM_SIZE: u64 = 0x10_0000;
const BOOT_WORDS: u32 = 64;
const SIMULATION_TIME: u64 = us(2);

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

/// `addi x0, x0, i` for every word.
fn boot_image() -> Vec<u8> {
    (0..BOOT_WORDS)
        .flat_map(|i| (0x0000_0013u32 | (i << 20)).to_le_bytes())
        .collect()
}

fn build_board() -> SimResult<Simulator> {
    let mut graph = GraphBuilder::new();
    let board = graph.add_component(None, "board", Group::new())?;
    let soc = graph.add_component(Some(board), "soc", Group::new())?;

    let clock = graph.add_component(Some(soc), "clock", ClockDomain::new(CLOCK_FREQUENCY)?)?;
    let ico = graph.add_component(Some(soc), "ico", Router::new().with_latency(ns(1)))?;
    let mem = graph.add_component(Some(soc), "mem", Memory::new(MEM_SIZE as usize))?;
    let mem2 = graph.add_component(
        Some(soc),
        "mem2",
        Memory::new(MEM_SIZE as usize).with_power_trigger(true),
    )?;
    let comp = graph.add_component(Some(soc), "comp", Memory::new(0x1000))?;
    let ctrl = graph.add_component(
        Some(soc),
        "ctrl",
        PowerSequencer::new()
            .with_step(us(1), PowerCommand::SetState(PowerState::Off))
            .with_step(ns(1500), PowerCommand::SetState(PowerState::On)),
    )?;
    let host = graph.add_component(Some(soc), "host", FetchCore::new())?;
    let loader = graph.add_component(
        Some(soc),
        "loader",
        ImageLoader::new(MEM_BASE).with_segment(MEM_BASE, boot_image()),
    )?;

    graph.add_properties(mem, &memory_power())?;
    graph.add_properties(mem2, &memory_power())?;
    graph.add_properties(comp, &memory_power())?;

    // One router input per initiator.
    graph.declare_input_port(ico, "fetch", PortKind::Memory)?;
    graph.declare_input_port(ico, "data", PortKind::Memory)?;
    graph.connect(host, "fetch", ico, "fetch")?;
    graph.connect(host, "data", ico, "data")?;
    graph.connect(loader, "out", ico, "input")?;
    graph.connect(loader, "start", host, "fetch_enable")?;
    graph.connect(loader, "entry", host, "entry")?;
    graph.connect(ctrl, "power", comp, "power")?;
    graph.connect(ctrl, "voltage", comp, "voltage")?;

    for target in [host, mem, mem2, comp] {
        graph.bind_clock(clock, target)?;
    }

    let input = graph.input(mem, "input")?;
    graph.map(ico, "mem", input, MEM_BASE, MEM_SIZE, true)?;
    let input = graph.input(mem2, "input")?;
    graph.map(ico, "mem2", input, MEM2_BASE, MEM_SIZE, true)?;
    let input = graph.input(comp, "input")?;
    graph.map(ico, "comp", input, COMP_BASE, 0x1000, true)?;

    Ok(graph.build())
}

fn run(path: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let (mut sim, config) = match path {
        Some(path) => {
            let config = BoardConfig::from_file(path)?;
            init_logging(&config.simulation.log_level);
            let sim = assemble(&config, &create_default_registry())?;
            (sim, config)
        }
        None => {
            init_logging("info");
            let config = BoardConfigBuilder::new()
                .max_time(SIMULATION_TIME)
                .collect_stats(true)
                .build()?;
            (build_board()?, config)
        }
    };
    let limit = config.simulation.max_time;

    println!("Board: {} components", sim.component_count());
    println!("Running for {} ns", limit / ns(1));
    println!();

    let timer = Timer::start();

    // Measure the second half of the run across the whole SoC.
    let half = limit / 2;
    sim.run_until(half)?;
    match sim.find("board/soc/ico") {
        Some(ico) => {
            // The router's own `input` port comes first in its table.
            let input = InputRef {
                component: ico,
                index: 0,
            };
            sim.debug_request(input, MemRequest::write_u32(MEM2_BASE, CAPTURE_START))?;
            sim.run_until(limit)?;
            sim.debug_request(input, MemRequest::write_u32(MEM2_BASE, CAPTURE_STOP))?;
        }
        None => {
            sim.run_until(limit)?;
        }
    }
    sim.finish()?;

    for window in sim.captures() {
        println!(
            "Capture {}..{} ns: {:.3} pJ, {:.6} mW",
            window.start / ns(1),
            window.end / ns(1),
            window.energy_pj,
            window.average_power_w() * 1e3
        );
    }

    if !config.simulation.collect_stats {
        println!("Finished at {} ns", sim.now() / ns(1));
        return Ok(());
    }

    let mut stats = sim.collect_stats().with_name("rv64_board");
    if let Some(path) = path {
        stats = stats.with_config_file(path);
    }
    stats.compute_timing(timer.elapsed_ms());

    println!();
    stats.write_summary(std::io::stdout())?;
    println!();
    print!("{}", stats.power_to_csv());

    if let Some(dir) = config.report_dir() {
        for file in stats.write_reports(&dir)? {
            println!("Wrote {}", file.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let path = env::args().nth(1);
    match run(path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
