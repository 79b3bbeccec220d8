//! Statistics collection and export.
//!
//! [`Simulator::collect_stats`](crate::engine::Simulator::collect_stats)
//! produces a [`SimulationStats`] snapshot that can be exported as JSON,
//! CSV (engine metrics and per-component energy) or a human-readable
//! summary.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::engine::{ComponentCounters, EngineStats, SimPhase};
use crate::power::{CaptureWindow, PowerReport};
use crate::queue::QueueStats;
use crate::types::{SimTime, PS_PER_NS};

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Simulation metadata
    pub metadata: SimulationMetadata,

    /// Simulated time at the snapshot, in picoseconds
    pub final_time: SimTime,

    /// Lifecycle phase at the snapshot
    pub phase: SimPhase,

    /// Engine-level counters
    pub engine: EngineStats,

    /// Event queue counters
    pub queue: QueueStats,

    /// Per-component statistics in creation order
    pub components: Vec<ComponentStats>,

    /// Closed power capture windows
    pub captures: Vec<CaptureWindow>,

    /// Timing statistics
    pub timing: TimingStats,
}

/// Metadata about the simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationMetadata {
    /// Simulation name/description
    pub name: String,

    /// Crate version
    pub version: String,

    /// Board file used (if any)
    pub config_file: Option<String>,
}

/// Statistics of one component.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComponentStats {
    /// Full path
    pub path: String,

    /// Model name
    pub type_name: String,

    /// Activity counters kept by the engine
    pub counters: ComponentCounters,

    /// Model-specific statistics
    pub model: serde_json::Value,

    /// Energy report, for components with a power model
    pub power: Option<PowerReport>,
}

/// Timing/performance statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Simulated nanoseconds per wall-clock second
    pub sim_ns_per_second: f64,

    /// Events dispatched per wall-clock second
    pub events_per_second: f64,
}

impl SimulationStats {
    /// Creates a new empty statistics container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self.metadata.version = env!("CARGO_PKG_VERSION").to_string();
        self
    }

    /// Records the board file the run was built from.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.metadata.config_file = Some(path.into());
        self
    }

    /// Updates timing statistics based on wall clock time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;

        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.sim_ns_per_second =
                self.final_time as f64 / PS_PER_NS as f64 / seconds;
            self.timing.events_per_second = self.engine.events_dispatched as f64 / seconds;
        }
    }

    /// Looks up the statistics of a component by path.
    pub fn component(&self, path: &str) -> Option<&ComponentStats> {
        self.components.iter().find(|c| c.path == path)
    }

    /// Total energy over all components, in pJ.
    pub fn total_energy_pj(&self) -> f64 {
        self.components
            .iter()
            .filter_map(|c| c.power.as_ref())
            .map(PowerReport::total_pj)
            .sum()
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");

        csv.push_str(&format!("final_time_ps,{}\n", self.final_time));
        csv.push_str(&format!("events_dispatched,{}\n", self.engine.events_dispatched));
        csv.push_str(&format!("timers_fired,{}\n", self.engine.timers_fired));
        csv.push_str(&format!("inline_deliveries,{}\n", self.engine.inline_deliveries));
        csv.push_str(&format!("deferred_deliveries,{}\n", self.engine.deferred_deliveries));
        csv.push_str(&format!("requests,{}\n", self.engine.requests));
        csv.push_str(&format!("power_misses,{}\n", self.engine.power_misses));
        csv.push_str(&format!("events_scheduled,{}\n", self.queue.scheduled));
        csv.push_str(&format!("events_cancelled,{}\n", self.queue.cancelled));
        csv.push_str(&format!("peak_queue_depth,{}\n", self.queue.peak_depth));
        csv.push_str(&format!("component_count,{}\n", self.components.len()));
        csv.push_str(&format!("total_energy_pj,{:.6}\n", self.total_energy_pj()));

        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("sim_ns_per_second,{:.2}\n", self.timing.sim_ns_per_second));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.timing.events_per_second));

        csv
    }

    /// Exports summary statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Exports per-component energy to CSV.
    pub fn power_to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("component,dynamic_pj,background_pj,leakage_pj,total_pj,samples,misses\n");

        for component in &self.components {
            if let Some(power) = &component.power {
                csv.push_str(&format!(
                    "{},{:.6},{:.6},{:.6},{:.6},{},{}\n",
                    component.path,
                    power.dynamic_pj,
                    power.background_pj,
                    power.leakage_pj,
                    power.total_pj(),
                    power.samples,
                    power.misses,
                ));
            }
        }

        csv
    }

    /// Exports per-component energy to CSV file.
    pub fn power_to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.power_to_csv())
    }

    /// Writes `stats.json`, `stats.csv` and `power.csv` into `dir`,
    /// creating it if needed. Returns the files written.
    pub fn write_reports<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let json = dir.join("stats.json");
        self.to_json_file(&json)?;
        let csv = dir.join("stats.csv");
        self.to_csv_file(&csv)?;
        let power = dir.join("power.csv");
        self.power_to_csv_file(&power)?;
        Ok(vec![json, csv, power])
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Statistics ===")?;
        writeln!(w)?;

        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if let Some(ref config) = self.metadata.config_file {
            writeln!(w, "Board: {}", config)?;
        }
        writeln!(w)?;

        writeln!(w, "--- Engine ---")?;
        writeln!(
            w,
            "Final simulation time: {} ps ({:.3} us)",
            self.final_time,
            self.final_time as f64 / 1e6
        )?;
        writeln!(w, "Phase: {:?}", self.phase)?;
        writeln!(w, "Events dispatched: {}", self.engine.events_dispatched)?;
        writeln!(w, "Memory requests: {}", self.engine.requests)?;
        writeln!(
            w,
            "Deliveries: {} inline, {} deferred",
            self.engine.inline_deliveries, self.engine.deferred_deliveries
        )?;
        writeln!(w, "Peak queue depth: {}", self.queue.peak_depth)?;
        writeln!(w)?;

        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Sim ns/sec: {:.2}", self.timing.sim_ns_per_second)?;
        writeln!(w, "Events/sec: {:.2}", self.timing.events_per_second)?;
        writeln!(w)?;

        writeln!(w, "--- Power ---")?;
        for component in &self.components {
            let Some(power) = &component.power else {
                continue;
            };
            writeln!(w, "{} ({}):", component.path, component.type_name)?;
            writeln!(
                w,
                "  Total: {:.3} pJ (dynamic {:.3}, background {:.3}, leakage {:.3})",
                power.total_pj(),
                power.dynamic_pj,
                power.background_pj,
                power.leakage_pj
            )?;
            for (op, energy) in &power.operations {
                writeln!(w, "  {}: {} x, {:.3} pJ", op, energy.count, energy.energy_pj)?;
            }
            if power.misses > 0 {
                writeln!(w, "  Samples without cost data: {}", power.misses)?;
            }
        }
        writeln!(w, "Total energy: {:.3} pJ", self.total_energy_pj())?;

        for window in &self.captures {
            writeln!(w)?;
            writeln!(
                w,
                "Capture {}..{} ps ({}): {:.3} pJ, {:.6} W",
                window.start,
                window.end,
                window.trigger,
                window.energy_pj,
                window.average_power_w()
            )?;
            for (path, energy) in &window.components {
                writeln!(w, "  {path}: {energy:.3} pJ")?;
            }
        }

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
