//! Declarative power and energy model.
//!
//! A [`PowerTable`] is parsed once, when it is attached to a component, from
//! the nested layout used by board descriptions:
//!
//! ```json
//! {
//!   "read_32": {
//!     "dynamic": {
//!       "type": "linear",
//!       "unit": "pJ",
//!       "values": { "25": { "1.2": { "any": "1.5" } } }
//!     }
//!   }
//! }
//! ```
//!
//! i.e. `operation -> {dynamic|leakage} -> {type, unit, values}` with
//! `values` keyed by temperature, then voltage, then load. Scalars may be
//! numbers or numeric strings.
//!
//! At run time a [`PowerModel`] holds the component's operating point and
//! accumulates energy into a [`PowerReport`]:
//! - access operations (`read_32`, `write_32`, ...) are sampled once per
//!   occurrence and must be expressed in energy units;
//! - the `background` operation is sampled on every clock edge and its
//!   `dynamic` and `leakage` power (W) is integrated over the clock period.
//!
//! W × ps = pJ, so no scaling is needed when integrating power over
//! [`SimTime`].
//!
//! A [`CaptureRecorder`] brackets a measurement across the whole graph: it
//! snapshots every component's total energy when a window opens and again
//! when it closes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SimError, SimResult};
use crate::event::{PowerCommand, PowerState};
use crate::types::SimTime;

/// Temperature assumed until a control port says otherwise, in °C.
pub const DEFAULT_TEMPERATURE: f64 = 25.0;

/// Voltage assumed until a control port says otherwise, in V.
pub const DEFAULT_VOLTAGE: f64 = 1.2;

/// Operation sampled on every clock edge.
pub const BACKGROUND: &str = "background";

/// Relative tolerance for matching table keys.
const KEY_EPSILON: f64 = 1e-9;

/// Which part of an operation's consumption a table describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostKind {
    Dynamic,
    Leakage,
}

impl CostKind {
    fn key(self) -> &'static str {
        match self {
            CostKind::Dynamic => "dynamic",
            CostKind::Leakage => "leakage",
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How to answer a query that falls between table keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Linear interpolation between the two bracketing keys
    Linear,
    /// Exact matches only
    Exact,
}

/// Canonical unit of a table after parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUnit {
    /// Power in watts
    Watt,
    /// Energy in picojoules
    PicoJoule,
}

impl PowerUnit {
    /// Parses a unit name, returning the canonical unit and the scale factor
    /// to apply to raw values.
    fn parse(unit: &str) -> Option<(PowerUnit, f64)> {
        match unit {
            "W" => Some((PowerUnit::Watt, 1.0)),
            "mW" => Some((PowerUnit::Watt, 1e-3)),
            "uW" => Some((PowerUnit::Watt, 1e-6)),
            "pJ" => Some((PowerUnit::PicoJoule, 1.0)),
            "nJ" => Some((PowerUnit::PicoJoule, 1e3)),
            _ => None,
        }
    }
}

/// Load condition of a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Load {
    /// No particular load; matches `"any"` entries
    #[default]
    Any,
    /// A numeric load factor
    Value(f64),
}

/// Conditions a cost is looked up under.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// Temperature in °C
    pub temperature: f64,
    /// Supply voltage in V
    pub voltage: f64,
    /// Load condition
    pub load: Load,
}

impl OperatingPoint {
    /// Builds an operating point with `Load::Any`.
    pub fn new(temperature: f64, voltage: f64) -> Self {
        Self {
            temperature,
            voltage,
            load: Load::Any,
        }
    }

    /// Sets the load condition.
    pub fn with_load(mut self, load: Load) -> Self {
        self.load = load;
        self
    }
}

impl Default for OperatingPoint {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE, DEFAULT_VOLTAGE)
    }
}

/// A sampled value with its unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub value: f64,
    pub unit: PowerUnit,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct LoadAxis {
    any: Option<f64>,
    points: Vec<(f64, f64)>,
}

/// Cost values of one operation and kind over temperature, voltage and load.
#[derive(Clone, Debug, PartialEq)]
pub struct CostTable {
    interpolation: Interpolation,
    unit: PowerUnit,
    values: Vec<(f64, Vec<(f64, LoadAxis)>)>,
}

impl CostTable {
    /// Interpolation policy.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Canonical unit of the sampled values.
    pub fn unit(&self) -> PowerUnit {
        self.unit
    }

    /// Looks up the cost at `point`.
    ///
    /// On failure returns a human-readable reason.
    pub fn sample(&self, point: &OperatingPoint) -> Result<f64, String> {
        let interp = self.interpolation;
        sample_axis(&self.values, point.temperature, interp, "temperature", |volts| {
            sample_axis(volts, point.voltage, interp, "voltage", |loads| {
                sample_load(loads, point.load, interp)
            })
        })
    }
}

fn keys_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= KEY_EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn sample_axis<V>(
    points: &[(f64, V)],
    key: f64,
    interp: Interpolation,
    axis: &str,
    inner: impl Fn(&V) -> Result<f64, String>,
) -> Result<f64, String> {
    if let Some((_, value)) = points.iter().find(|(k, _)| keys_match(*k, key)) {
        return inner(value);
    }
    if interp == Interpolation::Exact {
        return Err(format!("no entry for {axis} {key}"));
    }

    let hi = points.partition_point(|(k, _)| *k < key);
    if hi == 0 || hi == points.len() {
        return Err(format!("{axis} {key} has no bracketing entries"));
    }
    let (lo_key, lo_val) = &points[hi - 1];
    let (hi_key, hi_val) = &points[hi];
    let a = inner(lo_val)?;
    let b = inner(hi_val)?;
    Ok(lerp(*lo_key, a, *hi_key, b, key))
}

fn sample_load(axis: &LoadAxis, load: Load, interp: Interpolation) -> Result<f64, String> {
    if let Load::Value(x) = load {
        if !axis.points.is_empty() {
            match sample_axis(&axis.points, x, interp, "load", |v| Ok(*v)) {
                Ok(v) => return Ok(v),
                Err(reason) if axis.any.is_none() => return Err(reason),
                Err(_) => {}
            }
        }
    }
    axis.any
        .ok_or_else(|| "no entry for load 'any'".to_string())
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Costs of one operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationCosts {
    pub dynamic: Option<CostTable>,
    pub leakage: Option<CostTable>,
}

impl OperationCosts {
    /// Returns the table for `kind`.
    pub fn get(&self, kind: CostKind) -> Option<&CostTable> {
        match kind {
            CostKind::Dynamic => self.dynamic.as_ref(),
            CostKind::Leakage => self.leakage.as_ref(),
        }
    }
}

/// Parsed, validated power table of one component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerTable {
    operations: BTreeMap<String, OperationCosts>,
}

fn invalid(reason: impl Into<String>) -> SimError {
    SimError::InvalidPowerTable {
        reason: reason.into(),
    }
}

fn parse_number(value: &Value, at: &str) -> SimResult<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(format!("{at}: expected a number, found {value}"))),
    }
}

fn parse_key(key: &str, at: &str) -> SimResult<f64> {
    match key.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(format!("{at}: '{key}' is not a numeric key"))),
    }
}

fn as_object<'v>(value: &'v Value, at: &str) -> SimResult<&'v serde_json::Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| invalid(format!("{at}: expected an object")))
}

/// Sorts an axis and rejects keys that collapse onto each other.
fn finish_axis<V>(mut points: Vec<(f64, V)>, at: &str) -> SimResult<Vec<(f64, V)>> {
    if points.is_empty() {
        return Err(invalid(format!("{at}: no entries")));
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    if points.windows(2).any(|w| keys_match(w[0].0, w[1].0)) {
        return Err(invalid(format!("{at}: duplicate keys")));
    }
    Ok(points)
}

fn parse_loads(value: &Value, scale: f64, at: &str) -> SimResult<LoadAxis> {
    let mut axis = LoadAxis::default();
    let mut points = Vec::new();
    for (key, raw) in as_object(value, at)? {
        let here = format!("{at}.{key}");
        let v = parse_number(raw, &here)? * scale;
        if key.trim() == "any" {
            axis.any = Some(v);
        } else {
            points.push((parse_key(key, &here)?, v));
        }
    }
    if axis.any.is_none() && points.is_empty() {
        return Err(invalid(format!("{at}: no entries")));
    }
    if !points.is_empty() {
        axis.points = finish_axis(points, at)?;
    }
    Ok(axis)
}

fn parse_cost_table(value: &Value, at: &str) -> SimResult<CostTable> {
    let obj = as_object(value, at)?;

    let interpolation = match obj.get("type").map(|t| t.as_str()) {
        None => Interpolation::Exact,
        Some(Some("linear")) => Interpolation::Linear,
        Some(Some("exact")) | Some(Some("none")) => Interpolation::Exact,
        Some(other) => {
            return Err(invalid(format!(
                "{at}.type: unsupported interpolation {}",
                other.unwrap_or("<non-string>")
            )))
        }
    };

    let unit_name = obj
        .get("unit")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("{at}: missing unit")))?;
    let (unit, scale) = PowerUnit::parse(unit_name)
        .ok_or_else(|| invalid(format!("{at}.unit: unknown unit '{unit_name}'")))?;

    let values_at = format!("{at}.values");
    let values = obj
        .get("values")
        .ok_or_else(|| invalid(format!("{at}: missing values")))?;

    let mut temps = Vec::new();
    for (temp_key, volts) in as_object(values, &values_at)? {
        let temp_at = format!("{values_at}.{temp_key}");
        let temperature = parse_key(temp_key, &temp_at)?;
        let mut volt_points = Vec::new();
        for (volt_key, loads) in as_object(volts, &temp_at)? {
            let volt_at = format!("{temp_at}.{volt_key}");
            let voltage = parse_key(volt_key, &volt_at)?;
            volt_points.push((voltage, parse_loads(loads, scale, &volt_at)?));
        }
        temps.push((temperature, finish_axis(volt_points, &temp_at)?));
    }

    Ok(CostTable {
        interpolation,
        unit,
        values: finish_axis(temps, &values_at)?,
    })
}

impl PowerTable {
    /// Parses and validates a table from its JSON representation.
    ///
    /// # Errors
    /// `InvalidPowerTable` naming the first offending path.
    pub fn from_value(value: &Value) -> SimResult<Self> {
        let mut operations = BTreeMap::new();
        for (op, kinds) in as_object(value, "power table")? {
            let mut costs = OperationCosts::default();
            for (kind, table) in as_object(kinds, op)? {
                let at = format!("{op}.{kind}");
                match kind.as_str() {
                    "dynamic" => costs.dynamic = Some(parse_cost_table(table, &at)?),
                    "leakage" => costs.leakage = Some(parse_cost_table(table, &at)?),
                    _ => return Err(invalid(format!("{at}: unknown cost kind"))),
                }
            }
            operations.insert(op.clone(), costs);
        }
        Ok(Self { operations })
    }

    /// Parses a table from a JSON string.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| invalid(format!("malformed JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Returns the costs of `op`.
    pub fn operation(&self, op: &str) -> Option<&OperationCosts> {
        self.operations.get(op)
    }

    /// Names of all operations in the table.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Returns true if the table describes `op`.
    pub fn contains(&self, op: &str) -> bool {
        self.operations.contains_key(op)
    }

    /// Looks up the `kind` cost of `op` at `point`.
    ///
    /// # Errors
    /// `NoCostData` if the operation or kind is absent, or the point is not
    /// covered and cannot be interpolated.
    pub fn sample(&self, op: &str, kind: CostKind, point: &OperatingPoint) -> SimResult<Cost> {
        let no_data = |reason: String| SimError::NoCostData {
            operation: op.to_string(),
            reason,
        };
        let table = self
            .operations
            .get(op)
            .ok_or_else(|| no_data("operation not in table".to_string()))?
            .get(kind)
            .ok_or_else(|| no_data(format!("no {kind} costs")))?;
        let value = table.sample(point).map_err(no_data)?;
        Ok(Cost {
            value,
            unit: table.unit,
        })
    }
}

/// Energy attributed to one operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationEnergy {
    /// Number of samples taken
    pub count: u64,
    /// Accumulated energy in pJ
    pub energy_pj: f64,
}

/// A system-wide measurement window opened and closed by a power trigger.
///
/// The window covers every component with a power model, not only the
/// trigger itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureWindow {
    /// Path of the component that opened the window
    pub trigger: String,
    pub start: SimTime,
    pub end: SimTime,
    /// Energy consumed inside the window over all components, in pJ
    pub energy_pj: f64,
    /// Per-component share of `energy_pj`, by path
    pub components: BTreeMap<String, f64>,
}

impl CaptureWindow {
    /// Average power over the window in W (pJ / ps).
    pub fn average_power_w(&self) -> f64 {
        let duration = self.end.saturating_sub(self.start);
        if duration == 0 {
            0.0
        } else {
            self.energy_pj / duration as f64
        }
    }
}

#[derive(Clone, Debug)]
struct OpenCapture {
    trigger: String,
    start: SimTime,
    baseline: BTreeMap<String, f64>,
}

/// Records capture windows from snapshots of every component's total energy.
#[derive(Clone, Debug, Default)]
pub struct CaptureRecorder {
    open: Option<OpenCapture>,
    windows: Vec<CaptureWindow>,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a window is open.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Opens a window at `now` with the given `(path, total_pj)` snapshot.
    ///
    /// Returns false, keeping the current window, if one is already open.
    pub fn start<'a>(
        &mut self,
        trigger: &str,
        now: SimTime,
        totals: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> bool {
        if self.open.is_some() {
            return false;
        }
        self.open = Some(OpenCapture {
            trigger: trigger.to_string(),
            start: now,
            baseline: totals
                .into_iter()
                .map(|(path, total)| (path.to_string(), total))
                .collect(),
        });
        true
    }

    /// Closes the open window at `now`, if any, and returns it.
    pub fn stop<'a>(
        &mut self,
        now: SimTime,
        totals: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Option<&CaptureWindow> {
        let open = self.open.take()?;
        let components: BTreeMap<String, f64> = totals
            .into_iter()
            .map(|(path, total)| {
                let before = open.baseline.get(path).copied().unwrap_or(0.0);
                (path.to_string(), total - before)
            })
            .collect();
        self.windows.push(CaptureWindow {
            trigger: open.trigger,
            start: open.start,
            end: now,
            energy_pj: components.values().sum(),
            components,
        });
        self.windows.last()
    }

    /// Closed windows in the order they were recorded.
    pub fn windows(&self) -> &[CaptureWindow] {
        &self.windows
    }
}

/// Energy accumulated by one component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerReport {
    /// Access-triggered energy in pJ
    pub dynamic_pj: f64,
    /// Integrated background dynamic power in pJ
    pub background_pj: f64,
    /// Integrated background leakage in pJ
    pub leakage_pj: f64,
    /// Successful samples
    pub samples: u64,
    /// Samples without cost data
    pub misses: u64,
    /// Per-operation breakdown of access energy
    pub operations: BTreeMap<String, OperationEnergy>,
}

impl PowerReport {
    /// Total energy in pJ.
    pub fn total_pj(&self) -> f64 {
        self.dynamic_pj + self.background_pj + self.leakage_pj
    }
}

/// Runtime power state of one component.
#[derive(Clone, Debug)]
pub struct PowerModel {
    table: PowerTable,
    point: OperatingPoint,
    state: PowerState,
    report: PowerReport,
}

impl PowerModel {
    /// Wraps a table with the default operating point.
    pub fn new(table: PowerTable) -> Self {
        Self {
            table,
            point: OperatingPoint::default(),
            state: PowerState::On,
            report: PowerReport::default(),
        }
    }

    /// Sets the initial operating point.
    pub fn with_operating_point(mut self, point: OperatingPoint) -> Self {
        self.point = point;
        self
    }

    /// The attached table.
    pub fn table(&self) -> &PowerTable {
        &self.table
    }

    /// The operating point used by the next sample.
    pub fn operating_point(&self) -> OperatingPoint {
        self.point
    }

    /// Current power state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Applies a control command; it affects subsequent samples only.
    pub fn apply(&mut self, cmd: PowerCommand) {
        match cmd {
            PowerCommand::SetState(state) => self.state = state,
            PowerCommand::SetVoltage(v) => self.point.voltage = v,
            PowerCommand::SetTemperature(t) => self.point.temperature = t,
        }
    }

    /// Accumulated energy.
    pub fn report(&self) -> &PowerReport {
        &self.report
    }

    /// Samples one occurrence of access operation `op` and returns its energy in pJ.
    ///
    /// A component that is off consumes nothing.
    ///
    /// # Errors
    /// `NoCostData` if the table cannot price the operation; the miss is
    /// recorded in the report.
    pub fn account_operation(&mut self, op: &str) -> SimResult<f64> {
        if self.state == PowerState::Off {
            return Ok(0.0);
        }
        let energy = match self.table.sample(op, CostKind::Dynamic, &self.point) {
            Ok(Cost {
                value,
                unit: PowerUnit::PicoJoule,
            }) => value,
            Ok(Cost { .. }) => {
                self.report.misses += 1;
                return Err(SimError::NoCostData {
                    operation: op.to_string(),
                    reason: "access cost is not an energy".to_string(),
                });
            }
            Err(err) => {
                self.report.misses += 1;
                return Err(err);
            }
        };

        self.report.samples += 1;
        self.report.dynamic_pj += energy;
        let entry = self.report.operations.entry(op.to_string()).or_default();
        entry.count += 1;
        entry.energy_pj += energy;
        Ok(energy)
    }

    /// Integrates background power over `duration` and returns the energy in pJ.
    ///
    /// Tables without a `background` operation consume nothing. Dynamic and
    /// leakage parts are accounted independently; if either cannot be
    /// sampled the other is still accounted and the first error returned.
    pub fn account_background(&mut self, duration: SimTime) -> SimResult<f64> {
        if self.state == PowerState::Off || !self.table.contains(BACKGROUND) {
            return Ok(0.0);
        }

        let mut first_error = None;
        let mut total = 0.0;
        for kind in [CostKind::Dynamic, CostKind::Leakage] {
            let has_kind = self
                .table
                .operation(BACKGROUND)
                .and_then(|costs| costs.get(kind))
                .is_some();
            if !has_kind {
                continue;
            }

            match self.table.sample(BACKGROUND, kind, &self.point) {
                Ok(Cost {
                    value,
                    unit: PowerUnit::Watt,
                }) => {
                    let energy = value * duration as f64;
                    match kind {
                        CostKind::Dynamic => self.report.background_pj += energy,
                        CostKind::Leakage => self.report.leakage_pj += energy,
                    }
                    self.report.samples += 1;
                    total += energy;
                }
                Ok(Cost { .. }) => {
                    self.report.misses += 1;
                    first_error.get_or_insert(SimError::NoCostData {
                        operation: BACKGROUND.to_string(),
                        reason: format!("{kind} background cost is not a power"),
                    });
                }
                Err(err) => {
                    self.report.misses += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_table() -> Value {
        json!({
            "background": {
                "dynamic": {
                    "type": "linear",
                    "unit": "W",
                    "values": { "25": { "1.2": { "any": "0.0001" } } }
                },
                "leakage": {
                    "type": "linear",
                    "unit": "W",
                    "values": { "25": { "1.2": { "any": "0.000001" } } }
                }
            },
            "read_32": {
                "dynamic": {
                    "type": "linear",
                    "unit": "pJ",
                    "values": { "25": { "1.2": { "any": "1.5" } } }
                }
            },
            "write_32": {
                "dynamic": {
                    "type": "linear",
                    "unit": "pJ",
                    "values": { "25": { "1.2": { "any": "2.5" } } }
                }
            }
        })
    }

    fn grid_table() -> PowerTable {
        PowerTable::from_value(&json!({
            "read_32": {
                "dynamic": {
                    "type": "linear",
                    "unit": "pJ",
                    "values": {
                        "25": { "0.8": { "any": 1.0 }, "1.2": { "any": 2.0 } },
                        "85": { "0.8": { "any": 3.0 }, "1.2": { "any": 4.0 } }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_board_table() {
        let table = PowerTable::from_value(&memory_table()).unwrap();
        let ops: Vec<&str> = table.operations().collect();
        assert_eq!(ops, vec!["background", "read_32", "write_32"]);

        let bg = table.operation("background").unwrap();
        assert_eq!(bg.dynamic.as_ref().unwrap().unit(), PowerUnit::Watt);
        assert_eq!(
            bg.leakage.as_ref().unwrap().interpolation(),
            Interpolation::Linear
        );
    }

    #[test]
    fn test_exact_sample() {
        let table = PowerTable::from_value(&memory_table()).unwrap();
        let cost = table
            .sample("read_32", CostKind::Dynamic, &OperatingPoint::new(25.0, 1.2))
            .unwrap();
        assert_eq!(cost.value, 1.5);
        assert_eq!(cost.unit, PowerUnit::PicoJoule);
    }

    #[test]
    fn test_unlisted_point_without_brackets() {
        let table = PowerTable::from_value(&memory_table()).unwrap();
        let err = table
            .sample("read_32", CostKind::Dynamic, &OperatingPoint::new(50.0, 1.2))
            .unwrap_err();
        assert!(matches!(err, SimError::NoCostData { .. }));

        let err = table
            .sample("read_32", CostKind::Leakage, &OperatingPoint::default())
            .unwrap_err();
        assert!(matches!(err, SimError::NoCostData { .. }));

        let err = table
            .sample("read_64", CostKind::Dynamic, &OperatingPoint::default())
            .unwrap_err();
        assert!(matches!(err, SimError::NoCostData { .. }));
    }

    #[test]
    fn test_bilinear_interpolation() {
        let table = grid_table();
        let sample = |t, v| {
            table
                .sample("read_32", CostKind::Dynamic, &OperatingPoint::new(t, v))
                .map(|c| c.value)
        };

        assert_eq!(sample(25.0, 1.0).unwrap(), 1.5);
        assert_eq!(sample(55.0, 0.8).unwrap(), 2.0);
        assert!((sample(55.0, 1.0).unwrap() - 2.5).abs() < 1e-12);
        assert!(sample(100.0, 1.0).is_err());
        assert!(sample(25.0, 1.3).is_err());
    }

    #[test]
    fn test_exact_tables_do_not_interpolate() {
        let table = PowerTable::from_value(&json!({
            "op": {
                "dynamic": {
                    "type": "exact",
                    "unit": "pJ",
                    "values": { "0": { "1": { "any": 1 } }, "100": { "1": { "any": 2 } } }
                }
            }
        }))
        .unwrap();
        assert!(table
            .sample("op", CostKind::Dynamic, &OperatingPoint::new(50.0, 1.0))
            .is_err());
        assert_eq!(
            table
                .sample("op", CostKind::Dynamic, &OperatingPoint::new(100.0, 1.0))
                .unwrap()
                .value,
            2.0
        );
    }

    #[test]
    fn test_load_axis() {
        let table = PowerTable::from_value(&json!({
            "op": {
                "dynamic": {
                    "type": "linear",
                    "unit": "nJ",
                    "values": { "25": { "1.2": { "0": 0.0, "1": 1.0, "any": 0.25 } } }
                }
            }
        }))
        .unwrap();
        let at = |load| {
            table
                .sample(
                    "op",
                    CostKind::Dynamic,
                    &OperatingPoint::new(25.0, 1.2).with_load(load),
                )
                .unwrap()
                .value
        };
        // nJ are normalised to pJ.
        assert_eq!(at(Load::Value(0.5)), 500.0);
        assert_eq!(at(Load::Any), 250.0);
        // Outside the numeric range falls back to "any".
        assert_eq!(at(Load::Value(2.0)), 250.0);
    }

    #[test]
    fn test_schema_errors() {
        let bad = [
            json!([]),
            json!({ "op": { "dynamic": { "unit": "pJ" } } }),
            json!({ "op": { "dynamic": { "values": { "25": { "1.2": { "any": 1 } } } } } }),
            json!({ "op": { "dynamic": { "unit": "lumen", "values": {} } } }),
            json!({ "op": { "dynamic": { "type": "cubic", "unit": "pJ", "values": {} } } }),
            json!({ "op": { "static": { "unit": "pJ", "values": {} } } }),
            json!({ "op": { "dynamic": { "unit": "pJ", "values": { "hot": { "1.2": { "any": 1 } } } } } }),
            json!({ "op": { "dynamic": { "unit": "pJ", "values": { "25": { "1.2": { "any": "x" } } } } } }),
            json!({ "op": { "dynamic": { "unit": "pJ", "values": { "25": { "1.2": {} } } } } }),
            json!({ "op": { "dynamic": { "unit": "pJ", "values": { "25": { "1.2": { "any": 1 } }, "25.0": { "1.2": { "any": 1 } } } } } }),
        ];
        for value in &bad {
            let err = PowerTable::from_value(value).unwrap_err();
            assert!(
                matches!(err, SimError::InvalidPowerTable { .. }),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_model_accounting() {
        let mut model = PowerModel::new(PowerTable::from_value(&memory_table()).unwrap());

        assert_eq!(model.account_operation("read_32").unwrap(), 1.5);
        assert_eq!(model.account_operation("write_32").unwrap(), 2.5);
        assert_eq!(model.account_operation("read_32").unwrap(), 1.5);

        // 10 ns at 0.0001 W + 0.000001 W.
        let energy = model.account_background(10_000).unwrap();
        assert!((energy - 1.01).abs() < 1e-9);

        let report = model.report();
        assert_eq!(report.dynamic_pj, 5.5);
        assert_eq!(report.operations["read_32"].count, 2);
        assert_eq!(report.samples, 5);
        assert!((report.total_pj() - 6.51).abs() < 1e-9);
    }

    #[test]
    fn test_commands_affect_future_samples() {
        let mut model = PowerModel::new(PowerTable::from_value(&memory_table()).unwrap());
        model.account_operation("read_32").unwrap();

        model.apply(PowerCommand::SetVoltage(0.9));
        assert!(model.account_operation("read_32").is_err());
        assert_eq!(model.report().misses, 1);
        assert_eq!(model.report().dynamic_pj, 1.5);

        model.apply(PowerCommand::SetVoltage(1.2));
        model.apply(PowerCommand::SetState(PowerState::Off));
        assert_eq!(model.account_operation("read_32").unwrap(), 0.0);
        assert_eq!(model.account_background(1_000).unwrap(), 0.0);
        assert_eq!(model.report().dynamic_pj, 1.5);
    }

    #[test]
    fn test_access_cost_in_watts_is_a_miss() {
        let mut model = PowerModel::new(PowerTable::from_value(&memory_table()).unwrap());
        assert!(model.account_operation("background").is_err());
        assert_eq!(model.report().misses, 1);
    }

    #[test]
    fn test_capture_window() {
        let mut recorder = CaptureRecorder::new();
        assert!(recorder.stop(50, [("mem", 1.0)]).is_none());

        assert!(recorder.start("trig", 100, [("mem", 1.5), ("trig", 0.0)]));
        assert!(!recorder.start("trig", 150, [("mem", 9.0), ("trig", 9.0)]));
        assert!(recorder.is_open());

        let window = recorder
            .stop(200, [("mem", 4.0), ("trig", 2.5)])
            .unwrap()
            .clone();
        assert!(!recorder.is_open());
        assert_eq!((window.start, window.end), (100, 200));
        assert_eq!(window.trigger, "trig");
        assert_eq!(window.energy_pj, 5.0);
        assert_eq!(window.components["mem"], 2.5);
        assert_eq!(window.components["trig"], 2.5);
        assert_eq!(window.average_power_w(), 0.05);
        assert_eq!(recorder.windows().len(), 1);
    }
}
