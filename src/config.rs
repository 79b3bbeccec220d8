//! Board description files.
//!
//! A board is described declaratively in YAML or JSON and turned into a
//! running [`Simulator`](crate::engine::Simulator) by
//! [`registry::assemble`](crate::registry::assemble).
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   max_time: 10000000        # picoseconds
//!   log_level: info
//!
//! components:
//!   - name: board
//!     type: group
//!   - name: clock
//!     parent: board
//!     type: clock
//!     attrs:
//!       frequency: "50000000"
//!   - name: mem
//!     parent: board
//!     type: memory
//!     attrs:
//!       size: "0x100000"
//!     power_file: memory_power.json
//!
//! ports:
//!   - component: board/ico
//!     name: fetch
//!     direction: input
//!     kind: memory
//!
//! bindings:
//!   - from: board/loader.out
//!     to: board/ico.input
//!
//! clocks:
//!   - domain: board/clock
//!     targets: [board/mem]
//!
//! mappings:
//!   - router: board/ico
//!     name: mem
//!     target: board/mem.input
//!     base: "0x80000000"
//!     size: "0x100000"
//!     rm_base: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::port::{PortDirection, PortKind};
use crate::types::SimTime;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parses a decimal or `0x`-prefixed hexadecimal integer. `_` separators
/// are ignored.
pub fn parse_u64(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => cleaned.parse().ok(),
    }
}

/// Splits `path.port` at its last `.`.
pub fn split_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    let (component, port) = endpoint.rsplit_once('.')?;
    if component.is_empty() || port.is_empty() {
        None
    } else {
        Some((component, port))
    }
}

/// An integer written either as a number or as a (hex) string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Int(u64),
    Text(String),
}

impl Address {
    /// Numeric value, if the text form parses.
    pub fn value(&self) -> Option<u64> {
        match self {
            Address::Int(v) => Some(*v),
            Address::Text(s) => parse_u64(s),
        }
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::Int(value)
    }
}

/// Global simulation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Simulated time to run for, in picoseconds
    #[serde(default = "default_max_time")]
    pub max_time: SimTime,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect statistics and write reports after the run
    #[serde(default)]
    pub collect_stats: bool,

    /// Output directory for reports, relative to the board file
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_max_time() -> SimTime {
    crate::types::ms(1)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            max_time: default_max_time(),
            log_level: default_log_level(),
            collect_stats: false,
            output_dir: None,
        }
    }
}

/// One component instance.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Local name
    pub name: String,

    /// Registered model name
    #[serde(rename = "type")]
    pub component_type: String,

    /// Full path of the parent, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Model attributes as key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,

    /// Inline power table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<serde_json::Value>,

    /// Power table in a JSON file, relative to the board file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_file: Option<String>,
}

impl ComponentConfig {
    /// Creates a root component entry.
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            ..Self::default()
        }
    }

    /// Places the component under `parent`.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Attaches an inline power table.
    pub fn power(mut self, table: serde_json::Value) -> Self {
        self.power = Some(table);
        self
    }

    /// Full path of the component.
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// An extra port declared on a component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortConfig {
    /// Full path of the owner
    pub component: String,
    pub name: String,
    pub direction: PortDirection,
    pub kind: PortKind,
    /// Delivery latency for outputs, in picoseconds
    #[serde(default)]
    pub latency: SimTime,
}

/// A binding between `path.port` endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingConfig {
    pub from: String,
    pub to: String,
}

/// A clock domain and the components it drives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClockConfig {
    pub domain: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

/// A router mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Full path of the router
    pub router: String,
    /// Mapping name, also the router output port name
    pub name: String,
    /// Target `path.port`
    pub target: String,
    pub base: Address,
    pub size: Address,
    #[serde(default)]
    pub rm_base: bool,
}

/// Complete board description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Global simulation parameters
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Component instances; parents come before their children
    #[serde(default)]
    pub components: Vec<ComponentConfig>,

    /// Extra port declarations
    #[serde(default)]
    pub ports: Vec<PortConfig>,

    /// Port bindings
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,

    /// Clock tree
    #[serde(default)]
    pub clocks: Vec<ClockConfig>,

    /// Router programming
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl BoardConfig {
    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path.as_ref().parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: BoardConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_json(&content)?;
        config.base_dir = path.as_ref().parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: BoardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Resolves `file` against the directory of the board file.
    pub fn resolve(&self, file: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Directory reports are written to, if statistics are collected and
    /// an output directory is configured.
    pub fn report_dir(&self) -> Option<PathBuf> {
        if !self.simulation.collect_stats {
            return None;
        }
        self.simulation.output_dir.as_deref().map(|dir| self.resolve(dir))
    }

    /// Validates names, references and numeric fields.
    ///
    /// Graph-level rules (port kinds, overlaps, cycles) are checked when
    /// the board is assembled.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut paths = HashSet::new();
        for component in &self.components {
            if component.name.is_empty() || component.name.contains(['/', '.']) {
                return Err(ConfigError::Validation(format!(
                    "Invalid component name: '{}'",
                    component.name
                )));
            }
            if let Some(parent) = &component.parent {
                if !paths.contains(parent.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Component '{}' references undefined parent '{}'",
                        component.name, parent
                    )));
                }
            }
            if component.power.is_some() && component.power_file.is_some() {
                return Err(ConfigError::Validation(format!(
                    "Component '{}' has both power and power_file",
                    component.path()
                )));
            }
            if !paths.insert(component.path()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate component: {}",
                    component.path()
                )));
            }
        }

        let known = |path: &str, what: &str| -> ConfigResult<()> {
            if paths.contains(path) {
                Ok(())
            } else {
                Err(ConfigError::Validation(format!(
                    "{what} references non-existent component: {path}"
                )))
            }
        };
        let endpoint = |text: &str, what: &str| -> ConfigResult<()> {
            let (component, _) = split_endpoint(text).ok_or_else(|| {
                ConfigError::Validation(format!("{what} endpoint '{text}' is not 'path.port'"))
            })?;
            known(component, what)
        };

        for port in &self.ports {
            known(&port.component, "Port")?;
        }
        for binding in &self.bindings {
            endpoint(&binding.from, "Binding")?;
            endpoint(&binding.to, "Binding")?;
        }
        for clock in &self.clocks {
            known(&clock.domain, "Clock")?;
            for target in &clock.targets {
                known(target, "Clock")?;
            }
        }
        for mapping in &self.mappings {
            known(&mapping.router, "Mapping")?;
            endpoint(&mapping.target, "Mapping")?;
            if mapping.base.value().is_none() {
                return Err(ConfigError::Validation(format!(
                    "Mapping '{}' has an invalid base: {:?}",
                    mapping.name, mapping.base
                )));
            }
            match mapping.size.value() {
                Some(size) if size > 0 => {}
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "Mapping '{}' has an invalid size: {:?}",
                        mapping.name, mapping.size
                    )))
                }
            }
        }

        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the number of components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Finds a component by full path.
    pub fn find_component(&self, path: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.path() == path)
    }
}

/// Builder for creating a `BoardConfig` programmatically.
#[derive(Default)]
pub struct BoardConfigBuilder {
    config: BoardConfig,
}

impl BoardConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated run time.
    pub fn max_time(mut self, time: SimTime) -> Self {
        self.config.simulation.max_time = time;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Enables statistics collection.
    pub fn collect_stats(mut self, enable: bool) -> Self {
        self.config.simulation.collect_stats = enable;
        self
    }

    /// Sets the directory reports are written to.
    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.simulation.output_dir = Some(dir.into());
        self
    }

    /// Adds a component.
    pub fn component(mut self, component: ComponentConfig) -> Self {
        self.config.components.push(component);
        self
    }

    /// Declares an extra port.
    pub fn port(
        mut self,
        component: impl Into<String>,
        name: impl Into<String>,
        direction: PortDirection,
        kind: PortKind,
    ) -> Self {
        self.config.ports.push(PortConfig {
            component: component.into(),
            name: name.into(),
            direction,
            kind,
            latency: 0,
        });
        self
    }

    /// Binds `from` (`path.port`) to `to`.
    pub fn bind(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.bindings.push(BindingConfig {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Drives `targets` from clock `domain`.
    pub fn clock<I, S>(mut self, domain: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.clocks.push(ClockConfig {
            domain: domain.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a router mapping.
    pub fn map(
        mut self,
        router: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
        base: u64,
        size: u64,
        rm_base: bool,
    ) -> Self {
        self.config.mappings.push(MappingConfig {
            router: router.into(),
            name: name.into(),
            target: target.into(),
            base: Address::Int(base),
            size: Address::Int(size),
            rm_base,
        });
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<BoardConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
