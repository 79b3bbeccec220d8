//! Component factory registry and board assembly.
//!
//! The registry maps model names used in board files (`memory`, `router`,
//! ...) to factories that build a component from its string attributes.
//! [`assemble`] walks a [`BoardConfig`] and drives the
//! [`GraphBuilder`] with the result.
//!
//! # Example
//!
//! ```
//! use socweave::components::mock::Counter;
//! use socweave::registry::ComponentRegistry;
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register("counter", |_attrs| Ok(Box::new(Counter::new())));
//! assert!(registry.contains("counter"));
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::clock::ClockDomain;
use crate::component::Component;
use crate::components::core::FetchCore;
use crate::components::group::Group;
use crate::components::loader::ImageLoader;
use crate::components::memory::Memory;
use crate::components::mock::Counter;
use crate::components::power_ctrl::PowerSequencer;
use crate::config::{parse_u64, split_endpoint, BoardConfig, ConfigError};
use crate::engine::Simulator;
use crate::error::{SimError, SimResult};
use crate::graph::GraphBuilder;
use crate::port::PortDirection;
use crate::power::PowerTable;
use crate::router::Router;
use crate::types::ComponentId;

/// Attributes of one component, with typed accessors.
#[derive(Clone, Copy, Debug)]
pub struct Attrs<'a> {
    path: &'a str,
    values: &'a HashMap<String, String>,
    base_dir: Option<&'a Path>,
}

impl<'a> Attrs<'a> {
    /// Wraps the attributes of component `path`.
    pub fn new(path: &'a str, values: &'a HashMap<String, String>) -> Self {
        Self {
            path,
            values,
            base_dir: None,
        }
    }

    /// Sets the directory file attributes are resolved against.
    pub fn with_base_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Full path of the component being built.
    pub fn path(&self) -> &str {
        self.path
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> SimError {
        SimError::InvalidAttribute {
            component: self.path.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Raw string value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Integer value (decimal or `0x` hex), if present.
    pub fn u64(&self, key: &str) -> SimResult<Option<u64>> {
        self.get(key)
            .map(|raw| parse_u64(raw).ok_or_else(|| self.invalid(key, format!("'{raw}' is not an integer"))))
            .transpose()
    }

    /// Integer value, required.
    pub fn require_u64(&self, key: &str) -> SimResult<u64> {
        self.u64(key)?
            .ok_or_else(|| self.invalid(key, "missing"))
    }

    /// Floating-point value, if present.
    pub fn f64(&self, key: &str) -> SimResult<Option<f64>> {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| self.invalid(key, format!("'{raw}' is not a number")))
            })
            .transpose()
    }

    /// Boolean value (`true`/`false`/`1`/`0`), defaulting to `default`.
    pub fn bool_or(&self, key: &str, default: bool) -> SimResult<bool> {
        match self.get(key).map(str::trim) {
            None => Ok(default),
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(raw) => Err(self.invalid(key, format!("'{raw}' is not a boolean"))),
        }
    }

    /// Path attribute resolved against the board file directory.
    pub fn file(&self, key: &str) -> Option<std::path::PathBuf> {
        let raw = self.get(key)?;
        Some(match self.base_dir {
            Some(dir) => dir.join(raw),
            None => raw.into(),
        })
    }
}

/// Type alias for component factory functions.
pub type ComponentFactory =
    Arc<dyn Fn(&Attrs<'_>) -> SimResult<Box<dyn Component>> + Send + Sync>;

/// A registry for component factories.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Attrs<'_>) -> SimResult<Box<dyn Component>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Builds a component of model `type_name`.
    ///
    /// # Errors
    /// `UnknownComponentType` if nothing is registered under that name, or
    /// whatever the factory reports.
    pub fn create(&self, type_name: &str, attrs: &Attrs<'_>) -> SimResult<Box<dyn Component>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| SimError::UnknownComponentType {
                type_name: type_name.to_string(),
            })?;
        factory(attrs)
    }

    /// Returns true if a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns an iterator over registered type names.
    pub fn type_names(&self) -> impl Iterator<Item = &String> {
        self.factories.keys()
    }

    /// Unregisters a component type.
    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.factories.remove(type_name).is_some()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registered_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Creates a registry with the built-in models.
///
/// | type | attributes |
/// |---|---|
/// | `clock` | `frequency` (Hz, required) |
/// | `router` | `latency` (ps), `allow_mixed_rebase` |
/// | `memory` | `size` (required), `latency` (ps), `power_trigger` |
/// | `loader` | `binary` (file), `base`, `entry` |
/// | `fetch_core` | `max_fetches`, `trace_depth` |
/// | `power_sequencer` | `script` (`time=command, ...`) |
/// | `group` | none |
/// | `counter` | none |
pub fn create_default_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    registry.register("clock", |attrs| {
        let frequency = attrs
            .f64("frequency")?
            .ok_or_else(|| attrs.invalid("frequency", "missing"))?;
        Ok(Box::new(ClockDomain::new(frequency)?))
    });

    registry.register("router", |attrs| {
        let router = Router::new()
            .with_latency(attrs.u64("latency")?.unwrap_or(0))
            .allow_mixed_rebase(attrs.bool_or("allow_mixed_rebase", false)?);
        Ok(Box::new(router))
    });

    registry.register("memory", |attrs| {
        let size = attrs.require_u64("size")?;
        let size = usize::try_from(size).map_err(|_| attrs.invalid("size", "too large"))?;
        let memory = Memory::new(size)
            .with_latency(attrs.u64("latency")?.unwrap_or(0))
            .with_power_trigger(attrs.bool_or("power_trigger", false)?);
        Ok(Box::new(memory))
    });

    registry.register("loader", |attrs| {
        let entry = attrs.u64("entry")?;
        let loader = match attrs.file("binary") {
            Some(path) => {
                let base = attrs.u64("base")?.unwrap_or(0);
                ImageLoader::from_binary_file(&path, base, entry.unwrap_or(base))
                    .map_err(|e| attrs.invalid("binary", e.to_string()))?
            }
            None => ImageLoader::new(entry.unwrap_or(0)),
        };
        Ok(Box::new(loader))
    });

    registry.register("fetch_core", |attrs| {
        let mut core = FetchCore::new();
        if let Some(max) = attrs.u64("max_fetches")? {
            core = core.with_max_fetches(max);
        }
        if let Some(depth) = attrs.u64("trace_depth")? {
            let depth = usize::try_from(depth)
                .map_err(|_| attrs.invalid("trace_depth", "too large"))?;
            core = core.with_trace_depth(depth);
        }
        Ok(Box::new(core))
    });

    registry.register("power_sequencer", |attrs| {
        let script = attrs.get("script").unwrap_or("");
        let sequencer = PowerSequencer::from_script(script)?;
        Ok(Box::new(sequencer))
    });

    registry.register("group", |_| Ok(Box::new(Group::new())));
    registry.register("counter", |_| Ok(Box::new(Counter::new())));

    registry
}

fn lookup(graph: &GraphBuilder, path: &str) -> SimResult<ComponentId> {
    graph.find(path).ok_or_else(|| SimError::UnknownComponent {
        name: path.to_string(),
    })
}

fn endpoint<'a>(text: &'a str) -> SimResult<(&'a str, &'a str)> {
    split_endpoint(text).ok_or_else(|| {
        ConfigError::Validation(format!("endpoint '{text}' is not 'path.port'")).into()
    })
}

fn load_power_table(config: &BoardConfig, file: &str) -> SimResult<PowerTable> {
    let path = config.resolve(file);
    let text = std::fs::read_to_string(&path).map_err(ConfigError::from)?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(ConfigError::from)?;
    PowerTable::from_value(&value)
}

/// Builds the graph described by `config`.
///
/// Components are created in file order, then extra ports are declared,
/// then bindings, clock edges and router mappings are applied.
pub fn assemble(config: &BoardConfig, registry: &ComponentRegistry) -> SimResult<Simulator> {
    config.validate()?;
    let mut graph = GraphBuilder::new();

    for entry in &config.components {
        let parent = entry
            .parent
            .as_deref()
            .map(|p| lookup(&graph, p))
            .transpose()?;
        let path = entry.path();
        let attrs = Attrs::new(&path, &entry.attrs).with_base_dir(config.base_dir.as_deref());
        let component = registry.create(&entry.component_type, &attrs)?;
        let id = graph.add_boxed(parent, &entry.name, component)?;

        if let Some(table) = &entry.power {
            graph.add_properties(id, table)?;
        }
        if let Some(file) = &entry.power_file {
            graph.attach_power(id, load_power_table(config, file)?)?;
        }
    }

    for port in &config.ports {
        let id = lookup(&graph, &port.component)?;
        match port.direction {
            PortDirection::Input => {
                graph.declare_input_port(id, &port.name, port.kind)?;
            }
            PortDirection::Output => {
                graph.declare_output_port_with_latency(id, &port.name, port.kind, port.latency)?;
            }
        }
    }

    for binding in &config.bindings {
        let (from, output) = endpoint(&binding.from)?;
        let (to, input) = endpoint(&binding.to)?;
        let from = lookup(&graph, from)?;
        let to = lookup(&graph, to)?;
        graph.connect(from, output, to, input)?;
    }

    for clock in &config.clocks {
        let domain = lookup(&graph, &clock.domain)?;
        for target in &clock.targets {
            let target = lookup(&graph, target)?;
            graph.bind_clock(domain, target)?;
        }
    }

    for mapping in &config.mappings {
        let router = lookup(&graph, &mapping.router)?;
        let (target, port) = endpoint(&mapping.target)?;
        let target = lookup(&graph, target)?;
        let input = graph.input(target, port)?;
        let invalid = |what: &str| {
            SimError::from(ConfigError::Validation(format!(
                "mapping '{}' has an invalid {what}",
                mapping.name
            )))
        };
        let base = mapping.base.value().ok_or_else(|| invalid("base"))?;
        let size = mapping.size.value().ok_or_else(|| invalid("size"))?;
        graph.map(router, &mapping.name, input, base, size, mapping.rm_base)?;
    }

    info!(
        components = config.components.len(),
        mappings = config.mappings.len(),
        "board assembled"
    );
    Ok(graph.build())
}
