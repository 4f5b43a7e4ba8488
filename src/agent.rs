//! Agent orchestrator: input discovery, activation, and lifecycle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config;
use crate::consumer::{Consumer, Sink, StdoutSink};
use crate::input::InputRegistry;

/// Subdirectory prefix designating an input configuration directory.
pub const INPUT_DIR_PREFIX: &str = "input.";

/// Base configuration file that must exist in the configuration root.
const BASE_CONFIG_FILE: &str = "config.toml";

/// Fatal agent errors. Per-input failures are logged and skipped instead.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The configuration root lacks the base configuration file.
    #[error("configuration file {} not found", .0.display())]
    MissingBaseConfig(PathBuf),

    /// The debug flag did not parse as a boolean.
    #[error("invalid debug flag {value:?}: expected \"true\" or \"false\"")]
    InvalidDebugFlag { value: String },

    /// The configuration root could not be enumerated.
    #[error("failed to list configuration directory {}: {}", .dir.display(), .source)]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The orchestrator. Owns the configuration root, the input registry, and
/// the table of live consumers.
///
/// `start`, `stop`, and `reload` take `&mut self`: the exclusive borrow
/// serializes lifecycle transitions, and the binary drives them from a
/// single control loop.
pub struct Agent {
    config_dir: PathBuf,
    debug: bool,
    registry: InputRegistry,
    sink: Arc<dyn Sink>,
    consumers: HashMap<String, Consumer>,
}

impl Agent {
    /// Create an agent over `config_dir` using the builtin input registry
    /// and the stdout sink.
    ///
    /// `config_dir` must contain `config.toml`; `debug_mode` must parse as
    /// a boolean. Both violations are fatal.
    pub fn new(config_dir: impl Into<PathBuf>, debug_mode: &str) -> Result<Self, AgentError> {
        Self::with_registry(
            config_dir,
            debug_mode,
            InputRegistry::builtin(),
            Arc::new(StdoutSink),
        )
    }

    /// Create an agent with a caller-supplied registry and sink.
    pub fn with_registry(
        config_dir: impl Into<PathBuf>,
        debug_mode: &str,
        registry: InputRegistry,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, AgentError> {
        let config_dir = config_dir.into();

        let base = config_dir.join(BASE_CONFIG_FILE);
        if !base.is_file() {
            return Err(AgentError::MissingBaseConfig(base));
        }

        let debug = debug_mode
            .trim()
            .parse::<bool>()
            .map_err(|_| AgentError::InvalidDebugFlag {
                value: debug_mode.to_string(),
            })?;

        let agent = Self {
            config_dir,
            debug,
            registry,
            sink,
            consumers: HashMap::new(),
        };
        tracing::info!(agent = %agent, "agent instance created");
        Ok(agent)
    }

    /// Whether verbose diagnostics were requested.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Names of the currently live inputs.
    pub fn active_inputs(&self) -> Vec<String> {
        self.consumers.keys().cloned().collect()
    }

    /// Number of live consumers.
    pub fn input_count(&self) -> usize {
        self.consumers.len()
    }

    /// Discover, configure, and start every registered input found under
    /// the configuration root.
    ///
    /// A single input's failure (unknown name, bad configuration) is logged
    /// and excluded for this cycle; only a root listing failure is fatal.
    pub async fn start(&mut self) -> Result<(), AgentError> {
        tracing::info!("agent starting");

        if !self.consumers.is_empty() {
            tracing::warn!("agent already started");
            return Ok(());
        }

        let names = self.discover_inputs()?;
        if names.is_empty() {
            tracing::info!("no inputs configured");
            return Ok(());
        }

        for name in names {
            self.activate(name);
        }
        Ok(())
    }

    /// Stop every live consumer: the input's producers first, then the
    /// queue drain. Safe to call with zero consumers.
    pub async fn stop(&mut self) {
        tracing::info!("agent stopping");

        for (name, mut consumer) in self.consumers.drain() {
            consumer.stop().await;
            tracing::info!(input = %name, "input stopped");
        }
    }

    /// Stop, then rebuild discovery, instantiation, and configuration from
    /// scratch. No state carries over between the old and new instances.
    pub async fn reload(&mut self) -> Result<(), AgentError> {
        tracing::info!("agent reloading");

        self.stop().await;
        self.start().await
    }

    /// List the configuration root and derive input names from its
    /// subdirectories.
    fn discover_inputs(&self) -> Result<Vec<String>, AgentError> {
        let entries =
            std::fs::read_dir(&self.config_dir).map_err(|source| AgentError::Discovery {
                dir: self.config_dir.clone(),
                source,
            })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AgentError::Discovery {
                dir: self.config_dir.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    dirs.push(name.to_string());
                }
            }
        }

        Ok(input_names(dirs))
    }

    /// Build, configure, and start one input; on any failure, log and leave
    /// it out of the live table.
    fn activate(&mut self, name: String) {
        let Some(factory) = self.registry.lookup(&name) else {
            tracing::error!(input = %name, "input not supported");
            return;
        };
        let mut instance = factory();

        let dir = self.config_dir.join(format!("{INPUT_DIR_PREFIX}{name}"));
        let doc = match config::load_dir(&dir, &name, instance.as_mut()) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(input = %name, error = %e, "failed to load configuration");
                return;
            }
        };
        if self.debug {
            tracing::debug!(input = %name, config = %doc, "configuration applied");
        }

        if let Err(e) = instance.tidy_config() {
            tracing::error!(input = %name, error = %e, "configuration invalid");
            return;
        }

        let mut consumer = Consumer::new(instance);
        consumer.start(Arc::clone(&self.sink));
        tracing::info!(input = %name, "input started");

        self.consumers.insert(name, consumer);
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Agent(config_dir={}, debug={})",
            self.config_dir.display(),
            self.debug
        )
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config_dir", &self.config_dir)
            .field("debug", &self.debug)
            .field("consumers", &self.consumers.len())
            .finish_non_exhaustive()
    }
}

/// Derive input names from a listing of subdirectory names: every name with
/// the `input.` prefix contributes the remainder. Order is preserved as
/// listed; no matches is not an error.
fn input_names<I>(dirs: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    dirs.into_iter()
        .filter_map(|dir| dir.strip_prefix(INPUT_DIR_PREFIX).map(str::to_string))
        .collect()
}
