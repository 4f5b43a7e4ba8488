//! Input factory registry.

use std::collections::HashMap;

use crate::input::Input;
use crate::input::redis::RedisInput;

/// Zero-argument constructor returning a fresh, unconfigured input.
pub type InputFactory = Box<dyn Fn() -> Box<dyn Input> + Send + Sync>;

/// Mapping from input name to its factory.
///
/// The registry is an owned value handed to the agent rather than
/// process-global state, so tests can build agents over their own plugin
/// sets and reload cycles stay deterministic.
#[derive(Default)]
pub struct InputRegistry {
    creators: HashMap<String, InputFactory>,
}

impl InputRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the inputs shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("redis", || Box::new(RedisInput::default()));
        registry
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Input> + Send + Sync + 'static,
    {
        self.creators.insert(name.into(), Box::new(factory));
    }

    /// Look up the factory for `name`.
    pub fn lookup(&self, name: &str) -> Option<&InputFactory> {
        self.creators.get(name)
    }

    /// Names of all registered inputs.
    pub fn names(&self) -> Vec<&str> {
        self.creators.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for InputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRegistry")
            .field("inputs", &self.names())
            .finish()
    }
}
