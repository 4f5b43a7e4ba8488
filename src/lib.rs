//! Aperture - Metrics Agent Core
//!
//! This crate provides the input lifecycle orchestration for the Aperture
//! metrics-collection agent. It can be used as a library by other Rust
//! projects, or run as a standalone binary with the `aperture` executable.
//!
//! # Architecture
//!
//! - **Agent**: discovers configured inputs under the configuration root,
//!   activates them, and owns the start/stop/reload protocol
//! - **Inputs**: pluggable collectors producing [`Sample`]s, resolved by
//!   name through an [`InputRegistry`](input::InputRegistry)
//! - **Consumers**: one bounded queue plus drain task per input, forwarding
//!   samples to a [`Sink`](consumer::Sink)
//! - **Config**: layered per-input configuration (defaults, environment,
//!   files) loaded from each input's subdirectory
//!
//! # Example
//!
//! ```rust,no_run
//! use aperture::Agent;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut agent = Agent::new("conf", "false")?;
//!     agent.start().await?;
//!     // ... wait for shutdown signal ...
//!     agent.stop().await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod consumer;
pub mod input;
pub mod sample;

pub use agent::{Agent, AgentError, INPUT_DIR_PREFIX};
pub use config::ConfigError;
pub use consumer::{Consumer, SAMPLE_QUEUE_CAPACITY, Sink, StdoutSink};
pub use input::{Input, InputError, InputRegistry};
pub use sample::{Labels, Sample};
