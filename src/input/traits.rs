//! Core input trait and error type.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ConfigError;
use crate::sample::Sample;

/// Errors raised by an input's own semantic validation.
#[derive(Debug, Error)]
pub enum InputError {
    /// Configuration is structurally complete but semantically invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Capability surface of a collector plugin.
///
/// The agent drives every input through this trait: configuration intake
/// (`apply_config`), semantic validation (`tidy_config`), starting producer
/// work against a supplied queue (`start`), and stopping it (`stop`).
///
/// # Stop contract
///
/// `stop` must not return until every producer task has ceased and can no
/// longer enqueue. Implementations cancel their tasks and await the join
/// handles; the producer tasks hold the only queue senders, so joining them
/// is what closes the queue. The agent relies on this ordering when tearing
/// a consumer down.
#[async_trait]
pub trait Input: Send + Sync {
    /// Top-level configuration fields that must be present and non-empty
    /// after loading. Checked by the configuration loader before
    /// `apply_config` runs.
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Deserialize the merged configuration document into this instance.
    fn apply_config(&mut self, doc: serde_json::Value) -> Result<(), ConfigError>;

    /// Validate the applied configuration beyond required-field presence.
    fn tidy_config(&mut self) -> Result<(), InputError>;

    /// Spawn producer task(s) that send samples into `tx` until stopped.
    ///
    /// Producers suspend when the queue is full; samples sent on one queue
    /// are delivered to its consumer in FIFO order.
    fn start(&mut self, tx: mpsc::Sender<Sample>);

    /// Stop producing. Returns only once no further enqueues can occur.
    async fn stop(&mut self);
}
