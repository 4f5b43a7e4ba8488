//! Redis reachability probe input.
//!
//! Measures TCP connection latency to a Redis endpoint and emits `redis_up`
//! and `redis_latency_ms` samples on a fixed interval.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigError;
use crate::input::{Input, InputError};
use crate::sample::{Labels, Sample};

/// Default collection interval (10 seconds).
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default connection timeout (3 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Configuration for the redis probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Target endpoint as `host:port`. Required.
    #[serde(default)]
    pub address: String,
    /// Collection interval (default: 10s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Probe timeout (default: 3s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra labels attached to every sample.
    #[serde(default)]
    pub labels: Labels,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            labels: Labels::new(),
        }
    }
}

/// Redis endpoint probe.
#[derive(Default)]
pub struct RedisInput {
    config: RedisConfig,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl RedisInput {
    /// Create an input preconfigured with `config` (bypasses the loader).
    pub fn with_config(config: RedisConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for RedisInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisInput")
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Input for RedisInput {
    fn required_fields(&self) -> &'static [&'static str] {
        &["address"]
    }

    fn apply_config(&mut self, doc: serde_json::Value) -> Result<(), ConfigError> {
        self.config =
            serde_json::from_value(doc).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    fn tidy_config(&mut self) -> Result<(), InputError> {
        let address = self.config.address.trim();
        let (host, port) = address.rsplit_once(':').ok_or_else(|| {
            InputError::Config(format!("address {address:?} must be host:port"))
        })?;
        if host.is_empty() {
            return Err(InputError::Config(format!(
                "address {address:?} has an empty host"
            )));
        }
        port.parse::<u16>().map_err(|_| {
            InputError::Config(format!("address {address:?} has an invalid port"))
        })?;
        Ok(())
    }

    fn start(&mut self, tx: mpsc::Sender<Sample>) {
        let config = self.config.clone();
        let cancel = self.cancel.clone();

        self.workers.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(config.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        for sample in probe(&config).await {
                            if tx.send(sample).await.is_err() {
                                // Consumer gone; nothing left to produce for.
                                return;
                            }
                        }
                    }
                }
            }
        }));
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "redis producer task failed");
            }
        }
    }
}

/// Run one probe cycle and build the resulting samples.
async fn probe(config: &RedisConfig) -> Vec<Sample> {
    let mut labels = config.labels.clone();
    labels.insert("address".to_string(), config.address.clone());

    let start = Instant::now();
    let result = timeout(config.timeout, TcpStream::connect(&config.address)).await;
    let elapsed = start.elapsed();

    match result {
        Ok(Ok(_stream)) => {
            let latency_ms = elapsed.as_secs_f64() * 1000.0;
            tracing::debug!(address = %config.address, latency_ms, "redis probe successful");
            vec![
                Sample::new("redis_up", 1.0).with_labels(labels.clone()),
                Sample::new("redis_latency_ms", latency_ms).with_labels(labels),
            ]
        }
        Ok(Err(e)) => {
            tracing::warn!(address = %config.address, error = %e, "redis probe failed");
            vec![Sample::new("redis_up", 0.0).with_labels(labels)]
        }
        Err(_) => {
            tracing::warn!(
                address = %config.address,
                timeout_ms = config.timeout.as_millis(),
                "redis probe timed out"
            );
            vec![Sample::new("redis_up", 0.0).with_labels(labels)]
        }
    }
}
