//! Agent Lifecycle Integration Tests
//!
//! End-to-end coverage of discovery, activation, start/stop/reload, and the
//! stop-before-queue-close ordering, over real configuration trees.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use aperture::{Agent, ConfigError, Input, InputError, InputRegistry, Sample, Sink};

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a configuration root holding the base config file.
fn config_root() -> TempDir {
    let root = tempfile::tempdir().expect("failed to create tempdir");
    std::fs::write(root.path().join("config.toml"), "# base configuration\n")
        .expect("failed to write base config");
    root
}

/// Add an `input.<name>` subdirectory and return its path.
fn add_input_dir(root: &Path, name: &str) -> std::path::PathBuf {
    let dir = root.join(format!("input.{name}"));
    std::fs::create_dir(&dir).expect("failed to create input dir");
    dir
}

/// Sink recording every delivered sample.
#[derive(Default, Clone)]
struct RecordingSink(Arc<Mutex<Vec<Sample>>>);

impl RecordingSink {
    fn samples(&self) -> Vec<Sample> {
        self.0.lock().unwrap().clone()
    }
}

impl Sink for RecordingSink {
    fn deliver(&self, sample: &Sample) {
        self.0.lock().unwrap().push(sample.clone());
    }
}

/// Input that sends `count` numbered samples, then idles until stopped.
struct CountingInput {
    count: u64,
    stopped: Arc<AtomicBool>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl CountingInput {
    fn new(count: u64, stopped: Arc<AtomicBool>) -> Self {
        Self {
            count,
            stopped,
            cancel: CancellationToken::new(),
            workers: Vec::new(),
        }
    }
}

#[async_trait]
impl Input for CountingInput {
    fn apply_config(&mut self, _doc: serde_json::Value) -> Result<(), ConfigError> {
        Ok(())
    }

    fn tidy_config(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn start(&mut self, tx: mpsc::Sender<Sample>) {
        let count = self.count;
        let cancel = self.cancel.clone();
        self.workers.push(tokio::spawn(async move {
            for i in 0..count {
                if tx.send(Sample::new("seq", i as f64)).await.is_err() {
                    return;
                }
            }
            cancel.cancelled().await;
        }));
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Input that records the configuration document it receives and produces
/// nothing.
struct CaptureInput {
    seen: Arc<Mutex<Option<serde_json::Value>>>,
}

#[async_trait]
impl Input for CaptureInput {
    fn required_fields(&self) -> &'static [&'static str] {
        &["address"]
    }

    fn apply_config(&mut self, doc: serde_json::Value) -> Result<(), ConfigError> {
        *self.seen.lock().unwrap() = Some(doc);
        Ok(())
    }

    fn tidy_config(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn start(&mut self, _tx: mpsc::Sender<Sample>) {}

    async fn stop(&mut self) {}
}

fn counting_registry(stopped: &Arc<AtomicBool>) -> InputRegistry {
    let mut registry = InputRegistry::new();
    let stopped = Arc::clone(stopped);
    registry.register("counter", move || {
        Box::new(CountingInput::new(100, Arc::clone(&stopped)))
    });
    registry
}

// =============================================================================
// Start / Discovery
// =============================================================================

#[tokio::test]
async fn test_start_with_no_inputs() {
    let root = config_root();
    let mut agent = Agent::new(root.path(), "false").unwrap();

    agent.start().await.unwrap();
    assert_eq!(agent.input_count(), 0);
}

#[tokio::test]
async fn test_unknown_input_skipped_others_activate() {
    let root = config_root();
    add_input_dir(root.path(), "mystery");
    add_input_dir(root.path(), "counter");

    let stopped = Arc::new(AtomicBool::new(false));
    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        counting_registry(&stopped),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    agent.start().await.unwrap();
    assert_eq!(agent.active_inputs(), vec!["counter".to_string()]);
    agent.stop().await;
}

#[tokio::test]
async fn test_non_input_directories_ignored() {
    let root = config_root();
    std::fs::create_dir(root.path().join("logs")).unwrap();
    std::fs::create_dir(root.path().join("inputs")).unwrap();

    let mut agent = Agent::new(root.path(), "false").unwrap();
    agent.start().await.unwrap();
    assert_eq!(agent.input_count(), 0);
}

// =============================================================================
// Redis Scenarios
// =============================================================================

#[tokio::test]
async fn test_redis_input_activates_from_toml() {
    let root = config_root();
    let dir = add_input_dir(root.path(), "redis");
    std::fs::write(dir.join("redis.toml"), "address = \"127.0.0.1:59996\"\n").unwrap();

    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        InputRegistry::builtin(),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    agent.start().await.unwrap();
    assert_eq!(agent.active_inputs(), vec!["redis".to_string()]);

    agent.stop().await;
    assert_eq!(agent.input_count(), 0);
}

#[tokio::test]
async fn test_redis_missing_required_field_is_nonfatal() {
    let root = config_root();
    let dir = add_input_dir(root.path(), "redis");
    std::fs::write(dir.join("redis.toml"), "interval = \"5s\"\n").unwrap();

    let mut agent = Agent::new(root.path(), "false").unwrap();

    // Start itself succeeds; the misconfigured input is simply absent.
    agent.start().await.unwrap();
    assert_eq!(agent.input_count(), 0);
}

#[tokio::test]
async fn test_redis_delivers_samples_end_to_end() {
    let root = config_root();
    let dir = add_input_dir(root.path(), "redis");
    // Connection refused is still a valid observation (redis_up = 0).
    std::fs::write(
        dir.join("redis.toml"),
        "address = \"127.0.0.1:59995\"\ninterval = \"10s\"\ntimeout = \"1s\"\n",
    )
    .unwrap();

    let sink = RecordingSink::default();
    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        InputRegistry::builtin(),
        Arc::new(sink.clone()),
    )
    .unwrap();

    agent.start().await.unwrap();

    // The first probe fires immediately; wait for it to land.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while sink.samples().is_empty() && std::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    agent.stop().await;

    let samples = sink.samples();
    assert!(!samples.is_empty(), "expected at least one sample");
    assert_eq!(samples[0].metric, "redis_up");
    assert_eq!(
        samples[0].labels.get("address"),
        Some(&"127.0.0.1:59995".to_string())
    );
}

// =============================================================================
// Stop / Reload
// =============================================================================

#[tokio::test]
async fn test_stop_with_no_active_inputs() {
    let root = config_root();
    let mut agent = Agent::new(root.path(), "false").unwrap();

    agent.stop().await;
    agent.stop().await;
    assert_eq!(agent.input_count(), 0);
}

#[tokio::test]
async fn test_stop_runs_input_stop_before_queue_close() {
    let root = config_root();
    add_input_dir(root.path(), "counter");

    let stopped = Arc::new(AtomicBool::new(false));
    let sink = RecordingSink::default();
    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        counting_registry(&stopped),
        Arc::new(sink.clone()),
    )
    .unwrap();

    agent.start().await.unwrap();
    agent.stop().await;

    // The input's stop ran, and every enqueued sample survived to the sink
    // in FIFO order: the queue cannot have closed before producing ceased.
    assert!(stopped.load(Ordering::SeqCst));
    let samples = sink.samples();
    assert_eq!(samples.len(), 100);
    for (i, sample) in samples.iter().enumerate() {
        assert_eq!(sample.value, i as f64);
    }
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let root = config_root();
    add_input_dir(root.path(), "counter");

    let stopped = Arc::new(AtomicBool::new(false));
    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        counting_registry(&stopped),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    agent.start().await.unwrap();
    let first = agent.active_inputs();

    agent.reload().await.unwrap();
    let second = agent.active_inputs();

    agent.reload().await.unwrap();
    let third = agent.active_inputs();

    assert_eq!(first, vec!["counter".to_string()]);
    assert_eq!(second, first);
    assert_eq!(third, first);

    agent.stop().await;
}

#[tokio::test]
async fn test_start_twice_does_not_duplicate() {
    let root = config_root();
    add_input_dir(root.path(), "counter");

    let stopped = Arc::new(AtomicBool::new(false));
    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        counting_registry(&stopped),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    agent.start().await.unwrap();
    agent.start().await.unwrap();
    assert_eq!(agent.input_count(), 1);

    agent.stop().await;
}

// =============================================================================
// Configuration Precedence
// =============================================================================

#[tokio::test]
async fn test_config_files_apply_in_listing_order() {
    let root = config_root();
    let dir = add_input_dir(root.path(), "capture");
    std::fs::write(dir.join("a.toml"), "address = \"from-a\"\n").unwrap();
    std::fs::write(dir.join("b.json"), r#"{"address": "from-b"}"#).unwrap();

    // Derive the expectation from the same listing order the loader sees.
    let listing: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    let last_file = listing.last().unwrap().clone();
    let expected = if last_file == "a.toml" { "from-a" } else { "from-b" };

    let seen = Arc::new(Mutex::new(None));
    let mut registry = InputRegistry::new();
    {
        let seen = Arc::clone(&seen);
        registry.register("capture", move || {
            Box::new(CaptureInput {
                seen: Arc::clone(&seen),
            })
        });
    }

    let mut agent = Agent::with_registry(
        root.path(),
        "false",
        registry,
        Arc::new(RecordingSink::default()),
    )
    .unwrap();
    agent.start().await.unwrap();
    agent.stop().await;

    let doc = seen.lock().unwrap().clone().expect("config not applied");
    assert_eq!(doc["address"], serde_json::json!(expected));
}
