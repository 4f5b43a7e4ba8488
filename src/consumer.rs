//! Consumer: couples one input to one bounded queue and one drain task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::input::Input;
use crate::sample::Sample;

/// Capacity of each input's sample queue. Generous, so bursty producers do
/// not block under normal load.
pub const SAMPLE_QUEUE_CAPACITY: usize = 1_000_000;

/// Terminal disposition of collected samples.
///
/// A full agent would export samples over the network; this crate ships a
/// stdout placeholder and lets callers substitute their own.
pub trait Sink: Send + Sync {
    /// Accept one sample. No persistence is guaranteed.
    fn deliver(&self, sample: &Sample);
}

/// Placeholder sink writing each sample as a JSON line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn deliver(&self, sample: &Sample) {
        match serde_json::to_string(sample) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize sample"),
        }
    }
}

/// One input plus the machinery draining its queue.
///
/// Created by the agent for each successfully configured input. `start`
/// allocates the queue, spawns the drain task, and hands the sender side to
/// the input's producer work. There is no public per-consumer stop; the
/// agent tears consumers down as part of its own stop.
pub struct Consumer {
    input: Box<dyn Input>,
    drain: Option<JoinHandle<()>>,
}

impl Consumer {
    /// Wrap a configured input. The queue is not allocated until `start`.
    pub fn new(input: Box<dyn Input>) -> Self {
        Self { input, drain: None }
    }

    /// Allocate the queue and spawn both sides: the drain task consuming
    /// into `sink`, and the input's producer task(s).
    ///
    /// The producers hold the only senders, so the queue closes exactly when
    /// the last producer exits.
    pub fn start(&mut self, sink: Arc<dyn Sink>) {
        let (tx, rx) = mpsc::channel(SAMPLE_QUEUE_CAPACITY);
        self.drain = Some(tokio::spawn(drain(rx, sink)));
        self.input.start(tx);
    }

    /// Stop the input, then wait for the drain task to finish emptying the
    /// queue.
    ///
    /// `Input::stop` returns only once no further enqueues can occur, so the
    /// queue is never written after it closes.
    pub(crate) async fn stop(&mut self) {
        self.input.stop().await;
        if let Some(drain) = self.drain.take() {
            if let Err(e) = drain.await {
                tracing::warn!(error = %e, "consumer drain task failed");
            }
        }
    }
}

/// Drain loop: forward samples to the sink in arrival order until the queue
/// is closed and empty.
async fn drain(mut rx: mpsc::Receiver<Sample>, sink: Arc<dyn Sink>) {
    let mut delivered: u64 = 0;
    while let Some(sample) = rx.recv().await {
        sink.deliver(&sample);
        delivered += 1;
    }
    tracing::debug!(delivered, "sample queue drained");
}
