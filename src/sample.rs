//! The measurement record exchanged between inputs and the sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label set attached to a sample. Keys are unique; ordering is irrelevant.
pub type Labels = BTreeMap<String, String>;

/// A single measurement produced by an input.
///
/// Samples are immutable once produced: an input builds one, hands it to its
/// queue, and the consumer task is the terminal owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric name (e.g., `"redis_up"`).
    pub metric: String,
    /// Identifying labels.
    #[serde(default)]
    pub labels: Labels,
    /// Collection timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Measured value.
    pub value: f64,
}

impl Sample {
    /// Create a sample stamped with the current time.
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            labels: Labels::new(),
            timestamp: Utc::now(),
            value,
        }
    }

    /// Attach a single label. A repeated key overwrites the earlier value.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replace the whole label set.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Override the collection timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
