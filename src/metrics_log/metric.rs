//! Recorded operation metrics and query result types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One recorded operation outcome.
///
/// Serialized as `{ "type", "timestamp", "duration", "details" }`, with the
/// duration in (fractional) milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetric {
    /// Operation kind, e.g. `"create"` or `"list"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the operation started: the recording time minus the duration.
    /// For metrics without a duration this is the moment the metric was
    /// recorded. Age-based retention measures from this instant, so the
    /// persisted `timestamp` marks the start of a timed operation rather
    /// than its completion.
    #[serde(rename = "timestamp")]
    pub started_at: DateTime<Utc>,
    /// Elapsed time, present only when a matching start token was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_ms")]
    pub duration: Option<Duration>,
    /// Free-form detail, e.g. `{"error": "..."}`.
    #[serde(rename = "details", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Map<String, Value>>,
}

impl OperationMetric {
    /// A metric of `kind` stamped with the current wall-clock time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            started_at: Utc::now(),
            duration: None,
            detail: None,
        }
    }

    /// Override the start timestamp.
    pub fn at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Attach a duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attach a detail map.
    pub fn with_detail(mut self, detail: Map<String, Value>) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// One page of the metrics log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPage {
    pub data: Vec<OperationMetric>,
    /// Entries in the whole log (after retention).
    pub total_count: usize,
    /// Whether a further page exists.
    pub has_more: bool,
}

/// Result of loading the persisted snapshot at startup.
///
/// Every variant other than [`Loaded`](Self::Loaded) starts the log empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored (or the log was built without loading).
    Empty,
    /// The snapshot was loaded; the count is after retention was applied.
    Loaded(usize),
    /// The store failed to read.
    Unreadable(String),
    /// The stored snapshot could not be parsed.
    Corrupt(String),
}

impl LoadOutcome {
    /// Whether loading hit a soft failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, LoadOutcome::Unreadable(_) | LoadOutcome::Corrupt(_))
    }
}

/// `Option<Duration>` as an optional float number of milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<f64> = Option::deserialize(d)?;
        match millis {
            Some(ms) if ms.is_finite() && ms >= 0.0 => Duration::try_from_secs_f64(ms / 1000.0)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("duration {ms}ms out of range: {e}"))),
            _ => Ok(None),
        }
    }
}
