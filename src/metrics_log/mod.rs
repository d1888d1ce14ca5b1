//! Bounded, persisted log of operation outcomes.
//!
//! [`MetricsLog`] times operations (`start_operation` / `record_operation`),
//! keeps the recorded [`OperationMetric`]s in insertion order and answers
//! aggregate queries over them.
//!
//! # Retention
//!
//! Two independent bounds apply on every read and before every persisted
//! write: entries at least `max_age` old are dropped, then the log is
//! truncated to the newest `max_count` entries. Survivors keep their order.
//!
//! # Persistence
//!
//! The log is written to a [`MetricsStore`] under [`STORAGE_KEY`] as a JSON
//! array. Writes are coalesced: the first change schedules a save
//! `save_delay` later and further changes before it fires ride along. Save
//! and load failures are logged and counted but never reach the caller; a
//! snapshot that cannot be loaded starts the log empty (see [`LoadOutcome`]).
//!
//! # Start tokens
//!
//! `start_operation(id)` stores a start time that the matching
//! `record_operation` consumes. Tokens never consumed are dropped once older
//! than `token_ttl`, checked whenever a new operation starts.

mod metric;
pub mod store;

pub use metric::{LoadOutcome, MetricsPage, OperationMetric};
pub use store::{FileStore, MemoryStore, MetricsStore};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::Result;
use crate::telemetry;
use crate::timer::ScheduledTask;

/// Key the snapshot is stored under.
pub const STORAGE_KEY: &str = "operation_metrics";

/// Configuration for the metrics log.
///
/// ```rust
/// # use muninn::MetricsConfig;
/// # use std::time::Duration;
/// let config = MetricsConfig::new()
///     .max_count(500)
///     .max_age(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Maximum number of retained entries. Default: 1,000.
    pub max_count: usize,
    /// Maximum age of retained entries. Default: 24 hours.
    pub max_age: Duration,
    /// Delay between the first change and the persisted write. Default: 1s.
    pub save_delay: Duration,
    /// Entries per page for [`MetricsLog::metrics_page()`]. Default: 999.
    pub page_size: usize,
    /// Lifetime of unconsumed start tokens. Default: 1 hour.
    pub token_ttl: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_count: 1_000,
            max_age: Duration::from_secs(24 * 3600),
            save_delay: Duration::from_secs(1),
            page_size: 999,
            token_ttl: Duration::from_secs(3600),
        }
    }
}

impl MetricsConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retained entries.
    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = n;
        self
    }

    /// Set the maximum age of retained entries.
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Set the persistence coalescing delay.
    pub fn save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Set the page size used by [`MetricsLog::metrics_page()`].
    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }

    /// Set the lifetime of unconsumed start tokens.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<OperationMetric>,
    started: HashMap<String, Instant>,
    save_timer: Option<ScheduledTask>,
}

struct Shared {
    config: MetricsConfig,
    store: Arc<dyn MetricsStore>,
    state: Mutex<LogState>,
    /// Held across snapshot and write so saves land in snapshot order.
    save_lock: tokio::sync::Mutex<()>,
    load_outcome: LoadOutcome,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_retention(&self, state: &mut LogState, now: DateTime<Utc>) {
        retain_window(&mut state.entries, &self.config, now);
    }

    /// Retained entries serialized as a JSON array.
    fn snapshot(&self, state: &mut LogState) -> Result<String> {
        self.apply_retention(state, Utc::now());
        Ok(serde_json::to_string(&state.entries)?)
    }

    /// Snapshot and write, one save at a time.
    async fn persist(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let snapshot = {
            let mut state = self.state();
            self.snapshot(&mut state)
        }?;
        self.store.save(STORAGE_KEY, &snapshot).await
    }

    /// Body of the coalesced save timer.
    async fn persist_scheduled(&self) {
        self.state().save_timer = None;
        let result = self.persist().await;
        match result {
            Ok(()) => debug!("metrics log persisted"),
            Err(e) => {
                metrics::counter!(telemetry::PERSISTENCE_FAILURES_TOTAL, "phase" => "save")
                    .increment(1);
                warn!(error = %e, "failed to persist metrics log");
            }
        }
    }
}

/// Bounded, persisted log of operation metrics.
///
/// Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct MetricsLog {
    shared: Arc<Shared>,
}

impl MetricsLog {
    /// Open the log, loading any snapshot previously saved to `store`.
    ///
    /// Never fails: an unreadable or corrupt snapshot is logged and the log
    /// starts empty. Inspect [`load_outcome()`](Self::load_outcome) to tell
    /// the cases apart.
    pub async fn open(config: MetricsConfig, store: Arc<dyn MetricsStore>) -> Self {
        let (entries, load_outcome) = match store.load(STORAGE_KEY).await {
            Ok(None) => (VecDeque::new(), LoadOutcome::Empty),
            Ok(Some(json)) => match serde_json::from_str::<VecDeque<OperationMetric>>(&json) {
                Ok(mut entries) => {
                    retain_window(&mut entries, &config, Utc::now());
                    let retained = entries.len();
                    info!(retained, "loaded metrics snapshot");
                    (entries, LoadOutcome::Loaded(retained))
                }
                Err(e) => {
                    metrics::counter!(telemetry::PERSISTENCE_FAILURES_TOTAL, "phase" => "load")
                        .increment(1);
                    warn!(error = %e, "corrupt metrics snapshot, starting empty");
                    (VecDeque::new(), LoadOutcome::Corrupt(e.to_string()))
                }
            },
            Err(e) => {
                metrics::counter!(telemetry::PERSISTENCE_FAILURES_TOTAL, "phase" => "load")
                    .increment(1);
                warn!(error = %e, "failed to load metrics snapshot, starting empty");
                (VecDeque::new(), LoadOutcome::Unreadable(e.to_string()))
            }
        };

        Self::from_parts(config, store, entries, load_outcome)
    }

    /// An empty log persisting to a fresh [`MemoryStore`].
    pub fn in_memory(config: MetricsConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryStore::new()),
            VecDeque::new(),
            LoadOutcome::Empty,
        )
    }

    fn from_parts(
        config: MetricsConfig,
        store: Arc<dyn MetricsStore>,
        entries: VecDeque<OperationMetric>,
        load_outcome: LoadOutcome,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                store,
                state: Mutex::new(LogState {
                    entries,
                    ..LogState::default()
                }),
                save_lock: tokio::sync::Mutex::new(()),
                load_outcome,
            }),
        }
    }

    /// The configuration this log was built with.
    pub fn config(&self) -> &MetricsConfig {
        &self.shared.config
    }

    /// How the startup snapshot load went.
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.shared.load_outcome
    }

    /// Remember the current time as the start of operation `id`.
    pub fn start_operation(&self, id: &str) {
        let now = Instant::now();
        let ttl = self.shared.config.token_ttl;
        let mut state = self.shared.state();
        state
            .started
            .retain(|_, started| now.saturating_duration_since(*started) < ttl);
        state.started.insert(id.to_owned(), now);
    }

    /// Append a metric of `kind`.
    ///
    /// If `id` names a started operation, its token is consumed and the
    /// elapsed time becomes the metric's duration. Schedules a coalesced
    /// persisted write.
    pub fn record_operation(
        &self,
        kind: &str,
        detail: Option<Map<String, Value>>,
        id: Option<&str>,
    ) {
        let now = Instant::now();
        let mut state = self.shared.state();
        let duration = id
            .and_then(|id| state.started.remove(id))
            .map(|started| now.saturating_duration_since(started));

        let recorded_at = Utc::now();
        let mut metric = OperationMetric::new(kind).at(recorded_at);
        if let Some(duration) = duration {
            metric = metric.with_duration(duration);
            if let Ok(elapsed) = TimeDelta::from_std(duration) {
                metric = metric.at(recorded_at - elapsed);
            }
        }
        if let Some(detail) = detail {
            metric = metric.with_detail(detail);
        }
        debug!(
            kind,
            duration_ms = duration.map(|d| d.as_secs_f64() * 1000.0),
            "operation recorded"
        );

        state.entries.push_back(metric);
        self.schedule_save(&mut state);
    }

    /// Append a fully-formed metric, e.g. one imported from elsewhere.
    pub fn append(&self, metric: OperationMetric) {
        let mut state = self.shared.state();
        state.entries.push_back(metric);
        self.schedule_save(&mut state);
    }

    /// All retained metrics, oldest first.
    pub fn metrics(&self) -> Vec<OperationMetric> {
        let mut state = self.shared.state();
        self.shared.apply_retention(&mut state, Utc::now());
        state.entries.iter().cloned().collect()
    }

    /// Retained metrics of one kind, oldest first.
    pub fn metrics_by_kind(&self, kind: &str) -> Vec<OperationMetric> {
        let mut state = self.shared.state();
        self.shared.apply_retention(&mut state, Utc::now());
        state
            .entries
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    /// Mean duration of `kind` over the metrics that carry one.
    ///
    /// Returns `None` when no metric of that kind has a duration.
    pub fn average_duration(&self, kind: &str) -> Option<Duration> {
        let durations: Vec<Duration> = self
            .metrics_by_kind(kind)
            .into_iter()
            .filter_map(|m| m.duration)
            .collect();
        if durations.is_empty() {
            return None;
        }
        let total: Duration = durations.iter().sum();
        Some(total / u32::try_from(durations.len()).unwrap_or(u32::MAX))
    }

    /// Number of retained metrics per kind.
    pub fn operation_counts(&self) -> BTreeMap<String, usize> {
        let mut state = self.shared.state();
        self.shared.apply_retention(&mut state, Utc::now());
        let mut counts = BTreeMap::new();
        for metric in &state.entries {
            *counts.entry(metric.kind.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// One page of retained metrics. Pages are 1-based; page 0 is read as
    /// page 1. A page past the end is empty with `has_more == false`.
    pub fn metrics_page(&self, page: usize) -> MetricsPage {
        let size = self.shared.config.page_size.max(1);
        let start = page.max(1).saturating_sub(1).saturating_mul(size);
        let end = start.saturating_add(size);

        let mut state = self.shared.state();
        self.shared.apply_retention(&mut state, Utc::now());
        let total_count = state.entries.len();
        MetricsPage {
            data: state.entries.iter().skip(start).take(size).cloned().collect(),
            total_count,
            has_more: end < total_count,
        }
    }

    /// Drop every metric and start token; the empty state is persisted.
    pub fn clear(&self) {
        let mut state = self.shared.state();
        state.entries.clear();
        state.started.clear();
        self.schedule_save(&mut state);
    }

    /// Persist now, cancelling any scheduled save.
    ///
    /// Waits for a background save already in progress, then writes the
    /// current state. Unlike the coalesced background save, failures are
    /// returned.
    pub async fn flush(&self) -> Result<()> {
        if let Some(timer) = self.shared.state().save_timer.take() {
            timer.cancel();
        }
        self.shared.persist().await
    }

    /// Number of retained metrics.
    pub fn len(&self) -> usize {
        let mut state = self.shared.state();
        self.shared.apply_retention(&mut state, Utc::now());
        state.entries.len()
    }

    /// Whether the log holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of started operations not yet recorded.
    pub fn pending_tokens(&self) -> usize {
        self.shared.state().started.len()
    }

    /// Whether a persisted write is scheduled.
    pub fn save_pending(&self) -> bool {
        self.shared.state().save_timer.is_some()
    }

    /// Schedule a save unless one is already pending.
    fn schedule_save(&self, state: &mut LogState) {
        if state.save_timer.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        state.save_timer = Some(ScheduledTask::after(
            self.shared.config.save_delay,
            async move { shared.persist_scheduled().await },
        ));
    }
}

/// Drop entries at least `max_age` old, then everything beyond the newest
/// `max_count`.
fn retain_window(
    entries: &mut VecDeque<OperationMetric>,
    config: &MetricsConfig,
    now: DateTime<Utc>,
) {
    let max_age = TimeDelta::from_std(config.max_age).unwrap_or(TimeDelta::MAX);
    entries.retain(|m| now.signed_duration_since(m.started_at) < max_age);
    let excess = entries.len().saturating_sub(config.max_count);
    entries.drain(..excess);
}
