//! HTTP client for the record service.
//!
//! [`ApiClient`] issues the CRUD requests and routes their outcomes into the
//! injected [`ResponseCache`] and [`MetricsLog`]:
//!
//! - `list` reads through the cache, keyed by [`ListQuery::cache_key()`].
//! - `create` and `delete` go through a [`Debouncer`], so a double-click
//!   sends one request. `update` is sent immediately.
//! - Every write is timed into the metrics log and, on success, marks every
//!   cached list page for the next batched invalidation pass.
//!
//! Non-2xx responses become [`MuninnError::Api`] carrying the status and body
//! text. Nothing is retried and failures are never cached.

mod query;

pub use query::{LIST_KEY_PREFIX, ListQuery, Page, SortOrder};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheConfig, ResponseCache};
use crate::debounce::Debouncer;
use crate::metrics_log::{MetricsConfig, MetricsLog};
use crate::telemetry;
use crate::{MuninnError, Result};
use query::RawPage;

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root. Default: `http://localhost:8080`.
    pub base_url: String,
    /// Collection path below the root. Default: `api/identifications`.
    pub resource: String,
    /// Quiet period for debounced writes. Default: 100ms.
    pub debounce_delay: Duration,
    /// Transport timeout; `None` leaves it to reqwest. Default: `None`.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            resource: "api/identifications".to_string(),
            debounce_delay: Duration::from_millis(100),
            timeout: None,
        }
    }
}

/// Client state shared with the debounced operations.
struct Inner<R> {
    http: reqwest::Client,
    collection_url: Url,
    cache: ResponseCache<Page<R>>,
    metrics: MetricsLog,
    next_operation: AtomicU64,
}

/// Record-service client with read-through caching, debounced writes and
/// operation metrics.
///
/// Generic over the record type `R`; the client never inspects records.
pub struct ApiClient<R> {
    inner: Arc<Inner<R>>,
    create: Debouncer<R, R>,
    delete: Debouncer<String, ()>,
}

impl<R> ApiClient<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a new builder.
    pub fn builder() -> ApiClientBuilder<R> {
        ApiClientBuilder::new()
    }

    /// One page of records, served from the cache when fresh.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<R>> {
        let key = query.cache_key();
        if let Some(entry) = self.inner.cache.get(&key) {
            debug!(key, "list served from cache");
            return Ok(entry.value);
        }

        let page = self
            .inner
            .tracked("list", self.inner.fetch_list(query))
            .await?;
        self.inner.cache.set(&key, page.clone(), page.total_count);
        Ok(page)
    }

    /// Create a record (debounced).
    ///
    /// A call replaced by a newer one within the debounce window resolves
    /// to [`MuninnError::Superseded`] without sending anything.
    pub async fn create(&self, record: R) -> Result<R> {
        self.create.call(record).await
    }

    /// Replace the record `id`. Sent immediately.
    pub async fn update(&self, id: &str, record: &R) -> Result<R> {
        let updated = self
            .inner
            .tracked("update", self.inner.send_update(id, record))
            .await?;
        self.inner.invalidate_lists();
        Ok(updated)
    }

    /// Delete the record `id` (debounced).
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete.call(id.to_owned()).await
    }

    /// The response cache backing `list`.
    pub fn cache(&self) -> &ResponseCache<Page<R>> {
        &self.inner.cache
    }

    /// The metrics log receiving operation timings.
    pub fn metrics(&self) -> &MetricsLog {
        &self.inner.metrics
    }
}

impl<R> Inner<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn item_url(&self, id: &str) -> Result<Url> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                MuninnError::Configuration(format!(
                    "cannot-be-a-base URL: {}",
                    self.collection_url
                ))
            })?
            .push(id);
        Ok(url)
    }

    /// Run `request` bracketed by a metrics-log entry and telemetry.
    async fn tracked<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let seq = self.next_operation.fetch_add(1, Ordering::Relaxed);
        let operation_id = format!("{operation}_{seq}");
        self.metrics.start_operation(&operation_id);
        let started = Instant::now();

        let result = request.await;

        let mut detail = Map::new();
        let status = match &result {
            Ok(_) => {
                detail.insert("success".into(), Value::Bool(true));
                "ok"
            }
            Err(e) => {
                detail.insert("error".into(), Value::String(e.to_string()));
                if let Some(code) = e.status() {
                    detail.insert("status".into(), Value::from(code));
                }
                "error"
            }
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        self.metrics
            .record_operation(operation, Some(detail), Some(&operation_id));
        result
    }

    async fn fetch_list(&self, query: &ListQuery) -> Result<Page<R>> {
        let response = self
            .http
            .get(self.collection_url.clone())
            .query(&query.query_pairs())
            .send()
            .await?;
        let raw: RawPage<R> = read_json(response).await?;
        Ok(raw.into())
    }

    async fn send_create(&self, record: &R) -> Result<R> {
        let response = self
            .http
            .post(self.collection_url.clone())
            .json(record)
            .send()
            .await?;
        read_json(response).await
    }

    async fn send_update(&self, id: &str, record: &R) -> Result<R> {
        let response = self.http.put(self.item_url(id)?).json(record).send().await?;
        read_json(response).await
    }

    async fn send_delete(&self, id: &str) -> Result<()> {
        let response = self.http.delete(self.item_url(id)?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn create_now(&self, record: R) -> Result<R> {
        let created = self.tracked("create", self.send_create(&record)).await?;
        self.invalidate_lists();
        Ok(created)
    }

    async fn delete_now(&self, id: String) -> Result<()> {
        self.tracked("delete", self.send_delete(&id)).await?;
        self.invalidate_lists();
        Ok(())
    }

    /// Mark every cached list page stale.
    fn invalidate_lists(&self) {
        for key in self.cache.keys_with_prefix(LIST_KEY_PREFIX) {
            self.cache.mark_for_update(&key);
        }
    }
}

/// Turn a non-2xx response into [`MuninnError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(MuninnError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Builder for [`ApiClient`].
///
/// The cache and metrics log are injected so several clients (or tests) can
/// share or isolate them; when omitted, fresh in-memory instances are used.
pub struct ApiClientBuilder<R> {
    config: ClientConfig,
    cache: Option<ResponseCache<Page<R>>>,
    metrics: Option<MetricsLog>,
    http: Option<reqwest::Client>,
}

impl<R> ApiClientBuilder<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            cache: None,
            metrics: None,
            http: None,
        }
    }

    /// Replace all connection settings at once.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the service root URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the collection path below the root.
    pub fn resource(mut self, path: impl Into<String>) -> Self {
        self.config.resource = path.into();
        self
    }

    /// Set the debounce window for `create` and `delete`.
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.config.debounce_delay = delay;
        self
    }

    /// Set the transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Use this response cache.
    pub fn cache(mut self, cache: ResponseCache<Page<R>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use this metrics log.
    pub fn metrics(mut self, metrics: MetricsLog) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use a preconfigured reqwest client (the timeout setting is ignored).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the client.
    ///
    /// Fails if the base URL does not parse or the HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<ApiClient<R>> {
        let collection_url = collection_url(&self.config)?;
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|e| {
                    MuninnError::Configuration(format!("failed to build HTTP client: {e}"))
                })?
            }
        };

        let inner = Arc::new(Inner {
            http,
            collection_url,
            cache: self
                .cache
                .unwrap_or_else(|| ResponseCache::new(CacheConfig::default())),
            metrics: self
                .metrics
                .unwrap_or_else(|| MetricsLog::in_memory(MetricsConfig::default())),
            next_operation: AtomicU64::new(0),
        });

        let delay = self.config.debounce_delay;
        let create = {
            let inner = Arc::clone(&inner);
            Debouncer::new(delay, move |record: R| {
                let inner = Arc::clone(&inner);
                async move { inner.create_now(record).await }
            })
        };
        let delete = {
            let inner = Arc::clone(&inner);
            Debouncer::new(delay, move |id: String| {
                let inner = Arc::clone(&inner);
                async move { inner.delete_now(id).await }
            })
        };

        Ok(ApiClient {
            inner,
            create,
            delete,
        })
    }
}

impl<R> Default for ApiClientBuilder<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// `{base_url}/{resource}` with the resource segments appended.
fn collection_url(config: &ClientConfig) -> Result<Url> {
    let mut url = Url::parse(&config.base_url).map_err(|e| {
        MuninnError::Configuration(format!("invalid base URL {}: {e}", config.base_url))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            MuninnError::Configuration(format!("cannot-be-a-base URL: {}", config.base_url))
        })?
        .pop_if_empty()
        .extend(config.resource.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_url_joins_resource() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/".into(),
            resource: "/api/identifications".into(),
            ..ClientConfig::default()
        };
        let url = collection_url(&config).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/identifications");
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let config = ClientConfig {
            base_url: "not a url".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            collection_url(&config),
            Err(MuninnError::Configuration(_))
        ));
    }
}
