//! Remote reminder table client.
//!
//! # Responsibility
//! - Perform CRUD against a PostgREST-style `reminders` table over HTTP.
//! - Emit change events for writes made through this client and, when a
//!   poller is running, for changes made elsewhere.
//!
//! # Invariants
//! - Without credentials every call fails with `StoreError::Configuration`
//!   before any I/O happens.
//! - `list` is ordered by `due_at` ascending.
//! - Failures are always returned to the caller, never swallowed.

use crate::config::RemoteConfig;
use crate::logging::sanitize_message;
use crate::model::reminder::{NewReminder, Reminder, ReminderPatch};
use crate::notify::{ChangeKind, ChangeNotifier, ChangeStream, StoreSource};
use crate::store::{ReminderStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const PREFER_REPRESENTATION: &str = "return=representation";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client for the remote reminders table.
#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    endpoint: Result<RemoteEndpoint, String>,
    notifier: ChangeNotifier,
}

struct RemoteEndpoint {
    client: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl RemoteStore {
    /// Builds a client from configuration.
    ///
    /// Missing credentials are not an error here; they make every later
    /// call fail fast with `StoreError::Configuration`.
    pub fn new(config: &RemoteConfig) -> Self {
        let endpoint = match config.credentials() {
            None => Err("remote url or api key not set".to_string()),
            Some((url, api_key)) => reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map(|client| RemoteEndpoint {
                    client,
                    table_url: format!("{}/rest/v1/{}", url.trim_end_matches('/'), config.table),
                    api_key: api_key.to_string(),
                })
                .map_err(|err| format!("failed to build http client: {err}")),
        };

        match &endpoint {
            Ok(endpoint) => info!(
                "event=remote_init module=store.remote status=ok table_url={}",
                endpoint.table_url
            ),
            Err(reason) => info!(
                "event=remote_init module=store.remote status=disabled reason=\"{reason}\""
            ),
        }

        Self {
            inner: Arc::new(RemoteInner {
                endpoint,
                notifier: ChangeNotifier::new(StoreSource::Remote),
            }),
        }
    }

    /// A client that is permanently unconfigured.
    pub fn unconfigured() -> Self {
        Self::new(&RemoteConfig::default())
    }

    pub fn is_configured(&self) -> bool {
        self.inner.endpoint.is_ok()
    }

    fn endpoint(&self) -> StoreResult<&RemoteEndpoint> {
        self.inner
            .endpoint
            .as_ref()
            .map_err(|reason| StoreError::Configuration(reason.clone()))
    }

    pub async fn list(&self) -> StoreResult<Vec<Reminder>> {
        let endpoint = self.endpoint()?;
        let request = endpoint
            .request(reqwest::Method::GET, None)
            .query(&[("select", "*"), ("order", "due_at.asc")]);
        let mut rows: Vec<Reminder> = send_json(request).await?;
        // Stable: keeps server order for equal timestamps.
        rows.sort_by_key(|row| row.due_at);
        Ok(rows)
    }

    pub async fn create(&self, record: &NewReminder) -> StoreResult<Reminder> {
        let endpoint = self.endpoint()?;
        let request = endpoint
            .request(reqwest::Method::POST, None)
            .json(&[record]);
        // Past a 2xx status the insert is committed remotely.
        let rows: Vec<Reminder> = send_json(request).await.map_err(|err| match err {
            StoreError::InvalidData(message) => StoreError::Unconfirmed(message),
            other => other,
        })?;
        let created = rows.into_iter().next().ok_or_else(|| {
            StoreError::Unconfirmed("insert returned no representation".to_string())
        })?;
        self.inner
            .notifier
            .notify(ChangeKind::Inserted, Some(&created.id));
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Reminder> {
        let endpoint = self.endpoint()?;
        let request = endpoint
            .request(reqwest::Method::PATCH, Some(id))
            .json(patch);
        let rows: Vec<Reminder> = send_json(request).await?;
        let updated = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.inner.notifier.notify(ChangeKind::Updated, Some(id));
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let endpoint = self.endpoint()?;
        let request = endpoint.request(reqwest::Method::DELETE, Some(id));
        let rows: Vec<serde_json::Value> = send_json(request).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.inner.notifier.notify(ChangeKind::Deleted, Some(id));
        Ok(())
    }

    pub fn subscribe(&self) -> ChangeStream {
        self.inner.notifier.subscribe()
    }

    /// Polls the table and emits `Refreshed` whenever the listing changes.
    ///
    /// The first successful listing only seeds the snapshot. Failed polls are
    /// logged and skipped. Dropping the handle stops the poller.
    pub fn spawn_poller(&self, interval: Duration) -> PollerHandle {
        let store = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut snapshot: Option<Vec<Reminder>> = None;
            loop {
                ticker.tick().await;
                match store.list().await {
                    Ok(rows) => {
                        let changed = snapshot.as_ref().is_some_and(|previous| *previous != rows);
                        snapshot = Some(rows);
                        if changed {
                            debug!("event=remote_poll module=store.remote status=changed");
                            store.inner.notifier.notify(ChangeKind::Refreshed, None);
                        }
                    }
                    Err(err) => debug!(
                        "event=remote_poll module=store.remote status=skipped error_code={} error={err}",
                        err.code()
                    ),
                }
            }
        });
        PollerHandle { task }
    }
}

impl RemoteEndpoint {
    fn request(&self, method: reqwest::Method, id: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, &self.table_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", PREFER_REPRESENTATION);
        if let Some(id) = id {
            request = request.query(&[("id", format!("eq.{id}"))]);
        }
        request
    }
}

/// Running remote poller. Stops when dropped.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {}
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<T> {
    let response = request.send().await.map_err(classify_transport_error)?;
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| StoreError::InvalidData(err.to_string()))
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = sanitize_message(&body, MAX_ERROR_BODY_CHARS);
    warn!(
        "event=remote_request module=store.remote status=error http_status={} body=\"{message}\"",
        status.as_u16()
    );

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Err(StoreError::Transient(format!("http {status}: {message}")));
    }
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn classify_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::InvalidData(err.to_string())
    } else {
        StoreError::Transient(err.to_string())
    }
}

#[async_trait]
impl ReminderStore for RemoteStore {
    fn source(&self) -> StoreSource {
        StoreSource::Remote
    }

    async fn list(&self) -> StoreResult<Vec<Reminder>> {
        RemoteStore::list(self).await
    }

    async fn create(&self, record: &NewReminder) -> StoreResult<Reminder> {
        RemoteStore::create(self, record).await
    }

    async fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Reminder> {
        RemoteStore::update(self, id, patch).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        RemoteStore::delete(self, id).await
    }

    fn subscribe(&self) -> ChangeStream {
        RemoteStore::subscribe(self)
    }
}
