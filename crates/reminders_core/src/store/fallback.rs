//! Remote-preferred, local-fallback store composition.
//!
//! # Responsibility
//! - Present one `ReminderStore` over an ordered list of delegates.
//! - Retry each operation against the next delegate when one fails.
//! - Merge the change feeds of every delegate.
//!
//! # Invariants
//! - Delegates are tried strictly in order, one at a time; a later delegate
//!   is only called after the earlier one has failed.
//! - Results are never merged across delegates; the first success wins.
//! - Validation errors stop the chain immediately.
//! - `list` never fails: if every delegate fails it returns an empty list.
//! - Records written to a later delegate are never copied back to an earlier
//!   one, and no conflict detection happens between delegates.

use crate::model::reminder::{NewReminder, Reminder, ReminderPatch};
use crate::notify::{ChangeStream, StoreSource};
use crate::store::local::LocalStore;
use crate::store::remote::RemoteStore;
use crate::store::{ReminderStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Store that tries its delegates in order until one succeeds.
#[derive(Clone)]
pub struct FallbackStore {
    delegates: Vec<Arc<dyn ReminderStore>>,
}

impl FallbackStore {
    pub fn new(delegates: Vec<Arc<dyn ReminderStore>>) -> Self {
        Self { delegates }
    }

    /// The standard composition: remote table first, local database second.
    pub fn remote_then_local(remote: RemoteStore, local: LocalStore) -> Self {
        Self::new(vec![Arc::new(remote), Arc::new(local)])
    }

    pub fn delegates(&self) -> &[Arc<dyn ReminderStore>] {
        &self.delegates
    }

    async fn attempt<'a, T, F>(&'a self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Fn(&'a dyn ReminderStore) -> StoreFuture<'a, T>,
    {
        let mut last_error = None;
        for delegate in &self.delegates {
            let source = delegate.source();
            match call(delegate.as_ref()).await {
                Ok(value) => {
                    debug!("event=store_call module=store.fallback status=ok op={operation} source={source}");
                    return Ok(value);
                }
                Err(err) if !err.allows_fallback() => return Err(err),
                Err(err) => {
                    log_fallback(operation, source, &err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StoreError::Configuration("no reminder stores configured".to_string())
        }))
    }
}

fn log_fallback(operation: &str, source: StoreSource, err: &StoreError) {
    match err {
        StoreError::Configuration(_) | StoreError::NotFound(_) => debug!(
            "event=store_fallback module=store.fallback status=skipped op={operation} source={source} error_code={} error={err}",
            err.code()
        ),
        _ => warn!(
            "event=store_fallback module=store.fallback status=error op={operation} source={source} error_code={} retryable={} error={err}",
            err.code(),
            err.is_retryable()
        ),
    }
}

#[async_trait]
impl ReminderStore for FallbackStore {
    fn source(&self) -> StoreSource {
        StoreSource::Fallback
    }

    async fn list(&self) -> StoreResult<Vec<Reminder>> {
        match self.attempt("list", |store| store.list()).await {
            Ok(items) => Ok(items),
            Err(err) => {
                warn!(
                    "event=store_call module=store.fallback status=degraded op=list error_code={} error={err}",
                    err.code()
                );
                Ok(Vec::new())
            }
        }
    }

    async fn create(&self, record: &NewReminder) -> StoreResult<Reminder> {
        self.attempt("create", |store| store.create(record)).await
    }

    async fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Reminder> {
        self.attempt("update", |store| store.update(id, patch)).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.attempt("delete", |store| store.delete(id)).await
    }

    fn subscribe(&self) -> ChangeStream {
        ChangeStream::merge(self.delegates.iter().map(|delegate| delegate.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::FallbackStore;
    use crate::model::reminder::{NewReminder, Reminder, ReminderDraft, ReminderPatch};
    use crate::notify::{ChangeNotifier, ChangeStream, StoreSource};
    use crate::store::{ReminderStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Delegate that fails every call with a fixed error kind and counts calls.
    struct FailingStore {
        calls: AtomicUsize,
        validation: bool,
        notifier: ChangeNotifier,
    }

    impl FailingStore {
        fn new(validation: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                validation,
                notifier: ChangeNotifier::new(StoreSource::Remote),
            }
        }

        fn fail<T>(&self) -> StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.validation {
                Err(StoreError::Validation(
                    crate::model::reminder::ReminderValidationError::MissingTitle,
                ))
            } else {
                Err(StoreError::Transient("connection refused".to_string()))
            }
        }
    }

    #[async_trait]
    impl ReminderStore for FailingStore {
        fn source(&self) -> StoreSource {
            StoreSource::Remote
        }

        async fn list(&self) -> StoreResult<Vec<Reminder>> {
            self.fail()
        }

        async fn create(&self, _record: &NewReminder) -> StoreResult<Reminder> {
            self.fail()
        }

        async fn update(&self, _id: &str, _patch: &ReminderPatch) -> StoreResult<Reminder> {
            self.fail()
        }

        async fn delete(&self, _id: &str) -> StoreResult<()> {
            self.fail()
        }

        fn subscribe(&self) -> ChangeStream {
            self.notifier.subscribe()
        }
    }

    fn record() -> NewReminder {
        ReminderDraft::new("Pay rent", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn list_degrades_to_empty_when_every_delegate_fails() {
        let store = FallbackStore::new(vec![
            Arc::new(FailingStore::new(false)),
            Arc::new(FailingStore::new(false)),
        ]);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutation_surfaces_last_error_when_every_delegate_fails() {
        let first = Arc::new(FailingStore::new(false));
        let second = Arc::new(FailingStore::new(false));
        let store = FallbackStore::new(vec![first.clone(), second.clone()]);

        let err = store.create(&record()).await.unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_error_does_not_fall_back() {
        let first = Arc::new(FailingStore::new(true));
        let second = Arc::new(FailingStore::new(false));
        let store = FallbackStore::new(vec![first.clone(), second.clone()]);

        let err = store.delete("x").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_composition_reports_configuration_error() {
        let store = FallbackStore::new(Vec::new());
        let err = store.delete("x").await.unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
        assert!(store.subscribe().is_empty());
    }
}
