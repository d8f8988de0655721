//! Resource lifecycle for background jobs
//!
//! A [`JobSession`] lazily acquires one resource (a database transaction in
//! production) the first time the job body asks for it. When the body
//! finishes, successfully or not, [`JobSession::on_completion`] commits and
//! releases that resource and only then runs the callbacks deferred during
//! the run, in registration order.
//!
//! The resource is dropped at every completion, so a session reused for the
//! next run starts from a fresh handle even if the previous commit failed.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::AccessResult;

/// Unit of work owned by one job run
#[async_trait]
pub trait JobResource: Send + Sync {
    /// Make the pending work durable
    async fn commit(&self) -> AccessResult<()>;

    /// Close the handle or hand it back to its pool
    async fn release(&self);
}

/// Produces a fresh [`JobResource`] on demand
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    type Resource: JobResource + 'static;

    async fn acquire(&self) -> AccessResult<Self::Resource>;
}

type DeferredCallback = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Scoped resource context for one or more consecutive job runs
pub struct JobSession<F: ResourceFactory> {
    factory: Arc<F>,
    resource: Option<Arc<F::Resource>>,
    deferred: VecDeque<DeferredCallback>,
}

impl<F: ResourceFactory> JobSession<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            resource: None,
            deferred: VecDeque::new(),
        }
    }

    /// Resource for the current run, acquired on first use
    pub async fn with_resource(&mut self) -> AccessResult<Arc<F::Resource>> {
        if let Some(resource) = &self.resource {
            return Ok(Arc::clone(resource));
        }

        debug!("Acquiring job resource");
        let resource = Arc::new(self.factory.acquire().await?);
        self.resource = Some(Arc::clone(&resource));
        Ok(resource)
    }

    /// Register `callback` to run after the resource has been committed
    pub fn defer_after_completion<C, Fut>(&mut self, callback: C)
    where
        C: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.deferred
            .push_back(Box::new(move || Box::pin(callback())));
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.deferred.len()
    }

    /// Finish the current run
    ///
    /// Commits and releases the resource if one was acquired, whatever the
    /// `outcome`, then drains the deferred callbacks in FIFO order. If the
    /// commit fails the callbacks are discarded, since the state they were
    /// meant to observe never became durable, and the commit error is
    /// returned.
    pub async fn on_completion<T, E: Display>(
        &mut self,
        outcome: &Result<T, E>,
    ) -> AccessResult<()> {
        if let Err(e) = outcome {
            warn!("Job body failed, completing session anyway: {}", e);
        }

        if let Some(resource) = self.resource.take() {
            let committed = resource.commit().await;
            resource.release().await;

            if let Err(e) = committed {
                error!(
                    discarded_callbacks = self.deferred.len(),
                    "Job commit failed: {}", e
                );
                self.deferred.clear();
                return Err(e);
            }
        }

        while let Some(callback) = self.deferred.pop_front() {
            callback().await;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory resource used by the session and monitor tests

    use super::*;
    use crate::error::AccessError;
    use crate::models::{AuditEntry, NewAuditEntry};
    use crate::repositories::AuditStore;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Shared, ordered log of lifecycle events
    pub type EventLog = Arc<Mutex<Vec<String>>>;

    pub struct FakeResource {
        serial: usize,
        events: EventLog,
        fail_commit: bool,
        reject_marker: Option<String>,
        pending: Mutex<Vec<AuditEntry>>,
        committed: Arc<Mutex<Vec<AuditEntry>>>,
    }

    #[async_trait]
    impl JobResource for FakeResource {
        async fn commit(&self) -> AccessResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("commit:{}", self.serial));
            if self.fail_commit {
                return Err(AccessError::Database(
                    common::error::DatabaseError::Configuration("commit refused".into()),
                ));
            }
            let mut pending = self.pending.lock().unwrap();
            self.committed.lock().unwrap().append(&mut pending);
            Ok(())
        }

        async fn release(&self) {
            self.events
                .lock()
                .unwrap()
                .push(format!("release:{}", self.serial));
        }
    }

    #[async_trait]
    impl AuditStore for FakeResource {
        async fn append(&self, entry: NewAuditEntry) -> AccessResult<AuditEntry> {
            let mut stored = self.append_all(vec![entry]).await?;
            Ok(stored.remove(0))
        }

        /// All-or-nothing; a batch with any entry carrying the marker is refused
        async fn append_all(&self, entries: Vec<NewAuditEntry>) -> AccessResult<Vec<AuditEntry>> {
            if let Some(marker) = &self.reject_marker {
                let rejected = entries.iter().any(|entry| {
                    entry
                        .response_message
                        .as_deref()
                        .is_some_and(|message| message.contains(marker.as_str()))
                });
                if rejected {
                    return Err(AccessError::Database(
                        common::error::DatabaseError::Configuration("insert refused".into()),
                    ));
                }
            }

            let stored: Vec<AuditEntry> = entries
                .into_iter()
                .map(|entry| AuditEntry {
                    id: Uuid::new_v4(),
                    authorization_code_id: entry.authorization_code_id,
                    command: entry.command,
                    response_status: entry.response_status,
                    response_message: entry.response_message,
                    accessed_at: Utc::now(),
                })
                .collect();
            self.pending.lock().unwrap().extend(stored.iter().cloned());
            Ok(stored)
        }

        async fn list_for_code(
            &self,
            authorization_code_id: Uuid,
        ) -> AccessResult<Vec<AuditEntry>> {
            Ok(self
                .committed
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.authorization_code_id == Some(authorization_code_id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct FakeFactory {
        pub events: EventLog,
        pub acquired: AtomicUsize,
        pub fail_commit: AtomicBool,
        pub reject_marker: Mutex<Option<String>>,
        pub committed: Arc<Mutex<Vec<AuditEntry>>>,
    }

    impl FakeFactory {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        pub fn committed_commands(&self) -> Vec<String> {
            self.committed
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.command.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ResourceFactory for FakeFactory {
        type Resource = FakeResource;

        async fn acquire(&self) -> AccessResult<FakeResource> {
            let serial = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
            self.events
                .lock()
                .unwrap()
                .push(format!("acquire:{}", serial));
            Ok(FakeResource {
                serial,
                events: Arc::clone(&self.events),
                fail_commit: self.fail_commit.load(Ordering::SeqCst),
                reject_marker: self.reject_marker.lock().unwrap().clone(),
                pending: Mutex::new(Vec::new()),
                committed: Arc::clone(&self.committed),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{EventLog, FakeFactory};
    use super::*;
    use crate::error::AccessError;
    use std::sync::atomic::Ordering;

    fn record(events: EventLog, label: &'static str) -> impl Future<Output = ()> + Send + 'static {
        async move {
            events.lock().unwrap().push(label.to_string());
        }
    }

    #[tokio::test]
    async fn test_resource_is_acquired_lazily_and_reused() {
        let factory = Arc::new(FakeFactory::default());
        let mut session = JobSession::new(Arc::clone(&factory));

        assert!(!session.has_resource());
        assert_eq!(factory.acquired.load(Ordering::SeqCst), 0);

        let first = session.with_resource().await.unwrap();
        let second = session.with_resource().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commit_then_callbacks_in_registration_order() {
        let factory = Arc::new(FakeFactory::default());
        let events = Arc::clone(&factory.events);
        let mut session = JobSession::new(Arc::clone(&factory));

        session.with_resource().await.unwrap();
        let first = record(Arc::clone(&events), "callback:first");
        let second = record(Arc::clone(&events), "callback:second");
        session.defer_after_completion(move || first);
        session.defer_after_completion(move || second);
        assert_eq!(session.pending_callbacks(), 2);

        let outcome: Result<(), AccessError> = Ok(());
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(
            factory.events(),
            vec![
                "acquire:1",
                "commit:1",
                "release:1",
                "callback:first",
                "callback:second"
            ]
        );
        assert_eq!(session.pending_callbacks(), 0);
        assert!(!session.has_resource());
    }

    #[tokio::test]
    async fn test_failed_body_still_commits() {
        let factory = Arc::new(FakeFactory::default());
        let events = Arc::clone(&factory.events);
        let mut session = JobSession::new(Arc::clone(&factory));

        session.with_resource().await.unwrap();
        let callback = record(Arc::clone(&events), "callback");
        session.defer_after_completion(move || callback);

        let outcome: Result<(), AccessError> = Err(AccessError::Dispatch("boom".into()));
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(
            factory.events(),
            vec!["acquire:1", "commit:1", "release:1", "callback"]
        );
    }

    #[tokio::test]
    async fn test_callbacks_run_without_resource() {
        let factory = Arc::new(FakeFactory::default());
        let events = Arc::clone(&factory.events);
        let mut session = JobSession::new(Arc::clone(&factory));

        let callback = record(Arc::clone(&events), "callback");
        session.defer_after_completion(move || callback);

        let outcome: Result<(), AccessError> = Ok(());
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(factory.events(), vec!["callback"]);
    }

    #[tokio::test]
    async fn test_reused_session_starts_clean() {
        let factory = Arc::new(FakeFactory::default());
        let events = Arc::clone(&factory.events);
        let mut session = JobSession::new(Arc::clone(&factory));
        let ok: Result<(), AccessError> = Ok(());

        session.with_resource().await.unwrap();
        let first_run = record(Arc::clone(&events), "callback:run1");
        session.defer_after_completion(move || first_run);
        session.on_completion(&ok).await.unwrap();

        assert_eq!(session.pending_callbacks(), 0);

        session.with_resource().await.unwrap();
        session.on_completion(&ok).await.unwrap();

        assert_eq!(
            factory.events(),
            vec![
                "acquire:1",
                "commit:1",
                "release:1",
                "callback:run1",
                "acquire:2",
                "commit:2",
                "release:2"
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_failure_discards_callbacks_and_replaces_handle() {
        let factory = Arc::new(FakeFactory::default());
        factory.fail_commit.store(true, Ordering::SeqCst);
        let events = Arc::clone(&factory.events);
        let mut session = JobSession::new(Arc::clone(&factory));
        let ok: Result<(), AccessError> = Ok(());

        session.with_resource().await.unwrap();
        let callback = record(Arc::clone(&events), "callback");
        session.defer_after_completion(move || callback);

        let result = session.on_completion(&ok).await;

        assert!(matches!(result, Err(AccessError::Database(_))));
        assert_eq!(session.pending_callbacks(), 0);
        assert_eq!(factory.events(), vec!["acquire:1", "commit:1", "release:1"]);

        factory.fail_commit.store(false, Ordering::SeqCst);
        session.with_resource().await.unwrap();
        session.on_completion(&ok).await.unwrap();

        assert_eq!(factory.acquired.load(Ordering::SeqCst), 2);
    }
}
