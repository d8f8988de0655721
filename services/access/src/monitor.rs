//! Periodic temperature anomaly scan
//!
//! Every run samples the current statistics of each lock-equipped property.
//! Nothing is carried over between runs. A property that cannot be parsed or
//! reached is logged and skipped; the rest of the scan continues.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::AccessAuditLog;
use crate::credential::DeviceCredential;
use crate::dispatcher::{CommandResult, LockCommand, LockCommandDispatcher};
use crate::error::AccessResult;
use crate::models::{Notification, Property};
use crate::notifications::NotificationSink;
use crate::repositories::{AuditStore, PropertyRepository};
use crate::session::{JobSession, ResourceFactory};

/// Summary of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Properties with a lock that were attempted
    pub scanned: usize,
    /// Alerts scheduled for delivery after commit
    pub notified: usize,
    /// Properties abandoned because of an error
    pub skipped: usize,
}

/// Format readings as Celsius strings rounded to two decimals
///
/// `21.456` becomes `"21.46°C"`, `19.0` stays `"19.0°C"`. Exact ties round
/// to even, so `21.125` becomes `"21.12°C"`.
pub fn format_anomalies(readings: &[f64]) -> Vec<String> {
    readings
        .iter()
        .map(|celsius| format!("{:?}°C", (celsius * 100.0).round_ties_even() / 100.0))
        .collect()
}

/// Scans lock telemetry and alerts owners about anomalies
#[derive(Clone)]
pub struct AnomalyMonitor {
    properties: Arc<dyn PropertyRepository>,
    dispatcher: LockCommandDispatcher,
    notifications: Arc<dyn NotificationSink>,
}

impl AnomalyMonitor {
    pub fn new(
        properties: Arc<dyn PropertyRepository>,
        dispatcher: LockCommandDispatcher,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            properties,
            dispatcher,
            notifications,
        }
    }

    /// Scan every lock-equipped property once
    ///
    /// Devices are polled first, with no database work in flight. The audit
    /// entries of each successfully polled property are then written as one
    /// unit through the session's resource, and alerts are deferred until the
    /// session completes, so an owner is only told about readings whose audit
    /// trail was committed. A property whose entries cannot be written is
    /// skipped without affecting the others. Only a failure to list the
    /// properties or to acquire the resource fails the run.
    pub async fn run<F>(&self, session: &mut JobSession<F>) -> AccessResult<ScanReport>
    where
        F: ResourceFactory,
        F::Resource: AuditStore,
    {
        let properties = self.properties.list_with_lock().await?;
        let mut report = ScanReport::default();

        if properties.is_empty() {
            debug!("No lock-equipped properties to scan");
            return Ok(report);
        }

        let mut samples = Vec::with_capacity(properties.len());
        for property in properties {
            let Some(lock_id) = property.lock_id.as_deref() else {
                continue;
            };
            report.scanned += 1;

            let sampled = self.sample(lock_id).await;
            match sampled {
                Ok((reading, stats)) => samples.push(Sample {
                    property,
                    reading,
                    stats,
                }),
                Err(e) => {
                    warn!(property_id = %property.id, "Skipping property in anomaly scan: {}", e);
                    report.skipped += 1;
                }
            }
        }

        if !samples.is_empty() {
            let store: Arc<dyn AuditStore> = session.with_resource().await?;
            let audit = AccessAuditLog::new(store);

            for sample in samples {
                if let Err(e) = sample.record(&audit).await {
                    warn!(
                        property_id = %sample.property.id,
                        "Skipping property whose audit entries were not stored: {}", e
                    );
                    report.skipped += 1;
                    continue;
                }

                let anomalies = format_anomalies(sample.stats.anomalies());
                if anomalies.is_empty() {
                    continue;
                }

                info!(
                    property_id = %sample.property.id,
                    count = anomalies.len(),
                    "Temperature anomalies detected"
                );

                let notification = Notification::temperature_anomaly(&sample.property, &anomalies);
                let sink = Arc::clone(&self.notifications);
                let property_id = sample.property.id;
                session.defer_after_completion(move || deliver(sink, notification, property_id));
                report.notified += 1;
            }
        }

        info!(
            scanned = report.scanned,
            notified = report.notified,
            skipped = report.skipped,
            "Anomaly scan finished"
        );

        Ok(report)
    }

    /// Poll one device for its current reading and statistics
    async fn sample(&self, lock_id: &str) -> AccessResult<(CommandResult, CommandResult)> {
        let credential = DeviceCredential::parse(lock_id)?;

        // Reading is not used; polling keeps the device's read path warm
        let reading = self
            .dispatcher
            .dispatch(&credential, LockCommand::GetTemperature.as_str())
            .await?;
        let stats = self
            .dispatcher
            .dispatch(&credential, LockCommand::GetTemperatureStats.as_str())
            .await?;

        Ok((reading, stats))
    }
}

struct Sample {
    property: Property,
    reading: CommandResult,
    stats: CommandResult,
}

impl Sample {
    async fn record(&self, audit: &AccessAuditLog) -> AccessResult<()> {
        audit
            .record_results(
                &[
                    (LockCommand::GetTemperature.as_str(), &self.reading),
                    (LockCommand::GetTemperatureStats.as_str(), &self.stats),
                ],
                None,
            )
            .await?;
        Ok(())
    }
}

async fn deliver(sink: Arc<dyn NotificationSink>, notification: Notification, property_id: Uuid) {
    if let Err(e) = sink.notify(notification).await {
        warn!(property_id = %property_id, "Failed to enqueue anomaly alert: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::session::testing::EventLog;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that keeps notifications and logs each delivery into `events`
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: EventLog,
        pub sent: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        pub fn with_events(events: EventLog) -> Self {
            Self {
                events,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, notification: Notification) -> AccessResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("notify:{}", notification.recipient));
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::dispatcher::testing::{ScriptedTransport, lock_identifier};
    use crate::error::AccessError;
    use crate::models::Owner;
    use crate::models::notification::TEMPERATURE_ANOMALY_SUBJECT;
    use crate::repositories::MockPropertyRepository;
    use crate::session::testing::FakeFactory;
    use serde_json::json;

    fn property(name: &str, email: &str, lock_id: Option<String>) -> Property {
        Property {
            id: Uuid::new_v4(),
            name: name.to_string(),
            lock_id,
            owner: Owner {
                id: Uuid::new_v4(),
                email: email.to_string(),
            },
        }
    }

    fn listing(properties: Vec<Property>) -> Arc<MockPropertyRepository> {
        let mut repository = MockPropertyRepository::new();
        repository
            .expect_list_with_lock()
            .times(1)
            .returning(move || Ok(properties.clone()));
        Arc::new(repository)
    }

    #[test]
    fn test_format_anomalies_rounds_to_two_decimals() {
        assert_eq!(format_anomalies(&[21.456, 19.0]), vec!["21.46°C", "19.0°C"]);
        assert!(format_anomalies(&[]).is_empty());
    }

    #[test]
    fn test_format_anomalies_rounds_ties_to_even() {
        assert_eq!(
            format_anomalies(&[21.125, 0.125, 0.375, -1.625]),
            vec!["21.12°C", "0.12°C", "0.38°C", "-1.62°C"]
        );
    }

    #[tokio::test]
    async fn test_anomalies_notify_owner_after_commit() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .respond("lock-1", "get_temperature", 200, json!({"temperature": 24.5}))
                .respond("lock-1", "get_temperature_stats", 200, json!({"anomalies": [30.0]})),
        );
        let factory = Arc::new(FakeFactory::default());
        let sink = Arc::new(RecordingSink::with_events(Arc::clone(&factory.events)));
        let monitor = AnomalyMonitor::new(
            listing(vec![
                property("Lakeside Cabin", "p1@example.com", Some(lock_identifier("lock-1"))),
                property("City Loft", "p2@example.com", None),
            ]),
            LockCommandDispatcher::new(transport.clone()),
            sink.clone(),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;
        let report = *outcome.as_ref().unwrap();

        assert_eq!(transport.calls_to("lock-1"), 2);
        assert_eq!(transport.calls().len(), 2);
        assert!(sink.sent().is_empty());
        assert_eq!(session.pending_callbacks(), 1);

        session.on_completion(&outcome).await.unwrap();

        assert_eq!(
            report,
            ScanReport {
                scanned: 1,
                notified: 1,
                skipped: 0
            }
        );
        assert_eq!(
            factory.events(),
            vec!["acquire:1", "commit:1", "release:1", "notify:p1@example.com"]
        );
        assert_eq!(
            factory.committed_commands(),
            vec!["get_temperature", "get_temperature_stats"]
        );

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "p1@example.com");
        assert_eq!(sent[0].subject, TEMPERATURE_ANOMALY_SUBJECT);
        assert_eq!(
            sent[0].body,
            "Temperature anomalies detected for your property Lakeside Cabin: 30.0°C"
        );
    }

    #[tokio::test]
    async fn test_failing_property_does_not_abort_scan() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .fail("lock-1", "get_temperature")
                .respond("lock-2", "get_temperature", 200, json!({"temperature": 20.0}))
                .respond("lock-2", "get_temperature_stats", 200, json!({"anomalies": []})),
        );
        let factory = Arc::new(FakeFactory::default());
        let sink = Arc::new(RecordingSink::with_events(Arc::clone(&factory.events)));
        let monitor = AnomalyMonitor::new(
            listing(vec![
                property("Lakeside Cabin", "p1@example.com", Some(lock_identifier("lock-1"))),
                property("City Loft", "p2@example.com", Some(lock_identifier("lock-2"))),
            ]),
            LockCommandDispatcher::new(transport.clone()),
            sink.clone(),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(
            outcome.unwrap(),
            ScanReport {
                scanned: 2,
                notified: 0,
                skipped: 1
            }
        );
        assert_eq!(transport.calls_to("lock-1"), 1);
        assert_eq!(transport.calls_to("lock-2"), 2);
        assert!(sink.sent().is_empty());
        assert_eq!(
            factory.committed_commands(),
            vec!["get_temperature", "get_temperature_stats"]
        );
    }

    #[tokio::test]
    async fn test_malformed_lock_identifier_is_skipped() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .respond("lock-2", "get_temperature", 200, json!({"temperature": 20.0}))
                .respond("lock-2", "get_temperature_stats", 200, json!({"anomalies": [35.129]})),
        );
        let factory = Arc::new(FakeFactory::default());
        let sink = Arc::new(RecordingSink::with_events(Arc::clone(&factory.events)));
        let monitor = AnomalyMonitor::new(
            listing(vec![
                property("Broken", "p1@example.com", Some("no-separator".to_string())),
                property("City Loft", "p2@example.com", Some(lock_identifier("lock-2"))),
            ]),
            LockCommandDispatcher::new(transport.clone()),
            sink.clone(),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(outcome.unwrap().skipped, 1);
        assert_eq!(transport.calls().len(), 2);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "p2@example.com");
        assert!(sent[0].body.ends_with(": 35.13°C"));
    }

    #[tokio::test]
    async fn test_rejected_audit_write_skips_only_that_property() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .respond(
                    "lock-1",
                    "get_temperature",
                    200,
                    json!({"temperature": 22.0, "note": "reject-me"}),
                )
                .respond("lock-1", "get_temperature_stats", 200, json!({"anomalies": [31.0]}))
                .respond("lock-2", "get_temperature", 200, json!({"temperature": 24.5}))
                .respond("lock-2", "get_temperature_stats", 200, json!({"anomalies": [30.0]})),
        );
        let factory = Arc::new(FakeFactory::default());
        *factory.reject_marker.lock().unwrap() = Some("reject-me".to_string());
        let sink = Arc::new(RecordingSink::with_events(Arc::clone(&factory.events)));
        let monitor = AnomalyMonitor::new(
            listing(vec![
                property("Lakeside Cabin", "p1@example.com", Some(lock_identifier("lock-1"))),
                property("City Loft", "p2@example.com", Some(lock_identifier("lock-2"))),
            ]),
            LockCommandDispatcher::new(transport.clone()),
            sink.clone(),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(
            outcome.unwrap(),
            ScanReport {
                scanned: 2,
                notified: 1,
                skipped: 1
            }
        );
        assert_eq!(transport.calls_to("lock-1"), 2);
        assert_eq!(transport.calls_to("lock-2"), 2);
        assert_eq!(
            factory.events(),
            vec!["acquire:1", "commit:1", "release:1", "notify:p2@example.com"]
        );
        assert_eq!(
            factory.committed_commands(),
            vec!["get_temperature", "get_temperature_stats"]
        );
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.ends_with(": 30.0°C"));
    }

    #[tokio::test]
    async fn test_devices_are_polled_before_resource_is_acquired() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .fail("lock-1", "get_temperature")
                .respond("lock-2", "get_temperature", 200, json!({"temperature": 20.0}))
                .fail("lock-2", "get_temperature_stats"),
        );
        let factory = Arc::new(FakeFactory::default());
        let monitor = AnomalyMonitor::new(
            listing(vec![
                property("Lakeside Cabin", "p1@example.com", Some(lock_identifier("lock-1"))),
                property("City Loft", "p2@example.com", Some(lock_identifier("lock-2"))),
            ]),
            LockCommandDispatcher::new(transport.clone()),
            Arc::new(RecordingSink::default()),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;

        assert!(!session.has_resource());
        session.on_completion(&outcome).await.unwrap();
        assert_eq!(outcome.unwrap().skipped, 2);
        assert_eq!(transport.calls().len(), 3);
        assert!(factory.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_scan_acquires_nothing() {
        let factory = Arc::new(FakeFactory::default());
        let monitor = AnomalyMonitor::new(
            listing(vec![]),
            LockCommandDispatcher::new(Arc::new(ScriptedTransport::default())),
            Arc::new(RecordingSink::default()),
        );
        let mut session = JobSession::new(Arc::clone(&factory));

        let outcome = monitor.run(&mut session).await;
        session.on_completion(&outcome).await.unwrap();

        assert_eq!(outcome.unwrap(), ScanReport::default());
        assert!(factory.events().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_fails_the_run() {
        let mut repository = MockPropertyRepository::new();
        repository
            .expect_list_with_lock()
            .returning(|| Err(AccessError::NotFound("properties".into())));
        let monitor = AnomalyMonitor::new(
            Arc::new(repository),
            LockCommandDispatcher::new(Arc::new(ScriptedTransport::default())),
            Arc::new(RecordingSink::default()),
        );
        let mut session = JobSession::new(Arc::new(FakeFactory::default()));

        assert!(monitor.run(&mut session).await.is_err());
    }
}
