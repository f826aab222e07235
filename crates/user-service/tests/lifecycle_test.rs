mod common;

use common::{FakeHandle, FakeHandleBehavior};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use user_service::lifecycle::{LifecycleError, LifecycleManager};
use user_service::resources::producer::{EmbeddedEventStream, EventProducer, EventStreamSettings, ProducerError};
use user_service::resources::store::{DocumentStore, EmbeddedDocumentStore, StoreError, StoreSettings};
use user_service::resources::ResourceKind;
use user_service::CorrelationContext;

fn soon() -> Instant {
    Instant::now() + Duration::from_secs(1)
}

#[tokio::test]
async fn test_start_and_stop_all() {
    let store = FakeHandle::healthy(ResourceKind::Store);
    let producer = FakeHandle::healthy(ResourceKind::Producer);
    let manager = LifecycleManager::new(Duration::from_secs(1))
        .with_resource(store.clone())
        .with_resource(producer.clone());

    manager.start_all().await.unwrap();
    assert!(manager.is_healthy());
    assert!(store.is_open() && producer.is_open());

    let report = manager.stop_all(soon()).await;
    assert!(report.is_clean());
    assert_eq!(report.closed, vec![ResourceKind::Store, ResourceKind::Producer]);
    assert!(!store.is_open() && !producer.is_open());
    assert!(!manager.is_healthy());
}

#[tokio::test]
async fn test_probe_failure_aborts_startup_and_closes_everything() {
    let store = FakeHandle::healthy(ResourceKind::Store);
    let producer = FakeHandle::new(
        ResourceKind::Producer,
        FakeHandleBehavior {
            fail_probe: true,
            ..Default::default()
        },
    );
    let manager = LifecycleManager::new(Duration::from_secs(1))
        .with_resource(store.clone())
        .with_resource(producer.clone());

    let err = manager.start_all().await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Probe {
            kind: ResourceKind::Producer,
            ..
        }
    ));
    assert!(!store.is_open());
    assert!(!producer.is_open());
    assert_eq!(store.closes(), 1);
    assert!(manager.gate().is_closed());

    // Nothing to do on a later shutdown, nothing gets reopened.
    assert!(manager.stop_all(soon()).await.closed.is_empty());
    assert!(matches!(manager.start_all().await, Err(LifecycleError::AlreadyStarted)));
    assert_eq!(store.connects(), 1);
}

#[tokio::test]
async fn test_connect_failure_aborts_startup() {
    let store = FakeHandle::new(
        ResourceKind::Store,
        FakeHandleBehavior {
            fail_connect: true,
            ..Default::default()
        },
    );
    let exporter = FakeHandle::healthy(ResourceKind::TraceExporter);
    let manager = LifecycleManager::new(Duration::from_secs(1))
        .with_resource(store.clone())
        .with_resource(exporter.clone());

    let err = manager.start_all().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Connect { kind: ResourceKind::Store, .. }));
    assert!(!exporter.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_startup_timeout_closes_everything() {
    let slow = FakeHandle::new(
        ResourceKind::Producer,
        FakeHandleBehavior {
            slow_probe: Some(Duration::from_secs(60)),
            ..Default::default()
        },
    );
    let manager = LifecycleManager::new(Duration::from_secs(5)).with_resource(slow.clone());

    let err = manager.start_all().await.unwrap_err();
    assert!(matches!(err, LifecycleError::StartupTimeout(_)));
    assert!(!slow.is_open());
}

#[tokio::test]
async fn test_second_shutdown_is_a_no_op() {
    let store = FakeHandle::healthy(ResourceKind::Store);
    let manager = LifecycleManager::new(Duration::from_secs(1)).with_resource(store.clone());
    manager.start_all().await.unwrap();

    assert!(manager.stop_all(soon()).await.is_clean());
    let second = manager.stop_all(soon()).await;
    assert!(second.is_clean());
    assert!(second.closed.is_empty());
    assert_eq!(store.closes(), 1);
    assert_eq!(store.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_bounded_by_deadline() {
    let stuck = FakeHandle::new(
        ResourceKind::TraceExporter,
        FakeHandleBehavior {
            hang_close: true,
            ..Default::default()
        },
    );
    let failing = FakeHandle::new(
        ResourceKind::Producer,
        FakeHandleBehavior {
            fail_close: true,
            ..Default::default()
        },
    );
    let store = FakeHandle::healthy(ResourceKind::Store);
    let manager = LifecycleManager::new(Duration::from_secs(1))
        .with_resource(stuck.clone())
        .with_resource(failing.clone())
        .with_resource(store.clone());
    manager.start_all().await.unwrap();

    let started = Instant::now();
    let report = manager.stop_all(started + Duration::from_secs(2)).await;

    assert!(started.elapsed() <= Duration::from_secs(2));
    assert_eq!(report.closed, vec![ResourceKind::Store]);
    let failed: Vec<ResourceKind> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(failed, vec![ResourceKind::TraceExporter, ResourceKind::Producer]);
    assert!(report.failures[0].reason.contains("deadline"));
}

#[tokio::test]
async fn test_embedded_resources_start_as_a_unit() {
    let store = Arc::new(EmbeddedDocumentStore::new(StoreSettings::embedded()));
    let events = Arc::new(EmbeddedEventStream::new(EventStreamSettings {
        warmup: common::fast_retry(),
        ..EventStreamSettings::embedded()
    }));
    let manager = LifecycleManager::new(Duration::from_secs(5))
        .with_resource(store.clone())
        .with_resource(events.clone());

    manager.start_all().await.unwrap();
    assert_eq!(events.messages().await.unwrap().len(), 3);

    let ctx = CorrelationContext::new_root();
    events.write_message(&ctx, "1", "created user Doe with id 1").await.unwrap();

    assert!(manager.stop_all(soon()).await.is_clean());
    assert_eq!(store.find_all(&ctx).await.unwrap_err(), StoreError::Closed);
    assert_eq!(
        events.write_message(&ctx, "1", "late").await.unwrap_err(),
        ProducerError::Closed
    );
}

#[tokio::test]
async fn test_secured_mode_without_certificates_leaves_nothing_open() {
    let store = Arc::new(EmbeddedDocumentStore::new(StoreSettings::embedded()));
    let events = Arc::new(EmbeddedEventStream::new(EventStreamSettings {
        secured: true,
        client_cert: Some(PathBuf::from("/missing/client.crt")),
        client_key: Some(PathBuf::from("/missing/client.key")),
        ..EventStreamSettings::embedded()
    }));
    let manager = LifecycleManager::new(Duration::from_secs(5))
        .with_resource(store.clone())
        .with_resource(events.clone());

    let err = manager.start_all().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Connect { kind: ResourceKind::Producer, .. }));

    // The store connected fine but must not stay reachable.
    let ctx = CorrelationContext::new_root();
    assert_eq!(store.find_all(&ctx).await.unwrap_err(), StoreError::Closed);
}
