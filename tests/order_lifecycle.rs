//! End-to-end tests: order documents on disk, the index, and jobs carrying
//! an order through its lifecycle.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use workorder::error::{ActionError, Error, JobError, OrderError};
use workorder::order::{OrderDocument, OrderStatus};
use workorder::spool::Spool;
use workorder::store::{LibSqlBackend, OrderIndex};
use workorder::worker::JobHandle;

/// Maximum time any async step is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn spool_in(dir: &TempDir) -> Spool {
    spool_with_index(dir, "index.db").await
}

async fn spool_with_index(dir: &TempDir, db_name: &str) -> Spool {
    let index: Arc<dyn OrderIndex> = Arc::new(
        LibSqlBackend::new_local(&dir.path().join(db_name))
            .await
            .unwrap(),
    );
    let spool = Spool::new(dir.path().join("spool"), index);
    spool.ensure_dirs().await.unwrap();
    spool
}

#[test]
fn dns_update_scenario() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.xml");

    let mut doc = OrderDocument::new("dns-update");
    assert_eq!(doc.status(), OrderStatus::New);
    doc.add_host("10.0.0.1");
    doc.set_status_str("queued").unwrap();
    doc.persist(&path).unwrap();

    let reloaded = OrderDocument::load(&path).unwrap();
    assert_eq!(reloaded.status(), OrderStatus::Queued);
    assert_eq!(reloaded.hosts(), vec!["10.0.0.1"]);
}

#[test]
fn completed_order_may_return_to_new() {
    let mut doc = OrderDocument::new("svc");
    doc.set_status(OrderStatus::Completed);
    doc.set_status_str("new").unwrap();
    assert_eq!(doc.status(), OrderStatus::New);
}

#[tokio::test]
async fn job_drives_order_to_completed() {
    let dir = TempDir::new().unwrap();
    let spool = spool_in(&dir).await;

    let mut doc = OrderDocument::new("dns-update");
    doc.add_host("10.0.0.1");
    doc.add_host("10.0.0.2");
    doc.set_status(OrderStatus::Queued);
    spool.save(&doc).await.unwrap();

    let hosts: Vec<String> = doc.hosts().into_iter().map(str::to_string).collect();
    let job = JobHandle::new(doc.id(), move || -> Result<(), ActionError> {
        if hosts.is_empty() {
            return Err("no hosts".into());
        }
        Ok(())
    });
    doc.set_status(OrderStatus::InProgress);
    spool.save(&doc).await.unwrap();
    job.start().unwrap();

    let outcome = timeout(
        TEST_TIMEOUT,
        tokio::task::spawn_blocking(move || job.join()),
    )
    .await
    .expect("job hung")
    .unwrap();
    assert!(outcome.is_ok());

    doc.set_status(OrderStatus::Completed);
    spool.save(&doc).await.unwrap();

    let completed = spool
        .index()
        .orders_by_status(OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, doc.id());
    assert!(
        spool
            .index()
            .orders_by_status(OrderStatus::InProgress)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(spool.load(doc.id()).await.unwrap(), doc);
}

#[tokio::test]
async fn failing_job_marks_order_error() {
    let dir = TempDir::new().unwrap();
    let spool = spool_in(&dir).await;

    let mut doc = OrderDocument::new("backup");
    spool.save(&doc).await.unwrap();

    let job = JobHandle::new("backup-job", || -> Result<(), ActionError> {
        Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "telnet timed out").into())
    });
    job.start().unwrap();
    let outcome = tokio::task::spawn_blocking(move || job.join())
        .await
        .unwrap();

    let err = outcome.unwrap_err();
    let io = err
        .action_error()
        .and_then(|e| e.downcast_ref::<std::io::Error>())
        .expect("original io error");
    assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);

    doc.set_status(OrderStatus::Error);
    spool.save(&doc).await.unwrap();
    let record = spool.index().get_order(doc.id()).await.unwrap().unwrap();
    assert_eq!(record.status, OrderStatus::Error);
}

#[test]
fn many_waiters_released_together() {
    let gate = Arc::new(Barrier::new(2));
    let job = {
        let gate = Arc::clone(&gate);
        Arc::new(JobHandle::new("gated", move || -> Result<(), ActionError> {
            gate.wait();
            Err("host unreachable".into())
        }))
    };
    job.start().unwrap();

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let job = Arc::clone(&job);
            thread::spawn(move || job.wait())
        })
        .collect();
    assert!(job.is_alive());
    gate.wait();

    for waiter in waiters {
        let err = waiter.join().unwrap().unwrap_err();
        assert_eq!(err.action_error().unwrap().to_string(), "host unreachable");
    }
    assert!(!job.is_alive());
    assert!(matches!(job.start(), Err(JobError::AlreadyStarted { .. })));
}

#[tokio::test]
async fn reindex_rebuilds_fresh_index() {
    let dir = TempDir::new().unwrap();
    let doc = {
        let spool = spool_in(&dir).await;
        let mut doc = OrderDocument::new("dns-update");
        doc.add_host("10.0.0.9");
        spool.save(&doc).await.unwrap();
        doc
    };

    // Start over with an empty index; the spool still has the document.
    let spool = spool_with_index(&dir, "rebuilt.db").await;
    assert!(spool.index().get_order(doc.id()).await.unwrap().is_none());

    assert_eq!(spool.reindex().await.unwrap(), 1);
    let by_service = spool.index().orders_by_service("dns-update").await.unwrap();
    assert_eq!(by_service.len(), 1);
    assert_eq!(by_service[0].hosts[0].address, "10.0.0.9");
}

#[tokio::test]
async fn malformed_spool_document_surfaces() {
    let dir = TempDir::new().unwrap();
    let spool = spool_in(&dir).await;
    std::fs::write(
        spool.path_for("bad"),
        r#"<xml><order status="queued"/></xml>"#,
    )
    .unwrap();

    let err = spool.load("bad").await.unwrap_err();
    assert!(matches!(err, OrderError::Malformed(_)));
    let top: Error = err.into();
    assert!(top.to_string().starts_with("Order error: Malformed order document"));
}
