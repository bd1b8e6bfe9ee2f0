use std::time::Duration;

use sql_offload::prelude::*;
use sql_offload::test_utils::{Response, Script, ScriptedDriver};

fn scripted_service(script: &Script) -> Result<Service<ScriptedDriver>, SqlOffloadError> {
    Service::with_context(ServiceOptions::default(), script.clone())
}

async fn connected(
    service: &Service<ScriptedDriver>,
) -> Result<Connection<ScriptedDriver>, SqlOffloadError> {
    let conn = service.connection();
    conn.open()?;
    conn.connect_async(&MemoryEndpoint, &AuthInfo::new("app", "pw"), "app", ClientFlags::empty())
        .await?;
    Ok(conn)
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_turns_a_completed_call_into_cancellation() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.on("SELECT slow", Response::table(&["v"], &[&[Some("1")]]));
    script.set_delay(Duration::from_millis(20));
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;

    let pending = conn.query_result_async("SELECT slow");
    conn.cancel();
    let err = pending.await.unwrap_err();
    assert!(err.is_cancelled());
    // The driver call itself still ran.
    assert!(script.statements().contains(&"SELECT slow".to_string()));
    assert!(!conn.is_busy());

    // Operations submitted after the cancel are unaffected.
    let rows = conn.query_result_async("SELECT slow").await?;
    assert_eq!(rows.size(), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_reaches_callback_handlers_too() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.set_delay(Duration::from_millis(10));
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    conn.async_query("UPDATE t SET v = 1", move |outcome: Result<(), SqlOffloadError>| {
        let _ = tx.send(outcome);
    });
    conn.cancel();
    let outcome = rx.await.expect("handler must be invoked exactly once");
    assert!(matches!(outcome, Err(SqlOffloadError::CancellationError)));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn one_async_operation_at_a_time() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.set_delay(Duration::from_millis(30));
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;

    let first = conn.query_async("UPDATE a SET v = 1");
    assert!(conn.is_busy());

    let second = conn.query_async("UPDATE b SET v = 1");
    assert!(matches!(second.await, Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(conn.query("UPDATE c SET v = 1"), Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(conn.commit(), Err(SqlOffloadError::UsageError(_))));
    assert!(!conn.has_more_results());

    first.await?;
    assert!(!conn.is_busy());
    conn.query("UPDATE c SET v = 1")?;

    let statements = script.statements();
    assert!(statements.contains(&"UPDATE a SET v = 1".to_string()));
    assert!(!statements.contains(&"UPDATE b SET v = 1".to_string()));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_a_pending_operation_frees_the_connection() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;

    drop(conn.query_async("UPDATE a SET v = 1"));
    assert!(!conn.is_busy());
    conn.query_async("UPDATE b SET v = 2").await?;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn close_does_not_wait_for_the_worker() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.on("SELECT 1", Response::table(&["one"], &[&[Some("1")]]));
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;
    let earlier = conn.query_result_async("SELECT 1").await?;

    script.set_delay(Duration::from_millis(200));
    let pending = conn.query_async("SELECT 1");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    conn.close();
    assert!(started.elapsed() < Duration::from_millis(150));
    assert!(!conn.is_open());
    assert!(earlier.expired());

    assert!(matches!(pending.await, Err(SqlOffloadError::CancellationError)));

    // Draining the worker lets the deferred release run.
    service.shutdown().await;
    assert_eq!(script.closed_handles(), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_a_connection_closes_it() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = scripted_service(&script)?;
    {
        let _conn = connected(&service).await?;
    }
    service.shutdown().await;
    assert_eq!(script.closed_handles(), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn submissions_after_shutdown_fail_with_worker_error() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = scripted_service(&script)?;
    let conn = connected(&service).await?;

    service.shutdown().await;
    let err = conn.query_async("SELECT 1").await.unwrap_err();
    assert!(matches!(err, SqlOffloadError::WorkerError(_)));
    assert!(!conn.is_busy());
    // The synchronous path does not need the worker.
    conn.query("SELECT 1")?;
    Ok(())
}
