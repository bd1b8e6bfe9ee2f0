use std::time::Duration;

use sql_offload::prelude::*;
use sql_offload::test_utils::{Execution, Script, ScriptedDriver};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connections_sharing_a_service_never_overlap() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service: Service<ScriptedDriver> = ServiceOptionsBuilder::new()
        .worker_name("serial-worker")
        .build_with_context(script.clone())?;

    let first = service.connection();
    let second = service.connection();
    for conn in [&first, &second] {
        conn.open()?;
        conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;
    }
    script.set_delay(Duration::from_millis(15));

    for round in 0..3 {
        let (a, b) = tokio::join!(
            first.query_async(format!("UPDATE a SET round = {round}")).finish(),
            second.query_async(format!("UPDATE b SET round = {round}")).finish(),
        );
        a?;
        b?;
    }

    let worker = service.worker_thread_id().expect("worker started");
    let offloaded: Vec<Execution> = script
        .executions()
        .into_iter()
        .filter(|execution| execution.statement.starts_with("UPDATE"))
        .collect();
    assert_eq!(offloaded.len(), 6);
    assert!(offloaded.iter().all(|execution| execution.thread == worker));
    for (i, left) in offloaded.iter().enumerate() {
        for right in &offloaded[i + 1..] {
            assert!(
                !left.overlaps(right),
                "{} overlapped {}",
                left.statement,
                right.statement
            );
        }
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn jobs_run_in_submission_order() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = Service::<ScriptedDriver>::with_context(ServiceOptions::default(), script.clone())?;
    let conns: Vec<_> = (0..4).map(|_| service.connection()).collect();
    for conn in &conns {
        conn.open()?;
    }
    assert!(!service.is_worker_started());

    let pending: Vec<_> = conns
        .iter()
        .enumerate()
        .map(|(i, conn)| {
            conn.connect_async(&MemoryEndpoint, &AuthInfo::anonymous(), &format!("db{i}"), ClientFlags::empty())
        })
        .collect();
    for op in pending {
        op.await?;
    }
    assert_eq!(
        script.statements(),
        vec!["CONNECT db0", "CONNECT db1", "CONNECT db2", "CONNECT db3"]
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn separate_services_get_separate_workers() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let left = Service::<ScriptedDriver>::with_context(ServiceOptions::default(), script.clone())?;
    let right = Service::<ScriptedDriver>::with_context(
        ServiceOptions::new().with_worker_name("right-worker"),
        script.clone(),
    )?;
    for service in [&left, &right] {
        let conn = service.connection();
        conn.open()?;
        conn.connect_async(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())
            .await?;
    }
    assert!(left.worker_thread_id().is_some());
    assert_ne!(left.worker_thread_id(), right.worker_thread_id());
    Ok(())
}

#[test]
fn blank_worker_name_is_a_config_error() {
    let err = Service::<ScriptedDriver>::with_options(ServiceOptions::new().with_worker_name(""))
        .unwrap_err();
    assert!(matches!(err, SqlOffloadError::ConfigError(_)));
}
