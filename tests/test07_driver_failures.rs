use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use sql_offload::prelude::*;
use sql_offload::test_utils::scripted::LOST_DURING_FETCH;
use sql_offload::test_utils::{Response, Script, ScriptedDriver};

fn service_for(script: &Script) -> Result<Service<ScriptedDriver>, SqlOffloadError> {
    Service::with_context(ServiceOptions::default(), script.clone())
}

#[test]
fn closed_connection_never_reaches_the_driver() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection();

    assert!(matches!(conn.query("SELECT 1"), Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(conn.store_result(), Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(conn.autocommit(false), Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(
        conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty()),
        Err(SqlOffloadError::UsageError(_))
    ));
    assert!(script.statements().is_empty());

    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;
    conn.close();
    assert!(matches!(conn.query("SELECT 1"), Err(SqlOffloadError::UsageError(_))));
    assert!(matches!(conn.commit(), Err(SqlOffloadError::UsageError(_))));
    assert_eq!(script.statements(), vec!["CONNECT app"]);
    Ok(())
}

#[test]
fn close_during_a_sync_call_releases_without_starting_the_worker() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;

    let (locked_tx, locked_rx) = mpsc::channel();
    let shared = &conn;
    thread::scope(|scope| {
        let holder = scope.spawn(move || {
            shared.with_native(move |_| {
                let _ = locked_tx.send(());
                thread::sleep(Duration::from_millis(50));
            })
        });
        locked_rx.recv().expect("holder never took the lock");
        conn.close();
        // Released before close returned, not queued for a worker.
        assert_eq!(script.closed_handles(), 1);
        holder.join().expect("holder panicked")
    })?;

    assert!(!service.is_worker_started());
    assert_eq!(conn.state(), ConnectionPhase::Closed);
    Ok(())
}

#[test]
fn open_failure_leaves_the_connection_closed() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.fail_init(2001, "Can't create handle");
    let service = service_for(&script)?;
    let conn = service.connection();

    let err = conn.open().unwrap_err();
    assert!(matches!(err, SqlOffloadError::ConnectionError(_)));
    assert_eq!(err.code(), Some(2001));
    assert!(!conn.is_open());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn connect_failure_carries_the_driver_code() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.fail_connect(1045, "Access denied for user 'app'");
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;

    let err = conn
        .connect_async(&MemoryEndpoint, &AuthInfo::new("app", "wrong"), "app", ClientFlags::empty())
        .await
        .unwrap_err();
    match &err {
        SqlOffloadError::ConnectionError(native) => {
            assert_eq!(native.code, 1045);
            assert!(native.message.contains("Access denied"));
        }
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert!(conn.is_open());
    assert_eq!(conn.state(), ConnectionPhase::Open);
    assert!(conn.error_message().contains("Access denied"));
    Ok(())
}

#[test]
fn unresolvable_endpoint_is_a_connection_error() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;
    let err = conn
        .connect(
            &TcpEndpoint::new("host.invalid", 3306),
            &AuthInfo::anonymous(),
            "app",
            ClientFlags::empty(),
        )
        .unwrap_err();
    assert!(matches!(err, SqlOffloadError::ConnectionError(_)));
    assert_eq!(err.code(), Some(sql_offload::endpoint::RESOLVE_ERROR));
    // The driver was never asked to connect.
    assert!(script.statements().is_empty());
    Ok(())
}

#[test]
fn failed_fetch_is_a_protocol_error() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.on(
        "SELECT v FROM big",
        Response::table(&["v"], &[&[Some("1")], &[Some("2")], &[Some("3")]]).failing_at(2),
    );
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;

    conn.query("SELECT v FROM big")?;
    let err = conn.store_result().unwrap_err();
    assert!(matches!(err, SqlOffloadError::ProtocolError(_)));
    assert_eq!(err.code(), Some(LOST_DURING_FETCH));
    assert_eq!(conn.state(), ConnectionPhase::Connected);
    assert!(conn.with_native_result(|native| native.is_none())?);
    Ok(())
}

#[test]
fn stored_native_result_stays_reachable_until_the_next_store() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    script.on("SELECT v FROM t", Response::table(&["v"], &[&[Some("1")]]));
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;

    conn.query("SELECT v FROM t")?;
    let rows = conn.store_result()?;
    assert_eq!(rows.size(), 1);
    assert!(conn.with_native_result(|native| native.is_some())?);
    Ok(())
}

#[test]
fn set_option_failures_are_config_errors() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;

    conn.set_option(&ConnectOption::InitCommand("SET NAMES utf8mb4".into()))?;
    assert!(matches!(
        conn.set_option(&ConnectOption::Nonblock(true)),
        Err(SqlOffloadError::ConfigError(_))
    ));
    assert!(matches!(
        conn.set_option(&ConnectOption::InitCommand("  ".into())),
        Err(SqlOffloadError::ConfigError(_))
    ));
    let accepted = conn.with_native(|driver| driver.options().len())?;
    assert_eq!(accepted, 1);
    Ok(())
}

#[test]
fn construction_and_connect_flags_combine() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection_with_flags(ClientFlags::FOUND_ROWS);
    assert_eq!(conn.flags(), ClientFlags::FOUND_ROWS);
    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::COMPRESS)?;
    let effective = conn.with_native(|driver| driver.last_flags())?;
    assert!(effective.contains(ClientFlags::FOUND_ROWS));
    assert!(effective.contains(ClientFlags::COMPRESS));
    Ok(())
}

#[test]
fn transaction_control_reaches_the_driver() -> Result<(), SqlOffloadError> {
    let script = Script::new();
    let service = service_for(&script)?;
    let conn = service.connection();
    conn.open()?;
    conn.connect(&MemoryEndpoint, &AuthInfo::anonymous(), "app", ClientFlags::empty())?;

    conn.autocommit(false)?;
    conn.commit()?;
    conn.rollback()?;
    assert_eq!(
        script.statements(),
        vec!["CONNECT app", "AUTOCOMMIT=0", "COMMIT", "ROLLBACK"]
    );
    Ok(())
}
