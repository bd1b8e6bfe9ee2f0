use sql_offload::library::LibraryGuard;
use sql_offload::prelude::*;
use sql_offload::test_utils::ScriptedDriver;

/// Library setup runs once for the first live service and teardown once the
/// last one is gone. Kept as the only test in this binary so the process-wide
/// counters are not shared with other tests.
#[test]
fn library_init_and_end_follow_live_services() -> Result<(), SqlOffloadError> {
    assert_eq!(LibraryGuard::<ScriptedDriver>::ref_count(), 0);
    assert_eq!(ScriptedDriver::library_inits(), 0);

    let first = Service::<ScriptedDriver>::new()?;
    let second = Service::<ScriptedDriver>::new()?;
    let cloned = first.clone();
    assert_eq!(ScriptedDriver::library_inits(), 1);
    assert_eq!(LibraryGuard::<ScriptedDriver>::ref_count(), 2);

    drop(first);
    drop(second);
    assert_eq!(ScriptedDriver::library_ends(), 0);

    // A connection keeps its service, and therefore the library, alive.
    let conn = cloned.connection();
    drop(cloned);
    assert_eq!(ScriptedDriver::library_ends(), 0);
    conn.open()?;
    drop(conn);
    assert_eq!(ScriptedDriver::library_ends(), 1);
    assert_eq!(LibraryGuard::<ScriptedDriver>::ref_count(), 0);

    let _again = Service::<ScriptedDriver>::new()?;
    assert_eq!(ScriptedDriver::library_inits(), 2);
    Ok(())
}
