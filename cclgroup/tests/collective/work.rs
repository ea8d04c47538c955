use cclgroup::{Buffer, CclError, DataType, ErrorKind, ReduceOp};

use super::helpers::{ScriptedEngine, scripted_group};

#[test]
fn test_poll_is_idempotent_after_completion() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.completing_after(2));
    let buf = Buffer::zeros(DataType::F32, &[4]);
    let mut work = pg.allreduce(&buf, ReduceOp::Sum).unwrap();

    assert!(!work.poll().unwrap());
    assert!(!work.poll().unwrap());
    assert!(work.poll().unwrap());
    assert_eq!(calls.tests(), 3);

    for _ in 0..5 {
        assert!(work.poll().unwrap());
    }
    assert_eq!(calls.tests(), 3);
    work.wait().unwrap();
    assert_eq!(calls.waits(), 0);
}

#[test]
fn test_is_success_requires_completion() {
    let (engine, _calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.completing_after(1));
    let buf = Buffer::zeros(DataType::I32, &[2]);
    let mut work = pg.broadcast(&buf, 1).unwrap();

    let err = work.is_success().unwrap_err();
    assert!(matches!(err, CclError::WorkPending("is_success")));
    assert_eq!(err.kind(), ErrorKind::Usage);

    work.wait().unwrap();
    assert!(work.is_success().unwrap());
}

#[test]
fn test_abort_is_unsupported() {
    let (engine, _calls) = ScriptedEngine::new(0, 1);
    let pg = scripted_group(engine.completing_after(1));
    let buf = Buffer::zeros(DataType::I64, &[1]);
    let mut work = pg.reduce(&buf, ReduceOp::Max, 0).unwrap();

    let err = work.abort().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(!work.is_completed());
    work.wait().unwrap();
    assert!(matches!(work.abort(), Err(CclError::AbortUnsupported)));
}

#[test]
fn test_fault_during_wait_is_an_engine_error() {
    let (engine, _calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.completing_after(5).failing("link reset"));
    let buf = Buffer::zeros(DataType::F64, &[3]);
    let mut work = pg.allreduce(&buf, ReduceOp::Sum).unwrap();

    let err = work.wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    let msg = err.to_string();
    assert!(msg.contains("work.rs"), "{msg}");
    assert!(msg.contains("link reset"), "{msg}");
    // The request is released; dropping the handle is safe.
    assert!(work.is_completed());
}

#[test]
fn test_fault_during_poll_releases_request() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.failing("checksum"));
    let buf = Buffer::zeros(DataType::U8, &[8]);
    let mut work = pg.broadcast(&buf, 0).unwrap();

    assert_eq!(work.poll().unwrap_err().kind(), ErrorKind::Engine);
    assert!(work.poll().unwrap());
    assert_eq!(calls.tests(), 1);
}

#[test]
fn test_staged_failure_surfaces_from_dispatch() {
    let (engine, _calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.failing("oom"));
    let input = Buffer::zeros(DataType::F32, &[2]);
    let outputs = vec![Buffer::zeros(DataType::F32, &[2]); 2];
    let err = pg.allgather(&input, &outputs).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.to_string().contains("allgather.rs"), "{err}");
}
