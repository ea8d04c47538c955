use std::sync::atomic::{AtomicU32, Ordering};

use cclgroup::{CclConfig, ErrorKind};

use super::helpers::{ScriptedEngine, run_group, scripted_group};

#[test]
fn test_barrier_handle_is_complete() {
    let (engine, calls) = ScriptedEngine::new(0, 1);
    let pg = scripted_group(engine);
    let mut work = pg.barrier().unwrap();
    assert!(work.is_completed());
    assert!(work.poll().unwrap());
    assert!(work.is_success().unwrap());
    assert_eq!(calls.issued(), 1);
    assert_eq!(calls.tests(), 0);
}

#[test]
fn test_barrier_synchronizes_ranks() {
    let arrived = AtomicU32::new(0);
    let seen = run_group(4, CclConfig::default(), |pg| {
        arrived.fetch_add(1, Ordering::SeqCst);
        pg.barrier().unwrap();
        arrived.load(Ordering::SeqCst)
    });
    assert_eq!(seen, vec![4; 4]);
}

#[test]
fn test_barrier_engine_fault() {
    let (engine, _calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.rejecting("peer lost"));
    let err = pg.barrier().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.to_string().contains("peer lost"));
}
