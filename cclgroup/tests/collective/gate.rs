use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cclgroup::gate::global;
use cclgroup::{
    Buffer, CclConfig, CclError, DataType, EngineGate, ErrorKind, HashStore, LocalFabric,
    ProcessGroup,
};

use super::helpers::{ScriptedEngine, scripted_group};

fn local_gate() -> cclgroup::Result<EngineGate> {
    let engine = LocalFabric::connect(1)
        .map_err(|f| CclError::engine(f.to_string()))?
        .remove(0);
    Ok(EngineGate::new(Box::new(engine), CclConfig::default()))
}

// The only test in this binary that touches the process-wide slot.
#[test]
fn test_global_gate_lifecycle() {
    let failed = global::ensure_initialized(|| Err(CclError::engine("no devices")));
    assert_eq!(failed.unwrap_err().kind(), ErrorKind::Engine);
    assert!(global::get().is_none());

    let built = AtomicUsize::new(0);
    let gates: Vec<Arc<EngineGate>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    global::ensure_initialized(|| {
                        built.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        local_gate()
                    })
                    .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(gates.iter().all(|g| Arc::ptr_eq(g, &gates[0])));

    let pg = ProcessGroup::create(
        Arc::clone(&gates[0]),
        Arc::new(HashStore::default()),
        Some(0),
        Some(1),
        Duration::ZERO,
    )
    .unwrap();
    let buf = Buffer::from_vec(vec![1.0f32, 2.0]);
    pg.broadcast(&buf, 0).unwrap().wait().unwrap();

    global::shutdown().unwrap();
    global::shutdown().unwrap();
    assert!(matches!(pg.broadcast(&buf, 0), Err(CclError::ShutDown)));
    assert!(matches!(pg.barrier(), Err(CclError::ShutDown)));

    let again = global::ensure_initialized(|| panic!("factory must not run twice")).unwrap();
    assert!(Arc::ptr_eq(&again, &gates[0]));
}

#[test]
fn test_create_validates_against_engine_identity() {
    let mut engines = LocalFabric::connect(2).unwrap();
    let gate = Arc::new(EngineGate::new(
        Box::new(engines.remove(1)),
        CclConfig::default(),
    ));
    let store = Arc::new(HashStore::default());

    let err = ProcessGroup::create(Arc::clone(&gate), store.clone(), Some(0), Some(2), Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, CclError::RankMismatch { requested: 0, actual: 1 }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ProcessGroup::create(Arc::clone(&gate), store.clone(), Some(1), Some(3), Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, CclError::SizeMismatch { requested: 3, actual: 2 }));

    let pg = ProcessGroup::create(gate, store, None, Some(2), Duration::from_secs(60)).unwrap();
    assert_eq!(pg.rank(), 1);
    assert_eq!(pg.timeout(), Duration::from_secs(60));
}

#[test]
fn test_pending_work_survives_shutdown() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.completing_after(3));
    let buf = Buffer::zeros(DataType::I32, &[4]);
    let mut work = pg.broadcast(&buf, 0).unwrap();

    pg.gate().shutdown().unwrap();
    assert!(pg.gate().is_shut_down());
    assert_eq!(pg.allreduce(&buf, cclgroup::ReduceOp::Sum).unwrap_err().kind(), ErrorKind::Usage);

    work.wait().unwrap();
    assert!(work.is_success().unwrap());
    assert_eq!(calls.issued(), 1);
}
