use cclgroup::{Buffer, CclConfig, CclError, DataType, ErrorKind};

use super::helpers::{ScriptedEngine, ramp, run_group, scripted_group};

#[test]
fn test_broadcast_from_each_root() {
    for root in 0..4u32 {
        let results = run_group(4, CclConfig::default(), move |pg| {
            let data = if pg.rank() == root {
                ramp(100.0 * root as f32, 16)
            } else {
                vec![0.0; 16]
            };
            let buf = Buffer::from_vec(data);
            let mut work = pg.broadcast(&buf, root).unwrap();
            work.wait().unwrap();
            assert!(work.is_success().unwrap());
            buf.to_vec::<f32>().unwrap()
        });
        for (rank, got) in results.iter().enumerate() {
            assert_eq!(got, &ramp(100.0 * root as f32, 16), "rank {rank} root {root}");
        }
    }
}

#[test]
fn test_broadcast_shaped_i64() {
    let results = run_group(3, CclConfig::default(), |pg| {
        let buf = if pg.rank() == 1 {
            Buffer::from_vec_shaped((0..6i64).collect(), &[2, 3]).unwrap()
        } else {
            Buffer::zeros(DataType::I64, &[2, 3])
        };
        pg.broadcast(&buf, 1).unwrap().wait().unwrap();
        buf.to_vec::<i64>().unwrap()
    });
    for got in results {
        assert_eq!(got, vec![0, 1, 2, 3, 4, 5]);
    }
}

#[test]
fn test_broadcast_rejects_before_engine() {
    let (engine, calls) = ScriptedEngine::new(0, 4);
    let pg = scripted_group(engine);

    let err = pg.broadcast(&Buffer::zeros(DataType::F32, &[4]), 4).unwrap_err();
    assert!(matches!(err, CclError::InvalidRank { rank: 4, size: 4 }));

    let strided = Buffer::zeros(DataType::F32, &[2, 3]).transpose().unwrap();
    let err = pg.broadcast(&strided, 0).unwrap_err();
    assert!(matches!(err, CclError::NonContiguous { .. }));

    let sparse = Buffer::zeros(DataType::F32, &[4]).to_sparse();
    assert_eq!(pg.broadcast(&sparse, 0).unwrap_err().kind(), ErrorKind::Validation);

    let device = Buffer::zeros(DataType::F32, &[4]).to_device().unwrap();
    assert_eq!(pg.broadcast(&device, 0).unwrap_err().kind(), ErrorKind::Validation);

    assert_eq!(calls.total(), 0);
}

#[test]
fn test_engine_rejection_reports_dispatch_site() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine.rejecting("communicator revoked"));
    let err = pg.broadcast(&Buffer::zeros(DataType::I32, &[2]), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    let msg = err.to_string();
    assert!(msg.contains("broadcast.rs"), "{msg}");
    assert!(msg.contains("communicator revoked"), "{msg}");
    assert_eq!(calls.issued(), 1);
}
