use cclgroup::{Buffer, CclError, DataType, ErrorKind, ProcessGroup, ReduceOp, Result, Work};

use super::helpers::{ScriptedEngine, scripted_group};

fn check(operation: &str, result: Result<Work>) {
    match result {
        Err(CclError::Unsupported { operation: got }) => assert_eq!(got, operation),
        Err(other) => panic!("{operation}: expected unsupported, got {other}"),
        Ok(_) => panic!("{operation}: expected unsupported, got a handle"),
    }
}

fn all_unsupported(pg: &ProcessGroup, bufs: &[Buffer], one: &Buffer) {
    check("allreduce_coalesced", pg.allreduce_coalesced(bufs, ReduceOp::Sum));
    check("allgather_base", pg.allgather_base(one, one));
    check("allgather_coalesced", pg.allgather_coalesced(&[bufs.to_vec()], bufs));
    check("reduce_scatter", pg.reduce_scatter(one, bufs, ReduceOp::Prod));
    check("send", pg.send(bufs, 1, 0));
    check("recv", pg.recv(bufs, 1, 0));
    check("recv_anysource", pg.recv_anysource(bufs, 0));
}

#[test]
fn test_unsupported_operations_never_reach_engine() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine);

    let good = vec![Buffer::zeros(DataType::F32, &[4]); 2];
    all_unsupported(&pg, &good, &good[0]);

    // Malformed arguments change nothing.
    let strided = Buffer::zeros(DataType::F32, &[2, 3]).transpose().unwrap();
    let bad = vec![strided.clone(), Buffer::zeros(DataType::I8, &[0]).to_sparse()];
    all_unsupported(&pg, &bad, &strided);
    all_unsupported(&pg, &[], &strided);

    assert_eq!(calls.total(), 0);
}

#[test]
fn test_unsupported_kind() {
    let (engine, _calls) = ScriptedEngine::new(0, 1);
    let pg = scripted_group(engine);
    let err = pg.send(&[], 99, -1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(
        err.to_string(),
        "operation not supported by this adapter: send"
    );
}
