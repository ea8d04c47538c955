use cclgroup::{Buffer, CclConfig, CclError, DataType, ErrorKind};

use super::helpers::{ScriptedEngine, run_group, scripted_group};

#[test]
fn test_alltoall_uneven_independent_buffers() {
    let results = run_group(3, CclConfig::default(), |pg| {
        let r = pg.rank() as i32;
        let inputs: Vec<Buffer> = (0..3)
            .map(|q| Buffer::from_vec(vec![r * 10 + q; (r + q + 1) as usize]))
            .collect();
        let outputs: Vec<Buffer> = (0..3)
            .map(|q| Buffer::zeros(DataType::I32, &[(r + q + 1) as usize]))
            .collect();
        let mut work = pg.alltoall(&outputs, &inputs).unwrap();
        assert!(work.is_completed());
        work.wait().unwrap();
        outputs
            .iter()
            .map(|b| b.to_vec::<i32>().unwrap())
            .collect::<Vec<_>>()
    });
    for (r, outputs) in results.iter().enumerate() {
        let r = r as i32;
        for (q, got) in outputs.iter().enumerate() {
            let q = q as i32;
            assert_eq!(got, &vec![q * 10 + r; (q + r + 1) as usize], "rank {r} from {q}");
        }
    }
}

#[test]
fn test_alltoall_flat_groups() {
    let results = run_group(3, CclConfig::default(), |pg| {
        let r = pg.rank() as f64;
        let send = Buffer::from_vec((0..6).map(|i| r * 10.0 + i as f64).collect());
        let recv = Buffer::zeros(DataType::F64, &[6]);
        pg.alltoall(&recv.chunk(3).unwrap(), &send.chunk(3).unwrap())
            .unwrap()
            .wait()
            .unwrap();
        recv.to_vec::<f64>().unwrap()
    });
    assert_eq!(results[0], vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
    assert_eq!(results[2], vec![4.0, 5.0, 14.0, 15.0, 24.0, 25.0]);
}

#[test]
fn test_alltoall_validation() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine);
    let two = vec![Buffer::zeros(DataType::F32, &[1]); 2];

    assert!(matches!(
        pg.alltoall(&two, &two[..1]),
        Err(CclError::GroupSizeMismatch { expected: 2, actual: 1, .. })
    ));
    let ints = vec![Buffer::zeros(DataType::I32, &[1]); 2];
    assert!(matches!(
        pg.alltoall(&ints, &two),
        Err(CclError::DTypeMismatch { .. })
    ));
    assert_eq!(calls.total(), 0);
}

#[test]
fn test_alltoall_base_equal_split() {
    let results = run_group(3, CclConfig::default(), |pg| {
        let r = pg.rank() as i32;
        let input = Buffer::from_vec((0..6).map(|i| r * 10 + i).collect());
        let output = Buffer::zeros(DataType::I32, &[6]);
        pg.alltoall_base(&output, &input, &[], &[])
            .unwrap()
            .wait()
            .unwrap();
        output.to_vec::<i32>().unwrap()
    });
    for (r, got) in results.into_iter().enumerate() {
        let r = r as i32;
        let expected: Vec<i32> = (0..3)
            .flat_map(|q| [q * 10 + 2 * r, q * 10 + 2 * r + 1])
            .collect();
        assert_eq!(got, expected);
    }
}

#[test]
fn test_alltoall_base_explicit_rows() {
    let results = run_group(2, CclConfig::default(), |pg| {
        let r = pg.rank() as i64;
        let input = Buffer::from_vec_shaped((0..6).map(|i| r * 100 + i).collect(), &[3, 2]).unwrap();
        let output = Buffer::zeros(DataType::I64, &[3, 2]);
        let (in_splits, out_splits) = if r == 0 {
            ([1, 2], [1, 2])
        } else {
            ([2, 1], [2, 1])
        };
        pg.alltoall_base(&output, &input, &out_splits, &in_splits)
            .unwrap()
            .wait()
            .unwrap();
        output.to_vec::<i64>().unwrap()
    });
    assert_eq!(results[0], vec![0, 1, 100, 101, 102, 103]);
    assert_eq!(results[1], vec![2, 3, 4, 5, 104, 105]);
}

#[test]
fn test_alltoall_base_mismatched_totals_rejected() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine);
    let err = pg
        .alltoall_base(
            &Buffer::zeros(DataType::F32, &[6]),
            &Buffer::zeros(DataType::F32, &[8]),
            &[],
            &[],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, CclError::BufferMismatch { .. }));
    assert_eq!(calls.total(), 0);
}

#[test]
fn test_alltoall_base_split_checks() {
    let (engine, calls) = ScriptedEngine::new(0, 2);
    let pg = scripted_group(engine);
    let out = Buffer::zeros(DataType::F32, &[3, 4]);
    let input = Buffer::zeros(DataType::F32, &[3, 4]);

    assert!(matches!(
        pg.alltoall_base(&out, &input, &[1, 1], &[1, 2]),
        Err(CclError::SplitSizes { .. })
    ));
    assert!(matches!(
        pg.alltoall_base(&out, &input, &[1, 2], &[3]),
        Err(CclError::SplitSizes { .. })
    ));
    // An empty list on one side means an equal split of that side.
    assert!(matches!(
        pg.alltoall_base(&out, &input, &[1, 2], &[]),
        Err(CclError::IndivisibleCount { extent: 3, group_size: 2 })
    ));
    assert!(matches!(
        pg.alltoall_base(&out, &input, &[], &[]),
        Err(CclError::IndivisibleCount { extent: 3, group_size: 2 })
    ));
    let ints = Buffer::zeros(DataType::I32, &[3, 4]);
    assert!(matches!(
        pg.alltoall_base(&ints, &input, &[1, 2], &[2, 1]),
        Err(CclError::DTypeMismatch { .. })
    ));
    assert_eq!(calls.total(), 0);

    pg.alltoall_base(&out, &input, &[1, 2], &[2, 1])
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(calls.issued(), 1);
}
