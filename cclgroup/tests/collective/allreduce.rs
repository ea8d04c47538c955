use cclgroup::{Bf16, Buffer, CclConfig, ReduceOp};

use super::helpers::{ramp, run_group};

#[test]
fn test_allreduce_sum_f32() {
    let results = run_group(4, CclConfig::default(), |pg| {
        let buf = Buffer::from_vec(vec![(pg.rank() + 1) as f32; 8]);
        pg.allreduce(&buf, ReduceOp::Sum).unwrap().wait().unwrap();
        buf.to_vec::<f32>().unwrap()
    });
    for got in results {
        assert_eq!(got, vec![10.0; 8]);
    }
}

#[test]
fn test_allreduce_min_max_i64() {
    for (op, expected) in [(ReduceOp::Min, vec![-3i64, 0]), (ReduceOp::Max, vec![0, 3])] {
        let results = run_group(4, CclConfig::default(), move |pg| {
            let r = pg.rank() as i64;
            let buf = Buffer::from_vec(vec![-r, r]);
            pg.allreduce(&buf, op).unwrap().wait().unwrap();
            buf.to_vec::<i64>().unwrap()
        });
        for got in results {
            assert_eq!(got, expected, "{op}");
        }
    }
}

#[test]
fn test_allreduce_prod_bf16() {
    let results = run_group(3, CclConfig::default(), |pg| {
        let v = Bf16::from_f32((pg.rank() + 2) as f32);
        let buf = Buffer::from_vec(vec![v; 4]);
        pg.allreduce(&buf, ReduceOp::Prod).unwrap().wait().unwrap();
        buf.to_vec::<Bf16>().unwrap()
    });
    for got in results {
        let got: Vec<f32> = got.into_iter().map(Bf16::to_f32).collect();
        assert_eq!(got, vec![24.0; 4]);
    }
}

#[test]
fn test_allreduce_poll_until_done() {
    let results = run_group(2, CclConfig::default(), |pg| {
        let buf = Buffer::from_vec(ramp(1.0, 1024));
        let mut work = pg.allreduce(&buf, ReduceOp::Sum).unwrap();
        while !work.poll().unwrap() {
            std::thread::yield_now();
        }
        assert!(work.poll().unwrap());
        assert!(work.is_success().unwrap());
        buf.to_vec::<f32>().unwrap()
    });
    let expected: Vec<f32> = ramp(1.0, 1024).iter().map(|v| v * 2.0).collect();
    for got in results {
        assert_eq!(got, expected);
    }
}

#[test]
fn test_reduce_lands_on_root_only() {
    let results = run_group(4, CclConfig::default(), |pg| {
        let buf = Buffer::from_vec(vec![pg.rank() as i32 + 1, 10]);
        pg.reduce(&buf, ReduceOp::Sum, 2).unwrap().wait().unwrap();
        buf.to_vec::<i32>().unwrap()
    });
    for (rank, got) in results.into_iter().enumerate() {
        if rank == 2 {
            assert_eq!(got, vec![10, 40]);
        } else {
            assert_eq!(got, vec![rank as i32 + 1, 10], "rank {rank} buffer changed");
        }
    }
}

#[test]
fn test_char_sum_across_ranks() {
    let results = run_group(2, CclConfig::default(), |pg| {
        let buf = Buffer::from_vec(vec![-5i8, 7]);
        pg.allreduce(&buf, ReduceOp::Sum).unwrap().wait().unwrap();
        buf.to_vec::<i8>().unwrap()
    });
    for got in results {
        assert_eq!(got, vec![-10, 14]);
    }
}

#[test]
fn test_byte_max_follows_signed_wire_ordering() {
    // 0x80 is 128 as a byte but -128 on the shared 8-bit wire type.
    let results = run_group(2, CclConfig::default(), |pg| {
        let v = if pg.rank() == 0 { 0x80u8 } else { 0x01 };
        let buf = Buffer::from_vec(vec![v]);
        pg.allreduce(&buf, ReduceOp::Max).unwrap().wait().unwrap();
        buf.to_vec::<u8>().unwrap()
    });
    for got in results {
        assert_eq!(got, vec![0x01]);
    }
}
