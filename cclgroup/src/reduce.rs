//! Element-wise reduction primitives used by the in-process engine.

use crate::memory::{Bf16, Element};
use crate::types::{ReduceOp, WireType};

/// Trait for types that support the four reduction operations.
trait Reducible: Element {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i32, i64);
impl_reducible!(float: f32, f64);

impl Reducible for Bf16 {
    #[inline]
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
        Bf16::from_f32(f32::reduce(a.to_f32(), b.to_f32(), op))
    }
}

/// Element-wise `dst[i] = op(dst[i], src[i])` on byte slices holding
/// `dtype` elements. Both slices must have the same length.
pub(crate) fn reduce_slice(dst: &mut [u8], src: &[u8], dtype: WireType, op: ReduceOp) {
    match dtype {
        // The wire has a single 8-bit type and treats it as signed.
        WireType::Char => reduce_slice_typed::<i8>(dst, src, op),
        WireType::Double => reduce_slice_typed::<f64>(dst, src, op),
        WireType::Bf16 => reduce_slice_typed::<Bf16>(dst, src, op),
        WireType::Float => reduce_slice_typed::<f32>(dst, src, op),
        WireType::Int => reduce_slice_typed::<i32>(dst, src, op),
        WireType::Int64 => reduce_slice_typed::<i64>(dst, src, op),
    }
}

fn reduce_slice_typed<T: Reducible>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    let t_size = T::DTYPE.size_in_bytes();
    for (d, s) in dst.chunks_exact_mut(t_size).zip(src.chunks_exact(t_size)) {
        let r = T::reduce(T::read_le(d), T::read_le(s), op);
        r.write_le(d);
    }
}
