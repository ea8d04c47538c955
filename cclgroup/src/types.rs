use std::sync::Once;

/// Rank of a participant in a process group (0-indexed).
pub type Rank = u32;

/// Element types accepted by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned byte.
    U8 = 0,
    /// Signed narrow integer (char).
    I8 = 1,
    F64 = 2,
    BF16 = 3,
    F32 = 4,
    I32 = 5,
    I64 = 6,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::BF16 => 2,
            DataType::F32 | DataType::I32 => 4,
            DataType::F64 | DataType::I64 => 8,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::F64 => "f64",
            DataType::BF16 => "bf16",
            DataType::F32 => "f32",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Element types understood by the communication engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Char,
    Double,
    Bf16,
    Float,
    Int,
    Int64,
}

impl WireType {
    pub const fn size_in_bytes(self) -> usize {
        match self {
            WireType::Char => 1,
            WireType::Bf16 => 2,
            WireType::Float | WireType::Int => 4,
            WireType::Double | WireType::Int64 => 8,
        }
    }
}

/// Map an adapter element type onto the engine's wire type.
///
/// `U8` and `I8` both travel as `Char`. The mapping is width-only: the engine
/// reduces `Char` as a signed 8-bit value, so `Min`/`Max` over `U8` data
/// with the high bit set can disagree with unsigned semantics.
pub fn to_wire_dtype(dt: DataType) -> WireType {
    match dt {
        DataType::U8 | DataType::I8 => WireType::Char,
        DataType::F64 => WireType::Double,
        DataType::BF16 => WireType::Bf16,
        DataType::F32 => WireType::Float,
        DataType::I32 => WireType::Int,
        DataType::I64 => WireType::Int64,
    }
}

/// Emit a one-time warning when an ordering reduction runs over `U8` data.
pub(crate) fn flag_unsigned_narrowing(dt: DataType, op: ReduceOp) {
    static WARNED: Once = Once::new();
    if dt == DataType::U8 && matches!(op, ReduceOp::Min | ReduceOp::Max) {
        WARNED.call_once(|| {
            tracing::warn!(
                dtype = %dt,
                op = %op,
                "u8 is reduced as the engine's signed char type; min/max may follow signed ordering"
            );
        });
    }
}

/// Reduction operations for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
        }
    }
}
