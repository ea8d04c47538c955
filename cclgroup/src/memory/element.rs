//! Rust element types that can back a [`Buffer`](super::Buffer).

use crate::types::DataType;

mod sealed {
    pub trait Sealed {}
}

/// A Rust type with a fixed [`DataType`] and a little-endian byte encoding.
///
/// Sealed: implemented for `u8`, `i8`, `f64`, [`Bf16`], `f32`, `i32`, `i64`.
pub trait Element: sealed::Sealed + Copy + Send + Sync + 'static {
    const DTYPE: DataType;

    /// Decode from exactly `DTYPE.size_in_bytes()` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `DTYPE.size_in_bytes()` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DataType = $dtype;

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    Self::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element!(
    u8 => DataType::U8,
    i8 => DataType::I8,
    f64 => DataType::F64,
    f32 => DataType::F32,
    i32 => DataType::I32,
    i64 => DataType::I64,
);

/// Brain floating-point 16: sign(1) + exponent(8) + mantissa(7).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Bf16(pub u16);

impl Bf16 {
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        let bits = v.to_bits();
        if v.is_nan() {
            // Keep a quiet NaN; rounding could carry into the exponent.
            return Bf16(((bits >> 16) as u16) | 0x0040);
        }
        // Round-to-nearest-even: add rounding bias then truncate.
        let rounded = bits.wrapping_add(0x7FFF + ((bits >> 16) & 1));
        Bf16((rounded >> 16) as u16)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        f32::from_bits((self.0 as u32) << 16)
    }
}

impl From<f32> for Bf16 {
    fn from(v: f32) -> Self {
        Bf16::from_f32(v)
    }
}

impl sealed::Sealed for Bf16 {}
impl Element for Bf16 {
    const DTYPE: DataType = DataType::BF16;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        Bf16(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.0.to_le_bytes());
    }
}
