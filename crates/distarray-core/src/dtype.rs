//! Data Types - Distarray Type System
//!
//! Defines the element types that local buffers may hold and the traits
//! that make them movable across the transport. Every scalar is `Pod`, so a
//! buffer can be viewed as raw bytes for a collective and rebuilt on the
//! receiving side without any per-element encoding.
//!
//! # Key Features
//! - Runtime dtype information via `DType`, carried in broadcast headers
//! - `Scalar` for byte-castable element types
//! - `Numeric` for element types that support arithmetic and reduction
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use bytemuck::{Pod, Zeroable};
use num_traits::{Num, NumCast, One, WrappingAdd, WrappingMul, Zero};
use serde::{Deserialize, Serialize};

use core::fmt::Debug;

// =============================================================================
// DType Enum
// =============================================================================

/// Runtime representation of buffer element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floating point (single precision).
    F32,
    /// 64-bit floating point (double precision).
    F64,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
}

impl DType {
    /// Returns the size in bytes of this data type.
    #[must_use]
    pub const fn size_of(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 => 2,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
        }
    }

    /// Returns true if this is a floating point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns true if this is a signed type.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::F32 | Self::F64 | Self::I8 | Self::I16 | Self::I32 | Self::I64
        )
    }

    /// Returns true if this is an integer type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Returns the name of this data type as a string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        Self::F64
    }
}

impl core::fmt::Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Scalar Trait
// =============================================================================

/// Trait for all scalar types that can be stored in a local buffer.
///
/// `Pod` is what lets the collective layer move a buffer as raw bytes.
pub trait Scalar: Copy + Clone + Debug + Default + Send + Sync + Pod + Zeroable + 'static {
    /// The runtime dtype for this scalar type.
    const DTYPE: DType;

    /// Returns the dtype for this type.
    #[must_use]
    fn dtype() -> DType {
        Self::DTYPE
    }
}

// =============================================================================
// Numeric Trait
// =============================================================================

/// Trait for numeric types that support arithmetic and reductions.
pub trait Numeric: Scalar + Num + NumCast + PartialOrd + Zero + One {
    /// The zero value for this type.
    const ZERO: Self;

    /// The one value for this type.
    const ONE: Self;

    /// Returns the minimum value for this type.
    fn min_value() -> Self;

    /// Returns the maximum value for this type.
    fn max_value() -> Self;

    /// Addition that wraps around on integer overflow.
    fn wrapping_sum(self, rhs: Self) -> Self;

    /// Multiplication that wraps around on integer overflow.
    fn wrapping_product(self, rhs: Self) -> Self;

    /// Lossy conversion used by derived statistics such as `mean`.
    fn to_f64_lossy(self) -> f64 {
        <f64 as NumCast>::from(self).unwrap_or(f64::NAN)
    }
}

// =============================================================================
// Implementations
// =============================================================================

macro_rules! impl_numeric {
    ($ty:ty, $dtype:expr, $zero:expr, $one:expr, $add:ident, $mul:ident) => {
        impl Scalar for $ty {
            const DTYPE: DType = $dtype;
        }

        impl Numeric for $ty {
            const ZERO: Self = $zero;
            const ONE: Self = $one;

            fn min_value() -> Self {
                <$ty>::MIN
            }

            fn max_value() -> Self {
                <$ty>::MAX
            }

            fn wrapping_sum(self, rhs: Self) -> Self {
                $add(self, rhs)
            }

            fn wrapping_product(self, rhs: Self) -> Self {
                $mul(self, rhs)
            }
        }
    };
}

fn float_add<T: Num>(a: T, b: T) -> T {
    a + b
}

fn float_mul<T: Num>(a: T, b: T) -> T {
    a * b
}

fn int_add<T: WrappingAdd>(a: T, b: T) -> T {
    a.wrapping_add(&b)
}

fn int_mul<T: WrappingMul>(a: T, b: T) -> T {
    a.wrapping_mul(&b)
}

impl_numeric!(f32, DType::F32, 0.0, 1.0, float_add, float_mul);
impl_numeric!(f64, DType::F64, 0.0, 1.0, float_add, float_mul);
impl_numeric!(i8, DType::I8, 0, 1, int_add, int_mul);
impl_numeric!(i16, DType::I16, 0, 1, int_add, int_mul);
impl_numeric!(i32, DType::I32, 0, 1, int_add, int_mul);
impl_numeric!(i64, DType::I64, 0, 1, int_add, int_mul);
impl_numeric!(u8, DType::U8, 0, 1, int_add, int_mul);
impl_numeric!(u32, DType::U32, 0, 1, int_add, int_mul);
impl_numeric!(u64, DType::U64, 0, 1, int_add, int_mul);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F32.size_of(), 4);
        assert_eq!(DType::F64.size_of(), 8);
        assert_eq!(DType::I32.size_of(), 4);
        assert_eq!(DType::U8.size_of(), 1);
    }

    #[test]
    fn test_dtype_is_float() {
        assert!(DType::F32.is_float());
        assert!(DType::F64.is_float());
        assert!(!DType::I32.is_float());
        assert!(DType::U64.is_integer());
        assert!(!DType::U64.is_signed());
    }

    #[test]
    fn test_scalar_dtype() {
        assert_eq!(f32::dtype(), DType::F32);
        assert_eq!(f64::dtype(), DType::F64);
        assert_eq!(i32::dtype(), DType::I32);
        assert_eq!(u64::dtype(), DType::U64);
    }

    #[test]
    fn test_numeric_constants() {
        assert_eq!(f32::ZERO, 0.0);
        assert_eq!(f32::ONE, 1.0);
        assert_eq!(i32::ZERO, 0);
        assert_eq!(<i64 as Numeric>::max_value(), i64::MAX);
        assert_eq!(7_i32.to_f64_lossy(), 7.0);
    }

    #[test]
    fn test_wrapping_arithmetic() {
        assert_eq!(200_u8.wrapping_sum(100), 44);
        assert_eq!(i32::MAX.wrapping_sum(1), i32::MIN);
        assert_eq!(16_u8.wrapping_product(16), 0);
        assert_eq!(1.5_f64.wrapping_sum(2.0), 3.5);
        assert_eq!(f32::MAX.wrapping_product(2.0), f32::INFINITY);
    }

    #[test]
    fn test_dtype_display() {
        assert_eq!(DType::I64.to_string(), "i64");
        assert_eq!(format!("{}", DType::F32), "f32");
    }
}
