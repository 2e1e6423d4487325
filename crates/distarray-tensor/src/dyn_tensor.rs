//! DynTensor - Type-Erased Local Buffers
//!
//! Collectives that move a whole array, header included, cannot know the
//! element type at compile time on the receiving side. `DynTensor` carries
//! a tensor together with its runtime `DType` so such operations can hand
//! back a buffer and let the caller recover the static type.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use distarray_core::dtype::{DType, Scalar};
use distarray_core::error::{Error, Result};

use crate::tensor::Tensor;

// =============================================================================
// DynTensor Enum
// =============================================================================

macro_rules! dyn_tensor {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A tensor whose element type is only known at runtime.
        #[derive(Clone, Debug)]
        pub enum DynTensor {
            $(
                #[doc = concat!("A tensor of `", stringify!($ty), "` elements.")]
                $variant(Tensor<$ty>),
            )*
        }

        impl DynTensor {
            /// Returns the runtime element type.
            #[must_use]
            pub fn dtype(&self) -> DType {
                match self {
                    $(Self::$variant(_) => DType::$variant,)*
                }
            }

            /// Returns the shape of the wrapped tensor.
            #[must_use]
            pub fn shape(&self) -> &[usize] {
                match self {
                    $(Self::$variant(t) => t.shape(),)*
                }
            }

            /// Returns the raw bytes of the wrapped tensor.
            #[must_use]
            pub fn to_bytes(&self) -> Vec<u8> {
                match self {
                    $(Self::$variant(t) => t.to_bytes(),)*
                }
            }

            /// Rebuilds a tensor of `dtype` from raw bytes.
            pub fn from_bytes(dtype: DType, bytes: &[u8], shape: &[usize]) -> Result<Self> {
                Ok(match dtype {
                    $(DType::$variant => Self::$variant(Tensor::from_bytes(bytes, shape)?),)*
                })
            }
        }

        $(
            impl From<Tensor<$ty>> for DynTensor {
                fn from(tensor: Tensor<$ty>) -> Self {
                    Self::$variant(tensor)
                }
            }

            impl TryFrom<DynTensor> for Tensor<$ty> {
                type Error = Error;

                fn try_from(value: DynTensor) -> Result<Self> {
                    match value {
                        DynTensor::$variant(t) => Ok(t),
                        other => Err(Error::type_error(format!(
                            "expected a buffer of {}, got {}",
                            <$ty as Scalar>::DTYPE,
                            other.dtype()
                        ))),
                    }
                }
            }
        )*
    };
}

dyn_tensor! {
    F32 => f32,
    F64 => f64,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    U8 => u8,
    U32 => u32,
    U64 => u64,
}

impl DynTensor {
    /// Returns the number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape().iter().product()
    }

    /// Recovers the statically typed tensor, or fails with a type error.
    pub fn downcast<T: Scalar>(self) -> Result<Tensor<T>>
    where
        Tensor<T>: TryFrom<Self, Error = Error>,
    {
        Tensor::<T>::try_from(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
