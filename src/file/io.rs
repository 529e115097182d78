//! Little-endian, bounds-checked reading and writing of primitive values.
//!
//! CIL instruction streams store every multi-byte operand in little-endian order. This module
//! provides the [`crate::file::io::CilIO`] trait, implemented for all primitive integer and
//! floating-point types an operand can hold, together with offset-tracking helpers used by
//! [`crate::file::parser::Parser`] (decoding) and [`crate::disassembler::encode_instruction`]
//! (encoding).
//!
//! # Error Handling
//!
//! Reads fail with [`crate::Error::TruncatedStream`] when fewer bytes remain than the type
//! requires. The check always happens before any byte is touched, so a failed read never
//! advances the offset.
//!
//! # Thread Safety
//!
//! All functions are pure and operate only on their arguments.

use crate::{Error, Result};

/// Trait for implementing type-specific safe binary data reading operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait CilIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by `size_of::<T>()` on success and left untouched on failure.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (will be advanced after reading)
///
/// # Errors
///
/// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let available = data.len().saturating_sub(*offset);
    if type_len > available {
        return Err(Error::TruncatedStream {
            offset: *offset,
            needed: type_len,
            available,
        });
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(Error::TruncatedStream {
            offset: *offset,
            needed: type_len,
            available,
        });
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Appends a value of type `T` in little-endian byte order to `buffer`.
pub fn write_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}
