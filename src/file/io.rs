//! Low-level byte order and safe reading/writing utilities for metadata blobs.
//!
//! This module provides endian-aware, bounds-checked conversion of primitive values and the
//! writing half of the ECMA-335 compressed integer codec. The reading half lives on
//! [`crate::file::parser::Parser`].
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Trait defining little/big-endian conversion for primitive types
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::read_le_at_dyn`] - Read a 2 or 4 byte heap/table index
//! - [`crate::file::io::write_compressed_uint`] - Encode a compressed unsigned integer
//! - [`crate::file::io::compressed_uint_size`] - Width of a compressed unsigned integer
//!
//! # Compressed Integer Encoding (ECMA-335 II.23.2)
//!
//! | Range                     | Width | Bit pattern                          |
//! |---------------------------|-------|--------------------------------------|
//! | `0x00..=0x7F`             | 1     | `0xxxxxxx`                           |
//! | `0x80..=0x3FFF`           | 2     | `10xxxxxx xxxxxxxx`                  |
//! | `0x4000..=0x1FFF_FFFF`    | 4     | `110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx` |

use crate::Result;

/// Largest value representable as a compressed unsigned integer.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Trait for implementing type-specific safe binary data reading operations.
///
/// All implementations only perform pure conversions on primitive types and are
/// therefore thread-safe.
pub trait CilIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Safely reads a value of type `T` in little-endian byte order from a data buffer at
/// the given offset, advancing the offset past the value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust
/// use declsec::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00];
/// let mut offset = 0;
/// assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 1);
/// assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 2);
/// assert_eq!(offset, 4);
/// # Ok::<(), declsec::Error>(())
/// ```
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };

    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Dynamically reads either a 2-byte or 4-byte value in little-endian byte order.
///
/// Metadata table columns that index heaps or other tables are 2 bytes wide unless the
/// target is large; `is_large` selects the width. The result is promoted to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Returns how many bytes the compressed encoding of `value` occupies.
#[must_use]
pub fn compressed_uint_size(value: u32) -> usize {
    if value < 0x80 {
        1
    } else if value < 0x4000 {
        2
    } else {
        4
    }
}

/// Appends the ECMA-335 compressed encoding of `value` to `buffer`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
///
/// # Examples
///
/// ```rust
/// use declsec::file::io::write_compressed_uint;
///
/// let mut buffer = Vec::new();
/// write_compressed_uint(0x3FFF, &mut buffer)?;
/// assert_eq!(buffer, [0xBF, 0xFF]);
/// # Ok::<(), declsec::Error>(())
/// ```
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) -> Result<()> {
    match compressed_uint_size(value) {
        1 => buffer.push(value as u8),
        2 => {
            buffer.push(0x80 | (value >> 8) as u8);
            buffer.push(value as u8);
        }
        _ => {
            if value > MAX_COMPRESSED_UINT {
                return Err(malformed_error!(
                    "Value 0x{:X} exceeds the compressed integer range",
                    value
                ));
            }
            buffer.push(0xC0 | (value >> 24) as u8);
            buffer.push((value >> 16) as u8);
            buffer.push((value >> 8) as u8);
            buffer.push(value as u8);
        }
    }

    Ok(())
}
