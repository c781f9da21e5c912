//! Low-level byte stream parser for metadata blob decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data parser
//! for reading .NET metadata blobs. Every read is bounds checked, so truncated or crafted length
//! fields surface as [`crate::Error::OutOfBounds`] instead of reading outside the blob.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance`] - Move forward by one byte
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::rewind`] - Move backward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//! - [`crate::file::parser::Parser::read_bytes`] - Read a raw byte range
//! - [`crate::file::parser::Parser::read_remaining`] - Consume everything after the cursor
//!
//! ## Metadata Reading Methods
//! - [`crate::file::parser::Parser::read_compressed_uint`] - Read compressed unsigned integers
//! - [`crate::file::parser::Parser::read_compressed_string_utf8`] - Read length-prefixed UTF-8 strings
//! - [`crate::file::parser::Parser::read_ser_string`] - Read custom attribute `SerString`s
//!
//! # Usage Examples
//!
//! ```rust
//! use declsec::Parser;
//!
//! let data = [0x2E, 0x81, 0x00, 0x41];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u8>()?, b'.');
//! assert_eq!(parser.read_compressed_uint()?, 0x100);
//! assert_eq!(parser.remaining(), 1);
//! # Ok::<(), declsec::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Result,
};

/// A generic binary data parser for reading .NET metadata structures.
///
/// `Parser` provides a cursor-based interface over a borrowed byte slice. It maintains an
/// internal position cursor and validates every access against the slice length.
///
/// A `Parser` handed to a decoder by value is owned by that decoder for the duration of the
/// call and dropped on every exit path.
///
/// # Examples
///
/// ```rust
/// use declsec::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_le::<u32>()?;
/// assert_eq!(first, 0x04030201);
///
/// parser.seek(6)?;
/// let last_bytes = parser.read_le::<u16>()?;
/// assert_eq!(last_bytes, 0x0807);
/// # Ok::<(), declsec::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there are unread bytes after the current position.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move to a specific position in the data.
    ///
    /// Seeking to `len()` is allowed and leaves the parser at the end of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.position = self.calc_end_position(step)?;
        Ok(())
    }

    /// Move the position backward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `step` is larger than the current position.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::Parser;
    /// let data = [0x3C, 0x00];
    /// let mut parser = Parser::new(&data);
    ///
    /// let _ = parser.read_le::<u8>()?;
    /// parser.rewind(1)?;
    /// assert_eq!(parser.pos(), 0);
    /// assert!(parser.rewind(1).is_err());
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn rewind(&mut self, step: usize) -> Result<()> {
        let Some(position) = self.position.checked_sub(step) else {
            return Err(out_of_bounds_error!());
        };

        self.position = position;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Peek at a value of type `T` in little-endian format without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn peek_le<T: CilIO>(&self) -> Result<T> {
        let mut temp_position = self.position;
        read_le_at::<T>(self.data, &mut temp_position)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// Compressed integers use variable-length encoding to efficiently store small values:
    /// - Values 0-127: 1 byte (0xxxxxxx)
    /// - Values 128-16383: 2 bytes (10xxxxxx xxxxxxxx)
    /// - Values 16384-536870911: 4 bytes (110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoded width extends past the data or
    /// [`crate::Error::Malformed`] for a lead byte of the form `111xxxxx`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::Parser;
    ///
    /// let data = [0x7F];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_compressed_uint()?, 127);
    ///
    /// let data = [0x80, 0x80];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_compressed_uint()?, 128);
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.peek_byte()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            self.position += 1;
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let bytes = self.read_bytes(2)?;
            let value = ((u32::from(bytes[0]) & 0x3F) << 8) | u32::from(bytes[1]);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let bytes = self.read_bytes(4)?;
            let value = ((u32::from(bytes[0]) & 0x1F) << 24)
                | (u32::from(bytes[1]) << 16)
                | (u32::from(bytes[2]) << 8)
                | u32::from(bytes[3]);
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed uint length-prefixed UTF-8 string.
    ///
    /// Invalid UTF-8 is replaced lossily.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the declared length exceeds the data.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::Parser;
    ///
    /// let data = [5, b'H', b'e', b'l', b'l', b'o'];
    /// let mut parser = Parser::new(&data);
    ///
    /// assert_eq!(parser.read_compressed_string_utf8()?, "Hello");
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn read_compressed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_compressed_uint()? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        let bytes = self.read_bytes(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a custom attribute `SerString` (ECMA-335 II.23.3).
    ///
    /// A single `0xFF` byte encodes a null string and yields `None`; otherwise the string is
    /// read like [`Parser::read_compressed_string_utf8`].
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::Parser;
    ///
    /// let data = [0xFF, 0x02, b'o', b'k'];
    /// let mut parser = Parser::new(&data);
    ///
    /// assert_eq!(parser.read_ser_string()?, None);
    /// assert_eq!(parser.read_ser_string()?.as_deref(), Some("ok"));
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.peek_byte()? == 0xFF {
            self.advance()?;
            return Ok(None);
        }

        self.read_compressed_string_utf8().map(Some)
    }

    /// Returns the number of bytes remaining from the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Ensures that at least `needed` bytes are available from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `needed` bytes remain.
    pub fn ensure_remaining(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(out_of_bounds_error!());
        }
        Ok(())
    }

    /// Calculates an end position safely with overflow checking.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the calculation would overflow
    /// or if the resulting position exceeds the data length.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04, 0x05];
    /// let mut parser = Parser::new(&data);
    ///
    /// let chunk = parser.read_bytes(3)?;
    /// assert_eq!(chunk, &[0x01, 0x02, 0x03]);
    /// assert_eq!(parser.pos(), 3);
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Consumes and returns every byte from the current position to the end of the data.
    ///
    /// Never fails; at the end of the data an empty slice is returned.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let start = self.position.min(self.data.len());
        self.position = self.data.len();
        &self.data[start..]
    }
}
