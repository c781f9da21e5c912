//! ECMA-335 Binary Data Heap (`#Blob`) for .NET Metadata
//!
//! Provides access to the `#Blob` heap, which stores variable-length binary data such as
//! signatures, custom attribute values and declarative security permission sets. Each blob is
//! addressed by its byte offset into the heap and starts with a compressed length prefix.
//!
//! # Heap Structure
//!
//! ```text
//! Offset  Content
//! ------  -------
//! 0x00    0x00              (Null blob - always present)
//! 0x01    0x05 [5 bytes]    (Blob of length 5)
//! 0x07    0x80 0x80 [...]   (Blob of length 128, 2-byte length prefix)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use declsec::metadata::streams::Blob;
//!
//! let heap = [0x00, 0x02, 0x2E, 0x00];
//! let blob = Blob::from(&heap)?;
//!
//! assert_eq!(blob.get(1)?, &[0x2E, 0x00]);
//! assert!(blob.get(0)?.is_empty());
//! # Ok::<(), declsec::Error>(())
//! ```
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::{io::write_compressed_uint, parser::Parser},
    Error, Result,
};

/// View over an ECMA-335 `#Blob` heap.
///
/// `Blob` borrows the heap bytes and hands out zero-copy slices. Every access validates the
/// length prefix against the heap bounds.
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view from a byte slice.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty slice and [`crate::Error::Malformed`] if it
    /// does not start with the mandatory null blob.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        if data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get the blob stored at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index or the declared length lies outside
    /// the heap, and [`crate::Error::Malformed`] for an invalid length prefix.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let bytes = parser.read_bytes(len)?;

        Ok(bytes)
    }

    /// Returns a [`Parser`] positioned at the start of the blob stored at `index`.
    ///
    /// # Errors
    /// Same conditions as [`Blob::get`].
    pub fn parser(&self, index: usize) -> Result<Parser<'a>> {
        Ok(Parser::new(self.get(index)?))
    }

    /// Total size of the heap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap holds nothing but the null blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// Iterate over all blobs following the null blob, yielding `(offset, bytes)` pairs.
    #[must_use]
    pub fn iter(&self) -> BlobIterator<'_> {
        BlobIterator {
            blob: self,
            position: 1,
        }
    }
}

impl<'a> IntoIterator for &'a Blob<'a> {
    type Item = Result<(usize, &'a [u8])>;
    type IntoIter = BlobIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sequential iterator over the blobs of a heap.
///
/// Iteration stops at the first malformed entry after reporting it, since the offset of the
/// following entry can no longer be determined.
pub struct BlobIterator<'a> {
    blob: &'a Blob<'a>,
    position: usize,
}

impl<'a> Iterator for BlobIterator<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.blob.data.len() {
            return None;
        }

        let start = self.position;
        let mut parser = Parser::new(&self.blob.data[start..]);
        let entry = parser
            .read_compressed_uint()
            .and_then(|len| parser.read_bytes(len as usize));

        match entry {
            Ok(bytes) => {
                self.position = start + parser.pos();
                Some(Ok((start, bytes)))
            }
            Err(error) => {
                self.position = self.blob.data.len();
                Some(Err(error))
            }
        }
    }
}

/// Append-only writer producing a `#Blob` heap image.
///
/// The null blob is written on construction, so the first appended blob lands at offset `1`.
///
/// ```rust
/// use declsec::metadata::streams::{Blob, BlobHeapBuilder};
///
/// let mut builder = BlobHeapBuilder::new();
/// let index = builder.add(&[0x2E, 0x00])?;
/// let heap = builder.build();
///
/// assert_eq!(Blob::from(&heap)?.get(index as usize)?, &[0x2E, 0x00]);
/// # Ok::<(), declsec::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct BlobHeapBuilder {
    data: Vec<u8>,
}

impl BlobHeapBuilder {
    /// Creates a builder holding only the null blob.
    #[must_use]
    pub fn new() -> Self {
        BlobHeapBuilder { data: vec![0] }
    }

    /// Appends `blob` with its compressed length prefix and returns its heap offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob or the resulting offset does not fit the
    /// metadata limits.
    pub fn add(&mut self, blob: &[u8]) -> Result<u32> {
        let Ok(index) = u32::try_from(self.data.len()) else {
            return Err(malformed_error!("Blob heap exceeds 4GB"));
        };
        let Ok(length) = u32::try_from(blob.len()) else {
            return Err(malformed_error!("Blob of {} bytes is too large", blob.len()));
        };

        write_compressed_uint(length, &mut self.data)?;
        self.data.extend_from_slice(blob);
        Ok(index)
    }

    /// Consumes the builder and returns the heap bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for BlobHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
