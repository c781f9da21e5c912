//! Binary data access for metadata blobs.
//!
//! This module provides the bounds-checked reading infrastructure every decoder in this crate is
//! built on. Nothing here knows about declarative security; it only turns bytes into primitive
//! values without ever reading past the end of the source.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser`] - Cursor-based reader with compressed integer and string support
//! - [`crate::file::io`] - Endian-aware primitive conversion and the compressed integer writers
//!
//! # Examples
//!
//! ```rust
//! use declsec::file::{io::write_compressed_uint, parser::Parser};
//!
//! let mut encoded = Vec::new();
//! write_compressed_uint(0x4000, &mut encoded)?;
//!
//! let mut parser = Parser::new(&encoded);
//! assert_eq!(parser.read_compressed_uint()?, 0x4000);
//! # Ok::<(), declsec::Error>(())
//! ```

pub mod io;
pub mod parser;
