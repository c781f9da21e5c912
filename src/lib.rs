// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'utils/synchronization.rs' shares the guarded value through an `UnsafeCell`

//! # declsec
//!
//! A defensive decoder for the declarative security (`DeclSecurity`) metadata of .NET
//! assemblies.
//!
//! Types, methods and assemblies compiled against the .NET Framework can carry Code Access
//! Security declarations such as `[SecurityPermission(SecurityAction.Demand, UnmanagedCode =
//! true)]`. The compiler stores them as permission set blobs in the `#Blob` heap. `declsec`
//! turns such a blob into an ordered list of [`metadata::security::SecurityAttribute`]s, each
//! naming the permission attribute type and its field and property values.
//!
//! ## Features
//!
//! - **Both blob formats** - the binary format of .NET 2.0+ and the UTF-16 XML format of .NET 1.x
//! - **Hostile input** - every read is bounds checked; malformed blobs decode to an empty list
//!   instead of a partial one
//! - **Type resolution** - attribute type names are resolved against the owning module with the
//!   runtime's custom-attribute search rules
//! - **Concurrent decoding** - with the default `thread-safe` feature, one module can be decoded
//!   from many threads; its shared caches sit behind a non-reentrant [`Lock`]
//! - **Round trips** - an encoder writes both formats back
//!
//! ## Quick Start
//!
//! ```rust
//! use declsec::{
//!     metadata::{module::ModuleDef, streams::BlobHeapBuilder},
//!     utils::collections::OrderedList,
//! };
//!
//! // [FileIOPermission(SecurityAction.Demand, Read = "C:\\Data")]
//! let mut blob = vec![0x2E, 0x01, 0x35];
//! blob.extend_from_slice(b"System.Security.Permissions.FileIOPermissionAttribute");
//! blob.extend_from_slice(&[0x10, 0x01, 0x54, 0x0E, 0x04, b'R', b'e', b'a', b'd', 0x07]);
//! blob.extend_from_slice(b"C:\\Data");
//!
//! let mut heap = BlobHeapBuilder::new();
//! let index = heap.add(&blob)?;
//! let module = ModuleDef::builder("Legacy.dll").blob_heap(heap.build()).build()?;
//!
//! let attributes = module.read_decl_security(index)?.to_vec();
//! assert_eq!(attributes[0].file_read_paths(), Some(vec!["C:\\Data".to_string()]));
//! # Ok::<(), declsec::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - the bounds-checked [`Parser`] and primitive / compressed integer IO
//! - [`metadata`] - tokens, blob heap, module model, type resolution, named arguments and the
//!   security decoder itself
//! - [`utils`] - the reentrancy-checking [`Lock`], the [`Guarded`] cell and the build-selected
//!   result lists
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! Decoding never fails because of bad input. The decoder reports [`Error`]s only for lock
//! contract violations (see [`Error::is_lock_violation`]); everything else is logged through the
//! [`log`](https://docs.rs/log) facade at `debug` level and yields an empty list.
//!
//! ## Cargo Features
//!
//! - `thread-safe` (default) - [`utils::collections::List`] is a [`utils::LockedList`] and
//!   [`Guarded`] is backed by [`Lock`]. Without it both degrade to their single-threaded forms.
//!
//! ## Fuzzing
//!
//! A `cargo-fuzz` target feeds arbitrary bytes to the decoder:
//!
//! ```bash
//! cargo +nightly fuzz run declsecurity
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Binary input handling
///
/// - [`file::parser::Parser`] - cursor over a byte slice with bounds-checked reads
/// - [`file::io`] - little-endian primitive reads and the compressed integer codec
pub mod file;

/// Decoding of .NET metadata needed for declarative security
///
/// # Key Components
///
/// - [`metadata::security`] - permission set blob decoder, encoder and `DeclSecurity` rows
/// - [`metadata::customattributes`] - named field and property arguments
/// - [`metadata::typesystem`] - type names and their resolution
/// - [`metadata::module`] - the owning module of decoded blobs
/// - [`metadata::streams`] - the `#Blob` heap
/// - [`metadata::identity`] - assembly display names
/// - [`metadata::token`] - metadata tokens
pub mod metadata;

/// Synchronization primitives and collections
pub mod utils;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use declsec::prelude::*;
///
/// let module = ModuleDef::builder("Sample.dll").build()?;
/// assert!(DeclSecurityReader::read_bytes(&module, &[0x2E, 0x00])?.is_empty());
/// # Ok::<(), declsec::Error>(())
/// ```
pub mod prelude;

/// `declsec` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `declsec` Error type
///
/// # Examples
///
/// ```rust
/// use declsec::{Error, Parser};
///
/// let mut parser = Parser::new(&[0xE0]);
/// match parser.read_compressed_uint() {
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub use error::Error;

/// Bounds-checked binary reader, see [`file::parser::Parser`].
pub use file::parser::Parser;

/// Permission set blob decoder, see [`metadata::security::DeclSecurityReader`].
pub use metadata::security::DeclSecurityReader;

/// Non-reentrant lock and the cell built on it, see [`utils::synchronization`].
pub use utils::synchronization::{Guarded, Lock};
