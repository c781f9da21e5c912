//! Metadata decoding for .NET declarative security.
//!
//! The modules build on each other, leaves first:
//!
//! - [`token`] - metadata table row references
//! - [`streams`] - the `#Blob` heap
//! - [`identity`] - assembly display names
//! - [`module`] - the owning module of decoded blobs and its resolved-type cache
//! - [`typesystem`] - reflection type names and their resolution against a module
//! - [`customattributes`] - named field and property arguments
//! - [`security`] - permission set blobs, their encoder and the `DeclSecurity` table rows

pub mod customattributes;
pub mod identity;
pub mod module;
pub mod security;
pub mod streams;
pub mod token;
pub mod typesystem;
