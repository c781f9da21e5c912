//! .NET declarative security (Code Access Security) metadata.
//!
//! Types, methods and assemblies carry declarative security through rows of the `DeclSecurity`
//! table. Each row names a [`SecurityAction`] and a permission set blob; the blob lists the
//! permission attributes together with their field and property values.
//!
//! # Key Components
//!
//! - [`DeclSecurityReader`] - decodes a permission set blob into a [`SecurityAttributeList`]
//! - [`SecurityAttribute`] - one permission attribute and its named arguments
//! - [`XmlPermissionSet`] - structured view of a legacy XML permission set
//! - [`encode_permission_set`] / [`encode_xml_permission_set`] - the inverse direction
//! - [`DeclSecurityRaw`] / [`DeclSecurity`] - the table rows binding blobs to their owners
//! - [`SecurityAction`] and [`SecurityPermissionFlags`] - the enumerations used by the format
//!
//! # Usage Examples
//!
//! ```rust
//! use declsec::{
//!     metadata::{module::ModuleDef, security::SecurityPermissionFlags, streams::BlobHeapBuilder},
//!     utils::collections::OrderedList,
//! };
//!
//! // [SecurityPermission(SecurityAction.Demand, Flags = SecurityPermissionFlag.UnmanagedCode)]
//! let mut blob = vec![0x2E, 0x01, 0x37];
//! blob.extend_from_slice(b"System.Security.Permissions.SecurityPermissionAttribute");
//! blob.extend_from_slice(&[0x0D, 0x01, 0x54, 0x08, 0x05]);
//! blob.extend_from_slice(b"Flags");
//! blob.extend_from_slice(&2i32.to_le_bytes());
//!
//! let mut heap = BlobHeapBuilder::new();
//! let index = heap.add(&blob)?;
//! let module = ModuleDef::builder("Legacy.dll").blob_heap(heap.build()).build()?;
//!
//! let attributes = module.read_decl_security(index)?.to_vec();
//! assert_eq!(
//!     attributes[0].security_flags(),
//!     Some(SecurityPermissionFlags::SECURITY_FLAG_UNMANAGED_CODE)
//! );
//! # Ok::<(), declsec::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 22.11 - `DeclSecurity` table
//! - ECMA-335 6th Edition, Partition II, Section 23.3 - Custom attributes

mod attribute;
mod declsecurity;
mod encoder;
mod reader;
mod types;
mod xml;

pub use attribute::{SecurityAttribute, SecurityAttributeList};
pub use declsecurity::{DeclSecurity, DeclSecurityRaw, HasDeclSecurity};
pub use encoder::{encode_permission_set, encode_xml_permission_set, PermissionSetEncoder};
pub use reader::{DeclSecurityReader, BINARY_FORMAT_MARKER};
pub use types::*;
pub use xml::{XmlPermission, XmlPermissionSet};
