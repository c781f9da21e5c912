//! Metadata heap streams.
//!
//! Only the `#Blob` heap is modelled; declarative security permission sets are stored there
//! and addressed by the `PermissionSet` column of `DeclSecurity` rows.

mod blob;

pub use blob::{Blob, BlobHeapBuilder, BlobIterator};
