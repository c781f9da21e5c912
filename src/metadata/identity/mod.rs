//! Assembly identities referenced from metadata.

mod assembly;

pub use assembly::{AssemblyIdentity, AssemblyVersion, FRAMEWORK_PUBLIC_KEY_TOKEN};
