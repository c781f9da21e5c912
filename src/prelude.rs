//! # declsec Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the library. Import it to get quick access to everything needed for decoding
//! declarative security blobs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all declsec operations
pub use crate::Error;

/// The result type used throughout declsec
pub use crate::Result;

/// Low-level binary reader
pub use crate::Parser;

// ================================================================================================
// Module Model
// ================================================================================================

pub use crate::metadata::{
    identity::{AssemblyIdentity, AssemblyVersion},
    module::{ModuleDef, ModuleDefBuilder, TypeDefinition},
    streams::{Blob, BlobHeapBuilder},
    token::Token,
};

// ================================================================================================
// Type Resolution and Named Arguments
// ================================================================================================

pub use crate::metadata::{
    customattributes::{ArgumentType, ArgumentValue, NamedArgument},
    typesystem::{
        CustomAttributeResolver, GenericParamContext, ResolutionScope, TypeName, TypeReference,
        TypeResolver,
    },
};

// ================================================================================================
// Declarative Security
// ================================================================================================

pub use crate::metadata::security::{
    encode_permission_set, encode_xml_permission_set, DeclSecurity, DeclSecurityRaw,
    DeclSecurityReader, SecurityAction, SecurityAttribute, SecurityAttributeList,
    SecurityPermissionFlags, XmlPermissionSet,
};

// ================================================================================================
// Synchronization
// ================================================================================================

pub use crate::utils::{Guarded, List, Lock, LockState, OrderedList};
