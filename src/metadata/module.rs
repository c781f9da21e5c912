//! The owning module of decoded blobs.
//!
//! [`ModuleDef`] carries the subset of a loaded .NET module that blob decoding depends on:
//!
//! - the module's own assembly identity and its core library
//! - the `TypeDef` rows (namespace, name, enclosing type, enum underlying type)
//! - the `AssemblyRef` rows
//! - the `#Blob` heap
//! - a cache of resolved type names, shared by every decoder working on the module
//!
//! The cache is the only mutable state and lives in a [`Guarded`] cell, so a `ModuleDef` can be
//! shared by reference between threads decoding different blobs in the `thread-safe` build.
//!
//! # Examples
//!
//! ```rust
//! use declsec::metadata::{
//!     identity::AssemblyIdentity,
//!     module::{ModuleDef, TypeDefinition},
//!     streams::BlobHeapBuilder,
//! };
//! use declsec::utils::collections::OrderedList;
//!
//! let mut heap = BlobHeapBuilder::new();
//! let index = heap.add(&[0x2E, 0x00])?;
//!
//! let module = ModuleDef::builder("Sample.dll")
//!     .assembly(AssemblyIdentity::parse("Sample, Version=1.0.0.0")?)
//!     .type_def(TypeDefinition::new(1, "Sample", "Program"))
//!     .blob_heap(heap.build())
//!     .build()?;
//!
//! assert!(module.read_decl_security(index)?.is_empty());
//! # Ok::<(), declsec::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    metadata::{
        identity::AssemblyIdentity,
        security::{DeclSecurityReader, SecurityAttributeList},
        streams::Blob,
        token::Token,
        typesystem::{TypeName, TypeReference},
    },
    utils::synchronization::Guarded,
    Result,
};

/// One row of the module's `TypeDef` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// `TypeDef` token of this row
    pub token: Token,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Enclosing type for nested types
    pub declaring_type: Option<Token>,
    /// `ELEMENT_TYPE` of the `value__` field when this type is an enum
    pub enum_underlying: Option<u8>,
}

impl TypeDefinition {
    /// Creates a top-level type definition for `TypeDef` row `rid`.
    pub fn new(rid: u32, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token: Token::from_parts(Token::TYPE_DEF, rid),
            namespace: namespace.into(),
            name: name.into(),
            declaring_type: None,
            enum_underlying: None,
        }
    }

    /// Marks this type as nested inside `declaring_type`.
    #[must_use]
    pub fn nested_in(mut self, declaring_type: Token) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    /// Marks this type as an enum with the given underlying `ELEMENT_TYPE`.
    #[must_use]
    pub fn with_enum_underlying(mut self, element_type: u8) -> Self {
        self.enum_underlying = Some(element_type);
        self
    }
}

/// Upper bound on the number of names held by a module's type cache.
pub const MAX_CACHED_TYPES: usize = 4096;

/// The decoding view of a .NET module.
pub struct ModuleDef {
    name: String,
    assembly: Option<AssemblyIdentity>,
    corlib: AssemblyIdentity,
    types: Vec<TypeDefinition>,
    assembly_refs: Vec<AssemblyIdentity>,
    blob_heap: Vec<u8>,
    type_cache: Guarded<HashMap<String, TypeReference>>,
}

impl ModuleDef {
    /// Starts building a module called `name`.
    pub fn builder(name: impl Into<String>) -> ModuleDefBuilder {
        ModuleDefBuilder {
            name: name.into(),
            assembly: None,
            corlib: None,
            types: Vec::new(),
            assembly_refs: Vec::new(),
            blob_heap: vec![0],
        }
    }

    /// Module name, usually the file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the assembly this module belongs to, `None` for netmodules.
    #[must_use]
    pub fn assembly(&self) -> Option<&AssemblyIdentity> {
        self.assembly.as_ref()
    }

    /// Identity of the core library the module was compiled against.
    #[must_use]
    pub fn corlib(&self) -> &AssemblyIdentity {
        &self.corlib
    }

    /// All `TypeDef` rows.
    #[must_use]
    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// All `AssemblyRef` rows.
    #[must_use]
    pub fn assembly_refs(&self) -> &[AssemblyIdentity] {
        &self.assembly_refs
    }

    /// Looks up a `TypeDef` row by token.
    #[must_use]
    pub fn type_definition(&self, token: Token) -> Option<&TypeDefinition> {
        if !token.is_table(Token::TYPE_DEF) {
            return None;
        }
        self.types.iter().find(|definition| definition.token == token)
    }

    /// Finds the type a parsed name refers to among this module's definitions.
    ///
    /// Nested names are followed through the enclosing-type links, one level per `+`.
    #[must_use]
    pub fn find_type(&self, name: &TypeName) -> Option<Token> {
        let mut current = self
            .types
            .iter()
            .find(|definition| {
                definition.declaring_type.is_none()
                    && definition.namespace == name.namespace
                    && definition.name == name.name
            })?
            .token;

        for nested in &name.nested {
            current = self
                .types
                .iter()
                .find(|definition| {
                    definition.declaring_type == Some(current) && definition.name == *nested
                })?
                .token;
        }

        Some(current)
    }

    /// Finds an `AssemblyRef` with the same simple name as `identity`.
    #[must_use]
    pub fn find_assembly_ref(&self, identity: &AssemblyIdentity) -> Option<&AssemblyIdentity> {
        self.assembly_refs
            .iter()
            .find(|candidate| candidate.same_simple_name(identity))
    }

    /// The referenced assembly called `name`, or its .NET Framework identity when the module
    /// does not reference it explicitly.
    #[must_use]
    pub fn framework_assembly(&self, name: &str) -> AssemblyIdentity {
        self.assembly_refs
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| AssemblyIdentity::framework(name))
    }

    /// A view of the `#Blob` heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with the null blob.
    pub fn blob(&self) -> Result<Blob<'_>> {
        Blob::from(&self.blob_heap)
    }

    /// Decodes the declarative security blob at `index` of the `#Blob` heap.
    ///
    /// See [`DeclSecurityReader::read_blob`].
    ///
    /// # Errors
    /// Only lock contract violations are returned; undecodable blobs yield an empty list.
    pub fn read_decl_security(&self, index: u32) -> Result<SecurityAttributeList> {
        DeclSecurityReader::read_blob(self, index)
    }

    /// Cached resolution of `name`, if any.
    ///
    /// # Errors
    /// Returns a lock error if called while the cache is held by the current thread.
    pub fn cached_type(&self, name: &str) -> Result<Option<TypeReference>> {
        self.type_cache.read(|cache| cache.get(name).cloned())
    }

    /// Stores the resolution of `name`. An existing entry is kept, and nothing new is stored
    /// once the cache holds [`MAX_CACHED_TYPES`] names.
    ///
    /// # Errors
    /// Returns a lock error if called while the cache is held by the current thread.
    pub fn cache_type(&self, name: &str, reference: TypeReference) -> Result<()> {
        self.type_cache.write(|cache| {
            if cache.len() < MAX_CACHED_TYPES && !cache.contains_key(name) {
                cache.insert(name.to_string(), reference);
            }
        })
    }

    /// Number of cached resolutions.
    ///
    /// # Errors
    /// Returns a lock error if called while the cache is held by the current thread.
    pub fn cached_type_count(&self) -> Result<usize> {
        self.type_cache.read(HashMap::len)
    }
}

/// Builder for [`ModuleDef`].
#[derive(Debug, Clone)]
pub struct ModuleDefBuilder {
    name: String,
    assembly: Option<AssemblyIdentity>,
    corlib: Option<AssemblyIdentity>,
    types: Vec<TypeDefinition>,
    assembly_refs: Vec<AssemblyIdentity>,
    blob_heap: Vec<u8>,
}

impl ModuleDefBuilder {
    /// Sets the module's own assembly identity.
    #[must_use]
    pub fn assembly(mut self, identity: AssemblyIdentity) -> Self {
        self.assembly = Some(identity);
        self
    }

    /// Sets the core library; `mscorlib` 4.0.0.0 when not set.
    #[must_use]
    pub fn corlib(mut self, identity: AssemblyIdentity) -> Self {
        self.corlib = Some(identity);
        self
    }

    /// Adds a `TypeDef` row.
    #[must_use]
    pub fn type_def(mut self, definition: TypeDefinition) -> Self {
        self.types.push(definition);
        self
    }

    /// Adds an `AssemblyRef` row.
    #[must_use]
    pub fn assembly_ref(mut self, identity: AssemblyIdentity) -> Self {
        self.assembly_refs.push(identity);
        self
    }

    /// Sets the raw `#Blob` heap.
    #[must_use]
    pub fn blob_heap(mut self, heap: Vec<u8>) -> Self {
        self.blob_heap = heap;
        self
    }

    /// Validates the parts and builds the module.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid blob heap, a `TypeDef` token outside
    /// the `TypeDef` table, a duplicate token, or an enclosing type that does not exist.
    pub fn build(self) -> Result<ModuleDef> {
        Blob::from(&self.blob_heap)?;

        for (index, definition) in self.types.iter().enumerate() {
            if !definition.token.is_table(Token::TYPE_DEF) || definition.token.row() == 0 {
                return Err(malformed_error!(
                    "Invalid TypeDef token {} for '{}'",
                    definition.token,
                    definition.name
                ));
            }

            if self.types[..index]
                .iter()
                .any(|other| other.token == definition.token)
            {
                return Err(malformed_error!(
                    "Duplicate TypeDef token {}",
                    definition.token
                ));
            }

            if let Some(declaring) = definition.declaring_type {
                if !self.types.iter().any(|other| other.token == declaring) {
                    return Err(malformed_error!(
                        "Enclosing type {} of '{}' does not exist",
                        declaring,
                        definition.name
                    ));
                }
            }
        }

        Ok(ModuleDef {
            name: self.name,
            assembly: self.assembly,
            corlib: self.corlib.unwrap_or_else(AssemblyIdentity::mscorlib),
            types: self.types,
            assembly_refs: self.assembly_refs,
            blob_heap: self.blob_heap,
            type_cache: Guarded::new(HashMap::new()),
        })
    }
}
