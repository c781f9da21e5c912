//! Type references as they appear inside attribute blobs.
//!
//! Declarative security and custom attribute blobs name types textually. This module turns those
//! names into [`TypeReference`]s that record where the type lives relative to the owning
//! module:
//!
//! - [`typename`] parses the reflection type-name notation into a [`TypeName`]
//! - [`resolver`] defines the [`TypeResolver`] seam and the tolerant
//!   [`CustomAttributeResolver`] used by the decoders
//!
//! A failed resolution is not an error. It produces a reference with
//! [`ResolutionScope::Unresolved`] that still carries the original text.

pub mod resolver;
pub mod typename;

pub use resolver::{CustomAttributeResolver, TypeResolver};
pub use typename::{TypeModifier, TypeName, MAX_TYPE_NAME_DEPTH};

use crate::metadata::{identity::AssemblyIdentity, token::Token};

/// Whether a generic parameter belongs to a type or to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParameterKind {
    /// Parameter of the enclosing type, written `!N`
    Type,
    /// Parameter of the enclosing method, written `!!N`
    Method,
}

/// Where a referenced type is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// A `TypeDef` row of the owning module
    Definition(Token),
    /// A type exported by another assembly
    Assembly(AssemblyIdentity),
    /// A generic parameter of the enclosing type or method
    GenericParameter {
        /// Owner of the parameter
        kind: GenericParameterKind,
        /// Zero-based position in the owner's parameter list
        index: u32,
    },
    /// The type could not be located
    Unresolved,
}

/// Generic parameters in scope while resolving a type name.
///
/// The default context is empty, which is correct for blobs attached to non-generic types and
/// methods.
///
/// ```rust
/// use declsec::metadata::typesystem::GenericParamContext;
///
/// let context = GenericParamContext::new(vec!["TKey".into(), "TValue".into()], vec![]);
/// assert_eq!(context.type_parameter_index("TValue"), Some(1));
/// assert!(GenericParamContext::default().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericParamContext {
    /// Names of the enclosing type's generic parameters, in declaration order
    pub type_parameters: Vec<String>,
    /// Names of the enclosing method's generic parameters, in declaration order
    pub method_parameters: Vec<String>,
}

impl GenericParamContext {
    /// Creates a context from type and method parameter names.
    #[must_use]
    pub fn new(type_parameters: Vec<String>, method_parameters: Vec<String>) -> Self {
        Self {
            type_parameters,
            method_parameters,
        }
    }

    /// Returns `true` if no generic parameters are in scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_parameters.is_empty() && self.method_parameters.is_empty()
    }

    /// Position of the type parameter called `name`.
    #[must_use]
    pub fn type_parameter_index(&self, name: &str) -> Option<u32> {
        position(&self.type_parameters, name)
    }

    /// Position of the method parameter called `name`.
    #[must_use]
    pub fn method_parameter_index(&self, name: &str) -> Option<u32> {
        position(&self.method_parameters, name)
    }

    /// Number of parameters of `kind` in scope.
    #[must_use]
    pub fn count(&self, kind: GenericParameterKind) -> usize {
        match kind {
            GenericParameterKind::Type => self.type_parameters.len(),
            GenericParameterKind::Method => self.method_parameters.len(),
        }
    }
}

fn position(names: &[String], name: &str) -> Option<u32> {
    names
        .iter()
        .position(|candidate| candidate == name)
        .and_then(|index| u32::try_from(index).ok())
}

/// A reference to the type named by an attribute blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    raw: String,
    name: Option<TypeName>,
    scope: ResolutionScope,
    generic_arguments: Vec<TypeReference>,
}

impl TypeReference {
    /// Creates a reference from its parts.
    #[must_use]
    pub fn new(
        raw: impl Into<String>,
        name: Option<TypeName>,
        scope: ResolutionScope,
        generic_arguments: Vec<TypeReference>,
    ) -> Self {
        Self {
            raw: raw.into(),
            name,
            scope,
            generic_arguments,
        }
    }

    /// A reference that could not be resolved, keeping the original text.
    #[must_use]
    pub fn unresolved(raw: impl Into<String>) -> Self {
        Self::new(raw, None, ResolutionScope::Unresolved, Vec::new())
    }

    /// A reference to a generic parameter of the enclosing type or method.
    #[must_use]
    pub fn generic_parameter(raw: impl Into<String>, kind: GenericParameterKind, index: u32) -> Self {
        Self::new(
            raw,
            None,
            ResolutionScope::GenericParameter { kind, index },
            Vec::new(),
        )
    }

    /// The type name exactly as it appeared in the blob.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed name, `None` if the text was empty or unparsable.
    #[must_use]
    pub fn type_name(&self) -> Option<&TypeName> {
        self.name.as_ref()
    }

    /// Where the type lives.
    #[must_use]
    pub fn scope(&self) -> &ResolutionScope {
        &self.scope
    }

    /// Resolved generic arguments, in order.
    #[must_use]
    pub fn generic_arguments(&self) -> &[TypeReference] {
        &self.generic_arguments
    }

    /// Returns `true` unless the scope is [`ResolutionScope::Unresolved`].
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self.scope, ResolutionScope::Unresolved)
    }

    /// `Namespace.Name+Nested`, or the raw text when the name could not be parsed.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.name {
            Some(name) => name.full_name(),
            None => self.raw.clone(),
        }
    }

    /// Namespace of the outermost type, empty when unknown.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.name.as_ref().map_or("", |name| name.namespace.as_str())
    }

    /// Innermost simple type name, the raw text when the name could not be parsed.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
            .as_ref()
            .map_or(self.raw.as_str(), TypeName::simple_name)
    }

    /// The textual form to write back into a blob.
    ///
    /// Names that resolved to another assembly are qualified with that assembly's display name
    /// unless the original text already was. Everything else is written as it was read.
    #[must_use]
    pub fn serialized_name(&self) -> String {
        match (&self.scope, &self.name) {
            (ResolutionScope::Assembly(identity), Some(name)) if name.assembly.is_none() => {
                format!("{}, {}", name, identity.display_name())
            }
            _ => self.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference() {
        let reference = TypeReference::unresolved("Some.Missing");
        assert!(!reference.is_resolved());
        assert_eq!(reference.full_name(), "Some.Missing");
        assert_eq!(reference.name(), "Some.Missing");
        assert_eq!(reference.namespace(), "");
        assert_eq!(reference.serialized_name(), "Some.Missing");
    }

    #[test]
    fn test_serialized_name_qualifies_external_types() {
        let name = TypeName::parse("System.Security.Permissions.SecurityAction").unwrap();
        let reference = TypeReference::new(
            "System.Security.Permissions.SecurityAction",
            Some(name),
            ResolutionScope::Assembly(AssemblyIdentity::mscorlib()),
            Vec::new(),
        );

        assert_eq!(
            reference.serialized_name(),
            "System.Security.Permissions.SecurityAction, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
        assert_eq!(reference.name(), "SecurityAction");
        assert_eq!(reference.namespace(), "System.Security.Permissions");
    }

    #[test]
    fn test_context_lookup() {
        let context = GenericParamContext::new(vec!["T".into()], vec!["U".into(), "V".into()]);
        assert_eq!(context.type_parameter_index("T"), Some(0));
        assert_eq!(context.method_parameter_index("V"), Some(1));
        assert_eq!(context.method_parameter_index("T"), None);
        assert_eq!(context.count(GenericParameterKind::Method), 2);
        assert!(!context.is_empty());
    }
}
