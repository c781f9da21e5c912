use std::fmt;

use crate::{
    metadata::{
        customattributes::{ArgumentValue, NamedArgument},
        security::{security_classes, SecurityPermissionFlags},
        typesystem::TypeReference,
    },
    utils::collections::List,
};

/// The decoded contents of one declarative security blob, in blob order.
///
/// The collection type follows the `thread-safe` feature, see [`List`].
pub type SecurityAttributeList = List<SecurityAttribute>;

/// One permission attribute of a declarative security blob.
///
/// A `SecurityAttribute` pairs the attribute type, for example
/// `System.Security.Permissions.FileIOPermissionAttribute`, with the field and property
/// assignments applied to it. Legacy XML blobs decode to a single
/// `PermissionSetAttribute` whose `XML` property holds the document.
///
/// # Examples
///
/// ```rust
/// use declsec::metadata::{
///     customattributes::{ArgumentType, ArgumentValue, NamedArgument},
///     security::SecurityAttribute,
///     typesystem::TypeReference,
/// };
///
/// let attribute = SecurityAttribute::new(
///     TypeReference::unresolved("Company.CustomPermissionAttribute"),
///     vec![NamedArgument::property(
///         "Unrestricted",
///         ArgumentType::Boolean,
///         ArgumentValue::Boolean(true),
///     )],
/// );
///
/// assert!(attribute.is_unrestricted());
/// assert_eq!(attribute.type_full_name(), "Company.CustomPermissionAttribute");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityAttribute {
    type_ref: TypeReference,
    named_arguments: Vec<NamedArgument>,
}

impl SecurityAttribute {
    /// Creates a descriptor from an attribute type and its named arguments.
    #[must_use]
    pub fn new(type_ref: TypeReference, named_arguments: Vec<NamedArgument>) -> Self {
        SecurityAttribute {
            type_ref,
            named_arguments,
        }
    }

    /// The attribute type, possibly unresolved.
    #[must_use]
    pub fn attribute_type(&self) -> &TypeReference {
        &self.type_ref
    }

    /// The field and property assignments, in blob order.
    #[must_use]
    pub fn named_arguments(&self) -> &[NamedArgument] {
        &self.named_arguments
    }

    /// Full name of the attribute type.
    #[must_use]
    pub fn type_full_name(&self) -> String {
        self.type_ref.full_name()
    }

    /// The first named argument called `name`.
    #[must_use]
    pub fn get_argument(&self, name: &str) -> Option<&NamedArgument> {
        self.named_arguments.iter().find(|arg| arg.name == name)
    }

    /// Returns `true` for `PermissionSetAttribute`, the wrapper of legacy XML permission sets.
    #[must_use]
    pub fn is_permission_set_attribute(&self) -> bool {
        self.type_full_name() == security_classes::PERMISSION_SET_ATTRIBUTE
    }

    /// Whether the `Unrestricted` property is set to `true`.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.get_argument("Unrestricted")
            .and_then(|arg| arg.value.as_bool())
            .unwrap_or(false)
    }

    /// The XML document of a legacy permission set.
    #[must_use]
    pub fn xml(&self) -> Option<&str> {
        self.get_argument("XML").and_then(|arg| arg.value.as_str())
    }

    /// The `Flags` of a `SecurityPermissionAttribute`.
    ///
    /// Integer, enum and flag-name string values are accepted. Bits without a known flag are
    /// dropped.
    #[must_use]
    pub fn security_flags(&self) -> Option<SecurityPermissionFlags> {
        if self.type_full_name() != security_classes::SECURITY_PERMISSION_ATTRIBUTE {
            return None;
        }

        let value = &self.get_argument("Flags")?.value;
        if let Some(names) = value.as_str() {
            return Some(SecurityPermissionFlags::from_names(names));
        }

        let bits = i32::try_from(value.as_i64()?).ok()?;
        Some(SecurityPermissionFlags::from_bits_truncate(bits))
    }

    /// Paths granted read access by a `FileIOPermissionAttribute`.
    #[must_use]
    pub fn file_read_paths(&self) -> Option<Vec<String>> {
        self.file_paths("Read")
    }

    /// Paths granted write access by a `FileIOPermissionAttribute`.
    #[must_use]
    pub fn file_write_paths(&self) -> Option<Vec<String>> {
        self.file_paths("Write")
    }

    fn file_paths(&self, property: &str) -> Option<Vec<String>> {
        if self.type_full_name() != security_classes::FILE_IO_PERMISSION_ATTRIBUTE {
            return None;
        }

        match &self.get_argument(property)?.value {
            ArgumentValue::String(path) => Some(vec![path.clone()]),
            ArgumentValue::Array(values) => Some(
                values
                    .iter()
                    .filter_map(ArgumentValue::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for SecurityAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_full_name())?;

        for (i, arg) in self.named_arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }

        write!(f, ")")
    }
}
