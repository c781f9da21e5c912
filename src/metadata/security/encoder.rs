//! Permission set encoding for .NET declarative security.
//!
//! The encoder produces the two blob formats understood by
//! [`crate::metadata::security::DeclSecurityReader`]:
//!
//! - [`encode_permission_set`] writes the binary format from [`SecurityAttribute`]s
//! - [`encode_xml_permission_set`] writes a legacy XML document as UTF-16LE
//!
//! Type names are written in their assembly-qualified form when the attribute type was resolved
//! to another assembly, so the blob decodes the same way in any module.
//!
//! # Examples
//!
//! ```rust
//! use declsec::{
//!     metadata::{
//!         customattributes::{ArgumentType, ArgumentValue, NamedArgument},
//!         module::ModuleDef,
//!         security::{encode_permission_set, SecurityAttribute},
//!         typesystem::TypeReference,
//!     },
//!     utils::collections::OrderedList,
//!     DeclSecurityReader,
//! };
//!
//! let attribute = SecurityAttribute::new(
//!     TypeReference::unresolved("Company.AuditAttribute"),
//!     vec![NamedArgument::property(
//!         "Level",
//!         ArgumentType::Int32,
//!         ArgumentValue::Int32(2),
//!     )],
//! );
//!
//! let blob = encode_permission_set(&[attribute])?;
//! assert_eq!(&blob[..2], &[0x2E, 0x01]);
//!
//! let module = ModuleDef::builder("Sample.dll").build()?;
//! let decoded = DeclSecurityReader::read_bytes(&module, &blob)?;
//! assert_eq!(decoded.to_vec()[0].get_argument("Level").unwrap().value, ArgumentValue::Int32(2));
//! # Ok::<(), declsec::Error>(())
//! ```

use crate::{
    file::io::write_compressed_uint,
    metadata::{
        customattributes::{ArgumentType, ArgumentValue, NamedArgument, SERIALIZATION_TYPE},
        security::{reader::BINARY_FORMAT_MARKER, SecurityAttribute},
    },
    Result,
};

/// Encodes attributes in the binary permission set format.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a value does not match its declared type or a length
/// exceeds the compressed integer range.
pub fn encode_permission_set(attributes: &[SecurityAttribute]) -> Result<Vec<u8>> {
    let mut encoder = PermissionSetEncoder::new();
    encoder.encode_permission_set(attributes)
}

/// Encodes an XML permission set document as UTF-16LE.
#[must_use]
pub fn encode_xml_permission_set(xml: &str) -> Vec<u8> {
    xml.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Encoder for binary permission sets.
///
/// The binary format follows this structure:
/// ```text
/// 1. Format marker: '.' (0x2E)
/// 2. Attribute count (compressed integer)
/// 3. For each attribute:
///    - Type name length (compressed integer)
///    - Type name (UTF-8 bytes)
///    - Blob length (compressed integer)
///    - Argument count (compressed integer)
///    - For each argument:
///      - Field (0x53) or property (0x54) marker
///      - FieldOrPropType
///      - Name as SerString
///      - Value
/// ```
#[derive(Debug, Default)]
pub struct PermissionSetEncoder {
    buffer: Vec<u8>,
}

impl PermissionSetEncoder {
    /// Creates a new encoder.
    #[must_use]
    pub fn new() -> Self {
        PermissionSetEncoder { buffer: Vec::new() }
    }

    /// Encodes `attributes` in the binary format.
    ///
    /// # Errors
    /// See [`encode_permission_set`].
    pub fn encode_permission_set(&mut self, attributes: &[SecurityAttribute]) -> Result<Vec<u8>> {
        self.buffer.clear();
        self.buffer.push(BINARY_FORMAT_MARKER);
        write_compressed_uint(to_u32(attributes.len())?, &mut self.buffer)?;

        for attribute in attributes {
            write_ser_string(&attribute.attribute_type().serialized_name(), &mut self.buffer)?;

            let blob = Self::encode_attribute_blob(attribute)?;
            write_compressed_uint(to_u32(blob.len())?, &mut self.buffer)?;
            self.buffer.extend_from_slice(&blob);
        }

        Ok(std::mem::take(&mut self.buffer))
    }

    fn encode_attribute_blob(attribute: &SecurityAttribute) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        write_compressed_uint(to_u32(attribute.named_arguments().len())?, &mut blob)?;

        for argument in attribute.named_arguments() {
            Self::encode_named_argument(argument, &mut blob)?;
        }

        Ok(blob)
    }

    fn encode_named_argument(argument: &NamedArgument, blob: &mut Vec<u8>) -> Result<()> {
        blob.push(if argument.is_field {
            SERIALIZATION_TYPE::FIELD
        } else {
            SERIALIZATION_TYPE::PROPERTY
        });

        Self::encode_argument_type(&argument.arg_type, blob)?;
        write_ser_string(&argument.name, blob)?;
        Self::encode_argument_value(&argument.arg_type, &argument.value, blob)
    }

    fn encode_argument_type(arg_type: &ArgumentType, blob: &mut Vec<u8>) -> Result<()> {
        blob.push(arg_type.tag());

        match arg_type {
            ArgumentType::Enum(enum_type) => write_ser_string(&enum_type.serialized_name(), blob),
            ArgumentType::Array(element) => Self::encode_argument_type(element, blob),
            _ => Ok(()),
        }
    }

    fn encode_argument_value(
        arg_type: &ArgumentType,
        value: &ArgumentValue,
        blob: &mut Vec<u8>,
    ) -> Result<()> {
        match (arg_type, value) {
            (ArgumentType::Boolean, ArgumentValue::Boolean(v)) => blob.push(u8::from(*v)),
            (ArgumentType::Char, ArgumentValue::Char(v)) => {
                let unit = u16::try_from(u32::from(*v))
                    .map_err(|_| malformed_error!("Character {:?} is not a single UTF-16 unit", v))?;
                blob.extend_from_slice(&unit.to_le_bytes());
            }
            (ArgumentType::SByte, ArgumentValue::SByte(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::Byte, ArgumentValue::Byte(v)) => blob.push(*v),
            (ArgumentType::Int16, ArgumentValue::Int16(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::UInt16, ArgumentValue::UInt16(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::Int32, ArgumentValue::Int32(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::UInt32, ArgumentValue::UInt32(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::Int64, ArgumentValue::Int64(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::UInt64, ArgumentValue::UInt64(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::Single, ArgumentValue::Single(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::Double, ArgumentValue::Double(v)) => blob.extend_from_slice(&v.to_le_bytes()),
            (ArgumentType::String, ArgumentValue::String(v)) => write_ser_string(v, blob)?,
            (ArgumentType::Type, ArgumentValue::Type(v)) => {
                write_ser_string(&v.serialized_name(), blob)?;
            }
            (ArgumentType::String | ArgumentType::Type, ArgumentValue::Null) => blob.push(0xFF),
            (ArgumentType::Array(_), ArgumentValue::Null) => {
                blob.extend_from_slice(&u32::MAX.to_le_bytes());
            }
            (ArgumentType::Array(element), ArgumentValue::Array(values)) => {
                blob.extend_from_slice(&to_u32(values.len())?.to_le_bytes());
                for value in values {
                    Self::encode_argument_value(element, value, blob)?;
                }
            }
            (ArgumentType::Object, ArgumentValue::Boxed(boxed_type, boxed_value)) => {
                Self::encode_argument_type(boxed_type, blob)?;
                Self::encode_argument_value(boxed_type, boxed_value, blob)?;
            }
            (ArgumentType::Enum(_), ArgumentValue::Enum { value, .. }) => {
                Self::encode_enum_underlying(value, blob)?;
            }
            _ => {
                return Err(malformed_error!(
                    "Value {:?} does not match argument type {}",
                    value,
                    arg_type
                ))
            }
        }

        Ok(())
    }

    fn encode_enum_underlying(value: &ArgumentValue, blob: &mut Vec<u8>) -> Result<()> {
        match value {
            ArgumentValue::Boolean(v) => blob.push(u8::from(*v)),
            ArgumentValue::Char(v) => {
                let unit = u16::try_from(u32::from(*v))
                    .map_err(|_| malformed_error!("Character {:?} is not a single UTF-16 unit", v))?;
                blob.extend_from_slice(&unit.to_le_bytes());
            }
            ArgumentValue::SByte(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::Byte(v) => blob.push(*v),
            ArgumentValue::Int16(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::UInt16(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::Int32(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::UInt32(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::Int64(v) => blob.extend_from_slice(&v.to_le_bytes()),
            ArgumentValue::UInt64(v) => blob.extend_from_slice(&v.to_le_bytes()),
            other => {
                return Err(malformed_error!(
                    "Enum value must be integral, found {:?}",
                    other
                ))
            }
        }

        Ok(())
    }
}

fn write_ser_string(value: &str, blob: &mut Vec<u8>) -> Result<()> {
    write_compressed_uint(to_u32(value.len())?, blob)?;
    blob.extend_from_slice(value.as_bytes());
    Ok(())
}

fn to_u32(length: usize) -> Result<u32> {
    u32::try_from(length).map_err(|_| malformed_error!("Length {} does not fit in 32 bits", length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            identity::AssemblyIdentity,
            module::{ModuleDef, TypeDefinition},
            security::DeclSecurityReader,
            typesystem::{ResolutionScope, TypeName, TypeReference},
        },
        utils::collections::OrderedList,
    };

    fn corlib_type(name: &str) -> TypeReference {
        TypeReference::new(
            name,
            Some(TypeName::parse(name).unwrap()),
            ResolutionScope::Assembly(AssemblyIdentity::mscorlib()),
            Vec::new(),
        )
    }

    #[test]
    fn test_encode_empty_permission_set() {
        assert_eq!(encode_permission_set(&[]).unwrap(), vec![0x2E, 0x00]);
    }

    #[test]
    fn test_encode_simple_attribute() {
        let attribute = SecurityAttribute::new(
            TypeReference::unresolved("A"),
            vec![NamedArgument::property(
                "Unrestricted",
                ArgumentType::Boolean,
                ArgumentValue::Boolean(true),
            )],
        );

        let mut expected = vec![0x2E, 0x01, 0x01, b'A', 0x10, 0x01, 0x54, 0x02, 0x0C];
        expected.extend_from_slice(b"Unrestricted");
        expected.push(0x01);

        assert_eq!(encode_permission_set(&[attribute]).unwrap(), expected);
    }

    #[test]
    fn test_encode_qualifies_external_types() {
        let attribute = SecurityAttribute::new(
            corlib_type("System.Security.Permissions.SecurityPermissionAttribute"),
            Vec::new(),
        );

        let blob = encode_permission_set(&[attribute]).unwrap();
        let text = String::from_utf8_lossy(&blob);
        assert!(text.contains(
            "System.Security.Permissions.SecurityPermissionAttribute, mscorlib, Version=4.0.0.0"
        ));
    }

    #[test]
    fn test_encode_type_mismatch() {
        let attribute = SecurityAttribute::new(
            TypeReference::unresolved("A"),
            vec![NamedArgument::field(
                "Flags",
                ArgumentType::Int32,
                ArgumentValue::String("x".into()),
            )],
        );
        assert!(encode_permission_set(&[attribute]).is_err());

        let attribute = SecurityAttribute::new(
            TypeReference::unresolved("A"),
            vec![NamedArgument::field(
                "C",
                ArgumentType::Char,
                ArgumentValue::Char('\u{1F600}'),
            )],
        );
        assert!(encode_permission_set(&[attribute]).is_err());
    }

    #[test]
    fn test_round_trip_all_value_kinds() {
        let module = ModuleDef::builder("Sample.dll")
            .type_def(TypeDefinition::new(1, "Sample", "Mode").with_enum_underlying(0x07))
            .build()
            .unwrap();
        let mode = TypeReference::new(
            "Sample.Mode",
            Some(TypeName::parse("Sample.Mode").unwrap()),
            ResolutionScope::Definition(crate::metadata::token::Token(0x0200_0001)),
            Vec::new(),
        );

        let arguments = vec![
            NamedArgument::field("B", ArgumentType::Boolean, ArgumentValue::Boolean(true)),
            NamedArgument::field("C", ArgumentType::Char, ArgumentValue::Char('x')),
            NamedArgument::field("I1", ArgumentType::SByte, ArgumentValue::SByte(-1)),
            NamedArgument::property("I8", ArgumentType::Int64, ArgumentValue::Int64(i64::MIN)),
            NamedArgument::property("U8", ArgumentType::UInt64, ArgumentValue::UInt64(u64::MAX)),
            NamedArgument::property("R4", ArgumentType::Single, ArgumentValue::Single(0.5)),
            NamedArgument::property("S", ArgumentType::String, ArgumentValue::Null),
            NamedArgument::property(
                "Paths",
                ArgumentType::Array(Box::new(ArgumentType::String)),
                ArgumentValue::Array(vec![
                    ArgumentValue::String("a".into()),
                    ArgumentValue::Null,
                ]),
            ),
            NamedArgument::property(
                "Boxed",
                ArgumentType::Object,
                ArgumentValue::Boxed(ArgumentType::UInt32, Box::new(ArgumentValue::UInt32(7))),
            ),
            NamedArgument::property(
                "Mode",
                ArgumentType::Enum(mode.clone()),
                ArgumentValue::Enum {
                    enum_type: mode,
                    value: Box::new(ArgumentValue::UInt16(3)),
                },
            ),
            NamedArgument::property(
                "None",
                ArgumentType::Array(Box::new(ArgumentType::Int32)),
                ArgumentValue::Null,
            ),
        ];

        let attribute = SecurityAttribute::new(
            TypeReference::unresolved("Sample.Unknown"),
            arguments.clone(),
        );
        let blob = encode_permission_set(&[attribute]).unwrap();
        let decoded = DeclSecurityReader::read_bytes(&module, &blob).unwrap().to_vec();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].named_arguments(), arguments.as_slice());
    }

    #[test]
    fn test_encode_xml_permission_set() {
        assert_eq!(
            encode_xml_permission_set("<P/>"),
            vec![b'<', 0, b'P', 0, b'/', 0, b'>', 0]
        );
    }
}
