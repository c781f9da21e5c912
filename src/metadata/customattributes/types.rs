//! Named argument types and values (ECMA-335 II.23.3).
//!
//! These types describe the `NamedArg` entries that follow every attribute reference in a
//! binary permission set, and the same grammar used by custom attribute blobs.

use std::fmt;

use crate::metadata::typesystem::TypeReference;

/// Maximum nesting of boxed values and array element types inside one named argument.
///
/// Decoding recurses once per level, so the limit has to stay well within the default
/// 2 MiB stack of spawned threads.
pub const MAX_NESTING_DEPTH: usize = 50;

/// `FieldOrPropType` and value tags used in named argument blobs.
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

/// The declared type of a named argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgumentType {
    /// `bool`
    Boolean,
    /// `char`, UTF-16 code unit
    Char,
    /// `sbyte`
    SByte,
    /// `byte`
    Byte,
    /// `short`
    Int16,
    /// `ushort`
    UInt16,
    /// `int`
    Int32,
    /// `uint`
    UInt32,
    /// `long`
    Int64,
    /// `ulong`
    UInt64,
    /// `float`
    Single,
    /// `double`
    Double,
    /// `string`, may be null
    String,
    /// `System.Type`, serialized as a type name
    Type,
    /// `object`, each value carries its own type tag
    Object,
    /// An enum, identified by its type
    Enum(TypeReference),
    /// A single-dimensional array of the element type
    Array(Box<ArgumentType>),
}

impl ArgumentType {
    /// Maps a primitive or string tag to its type; `None` for anything needing more data.
    #[must_use]
    pub fn from_simple_tag(tag: u8) -> Option<ArgumentType> {
        Some(match tag {
            SERIALIZATION_TYPE::BOOLEAN => ArgumentType::Boolean,
            SERIALIZATION_TYPE::CHAR => ArgumentType::Char,
            SERIALIZATION_TYPE::I1 => ArgumentType::SByte,
            SERIALIZATION_TYPE::U1 => ArgumentType::Byte,
            SERIALIZATION_TYPE::I2 => ArgumentType::Int16,
            SERIALIZATION_TYPE::U2 => ArgumentType::UInt16,
            SERIALIZATION_TYPE::I4 => ArgumentType::Int32,
            SERIALIZATION_TYPE::U4 => ArgumentType::UInt32,
            SERIALIZATION_TYPE::I8 => ArgumentType::Int64,
            SERIALIZATION_TYPE::U8 => ArgumentType::UInt64,
            SERIALIZATION_TYPE::R4 => ArgumentType::Single,
            SERIALIZATION_TYPE::R8 => ArgumentType::Double,
            SERIALIZATION_TYPE::STRING => ArgumentType::String,
            SERIALIZATION_TYPE::TYPE => ArgumentType::Type,
            SERIALIZATION_TYPE::TAGGED_OBJECT => ArgumentType::Object,
            _ => return None,
        })
    }

    /// The leading tag byte of this type's serialized form.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            ArgumentType::Boolean => SERIALIZATION_TYPE::BOOLEAN,
            ArgumentType::Char => SERIALIZATION_TYPE::CHAR,
            ArgumentType::SByte => SERIALIZATION_TYPE::I1,
            ArgumentType::Byte => SERIALIZATION_TYPE::U1,
            ArgumentType::Int16 => SERIALIZATION_TYPE::I2,
            ArgumentType::UInt16 => SERIALIZATION_TYPE::U2,
            ArgumentType::Int32 => SERIALIZATION_TYPE::I4,
            ArgumentType::UInt32 => SERIALIZATION_TYPE::U4,
            ArgumentType::Int64 => SERIALIZATION_TYPE::I8,
            ArgumentType::UInt64 => SERIALIZATION_TYPE::U8,
            ArgumentType::Single => SERIALIZATION_TYPE::R4,
            ArgumentType::Double => SERIALIZATION_TYPE::R8,
            ArgumentType::String => SERIALIZATION_TYPE::STRING,
            ArgumentType::Type => SERIALIZATION_TYPE::TYPE,
            ArgumentType::Object => SERIALIZATION_TYPE::TAGGED_OBJECT,
            ArgumentType::Enum(_) => SERIALIZATION_TYPE::ENUM,
            ArgumentType::Array(_) => SERIALIZATION_TYPE::SZARRAY,
        }
    }

    /// Returns `true` for the integral types an enum can be based on.
    #[must_use]
    pub fn is_enum_underlying(&self) -> bool {
        matches!(
            self,
            ArgumentType::Boolean
                | ArgumentType::Char
                | ArgumentType::SByte
                | ArgumentType::Byte
                | ArgumentType::Int16
                | ArgumentType::UInt16
                | ArgumentType::Int32
                | ArgumentType::UInt32
                | ArgumentType::Int64
                | ArgumentType::UInt64
        )
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::Boolean => f.write_str("bool"),
            ArgumentType::Char => f.write_str("char"),
            ArgumentType::SByte => f.write_str("sbyte"),
            ArgumentType::Byte => f.write_str("byte"),
            ArgumentType::Int16 => f.write_str("short"),
            ArgumentType::UInt16 => f.write_str("ushort"),
            ArgumentType::Int32 => f.write_str("int"),
            ArgumentType::UInt32 => f.write_str("uint"),
            ArgumentType::Int64 => f.write_str("long"),
            ArgumentType::UInt64 => f.write_str("ulong"),
            ArgumentType::Single => f.write_str("float"),
            ArgumentType::Double => f.write_str("double"),
            ArgumentType::String => f.write_str("string"),
            ArgumentType::Type => f.write_str("System.Type"),
            ArgumentType::Object => f.write_str("object"),
            ArgumentType::Enum(enum_type) => f.write_str(&enum_type.full_name()),
            ArgumentType::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// A decoded named argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// `bool`
    Boolean(bool),
    /// `char`; unpaired surrogates decode to U+FFFD
    Char(char),
    /// `sbyte`
    SByte(i8),
    /// `byte`
    Byte(u8),
    /// `short`
    Int16(i16),
    /// `ushort`
    UInt16(u16),
    /// `int`
    Int32(i32),
    /// `uint`
    UInt32(u32),
    /// `long`
    Int64(i64),
    /// `ulong`
    UInt64(u64),
    /// `float`
    Single(f32),
    /// `double`
    Double(f64),
    /// Non-null string
    String(String),
    /// Non-null `System.Type`
    Type(TypeReference),
    /// Enum value stored as its underlying integral value
    Enum {
        /// The enum type
        enum_type: TypeReference,
        /// The underlying value
        value: Box<ArgumentValue>,
    },
    /// Non-null array
    Array(Vec<ArgumentValue>),
    /// A value of an `object` argument, with the type it was tagged with
    Boxed(ArgumentType, Box<ArgumentValue>),
    /// Null string, type or array
    Null,
}

impl ArgumentValue {
    /// The value as `bool`, looking through boxing.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgumentValue::Boolean(value) => Some(*value),
            ArgumentValue::Boxed(_, inner) => inner.as_bool(),
            _ => None,
        }
    }

    /// The value as `i64` for every integral value, looking through enums and boxing.
    ///
    /// `ulong` values above `i64::MAX` return `None`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgumentValue::SByte(value) => Some(i64::from(*value)),
            ArgumentValue::Byte(value) => Some(i64::from(*value)),
            ArgumentValue::Int16(value) => Some(i64::from(*value)),
            ArgumentValue::UInt16(value) => Some(i64::from(*value)),
            ArgumentValue::Int32(value) => Some(i64::from(*value)),
            ArgumentValue::UInt32(value) => Some(i64::from(*value)),
            ArgumentValue::Int64(value) => Some(*value),
            ArgumentValue::UInt64(value) => i64::try_from(*value).ok(),
            ArgumentValue::Enum { value, .. } | ArgumentValue::Boxed(_, value) => value.as_i64(),
            _ => None,
        }
    }

    /// The value as a string slice, looking through boxing.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgumentValue::String(value) => Some(value),
            ArgumentValue::Boxed(_, inner) => inner.as_str(),
            _ => None,
        }
    }

    /// Returns `true` for [`ArgumentValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ArgumentValue::Null)
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Boolean(value) => write!(f, "{}", value),
            ArgumentValue::Char(value) => write!(f, "'{}'", value),
            ArgumentValue::SByte(value) => write!(f, "{}", value),
            ArgumentValue::Byte(value) => write!(f, "{}", value),
            ArgumentValue::Int16(value) => write!(f, "{}", value),
            ArgumentValue::UInt16(value) => write!(f, "{}", value),
            ArgumentValue::Int32(value) => write!(f, "{}", value),
            ArgumentValue::UInt32(value) => write!(f, "{}", value),
            ArgumentValue::Int64(value) => write!(f, "{}", value),
            ArgumentValue::UInt64(value) => write!(f, "{}", value),
            ArgumentValue::Single(value) => write!(f, "{}", value),
            ArgumentValue::Double(value) => write!(f, "{}", value),
            ArgumentValue::String(value) => write!(f, "\"{}\"", value),
            ArgumentValue::Type(value) => write!(f, "typeof({})", value.full_name()),
            ArgumentValue::Enum { enum_type, value } => {
                write!(f, "({}){}", enum_type.full_name(), value)
            }
            ArgumentValue::Array(values) => {
                f.write_str("{")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("}")
            }
            ArgumentValue::Boxed(_, value) => write!(f, "{}", value),
            ArgumentValue::Null => f.write_str("null"),
        }
    }
}

/// A field or property assignment attached to an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// `true` for a field (`0x53`), `false` for a property (`0x54`)
    pub is_field: bool,
    /// Field or property name
    pub name: String,
    /// Declared type
    pub arg_type: ArgumentType,
    /// Assigned value
    pub value: ArgumentValue,
}

impl NamedArgument {
    /// Creates a property assignment.
    pub fn property(name: impl Into<String>, arg_type: ArgumentType, value: ArgumentValue) -> Self {
        Self {
            is_field: false,
            name: name.into(),
            arg_type,
            value,
        }
    }

    /// Creates a field assignment.
    pub fn field(name: impl Into<String>, arg_type: ArgumentType, value: ArgumentValue) -> Self {
        Self {
            is_field: true,
            name: name.into(),
            arg_type,
            value,
        }
    }
}

impl fmt::Display for NamedArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for tag in (0x02..=0x0E).chain([0x50, 0x51]) {
            let arg_type = ArgumentType::from_simple_tag(tag).unwrap();
            assert_eq!(arg_type.tag(), tag);
        }

        assert!(ArgumentType::from_simple_tag(0x1D).is_none());
        assert!(ArgumentType::from_simple_tag(0x55).is_none());
        assert!(ArgumentType::from_simple_tag(0x01).is_none());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(ArgumentValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(
            ArgumentValue::Boxed(ArgumentType::Int32, Box::new(ArgumentValue::Int32(-4))).as_i64(),
            Some(-4)
        );
        assert_eq!(
            ArgumentValue::Enum {
                enum_type: TypeReference::unresolved("E"),
                value: Box::new(ArgumentValue::Byte(3)),
            }
            .as_i64(),
            Some(3)
        );
        assert_eq!(ArgumentValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(ArgumentValue::String("x".into()).as_str(), Some("x"));
        assert!(ArgumentValue::Null.is_null());
    }

    #[test]
    fn test_display() {
        let argument = NamedArgument::property(
            "Paths",
            ArgumentType::Array(Box::new(ArgumentType::String)),
            ArgumentValue::Array(vec![
                ArgumentValue::String("C:\\a".into()),
                ArgumentValue::Null,
            ]),
        );

        assert_eq!(argument.to_string(), "Paths = {\"C:\\a\", null}");
        assert_eq!(argument.arg_type.to_string(), "string[]");
        assert!(!argument.is_field);
    }
}
