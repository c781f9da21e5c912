//! Named argument decoding (ECMA-335 II.23.3).
//!
//! Each named argument in a blob has the layout
//!
//! ```text
//! 0x53 | 0x54          field or property
//! FieldOrPropType      0x02..=0x0E, 0x1D <elem>, 0x50, 0x51, 0x55 <SerString enum name>
//! SerString            name
//! value                encoded per FieldOrPropType
//! ```
//!
//! Values of `object` arguments carry their own `FieldOrPropType` in front of the value. Null
//! strings and types are a single `0xFF`, null arrays have the length `0xFFFF_FFFF`.
//!
//! The decoder reads exactly the requested number of arguments. Any fault aborts the whole
//! sequence; there is no partial result.

use crate::{
    file::parser::Parser,
    metadata::{
        customattributes::types::{
            ArgumentType, ArgumentValue, NamedArgument, MAX_NESTING_DEPTH, SERIALIZATION_TYPE,
        },
        module::ModuleDef,
        typesystem::{GenericParamContext, ResolutionScope, TypeReference, TypeResolver},
    },
    Error, Result,
};

/// Smallest possible encoding of a named argument: kind, type, empty name, one value byte.
const MIN_NAMED_ARGUMENT_SIZE: usize = 4;

/// Decodes `count` named arguments from the current position of `parser`.
///
/// Type names (enum types and `System.Type` values) are resolved with `resolver` against
/// `module`. On success the parser is positioned right after the last argument.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] for truncated or
/// invalid data, [`crate::Error::RecursionLimit`] for values nested deeper than
/// [`MAX_NESTING_DEPTH`], and passes through errors of the resolver.
///
/// # Examples
///
/// ```rust
/// use declsec::{
///     metadata::{
///         customattributes::{parse_named_arguments, ArgumentValue},
///         module::ModuleDef,
///         typesystem::{CustomAttributeResolver, GenericParamContext},
///     },
///     Parser,
/// };
///
/// let module = ModuleDef::builder("Sample.dll").build()?;
/// let blob = [
///     0x54, 0x02, 0x0C, b'U', b'n', b'r', b'e', b's', b't', b'r', b'i', b'c', b't', b'e', b'd',
///     0x01,
/// ];
/// let mut parser = Parser::new(&blob);
///
/// let arguments = parse_named_arguments(
///     &module,
///     &mut parser,
///     1,
///     &GenericParamContext::default(),
///     &CustomAttributeResolver,
/// )?;
/// assert_eq!(arguments[0].name, "Unrestricted");
/// assert_eq!(arguments[0].value, ArgumentValue::Boolean(true));
/// # Ok::<(), declsec::Error>(())
/// ```
pub fn parse_named_arguments(
    module: &ModuleDef,
    parser: &mut Parser<'_>,
    count: u32,
    context: &GenericParamContext,
    resolver: &dyn TypeResolver,
) -> Result<Vec<NamedArgument>> {
    let capacity = (count as usize).min(parser.remaining() / MIN_NAMED_ARGUMENT_SIZE);
    let mut arguments = Vec::with_capacity(capacity);

    let mut reader = NamedArgumentReader {
        module,
        parser,
        context,
        resolver,
    };

    for _ in 0..count {
        arguments.push(reader.read_named_argument()?);
    }

    Ok(arguments)
}

struct NamedArgumentReader<'m, 'p, 'd> {
    module: &'m ModuleDef,
    parser: &'p mut Parser<'d>,
    context: &'m GenericParamContext,
    resolver: &'m dyn TypeResolver,
}

impl NamedArgumentReader<'_, '_, '_> {
    fn read_named_argument(&mut self) -> Result<NamedArgument> {
        let is_field = match self.parser.read_le::<u8>()? {
            SERIALIZATION_TYPE::FIELD => true,
            SERIALIZATION_TYPE::PROPERTY => false,
            other => {
                return Err(malformed_error!(
                    "Invalid field/property indicator: 0x{:02X}",
                    other
                ))
            }
        };

        let arg_type = self.read_type(0)?;
        let name = self.parser.read_ser_string()?.unwrap_or_default();
        let value = self.read_value(&arg_type, 0)?;

        Ok(NamedArgument {
            is_field,
            name,
            arg_type,
            value,
        })
    }

    fn read_type(&mut self, depth: usize) -> Result<ArgumentType> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }

        let tag = self.parser.read_le::<u8>()?;
        if let Some(simple) = ArgumentType::from_simple_tag(tag) {
            return Ok(simple);
        }

        match tag {
            SERIALIZATION_TYPE::SZARRAY => {
                let element = self.read_type(depth + 1)?;
                Ok(ArgumentType::Array(Box::new(element)))
            }
            SERIALIZATION_TYPE::ENUM => {
                let Some(name) = self.parser.read_ser_string()? else {
                    return Err(malformed_error!("Enum type name cannot be null"));
                };
                let enum_type = self.resolver.resolve(self.module, &name, self.context)?;
                Ok(ArgumentType::Enum(enum_type))
            }
            _ => Err(malformed_error!(
                "Unsupported named argument type: 0x{:02X}",
                tag
            )),
        }
    }

    fn read_value(&mut self, arg_type: &ArgumentType, depth: usize) -> Result<ArgumentValue> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }

        let value = match arg_type {
            ArgumentType::Boolean => ArgumentValue::Boolean(self.parser.read_le::<u8>()? != 0),
            ArgumentType::Char => {
                let unit = self.parser.read_le::<u16>()?;
                ArgumentValue::Char(char::from_u32(u32::from(unit)).unwrap_or('\u{FFFD}'))
            }
            ArgumentType::SByte => ArgumentValue::SByte(self.parser.read_le::<i8>()?),
            ArgumentType::Byte => ArgumentValue::Byte(self.parser.read_le::<u8>()?),
            ArgumentType::Int16 => ArgumentValue::Int16(self.parser.read_le::<i16>()?),
            ArgumentType::UInt16 => ArgumentValue::UInt16(self.parser.read_le::<u16>()?),
            ArgumentType::Int32 => ArgumentValue::Int32(self.parser.read_le::<i32>()?),
            ArgumentType::UInt32 => ArgumentValue::UInt32(self.parser.read_le::<u32>()?),
            ArgumentType::Int64 => ArgumentValue::Int64(self.parser.read_le::<i64>()?),
            ArgumentType::UInt64 => ArgumentValue::UInt64(self.parser.read_le::<u64>()?),
            ArgumentType::Single => ArgumentValue::Single(self.parser.read_le::<f32>()?),
            ArgumentType::Double => ArgumentValue::Double(self.parser.read_le::<f64>()?),
            ArgumentType::String => match self.parser.read_ser_string()? {
                Some(value) => ArgumentValue::String(value),
                None => ArgumentValue::Null,
            },
            ArgumentType::Type => match self.parser.read_ser_string()? {
                Some(name) => {
                    ArgumentValue::Type(self.resolver.resolve(self.module, &name, self.context)?)
                }
                None => ArgumentValue::Null,
            },
            ArgumentType::Object => {
                let boxed_type = self.read_type(depth + 1)?;
                let boxed_value = self.read_value(&boxed_type, depth + 1)?;
                ArgumentValue::Boxed(boxed_type, Box::new(boxed_value))
            }
            ArgumentType::Enum(enum_type) => {
                let underlying = self.enum_underlying_type(enum_type);
                let value = self.read_value(&underlying, depth + 1)?;
                ArgumentValue::Enum {
                    enum_type: enum_type.clone(),
                    value: Box::new(value),
                }
            }
            ArgumentType::Array(element) => {
                let length = self.parser.read_le::<u32>()?;
                if length == u32::MAX {
                    return Ok(ArgumentValue::Null);
                }

                let length = length as usize;
                if length > self.parser.remaining() {
                    return Err(malformed_error!(
                        "Array length {} exceeds the {} remaining bytes",
                        length,
                        self.parser.remaining()
                    ));
                }

                let mut elements = Vec::with_capacity(length);
                for _ in 0..length {
                    elements.push(self.read_value(element, depth + 1)?);
                }
                ArgumentValue::Array(elements)
            }
        };

        Ok(value)
    }

    /// The underlying type of an enum defined in this module, `int` for everything else.
    fn enum_underlying_type(&self, enum_type: &TypeReference) -> ArgumentType {
        if let ResolutionScope::Definition(token) = enum_type.scope() {
            let underlying = self
                .module
                .type_definition(*token)
                .and_then(|definition| definition.enum_underlying)
                .and_then(ArgumentType::from_simple_tag)
                .filter(ArgumentType::is_enum_underlying);

            if let Some(underlying) = underlying {
                return underlying;
            }
        }

        ArgumentType::Int32
    }
}
