//! Named field and property arguments of attribute blobs.
//!
//! Binary permission sets reuse the `NamedArg` grammar of custom attribute blobs
//! (ECMA-335 II.23.3) for the properties of each permission attribute. This module holds the
//! decoded representation and the decoder:
//!
//! - [`ArgumentType`] - the declared `FieldOrPropType` of an argument
//! - [`ArgumentValue`] - the decoded value, including boxed `object` values and nulls
//! - [`NamedArgument`] - one field or property assignment
//! - [`parse_named_arguments`] - decodes a counted sequence of arguments
//!
//! # Examples
//!
//! ```rust
//! use declsec::{
//!     metadata::{
//!         customattributes::{parse_named_arguments, ArgumentType},
//!         module::ModuleDef,
//!         typesystem::{CustomAttributeResolver, GenericParamContext},
//!     },
//!     Parser,
//! };
//!
//! let module = ModuleDef::builder("Sample.dll").build()?;
//! let blob = [0x53, 0x08, 0x05, b'F', b'l', b'a', b'g', b's', 0x02, 0x00, 0x00, 0x00];
//! let mut parser = Parser::new(&blob);
//!
//! let arguments = parse_named_arguments(
//!     &module,
//!     &mut parser,
//!     1,
//!     &GenericParamContext::default(),
//!     &CustomAttributeResolver,
//! )?;
//! assert!(arguments[0].is_field);
//! assert_eq!(arguments[0].arg_type, ArgumentType::Int32);
//! assert_eq!(arguments[0].value.as_i64(), Some(2));
//! # Ok::<(), declsec::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.3 - Custom Attributes

mod parser;
mod types;

pub use parser::parse_named_arguments;
pub use types::*;
