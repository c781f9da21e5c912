//! Reflection type-name parsing.
//!
//! Attribute blobs identify types by their textual reflection name rather than by token. This
//! module parses that notation into a structured [`TypeName`]:
//!
//! ```text
//! Namespace.Outer+Inner`1[[Arg, ArgAssembly],Bare]*[], MyAssembly, Version=1.0.0.0
//! ```
//!
//! - `+` separates nested type names
//! - generic arguments follow the name in brackets, each either bracketed and assembly
//!   qualified (`[[...]]`) or bare (`[Arg]`)
//! - `*`, `&`, `[]` and `[,]` append pointer, by-ref, vector and multi-dimensional array
//!   modifiers
//! - `, Assembly...` after the type qualifies it with an assembly display name
//! - `\` escapes any of the special characters `,+&*[]\`
//!
//! Parsing is depth limited through [`MAX_TYPE_NAME_DEPTH`]; crafted names nesting generic
//! arguments deeper than that fail with [`crate::Error::RecursionLimit`].
//!
//! # Examples
//!
//! ```rust
//! use declsec::metadata::typesystem::TypeName;
//!
//! let name = TypeName::parse(
//!     "System.Collections.Generic.List`1[[System.Int32, mscorlib]], mscorlib",
//! )?;
//!
//! assert_eq!(name.namespace, "System.Collections.Generic");
//! assert_eq!(name.name, "List`1");
//! assert_eq!(name.generic_arguments[0].full_name(), "System.Int32");
//! assert_eq!(name.assembly.as_ref().map(|a| a.simple_name()), Some("mscorlib"));
//! # Ok::<(), declsec::Error>(())
//! ```

use std::fmt;

use crate::{metadata::identity::AssemblyIdentity, Error, Result};

/// Maximum nesting of generic arguments inside one type name.
pub const MAX_TYPE_NAME_DEPTH: usize = 64;

const SPECIAL_CHARS: &[char] = &[',', '+', '&', '*', '[', ']', '\\'];

/// A type modifier applied after the type name, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeModifier {
    /// Unmanaged pointer `*`
    Pointer,
    /// Managed reference `&`
    ByRef,
    /// Single-dimensional zero-based array `[]`
    SzArray,
    /// Multi-dimensional array; `[,]` has rank 2, `[*]` rank 1
    Array(u32),
}

/// A parsed reflection type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeName {
    /// Namespace of the outermost type, empty for the global namespace
    pub namespace: String,
    /// Name of the outermost type including any arity suffix such as `` `1 ``
    pub name: String,
    /// Names of nested types, outermost first
    pub nested: Vec<String>,
    /// Generic arguments of the instantiation, empty for non-generic names
    pub generic_arguments: Vec<TypeName>,
    /// Modifiers in the order they appear
    pub modifiers: Vec<TypeModifier>,
    /// Assembly qualification, if present
    pub assembly: Option<AssemblyIdentity>,
}

impl TypeName {
    /// Parse a (possibly assembly-qualified) reflection type name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for syntactically invalid names and
    /// [`crate::Error::RecursionLimit`] if generic arguments nest deeper than
    /// [`MAX_TYPE_NAME_DEPTH`].
    pub fn parse(input: &str) -> Result<TypeName> {
        let mut parser = TypeNameParser { input, position: 0 };

        let name = parser.parse_qualified(0, false)?;
        parser.skip_whitespace();
        if parser.position != input.len() {
            return Err(malformed_error!(
                "Unexpected character at offset {} in type name '{}'",
                parser.position,
                input
            ));
        }

        Ok(name)
    }

    /// `Namespace.Name+Nested` without generic arguments, modifiers or assembly.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut result = String::with_capacity(self.namespace.len() + self.name.len() + 1);
        if !self.namespace.is_empty() {
            push_escaped(&mut result, &self.namespace);
            result.push('.');
        }
        push_escaped(&mut result, &self.name);
        for nested in &self.nested {
            result.push('+');
            push_escaped(&mut result, nested);
        }
        result
    }

    /// The innermost simple name, the nested type name for nested types.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.nested.last().unwrap_or(&self.name)
    }

    /// Returns `true` if this names a generic instantiation.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_arguments.is_empty()
    }

    /// The name with generic arguments and modifiers, followed by the assembly display name
    /// when the name is assembly qualified.
    #[must_use]
    pub fn assembly_qualified_name(&self) -> String {
        match &self.assembly {
            Some(assembly) => format!("{}, {}", self, assembly.display_name()),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for TypeName {
    /// Formats the reflection name with generic arguments and modifiers. Generic arguments
    /// are always written in their bracketed, assembly-qualified form when qualified.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())?;

        if self.is_generic() {
            f.write_str("[")?;
            for (index, argument) in self.generic_arguments.iter().enumerate() {
                if index > 0 {
                    f.write_str(",")?;
                }
                if argument.assembly.is_some() {
                    write!(f, "[{}]", argument.assembly_qualified_name())?;
                } else {
                    write!(f, "{}", argument)?;
                }
            }
            f.write_str("]")?;
        }

        for modifier in &self.modifiers {
            match modifier {
                TypeModifier::Pointer => f.write_str("*")?,
                TypeModifier::ByRef => f.write_str("&")?,
                TypeModifier::SzArray => f.write_str("[]")?,
                TypeModifier::Array(1) => f.write_str("[*]")?,
                TypeModifier::Array(rank) => {
                    f.write_str("[")?;
                    for _ in 1..*rank {
                        f.write_str(",")?;
                    }
                    f.write_str("]")?;
                }
            }
        }

        Ok(())
    }
}

fn push_escaped(target: &mut String, text: &str) {
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            target.push('\\');
        }
        target.push(c);
    }
}

struct TypeNameParser<'a> {
    input: &'a str,
    position: usize,
}

impl TypeNameParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(malformed_error!(
                "Expected '{}' but found '{}' in type name '{}'",
                expected,
                c,
                self.input
            )),
            None => Err(malformed_error!(
                "Expected '{}' at end of type name '{}'",
                expected,
                self.input
            )),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// `TypeSpec [',' Assembly]`; inside brackets the assembly ends at the closing `]`.
    fn parse_qualified(&mut self, depth: usize, bracketed: bool) -> Result<TypeName> {
        if depth > MAX_TYPE_NAME_DEPTH {
            return Err(Error::RecursionLimit(MAX_TYPE_NAME_DEPTH));
        }

        let mut name = self.parse_type_spec(depth)?;

        self.skip_whitespace();
        if self.peek() == Some(',') {
            self.bump();
            let start = self.position;
            while let Some(c) = self.peek() {
                if bracketed && c == ']' {
                    break;
                }
                self.bump();
            }

            let display_name = self.input[start..self.position].trim();
            name.assembly = Some(AssemblyIdentity::parse(display_name)?);
        }

        Ok(name)
    }

    fn parse_type_spec(&mut self, depth: usize) -> Result<TypeName> {
        self.skip_whitespace();

        let (namespace, name) = self.parse_top_level_identifier()?;
        let mut type_name = TypeName {
            namespace,
            name,
            ..TypeName::default()
        };

        while self.peek() == Some('+') {
            self.bump();
            let (_, nested) = self.parse_identifier(false)?;
            type_name.nested.push(nested);
        }

        if self.peek() == Some('[') && !matches!(self.peek_second(), Some(']' | ',' | '*')) {
            type_name.generic_arguments = self.parse_generic_arguments(depth)?;
        }

        loop {
            match self.peek() {
                Some('*') => {
                    self.bump();
                    type_name.modifiers.push(TypeModifier::Pointer);
                }
                Some('&') => {
                    self.bump();
                    type_name.modifiers.push(TypeModifier::ByRef);
                }
                Some('[') => {
                    let modifier = self.parse_array_modifier()?;
                    type_name.modifiers.push(modifier);
                }
                _ => break,
            }
        }

        Ok(type_name)
    }

    fn parse_top_level_identifier(&mut self) -> Result<(String, String)> {
        let (split, text) = self.parse_identifier(true)?;
        match split {
            Some(index) => Ok((text[..index].to_string(), text[index + 1..].to_string())),
            None => Ok((String::new(), text)),
        }
    }

    /// Reads an identifier, returning the unescaped text and the byte offset of its last
    /// unescaped `.` when `split_namespace` is set.
    fn parse_identifier(&mut self, split_namespace: bool) -> Result<(Option<usize>, String)> {
        let mut text = String::new();
        let mut last_dot = None;

        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    let Some(escaped) = self.bump() else {
                        return Err(malformed_error!(
                            "Dangling escape at end of type name '{}'",
                            self.input
                        ));
                    };
                    text.push(escaped);
                }
                ',' | '+' | '&' | '*' | '[' | ']' => break,
                '.' if split_namespace => {
                    last_dot = Some(text.len());
                    text.push(c);
                    self.bump();
                }
                _ => {
                    text.push(c);
                    self.bump();
                }
            }
        }

        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        if text.is_empty() || last_dot.is_some_and(|dot| dot + 1 >= text.len()) {
            return Err(malformed_error!(
                "Missing type name in '{}' at offset {}",
                self.input,
                self.position
            ));
        }

        Ok((last_dot, text))
    }

    fn parse_generic_arguments(&mut self, depth: usize) -> Result<Vec<TypeName>> {
        self.expect('[')?;
        let mut arguments = Vec::new();

        loop {
            self.skip_whitespace();
            let argument = if self.peek() == Some('[') {
                self.bump();
                let argument = self.parse_qualified(depth + 1, true)?;
                self.skip_whitespace();
                self.expect(']')?;
                argument
            } else {
                if depth + 1 > MAX_TYPE_NAME_DEPTH {
                    return Err(Error::RecursionLimit(MAX_TYPE_NAME_DEPTH));
                }
                self.parse_type_spec(depth + 1)?
            };
            arguments.push(argument);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                _ => {
                    return Err(malformed_error!(
                        "Unterminated generic argument list in '{}'",
                        self.input
                    ))
                }
            }
        }

        Ok(arguments)
    }

    fn parse_array_modifier(&mut self) -> Result<TypeModifier> {
        self.expect('[')?;
        match self.peek() {
            Some(']') => {
                self.bump();
                Ok(TypeModifier::SzArray)
            }
            Some('*') => {
                self.bump();
                self.expect(']')?;
                Ok(TypeModifier::Array(1))
            }
            _ => {
                let mut rank = 1u32;
                while self.peek() == Some(',') {
                    self.bump();
                    rank = rank.saturating_add(1);
                }
                self.expect(']')?;
                Ok(TypeModifier::Array(rank))
            }
        }
    }
}
