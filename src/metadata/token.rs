//! Metadata token implementation.
//!
//! A [`crate::metadata::token::Token`] is a 32-bit value that addresses a row in a metadata
//! table. The high byte carries the table identifier, the low 24 bits the 1-based row index.
//!
//! ```text
//! 31      24 23                    0
//! +--------+------------------------+
//! | Table  |          RID           |
//! +--------+------------------------+
//! ```
//!
//! Only the tables that take part in declarative security have named constants here: the
//! three possible `DeclSecurity` parents, the `AssemblyRef` table used by resolution scopes,
//! and the `DeclSecurity` table itself.
//!
//! # Examples
//!
//! ```rust
//! use declsec::metadata::token::Token;
//!
//! let token = Token::from_parts(Token::TYPE_DEF, 5);
//! assert_eq!(token.value(), 0x0200_0005);
//! assert_eq!(token.row(), 5);
//! assert!(token.is_table(Token::TYPE_DEF));
//! ```

use std::fmt;

/// A metadata token addressing one row of one metadata table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Table identifier of `TypeDef`.
    pub const TYPE_DEF: u8 = 0x02;
    /// Table identifier of `MethodDef`.
    pub const METHOD_DEF: u8 = 0x06;
    /// Table identifier of `DeclSecurity`.
    pub const DECL_SECURITY: u8 = 0x0E;
    /// Table identifier of `Assembly`.
    pub const ASSEMBLY: u8 = 0x20;
    /// Table identifier of `AssemblyRef`.
    pub const ASSEMBLY_REF: u8 = 0x23;

    /// Creates a new token from a raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds a token from a table identifier and a row index.
    ///
    /// Row bits above the 24-bit RID range are discarded.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw 32-bit token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table identifier (high byte).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the 1-based row index (low 24 bits).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` if this token points into `table`.
    #[must_use]
    pub fn is_table(&self, table: u8) -> bool {
        self.table() == table
    }

    /// Returns `true` for the null token `0x00000000`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_parts() {
        let token = Token(0x0600_0001);
        assert_eq!(token.table(), Token::METHOD_DEF);
        assert_eq!(token.row(), 1);

        let rebuilt = Token::from_parts(Token::METHOD_DEF, 1);
        assert_eq!(rebuilt, token);
    }

    #[test]
    fn test_token_from_parts_truncates_row() {
        let token = Token::from_parts(Token::DECL_SECURITY, 0xFF00_0003);
        assert_eq!(token.value(), 0x0E00_0003);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token::from_parts(Token::ASSEMBLY, 1).is_null());
    }

    #[test]
    fn test_token_display_and_debug() {
        let token = Token(0x0200_0005);
        assert_eq!(format!("{}", token), "0x02000005");

        let debug_str = format!("{:?}", token);
        assert!(debug_str.contains("table: 0x02"));
        assert!(debug_str.contains("row: 5"));
    }

    #[test]
    fn test_token_hash_and_order() {
        let mut map = HashMap::new();
        map.insert(Token(0x0200_0001), "Type1");
        map.insert(Token(0x0600_0001), "Method1");

        assert_eq!(map.get(&Token(0x0200_0001)), Some(&"Type1"));
        assert!(Token(0x0200_0001) < Token(0x0600_0001));
    }
}
