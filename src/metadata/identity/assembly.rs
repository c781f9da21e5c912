//! Assembly identity parsing and formatting.
//!
//! [`AssemblyIdentity`] models the display-name form that assembly-qualified type names carry
//! inside custom attribute and declarative security blobs:
//!
//! ```text
//! mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089
//! ```
//!
//! Resolution scopes produced by the type resolver point at these identities, and the reference
//! encoder writes them back when it assembly-qualifies attribute type names.
//!
//! # Examples
//!
//! ```rust
//! use declsec::metadata::identity::AssemblyIdentity;
//!
//! let identity = AssemblyIdentity::parse(
//!     "System.Data, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
//! )?;
//!
//! assert_eq!(identity.simple_name(), "System.Data");
//! assert_eq!(identity.version.to_string(), "4.0.0.0");
//! assert!(identity.is_culture_neutral());
//! # Ok::<(), declsec::Error>(())
//! ```

use std::{fmt, fmt::Write as _, str::FromStr};

use crate::{Error, Result};

/// Public key token shared by the ECMA/Microsoft framework assemblies.
pub const FRAMEWORK_PUBLIC_KEY_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

/// The identity of an assembly as written in a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple assembly name, without extension
    pub name: String,
    /// Four-part version, all zero when the display name omits it
    pub version: AssemblyVersion,
    /// Culture, `None` for culture-neutral assemblies
    pub culture: Option<String>,
    /// 8-byte public key token, `None` for unsigned assemblies or `PublicKeyToken=null`
    pub public_key_token: Option<[u8; 8]>,
}

/// A four-part assembly version `major.minor.build.revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyIdentity {
    /// Creates a culture-neutral identity without a public key token.
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self {
            name: name.into(),
            version,
            culture: None,
            public_key_token: None,
        }
    }

    /// Creates the identity of a .NET Framework 4 assembly (`Version=4.0.0.0`, framework token).
    pub fn framework(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: AssemblyVersion::new(4, 0, 0, 0),
            culture: None,
            public_key_token: Some(FRAMEWORK_PUBLIC_KEY_TOKEN),
        }
    }

    /// The default core library, `mscorlib` 4.0.0.0.
    #[must_use]
    pub fn mscorlib() -> Self {
        Self::framework("mscorlib")
    }

    /// Parse an assembly display name.
    ///
    /// Unknown components such as `ProcessorArchitecture=` or `Retargetable=` are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty name, an invalid version or a public key
    /// token that is not exactly 16 hex characters.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        let mut identity = Self::new(name, AssemblyVersion::default());
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            let value = value.trim();
            match key.trim() {
                "Version" => identity.version = AssemblyVersion::parse(value)?,
                "Culture" => {
                    if !value.eq_ignore_ascii_case("neutral") && !value.is_empty() {
                        identity.culture = Some(value.to_string());
                    }
                }
                "PublicKeyToken" => {
                    if !value.eq_ignore_ascii_case("null") && !value.is_empty() {
                        identity.public_key_token = Some(parse_token(value)?);
                    }
                }
                _ => {}
            }
        }

        Ok(identity)
    }

    /// Formats the full display name including version, culture and public key token.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);
        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );

        result.push_str(", PublicKeyToken=");
        match &self.public_key_token {
            Some(token) => {
                for byte in token {
                    let _ = write!(result, "{:02x}", byte);
                }
            }
            None => result.push_str("null"),
        }

        result
    }

    /// The simple name of the assembly.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the assembly carries a public key token.
    #[must_use]
    pub fn is_strong_named(&self) -> bool {
        self.public_key_token.is_some()
    }

    /// Returns `true` if the assembly is culture neutral.
    #[must_use]
    pub fn is_culture_neutral(&self) -> bool {
        self.culture.is_none()
    }

    /// Case-insensitive comparison of simple names, the way the loader matches references.
    #[must_use]
    pub fn same_simple_name(&self, other: &AssemblyIdentity) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

fn parse_token(value: &str) -> Result<[u8; 8]> {
    if value.len() != 16 || !value.is_ascii() {
        return Err(malformed_error!(
            "PublicKeyToken must be exactly 16 hex characters, got '{}'",
            value
        ));
    }

    let mut token = [0u8; 8];
    for (index, byte) in token.iter_mut().enumerate() {
        let digits = &value[index * 2..index * 2 + 2];
        *byte = u8::from_str_radix(digits, 16)
            .map_err(|_| malformed_error!("Invalid hex in PublicKeyToken '{}'", value))?;
    }

    Ok(token)
}

impl AssemblyVersion {
    /// Creates a version from its four components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a dotted version with one to four components; missing components are zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for empty input, more than four components or a
    /// component that is not a `u16`.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.split('.').collect();
        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for AssemblyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
