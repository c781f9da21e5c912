//! Legacy XML permission sets.
//!
//! Before .NET 2.0 permission sets were stored as UTF-16 XML documents:
//!
//! ```xml
//! <PermissionSet class="System.Security.PermissionSet" version="1">
//!   <IPermission class="System.Security.Permissions.FileIOPermission, mscorlib" version="1"
//!                Read="C:\Data"/>
//! </PermissionSet>
//! ```
//!
//! Such a blob is represented as a single `PermissionSetAttribute` carrying the document in
//! its `XML` property. [`SecurityAttribute::xml_permission_set`] gives a structured view of the
//! document.

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    metadata::{
        customattributes::{ArgumentType, ArgumentValue, NamedArgument},
        module::ModuleDef,
        security::{security_classes, SecurityAttribute},
        typesystem::{ResolutionScope, TypeName, TypeReference},
    },
    Result,
};

const ROOT_ELEMENT: &[u8] = b"PermissionSet";
const PERMISSION_ELEMENT: &[u8] = b"IPermission";

/// One `IPermission` element of an XML permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlPermission {
    /// Value of the `class` attribute, usually assembly qualified
    pub class: String,
    /// Value of the `version` attribute
    pub version: Option<String>,
    /// Every other attribute, in document order
    pub attributes: Vec<(String, String)>,
}

impl XmlPermission {
    /// The value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if `Unrestricted="true"`.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.attribute("Unrestricted")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

/// Structured view of an XML permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPermissionSet {
    /// Value of the root's `class` attribute
    pub class: Option<String>,
    /// `Unrestricted="true"` on the root
    pub unrestricted: bool,
    /// The `IPermission` children of the root, in document order
    pub permissions: Vec<XmlPermission>,
}

impl XmlPermissionSet {
    /// Parses a permission set document.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the text is not well-formed XML with a single
    /// `PermissionSet` root element.
    pub fn parse(text: &str) -> Result<XmlPermissionSet> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut set = XmlPermissionSet::default();
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            let event = reader.read_event().map_err(|error| {
                malformed_error!(
                    "Invalid XML at position {} - {}",
                    reader.buffer_position(),
                    error
                )
            })?;

            match event {
                Event::Start(element) => {
                    if depth == 0 {
                        set.read_root(&element, seen_root)?;
                        seen_root = true;
                    } else if depth == 1 && element.local_name().as_ref() == PERMISSION_ELEMENT {
                        set.permissions.push(read_permission(&element)?);
                    }
                    depth += 1;
                }
                Event::Empty(element) => {
                    if depth == 0 {
                        set.read_root(&element, seen_root)?;
                        seen_root = true;
                    } else if depth == 1 && element.local_name().as_ref() == PERMISSION_ELEMENT {
                        set.permissions.push(read_permission(&element)?);
                    }
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Text(text) if depth == 0 => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(malformed_error!("Text outside of the PermissionSet element"));
                    }
                }
                Event::CData(_) if depth == 0 => {
                    return Err(malformed_error!("CDATA outside of the PermissionSet element"));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(malformed_error!("XML permission set has no root element"));
        }
        if depth != 0 {
            return Err(malformed_error!("XML permission set is not closed"));
        }

        Ok(set)
    }

    /// Returns `true` if the set or any of its permissions is unrestricted.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted || self.permissions.iter().any(XmlPermission::is_unrestricted)
    }

    /// The permission whose class name, without assembly qualification, equals `class`.
    #[must_use]
    pub fn permission(&self, class: &str) -> Option<&XmlPermission> {
        self.permissions.iter().find(|permission| {
            permission
                .class
                .split(',')
                .next()
                .is_some_and(|name| name.trim() == class)
        })
    }

    fn read_root(&mut self, element: &BytesStart<'_>, seen_root: bool) -> Result<()> {
        if seen_root {
            return Err(malformed_error!("XML permission set has more than one root"));
        }
        if element.local_name().as_ref() != ROOT_ELEMENT {
            return Err(malformed_error!(
                "Unexpected root element '{}'",
                String::from_utf8_lossy(element.name().as_ref())
            ));
        }

        for (key, value) in read_attributes(element)? {
            match key.as_str() {
                "class" => self.class = Some(value),
                "Unrestricted" => self.unrestricted = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        Ok(())
    }
}

fn read_permission(element: &BytesStart<'_>) -> Result<XmlPermission> {
    let mut permission = XmlPermission {
        class: String::new(),
        version: None,
        attributes: Vec::new(),
    };

    for (key, value) in read_attributes(element)? {
        match key.as_str() {
            "class" => permission.class = value,
            "version" => permission.version = Some(value),
            _ => permission.attributes.push((key, value)),
        }
    }

    Ok(permission)
}

fn read_attributes(element: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();

    for attribute in element.attributes() {
        let attribute =
            attribute.map_err(|error| malformed_error!("Invalid XML attribute - {}", error))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|error| malformed_error!("Invalid XML attribute value - {}", error))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(attributes)
}

impl SecurityAttribute {
    /// Builds the descriptor of a legacy XML permission set.
    ///
    /// The result is a `System.Security.Permissions.PermissionSetAttribute` of the module's core
    /// library with one property, `XML`, holding `text` unchanged.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `text` is not a well-formed permission set
    /// document.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use declsec::metadata::{module::ModuleDef, security::SecurityAttribute};
    ///
    /// let module = ModuleDef::builder("Legacy.dll").build()?;
    /// let attribute = SecurityAttribute::from_xml(
    ///     &module,
    ///     r#"<PermissionSet class="System.Security.PermissionSet" Unrestricted="true"/>"#,
    /// )?;
    ///
    /// assert!(attribute.is_permission_set_attribute());
    /// assert!(attribute.xml_permission_set().unwrap()?.unrestricted);
    /// # Ok::<(), declsec::Error>(())
    /// ```
    pub fn from_xml(module: &ModuleDef, text: &str) -> Result<SecurityAttribute> {
        XmlPermissionSet::parse(text)?;

        let type_ref = TypeReference::new(
            security_classes::PERMISSION_SET_ATTRIBUTE,
            Some(TypeName::parse(security_classes::PERMISSION_SET_ATTRIBUTE)?),
            ResolutionScope::Assembly(module.corlib().clone()),
            Vec::new(),
        );

        Ok(SecurityAttribute::new(
            type_ref,
            vec![NamedArgument::property(
                "XML",
                ArgumentType::String,
                ArgumentValue::String(text.to_string()),
            )],
        ))
    }

    /// Parses the `XML` property, `None` for attributes without one.
    #[must_use]
    pub fn xml_permission_set(&self) -> Option<Result<XmlPermissionSet>> {
        self.xml().map(XmlPermissionSet::parse)
    }
}
