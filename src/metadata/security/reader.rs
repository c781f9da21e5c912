//! Decoding of `DeclSecurity` permission set blobs.
//!
//! A permission set blob comes in one of two formats, told apart by its first byte:
//!
//! ```text
//! Binary (.NET 2.0+)                       Legacy XML (.NET 1.x)
//! '.' (0x2E)                               UTF-16LE text of a <PermissionSet> document,
//! count                  compressed uint   trailing NUL characters ignored
//! count x {
//!     type name          compressed length + UTF-8
//!     blob length        compressed uint
//!     argument count     compressed uint
//!     named arguments    ECMA-335 II.23.3
//! }
//! ```
//!
//! Blobs come from untrusted files. A blob that cannot be decoded completely produces an empty
//! list, never a partial one, and the fault is logged at `debug` level. The only errors that
//! reach the caller are lock contract violations ([`crate::Error::is_lock_violation`]), which
//! indicate misuse of the shared module rather than bad input.

use log::{debug, trace};
use widestring::U16Str;

use crate::{
    file::parser::Parser,
    metadata::{
        customattributes::parse_named_arguments,
        module::ModuleDef,
        security::{SecurityAttribute, SecurityAttributeList},
        typesystem::{CustomAttributeResolver, GenericParamContext, TypeResolver},
    },
    utils::collections::OrderedList,
    Result,
};

/// Leading byte of the binary permission set format.
pub const BINARY_FORMAT_MARKER: u8 = 0x2E;

/// Smallest binary entry: empty type name, zero blob length, zero arguments.
const MIN_ENTRY_SIZE: usize = 3;

/// Decoder for declarative security blobs.
///
/// The associated functions decode with [`CustomAttributeResolver`]; use
/// [`DeclSecurityReader::with_resolver`] to supply a different [`TypeResolver`].
///
/// # Examples
///
/// ```rust
/// use declsec::{metadata::module::ModuleDef, utils::collections::OrderedList, DeclSecurityReader};
///
/// let module = ModuleDef::builder("Sample.dll").build()?;
/// let blob = [
///     0x2E, 0x01,
///     0x0B, b'S', b'y', b's', b't', b'e', b'm', b'.', b'F', b'o', b'o', b'A',
///     0x01, 0x00,
/// ];
///
/// let attributes = DeclSecurityReader::read_bytes(&module, &blob)?;
/// assert_eq!(attributes.len(), 1);
/// assert_eq!(attributes.to_vec()[0].type_full_name(), "System.FooA");
///
/// // Garbage decodes to nothing instead of failing
/// assert!(DeclSecurityReader::read_bytes(&module, &[0x2E, 0x05])?.is_empty());
/// # Ok::<(), declsec::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct DeclSecurityReader<'r> {
    resolver: &'r dyn TypeResolver,
}

impl DeclSecurityReader<'static> {
    /// A reader using [`CustomAttributeResolver`].
    #[must_use]
    pub fn new() -> Self {
        DeclSecurityReader {
            resolver: &CustomAttributeResolver,
        }
    }

    /// Decodes the blob at `index` of the module's `#Blob` heap.
    ///
    /// An index outside the heap is treated like any other undecodable blob.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_blob(module: &ModuleDef, index: u32) -> Result<SecurityAttributeList> {
        Self::new().decode_blob(module, index, &GenericParamContext::default())
    }

    /// Like [`DeclSecurityReader::read_blob`], resolving generic parameters from `context`.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_blob_with_context(
        module: &ModuleDef,
        index: u32,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        Self::new().decode_blob(module, index, context)
    }

    /// Decodes a blob given as bytes, without its heap length prefix.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_bytes(module: &ModuleDef, data: &[u8]) -> Result<SecurityAttributeList> {
        Self::new().decode(module, Parser::new(data), &GenericParamContext::default())
    }

    /// Like [`DeclSecurityReader::read_bytes`], resolving generic parameters from `context`.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_bytes_with_context(
        module: &ModuleDef,
        data: &[u8],
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        Self::new().decode(module, Parser::new(data), context)
    }

    /// Decodes the bytes from the current position of `parser` to its end.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_parser(module: &ModuleDef, parser: Parser<'_>) -> Result<SecurityAttributeList> {
        Self::new().decode(module, parser, &GenericParamContext::default())
    }

    /// Like [`DeclSecurityReader::read_parser`], resolving generic parameters from `context`.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn read_parser_with_context(
        module: &ModuleDef,
        parser: Parser<'_>,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        Self::new().decode(module, parser, context)
    }
}

impl Default for DeclSecurityReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> DeclSecurityReader<'r> {
    /// A reader resolving type names through `resolver`.
    #[must_use]
    pub fn with_resolver(resolver: &'r dyn TypeResolver) -> Self {
        DeclSecurityReader { resolver }
    }

    /// Decodes the blob at `index` of the module's `#Blob` heap.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn decode_blob(
        &self,
        module: &ModuleDef,
        index: u32,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        let decoded = module
            .blob()
            .and_then(|heap| heap.parser(index as usize))
            .and_then(|parser| self.decode_attributes(module, parser, context));

        Self::settle(module, decoded)
    }

    /// Decodes a blob given as bytes.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn decode_bytes(
        &self,
        module: &ModuleDef,
        data: &[u8],
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        self.decode(module, Parser::new(data), context)
    }

    /// Decodes the bytes from the current position of `parser` to its end.
    ///
    /// # Errors
    /// Only lock contract violations are returned.
    pub fn decode(
        &self,
        module: &ModuleDef,
        parser: Parser<'_>,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        Self::settle(module, self.decode_attributes(module, parser, context))
    }

    fn settle(
        module: &ModuleDef,
        decoded: Result<SecurityAttributeList>,
    ) -> Result<SecurityAttributeList> {
        match decoded {
            Err(error) if error.is_lock_violation() => Err(error),
            Err(error) => {
                debug!(
                    "Discarding declarative security blob in '{}': {}",
                    module.name(),
                    error
                );
                Ok(SecurityAttributeList::default())
            }
            attributes => attributes,
        }
    }

    fn decode_attributes(
        &self,
        module: &ModuleDef,
        mut parser: Parser<'_>,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        if !parser.has_more_data() {
            return Ok(SecurityAttributeList::default());
        }

        if parser.read_le::<u8>()? == BINARY_FORMAT_MARKER {
            trace!("Decoding binary permission set in '{}'", module.name());
            self.decode_binary(module, &mut parser, context)
        } else {
            trace!("Decoding XML permission set in '{}'", module.name());
            parser.rewind(1)?;
            let text = decode_utf16_text(parser.read_remaining())?;

            let mut attributes: SecurityAttributeList = OrderedList::with_capacity(1);
            OrderedList::push(&mut attributes, SecurityAttribute::from_xml(module, &text)?);
            Ok(attributes)
        }
    }

    fn decode_binary(
        &self,
        module: &ModuleDef,
        parser: &mut Parser<'_>,
        context: &GenericParamContext,
    ) -> Result<SecurityAttributeList> {
        let count = parser.read_compressed_uint()?;
        let capacity = (count as usize).min(parser.remaining() / MIN_ENTRY_SIZE);
        let mut attributes: SecurityAttributeList = OrderedList::with_capacity(capacity);

        for entry in 0..count {
            let type_name = parser.read_compressed_string_utf8()?;
            let type_ref = self.resolver.resolve(module, &type_name, context)?;

            let declared_length = parser.read_compressed_uint()? as usize;
            let start = parser.pos();

            let argument_count = parser.read_compressed_uint()?;
            let named_arguments =
                parse_named_arguments(module, parser, argument_count, context, self.resolver)?;

            let consumed = parser.pos() - start;
            if consumed != declared_length {
                trace!(
                    "Permission entry {} ('{}') declares {} bytes but uses {}",
                    entry,
                    type_name,
                    declared_length,
                    consumed
                );
            }

            OrderedList::push(
                &mut attributes,
                SecurityAttribute::new(type_ref, named_arguments),
            );
        }

        Ok(attributes)
    }
}

/// Decodes UTF-16LE text, dropping trailing NUL characters.
fn decode_utf16_text(data: &[u8]) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(malformed_error!(
            "UTF-16 permission set has an odd length of {} bytes",
            data.len()
        ));
    }

    let mut units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }

    U16Str::from_slice(&units)
        .to_string()
        .map_err(|error| malformed_error!("Invalid UTF-16 permission set - {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            customattributes::{ArgumentType, ArgumentValue},
            identity::AssemblyIdentity,
            module::TypeDefinition,
            streams::BlobHeapBuilder,
            token::Token,
            typesystem::{ResolutionScope, TypeReference},
        },
        utils::synchronization::Lock,
        Error,
    };

    fn module() -> ModuleDef {
        ModuleDef::builder("Sample.dll")
            .assembly(AssemblyIdentity::parse("Sample, Version=1.0.0.0").unwrap())
            .type_def(TypeDefinition::new(1, "Sample", "CustomPermissionAttribute"))
            .build()
            .unwrap()
    }

    fn entry(type_name: &str, arguments: &[u8], argument_count: u8) -> Vec<u8> {
        let mut bytes = vec![type_name.len() as u8];
        bytes.extend_from_slice(type_name.as_bytes());
        bytes.push((arguments.len() + 1) as u8);
        bytes.push(argument_count);
        bytes.extend_from_slice(arguments);
        bytes
    }

    fn unrestricted() -> Vec<u8> {
        let mut bytes = vec![0x54, 0x02, 0x0C];
        bytes.extend_from_slice(b"Unrestricted");
        bytes.push(0x01);
        bytes
    }

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn decode(module: &ModuleDef, data: &[u8]) -> Vec<SecurityAttribute> {
        DeclSecurityReader::read_bytes(module, data).unwrap().to_vec()
    }

    #[test]
    fn test_empty_blob() {
        let module = module();
        assert!(decode(&module, &[]).is_empty());
    }

    #[test]
    fn test_single_zero_byte_is_empty() {
        let module = module();
        assert!(decode(&module, &[0x00]).is_empty());
    }

    #[test]
    fn test_binary_without_entries() {
        let module = module();
        assert!(decode(&module, &[0x2E, 0x00]).is_empty());
    }

    #[test]
    fn test_binary_entries_in_order() {
        let module = module();
        let mut blob = vec![0x2E, 0x03];
        blob.extend(entry(
            "System.Security.Permissions.SecurityPermissionAttribute",
            &unrestricted(),
            1,
        ));
        blob.extend(entry("Sample.CustomPermissionAttribute", &[], 0));
        blob.extend(entry("Other.Unknown", &[], 0));

        let attributes = decode(&module, &blob);
        assert_eq!(attributes.len(), 3);

        assert_eq!(
            attributes[0].type_full_name(),
            "System.Security.Permissions.SecurityPermissionAttribute"
        );
        assert_eq!(
            attributes[0].attribute_type().scope(),
            &ResolutionScope::Assembly(module.corlib().clone())
        );
        assert!(attributes[0].is_unrestricted());

        assert_eq!(
            attributes[1].attribute_type().scope(),
            &ResolutionScope::Definition(Token(0x0200_0001))
        );
        assert!(attributes[1].named_arguments().is_empty());

        assert!(!attributes[2].attribute_type().is_resolved());
        assert_eq!(attributes[2].type_full_name(), "Other.Unknown");
    }

    #[test]
    fn test_binary_empty_type_name() {
        let module = module();
        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("", &[], 0));

        let attributes = decode(&module, &blob);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].attribute_type().raw(), "");
        assert!(!attributes[0].attribute_type().is_resolved());
    }

    #[test]
    fn test_binary_blob_length_is_not_used_to_seek() {
        let module = module();
        let mut first = entry("System.A", &unrestricted(), 1);
        first[9] = 0x40;

        let mut blob = vec![0x2E, 0x02];
        blob.extend(first);
        blob.extend(entry("System.B", &[], 0));
        blob.extend_from_slice(&[0xDE, 0xAD]);

        let attributes = decode(&module, &blob);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1].type_full_name(), "System.B");
    }

    #[test]
    fn test_binary_truncated_arguments_discard_blob() {
        let module = module();
        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("System.A", &[0x54, 0x02], 1));

        assert!(decode(&module, &blob).is_empty());
    }

    #[test]
    fn test_binary_failure_discards_earlier_entries() {
        let module = module();
        let mut blob = vec![0x2E, 0x02];
        blob.extend(entry("System.A", &unrestricted(), 1));
        blob.extend(entry("System.B", &[0x54, 0x01, 0x00, 0x00], 1));

        assert!(decode(&module, &blob).is_empty());
    }

    #[test]
    fn test_binary_hostile_counts() {
        let module = module();
        assert!(decode(&module, &[0x2E, 0xDF, 0xFF, 0xFF, 0xFF]).is_empty());
        assert!(decode(&module, &[0x2E, 0xFF]).is_empty());
        assert!(decode(&module, &[0x2E, 0x01, 0x40]).is_empty());
    }

    #[test]
    fn test_binary_deep_nesting_on_worker_thread() {
        let worker = std::thread::spawn(|| {
            let module = module();

            let mut boxed = vec![0x2E, 0x01, 0x01, b'A', 0x00, 0x01, 0x54, 0x51, 0x01, b'X'];
            boxed.extend(std::iter::repeat(0x51).take(999));
            boxed.extend_from_slice(&[0x02, 0x01]);

            let mut arrays = vec![0x2E, 0x01, 0x01, b'A', 0x00, 0x01, 0x54];
            arrays.extend(std::iter::repeat(0x1D).take(1000));
            arrays.extend_from_slice(&[0x05, 0x01, b'X', 0x00, 0x00, 0x00, 0x00]);

            (decode(&module, &boxed), decode(&module, &arrays))
        });

        let (boxed, arrays) = worker.join().unwrap();
        assert!(boxed.is_empty());
        assert!(arrays.is_empty());
    }

    #[test]
    fn test_xml_permission_set() {
        let module = module();
        let text = r#"<PermissionSet class="System.Security.PermissionSet" version="1" Unrestricted="true"/>"#;
        let mut blob = utf16(text);
        blob.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let attributes = decode(&module, &blob);
        assert_eq!(attributes.len(), 1);
        assert!(attributes[0].is_permission_set_attribute());
        assert_eq!(attributes[0].xml(), Some(text));

        let argument = attributes[0].get_argument("XML").unwrap();
        assert!(!argument.is_field);
        assert_eq!(argument.arg_type, ArgumentType::String);
        assert!(matches!(argument.value, ArgumentValue::String(_)));
    }

    #[test]
    fn test_xml_faults_discard_blob() {
        let module = module();

        let mut odd = utf16("<PermissionSet/>");
        odd.push(0x00);
        assert!(decode(&module, &odd).is_empty());

        let mut lone_surrogate = utf16("<PermissionSet");
        lone_surrogate.extend_from_slice(&0xD800u16.to_le_bytes());
        lone_surrogate.extend(utf16("/>"));
        assert!(decode(&module, &lone_surrogate).is_empty());

        assert!(decode(&module, &utf16("<NotAPermissionSet/>")).is_empty());
        assert!(decode(&module, &utf16("<PermissionSet>")).is_empty());
    }

    #[test]
    fn test_read_blob_from_heap() {
        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("System.A", &unrestricted(), 1));

        let mut heap = BlobHeapBuilder::new();
        let index = heap.add(&blob).unwrap();
        let module = ModuleDef::builder("Heap.dll")
            .blob_heap(heap.build())
            .build()
            .unwrap();

        assert_eq!(DeclSecurityReader::read_blob(&module, index).unwrap().len(), 1);
        assert_eq!(module.read_decl_security(index).unwrap().len(), 1);
        assert!(DeclSecurityReader::read_blob(&module, 0).unwrap().is_empty());
        assert!(DeclSecurityReader::read_blob(&module, 0x1000).unwrap().is_empty());
    }

    #[test]
    fn test_read_parser_starts_at_position() {
        let module = module();
        let mut data = vec![0xAA, 0xBB, 0x2E, 0x01];
        data.extend(entry("System.A", &[], 0));

        let mut parser = Parser::new(&data);
        parser.advance_by(2).unwrap();

        let attributes = DeclSecurityReader::read_parser(&module, parser).unwrap();
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn test_context_resolves_generic_parameters() {
        let module = module();
        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("TPermission", &[], 0));

        let context = GenericParamContext::new(vec!["TPermission".into()], vec![]);
        let attributes = DeclSecurityReader::read_bytes_with_context(&module, &blob, &context)
            .unwrap()
            .to_vec();
        assert!(matches!(
            attributes[0].attribute_type().scope(),
            ResolutionScope::GenericParameter { index: 0, .. }
        ));

        let attributes = decode(&module, &blob);
        assert!(!attributes[0].attribute_type().is_resolved());
    }

    struct ReentrantResolver {
        lock: Lock,
    }

    impl TypeResolver for ReentrantResolver {
        fn resolve(
            &self,
            _module: &ModuleDef,
            name: &str,
            _context: &GenericParamContext,
        ) -> Result<TypeReference> {
            let _outer = self.lock.write()?;
            let _inner = self.lock.write()?;
            Ok(TypeReference::unresolved(name))
        }
    }

    struct NamingResolver;

    impl TypeResolver for NamingResolver {
        fn resolve(
            &self,
            _module: &ModuleDef,
            name: &str,
            _context: &GenericParamContext,
        ) -> Result<TypeReference> {
            Ok(TypeReference::unresolved(format!("custom:{}", name)))
        }
    }

    #[test]
    fn test_lock_violation_is_returned() {
        let module = module();
        let resolver = ReentrantResolver { lock: Lock::new() };
        let reader = DeclSecurityReader::with_resolver(&resolver);

        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("System.A", &[], 0));

        assert!(matches!(
            reader.decode_bytes(&module, &blob, &GenericParamContext::default()),
            Err(Error::LockRecursion)
        ));
        assert_eq!(
            resolver.lock.state(),
            crate::utils::synchronization::LockState::Free
        );
    }

    #[test]
    fn test_custom_resolver() {
        let module = module();
        let reader = DeclSecurityReader::with_resolver(&NamingResolver);

        let mut blob = vec![0x2E, 0x01];
        blob.extend(entry("System.A", &[], 0));

        let attributes = reader
            .decode_bytes(&module, &blob, &GenericParamContext::default())
            .unwrap()
            .to_vec();
        assert_eq!(attributes[0].attribute_type().raw(), "custom:System.A");
    }

    #[test]
    fn test_decode_utf16_text() {
        assert_eq!(decode_utf16_text(&utf16("abc")).unwrap(), "abc");
        assert_eq!(decode_utf16_text(&[0x61, 0x00, 0x00, 0x00]).unwrap(), "a");
        assert_eq!(decode_utf16_text(&[]).unwrap(), "");
        assert!(decode_utf16_text(&[0x61]).is_err());
        assert!(decode_utf16_text(&[0x00, 0xDC]).is_err());
    }
}
