//! Resolution of textual type names to [`TypeReference`]s.
//!
//! [`TypeResolver`] is the seam the blob decoders call through. The shipped implementation,
//! [`CustomAttributeResolver`], follows the tolerant lookup the runtime applies to attribute
//! type names, since many producers omit assembly qualification:
//!
//! 1. empty names stay unresolved
//! 2. unparsable names stay unresolved, keeping their text
//! 3. `!N`, `!!N` and names of generic parameters in the context become generic parameters
//! 4. assembly-qualified names resolve to that assembly, or to the module's own type when the
//!    assembly is the module's assembly
//! 5. types defined in the module, nested types included, resolve to their `TypeDef`
//! 6. `System.Data.*` and `System.Xml.*` resolve to those framework assemblies, every other
//!    `System.*` namespace to the core library
//! 7. anything else stays unresolved
//!
//! Successful resolutions of names without generic parameters in scope are cached on the module;
//! unresolved names are not.

use log::trace;

use crate::{
    metadata::{
        module::ModuleDef,
        typesystem::{
            GenericParamContext, GenericParameterKind, ResolutionScope, TypeName, TypeReference,
        },
    },
    Result,
};

/// Resolves type names found in attribute blobs.
pub trait TypeResolver {
    /// Resolves `name` in the context of `module`.
    ///
    /// A name that cannot be located yields an unresolved [`TypeReference`], not an error.
    ///
    /// # Errors
    /// Implementations return errors only for failures of shared module state, such as lock
    /// contract violations on the module's caches.
    fn resolve(
        &self,
        module: &ModuleDef,
        name: &str,
        context: &GenericParamContext,
    ) -> Result<TypeReference>;
}

/// The custom-attribute search rules described in the [module documentation](self).
///
/// ```rust
/// use declsec::metadata::{
///     module::ModuleDef,
///     typesystem::{CustomAttributeResolver, GenericParamContext, ResolutionScope, TypeResolver},
/// };
///
/// let module = ModuleDef::builder("Sample.dll").build()?;
/// let reference = CustomAttributeResolver.resolve(
///     &module,
///     "System.Security.Permissions.SecurityPermissionAttribute",
///     &GenericParamContext::default(),
/// )?;
///
/// assert_eq!(reference.scope(), &ResolutionScope::Assembly(module.corlib().clone()));
/// # Ok::<(), declsec::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomAttributeResolver;

impl TypeResolver for CustomAttributeResolver {
    fn resolve(
        &self,
        module: &ModuleDef,
        name: &str,
        context: &GenericParamContext,
    ) -> Result<TypeReference> {
        if name.is_empty() {
            return Ok(TypeReference::unresolved(String::new()));
        }

        if let Some(parameter) = resolve_generic_parameter(name, name.trim(), context) {
            return Ok(parameter);
        }

        let cacheable = context.is_empty();
        if cacheable {
            if let Some(cached) = module.cached_type(name)? {
                return Ok(cached);
            }
        }

        let resolved = match TypeName::parse(name) {
            Ok(parsed) => resolve_parsed(module, name.to_string(), parsed, context),
            Err(error) => {
                trace!("Type name '{}' is not parsable: {}", name, error);
                TypeReference::unresolved(name)
            }
        };

        if !resolved.is_resolved() {
            trace!("Type name '{}' left unresolved in {}", name, module.name());
        } else if cacheable {
            module.cache_type(name, resolved.clone())?;
        }

        Ok(resolved)
    }
}

fn resolve_generic_parameter(
    raw: &str,
    name: &str,
    context: &GenericParamContext,
) -> Option<TypeReference> {
    if context.is_empty() {
        return None;
    }

    let (kind, index) = if let Some(index) = name.strip_prefix("!!") {
        (GenericParameterKind::Method, index.parse::<u32>().ok()?)
    } else if let Some(index) = name.strip_prefix('!') {
        (GenericParameterKind::Type, index.parse::<u32>().ok()?)
    } else if let Some(index) = context.method_parameter_index(name) {
        (GenericParameterKind::Method, index)
    } else {
        (
            GenericParameterKind::Type,
            context.type_parameter_index(name)?,
        )
    };

    if index as usize >= context.count(kind) {
        return None;
    }

    Some(TypeReference::generic_parameter(raw, kind, index))
}

fn resolve_parsed(
    module: &ModuleDef,
    raw: String,
    parsed: TypeName,
    context: &GenericParamContext,
) -> TypeReference {
    let generic_arguments = parsed
        .generic_arguments
        .iter()
        .map(|argument| {
            let text = argument.assembly_qualified_name();
            if is_bare_name(argument) {
                if let Some(parameter) = resolve_generic_parameter(&text, &argument.name, context)
                {
                    return parameter;
                }
            }
            resolve_parsed(module, text, argument.clone(), context)
        })
        .collect();

    let scope = resolve_scope(module, &parsed);
    TypeReference::new(raw, Some(parsed), scope, generic_arguments)
}

fn is_bare_name(name: &TypeName) -> bool {
    name.namespace.is_empty()
        && name.nested.is_empty()
        && name.modifiers.is_empty()
        && name.assembly.is_none()
        && !name.is_generic()
}

fn resolve_scope(module: &ModuleDef, name: &TypeName) -> ResolutionScope {
    if let Some(assembly) = &name.assembly {
        let is_own = module
            .assembly()
            .is_some_and(|own| own.same_simple_name(assembly));
        if is_own {
            if let Some(token) = module.find_type(name) {
                return ResolutionScope::Definition(token);
            }
        }

        let identity = module
            .find_assembly_ref(assembly)
            .cloned()
            .unwrap_or_else(|| assembly.clone());
        return ResolutionScope::Assembly(identity);
    }

    if let Some(token) = module.find_type(name) {
        return ResolutionScope::Definition(token);
    }

    let namespace = name.namespace.as_str();
    for framework in ["System.Data", "System.Xml"] {
        if in_namespace(namespace, framework) {
            return ResolutionScope::Assembly(module.framework_assembly(framework));
        }
    }

    if in_namespace(namespace, "System") {
        return ResolutionScope::Assembly(module.corlib().clone());
    }

    ResolutionScope::Unresolved
}

fn in_namespace(namespace: &str, root: &str) -> bool {
    namespace
        .strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{identity::AssemblyIdentity, module::TypeDefinition, token::Token};

    fn module() -> ModuleDef {
        ModuleDef::builder("Contoso.dll")
            .assembly(AssemblyIdentity::parse("Contoso, Version=1.0.0.0").unwrap())
            .type_def(TypeDefinition::new(1, "Contoso.Security", "CustomPermissionAttribute"))
            .type_def(TypeDefinition::new(2, "", "Nested").nested_in(Token(0x0200_0001)))
            .assembly_ref(AssemblyIdentity::parse("System.Xml, Version=2.0.0.0").unwrap())
            .build()
            .unwrap()
    }

    fn resolve(module: &ModuleDef, name: &str) -> TypeReference {
        CustomAttributeResolver
            .resolve(module, name, &GenericParamContext::default())
            .unwrap()
    }

    #[test]
    fn test_empty_and_unparsable() {
        let module = module();

        let empty = resolve(&module, "");
        assert!(!empty.is_resolved());
        assert_eq!(empty.raw(), "");

        let broken = resolve(&module, "Broken[[Type");
        assert!(!broken.is_resolved());
        assert!(broken.type_name().is_none());
        assert_eq!(broken.raw(), "Broken[[Type");
    }

    #[test]
    fn test_module_definitions() {
        let module = module();

        let top = resolve(&module, "Contoso.Security.CustomPermissionAttribute");
        assert_eq!(top.scope(), &ResolutionScope::Definition(Token(0x0200_0001)));

        let nested = resolve(&module, "Contoso.Security.CustomPermissionAttribute+Nested");
        assert_eq!(
            nested.scope(),
            &ResolutionScope::Definition(Token(0x0200_0002))
        );
    }

    #[test]
    fn test_assembly_qualified() {
        let module = module();

        let own = resolve(
            &module,
            "Contoso.Security.CustomPermissionAttribute, Contoso, Version=1.0.0.0",
        );
        assert_eq!(own.scope(), &ResolutionScope::Definition(Token(0x0200_0001)));

        let referenced = resolve(&module, "System.Xml.XmlNode, System.Xml");
        match referenced.scope() {
            ResolutionScope::Assembly(identity) => assert_eq!(identity.version.major, 2),
            other => panic!("unexpected scope {:?}", other),
        }

        let external = resolve(&module, "Other.Type, Other.Library");
        match external.scope() {
            ResolutionScope::Assembly(identity) => {
                assert_eq!(identity.simple_name(), "Other.Library")
            }
            other => panic!("unexpected scope {:?}", other),
        }
    }

    #[test]
    fn test_framework_namespaces() {
        let module = module();

        let security = resolve(
            &module,
            "System.Security.Permissions.SecurityPermissionAttribute",
        );
        assert_eq!(
            security.scope(),
            &ResolutionScope::Assembly(AssemblyIdentity::mscorlib())
        );

        let net = resolve(&module, "System.Net.WebPermissionAttribute");
        assert_eq!(
            net.scope(),
            &ResolutionScope::Assembly(AssemblyIdentity::mscorlib())
        );

        let data = resolve(&module, "System.Data.SqlClient.SqlClientPermissionAttribute");
        assert_eq!(
            data.scope(),
            &ResolutionScope::Assembly(AssemblyIdentity::framework("System.Data"))
        );

        let xml = resolve(&module, "System.Xml.Serialization.XmlSerializer");
        match xml.scope() {
            ResolutionScope::Assembly(identity) => {
                assert_eq!(identity.simple_name(), "System.Xml");
                assert_eq!(identity.version.major, 2);
            }
            other => panic!("unexpected scope {:?}", other),
        }

        let lookalike = resolve(&module, "SystemX.Thing");
        assert!(!lookalike.is_resolved());
    }

    #[test]
    fn test_unknown_type_unresolved() {
        let module = module();
        let reference = resolve(&module, "Vendor.Security.LicensePermissionAttribute");
        assert!(!reference.is_resolved());
        assert_eq!(
            reference.full_name(),
            "Vendor.Security.LicensePermissionAttribute"
        );
    }

    #[test]
    fn test_generic_parameters() {
        let module = module();
        let context = GenericParamContext::new(vec!["T".into()], vec!["M".into()]);

        let by_index = CustomAttributeResolver
            .resolve(&module, "!0", &context)
            .unwrap();
        assert_eq!(
            by_index.scope(),
            &ResolutionScope::GenericParameter {
                kind: GenericParameterKind::Type,
                index: 0
            }
        );

        let by_name = CustomAttributeResolver
            .resolve(&module, "M", &context)
            .unwrap();
        assert_eq!(
            by_name.scope(),
            &ResolutionScope::GenericParameter {
                kind: GenericParameterKind::Method,
                index: 0
            }
        );

        let out_of_range = CustomAttributeResolver
            .resolve(&module, "!!3", &context)
            .unwrap();
        assert!(!out_of_range.is_resolved());

        let without_context = resolve(&module, "!0");
        assert!(!without_context.is_resolved());
    }

    #[test]
    fn test_generic_arguments_resolved() {
        let module = module();
        let context = GenericParamContext::new(vec!["T".into()], vec![]);

        let reference = CustomAttributeResolver
            .resolve(
                &module,
                "System.Collections.Generic.List`1[[Contoso.Security.CustomPermissionAttribute, Contoso]]",
                &GenericParamContext::default(),
            )
            .unwrap();
        assert_eq!(reference.generic_arguments().len(), 1);
        assert_eq!(
            reference.generic_arguments()[0].scope(),
            &ResolutionScope::Definition(Token(0x0200_0001))
        );

        let open = CustomAttributeResolver
            .resolve(&module, "System.Nullable`1[T]", &context)
            .unwrap();
        assert_eq!(
            open.generic_arguments()[0].scope(),
            &ResolutionScope::GenericParameter {
                kind: GenericParameterKind::Type,
                index: 0
            }
        );
    }

    #[test]
    fn test_cache_only_context_free() {
        let module = module();
        assert_eq!(module.cached_type_count().unwrap(), 0);

        let first = resolve(&module, "System.Object");
        let second = resolve(&module, "System.Object");
        assert_eq!(first, second);
        assert_eq!(module.cached_type_count().unwrap(), 1);

        let context = GenericParamContext::new(vec!["T".into()], vec![]);
        CustomAttributeResolver
            .resolve(&module, "System.String", &context)
            .unwrap();
        assert_eq!(module.cached_type_count().unwrap(), 1);
    }

    #[test]
    fn test_unresolved_names_not_cached() {
        let module = module();

        for index in 0..100 {
            let reference = resolve(&module, &format!("Garbage{}.Missing", index));
            assert!(!reference.is_resolved());
        }
        resolve(&module, "Not a [valid name");
        resolve(&module, "");

        assert_eq!(module.cached_type_count().unwrap(), 0);
    }
}
