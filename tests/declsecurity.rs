/*
The permission sets below mirror what the C# compiler emits for

[assembly: SecurityPermission(SecurityAction.RequestMinimum, Assertion = true)]
[assembly: FileIOPermission(SecurityAction.RequestMinimum, Read = @"C:\TestData")]

public class SecureClass
{
    [FileIOPermission(SecurityAction.Demand, Read = @"C:\Test")]
    public void Method() { }
}

plus a .NET 1.x style XML permission set on a second type.
*/

use declsec::{
    metadata::{
        customattributes::{ArgumentType, ArgumentValue, NamedArgument},
        identity::AssemblyIdentity,
        module::{ModuleDef, TypeDefinition},
        security::{
            encode_permission_set, encode_xml_permission_set, security_classes, DeclSecurityRaw,
            HasDeclSecurity, SecurityAction, SecurityAttribute, SecurityPermissionFlags,
        },
        streams::BlobHeapBuilder,
        token::Token,
        typesystem::ResolutionScope,
    },
    utils::collections::OrderedList,
    DeclSecurityReader,
};

const MSCORLIB: &str =
    "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";

const LEGACY_XML: &str = r#"<PermissionSet class="System.Security.PermissionSet" version="1">
<IPermission class="System.Security.Permissions.FileIOPermission, mscorlib, Version=1.0.5000.0, Culture=neutral, PublicKeyToken=b77a5c561934e089" version="1" Read="C:\Legacy"/>
</PermissionSet>
"#;

fn ser_string(value: &str, out: &mut Vec<u8>) {
    assert!(value.len() < 0x80);
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
}

fn entry(class: &str, arguments: &[(u8, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = vec![arguments.len() as u8];
    for (tag, name, value) in arguments {
        body.push(0x54);
        body.push(*tag);
        ser_string(name, &mut body);
        body.extend_from_slice(value);
    }

    let mut out = Vec::new();
    ser_string(&format!("{}, {}", class, MSCORLIB), &mut out);
    out.push(body.len() as u8);
    out.extend(body);
    out
}

fn string_value(value: &str) -> Vec<u8> {
    let mut out = Vec::new();
    ser_string(value, &mut out);
    out
}

struct Crafted {
    module: ModuleDef,
    rows: Vec<DeclSecurityRaw>,
}

fn crafted() -> Crafted {
    let mut assembly_blob = vec![0x2E, 0x02];
    assembly_blob.extend(entry(
        "System.Security.Permissions.SecurityPermissionAttribute",
        &[(0x02, "Assertion", vec![0x01])],
    ));
    assembly_blob.extend(entry(
        "System.Security.Permissions.FileIOPermissionAttribute",
        &[(0x0E, "Read", string_value("C:\\TestData"))],
    ));

    let mut method_blob = vec![0x2E, 0x01];
    method_blob.extend(entry(
        "System.Security.Permissions.FileIOPermissionAttribute",
        &[(0x0E, "Read", string_value("C:\\Test"))],
    ));

    let mut heap = BlobHeapBuilder::new();
    let assembly_index = heap.add(&assembly_blob).unwrap();
    let method_index = heap.add(&method_blob).unwrap();
    let xml_index = heap.add(&encode_xml_permission_set(LEGACY_XML)).unwrap();
    let broken_index = heap.add(&method_blob[..method_blob.len() - 3]).unwrap();

    let module = ModuleDef::builder("crafted_2.exe")
        .assembly(AssemblyIdentity::parse("crafted_2, Version=1.2.3.4, Culture=neutral").unwrap())
        .assembly_ref(AssemblyIdentity::parse(MSCORLIB).unwrap())
        .type_def(TypeDefinition::new(1, "", "<Module>"))
        .type_def(TypeDefinition::new(2, "", "SecureClass"))
        .type_def(TypeDefinition::new(3, "", "LegacyClass"))
        .blob_heap(heap.build())
        .build()
        .unwrap();

    let mut table = Vec::new();
    let mut push_row = |action: SecurityAction, parent: Token, blob: u32| {
        table.extend_from_slice(&action.value().to_le_bytes());
        table.extend_from_slice(&(HasDeclSecurity::encode(parent).unwrap() as u16).to_le_bytes());
        table.extend_from_slice(&(blob as u16).to_le_bytes());
    };
    push_row(SecurityAction::RequestMinimum, Token(0x2000_0001), assembly_index);
    push_row(SecurityAction::Demand, Token(0x0600_0001), method_index);
    push_row(SecurityAction::LinkDemand, Token(0x0200_0003), xml_index);
    push_row(SecurityAction::Assert, Token(0x0200_0002), broken_index);

    let mut offset = 0;
    let rows = (1..=4)
        .map(|rid| DeclSecurityRaw::read_row(&table, &mut offset, rid, false, false).unwrap())
        .collect();

    Crafted { module, rows }
}

#[test]
fn crafted_decl_security_rows() {
    let crafted = crafted();
    let rows: Vec<_> = crafted
        .rows
        .iter()
        .map(|row| row.to_owned().unwrap())
        .collect();

    assert_eq!(rows[0].action, SecurityAction::RequestMinimum);
    assert_eq!(rows[0].parent, Token(0x2000_0001));
    assert!(rows[1].is_demand());
    assert_eq!(rows[1].parent, Token(0x0600_0001));
    assert!(rows[2].is_link_demand());
    assert!(rows[3].is_assert());

    let assembly = rows[0].attributes(&crafted.module).unwrap().to_vec();
    assert_eq!(assembly.len(), 2);

    assert_eq!(
        assembly[0].type_full_name(),
        "System.Security.Permissions.SecurityPermissionAttribute"
    );
    assert_eq!(
        assembly[0].attribute_type().scope(),
        &ResolutionScope::Assembly(AssemblyIdentity::parse(MSCORLIB).unwrap())
    );
    assert_eq!(
        assembly[0].get_argument("Assertion").unwrap().value,
        ArgumentValue::Boolean(true)
    );

    assert_eq!(
        assembly[1].file_read_paths(),
        Some(vec!["C:\\TestData".to_string()])
    );

    let method = rows[1].attributes(&crafted.module).unwrap().to_vec();
    assert_eq!(method.len(), 1);
    assert_eq!(method[0].file_read_paths(), Some(vec!["C:\\Test".to_string()]));

    let legacy = rows[2].attributes(&crafted.module).unwrap().to_vec();
    assert_eq!(legacy.len(), 1);
    assert!(legacy[0].is_permission_set_attribute());
    let set = legacy[0].xml_permission_set().unwrap().unwrap();
    assert_eq!(
        set.permission(security_classes::FILE_IO_PERMISSION)
            .unwrap()
            .attribute("Read"),
        Some("C:\\Legacy")
    );

    assert!(rows[3].attributes(&crafted.module).unwrap().is_empty());
}

#[test]
fn encoder_round_trip() {
    let crafted = crafted();
    let original = crafted.rows[0]
        .to_owned()
        .unwrap()
        .attributes(&crafted.module)
        .unwrap()
        .to_vec();

    let blob = encode_permission_set(&original).unwrap();
    let decoded = DeclSecurityReader::read_bytes(&crafted.module, &blob)
        .unwrap()
        .to_vec();
    assert_eq!(decoded, original);

    let flags = SecurityAttribute::new(
        original[0].attribute_type().clone(),
        vec![NamedArgument::property(
            "Flags",
            ArgumentType::Int32,
            ArgumentValue::Int32(0x0A),
        )],
    );
    let blob = encode_permission_set(&[flags]).unwrap();
    let decoded = DeclSecurityReader::read_bytes(&crafted.module, &blob)
        .unwrap()
        .to_vec();
    assert_eq!(
        decoded[0].security_flags(),
        Some(
            SecurityPermissionFlags::SECURITY_FLAG_UNMANAGED_CODE
                | SecurityPermissionFlags::SECURITY_FLAG_EXECUTION
        )
    );
}

#[test]
fn every_truncation_decodes_to_nothing() {
    let crafted = crafted();
    let blob = encode_permission_set(
        &crafted.rows[0]
            .to_owned()
            .unwrap()
            .attributes(&crafted.module)
            .unwrap()
            .to_vec(),
    )
    .unwrap();

    for end in 1..blob.len() {
        let decoded = DeclSecurityReader::read_bytes(&crafted.module, &blob[..end]).unwrap();
        assert!(decoded.is_empty(), "prefix of {} bytes decoded", end);
    }
    assert_eq!(
        DeclSecurityReader::read_bytes(&crafted.module, &blob)
            .unwrap()
            .len(),
        2
    );
}

#[cfg(feature = "thread-safe")]
#[test]
fn concurrent_decoding_of_shared_module() {
    use declsec::Result;
    use rayon::prelude::*;

    let crafted = crafted();
    let indices: Vec<u32> = crafted.rows.iter().map(|row| row.permission_set).collect();

    let expected: Vec<Vec<SecurityAttribute>> = indices
        .iter()
        .map(|&index| crafted.module.read_decl_security(index).unwrap().to_vec())
        .collect();

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        for (index, expected) in indices.iter().zip(&expected) {
                            let decoded =
                                crafted.module.read_decl_security(*index).unwrap().to_vec();
                            assert_eq!(&decoded, expected);
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    });

    let decoded = (0..400)
        .into_par_iter()
        .map(|i| {
            let index = indices[i % indices.len()];
            crafted
                .module
                .read_decl_security(index)
                .map(|list| list.to_vec())
        })
        .collect::<Result<Vec<_>>>()
        .unwrap();

    for (i, attributes) in decoded.iter().enumerate() {
        assert_eq!(attributes, &expected[i % expected.len()]);
    }

    assert!(crafted.module.cached_type_count().unwrap() >= 2);
}
