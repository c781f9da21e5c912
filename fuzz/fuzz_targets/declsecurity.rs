#![no_main]

use std::sync::OnceLock;

use declsec::{
    metadata::{identity::AssemblyIdentity, module::ModuleDef, module::TypeDefinition},
    DeclSecurityReader,
};
use libfuzzer_sys::fuzz_target;

fn module() -> &'static ModuleDef {
    static MODULE: OnceLock<ModuleDef> = OnceLock::new();
    MODULE.get_or_init(|| {
        ModuleDef::builder("Fuzz.dll")
            .assembly_ref(AssemblyIdentity::mscorlib())
            .type_def(TypeDefinition::new(1, "", "<Module>"))
            .type_def(TypeDefinition::new(2, "Fuzz", "Flags").with_enum_underlying(0x05))
            .build()
            .unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    let _ = DeclSecurityReader::read_bytes(module(), data);
});
