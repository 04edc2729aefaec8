#![no_main]

use libfuzzer_sys::fuzz_target;

use shir_frontend::FinalizedSettings;
use shir_ir::Diagnostics;
use shir_resolve::ResolverRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(tree) = serde_json::from_slice::<shir_ast::SyntaxTree>(data) else {
        return;
    };
    if tree.check_references().is_err() {
        return;
    }
    let mut registry = ResolverRegistry::new();
    if shir_resolve::register_core(&mut registry, &tree.symbols).is_none() {
        return;
    }
    // Any well-formed tree translates and validates without panicking.
    let settings = FinalizedSettings::default();
    let mut diagnostics = Diagnostics::new();
    let mut module = shir_frontend::translate_with(&tree, &registry, &settings, &mut diagnostics);
    shir_validate::validate(&tree, &registry, &settings, &mut module, &mut diagnostics);
    let _ = shir_ir::dump_module(&module);
});
