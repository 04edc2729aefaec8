use shir_ast::{Attribute, Expr, Stmt, SyntaxTree, TreeBuilder};
use shir_frontend::{FinalizedSettings, Settings};
use shir_ir::{Diagnostics, Module};
use shir_resolve::ResolverRegistry;

/// The outcome of running the whole pipeline.
#[allow(dead_code)]
pub struct Compiled {
    pub module: Module,
    pub diagnostics: Diagnostics,
    pub valid: bool,
}

/// Translate and validate a tree the way the `shir` driver does.
#[allow(dead_code)]
pub fn compile(tree: &SyntaxTree, settings: &FinalizedSettings) -> Compiled {
    tree.check_references().expect("well-formed tree");
    let mut registry = ResolverRegistry::new();
    shir_resolve::register_core(&mut registry, &tree.symbols).expect("core types installed");
    let mut diagnostics = Diagnostics::new();
    let mut module = shir_frontend::translate_with(tree, &registry, settings, &mut diagnostics);
    let valid = shir_validate::validate(tree, &registry, settings, &mut module, &mut diagnostics);
    Compiled {
        module,
        diagnostics,
        valid,
    }
}

#[allow(dead_code)]
pub fn compile_default(tree: &SyntaxTree) -> Compiled {
    compile(tree, &FinalizedSettings::default())
}

#[allow(dead_code)]
pub fn finalize_json(json: &str) -> FinalizedSettings {
    let settings: Settings = serde_json::from_str(json).expect("settings JSON");
    settings.finalize().expect("valid settings")
}

/// A pixel shader copying `FragCoord` into a `Color` output.
#[allow(dead_code)]
pub fn pixel_shader() -> SyntaxTree {
    let mut b = TreeBuilder::new();
    let real4 = b.core().reals[2];
    let void = b.core().void;
    let frag = b.struct_type("Frag", vec![Attribute::new("Pixel")]);
    let color = b.field(frag, "Color", real4, vec![Attribute::new("Output")], None);
    let coord = b.field(
        frag,
        "FragCoord",
        real4,
        vec![Attribute::new("HardwareBuiltInInput")],
        None,
    );
    let main = b.method(frag, "Main", &[], void);
    b.attribute_function(main, Attribute::new("EntryPoint"));
    b.body(
        main,
        &[],
        vec![Stmt::expr(Expr::assign(
            Expr::field(Expr::this(frag), color, real4),
            Expr::field(Expr::this(frag), coord, real4),
        ))],
    );
    b.finish()
}
