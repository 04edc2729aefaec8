use shir_ast::{Attribute, CodeLocation, Expr, Stmt, SyntaxTree, TreeBuilder};
use shir_frontend::FinalizedSettings;
use shir_ir::{DiagnosticKind, Diagnostics, Module, ShaderStage, SymbolKey};
use shir_resolve::{register_core, ResolverRegistry};
use shir_validate::{validate, CycleDetector, Pass, PassContext};

fn registry(tree: &SyntaxTree) -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    register_core(&mut registry, &tree.symbols).expect("core types installed");
    registry
}

/// Translates and validates, returning the module and every diagnostic.
fn check(tree: &SyntaxTree) -> (bool, Module, Diagnostics) {
    let registry = registry(tree);
    let settings = FinalizedSettings::default();
    let t = shir_frontend::translate(tree, &registry, &settings);
    assert!(t.is_translated(), "translation failed: {:#?}", t.diagnostics.items);
    let mut module = t.module;
    let mut diagnostics = t.diagnostics;
    let valid = validate(tree, &registry, &settings, &mut module, &mut diagnostics);
    (valid, module, diagnostics)
}

fn at(line: u32) -> CodeLocation {
    CodeLocation::new("test.shader", line, 1)
}

/// `Util.Helper(x: Real) -> Real` returning `Math.Ddx(x)`.
fn helper_calling_ddx(b: &mut TreeBuilder) -> shir_ast::FunctionId {
    let real = b.core().real;
    let math = b.core().math;
    let util = b.struct_type("Util", vec![]);
    let ddx = b.math("Ddx", &[real]).expect("Ddx");
    let helper = b.static_method(util, "Helper", &[("x", real)], real);
    let x = b.variable();
    b.body(
        helper,
        &[x],
        vec![Stmt::ret(Some(
            Expr::call(Expr::static_type(math), ddx, vec![Expr::local(x, real)], real).at(at(2)),
        ))],
    );
    helper
}

#[test]
fn undeclared_functions_inherit_their_dependencies_stage() {
    let mut b = TreeBuilder::new();
    let helper = helper_calling_ddx(&mut b);
    let (valid, module, diagnostics) = check(&b.finish());
    assert!(valid, "{:#?}", diagnostics.items);
    let requirement = &module.stage_requirements[&SymbolKey::Function(helper)];
    assert_eq!(requirement.required, ShaderStage::PIXEL);
}

#[test]
fn stage_mismatch_reports_the_reference_chain() {
    let mut b = TreeBuilder::new();
    let helper = helper_calling_ddx(&mut b);
    let core = b.core().clone();
    let util = b.symbols().function(helper).owner;
    let vert = b.struct_type("Vert", vec![Attribute::new("Vertex")]);
    let main = b.method(vert, "Main", &[], core.void);
    b.body(
        main,
        &[],
        vec![Stmt::expr(
            Expr::call(
                Expr::static_type(util),
                helper,
                vec![Expr::value("1.0", core.real)],
                core.real,
            )
            .at(at(7)),
        )],
    );

    let (valid, module, diagnostics) = check(&b.finish());
    assert!(!valid);
    assert!(!module.translated);
    let d = diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Validation)
        .expect("validation error");
    assert_eq!(d.short_message, "Invalid shader stage combination");
    assert_eq!(
        d.full_message,
        "'Vert.Main' requires shader stage Vertex but references 'Math.Ddx' which requires stage Pixel"
    );
    assert_eq!(d.call_stack, vec![at(7), at(2)]);
}

#[test]
fn requires_attributes_declare_a_stage() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let util = b.struct_type("Util", vec![]);
    let shade = b.static_method(util, "Shade", &[], core.void);
    b.attribute_function(shade, Attribute::new("RequiresPixel"));
    b.body(shade, &[], vec![]);
    let comp = b.struct_type("Comp", vec![Attribute::new("Compute")]);
    let main = b.method(comp, "Main", &[], core.void);
    b.body(
        main,
        &[],
        vec![Stmt::expr(Expr::call(
            Expr::static_type(util),
            shade,
            vec![],
            core.void,
        ))],
    );

    let (valid, _, diagnostics) = check(&b.finish());
    assert!(!valid);
    assert!(diagnostics.contains(
        "'Comp.Main' requires shader stage Compute but references 'Util.Shade' which requires stage Pixel"
    ));
}

/// `{name}.Main` on a type with `stage`, discarding the fragment.
fn main_calling_kill(b: &mut TreeBuilder, name: &str, stage: &str) {
    let void = b.core().void;
    let kill = b.kill().expect("Shader.Kill");
    let shader = b.symbols().function(kill).owner;
    let owner = b.struct_type(name, vec![Attribute::new(stage)]);
    let main = b.method(owner, "Main", &[], void);
    b.body(
        main,
        &[],
        vec![Stmt::expr(
            Expr::call(Expr::static_type(shader), kill, vec![], void).at(at(4)),
        )],
    );
}

#[test]
fn kill_is_pixel_only() {
    let mut b = TreeBuilder::new();
    main_calling_kill(&mut b, "Vert", "Vertex");
    let (valid, _, diagnostics) = check(&b.finish());
    assert!(!valid);
    assert!(diagnostics.contains(
        "'Vert.Main' requires shader stage Vertex but references 'Shader.Kill' which requires stage Pixel"
    ));

    let mut b = TreeBuilder::new();
    main_calling_kill(&mut b, "Frag", "Pixel");
    let (valid, _, diagnostics) = check(&b.finish());
    assert!(valid, "{:#?}", diagnostics.items);
}

#[test]
fn mutual_recursion_is_rejected() {
    let mut b = TreeBuilder::new();
    let void = b.core().void;
    let rec = b.struct_type("Rec", vec![]);
    let a = b.static_method(rec, "A", &[], void);
    let c = b.static_method(rec, "B", &[], void);
    b.body(
        a,
        &[],
        vec![Stmt::expr(Expr::call(Expr::static_type(rec), c, vec![], void).at(at(3)))],
    );
    b.body(
        c,
        &[],
        vec![Stmt::expr(Expr::call(Expr::static_type(rec), a, vec![], void).at(at(5)))],
    );

    let (valid, _, diagnostics) = check(&b.finish());
    assert!(!valid);
    let d = diagnostics
        .iter()
        .find(|d| d.short_message == "Recursion is not allowed in shaders")
        .expect("recursion error");
    assert_eq!(d.full_message, "Illegal recursion cycle: 'Rec.A' -> 'Rec.B' -> 'Rec.A'");
    assert_eq!(d.location, Some(at(5)));
    assert_eq!(d.call_stack, vec![at(3), at(5)]);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn call_chains_without_repeats_are_fine() {
    let mut b = TreeBuilder::new();
    let void = b.core().void;
    let chain = b.struct_type("Chain", vec![]);
    let a = b.static_method(chain, "A", &[], void);
    let c = b.static_method(chain, "B", &[], void);
    let d = b.static_method(chain, "C", &[], void);
    let call = |f| Stmt::expr(Expr::call(Expr::static_type(chain), f, vec![], void));
    b.body(a, &[], vec![call(c), call(d)]);
    b.body(c, &[], vec![call(d)]);
    b.body(d, &[], vec![]);

    let (valid, _, diagnostics) = check(&b.finish());
    assert!(valid, "{:#?}", diagnostics.items);
}

#[test]
fn getters_that_read_themselves_recurse() {
    let mut b = TreeBuilder::new();
    let real = b.core().real;
    let node = b.struct_type("Node", vec![]);
    // The getter body needs the field id, so declare it first with an empty
    // body and fill it in afterwards.
    let field = b.property(node, "Value", real, vec![], None);
    b.class_mut(node).variables[0]
        .getter
        .as_mut()
        .expect("getter")
        .body = vec![Stmt::ret(Some(Expr::field(Expr::this(node), field, real)))];

    let tree = b.finish();
    let registry = registry(&tree);
    let settings = FinalizedSettings::default();
    let t = shir_frontend::translate(&tree, &registry, &settings);
    assert!(t.is_translated(), "{:#?}", t.diagnostics.items);

    let ctx = PassContext::new(&tree, &registry, &settings);
    let mut module = t.module;
    let mut diagnostics = Diagnostics::new();
    assert!(!CycleDetector.run(&ctx, &mut module, &mut diagnostics));
    assert!(diagnostics.contains("Illegal recursion cycle: 'Node.GetValue' -> 'Node.GetValue'"));
}

#[test]
fn field_initializers_recurse_through_the_pre_constructor() {
    let mut b = TreeBuilder::new();
    let real = b.core().real;
    let boxed = b.struct_type("Box", vec![]);
    let make = b.static_method(boxed, "Make", &[], real);
    b.field(
        boxed,
        "Inner",
        real,
        vec![],
        Some(Expr::call(Expr::static_type(boxed), make, vec![], real)),
    );
    let local = b.variable();
    b.body(
        make,
        &[],
        vec![
            Stmt::local(local, "b", boxed, None),
            Stmt::ret(Some(Expr::value("1.0", real))),
        ],
    );

    let (valid, _, diagnostics) = check(&b.finish());
    assert!(!valid);
    assert!(diagnostics.contains(
        "Illegal recursion cycle: 'Box.PreConstructor' -> 'Box.Make' -> 'Box.PreConstructor'"
    ));
}
