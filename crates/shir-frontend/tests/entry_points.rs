mod common;

use common::*;
use shir_ast::{AttributeValue, Expr, Stmt, TreeBuilder};
use shir_frontend::Settings;
use shir_ir::{Capability, DecorationKind, ExecutionMode, OpCode, ShaderStage, StorageClass};

use OpCode::*;

#[test]
fn pixel_entry_point_wires_inputs_and_outputs() {
    let mut b = TreeBuilder::new();
    let real4 = b.core().reals[2];
    let void = b.core().void;
    let frag = b.struct_type("Frag", vec![attr("Pixel")]);
    let color = b.field(frag, "Color", real4, vec![attr("Output")], None);
    let coord = b.field(frag, "FragCoord", real4, vec![attr("HardwareBuiltInInput")], None);
    let main = b.method(frag, "Main", &[], void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(
        main,
        &[],
        vec![Stmt::expr(Expr::assign(
            Expr::field(Expr::this(frag), color, real4),
            Expr::field(Expr::this(frag), coord, real4),
        ))],
    );

    let settings = Settings {
        render_targets: vec!["Normal".into(), "Color".into()],
        ..Settings::default()
    };
    let t = translate_with_settings(&b.finish(), settings);
    assert_translated(&t);
    let m = &t.module;

    assert_eq!(m.entry_points.len(), 1);
    let ep = &m.entry_points[0];
    assert_eq!(ep.stage, ShaderStage::PIXEL);
    assert_eq!(ep.execution_modes, vec![ExecutionMode::OriginUpperLeft]);
    assert_eq!(ep.capabilities, vec![Capability::Shader]);
    assert_eq!(m.functions[ep.function].name, "EntryPoint_Main_Frag");
    assert_eq!(m.functions[ep.user_function].name, "Frag.Main");

    let out = global_named(m, "Out_Color");
    let built_in = global_named(m, "FragCoord");
    assert_eq!(ep.interface, vec![out, built_in]);
    assert_eq!(op_decorations(m, out), vec![DecorationKind::Location(1)]);
    assert_eq!(
        op_decorations(m, built_in),
        vec![DecorationKind::BuiltIn("FragCoord".into())]
    );
    let out_ty = m.op_type(out).expect("typed");
    assert_eq!(m.types[out_ty].storage, StorageClass::Output);

    assert_eq!(
        codes(m, ep.function),
        vec![FunctionCall, FunctionCall, FunctionCall, FunctionCall, FunctionCall, Return]
    );
    let copy_in = function(m, "CopyInputs_Main");
    assert_eq!(codes(m, copy_in), vec![AccessChain, Load, Store, Return]);
    let copy_out = function(m, "CopyOutputs_Main");
    assert_eq!(codes(m, copy_out), vec![AccessChain, Load, Store, Return]);
    m.check_structure().expect("well-formed module");
}

#[test]
fn compute_local_size_comes_from_the_stage_attribute() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let sim = b.struct_type(
        "Sim",
        vec![attr("Compute")
            .with("LocalSizeX", AttributeValue::Int(8))
            .with("LocalSizeY", AttributeValue::Int(4))],
    );
    b.field(
        sim,
        "GlobalInvocationId",
        core.integers[1],
        vec![attr("HardwareBuiltInInput")],
        None,
    );
    let main = b.method(sim, "Main", &[], core.void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(main, &[], vec![]);

    let t = translate(&b.finish());
    assert_translated(&t);
    let ep = &t.module.entry_points[0];
    assert_eq!(ep.stage, ShaderStage::COMPUTE);
    assert_eq!(ep.execution_modes, vec![ExecutionMode::LocalSize(8, 4, 1)]);
}

#[test]
fn property_inputs_share_a_uniform_block() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let vert = b.struct_type("Vert", vec![attr("Vertex")]);
    b.field(vert, "Time", core.real, vec![attr("PropertyInput")], None);
    b.field(vert, "Offset", core.reals[1], vec![attr("PropertyInput")], None);
    b.field(vert, "Position", core.reals[2], vec![attr("HardwareBuiltInOutput")], None);
    b.field(vert, "Pos", core.reals[1], vec![attr("Input")], None);
    let main = b.method(vert, "Main", &[], core.void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(main, &[], vec![]);

    let t = translate(&b.finish());
    assert_translated(&t);
    let m = &t.module;
    let ep = &m.entry_points[0];
    assert_eq!(ep.uniform_buffers.len(), 1);
    let ub = &ep.uniform_buffers[0];
    assert_eq!(ub.name, "Material");
    assert_eq!((ub.binding, ub.descriptor_set), (0, 0));
    assert_eq!(
        ub.members,
        vec![("Time".to_string(), 0), ("Offset".to_string(), 16)]
    );
    assert_eq!(ub.size, 32);

    let block = global_named(m, "Material_Vertex");
    assert!(ep.interface.contains(&block));
    let decorations = op_decorations(m, block);
    assert!(decorations.contains(&DecorationKind::Binding(0)));
    assert!(decorations.contains(&DecorationKind::DescriptorSet(0)));

    let input = global_named(m, "In_Pos");
    assert_eq!(op_decorations(m, input), vec![DecorationKind::Location(0)]);

    // Position, Pos and both uniforms are copied in or out.
    let copy_in = function(m, "CopyInputs_Main");
    let loads = codes(m, copy_in).iter().filter(|&&c| c == Load).count();
    assert_eq!(loads, 3);
    m.check_structure().expect("well-formed module");
}

#[test]
fn geometry_entry_point_passes_streams() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let geo = b.struct_type(
        "Geo",
        vec![attr("Geometry").with("MaxVertices", AttributeValue::Int(3))],
    );
    let main = b.method(
        geo,
        "Main",
        &[("input", core.integer), ("output", core.integer)],
        core.void,
    );
    b.attribute_function(main, attr("EntryPoint"));
    let (input, output) = (b.variable(), b.variable());
    b.body(main, &[input, output], vec![]);

    let t = translate(&b.finish());
    assert_translated(&t);
    let m = &t.module;
    let ep = &m.entry_points[0];
    assert_eq!(ep.execution_modes, vec![ExecutionMode::OutputVertices(3)]);
    assert!(ep.capabilities.contains(&Capability::Geometry));
    assert!(m.capabilities.contains(&Capability::Geometry));

    let user_call = ops(m, ep.function)
        .into_iter()
        .filter(|&op| m.ops[op].code == FunctionCall)
        .find(|&op| m.ops[op].args[0].as_function() == Some(ep.user_function))
        .expect("call to the user entry point");
    assert_eq!(m.ops[user_call].args.len(), 4);
}

#[test]
fn global_initializers_run_before_the_entry_point() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let frag = b.struct_type("Frag", vec![attr("Pixel")]);
    b.static_field(frag, "Scale", core.real, vec![], Some(Expr::value("2.0", core.real)));
    let main = b.method(frag, "Main", &[], core.void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(main, &[], vec![]);

    let t = translate(&b.finish());
    assert_translated(&t);
    let m = &t.module;
    let ep = &m.entry_points[0];
    let init = ep.globals_initializer.expect("globals initializer");
    assert_eq!(m.functions[init].name, "InitializeGlobals");
    assert_eq!(codes(m, init), vec![FunctionCall, Return]);
    let first = ops(m, ep.function)[0];
    assert_eq!(m.ops[first].args[0].as_function(), Some(init));
}

#[test]
fn invalid_entry_signature_is_reported() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let frag = b.struct_type("Frag", vec![attr("Pixel")]);
    let main = b.method(frag, "Main", &[("x", core.real)], core.void);
    b.attribute_function(main, attr("EntryPoint"));
    let x = b.variable();
    b.body(main, &[x], vec![]);

    let t = translate(&b.finish());
    assert_error(
        &t,
        "Entry point 'Frag.Main' has an invalid signature for the Pixel stage",
    );
    assert!(t.module.entry_points.is_empty());
}

#[test]
fn unknown_built_ins_are_reported() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let frag = b.struct_type("Frag", vec![attr("Pixel")]);
    b.field(frag, "Banana", core.real, vec![attr("HardwareBuiltInInput")], None);
    let main = b.method(frag, "Main", &[], core.void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(main, &[], vec![]);

    let t = translate(&b.finish());
    assert_error(&t, "'Banana : Real' is not a hardware built-in for the Pixel stage");
}

#[test]
fn entry_points_need_a_stage() {
    let mut b = TreeBuilder::new();
    let void = b.core().void;
    let plain = b.struct_type("Plain", vec![]);
    let main = b.method(plain, "Main", &[], void);
    b.attribute_function(main, attr("EntryPoint"));
    b.body(main, &[], vec![]);

    let t = translate(&b.finish());
    assert_error(&t, "must be declared in a type with exactly one shader stage");
}
