//! Shared helpers for translator integration tests.

#![allow(dead_code)]

use shir_ast::{Attribute, FieldId, FieldInfo, SyntaxTree, TreeBuilder, TypeId};
use shir_frontend::{FinalizedSettings, Settings, Translation};
use shir_ir::{BlockKind, DecorationKind, DecorationTarget, Function, Handle, Module, Op, OpCode};
use shir_resolve::{register_core, ResolverRegistry};

pub fn registry(tree: &SyntaxTree) -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    register_core(&mut registry, &tree.symbols).expect("core types installed");
    registry
}

/// Translates with the default settings.
pub fn translate(tree: &SyntaxTree) -> Translation {
    shir_frontend::translate(tree, &registry(tree), &FinalizedSettings::default())
}

pub fn translate_with_settings(tree: &SyntaxTree, settings: Settings) -> Translation {
    let settings = settings.finalize().expect("valid settings");
    shir_frontend::translate(tree, &registry(tree), &settings)
}

pub fn assert_translated(t: &Translation) {
    assert!(
        t.is_translated(),
        "unexpected diagnostics: {:#?}",
        t.diagnostics.items
    );
}

pub fn assert_error(t: &Translation, needle: &str) {
    assert!(!t.is_translated());
    assert!(
        t.diagnostics.contains(needle),
        "no diagnostic containing '{needle}' in {:#?}",
        t.diagnostics.items
    );
}

pub fn attr(name: &str) -> Attribute {
    Attribute::new(name)
}

/// Declares a field with no tree node, e.g. an enum value.
pub fn declare_field(
    b: &mut TreeBuilder,
    owner: TypeId,
    name: &str,
    ty: TypeId,
    is_static: bool,
) -> FieldId {
    b.symbols_mut().add_field(FieldInfo {
        name: name.to_string(),
        owner,
        ty,
        is_static,
        attributes: Vec::new(),
        getter: None,
        setter: None,
    })
}

pub fn function(module: &Module, name: &str) -> Handle<Function> {
    module
        .functions
        .iter()
        .find(|(_, f)| f.name == name)
        .map(|(h, _)| h)
        .unwrap_or_else(|| panic!("no function named '{name}'"))
}

pub fn has_function(module: &Module, name: &str) -> bool {
    module.functions.iter().any(|(_, f)| f.name == name)
}

/// Every instruction of a function, in block order.
pub fn ops(module: &Module, function: Handle<Function>) -> Vec<Handle<Op>> {
    module.functions[function]
        .blocks
        .iter()
        .flat_map(|&b| module.blocks[b].lines.iter().copied())
        .collect()
}

pub fn codes(module: &Module, function: Handle<Function>) -> Vec<OpCode> {
    ops(module, function)
        .into_iter()
        .map(|op| module.ops[op].code)
        .collect()
}

pub fn block_names(module: &Module, function: Handle<Function>) -> Vec<&str> {
    module.functions[function]
        .blocks
        .iter()
        .map(|&b| module.blocks[b].name.as_str())
        .collect()
}

pub fn block_kinds(module: &Module, function: Handle<Function>) -> Vec<BlockKind> {
    module.functions[function]
        .blocks
        .iter()
        .map(|&b| module.blocks[b].kind)
        .collect()
}

/// The first instruction with the given code.
pub fn find_op(module: &Module, function: Handle<Function>, code: OpCode) -> Handle<Op> {
    ops(module, function)
        .into_iter()
        .find(|&op| module.ops[op].code == code)
        .unwrap_or_else(|| panic!("no {code} instruction"))
}

pub fn global_named(module: &Module, name: &str) -> Handle<Op> {
    module
        .globals
        .iter()
        .map(|g| g.instance)
        .find(|&op| module.ops[op].name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("no global named '{name}'"))
}

pub fn op_decorations(module: &Module, op: Handle<Op>) -> Vec<DecorationKind> {
    module
        .decorations
        .iter()
        .filter(|d| d.target == DecorationTarget::Op(op))
        .map(|d| d.kind.clone())
        .collect()
}
