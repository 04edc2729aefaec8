//! Text dump for debugging.

use std::fmt::Write;

use crate::Module;
use crate::arena::Handle;
use crate::block::BlockKind;
use crate::global::{DecorationKind, DecorationTarget, ExecutionMode};
use crate::op::{Op, Operand};
use crate::types::{Type, TypeKind};

/// Formats a type as its definition, e.g. `vector<Real, 3>`.
pub fn format_type(module: &Module, handle: Handle<Type>) -> String {
    let ty = &module.types[handle];
    let name_of = |h: Option<Handle<Type>>| match h {
        Some(h) => module.types[h].name.clone(),
        None => "?".to_string(),
    };
    match ty.kind {
        TypeKind::Vector => format!("vector<{}, {}>", name_of(ty.element), ty.components),
        TypeKind::Matrix => format!("matrix<{}, {}>", name_of(ty.element), ty.components),
        TypeKind::FixedArray => format!("array<{}, {}>", name_of(ty.element), ty.length),
        TypeKind::RuntimeArray => format!("array<{}>", name_of(ty.element)),
        TypeKind::Pointer => format!("pointer<{}, {}>", ty.storage, name_of(ty.dereference)),
        TypeKind::Struct => {
            let members: Vec<_> = ty
                .members
                .iter()
                .map(|m| format!("{}: {}", m.name, module.types[m.ty].name))
                .collect();
            format!("struct {{ {} }}", members.join(", "))
        }
        TypeKind::Function => {
            let params: Vec<_> = ty
                .parameter_types()
                .iter()
                .map(|&p| module.types[p].name.clone())
                .collect();
            format!("fn({}) -> {}", params.join(", "), name_of(ty.return_type()))
        }
        kind => kind.to_string(),
    }
}

/// Formats one operand: instructions as `%N`, types and functions by name,
/// blocks as `name.N`.
pub fn format_operand(module: &Module, operand: Operand) -> String {
    match operand {
        Operand::Op(h) => format!("{h:?}"),
        Operand::Type(h) => module.types[h].name.clone(),
        Operand::Literal(h) => module.literals[h].to_string(),
        Operand::Function(h) => format!("@{}", module.functions[h].name),
        Operand::Block(h) => block_label(module, h),
    }
}

fn block_label(module: &Module, h: Handle<crate::Block>) -> String {
    format!("{}.{}", module.blocks[h].name, h.index())
}

fn format_op(module: &Module, handle: Handle<Op>) -> String {
    let op = &module.ops[handle];
    let mut out = String::new();
    if let Some(ty) = op.result_type {
        let _ = write!(out, "{handle:?} = {} {}", op.code, module.types[ty].name);
    } else {
        let _ = write!(out, "{}", op.code);
    }
    for &arg in &op.args {
        let _ = write!(out, " {}", format_operand(module, arg));
    }
    if let Some(name) = &op.name {
        let _ = write!(out, "  ; {name}");
    }
    out
}

/// Produces a human-readable dump of the entire module.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    out.push_str("Types:\n");
    for (handle, ty) in module.types.iter() {
        let _ = writeln!(out, "  {handle:?} {} = {}", ty.name, format_type(module, handle));
    }

    if !module.constants.is_empty() || !module.spec_constants.is_empty() {
        out.push_str("\nConstants:\n");
        for &c in module.constants.iter().chain(&module.spec_constants) {
            let _ = writeln!(out, "  {}", format_op(module, c));
        }
    }

    if !module.globals.is_empty() {
        out.push_str("\nGlobal Variables:\n");
        for global in &module.globals {
            let _ = write!(out, "  {}", format_op(module, global.instance));
            if let Some(init) = global.initializer {
                let _ = write!(out, "  init @{}", module.functions[init].name);
            }
            out.push('\n');
        }
    }

    if !module.decorations.is_empty() {
        out.push_str("\nDecorations:\n");
        for d in &module.decorations {
            let target = match d.target {
                DecorationTarget::Op(h) => format!("{h:?}"),
                DecorationTarget::Type(h) => module.types[h].name.clone(),
            };
            let member = d.member.map(|m| format!(" member {m}")).unwrap_or_default();
            let kind = match &d.kind {
                DecorationKind::BuiltIn(name) => format!("BuiltIn {name}"),
                other => format!("{other:?}"),
            };
            let _ = writeln!(out, "  {target}{member} {kind}");
        }
    }

    if !module.functions.is_empty() {
        out.push_str("\nFunctions:\n");
        for (handle, func) in module.functions.iter() {
            dump_function(&mut out, module, handle, func);
        }
    }

    if !module.entry_points.is_empty() {
        out.push_str("\nEntry Points:\n");
        for ep in &module.entry_points {
            let modes: Vec<_> = ep
                .execution_modes
                .iter()
                .map(|m| match m {
                    ExecutionMode::OriginUpperLeft => "OriginUpperLeft".to_string(),
                    ExecutionMode::LocalSize(x, y, z) => format!("LocalSize({x}, {y}, {z})"),
                    ExecutionMode::OutputVertices(n) => format!("OutputVertices({n})"),
                })
                .collect();
            let interface: Vec<_> = ep.interface.iter().map(|h| format!("{h:?}")).collect();
            let _ = writeln!(
                out,
                "  {} @{} -> @{} [{}] interface({})",
                ep.stage,
                module.functions[ep.function].name,
                module.functions[ep.user_function].name,
                modes.join(", "),
                interface.join(", ")
            );
            for ub in &ep.uniform_buffers {
                let _ = writeln!(
                    out,
                    "    uniform {} set={} binding={} size={}",
                    ub.name, ub.descriptor_set, ub.binding, ub.size
                );
            }
        }
    }

    if !module.capabilities.is_empty() {
        let caps: Vec<_> = module.capabilities.iter().map(|c| format!("{c:?}")).collect();
        let _ = writeln!(out, "\nCapabilities: {}", caps.join(", "));
    }
    if !module.extension_imports.is_empty() {
        let _ = writeln!(out, "Extensions: {}", module.extension_imports.join(", "));
    }

    out
}

fn dump_function(out: &mut String, module: &Module, handle: Handle<crate::Function>, func: &crate::Function) {
    let _ = writeln!(
        out,
        "  fn {} : {}  [{handle:?}] {{",
        func.name,
        format_type(module, func.ty)
    );
    for &p in &func.parameter_block {
        let _ = writeln!(out, "    {}", format_op(module, p));
    }
    for &b in &func.blocks {
        let block = &module.blocks[b];
        let _ = write!(out, "  {}:", block_label(module, b));
        match block.kind {
            BlockKind::Plain => {}
            BlockKind::Selection => {
                if let Some(m) = block.merge {
                    let _ = write!(out, "  ; selection merge {}", block_label(module, m));
                }
            }
            BlockKind::Loop => {
                if let (Some(m), Some(c)) = (block.merge, block.continue_target) {
                    let _ = write!(
                        out,
                        "  ; loop merge {} continue {}",
                        block_label(module, m),
                        block_label(module, c)
                    );
                }
            }
        }
        out.push('\n');
        for &v in &block.local_variables {
            let _ = writeln!(out, "    {}", format_op(module, v));
        }
        for &line in &block.lines {
            let _ = writeln!(out, "    {}", format_op(module, line));
        }
    }
    out.push_str("  }\n");
}
