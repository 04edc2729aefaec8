//! Shader syntax tree to SHIR translator.
//!
//! Lowers a resolved [`shir_ast::SyntaxTree`] into a [`shir_ir::Module`]
//! using the intrinsic lowerings of a [`shir_resolve::ResolverRegistry`] and
//! the attribute names, built-ins and buffer layouts of [`FinalizedSettings`].

pub mod settings;
mod translate;

use shir_ast::SyntaxTree;
use shir_ir::{DiagnosticSink, Diagnostics, Module};
use shir_resolve::ResolverRegistry;

pub use settings::{
    BuiltInDirection, BuiltInSetting, ConfigError, DefaultUniformBufferSetting, FieldSetting,
    FinalizedSettings, NameSettings, Settings, StageBuiltIns, UniformBufferSetting,
};

/// The result of translating one compilation unit.
#[derive(Debug)]
pub struct Translation {
    pub module: Module,
    pub diagnostics: Diagnostics,
}

impl Translation {
    /// Returns `true` if translation finished without errors.
    pub fn is_translated(&self) -> bool {
        self.module.translated && !self.diagnostics.has_errors()
    }
}

/// Translate a syntax tree into a SHIR module.
///
/// Source errors never abort translation; they are collected in
/// [`Translation::diagnostics`] and clear the module's `translated` flag.
pub fn translate(
    tree: &SyntaxTree,
    registry: &ResolverRegistry,
    settings: &FinalizedSettings,
) -> Translation {
    let (module, diagnostics) = translate::translate_tree(tree, registry, settings);
    Translation {
        module,
        diagnostics,
    }
}

/// Like [`translate`], reporting each diagnostic to `sink` instead.
pub fn translate_with(
    tree: &SyntaxTree,
    registry: &ResolverRegistry,
    settings: &FinalizedSettings,
    sink: &mut dyn DiagnosticSink,
) -> Module {
    let (module, diagnostics) = translate::translate_tree(tree, registry, settings);
    for d in diagnostics.items {
        sink.report(d);
    }
    module
}
