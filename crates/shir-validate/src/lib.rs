//! Whole-program validation of translated SHIR modules.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] and the two standard passes:
//! the [`StageRequirementGatherer`], which infers and checks the shader
//! stages each symbol needs, and the [`CycleDetector`], which rejects
//! recursive calls.

mod cycles;
mod index;
mod stages;
mod walk;

pub use cycles::CycleDetector;
pub use index::SymbolIndex;
pub use stages::StageRequirementGatherer;
pub use walk::{references, Reference};

use std::fmt::Debug;

use shir_ast::{CodeLocation, SyntaxTree};
use shir_frontend::FinalizedSettings;
use shir_ir::{DiagnosticSink, Module};
use shir_resolve::ResolverRegistry;

/// Read-only inputs shared by every pass.
#[derive(Debug)]
pub struct PassContext<'a> {
    pub tree: &'a SyntaxTree,
    pub registry: &'a ResolverRegistry,
    pub settings: &'a FinalizedSettings,
    pub index: SymbolIndex<'a>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        tree: &'a SyntaxTree,
        registry: &'a ResolverRegistry,
        settings: &'a FinalizedSettings,
    ) -> Self {
        Self {
            tree,
            registry,
            settings,
            index: SymbolIndex::new(tree),
        }
    }
}

/// A validation pass over a translated module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass, reporting problems to `sink`. Returns `true` if the
    /// module passed.
    fn run(&self, ctx: &PassContext<'_>, module: &mut Module, sink: &mut dyn DiagnosticSink) -> bool;
}

/// Runs passes in sequence. Every pass runs even after a failure so one
/// invocation reports as much as possible.
#[derive(Debug)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::standard()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Stage requirements, then recursion.
    pub fn standard() -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(StageRequirementGatherer));
        pm.add_pass(Box::new(CycleDetector));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Runs all passes. Returns `true` if every pass succeeded.
    pub fn run(&self, ctx: &PassContext<'_>, module: &mut Module, sink: &mut dyn DiagnosticSink) -> bool {
        let mut valid = true;
        for pass in &self.passes {
            let passed = pass.run(ctx, module, sink);
            log::debug!("pass '{}' {}", pass.name(), if passed { "passed" } else { "failed" });
            valid &= passed;
        }
        valid
    }
}

/// Runs the standard passes over a translated module.
///
/// A module that failed translation is not validated. On failure the
/// module's `translated` flag is cleared.
pub fn validate(
    tree: &SyntaxTree,
    registry: &ResolverRegistry,
    settings: &FinalizedSettings,
    module: &mut Module,
    sink: &mut dyn DiagnosticSink,
) -> bool {
    if !module.translated {
        log::debug!("skipping validation of a module that failed translation");
        return false;
    }
    let ctx = PassContext::new(tree, registry, settings);
    let valid = PassManager::standard().run(&ctx, module, sink);
    if !valid {
        module.translated = false;
    }
    valid
}

/// `None` for the default (unknown) location.
fn known(location: &CodeLocation) -> Option<CodeLocation> {
    (*location != CodeLocation::default()).then(|| location.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shir_ir::Diagnostics;

    #[test]
    fn empty_pass_manager_accepts_anything() {
        let tree = SyntaxTree::default();
        let registry = ResolverRegistry::new();
        let settings = FinalizedSettings::default();
        let ctx = PassContext::new(&tree, &registry, &settings);
        let mut module = Module::default();
        let mut diagnostics = Diagnostics::new();
        assert!(PassManager::new().run(&ctx, &mut module, &mut diagnostics));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn failed_translations_are_not_validated() {
        let tree = SyntaxTree::default();
        let registry = ResolverRegistry::new();
        let settings = FinalizedSettings::default();
        let mut module = Module::default();
        module.translated = false;
        let mut diagnostics = Diagnostics::new();
        assert!(!validate(&tree, &registry, &settings, &mut module, &mut diagnostics));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unknown_locations_are_dropped() {
        assert_eq!(known(&CodeLocation::default()), None);
        let at = CodeLocation::new("a.shader", 1, 2);
        assert_eq!(known(&at), Some(at));
    }
}
