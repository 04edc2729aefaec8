//! Stage requirement inference.
//!
//! Every function, field and pre-constructor is visited once. A visit merges
//! the requirements of everything the symbol references; the first
//! non-empty reference is remembered as the blame source. A symbol that
//! declares a stage must only depend on that stage. A symbol that declares
//! none inherits what its dependencies require.

use std::collections::{HashMap, HashSet};

use shir_ast::{Attribute, TypeId};
use shir_ir::{Diagnostic, DiagnosticSink, Module, ShaderStage, StageRequirement, SymbolKey};

use crate::walk::references;
use crate::{Pass, PassContext};

/// Infers stage requirements and reports stage mismatches.
#[derive(Debug, Default)]
pub struct StageRequirementGatherer;

impl Pass for StageRequirementGatherer {
    fn name(&self) -> &str {
        "stage-requirements"
    }

    fn run(&self, ctx: &PassContext<'_>, module: &mut Module, sink: &mut dyn DiagnosticSink) -> bool {
        let mut gatherer = Gatherer {
            ctx,
            cache: HashMap::new(),
            visiting: HashSet::new(),
            diagnostics: Vec::new(),
        };
        for key in ctx.index.symbols_in_order() {
            gatherer.visit(key);
        }

        for (key, requirement) in gatherer.cache {
            if !requirement.required.is_empty() {
                module.stage_requirements.insert(key, requirement);
            }
        }
        let valid = gatherer.diagnostics.is_empty();
        for d in gatherer.diagnostics {
            sink.report(d);
        }
        valid
    }
}

struct Gatherer<'c, 'a> {
    ctx: &'c PassContext<'a>,
    cache: HashMap<SymbolKey, StageRequirement>,
    visiting: HashSet<SymbolKey>,
    diagnostics: Vec<Diagnostic>,
}

impl Gatherer<'_, '_> {
    fn visit(&mut self, key: SymbolKey) -> ShaderStage {
        if let Some(requirement) = self.cache.get(&key) {
            return requirement.required;
        }
        // Recursion is reported by the cycle detector.
        if !self.visiting.insert(key) {
            return ShaderStage::NONE;
        }

        let mut requirement = StageRequirement::default();
        if let SymbolKey::Function(f) = key {
            requirement.required |= self.ctx.registry.stage_requirement(f);
        }
        for reference in references(&self.ctx.index, key) {
            let required = self.visit(reference.target);
            requirement.combine(required, reference.target, reference.location);
        }

        let declared = self.declared_stage(key);
        if !declared.is_empty() {
            if !requirement.required.is_empty() && requirement.required != declared {
                self.report(key, declared, &requirement);
                requirement.dependency = None;
                requirement.location = None;
            }
            requirement.required = declared;
        }
        self.visiting.remove(&key);
        let required = requirement.required;
        self.cache.insert(key, requirement);
        required
    }

    /// Stages named by stage or `Requires*` attributes on the symbol or its
    /// owner type.
    fn declared_stage(&self, key: SymbolKey) -> ShaderStage {
        let symbols = self.ctx.index.symbols;
        let (attributes, owner): (&[Attribute], TypeId) = match key {
            SymbolKey::Function(f) => {
                let info = symbols.function(f);
                (info.attributes.as_slice(), info.owner)
            }
            SymbolKey::Field(f) => {
                let info = symbols.field(f);
                (info.attributes.as_slice(), info.owner)
            }
            SymbolKey::PreConstructor(ty) => (<&[Attribute]>::default(), ty),
        };
        let names = self.ctx.settings.names();
        attributes
            .iter()
            .chain(&symbols.ty(owner).attributes)
            .filter_map(|a| names.stage_of(&a.name).or_else(|| names.requirement_of(&a.name)))
            .fold(ShaderStage::NONE, |acc, stage| acc | stage)
    }

    /// Follows blame pointers down to the deepest dependency, collecting the
    /// reference locations on the way.
    fn report(&mut self, key: SymbolKey, declared: ShaderStage, requirement: &StageRequirement) {
        let mut call_stack = Vec::new();
        let mut deepest = key;
        let mut next = requirement
            .dependency
            .map(|d| (d, requirement.location.clone()));
        while let Some((dependency, location)) = next.take() {
            call_stack.extend(location);
            deepest = dependency;
            if call_stack.len() > self.cache.len() {
                break;
            }
            next = self
                .cache
                .get(&dependency)
                .and_then(|r| r.dependency.map(|d| (d, r.location.clone())));
        }
        let required = self
            .cache
            .get(&deepest)
            .map_or(requirement.required, |r| r.required);

        let index = &self.ctx.index;
        let message = format!(
            "'{}' requires shader stage {declared} but references '{}' which requires stage {required}",
            index.name(key),
            index.name(deepest)
        );
        log::warn!("{message}");
        self.diagnostics.push(Diagnostic::validation(
            index.location(key),
            "Invalid shader stage combination",
            message,
            call_stack,
        ));
    }
}
