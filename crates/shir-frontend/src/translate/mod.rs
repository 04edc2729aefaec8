//! Syntax tree → SHIR lowering.
//!
//! Translation runs in three phases over the whole unit: type collection,
//! signature collection and body lowering. Source errors are reported as
//! diagnostics and replaced by placeholders so the walk keeps going.

mod call;
mod entry;
mod expr;
mod function;
mod signatures;
mod stmt;
mod types;

use std::collections::{HashMap, HashSet};

use shir_ast::{
    AttributeList, ClassNode, CodeLocation, CoreTypes, FieldId, MemberVariableNode, SymbolTable,
    SyntaxTree, TypeId,
};
use shir_ir::{
    Capability, DecorationKind, DecorationTarget, Diagnostic, Diagnostics, Handle, Literal,
    Module, Op, OpCode, Operand, StorageClass, Type, TypeKind,
};
use shir_resolve::ResolverRegistry;

use crate::settings::FinalizedSettings;

use function::FuncCtx;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Module-level translation context: the inputs, the module under
/// construction and the maps from source identities to tree nodes.
pub(crate) struct TranslateCtx<'a> {
    tree: &'a SyntaxTree,
    symbols: &'a SymbolTable,
    registry: &'a ResolverRegistry,
    settings: &'a FinalizedSettings,
    core: CoreTypes,
    module: Module,
    void: Handle<Type>,
    diagnostics: Diagnostics,
    errors: usize,

    classes: HashMap<TypeId, &'a ClassNode>,
    variables: HashMap<FieldId, &'a MemberVariableNode>,
    /// Function types by signature (return type first).
    function_types: HashMap<Vec<Handle<Type>>, Handle<Type>>,
    /// Runtime-array globals are wrapped in a one-member block struct.
    runtime_arrays: HashSet<FieldId>,
    /// Initializer functions still waiting for a body.
    pending_initializers: Vec<(FieldId, Handle<shir_ir::Function>)>,
    initialize_globals: Option<Handle<shir_ir::Function>>,
    next_spec_id: u32,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Runs all phases. Returns the module and every diagnostic raised.
pub(crate) fn translate_tree(
    tree: &SyntaxTree,
    registry: &ResolverRegistry,
    settings: &FinalizedSettings,
) -> (Module, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    if let Err(err) = tree.check_references() {
        log::warn!("syntax tree rejected: {err}");
        diagnostics.items.push(Diagnostic::translation(
            None,
            "Malformed syntax tree",
            err.to_string(),
        ));
        return (Module::new(), diagnostics);
    }
    let Some(core) = CoreTypes::find(&tree.symbols) else {
        log::warn!("syntax tree has no core types");
        diagnostics.items.push(Diagnostic::translation(
            None,
            "Missing core types",
            "The symbol table does not contain the core scalar, vector and matrix types",
        ));
        return (Module::new(), diagnostics);
    };

    let mut ctx = TranslateCtx::new(tree, registry, settings, core);
    ctx.run();
    (ctx.module, ctx.diagnostics)
}

impl<'a> TranslateCtx<'a> {
    fn new(
        tree: &'a SyntaxTree,
        registry: &'a ResolverRegistry,
        settings: &'a FinalizedSettings,
        core: CoreTypes,
    ) -> Self {
        let mut classes = HashMap::new();
        let mut variables = HashMap::new();
        for class in &tree.classes {
            classes.insert(class.ty, class);
            for v in &class.variables {
                variables.insert(v.field, v);
            }
        }
        let mut module = Module::new();
        let void = module.make_type_and_pointer(&tree.symbols.ty(core.void).name, TypeKind::Void);
        module.types[void].source = Some(core.void);
        module.type_map.insert(core.void, void);
        Self {
            tree,
            symbols: &tree.symbols,
            registry,
            settings,
            core,
            module,
            void,
            diagnostics: Diagnostics::new(),
            errors: 0,
            classes,
            variables,
            function_types: HashMap::new(),
            runtime_arrays: HashSet::new(),
            pending_initializers: Vec::new(),
            initialize_globals: None,
            next_spec_id: 0,
        }
    }

    fn run(&mut self) {
        self.collect_types();
        log::debug!("collected {} types", self.module.types.len());
        if self.errors > 0 {
            return;
        }

        self.collect_signatures();
        log::debug!("collected {} function signatures", self.module.functions.len());
        if self.errors > 0 {
            return;
        }

        self.lower_bodies();
        self.lower_entry_points();
        self.module.capabilities.insert(Capability::Shader);

        if self.errors == 0 {
            if let Err(err) = self.module.check_structure() {
                self.error(None, "Internal translator error", err.to_string());
            }
        }
        self.module.translated = self.errors == 0;
        log::info!(
            "translated {} functions and {} types with {} errors",
            self.module.functions.len(),
            self.module.types.len(),
            self.errors
        );
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn error(
        &mut self,
        location: Option<&CodeLocation>,
        short: impl Into<String>,
        full: impl Into<String>,
    ) {
        let d = Diagnostic::translation(location.and_then(known), short, full);
        log::warn!("{d}");
        self.diagnostics.items.push(d);
        self.errors += 1;
    }

    // -----------------------------------------------------------------------
    // Shared lookups
    // -----------------------------------------------------------------------

    /// The IR type of a source type. Every type is mapped in phase 1.
    fn ir(&self, ty: TypeId) -> Handle<Type> {
        self.module.ir_type(ty).unwrap_or(self.void)
    }

    /// The `Function` storage pointer of a source type.
    fn ir_pointer(&mut self, ty: TypeId) -> Handle<Type> {
        let value = self.ir(ty);
        self.module
            .find_or_create_pointer_interface_type(value, StorageClass::Function)
    }

    fn type_name(&self, ty: TypeId) -> &'a str {
        &self.symbols.ty(ty).name
    }

    /// Enums dispatch as `Integer`.
    fn dispatch(&self, ty: TypeId) -> TypeId {
        self.symbols.dispatch_type(ty, self.core.integer)
    }

    fn int_constant(&mut self, value: i32) -> Handle<Op> {
        let int = self.ir(self.core.integer);
        self.module.constant(int, Literal::Int(value))
    }

    fn literal(&mut self, literal: Literal) -> Operand {
        self.module.literal_operand(literal)
    }

    /// Returns the function type for `return_type(parameters)`, creating it
    /// on first use.
    fn function_type(&mut self, return_type: Handle<Type>, parameters: &[Handle<Type>]) -> Handle<Type> {
        let mut key = Vec::with_capacity(parameters.len() + 1);
        key.push(return_type);
        key.extend_from_slice(parameters);
        if let Some(&ty) = self.function_types.get(&key) {
            return ty;
        }
        let name = key
            .iter()
            .map(|&t| self.module.types[t].name.as_str())
            .collect::<Vec<_>>()
            .join("_");
        let ty = self
            .module
            .make_function_type(&format!("fn_{name}"), return_type, parameters);
        self.function_types.insert(key, ty);
        ty
    }

    fn is_non_copyable(&self, ty: TypeId) -> bool {
        self.symbols
            .ty(ty)
            .attributes
            .has_attribute(&self.settings.names().non_copyable)
    }

    /// Adds a decoration unless the target already carries it.
    fn decorate_once(&mut self, target: DecorationTarget, member: Option<u32>, kind: DecorationKind) {
        let exists = self
            .module
            .decorations
            .iter()
            .any(|d| d.target == target && d.member == member && d.kind == kind);
        if !exists {
            self.module.decorate(target, member, kind);
        }
    }

    fn is_void(&self, ty: Handle<Type>) -> bool {
        self.module.types[ty].kind == TypeKind::Void
    }

    /// Builds an instruction with the current debug location.
    fn op(&self, f: &FuncCtx, code: OpCode, ty: Option<Handle<Type>>) -> Op {
        let mut op = Op::new(code, ty);
        op.debug.location = f.location.clone();
        op
    }
}

/// Parses a literal token for a scalar kind. Integers accept a `0x` prefix,
/// floats an `f` suffix.
fn parse_literal(kind: TypeKind, token: &str) -> Option<Literal> {
    match kind {
        TypeKind::Bool => match token {
            "true" => Some(Literal::Bool(true)),
            "false" => Some(Literal::Bool(false)),
            _ => None,
        },
        TypeKind::Int => {
            let hex = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"));
            match hex {
                Some(digits) => u32::from_str_radix(digits, 16)
                    .ok()
                    .map(|v| Literal::Int(v as i32)),
                None => token.parse::<i32>().ok().map(Literal::Int),
            }
        }
        TypeKind::Float => token
            .trim_end_matches(|c| c == 'f' || c == 'F')
            .parse::<f32>()
            .ok()
            .map(Literal::float),
        _ => None,
    }
}

/// Returns `true` if the type has a byte layout and can live in a buffer.
fn has_layout(module: &Module, ty: Handle<Type>) -> bool {
    let t = &module.types[ty];
    match t.kind {
        TypeKind::Bool | TypeKind::Int | TypeKind::Float => true,
        TypeKind::Vector | TypeKind::Matrix | TypeKind::FixedArray => {
            t.element.is_some_and(|e| has_layout(module, e))
        }
        TypeKind::Struct => t.members.iter().all(|m| has_layout(module, m.ty)),
        _ => false,
    }
}

/// A default location means the node has no source position.
fn known(location: &CodeLocation) -> Option<CodeLocation> {
    if *location == CodeLocation::default() {
        None
    } else {
        Some(location.clone())
    }
}
