//! Identity to declaration maps over a syntax tree.

use std::collections::HashMap;

use shir_ast::{
    ClassNode, CodeLocation, FieldId, FunctionId, FunctionNode, MemberVariableNode, SymbolTable,
    SyntaxTree, TypeId,
};
use shir_ir::SymbolKey;

/// Every declaration with a body, reachable by identity.
///
/// Passes re-enter declarations they only know by reference, so lexical
/// nesting in the tree is not enough.
#[derive(Debug)]
pub struct SymbolIndex<'a> {
    pub symbols: &'a SymbolTable,
    tree: &'a SyntaxTree,
    classes: HashMap<TypeId, &'a ClassNode>,
    functions: HashMap<FunctionId, &'a FunctionNode>,
    fields: HashMap<FieldId, &'a MemberVariableNode>,
}

impl<'a> SymbolIndex<'a> {
    pub fn new(tree: &'a SyntaxTree) -> Self {
        let mut index = Self {
            symbols: &tree.symbols,
            tree,
            classes: HashMap::new(),
            functions: HashMap::new(),
            fields: HashMap::new(),
        };
        for class in &tree.classes {
            index.classes.insert(class.ty, class);
            for node in class.constructors.iter().chain(&class.functions) {
                index.functions.insert(node.function, node);
            }
            for var in &class.variables {
                index.fields.insert(var.field, var);
                for accessor in var.getter.iter().chain(&var.setter) {
                    index.functions.insert(accessor.function, accessor);
                }
            }
        }
        log::trace!(
            "indexed {} classes, {} functions, {} fields",
            index.classes.len(),
            index.functions.len(),
            index.fields.len()
        );
        index
    }

    pub fn class(&self, ty: TypeId) -> Option<&'a ClassNode> {
        self.classes.get(&ty).copied()
    }

    pub fn function(&self, id: FunctionId) -> Option<&'a FunctionNode> {
        self.functions.get(&id).copied()
    }

    pub fn field(&self, id: FieldId) -> Option<&'a MemberVariableNode> {
        self.fields.get(&id).copied()
    }

    /// Whether the symbol has a body in this tree.
    pub fn has_body(&self, key: SymbolKey) -> bool {
        match key {
            SymbolKey::Function(f) => self.functions.contains_key(&f),
            SymbolKey::Field(f) => self.fields.contains_key(&f),
            SymbolKey::PreConstructor(ty) => self.classes.contains_key(&ty),
        }
    }

    /// The constructor taking no arguments, if the class declares one.
    pub fn zero_parameter_constructor(&self, ty: TypeId) -> Option<FunctionId> {
        self.class(ty)?
            .constructors
            .iter()
            .map(|c| c.function)
            .find(|&f| self.symbols.function(f).parameters.is_empty())
    }

    /// Every symbol with a body, in declaration order.
    pub fn symbols_in_order(&self) -> Vec<SymbolKey> {
        let mut out = Vec::new();
        for class in &self.tree.classes {
            out.push(SymbolKey::PreConstructor(class.ty));
            for var in &class.variables {
                out.push(SymbolKey::Field(var.field));
                for accessor in var.getter.iter().chain(&var.setter) {
                    out.push(SymbolKey::Function(accessor.function));
                }
            }
            for node in class.constructors.iter().chain(&class.functions) {
                out.push(SymbolKey::Function(node.function));
            }
        }
        out
    }

    /// `Owner.Name` of a symbol, for diagnostics.
    pub fn name(&self, key: SymbolKey) -> String {
        match key {
            SymbolKey::Function(f) => self.symbols.function_path(f),
            SymbolKey::Field(f) => self.symbols.field_path(f),
            SymbolKey::PreConstructor(ty) => format!("{}.PreConstructor", self.symbols.ty(ty).name),
        }
    }

    /// Where a symbol is declared, when the tree knows.
    pub fn location(&self, key: SymbolKey) -> Option<CodeLocation> {
        let location = match key {
            SymbolKey::Function(f) => &self.function(f)?.location,
            SymbolKey::Field(f) => &self.field(f)?.location,
            SymbolKey::PreConstructor(ty) => &self.class(ty)?.location,
        };
        crate::known(location)
    }
}
