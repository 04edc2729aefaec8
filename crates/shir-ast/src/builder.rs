//! Programmatic construction of syntax trees.
//!
//! Front ends normally deliver trees as JSON. The builder is for tools and
//! tests that assemble a tree in code: it installs the core types, hands out
//! identities and files function bodies under the class that owns them.

use crate::core::CoreTypes;
use crate::symbols::{
    Attribute, FieldId, FieldInfo, FunctionId, FunctionInfo, FunctionKind, ParameterInfo,
    SymbolTable, TypeId, TypeInfo, TypeShape, VariableId,
};
use crate::tree::{ClassNode, Expr, FunctionNode, MemberVariableNode, ParameterNode, Stmt};
use crate::SyntaxTree;

/// Incrementally builds a [`SyntaxTree`] on top of the core types.
#[derive(Clone, Debug)]
pub struct TreeBuilder {
    tree: SyntaxTree,
    core: CoreTypes,
    next_variable: u32,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        Self {
            tree: SyntaxTree::new(symbols),
            core,
            next_variable: 0,
        }
    }

    pub fn core(&self) -> &CoreTypes {
        &self.core
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.tree.symbols
    }

    /// Direct access for declarations without a tree node, such as enum
    /// values or swizzle fields of a core vector.
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.tree.symbols
    }

    pub fn finish(self) -> SyntaxTree {
        self.tree
    }

    // ---- types ----

    /// Declares a struct type and an empty class for it.
    pub fn struct_type(&mut self, name: &str, attributes: Vec<Attribute>) -> TypeId {
        let mut info = TypeInfo::new(name, TypeShape::Struct);
        info.attributes = attributes;
        let ty = self.tree.symbols.add_type(info);
        self.tree.classes.push(ClassNode::new(ty));
        ty
    }

    /// Declares a non-struct type such as an array or enum.
    pub fn add_type(&mut self, name: &str, shape: TypeShape) -> TypeId {
        self.tree.symbols.add_type(TypeInfo::new(name, shape))
    }

    /// The class node of a type declared with [`TreeBuilder::struct_type`].
    pub fn class_mut(&mut self, ty: TypeId) -> &mut ClassNode {
        let index = match self.tree.classes.iter().position(|c| c.ty == ty) {
            Some(i) => i,
            None => {
                self.tree.classes.push(ClassNode::new(ty));
                self.tree.classes.len() - 1
            }
        };
        &mut self.tree.classes[index]
    }

    // ---- fields ----

    /// Declares an instance field and its member node.
    pub fn field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        attributes: Vec<Attribute>,
        initial_value: Option<Expr>,
    ) -> FieldId {
        self.add_field(owner, name, ty, false, attributes, initial_value)
    }

    /// Declares a static field and its member node.
    pub fn static_field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        attributes: Vec<Attribute>,
        initial_value: Option<Expr>,
    ) -> FieldId {
        self.add_field(owner, name, ty, true, attributes, initial_value)
    }

    fn add_field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        is_static: bool,
        attributes: Vec<Attribute>,
        initial_value: Option<Expr>,
    ) -> FieldId {
        let field = self.tree.symbols.add_field(FieldInfo {
            name: name.to_string(),
            owner,
            ty,
            is_static,
            attributes,
            getter: None,
            setter: None,
        });
        let mut node = MemberVariableNode::new(field);
        node.initial_value = initial_value;
        self.class_mut(owner).variables.push(node);
        field
    }

    /// Declares a property with a getter body and an optional setter body.
    /// The setter's single parameter is `value`, bound to `setter_value`.
    pub fn property(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        getter: Vec<Stmt>,
        setter: Option<(VariableId, Vec<Stmt>)>,
    ) -> FieldId {
        let get = self.declare(owner, &format!("Get{name}"), FunctionKind::Getter, false, &[], ty);
        let set = setter.as_ref().map(|_| {
            let void = self.core.void;
            self.declare(owner, &format!("Set{name}"), FunctionKind::Setter, false, &[("value", ty)], void)
        });
        let field = self.tree.symbols.add_field(FieldInfo {
            name: name.to_string(),
            owner,
            ty,
            is_static: false,
            attributes: Vec::new(),
            getter: Some(get),
            setter: set,
        });
        let mut node = MemberVariableNode::new(field);
        node.getter = Some(FunctionNode::new(get, getter));
        if let (Some(set), Some((variable, body))) = (set, setter) {
            let mut f = FunctionNode::new(set, body);
            f.parameters.push(ParameterNode {
                variable,
                name: "value".to_string(),
                ty,
                location: Default::default(),
            });
            node.setter = Some(f);
        }
        self.class_mut(owner).variables.push(node);
        field
    }

    // ---- functions ----

    /// Declares an instance method without a body.
    pub fn method(
        &mut self,
        owner: TypeId,
        name: &str,
        parameters: &[(&str, TypeId)],
        return_type: TypeId,
    ) -> FunctionId {
        self.declare(owner, name, FunctionKind::Method, false, parameters, return_type)
    }

    /// Declares a static function without a body.
    pub fn static_method(
        &mut self,
        owner: TypeId,
        name: &str,
        parameters: &[(&str, TypeId)],
        return_type: TypeId,
    ) -> FunctionId {
        self.declare(owner, name, FunctionKind::Method, true, parameters, return_type)
    }

    pub fn constructor(&mut self, owner: TypeId, parameters: &[(&str, TypeId)]) -> FunctionId {
        self.declare(owner, "Constructor", FunctionKind::Constructor, false, parameters, owner)
    }

    fn declare(
        &mut self,
        owner: TypeId,
        name: &str,
        kind: FunctionKind,
        is_static: bool,
        parameters: &[(&str, TypeId)],
        return_type: TypeId,
    ) -> FunctionId {
        self.tree.symbols.add_function(FunctionInfo {
            name: name.to_string(),
            owner,
            kind,
            is_static,
            parameters: parameters
                .iter()
                .map(|&(name, ty)| ParameterInfo {
                    name: name.to_string(),
                    ty,
                    by_ref: false,
                })
                .collect(),
            return_type,
            attributes: Vec::new(),
        })
    }

    /// Attaches attributes to a declared function.
    pub fn attribute_function(&mut self, function: FunctionId, attribute: Attribute) {
        self.tree.symbols.functions[function.index()]
            .attributes
            .push(attribute);
    }

    /// Marks a parameter as passed by reference.
    pub fn by_ref(&mut self, function: FunctionId, parameter: usize) {
        if let Some(p) = self.tree.symbols.functions[function.index()]
            .parameters
            .get_mut(parameter)
        {
            p.by_ref = true;
        }
    }

    /// Gives a declared function a body. `parameters` binds each declared
    /// parameter to a local variable, in order.
    pub fn body(&mut self, function: FunctionId, parameters: &[VariableId], body: Vec<Stmt>) {
        let info = self.tree.symbols.function(function).clone();
        let mut node = FunctionNode::new(function, body);
        node.parameters = info
            .parameters
            .iter()
            .zip(parameters)
            .map(|(p, &variable)| ParameterNode {
                variable,
                name: p.name.clone(),
                ty: p.ty,
                location: Default::default(),
            })
            .collect();
        let class = self.class_mut(info.owner);
        match info.kind {
            FunctionKind::Constructor => class.constructors.push(node),
            _ => class.functions.push(node),
        }
    }

    /// A fresh local variable identity.
    pub fn variable(&mut self) -> VariableId {
        let v = VariableId(self.next_variable);
        self.next_variable += 1;
        v
    }

    /// Declares (or reuses) the fixed array type `element[length]`.
    pub fn fixed_array(&mut self, element: TypeId, length: u32) -> TypeId {
        self.tree
            .symbols
            .declare_fixed_array(&self.core, element, length)
    }

    /// `Shader.Kill()`, if the core library is installed.
    pub fn kill(&self) -> Option<FunctionId> {
        let shader = self.tree.symbols.find_type(crate::core::SHADER)?;
        self.tree.symbols.find_function(shader, "Kill", &[])
    }

    /// Looks up a `Math` function by name and parameter types.
    pub fn math(&self, name: &str, parameters: &[TypeId]) -> Option<FunctionId> {
        self.tree
            .symbols
            .find_function(self.core.math, name, parameters)
    }
}
