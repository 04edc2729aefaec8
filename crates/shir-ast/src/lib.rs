//! Resolved shader syntax tree.
//!
//! The tree is produced by a type-checking front end: every expression
//! carries its result type and every call names the exact overload it binds
//! to. Nothing here parses source text.

pub mod builder;
pub mod core;
mod error;
mod symbols;
mod tree;

use std::collections::HashSet;

pub use crate::builder::TreeBuilder;
pub use crate::core::CoreTypes;
pub use error::AstError;
pub use symbols::{
    Attribute, AttributeList, AttributeParameter, AttributeValue, CodeLocation, FieldId,
    FieldInfo, FunctionId, FunctionInfo, FunctionKind, ParameterInfo, SymbolTable, TypeId,
    TypeInfo, TypeShape, VariableId,
};
pub use tree::{
    AccessUsage, BinaryOperator, ClassNode, Expr, ExprKind, FunctionNode, IfPart, Member,
    MemberVariableNode, ParameterNode, Stmt, StmtKind, UnaryOperator,
};

use serde::{Deserialize, Serialize};

/// A fully resolved compilation unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub symbols: SymbolTable,
    #[serde(default)]
    pub classes: Vec<ClassNode>,
}

impl SyntaxTree {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            classes: Vec::new(),
        }
    }

    /// Iterates over every function body in the tree, including property
    /// accessors.
    pub fn function_nodes(&self) -> impl Iterator<Item = (&ClassNode, &FunctionNode)> {
        self.classes.iter().flat_map(|class| {
            let accessors = class
                .variables
                .iter()
                .flat_map(|v| v.getter.iter().chain(v.setter.iter()));
            class
                .constructors
                .iter()
                .chain(class.functions.iter())
                .chain(accessors)
                .map(move |f| (class, f))
        })
    }

    /// Checks that every identity used by the tree exists in its symbol table
    /// and that locals are declared before use.
    pub fn check_references(&self) -> Result<(), AstError> {
        let symbols = &self.symbols;
        let check_type = |ty: TypeId| {
            symbols
                .try_ty(ty)
                .map(|_| ())
                .ok_or(AstError::UnknownType(ty))
        };

        for t in &symbols.types {
            match &t.shape {
                TypeShape::Vector { element, .. }
                | TypeShape::FixedArray { element, .. }
                | TypeShape::RuntimeArray { element } => check_type(*element)?,
                TypeShape::Matrix { column, .. } => check_type(*column)?,
                _ => {}
            }
            if let Some(base) = t.base {
                check_type(base)?;
            }
        }
        for f in &symbols.functions {
            check_type(f.owner)?;
            check_type(f.return_type)?;
            for p in &f.parameters {
                check_type(p.ty)?;
            }
        }
        for f in &symbols.fields {
            check_type(f.owner)?;
            check_type(f.ty)?;
            for accessor in f.getter.iter().chain(f.setter.iter()) {
                if symbols.try_function(*accessor).is_none() {
                    return Err(AstError::UnknownFunction(*accessor));
                }
            }
        }

        for class in &self.classes {
            let info = symbols
                .try_ty(class.ty)
                .ok_or(AstError::UnknownType(class.ty))?;
            if info.shape != TypeShape::Struct {
                return Err(AstError::NotAStruct(info.name.clone()));
            }
            for var in &class.variables {
                if symbols.try_field(var.field).is_none() {
                    return Err(AstError::UnknownField(var.field));
                }
                if let Some(init) = &var.initial_value {
                    ReferenceChecker::new(symbols, "<initializer>").expr(init)?;
                }
            }
        }

        for (_, node) in self.function_nodes() {
            let info = symbols
                .try_function(node.function)
                .ok_or(AstError::UnknownFunction(node.function))?;
            let mut checker = ReferenceChecker::new(symbols, &info.name);
            for p in &node.parameters {
                check_type(p.ty)?;
                checker.declared.insert(p.variable);
            }
            for stmt in &node.body {
                checker.stmt(stmt)?;
            }
        }
        Ok(())
    }
}

struct ReferenceChecker<'a> {
    symbols: &'a SymbolTable,
    function: &'a str,
    declared: HashSet<VariableId>,
}

impl<'a> ReferenceChecker<'a> {
    fn new(symbols: &'a SymbolTable, function: &'a str) -> Self {
        Self {
            symbols,
            function,
            declared: HashSet::new(),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), AstError> {
        match &stmt.kind {
            StmtKind::LocalVariable {
                variable,
                ty,
                initial_value,
                ..
            } => {
                self.symbols
                    .try_ty(*ty)
                    .ok_or(AstError::UnknownType(*ty))?;
                if let Some(init) = initial_value {
                    self.expr(init)?;
                }
                self.declared.insert(*variable);
                Ok(())
            }
            StmtKind::ForEach {
                variable,
                collection,
                body,
            } => {
                self.expr(collection)?;
                self.declared.insert(*variable);
                body.iter().try_for_each(|s| self.stmt(s))
            }
            StmtKind::For {
                initializer,
                condition,
                iterator,
                body,
            } => {
                if let Some(init) = initializer {
                    self.stmt(init)?;
                }
                for e in condition.iter().chain(iterator.iter()) {
                    self.expr(e)?;
                }
                body.iter().try_for_each(|s| self.stmt(s))
            }
            _ => {
                let mut stmts = Vec::new();
                let mut exprs = Vec::new();
                stmt.for_each_child(|s| stmts.push(s), |e| exprs.push(e));
                exprs.into_iter().try_for_each(|e| self.expr(e))?;
                stmts.into_iter().try_for_each(|s| self.stmt(s))
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), AstError> {
        self.symbols
            .try_ty(expr.ty)
            .ok_or(AstError::UnknownType(expr.ty))?;
        match &expr.kind {
            ExprKind::Local(v) if !self.declared.contains(v) => {
                return Err(AstError::UndeclaredVariable {
                    variable: *v,
                    function: self.function.to_string(),
                });
            }
            ExprKind::StaticType(ty) => {
                self.symbols
                    .try_ty(*ty)
                    .ok_or(AstError::UnknownType(*ty))?;
            }
            ExprKind::MemberAccess { member, .. } => match *member {
                Member::Field(f) => {
                    self.symbols.try_field(f).ok_or(AstError::UnknownField(f))?;
                }
                Member::Function(f) => {
                    self.symbols
                        .try_function(f)
                        .ok_or(AstError::UnknownFunction(f))?;
                }
            },
            ExprKind::Construct {
                constructor: Some(f),
                ..
            } => {
                self.symbols
                    .try_function(*f)
                    .ok_or(AstError::UnknownFunction(*f))?;
            }
            _ => {}
        }
        let mut children = Vec::new();
        expr.for_each_child(|e| children.push(e));
        children.into_iter().try_for_each(|e| self.expr(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_function(body: Vec<Stmt>) -> SyntaxTree {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let s = symbols.add_type(TypeInfo::new("S", TypeShape::Struct));
        let f = symbols.add_function(FunctionInfo {
            name: "Main".into(),
            owner: s,
            kind: FunctionKind::Method,
            is_static: false,
            parameters: Vec::new(),
            return_type: core.void,
            attributes: Vec::new(),
        });
        let mut class = ClassNode::new(s);
        class.functions.push(FunctionNode::new(f, body));
        let mut tree = SyntaxTree::new(symbols);
        tree.classes.push(class);
        tree
    }

    #[test]
    fn valid_tree_passes() {
        let real = TypeId(3);
        let tree = tree_with_function(vec![
            Stmt::local(VariableId(0), "a", real, Some(Expr::value("1.0", real))),
            Stmt::expr(Expr::local(VariableId(0), real)),
        ]);
        tree.check_references().expect("tree should be valid");
    }

    #[test]
    fn undeclared_local_is_rejected() {
        let real = TypeId(3);
        let tree = tree_with_function(vec![Stmt::expr(Expr::local(VariableId(7), real))]);
        match tree.check_references() {
            Err(AstError::UndeclaredVariable { variable, .. }) => {
                assert_eq!(variable, VariableId(7))
            }
            other => panic!("expected UndeclaredVariable, got {other:?}"),
        }
    }

    #[test]
    fn dangling_type_is_rejected() {
        let tree = tree_with_function(vec![Stmt::expr(Expr::value("1", TypeId(999)))]);
        assert!(matches!(
            tree.check_references(),
            Err(AstError::UnknownType(TypeId(999)))
        ));
    }

    #[test]
    fn json_round_trip_preserves_tree() {
        let real = TypeId(3);
        let tree = tree_with_function(vec![Stmt::ret(None)]);
        let json = serde_json::to_string(&tree).expect("serialize");
        let back: SyntaxTree = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, tree);
        assert_eq!(back.symbols.ty(real).name, "Real");
    }
}
