//! The symbols a declaration's body refers to.

use shir_ast::{
    CodeLocation, Expr, ExprKind, FunctionKind, Member, Stmt, StmtKind, TypeId, TypeShape,
};
use shir_ir::SymbolKey;

use crate::index::SymbolIndex;
use crate::known;

/// One reference from a body to another symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub target: SymbolKey,
    pub location: Option<CodeLocation>,
}

/// References made by `symbol`, in source order.
///
/// Functions report their body; constructors also run their type's
/// pre-constructor. A field reports its initializer. A pre-constructor
/// reports every instance field it initializes.
pub fn references(index: &SymbolIndex<'_>, symbol: SymbolKey) -> Vec<Reference> {
    let mut walker = Walker {
        index,
        out: Vec::new(),
        location: index.location(symbol),
    };
    match symbol {
        SymbolKey::Function(f) => {
            let Some(node) = index.function(f) else {
                return Vec::new();
            };
            let info = index.symbols.function(f);
            if info.kind == FunctionKind::Constructor {
                walker.push(SymbolKey::PreConstructor(info.owner), known(&node.location));
            }
            for stmt in &node.body {
                walker.stmt(stmt);
            }
        }
        SymbolKey::Field(f) => {
            if let Some(init) = index.field(f).and_then(|v| v.initial_value.as_ref()) {
                walker.expr(init);
            }
        }
        SymbolKey::PreConstructor(ty) => {
            let Some(class) = index.class(ty) else {
                return Vec::new();
            };
            for var in &class.variables {
                let info = index.symbols.field(var.field);
                if !var.is_property() && !info.is_static {
                    walker.push(SymbolKey::Field(var.field), known(&var.location));
                }
            }
        }
    }
    walker.out
}

struct Walker<'i, 'a> {
    index: &'i SymbolIndex<'a>,
    out: Vec<Reference>,
    /// Innermost known location, used for nodes without one.
    location: Option<CodeLocation>,
}

impl Walker<'_, '_> {
    fn push(&mut self, target: SymbolKey, location: Option<CodeLocation>) {
        self.out.push(Reference { target, location });
    }

    fn at(&self, location: &CodeLocation) -> Option<CodeLocation> {
        known(location).or_else(|| self.location.clone())
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let saved = self.location.clone();
        self.location = self.at(&stmt.location);
        if let StmtKind::LocalVariable {
            ty,
            initial_value: None,
            ..
        } = &stmt.kind
        {
            let location = self.location.clone();
            self.default_construction(*ty, location);
        }
        let mut stmts = Vec::new();
        let mut exprs = Vec::new();
        stmt.for_each_child(|s| stmts.push(s), |e| exprs.push(e));
        for e in exprs {
            self.expr(e);
        }
        for s in stmts {
            self.stmt(s);
        }
        self.location = saved;
    }

    fn expr(&mut self, e: &Expr) {
        let saved = self.location.clone();
        self.location = self.at(&e.location);
        let location = self.location.clone();
        match &e.kind {
            ExprKind::MemberAccess {
                member: Member::Function(f),
                ..
            } => self.push(SymbolKey::Function(*f), location),
            ExprKind::MemberAccess {
                member: Member::Field(f),
                usage,
                ..
            } => {
                let info = self.index.symbols.field(*f);
                match (info.getter, info.setter) {
                    (None, None) => self.push(SymbolKey::Field(*f), location),
                    (getter, setter) => {
                        if let Some(getter) = getter.filter(|_| usage.reads()) {
                            self.push(SymbolKey::Function(getter), location.clone());
                        }
                        if let Some(setter) = setter.filter(|_| usage.writes()) {
                            self.push(SymbolKey::Function(setter), location);
                        }
                    }
                }
            }
            ExprKind::Construct {
                constructor: Some(f),
                ..
            } => self.push(SymbolKey::Function(*f), location),
            ExprKind::Construct {
                constructor: None, ..
            } => self.default_construction(e.ty, location),
            _ => {}
        }
        e.for_each_child(|child| self.expr(child));
        self.location = saved;
    }

    /// Default construction of a user struct runs its zero-parameter
    /// constructor, or else its pre-constructor.
    fn default_construction(&mut self, ty: TypeId, location: Option<CodeLocation>) {
        let is_struct = matches!(self.index.symbols.ty(ty).shape, TypeShape::Struct);
        if !is_struct || self.index.class(ty).is_none() {
            return;
        }
        match self.index.zero_parameter_constructor(ty) {
            Some(ctor) => self.push(SymbolKey::Function(ctor), location),
            None => self.push(SymbolKey::PreConstructor(ty), location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shir_ast::{AccessUsage, TreeBuilder};

    #[test]
    fn constructors_run_the_pre_constructor_first() {
        let mut b = TreeBuilder::new();
        let real = b.core().real;
        let point = b.struct_type("Point", vec![]);
        b.field(point, "X", real, vec![], None);
        b.static_field(point, "Origin", real, vec![], None);
        let ctor = b.constructor(point, &[]);
        b.body(ctor, &[], vec![]);
        let tree = b.finish();
        let index = SymbolIndex::new(&tree);

        let refs = references(&index, SymbolKey::Function(ctor));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, SymbolKey::PreConstructor(point));

        // Static fields are not initialized by the pre-constructor.
        let fields = references(&index, SymbolKey::PreConstructor(point));
        assert_eq!(fields.len(), 1);
        assert!(matches!(fields[0].target, SymbolKey::Field(_)));
    }

    #[test]
    fn property_writes_call_the_setter() {
        let mut b = TreeBuilder::new();
        let core = b.core().clone();
        let owner = b.struct_type("Owner", vec![]);
        let value = b.variable();
        let prop = b.property(owner, "Size", core.real, vec![], Some((value, vec![])));
        let run = b.method(owner, "Run", &[], core.void);
        b.body(
            run,
            &[],
            vec![Stmt::expr(Expr::assign(
                Expr::field(Expr::this(owner), prop, core.real),
                Expr::value("1.0", core.real),
            ))],
        );
        let tree = b.finish();
        let index = SymbolIndex::new(&tree);
        let info = tree.symbols.field(prop);

        let refs = references(&index, SymbolKey::Function(run));
        let targets: Vec<_> = refs.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![SymbolKey::Function(info.setter.expect("setter"))]);

        let read = Expr::field(Expr::this(owner), prop, core.real).with_usage(AccessUsage::ReadWrite);
        let mut walker = Walker {
            index: &index,
            out: Vec::new(),
            location: None,
        };
        walker.expr(&read);
        assert_eq!(walker.out.len(), 2);
    }
}
