//! Statement and expression nodes of the resolved syntax tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbols::{CodeLocation, FieldId, FunctionId, TypeId, VariableId};

/// One declared struct together with its member declarations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub ty: TypeId,
    #[serde(default)]
    pub location: CodeLocation,
    #[serde(default)]
    pub variables: Vec<MemberVariableNode>,
    #[serde(default)]
    pub constructors: Vec<FunctionNode>,
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
}

impl ClassNode {
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            location: CodeLocation::default(),
            variables: Vec::new(),
            constructors: Vec::new(),
            functions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberVariableNode {
    pub field: FieldId,
    #[serde(default)]
    pub location: CodeLocation,
    #[serde(default)]
    pub initial_value: Option<Expr>,
    #[serde(default)]
    pub getter: Option<FunctionNode>,
    #[serde(default)]
    pub setter: Option<FunctionNode>,
}

impl MemberVariableNode {
    pub fn new(field: FieldId) -> Self {
        Self {
            field,
            location: CodeLocation::default(),
            initial_value: None,
            getter: None,
            setter: None,
        }
    }

    pub fn is_property(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub variable: VariableId,
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub location: CodeLocation,
}

/// A function, constructor, getter or setter with a body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub function: FunctionId,
    #[serde(default)]
    pub location: CodeLocation,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl FunctionNode {
    pub fn new(function: FunctionId, body: Vec<Stmt>) -> Self {
        Self {
            function,
            location: CodeLocation::default(),
            parameters: Vec::new(),
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub location: CodeLocation,
}

/// One arm of an `if` / `else if` / `else` chain. The trailing `else` has no
/// condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfPart {
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub location: CodeLocation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    LocalVariable {
        variable: VariableId,
        name: String,
        ty: TypeId,
        #[serde(default)]
        initial_value: Option<Expr>,
        /// Alias the initializer's storage instead of copying it.
        #[serde(default)]
        forward: bool,
    },
    Expression(Expr),
    If(Vec<IfPart>),
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        condition: Expr,
    },
    For {
        #[serde(default)]
        initializer: Option<Box<Stmt>>,
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        iterator: Option<Expr>,
        body: Vec<Stmt>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    ForEach {
        variable: VariableId,
        collection: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Scope(Vec<Stmt>),
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            location: CodeLocation::default(),
        }
    }

    pub fn at(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expression(expr))
    }

    pub fn local(variable: VariableId, name: &str, ty: TypeId, initial_value: Option<Expr>) -> Self {
        Self::new(StmtKind::LocalVariable {
            variable,
            name: name.to_string(),
            ty,
            initial_value,
            forward: false,
        })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }
}

/// How a member access is used by its parent expression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessUsage {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl AccessUsage {
    pub fn reads(self) -> bool {
        matches!(self, AccessUsage::Read | AccessUsage::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, AccessUsage::Write | AccessUsage::ReadWrite)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Member {
    /// A member variable or property.
    Field(FieldId),
    /// A member function, named as the callee of a call.
    Function(FunctionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Negate,
    Positive,
    LogicalNot,
    BitwiseNot,
    Increment,
    Decrement,
    Dereference,
    AddressOf,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Positive => "+",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
            UnaryOperator::Dereference => "*",
            UnaryOperator::AddressOf => "&",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    BitwiseAndAssign,
    BitwiseOrAssign,
    BitwiseXorAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
}

impl BinaryOperator {
    /// For compound assignments, the operator applied before storing.
    pub fn compound_base(self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        Some(match self {
            AddAssign => Add,
            SubtractAssign => Subtract,
            MultiplyAssign => Multiply,
            DivideAssign => Divide,
            ModuloAssign => Modulo,
            BitwiseAndAssign => BitwiseAnd,
            BitwiseOrAssign => BitwiseOr,
            BitwiseXorAssign => BitwiseXor,
            ShiftLeftAssign => ShiftLeft,
            ShiftRightAssign => ShiftRight,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        self == BinaryOperator::Assign || self.compound_base().is_some()
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperator::*;
        let s = match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            LogicalAnd => "&&",
            LogicalOr => "||",
            BitwiseAnd => "&",
            BitwiseOr => "|",
            BitwiseXor => "^",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Assign => "=",
            AddAssign => "+=",
            SubtractAssign => "-=",
            MultiplyAssign => "*=",
            DivideAssign => "/=",
            ModuloAssign => "%=",
            BitwiseAndAssign => "&=",
            BitwiseOrAssign => "|=",
            BitwiseXorAssign => "^=",
            ShiftLeftAssign => "<<=",
            ShiftRightAssign => ">>=",
        };
        f.write_str(s)
    }
}

/// An expression annotated with its resolved result type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
    #[serde(default)]
    pub location: CodeLocation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A literal token such as `1`, `2.5` or `true`.
    Value(String),
    Local(VariableId),
    This,
    /// A bare type name, the left side of a static member access.
    StaticType(TypeId),
    MemberAccess {
        left: Box<Expr>,
        member: Member,
        #[serde(default)]
        usage: AccessUsage,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    /// `T(args)`. `constructor` is absent for the implicit default constructor.
    Construct {
        #[serde(default)]
        constructor: Option<FunctionId>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Conversion of `operand` to this expression's type.
    Cast {
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeId) -> Self {
        Self {
            kind,
            ty,
            location: CodeLocation::default(),
        }
    }

    pub fn at(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }

    pub fn value(token: &str, ty: TypeId) -> Self {
        Self::new(ExprKind::Value(token.to_string()), ty)
    }

    pub fn local(variable: VariableId, ty: TypeId) -> Self {
        Self::new(ExprKind::Local(variable), ty)
    }

    pub fn this(ty: TypeId) -> Self {
        Self::new(ExprKind::This, ty)
    }

    pub fn static_type(ty: TypeId) -> Self {
        Self::new(ExprKind::StaticType(ty), ty)
    }

    pub fn field(left: Expr, field: FieldId, ty: TypeId) -> Self {
        Self::new(
            ExprKind::MemberAccess {
                left: Box::new(left),
                member: Member::Field(field),
                usage: AccessUsage::Read,
            },
            ty,
        )
    }

    /// Marks a member access as written (or read and written).
    pub fn with_usage(mut self, new_usage: AccessUsage) -> Self {
        if let ExprKind::MemberAccess { usage, .. } = &mut self.kind {
            *usage = new_usage;
        }
        self
    }

    pub fn call(left: Expr, function: FunctionId, arguments: Vec<Expr>, ty: TypeId) -> Self {
        let callee = Expr::new(
            ExprKind::MemberAccess {
                left: Box::new(left),
                member: Member::Function(function),
                usage: AccessUsage::Read,
            },
            ty,
        );
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            ty,
        )
    }

    pub fn construct(ty: TypeId, constructor: Option<FunctionId>, arguments: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Construct {
                constructor,
                arguments,
            },
            ty,
        )
    }

    pub fn unary(op: UnaryOperator, operand: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    /// `left = right`, marking a member-access target as written.
    pub fn assign(left: Expr, right: Expr) -> Self {
        let ty = left.ty;
        Self::binary(
            BinaryOperator::Assign,
            left.with_usage(AccessUsage::Write),
            right,
            ty,
        )
    }

    pub fn cast(operand: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Cast {
                operand: Box::new(operand),
            },
            ty,
        )
    }

    /// Calls `f` for every direct child expression.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match &self.kind {
            ExprKind::Value(_) | ExprKind::Local(_) | ExprKind::This | ExprKind::StaticType(_) => {}
            ExprKind::MemberAccess { left, .. } => f(left),
            ExprKind::Call { callee, arguments } => {
                f(callee);
                arguments.iter().for_each(f);
            }
            ExprKind::Construct { arguments, .. } => arguments.iter().for_each(f),
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand } => f(operand),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
        }
    }
}

impl Stmt {
    /// Calls `stmt` for every nested statement and `expr` for every
    /// expression directly owned by this statement.
    pub fn for_each_child<'a>(
        &'a self,
        mut stmt: impl FnMut(&'a Stmt),
        mut expr: impl FnMut(&'a Expr),
    ) {
        match &self.kind {
            StmtKind::LocalVariable { initial_value, .. } => {
                if let Some(e) = initial_value {
                    expr(e);
                }
            }
            StmtKind::Expression(e) => expr(e),
            StmtKind::If(parts) => {
                for part in parts {
                    if let Some(c) = &part.condition {
                        expr(c);
                    }
                    part.body.iter().for_each(&mut stmt);
                }
            }
            StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
                expr(condition);
                body.iter().for_each(&mut stmt);
            }
            StmtKind::For {
                initializer,
                condition,
                iterator,
                body,
            } => {
                if let Some(init) = initializer {
                    stmt(init);
                }
                if let Some(c) = condition {
                    expr(c);
                }
                if let Some(i) = iterator {
                    expr(i);
                }
                body.iter().for_each(&mut stmt);
            }
            StmtKind::Loop { body } | StmtKind::Scope(body) => body.iter().for_each(&mut stmt),
            StmtKind::ForEach {
                collection, body, ..
            } => {
                expr(collection);
                body.iter().for_each(&mut stmt);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    expr(e);
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_assignment_base() {
        assert_eq!(
            BinaryOperator::AddAssign.compound_base(),
            Some(BinaryOperator::Add)
        );
        assert_eq!(BinaryOperator::Add.compound_base(), None);
        assert!(BinaryOperator::Assign.is_assignment());
        assert!(BinaryOperator::ShiftRightAssign.is_assignment());
        assert!(!BinaryOperator::Less.is_assignment());
    }

    #[test]
    fn assign_marks_write_usage() {
        let t = TypeId(0);
        let target = Expr::field(Expr::this(t), FieldId(3), t);
        let e = Expr::assign(target, Expr::value("1", t));
        let ExprKind::Binary { left, .. } = &e.kind else {
            panic!("expected binary");
        };
        match &left.kind {
            ExprKind::MemberAccess { usage, .. } => assert_eq!(*usage, AccessUsage::Write),
            _ => panic!("expected member access"),
        }
    }

    #[test]
    fn children_are_visited() {
        let t = TypeId(0);
        let e = Expr::binary(
            BinaryOperator::Add,
            Expr::value("1", t),
            Expr::value("2", t),
            t,
        );
        let mut count = 0;
        e.for_each_child(|_| count += 1);
        assert_eq!(count, 2);

        let s = Stmt::new(StmtKind::While {
            condition: Expr::value("true", t),
            body: vec![Stmt::new(StmtKind::Break), Stmt::new(StmtKind::Continue)],
        });
        let (mut stmts, mut exprs) = (0, 0);
        s.for_each_child(|_| stmts += 1, |_| exprs += 1);
        assert_eq!((stmts, exprs), (2, 1));
    }

    #[test]
    fn operators_display() {
        assert_eq!(BinaryOperator::ShiftLeftAssign.to_string(), "<<=");
        assert_eq!(UnaryOperator::AddressOf.to_string(), "&");
    }
}
