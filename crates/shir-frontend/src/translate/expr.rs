//! Expression lowering. Every visit returns the instruction holding its
//! result, either pointer-form or value-form.

use shir_ast::{BinaryOperator, Expr, ExprKind, FieldId, Member, TypeId, TypeShape, UnaryOperator};
use shir_ir::{Handle, Literal, Op, OpCode, Operand, Type};
use shir_resolve::{
    parse_swizzle, BackupFieldResolver, BinaryResolver, CastResolver, FieldResolver,
    SetterResolver, UnaryResolver,
};

use super::function::FuncCtx;
use super::stmt::is_fresh;
use super::{known, parse_literal, TranslateCtx};

impl TranslateCtx<'_> {
    pub(super) fn expr(&mut self, f: &mut FuncCtx, e: &Expr) -> Handle<Op> {
        let saved = f.location.clone();
        if let Some(location) = known(&e.location) {
            f.location = Some(location);
        }
        let result = self.expr_inner(f, e);
        f.location = saved;
        result
    }

    /// Lowers `e` and loads the result if it is a pointer.
    pub(super) fn expr_value(&mut self, f: &mut FuncCtx, e: &Expr) -> Handle<Op> {
        let op = self.expr(f, e);
        self.to_value(f, op)
    }

    fn expr_inner(&mut self, f: &mut FuncCtx, e: &Expr) -> Handle<Op> {
        match &e.kind {
            ExprKind::Value(token) => self.value(f, e, token),
            ExprKind::Local(variable) => match f.locals.get(variable) {
                Some(&op) => op,
                None => {
                    self.error(
                        Some(&e.location),
                        "Unknown variable",
                        format!("Local variable {} is not declared", variable.0),
                    );
                    self.placeholder_for(f, e.ty)
                }
            },
            ExprKind::This => match f.this {
                Some(this) => this,
                None => {
                    self.error(
                        Some(&e.location),
                        "Invalid this",
                        "'this' is only available in instance functions",
                    );
                    self.placeholder_for(f, e.ty)
                }
            },
            ExprKind::StaticType(ty) => {
                self.error(
                    Some(&e.location),
                    "Invalid expression",
                    format!("Type '{}' cannot be used as a value", self.type_name(*ty)),
                );
                self.placeholder_for(f, e.ty)
            }
            ExprKind::MemberAccess {
                left,
                member: Member::Field(field),
                ..
            } => self.member(f, e, left, *field),
            ExprKind::MemberAccess {
                member: Member::Function(function),
                ..
            } => {
                self.error(
                    Some(&e.location),
                    "Invalid expression",
                    format!(
                        "Function '{}' must be called",
                        self.symbols.function_path(*function)
                    ),
                );
                self.placeholder_for(f, e.ty)
            }
            ExprKind::Call { callee, arguments } => self.call(f, e, callee, arguments),
            ExprKind::Construct {
                constructor,
                arguments,
            } => self.construct(f, e, *constructor, arguments),
            ExprKind::Unary { op, operand } => self.unary(f, e, *op, operand),
            ExprKind::Binary { op, left, right } if op.is_assignment() => {
                self.assign(f, *op, left, right)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.expr_value(f, left);
                let r = self.expr_value(f, right);
                let ty = self.ir(e.ty);
                self.binary_values(f, e, *op, (left.ty, l), (right.ty, r), ty)
            }
            ExprKind::Cast { operand } => self.cast(f, e, operand),
        }
    }

    pub(super) fn placeholder_for(&mut self, f: &FuncCtx, ty: TypeId) -> Handle<Op> {
        let ty = self.ir(ty);
        self.placeholder(f, ty)
    }

    fn value(&mut self, f: &FuncCtx, e: &Expr, token: &str) -> Handle<Op> {
        let ty = self.ir(e.ty);
        match parse_literal(self.module.types[ty].kind, token) {
            Some(literal) => self.module.constant(ty, literal),
            None => {
                self.error(
                    Some(&e.location),
                    "Invalid literal",
                    format!(
                        "'{token}' is not a valid literal of type '{}'",
                        self.type_name(e.ty)
                    ),
                );
                self.placeholder(f, ty)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Member access
    // -----------------------------------------------------------------------

    /// Resolves `left.field`, trying in order: enum values, globals,
    /// specialization constants, the field resolvers of the left type,
    /// getters and plain struct members.
    fn member(&mut self, f: &mut FuncCtx, e: &Expr, left: &Expr, field: FieldId) -> Handle<Op> {
        let symbols = self.symbols;
        let info = symbols.field(field);

        if matches!(symbols.ty(info.owner).shape, TypeShape::Enum { .. }) {
            if let Some(&c) = self.module.enum_constants.get(&(info.owner, info.name.clone())) {
                return c;
            }
        }

        if let Some(instance) = self.module.global_for_field(field).map(|g| g.instance) {
            if self.runtime_arrays.contains(&field) {
                let array = self.ir(info.ty);
                return self.extract_member(f, instance, 0, array);
            }
            return instance;
        }

        if let Some(&c) = self.module.spec_constant_map.get(&field) {
            return c;
        }

        let owner = self.dispatch(left.ty);
        let result_ty = self.ir(e.ty);
        if let Some(resolver) = self.registry.field(owner, field) {
            if let FieldResolver::ArrayLength(length) = *resolver {
                return self.int_constant(length as i32);
            }
            let base = self.expr_value(f, left);
            return self.field_resolver(f, resolver.clone(), base, result_ty);
        }
        if let Some(BackupFieldResolver::VectorSwizzle) = self.registry.backup_field(owner) {
            let base = self.expr_value(f, left);
            return match parse_swizzle(&info.name) {
                Some(indices) if indices.len() == 1 => {
                    self.field_resolver(f, FieldResolver::Component(indices[0]), base, result_ty)
                }
                Some(indices) => self.field_resolver(f, FieldResolver::Swizzle(indices), base, result_ty),
                None => {
                    self.error(
                        Some(&e.location),
                        "Invalid member",
                        format!(
                            "Cannot resolve vector field '{}' on '{}'",
                            info.name,
                            self.type_name(left.ty)
                        ),
                    );
                    self.placeholder(f, result_ty)
                }
            };
        }

        if let Some(getter_id) = info.getter {
            if let Some(&getter) = self.module.function_map.get(&getter_id) {
                let mut args = Vec::new();
                if !symbols.function(getter_id).is_static {
                    args.push(self.expr(f, left));
                }
                return self.emit_call(f, getter, &args);
            }
        }

        let left_ty = self.ir(left.ty);
        if let Some(&index) = self.module.types[left_ty].member_index.get(&info.name) {
            let base = self.expr(f, left);
            return self.extract_member(f, base, index as u32, result_ty);
        }

        self.error(
            Some(&e.location),
            "Invalid member",
            format!(
                "Member variable access '{}' couldn't be translated",
                symbols.field_path(field)
            ),
        );
        self.placeholder(f, result_ty)
    }

    fn field_resolver(
        &mut self,
        f: &FuncCtx,
        resolver: FieldResolver,
        base: Handle<Op>,
        result_ty: Handle<Type>,
    ) -> Handle<Op> {
        match resolver {
            FieldResolver::Component(index) => {
                let index = self.literal(Literal::Int(index as i32));
                self.emit_op(
                    f,
                    OpCode::CompositeExtract,
                    Some(result_ty),
                    [Operand::Op(base), index],
                )
            }
            FieldResolver::MatrixElement { column, row } => {
                let column = self.literal(Literal::Int(column as i32));
                let row = self.literal(Literal::Int(row as i32));
                self.emit_op(
                    f,
                    OpCode::CompositeExtract,
                    Some(result_ty),
                    [Operand::Op(base), column, row],
                )
            }
            FieldResolver::Swizzle(indices) => {
                let mut args = vec![Operand::Op(base), Operand::Op(base)];
                for i in indices {
                    args.push(self.literal(Literal::Int(i as i32)));
                }
                self.emit_op(f, OpCode::VectorShuffle, Some(result_ty), args)
            }
            FieldResolver::ArrayLength(length) => self.int_constant(length as i32),
        }
    }

    /// Member `index` of a composite: an access chain through a pointer, or
    /// an extract from a value.
    pub(super) fn extract_member(
        &mut self,
        f: &FuncCtx,
        base: Handle<Op>,
        index: u32,
        member_ty: Handle<Type>,
    ) -> Handle<Op> {
        match self.module.op_type(base) {
            Some(base_ty) if self.module.is_pointer(base_ty) => {
                let storage = self.module.types[base_ty].storage;
                let pointer = self
                    .module
                    .find_or_create_pointer_interface_type(member_ty, storage);
                let index = self.int_constant(index as i32);
                self.emit_op(
                    f,
                    OpCode::AccessChain,
                    Some(pointer),
                    [Operand::Op(base), Operand::Op(index)],
                )
            }
            _ => {
                let index = self.literal(Literal::Int(index as i32));
                self.emit_op(
                    f,
                    OpCode::CompositeExtract,
                    Some(member_ty),
                    [Operand::Op(base), index],
                )
            }
        }
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    fn assign(&mut self, f: &mut FuncCtx, op: BinaryOperator, left: &Expr, right: &Expr) -> Handle<Op> {
        let Some(base) = op.compound_base() else {
            if self.is_non_copyable(left.ty) && !is_fresh(right) {
                self.report_copy(Some(&right.location), left.ty);
            }
            let value = self.expr_value(f, right);
            // Property writes become setter calls before any store is tried.
            if self.try_setter(f, left, value) {
                return value;
            }
            let target = self.expr(f, left);
            self.store_to(f, left, target, value);
            return value;
        };

        let target = self.expr(f, left);
        let current = self.to_value(f, target);
        let rhs = self.expr_value(f, right);
        let ty = self.ir(left.ty);
        let result = self.binary_values(f, left, base, (left.ty, current), (right.ty, rhs), ty);
        if self.module.is_pointer_op(target) {
            self.store(f, target, result);
        } else if !self.try_setter(f, left, result) {
            self.store_to(f, left, target, result);
        }
        result
    }

    /// Writes `value` through a user setter or a registry setter. Returns
    /// `false` if `left` has neither.
    fn try_setter(&mut self, f: &mut FuncCtx, left: &Expr, value: Handle<Op>) -> bool {
        let ExprKind::MemberAccess {
            left: receiver,
            member: Member::Field(field),
            ..
        } = &left.kind
        else {
            return false;
        };
        let field = *field;
        if self.module.global_for_field(field).is_some()
            || self.module.spec_constant_map.contains_key(&field)
        {
            return false;
        }

        let symbols = self.symbols;
        let info = symbols.field(field);
        if let Some(setter_id) = info.setter {
            if let Some(&setter) = self.module.function_map.get(&setter_id) {
                let mut args = Vec::new();
                if !symbols.function(setter_id).is_static {
                    args.push(self.expr(f, receiver));
                }
                args.push(value);
                self.emit_call(f, setter, &args);
                return true;
            }
        }

        let owner = self.dispatch(receiver.ty);
        let Some(resolver) = self.registry.setter(owner, field).cloned() else {
            return false;
        };
        let target = self.expr(f, receiver);
        let current = self.to_value(f, target);
        let Some(vector_ty) = self.module.op_type(current) else {
            return false;
        };
        let updated = match resolver {
            SetterResolver::Component(index) => {
                let index = self.literal(Literal::Int(index as i32));
                self.emit_op(
                    f,
                    OpCode::CompositeInsert,
                    Some(vector_ty),
                    [Operand::Op(value), Operand::Op(current), index],
                )
            }
            SetterResolver::Swizzle(indices) => {
                // Components named by the swizzle come from `value`, which
                // follows `current` in the shuffle operands.
                let count = self.module.types[vector_ty].components;
                let mut args = vec![Operand::Op(current), Operand::Op(value)];
                for component in 0..count {
                    let source = match indices.iter().position(|&i| i == component) {
                        Some(k) => count + k as u32,
                        None => component,
                    };
                    args.push(self.literal(Literal::Int(source as i32)));
                }
                self.emit_op(f, OpCode::VectorShuffle, Some(vector_ty), args)
            }
        };
        self.store_to(f, receiver, target, updated);
        true
    }

    /// Stores through `target`, reporting targets that cannot be written.
    fn store_to(&mut self, f: &FuncCtx, e: &Expr, target: Handle<Op>, value: Handle<Op>) {
        if self.module.ops[target].code.is_spec_constant() {
            self.error(
                Some(&e.location),
                "Read-only value",
                "Specialization constants are read-only",
            );
            return;
        }
        if !self.module.is_pointer_op(target) {
            self.error(
                Some(&e.location),
                "Invalid assignment",
                format!(
                    "Assignment target of type '{}' must be a pointer type",
                    self.type_name(e.ty)
                ),
            );
            return;
        }
        self.store(f, target, value);
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    fn unary(&mut self, f: &mut FuncCtx, e: &Expr, op: UnaryOperator, operand: &Expr) -> Handle<Op> {
        match op {
            UnaryOperator::Positive => self.expr(f, operand),
            UnaryOperator::Dereference => {
                let pointer = self.expr(f, operand);
                self.to_value(f, pointer)
            }
            UnaryOperator::AddressOf => {
                let target = self.expr(f, operand);
                if !self.module.is_pointer_op(target) {
                    self.error(
                        Some(&e.location),
                        "Invalid operand",
                        "Cannot take the address of a temporary",
                    );
                    return self.placeholder_for(f, operand.ty);
                }
                target
            }
            UnaryOperator::Increment | UnaryOperator::Decrement => {
                let target = self.expr(f, operand);
                let current = self.to_value(f, target);
                let ty = self.ir(operand.ty);
                let Some(one) = self.splat_constant(f, ty, true) else {
                    return self.unsupported_unary(f, e, op, operand.ty);
                };
                let base = if op == UnaryOperator::Increment {
                    BinaryOperator::Add
                } else {
                    BinaryOperator::Subtract
                };
                let result =
                    self.binary_values(f, e, base, (operand.ty, current), (operand.ty, one), ty);
                if self.module.is_pointer_op(target) {
                    self.store(f, target, result);
                } else if !self.try_setter(f, operand, result) {
                    self.store_to(f, operand, target, result);
                }
                result
            }
            _ => {
                let value = self.expr_value(f, operand);
                match self.registry.unary(self.dispatch(operand.ty), op) {
                    Some(UnaryResolver::Op(code)) => {
                        let ty = self.ir(e.ty);
                        self.emit_op(f, code, Some(ty), [Operand::Op(value)])
                    }
                    None => self.unsupported_unary(f, e, op, operand.ty),
                }
            }
        }
    }

    fn unsupported_unary(&mut self, f: &FuncCtx, e: &Expr, op: UnaryOperator, ty: TypeId) -> Handle<Op> {
        self.error(
            Some(&e.location),
            "Unsupported operator",
            format!(
                "Unary operator '{op}' not supported for type '{}'",
                self.type_name(ty)
            ),
        );
        self.placeholder_for(f, e.ty)
    }

    /// Applies a binary operator to two values. `e` locates diagnostics.
    fn binary_values(
        &mut self,
        f: &FuncCtx,
        e: &Expr,
        op: BinaryOperator,
        (left_ty, left): (TypeId, Handle<Op>),
        (right_ty, right): (TypeId, Handle<Op>),
        result_ty: Handle<Type>,
    ) -> Handle<Op> {
        match self
            .registry
            .binary(self.dispatch(left_ty), self.dispatch(right_ty), op)
        {
            Some(BinaryResolver::Op(code)) => self.emit_op(
                f,
                code,
                Some(result_ty),
                [Operand::Op(left), Operand::Op(right)],
            ),
            Some(BinaryResolver::Swapped(code)) => self.emit_op(
                f,
                code,
                Some(result_ty),
                [Operand::Op(right), Operand::Op(left)],
            ),
            None => {
                self.error(
                    Some(&e.location),
                    "Unsupported operator",
                    format!(
                        "Binary operator '{op}' not supported for types '{}' and '{}'",
                        self.type_name(left_ty),
                        self.type_name(right_ty)
                    ),
                );
                self.placeholder(f, result_ty)
            }
        }
    }

    fn cast(&mut self, f: &mut FuncCtx, e: &Expr, operand: &Expr) -> Handle<Op> {
        let value = self.expr_value(f, operand);
        let (from, to) = (self.dispatch(operand.ty), self.dispatch(e.ty));
        if from == to {
            return value;
        }
        let target = self.ir(e.ty);
        match self.registry.cast(from, to) {
            Some(CastResolver::Op(code)) => self.emit_op(f, code, Some(target), [Operand::Op(value)]),
            Some(CastResolver::Identity) => value,
            Some(CastResolver::FromBool) => {
                let one = self.splat_constant(f, target, true);
                let zero = self.splat_constant(f, target, false);
                match (one, zero) {
                    (Some(one), Some(zero)) => self.emit_op(
                        f,
                        OpCode::Select,
                        Some(target),
                        [Operand::Op(value), Operand::Op(one), Operand::Op(zero)],
                    ),
                    _ => self.unsupported_cast(f, e, operand.ty),
                }
            }
            Some(CastResolver::ToBool(code)) => {
                let source = self.ir(operand.ty);
                match self.splat_constant(f, source, false) {
                    Some(zero) => self.emit_op(
                        f,
                        code,
                        Some(target),
                        [Operand::Op(value), Operand::Op(zero)],
                    ),
                    None => self.unsupported_cast(f, e, operand.ty),
                }
            }
            None => self.unsupported_cast(f, e, operand.ty),
        }
    }

    fn unsupported_cast(&mut self, f: &FuncCtx, e: &Expr, from: TypeId) -> Handle<Op> {
        self.error(
            Some(&e.location),
            "Unsupported cast",
            format!(
                "Cast operator from '{}' to '{}' not supported",
                self.type_name(from),
                self.type_name(e.ty)
            ),
        );
        self.placeholder_for(f, e.ty)
    }
}
