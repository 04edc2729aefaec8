//! Function calls, constructor calls and default construction.

use shir_ast::{Expr, ExprKind, FunctionId, Member, TypeId, TypeShape};
use shir_ir::{Handle, Literal, Op, OpCode, Operand, StorageClass, Type, TypeKind};
use shir_resolve::{ConstructorResolver, ExtInstruction, FunctionResolver};

use super::function::FuncCtx;
use super::stmt::is_fresh;
use super::TranslateCtx;

impl TranslateCtx<'_> {
    pub(super) fn call(
        &mut self,
        f: &mut FuncCtx,
        e: &Expr,
        callee: &Expr,
        arguments: &[Expr],
    ) -> Handle<Op> {
        let ExprKind::MemberAccess {
            left,
            member: Member::Function(function),
            ..
        } = &callee.kind
        else {
            self.error(
                Some(&e.location),
                "Invalid call",
                "Only named functions can be called",
            );
            return self.placeholder_for(f, e.ty);
        };
        let function = *function;
        let symbols = self.symbols;
        let info = symbols.function(function);
        let has_receiver = !info.is_static && !matches!(left.kind, ExprKind::StaticType(_));

        if let Some(&target) = self.module.function_map.get(&function) {
            let mut args = Vec::with_capacity(arguments.len() + 1);
            if !info.is_static {
                args.push(self.expr(f, left));
            }
            for (arg, param) in arguments.iter().zip(&info.parameters) {
                if !param.by_ref && self.is_non_copyable(arg.ty) && !is_fresh(arg) {
                    self.report_copy(Some(&arg.location), arg.ty);
                }
                args.push(self.expr(f, arg));
            }
            return self.emit_call(f, target, &args);
        }

        let owner = self.dispatch(info.owner);
        let resolver = self.registry.function(owner, function).cloned();
        if let Some(FunctionResolver::ArrayGet | FunctionResolver::ArraySet) = resolver {
            return self.array_element(f, e, left, arguments);
        }

        let mut values = Vec::with_capacity(arguments.len() + 1);
        if has_receiver {
            values.push(self.expr_value(f, left));
        }
        for arg in arguments {
            values.push(self.expr_value(f, arg));
        }
        let result_ty = self.ir(e.ty);
        let result_ty = (!self.is_void(result_ty)).then_some(result_ty);

        match resolver {
            Some(FunctionResolver::Op(code)) => {
                self.emit_op(f, code, result_ty, values.into_iter().map(Operand::Op))
            }
            Some(FunctionResolver::ExtInst(ext)) => self.ext_inst(f, &ext, result_ty, values),
            Some(FunctionResolver::ArrayGet | FunctionResolver::ArraySet) | None => {
                match self.registry.extension(function) {
                    Some(ext) => self.ext_inst(f, ext, result_ty, values),
                    None => {
                        self.error(
                            Some(&e.location),
                            "Unresolved function",
                            format!(
                                "Failed to translate function call '{}'",
                                symbols.function_path(function)
                            ),
                        );
                        self.placeholder_for(f, e.ty)
                    }
                }
            }
        }
    }

    /// `array.Get(index)` loads and `array.Set(index, value)` stores through
    /// an access chain into the array. Array values are spilled first.
    fn array_element(
        &mut self,
        f: &mut FuncCtx,
        e: &Expr,
        array: &Expr,
        arguments: &[Expr],
    ) -> Handle<Op> {
        let TypeShape::FixedArray { element, .. } = self.symbols.ty(array.ty).shape else {
            return self.placeholder_for(f, e.ty);
        };
        let base = self.expr(f, array);
        let base = self.to_pointer(f, base);
        let (index, value) = match arguments {
            [index] => (index, None),
            [index, value] => (index, Some(value)),
            _ => {
                self.error(
                    Some(&e.location),
                    "Invalid call",
                    "Fixed array access takes an index and an optional value",
                );
                return self.placeholder_for(f, e.ty);
            }
        };
        let index = self.expr_value(f, index);

        let storage = self
            .module
            .op_type(base)
            .map_or(StorageClass::Function, |t| self.module.types[t].storage);
        let element = self.ir(element);
        let pointer = self
            .module
            .find_or_create_pointer_interface_type(element, storage);
        let access = self.emit_op(
            f,
            OpCode::AccessChain,
            Some(pointer),
            [Operand::Op(base), Operand::Op(index)],
        );
        match value {
            Some(value) => {
                let value = self.expr_value(f, value);
                self.emit_op(
                    f,
                    OpCode::Store,
                    None,
                    [Operand::Op(access), Operand::Op(value)],
                )
            }
            None => self.load(f, access),
        }
    }

    fn ext_inst(
        &mut self,
        f: &FuncCtx,
        ext: &ExtInstruction,
        result_ty: Option<Handle<Type>>,
        values: Vec<Handle<Op>>,
    ) -> Handle<Op> {
        self.module.import_extension(&ext.set);
        let mut args = vec![
            self.literal(Literal::Str(ext.set.clone())),
            self.literal(Literal::Int(ext.instruction as i32)),
        ];
        args.extend(values.into_iter().map(Operand::Op));
        self.emit_op(f, OpCode::ExtInst, result_ty, args)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    pub(super) fn construct(
        &mut self,
        f: &mut FuncCtx,
        e: &Expr,
        constructor: Option<FunctionId>,
        arguments: &[Expr],
    ) -> Handle<Op> {
        let ty = self.ir(e.ty);
        let Some(constructor) = constructor else {
            if !arguments.is_empty() {
                self.error(
                    Some(&e.location),
                    "Invalid constructor call",
                    format!(
                        "Type '{}' has no constructor taking {} arguments",
                        self.type_name(e.ty),
                        arguments.len()
                    ),
                );
            }
            let temp = self.local_variable(f, ty, "temp");
            self.default_construct(f, temp, e.ty);
            return temp;
        };

        match self.registry.constructor(self.dispatch(e.ty), constructor) {
            Some(ConstructorResolver::Composite) => {
                let mut values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    values.push(Operand::Op(self.expr_value(f, arg)));
                }
                self.emit_op(f, OpCode::CompositeConstruct, Some(ty), values)
            }
            Some(ConstructorResolver::Splat) => {
                let Some(arg) = arguments.first() else {
                    return self.unresolved_constructor(f, e, constructor);
                };
                let value = self.expr_value(f, arg);
                let count = self.module.types[ty].components;
                self.emit_op(
                    f,
                    OpCode::CompositeConstruct,
                    Some(ty),
                    (0..count).map(|_| Operand::Op(value)),
                )
            }
            Some(ConstructorResolver::Default) => match self.default_value(f, e.ty) {
                Some(value) => value,
                None => self.unresolved_constructor(f, e, constructor),
            },
            None => {
                let Some(&function) = self.module.function_map.get(&constructor) else {
                    return self.unresolved_constructor(f, e, constructor);
                };
                let symbols = self.symbols;
                let params = &symbols.function(constructor).parameters;
                let temp = self.local_variable(f, ty, "temp");
                let mut args = vec![temp];
                for (arg, param) in arguments.iter().zip(params) {
                    if !param.by_ref && self.is_non_copyable(arg.ty) && !is_fresh(arg) {
                        self.report_copy(Some(&arg.location), arg.ty);
                    }
                    args.push(self.expr(f, arg));
                }
                self.emit_call(f, function, &args);
                temp
            }
        }
    }

    fn unresolved_constructor(&mut self, f: &FuncCtx, e: &Expr, constructor: FunctionId) -> Handle<Op> {
        self.error(
            Some(&e.location),
            "Unresolved constructor",
            format!(
                "Failed to translate constructor call '{}'",
                self.symbols.function_path(constructor)
            ),
        );
        self.placeholder_for(f, e.ty)
    }

    /// Initializes the storage behind `target` as a default-constructed `ty`.
    pub(super) fn default_construct(&mut self, f: &mut FuncCtx, target: Handle<Op>, ty: TypeId) {
        let ir = self.ir(ty);
        if let Some(auto) = self.module.types[ir].auto_default_constructor {
            self.emit_call(f, auto, &[target]);
            return;
        }
        if let Some(ctor) = self.zero_parameter_constructor(ty) {
            self.emit_call(f, ctor, &[target]);
            return;
        }
        if let Some(value) = self.default_value(f, ty) {
            self.store(f, target, value);
            return;
        }
        // Interface storage is filled by the pipeline.
        let storage = self
            .module
            .op_type(target)
            .map(|t| self.module.types[t].storage)
            .unwrap_or(StorageClass::Function);
        if storage.is_interface() {
            return;
        }
        self.error(
            f.location.as_ref(),
            "Invalid default construction",
            format!("Couldn't default construct type '{}'", self.type_name(ty)),
        );
    }

    fn zero_parameter_constructor(&self, ty: TypeId) -> Option<Handle<shir_ir::Function>> {
        let class = self.classes.get(&ty)?;
        class
            .constructors
            .iter()
            .find(|c| self.symbols.function(c.function).parameters.is_empty())
            .and_then(|c| self.module.function_map.get(&c.function).copied())
    }

    /// The value a default-constructed intrinsic type holds.
    fn default_value(&mut self, f: &FuncCtx, ty: TypeId) -> Option<Handle<Op>> {
        let ir = self.ir(ty);
        if self.registry.default_constructor(self.dispatch(ty)).is_some() {
            return self.splat_constant(f, ir, false);
        }
        match self.symbols.ty(ty).shape {
            TypeShape::FixedArray { element, length } => {
                let part = self.default_value(f, element)?;
                Some(self.emit_op(
                    f,
                    OpCode::CompositeConstruct,
                    Some(ir),
                    (0..length).map(|_| Operand::Op(part)),
                ))
            }
            _ => None,
        }
    }

    /// A zero (or one) of a scalar type, or a composite of them.
    pub(super) fn splat_constant(&mut self, f: &FuncCtx, ty: Handle<Type>, one: bool) -> Option<Handle<Op>> {
        let t = &self.module.types[ty];
        let scalar = match t.kind {
            TypeKind::Bool => Some(Literal::Bool(one)),
            TypeKind::Int => Some(Literal::Int(i32::from(one))),
            TypeKind::Float => Some(Literal::float(if one { 1.0 } else { 0.0 })),
            _ => None,
        };
        if let Some(literal) = scalar {
            return Some(self.module.constant(ty, literal));
        }
        let count = match t.kind {
            TypeKind::Vector | TypeKind::Matrix => t.components,
            TypeKind::FixedArray => t.length,
            _ => return None,
        };
        let element = t.element?;
        let part = self.splat_constant(f, element, one)?;
        Some(self.emit_op(
            f,
            OpCode::CompositeConstruct,
            Some(ty),
            (0..count).map(|_| Operand::Op(part)),
        ))
    }
}
