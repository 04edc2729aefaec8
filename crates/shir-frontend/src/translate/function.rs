//! Phase 3 driver: per-function context, body lowering and block fix-up.

use std::collections::HashMap;

use shir_ast::{ClassNode, CodeLocation, FunctionKind, FunctionNode, VariableId};
use shir_ir::{Block, Function, Handle, Op, OpCode, Operand, StorageClass, Type};

use super::{known, TranslateCtx};

/// Targets of `continue` and `break` inside one loop.
#[derive(Clone, Copy, Debug)]
pub(super) struct LoopTargets {
    pub(super) continue_target: Handle<Block>,
    pub(super) merge: Handle<Block>,
}

/// State of the function whose body is being lowered.
pub(super) struct FuncCtx {
    pub(super) function: Handle<Function>,
    /// Holds every `OpVariable` of the function.
    pub(super) entry: Handle<Block>,
    /// Block new instructions are appended to.
    pub(super) current: Handle<Block>,
    /// Blocks in final order. A block is listed once its position is known.
    pub(super) blocks: Vec<Handle<Block>>,
    pub(super) this: Option<Handle<Op>>,
    pub(super) locals: HashMap<VariableId, Handle<Op>>,
    pub(super) loops: Vec<LoopTargets>,
    pub(super) return_type: Handle<Type>,
    /// Location stamped on emitted instructions.
    pub(super) location: Option<CodeLocation>,
}

impl TranslateCtx<'_> {
    pub(super) fn lower_bodies(&mut self) {
        let tree = self.tree;
        for class in &tree.classes {
            self.lower_class(class);
        }
        self.lower_global_initializers();
        log::debug!(
            "lowered bodies, {} functions and {} blocks",
            self.module.functions.len(),
            self.module.blocks.len()
        );
    }

    fn lower_class(&mut self, class: &ClassNode) {
        let ty = self.ir(class.ty);
        if let Some(pre) = self.module.types[ty].pre_constructor {
            self.lower_pre_constructor(class, pre);
        }
        if let Some(auto) = self.module.types[ty].auto_default_constructor {
            self.lower_auto_constructor(class, auto, ty);
        }
        let accessors = class
            .variables
            .iter()
            .flat_map(|v| v.getter.iter().chain(v.setter.iter()));
        for node in class
            .constructors
            .iter()
            .chain(&class.functions)
            .chain(accessors)
        {
            self.lower_function(node);
        }
    }

    /// Initializes every instance member, from its initializer or by default
    /// construction.
    fn lower_pre_constructor(&mut self, class: &ClassNode, function: Handle<Function>) {
        let mut f = self.begin_function(function, true);
        f.location = known(&class.location);
        let owner = self.ir(class.ty);
        let symbols = self.symbols;

        if let Some(this) = f.this {
            for var in &class.variables {
                let field = symbols.field(var.field);
                let Some(&index) = self.module.types[owner].member_index.get(&field.name) else {
                    continue;
                };
                f.location = known(&var.location).or_else(|| known(&class.location));
                let member_ty = self.ir(field.ty);
                let member = self.extract_member(&mut f, this, index as u32, member_ty);
                match &var.initial_value {
                    Some(init) => {
                        let value = self.expr_value(&mut f, init);
                        self.store(&mut f, member, value);
                    }
                    None => self.default_construct(&mut f, member, field.ty),
                }
            }
        }
        self.finish_function(f);
    }

    fn lower_auto_constructor(&mut self, class: &ClassNode, function: Handle<Function>, ty: Handle<Type>) {
        let mut f = self.begin_function(function, true);
        f.location = known(&class.location);
        if let (Some(pre), Some(this)) = (self.module.types[ty].pre_constructor, f.this) {
            self.emit_call(&mut f, pre, &[this]);
        }
        self.finish_function(f);
    }

    fn lower_function(&mut self, node: &FunctionNode) {
        let Some(&function) = self.module.function_map.get(&node.function) else {
            return;
        };
        let symbols = self.symbols;
        let info = symbols.function(node.function);
        let mut f = self.begin_function(function, !info.is_static);
        f.location = known(&node.location);

        // Value parameters get a local copy so the body can take their address.
        let params = self.module.functions[function].parameter_block.clone();
        let offset = usize::from(!info.is_static);
        for (i, (param, p)) in node.parameters.iter().zip(&info.parameters).enumerate() {
            let Some(&op) = params.get(i + offset) else {
                continue;
            };
            let local = if p.by_ref {
                op
            } else {
                let ty = self.ir(p.ty);
                let var = self.local_variable(&f, ty, &format!("{}_Local", param.name));
                self.store(&mut f, var, op);
                var
            };
            f.locals.insert(param.variable, local);
        }

        if info.kind == FunctionKind::Constructor {
            let owner = self.ir(info.owner);
            if let (Some(pre), Some(this)) = (self.module.types[owner].pre_constructor, f.this) {
                self.emit_call(&mut f, pre, &[this]);
            }
        }

        self.lower_block(&mut f, &node.body);
        self.finish_function(f);
    }

    fn lower_global_initializers(&mut self) {
        let pending = std::mem::take(&mut self.pending_initializers);
        for (field, function) in pending {
            let Some(var) = self.variables.get(&field).copied() else {
                continue;
            };
            let Some(global) = self.module.global_for_field(field).map(|g| g.instance) else {
                continue;
            };
            let mut f = self.begin_function(function, false);
            f.location = known(&var.location);
            match &var.initial_value {
                Some(init) => {
                    let value = self.expr_value(&mut f, init);
                    self.store(&mut f, global, value);
                }
                None => {
                    let ty = self.symbols.field(field).ty;
                    self.default_construct(&mut f, global, ty);
                }
            }
            self.finish_function(f);
        }
    }

    // -----------------------------------------------------------------------
    // Function context
    // -----------------------------------------------------------------------

    pub(super) fn begin_function(&mut self, function: Handle<Function>, has_self: bool) -> FuncCtx {
        let entry = self.module.new_block("entry");
        let func = &self.module.functions[function];
        let this = if has_self {
            func.parameter_block.first().copied()
        } else {
            None
        };
        let return_type = self.module.types[func.ty]
            .return_type()
            .unwrap_or(self.void);
        FuncCtx {
            function,
            entry,
            current: entry,
            blocks: vec![entry],
            this,
            locals: HashMap::new(),
            loops: Vec::new(),
            return_type,
            location: None,
        }
    }

    /// Leaves exactly one terminator at the end of every block and attaches
    /// the blocks to the function.
    pub(super) fn finish_function(&mut self, f: FuncCtx) {
        let mut dropped = 0;
        for &block in &f.blocks {
            let lines = &self.module.blocks[block].lines;
            let len = lines.len();
            let first = lines
                .iter()
                .position(|&line| self.module.ops[line].code.is_terminator());
            match first {
                Some(i) => {
                    dropped += len - i - 1;
                    self.module.blocks[block].lines.truncate(i + 1);
                }
                None => {
                    let code = if self.is_void(f.return_type) {
                        OpCode::Return
                    } else {
                        OpCode::Unreachable
                    };
                    self.module.emit(block, Op::new(code, None));
                }
            }
        }
        if dropped > 0 {
            log::debug!(
                "dropped {dropped} unreachable instructions from '{}'",
                self.module.functions[f.function].name
            );
        }
        self.module.functions[f.function].blocks = f.blocks;
    }

    // -----------------------------------------------------------------------
    // Emission helpers
    // -----------------------------------------------------------------------

    pub(super) fn emit(&mut self, f: &FuncCtx, op: Op) -> Handle<Op> {
        self.module.emit(f.current, op)
    }

    pub(super) fn emit_op(
        &mut self,
        f: &FuncCtx,
        code: OpCode,
        ty: Option<Handle<Type>>,
        args: impl IntoIterator<Item = Operand>,
    ) -> Handle<Op> {
        let op = self.op(f, code, ty).with_args(args);
        self.emit(f, op)
    }

    /// Declares a `Function` storage variable in the entry block.
    pub(super) fn local_variable(&mut self, f: &FuncCtx, value: Handle<Type>, name: &str) -> Handle<Op> {
        let pointer = self
            .module
            .find_or_create_pointer_interface_type(value, StorageClass::Function);
        let op = self.op(f, OpCode::Variable, Some(pointer)).named(name);
        let var = self.module.add_op(op);
        self.module.blocks[f.entry].local_variables.push(var);
        var
    }

    /// Stands in for the result of a construct that failed to translate.
    pub(super) fn placeholder(&mut self, f: &FuncCtx, ty: Handle<Type>) -> Handle<Op> {
        self.local_variable(f, ty, "dummy")
    }

    pub(super) fn load(&mut self, f: &FuncCtx, pointer: Handle<Op>) -> Handle<Op> {
        let ty = self
            .module
            .op_type(pointer)
            .map(|t| self.module.value_type(t));
        self.emit_op(f, OpCode::Load, ty, [Operand::Op(pointer)])
    }

    pub(super) fn store(&mut self, f: &FuncCtx, pointer: Handle<Op>, value: Handle<Op>) {
        self.emit_op(
            f,
            OpCode::Store,
            None,
            [Operand::Op(pointer), Operand::Op(value)],
        );
    }

    /// Loads through `op` if it is a pointer.
    pub(super) fn to_value(&mut self, f: &FuncCtx, op: Handle<Op>) -> Handle<Op> {
        if self.module.is_pointer_op(op) {
            self.load(f, op)
        } else {
            op
        }
    }

    /// Forwards a pointer, or spills a value into a fresh local.
    pub(super) fn to_pointer(&mut self, f: &FuncCtx, op: Handle<Op>) -> Handle<Op> {
        if self.module.is_pointer_op(op) {
            return op;
        }
        let Some(ty) = self.module.op_type(op) else {
            return op;
        };
        let var = self.local_variable(f, ty, "temp");
        self.store(f, var, op);
        var
    }

    pub(super) fn branch(&mut self, f: &FuncCtx, target: Handle<Block>) {
        self.emit_op(f, OpCode::Branch, None, [Operand::Block(target)]);
    }

    pub(super) fn branch_conditional(
        &mut self,
        f: &FuncCtx,
        condition: Handle<Op>,
        on_true: Handle<Block>,
        on_false: Handle<Block>,
    ) {
        self.emit_op(
            f,
            OpCode::BranchConditional,
            None,
            [
                Operand::Op(condition),
                Operand::Block(on_true),
                Operand::Block(on_false),
            ],
        );
    }

    /// Appends `block` to the function and makes it current.
    pub(super) fn push_block(&mut self, f: &mut FuncCtx, block: Handle<Block>) {
        f.blocks.push(block);
        f.current = block;
    }

    /// Calls a translated function. Pointer parameters that cannot take the
    /// operand directly receive a temporary, copied back after the call.
    pub(super) fn emit_call(
        &mut self,
        f: &mut FuncCtx,
        callee: Handle<Function>,
        args: &[Handle<Op>],
    ) -> Handle<Op> {
        let signature = self.module.types[self.module.functions[callee].ty]
            .signature
            .clone();
        let return_type = signature.first().copied().unwrap_or(self.void);

        let mut operands = vec![Operand::Function(callee)];
        let mut postamble = Vec::new();
        for (&arg, &param) in args.iter().zip(signature.iter().skip(1)) {
            if !self.module.is_pointer(param) {
                let value = self.to_value(f, arg);
                operands.push(Operand::Op(value));
                continue;
            }
            let direct = self.module.op_type(arg) == Some(param)
                && matches!(
                    self.module.ops[arg].code,
                    OpCode::Variable | OpCode::FunctionParameter
                );
            if direct {
                operands.push(Operand::Op(arg));
                continue;
            }
            let value_ty = self.module.value_type(param);
            let temp = self.local_variable(f, value_ty, "temp");
            if self.module.is_pointer_op(arg) {
                let value = self.load(f, arg);
                self.store(f, temp, value);
                postamble.push((arg, temp));
            } else {
                self.store(f, temp, arg);
            }
            operands.push(Operand::Op(temp));
        }

        let call = self.emit_op(f, OpCode::FunctionCall, Some(return_type), operands);
        for (original, temp) in postamble {
            let value = self.load(f, temp);
            self.store(f, original, value);
        }
        call
    }
}
