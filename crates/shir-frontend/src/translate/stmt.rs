//! Statement lowering and structured control flow.

use shir_ast::{Expr, ExprKind, IfPart, Stmt, StmtKind, TypeId, VariableId};
use shir_ir::{Block, BlockKind, Handle, OpCode, Operand};

use super::function::{FuncCtx, LoopTargets};
use super::{known, TranslateCtx};

impl TranslateCtx<'_> {
    pub(super) fn lower_block(&mut self, f: &mut FuncCtx, body: &[Stmt]) {
        for stmt in body {
            self.stmt(f, stmt);
        }
    }

    fn stmt(&mut self, f: &mut FuncCtx, stmt: &Stmt) {
        if let Some(location) = known(&stmt.location) {
            f.location = Some(location);
        }
        match &stmt.kind {
            StmtKind::LocalVariable {
                variable,
                name,
                ty,
                initial_value,
                forward,
            } => self.local(f, *variable, name, *ty, initial_value.as_ref(), *forward),
            StmtKind::Expression(e) => {
                self.expr(f, e);
            }
            StmtKind::If(parts) => self.if_chain(f, parts),
            StmtKind::While { condition, body } => self.lower_loop(f, Some(condition), None, body),
            StmtKind::For {
                initializer,
                condition,
                iterator,
                body,
            } => {
                if let Some(init) = initializer {
                    self.stmt(f, init);
                }
                self.lower_loop(f, condition.as_ref(), iterator.as_ref(), body);
            }
            StmtKind::Loop { body } => self.lower_loop(f, None, None, body),
            StmtKind::DoWhile { body, condition } => self.do_while(f, body, condition),
            StmtKind::ForEach { .. } => {
                self.error(
                    Some(&stmt.location),
                    "Unsupported statement",
                    "foreach is not supported.",
                );
            }
            StmtKind::Break => match f.loops.last() {
                Some(targets) => {
                    let merge = targets.merge;
                    self.branch(f, merge);
                }
                None => self.error(
                    Some(&stmt.location),
                    "Invalid break",
                    "'break' must be inside a loop",
                ),
            },
            StmtKind::Continue => match f.loops.last() {
                Some(targets) => {
                    let target = targets.continue_target;
                    self.branch(f, target);
                }
                None => self.error(
                    Some(&stmt.location),
                    "Invalid continue",
                    "'continue' must be inside a loop",
                ),
            },
            StmtKind::Return(value) => self.ret(f, value.as_ref()),
            StmtKind::Scope(body) => self.lower_block(f, body),
        }
    }

    fn local(
        &mut self,
        f: &mut FuncCtx,
        variable: VariableId,
        name: &str,
        ty: TypeId,
        initial_value: Option<&Expr>,
        forward: bool,
    ) {
        let init = initial_value.map(|e| (e, self.expr(f, e)));
        if forward {
            if let Some((_, op)) = init {
                if self.module.is_pointer_op(op) {
                    f.locals.insert(variable, op);
                    return;
                }
            }
        }

        let value_ty = self.ir(ty);
        let var = self.local_variable(f, value_ty, name);
        match init {
            Some((e, op)) => {
                if self.is_non_copyable(ty) && !is_fresh(e) {
                    self.report_copy(Some(&e.location), ty);
                }
                let value = self.to_value(f, op);
                self.store(f, var, value);
            }
            None => self.default_construct(f, var, ty),
        }
        f.locals.insert(variable, var);
    }

    fn ret(&mut self, f: &mut FuncCtx, value: Option<&Expr>) {
        match value {
            Some(e) => {
                let value = self.expr_value(f, e);
                self.emit_op(f, OpCode::ReturnValue, None, [Operand::Op(value)]);
            }
            None => {
                let op = self.op(f, OpCode::Return, None);
                self.emit(f, op);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Every conditional part gets a (true, false, merge) triple up front.
    /// Without a trailing `else`, the last false block is its merge block.
    /// Merge blocks are appended in reverse so each follows everything that
    /// branches to it.
    fn if_chain(&mut self, f: &mut FuncCtx, parts: &[IfPart]) {
        let conditional: Vec<(&Expr, &IfPart)> = parts
            .iter()
            .map_while(|p| p.condition.as_ref().map(|c| (c, p)))
            .collect();
        let otherwise = parts.get(conditional.len());

        let mut arms = Vec::with_capacity(conditional.len());
        for i in 0..conditional.len() {
            let merge = self.module.new_block("ifMerge");
            let on_true = self.module.new_block("ifTrue");
            let last = i + 1 == conditional.len();
            let on_false = if last && otherwise.is_none() {
                merge
            } else {
                self.module.new_block("ifFalse")
            };
            arms.push((on_true, on_false, merge));
        }

        for (&(condition, part), &(on_true, on_false, merge)) in conditional.iter().zip(&arms) {
            if let Some(location) = known(&part.location) {
                f.location = Some(location);
            }
            let value = self.expr_value(f, condition);
            self.set_header(f.current, BlockKind::Selection, merge, None);
            self.branch_conditional(f, value, on_true, on_false);

            self.push_block(f, on_true);
            self.lower_block(f, &part.body);
            self.branch(f, merge);

            if on_false != merge {
                self.push_block(f, on_false);
            }
        }

        if let Some(part) = otherwise {
            self.lower_block(f, &part.body);
            if let Some(&(_, _, merge)) = arms.last() {
                self.branch(f, merge);
            }
        }

        for i in (0..arms.len()).rev() {
            self.push_block(f, arms[i].2);
            if i > 0 {
                self.branch(f, arms[i - 1].2);
            }
        }
    }

    fn set_header(
        &mut self,
        block: Handle<Block>,
        kind: BlockKind,
        merge: Handle<Block>,
        continue_target: Option<Handle<Block>>,
    ) {
        let b = &mut self.module.blocks[block];
        b.kind = kind;
        b.merge = Some(merge);
        b.continue_target = continue_target;
    }

    // -----------------------------------------------------------------------
    // Loops
    // -----------------------------------------------------------------------

    /// `while`, `for` and `loop`: header, condition, body, continue, merge.
    fn lower_loop(
        &mut self,
        f: &mut FuncCtx,
        condition: Option<&Expr>,
        iterator: Option<&Expr>,
        body: &[Stmt],
    ) {
        let header = self.module.new_block("headerBlock");
        let condition_block = self.module.new_block("conditionBlock");
        let body_block = self.module.new_block("loop-body");
        let continue_block = self.module.new_block("continueBlock");
        let merge = self.module.new_block("after-loop");

        self.branch(f, header);
        self.push_block(f, header);
        self.set_header(header, BlockKind::Loop, merge, Some(continue_block));
        self.branch(f, condition_block);

        self.push_block(f, condition_block);
        match condition {
            Some(c) => {
                let value = self.expr_value(f, c);
                self.branch_conditional(f, value, body_block, merge);
            }
            None => self.branch(f, body_block),
        }

        self.push_block(f, body_block);
        f.loops.push(LoopTargets {
            continue_target: continue_block,
            merge,
        });
        self.lower_block(f, body);
        f.loops.pop();
        self.branch(f, continue_block);

        self.push_block(f, continue_block);
        if let Some(iterator) = iterator {
            self.expr(f, iterator);
        }
        self.branch(f, header);

        self.push_block(f, merge);
    }

    /// `do ... while`: header, body, condition (the continue target), merge.
    fn do_while(&mut self, f: &mut FuncCtx, body: &[Stmt], condition: &Expr) {
        let header = self.module.new_block("headerBlock");
        let body_block = self.module.new_block("loop-body");
        let condition_block = self.module.new_block("conditionBlock");
        let merge = self.module.new_block("after-loop");

        self.branch(f, header);
        self.push_block(f, header);
        self.set_header(header, BlockKind::Loop, merge, Some(condition_block));
        self.branch(f, body_block);

        self.push_block(f, body_block);
        f.loops.push(LoopTargets {
            continue_target: condition_block,
            merge,
        });
        self.lower_block(f, body);
        f.loops.pop();
        self.branch(f, condition_block);

        self.push_block(f, condition_block);
        let value = self.expr_value(f, condition);
        self.branch_conditional(f, value, header, merge);

        self.push_block(f, merge);
    }
}

/// Constructor and call results are new objects; anything else names
/// existing storage.
pub(super) fn is_fresh(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Construct { .. } | ExprKind::Call { .. })
}
