mod common;

use common::*;
use shir_ast::{BinaryOperator, CoreTypes, Expr, IfPart, Stmt, StmtKind, TreeBuilder, TypeId, VariableId};
use shir_ir::{Block, BlockKind, Function, Handle, Module, OpCode};

fn if_part(condition: Option<Expr>, body: Vec<Stmt>) -> IfPart {
    IfPart {
        condition,
        body,
        location: Default::default(),
    }
}

/// The last instruction of the first block named `name`, with its block targets.
fn terminator(m: &Module, f: Handle<Function>, name: &str) -> (OpCode, Vec<Handle<Block>>) {
    let block = m.functions[f]
        .blocks
        .iter()
        .map(|&b| &m.blocks[b])
        .find(|b| b.name == name)
        .unwrap_or_else(|| panic!("no block named '{name}'"));
    let last = *block.lines.last().expect("terminated block");
    let op = &m.ops[last];
    (op.code, op.args.iter().filter_map(|a| a.as_block()).collect())
}

/// A type `Flow` with one method `Run(c: Boolean) -> ret` holding `body`.
fn method_with_body(
    ret: impl FnOnce(&CoreTypes) -> TypeId,
    body: impl FnOnce(&CoreTypes, VariableId) -> Vec<Stmt>,
) -> shir_ast::SyntaxTree {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let owner = b.struct_type("Flow", vec![]);
    let run = b.method(owner, "Run", &[("c", core.boolean)], ret(&core));
    let c = b.variable();
    let stmts = body(&core, c);
    b.body(run, &[c], stmts);
    b.finish()
}

#[test]
fn if_else_blocks_and_merge() {
    let tree = method_with_body(
        |core| core.integer,
        |core, c| {
            vec![Stmt::new(StmtKind::If(vec![
                if_part(
                    Some(Expr::local(c, core.boolean)),
                    vec![Stmt::ret(Some(Expr::value("1", core.integer)))],
                ),
                if_part(None, vec![Stmt::ret(Some(Expr::value("2", core.integer)))]),
            ]))]
        },
    );
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    assert_eq!(block_names(m, f), vec!["entry", "ifTrue", "ifFalse", "ifMerge"]);
    assert_eq!(block_kinds(m, f)[0], BlockKind::Selection);

    let blocks = &m.functions[f].blocks;
    assert_eq!(m.blocks[blocks[0]].merge, Some(blocks[3]));
    // Both arms return, so the merge block is unreachable.
    let merge = &m.blocks[blocks[3]];
    assert_eq!(merge.lines.len(), 1);
    assert_eq!(m.ops[merge.lines[0]].code, OpCode::Unreachable);
    // Branches after a return are dropped.
    let on_true = &m.blocks[blocks[1]];
    assert_eq!(on_true.lines.len(), 1);
    m.check_structure().expect("well-formed module");
}

#[test]
fn else_if_chains_nest_selections() {
    let tree = method_with_body(
        |core| core.void,
        |core, c| {
            vec![Stmt::new(StmtKind::If(vec![
                if_part(Some(Expr::local(c, core.boolean)), vec![]),
                if_part(Some(Expr::value("false", core.boolean)), vec![]),
            ]))]
        },
    );
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    assert_eq!(
        block_names(m, f),
        vec!["entry", "ifTrue", "ifFalse", "ifTrue", "ifMerge", "ifMerge"]
    );
    assert_eq!(
        block_kinds(m, f),
        vec![
            BlockKind::Selection,
            BlockKind::Plain,
            BlockKind::Selection,
            BlockKind::Plain,
            BlockKind::Plain,
            BlockKind::Plain,
        ]
    );
    m.check_structure().expect("well-formed module");
}

#[test]
fn while_loop_layout() {
    let tree = method_with_body(
        |core| core.void,
        |core, c| {
            vec![Stmt::new(StmtKind::While {
                condition: Expr::local(c, core.boolean),
                body: vec![
                    Stmt::new(StmtKind::If(vec![if_part(
                        Some(Expr::local(c, core.boolean)),
                        vec![Stmt::new(StmtKind::Break)],
                    )])),
                    Stmt::new(StmtKind::Continue),
                ],
            })]
        },
    );
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    let names = block_names(m, f);
    assert_eq!(
        &names[..4],
        &["entry", "headerBlock", "conditionBlock", "loop-body"]
    );
    assert_eq!(names.last(), Some(&"after-loop"));
    assert!(names.contains(&"continueBlock"));

    let blocks = &m.functions[f].blocks;
    let header = &m.blocks[blocks[1]];
    assert_eq!(header.kind, BlockKind::Loop);
    let merge = header.merge.expect("loop merge");
    let continue_target = header.continue_target.expect("continue target");
    assert_eq!(m.blocks[merge].name, "after-loop");
    assert_eq!(m.blocks[continue_target].name, "continueBlock");

    // `break` leaves through the merge block, `continue` through the
    // continue target. The branches lowered after them are dropped.
    assert_eq!(terminator(m, f, "ifTrue"), (OpCode::Branch, vec![merge]));
    assert_eq!(
        terminator(m, f, "ifMerge"),
        (OpCode::Branch, vec![continue_target])
    );
    assert_eq!(terminator(m, f, "continueBlock"), (OpCode::Branch, vec![blocks[1]]));
    m.check_structure().expect("well-formed module");
}

#[test]
fn do_while_tests_after_the_body() {
    let tree = method_with_body(
        |core| core.void,
        |core, c| {
            vec![Stmt::new(StmtKind::DoWhile {
                body: vec![],
                condition: Expr::local(c, core.boolean),
            })]
        },
    );
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    assert_eq!(
        block_names(m, f),
        vec!["entry", "headerBlock", "loop-body", "conditionBlock", "after-loop"]
    );
    m.check_structure().expect("well-formed module");
}

#[test]
fn for_loop_iterator_runs_in_the_continue_block() {
    let mut b = TreeBuilder::new();
    let core = b.core().clone();
    let owner = b.struct_type("Flow", vec![]);
    let run = b.method(owner, "Count", &[], core.void);
    let i = b.variable();
    let int = core.integer;
    b.body(
        run,
        &[],
        vec![Stmt::new(StmtKind::For {
            initializer: Some(Box::new(Stmt::local(
                i,
                "i",
                int,
                Some(Expr::value("0", int)),
            ))),
            condition: Some(Expr::binary(
                BinaryOperator::Less,
                Expr::local(i, int),
                Expr::value("4", int),
                core.boolean,
            )),
            iterator: Some(Expr::binary(
                BinaryOperator::AddAssign,
                Expr::local(i, int),
                Expr::value("1", int),
                int,
            )),
            body: vec![
                Stmt::new(StmtKind::If(vec![if_part(
                    Some(Expr::binary(
                        BinaryOperator::Less,
                        Expr::local(i, int),
                        Expr::value("2", int),
                        core.boolean,
                    )),
                    vec![Stmt::new(StmtKind::Continue)],
                )])),
                Stmt::new(StmtKind::Break),
            ],
        })],
    );

    let t = translate(&b.finish());
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Count");
    let blocks = m.functions[f].blocks.clone();
    let continue_block = blocks
        .iter()
        .map(|&b| &m.blocks[b])
        .find(|b| b.name == "continueBlock")
        .expect("continue block");
    let codes: Vec<_> = continue_block
        .lines
        .iter()
        .map(|&op| m.ops[op].code)
        .collect();
    assert_eq!(
        codes,
        vec![OpCode::Load, OpCode::IAdd, OpCode::Store, OpCode::Branch]
    );
    let condition = blocks
        .iter()
        .map(|&b| &m.blocks[b])
        .find(|b| b.name == "conditionBlock")
        .expect("condition block");
    assert!(condition
        .lines
        .iter()
        .any(|&op| m.ops[op].code == OpCode::SLessThan));

    let header = blocks
        .iter()
        .copied()
        .find(|&b| m.blocks[b].kind == BlockKind::Loop)
        .expect("loop header");
    let merge = m.blocks[header].merge.expect("loop merge");
    let continue_target = m.blocks[header].continue_target.expect("continue target");
    assert_eq!(
        terminator(m, f, "ifTrue"),
        (OpCode::Branch, vec![continue_target])
    );
    assert_eq!(terminator(m, f, "ifMerge"), (OpCode::Branch, vec![merge]));
    assert_eq!(
        terminator(m, f, "loop-body").0,
        OpCode::BranchConditional
    );
    m.check_structure().expect("well-formed module");
}

#[test]
fn void_functions_get_an_implicit_return() {
    let tree = method_with_body(|core| core.void, |_, _| vec![]);
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    assert_eq!(codes(m, f), vec![OpCode::Store, OpCode::Return]);
}

#[test]
fn statements_after_return_are_dropped() {
    let tree = method_with_body(
        |core| core.boolean,
        |core, c| {
            vec![
                Stmt::ret(Some(Expr::local(c, core.boolean))),
                Stmt::expr(Expr::assign(
                    Expr::local(c, core.boolean),
                    Expr::value("true", core.boolean),
                )),
            ]
        },
    );
    let t = translate(&tree);
    assert_translated(&t);
    let m = &t.module;
    let f = function(m, "Flow.Run");
    assert_eq!(
        codes(m, f),
        vec![OpCode::Store, OpCode::Load, OpCode::ReturnValue]
    );
}
