//! Recursion detection over the call graph.

use std::collections::HashMap;

use shir_ast::CodeLocation;
use shir_ir::{Diagnostic, DiagnosticSink, Module, SymbolKey};

use crate::index::SymbolIndex;
use crate::walk::{references, Reference};
use crate::{Pass, PassContext};

/// Reports every call cycle. Shaders have no call stack, so any recursion
/// is an error.
#[derive(Debug, Default)]
pub struct CycleDetector;

impl Pass for CycleDetector {
    fn name(&self) -> &str {
        "recursion"
    }

    fn run(&self, ctx: &PassContext<'_>, _module: &mut Module, sink: &mut dyn DiagnosticSink) -> bool {
        let mut search = Search {
            index: &ctx.index,
            state: HashMap::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        };
        for node in ctx.index.symbols_in_order() {
            if is_node(&ctx.index, node) {
                search.visit(node, None);
            }
        }
        let valid = search.diagnostics.is_empty();
        for d in search.diagnostics {
            sink.report(d);
        }
        valid
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    OnStack,
    Done,
}

struct Frame {
    node: SymbolKey,
    /// Location of the edge that entered this node.
    location: Option<CodeLocation>,
}

struct Search<'i, 'a> {
    index: &'i SymbolIndex<'a>,
    state: HashMap<SymbolKey, State>,
    stack: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
}

impl Search<'_, '_> {
    fn visit(&mut self, node: SymbolKey, location: Option<CodeLocation>) {
        match self.state.get(&node) {
            Some(State::Done) => return,
            Some(State::OnStack) => {
                self.report(node, location);
                return;
            }
            None => {}
        }
        self.state.insert(node, State::OnStack);
        self.stack.push(Frame { node, location });
        for edge in callees(self.index, node) {
            self.visit(edge.target, edge.location);
        }
        self.stack.pop();
        self.state.insert(node, State::Done);
    }

    /// `target` is on the stack: the frames from it to the top form a cycle.
    fn report(&mut self, target: SymbolKey, location: Option<CodeLocation>) {
        let Some(start) = self.stack.iter().position(|f| f.node == target) else {
            return;
        };
        let cycle = &self.stack[start..];
        let path = cycle
            .iter()
            .map(|f| f.node)
            .chain(std::iter::once(target))
            .map(|node| format!("'{}'", self.index.name(node)))
            .collect::<Vec<_>>()
            .join(" -> ");
        let call_stack: Vec<_> = cycle
            .iter()
            .skip(1)
            .filter_map(|f| f.location.clone())
            .chain(location.clone())
            .collect();
        log::warn!("recursion: {path}");
        self.diagnostics.push(Diagnostic::validation(
            location.or_else(|| self.index.location(target)),
            "Recursion is not allowed in shaders",
            format!("Illegal recursion cycle: {path}"),
            call_stack,
        ));
    }
}

/// Functions with bodies and pre-constructors. Field initializers run inside
/// the pre-constructor, so they are folded into it.
fn is_node(index: &SymbolIndex<'_>, key: SymbolKey) -> bool {
    !matches!(key, SymbolKey::Field(_)) && index.has_body(key)
}

fn callees(index: &SymbolIndex<'_>, node: SymbolKey) -> Vec<Reference> {
    let direct = references(index, node);
    let expanded: Vec<Reference> = match node {
        SymbolKey::PreConstructor(_) => direct
            .into_iter()
            .flat_map(|r| match r.target {
                SymbolKey::Field(_) => references(index, r.target),
                _ => vec![r],
            })
            .collect(),
        _ => direct,
    };
    expanded
        .into_iter()
        .filter(|r| is_node(index, r.target))
        .collect()
}
