//! Functions.

use shir_ast::FunctionId;

use crate::arena::Handle;
use crate::block::Block;
use crate::op::Op;
use crate::types::Type;

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    /// The function type: return type followed by parameter types.
    pub ty: Handle<Type>,
    /// `OpFunctionParameter` instructions, `self` first for instance methods.
    pub parameter_block: Vec<Handle<Op>>,
    /// Blocks in dominance order, entry first.
    pub blocks: Vec<Handle<Block>>,
    pub source: Option<FunctionId>,
}

impl Function {
    pub fn new(name: impl Into<String>, ty: Handle<Type>) -> Self {
        Self {
            name: name.into(),
            ty,
            parameter_block: Vec::new(),
            blocks: Vec::new(),
            source: None,
        }
    }

    pub fn entry_block(&self) -> Option<Handle<Block>> {
        self.blocks.first().copied()
    }
}
