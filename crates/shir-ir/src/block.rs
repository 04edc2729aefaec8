//! Basic blocks.

use crate::arena::Handle;
use crate::op::Op;

/// Structured control-flow role of a block.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum BlockKind {
    #[default]
    Plain,
    /// Header of an `if`: declares a selection merge.
    Selection,
    /// Header of a loop: declares a loop merge and continue target.
    Loop,
}

/// A straight-line instruction list ending in one terminator.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub name: String,
    pub lines: Vec<Handle<Op>>,
    /// `OpVariable` declarations. Only the entry block of a function has any.
    pub local_variables: Vec<Handle<Op>>,
    pub kind: BlockKind,
    pub merge: Option<Handle<Block>>,
    pub continue_target: Option<Handle<Block>>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
