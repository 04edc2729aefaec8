//! Error types for the SHIR IR.

/// Structural problems found when checking a finished module.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// A block does not end in a terminator.
    #[error("block '{block}' in function '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    /// A terminator appears before the last instruction of a block.
    #[error("block '{block}' in function '{function}' has a terminator at position {position} of {len}")]
    MisplacedTerminator {
        function: String,
        block: String,
        position: usize,
        len: usize,
    },

    /// A type mismatch was detected.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
}
