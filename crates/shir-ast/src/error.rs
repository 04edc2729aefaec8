//! Errors for malformed syntax trees.

use crate::symbols::{FieldId, FunctionId, TypeId, VariableId};

/// A syntax tree references something its symbol table does not contain.
#[derive(Debug, thiserror::Error)]
pub enum AstError {
    #[error("unknown type identity {0:?}")]
    UnknownType(TypeId),

    #[error("unknown function identity {0:?}")]
    UnknownFunction(FunctionId),

    #[error("unknown field identity {0:?}")]
    UnknownField(FieldId),

    #[error("variable {variable:?} is used before it is declared in '{function}'")]
    UndeclaredVariable {
        variable: VariableId,
        function: String,
    },

    #[error("class node for '{0}' is not a struct type")]
    NotAStruct(String),
}
