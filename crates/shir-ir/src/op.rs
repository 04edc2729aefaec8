//! Instructions and their operands.

use std::fmt;

use shir_ast::CodeLocation;

use crate::arena::Handle;
use crate::block::Block;
use crate::func::Function;
use crate::types::Type;

/// Instruction opcodes. Names follow SPIR-V without the `Op` prefix.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum OpCode {
    Undef,
    Constant,
    ConstantComposite,
    ConstantNull,
    SpecConstant,
    SpecConstantComposite,
    Variable,
    FunctionParameter,
    FunctionCall,
    ExtInst,
    Load,
    Store,
    CopyMemory,
    AccessChain,
    CompositeConstruct,
    CompositeExtract,
    CompositeInsert,
    VectorShuffle,
    Select,
    // arithmetic
    SNegate,
    FNegate,
    IAdd,
    FAdd,
    ISub,
    FSub,
    IMul,
    FMul,
    SDiv,
    FDiv,
    SMod,
    FMod,
    VectorTimesScalar,
    MatrixTimesScalar,
    VectorTimesMatrix,
    MatrixTimesVector,
    MatrixTimesMatrix,
    Dot,
    Transpose,
    // logic
    LogicalEqual,
    LogicalNotEqual,
    LogicalOr,
    LogicalAnd,
    LogicalNot,
    IEqual,
    INotEqual,
    SGreaterThan,
    SGreaterThanEqual,
    SLessThan,
    SLessThanEqual,
    FOrdEqual,
    FOrdNotEqual,
    FOrdLessThan,
    FOrdGreaterThan,
    FOrdLessThanEqual,
    FOrdGreaterThanEqual,
    // bits
    ShiftRightArithmetic,
    ShiftLeftLogical,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Not,
    // conversion
    ConvertFToS,
    ConvertSToF,
    Bitcast,
    // derivatives
    DPdx,
    DPdy,
    Fwidth,
    // control flow
    Branch,
    BranchConditional,
    Switch,
    Kill,
    Return,
    ReturnValue,
    Unreachable,
}

impl OpCode {
    /// Instructions that end a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            OpCode::Branch
                | OpCode::BranchConditional
                | OpCode::Switch
                | OpCode::Kill
                | OpCode::Return
                | OpCode::ReturnValue
                | OpCode::Unreachable
        )
    }

    /// Module-scope constant declarations.
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            OpCode::Constant
                | OpCode::ConstantComposite
                | OpCode::ConstantNull
                | OpCode::SpecConstant
                | OpCode::SpecConstantComposite
        )
    }

    pub fn is_spec_constant(self) -> bool {
        matches!(self, OpCode::SpecConstant | OpCode::SpecConstantComposite)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op{self:?}")
    }
}

/// A deduplicated literal. Floats are stored as their IEEE bits so literals
/// can be hashed.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Float(u32),
    Str(String),
}

impl Literal {
    pub fn float(value: f32) -> Self {
        Literal::Float(value.to_bits())
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Literal::Float(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Literal::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(bits) => write!(f, "{:?}", f32::from_bits(*bits)),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Operand {
    Op(Handle<Op>),
    Type(Handle<Type>),
    Literal(Handle<Literal>),
    Function(Handle<Function>),
    Block(Handle<Block>),
}

impl Operand {
    pub fn as_op(self) -> Option<Handle<Op>> {
        match self {
            Operand::Op(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_block(self) -> Option<Handle<Block>> {
        match self {
            Operand::Block(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_function(self) -> Option<Handle<Function>> {
        match self {
            Operand::Function(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_literal(self) -> Option<Handle<Literal>> {
        match self {
            Operand::Literal(h) => Some(h),
            _ => None,
        }
    }
}

impl From<Handle<Op>> for Operand {
    fn from(h: Handle<Op>) -> Self {
        Operand::Op(h)
    }
}

impl From<Handle<Type>> for Operand {
    fn from(h: Handle<Type>) -> Self {
        Operand::Type(h)
    }
}

impl From<Handle<Literal>> for Operand {
    fn from(h: Handle<Literal>) -> Self {
        Operand::Literal(h)
    }
}

impl From<Handle<Function>> for Operand {
    fn from(h: Handle<Function>) -> Self {
        Operand::Function(h)
    }
}

impl From<Handle<Block>> for Operand {
    fn from(h: Handle<Block>) -> Self {
        Operand::Block(h)
    }
}

/// Source position and free-form notes attached to an instruction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugInfo {
    pub location: Option<CodeLocation>,
    pub comments: Vec<String>,
}

/// One instruction. A pointer-typed result denotes an addressable location.
#[derive(Clone, Debug)]
pub struct Op {
    pub code: OpCode,
    /// `None` for instructions without a result.
    pub result_type: Option<Handle<Type>>,
    pub args: Vec<Operand>,
    pub name: Option<String>,
    pub debug: DebugInfo,
}

impl Op {
    pub fn new(code: OpCode, result_type: Option<Handle<Type>>) -> Self {
        Self {
            code,
            result_type,
            args: Vec::new(),
            name: None,
            debug: DebugInfo::default(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Operand>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the `i`-th operand if it is an instruction.
    pub fn arg_op(&self, i: usize) -> Option<Handle<Op>> {
        self.args.get(i).and_then(|a| a.as_op())
    }
}
