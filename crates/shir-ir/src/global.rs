//! Module-scope variables, decorations and entry-point descriptors.

use crate::arena::Handle;
use crate::func::Function;
use crate::op::Op;
use crate::stage::ShaderStage;
use crate::types::{StorageClass, Type};

/// A module-scope variable and its lazily created initializer.
#[derive(Clone, Debug)]
pub struct GlobalVariableData {
    /// The `OpVariable` instruction.
    pub instance: Handle<Op>,
    /// `() -> Void` function that stores the declared initial value.
    pub initializer: Option<Handle<Function>>,
}

/// Key under which shared globals are deduplicated.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct GlobalKey {
    pub storage: StorageClass,
    pub ty: Handle<Type>,
    pub name: String,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum DecorationKind {
    Location(u32),
    Binding(u32),
    DescriptorSet(u32),
    BuiltIn(String),
    Block,
    Offset(u32),
    ArrayStride(u32),
    SpecId(u32),
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DecorationTarget {
    Op(Handle<Op>),
    Type(Handle<Type>),
}

/// A decoration on an instruction, a type, or one member of a struct type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Decoration {
    pub target: DecorationTarget,
    pub member: Option<u32>,
    pub kind: DecorationKind,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ExecutionMode {
    OriginUpperLeft,
    LocalSize(u32, u32, u32),
    OutputVertices(u32),
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Capability {
    Shader,
    Geometry,
}

/// Reflection data for one uniform block used by an entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformBufferInfo {
    pub name: String,
    pub binding: u32,
    pub descriptor_set: u32,
    pub size: u32,
    /// `(member name, byte offset)` in declaration order.
    pub members: Vec<(String, u32)>,
}

/// A generated stage entry point.
#[derive(Clone, Debug)]
pub struct EntryPointInfo {
    pub stage: ShaderStage,
    /// The generated `EntryPoint_*` wrapper.
    pub function: Handle<Function>,
    /// The user function the wrapper calls.
    pub user_function: Handle<Function>,
    pub interface: Vec<Handle<Op>>,
    pub execution_modes: Vec<ExecutionMode>,
    pub capabilities: Vec<Capability>,
    pub globals_initializer: Option<Handle<Function>>,
    pub uniform_buffers: Vec<UniformBufferInfo>,
}
