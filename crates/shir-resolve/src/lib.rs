//! Keyed resolver tables.
//!
//! Each table maps a (type, operator) or (type, symbol) key to a resolver:
//! a plain enum naming how the translator lowers that construct. Tables are
//! filled once before translation and only read afterwards. A missing entry
//! is `None`; whether that is an error is the caller's decision.

pub mod core;

use std::collections::HashMap;

use shir_ast::{BinaryOperator, FieldId, FunctionId, TypeId, UnaryOperator};
use shir_ir::{OpCode, ShaderStage};

pub use crate::core::register_core;

/// Name of the extended instruction set used by the core library.
pub const GLSL_STD_450: &str = "GLSL.std.450";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryResolver {
    /// A single instruction over the operand value.
    Op(OpCode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryResolver {
    /// `code left right`.
    Op(OpCode),
    /// `code right left`, e.g. scalar * vector as `VectorTimesScalar`.
    Swapped(OpCode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastResolver {
    Op(OpCode),
    /// The representations agree; the value passes through.
    Identity,
    /// `Select(value, one, zero)`.
    FromBool,
    /// `code value zero` with a not-equal comparison.
    ToBool(OpCode),
}

/// An instruction in an extended instruction set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtInstruction {
    pub set: String,
    pub instruction: u32,
}

impl ExtInstruction {
    pub fn glsl(instruction: u32) -> Self {
        Self {
            set: GLSL_STD_450.to_string(),
            instruction,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FunctionResolver {
    /// A single instruction over the argument values.
    Op(OpCode),
    ExtInst(ExtInstruction),
    /// Fixed array `Get(index)`: a load through an access chain.
    ArrayGet,
    /// Fixed array `Set(index, value)`: a store through an access chain.
    ArraySet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructorResolver {
    /// `CompositeConstruct` over every argument.
    Composite,
    /// `CompositeConstruct` repeating the single argument for every component.
    Splat,
    /// The type's default value.
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultConstructorResolver {
    /// A scalar zero constant.
    NullConstant,
    /// `CompositeConstruct` of zero components, recursively.
    ZeroComposite,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldResolver {
    Component(u32),
    Swizzle(Vec<u32>),
    MatrixElement { column: u32, row: u32 },
    /// The constant length of a fixed array.
    ArrayLength(u32),
}

/// Tried when a type has no resolver for a specific field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupFieldResolver {
    /// Parses the field name as a swizzle over `X`, `Y`, `Z` and `W`.
    VectorSwizzle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetterResolver {
    Component(u32),
    Swizzle(Vec<u32>),
}

/// Parses a swizzle name such as `XZY` into component indices. `W` is
/// component 3. Returns `None` for names longer than four or containing
/// other characters.
pub fn parse_swizzle(name: &str) -> Option<Vec<u32>> {
    if name.is_empty() || name.len() > 4 {
        return None;
    }
    name.chars()
        .map(|c| match c {
            'X' => Some(0),
            'Y' => Some(1),
            'Z' => Some(2),
            'W' => Some(3),
            _ => None,
        })
        .collect()
}

/// All resolver tables for one translation.
#[derive(Clone, Debug, Default)]
pub struct ResolverRegistry {
    unary: HashMap<(TypeId, UnaryOperator), UnaryResolver>,
    binary: HashMap<(TypeId, TypeId, BinaryOperator), BinaryResolver>,
    casts: HashMap<(TypeId, TypeId), CastResolver>,
    functions: HashMap<(TypeId, FunctionId), FunctionResolver>,
    constructors: HashMap<(TypeId, FunctionId), ConstructorResolver>,
    default_constructors: HashMap<TypeId, DefaultConstructorResolver>,
    fields: HashMap<(TypeId, FieldId), FieldResolver>,
    backup_fields: HashMap<TypeId, BackupFieldResolver>,
    setters: HashMap<(TypeId, FieldId), SetterResolver>,
    extensions: HashMap<FunctionId, ExtInstruction>,
    stage_requirements: HashMap<FunctionId, ShaderStage>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registration ----

    pub fn register_unary(&mut self, ty: TypeId, op: UnaryOperator, r: UnaryResolver) {
        self.unary.insert((ty, op), r);
    }

    pub fn register_binary(
        &mut self,
        left: TypeId,
        right: TypeId,
        op: BinaryOperator,
        r: BinaryResolver,
    ) {
        self.binary.insert((left, right, op), r);
    }

    pub fn register_cast(&mut self, from: TypeId, to: TypeId, r: CastResolver) {
        self.casts.insert((from, to), r);
    }

    pub fn register_function(&mut self, owner: TypeId, function: FunctionId, r: FunctionResolver) {
        self.functions.insert((owner, function), r);
    }

    pub fn register_constructor(
        &mut self,
        ty: TypeId,
        constructor: FunctionId,
        r: ConstructorResolver,
    ) {
        self.constructors.insert((ty, constructor), r);
    }

    pub fn register_default_constructor(&mut self, ty: TypeId, r: DefaultConstructorResolver) {
        self.default_constructors.insert(ty, r);
    }

    pub fn register_field(&mut self, owner: TypeId, field: FieldId, r: FieldResolver) {
        self.fields.insert((owner, field), r);
    }

    pub fn register_backup_field(&mut self, owner: TypeId, r: BackupFieldResolver) {
        self.backup_fields.insert(owner, r);
    }

    pub fn register_setter(&mut self, owner: TypeId, field: FieldId, r: SetterResolver) {
        self.setters.insert((owner, field), r);
    }

    pub fn register_extension(&mut self, function: FunctionId, instruction: ExtInstruction) {
        self.extensions.insert(function, instruction);
    }

    pub fn register_stage_requirement(&mut self, function: FunctionId, stage: ShaderStage) {
        *self.stage_requirements.entry(function).or_default() |= stage;
    }

    // ---- lookup ----

    pub fn unary(&self, ty: TypeId, op: UnaryOperator) -> Option<UnaryResolver> {
        self.unary.get(&(ty, op)).copied()
    }

    pub fn binary(&self, left: TypeId, right: TypeId, op: BinaryOperator) -> Option<BinaryResolver> {
        self.binary.get(&(left, right, op)).copied()
    }

    pub fn cast(&self, from: TypeId, to: TypeId) -> Option<CastResolver> {
        self.casts.get(&(from, to)).copied()
    }

    pub fn function(&self, owner: TypeId, function: FunctionId) -> Option<&FunctionResolver> {
        self.functions.get(&(owner, function))
    }

    pub fn constructor(&self, ty: TypeId, constructor: FunctionId) -> Option<ConstructorResolver> {
        self.constructors.get(&(ty, constructor)).copied()
    }

    pub fn default_constructor(&self, ty: TypeId) -> Option<DefaultConstructorResolver> {
        self.default_constructors.get(&ty).copied()
    }

    pub fn field(&self, owner: TypeId, field: FieldId) -> Option<&FieldResolver> {
        self.fields.get(&(owner, field))
    }

    pub fn backup_field(&self, owner: TypeId) -> Option<BackupFieldResolver> {
        self.backup_fields.get(&owner).copied()
    }

    pub fn setter(&self, owner: TypeId, field: FieldId) -> Option<&SetterResolver> {
        self.setters.get(&(owner, field))
    }

    pub fn extension(&self, function: FunctionId) -> Option<&ExtInstruction> {
        self.extensions.get(&function)
    }

    /// Stages an intrinsic function is restricted to. Empty for unrestricted
    /// or unknown functions.
    pub fn stage_requirement(&self, function: FunctionId) -> ShaderStage {
        self.stage_requirements
            .get(&function)
            .copied()
            .unwrap_or_default()
    }

    /// Returns `true` if the function is lowered by some resolver rather
    /// than by a translated body.
    pub fn is_intrinsic(&self, owner: TypeId, function: FunctionId) -> bool {
        self.functions.contains_key(&(owner, function))
            || self.constructors.contains_key(&(owner, function))
            || self.extensions.contains_key(&function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_are_none() {
        let reg = ResolverRegistry::new();
        assert_eq!(reg.unary(TypeId(0), UnaryOperator::Negate), None);
        assert_eq!(reg.binary(TypeId(0), TypeId(0), BinaryOperator::Add), None);
        assert!(reg.stage_requirement(FunctionId(3)).is_empty());
    }

    #[test]
    fn binary_keys_are_ordered_pairs() {
        let mut reg = ResolverRegistry::new();
        let (scalar, vector) = (TypeId(1), TypeId(2));
        reg.register_binary(
            vector,
            scalar,
            BinaryOperator::Multiply,
            BinaryResolver::Op(OpCode::VectorTimesScalar),
        );
        reg.register_binary(
            scalar,
            vector,
            BinaryOperator::Multiply,
            BinaryResolver::Swapped(OpCode::VectorTimesScalar),
        );
        assert_eq!(
            reg.binary(scalar, vector, BinaryOperator::Multiply),
            Some(BinaryResolver::Swapped(OpCode::VectorTimesScalar))
        );
        assert_eq!(reg.binary(vector, vector, BinaryOperator::Multiply), None);
    }

    #[test]
    fn overloads_resolve_independently() {
        let mut reg = ResolverRegistry::new();
        let owner = TypeId(4);
        reg.register_function(owner, FunctionId(10), FunctionResolver::Op(OpCode::Dot));
        reg.register_function(
            owner,
            FunctionId(11),
            FunctionResolver::ExtInst(ExtInstruction::glsl(66)),
        );
        assert_eq!(
            reg.function(owner, FunctionId(10)),
            Some(&FunctionResolver::Op(OpCode::Dot))
        );
        assert!(matches!(
            reg.function(owner, FunctionId(11)),
            Some(FunctionResolver::ExtInst(e)) if e.instruction == 66
        ));
        assert!(reg.is_intrinsic(owner, FunctionId(11)));
        assert!(!reg.is_intrinsic(owner, FunctionId(12)));
    }

    #[test]
    fn swizzle_names() {
        assert_eq!(parse_swizzle("XYZ"), Some(vec![0, 1, 2]));
        assert_eq!(parse_swizzle("WX"), Some(vec![3, 0]));
        assert_eq!(parse_swizzle("XYZWX"), None);
        assert_eq!(parse_swizzle("XQ"), None);
        assert_eq!(parse_swizzle(""), None);
    }

    #[test]
    fn stage_requirements_accumulate() {
        let mut reg = ResolverRegistry::new();
        reg.register_stage_requirement(FunctionId(1), ShaderStage::PIXEL);
        assert_eq!(reg.stage_requirement(FunctionId(1)), ShaderStage::PIXEL);
    }
}
