//! SHIR intermediate representation.
//!
//! A SPIR-V shaped IR: typed instructions grouped into basic blocks and
//! functions, with every type, instruction, block and function owned by a
//! [`Module`] arena and referenced by [`Handle`].

pub mod arena;
mod block;
mod diagnostic;
mod display;
mod error;
mod func;
mod global;
pub mod layout;
mod op;
mod stage;
mod types;

use std::collections::{BTreeSet, HashMap};

use shir_ast::{FieldId, FunctionId, TypeId};

pub use arena::{Arena, Handle, UniqueArena};
pub use block::{Block, BlockKind};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics};
pub use display::{dump_module, format_operand, format_type};
pub use error::IrError;
pub use func::Function;
pub use global::{
    Capability, Decoration, DecorationKind, DecorationTarget, EntryPointInfo, ExecutionMode,
    GlobalKey, GlobalVariableData, UniformBufferInfo,
};
pub use layout::Layout;
pub use op::{DebugInfo, Literal, Op, OpCode, Operand};
pub use stage::{ShaderStage, StageRequirement, SymbolKey};
pub use types::{StorageClass, StructMember, Type, TypeKind, TypeMeta};

/// One translated compilation unit.
///
/// The module is the sole owner of everything in it; cross references are
/// handles. Outside observers see it only after translation has finished.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub types: Arena<Type>,
    pub ops: Arena<Op>,
    pub blocks: Arena<Block>,
    pub functions: Arena<Function>,
    pub literals: UniqueArena<Literal>,

    /// Constant declarations in creation order.
    pub constants: Vec<Handle<Op>>,
    constant_map: HashMap<(Handle<Type>, Handle<Literal>), Handle<Op>>,
    /// Specialization constants in creation order, sub-constants first.
    pub spec_constants: Vec<Handle<Op>>,
    pub spec_constant_map: HashMap<FieldId, Handle<Op>>,

    /// Module-scope variables in declaration order.
    pub globals: Vec<GlobalVariableData>,
    global_by_field: HashMap<FieldId, usize>,
    global_by_op: HashMap<Handle<Op>, usize>,
    shared_globals: HashMap<GlobalKey, usize>,

    pub type_map: HashMap<TypeId, Handle<Type>>,
    pub function_map: HashMap<FunctionId, Handle<Function>>,
    /// Enum value constants keyed by (enum type, value name).
    pub enum_constants: HashMap<(TypeId, String), Handle<Op>>,
    interface_types: HashMap<(Handle<Type>, StorageClass), Handle<Type>>,
    pointer_interface_types: HashMap<(Handle<Type>, StorageClass), Handle<Type>>,

    /// Transitive stage requirements. Only non-empty requirements are stored.
    pub stage_requirements: HashMap<SymbolKey, StageRequirement>,
    pub decorations: Vec<Decoration>,
    pub entry_points: Vec<EntryPointInfo>,
    pub capabilities: BTreeSet<Capability>,
    /// Extended instruction sets referenced by `OpExtInst`.
    pub extension_imports: Vec<String>,

    /// Set once translation finished without errors. Cleared by validation
    /// failures. A module without it must not be handed downstream.
    pub translated: bool,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // ----------------------------------------------------------------
    // Types
    // ----------------------------------------------------------------

    /// Creates a value type together with its `Function` storage pointer.
    pub fn make_type_and_pointer(&mut self, name: &str, kind: TypeKind) -> Handle<Type> {
        let value = self.types.append(Type::new(name, kind));
        let mut pointer = Type::new(format!("{name}_ptr"), TypeKind::Pointer);
        pointer.dereference = Some(value);
        pointer.storage = StorageClass::Function;
        let pointer = self.types.append(pointer);
        self.types[value].pointer = Some(pointer);
        value
    }

    pub fn make_vector_type(&mut self, name: &str, element: Handle<Type>, count: u32) -> Handle<Type> {
        let ty = self.make_type_and_pointer(name, TypeKind::Vector);
        let t = &mut self.types[ty];
        t.element = Some(element);
        t.components = count;
        ty
    }

    /// A matrix of `count` columns of type `column`.
    pub fn make_matrix_type(&mut self, name: &str, column: Handle<Type>, count: u32) -> Handle<Type> {
        let ty = self.make_type_and_pointer(name, TypeKind::Matrix);
        let t = &mut self.types[ty];
        t.element = Some(column);
        t.components = count;
        ty
    }

    pub fn make_array_type(&mut self, name: &str, element: Handle<Type>, length: u32) -> Handle<Type> {
        let ty = self.make_type_and_pointer(name, TypeKind::FixedArray);
        let t = &mut self.types[ty];
        t.element = Some(element);
        t.length = length;
        ty
    }

    pub fn make_runtime_array_type(&mut self, name: &str, element: Handle<Type>) -> Handle<Type> {
        let ty = self.make_type_and_pointer(name, TypeKind::RuntimeArray);
        self.types[ty].element = Some(element);
        ty
    }

    /// Function types have no pointer.
    pub fn make_function_type(
        &mut self,
        name: &str,
        return_type: Handle<Type>,
        parameters: &[Handle<Type>],
    ) -> Handle<Type> {
        let mut t = Type::new(name, TypeKind::Function);
        t.signature.push(return_type);
        t.signature.extend_from_slice(parameters);
        self.types.append(t)
    }

    /// Appends a member to a struct type and returns its index.
    pub fn add_member(&mut self, owner: Handle<Type>, ty: Handle<Type>, name: &str) -> usize {
        let t = &mut self.types[owner];
        let index = t.members.len();
        t.members.push(StructMember {
            name: name.to_string(),
            ty,
        });
        t.member_index.insert(name.to_string(), index);
        t.member_key_index.insert((name.to_string(), ty), index);
        t.layout = Default::default();
        index
    }

    /// The `Function` storage pointer of a value type.
    pub fn pointer_type(&self, ty: Handle<Type>) -> Option<Handle<Type>> {
        self.types[ty].pointer
    }

    pub fn is_pointer(&self, ty: Handle<Type>) -> bool {
        self.types[ty].is_pointer()
    }

    /// Strips one level of pointer, or returns `ty` unchanged.
    pub fn value_type(&self, ty: Handle<Type>) -> Handle<Type> {
        match self.types[ty].dereference {
            Some(inner) if self.types[ty].is_pointer() => inner,
            _ => ty,
        }
    }

    /// A copy of `base` living in an interface storage class, named
    /// `{name}_{Suffix}` and paired with its own pointer. `Function` storage
    /// returns `base` itself.
    pub fn find_or_create_interface_type(
        &mut self,
        base: Handle<Type>,
        class: StorageClass,
    ) -> Handle<Type> {
        let Some(suffix) = class.suffix() else {
            return base;
        };
        if let Some(&ty) = self.interface_types.get(&(base, class)) {
            return ty;
        }
        let mut copy = self.types[base].clone();
        copy.name = format!("{}_{suffix}", copy.name);
        copy.storage = class;
        copy.pointer = None;
        copy.layout = Default::default();
        let copy = self.types.append(copy);
        let pointer = self.make_pointer(copy, class, suffix);
        self.types[copy].pointer = Some(pointer);
        self.interface_types.insert((base, class), copy);
        copy
    }

    /// A pointer to `base` in another storage class, named `{name}_ptr_{Suffix}`.
    /// `Function` storage returns the default pointer.
    pub fn find_or_create_pointer_interface_type(
        &mut self,
        base: Handle<Type>,
        class: StorageClass,
    ) -> Handle<Type> {
        let Some(suffix) = class.suffix() else {
            return match self.types[base].pointer {
                Some(p) => p,
                None => self.make_pointer(base, StorageClass::Function, "Function"),
            };
        };
        if let Some(&ty) = self.pointer_interface_types.get(&(base, class)) {
            return ty;
        }
        let pointer = self.make_pointer(base, class, suffix);
        self.pointer_interface_types.insert((base, class), pointer);
        pointer
    }

    fn make_pointer(&mut self, base: Handle<Type>, class: StorageClass, suffix: &str) -> Handle<Type> {
        let base_name = match self.types[base].storage {
            StorageClass::Function => self.types[base].name.clone(),
            _ => self.types[base]
                .name
                .strip_suffix(&format!("_{suffix}"))
                .unwrap_or(&self.types[base].name)
                .to_string(),
        };
        let mut pointer = Type::new(format!("{base_name}_ptr_{suffix}"), TypeKind::Pointer);
        pointer.dereference = Some(base);
        pointer.storage = class;
        self.types.append(pointer)
    }

    /// The IR type registered for a source type.
    pub fn ir_type(&self, ty: TypeId) -> Option<Handle<Type>> {
        self.type_map.get(&ty).copied()
    }

    // ----------------------------------------------------------------
    // Instructions and blocks
    // ----------------------------------------------------------------

    pub fn add_op(&mut self, op: Op) -> Handle<Op> {
        self.ops.append(op)
    }

    /// Appends `op` to the end of `block`.
    pub fn emit(&mut self, block: Handle<Block>, op: Op) -> Handle<Op> {
        let h = self.ops.append(op);
        self.blocks[block].lines.push(h);
        h
    }

    pub fn new_block(&mut self, name: &str) -> Handle<Block> {
        self.blocks.append(Block::new(name))
    }

    pub fn add_function(&mut self, function: Function) -> Handle<Function> {
        self.functions.append(function)
    }

    /// The result type of an instruction.
    pub fn op_type(&self, op: Handle<Op>) -> Option<Handle<Type>> {
        self.ops[op].result_type
    }

    /// Returns `true` if the instruction denotes an addressable location.
    pub fn is_pointer_op(&self, op: Handle<Op>) -> bool {
        self.op_type(op).is_some_and(|t| self.is_pointer(t))
    }

    pub fn literal(&self, h: Handle<Literal>) -> &Literal {
        &self.literals[h]
    }

    /// Interns a literal for use as an operand.
    pub fn literal_operand(&mut self, literal: Literal) -> Operand {
        Operand::Literal(self.literals.insert(literal))
    }

    // ----------------------------------------------------------------
    // Constants
    // ----------------------------------------------------------------

    /// Returns the constant of `ty` with `value`, creating it on first use.
    pub fn constant(&mut self, ty: Handle<Type>, value: Literal) -> Handle<Op> {
        let literal = self.literals.insert(value);
        if let Some(&op) = self.constant_map.get(&(ty, literal)) {
            return op;
        }
        let op = self
            .ops
            .append(Op::new(OpCode::Constant, Some(ty)).with_args([Operand::Literal(literal)]));
        self.constant_map.insert((ty, literal), op);
        self.constants.push(op);
        op
    }

    /// The value a constant was created with.
    pub fn constant_value(&self, op: Handle<Op>) -> Option<&Literal> {
        let op = &self.ops[op];
        if !op.code.is_constant() {
            return None;
        }
        op.args
            .first()
            .and_then(|a| a.as_literal())
            .map(|l| &self.literals[l])
    }

    // ----------------------------------------------------------------
    // Globals
    // ----------------------------------------------------------------

    /// Registers a module-scope variable. With a `shared` key, an existing
    /// global under the same key is reused instead.
    pub fn add_global(
        &mut self,
        field: Option<FieldId>,
        data: GlobalVariableData,
        shared: Option<GlobalKey>,
    ) -> usize {
        let index = self.globals.len();
        self.global_by_op.insert(data.instance, index);
        self.globals.push(data);
        if let Some(key) = shared {
            self.shared_globals.insert(key, index);
        }
        if let Some(field) = field {
            self.global_by_field.insert(field, index);
        }
        index
    }

    /// Binds another field to an existing global.
    pub fn alias_global(&mut self, field: FieldId, index: usize) {
        self.global_by_field.insert(field, index);
    }

    pub fn shared_global(&self, key: &GlobalKey) -> Option<usize> {
        self.shared_globals.get(key).copied()
    }

    pub fn global_for_field(&self, field: FieldId) -> Option<&GlobalVariableData> {
        self.global_by_field.get(&field).map(|&i| &self.globals[i])
    }

    pub fn global_for_field_mut(&mut self, field: FieldId) -> Option<&mut GlobalVariableData> {
        let i = *self.global_by_field.get(&field)?;
        self.globals.get_mut(i)
    }

    pub fn global_for_op(&self, op: Handle<Op>) -> Option<&GlobalVariableData> {
        self.global_by_op.get(&op).map(|&i| &self.globals[i])
    }

    pub fn decorate(&mut self, target: DecorationTarget, member: Option<u32>, kind: DecorationKind) {
        self.decorations.push(Decoration {
            target,
            member,
            kind,
        });
    }

    /// Records an extended instruction set import once.
    pub fn import_extension(&mut self, set: &str) {
        if !self.extension_imports.iter().any(|s| s == set) {
            self.extension_imports.push(set.to_string());
        }
    }

    // ----------------------------------------------------------------
    // Checks
    // ----------------------------------------------------------------

    /// Verifies that every block of every function ends in exactly one
    /// terminator, and that every store writes a value of the pointee type.
    pub fn check_structure(&self) -> Result<(), IrError> {
        for (_, func) in self.functions.iter() {
            for &b in &func.blocks {
                let block = self.blocks.try_get(b).ok_or(IrError::BadHandle {
                    index: b.index(),
                    size: self.blocks.len(),
                })?;
                self.check_block(func, block)?;
            }
        }
        Ok(())
    }

    fn check_block(&self, func: &Function, block: &Block) -> Result<(), IrError> {
        let len = block.lines.len();
        let mut saw_terminator = false;
        for (position, &line) in block.lines.iter().enumerate() {
            let op = self.ops.try_get(line).ok_or(IrError::BadHandle {
                index: line.index(),
                size: self.ops.len(),
            })?;
            if op.code.is_terminator() {
                if position + 1 != len {
                    return Err(IrError::MisplacedTerminator {
                        function: func.name.clone(),
                        block: block.name.clone(),
                        position,
                        len,
                    });
                }
                saw_terminator = true;
            }
            if op.code == OpCode::Store {
                self.check_store(op)?;
            }
        }
        if !saw_terminator {
            return Err(IrError::MissingTerminator {
                function: func.name.clone(),
                block: block.name.clone(),
            });
        }
        Ok(())
    }

    fn check_store(&self, op: &Op) -> Result<(), IrError> {
        let (Some(pointer), Some(value)) = (op.arg_op(0), op.arg_op(1)) else {
            return Ok(());
        };
        let (Some(pointer_ty), Some(value_ty)) = (self.op_type(pointer), self.op_type(value)) else {
            return Ok(());
        };
        let pointee = self.value_type(pointer_ty);
        let same = pointee == value_ty || self.types[pointee].name == self.types[value_ty].name;
        if !same {
            return Err(IrError::TypeMismatch {
                expected: self.types[pointee].name.clone(),
                found: self.types[value_ty].name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_links_both_ways() {
        let mut m = Module::new();
        let real = m.make_type_and_pointer("Real", TypeKind::Float);
        let ptr = m.pointer_type(real).expect("pointer");
        assert_eq!(m.types[ptr].name, "Real_ptr");
        assert_eq!(m.types[ptr].dereference, Some(real));
        assert_eq!(m.types[ptr].storage, StorageClass::Function);
        assert_eq!(m.value_type(ptr), real);
        assert_eq!(m.value_type(real), real);
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut m = Module::new();
        let int = m.make_type_and_pointer("Integer", TypeKind::Int);
        let real = m.make_type_and_pointer("Real", TypeKind::Float);
        let a = m.constant(int, Literal::Int(1));
        let b = m.constant(int, Literal::Int(1));
        let c = m.constant(real, Literal::float(1.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(m.constants.len(), 2);
        assert_eq!(m.constant_value(c), Some(&Literal::float(1.0)));
    }

    #[test]
    fn members_index_by_name_and_type() {
        let mut m = Module::new();
        let real = m.make_type_and_pointer("Real", TypeKind::Float);
        let int = m.make_type_and_pointer("Integer", TypeKind::Int);
        let s = m.make_type_and_pointer("S", TypeKind::Struct);
        assert_eq!(m.add_member(s, real, "a"), 0);
        assert_eq!(m.add_member(s, int, "b"), 1);
        let t = &m.types[s];
        assert_eq!(t.member_index["b"], 1);
        assert_eq!(t.member_key_index[&("a".to_string(), real)], 0);
        assert_eq!(t.sub_type(1), Some(int));
    }

    #[test]
    fn interface_types_are_cached_and_suffixed() {
        let mut m = Module::new();
        let real = m.make_type_and_pointer("Real4", TypeKind::Vector);
        let input = m.find_or_create_interface_type(real, StorageClass::Input);
        assert_eq!(m.types[input].name, "Real4_Input");
        let ptr = m.pointer_type(input).expect("pointer");
        assert_eq!(m.types[ptr].name, "Real4_ptr_Input");
        assert_eq!(m.types[ptr].storage, StorageClass::Input);
        assert_eq!(m.types[ptr].dereference, Some(input));
        assert_eq!(m.find_or_create_interface_type(real, StorageClass::Input), input);
        assert_eq!(m.find_or_create_interface_type(real, StorageClass::Function), real);

        let private = m.find_or_create_pointer_interface_type(real, StorageClass::Private);
        assert_eq!(m.types[private].name, "Real4_ptr_Private");
        assert_eq!(m.types[private].dereference, Some(real));
        assert_eq!(
            m.find_or_create_pointer_interface_type(real, StorageClass::Function),
            m.pointer_type(real).expect("pointer")
        );
    }

    #[test]
    fn shared_globals_resolve_by_key() {
        let mut m = Module::new();
        let real = m.make_type_and_pointer("Real", TypeKind::Float);
        let ptr = m.find_or_create_pointer_interface_type(real, StorageClass::Workgroup);
        let var = m.add_op(Op::new(OpCode::Variable, Some(ptr)).named("Shared"));
        let key = GlobalKey {
            storage: StorageClass::Workgroup,
            ty: real,
            name: "Shared".into(),
        };
        let data = GlobalVariableData {
            instance: var,
            initializer: None,
        };
        let index = m.add_global(Some(FieldId(0)), data, Some(key.clone()));
        m.alias_global(FieldId(7), index);
        assert_eq!(m.shared_global(&key), Some(index));
        assert_eq!(m.global_for_field(FieldId(7)).map(|g| g.instance), Some(var));
        assert!(m.global_for_op(var).is_some());
    }

    #[test]
    fn check_structure_reports_missing_terminator() {
        let mut m = Module::new();
        let void = m.make_type_and_pointer("Void", TypeKind::Void);
        let fn_ty = m.make_function_type("fn_Void", void, &[]);
        let block = m.new_block("entry");
        let mut f = Function::new("F", fn_ty);
        f.blocks.push(block);
        m.add_function(f);
        assert!(matches!(
            m.check_structure(),
            Err(IrError::MissingTerminator { .. })
        ));
        m.emit(block, Op::new(OpCode::Return, None));
        assert!(m.check_structure().is_ok());
        m.emit(block, Op::new(OpCode::Return, None));
        assert!(matches!(
            m.check_structure(),
            Err(IrError::MisplacedTerminator { position: 0, len: 2, .. })
        ));
    }
}
