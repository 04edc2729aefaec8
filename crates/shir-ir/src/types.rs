//! IR types.
//!
//! Every addressable value type is paired with exactly one pointer type in a
//! given storage class. The pair is linked both ways through
//! [`Type::pointer`] and [`Type::dereference`].

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use shir_ast::{Attribute, TypeId};

use crate::arena::Handle;
use crate::func::Function;
use crate::layout::Layout;
use crate::stage::ShaderStage;

/// Where a pointer's referent lives.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum StorageClass {
    #[default]
    Function,
    Private,
    Workgroup,
    Uniform,
    UniformConstant,
    StorageBuffer,
    Input,
    Output,
    Generic,
}

impl StorageClass {
    /// Name suffix for interface copies of a type in this storage class.
    /// Function storage uses the unsuffixed type.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            StorageClass::Function => None,
            StorageClass::Private => Some("Private"),
            StorageClass::Workgroup => Some("Workgroup"),
            StorageClass::Uniform => Some("Uniform"),
            StorageClass::UniformConstant => Some("UniformConstant"),
            StorageClass::StorageBuffer => Some("StorageBuffer"),
            StorageClass::Input => Some("Input"),
            StorageClass::Output => Some("Output"),
            StorageClass::Generic => Some("Generic"),
        }
    }

    /// Parses a storage class name as written in a `StorageClass` attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Function" => StorageClass::Function,
            "Private" => StorageClass::Private,
            "Workgroup" => StorageClass::Workgroup,
            "Uniform" => StorageClass::Uniform,
            "UniformConstant" => StorageClass::UniformConstant,
            "StorageBuffer" => StorageClass::StorageBuffer,
            "Input" => StorageClass::Input,
            "Output" => StorageClass::Output,
            "Generic" => StorageClass::Generic,
            _ => return None,
        })
    }

    /// Interface storage classes are owned by the pipeline, not the shader.
    pub fn is_interface(self) -> bool {
        matches!(
            self,
            StorageClass::Input
                | StorageClass::Output
                | StorageClass::Uniform
                | StorageClass::UniformConstant
                | StorageClass::StorageBuffer
        )
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix().unwrap_or("Function"))
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum TypeKind {
    Void,
    Bool,
    Int,
    Float,
    Vector,
    Matrix,
    Struct,
    FixedArray,
    RuntimeArray,
    Pointer,
    Function,
    Image,
    Sampler,
    SampledImage,
}

impl TypeKind {
    pub fn is_scalar(self) -> bool {
        matches!(self, TypeKind::Bool | TypeKind::Int | TypeKind::Float)
    }

    /// Kinds built from a component type plus a count.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            TypeKind::Vector | TypeKind::Matrix | TypeKind::Struct | TypeKind::FixedArray
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: Handle<Type>,
}

/// Source attributes and derived flags for a type.
#[derive(Clone, Debug, Default)]
pub struct TypeMeta {
    pub attributes: Vec<Attribute>,
    /// The stage this type declares itself as, if any.
    pub stage: ShaderStage,
    pub non_copyable: bool,
}

#[derive(Clone, Debug)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
    /// Component count for vectors and matrices (columns), `1` for scalars.
    pub components: u32,
    /// Vector component, matrix column or array element type.
    pub element: Option<Handle<Type>>,
    /// Element count of a fixed array.
    pub length: u32,
    pub members: Vec<StructMember>,
    pub member_index: HashMap<String, usize>,
    /// Disambiguates members by `(name, type)` for overloaded accessors.
    pub member_key_index: HashMap<(String, Handle<Type>), usize>,
    /// For function types: the return type followed by the parameter types.
    pub signature: Vec<Handle<Type>>,
    /// Storage class of a pointer type, or of an interface copy.
    pub storage: StorageClass,
    pub pointer: Option<Handle<Type>>,
    pub dereference: Option<Handle<Type>>,
    pub source: Option<TypeId>,
    pub meta: TypeMeta,
    pub pre_constructor: Option<Handle<Function>>,
    pub auto_default_constructor: Option<Handle<Function>>,
    pub(crate) layout: OnceCell<Layout>,
}

impl Type {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            components: 1,
            element: None,
            length: 0,
            members: Vec::new(),
            member_index: HashMap::new(),
            member_key_index: HashMap::new(),
            signature: Vec::new(),
            storage: StorageClass::Function,
            pointer: None,
            dereference: None,
            source: None,
            meta: TypeMeta::default(),
            pre_constructor: None,
            auto_default_constructor: None,
            layout: OnceCell::new(),
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.kind == TypeKind::Pointer
    }

    /// Returns the `i`-th sub-type: member type for structs, element type for
    /// everything else.
    pub fn sub_type(&self, i: usize) -> Option<Handle<Type>> {
        match self.kind {
            TypeKind::Struct => self.members.get(i).map(|m| m.ty),
            _ => self.element,
        }
    }

    /// Return type of a function type.
    pub fn return_type(&self) -> Option<Handle<Type>> {
        self.signature.first().copied()
    }

    /// Parameter types of a function type.
    pub fn parameter_types(&self) -> &[Handle<Type>] {
        self.signature.get(1..).unwrap_or(&[])
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.meta.attributes.iter().any(|a| a.name == name)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Void => "void",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Vector => "vector",
            TypeKind::Matrix => "matrix",
            TypeKind::Struct => "struct",
            TypeKind::FixedArray => "array",
            TypeKind::RuntimeArray => "runtime_array",
            TypeKind::Pointer => "pointer",
            TypeKind::Function => "function",
            TypeKind::Image => "image",
            TypeKind::Sampler => "sampler",
            TypeKind::SampledImage => "sampled_image",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_class_names_round_trip() {
        for class in [
            StorageClass::Private,
            StorageClass::Workgroup,
            StorageClass::Uniform,
            StorageClass::StorageBuffer,
            StorageClass::Input,
            StorageClass::Output,
        ] {
            let name = class.suffix().expect("suffix");
            assert_eq!(StorageClass::from_name(name), Some(class));
        }
        assert_eq!(StorageClass::Function.suffix(), None);
        assert_eq!(StorageClass::from_name("Heap"), None);
    }

    #[test]
    fn function_signature_accessors() {
        let mut f = Type::new("fn", TypeKind::Function);
        assert_eq!(f.return_type(), None);
        assert!(f.parameter_types().is_empty());
        let void = Handle::new(0);
        let int = Handle::new(1);
        f.signature = vec![void, int, int];
        assert_eq!(f.return_type(), Some(void));
        assert_eq!(f.parameter_types(), &[int, int]);
    }

    #[test]
    fn interface_classes() {
        assert!(StorageClass::Input.is_interface());
        assert!(!StorageClass::Private.is_interface());
        assert!(!StorageClass::Function.is_interface());
    }
}
