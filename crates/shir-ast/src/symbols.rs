//! Resolved symbol table: types, functions and fields with their attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! symbol_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the zero-based index of this identity.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

symbol_id!(
    /// Identity of a resolved type.
    TypeId
);
symbol_id!(
    /// Identity of a resolved function, constructor, getter or setter.
    FunctionId
);
symbol_id!(
    /// Identity of a member variable or property.
    FieldId
);
symbol_id!(
    /// Identity of a local variable or parameter within one function body.
    VariableId
);

/// A position in the original source text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    #[serde(default)]
    pub origin: String,
    pub line: u32,
    pub column: u32,
}

impl CodeLocation {
    pub fn new(origin: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            origin: origin.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.origin.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.origin, self.line, self.column)
        }
    }
}

/// A literal value carried by an attribute parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttributeValue {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeParameter {
    #[serde(default)]
    pub name: Option<String>,
    pub value: AttributeValue,
}

/// A source attribute such as `[Pixel]` or `[StorageClass("Workgroup")]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<AttributeParameter>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a named parameter.
    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.parameters.push(AttributeParameter {
            name: Some(name.into()),
            value,
        });
        self
    }

    /// Adds a positional parameter.
    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.parameters.push(AttributeParameter { name: None, value });
        self
    }

    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&AttributeValue> {
        self.parameters
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| &p.value)
    }

    /// Returns the first positional parameter, or the first parameter at all.
    pub fn first_value(&self) -> Option<&AttributeValue> {
        self.parameters
            .iter()
            .find(|p| p.name.is_none())
            .or_else(|| self.parameters.first())
            .map(|p| &p.value)
    }
}

/// Convenience lookups over attribute lists.
pub trait AttributeList {
    fn find_attribute(&self, name: &str) -> Option<&Attribute>;

    fn has_attribute(&self, name: &str) -> bool {
        self.find_attribute(name).is_some()
    }
}

impl AttributeList for [Attribute] {
    fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.iter().find(|a| a.name == name)
    }
}

impl AttributeList for Vec<Attribute> {
    fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.as_slice().find_attribute(name)
    }
}

/// The structural shape of a resolved type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TypeShape {
    Void,
    Bool,
    Int,
    Float,
    Vector { element: TypeId, count: u32 },
    Matrix { column: TypeId, count: u32 },
    FixedArray { element: TypeId, length: u32 },
    RuntimeArray { element: TypeId },
    Struct,
    Enum { values: Vec<(String, i64)> },
    Image,
    Sampler,
    SampledImage,
}

impl TypeShape {
    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeShape::Bool | TypeShape::Int | TypeShape::Float)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub shape: TypeShape,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// `false` for reference (heap) classes, which shaders cannot express.
    #[serde(default = "default_true")]
    pub value_type: bool,
    #[serde(default)]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub has_destructor: bool,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            attributes: Vec::new(),
            value_type: true,
            base: None,
            has_destructor: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Method,
    Constructor,
    Getter,
    Setter,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: TypeId,
    /// Parameter is passed by reference (`ref` in source).
    #[serde(default)]
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub owner: TypeId,
    pub kind: FunctionKind,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    pub return_type: TypeId,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub owner: TypeId,
    pub ty: TypeId,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub getter: Option<FunctionId>,
    #[serde(default)]
    pub setter: Option<FunctionId>,
}

/// Every type, function and field known to one compilation unit.
///
/// Identities index directly into the three tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    #[serde(default)]
    pub types: Vec<TypeInfo>,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, info: TypeInfo) -> TypeId {
        self.types.push(info);
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn add_function(&mut self, info: FunctionInfo) -> FunctionId {
        self.functions.push(info);
        FunctionId((self.functions.len() - 1) as u32)
    }

    pub fn add_field(&mut self, info: FieldInfo) -> FieldId {
        self.fields.push(info);
        FieldId((self.fields.len() - 1) as u32)
    }

    pub fn ty(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.index()]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut TypeInfo {
        &mut self.types[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldInfo {
        &self.fields[id.index()]
    }

    pub fn try_ty(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(id.index())
    }

    pub fn try_function(&self, id: FunctionId) -> Option<&FunctionInfo> {
        self.functions.get(id.index())
    }

    pub fn try_field(&self, id: FieldId) -> Option<&FieldInfo> {
        self.fields.get(id.index())
    }

    /// Finds the first type with the given name.
    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(|i| TypeId(i as u32))
    }

    /// Finds a function on `owner` by name and exact parameter types.
    pub fn find_function(
        &self,
        owner: TypeId,
        name: &str,
        parameters: &[TypeId],
    ) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| {
                f.owner == owner
                    && f.name == name
                    && f.parameters.len() == parameters.len()
                    && f.parameters.iter().zip(parameters).all(|(p, t)| p.ty == *t)
            })
            .map(|i| FunctionId(i as u32))
    }

    /// Finds a field on `owner` by name.
    pub fn find_field(&self, owner: TypeId, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.owner == owner && f.name == name)
            .map(|i| FieldId(i as u32))
    }

    /// Iterates over all fields declared on `owner`.
    pub fn fields_of(&self, owner: TypeId) -> impl Iterator<Item = (FieldId, &FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.owner == owner)
            .map(|(i, f)| (FieldId(i as u32), f))
    }

    /// `Owner.Name` for a function, used in diagnostics.
    pub fn function_path(&self, id: FunctionId) -> String {
        let f = self.function(id);
        format!("{}.{}", self.ty(f.owner).name, f.name)
    }

    /// `Owner.Name` for a field, used in diagnostics.
    pub fn field_path(&self, id: FieldId) -> String {
        let f = self.field(id);
        format!("{}.{}", self.ty(f.owner).name, f.name)
    }

    /// Returns the underlying type used for operator dispatch: enums are
    /// treated as `integer`.
    pub fn dispatch_type(&self, id: TypeId, integer: TypeId) -> TypeId {
        match self.ty(id).shape {
            TypeShape::Enum { .. } => integer,
            _ => id,
        }
    }
}
