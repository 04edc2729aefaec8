//! Intrinsic core types, the `Math` library and `Shader.Kill`, installed into
//! a symbol table.
//!
//! The resolver registry and the command-line driver look these up by name,
//! so trees produced elsewhere only need to use the same type names.

use crate::symbols::{
    Attribute, FieldInfo, FunctionId, FunctionInfo, FunctionKind, ParameterInfo, SymbolTable,
    TypeId, TypeInfo, TypeShape,
};

pub const VOID: &str = "Void";
pub const BOOLEAN: &str = "Boolean";
pub const INTEGER: &str = "Integer";
pub const REAL: &str = "Real";
pub const MATH: &str = "Math";
pub const SHADER: &str = "Shader";

/// Member names every fixed array type carries.
pub const ARRAY_GET: &str = "Get";
pub const ARRAY_SET: &str = "Set";
pub const ARRAY_COUNT: &str = "Count";

/// Names of the `Math` functions that map onto extended instructions.
pub const MATH_UNARY: &[&str] = &[
    "Abs", "Sin", "Cos", "Tan", "Sqrt", "Exp", "Log", "Floor", "Ceil", "Fract", "Normalize",
];
pub const MATH_BINARY: &[&str] = &["Min", "Max", "Pow", "Step"];
/// Fragment-only derivative intrinsics.
pub const MATH_DERIVATIVES: &[&str] = &["Ddx", "Ddy", "FWidth"];

/// Handles to the installed core types.
#[derive(Clone, Debug)]
pub struct CoreTypes {
    pub void: TypeId,
    pub boolean: TypeId,
    pub integer: TypeId,
    pub real: TypeId,
    /// `Boolean2..4`, indexed by `count - 2`.
    pub booleans: [TypeId; 3],
    pub integers: [TypeId; 3],
    pub reals: [TypeId; 3],
    /// `RealCxR` matrices indexed `[columns - 2][rows - 2]`.
    pub matrices: [[TypeId; 3]; 3],
    pub math: TypeId,
}

impl CoreTypes {
    pub fn real_n(&self, count: u32) -> TypeId {
        match count {
            1 => self.real,
            n => self.reals[(n - 2) as usize],
        }
    }

    pub fn integer_n(&self, count: u32) -> TypeId {
        match count {
            1 => self.integer,
            n => self.integers[(n - 2) as usize],
        }
    }

    pub fn boolean_n(&self, count: u32) -> TypeId {
        match count {
            1 => self.boolean,
            n => self.booleans[(n - 2) as usize],
        }
    }

    /// Looks up already-installed core types by name.
    pub fn find(symbols: &SymbolTable) -> Option<Self> {
        let t = |name: &str| symbols.find_type(name);
        let n = |base: &str, i: u32| symbols.find_type(&format!("{base}{i}"));
        let mut matrices = [[TypeId(0); 3]; 3];
        for c in 2..=4u32 {
            for r in 2..=4u32 {
                matrices[(c - 2) as usize][(r - 2) as usize] =
                    symbols.find_type(&format!("{REAL}{c}x{r}"))?;
            }
        }
        Some(Self {
            void: t(VOID)?,
            boolean: t(BOOLEAN)?,
            integer: t(INTEGER)?,
            real: t(REAL)?,
            booleans: [n(BOOLEAN, 2)?, n(BOOLEAN, 3)?, n(BOOLEAN, 4)?],
            integers: [n(INTEGER, 2)?, n(INTEGER, 3)?, n(INTEGER, 4)?],
            reals: [n(REAL, 2)?, n(REAL, 3)?, n(REAL, 4)?],
            matrices,
            math: t(MATH)?,
        })
    }
}

const COMPONENTS: [&str; 4] = ["X", "Y", "Z", "W"];

impl SymbolTable {
    /// Installs the intrinsic scalar, vector and matrix types, their component
    /// fields, their constructors, the `Math` library and the `Shader` type.
    /// Existing core types
    /// are reused, so calling this twice is harmless.
    pub fn install_core(&mut self) -> CoreTypes {
        if let Some(core) = CoreTypes::find(self) {
            return core;
        }

        let void = self.add_type(TypeInfo::new(VOID, TypeShape::Void));
        let boolean = self.add_type(TypeInfo::new(BOOLEAN, TypeShape::Bool));
        let integer = self.add_type(TypeInfo::new(INTEGER, TypeShape::Int));
        let real = self.add_type(TypeInfo::new(REAL, TypeShape::Float));

        let vectors = |symbols: &mut Self, base: &str, element: TypeId| -> [TypeId; 3] {
            let mut out = [TypeId(0); 3];
            for count in 2..=4u32 {
                let ty = symbols.add_type(TypeInfo::new(
                    format!("{base}{count}"),
                    TypeShape::Vector { element, count },
                ));
                for name in COMPONENTS.iter().take(count as usize) {
                    symbols.add_field(FieldInfo {
                        name: (*name).to_string(),
                        owner: ty,
                        ty: element,
                        is_static: false,
                        attributes: Vec::new(),
                        getter: None,
                        setter: None,
                    });
                }
                out[(count - 2) as usize] = ty;
            }
            out
        };
        let booleans = vectors(self, BOOLEAN, boolean);
        let integers = vectors(self, INTEGER, integer);
        let reals = vectors(self, REAL, real);

        let mut matrices = [[TypeId(0); 3]; 3];
        for c in 2..=4u32 {
            for r in 2..=4u32 {
                let column = reals[(r - 2) as usize];
                let ty = self.add_type(TypeInfo::new(
                    format!("{REAL}{c}x{r}"),
                    TypeShape::Matrix { column, count: c },
                ));
                // Element fields `M{column}{row}`.
                for i in 0..c {
                    for j in 0..r {
                        self.add_field(FieldInfo {
                            name: format!("M{i}{j}"),
                            owner: ty,
                            ty: real,
                            is_static: false,
                            attributes: Vec::new(),
                            getter: None,
                            setter: None,
                        });
                    }
                }
                matrices[(c - 2) as usize][(r - 2) as usize] = ty;
            }
        }

        // Composite constructors: splat and full component lists.
        for (element, family) in [(boolean, booleans), (integer, integers), (real, reals)] {
            for (i, &ty) in family.iter().enumerate() {
                let count = i + 2;
                self.add_constructor(ty, &[element]);
                self.add_constructor(ty, &vec![element; count]);
            }
        }

        let mut math = TypeInfo::new(MATH, TypeShape::Struct);
        math.attributes.push(Attribute::new("Intrinsic"));
        let math = self.add_type(math);
        for ty in std::iter::once(real).chain(reals) {
            for name in MATH_UNARY.iter().chain(MATH_DERIVATIVES) {
                self.add_static(math, name, &[ty], ty);
            }
            for name in MATH_BINARY {
                self.add_static(math, name, &[ty, ty], ty);
            }
        }
        for &ty in &reals {
            self.add_static(math, "Dot", &[ty, ty], real);
            self.add_static(math, "Length", &[ty], real);
        }
        self.add_static(math, "Cross", &[reals[1], reals[1]], reals[1]);

        let mut shader = TypeInfo::new(SHADER, TypeShape::Struct);
        shader.attributes.push(Attribute::new("Intrinsic"));
        let shader = self.add_type(shader);
        self.add_static(shader, "Kill", &[], void);

        CoreTypes {
            void,
            boolean,
            integer,
            real,
            booleans,
            integers,
            reals,
            matrices,
            math,
        }
    }

    /// Declares the fixed array type `element[length]` with its `Get`, `Set`
    /// and `Count` members, or returns the existing declaration.
    pub fn declare_fixed_array(
        &mut self,
        core: &CoreTypes,
        element: TypeId,
        length: u32,
    ) -> TypeId {
        let name = format!("{}[{length}]", self.ty(element).name);
        if let Some(ty) = self.find_type(&name) {
            return ty;
        }
        let ty = self.add_type(TypeInfo::new(name, TypeShape::FixedArray { element, length }));
        self.add_method(ty, ARRAY_GET, &[core.integer], element, false);
        self.add_method(ty, ARRAY_SET, &[core.integer, element], core.void, false);
        self.add_field(FieldInfo {
            name: ARRAY_COUNT.to_string(),
            owner: ty,
            ty: core.integer,
            is_static: false,
            attributes: Vec::new(),
            getter: None,
            setter: None,
        });
        ty
    }

    fn add_constructor(&mut self, owner: TypeId, parameters: &[TypeId]) -> FunctionId {
        self.add_function(FunctionInfo {
            name: "Constructor".into(),
            owner,
            kind: FunctionKind::Constructor,
            is_static: false,
            parameters: parameters
                .iter()
                .enumerate()
                .map(|(i, &ty)| ParameterInfo {
                    name: format!("p{i}"),
                    ty,
                    by_ref: false,
                })
                .collect(),
            return_type: owner,
            attributes: Vec::new(),
        })
    }

    fn add_static(
        &mut self,
        owner: TypeId,
        name: &str,
        parameters: &[TypeId],
        return_type: TypeId,
    ) -> FunctionId {
        self.add_method(owner, name, parameters, return_type, true)
    }

    fn add_method(
        &mut self,
        owner: TypeId,
        name: &str,
        parameters: &[TypeId],
        return_type: TypeId,
        is_static: bool,
    ) -> FunctionId {
        self.add_function(FunctionInfo {
            name: name.into(),
            owner,
            kind: FunctionKind::Method,
            is_static,
            parameters: parameters
                .iter()
                .enumerate()
                .map(|(i, &ty)| ParameterInfo {
                    name: format!("p{i}"),
                    ty,
                    by_ref: false,
                })
                .collect(),
            return_type,
            attributes: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_core_is_idempotent() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let count = symbols.types.len();
        let again = symbols.install_core();
        assert_eq!(symbols.types.len(), count);
        assert_eq!(core.reals, again.reals);
        assert_eq!(symbols.ty(core.real_n(3)).name, "Real3");
    }

    #[test]
    fn vectors_have_component_fields() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let real4 = core.real_n(4);
        assert!(symbols.find_field(real4, "W").is_some());
        assert!(symbols.find_field(core.real_n(2), "Z").is_none());
        assert!(symbols.find_field(core.matrices[0][1], "M12").is_some());
        assert!(symbols.find_field(core.matrices[0][1], "M20").is_none());
    }

    #[test]
    fn math_overloads() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let r3 = core.real_n(3);
        let dot3 = symbols.find_function(core.math, "Dot", &[r3, r3]);
        let dot2 = symbols.find_function(core.math, "Dot", &[core.real_n(2), core.real_n(2)]);
        assert!(dot3.is_some());
        assert_ne!(dot3, dot2);
        assert!(symbols.find_function(core.math, "Ddx", &[core.real]).is_some());
    }

    #[test]
    fn fixed_arrays_are_declared_once() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let array = symbols.declare_fixed_array(&core, core.real, 4);
        assert_eq!(symbols.ty(array).name, "Real[4]");
        assert_eq!(symbols.declare_fixed_array(&core, core.real, 4), array);
        assert_ne!(symbols.declare_fixed_array(&core, core.real, 3), array);
        let get = symbols
            .find_function(array, ARRAY_GET, &[core.integer])
            .expect("Get");
        assert_eq!(symbols.function(get).return_type, core.real);
        assert!(!symbols.function(get).is_static);
        assert!(symbols
            .find_function(array, ARRAY_SET, &[core.integer, core.real])
            .is_some());
        assert!(symbols.find_field(array, ARRAY_COUNT).is_some());
    }

    #[test]
    fn shader_kill_is_a_static_intrinsic() {
        let mut symbols = SymbolTable::new();
        symbols.install_core();
        let shader = symbols.find_type(SHADER).expect("Shader");
        let kill = symbols.find_function(shader, "Kill", &[]).expect("Kill");
        assert!(symbols.function(kill).is_static);
    }

    #[test]
    fn matrix_shape() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let m = core.matrices[1][2];
        assert_eq!(symbols.ty(m).name, "Real3x4");
        assert_eq!(
            symbols.ty(m).shape,
            TypeShape::Matrix {
                column: core.real_n(4),
                count: 3
            }
        );
    }
}
