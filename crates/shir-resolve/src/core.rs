//! Resolvers for the intrinsic core types installed by
//! [`SymbolTable::install_core`](shir_ast::SymbolTable::install_core).

use shir_ast::core::{ARRAY_COUNT, ARRAY_GET, ARRAY_SET, MATH_BINARY, MATH_UNARY, SHADER};
use shir_ast::{
    BinaryOperator, CoreTypes, FunctionId, SymbolTable, TypeId, TypeShape, UnaryOperator,
};
use shir_ir::{OpCode, ShaderStage};

use crate::{
    BackupFieldResolver, BinaryResolver, CastResolver, ConstructorResolver,
    DefaultConstructorResolver, ExtInstruction, FieldResolver, FunctionResolver, ResolverRegistry,
    SetterResolver, parse_swizzle,
};

#[derive(Clone, Copy, PartialEq)]
enum Scalar {
    Bool,
    Int,
    Float,
}

/// Extended instruction numbers in `GLSL.std.450`.
fn glsl_instruction(name: &str) -> Option<u32> {
    Some(match name {
        "Abs" => 4,
        "Floor" => 8,
        "Ceil" => 9,
        "Fract" => 10,
        "Sin" => 13,
        "Cos" => 14,
        "Tan" => 15,
        "Pow" => 26,
        "Exp" => 27,
        "Log" => 28,
        "Sqrt" => 31,
        "Min" => 37,
        "Max" => 40,
        "Step" => 48,
        "Length" => 66,
        "Cross" => 68,
        "Normalize" => 69,
        _ => return None,
    })
}

fn arithmetic(scalar: Scalar, op: BinaryOperator) -> Option<OpCode> {
    use BinaryOperator::*;
    let code = match (scalar, op) {
        (Scalar::Int, Add) => OpCode::IAdd,
        (Scalar::Int, Subtract) => OpCode::ISub,
        (Scalar::Int, Multiply) => OpCode::IMul,
        (Scalar::Int, Divide) => OpCode::SDiv,
        (Scalar::Int, Modulo) => OpCode::SMod,
        (Scalar::Int, Equal) => OpCode::IEqual,
        (Scalar::Int, NotEqual) => OpCode::INotEqual,
        (Scalar::Int, Less) => OpCode::SLessThan,
        (Scalar::Int, LessEqual) => OpCode::SLessThanEqual,
        (Scalar::Int, Greater) => OpCode::SGreaterThan,
        (Scalar::Int, GreaterEqual) => OpCode::SGreaterThanEqual,
        (Scalar::Int, BitwiseAnd) => OpCode::BitwiseAnd,
        (Scalar::Int, BitwiseOr) => OpCode::BitwiseOr,
        (Scalar::Int, BitwiseXor) => OpCode::BitwiseXor,
        (Scalar::Int, ShiftLeft) => OpCode::ShiftLeftLogical,
        (Scalar::Int, ShiftRight) => OpCode::ShiftRightArithmetic,
        (Scalar::Float, Add) => OpCode::FAdd,
        (Scalar::Float, Subtract) => OpCode::FSub,
        (Scalar::Float, Multiply) => OpCode::FMul,
        (Scalar::Float, Divide) => OpCode::FDiv,
        (Scalar::Float, Modulo) => OpCode::FMod,
        (Scalar::Float, Equal) => OpCode::FOrdEqual,
        (Scalar::Float, NotEqual) => OpCode::FOrdNotEqual,
        (Scalar::Float, Less) => OpCode::FOrdLessThan,
        (Scalar::Float, LessEqual) => OpCode::FOrdLessThanEqual,
        (Scalar::Float, Greater) => OpCode::FOrdGreaterThan,
        (Scalar::Float, GreaterEqual) => OpCode::FOrdGreaterThanEqual,
        (Scalar::Bool, LogicalAnd) => OpCode::LogicalAnd,
        (Scalar::Bool, LogicalOr) => OpCode::LogicalOr,
        (Scalar::Bool, Equal) => OpCode::LogicalEqual,
        (Scalar::Bool, NotEqual) => OpCode::LogicalNotEqual,
        _ => return None,
    };
    Some(code)
}

const BINARY_OPERATORS: [BinaryOperator; 18] = [
    BinaryOperator::Add,
    BinaryOperator::Subtract,
    BinaryOperator::Multiply,
    BinaryOperator::Divide,
    BinaryOperator::Modulo,
    BinaryOperator::Equal,
    BinaryOperator::NotEqual,
    BinaryOperator::Less,
    BinaryOperator::LessEqual,
    BinaryOperator::Greater,
    BinaryOperator::GreaterEqual,
    BinaryOperator::LogicalAnd,
    BinaryOperator::LogicalOr,
    BinaryOperator::BitwiseAnd,
    BinaryOperator::BitwiseOr,
    BinaryOperator::BitwiseXor,
    BinaryOperator::ShiftLeft,
    BinaryOperator::ShiftRight,
];

/// Registers resolvers for every core type, every fixed array type, the
/// `Math` library and `Shader.Kill`.
///
/// Returns `None` (and registers nothing) if the symbol table has no core
/// types installed.
pub fn register_core(registry: &mut ResolverRegistry, symbols: &SymbolTable) -> Option<CoreTypes> {
    let core = CoreTypes::find(symbols)?;
    let families = [
        (Scalar::Bool, core.boolean, core.booleans),
        (Scalar::Int, core.integer, core.integers),
        (Scalar::Float, core.real, core.reals),
    ];

    // Operators over one family member at a time.
    for (scalar, element, vectors) in families {
        for ty in std::iter::once(element).chain(vectors) {
            register_operators(registry, scalar, ty);
            let default = if ty == element {
                DefaultConstructorResolver::NullConstant
            } else {
                DefaultConstructorResolver::ZeroComposite
            };
            registry.register_default_constructor(ty, default);
        }
        for (i, &vector) in vectors.iter().enumerate() {
            let count = i as u32 + 2;
            register_vector_members(registry, symbols, vector, element, count);
            if scalar == Scalar::Float {
                registry.register_binary(
                    vector,
                    element,
                    BinaryOperator::Multiply,
                    BinaryResolver::Op(OpCode::VectorTimesScalar),
                );
                registry.register_binary(
                    element,
                    vector,
                    BinaryOperator::Multiply,
                    BinaryResolver::Swapped(OpCode::VectorTimesScalar),
                );
            }
        }
    }

    register_casts(registry, &core);
    register_matrices(registry, symbols, &core);
    register_math(registry, symbols, &core);
    register_fixed_arrays(registry, symbols);
    register_shader(registry, symbols);

    log::debug!("registered core resolvers for {} types", symbols.types.len());
    Some(core)
}

fn register_operators(registry: &mut ResolverRegistry, scalar: Scalar, ty: TypeId) {
    for op in BINARY_OPERATORS {
        if let Some(code) = arithmetic(scalar, op) {
            registry.register_binary(ty, ty, op, BinaryResolver::Op(code));
        }
    }
    let unary = match scalar {
        Scalar::Bool => vec![(UnaryOperator::LogicalNot, OpCode::LogicalNot)],
        Scalar::Int => vec![
            (UnaryOperator::Negate, OpCode::SNegate),
            (UnaryOperator::BitwiseNot, OpCode::Not),
        ],
        Scalar::Float => vec![(UnaryOperator::Negate, OpCode::FNegate)],
    };
    for (op, code) in unary {
        registry.register_unary(ty, op, crate::UnaryResolver::Op(code));
    }
}

fn register_vector_members(
    registry: &mut ResolverRegistry,
    symbols: &SymbolTable,
    vector: TypeId,
    element: TypeId,
    count: u32,
) {
    if let Some(splat) = symbols.find_function(vector, "Constructor", &[element]) {
        registry.register_constructor(vector, splat, ConstructorResolver::Splat);
    }
    let full = vec![element; count as usize];
    if let Some(composite) = symbols.find_function(vector, "Constructor", &full) {
        registry.register_constructor(vector, composite, ConstructorResolver::Composite);
    }
    for (field, info) in symbols.fields_of(vector) {
        let Some(indices) = parse_swizzle(&info.name) else {
            continue;
        };
        if let [component] = indices[..] {
            registry.register_field(vector, field, FieldResolver::Component(component));
            registry.register_setter(vector, field, SetterResolver::Component(component));
        } else {
            registry.register_field(vector, field, FieldResolver::Swizzle(indices.clone()));
            registry.register_setter(vector, field, SetterResolver::Swizzle(indices));
        }
    }
    registry.register_backup_field(vector, BackupFieldResolver::VectorSwizzle);
}

fn register_casts(registry: &mut ResolverRegistry, core: &CoreTypes) {
    for count in 1..=4 {
        let (b, i, r) = (core.boolean_n(count), core.integer_n(count), core.real_n(count));
        registry.register_cast(i, r, CastResolver::Op(OpCode::ConvertSToF));
        registry.register_cast(r, i, CastResolver::Op(OpCode::ConvertFToS));
        registry.register_cast(b, i, CastResolver::FromBool);
        registry.register_cast(b, r, CastResolver::FromBool);
        registry.register_cast(i, b, CastResolver::ToBool(OpCode::INotEqual));
        registry.register_cast(r, b, CastResolver::ToBool(OpCode::FOrdNotEqual));
        for ty in [b, i, r] {
            registry.register_cast(ty, ty, CastResolver::Identity);
        }
    }
}

fn register_matrices(registry: &mut ResolverRegistry, symbols: &SymbolTable, core: &CoreTypes) {
    let matrix =
        |columns: u32, rows: u32| core.matrices[(columns - 2) as usize][(rows - 2) as usize];
    for columns in 2..=4u32 {
        for rows in 2..=4u32 {
            let m = matrix(columns, rows);
            registry.register_default_constructor(m, DefaultConstructorResolver::ZeroComposite);
            registry.register_binary(
                m,
                core.real,
                BinaryOperator::Multiply,
                BinaryResolver::Op(OpCode::MatrixTimesScalar),
            );
            registry.register_binary(
                core.real,
                m,
                BinaryOperator::Multiply,
                BinaryResolver::Swapped(OpCode::MatrixTimesScalar),
            );
            registry.register_binary(
                m,
                core.real_n(columns),
                BinaryOperator::Multiply,
                BinaryResolver::Op(OpCode::MatrixTimesVector),
            );
            registry.register_binary(
                core.real_n(rows),
                m,
                BinaryOperator::Multiply,
                BinaryResolver::Op(OpCode::VectorTimesMatrix),
            );
            for k in 2..=4u32 {
                registry.register_binary(
                    m,
                    matrix(k, columns),
                    BinaryOperator::Multiply,
                    BinaryResolver::Op(OpCode::MatrixTimesMatrix),
                );
            }
            for (field, info) in symbols.fields_of(m) {
                let digits: Vec<u32> = info
                    .name
                    .chars()
                    .skip(1)
                    .filter_map(|c| c.to_digit(10))
                    .collect();
                if let [column, row] = digits[..] {
                    registry.register_field(m, field, FieldResolver::MatrixElement { column, row });
                }
            }
        }
    }
}

fn register_math(registry: &mut ResolverRegistry, symbols: &SymbolTable, core: &CoreTypes) {
    for (i, f) in symbols.functions.iter().enumerate() {
        if f.owner != core.math {
            continue;
        }
        let id = FunctionId(i as u32);
        let name = f.name.as_str();
        let derivative = match name {
            "Ddx" => Some(OpCode::DPdx),
            "Ddy" => Some(OpCode::DPdy),
            "FWidth" => Some(OpCode::Fwidth),
            _ => None,
        };
        if let Some(code) = derivative {
            registry.register_function(core.math, id, FunctionResolver::Op(code));
            registry.register_stage_requirement(id, ShaderStage::PIXEL);
            continue;
        }
        match name {
            "Dot" => {
                registry.register_function(core.math, id, FunctionResolver::Op(OpCode::Dot));
            }
            "Length" | "Cross" => {
                if let Some(n) = glsl_instruction(name) {
                    registry.register_function(
                        core.math,
                        id,
                        FunctionResolver::ExtInst(ExtInstruction::glsl(n)),
                    );
                }
            }
            _ if MATH_UNARY.contains(&name) || MATH_BINARY.contains(&name) => {
                if let Some(n) = glsl_instruction(name) {
                    registry.register_extension(id, ExtInstruction::glsl(n));
                }
            }
            _ => {}
        }
    }
}

fn register_fixed_arrays(registry: &mut ResolverRegistry, symbols: &SymbolTable) {
    for (i, f) in symbols.functions.iter().enumerate() {
        if !matches!(symbols.ty(f.owner).shape, TypeShape::FixedArray { .. }) || f.is_static {
            continue;
        }
        let resolver = match (f.name.as_str(), f.parameters.len()) {
            (ARRAY_GET, 1) => FunctionResolver::ArrayGet,
            (ARRAY_SET, 2) => FunctionResolver::ArraySet,
            _ => continue,
        };
        registry.register_function(f.owner, FunctionId(i as u32), resolver);
    }
    for (i, t) in symbols.types.iter().enumerate() {
        let TypeShape::FixedArray { length, .. } = t.shape else {
            continue;
        };
        let ty = TypeId(i as u32);
        if let Some(count) = symbols.find_field(ty, ARRAY_COUNT) {
            registry.register_field(ty, count, FieldResolver::ArrayLength(length));
        }
    }
}

/// `Shader.Kill()` discards the fragment, so only pixel shaders may reach it.
fn register_shader(registry: &mut ResolverRegistry, symbols: &SymbolTable) {
    let Some(shader) = symbols.find_type(SHADER) else {
        return;
    };
    if let Some(kill) = symbols.find_function(shader, "Kill", &[]) {
        registry.register_function(shader, kill, FunctionResolver::Op(OpCode::Kill));
        registry.register_stage_requirement(kill, ShaderStage::PIXEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SymbolTable, ResolverRegistry, CoreTypes) {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let mut registry = ResolverRegistry::new();
        register_core(&mut registry, &symbols).expect("core types");
        (symbols, registry, core)
    }

    #[test]
    fn real3_add_is_fadd() {
        let (_, reg, core) = setup();
        let r3 = core.real_n(3);
        assert_eq!(
            reg.binary(r3, r3, BinaryOperator::Add),
            Some(BinaryResolver::Op(OpCode::FAdd))
        );
        assert_eq!(
            reg.binary(core.integer, core.integer, BinaryOperator::Less),
            Some(BinaryResolver::Op(OpCode::SLessThan))
        );
        assert_eq!(reg.binary(core.boolean, core.boolean, BinaryOperator::Add), None);
    }

    #[test]
    fn scalar_times_vector_is_swapped() {
        let (_, reg, core) = setup();
        assert_eq!(
            reg.binary(core.real, core.real_n(4), BinaryOperator::Multiply),
            Some(BinaryResolver::Swapped(OpCode::VectorTimesScalar))
        );
    }

    #[test]
    fn components_and_swizzles() {
        let (mut symbols, _, core) = setup();
        let r4 = core.real_n(4);
        let w = symbols.find_field(r4, "W").expect("W");
        // A swizzle field added by the front end after core installation.
        let xz = symbols.add_field(shir_ast::FieldInfo {
            name: "XZ".into(),
            owner: r4,
            ty: core.real_n(2),
            is_static: false,
            attributes: Vec::new(),
            getter: None,
            setter: None,
        });
        let mut reg = ResolverRegistry::new();
        register_core(&mut reg, &symbols).expect("core types");
        assert_eq!(reg.field(r4, w), Some(&FieldResolver::Component(3)));
        assert_eq!(reg.field(r4, xz), Some(&FieldResolver::Swizzle(vec![0, 2])));
        assert_eq!(reg.setter(r4, xz), Some(&SetterResolver::Swizzle(vec![0, 2])));
        assert_eq!(reg.backup_field(r4), Some(BackupFieldResolver::VectorSwizzle));
    }

    #[test]
    fn casts_cover_bool_and_numbers() {
        let (_, reg, core) = setup();
        assert_eq!(
            reg.cast(core.integer, core.real),
            Some(CastResolver::Op(OpCode::ConvertSToF))
        );
        assert_eq!(reg.cast(core.boolean_n(3), core.real_n(3)), Some(CastResolver::FromBool));
        assert_eq!(
            reg.cast(core.real, core.boolean),
            Some(CastResolver::ToBool(OpCode::FOrdNotEqual))
        );
        assert_eq!(reg.cast(core.real_n(2), core.real_n(3)), None);
    }

    #[test]
    fn vector_constructors() {
        let (symbols, reg, core) = setup();
        let r3 = core.real_n(3);
        let splat = symbols
            .find_function(r3, "Constructor", &[core.real])
            .expect("splat");
        let full = symbols
            .find_function(r3, "Constructor", &[core.real; 3])
            .expect("full");
        assert_eq!(reg.constructor(r3, splat), Some(ConstructorResolver::Splat));
        assert_eq!(reg.constructor(r3, full), Some(ConstructorResolver::Composite));
        assert_eq!(
            reg.default_constructor(r3),
            Some(DefaultConstructorResolver::ZeroComposite)
        );
    }

    #[test]
    fn derivatives_require_pixel() {
        let (symbols, reg, core) = setup();
        let ddx = symbols
            .find_function(core.math, "Ddx", &[core.real])
            .expect("Ddx");
        assert_eq!(reg.stage_requirement(ddx), ShaderStage::PIXEL);
        assert_eq!(
            reg.function(core.math, ddx),
            Some(&FunctionResolver::Op(OpCode::DPdx))
        );
        let sin = symbols
            .find_function(core.math, "Sin", &[core.real])
            .expect("Sin");
        assert_eq!(reg.extension(sin).map(|e| e.instruction), Some(13));
        assert!(reg.stage_requirement(sin).is_empty());
    }

    #[test]
    fn matrix_products_and_elements() {
        let (symbols, reg, core) = setup();
        let m3 = core.matrices[1][1];
        assert_eq!(
            reg.binary(m3, core.real_n(3), BinaryOperator::Multiply),
            Some(BinaryResolver::Op(OpCode::MatrixTimesVector))
        );
        assert_eq!(
            reg.binary(m3, m3, BinaryOperator::Multiply),
            Some(BinaryResolver::Op(OpCode::MatrixTimesMatrix))
        );
        let m21 = symbols.find_field(m3, "M21").expect("element");
        assert_eq!(
            reg.field(m3, m21),
            Some(&FieldResolver::MatrixElement { column: 2, row: 1 })
        );
    }

    #[test]
    fn fixed_array_members() {
        let mut symbols = SymbolTable::new();
        let core = symbols.install_core();
        let array = symbols.declare_fixed_array(&core, core.real_n(2), 3);
        let mut reg = ResolverRegistry::new();
        register_core(&mut reg, &symbols).expect("core types");

        let get = symbols
            .find_function(array, ARRAY_GET, &[core.integer])
            .expect("Get");
        let set = symbols
            .find_function(array, ARRAY_SET, &[core.integer, core.real_n(2)])
            .expect("Set");
        let count = symbols.find_field(array, ARRAY_COUNT).expect("Count");
        assert_eq!(reg.function(array, get), Some(&FunctionResolver::ArrayGet));
        assert_eq!(reg.function(array, set), Some(&FunctionResolver::ArraySet));
        assert_eq!(reg.field(array, count), Some(&FieldResolver::ArrayLength(3)));
        assert!(reg.is_intrinsic(array, get));
    }

    #[test]
    fn kill_requires_pixel() {
        let (symbols, reg, _) = setup();
        let shader = symbols.find_type(SHADER).expect("Shader");
        let kill = symbols.find_function(shader, "Kill", &[]).expect("Kill");
        assert_eq!(
            reg.function(shader, kill),
            Some(&FunctionResolver::Op(OpCode::Kill))
        );
        assert_eq!(reg.stage_requirement(kill), ShaderStage::PIXEL);
    }

    #[test]
    fn without_core_types_nothing_registers() {
        let mut reg = ResolverRegistry::new();
        assert!(register_core(&mut reg, &SymbolTable::new()).is_none());
    }
}
