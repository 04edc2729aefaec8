//! Phase 2: member storage, function signatures and specialization constants.
//!
//! Nothing here looks at statements. Initializer expressions are only
//! inspected for the literal defaults of specialization constants.

use shir_ast::{
    AttributeList, ClassNode, CodeLocation, Expr, ExprKind, FunctionKind, FunctionNode,
    MemberVariableNode, TypeId, TypeShape, UnaryOperator,
};
use shir_ir::{
    DecorationKind, DecorationTarget, Function, GlobalKey, GlobalVariableData, Handle, Literal, Op,
    OpCode, StorageClass, Type, TypeKind,
};

use super::{known, parse_literal, TranslateCtx};

const COMPONENT_NAMES: [&str; 4] = ["X", "Y", "Z", "W"];

impl TranslateCtx<'_> {
    pub(super) fn collect_signatures(&mut self) {
        self.declare_language_constants();

        let tree = self.tree;
        for class in &tree.classes {
            self.check_main(class);
            self.collect_members(class);
        }
        if self.errors > 0 {
            return;
        }
        for class in &tree.classes {
            self.collect_functions(class);
        }
        self.pad_empty_structs();
        for class in &tree.classes {
            self.collect_spec_constants(class);
        }
    }

    fn declare_language_constants(&mut self) {
        let settings = self.settings.settings();
        let (id, version) = (settings.language_id, settings.language_version);
        let int = self.ir(self.core.integer);
        self.spec_scalar(int, "LanguageId", Literal::Int(id));
        self.spec_scalar(int, "LanguageVersion", Literal::Int(version));
    }

    fn check_main(&mut self, class: &ClassNode) {
        let settings = self.settings;
        if !settings.settings().error_on_missing_main {
            return;
        }
        let ty = self.ir(class.ty);
        if self.module.types[ty].meta.stage.is_empty() {
            return;
        }
        let symbols = self.symbols;
        let main = settings.names().main_function.as_str();
        let has_main = class.functions.iter().any(|node| {
            let info = symbols.function(node.function);
            info.name == main && !info.is_static && info.parameters.is_empty()
        });
        if !has_main {
            self.error(
                Some(&class.location),
                "Missing main function",
                format!(
                    "Type '{}' declares a shader stage but has no '{main}' function",
                    self.type_name(class.ty)
                ),
            );
        }
    }

    // -----------------------------------------------------------------------
    // Member variables
    // -----------------------------------------------------------------------

    fn collect_members(&mut self, class: &ClassNode) {
        let symbols = self.symbols;
        let names = self.settings.names();
        let owner = self.ir(class.ty);
        let extension = symbols
            .ty(class.ty)
            .attributes
            .has_attribute(&names.extension);

        for var in &class.variables {
            if var.is_property() {
                continue;
            }
            let field = symbols.field(var.field);
            let location = Some(&var.location);

            if matches!(symbols.ty(field.ty).shape, TypeShape::RuntimeArray { .. }) {
                self.declare_runtime_array(class.ty, var);
                continue;
            }

            if let Some(attr) = field.attributes.find_attribute(&names.storage_class) {
                let class_name = attr.first_value().and_then(|v| v.as_str()).unwrap_or("");
                match StorageClass::from_name(class_name) {
                    Some(storage) => self.declare_global(class.ty, var, storage, false),
                    None => self.error(
                        location,
                        "Invalid storage class",
                        format!(
                            "Unknown storage class '{class_name}' on '{}'",
                            symbols.field_path(var.field)
                        ),
                    ),
                }
                continue;
            }

            let is_static = field.is_static || field.attributes.has_attribute(&names.static_attribute);
            if is_static && field.attributes.has_attribute(&names.specialization_constant) {
                // Declared once every struct has its members.
                continue;
            }
            let shared = field.attributes.has_attribute(&names.fragment_shared);
            if is_static || shared {
                self.declare_global(class.ty, var, StorageClass::Private, shared);
                continue;
            }

            if extension {
                self.error(
                    location,
                    "Invalid member",
                    format!(
                        "Extension type '{}' cannot declare instance field '{}'",
                        symbols.ty(class.ty).name,
                        field.name
                    ),
                );
                continue;
            }
            let ty = self.ir(field.ty);
            self.module.add_member(owner, ty, &field.name);
        }
    }

    /// A module-scope variable for a static or storage-class field.
    fn declare_global(
        &mut self,
        owner: TypeId,
        var: &MemberVariableNode,
        storage: StorageClass,
        shared: bool,
    ) {
        let symbols = self.symbols;
        let field = symbols.field(var.field);
        let value = self.ir(field.ty);
        let key = GlobalKey {
            storage,
            ty: value,
            name: field.name.clone(),
        };
        if shared {
            if let Some(index) = self.module.shared_global(&key) {
                self.module.alias_global(var.field, index);
                return;
            }
        }

        let pointer = self.module.find_or_create_pointer_interface_type(value, storage);
        let name = if shared {
            field.name.clone()
        } else {
            format!("{}_{}", symbols.ty(owner).name, field.name)
        };
        let mut op = Op::new(OpCode::Variable, Some(pointer)).named(name.as_str());
        op.debug.location = known(&var.location);
        let instance = self.module.add_op(op);

        let needs_initializer = !storage.is_interface()
            && storage != StorageClass::Workgroup
            && (var.initial_value.is_some() || storage == StorageClass::Private);
        let initializer = needs_initializer.then(|| self.declare_initializer(var, &name));
        self.module.add_global(
            Some(var.field),
            GlobalVariableData {
                instance,
                initializer,
            },
            shared.then_some(key),
        );
    }

    /// `{name}_Initializer : () -> Void`. The body is lowered with the others.
    fn declare_initializer(&mut self, var: &MemberVariableNode, name: &str) -> Handle<Function> {
        let ty = self.function_type(self.void, &[]);
        let function = self
            .module
            .add_function(Function::new(format!("{name}_Initializer"), ty));
        self.pending_initializers.push((var.field, function));
        function
    }

    /// Runtime arrays live in a storage buffer, wrapped in a block struct.
    fn declare_runtime_array(&mut self, owner: TypeId, var: &MemberVariableNode) {
        let symbols = self.symbols;
        let field = symbols.field(var.field);
        if var.initial_value.is_some() {
            self.error(
                Some(&var.location),
                "Invalid initializer",
                "Runtime arrays cannot have an initializer",
            );
        }

        let array = self.ir(field.ty);
        let name = format!("{}_{}", symbols.ty(owner).name, field.name);
        let wrapper = self
            .module
            .make_type_and_pointer(&format!("{name}_Buffer"), TypeKind::Struct);
        self.module.add_member(wrapper, array, "Data");
        let block = self
            .module
            .find_or_create_interface_type(wrapper, StorageClass::StorageBuffer);
        self.module
            .decorate(DecorationTarget::Type(block), None, DecorationKind::Block);
        self.module
            .decorate(DecorationTarget::Type(block), Some(0), DecorationKind::Offset(0));
        if let Some(element) = self.module.types[array].element {
            if super::has_layout(&self.module, element) {
                let stride = self.module.array_stride(element);
                self.decorate_once(
                    DecorationTarget::Type(array),
                    None,
                    DecorationKind::ArrayStride(stride),
                );
            }
        }

        let Some(pointer) = self.module.pointer_type(block) else {
            return;
        };
        let mut op = Op::new(OpCode::Variable, Some(pointer)).named(name);
        op.debug.location = known(&var.location);
        let instance = self.module.add_op(op);
        self.module.add_global(
            Some(var.field),
            GlobalVariableData {
                instance,
                initializer: None,
            },
            None,
        );
        self.runtime_arrays.insert(var.field);
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn collect_functions(&mut self, class: &ClassNode) {
        let symbols = self.symbols;
        let info = symbols.ty(class.ty);
        let accessors = class
            .variables
            .iter()
            .flat_map(|v| v.getter.iter().chain(v.setter.iter()));
        for node in class
            .constructors
            .iter()
            .chain(&class.functions)
            .chain(accessors)
        {
            self.declare_function(node);
        }

        if info.attributes.has_attribute(&self.settings.names().extension) {
            return;
        }
        let owner = self.ir(class.ty);
        let this = self.ir_pointer(class.ty);
        let ty = self.function_type(self.void, &[this]);

        let pre = self.declare_method(format!("{}_PreConstructor", info.name), ty, this);
        self.module.types[owner].pre_constructor = Some(pre);

        let has_default = class
            .constructors
            .iter()
            .any(|c| symbols.function(c.function).parameters.is_empty());
        if !has_default {
            let auto = self.declare_method(format!("{}_DefaultConstructor", info.name), ty, this);
            self.module.types[owner].auto_default_constructor = Some(auto);
        }
    }

    /// A generated `(self) -> Void` function.
    pub(super) fn declare_method(
        &mut self,
        name: String,
        ty: Handle<Type>,
        this: Handle<Type>,
    ) -> Handle<Function> {
        let param = self
            .module
            .add_op(Op::new(OpCode::FunctionParameter, Some(this)).named("self"));
        let mut function = Function::new(name, ty);
        function.parameter_block.push(param);
        self.module.add_function(function)
    }

    fn declare_function(&mut self, node: &FunctionNode) {
        let symbols = self.symbols;
        let info = symbols.function(node.function);
        let location = Some(&node.location);

        let mut parameters = Vec::with_capacity(info.parameters.len() + 1);
        if !info.is_static {
            let this = self.ir_pointer(info.owner);
            parameters.push(("self".to_string(), this, None));
        }
        for (i, p) in info.parameters.iter().enumerate() {
            let ty = if p.by_ref {
                self.ir_pointer(p.ty)
            } else {
                if self.is_non_copyable(p.ty) {
                    self.report_copy(location, p.ty);
                }
                self.ir(p.ty)
            };
            let param_location = node.parameters.get(i).and_then(|n| known(&n.location));
            parameters.push((p.name.clone(), ty, param_location));
        }

        let return_type = if info.kind == FunctionKind::Constructor {
            self.void
        } else {
            if self.is_non_copyable(info.return_type) {
                self.report_copy(location, info.return_type);
            }
            self.ir(info.return_type)
        };
        let types: Vec<_> = parameters.iter().map(|(_, ty, _)| *ty).collect();
        let ty = self.function_type(return_type, &types);

        let mut function = Function::new(symbols.function_path(node.function), ty);
        function.source = Some(node.function);
        for (name, ty, location) in parameters {
            let mut op = Op::new(OpCode::FunctionParameter, Some(ty)).named(name);
            op.debug.location = location;
            function.parameter_block.push(self.module.add_op(op));
        }
        let handle = self.module.add_function(function);
        self.module.function_map.insert(node.function, handle);
    }

    pub(super) fn report_copy(&mut self, location: Option<&CodeLocation>, ty: TypeId) {
        self.error(
            location,
            "Non-copyable type",
            format!("Type '{}' cannot be copied.", self.type_name(ty)),
        );
    }

    fn pad_empty_structs(&mut self) {
        let int = self.ir(self.core.integer);
        let tree = self.tree;
        for class in &tree.classes {
            let ty = self.ir(class.ty);
            if self.module.types[ty].members.is_empty() {
                self.module.add_member(ty, int, "Dummy");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Specialization constants
    // -----------------------------------------------------------------------

    fn collect_spec_constants(&mut self, class: &ClassNode) {
        let symbols = self.symbols;
        let names = self.settings.names();
        for var in &class.variables {
            let field = symbols.field(var.field);
            let is_static = field.is_static || field.attributes.has_attribute(&names.static_attribute);
            if var.is_property()
                || !is_static
                || !field.attributes.has_attribute(&names.specialization_constant)
            {
                continue;
            }
            let mut defaults = Vec::new();
            if let Some(init) = &var.initial_value {
                literal_leaves(init, &mut defaults);
            }
            let ty = self.ir(field.ty);
            let mut cursor = 0;
            let op = self.spec_constant(ty, &field.name, &defaults, &mut cursor, &var.location);
            self.module.spec_constant_map.insert(var.field, op);
        }
    }

    /// Declares a specialization constant of `ty`, splitting composites into
    /// one named sub-constant per component.
    fn spec_constant(
        &mut self,
        ty: Handle<Type>,
        name: &str,
        defaults: &[String],
        cursor: &mut usize,
        location: &CodeLocation,
    ) -> Handle<Op> {
        let kind = self.module.types[ty].kind;
        match kind {
            TypeKind::Bool | TypeKind::Int | TypeKind::Float => {
                // A single literal initializes every component.
                let token = if defaults.len() == 1 {
                    defaults.first()
                } else {
                    defaults.get(*cursor)
                };
                *cursor += 1;
                let value = token
                    .and_then(|t| parse_literal(kind, t))
                    .unwrap_or_else(|| zero_literal(kind));
                self.spec_scalar(ty, name, value)
            }
            TypeKind::Vector | TypeKind::Matrix => {
                let t = &self.module.types[ty];
                let (element, count) = (t.element, t.components as usize);
                let Some(element) = element else {
                    return self.invalid_spec_constant(ty, location);
                };
                let mut parts = Vec::with_capacity(count);
                for component in COMPONENT_NAMES.iter().take(count) {
                    let part_name = format!("{name}.{component}");
                    parts.push(self.spec_constant(element, &part_name, defaults, cursor, location));
                }
                self.spec_composite(ty, name, parts)
            }
            TypeKind::Struct => {
                let members: Vec<_> = self.module.types[ty]
                    .members
                    .iter()
                    .map(|m| (format!("{name}.{}", m.name), m.ty))
                    .collect();
                let mut parts = Vec::with_capacity(members.len());
                for (member_name, member_ty) in members {
                    parts.push(self.spec_constant(member_ty, &member_name, defaults, cursor, location));
                }
                self.spec_composite(ty, name, parts)
            }
            _ => self.invalid_spec_constant(ty, location),
        }
    }

    fn spec_scalar(&mut self, ty: Handle<Type>, name: &str, value: Literal) -> Handle<Op> {
        let value = self.literal(value);
        let op = self
            .module
            .add_op(Op::new(OpCode::SpecConstant, Some(ty)).with_args([value]).named(name));
        let id = self.next_spec_id;
        self.next_spec_id += 1;
        self.module
            .decorate(DecorationTarget::Op(op), None, DecorationKind::SpecId(id));
        self.module.spec_constants.push(op);
        op
    }

    fn spec_composite(&mut self, ty: Handle<Type>, name: &str, parts: Vec<Handle<Op>>) -> Handle<Op> {
        let op = Op::new(OpCode::SpecConstantComposite, Some(ty))
            .with_args(parts.into_iter().map(Into::into))
            .named(name);
        let op = self.module.add_op(op);
        self.module.spec_constants.push(op);
        op
    }

    fn invalid_spec_constant(&mut self, ty: Handle<Type>, location: &CodeLocation) -> Handle<Op> {
        let name = self.module.types[ty].name.clone();
        self.error(
            Some(location),
            "Invalid specialization constant",
            format!("Type '{name}' is not valid as a specialization constant."),
        );
        self.module.add_op(Op::new(OpCode::Undef, Some(ty)))
    }
}

fn zero_literal(kind: TypeKind) -> Literal {
    match kind {
        TypeKind::Bool => Literal::Bool(false),
        TypeKind::Float => Literal::float(0.0),
        _ => Literal::Int(0),
    }
}

/// Collects the literal tokens of an initializer, descending through
/// constructor arguments. Negated literals keep their sign.
fn literal_leaves(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Value(token) => out.push(token.clone()),
        ExprKind::Unary {
            op: UnaryOperator::Negate,
            operand,
        } => {
            if let ExprKind::Value(token) = &operand.kind {
                out.push(format!("-{token}"));
            }
        }
        ExprKind::Construct { arguments, .. } => {
            for argument in arguments {
                literal_leaves(argument, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_follow_constructor_arguments() {
        let t = TypeId(0);
        let init = Expr::construct(
            t,
            None,
            vec![
                Expr::value("1", t),
                Expr::unary(UnaryOperator::Negate, Expr::value("2.5", t), t),
                Expr::construct(t, None, vec![Expr::value("3", t)]),
            ],
        );
        let mut out = Vec::new();
        literal_leaves(&init, &mut out);
        assert_eq!(out, vec!["1", "-2.5", "3"]);
    }

    #[test]
    fn zero_literals_by_kind() {
        assert_eq!(zero_literal(TypeKind::Bool), Literal::Bool(false));
        assert_eq!(zero_literal(TypeKind::Int), Literal::Int(0));
        assert_eq!(zero_literal(TypeKind::Float), Literal::float(0.0));
    }
}
