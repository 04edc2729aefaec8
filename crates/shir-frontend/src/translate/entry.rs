//! Entry-point generation: stage interface globals, the copy functions that
//! move data between them and the stage object, and the `EntryPoint_*`
//! wrapper the pipeline calls.

use std::collections::BTreeMap;

use shir_ast::{AttributeList, ClassNode, FunctionNode, MemberVariableNode};
use shir_ir::{
    Capability, DecorationKind, DecorationTarget, EntryPointInfo, ExecutionMode, Function,
    GlobalKey, GlobalVariableData, Handle, Op, OpCode, ShaderStage, StorageClass, Type, TypeKind,
    UniformBufferInfo,
};

use crate::settings::BuiltInDirection;

use super::{has_layout, known, TranslateCtx};

/// A value moved between an interface variable and a member of the stage
/// object.
#[derive(Clone, Copy, Debug)]
struct Transfer {
    /// The interface variable.
    source: Handle<Op>,
    /// Member of `source` holding the value, for uniform blocks.
    source_member: Option<u32>,
    /// Member of the stage object.
    member: u32,
    member_ty: Handle<Type>,
}

/// A field placed in a uniform block.
struct UniformField {
    name: String,
    member: u32,
    ty: Handle<Type>,
}

#[derive(Default)]
struct Interface {
    inputs: Vec<Transfer>,
    outputs: Vec<Transfer>,
    variables: Vec<Handle<Op>>,
    /// Located `In_*`/`Out_*` variables declared so far.
    input_count: u32,
    output_count: u32,
    /// Uniform fields by configured buffer; `None` is the default buffer.
    uniforms: BTreeMap<Option<usize>, Vec<UniformField>>,
    uniform_buffers: Vec<UniformBufferInfo>,
}

impl TranslateCtx<'_> {
    pub(super) fn lower_entry_points(&mut self) {
        let tree = self.tree;
        let symbols = self.symbols;
        let names = self.settings.names();
        for class in &tree.classes {
            let stage = self.module.types[self.ir(class.ty)].meta.stage;
            for node in &class.functions {
                let info = symbols.function(node.function);
                if !info.attributes.has_attribute(&names.entry_point) {
                    continue;
                }
                if stage.count() != 1 {
                    self.error(
                        Some(&node.location),
                        "Invalid entry point",
                        format!(
                            "Entry point '{}' must be declared in a type with exactly one shader stage",
                            symbols.function_path(node.function)
                        ),
                    );
                    continue;
                }
                if self.check_entry_signature(node, stage) {
                    self.lower_entry_point(class, node, stage);
                }
            }
        }
    }

    fn check_entry_signature(&mut self, node: &FunctionNode, stage: ShaderStage) -> bool {
        let symbols = self.symbols;
        let info = symbols.function(node.function);
        let expected = if stage == ShaderStage::GEOMETRY { 2 } else { 0 };
        let valid = !info.is_static
            && info.return_type == self.core.void
            && info.parameters.len() == expected;
        if !valid {
            self.error(
                Some(&node.location),
                "Invalid entry point",
                format!(
                    "Entry point '{}' has an invalid signature for the {stage} stage",
                    symbols.function_path(node.function)
                ),
            );
        }
        valid
    }

    fn lower_entry_point(&mut self, class: &ClassNode, node: &FunctionNode, stage: ShaderStage) {
        let Some(&user_function) = self.module.function_map.get(&node.function) else {
            return;
        };
        let symbols = self.symbols;
        let type_name = self.type_name(class.ty);
        let function_name = symbols.function(node.function).name.as_str();
        log::debug!("generating {stage} entry point for '{type_name}.{function_name}'");

        let mut interface = Interface::default();
        for var in &class.variables {
            if !var.is_property() {
                self.wire_field(class, var, stage, &mut interface);
            }
        }
        self.declare_uniform_buffers(stage, &mut interface);

        let this = self.ir_pointer(class.ty);
        let copy_ty = self.function_type(self.void, &[this]);
        let copy_inputs =
            self.declare_method(format!("CopyInputs_{function_name}"), copy_ty, this);
        self.lower_transfers(copy_inputs, &interface.inputs, true);
        let copy_outputs =
            self.declare_method(format!("CopyOutputs_{function_name}"), copy_ty, this);
        self.lower_transfers(copy_outputs, &interface.outputs, false);

        let globals_initializer = self.initialize_globals();

        let entry_ty = self.function_type(self.void, &[]);
        let function = self.module.add_function(Function::new(
            format!("EntryPoint_{function_name}_{type_name}"),
            entry_ty,
        ));
        let mut f = self.begin_function(function, false);
        f.location = known(&node.location);
        self.emit_call(&mut f, globals_initializer, &[]);
        let object_ty = self.ir(class.ty);
        let object = self.local_variable(&f, object_ty, "self");
        self.default_construct(&mut f, object, class.ty);
        self.emit_call(&mut f, copy_inputs, &[object]);

        let mut args = vec![object];
        let user_ty = self.module.functions[user_function].ty;
        let streams: Vec<_> = self.module.types[user_ty]
            .parameter_types()
            .iter()
            .skip(1)
            .copied()
            .collect();
        for (i, param) in streams.into_iter().enumerate() {
            let value = self.module.value_type(param);
            args.push(self.local_variable(&f, value, &format!("stream{i}")));
        }
        self.emit_call(&mut f, user_function, &args);
        self.emit_call(&mut f, copy_outputs, &[object]);
        self.finish_function(f);

        let mut capabilities = vec![Capability::Shader];
        let execution_modes = match stage {
            ShaderStage::PIXEL => vec![ExecutionMode::OriginUpperLeft],
            ShaderStage::COMPUTE => {
                let [x, y, z] = {
                    let names = self.settings.names();
                    [&names.local_size_x, &names.local_size_y, &names.local_size_z]
                        .map(|p| self.stage_parameter(class, stage, p))
                };
                vec![ExecutionMode::LocalSize(x, y, z)]
            }
            ShaderStage::GEOMETRY => {
                capabilities.push(Capability::Geometry);
                self.module.capabilities.insert(Capability::Geometry);
                let max = self.stage_parameter(class, stage, &self.settings.names().max_vertices);
                vec![ExecutionMode::OutputVertices(max)]
            }
            _ => Vec::new(),
        };

        self.module.entry_points.push(EntryPointInfo {
            stage,
            function,
            user_function,
            interface: interface.variables,
            execution_modes,
            capabilities,
            globals_initializer: Some(globals_initializer),
            uniform_buffers: interface.uniform_buffers,
        });
    }

    /// An integer parameter of the type's stage attribute, 1 when absent.
    fn stage_parameter(&self, class: &ClassNode, stage: ShaderStage, parameter: &str) -> u32 {
        let names = self.settings.names();
        self.symbols
            .ty(class.ty)
            .attributes
            .find_attribute(names.stage_attribute(stage))
            .and_then(|a| a.parameter(parameter))
            .and_then(|v| v.as_int())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1)
    }

    // -----------------------------------------------------------------------
    // Interface fields
    // -----------------------------------------------------------------------

    fn wire_field(
        &mut self,
        class: &ClassNode,
        var: &MemberVariableNode,
        stage: ShaderStage,
        interface: &mut Interface,
    ) {
        let symbols = self.symbols;
        let settings = self.settings;
        let names = settings.names();
        let field = symbols.field(var.field);
        let owner = self.ir(class.ty);
        let Some(&member) = self.module.types[owner].member_index.get(&field.name) else {
            return;
        };
        let member = member as u32;
        let member_ty = self.ir(field.ty);
        let attributes = &field.attributes;
        let location = Some(&var.location);

        for (attribute, direction) in [
            (&names.hardware_built_in_input, BuiltInDirection::Input),
            (&names.hardware_built_in_output, BuiltInDirection::Output),
        ] {
            if !attributes.has_attribute(attribute) {
                continue;
            }
            let type_name = self.type_name(field.ty);
            let built_in = settings
                .built_in(stage, direction, &field.name)
                .filter(|b| b.type_name == type_name);
            let Some(built_in) = built_in else {
                self.error(
                    location,
                    "Invalid built-in",
                    format!(
                        "'{} : {type_name}' is not a hardware built-in for the {stage} stage",
                        field.name
                    ),
                );
                continue;
            };
            let storage = match direction {
                BuiltInDirection::Input => StorageClass::Input,
                BuiltInDirection::Output => StorageClass::Output,
            };
            let variable = self.built_in_variable(member_ty, storage, &built_in.built_in);
            let transfer = Transfer {
                source: variable,
                source_member: None,
                member,
                member_ty,
            };
            match direction {
                BuiltInDirection::Input => interface.inputs.push(transfer),
                BuiltInDirection::Output => interface.outputs.push(transfer),
            }
            if !interface.variables.contains(&variable) {
                interface.variables.push(variable);
            }
        }

        if attributes.has_attribute(&names.input) {
            let index = interface.input_count;
            interface.input_count += 1;
            let location = if stage == ShaderStage::VERTEX {
                settings.vertex_attribute_location(&field.name).unwrap_or(index)
            } else {
                index
            };
            let variable = self.stage_variable(
                &format!("In_{}", field.name),
                member_ty,
                StorageClass::Input,
                location,
            );
            interface.inputs.push(Transfer {
                source: variable,
                source_member: None,
                member,
                member_ty,
            });
            interface.variables.push(variable);
        }

        if attributes.has_attribute(&names.output) {
            let index = interface.output_count;
            interface.output_count += 1;
            let location = if stage == ShaderStage::PIXEL {
                settings.render_target_index(&field.name).unwrap_or(index)
            } else {
                index
            };
            let variable = self.stage_variable(
                &format!("Out_{}", field.name),
                member_ty,
                StorageClass::Output,
                location,
            );
            interface.outputs.push(Transfer {
                source: variable,
                source_member: None,
                member,
                member_ty,
            });
            interface.variables.push(variable);
        }

        if attributes.has_attribute(&names.app_built_in_input)
            || attributes.has_attribute(&names.property_input)
        {
            if !has_layout(&self.module, member_ty) {
                self.error(
                    location,
                    "Invalid uniform",
                    format!(
                        "Field '{}' of type '{}' cannot be placed in a uniform buffer",
                        field.name,
                        self.type_name(field.ty)
                    ),
                );
                return;
            }
            let buffer = settings.uniform_buffer_for(stage, &field.name);
            interface.uniforms.entry(buffer).or_default().push(UniformField {
                name: field.name.clone(),
                member,
                ty: member_ty,
            });
        }
    }

    fn stage_variable(
        &mut self,
        name: &str,
        value: Handle<Type>,
        storage: StorageClass,
        location: u32,
    ) -> Handle<Op> {
        let pointer = self.module.find_or_create_pointer_interface_type(value, storage);
        let variable = self
            .module
            .add_op(Op::new(OpCode::Variable, Some(pointer)).named(name));
        self.module.add_global(
            None,
            GlobalVariableData {
                instance: variable,
                initializer: None,
            },
            None,
        );
        self.module.decorate(
            DecorationTarget::Op(variable),
            None,
            DecorationKind::Location(location),
        );
        variable
    }

    /// Built-in variables are shared by every entry point that binds them.
    fn built_in_variable(&mut self, value: Handle<Type>, storage: StorageClass, built_in: &str) -> Handle<Op> {
        let key = GlobalKey {
            storage,
            ty: value,
            name: built_in.to_string(),
        };
        if let Some(index) = self.module.shared_global(&key) {
            return self.module.globals[index].instance;
        }
        let pointer = self.module.find_or_create_pointer_interface_type(value, storage);
        let variable = self
            .module
            .add_op(Op::new(OpCode::Variable, Some(pointer)).named(built_in));
        self.module.add_global(
            None,
            GlobalVariableData {
                instance: variable,
                initializer: None,
            },
            Some(key),
        );
        self.module.decorate(
            DecorationTarget::Op(variable),
            None,
            DecorationKind::BuiltIn(built_in.to_string()),
        );
        variable
    }

    /// One `Uniform` block per buffer holding application fields, laid out
    /// by the layout calculator.
    fn declare_uniform_buffers(&mut self, stage: ShaderStage, interface: &mut Interface) {
        let settings = self.settings;
        let uniforms = std::mem::take(&mut interface.uniforms);
        for (buffer, fields) in uniforms {
            let (name, binding, descriptor_set) = match buffer.and_then(|i| settings.uniform_buffer(i)) {
                Some(ub) => (ub.debug_name.as_str(), ub.binding, ub.descriptor_set),
                None => {
                    let default = &settings.settings().default_uniform_buffer;
                    (default.debug_name.as_str(), default.binding, default.descriptor_set)
                }
            };
            let block = self.module.make_type_and_pointer(name, TypeKind::Struct);
            for field in &fields {
                self.module.add_member(block, field.ty, &field.name);
            }
            let block = self
                .module
                .find_or_create_interface_type(block, StorageClass::Uniform);
            self.decorate_once(DecorationTarget::Type(block), None, DecorationKind::Block);
            let offsets = self.module.member_offsets(block);
            for (i, &offset) in offsets.iter().enumerate() {
                self.decorate_once(
                    DecorationTarget::Type(block),
                    Some(i as u32),
                    DecorationKind::Offset(offset),
                );
            }

            let Some(pointer) = self.module.pointer_type(block) else {
                continue;
            };
            let variable = self.module.add_op(
                Op::new(OpCode::Variable, Some(pointer)).named(format!("{name}_{stage}")),
            );
            self.module.add_global(
                None,
                GlobalVariableData {
                    instance: variable,
                    initializer: None,
                },
                None,
            );
            let target = DecorationTarget::Op(variable);
            self.module
                .decorate(target, None, DecorationKind::Binding(binding));
            self.module
                .decorate(target, None, DecorationKind::DescriptorSet(descriptor_set));

            for (i, field) in fields.iter().enumerate() {
                interface.inputs.push(Transfer {
                    source: variable,
                    source_member: Some(i as u32),
                    member: field.member,
                    member_ty: field.ty,
                });
            }
            interface.variables.push(variable);
            interface.uniform_buffers.push(UniformBufferInfo {
                name: name.to_string(),
                binding,
                descriptor_set,
                size: self.module.byte_size(block),
                members: fields
                    .iter()
                    .map(|f| f.name.clone())
                    .zip(offsets)
                    .collect(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Generated functions
    // -----------------------------------------------------------------------

    /// Body of `CopyInputs_*` (`inward`) or `CopyOutputs_*`.
    fn lower_transfers(&mut self, function: Handle<Function>, transfers: &[Transfer], inward: bool) {
        let f = self.begin_function(function, true);
        if let Some(this) = f.this {
            for t in transfers {
                let member = self.extract_member(&f, this, t.member, t.member_ty);
                let outside = match t.source_member {
                    Some(index) => self.extract_member(&f, t.source, index, t.member_ty),
                    None => t.source,
                };
                let (from, to) = if inward { (outside, member) } else { (member, outside) };
                let value = self.load(&f, from);
                self.store(&f, to, value);
            }
        }
        self.finish_function(f);
    }

    /// `InitializeGlobals`, calling every global initializer in declaration
    /// order. Created on first use.
    fn initialize_globals(&mut self) -> Handle<Function> {
        if let Some(function) = self.initialize_globals {
            return function;
        }
        let ty = self.function_type(self.void, &[]);
        let function = self
            .module
            .add_function(Function::new("InitializeGlobals", ty));
        let initializers: Vec<_> = self
            .module
            .globals
            .iter()
            .filter_map(|g| g.initializer)
            .collect();
        let mut f = self.begin_function(function, false);
        for initializer in initializers {
            self.emit_call(&mut f, initializer, &[]);
        }
        self.finish_function(f);
        self.initialize_globals = Some(function);
        function
    }
}
