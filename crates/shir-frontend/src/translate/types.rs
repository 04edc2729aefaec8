//! Phase 1: an IR type and its metadata for every source type.

use std::collections::HashSet;

use shir_ast::{AttributeList, ClassNode, TypeId, TypeShape};
use shir_ir::{Handle, Literal, ShaderStage, Type, TypeKind, TypeMeta};

use super::{known, TranslateCtx};

/// Upper bound on the elements of one fixed array, nested arrays included.
const MAX_ARRAY_ELEMENTS: u64 = 1 << 16;

impl TranslateCtx<'_> {
    pub(super) fn collect_types(&mut self) {
        let mut visiting = HashSet::new();
        for index in 0..self.symbols.types.len() {
            self.collect_type(TypeId(index as u32), &mut visiting);
        }
        let tree = self.tree;
        for class in &tree.classes {
            self.check_class(class);
        }
    }

    fn collect_type(&mut self, id: TypeId, visiting: &mut HashSet<TypeId>) -> Handle<Type> {
        if let Some(h) = self.module.ir_type(id) {
            return h;
        }
        if !visiting.insert(id) {
            self.error(
                None,
                "Recursive type",
                format!("Type '{}' contains itself", self.type_name(id)),
            );
            return self.void;
        }

        let symbols = self.symbols;
        let info = symbols.ty(id);
        let name = info.name.as_str();
        let handle = match &info.shape {
            TypeShape::Void => self.module.make_type_and_pointer(name, TypeKind::Void),
            TypeShape::Bool => self.module.make_type_and_pointer(name, TypeKind::Bool),
            TypeShape::Int => self.module.make_type_and_pointer(name, TypeKind::Int),
            TypeShape::Float => self.module.make_type_and_pointer(name, TypeKind::Float),
            TypeShape::Vector { element, count } => {
                let element = self.collect_type(*element, visiting);
                self.module.make_vector_type(name, element, *count)
            }
            TypeShape::Matrix { column, count } => {
                let column = self.collect_type(*column, visiting);
                self.module.make_matrix_type(name, column, *count)
            }
            TypeShape::FixedArray { element, length } => {
                if matches!(symbols.ty(*element).shape, TypeShape::RuntimeArray { .. }) {
                    self.error(
                        None,
                        "Invalid array",
                        format!("Fixed array '{name}' cannot contain a runtime array"),
                    );
                }
                let element = self.collect_type(*element, visiting);
                let total = self.array_elements(element).saturating_mul(u64::from(*length));
                if total > MAX_ARRAY_ELEMENTS {
                    self.error(
                        None,
                        "Invalid array",
                        format!(
                            "Fixed array '{name}' holds {total} elements, more than the limit of {MAX_ARRAY_ELEMENTS}"
                        ),
                    );
                    visiting.remove(&id);
                    return self.void;
                }
                self.module.make_array_type(name, element, *length)
            }
            TypeShape::RuntimeArray { element } => {
                if matches!(symbols.ty(*element).shape, TypeShape::RuntimeArray { .. }) {
                    self.error(
                        None,
                        "Invalid array",
                        format!("Runtime array '{name}' cannot contain a runtime array"),
                    );
                }
                let element = self.collect_type(*element, visiting);
                self.module.make_runtime_array_type(name, element)
            }
            TypeShape::Struct => self.module.make_type_and_pointer(name, TypeKind::Struct),
            TypeShape::Enum { values } => {
                // Enums are integers; each value becomes a constant.
                let int = self.collect_type(self.core.integer, visiting);
                for (value_name, value) in values {
                    let c = self.module.constant(int, Literal::Int(*value as i32));
                    self.module
                        .enum_constants
                        .insert((id, value_name.clone()), c);
                }
                visiting.remove(&id);
                self.module.type_map.insert(id, int);
                return int;
            }
            TypeShape::Image => self.module.make_type_and_pointer(name, TypeKind::Image),
            TypeShape::Sampler => self.module.make_type_and_pointer(name, TypeKind::Sampler),
            TypeShape::SampledImage => {
                self.module.make_type_and_pointer(name, TypeKind::SampledImage)
            }
        };
        visiting.remove(&id);

        let meta = self.type_meta(id);
        let t = &mut self.module.types[handle];
        t.source = Some(id);
        t.meta = meta;
        self.module.type_map.insert(id, handle);
        handle
    }

    /// Elements in `ty` counting through nested fixed arrays.
    fn array_elements(&self, ty: Handle<Type>) -> u64 {
        let t = &self.module.types[ty];
        match (t.kind, t.element) {
            (TypeKind::FixedArray, Some(element)) => {
                u64::from(t.length).saturating_mul(self.array_elements(element))
            }
            _ => 1,
        }
    }

    fn type_meta(&self, id: TypeId) -> TypeMeta {
        let names = self.settings.names();
        let attributes = &self.symbols.ty(id).attributes;
        let stage = attributes
            .iter()
            .filter_map(|a| names.stage_of(&a.name))
            .fold(ShaderStage::NONE, |acc, s| acc | s);
        TypeMeta {
            attributes: attributes.clone(),
            stage,
            non_copyable: attributes.has_attribute(&names.non_copyable),
        }
    }

    fn check_class(&mut self, class: &ClassNode) {
        let symbols = self.symbols;
        let info = symbols.ty(class.ty);
        let location = Some(&class.location);
        if info.shape != TypeShape::Struct || !info.value_type {
            self.error(
                location,
                "Invalid type",
                format!("Type '{}' must be a struct", info.name),
            );
        }
        if info.base.is_some() {
            self.error(location, "Invalid type", "Inheritance is not supported");
        }
        if info.has_destructor {
            self.error(location, "Invalid type", "Destructors are not supported");
        }
        let stages = info
            .attributes
            .iter()
            .filter(|a| self.settings.names().stage_of(&a.name).is_some())
            .count();
        if stages > 1 {
            self.error(
                location,
                "Invalid type",
                format!("Type '{}' declares more than one shader stage", info.name),
            );
        }
        log::debug!(
            "collected type '{}'{}",
            info.name,
            known(&class.location)
                .map(|l| format!(" at {l}"))
                .unwrap_or_default()
        );
    }
}
