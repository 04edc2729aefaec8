//! Byte size and alignment of IR types.
//!
//! Rules:
//! - scalars are 4 bytes, 4-aligned
//! - a vector is `n` components; a 3-component vector aligns like a 4-component one
//! - a matrix is an array of columns, each column aligned to 16 bytes
//! - a fixed array's stride is the element size rounded up to the element alignment
//! - a struct places each member at its own alignment and rounds the total
//!   up to 16 bytes; its alignment is the largest member alignment
//!
//! Results are cached on the type. Asking for the layout of a kind without one
//! (void, pointers, functions, opaque handles, runtime arrays) is a contract
//! violation and panics.

use crate::arena::Handle;
use crate::types::{Type, TypeKind};
use crate::Module;

/// Byte size and alignment of a type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Layout {
    pub size: u32,
    pub alignment: u32,
}

/// Rounds `value` up to the next multiple of `alignment`.
pub fn round_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

const SCALAR_SIZE: u32 = 4;
const STRUCT_ROUNDING: u32 = 16;

impl Module {
    pub fn layout(&self, ty: Handle<Type>) -> Layout {
        let t = &self.types[ty];
        *t.layout.get_or_init(|| self.compute_layout(t))
    }

    pub fn byte_size(&self, ty: Handle<Type>) -> u32 {
        self.layout(ty).size
    }

    pub fn byte_alignment(&self, ty: Handle<Type>) -> u32 {
        self.layout(ty).alignment
    }

    /// Stride between consecutive elements of an array of `element`.
    pub fn array_stride(&self, element: Handle<Type>) -> u32 {
        let l = self.layout(element);
        round_up(l.size, l.alignment)
    }

    /// Byte offset of each member of a struct type.
    pub fn member_offsets(&self, ty: Handle<Type>) -> Vec<u32> {
        let mut offset = 0;
        self.types[ty]
            .members
            .iter()
            .map(|m| {
                let l = self.layout(m.ty);
                let at = round_up(offset, l.alignment);
                offset = at + l.size;
                at
            })
            .collect()
    }

    fn element_of(&self, t: &Type) -> Handle<Type> {
        t.element
            .unwrap_or_else(|| panic!("type '{}' has no element type", t.name))
    }

    fn compute_layout(&self, t: &Type) -> Layout {
        match t.kind {
            TypeKind::Bool | TypeKind::Int | TypeKind::Float => Layout {
                size: SCALAR_SIZE,
                alignment: SCALAR_SIZE,
            },
            TypeKind::Vector => {
                let e = self.layout(self.element_of(t));
                let aligned_count = if t.components == 3 { 4 } else { t.components };
                Layout {
                    size: e.size * t.components,
                    alignment: e.alignment * aligned_count,
                }
            }
            TypeKind::Matrix => {
                let column = self.layout(self.element_of(t));
                let alignment = column.alignment.max(STRUCT_ROUNDING);
                Layout {
                    size: round_up(column.size, alignment) * t.components,
                    alignment,
                }
            }
            TypeKind::FixedArray => {
                let e = self.layout(self.element_of(t));
                let size = round_up(e.size, e.alignment)
                    .checked_mul(t.length)
                    .unwrap_or_else(|| panic!("array '{}' is too large to lay out", t.name));
                Layout {
                    size,
                    alignment: e.alignment,
                }
            }
            TypeKind::Struct => {
                let mut offset = 0;
                let mut alignment = 0;
                for m in &t.members {
                    let l = self.layout(m.ty);
                    offset = round_up(offset, l.alignment) + l.size;
                    alignment = alignment.max(l.alignment);
                }
                Layout {
                    size: round_up(offset, STRUCT_ROUNDING),
                    alignment,
                }
            }
            kind => panic!("type '{}' of kind {kind} has no byte layout", t.name),
        }
    }
}
