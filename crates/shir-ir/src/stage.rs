//! Shader pipeline stages as a flag set.

use std::fmt;

use shir_ast::{CodeLocation, FieldId, FunctionId, TypeId};

/// A set of shader stages.
///
/// An empty set means "no requirement": the symbol may run in any stage.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct ShaderStage(u32);

impl ShaderStage {
    pub const NONE: Self = Self(0);
    pub const VERTEX: Self = Self(1);
    pub const GEOMETRY: Self = Self(2);
    pub const PIXEL: Self = Self(4);
    pub const COMPUTE: Self = Self(8);

    /// The four concrete stages, in pipeline order.
    pub const ALL: [ShaderStage; 4] = [Self::VERTEX, Self::GEOMETRY, Self::PIXEL, Self::COMPUTE];

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of stages in the set.
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Canonical attribute name of a single stage.
    pub fn name(self) -> &'static str {
        match self {
            Self::VERTEX => "Vertex",
            Self::GEOMETRY => "Geometry",
            Self::PIXEL => "Pixel",
            Self::COMPUTE => "Compute",
            Self::NONE => "None",
            _ => "Multiple",
        }
    }

    pub fn iter(self) -> impl Iterator<Item = ShaderStage> {
        Self::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl std::ops::BitOr for ShaderStage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ShaderStage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitXor for ShaderStage {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for stage in self.iter() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(stage.name())?;
            first = false;
        }
        Ok(())
    }
}

/// A symbol that can carry a stage requirement.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SymbolKey {
    Function(FunctionId),
    Field(FieldId),
    /// The generated field initializer of a type.
    PreConstructor(TypeId),
}

/// The stages a symbol transitively requires, plus the dependency that
/// introduced the requirement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageRequirement {
    pub required: ShaderStage,
    /// The referenced symbol the requirement came from.
    pub dependency: Option<SymbolKey>,
    /// Where that symbol was referenced.
    pub location: Option<CodeLocation>,
}

impl StageRequirement {
    /// Merges the requirement of a referenced symbol. The first non-empty
    /// dependency is kept as the blame source.
    pub fn combine(
        &mut self,
        required: ShaderStage,
        dependency: SymbolKey,
        location: Option<CodeLocation>,
    ) {
        if required.is_empty() {
            return;
        }
        if self.dependency.is_none() {
            self.dependency = Some(dependency);
            self.location = location;
        }
        self.required |= required;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let both = ShaderStage::VERTEX | ShaderStage::PIXEL;
        assert!(both.contains(ShaderStage::PIXEL));
        assert!(!both.contains(ShaderStage::COMPUTE));
        assert_eq!(both.count(), 2);
        assert!((both ^ ShaderStage::VERTEX) == ShaderStage::PIXEL);
        assert!(ShaderStage::NONE.is_empty());
    }

    #[test]
    fn display_lists_stages() {
        assert_eq!(ShaderStage::PIXEL.to_string(), "Pixel");
        assert_eq!(
            (ShaderStage::VERTEX | ShaderStage::COMPUTE).to_string(),
            "Vertex|Compute"
        );
        assert_eq!(ShaderStage::NONE.to_string(), "None");
    }

    #[test]
    fn combine_keeps_first_blame() {
        let mut req = StageRequirement::default();
        req.combine(ShaderStage::NONE, SymbolKey::Function(FunctionId(1)), None);
        assert_eq!(req.dependency, None);
        req.combine(ShaderStage::PIXEL, SymbolKey::Function(FunctionId(2)), None);
        req.combine(ShaderStage::VERTEX, SymbolKey::Field(FieldId(3)), None);
        assert_eq!(req.dependency, Some(SymbolKey::Function(FunctionId(2))));
        assert_eq!(req.required, ShaderStage::PIXEL | ShaderStage::VERTEX);
    }
}
