//! Translator settings: recognized attribute names, per-stage built-ins,
//! uniform buffer layouts and render targets.
//!
//! [`Settings`] is plain data, usually deserialized from JSON. It must be
//! turned into [`FinalizedSettings`] before translation; finalization checks
//! the bundle for conflicts and builds the lookup tables the translator uses.

use std::collections::HashMap;

use serde::Deserialize;
use shir_ir::ShaderStage;

/// Configuration errors found while finalizing settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("uniform buffers '{first}' and '{second}' both use descriptor set {descriptor_set}, binding {binding}")]
    DuplicateBinding {
        descriptor_set: u32,
        binding: u32,
        first: String,
        second: String,
    },

    #[error("field '{field}' is registered twice for the {stage} stage")]
    DuplicateField { field: String, stage: ShaderStage },

    #[error("built-in '{name}' of the {stage} stage maps to both '{first}' and '{second}'")]
    ConflictingBuiltIn {
        name: String,
        stage: ShaderStage,
        first: String,
        second: String,
    },

    #[error("app built-in '{name}' collides with a hardware built-in of the {stage} stage")]
    AppBuiltInCollision { name: String, stage: ShaderStage },

    #[error("{count} render targets configured but at most {max} are allowed")]
    TooManyRenderTargets { count: usize, max: usize },

    #[error("render target '{0}' is configured more than once")]
    DuplicateRenderTarget(String),

    #[error("unknown shader stage '{0}'")]
    UnknownStage(String),
}

fn s(v: &str) -> String {
    v.to_string()
}

/// Every attribute and function name the translator recognizes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NameSettings {
    pub vertex: String,
    pub geometry: String,
    pub pixel: String,
    pub compute: String,
    pub requires_vertex: String,
    pub requires_geometry: String,
    pub requires_pixel: String,
    pub requires_compute: String,
    pub input: String,
    pub output: String,
    pub hardware_built_in_input: String,
    pub hardware_built_in_output: String,
    pub app_built_in_input: String,
    pub property_input: String,
    pub static_attribute: String,
    pub fragment_shared: String,
    pub storage_class: String,
    pub specialization_constant: String,
    pub entry_point: String,
    pub non_copyable: String,
    pub extension: String,
    pub main_function: String,
    pub local_size_x: String,
    pub local_size_y: String,
    pub local_size_z: String,
    pub max_vertices: String,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            vertex: s("Vertex"),
            geometry: s("Geometry"),
            pixel: s("Pixel"),
            compute: s("Compute"),
            requires_vertex: s("RequiresVertex"),
            requires_geometry: s("RequiresGeometry"),
            requires_pixel: s("RequiresPixel"),
            requires_compute: s("RequiresCompute"),
            input: s("Input"),
            output: s("Output"),
            hardware_built_in_input: s("HardwareBuiltInInput"),
            hardware_built_in_output: s("HardwareBuiltInOutput"),
            app_built_in_input: s("AppBuiltInInput"),
            property_input: s("PropertyInput"),
            static_attribute: s("Static"),
            fragment_shared: s("FragmentShared"),
            storage_class: s("StorageClass"),
            specialization_constant: s("SpecializationConstant"),
            entry_point: s("EntryPoint"),
            non_copyable: s("NonCopyable"),
            extension: s("Extension"),
            main_function: s("Main"),
            local_size_x: s("LocalSizeX"),
            local_size_y: s("LocalSizeY"),
            local_size_z: s("LocalSizeZ"),
            max_vertices: s("MaxVertices"),
        }
    }
}

impl NameSettings {
    /// The stage a stage-declaring attribute names.
    pub fn stage_of(&self, attribute: &str) -> Option<ShaderStage> {
        self.stage_attributes()
            .into_iter()
            .find(|(_, name)| *name == attribute)
            .map(|(stage, _)| stage)
    }

    /// The stage a `Requires*` attribute names.
    pub fn requirement_of(&self, attribute: &str) -> Option<ShaderStage> {
        [
            (ShaderStage::VERTEX, &self.requires_vertex),
            (ShaderStage::GEOMETRY, &self.requires_geometry),
            (ShaderStage::PIXEL, &self.requires_pixel),
            (ShaderStage::COMPUTE, &self.requires_compute),
        ]
        .into_iter()
        .find(|(_, name)| name.as_str() == attribute)
        .map(|(stage, _)| stage)
    }

    /// The attribute name declaring a single stage.
    pub fn stage_attribute(&self, stage: ShaderStage) -> &str {
        self.stage_attributes()
            .into_iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, name)| name)
            .unwrap_or("")
    }

    fn stage_attributes(&self) -> [(ShaderStage, &str); 4] {
        [
            (ShaderStage::VERTEX, self.vertex.as_str()),
            (ShaderStage::GEOMETRY, self.geometry.as_str()),
            (ShaderStage::PIXEL, self.pixel.as_str()),
            (ShaderStage::COMPUTE, self.compute.as_str()),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum BuiltInDirection {
    Input,
    Output,
}

/// A hardware built-in variable available to one stage.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BuiltInSetting {
    /// Field name that binds to the built-in.
    pub name: String,
    pub type_name: String,
    /// The target built-in, e.g. `Position` or `FragCoord`.
    pub built_in: String,
    pub direction: BuiltInDirection,
}

impl BuiltInSetting {
    pub fn new(name: &str, type_name: &str, built_in: &str, direction: BuiltInDirection) -> Self {
        Self {
            name: s(name),
            type_name: s(type_name),
            built_in: s(built_in),
            direction,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StageBuiltIns {
    pub vertex: Vec<BuiltInSetting>,
    pub geometry: Vec<BuiltInSetting>,
    pub pixel: Vec<BuiltInSetting>,
    pub compute: Vec<BuiltInSetting>,
}

impl StageBuiltIns {
    pub fn for_stage(&self, stage: ShaderStage) -> &[BuiltInSetting] {
        match stage {
            ShaderStage::VERTEX => &self.vertex,
            ShaderStage::GEOMETRY => &self.geometry,
            ShaderStage::PIXEL => &self.pixel,
            ShaderStage::COMPUTE => &self.compute,
            _ => &[],
        }
    }
}

impl Default for StageBuiltIns {
    fn default() -> Self {
        use BuiltInDirection::{Input, Output};
        let b = BuiltInSetting::new;
        Self {
            vertex: vec![
                b("Position", "Real4", "Position", Output),
                b("PointSize", "Real", "PointSize", Output),
                b("VertexId", "Integer", "VertexIndex", Input),
                b("InstanceId", "Integer", "InstanceIndex", Input),
            ],
            geometry: vec![
                b("Position", "Real4", "Position", Input),
                b("Position", "Real4", "Position", Output),
                b("PrimitiveId", "Integer", "PrimitiveId", Input),
                b("PrimitiveId", "Integer", "PrimitiveId", Output),
            ],
            pixel: vec![
                b("FragCoord", "Real4", "FragCoord", Input),
                b("PointCoord", "Real2", "PointCoord", Input),
                b("FrontFacing", "Boolean", "FrontFacing", Input),
                b("FragDepth", "Real", "FragDepth", Output),
            ],
            compute: vec![
                b("GlobalInvocationId", "Integer3", "GlobalInvocationId", Input),
                b("LocalInvocationId", "Integer3", "LocalInvocationId", Input),
                b("WorkgroupId", "Integer3", "WorkgroupId", Input),
                b("NumWorkgroups", "Integer3", "NumWorkgroups", Input),
                b("LocalInvocationIndex", "Integer", "LocalInvocationIndex", Input),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FieldSetting {
    pub name: String,
    pub type_name: String,
}

impl FieldSetting {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: s(name),
            type_name: s(type_name),
        }
    }
}

/// An application-provided uniform block.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UniformBufferSetting {
    pub binding: u32,
    #[serde(default)]
    pub descriptor_set: u32,
    /// Stage names this buffer is visible to. Empty means every stage.
    #[serde(default)]
    pub allowed_stages: Vec<String>,
    pub debug_name: String,
    #[serde(default)]
    pub fields: Vec<FieldSetting>,
}

/// Receives every `PropertyInput`/`AppBuiltInInput` field not claimed by a
/// configured buffer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultUniformBufferSetting {
    pub binding: u32,
    pub descriptor_set: u32,
    pub debug_name: String,
}

impl Default for DefaultUniformBufferSetting {
    fn default() -> Self {
        Self {
            binding: 0,
            descriptor_set: 0,
            debug_name: s("Material"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub names: NameSettings,
    pub built_ins: StageBuiltIns,
    pub uniform_buffers: Vec<UniformBufferSetting>,
    pub default_uniform_buffer: DefaultUniformBufferSetting,
    /// Vertex attributes in location order.
    pub vertex_definition: Vec<FieldSetting>,
    pub render_targets: Vec<String>,
    pub max_render_targets: usize,
    pub language_id: i32,
    pub language_version: i32,
    pub error_on_missing_main: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            names: NameSettings::default(),
            built_ins: StageBuiltIns::default(),
            uniform_buffers: Vec::new(),
            default_uniform_buffer: DefaultUniformBufferSetting::default(),
            vertex_definition: Vec::new(),
            render_targets: Vec::new(),
            max_render_targets: 8,
            language_id: 0,
            language_version: 0,
            error_on_missing_main: false,
        }
    }
}

fn parse_stages(names: &NameSettings, stages: &[String]) -> Result<ShaderStage, ConfigError> {
    if stages.is_empty() {
        return Ok(ShaderStage::ALL
            .into_iter()
            .fold(ShaderStage::NONE, |acc, s| acc | s));
    }
    let mut out = ShaderStage::NONE;
    for name in stages {
        out |= names
            .stage_of(name)
            .ok_or_else(|| ConfigError::UnknownStage(name.clone()))?;
    }
    Ok(out)
}

impl Settings {
    /// Validates the bundle and builds its lookup tables.
    pub fn finalize(self) -> Result<FinalizedSettings, ConfigError> {
        // Descriptor slots, including the default buffer.
        let mut slots: HashMap<(u32, u32), String> = HashMap::new();
        let default = &self.default_uniform_buffer;
        slots.insert(
            (default.descriptor_set, default.binding),
            default.debug_name.clone(),
        );
        for ub in &self.uniform_buffers {
            if let Some(first) = slots.insert((ub.descriptor_set, ub.binding), ub.debug_name.clone()) {
                return Err(ConfigError::DuplicateBinding {
                    descriptor_set: ub.descriptor_set,
                    binding: ub.binding,
                    first,
                    second: ub.debug_name.clone(),
                });
            }
        }

        // Hardware built-ins.
        let mut built_ins = HashMap::new();
        for stage in ShaderStage::ALL {
            let mut ids: HashMap<&str, &str> = HashMap::new();
            for (i, b) in self.built_ins.for_stage(stage).iter().enumerate() {
                if let Some(&first) = ids.get(b.name.as_str()) {
                    if first != b.built_in {
                        return Err(ConfigError::ConflictingBuiltIn {
                            name: b.name.clone(),
                            stage,
                            first: first.to_string(),
                            second: b.built_in.clone(),
                        });
                    }
                }
                ids.insert(&b.name, &b.built_in);
                built_ins.insert((stage, b.direction, b.name.clone()), i);
            }
        }

        // Application built-ins live in uniform buffers.
        let mut buffer_stages = Vec::with_capacity(self.uniform_buffers.len());
        let mut uniform_fields = HashMap::new();
        for (index, ub) in self.uniform_buffers.iter().enumerate() {
            let stages = parse_stages(&self.names, &ub.allowed_stages)?;
            buffer_stages.push(stages);
            for field in &ub.fields {
                for stage in stages.iter() {
                    if self
                        .built_ins
                        .for_stage(stage)
                        .iter()
                        .any(|b| b.name == field.name)
                    {
                        return Err(ConfigError::AppBuiltInCollision {
                            name: field.name.clone(),
                            stage,
                        });
                    }
                    if uniform_fields
                        .insert((stage, field.name.clone()), index)
                        .is_some()
                    {
                        return Err(ConfigError::DuplicateField {
                            field: field.name.clone(),
                            stage,
                        });
                    }
                }
            }
        }

        if self.render_targets.len() > self.max_render_targets {
            return Err(ConfigError::TooManyRenderTargets {
                count: self.render_targets.len(),
                max: self.max_render_targets,
            });
        }
        for (i, name) in self.render_targets.iter().enumerate() {
            if self.render_targets[..i].contains(name) {
                return Err(ConfigError::DuplicateRenderTarget(name.clone()));
            }
        }

        log::debug!(
            "settings finalized: {} uniform buffers, {} render targets",
            self.uniform_buffers.len(),
            self.render_targets.len()
        );
        Ok(FinalizedSettings {
            settings: self,
            built_ins,
            uniform_fields,
            buffer_stages,
        })
    }
}

/// Validated, immutable settings.
#[derive(Clone, Debug)]
pub struct FinalizedSettings {
    settings: Settings,
    built_ins: HashMap<(ShaderStage, BuiltInDirection, String), usize>,
    uniform_fields: HashMap<(ShaderStage, String), usize>,
    buffer_stages: Vec<ShaderStage>,
}

impl Default for FinalizedSettings {
    /// The default settings always finalize.
    fn default() -> Self {
        let settings = Settings::default();
        let mut built_ins = HashMap::new();
        for stage in ShaderStage::ALL {
            for (i, b) in settings.built_ins.for_stage(stage).iter().enumerate() {
                built_ins.insert((stage, b.direction, b.name.clone()), i);
            }
        }
        Self {
            settings,
            built_ins,
            uniform_fields: HashMap::new(),
            buffer_stages: Vec::new(),
        }
    }
}

impl FinalizedSettings {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn names(&self) -> &NameSettings {
        &self.settings.names
    }

    pub fn built_in(
        &self,
        stage: ShaderStage,
        direction: BuiltInDirection,
        name: &str,
    ) -> Option<&BuiltInSetting> {
        let &i = self.built_ins.get(&(stage, direction, name.to_string()))?;
        self.settings.built_ins.for_stage(stage).get(i)
    }

    /// The configured uniform buffer holding `field` for `stage`.
    pub fn uniform_buffer_for(&self, stage: ShaderStage, field: &str) -> Option<usize> {
        self.uniform_fields
            .get(&(stage, field.to_string()))
            .copied()
    }

    pub fn uniform_buffer(&self, index: usize) -> Option<&UniformBufferSetting> {
        self.settings.uniform_buffers.get(index)
    }

    pub fn uniform_buffer_stages(&self, index: usize) -> ShaderStage {
        self.buffer_stages.get(index).copied().unwrap_or_default()
    }

    pub fn render_target_index(&self, name: &str) -> Option<u32> {
        self.settings
            .render_targets
            .iter()
            .position(|t| t == name)
            .map(|i| i as u32)
    }

    pub fn vertex_attribute_location(&self, name: &str) -> Option<u32> {
        self.settings
            .vertex_definition
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(name: &str, binding: u32, stages: &[&str], fields: &[&str]) -> UniformBufferSetting {
        UniformBufferSetting {
            binding,
            descriptor_set: 0,
            allowed_stages: stages.iter().map(|s| s.to_string()).collect(),
            debug_name: name.to_string(),
            fields: fields.iter().map(|f| FieldSetting::new(f, "Real")).collect(),
        }
    }

    #[test]
    fn defaults_finalize() {
        let finalized = Settings::default().finalize().expect("valid");
        let pos = finalized
            .built_in(ShaderStage::VERTEX, BuiltInDirection::Output, "Position")
            .expect("position");
        assert_eq!(pos.type_name, "Real4");
        assert!(finalized
            .built_in(ShaderStage::VERTEX, BuiltInDirection::Input, "Position")
            .is_none());
        assert_eq!(finalized.names().main_function, "Main");
    }

    #[test]
    fn duplicate_binding_rejected() {
        let mut settings = Settings::default();
        settings.uniform_buffers.push(buffer("Frame", 1, &[], &["Time"]));
        settings.uniform_buffers.push(buffer("Camera", 1, &[], &["Fov"]));
        let err = settings.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBinding { binding: 1, .. }));
    }

    #[test]
    fn default_buffer_slot_is_reserved() {
        let mut settings = Settings::default();
        settings.uniform_buffers.push(buffer("Frame", 0, &[], &["Time"]));
        assert!(settings.finalize().is_err());
    }

    #[test]
    fn field_twice_for_one_stage() {
        let mut settings = Settings::default();
        settings.uniform_buffers.push(buffer("Frame", 1, &["Pixel"], &["Time"]));
        settings.uniform_buffers.push(buffer("Other", 2, &["Vertex"], &["Time"]));
        assert!(settings.clone().finalize().is_ok());
        settings.uniform_buffers.push(buffer("Third", 3, &["Pixel"], &["Time"]));
        let err = settings.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateField { .. }));
    }

    #[test]
    fn app_built_in_cannot_shadow_hardware() {
        let mut settings = Settings::default();
        settings.uniform_buffers.push(buffer("Frame", 1, &["Pixel"], &["FragCoord"]));
        let err = settings.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::AppBuiltInCollision { .. }));
    }

    #[test]
    fn conflicting_built_in_ids() {
        let mut settings = Settings::default();
        settings.built_ins.pixel.push(BuiltInSetting::new(
            "FragCoord",
            "Real4",
            "Position",
            BuiltInDirection::Output,
        ));
        let err = settings.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingBuiltIn { .. }));
    }

    #[test]
    fn render_target_limits() {
        let mut settings = Settings {
            max_render_targets: 2,
            ..Settings::default()
        };
        settings.render_targets = vec!["Color".into(), "Normal".into(), "Depth".into()];
        assert!(matches!(
            settings.clone().finalize().unwrap_err(),
            ConfigError::TooManyRenderTargets { count: 3, max: 2 }
        ));
        settings.render_targets = vec!["Color".into(), "Color".into()];
        assert!(matches!(
            settings.finalize().unwrap_err(),
            ConfigError::DuplicateRenderTarget(_)
        ));
    }

    #[test]
    fn unknown_stage_name() {
        let mut settings = Settings::default();
        settings.uniform_buffers.push(buffer("Frame", 1, &["Tessellation"], &["Time"]));
        assert!(matches!(
            settings.finalize().unwrap_err(),
            ConfigError::UnknownStage(_)
        ));
    }

    #[test]
    fn deserializes_partial_json() {
        let json = r#"{
            "render_targets": ["Color"],
            "uniform_buffers": [
                { "binding": 2, "debug_name": "Frame", "fields": [{ "name": "Time", "type_name": "Real" }] }
            ],
            "names": { "main_function": "Run" }
        }"#;
        let settings: Settings = serde_json::from_str(json).expect("json");
        assert_eq!(settings.names.main_function, "Run");
        assert_eq!(settings.names.entry_point, "EntryPoint");
        let finalized = settings.finalize().expect("valid");
        assert_eq!(finalized.render_target_index("Color"), Some(0));
        assert_eq!(finalized.uniform_buffer_for(ShaderStage::COMPUTE, "Time"), Some(0));
    }

    #[test]
    fn stage_names() {
        let names = NameSettings::default();
        assert_eq!(names.stage_of("Pixel"), Some(ShaderStage::PIXEL));
        assert_eq!(names.requirement_of("RequiresCompute"), Some(ShaderStage::COMPUTE));
        assert_eq!(names.stage_attribute(ShaderStage::GEOMETRY), "Geometry");
        assert_eq!(names.stage_of("Hull"), None);
    }
}
