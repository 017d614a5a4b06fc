//! Materials: typed parameters, techniques, passes and their uniform bindings.

mod param;
mod pass;
mod semantic;
mod state;
mod xml;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::device::{Device, DeviceError, ShaderStage, VertexFormat};

pub use param::{MaterialParam, ParamListener, ParamType, ParamValue};
pub use pass::{
    build_input_layout, reflect_program, MaterialPass, ParamBinding, SemanticBinding,
    UniformBinding,
};
pub use semantic::{Semantic, SemanticManager};
pub use state::{
    BlendFactor, BlendOp, BlendState, CompareFunc, CullMode, DepthState, FillMode, RasterState,
    RenderState, StencilOp, StencilState,
};

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("{name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        found: ParamType,
    },
    #[error("invalid {ty} value {value:?}")]
    InvalidValue { ty: ParamType, value: String },
    #[error("invalid value {value:?} for state {name}")]
    InvalidState { name: String, value: String },
    #[error("unknown state {name}")]
    UnknownState { name: String },
    #[error("unknown type {ty:?} for {name}")]
    UnknownType { name: String, ty: String },
    #[error("uniform {uniform} is neither a parameter nor a semantic")]
    UnboundUniform { uniform: String },
    #[error("program {program}: cannot parse declaration {line:?}")]
    InvalidShader { program: String, line: String },
    #[error("pass {pass}: {stage} shaders are not supported by the device")]
    UnsupportedShaderStage { pass: String, stage: ShaderStage },
    #[error("attribute {attribute}: vertex format {format:?} is not supported by the device")]
    UnsupportedVertexFormat {
        attribute: String,
        format: VertexFormat,
    },
    #[error("shader block {0} is not defined")]
    MissingShader(String),
    #[error("unknown parameter {0}")]
    UnknownParam(String),
    #[error("pass {pass} is used before setup")]
    NotSetup { pass: String },
    #[error("invalid material document: {0}")]
    InvalidDocument(String),
    #[error("failed to parse material XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Ordered list of passes rendered together for one purpose.
pub struct Technique {
    name: String,
    passes: Vec<MaterialPass>,
}

impl Technique {
    pub fn new(name: impl Into<String>, passes: Vec<MaterialPass>) -> Self {
        Self {
            name: name.into(),
            passes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passes(&self) -> &[MaterialPass] {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut [MaterialPass] {
        &mut self.passes
    }
}

pub struct Material {
    name: String,
    params: Vec<Arc<MaterialParam>>,
    buffers: HashMap<String, Vec<String>>,
    techniques: Vec<Technique>,
    setup: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            buffers: HashMap::new(),
            techniques: Vec::new(),
            setup: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_param(&mut self, param: MaterialParam) -> Arc<MaterialParam> {
        let param = Arc::new(param);
        self.params.retain(|existing| existing.name() != param.name());
        self.params.push(Arc::clone(&param));
        param
    }

    pub fn params(&self) -> &[Arc<MaterialParam>] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Arc<MaterialParam>> {
        self.params.iter().find(|param| param.name() == name)
    }

    /// Sets a parameter by name; bound passes see the new value immediately.
    pub fn set_param(&self, name: &str, value: ParamValue) -> Result<(), MaterialError> {
        self.param(name)
            .ok_or_else(|| MaterialError::UnknownParam(name.to_string()))?
            .set_value(value)
    }

    /// Records that `param` belongs to the uniform block `buffer`.
    pub fn add_buffer_member(&mut self, buffer: &str, param: &str) {
        self.buffers
            .entry(buffer.to_string())
            .or_default()
            .push(param.to_string());
    }

    pub fn buffer_members(&self, buffer: &str) -> &[String] {
        self.buffers.get(buffer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_technique(&mut self, technique: Technique) {
        self.techniques.retain(|existing| existing.name() != technique.name());
        self.techniques.push(technique);
    }

    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    pub fn has_technique(&self, name: &str) -> bool {
        self.technique(name).is_some()
    }

    pub fn technique(&self, name: &str) -> Option<&Technique> {
        self.techniques.iter().find(|technique| technique.name() == name)
    }

    pub fn technique_mut(&mut self, name: &str) -> Option<&mut Technique> {
        self.techniques
            .iter_mut()
            .find(|technique| technique.name() == name)
    }

    pub fn is_setup(&self) -> bool {
        self.setup
    }

    /// Binds every pass of every technique.
    ///
    /// Either the whole material is usable afterwards or nothing it created
    /// is left alive.
    pub fn setup(&mut self, device: &Arc<dyn Device>) -> Result<(), MaterialError> {
        if self.setup {
            return Ok(());
        }
        let params = &self.params;
        let result = self
            .techniques
            .iter_mut()
            .flat_map(|technique| technique.passes.iter_mut())
            .try_for_each(|pass| pass.setup(device, params));
        if let Err(err) = result {
            self.close(device.as_ref());
            return Err(err);
        }
        self.setup = true;
        debug!(
            "material {} ready with {} technique(s)",
            self.name,
            self.techniques.len()
        );
        Ok(())
    }

    pub fn close(&mut self, device: &dyn Device) {
        for technique in &mut self.techniques {
            for pass in &mut technique.passes {
                pass.close(device);
            }
        }
        self.setup = false;
    }
}

/// Materials by name.
#[derive(Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `material`, returning the one it replaced.
    pub fn insert(&mut self, material: Material) -> Option<Material> {
        self.materials.insert(material.name().to_string(), material)
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Material> {
        self.materials.remove(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }

    pub fn setup(&mut self, device: &Arc<dyn Device>) -> Result<(), MaterialError> {
        if self.materials.values().all(Material::is_setup) {
            return Ok(());
        }
        for material in self.materials.values_mut() {
            material.setup(device)?;
        }
        info!("{} material(s) ready", self.materials.len());
        Ok(())
    }

    pub fn close(&mut self, device: &dyn Device) {
        for material in self.materials.values_mut() {
            material.close(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    const MATERIAL: &str = r#"
<material name="flat">
  <parameter name="diffuseColor" type="float4" value="1 1 1 1"/>
  <shader name="Flat"><![CDATA[
    in vec3 position;
    uniform mat4 matModelViewProject;
    uniform vec4 diffuseColor;
    void main() {}
  ]]></shader>
  <technique name="GBuffer">
    <pass name="p0">
      <state name="vertex" value="Flat"/>
      <state name="fragment" value="Flat"/>
    </pass>
  </technique>
  <technique name="Broken">
    <pass name="p0">
      <state name="vertex" value="Flat"/>
      <state name="fragment" value="Flat"/>
    </pass>
  </technique>
</material>
"#;

    #[test]
    fn failed_setup_leaves_nothing_alive() {
        let recording = Arc::new(RecordingDevice::default());
        let device: Arc<dyn Device> = recording.clone();
        let mut material = Material::from_xml(MATERIAL).unwrap();
        recording.fail_after(5);
        assert!(material.setup(&device).is_err());
        assert!(!material.is_setup());
        assert_eq!(recording.live_count(), 0);
        assert_eq!(material.param("diffuseColor").unwrap().listener_count(), 0);
    }

    #[test]
    fn set_param_reaches_every_pass() {
        let recording = Arc::new(RecordingDevice::default());
        let device: Arc<dyn Device> = recording.clone();
        let mut material = Material::from_xml(MATERIAL).unwrap();
        material.setup(&device).unwrap();
        assert_eq!(material.param("diffuseColor").unwrap().listener_count(), 2);

        let red = ParamValue::Float4(glam::Vec4::new(1.0, 0.0, 0.0, 1.0));
        material.set_param("diffuseColor", red.clone()).unwrap();
        for technique in material.techniques() {
            let set = technique.passes()[0].descriptor_set().unwrap();
            assert_eq!(recording.descriptor_value(set, 1), Some(red.clone()));
        }
        assert!(matches!(
            material.set_param("missing", red),
            Err(MaterialError::UnknownParam(_))
        ));
    }

    #[test]
    fn library_close_releases_everything() {
        let recording = Arc::new(RecordingDevice::default());
        let device: Arc<dyn Device> = recording.clone();
        let mut library = MaterialLibrary::new();
        library.insert(Material::from_xml(MATERIAL).unwrap());
        library.setup(&device).unwrap();
        assert!(recording.live_count() > 0);
        library.close(device.as_ref());
        assert_eq!(recording.live_count(), 0);
    }
}
