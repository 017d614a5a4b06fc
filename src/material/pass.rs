use std::sync::Arc;

use log::{debug, warn};

use super::{
    MaterialError, MaterialParam, ParamListener, ParamType, ParamValue, RenderState, Semantic,
    SemanticManager,
};
use crate::device::{
    self, AttributeDesc, DescriptorBinding, DescriptorPoolHandle, DescriptorSetHandle,
    DescriptorSetLayoutHandle, Device, InputAttribute, InputLayout, PipelineDesc, PipelineHandle,
    ProgramDesc, ProgramHandle, ShaderSource, ShaderStage, UniformDesc, VertexFormat,
};

/// Builds a program description by scanning shader declarations.
///
/// Every `uniform <type> <name>;` line of any stage is an active uniform,
/// deduplicated by name across stages. Every `in <type> <name>;` line of the
/// vertex stage is an active attribute, in declaration order.
pub fn reflect_program(
    name: impl Into<String>,
    stages: Vec<ShaderSource>,
) -> Result<ProgramDesc, MaterialError> {
    let name = name.into();
    let mut uniforms: Vec<UniformDesc> = Vec::new();
    let mut attributes = Vec::new();

    for stage in &stages {
        for line in stage.source.lines() {
            let line = strip_layout(line.trim());
            if let Some(rest) = line.strip_prefix("uniform ") {
                let (ty_name, uniform) = parse_declaration(rest)
                    .ok_or_else(|| MaterialError::InvalidShader {
                        program: name.clone(),
                        line: line.to_string(),
                    })?;
                let ty = ParamType::parse(ty_name).ok_or_else(|| MaterialError::UnknownType {
                    name: uniform.to_string(),
                    ty: ty_name.to_string(),
                })?;
                match uniforms.iter().find(|existing| existing.name == uniform) {
                    Some(existing) if existing.ty != ty => {
                        return Err(MaterialError::TypeMismatch {
                            name: uniform.to_string(),
                            expected: existing.ty,
                            found: ty,
                        })
                    }
                    Some(_) => {}
                    None => uniforms.push(UniformDesc {
                        name: uniform.to_string(),
                        ty,
                    }),
                }
            } else if stage.stage == ShaderStage::Vertex {
                let Some(rest) = line
                    .strip_prefix("in ")
                    .or_else(|| line.strip_prefix("attribute "))
                else {
                    continue;
                };
                let (ty_name, attribute) = parse_declaration(rest)
                    .ok_or_else(|| MaterialError::InvalidShader {
                        program: name.clone(),
                        line: line.to_string(),
                    })?;
                let format = VertexFormat::from_shader_type(ty_name).ok_or_else(|| {
                    MaterialError::UnknownType {
                        name: attribute.to_string(),
                        ty: ty_name.to_string(),
                    }
                })?;
                attributes.push(AttributeDesc {
                    name: attribute.to_string(),
                    format,
                });
            }
        }
    }

    Ok(ProgramDesc {
        name,
        stages,
        uniforms,
        attributes,
    })
}

fn strip_layout(line: &str) -> &str {
    match line.strip_prefix("layout") {
        Some(rest) => rest.split_once(')').map_or(line, |(_, tail)| tail.trim_start()),
        None => line,
    }
}

fn parse_declaration(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim().strip_suffix(';')?;
    let mut parts = rest.split_whitespace();
    let ty = parts.next()?;
    let name = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let name = name.split('[').next()?;
    Some((ty, name))
}

/// Builds the vertex input layout by walking attributes in declaration order.
pub fn build_input_layout(attributes: &[AttributeDesc]) -> InputLayout {
    let mut offset = 0;
    let attributes = attributes
        .iter()
        .enumerate()
        .map(|(location, attribute)| {
            let input = InputAttribute {
                name: attribute.name.clone(),
                location: location as u32,
                format: attribute.format,
                offset,
            };
            offset += attribute.format.size();
            input
        })
        .collect();
    InputLayout {
        stride: offset,
        attributes,
    }
}

/// Uniform bound to a user parameter; receives value changes as they happen.
pub struct ParamBinding {
    uniform: String,
    slot: u32,
    set: DescriptorSetHandle,
    param: Arc<MaterialParam>,
    device: Arc<dyn Device>,
}

impl ParamBinding {
    pub fn uniform(&self) -> &str {
        &self.uniform
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn param(&self) -> &Arc<MaterialParam> {
        &self.param
    }
}

impl ParamListener for ParamBinding {
    fn on_param_changed(&self, value: &ParamValue) {
        self.device.update_descriptor(self.set, self.slot, value);
    }
}

/// Uniform bound to a pipeline-global value pulled before each draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticBinding {
    pub uniform: String,
    pub slot: u32,
    pub semantic: Semantic,
}

pub enum UniformBinding {
    Param(Arc<ParamBinding>),
    Semantic(SemanticBinding),
}

impl UniformBinding {
    pub fn uniform(&self) -> &str {
        match self {
            UniformBinding::Param(binding) => binding.uniform(),
            UniformBinding::Semantic(binding) => &binding.uniform,
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self, UniformBinding::Param(_))
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, UniformBinding::Semantic(_))
    }
}

enum Classified {
    Param(Arc<MaterialParam>),
    Semantic(Semantic),
}

/// Decides how a uniform is fed, exactly once.
///
/// A parameter with the uniform's name wins; if that parameter carries a
/// semantic tag it is pipeline-global. Otherwise the uniform name itself may
/// name a semantic.
fn classify(
    uniform: &UniformDesc,
    params: &[Arc<MaterialParam>],
) -> Result<Classified, MaterialError> {
    if let Some(param) = params.iter().find(|param| param.name() == uniform.name) {
        let expected = match param.semantic() {
            Some(semantic) => semantic.param_type(),
            None => param.ty(),
        };
        if param.ty() != uniform.ty || expected != uniform.ty {
            return Err(MaterialError::TypeMismatch {
                name: uniform.name.clone(),
                expected: uniform.ty,
                found: if param.ty() != uniform.ty { param.ty() } else { expected },
            });
        }
        return Ok(match param.semantic() {
            Some(semantic) => Classified::Semantic(semantic),
            None => Classified::Param(Arc::clone(param)),
        });
    }
    match Semantic::from_name(&uniform.name) {
        Some(semantic) if semantic.param_type() == uniform.ty => Ok(Classified::Semantic(semantic)),
        Some(semantic) => Err(MaterialError::TypeMismatch {
            name: uniform.name.clone(),
            expected: uniform.ty,
            found: semantic.param_type(),
        }),
        None => Err(MaterialError::UnboundUniform {
            uniform: uniform.name.clone(),
        }),
    }
}

/// One pass of a technique: program, fixed-function state, input layout and
/// the binding table connecting every active uniform to its value source.
pub struct MaterialPass {
    name: String,
    program: ProgramDesc,
    state: RenderState,
    input_layout: InputLayout,
    bindings: Vec<UniformBinding>,
    program_handle: Option<ProgramHandle>,
    descriptor_layout: Option<DescriptorSetLayoutHandle>,
    descriptor_pool: Option<DescriptorPoolHandle>,
    descriptor_set: Option<DescriptorSetHandle>,
    pipeline: Option<PipelineHandle>,
}

impl MaterialPass {
    pub fn new(name: impl Into<String>, program: ProgramDesc, state: RenderState) -> Self {
        let input_layout = build_input_layout(&program.attributes);
        Self {
            name: name.into(),
            program,
            state,
            input_layout,
            bindings: Vec::new(),
            program_handle: None,
            descriptor_layout: None,
            descriptor_pool: None,
            descriptor_set: None,
            pipeline: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &ProgramDesc {
        &self.program
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn input_layout(&self) -> &InputLayout {
        &self.input_layout
    }

    pub fn bindings(&self) -> &[UniformBinding] {
        &self.bindings
    }

    pub fn descriptor_set(&self) -> Option<DescriptorSetHandle> {
        self.descriptor_set
    }

    pub fn cached_pipeline(&self) -> Option<PipelineHandle> {
        self.pipeline
    }

    pub fn is_setup(&self) -> bool {
        self.descriptor_set.is_some()
    }

    /// Resolves every active uniform and creates the pass's GPU objects.
    ///
    /// On error, objects created so far stay owned by the pass and are
    /// released by [`MaterialPass::close`].
    pub fn setup(
        &mut self,
        device: &Arc<dyn Device>,
        params: &[Arc<MaterialParam>],
    ) -> Result<(), MaterialError> {
        if self.is_setup() {
            return Ok(());
        }
        if let Some(stage) = self
            .program
            .stages
            .iter()
            .find(|stage| !device.is_shader_support(stage.stage))
        {
            return Err(MaterialError::UnsupportedShaderStage {
                pass: self.name.clone(),
                stage: stage.stage,
            });
        }
        if let Some(attribute) = self
            .input_layout
            .attributes
            .iter()
            .find(|attribute| !device.is_vertex_support(attribute.format))
        {
            return Err(MaterialError::UnsupportedVertexFormat {
                attribute: attribute.name.clone(),
                format: attribute.format,
            });
        }

        let classified = self
            .program
            .uniforms
            .iter()
            .map(|uniform| classify(uniform, params))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| warn!("material pass {}: {err}", self.name))?;

        let layout_bindings: Vec<DescriptorBinding> = self
            .program
            .uniforms
            .iter()
            .enumerate()
            .map(|(slot, uniform)| DescriptorBinding {
                binding: slot as u32,
                name: uniform.name.clone(),
                ty: uniform.ty,
            })
            .collect();

        let program = device.create_program(&self.program)?;
        self.program_handle = Some(program);
        let layout = device.create_descriptor_set_layout(&layout_bindings)?;
        self.descriptor_layout = Some(layout);
        let pool = device.create_descriptor_pool(layout, 1)?;
        self.descriptor_pool = Some(pool);
        let set = device.create_descriptor_set(pool, layout)?;
        self.descriptor_set = Some(set);

        for ((slot, uniform), classified) in self.program.uniforms.iter().enumerate().zip(classified) {
            let slot = slot as u32;
            let binding = match classified {
                Classified::Param(param) => {
                    let binding = Arc::new(ParamBinding {
                        uniform: uniform.name.clone(),
                        slot,
                        set,
                        param: Arc::clone(&param),
                        device: Arc::clone(device),
                    });
                    let listener: Arc<dyn ParamListener> = binding.clone();
                    param.add_listener(&listener);
                    device.update_descriptor(set, slot, &param.value());
                    UniformBinding::Param(binding)
                }
                Classified::Semantic(semantic) => UniformBinding::Semantic(SemanticBinding {
                    uniform: uniform.name.clone(),
                    slot,
                    semantic,
                }),
            };
            self.bindings.push(binding);
        }
        debug!(
            "material pass {} bound {} uniform(s)",
            self.name,
            self.bindings.len()
        );
        Ok(())
    }

    /// Returns the pass's render pipeline, creating it on first use.
    pub fn pipeline(&mut self, device: &dyn Device) -> Result<PipelineHandle, MaterialError> {
        if let Some(pipeline) = self.pipeline {
            return Ok(pipeline);
        }
        let (Some(program), Some(descriptor_layout)) = (self.program_handle, self.descriptor_layout)
        else {
            return Err(MaterialError::NotSetup {
                pass: self.name.clone(),
            });
        };
        let pipeline = device.create_render_pipeline(&PipelineDesc {
            label: self.name.clone(),
            program,
            state: self.state,
            input_layout: self.input_layout.clone(),
            descriptor_layout,
        })?;
        self.pipeline = Some(pipeline);
        Ok(pipeline)
    }

    /// Uploads the current value of every semantic binding.
    pub fn update(&self, device: &dyn Device, semantics: &SemanticManager) {
        let Some(set) = self.descriptor_set else {
            debug_assert!(false, "update on pass {} before setup", self.name);
            return;
        };
        for binding in &self.bindings {
            if let UniformBinding::Semantic(binding) = binding {
                device.update_descriptor(set, binding.slot, semantics.get(binding.semantic));
            }
        }
    }

    /// Prepares the pass for a draw: semantics, pipeline, descriptor set.
    pub fn bind(
        &mut self,
        device: &dyn Device,
        semantics: &SemanticManager,
    ) -> Result<(), MaterialError> {
        let pipeline = self.pipeline(device)?;
        let Some(set) = self.descriptor_set else {
            return Err(MaterialError::NotSetup {
                pass: self.name.clone(),
            });
        };
        self.update(device, semantics);
        device.bind_pipeline(pipeline);
        device.bind_descriptor_set(set);
        Ok(())
    }

    pub fn close(&mut self, device: &dyn Device) {
        for binding in self.bindings.drain(..) {
            if let UniformBinding::Param(binding) = binding {
                let listener: Arc<dyn ParamListener> = binding.clone();
                binding.param.remove_listener(&listener);
            }
        }
        device::release(device, &mut self.pipeline);
        device::release(device, &mut self.descriptor_set);
        device::release(device, &mut self.descriptor_pool);
        device::release(device, &mut self.descriptor_layout);
        device::release(device, &mut self.program_handle);
    }
}
