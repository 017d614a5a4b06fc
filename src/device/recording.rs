//! Headless [`Device`] that records everything it is asked to do.
//!
//! Used by the command-line tool and the test-suite. Capability answers come
//! from a [`Capabilities`] table, object creation can be made to fail after a
//! fixed number of successful calls, and every live object plus the ordered
//! command stream can be inspected afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, trace};
use parking_lot::Mutex;

use super::{
    BufferHandle, DescriptorBinding, DescriptorPoolHandle, DescriptorSetHandle,
    DescriptorSetLayoutHandle, Device, DeviceError, DrawCall, FramebufferDesc, FramebufferHandle,
    FramebufferLayoutDesc, FramebufferLayoutHandle, PassDesc, PipelineDesc, PipelineHandle,
    ProgramDesc, ProgramHandle, RenderTarget, Resource, ShaderStage, Stage, TextureDesc,
    TextureDim, TextureFormat, TextureHandle, TextureUsage, VertexFormat,
};
use crate::material::ParamValue;

/// Capability table answering the device's support queries.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub formats: HashMap<TextureFormat, TextureUsage>,
    pub max_texture_size: u32,
    pub dims: HashSet<TextureDim>,
    pub vertex_formats: HashSet<VertexFormat>,
    pub shader_stages: HashSet<ShaderStage>,
}

impl Capabilities {
    /// Every format, dimension, vertex format and shader stage supported.
    pub fn full() -> Self {
        use TextureFormat::*;
        let depth = TextureUsage::DEPTH_TARGET | TextureUsage::COPY_SRC;
        let color = TextureUsage::COLOR_TARGET | TextureUsage::COPY_SRC | TextureUsage::COPY_DST;
        let mut formats = HashMap::new();
        for format in [D24S8, D16S8, X8D24, D16, D32F] {
            formats.insert(format, depth);
        }
        for format in [R16F, R32F, RGBA8, RGB10A2, RG11B10F, RGBA16F, RGBA32F] {
            formats.insert(format, color);
        }
        Self {
            formats,
            max_texture_size: 16384,
            dims: [TextureDim::Texture2D, TextureDim::Texture3D, TextureDim::Cube]
                .into_iter()
                .collect(),
            vertex_formats: [
                VertexFormat::Float,
                VertexFormat::Float2,
                VertexFormat::Float3,
                VertexFormat::Float4,
                VertexFormat::Int,
                VertexFormat::Int4,
                VertexFormat::UByte4Norm,
            ]
            .into_iter()
            .collect(),
            shader_stages: [
                ShaderStage::Vertex,
                ShaderStage::Fragment,
                ShaderStage::Geometry,
                ShaderStage::Compute,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn without_format(mut self, format: TextureFormat) -> Self {
        self.formats.remove(&format);
        self
    }

    pub fn without_formats(self, formats: &[TextureFormat]) -> Self {
        formats
            .iter()
            .fold(self, |caps, format| caps.without_format(*format))
    }

    pub fn without_shader_stage(mut self, stage: ShaderStage) -> Self {
        self.shader_stages.remove(&stage);
        self
    }

    pub fn without_vertex_format(mut self, format: VertexFormat) -> Self {
        self.vertex_formats.remove(&format);
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Bookkeeping for a live object.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceInfo {
    Texture(TextureDesc),
    FramebufferLayout(FramebufferLayoutDesc),
    Framebuffer(FramebufferDesc),
    Program(String),
    Pipeline(String),
    DescriptorSetLayout(Vec<DescriptorBinding>),
    DescriptorPool,
    DescriptorSet,
    Buffer { label: String, vertex_count: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    UpdateDescriptor {
        set: DescriptorSetHandle,
        binding: u32,
        value: ParamValue,
    },
    BeginPass(PassDesc),
    BindPipeline(PipelineHandle),
    BindDescriptorSet(DescriptorSetHandle),
    Draw(DrawCall),
    EndPass,
    Blit {
        source: TextureHandle,
        target: RenderTarget,
    },
}

impl RecordedCommand {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RecordedCommand::BeginPass(pass) => Some(pass.stage),
            RecordedCommand::Blit { .. } => Some(Stage::Present),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    successful_creations: usize,
    fail_after: Option<usize>,
    live: BTreeMap<Resource, ResourceInfo>,
    destroyed: Vec<Resource>,
    commands: Vec<RecordedCommand>,
    descriptors: HashMap<(DescriptorSetHandle, u32), ParamValue>,
    open_pass: bool,
}

impl State {
    fn allocate(&mut self, what: &str) -> Result<u64, DeviceError> {
        if let Some(limit) = self.fail_after {
            if self.successful_creations >= limit {
                debug!("injected creation failure for {what}");
                return Err(DeviceError::OutOfMemory(what.to_string()));
            }
        }
        self.successful_creations += 1;
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn insert(&mut self, resource: Resource, info: ResourceInfo) {
        trace!("created {resource:?}");
        self.live.insert(resource, info);
    }

    fn texture(&self, handle: TextureHandle) -> Result<&TextureDesc, DeviceError> {
        match self.live.get(&Resource::TextureHandle(handle)) {
            Some(ResourceInfo::Texture(desc)) => Ok(desc),
            _ => Err(DeviceError::UnknownResource(handle.into())),
        }
    }
}

/// In-process device recording object lifetimes and commands.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    caps: Capabilities,
    state: Mutex<State>,
}

impl RecordingDevice {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            state: Mutex::new(State::default()),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Makes every creation call fail once `successes` more calls have succeeded.
    pub fn fail_after(&self, successes: usize) {
        let mut state = self.state.lock();
        state.fail_after = Some(state.successful_creations + successes);
    }

    pub fn clear_failure(&self) {
        self.state.lock().fail_after = None;
    }

    pub fn successful_creations(&self) -> usize {
        self.state.lock().successful_creations
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn is_live(&self, resource: impl Into<Resource>) -> bool {
        self.state.lock().live.contains_key(&resource.into())
    }

    pub fn live_textures(&self) -> Vec<(TextureHandle, TextureDesc)> {
        self.state
            .lock()
            .live
            .iter()
            .filter_map(|(resource, info)| match (resource, info) {
                (Resource::TextureHandle(handle), ResourceInfo::Texture(desc)) => {
                    Some((*handle, desc.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn live_framebuffers(&self) -> Vec<(FramebufferHandle, FramebufferDesc)> {
        self.state
            .lock()
            .live
            .iter()
            .filter_map(|(resource, info)| match (resource, info) {
                (Resource::FramebufferHandle(handle), ResourceInfo::Framebuffer(desc)) => {
                    Some((*handle, desc.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<TextureDesc> {
        self.state.lock().texture(handle).ok().cloned()
    }

    /// Objects destroyed so far, in destruction order.
    pub fn destroyed(&self) -> Vec<Resource> {
        self.state.lock().destroyed.clone()
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.lock().commands.clone()
    }

    pub fn take_commands(&self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.state.lock().commands)
    }

    /// The stage of every pass and blit issued so far, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(RecordedCommand::stage)
            .collect()
    }

    pub fn descriptor_value(&self, set: DescriptorSetHandle, binding: u32) -> Option<ParamValue> {
        self.state.lock().descriptors.get(&(set, binding)).cloned()
    }

    fn record(&self, command: RecordedCommand) {
        self.state.lock().commands.push(command);
    }
}

impl Device for RecordingDevice {
    fn is_texture_support(&self, format: TextureFormat, usage: TextureUsage) -> bool {
        self.caps
            .formats
            .get(&format)
            .is_some_and(|supported| supported.contains(usage))
    }

    fn is_texture_dim_support(&self, dim: TextureDim, width: u32, height: u32) -> bool {
        self.caps.dims.contains(&dim)
            && width <= self.caps.max_texture_size
            && height <= self.caps.max_texture_size
    }

    fn is_vertex_support(&self, format: VertexFormat) -> bool {
        self.caps.vertex_formats.contains(&format)
    }

    fn is_shader_support(&self, stage: ShaderStage) -> bool {
        self.caps.shader_stages.contains(&stage)
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError> {
        if !self.is_texture_support(desc.format, desc.usage) {
            return Err(DeviceError::UnsupportedFormat {
                format: desc.format,
                usage: desc.usage,
            });
        }
        if desc.width == 0
            || desc.height == 0
            || !self.is_texture_dim_support(desc.dim, desc.width, desc.height)
        {
            return Err(DeviceError::UnsupportedDimension {
                dim: desc.dim,
                width: desc.width,
                height: desc.height,
            });
        }
        let mut state = self.state.lock();
        let handle = TextureHandle(state.allocate(&desc.label)?);
        state.insert(handle.into(), ResourceInfo::Texture(desc.clone()));
        Ok(handle)
    }

    fn create_framebuffer_layout(
        &self,
        desc: &FramebufferLayoutDesc,
    ) -> Result<FramebufferLayoutHandle, DeviceError> {
        let mut state = self.state.lock();
        let handle = FramebufferLayoutHandle(state.allocate(&desc.label)?);
        state.insert(handle.into(), ResourceInfo::FramebufferLayout(desc.clone()));
        Ok(handle)
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle, DeviceError> {
        let mut state = self.state.lock();
        let mismatch = |reason: String| DeviceError::LayoutMismatch {
            label: desc.label.clone(),
            reason,
        };
        let layout = match state.live.get(&Resource::FramebufferLayoutHandle(desc.layout)) {
            Some(ResourceInfo::FramebufferLayout(layout)) => layout.clone(),
            _ => return Err(DeviceError::UnknownResource(desc.layout.into())),
        };
        if layout.color.len() != desc.color.len() {
            return Err(mismatch(format!(
                "layout declares {} colour attachments, framebuffer has {}",
                layout.color.len(),
                desc.color.len()
            )));
        }
        for (index, (expected, handle)) in layout.color.iter().zip(&desc.color).enumerate() {
            let texture = state.texture(*handle)?;
            if texture.format != *expected {
                return Err(mismatch(format!(
                    "attachment {index} is {} but layout expects {expected}",
                    texture.format
                )));
            }
            if (texture.width, texture.height) != (desc.width, desc.height) {
                return Err(mismatch(format!("attachment {index} has a different size")));
            }
        }
        match (layout.depth, desc.depth) {
            (None, None) => {}
            (Some(expected), Some(handle)) => {
                let texture = state.texture(handle)?;
                if texture.format != expected {
                    return Err(mismatch(format!(
                        "depth attachment is {} but layout expects {expected}",
                        texture.format
                    )));
                }
                if (texture.width, texture.height) != (desc.width, desc.height) {
                    return Err(mismatch("depth attachment has a different size".into()));
                }
            }
            (Some(_), None) => return Err(mismatch("depth attachment is missing".into())),
            (None, Some(_)) => return Err(mismatch("layout declares no depth attachment".into())),
        }
        let handle = FramebufferHandle(state.allocate(&desc.label)?);
        state.insert(handle.into(), ResourceInfo::Framebuffer(desc.clone()));
        Ok(handle)
    }

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramHandle, DeviceError> {
        if let Some(stage) = desc
            .stages
            .iter()
            .find(|stage| !self.is_shader_support(stage.stage))
        {
            return Err(DeviceError::ShaderCompile {
                program: desc.name.clone(),
                reason: format!("{} stage is not supported", stage.stage),
            });
        }
        let mut state = self.state.lock();
        let handle = ProgramHandle(state.allocate(&desc.name)?);
        state.insert(handle.into(), ResourceInfo::Program(desc.name.clone()));
        Ok(handle)
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, DeviceError> {
        let mut state = self.state.lock();
        let handle = DescriptorSetLayoutHandle(state.allocate("descriptor set layout")?);
        state.insert(
            handle.into(),
            ResourceInfo::DescriptorSetLayout(bindings.to_vec()),
        );
        Ok(handle)
    }

    fn create_descriptor_pool(
        &self,
        layout: DescriptorSetLayoutHandle,
        _max_sets: u32,
    ) -> Result<DescriptorPoolHandle, DeviceError> {
        let mut state = self.state.lock();
        if !state.live.contains_key(&layout.into()) {
            return Err(DeviceError::UnknownResource(layout.into()));
        }
        let handle = DescriptorPoolHandle(state.allocate("descriptor pool")?);
        state.insert(handle.into(), ResourceInfo::DescriptorPool);
        Ok(handle)
    }

    fn create_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, DeviceError> {
        let mut state = self.state.lock();
        for resource in [Resource::from(pool), Resource::from(layout)] {
            if !state.live.contains_key(&resource) {
                return Err(DeviceError::UnknownResource(resource));
            }
        }
        let handle = DescriptorSetHandle(state.allocate("descriptor set")?);
        state.insert(handle.into(), ResourceInfo::DescriptorSet);
        Ok(handle)
    }

    fn create_render_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineHandle, DeviceError> {
        let mut state = self.state.lock();
        for resource in [Resource::from(desc.program), Resource::from(desc.descriptor_layout)] {
            if !state.live.contains_key(&resource) {
                return Err(DeviceError::UnknownResource(resource));
            }
        }
        let handle = PipelineHandle(state.allocate(&desc.label)?);
        state.insert(handle.into(), ResourceInfo::Pipeline(desc.label.clone()));
        Ok(handle)
    }

    fn create_vertex_buffer(
        &self,
        label: &str,
        data: &[u8],
        vertex_count: u32,
    ) -> Result<BufferHandle, DeviceError> {
        debug_assert!(vertex_count == 0 || data.len() % vertex_count as usize == 0);
        let mut state = self.state.lock();
        let handle = BufferHandle(state.allocate(label)?);
        state.insert(
            handle.into(),
            ResourceInfo::Buffer {
                label: label.to_string(),
                vertex_count,
            },
        );
        Ok(handle)
    }

    fn destroy(&self, resource: Resource) {
        let mut state = self.state.lock();
        if state.live.remove(&resource).is_some() {
            trace!("destroyed {resource:?}");
            if let Resource::DescriptorSetHandle(set) = resource {
                state.descriptors.retain(|(owner, _), _| *owner != set);
            }
            state.destroyed.push(resource);
        } else {
            debug!("ignoring destroy of unknown {resource:?}");
        }
    }

    fn update_descriptor(&self, set: DescriptorSetHandle, binding: u32, value: &ParamValue) {
        let mut state = self.state.lock();
        debug_assert!(state.live.contains_key(&set.into()));
        state.descriptors.insert((set, binding), value.clone());
        state.commands.push(RecordedCommand::UpdateDescriptor {
            set,
            binding,
            value: value.clone(),
        });
    }

    fn begin_pass(&self, pass: &PassDesc) {
        let mut state = self.state.lock();
        debug_assert!(!state.open_pass, "begin_pass while another pass is open");
        state.open_pass = true;
        state.commands.push(RecordedCommand::BeginPass(pass.clone()));
    }

    fn bind_pipeline(&self, pipeline: PipelineHandle) {
        self.record(RecordedCommand::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&self, set: DescriptorSetHandle) {
        self.record(RecordedCommand::BindDescriptorSet(set));
    }

    fn draw(&self, call: &DrawCall) {
        self.record(RecordedCommand::Draw(*call));
    }

    fn end_pass(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.open_pass, "end_pass without an open pass");
        state.open_pass = false;
        state.commands.push(RecordedCommand::EndPass);
    }

    fn blit(&self, source: TextureHandle, target: RenderTarget) {
        self.record(RecordedCommand::Blit { source, target });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TextureDim;

    fn texture(format: TextureFormat, width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            label: "test".into(),
            width,
            height,
            format,
            usage: TextureUsage::COLOR_TARGET,
            dim: TextureDim::Texture2D,
        }
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let device = RecordingDevice::new(Capabilities::full().without_format(TextureFormat::RGBA8));
        assert!(!device.is_texture_support(TextureFormat::RGBA8, TextureUsage::SAMPLED));
        assert!(device.create_texture(&texture(TextureFormat::RGBA8, 4, 4)).is_err());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn injected_failure_triggers_after_successes() {
        let device = RecordingDevice::default();
        device.fail_after(1);
        assert!(device.create_texture(&texture(TextureFormat::RGBA8, 4, 4)).is_ok());
        let err = device
            .create_texture(&texture(TextureFormat::RGBA8, 4, 4))
            .unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory(_)));
        device.clear_failure();
        assert!(device.create_texture(&texture(TextureFormat::RGBA8, 4, 4)).is_ok());
    }

    #[test]
    fn framebuffer_must_match_layout() {
        let device = RecordingDevice::default();
        let layout = device
            .create_framebuffer_layout(&FramebufferLayoutDesc {
                label: "layout".into(),
                color: vec![TextureFormat::RGBA16F],
                depth: None,
            })
            .unwrap();
        let wrong = device
            .create_texture(&texture(TextureFormat::RGBA8, 8, 8))
            .unwrap();
        let err = device
            .create_framebuffer(&FramebufferDesc {
                label: "fb".into(),
                layout,
                color: vec![wrong],
                depth: None,
                width: 8,
                height: 8,
            })
            .unwrap_err();
        assert!(matches!(err, DeviceError::LayoutMismatch { .. }));

        let right = device
            .create_texture(&texture(TextureFormat::RGBA16F, 8, 8))
            .unwrap();
        assert!(device
            .create_framebuffer(&FramebufferDesc {
                label: "fb".into(),
                layout,
                color: vec![right],
                depth: None,
                width: 8,
                height: 8,
            })
            .is_ok());
    }

    #[test]
    fn destroy_removes_live_resource() {
        let device = RecordingDevice::default();
        let handle = device
            .create_texture(&texture(TextureFormat::RGBA8, 2, 2))
            .unwrap();
        assert!(device.is_live(handle));
        device.destroy(handle.into());
        assert!(!device.is_live(handle));
        assert_eq!(device.destroyed(), vec![Resource::from(handle)]);
    }
}
