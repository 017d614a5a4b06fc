//! Graphics device abstraction consumed by the render core.
//!
//! The core never talks to a graphics API directly. Everything it needs is
//! expressed through [`Device`]: object creation, capability queries, and the
//! strictly ordered command stream of a frame. Object creation is synchronous
//! and fail-fast; nothing above this layer retries.

mod format;
pub mod recording;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::Viewport;
use crate::material::{ParamType, ParamValue, RenderState};
use crate::scene::{LightId, ObjectId};

pub use format::{ShaderStage, TextureDim, TextureFormat, TextureUsage, VertexFormat};
pub use recording::{Capabilities, RecordedCommand, RecordingDevice, ResourceInfo};

macro_rules! handles {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl From<$name> for Resource {
                fn from(handle: $name) -> Self {
                    Resource::$name(handle)
                }
            }
        )*

        /// Any object created through a [`Device`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Resource {
            $($name($name),)*
        }
    };
}

handles!(
    TextureHandle,
    FramebufferLayoutHandle,
    FramebufferHandle,
    ProgramHandle,
    PipelineHandle,
    DescriptorSetLayoutHandle,
    DescriptorPoolHandle,
    DescriptorSetHandle,
    BufferHandle,
);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("out of device memory while creating {0}")]
    OutOfMemory(String),
    #[error("texture format {format} does not support {usage:?}")]
    UnsupportedFormat {
        format: TextureFormat,
        usage: TextureUsage,
    },
    #[error("texture dimension {dim:?} of {width}x{height} is not supported")]
    UnsupportedDimension {
        dim: TextureDim,
        width: u32,
        height: u32,
    },
    #[error("program {program} failed to compile: {reason}")]
    ShaderCompile { program: String, reason: String },
    #[error("framebuffer {label} does not match its layout: {reason}")]
    LayoutMismatch { label: String, reason: String },
    #[error("unknown resource {0:?}")]
    UnknownResource(Resource),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub dim: TextureDim,
}

/// Attachment count, order and formats shared by compatible framebuffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferLayoutDesc {
    pub label: String,
    pub color: Vec<TextureFormat>,
    pub depth: Option<TextureFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub label: String,
    pub layout: FramebufferLayoutHandle,
    pub color: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub entry: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDesc {
    pub name: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDesc {
    pub name: String,
    pub format: VertexFormat,
}

/// A program together with the reflection data of its active inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDesc {
    pub name: String,
    pub stages: Vec<ShaderSource>,
    pub uniforms: Vec<UniformDesc>,
    pub attributes: Vec<AttributeDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAttribute {
    pub name: String,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLayout {
    pub stride: u32,
    pub attributes: Vec<InputAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub name: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub label: String,
    pub program: ProgramHandle,
    pub state: RenderState,
    pub input_layout: InputLayout,
    pub descriptor_layout: DescriptorSetLayoutHandle,
}

/// Logical step of a frame a render pass belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Shadow,
    ReflectiveShadow,
    OpaqueGeometry,
    LinearizeDepth,
    LightAccumulation,
    OpaqueShading,
    SpecificShading,
    SpecificPostProcess,
    Forward,
    PostProcess,
    Copy,
    /// Final blit to the presentation target. Only reported by command logs.
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Screen,
    Framebuffer(FramebufferHandle),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

impl ClearValue {
    pub const fn color(color: [f32; 4]) -> Self {
        Self {
            color: Some(color),
            depth: None,
            stencil: None,
        }
    }

    pub const fn depth_stencil() -> Self {
        Self {
            color: None,
            depth: Some(1.0),
            stencil: Some(0),
        }
    }

    pub const fn all(color: [f32; 4]) -> Self {
        Self {
            color: Some(color),
            depth: Some(1.0),
            stencil: Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    pub stage: Stage,
    pub target: RenderTarget,
    pub clear: Option<ClearValue>,
    pub viewport: Viewport,
}

/// What a draw call renders, kept for instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawSource {
    Object(ObjectId),
    Light(LightId),
    FullScreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub mesh: BufferHandle,
    pub vertex_count: u32,
    pub source: DrawSource,
}

/// Opaque graphics device.
///
/// Implementations own every object they hand out; callers release objects
/// with [`Device::destroy`]. Command methods are issued in submission order and
/// must not be reordered by the implementation.
pub trait Device: Send + Sync {
    fn is_texture_support(&self, format: TextureFormat, usage: TextureUsage) -> bool;
    fn is_texture_dim_support(&self, dim: TextureDim, width: u32, height: u32) -> bool;
    fn is_vertex_support(&self, format: VertexFormat) -> bool;
    fn is_shader_support(&self, stage: ShaderStage) -> bool;

    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError>;
    fn create_framebuffer_layout(
        &self,
        desc: &FramebufferLayoutDesc,
    ) -> Result<FramebufferLayoutHandle, DeviceError>;
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle, DeviceError>;
    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramHandle, DeviceError>;
    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, DeviceError>;
    fn create_descriptor_pool(
        &self,
        layout: DescriptorSetLayoutHandle,
        max_sets: u32,
    ) -> Result<DescriptorPoolHandle, DeviceError>;
    fn create_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, DeviceError>;
    fn create_render_pipeline(&self, desc: &PipelineDesc) -> Result<PipelineHandle, DeviceError>;
    fn create_vertex_buffer(
        &self,
        label: &str,
        data: &[u8],
        vertex_count: u32,
    ) -> Result<BufferHandle, DeviceError>;
    fn destroy(&self, resource: Resource);

    fn update_descriptor(&self, set: DescriptorSetHandle, binding: u32, value: &ParamValue);
    fn begin_pass(&self, pass: &PassDesc);
    fn bind_pipeline(&self, pipeline: PipelineHandle);
    fn bind_descriptor_set(&self, set: DescriptorSetHandle);
    fn draw(&self, call: &DrawCall);
    fn end_pass(&self);
    fn blit(&self, source: TextureHandle, target: RenderTarget);
}

/// Returns the first format of `cascade` the device supports for `usage` at
/// the requested size.
///
/// The answer depends only on the device's capability answers, so identical
/// devices always negotiate identical formats.
pub fn select_format(
    device: &dyn Device,
    cascade: &[TextureFormat],
    usage: TextureUsage,
    width: u32,
    height: u32,
) -> Option<TextureFormat> {
    if !device.is_texture_dim_support(TextureDim::Texture2D, width, height) {
        return None;
    }
    cascade
        .iter()
        .copied()
        .find(|format| device.is_texture_support(*format, usage))
}

/// Destroys `resource` if it is set, leaving `None` behind.
pub(crate) fn release<H: Into<Resource>>(device: &dyn Device, handle: &mut Option<H>) {
    if let Some(handle) = handle.take() {
        device.destroy(handle.into());
    }
}
