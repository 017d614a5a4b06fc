//! Deferred shading render core for the Crystal runtime.
//!
//! The crate turns a scene, its materials and a camera into an ordered
//! stream of device commands: shadow maps, G-buffer fill, per-light
//! accumulation, shading, post-processing and presentation. Graphics APIs
//! stay behind the [`Device`] trait so the whole core can run against the
//! in-process [`RecordingDevice`] in tools and tests.

pub mod app;
pub mod bounds;
pub mod camera;
pub mod device;
pub mod framebuffers;
pub mod geometry;
pub mod light;
pub mod material;
pub mod pipeline;
pub mod scene;

pub use bounds::BoundingBox;
pub use camera::{Camera, CameraRole, CameraType, Viewport};
pub use device::{
    Capabilities, Device, DeviceError, RecordedCommand, RecordingDevice, Stage, TextureFormat,
};
pub use framebuffers::{DeferredLightingFramebuffers, FramebufferError, FramebufferFormats};
pub use geometry::{BaseGeometry, MeshKind};
pub use light::{Light, LightError, LightType, ShadowMode};
pub use material::{
    Material, MaterialError, MaterialLibrary, MaterialParam, MaterialPass, ParamType, ParamValue,
    Semantic, SemanticManager,
};
pub use pipeline::{
    post_process_from_name, DeferredRenderPipeline, MaterialPostProcess, PipelineError,
    PipelineSettings, PostProcess, RenderPipeline,
};
pub use scene::{LightId, ObjectId, RenderQueue, Scene, SceneObject};
