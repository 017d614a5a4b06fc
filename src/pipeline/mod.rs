//! Frame orchestration on top of the deferred lighting framebuffers.
//!
//! [`RenderPipeline`] owns the device-side state of a frame: framebuffers,
//! base geometry, semantic values, the deferred stages and the post-process
//! chain. It is driven once per frame with a scene, its materials and the
//! main camera.

pub mod builtin;
mod deferred;
mod postprocess;

use std::sync::Arc;

use glam::Mat4;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{Camera, CameraRole, Viewport};
use crate::device::{
    ClearValue, Device, DeviceError, DrawCall, DrawSource, PassDesc, RenderTarget, Stage,
};
use crate::framebuffers::{DeferredLightingFramebuffers, FramebufferError};
use crate::geometry::{BaseGeometry, GpuMesh, MeshKind};
use crate::light::{LightError, LightType};
use crate::material::{Material, MaterialError, MaterialLibrary, SemanticManager};
use crate::scene::Scene;

pub use deferred::DeferredRenderPipeline;
pub use postprocess::{post_process_from_name, MaterialPostProcess, PostProcess};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render pipeline is not set up")]
    NotActive,
    #[error("light {light}: {kind:?} lights cannot be rendered by the deferred pipeline")]
    UnsupportedLight { light: String, kind: LightType },
    #[error("unknown post-process {0:?}")]
    UnknownPostProcess(String),
    #[error("material {material} has no technique {technique:?}")]
    MissingTechnique { material: String, technique: String },
    #[error("{0:?} camera has no render target")]
    MissingTarget(CameraRole),
    #[error("base mesh {0:?} is not uploaded")]
    MissingMesh(MeshKind),
    #[error(transparent)]
    Framebuffer(#[from] FramebufferError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Light(#[from] LightError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Tunables of a [`RenderPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub width: u32,
    pub height: u32,
    pub shadow_map_size: u32,
    pub shadows: bool,
    /// Post-process effects by name, applied in order.
    pub post_process: Vec<String>,
    pub clear_color: [f32; 4],
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            shadow_map_size: 1024,
            shadows: true,
            post_process: vec!["tonemap".to_string()],
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Everything a stage needs to record commands for the current frame.
pub struct FrameContext<'a> {
    pub device: &'a dyn Device,
    pub framebuffers: &'a DeferredLightingFramebuffers,
    pub geometry: &'a BaseGeometry,
    pub semantics: &'a mut SemanticManager,
    pub clear_color: [f32; 4],
}

impl FrameContext<'_> {
    /// Viewport covering the whole framebuffer set.
    pub fn full_viewport(&self) -> Viewport {
        let (width, height) = self.framebuffers.size().unwrap_or((0, 0));
        Viewport::new(width, height)
    }

    /// Records one render pass; the pass is closed even when `body` fails.
    pub fn pass<F>(
        &mut self,
        stage: Stage,
        target: RenderTarget,
        clear: Option<ClearValue>,
        viewport: Viewport,
        body: F,
    ) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut Self) -> Result<(), PipelineError>,
    {
        self.device.begin_pass(&PassDesc {
            stage,
            target,
            clear,
            viewport,
        });
        let result = body(&mut *self);
        self.device.end_pass();
        result
    }

    pub fn mesh(&self, kind: MeshKind) -> Result<GpuMesh, PipelineError> {
        self.geometry.mesh(kind).ok_or(PipelineError::MissingMesh(kind))
    }

    /// Draws a full-screen quad with every pass of `technique`.
    pub fn draw_fullscreen(
        &mut self,
        material: &mut Material,
        technique: &str,
    ) -> Result<(), PipelineError> {
        let quad = self.mesh(MeshKind::Quad)?;
        self.semantics.set_model(Mat4::IDENTITY);
        let name = material.name().to_string();
        let technique = material.technique_mut(technique).ok_or_else(|| {
            PipelineError::MissingTechnique {
                material: name,
                technique: technique.to_string(),
            }
        })?;
        for pass in technique.passes_mut() {
            pass.bind(self.device, &*self.semantics)?;
            self.device.draw(&DrawCall {
                mesh: quad.buffer,
                vertex_count: quad.vertex_count,
                source: DrawSource::FullScreen,
            });
        }
        Ok(())
    }
}

/// Top-level renderer driving every stage of a frame.
pub struct RenderPipeline {
    device: Arc<dyn Device>,
    settings: PipelineSettings,
    framebuffers: DeferredLightingFramebuffers,
    geometry: BaseGeometry,
    semantics: SemanticManager,
    deferred: DeferredRenderPipeline,
    post_process: Vec<Box<dyn PostProcess>>,
    active: bool,
    frame: u64,
}

impl RenderPipeline {
    /// Creates an inactive pipeline; nothing touches the device until
    /// [`RenderPipeline::setup`].
    pub fn new(device: Arc<dyn Device>, settings: PipelineSettings) -> Result<Self, PipelineError> {
        let post_process = settings
            .post_process
            .iter()
            .map(|name| post_process_from_name(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            device,
            settings,
            framebuffers: DeferredLightingFramebuffers::new(),
            geometry: BaseGeometry::new(),
            semantics: SemanticManager::new(),
            deferred: DeferredRenderPipeline::new(),
            post_process,
            active: false,
            frame: 0,
        })
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn framebuffers(&self) -> &DeferredLightingFramebuffers {
        &self.framebuffers
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Appends an effect to the end of the post-process chain.
    pub fn add_post_process(
        &mut self,
        mut effect: Box<dyn PostProcess>,
    ) -> Result<(), PipelineError> {
        if self.active {
            effect.setup(&self.device)?;
        }
        self.post_process.push(effect);
        Ok(())
    }

    pub fn post_process_names(&self) -> Vec<&str> {
        self.post_process.iter().map(|effect| effect.name()).collect()
    }

    /// Creates every device object of the pipeline.
    ///
    /// Either the pipeline is fully active afterwards or nothing it created
    /// is left alive.
    pub fn setup(&mut self) -> Result<(), PipelineError> {
        self.close();
        if let Err(err) = self.create() {
            warn!("render pipeline setup failed: {err}");
            self.close();
            return Err(err);
        }
        self.active = true;
        info!(
            "render pipeline ready at {}x{} with {} post-process effect(s)",
            self.settings.width,
            self.settings.height,
            self.post_process.len()
        );
        Ok(())
    }

    fn create(&mut self) -> Result<(), PipelineError> {
        let device = self.device.as_ref();
        self.framebuffers
            .setup(device, self.settings.width, self.settings.height)?;
        self.geometry.setup(device)?;
        self.deferred.setup(&self.device)?;
        for effect in &mut self.post_process {
            effect.setup(&self.device)?;
        }
        Ok(())
    }

    /// Releases every device object; safe to call repeatedly.
    pub fn close(&mut self) {
        let device = self.device.as_ref();
        for effect in &mut self.post_process {
            effect.close(device);
        }
        self.deferred.close(device);
        self.geometry.close(device);
        self.framebuffers.close(device);
        self.active = false;
    }

    /// Resizes the framebuffers, destroying the old set before creating the
    /// new one. A resize to the current size does nothing.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), PipelineError> {
        if (self.settings.width, self.settings.height) == (width, height)
            && (!self.active || self.framebuffers.size() == Some((width, height)))
        {
            return Ok(());
        }
        self.settings.width = width;
        self.settings.height = height;
        if !self.active {
            return Ok(());
        }
        let device = self.device.as_ref();
        self.framebuffers.close(device);
        if let Err(err) = self.framebuffers.setup(device, width, height) {
            self.close();
            return Err(err.into());
        }
        info!("render pipeline resized to {width}x{height}");
        Ok(())
    }

    /// Creates the light targets the scene requests.
    pub fn prepare_scene(&self, scene: &mut Scene) -> Result<(), PipelineError> {
        scene.setup_lights(
            self.device.as_ref(),
            self.settings.shadows,
            self.settings.shadow_map_size,
        )?;
        Ok(())
    }

    /// Renders one frame of `scene` as seen by `camera`.
    ///
    /// Shadow and reflective shadow maps are rendered first, then the main
    /// camera. Lights the pipeline cannot draw are rejected before any
    /// command is recorded.
    pub fn render(
        &mut self,
        scene: &Scene,
        materials: &mut MaterialLibrary,
        camera: &Camera,
    ) -> Result<(), PipelineError> {
        if !self.active {
            return Err(PipelineError::NotActive);
        }
        DeferredRenderPipeline::validate_lights(scene)?;
        materials.setup(&self.device)?;

        self.semantics.set_framebuffers(&self.framebuffers);
        self.semantics.set_time(self.frame as f32 / 60.0);
        let mut ctx = FrameContext {
            device: self.device.as_ref(),
            framebuffers: &self.framebuffers,
            geometry: &self.geometry,
            semantics: &mut self.semantics,
            clear_color: self.settings.clear_color,
        };

        for light in &scene.lights {
            if let Some(shadow) = light.shadow() {
                self.deferred
                    .render_camera(&mut ctx, scene, materials, &shadow.camera, &mut [])?;
            }
        }
        for light in &scene.lights {
            if let Some(gi) = light.gi() {
                self.deferred
                    .render_reflective_shadow(&mut ctx, scene, materials, &gi.camera)?;
            }
        }

        let mut main = camera.clone();
        if main.viewport().width <= 0.0 || main.viewport().height <= 0.0 {
            main.set_viewport(ctx.full_viewport());
        }
        self.deferred
            .render_camera(&mut ctx, scene, materials, &main, &mut self.post_process)?;

        self.frame += 1;
        debug!("frame {} recorded", self.frame);
        Ok(())
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::device::{
        Capabilities, RecordedCommand, RecordingDevice, ShaderStage, TextureFormat, TextureUsage,
        VertexFormat,
    };
    use crate::light::{Light, ShadowMode};
    use crate::scene::{LightId, RenderQueue, SceneObject};

    fn pipeline(settings: PipelineSettings) -> (Arc<RecordingDevice>, RenderPipeline) {
        pipeline_with(RecordingDevice::default(), settings)
    }

    fn pipeline_with(
        device: RecordingDevice,
        settings: PipelineSettings,
    ) -> (Arc<RecordingDevice>, RenderPipeline) {
        let recording = Arc::new(device);
        let device: Arc<dyn Device> = recording.clone();
        (recording, RenderPipeline::new(device, settings).unwrap())
    }

    fn cube_scene(light: LightType) -> Scene {
        let mut sun = Light::new("sun", light);
        sun.look_at(Vec3::new(2.0, 6.0, 3.0), Vec3::ZERO);
        sun.request_shadow_mode(ShadowMode::Hard);
        Scene {
            objects: vec![SceneObject {
                name: "cube".to_string(),
                object_type: "mesh".to_string(),
                mesh: Some(MeshKind::Cube),
                ..SceneObject::default()
            }],
            lights: vec![sun],
        }
    }

    fn main_camera() -> Camera {
        let mut camera = Camera::perspective(60.0, 800.0 / 600.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera
    }

    fn settings(width: u32, height: u32) -> PipelineSettings {
        PipelineSettings {
            width,
            height,
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn unknown_post_process_is_rejected_up_front() {
        let device: Arc<dyn Device> = Arc::new(RecordingDevice::default());
        let settings = PipelineSettings {
            post_process: vec!["bloom".to_string()],
            ..PipelineSettings::default()
        };
        assert!(matches!(
            RenderPipeline::new(device, settings),
            Err(PipelineError::UnknownPostProcess(name)) if name == "bloom"
        ));
    }

    #[test]
    fn render_before_setup_is_an_error() {
        let (_, mut pipeline) = pipeline(settings(64, 64));
        let scene = Scene::default();
        let mut materials = MaterialLibrary::new();
        assert!(matches!(
            pipeline.render(&scene, &mut materials, &main_camera()),
            Err(PipelineError::NotActive)
        ));
    }

    #[test]
    fn setup_is_all_or_nothing() {
        let (device, mut pipeline) = pipeline(settings(320, 240));
        let before = device.successful_creations();
        pipeline.setup().unwrap();
        let total = device.successful_creations() - before;
        pipeline.close();
        assert_eq!(device.live_count(), 0);

        for budget in 0..total {
            device.fail_after(budget);
            assert!(pipeline.setup().is_err(), "budget {budget}");
            assert!(!pipeline.is_active());
            assert_eq!(device.live_count(), 0, "leak with budget {budget}");
        }
        device.clear_failure();
        pipeline.setup().unwrap();
        assert!(pipeline.is_active());
    }

    #[test]
    fn missing_shader_stage_fails_activation() {
        let caps = Capabilities::full().without_shader_stage(ShaderStage::Fragment);
        let (device, mut pipeline) = pipeline_with(RecordingDevice::new(caps), settings(320, 240));
        assert!(matches!(
            pipeline.setup(),
            Err(PipelineError::Material(MaterialError::UnsupportedShaderStage {
                stage: ShaderStage::Fragment,
                ..
            }))
        ));
        assert!(!pipeline.is_active());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn missing_vertex_format_fails_activation() {
        let caps = Capabilities::full().without_vertex_format(VertexFormat::Float3);
        let (device, mut pipeline) = pipeline_with(RecordingDevice::new(caps), settings(320, 240));
        assert!(matches!(
            pipeline.setup(),
            Err(PipelineError::Material(MaterialError::UnsupportedVertexFormat {
                format: VertexFormat::Float3,
                ..
            }))
        ));
        assert!(!pipeline.is_active());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn resize_destroys_before_creating_and_is_idempotent() {
        let (device, mut pipeline) = pipeline(settings(320, 240));
        pipeline.setup().unwrap();
        let live = device.live_count();

        pipeline.set_resolution(320, 240).unwrap();
        assert!(device.destroyed().is_empty());

        pipeline.set_resolution(640, 480).unwrap();
        assert_eq!(device.live_count(), live);
        assert_eq!(pipeline.framebuffers().size(), Some((640, 480)));
        for (_, info) in device.live_textures() {
            assert_eq!((info.width, info.height), (640, 480), "{}", info.label);
        }

        pipeline.close();
        pipeline.close();
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn frame_runs_every_stage_in_order() {
        let (device, mut pipeline) = pipeline(settings(800, 600));
        pipeline.setup().unwrap();
        let mut scene = cube_scene(LightType::Directional);
        let mut materials = MaterialLibrary::new();
        pipeline.prepare_scene(&mut scene).unwrap();
        device.take_commands();

        pipeline.render(&scene, &mut materials, &main_camera()).unwrap();
        assert_eq!(
            device.stages(),
            vec![
                Stage::Shadow,
                Stage::OpaqueGeometry,
                Stage::LinearizeDepth,
                Stage::LightAccumulation,
                Stage::OpaqueShading,
                Stage::SpecificShading,
                Stage::SpecificPostProcess,
                Stage::PostProcess,
                Stage::Copy,
                Stage::Present,
            ]
        );
        scene.close(device.as_ref());
    }

    #[test]
    fn reflective_shadow_maps_render_before_geometry() {
        let (device, mut pipeline) = pipeline(settings(256, 256));
        pipeline.setup().unwrap();
        let mut scene = cube_scene(LightType::Spot);
        scene.lights[0].request_global_illumination(true);
        let mut materials = MaterialLibrary::new();
        pipeline.prepare_scene(&mut scene).unwrap();
        let gi = scene.lights[0].gi().unwrap().framebuffer;
        device.take_commands();

        pipeline.render(&scene, &mut materials, &main_camera()).unwrap();
        let stages = device.stages();
        let position = |stage: Stage| stages.iter().position(|s| *s == stage).unwrap();
        assert!(position(Stage::ReflectiveShadow) < position(Stage::OpaqueGeometry));
        assert!(position(Stage::Shadow) < position(Stage::ReflectiveShadow));
        assert!(device.commands().iter().any(|command| matches!(
            command,
            RecordedCommand::BeginPass(pass)
                if pass.stage == Stage::ReflectiveShadow
                    && pass.target == RenderTarget::Framebuffer(gi)
        )));

        scene.close(device.as_ref());
        pipeline.close();
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn directional_shadow_frame_end_to_end() {
        let caps = Capabilities::full().without_format(TextureFormat::D24S8);
        let (device, mut pipeline) = pipeline_with(RecordingDevice::new(caps), settings(800, 600));
        pipeline.setup().unwrap();
        let formats = *pipeline.framebuffers().formats().unwrap();
        assert_eq!(formats.depth, TextureFormat::D16S8);

        for (_, info) in device.live_textures() {
            assert_eq!((info.width, info.height), (800, 600), "{}", info.label);
        }

        let mut scene = cube_scene(LightType::Directional);
        let mut materials = MaterialLibrary::new();
        pipeline.prepare_scene(&mut scene).unwrap();
        let shadow = scene.lights[0].shadow().unwrap();
        assert_eq!(
            device.texture(shadow.depth).unwrap().usage,
            TextureUsage::DEPTH_TARGET
        );

        device.take_commands();
        pipeline.render(&scene, &mut materials, &main_camera()).unwrap();
        let commands = device.commands();
        let final_texture = pipeline.framebuffers().final_texture().unwrap();
        assert_eq!(
            commands.last(),
            Some(&RecordedCommand::Blit {
                source: final_texture,
                target: RenderTarget::Screen,
            })
        );
        assert!(commands.iter().any(|command| matches!(
            command,
            RecordedCommand::Draw(call) if call.source == DrawSource::Light(LightId(0))
        )));

        scene.close(device.as_ref());
        pipeline.close();
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn camera_target_receives_the_final_blit() {
        let (device, mut pipeline) = pipeline(settings(128, 128));
        pipeline.setup().unwrap();
        let scene = cube_scene(LightType::Sun);
        let mut materials = MaterialLibrary::new();
        let target = pipeline.framebuffers().swap().unwrap();
        let mut camera = main_camera();
        camera.set_render_texture(Some(target));

        pipeline.render(&scene, &mut materials, &camera).unwrap();
        assert_eq!(
            device.commands().last(),
            Some(&RecordedCommand::Blit {
                source: pipeline.framebuffers().final_texture().unwrap(),
                target: RenderTarget::Framebuffer(target),
            })
        );
    }

    #[test]
    fn unsupported_light_records_nothing() {
        let (device, mut pipeline) = pipeline(settings(128, 128));
        pipeline.setup().unwrap();
        let mut scene = cube_scene(LightType::Directional);
        scene.lights.push(Light::new("sky", LightType::Hemisphere));
        let mut materials = MaterialLibrary::new();
        device.take_commands();

        let err = pipeline
            .render(&scene, &mut materials, &main_camera())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedLight { kind: LightType::Hemisphere, .. }));
        assert!(device.stages().is_empty());
    }

    #[test]
    fn orthographic_camera_renders_forward() {
        let (device, mut pipeline) = pipeline(settings(128, 128));
        pipeline.setup().unwrap();
        let mut scene = cube_scene(LightType::Point);
        scene.objects[0].queue = RenderQueue::Specific;
        let mut materials = MaterialLibrary::new();
        let mut camera = Camera::orthographic(-2.0, 2.0, -2.0, 2.0, 0.1, 50.0);
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        device.take_commands();

        pipeline.render(&scene, &mut materials, &camera).unwrap();
        assert_eq!(
            device.stages(),
            vec![Stage::Forward, Stage::PostProcess, Stage::Copy, Stage::Present]
        );
    }

    #[test]
    fn post_process_chain_ping_pongs() {
        let (device, mut pipeline) = pipeline(PipelineSettings {
            post_process: vec!["tonemap".to_string(), "fxaa".to_string()],
            ..settings(128, 128)
        });
        pipeline.setup().unwrap();
        let scene = Scene::default();
        let mut materials = MaterialLibrary::new();
        device.take_commands();
        pipeline.render(&scene, &mut materials, &main_camera()).unwrap();

        let targets: Vec<_> = device
            .commands()
            .into_iter()
            .filter_map(|command| match command {
                RecordedCommand::BeginPass(pass) if pass.stage == Stage::PostProcess => {
                    Some(pass.target)
                }
                _ => None,
            })
            .collect();
        let framebuffers = pipeline.framebuffers();
        assert_eq!(
            targets,
            vec![
                RenderTarget::Framebuffer(framebuffers.swap().unwrap()),
                RenderTarget::Framebuffer(framebuffers.opaque_shading().unwrap()),
            ]
        );
    }
}
