use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use log::{debug, trace};

use crate::camera::{Camera, CameraRole, CameraType};
use crate::device::{
    ClearValue, Device, DrawCall, DrawSource, FramebufferHandle, RenderTarget, Stage,
    TextureHandle,
};
use crate::geometry::MeshKind;
use crate::light::{Light, LightType};
use crate::material::{Material, MaterialError, MaterialLibrary, ParamValue, Semantic};
use crate::scene::{LightId, ObjectId, RenderQueue, Scene};

use super::{builtin, FrameContext, PipelineError, PostProcess};

const TRANSPARENT: [f32; 4] = [0.0; 4];
const SPECIFIC_POST: &str = "SpecificPost";
/// Widest spot cone a light volume is built for, in degrees.
const MAX_SPOT_ANGLE: f32 = 89.0;

struct BuiltinMaterials {
    standard: Material,
    lighting: Material,
    linearize: Material,
    shading: Material,
    composite: Material,
    copy: Material,
}

impl BuiltinMaterials {
    fn load() -> Result<Self, MaterialError> {
        Ok(Self {
            standard: Material::from_xml(builtin::STANDARD)?,
            lighting: Material::from_xml(builtin::DEFERRED_LIGHTING)?,
            linearize: Material::from_xml(builtin::LINEARIZE_DEPTH)?,
            shading: Material::from_xml(builtin::DEFERRED_SHADING)?,
            composite: Material::from_xml(builtin::SPECIFIC_COMPOSITE)?,
            copy: Material::from_xml(builtin::COPY)?,
        })
    }

    fn all_mut(&mut self) -> [&mut Material; 6] {
        [
            &mut self.standard,
            &mut self.lighting,
            &mut self.linearize,
            &mut self.shading,
            &mut self.composite,
            &mut self.copy,
        ]
    }
}

/// The deferred stages of a frame and the materials they draw with.
#[derive(Default)]
pub struct DeferredRenderPipeline {
    materials: Option<BuiltinMaterials>,
}

impl DeferredRenderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_setup(&self) -> bool {
        self.materials.is_some()
    }

    /// Loads and binds the built-in materials; on error nothing is left alive.
    pub fn setup(&mut self, device: &Arc<dyn Device>) -> Result<(), PipelineError> {
        self.close(device.as_ref());
        let mut materials = BuiltinMaterials::load()?;
        let result = materials
            .all_mut()
            .into_iter()
            .try_for_each(|material| material.setup(device));
        if let Err(err) = result {
            for material in materials.all_mut() {
                material.close(device.as_ref());
            }
            return Err(err.into());
        }
        self.materials = Some(materials);
        debug!("deferred stages ready");
        Ok(())
    }

    pub fn close(&mut self, device: &dyn Device) {
        if let Some(mut materials) = self.materials.take() {
            for material in materials.all_mut() {
                material.close(device);
            }
        }
    }

    /// Rejects scenes holding lights the light accumulation stage cannot draw.
    pub fn validate_lights(scene: &Scene) -> Result<(), PipelineError> {
        match scene.lights.iter().find(|light| light_technique(light.kind()).is_none()) {
            Some(light) => Err(unsupported(light)),
            None => Ok(()),
        }
    }

    /// Renders `camera` according to its role and projection.
    ///
    /// `post` is only consumed by main cameras.
    pub fn render_camera(
        &mut self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        library: &mut MaterialLibrary,
        camera: &Camera,
        post: &mut [Box<dyn PostProcess>],
    ) -> Result<(), PipelineError> {
        let materials = self.materials.as_mut().ok_or(PipelineError::NotActive)?;
        match (camera.role(), camera.kind()) {
            (CameraRole::Shadow, _) => render_depth(
                ctx,
                scene,
                library,
                &mut materials.standard,
                camera,
                Stage::Shadow,
                "Shadow",
                ClearValue::depth_stencil(),
            ),
            (CameraRole::Light, _) => {
                let target = camera_target(camera)?;
                ctx.semantics.set_camera(camera);
                accumulate_lights(ctx, scene, &mut materials.lighting, target, camera)
            }
            (CameraRole::Main, CameraType::Perspective) => {
                render_deferred(ctx, scene, library, materials, camera)?;
                finish(ctx, camera, post, &mut materials.copy)
            }
            (CameraRole::Main, CameraType::Orthographic) => {
                render_forward(ctx, scene, library, &mut materials.standard, camera)?;
                finish(ctx, camera, post, &mut materials.copy)
            }
        }
    }

    /// Renders flux, normal and depth of the scene as seen by a light.
    pub fn render_reflective_shadow(
        &mut self,
        ctx: &mut FrameContext<'_>,
        scene: &Scene,
        library: &mut MaterialLibrary,
        camera: &Camera,
    ) -> Result<(), PipelineError> {
        let materials = self.materials.as_mut().ok_or(PipelineError::NotActive)?;
        render_depth(
            ctx,
            scene,
            library,
            &mut materials.standard,
            camera,
            Stage::ReflectiveShadow,
            "ReflectiveShadow",
            ClearValue::all(TRANSPARENT),
        )
    }
}

fn light_technique(kind: LightType) -> Option<&'static str> {
    match kind {
        LightType::Sun => Some("SunLight"),
        LightType::Directional => Some("DirectionalLight"),
        LightType::Point => Some("PointLight"),
        LightType::Spot => Some("SpotLight"),
        LightType::Ambient => Some("AmbientLight"),
        LightType::Hemisphere | LightType::Area => None,
    }
}

fn unsupported(light: &Light) -> PipelineError {
    PipelineError::UnsupportedLight {
        light: light.name().to_string(),
        kind: light.kind(),
    }
}

fn camera_target(camera: &Camera) -> Result<FramebufferHandle, PipelineError> {
    camera
        .render_texture()
        .ok_or(PipelineError::MissingTarget(camera.role()))
}

fn required<H>(handle: Option<H>) -> Result<H, PipelineError> {
    handle.ok_or(PipelineError::NotActive)
}

#[allow(clippy::too_many_arguments)]
fn render_depth(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    library: &mut MaterialLibrary,
    standard: &mut Material,
    camera: &Camera,
    stage: Stage,
    technique: &str,
    clear: ClearValue,
) -> Result<(), PipelineError> {
    let target = camera_target(camera)?;
    ctx.semantics.set_camera(camera);
    ctx.pass(
        stage,
        RenderTarget::Framebuffer(target),
        Some(clear),
        camera.viewport(),
        |ctx| draw_queue(ctx, scene, library, standard, RenderQueue::Opaque, technique),
    )
}

/// G-buffer fill through opaque shading and the specific objects.
fn render_deferred(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    library: &mut MaterialLibrary,
    materials: &mut BuiltinMaterials,
    camera: &Camera,
) -> Result<(), PipelineError> {
    let framebuffers = ctx.framebuffers;
    let viewport = camera.viewport();
    let clear_color = ctx.clear_color;
    ctx.semantics.set_camera(camera);

    ctx.pass(
        Stage::OpaqueGeometry,
        RenderTarget::Framebuffer(required(framebuffers.gbuffer())?),
        Some(ClearValue::all(TRANSPARENT)),
        viewport,
        |ctx| {
            draw_queue(
                ctx,
                scene,
                library,
                &mut materials.standard,
                RenderQueue::Opaque,
                "GBuffer",
            )
        },
    )?;

    ctx.pass(
        Stage::LinearizeDepth,
        RenderTarget::Framebuffer(required(framebuffers.linear_depth())?),
        Some(ClearValue::color(TRANSPARENT)),
        viewport,
        |ctx| ctx.draw_fullscreen(&mut materials.linearize, "LinearizeDepth"),
    )?;

    let lighting = required(framebuffers.lighting())?;
    accumulate_lights(ctx, scene, &mut materials.lighting, lighting, camera)?;

    ctx.pass(
        Stage::OpaqueShading,
        RenderTarget::Framebuffer(required(framebuffers.opaque_shading())?),
        Some(ClearValue::color(clear_color)),
        viewport,
        |ctx| ctx.draw_fullscreen(&mut materials.shading, "OpaqueShading"),
    )?;

    ctx.pass(
        Stage::SpecificShading,
        RenderTarget::Framebuffer(required(framebuffers.transparent_shading())?),
        Some(ClearValue::color(TRANSPARENT)),
        viewport,
        |ctx| {
            draw_queue(
                ctx,
                scene,
                library,
                &mut materials.standard,
                RenderQueue::Specific,
                "Specific",
            )
        },
    )?;

    ctx.pass(
        Stage::SpecificPostProcess,
        RenderTarget::Framebuffer(required(framebuffers.opaque_shading())?),
        None,
        viewport,
        |ctx| {
            let mut composited = false;
            for name in specific_materials(scene) {
                let Some(material) = library
                    .get_mut(name)
                    .filter(|material| material.has_technique(SPECIFIC_POST))
                else {
                    continue;
                };
                ctx.draw_fullscreen(material, SPECIFIC_POST)?;
                composited = true;
            }
            if !composited {
                ctx.draw_fullscreen(&mut materials.composite, SPECIFIC_POST)?;
            }
            Ok(())
        },
    )
}

/// Materials of the specific queue, first use first, without repeats.
fn specific_materials(scene: &Scene) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for id in scene.renderables(RenderQueue::Specific) {
        if let Some(name) = scene.object(id).and_then(|object| object.material.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Single forward pass used by orthographic main cameras.
fn render_forward(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    library: &mut MaterialLibrary,
    standard: &mut Material,
    camera: &Camera,
) -> Result<(), PipelineError> {
    let target = required(ctx.framebuffers.opaque_shading())?;
    let clear = ClearValue::all(ctx.clear_color);
    ctx.semantics.set_camera(camera);
    ctx.pass(
        Stage::Forward,
        RenderTarget::Framebuffer(target),
        Some(clear),
        camera.viewport(),
        |ctx| {
            draw_queue(ctx, scene, library, standard, RenderQueue::Opaque, "Forward")?;
            draw_queue(ctx, scene, library, standard, RenderQueue::Specific, "Specific")
        },
    )
}

/// Post-process chain, final copy and the blit to the camera's target.
fn finish(
    ctx: &mut FrameContext<'_>,
    camera: &Camera,
    post: &mut [Box<dyn PostProcess>],
    copy: &mut Material,
) -> Result<(), PipelineError> {
    let framebuffers = ctx.framebuffers;
    let targets: [(FramebufferHandle, TextureHandle); 2] = [
        (
            required(framebuffers.swap())?,
            required(framebuffers.swap_texture())?,
        ),
        (
            required(framebuffers.opaque_shading())?,
            required(framebuffers.opaque_shading_texture())?,
        ),
    ];
    let mut source = targets[1].1;
    for (index, effect) in post.iter_mut().enumerate() {
        let (framebuffer, texture) = targets[index % 2];
        trace!("post-process {} into {framebuffer:?}", effect.name());
        effect.render(ctx, source, framebuffer)?;
        source = texture;
    }

    let final_texture = required(framebuffers.final_texture())?;
    ctx.semantics.set_texture(Semantic::SourceMap, Some(source));
    let viewport = ctx.full_viewport();
    ctx.pass(
        Stage::Copy,
        RenderTarget::Framebuffer(required(framebuffers.final_color())?),
        None,
        viewport,
        |ctx| ctx.draw_fullscreen(copy, "Copy"),
    )?;
    let target = camera
        .render_texture()
        .map_or(RenderTarget::Screen, RenderTarget::Framebuffer);
    ctx.device.blit(final_texture, target);
    Ok(())
}

fn draw_queue(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    library: &mut MaterialLibrary,
    standard: &mut Material,
    queue: RenderQueue,
    technique: &str,
) -> Result<(), PipelineError> {
    for id in scene.renderables(queue) {
        draw_object(ctx, scene, library, standard, id, technique)?;
    }
    Ok(())
}

/// Draws one object with its own material when it provides `technique`,
/// otherwise with the standard material tinted by the object's color.
fn draw_object(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    library: &mut MaterialLibrary,
    standard: &mut Material,
    id: ObjectId,
    technique: &str,
) -> Result<(), PipelineError> {
    let Some(object) = scene.object(id) else {
        return Ok(());
    };
    let Some(kind) = object.mesh else {
        return Ok(());
    };
    let mesh = ctx.mesh(kind)?;
    let custom = object
        .material
        .as_deref()
        .and_then(|name| library.get_mut(name))
        .filter(|material| material.has_technique(technique));
    let material = match custom {
        Some(material) => material,
        None => {
            standard.set_param("diffuseColor", ParamValue::Float4(object.color.extend(1.0)))?;
            standard
        }
    };
    let name = material.name().to_string();
    let technique = material
        .technique_mut(technique)
        .ok_or_else(|| PipelineError::MissingTechnique {
            material: name,
            technique: technique.to_string(),
        })?;

    ctx.semantics.set_model(scene.world_transform(id));
    for pass in technique.passes_mut() {
        pass.bind(ctx.device, &*ctx.semantics)?;
        ctx.device.draw(&DrawCall {
            mesh: mesh.buffer,
            vertex_count: mesh.vertex_count,
            source: DrawSource::Object(id),
        });
    }
    Ok(())
}

fn accumulate_lights(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    lighting: &mut Material,
    target: FramebufferHandle,
    camera: &Camera,
) -> Result<(), PipelineError> {
    ctx.pass(
        Stage::LightAccumulation,
        RenderTarget::Framebuffer(target),
        Some(ClearValue::color(TRANSPARENT)),
        camera.viewport(),
        |ctx| {
            for id in scene.light_ids() {
                dispatch_light(ctx, scene, lighting, id)?;
            }
            Ok(())
        },
    )
}

/// Proxy geometry covering every pixel a light can reach.
fn light_volume(light: &Light) -> (MeshKind, Mat4) {
    match light.kind() {
        LightType::Point => (
            MeshKind::Sphere,
            Mat4::from_translation(light.position()) * Mat4::from_scale(Vec3::splat(light.range())),
        ),
        LightType::Spot => {
            let range = light.range();
            let radius = range * light.outer_angle().min(MAX_SPOT_ANGLE).to_radians().tan();
            (
                MeshKind::Cone,
                light.transform() * Mat4::from_scale(Vec3::new(radius, radius, range)),
            )
        }
        _ => (MeshKind::Quad, Mat4::IDENTITY),
    }
}

/// Pushes the light's parameters and draws its volume.
fn dispatch_light(
    ctx: &mut FrameContext<'_>,
    scene: &Scene,
    lighting: &mut Material,
    id: LightId,
) -> Result<(), PipelineError> {
    let Some(light) = scene.light(id) else {
        return Ok(());
    };
    let technique = light_technique(light.kind()).ok_or_else(|| unsupported(light))?;
    let (kind, model) = light_volume(light);
    let mesh = ctx.mesh(kind)?;

    let cone = Vec2::new(
        light.inner_angle().to_radians().cos(),
        light.outer_angle().to_radians().cos(),
    );
    let mut values = vec![
        ("lightColor", ParamValue::Float3(light.color() * light.intensity())),
        (
            "lightDirection",
            ParamValue::Float3(ctx.semantics.view_direction(light.direction())),
        ),
        (
            "lightPosition",
            ParamValue::Float3(ctx.semantics.view_position(light.position())),
        ),
        ("lightAttenuation", ParamValue::Float3(light.attenuation())),
        ("lightRange", ParamValue::Float(light.range())),
        ("lightSpotAngle", ParamValue::Float2(cone)),
    ];
    match light.shadow() {
        Some(shadow) => values.extend([
            ("shadowFactor", ParamValue::Float(light.shadow_factor())),
            ("shadowMatrix", ParamValue::Float4x4(shadow.camera.view_project())),
            ("shadowMap", ParamValue::Texture(Some(shadow.depth))),
        ]),
        None => values.extend([
            ("shadowFactor", ParamValue::Float(0.0)),
            ("shadowMatrix", ParamValue::Float4x4(Mat4::IDENTITY)),
            ("shadowMap", ParamValue::Texture(None)),
        ]),
    }
    for (name, value) in values {
        lighting.set_param(name, value)?;
    }

    let name = lighting.name().to_string();
    let technique = lighting
        .technique_mut(technique)
        .ok_or_else(|| PipelineError::MissingTechnique {
            material: name,
            technique: technique.to_string(),
        })?;
    ctx.semantics.set_model(model);
    for pass in technique.passes_mut() {
        pass.bind(ctx.device, &*ctx.semantics)?;
        ctx.device.draw(&DrawCall {
            mesh: mesh.buffer,
            vertex_count: mesh.vertex_count,
            source: DrawSource::Light(id),
        });
    }
    Ok(())
}
