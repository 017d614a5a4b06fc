use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::{ParamType, ParamValue};
use crate::camera::Camera;
use crate::device::TextureHandle;
use crate::framebuffers::DeferredLightingFramebuffers;

/// Pipeline-global value supplied to shaders without user involvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantic {
    ModelMatrix,
    ViewMatrix,
    ProjectMatrix,
    ViewProjectMatrix,
    ModelViewProjectMatrix,
    ViewInverse,
    ProjectInverse,
    ViewProjectInverse,
    CameraPosition,
    CameraDirection,
    CameraNear,
    CameraFar,
    CameraAperture,
    ViewportSize,
    Time,
    DepthMap,
    LinearDepthMap,
    GBuffer0Map,
    GBuffer1Map,
    GBuffer2Map,
    GBuffer3Map,
    LightingMap,
    OpaqueShadingMap,
    TransparentShadingMap,
    SourceMap,
}

impl Semantic {
    pub const ALL: [Semantic; 25] = [
        Semantic::ModelMatrix,
        Semantic::ViewMatrix,
        Semantic::ProjectMatrix,
        Semantic::ViewProjectMatrix,
        Semantic::ModelViewProjectMatrix,
        Semantic::ViewInverse,
        Semantic::ProjectInverse,
        Semantic::ViewProjectInverse,
        Semantic::CameraPosition,
        Semantic::CameraDirection,
        Semantic::CameraNear,
        Semantic::CameraFar,
        Semantic::CameraAperture,
        Semantic::ViewportSize,
        Semantic::Time,
        Semantic::DepthMap,
        Semantic::LinearDepthMap,
        Semantic::GBuffer0Map,
        Semantic::GBuffer1Map,
        Semantic::GBuffer2Map,
        Semantic::GBuffer3Map,
        Semantic::LightingMap,
        Semantic::OpaqueShadingMap,
        Semantic::TransparentShadingMap,
        Semantic::SourceMap,
    ];

    /// Name shaders and material files use to refer to the semantic.
    pub fn name(self) -> &'static str {
        match self {
            Semantic::ModelMatrix => "matModel",
            Semantic::ViewMatrix => "matView",
            Semantic::ProjectMatrix => "matProject",
            Semantic::ViewProjectMatrix => "matViewProject",
            Semantic::ModelViewProjectMatrix => "matModelViewProject",
            Semantic::ViewInverse => "matViewInverse",
            Semantic::ProjectInverse => "matProjectInverse",
            Semantic::ViewProjectInverse => "matViewProjectInverse",
            Semantic::CameraPosition => "cameraPosition",
            Semantic::CameraDirection => "cameraDirection",
            Semantic::CameraNear => "cameraNear",
            Semantic::CameraFar => "cameraFar",
            Semantic::CameraAperture => "cameraAperture",
            Semantic::ViewportSize => "viewportSize",
            Semantic::Time => "time",
            Semantic::DepthMap => "depthMap",
            Semantic::LinearDepthMap => "linearDepthMap",
            Semantic::GBuffer0Map => "gbuffer0Map",
            Semantic::GBuffer1Map => "gbuffer1Map",
            Semantic::GBuffer2Map => "gbuffer2Map",
            Semantic::GBuffer3Map => "gbuffer3Map",
            Semantic::LightingMap => "lightingMap",
            Semantic::OpaqueShadingMap => "opaqueShadingMap",
            Semantic::TransparentShadingMap => "transparentShadingMap",
            Semantic::SourceMap => "sourceMap",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|semantic| semantic.name() == name)
    }

    pub fn param_type(self) -> ParamType {
        match self {
            Semantic::ModelMatrix
            | Semantic::ViewMatrix
            | Semantic::ProjectMatrix
            | Semantic::ViewProjectMatrix
            | Semantic::ModelViewProjectMatrix
            | Semantic::ViewInverse
            | Semantic::ProjectInverse
            | Semantic::ViewProjectInverse => ParamType::Float4x4,
            Semantic::CameraPosition | Semantic::CameraDirection => ParamType::Float3,
            Semantic::CameraNear
            | Semantic::CameraFar
            | Semantic::CameraAperture
            | Semantic::Time => ParamType::Float,
            Semantic::ViewportSize => ParamType::Float2,
            Semantic::DepthMap
            | Semantic::LinearDepthMap
            | Semantic::GBuffer0Map
            | Semantic::GBuffer1Map
            | Semantic::GBuffer2Map
            | Semantic::GBuffer3Map
            | Semantic::LightingMap
            | Semantic::OpaqueShadingMap
            | Semantic::TransparentShadingMap
            | Semantic::SourceMap => ParamType::Texture,
        }
    }
}

/// Current value of every semantic, pulled by material passes once per draw.
#[derive(Debug, Clone)]
pub struct SemanticManager {
    values: HashMap<Semantic, ParamValue>,
    view: Mat4,
    view_project: Mat4,
}

impl Default for SemanticManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticManager {
    pub fn new() -> Self {
        let values = Semantic::ALL
            .iter()
            .map(|semantic| (*semantic, ParamValue::default_for(semantic.param_type())))
            .collect();
        Self {
            values,
            view: Mat4::IDENTITY,
            view_project: Mat4::IDENTITY,
        }
    }

    pub fn get(&self, semantic: Semantic) -> &ParamValue {
        // every semantic is seeded in `new`
        &self.values[&semantic]
    }

    pub fn set(&mut self, semantic: Semantic, value: ParamValue) {
        debug_assert_eq!(value.ty(), semantic.param_type(), "{semantic:?}");
        self.values.insert(semantic, value);
    }

    /// Refreshes every camera-derived semantic.
    pub fn set_camera(&mut self, camera: &Camera) {
        self.view = camera.view();
        self.view_project = camera.view_project();
        let viewport = camera.viewport();
        let values = [
            (Semantic::ViewMatrix, ParamValue::Float4x4(camera.view())),
            (Semantic::ProjectMatrix, ParamValue::Float4x4(camera.projection())),
            (Semantic::ViewProjectMatrix, ParamValue::Float4x4(self.view_project)),
            (Semantic::ViewInverse, ParamValue::Float4x4(camera.view_inverse())),
            (Semantic::ProjectInverse, ParamValue::Float4x4(camera.project_inverse())),
            (
                Semantic::ViewProjectInverse,
                ParamValue::Float4x4(camera.view_project_inverse()),
            ),
            (Semantic::CameraPosition, ParamValue::Float3(camera.position())),
            (Semantic::CameraDirection, ParamValue::Float3(camera.forward())),
            (Semantic::CameraNear, ParamValue::Float(camera.near())),
            (Semantic::CameraFar, ParamValue::Float(camera.far())),
            (Semantic::CameraAperture, ParamValue::Float(camera.aperture())),
            (
                Semantic::ViewportSize,
                ParamValue::Float2(Vec2::new(viewport.width, viewport.height)),
            ),
        ];
        for (semantic, value) in values {
            self.set(semantic, value);
        }
        self.set_model(Mat4::IDENTITY);
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.set(Semantic::ModelMatrix, ParamValue::Float4x4(model));
        self.set(
            Semantic::ModelViewProjectMatrix,
            ParamValue::Float4x4(self.view_project * model),
        );
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.set(Semantic::Time, ParamValue::Float(seconds));
    }

    pub fn set_texture(&mut self, semantic: Semantic, texture: Option<TextureHandle>) {
        self.set(semantic, ParamValue::Texture(texture));
    }

    /// Points every render-target semantic at the current framebuffer set.
    pub fn set_framebuffers(&mut self, framebuffers: &DeferredLightingFramebuffers) {
        let gbuffer = framebuffers.gbuffer_textures();
        let targets = [
            (Semantic::DepthMap, framebuffers.depth_texture()),
            (Semantic::LinearDepthMap, framebuffers.linear_depth_texture()),
            (Semantic::GBuffer0Map, gbuffer[0]),
            (Semantic::GBuffer1Map, gbuffer[1]),
            (Semantic::GBuffer2Map, gbuffer[2]),
            (Semantic::GBuffer3Map, gbuffer[3]),
            (Semantic::LightingMap, framebuffers.lighting_texture()),
            (Semantic::OpaqueShadingMap, framebuffers.opaque_shading_texture()),
            (
                Semantic::TransparentShadingMap,
                framebuffers.transparent_shading_texture(),
            ),
        ];
        for (semantic, texture) in targets {
            self.set_texture(semantic, texture);
        }
    }

    /// World-space direction expressed in the current camera's view space.
    pub fn view_direction(&self, direction: Vec3) -> Vec3 {
        self.view.transform_vector3(direction).normalize_or_zero()
    }

    /// World-space point expressed in the current camera's view space.
    pub fn view_position(&self, position: Vec3) -> Vec3 {
        self.view.transform_point3(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_for_every_semantic() {
        for semantic in Semantic::ALL {
            assert_eq!(Semantic::from_name(semantic.name()), Some(semantic));
        }
        assert_eq!(Semantic::from_name("diffuseColor"), None);
    }

    #[test]
    fn every_semantic_starts_with_a_typed_default() {
        let manager = SemanticManager::new();
        for semantic in Semantic::ALL {
            assert_eq!(manager.get(semantic).ty(), semantic.param_type());
        }
    }

    #[test]
    fn model_view_project_follows_camera_and_model() {
        let mut manager = SemanticManager::new();
        let mut camera = Camera::perspective(60.0, 1.5, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        manager.set_camera(&camera);
        let model = Mat4::from_translation(Vec3::X);
        manager.set_model(model);
        assert_eq!(
            manager.get(Semantic::ModelViewProjectMatrix),
            &ParamValue::Float4x4(camera.view_project() * model)
        );
        assert_eq!(
            manager.get(Semantic::CameraPosition),
            &ParamValue::Float3(camera.position())
        );
    }

    #[test]
    fn view_space_follows_the_camera() {
        let mut manager = SemanticManager::new();
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        manager.set_camera(&camera);
        assert!((manager.view_direction(Vec3::NEG_Z) - Vec3::NEG_Z).length() < 1e-5);
        assert!((manager.view_position(Vec3::ZERO) - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }
}
