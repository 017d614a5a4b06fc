use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::device::FramebufferHandle;

/// What a camera renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraRole {
    /// Depth-only view of a light.
    Shadow,
    /// Lighting accumulation into a caller supplied target.
    Light,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraType {
    Perspective,
    Orthographic,
}

/// Pixel rectangle a camera renders into.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// View and projection of a render.
///
/// Projections use a right-handed view space with a `0..1` depth range.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    role: CameraRole,
    kind: CameraType,
    view: Mat4,
    projection: Mat4,
    near: f32,
    far: f32,
    /// Vertical field of view in degrees; unused by orthographic cameras.
    aperture: f32,
    ratio: f32,
    ortho: [f32; 4],
    order: i32,
    render_texture: Option<FramebufferHandle>,
    viewport: Viewport,
}

impl Camera {
    pub fn perspective(aperture: f32, ratio: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            role: CameraRole::Main,
            kind: CameraType::Perspective,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            near,
            far,
            aperture,
            ratio,
            ortho: [-1.0, 1.0, -1.0, 1.0],
            order: 0,
            render_texture: None,
            viewport: Viewport::default(),
        };
        camera.update_projection();
        camera
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::perspective(90.0, 1.0, near, far);
        camera.kind = CameraType::Orthographic;
        camera.ortho = [left, right, bottom, top];
        camera.update_projection();
        camera
    }

    fn update_projection(&mut self) {
        self.projection = match self.kind {
            CameraType::Perspective => Mat4::perspective_rh(
                self.aperture.to_radians(),
                self.ratio,
                self.near,
                self.far,
            ),
            CameraType::Orthographic => {
                let [left, right, bottom, top] = self.ortho;
                Mat4::orthographic_rh(left, right, bottom, top, self.near, self.far)
            }
        };
    }

    pub fn with_role(mut self, role: CameraRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.view = Mat4::look_at_rh(eye, target, up);
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn set_clip(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.update_projection();
    }

    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture;
        self.update_projection();
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
        self.update_projection();
    }

    pub fn set_ortho_extents(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        self.ortho = [left, right, bottom, top];
        self.update_projection();
    }

    pub fn set_role(&mut self, role: CameraRole) {
        self.role = role;
    }

    pub fn set_order(&mut self, order: i32) {
        self.order = order;
    }

    pub fn set_render_texture(&mut self, target: Option<FramebufferHandle>) {
        self.render_texture = target;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn role(&self) -> CameraRole {
        self.role
    }

    pub fn kind(&self) -> CameraType {
        self.kind
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_project(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn view_inverse(&self) -> Mat4 {
        self.view.inverse()
    }

    pub fn project_inverse(&self) -> Mat4 {
        self.projection.inverse()
    }

    pub fn view_project_inverse(&self) -> Mat4 {
        self.view_project().inverse()
    }

    pub fn position(&self) -> Vec3 {
        self.view_inverse().w_axis.truncate()
    }

    /// World-space viewing direction.
    pub fn forward(&self) -> Vec3 {
        (-self.view_inverse().z_axis.truncate()).normalize_or_zero()
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn aperture(&self) -> f32 {
        self.aperture
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn render_texture(&self) -> Option<FramebufferHandle> {
        self.render_texture
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// World-space corners of the view frustum, near plane first.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        let inverse = self.view_project_inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut index = 0;
        for z in [0.0, 1.0] {
            for y in [-1.0, 1.0] {
                for x in [-1.0, 1.0] {
                    corners[index] = inverse.project_point3(Vec3::new(x, y, z));
                    index += 1;
                }
            }
        }
        corners
    }
}
