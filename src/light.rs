//! Scene lights and the render targets they own.

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bounds::BoundingBox;
use crate::camera::{Camera, CameraRole, Viewport};
use crate::device::{
    self, select_format, Device, DeviceError, FramebufferDesc, FramebufferHandle,
    FramebufferLayoutDesc, FramebufferLayoutHandle, TextureFormat, TextureHandle, TextureUsage,
};
use crate::framebuffers::{create_texture, DEPTH_CASCADE, GBUFFER_CASCADES};

const SHADOW_NEAR: f32 = 0.1;
const SHADOW_APERTURE: f32 = 90.0;
const FLUX_CASCADE: &[TextureFormat] = &[TextureFormat::RGBA8, TextureFormat::RGBA16F];

#[derive(Debug, Error)]
pub enum LightError {
    #[error("unknown light type {0:?}")]
    UnknownType(String),
    #[error("unknown shadow mode {0:?}")]
    UnknownShadowMode(String),
    #[error("light {light}: no supported {slot} format for a {size}x{size} target")]
    NoSupportedFormat {
        light: String,
        slot: &'static str,
        size: u32,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    Sun,
    Directional,
    Point,
    Spot,
    Ambient,
    Hemisphere,
    Area,
}

impl LightType {
    /// Lights without a position, lit along their direction everywhere.
    pub fn is_directional(self) -> bool {
        matches!(self, LightType::Sun | LightType::Directional)
    }
}

impl FromStr for LightType {
    type Err = LightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.to_ascii_lowercase().as_str() {
            "sun" => LightType::Sun,
            "directional" => LightType::Directional,
            "point" => LightType::Point,
            "spot" => LightType::Spot,
            "ambient" => LightType::Ambient,
            "hemisphere" => LightType::Hemisphere,
            "area" => LightType::Area,
            _ => return Err(LightError::UnknownType(value.to_string())),
        })
    }
}

impl fmt::Display for LightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LightType::Sun => "sun",
            LightType::Directional => "directional",
            LightType::Point => "point",
            LightType::Spot => "spot",
            LightType::Ambient => "ambient",
            LightType::Hemisphere => "hemisphere",
            LightType::Area => "area",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShadowMode {
    #[default]
    None,
    Hard,
    Soft,
}

impl FromStr for ShadowMode {
    type Err = LightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.to_ascii_lowercase().as_str() {
            "none" | "off" | "false" => ShadowMode::None,
            "hard" | "on" | "true" => ShadowMode::Hard,
            "soft" => ShadowMode::Soft,
            _ => return Err(LightError::UnknownShadowMode(value.to_string())),
        })
    }
}

/// Depth target and camera used to render a light's shadow map.
#[derive(Debug)]
pub struct ShadowTarget {
    pub camera: Camera,
    pub layout: FramebufferLayoutHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

/// Reflective shadow map: flux, normal and depth as seen from the light.
#[derive(Debug)]
pub struct GiTarget {
    pub camera: Camera,
    pub layout: FramebufferLayoutHandle,
    pub flux: TextureHandle,
    pub normal: TextureHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

struct BuiltTarget<const N: usize> {
    layout: FramebufferLayoutHandle,
    color: [TextureHandle; N],
    depth: TextureHandle,
    framebuffer: FramebufferHandle,
}

/// Handles created so far while building a target.
#[derive(Debug, Default)]
struct PartialTarget {
    layout: Option<FramebufferLayoutHandle>,
    textures: Vec<TextureHandle>,
    framebuffer: Option<FramebufferHandle>,
}

impl PartialTarget {
    fn release(mut self, device: &dyn Device) {
        device::release(device, &mut self.framebuffer);
        for texture in self.textures.drain(..) {
            device.destroy(texture.into());
        }
        device::release(device, &mut self.layout);
    }
}

#[derive(Debug)]
pub struct Light {
    name: String,
    kind: LightType,
    transform: Mat4,
    range: f32,
    intensity: f32,
    color: Vec3,
    attenuation: Vec3,
    inner_angle: f32,
    outer_angle: f32,
    shadow_mode: ShadowMode,
    shadow_factor: f32,
    shadow_size: u32,
    global_illumination: bool,
    shadow: Option<ShadowTarget>,
    gi: Option<GiTarget>,
    bounding_box: BoundingBox,
}

impl Light {
    pub fn new(name: impl Into<String>, kind: LightType) -> Self {
        let mut light = Self {
            name: name.into(),
            kind,
            transform: Mat4::IDENTITY,
            range: 10.0,
            intensity: 1.0,
            color: Vec3::ONE,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            inner_angle: 30.0,
            outer_angle: 45.0,
            shadow_mode: ShadowMode::None,
            shadow_factor: 1.0,
            shadow_size: 1024,
            global_illumination: false,
            shadow: None,
            gi: None,
            bounding_box: BoundingBox::empty(),
        };
        light.update_bounding_box();
        light
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LightType {
        self.kind
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// World-space direction the light points along (its local -Z).
    pub fn direction(&self) -> Vec3 {
        (-self.transform.z_axis.truncate()).normalize_or_zero()
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn attenuation(&self) -> Vec3 {
        self.attenuation
    }

    pub fn inner_angle(&self) -> f32 {
        self.inner_angle
    }

    pub fn outer_angle(&self) -> f32 {
        self.outer_angle
    }

    pub fn shadow_mode(&self) -> ShadowMode {
        self.shadow_mode
    }

    pub fn shadow_factor(&self) -> f32 {
        self.shadow_factor
    }

    pub fn shadow_size(&self) -> u32 {
        self.shadow_size
    }

    pub fn global_illumination(&self) -> bool {
        self.global_illumination
    }

    pub fn shadow(&self) -> Option<&ShadowTarget> {
        self.shadow.as_ref()
    }

    pub fn gi(&self) -> Option<&GiTarget> {
        self.gi.as_ref()
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn set_type(&mut self, kind: LightType) {
        self.kind = kind;
        self.update_cameras();
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.update_cameras();
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        let up = if (target - position).normalize_or_zero().abs().dot(Vec3::Y) > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        self.set_transform(Mat4::look_at_rh(position, target, up).inverse());
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range.max(0.0);
        self.update_cameras();
    }

    /// Sets the cone half-angles in degrees.
    pub fn set_cone(&mut self, inner: f32, outer: f32) {
        self.inner_angle = inner.min(outer);
        self.outer_angle = outer;
        self.update_cameras();
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    pub fn set_attenuation(&mut self, attenuation: Vec3) {
        self.attenuation = attenuation;
    }

    pub fn set_shadow_factor(&mut self, factor: f32) {
        self.shadow_factor = factor.clamp(0.0, 1.0);
    }

    /// Shadow map resolution used the next time shadow targets are created.
    pub fn set_shadow_size(&mut self, size: u32) {
        self.shadow_size = size.max(1);
    }

    /// Records the shadow mode to apply on [`Light::activate`].
    pub fn request_shadow_mode(&mut self, mode: ShadowMode) {
        self.shadow_mode = mode;
    }

    /// Records the GI flag to apply on [`Light::activate`].
    pub fn request_global_illumination(&mut self, enable: bool) {
        self.global_illumination = enable;
    }

    /// Creates or releases targets to match the requested modes.
    pub fn activate(&mut self, device: &dyn Device) -> Result<(), LightError> {
        self.set_shadow_mode(device, self.shadow_mode)?;
        self.set_global_illumination(device, self.global_illumination)
    }

    pub fn set_shadow_mode(
        &mut self,
        device: &dyn Device,
        mode: ShadowMode,
    ) -> Result<(), LightError> {
        self.shadow_mode = mode;
        match (mode, self.shadow.is_some()) {
            (ShadowMode::None, true) => {
                self.release_shadow(device);
                debug!("light {}: shadows off", self.name);
            }
            (ShadowMode::None, false) | (ShadowMode::Hard | ShadowMode::Soft, true) => {}
            (ShadowMode::Hard | ShadowMode::Soft, false) => {
                let target = self.create_shadow_target(device)?;
                self.shadow = Some(target);
                info!("light {}: {mode:?} shadows at {}px", self.name, self.shadow_size);
            }
        }
        self.update_cameras();
        Ok(())
    }

    pub fn set_global_illumination(
        &mut self,
        device: &dyn Device,
        enable: bool,
    ) -> Result<(), LightError> {
        self.global_illumination = enable;
        match (enable, self.gi.is_some()) {
            (false, true) => self.release_gi(device),
            (true, false) => {
                let target = self.create_gi_target(device)?;
                self.gi = Some(target);
                info!("light {}: reflective shadow map enabled", self.name);
            }
            _ => {}
        }
        self.update_cameras();
        Ok(())
    }

    fn pick(
        &self,
        device: &dyn Device,
        slot: &'static str,
        cascade: &[TextureFormat],
        usage: TextureUsage,
    ) -> Result<TextureFormat, LightError> {
        select_format(device, cascade, usage, self.shadow_size, self.shadow_size).ok_or_else(|| {
            LightError::NoSupportedFormat {
                light: self.name.clone(),
                slot,
                size: self.shadow_size,
            }
        })
    }

    fn create_shadow_target(&self, device: &dyn Device) -> Result<ShadowTarget, LightError> {
        let depth = self.pick(device, "shadow depth", DEPTH_CASCADE, TextureUsage::DEPTH_TARGET)?;
        let target = self.build_target(device, "shadow", [], depth)?;
        Ok(ShadowTarget {
            camera: self.light_camera(Some(target.framebuffer)),
            layout: target.layout,
            depth: target.depth,
            framebuffer: target.framebuffer,
        })
    }

    fn create_gi_target(&self, device: &dyn Device) -> Result<GiTarget, LightError> {
        let flux = self.pick(device, "flux", FLUX_CASCADE, TextureUsage::COLOR_TARGET)?;
        let normal = self.pick(
            device,
            "normal",
            GBUFFER_CASCADES[1],
            TextureUsage::COLOR_TARGET,
        )?;
        let depth = self.pick(device, "gi depth", DEPTH_CASCADE, TextureUsage::DEPTH_TARGET)?;
        let target = self.build_target(device, "rsm", [flux, normal], depth)?;
        let [flux, normal] = target.color;
        Ok(GiTarget {
            camera: self.light_camera(Some(target.framebuffer)),
            layout: target.layout,
            flux,
            normal,
            depth: target.depth,
            framebuffer: target.framebuffer,
        })
    }

    /// Creates a square target of `shadow_size`; on error nothing is left alive.
    fn build_target<const N: usize>(
        &self,
        device: &dyn Device,
        label: &str,
        color: [TextureFormat; N],
        depth: TextureFormat,
    ) -> Result<BuiltTarget<N>, DeviceError> {
        let mut partial = PartialTarget::default();
        let built = self.fill_target(device, &mut partial, label, color, depth);
        if built.is_err() {
            partial.release(device);
        }
        built
    }

    fn fill_target<const N: usize>(
        &self,
        device: &dyn Device,
        partial: &mut PartialTarget,
        label: &str,
        color: [TextureFormat; N],
        depth: TextureFormat,
    ) -> Result<BuiltTarget<N>, DeviceError> {
        let size = self.shadow_size;
        let layout = device.create_framebuffer_layout(&FramebufferLayoutDesc {
            label: format!("{}/{label}", self.name),
            color: color.to_vec(),
            depth: Some(depth),
        })?;
        partial.layout = Some(layout);
        let mut color_textures = [TextureHandle(0); N];
        for (index, format) in color.iter().enumerate() {
            let label = format!("{}/{label}{index}", self.name);
            let texture = create_texture(device, &label, *format, size, size)?;
            partial.textures.push(texture);
            color_textures[index] = texture;
        }
        let label_depth = format!("{}/{label}_depth", self.name);
        let depth_texture = create_texture(device, &label_depth, depth, size, size)?;
        partial.textures.push(depth_texture);
        let framebuffer = device.create_framebuffer(&FramebufferDesc {
            label: format!("{}/{label}", self.name),
            layout,
            color: color_textures.to_vec(),
            depth: Some(depth_texture),
            width: size,
            height: size,
        })?;
        partial.framebuffer = Some(framebuffer);
        Ok(BuiltTarget {
            layout,
            color: color_textures,
            depth: depth_texture,
            framebuffer,
        })
    }

    /// Camera looking from the light along its direction.
    fn light_camera(&self, target: Option<FramebufferHandle>) -> Camera {
        let far = self.range.max(SHADOW_NEAR + 0.01);
        let mut camera = match self.kind {
            LightType::Sun | LightType::Directional => {
                let extent = self.range.max(0.01);
                Camera::orthographic(-extent, extent, -extent, extent, SHADOW_NEAR, far)
            }
            _ => Camera::perspective(SHADOW_APERTURE, 1.0, SHADOW_NEAR, far),
        };
        camera.set_role(CameraRole::Shadow);
        camera.set_view(self.transform.inverse());
        camera.set_render_texture(target);
        camera.set_viewport(Viewport::new(self.shadow_size, self.shadow_size));
        camera
    }

    /// Rebuilds every owned camera from the light settings, refits the
    /// orthographic extents of directional lights and updates the bounds.
    fn update_cameras(&mut self) {
        if let Some(framebuffer) = self.shadow.as_ref().map(|shadow| shadow.framebuffer) {
            let camera = self.light_camera(Some(framebuffer));
            if let Some(shadow) = self.shadow.as_mut() {
                shadow.camera = camera;
            }
        }
        if let Some(framebuffer) = self.gi.as_ref().map(|gi| gi.framebuffer) {
            let camera = self.light_camera(Some(framebuffer));
            if let Some(gi) = self.gi.as_mut() {
                gi.camera = camera;
            }
        }
        if self.kind.is_directional() {
            self.fit_ortho_extents();
        }
        self.update_bounding_box();
    }

    /// Sizes the orthographic cameras to the world-space bounds of every
    /// shadow camera frustum, seen from the light.
    fn fit_ortho_extents(&mut self) {
        let cameras: Vec<&mut Camera> = self
            .shadow
            .iter_mut()
            .map(|shadow| &mut shadow.camera)
            .chain(self.gi.iter_mut().map(|gi| &mut gi.camera))
            .collect();
        let world = cameras.iter().fold(BoundingBox::empty(), |bounds, camera| {
            bounds.union(&BoundingBox::from_points(camera.frustum_corners()))
        });
        if world.is_empty() {
            return;
        }
        for camera in cameras {
            let local = world.transform(camera.view());
            let half = local.min.abs().max(local.max.abs());
            camera.set_ortho_extents(-half.x, half.x, -half.y, half.y);
        }
    }

    /// Recomputes the world-space box enclosing everything the light affects,
    /// including the frusta of its shadow and GI cameras.
    pub fn update_bounding_box(&mut self) {
        let position = self.position();
        let mut bounds = match self.kind {
            LightType::Sun | LightType::Directional => {
                BoundingBox::from_points(self.light_camera(None).frustum_corners())
            }
            LightType::Spot => {
                let direction = self.direction();
                let center = position + direction * self.range;
                let radius = self.range * self.outer_angle.clamp(0.0, 89.9).to_radians().tan();
                // extent of a disk with normal `direction` along each axis
                let extent = radius
                    * Vec3::from_array(
                        (Vec3::ONE - direction * direction)
                            .max(Vec3::ZERO)
                            .to_array()
                            .map(f32::sqrt),
                    );
                BoundingBox::from_points([position, center - extent, center + extent])
            }
            _ => BoundingBox::from_sphere(position, self.range),
        };
        let cameras = self
            .shadow
            .iter()
            .map(|shadow| &shadow.camera)
            .chain(self.gi.iter().map(|gi| &gi.camera));
        for camera in cameras {
            bounds = bounds.union(&BoundingBox::from_points(camera.frustum_corners()));
        }
        self.bounding_box = bounds;
    }

    fn release_shadow(&mut self, device: &dyn Device) {
        if let Some(shadow) = self.shadow.take() {
            device.destroy(shadow.framebuffer.into());
            device.destroy(shadow.depth.into());
            device.destroy(shadow.layout.into());
        }
    }

    fn release_gi(&mut self, device: &dyn Device) {
        if let Some(gi) = self.gi.take() {
            device.destroy(gi.framebuffer.into());
            for texture in [gi.flux, gi.normal, gi.depth] {
                device.destroy(texture.into());
            }
            device.destroy(gi.layout.into());
        }
    }

    /// Releases every target the light owns. The requested modes are kept.
    pub fn close(&mut self, device: &dyn Device) {
        self.release_shadow(device);
        self.release_gi(device);
        self.update_bounding_box();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraType;
    use crate::device::{Capabilities, RecordingDevice};

    fn assert_encloses_cameras(light: &Light) {
        let cameras = light
            .shadow()
            .map(|shadow| &shadow.camera)
            .into_iter()
            .chain(light.gi().map(|gi| &gi.camera));
        for camera in cameras {
            for corner in camera.frustum_corners() {
                assert!(
                    light.bounding_box().contains_point(corner),
                    "{corner} outside {:?}",
                    light.bounding_box()
                );
            }
        }
    }

    #[test]
    fn parses_types_and_modes() {
        assert_eq!("Spot".parse::<LightType>().unwrap(), LightType::Spot);
        assert!("laser".parse::<LightType>().is_err());
        assert_eq!("soft".parse::<ShadowMode>().unwrap(), ShadowMode::Soft);
    }

    #[test]
    fn shadow_toggle_creates_and_releases_targets() {
        let device = RecordingDevice::default();
        let mut light = Light::new("sun", LightType::Directional);
        light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
        let shadow = light.shadow().unwrap();
        assert_eq!(shadow.camera.role(), CameraRole::Shadow);
        assert_eq!(shadow.camera.render_texture(), Some(shadow.framebuffer));
        assert_eq!(
            device.texture(shadow.depth).unwrap().format,
            TextureFormat::D24S8
        );
        assert_eq!(device.live_count(), 3);

        light.set_shadow_mode(&device, ShadowMode::Soft).unwrap();
        assert_eq!(device.live_count(), 3);
        light.set_shadow_mode(&device, ShadowMode::None).unwrap();
        assert!(light.shadow().is_none());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn shadow_depth_follows_the_cascade() {
        let device = RecordingDevice::new(Capabilities::full().without_format(TextureFormat::D24S8));
        let mut light = Light::new("sun", LightType::Sun);
        light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
        let depth = light.shadow().unwrap().depth;
        assert_eq!(device.texture(depth).unwrap().format, TextureFormat::D16S8);
    }

    #[test]
    fn failed_shadow_setup_leaves_nothing_alive() {
        for successes in 0..3 {
            let device = RecordingDevice::default();
            device.fail_after(successes);
            let mut light = Light::new("spot", LightType::Spot);
            assert!(light.set_shadow_mode(&device, ShadowMode::Hard).is_err());
            assert!(light.shadow().is_none());
            assert_eq!(device.live_count(), 0);
        }
    }

    #[test]
    fn gi_is_independent_of_shadows() {
        let device = RecordingDevice::default();
        let mut light = Light::new("key", LightType::Spot);
        light.set_global_illumination(&device, true).unwrap();
        assert!(light.shadow().is_none());
        assert_eq!(device.live_count(), 5);
        light.close(&device);
        assert_eq!(device.live_count(), 0);
        assert!(light.global_illumination());
    }

    #[test]
    fn directional_shadow_camera_uses_range_as_extent() {
        let device = RecordingDevice::default();
        let mut light = Light::new("sun", LightType::Directional);
        light.set_range(25.0);
        light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
        let camera = &light.shadow().unwrap().camera;
        assert_eq!(camera.far(), 25.0);
        let corners = camera.frustum_corners();
        assert!((corners[0].x + 25.0).abs() < 1e-3);
    }

    #[test]
    fn directional_extents_cover_every_shadow_camera() {
        let device = RecordingDevice::default();
        let mut light = Light::new("sun", LightType::Sun);
        light.set_range(10.0);
        light.look_at(Vec3::new(3.0, 8.0, 2.0), Vec3::ZERO);
        light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
        light.set_global_illumination(&device, true).unwrap();

        let shadow = light.shadow().unwrap().camera.clone();
        let gi = light.gi().unwrap().camera.clone();
        assert_eq!(shadow.kind(), CameraType::Orthographic);
        assert_eq!(shadow.projection(), gi.projection());
        let half_width = 1.0 / shadow.projection().x_axis.x;
        let half_height = 1.0 / shadow.projection().y_axis.y;
        assert!(half_width > 10.0 && half_height > 10.0);

        light.set_range(10.0);
        assert_eq!(light.shadow().unwrap().camera.projection(), shadow.projection());
        light.close(&device);
    }

    #[test]
    fn spot_shadow_camera_uses_the_fixed_aperture() {
        let device = RecordingDevice::default();
        let mut light = Light::new("spot", LightType::Spot);
        light.set_cone(10.0, 60.0);
        light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
        let camera = &light.shadow().unwrap().camera;
        assert_eq!(camera.kind(), CameraType::Perspective);
        assert_eq!(camera.aperture(), 90.0);
        assert_eq!(camera.near(), 0.1);
        assert_eq!(camera.ratio(), 1.0);
    }

    #[test]
    fn bounding_box_encloses_every_light_camera() {
        let device = RecordingDevice::default();
        for kind in [
            LightType::Sun,
            LightType::Directional,
            LightType::Point,
            LightType::Spot,
            LightType::Ambient,
        ] {
            let mut light = Light::new("light", kind);
            light.set_range(12.0);
            light.set_cone(20.0, 35.0);
            light.look_at(Vec3::new(3.0, 8.0, 2.0), Vec3::ZERO);
            light.set_shadow_mode(&device, ShadowMode::Hard).unwrap();
            light.set_global_illumination(&device, true).unwrap();
            assert_encloses_cameras(&light);

            light.set_range(30.0);
            light.set_transform(Mat4::from_rotation_x(-1.0) * Mat4::from_translation(Vec3::Y));
            assert_encloses_cameras(&light);
            light.close(&device);
        }
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn spot_box_covers_apex_and_cone_base() {
        let mut light = Light::new("spot", LightType::Spot);
        light.set_range(10.0);
        light.set_cone(10.0, 30.0);
        let bounds = *light.bounding_box();
        assert!(bounds.contains_point(Vec3::ZERO));
        let radius = 10.0 * 30f32.to_radians().tan();
        assert!(bounds.contains_point(Vec3::new(radius, 0.0, -10.0)));
        assert!(bounds.contains_point(Vec3::new(0.0, -radius, -10.0)));
        assert!(!bounds.contains_point(Vec3::new(0.0, 0.0, 1.0)));
    }
}
