use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::{EulerRot, Mat4, Quat, Vec3};
use log::info;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::geometry::MeshKind;
use crate::light::{Light, LightError, LightType, ShadowMode};

/// Index of an object in its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

/// Index of a light in its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LightId(pub usize);

/// Which part of the frame draws an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderQueue {
    /// Deferred G-buffer geometry.
    #[default]
    Opaque,
    /// Forward shaded after opaque shading, e.g. transparent surfaces.
    Specific,
}

/// Runtime representation of a scene.
#[derive(Debug, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<Light>,
}

impl Scene {
    /// Parses the scene XML produced by the authoring tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut objects = Vec::new();
        let mut parents = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = SceneObject::default();
            object.name = required_text(&node, "name")?;
            object.object_type = optional_text(&node, "type").unwrap_or_else(|| "mesh".to_string());
            object.mesh = optional_text(&node, "mesh")
                .or_else(|| (object.object_type != "mesh").then(|| object.object_type.clone()))
                .and_then(|mesh| mesh.parse().ok());
            object.material = optional_text(&node, "material");
            object.queue = match optional_text(&node, "queue").as_deref() {
                None | Some("opaque") => RenderQueue::Opaque,
                Some("specific") | Some("transparent") => RenderQueue::Specific,
                Some(other) => bail!("object {}: unknown queue {other:?}", object.name),
            };
            object.color = parse_color(optional_text(&node, "color"), object.color)?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)?;
            object.fov = parse_f32(optional_text(&node, "fov"), object.fov)?;
            parents.push(optional_text(&node, "parent"));
            objects.push(object);
        }

        let ids: HashMap<&str, ObjectId> = objects
            .iter()
            .enumerate()
            .map(|(index, object)| (object.name.as_str(), ObjectId(index)))
            .collect();
        let resolved = parents
            .iter()
            .zip(&objects)
            .map(|(parent, object)| {
                parent
                    .as_deref()
                    .map(|parent| {
                        ids.get(parent).copied().ok_or_else(|| {
                            anyhow!("object {} has unknown parent {parent}", object.name)
                        })
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        for (object, parent) in objects.iter_mut().zip(resolved) {
            object.parent = parent;
        }

        let lights = document
            .descendants()
            .filter(|n| n.has_tag_name("light"))
            .map(|node| parse_light(&node))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { objects, lights })
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0)
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)
    }

    pub fn light_ids(&self) -> impl Iterator<Item = LightId> {
        (0..self.lights.len()).map(LightId)
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .position(|object| object.name == name)
            .map(ObjectId)
    }

    /// Object to world transform, following the parent chain.
    ///
    /// A parent chain that loops back on itself is cut where it repeats.
    pub fn world_transform(&self, id: ObjectId) -> Mat4 {
        let mut transform = Mat4::IDENTITY;
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(object) = current.and_then(|id| self.object(id)) {
            if steps > self.objects.len() {
                break;
            }
            transform = object.local_transform() * transform;
            current = object.parent;
            steps += 1;
        }
        transform
    }

    /// Drawable objects of `queue`, in scene order.
    pub fn renderables(&self, queue: RenderQueue) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, object)| object.mesh.is_some() && object.queue == queue)
            .map(|(index, _)| ObjectId(index))
            .collect()
    }

    /// Creates shadow and GI targets for every light.
    ///
    /// With `shadows` off every shadow request is dropped. On error the
    /// targets of all lights are released.
    pub fn setup_lights(
        &mut self,
        device: &dyn Device,
        shadows: bool,
        shadow_size: u32,
    ) -> std::result::Result<(), LightError> {
        let result = self.lights.iter_mut().try_for_each(|light| {
            light.set_shadow_size(shadow_size);
            if !shadows {
                light.request_shadow_mode(ShadowMode::None);
            }
            light.activate(device)
        });
        if let Err(err) = result {
            self.close(device);
            return Err(err);
        }
        let shadowed = self.lights.iter().filter(|light| light.shadow().is_some()).count();
        info!("{} light(s), {shadowed} with shadows", self.lights.len());
        Ok(())
    }

    pub fn close(&mut self, device: &dyn Device) {
        for light in &mut self.lights {
            light.close(device);
        }
    }
}

/// Scene object as described by the authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default)]
    pub queue: RenderQueue,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: String::new(),
            mesh: None,
            material: None,
            queue: RenderQueue::Opaque,
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            fov: default_fov(),
            parent: None,
        }
    }
}

impl SceneObject {
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
        )
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    45.0
}

fn parse_light(node: &Node<'_, '_>) -> Result<Light> {
    let name = required_text(node, "name")?;
    let kind: LightType = optional_text(node, "type")
        .unwrap_or_else(|| "point".to_string())
        .parse()
        .with_context(|| format!("light {name}"))?;
    let mut light = Light::new(name.as_str(), kind);
    light.set_range(parse_f32(optional_text(node, "range"), light.range())?);
    light.set_color(parse_color(optional_text(node, "color"), light.color())?);
    light.set_intensity(parse_f32(optional_text(node, "intensity"), light.intensity())?);
    light.set_attenuation(parse_vec3(
        optional_text(node, "attenuation"),
        light.attenuation(),
    )?);
    let inner = parse_f32(optional_text(node, "inner"), light.inner_angle())?;
    let outer = parse_f32(optional_text(node, "outer"), light.outer_angle())?;
    light.set_cone(inner, outer);
    light.set_shadow_factor(parse_f32(
        optional_text(node, "shadowFactor"),
        light.shadow_factor(),
    )?);

    let position = parse_vec3(optional_text(node, "position"), Vec3::ZERO)?;
    match optional_text(node, "direction") {
        Some(direction) => {
            let direction = parse_vec3(Some(direction), Vec3::NEG_Z)?;
            if direction.length_squared() <= f32::EPSILON {
                bail!("light {name} has a zero direction");
            }
            light.look_at(position, position + direction);
        }
        None => light.set_transform(Mat4::from_translation(position)),
    }

    if let Some(mode) = optional_text(node, "shadow") {
        let mode: ShadowMode = mode.parse().with_context(|| format!("light {name}"))?;
        light.request_shadow_mode(mode);
    }
    if let Some(gi) = optional_text(node, "gi") {
        light.request_global_illumination(matches!(gi.as_str(), "true" | "on" | "1"));
    }
    Ok(light)
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components<const N: usize>(value: &str, what: &str) -> Result<[f32; N]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .with_context(|| format!("invalid {what} component {component:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    numbers
        .try_into()
        .map_err(|numbers: Vec<f32>| anyhow!("{what} needs {N} components, found {}", numbers.len()))
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(parse_components(&value, "vector")?)),
        None => Ok(default),
    }
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(parse_components(&value, "color")?) / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    const SAMPLE: &str = r#"
    <scene>
        <object>
            <name>Camera</name>
            <type>camera</type>
            <fov>90</fov>
        </object>
        <object>
            <name>Table</name>
            <type>cube</type>
            <position>0 1 0</position>
            <material>wood</material>
        </object>
        <object>
            <name>Glass</name>
            <mesh>sphere</mesh>
            <queue>specific</queue>
            <parent>Table</parent>
            <position>0 0.5 0</position>
        </object>
        <light>
            <name>Sun</name>
            <type>directional</type>
            <intensity>2.5</intensity>
            <direction>0 -1 0</direction>
            <position>0 5 0</position>
            <color>255 128 0</color>
            <shadow>hard</shadow>
        </light>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_objects_and_lights() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 3);
        let camera = scene.objects.iter().find(|o| o.name == "Camera").unwrap();
        assert_eq!(camera.object_type, "camera");
        assert_eq!(camera.fov, 90.0);
        assert_eq!(camera.mesh, None);
        assert_eq!(scene.lights.len(), 1);
        let light = &scene.lights[0];
        assert_eq!(light.kind(), LightType::Directional);
        assert_eq!(light.position(), Vec3::new(0.0, 5.0, 0.0));
        assert!((light.direction() - Vec3::NEG_Y).length() < 1e-5);
        assert!((light.intensity() - 2.5).abs() < f32::EPSILON);
        assert_eq!(light.color(), Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(light.shadow_mode(), ShadowMode::Hard);
    }

    #[test]
    fn queues_and_parents_are_resolved() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let table = scene.find_object("Table").unwrap();
        let glass = scene.find_object("Glass").unwrap();
        assert_eq!(scene.renderables(RenderQueue::Opaque), vec![table]);
        assert_eq!(scene.renderables(RenderQueue::Specific), vec![glass]);
        assert_eq!(scene.object(glass).unwrap().parent, Some(table));
        let world = scene.world_transform(glass);
        assert!((world.w_axis.truncate() - Vec3::new(0.0, 1.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn parent_cycles_terminate() {
        let mut scene = Scene::from_xml(SAMPLE).unwrap();
        let table = scene.find_object("Table").unwrap();
        let glass = scene.find_object("Glass").unwrap();
        scene.objects[table.0].parent = Some(glass);
        let _ = scene.world_transform(glass);
    }

    #[test]
    fn setup_lights_honours_the_shadow_switch() {
        let device = RecordingDevice::default();
        let mut scene = Scene::from_xml(SAMPLE).unwrap();
        scene.setup_lights(&device, false, 256).unwrap();
        assert!(scene.lights[0].shadow().is_none());

        let mut scene = Scene::from_xml(SAMPLE).unwrap();
        scene.setup_lights(&device, true, 256).unwrap();
        let shadow = scene.lights[0].shadow().unwrap();
        assert_eq!(device.texture(shadow.depth).unwrap().width, 256);
        scene.close(&device);
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>mesh</type></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn unknown_parent_and_bad_vectors_are_errors() {
        let bad_parent = "<scene><object><name>A</name><parent>B</parent></object></scene>";
        assert!(Scene::from_xml(bad_parent).is_err());
        let bad_vector = "<scene><object><name>A</name><position>1 x 2</position></object></scene>";
        assert!(Scene::from_xml(bad_vector).is_err());
    }
}
