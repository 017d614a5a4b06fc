use std::fs;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::device::{RecordedCommand, RenderTarget};
use crate::material::{Material, MaterialLibrary};
use crate::scene::SceneObject;

/// Reads every material file into a library.
pub fn load_materials(paths: &[String]) -> Result<MaterialLibrary> {
    let mut library = MaterialLibrary::new();
    for path in paths {
        let xml =
            fs::read_to_string(path).with_context(|| format!("failed to read material {path}"))?;
        let material =
            Material::from_xml(&xml).with_context(|| format!("failed to parse material {path}"))?;
        println!(
            "Loaded material {} ({} technique(s))",
            material.name(),
            material.techniques().len()
        );
        library.insert(material);
    }
    Ok(library)
}

/// Main camera from the first `camera` object, or a default view of the origin.
pub fn camera_from_objects(objects: &[SceneObject], aspect: f32) -> Camera {
    let default_position = Vec3::new(0.0, 2.0, 6.0);
    let (position, rotation, fov) = objects
        .iter()
        .find(|o| o.object_type == "camera")
        .map(|camera| (camera.position, camera.rotation, camera.fov))
        .unwrap_or((default_position, Vec3::ZERO, 60.0));

    let mut camera = Camera::perspective(fov, aspect.max(0.01), 0.1, 100.0);
    if rotation == Vec3::ZERO && position == default_position {
        camera.look_at(position, Vec3::ZERO, Vec3::Y);
        return camera;
    }
    let rotation_matrix = Mat4::from_rotation_z(rotation.z.to_radians())
        * Mat4::from_rotation_y(rotation.y.to_radians())
        * Mat4::from_rotation_x(rotation.x.to_radians());
    let forward = rotation_matrix.transform_vector3(Vec3::NEG_Z);
    let up = rotation_matrix.transform_vector3(Vec3::Y);
    camera.look_at(position, position + forward.normalize_or_zero(), up);
    camera
}

fn describe_target(target: &RenderTarget) -> String {
    match target {
        RenderTarget::Screen => "screen".to_string(),
        RenderTarget::Framebuffer(framebuffer) => format!("framebuffer #{}", framebuffer.0),
    }
}

/// Prints the passes and draw count of a recorded frame.
pub fn print_frame(commands: &[RecordedCommand]) {
    println!("Frame passes:");
    let mut draws = 0;
    for command in commands {
        match command {
            RecordedCommand::BeginPass(pass) => {
                println!(" - {:?} -> {}", pass.stage, describe_target(&pass.target));
            }
            RecordedCommand::Blit { target, .. } => {
                println!(" - Present -> {}", describe_target(target));
            }
            RecordedCommand::Draw(_) => draws += 1,
            _ => {}
        }
    }
    println!("Draw calls: {draws}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_at_origin() {
        let camera = camera_from_objects(&[], 1.5);
        assert!((camera.position() - Vec3::new(0.0, 2.0, 6.0)).length() < 1e-4);
        let to_origin = (-camera.position()).normalize();
        assert!(camera.forward().dot(to_origin) > 0.999);
    }

    #[test]
    fn camera_object_drives_the_view() {
        let object = SceneObject {
            name: "cam".to_string(),
            object_type: "camera".to_string(),
            position: Vec3::new(0.0, 0.0, 10.0),
            rotation: Vec3::new(0.0, 90.0, 0.0),
            fov: 45.0,
            ..SceneObject::default()
        };
        let camera = camera_from_objects(&[object], 1.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-4);
        assert!((camera.forward() - Vec3::NEG_X).length() < 1e-4);
        assert_eq!(camera.aperture(), 45.0);
    }
}
