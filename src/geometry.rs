//! Proxy meshes drawn by the pipeline: full-screen quad, light volumes and
//! the primitive shapes scene objects refer to.

use std::f32::consts::{PI, TAU};
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::device::{self, BufferHandle, Device, DeviceError};

const SPHERE_RINGS: u32 = 12;
const SPHERE_SEGMENTS: u32 = 24;
const CONE_SEGMENTS: u32 = 24;

/// Vertex layout shared by every built-in mesh: position then normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshKind {
    Cube,
    Sphere,
    Cone,
    Quad,
}

impl FromStr for MeshKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "cube" | "box" => Ok(MeshKind::Cube),
            "sphere" => Ok(MeshKind::Sphere),
            "cone" => Ok(MeshKind::Cone),
            "quad" | "plane" => Ok(MeshKind::Quad),
            other => Err(format!("unknown mesh {other:?}")),
        }
    }
}

/// Unit cube centred on the origin as a triangle list.
pub fn cube() -> Vec<Vertex> {
    let faces = [Vec3::Z, Vec3::NEG_Z, Vec3::NEG_X, Vec3::X, Vec3::NEG_Y, Vec3::Y];
    let mut vertices = Vec::with_capacity(36);
    for normal in faces {
        let tangent = if normal.y.abs() > 0.5 {
            Vec3::X
        } else {
            -normal.cross(Vec3::Y)
        };
        let bitangent = normal.cross(tangent);
        let corner =
            |u: f32, v: f32| Vertex::new((normal + tangent * u + bitangent * v) * 0.5, normal);
        let quad = [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ];
        vertices.extend([quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
    }
    vertices
}

/// Two triangles covering clip space, facing +Z.
pub fn quad() -> Vec<Vertex> {
    let corners = [
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    [0, 1, 2, 0, 2, 3]
        .into_iter()
        .map(|index| Vertex::new(corners[index], Vec3::Z))
        .collect()
}

/// Unit sphere as a triangle list.
pub fn sphere() -> Vec<Vertex> {
    let point = |ring: u32, segment: u32| {
        let theta = ring as f32 / SPHERE_RINGS as f32 * PI;
        let phi = segment as f32 / SPHERE_SEGMENTS as f32 * TAU;
        let position = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
        Vertex::new(position, position)
    };
    let mut vertices = Vec::with_capacity((SPHERE_RINGS * SPHERE_SEGMENTS * 6) as usize);
    for ring in 0..SPHERE_RINGS {
        for segment in 0..SPHERE_SEGMENTS {
            let a = point(ring, segment);
            let b = point(ring + 1, segment);
            let c = point(ring + 1, segment + 1);
            let d = point(ring, segment + 1);
            vertices.extend([a, c, b, a, d, c]);
        }
    }
    vertices
}

/// Cone with its apex at the origin opening along -Z; length 1, base radius 1.
pub fn cone() -> Vec<Vertex> {
    let rim = |segment: u32| {
        let angle = segment as f32 / CONE_SEGMENTS as f32 * TAU;
        Vec3::new(angle.cos(), angle.sin(), -1.0)
    };
    let base = Vec3::NEG_Z;
    let mut vertices = Vec::with_capacity((CONE_SEGMENTS * 6) as usize);
    for segment in 0..CONE_SEGMENTS {
        let (a, b) = (rim(segment), rim(segment + 1));
        let side = a.cross(b).normalize_or_zero();
        vertices.extend([
            Vertex::new(Vec3::ZERO, side),
            Vertex::new(a, side),
            Vertex::new(b, side),
            Vertex::new(base, Vec3::NEG_Z),
            Vertex::new(b, Vec3::NEG_Z),
            Vertex::new(a, Vec3::NEG_Z),
        ]);
    }
    vertices
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub buffer: BufferHandle,
    pub vertex_count: u32,
}

impl GpuMesh {
    pub fn upload(
        device: &dyn Device,
        label: &str,
        vertices: &[Vertex],
    ) -> Result<Self, DeviceError> {
        let vertex_count = vertices.len() as u32;
        let buffer =
            device.create_vertex_buffer(label, bytemuck::cast_slice(vertices), vertex_count)?;
        Ok(Self {
            buffer,
            vertex_count,
        })
    }
}

/// Device copies of the built-in meshes.
#[derive(Debug, Default)]
pub struct BaseGeometry {
    quad: Option<GpuMesh>,
    sphere: Option<GpuMesh>,
    cone: Option<GpuMesh>,
    cube: Option<GpuMesh>,
}

impl BaseGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads every mesh; on error nothing is left alive.
    pub fn setup(&mut self, device: &dyn Device) -> Result<(), DeviceError> {
        self.close(device);
        if let Err(err) = self.upload(device) {
            self.close(device);
            return Err(err);
        }
        debug!("uploaded base geometry");
        Ok(())
    }

    fn upload(&mut self, device: &dyn Device) -> Result<(), DeviceError> {
        self.quad = Some(GpuMesh::upload(device, "quad", &quad())?);
        self.sphere = Some(GpuMesh::upload(device, "sphere", &sphere())?);
        self.cone = Some(GpuMesh::upload(device, "cone", &cone())?);
        self.cube = Some(GpuMesh::upload(device, "cube", &cube())?);
        Ok(())
    }

    pub fn mesh(&self, kind: MeshKind) -> Option<GpuMesh> {
        match kind {
            MeshKind::Quad => self.quad,
            MeshKind::Sphere => self.sphere,
            MeshKind::Cone => self.cone,
            MeshKind::Cube => self.cube,
        }
    }

    pub fn close(&mut self, device: &dyn Device) {
        for mesh in [&mut self.quad, &mut self.sphere, &mut self.cone, &mut self.cube] {
            let mut buffer = mesh.take().map(|mesh| mesh.buffer);
            device::release(device, &mut buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn positions(vertices: &[Vertex]) -> impl Iterator<Item = Vec3> + '_ {
        vertices.iter().map(|vertex| Vec3::from_array(vertex.position))
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn cube_faces_point_outwards() {
        let vertices = cube();
        assert_eq!(vertices.len(), 36);
        for vertex in &vertices {
            let position = Vec3::from_array(vertex.position);
            let normal = Vec3::from_array(vertex.normal);
            assert!((position.dot(normal) - 0.5).abs() < 1e-5);
            assert!(position.abs().max_element() <= 0.5 + 1e-5);
        }
    }

    #[test]
    fn sphere_is_unit_radius() {
        assert!(positions(&sphere()).all(|p| (p.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn cone_spans_apex_to_unit_base() {
        let vertices = cone();
        assert!(positions(&vertices).all(|p| p.z <= 0.0 && p.z >= -1.0));
        assert!(positions(&vertices).any(|p| p == Vec3::ZERO));
        assert!(positions(&vertices)
            .filter(|p| p.z == -1.0)
            .all(|p| p.truncate().length() <= 1.0 + 1e-5));
    }

    #[test]
    fn failed_upload_leaves_nothing_alive() {
        let device = RecordingDevice::default();
        device.fail_after(2);
        let mut geometry = BaseGeometry::new();
        assert!(geometry.setup(&device).is_err());
        assert_eq!(device.live_count(), 0);
        assert!(geometry.mesh(MeshKind::Quad).is_none());

        device.clear_failure();
        geometry.setup(&device).unwrap();
        assert_eq!(geometry.mesh(MeshKind::Cube).unwrap().vertex_count, 36);
        geometry.close(&device);
        assert_eq!(device.live_count(), 0);
    }
}
