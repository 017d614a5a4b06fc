use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Texture formats the render core knows how to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextureFormat {
    D24S8,
    D16S8,
    X8D24,
    D16,
    D32F,
    R16F,
    R32F,
    RGBA8,
    RGB10A2,
    RG11B10F,
    RGBA16F,
    RGBA32F,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::D24S8
                | TextureFormat::D16S8
                | TextureFormat::X8D24
                | TextureFormat::D16
                | TextureFormat::D32F
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::D24S8 | TextureFormat::D16S8)
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::D16 | TextureFormat::R16F => 2,
            TextureFormat::D16S8 => 3,
            TextureFormat::D24S8
            | TextureFormat::X8D24
            | TextureFormat::D32F
            | TextureFormat::R32F
            | TextureFormat::RGBA8
            | TextureFormat::RGB10A2
            | TextureFormat::RG11B10F => 4,
            TextureFormat::RGBA16F => 8,
            TextureFormat::RGBA32F => 16,
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    /// How a texture is going to be used by the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const COPY_SRC = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

impl TextureUsage {
    /// Usage required by every colour attachment of the deferred pipeline.
    pub const COLOR_TARGET: TextureUsage = TextureUsage::RENDER_TARGET.union(TextureUsage::SAMPLED);
    /// Usage required by every depth attachment of the deferred pipeline.
    pub const DEPTH_TARGET: TextureUsage = TextureUsage::DEPTH_STENCIL.union(TextureUsage::SAMPLED);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureDim {
    Texture2D,
    Texture3D,
    Cube,
}

/// Vertex attribute formats as reported by program reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int4,
    UByte4Norm,
}

impl VertexFormat {
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float | VertexFormat::Int | VertexFormat::UByte4Norm => 4,
            VertexFormat::Float2 => 8,
            VertexFormat::Float3 => 12,
            VertexFormat::Float4 | VertexFormat::Int4 => 16,
        }
    }

    /// Maps a shader-language attribute type to a vertex format.
    pub fn from_shader_type(name: &str) -> Option<Self> {
        Some(match name {
            "float" => VertexFormat::Float,
            "vec2" | "float2" => VertexFormat::Float2,
            "vec3" | "float3" => VertexFormat::Float3,
            "vec4" | "float4" => VertexFormat::Float4,
            "int" => VertexFormat::Int,
            "ivec4" | "int4" => VertexFormat::Int4,
            "color" => VertexFormat::UByte4Norm,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    /// Resolves the state name used by material passes to bind an entry point.
    pub fn from_state_name(name: &str) -> Option<Self> {
        Some(match name {
            "vertex" | "vertexShader" => ShaderStage::Vertex,
            "fragment" | "fragmentShader" | "pixelShader" => ShaderStage::Fragment,
            "geometry" | "geometryShader" => ShaderStage::Geometry,
            "compute" | "computeShader" => ShaderStage::Compute,
            _ => return None,
        })
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Compute => "compute",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_are_classified() {
        assert!(TextureFormat::D24S8.is_depth());
        assert!(TextureFormat::D24S8.has_stencil());
        assert!(TextureFormat::X8D24.is_depth());
        assert!(!TextureFormat::X8D24.has_stencil());
        assert!(!TextureFormat::RGBA16F.is_depth());
    }

    #[test]
    fn composite_usages_contain_their_parts() {
        assert!(TextureUsage::COLOR_TARGET.contains(TextureUsage::SAMPLED));
        assert!(TextureUsage::COLOR_TARGET.contains(TextureUsage::RENDER_TARGET));
        assert!(!TextureUsage::COLOR_TARGET.contains(TextureUsage::DEPTH_STENCIL));
    }

    #[test]
    fn shader_attribute_types_map_to_vertex_formats() {
        assert_eq!(VertexFormat::from_shader_type("vec3"), Some(VertexFormat::Float3));
        assert_eq!(VertexFormat::Float3.size(), 12);
        assert_eq!(VertexFormat::from_shader_type("mat4"), None);
    }
}
