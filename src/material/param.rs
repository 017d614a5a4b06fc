use std::fmt;
use std::sync::{Arc, Weak};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{MaterialError, Semantic};
use crate::device::{BufferHandle, TextureHandle};

/// Declared type of a material parameter or program uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Float,
    Float2,
    Float3,
    Float4,
    Float3x3,
    Float4x4,
    Int,
    Bool,
    Texture,
    Buffer,
}

impl ParamType {
    /// Accepts both material-format names (`float4x4`) and shader names (`mat4`).
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "float" => ParamType::Float,
            "float2" | "vec2" => ParamType::Float2,
            "float3" | "vec3" => ParamType::Float3,
            "float4" | "vec4" => ParamType::Float4,
            "float3x3" | "mat3" => ParamType::Float3x3,
            "float4x4" | "mat4" => ParamType::Float4x4,
            "int" => ParamType::Int,
            "bool" => ParamType::Bool,
            "texture" | "sampler2D" | "samplerCube" | "sampler2DShadow" => ParamType::Texture,
            "buffer" => ParamType::Buffer,
            _ => return None,
        })
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Float => "float",
            ParamType::Float2 => "float2",
            ParamType::Float3 => "float3",
            ParamType::Float4 => "float4",
            ParamType::Float3x3 => "float3x3",
            ParamType::Float4x4 => "float4x4",
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Texture => "texture",
            ParamType::Buffer => "buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Float3x3(Mat3),
    Float4x4(Mat4),
    Int(i32),
    Bool(bool),
    Texture(Option<TextureHandle>),
    Buffer(Option<BufferHandle>),
}

impl ParamValue {
    pub fn ty(&self) -> ParamType {
        match self {
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Float2(_) => ParamType::Float2,
            ParamValue::Float3(_) => ParamType::Float3,
            ParamValue::Float4(_) => ParamType::Float4,
            ParamValue::Float3x3(_) => ParamType::Float3x3,
            ParamValue::Float4x4(_) => ParamType::Float4x4,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Texture(_) => ParamType::Texture,
            ParamValue::Buffer(_) => ParamType::Buffer,
        }
    }

    pub fn default_for(ty: ParamType) -> Self {
        match ty {
            ParamType::Float => ParamValue::Float(0.0),
            ParamType::Float2 => ParamValue::Float2(Vec2::ZERO),
            ParamType::Float3 => ParamValue::Float3(Vec3::ZERO),
            ParamType::Float4 => ParamValue::Float4(Vec4::ZERO),
            ParamType::Float3x3 => ParamValue::Float3x3(Mat3::IDENTITY),
            ParamType::Float4x4 => ParamValue::Float4x4(Mat4::IDENTITY),
            ParamType::Int => ParamValue::Int(0),
            ParamType::Bool => ParamValue::Bool(false),
            ParamType::Texture => ParamValue::Texture(None),
            ParamType::Buffer => ParamValue::Buffer(None),
        }
    }

    /// Parses a whitespace separated literal such as `"1 0.5 0 1"`.
    ///
    /// Resource types cannot be written as literals and always parse to an
    /// unbound slot.
    pub fn parse(ty: ParamType, text: &str) -> Result<Self, MaterialError> {
        let invalid = || MaterialError::InvalidValue {
            ty,
            value: text.to_string(),
        };
        let floats = || -> Result<Vec<f32>, MaterialError> {
            text.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<f32>().map_err(|_| invalid()))
                .collect()
        };
        let exact = |count: usize| -> Result<Vec<f32>, MaterialError> {
            let values = floats()?;
            if values.len() == count {
                Ok(values)
            } else {
                Err(invalid())
            }
        };
        Ok(match ty {
            ParamType::Float => ParamValue::Float(exact(1)?[0]),
            ParamType::Float2 => ParamValue::Float2(Vec2::from_slice(&exact(2)?)),
            ParamType::Float3 => ParamValue::Float3(Vec3::from_slice(&exact(3)?)),
            ParamType::Float4 => ParamValue::Float4(Vec4::from_slice(&exact(4)?)),
            ParamType::Float3x3 => ParamValue::Float3x3(Mat3::from_cols_slice(&exact(9)?)),
            ParamType::Float4x4 => ParamValue::Float4x4(Mat4::from_cols_slice(&exact(16)?)),
            ParamType::Int => ParamValue::Int(text.trim().parse().map_err(|_| invalid())?),
            ParamType::Bool => ParamValue::Bool(match text.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(invalid()),
            }),
            ParamType::Texture => ParamValue::Texture(None),
            ParamType::Buffer => ParamValue::Buffer(None),
        })
    }
}

/// Receives value changes of a [`MaterialParam`] it is registered on.
pub trait ParamListener: Send + Sync {
    fn on_param_changed(&self, value: &ParamValue);
}

struct ParamState {
    value: ParamValue,
    listeners: Vec<Weak<dyn ParamListener>>,
}

/// Named, typed value slot of a material.
///
/// Changing the value notifies every registered listener before `set_value`
/// returns. Listeners are held weakly, so a dropped binding never keeps
/// receiving updates.
pub struct MaterialParam {
    name: String,
    ty: ParamType,
    semantic: Option<Semantic>,
    state: RwLock<ParamState>,
}

impl MaterialParam {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            semantic: None,
            state: RwLock::new(ParamState {
                value: ParamValue::default_for(ty),
                listeners: Vec::new(),
            }),
        }
    }

    pub fn with_semantic(mut self, semantic: Semantic) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_value(self, value: ParamValue) -> Result<Self, MaterialError> {
        self.set_value(value)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn semantic(&self) -> Option<Semantic> {
        self.semantic
    }

    pub fn value(&self) -> ParamValue {
        self.state.read().value.clone()
    }

    pub fn set_value(&self, value: ParamValue) -> Result<(), MaterialError> {
        if value.ty() != self.ty {
            return Err(MaterialError::TypeMismatch {
                name: self.name.clone(),
                expected: self.ty,
                found: value.ty(),
            });
        }
        let listeners: Vec<Arc<dyn ParamListener>> = {
            let mut state = self.state.write();
            state.value = value.clone();
            state.listeners.retain(|listener| listener.strong_count() > 0);
            state.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.on_param_changed(&value);
        }
        Ok(())
    }

    pub fn add_listener(&self, listener: &Arc<dyn ParamListener>) {
        self.state.write().listeners.push(Arc::downgrade(listener));
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ParamListener>) {
        let target = Arc::downgrade(listener);
        self.state
            .write()
            .listeners
            .retain(|existing| existing.strong_count() > 0 && !existing.ptr_eq(&target));
    }

    pub fn listener_count(&self) -> usize {
        self.state
            .read()
            .listeners
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for MaterialParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialParam")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("semantic", &self.semantic)
            .field("value", &self.state.read().value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ParamValue>>,
    }

    impl ParamListener for Recorder {
        fn on_param_changed(&self, value: &ParamValue) {
            self.seen.lock().push(value.clone());
        }
    }

    #[test]
    fn parse_vector_literals() {
        let value = ParamValue::parse(ParamType::Float4, "1 0.5 0 1").unwrap();
        assert_eq!(value, ParamValue::Float4(Vec4::new(1.0, 0.5, 0.0, 1.0)));
        assert!(ParamValue::parse(ParamType::Float3, "1 2").is_err());
        assert!(ParamValue::parse(ParamType::Bool, "maybe").is_err());
    }

    #[test]
    fn set_value_notifies_listeners_immediately() {
        let param = MaterialParam::new("tint", ParamType::Float);
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn ParamListener> = recorder.clone();
        param.add_listener(&listener);

        param.set_value(ParamValue::Float(2.0)).unwrap();
        assert_eq!(*recorder.seen.lock(), vec![ParamValue::Float(2.0)]);

        param.remove_listener(&listener);
        param.set_value(ParamValue::Float(3.0)).unwrap();
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let param = MaterialParam::new("tint", ParamType::Float);
        let listener: Arc<dyn ParamListener> = Arc::new(Recorder::default());
        param.add_listener(&listener);
        assert_eq!(param.listener_count(), 1);
        drop(listener);
        assert_eq!(param.listener_count(), 0);
        param.set_value(ParamValue::Float(1.0)).unwrap();
    }

    #[test]
    fn mismatched_value_type_is_rejected() {
        let param = MaterialParam::new("tint", ParamType::Float3);
        let err = param.set_value(ParamValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, MaterialError::TypeMismatch { .. }));
        assert_eq!(param.value(), ParamValue::Float3(Vec3::ZERO));
    }
}
