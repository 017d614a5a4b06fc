//! Fixed-function state of a material pass.
//!
//! Material files describe state as flat `(name, value)` pairs; [`RenderState::apply`]
//! folds one pair into the structured state.

use super::MaterialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    pub cull: CullMode,
    pub fill: FillMode,
    pub depth_bias: f32,
    pub slope_scaled_depth_bias: f32,
    pub scissor: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull: CullMode::Back,
            fill: FillMode::Solid,
            depth_bias: 0.0,
            slope_scaled_depth_bias: 0.0,
            scissor: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub enable: bool,
    pub write: bool,
    pub func: CompareFunc,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            enable: true,
            write: true,
            func: CompareFunc::LessEqual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enable: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub write_mask: u8,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enable: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: 0xF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    pub enable: bool,
    pub read_mask: u8,
    pub write_mask: u8,
    pub func: CompareFunc,
    pub pass: StencilOp,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub reference: u8,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enable: false,
            read_mask: 0xFF,
            write_mask: 0xFF,
            func: CompareFunc::Always,
            pass: StencilOp::Keep,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            reference: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderState {
    pub raster: RasterState,
    pub depth: DepthState,
    pub blend: BlendState,
    pub stencil: StencilState,
}

impl RenderState {
    /// Applies one `(name, value)` pair from a material pass.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), MaterialError> {
        let invalid = || MaterialError::InvalidState {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "cullMode" => self.raster.cull = parse_cull(value).ok_or_else(invalid)?,
            "fillMode" => self.raster.fill = parse_fill(value).ok_or_else(invalid)?,
            "depthBias" => self.raster.depth_bias = value.parse().map_err(|_| invalid())?,
            "slopeScaleDepthBias" => {
                self.raster.slope_scaled_depth_bias = value.parse().map_err(|_| invalid())?
            }
            "scissorEnable" => self.raster.scissor = parse_bool(value).ok_or_else(invalid)?,
            "depthEnable" => self.depth.enable = parse_bool(value).ok_or_else(invalid)?,
            "depthWriteEnable" => self.depth.write = parse_bool(value).ok_or_else(invalid)?,
            "depthFunc" => self.depth.func = parse_compare(value).ok_or_else(invalid)?,
            "blendEnable" => self.blend.enable = parse_bool(value).ok_or_else(invalid)?,
            "blendSrc" => self.blend.src = parse_factor(value).ok_or_else(invalid)?,
            "blendDest" => self.blend.dst = parse_factor(value).ok_or_else(invalid)?,
            "blendOp" => self.blend.op = parse_blend_op(value).ok_or_else(invalid)?,
            "blendAlphaSrc" => self.blend.src_alpha = parse_factor(value).ok_or_else(invalid)?,
            "blendAlphaDest" => self.blend.dst_alpha = parse_factor(value).ok_or_else(invalid)?,
            "blendAlphaOp" => self.blend.alpha_op = parse_blend_op(value).ok_or_else(invalid)?,
            "colorWriteMask" => self.blend.write_mask = parse_mask(value).ok_or_else(invalid)?,
            "stencilEnable" => self.stencil.enable = parse_bool(value).ok_or_else(invalid)?,
            "stencilReadMask" => {
                self.stencil.read_mask = parse_byte(value).ok_or_else(invalid)?
            }
            "stencilWriteMask" => {
                self.stencil.write_mask = parse_byte(value).ok_or_else(invalid)?
            }
            "stencilFunc" => self.stencil.func = parse_compare(value).ok_or_else(invalid)?,
            "stencilPass" => self.stencil.pass = parse_stencil_op(value).ok_or_else(invalid)?,
            "stencilFail" => self.stencil.fail = parse_stencil_op(value).ok_or_else(invalid)?,
            "stencilDepthFail" => {
                self.stencil.depth_fail = parse_stencil_op(value).ok_or_else(invalid)?
            }
            "stencilRef" => self.stencil.reference = parse_byte(value).ok_or_else(invalid)?,
            _ => {
                return Err(MaterialError::UnknownState {
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_byte(value: &str) -> Option<u8> {
    match value.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Accepts either a number or a combination of the letters `r`, `g`, `b`, `a`.
fn parse_mask(value: &str) -> Option<u8> {
    if let Some(mask) = parse_byte(value) {
        return (mask <= 0xF).then_some(mask);
    }
    value.chars().try_fold(0u8, |mask, channel| {
        let bit = match channel.to_ascii_lowercase() {
            'r' => 1,
            'g' => 2,
            'b' => 4,
            'a' => 8,
            _ => return None,
        };
        Some(mask | bit)
    })
}

fn parse_compare(value: &str) -> Option<CompareFunc> {
    Some(match value {
        "never" => CompareFunc::Never,
        "less" => CompareFunc::Less,
        "equal" => CompareFunc::Equal,
        "lequal" | "lessEqual" => CompareFunc::LessEqual,
        "greater" => CompareFunc::Greater,
        "notequal" | "notEqual" => CompareFunc::NotEqual,
        "gequal" | "greaterEqual" => CompareFunc::GreaterEqual,
        "always" => CompareFunc::Always,
        _ => return None,
    })
}

fn parse_cull(value: &str) -> Option<CullMode> {
    Some(match value {
        "none" => CullMode::None,
        "front" => CullMode::Front,
        "back" => CullMode::Back,
        _ => return None,
    })
}

fn parse_fill(value: &str) -> Option<FillMode> {
    Some(match value {
        "solid" => FillMode::Solid,
        "wireframe" => FillMode::Wireframe,
        _ => return None,
    })
}

fn parse_factor(value: &str) -> Option<BlendFactor> {
    Some(match value {
        "zero" => BlendFactor::Zero,
        "one" => BlendFactor::One,
        "srccol" | "srcColor" => BlendFactor::SrcColor,
        "invsrccol" | "oneMinusSrcColor" => BlendFactor::OneMinusSrcColor,
        "srcalpha" | "srcAlpha" => BlendFactor::SrcAlpha,
        "invsrcalpha" | "oneMinusSrcAlpha" => BlendFactor::OneMinusSrcAlpha,
        "dstcol" | "dstColor" => BlendFactor::DstColor,
        "invdstcol" | "oneMinusDstColor" => BlendFactor::OneMinusDstColor,
        "dstalpha" | "dstAlpha" => BlendFactor::DstAlpha,
        "invdstalpha" | "oneMinusDstAlpha" => BlendFactor::OneMinusDstAlpha,
        _ => return None,
    })
}

fn parse_blend_op(value: &str) -> Option<BlendOp> {
    Some(match value {
        "add" => BlendOp::Add,
        "sub" | "subtract" => BlendOp::Subtract,
        "revsub" | "reverseSubtract" => BlendOp::ReverseSubtract,
        "min" => BlendOp::Min,
        "max" => BlendOp::Max,
        _ => return None,
    })
}

fn parse_stencil_op(value: &str) -> Option<StencilOp> {
    Some(match value {
        "keep" => StencilOp::Keep,
        "zero" => StencilOp::Zero,
        "replace" => StencilOp::Replace,
        "incrsat" | "incrementClamp" => StencilOp::IncrementClamp,
        "decrsat" | "decrementClamp" => StencilOp::DecrementClamp,
        "invert" => StencilOp::Invert,
        "incr" | "incrementWrap" => StencilOp::IncrementWrap,
        "decr" | "decrementWrap" => StencilOp::DecrementWrap,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_folds_pairs_into_state() {
        let mut state = RenderState::default();
        state.apply("depthWriteEnable", "false").unwrap();
        state.apply("blendEnable", "true").unwrap();
        state.apply("blendSrc", "one").unwrap();
        state.apply("blendDest", "one").unwrap();
        state.apply("cullMode", "front").unwrap();
        state.apply("colorWriteMask", "rgb").unwrap();
        state.apply("stencilRef", "0x80").unwrap();

        assert!(!state.depth.write);
        assert!(state.blend.enable);
        assert_eq!(state.blend.dst, BlendFactor::One);
        assert_eq!(state.raster.cull, CullMode::Front);
        assert_eq!(state.blend.write_mask, 0b0111);
        assert_eq!(state.stencil.reference, 0x80);
    }

    #[test]
    fn unknown_names_and_bad_values_are_errors() {
        let mut state = RenderState::default();
        assert!(matches!(
            state.apply("depthWobble", "true"),
            Err(MaterialError::UnknownState { .. })
        ));
        assert!(matches!(
            state.apply("depthFunc", "sometimes"),
            Err(MaterialError::InvalidState { .. })
        ));
    }
}
