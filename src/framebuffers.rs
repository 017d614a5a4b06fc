//! Render targets of the deferred pipeline.
//!
//! Formats are negotiated slot by slot from fixed cascades, so the outcome only
//! depends on what the device reports as supported. Every target is created
//! at the same resolution and they are always replaced together.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{
    self, select_format, Device, DeviceError, FramebufferDesc, FramebufferHandle,
    FramebufferLayoutDesc, FramebufferLayoutHandle, TextureDesc, TextureDim, TextureFormat,
    TextureHandle, TextureUsage,
};

use TextureFormat::*;

pub const DEPTH_CASCADE: &[TextureFormat] = &[D24S8, D16S8, X8D24, D16];
pub const LINEAR_DEPTH_CASCADE: &[TextureFormat] = &[R32F, R16F, RGBA16F];
pub const GBUFFER_CASCADES: [&[TextureFormat]; 4] = [
    &[RGBA8, RGBA16F],
    &[RGB10A2, RGBA16F, RGBA8],
    &[RGBA8, RGBA16F],
    &[RGBA16F, RG11B10F, RGBA8],
];
pub const LIGHTING_CASCADE: &[TextureFormat] = &[RGBA16F, RG11B10F, RGBA8];
pub const SHADING_CASCADE: &[TextureFormat] = &[RGBA16F, RG11B10F, RGBA8];
pub const FINAL_CASCADE: &[TextureFormat] = &[RGBA8, RGB10A2, RGBA16F];

#[derive(Debug, Error)]
pub enum FramebufferError {
    #[error("invalid framebuffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("no supported format for the {slot} target at {width}x{height}")]
    NoSupportedFormat {
        slot: &'static str,
        width: u32,
        height: u32,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Formats picked for every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferFormats {
    pub depth: TextureFormat,
    pub linear_depth: TextureFormat,
    pub gbuffer: [TextureFormat; 4],
    pub lighting: TextureFormat,
    pub shading: TextureFormat,
    pub final_color: TextureFormat,
}

impl fmt::Display for FramebufferFormats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [g0, g1, g2, g3] = self.gbuffer;
        write!(
            f,
            "depth={} linear_depth={} gbuffer=[{g0}, {g1}, {g2}, {g3}] lighting={} shading={} final={}",
            self.depth, self.linear_depth, self.lighting, self.shading, self.final_color
        )
    }
}

/// Negotiates a format for every slot.
pub fn select_formats(
    device: &dyn Device,
    width: u32,
    height: u32,
) -> Result<FramebufferFormats, FramebufferError> {
    let pick = |slot: &'static str, cascade: &[TextureFormat], usage: TextureUsage| {
        select_format(device, cascade, usage, width, height).ok_or(
            FramebufferError::NoSupportedFormat {
                slot,
                width,
                height,
            },
        )
    };
    let color = TextureUsage::COLOR_TARGET;
    Ok(FramebufferFormats {
        depth: pick("depth", DEPTH_CASCADE, TextureUsage::DEPTH_TARGET)?,
        linear_depth: pick("linear depth", LINEAR_DEPTH_CASCADE, color)?,
        gbuffer: [
            pick("gbuffer0", GBUFFER_CASCADES[0], color)?,
            pick("gbuffer1", GBUFFER_CASCADES[1], color)?,
            pick("gbuffer2", GBUFFER_CASCADES[2], color)?,
            pick("gbuffer3", GBUFFER_CASCADES[3], color)?,
        ],
        lighting: pick("lighting", LIGHTING_CASCADE, color)?,
        shading: pick("shading", SHADING_CASCADE, color)?,
        final_color: pick("final", FINAL_CASCADE, color)?,
    })
}

pub(crate) fn create_texture(
    device: &dyn Device,
    label: &str,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> Result<TextureHandle, DeviceError> {
    let usage = if format.is_depth() {
        TextureUsage::DEPTH_TARGET
    } else {
        TextureUsage::COLOR_TARGET
    };
    device.create_texture(&TextureDesc {
        label: label.to_string(),
        width,
        height,
        format,
        usage,
        dim: TextureDim::Texture2D,
    })
}

#[derive(Debug, Default)]
struct Layouts {
    gbuffer: Option<FramebufferLayoutHandle>,
    linear_depth: Option<FramebufferLayoutHandle>,
    lighting: Option<FramebufferLayoutHandle>,
    shading: Option<FramebufferLayoutHandle>,
    color_only: Option<FramebufferLayoutHandle>,
}

#[derive(Debug, Default)]
struct Textures {
    depth: Option<TextureHandle>,
    linear_depth: Option<TextureHandle>,
    gbuffer: [Option<TextureHandle>; 4],
    lighting: Option<TextureHandle>,
    opaque_shading: Option<TextureHandle>,
    transparent_shading: Option<TextureHandle>,
    swap: Option<TextureHandle>,
    final_color: Option<TextureHandle>,
}

#[derive(Debug, Default)]
struct Framebuffers {
    gbuffer: Option<FramebufferHandle>,
    linear_depth: Option<FramebufferHandle>,
    lighting: Option<FramebufferHandle>,
    opaque_shading: Option<FramebufferHandle>,
    transparent_shading: Option<FramebufferHandle>,
    swap: Option<FramebufferHandle>,
    final_color: Option<FramebufferHandle>,
}

/// G-buffer, depth, light accumulation and shading targets of one resolution.
#[derive(Debug, Default)]
pub struct DeferredLightingFramebuffers {
    size: Option<(u32, u32)>,
    formats: Option<FramebufferFormats>,
    layouts: Layouts,
    textures: Textures,
    framebuffers: Framebuffers,
}

impl DeferredLightingFramebuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates every target at `width`x`height`.
    ///
    /// On error nothing created by this call is left alive.
    pub fn setup(
        &mut self,
        device: &dyn Device,
        width: u32,
        height: u32,
    ) -> Result<(), FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::InvalidSize { width, height });
        }
        self.close(device);
        let formats = select_formats(device, width, height)?;
        if let Err(err) = self.create(device, &formats, width, height) {
            self.close(device);
            return Err(err.into());
        }
        self.size = Some((width, height));
        self.formats = Some(formats);
        info!("deferred framebuffers ready at {width}x{height}: {formats}");
        Ok(())
    }

    fn create(
        &mut self,
        device: &dyn Device,
        formats: &FramebufferFormats,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError> {
        let layout = |label: &str, color: Vec<TextureFormat>, depth: Option<TextureFormat>| {
            device.create_framebuffer_layout(&FramebufferLayoutDesc {
                label: label.to_string(),
                color,
                depth,
            })
        };
        let layouts = &mut self.layouts;
        let gbuffer_layout = *layouts
            .gbuffer
            .insert(layout("gbuffer", formats.gbuffer.to_vec(), Some(formats.depth))?);
        let linear_depth_layout = *layouts
            .linear_depth
            .insert(layout("linear_depth", vec![formats.linear_depth], None)?);
        let lighting_layout = *layouts
            .lighting
            .insert(layout("lighting", vec![formats.lighting], Some(formats.depth))?);
        let shading_layout = *layouts
            .shading
            .insert(layout("shading", vec![formats.shading], Some(formats.depth))?);
        let color_only_layout = *layouts
            .color_only
            .insert(layout("color_only", vec![formats.final_color], None)?);

        let texture = |slot: &mut Option<TextureHandle>, label: &str, format: TextureFormat| {
            create_texture(device, label, format, width, height).map(|handle| *slot.insert(handle))
        };
        let textures = &mut self.textures;
        let depth = texture(&mut textures.depth, "depth", formats.depth)?;
        let mut gbuffer = Vec::with_capacity(4);
        for (index, format) in formats.gbuffer.iter().enumerate() {
            gbuffer.push(texture(
                &mut textures.gbuffer[index],
                &format!("gbuffer{index}"),
                *format,
            )?);
        }
        let linear_depth = texture(
            &mut textures.linear_depth,
            "linear_depth",
            formats.linear_depth,
        )?;
        let lighting = texture(&mut textures.lighting, "lighting", formats.lighting)?;
        let opaque = texture(&mut textures.opaque_shading, "opaque_shading", formats.shading)?;
        let transparent = texture(
            &mut textures.transparent_shading,
            "transparent_shading",
            formats.shading,
        )?;
        let swap = texture(&mut textures.swap, "swap", formats.shading)?;
        let final_color = texture(&mut textures.final_color, "final", formats.final_color)?;

        let framebuffer = |slot: &mut Option<FramebufferHandle>,
                           label: &str,
                           layout: FramebufferLayoutHandle,
                           color: Vec<TextureHandle>,
                           depth: Option<TextureHandle>| {
            device
                .create_framebuffer(&FramebufferDesc {
                    label: label.to_string(),
                    layout,
                    color,
                    depth,
                    width,
                    height,
                })
                .map(|handle| {
                    *slot = Some(handle);
                })
        };
        let framebuffers = &mut self.framebuffers;
        framebuffer(
            &mut framebuffers.gbuffer,
            "gbuffer",
            gbuffer_layout,
            gbuffer,
            Some(depth),
        )?;
        framebuffer(
            &mut framebuffers.linear_depth,
            "linear_depth",
            linear_depth_layout,
            vec![linear_depth],
            None,
        )?;
        framebuffer(
            &mut framebuffers.lighting,
            "lighting",
            lighting_layout,
            vec![lighting],
            Some(depth),
        )?;
        framebuffer(
            &mut framebuffers.opaque_shading,
            "opaque_shading",
            shading_layout,
            vec![opaque],
            Some(depth),
        )?;
        framebuffer(
            &mut framebuffers.transparent_shading,
            "transparent_shading",
            shading_layout,
            vec![transparent],
            Some(depth),
        )?;
        framebuffer(
            &mut framebuffers.swap,
            "swap",
            shading_layout,
            vec![swap],
            Some(depth),
        )?;
        framebuffer(
            &mut framebuffers.final_color,
            "final",
            color_only_layout,
            vec![final_color],
            None,
        )?;
        debug!("created deferred framebuffer set");
        Ok(())
    }

    /// Releases every target. Safe to call repeatedly.
    pub fn close(&mut self, device: &dyn Device) {
        let framebuffers = &mut self.framebuffers;
        for handle in [
            &mut framebuffers.gbuffer,
            &mut framebuffers.linear_depth,
            &mut framebuffers.lighting,
            &mut framebuffers.opaque_shading,
            &mut framebuffers.transparent_shading,
            &mut framebuffers.swap,
            &mut framebuffers.final_color,
        ] {
            device::release(device, handle);
        }
        let textures = &mut self.textures;
        for handle in textures.gbuffer.iter_mut() {
            device::release(device, handle);
        }
        for handle in [
            &mut textures.depth,
            &mut textures.linear_depth,
            &mut textures.lighting,
            &mut textures.opaque_shading,
            &mut textures.transparent_shading,
            &mut textures.swap,
            &mut textures.final_color,
        ] {
            device::release(device, handle);
        }
        let layouts = &mut self.layouts;
        for handle in [
            &mut layouts.gbuffer,
            &mut layouts.linear_depth,
            &mut layouts.lighting,
            &mut layouts.shading,
            &mut layouts.color_only,
        ] {
            device::release(device, handle);
        }
        self.size = None;
        self.formats = None;
    }

    pub fn is_setup(&self) -> bool {
        self.size.is_some()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn formats(&self) -> Option<&FramebufferFormats> {
        self.formats.as_ref()
    }

    pub fn depth_texture(&self) -> Option<TextureHandle> {
        self.textures.depth
    }

    pub fn linear_depth_texture(&self) -> Option<TextureHandle> {
        self.textures.linear_depth
    }

    pub fn gbuffer_textures(&self) -> [Option<TextureHandle>; 4] {
        self.textures.gbuffer
    }

    pub fn lighting_texture(&self) -> Option<TextureHandle> {
        self.textures.lighting
    }

    pub fn opaque_shading_texture(&self) -> Option<TextureHandle> {
        self.textures.opaque_shading
    }

    pub fn transparent_shading_texture(&self) -> Option<TextureHandle> {
        self.textures.transparent_shading
    }

    pub fn swap_texture(&self) -> Option<TextureHandle> {
        self.textures.swap
    }

    pub fn final_texture(&self) -> Option<TextureHandle> {
        self.textures.final_color
    }

    pub fn gbuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffers.gbuffer
    }

    pub fn linear_depth(&self) -> Option<FramebufferHandle> {
        self.framebuffers.linear_depth
    }

    pub fn lighting(&self) -> Option<FramebufferHandle> {
        self.framebuffers.lighting
    }

    pub fn opaque_shading(&self) -> Option<FramebufferHandle> {
        self.framebuffers.opaque_shading
    }

    pub fn transparent_shading(&self) -> Option<FramebufferHandle> {
        self.framebuffers.transparent_shading
    }

    pub fn swap(&self) -> Option<FramebufferHandle> {
        self.framebuffers.swap
    }

    pub fn final_color(&self) -> Option<FramebufferHandle> {
        self.framebuffers.final_color
    }

    pub fn gbuffer_layout(&self) -> Option<FramebufferLayoutHandle> {
        self.layouts.gbuffer
    }

    pub fn shading_layout(&self) -> Option<FramebufferLayoutHandle> {
        self.layouts.shading
    }

    pub fn color_only_layout(&self) -> Option<FramebufferLayoutHandle> {
        self.layouts.color_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Capabilities, RecordingDevice};

    #[test]
    fn full_device_picks_the_first_format_of_each_cascade() {
        let device = RecordingDevice::default();
        let formats = select_formats(&device, 800, 600).unwrap();
        assert_eq!(formats.depth, D24S8);
        assert_eq!(formats.linear_depth, R32F);
        assert_eq!(formats.gbuffer, [RGBA8, RGB10A2, RGBA8, RGBA16F]);
        assert_eq!(formats.lighting, RGBA16F);
        assert_eq!(formats.final_color, RGBA8);
    }

    #[test]
    fn negotiation_is_deterministic_and_falls_back() {
        let caps = Capabilities::full().without_formats(&[D24S8, D16S8, R32F, RGBA16F]);
        let first = select_formats(&RecordingDevice::new(caps.clone()), 64, 64).unwrap();
        let second = select_formats(&RecordingDevice::new(caps), 64, 64).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.depth, X8D24);
        assert_eq!(first.linear_depth, R16F);
        assert_eq!(first.lighting, RG11B10F);
    }

    #[test]
    fn missing_cascade_is_an_error() {
        let device = RecordingDevice::new(Capabilities::full().without_formats(DEPTH_CASCADE));
        let err = select_formats(&device, 64, 64).unwrap_err();
        assert!(matches!(err, FramebufferError::NoSupportedFormat { slot: "depth", .. }));
        let mut framebuffers = DeferredLightingFramebuffers::new();
        assert!(framebuffers.setup(&device, 64, 64).is_err());
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn oversized_targets_are_rejected() {
        let device = RecordingDevice::new(Capabilities::full().with_max_texture_size(512));
        assert!(select_formats(&device, 1024, 256).is_err());
    }

    #[test]
    fn setup_creates_every_target_at_one_size() {
        let device = RecordingDevice::default();
        let mut framebuffers = DeferredLightingFramebuffers::new();
        framebuffers.setup(&device, 800, 600).unwrap();
        assert_eq!(framebuffers.size(), Some((800, 600)));
        assert_eq!(device.live_framebuffers().len(), 7);
        assert!(device
            .live_textures()
            .iter()
            .all(|(_, desc)| (desc.width, desc.height) == (800, 600)));
        assert!(framebuffers.gbuffer_textures().iter().all(Option::is_some));
    }

    #[test]
    fn every_failure_point_leaves_nothing_alive() {
        let baseline = RecordingDevice::default();
        DeferredLightingFramebuffers::new()
            .setup(&baseline, 32, 32)
            .unwrap();
        let total = baseline.successful_creations();

        for successes in 0..total {
            let device = RecordingDevice::default();
            device.fail_after(successes);
            let mut framebuffers = DeferredLightingFramebuffers::new();
            assert!(framebuffers.setup(&device, 32, 32).is_err());
            assert_eq!(device.live_count(), 0, "failure after {successes}");
            assert!(!framebuffers.is_setup());
        }
    }

    #[test]
    fn zero_size_is_invalid() {
        let device = RecordingDevice::default();
        let mut framebuffers = DeferredLightingFramebuffers::new();
        assert!(matches!(
            framebuffers.setup(&device, 0, 600),
            Err(FramebufferError::InvalidSize { .. })
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let device = RecordingDevice::default();
        let mut framebuffers = DeferredLightingFramebuffers::new();
        framebuffers.setup(&device, 16, 16).unwrap();
        framebuffers.close(&device);
        framebuffers.close(&device);
        assert_eq!(device.live_count(), 0);
        assert_eq!(framebuffers.opaque_shading(), None);
    }
}
