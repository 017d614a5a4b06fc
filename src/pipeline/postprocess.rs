use std::sync::Arc;

use crate::device::{Device, FramebufferHandle, RenderTarget, Stage, TextureHandle};
use crate::material::{Material, Semantic};

use super::{builtin, FrameContext, PipelineError};

/// Technique every material-driven effect must provide.
pub const POST_PROCESS_TECHNIQUE: &str = "PostProcess";

/// One link of the post-process chain.
///
/// Each effect reads `source` and writes the whole of `target`; the pipeline
/// alternates targets between effects.
pub trait PostProcess: Send {
    fn name(&self) -> &str;

    fn setup(&mut self, device: &Arc<dyn Device>) -> Result<(), PipelineError>;

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: TextureHandle,
        target: FramebufferHandle,
    ) -> Result<(), PipelineError>;

    fn close(&mut self, device: &dyn Device);
}

/// Full-screen effect driven by a material's `PostProcess` technique.
pub struct MaterialPostProcess {
    material: Material,
}

impl MaterialPostProcess {
    pub fn from_material(material: Material) -> Result<Self, PipelineError> {
        if !material.has_technique(POST_PROCESS_TECHNIQUE) {
            return Err(PipelineError::MissingTechnique {
                material: material.name().to_string(),
                technique: POST_PROCESS_TECHNIQUE.to_string(),
            });
        }
        Ok(Self { material })
    }

    pub fn tonemap() -> Result<Self, PipelineError> {
        Self::from_material(Material::from_xml(builtin::TONEMAP)?)
    }

    pub fn fxaa() -> Result<Self, PipelineError> {
        Self::from_material(Material::from_xml(builtin::FXAA)?)
    }

    pub fn material(&self) -> &Material {
        &self.material
    }
}

impl PostProcess for MaterialPostProcess {
    fn name(&self) -> &str {
        self.material.name()
    }

    fn setup(&mut self, device: &Arc<dyn Device>) -> Result<(), PipelineError> {
        self.material.setup(device)?;
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: TextureHandle,
        target: FramebufferHandle,
    ) -> Result<(), PipelineError> {
        ctx.semantics.set_texture(Semantic::SourceMap, Some(source));
        let viewport = ctx.full_viewport();
        let material = &mut self.material;
        ctx.pass(
            Stage::PostProcess,
            RenderTarget::Framebuffer(target),
            None,
            viewport,
            |ctx| ctx.draw_fullscreen(material, POST_PROCESS_TECHNIQUE),
        )
    }

    fn close(&mut self, device: &dyn Device) {
        self.material.close(device);
    }
}

/// Builds one of the built-in effects by name.
pub fn post_process_from_name(name: &str) -> Result<Box<dyn PostProcess>, PipelineError> {
    let effect = match name {
        "tonemap" => MaterialPostProcess::tonemap()?,
        "fxaa" => MaterialPostProcess::fxaa()?,
        other => return Err(PipelineError::UnknownPostProcess(other.to_string())),
    };
    Ok(Box::new(effect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_effects_resolve_by_name() {
        assert_eq!(post_process_from_name("tonemap").unwrap().name(), "tonemap");
        assert_eq!(post_process_from_name("fxaa").unwrap().name(), "fxaa");
        assert!(matches!(
            post_process_from_name("vignette"),
            Err(PipelineError::UnknownPostProcess(_))
        ));
    }

    #[test]
    fn material_without_post_technique_is_rejected() {
        let material = Material::from_xml(builtin::COPY).unwrap();
        assert!(matches!(
            MaterialPostProcess::from_material(material),
            Err(PipelineError::MissingTechnique { technique, .. }) if technique == "PostProcess"
        ));
    }
}
