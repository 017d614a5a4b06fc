//! Material file loader.
//!
//! ```xml
//! <material name="standard">
//!   <parameter name="diffuseColor" type="float4" value="1 1 1 1"/>
//!   <buffer name="Object">
//!     <parameter name="matModel" type="float4x4" semantic="matModel"/>
//!   </buffer>
//!   <sampler name="diffuseMap"/>
//!   <shader name="Standard"><![CDATA[ ... ]]></shader>
//!   <technique name="GBuffer">
//!     <pass name="p0">
//!       <state name="vertex" value="Standard:vs_main"/>
//!       <state name="fragment" value="Standard"/>
//!       <state name="cullMode" value="back"/>
//!     </pass>
//!   </technique>
//! </material>
//! ```

use std::collections::HashMap;

use log::trace;
use roxmltree::{Document, Node};

use super::{
    reflect_program, Material, MaterialError, MaterialParam, MaterialPass, ParamType, ParamValue,
    RenderState, Semantic, Technique,
};
use crate::device::{ShaderSource, ShaderStage};

impl Material {
    /// Parses a material document.
    pub fn from_xml(xml: &str) -> Result<Self, MaterialError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("material") {
            return Err(MaterialError::InvalidDocument(format!(
                "expected <material>, found <{}>",
                root.tag_name().name()
            )));
        }
        let mut material = Material::new(required_attribute(&root, "name")?);
        let mut shaders = HashMap::new();

        for node in root.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "parameter" => {
                    material.add_param(parse_parameter(&node)?);
                }
                "buffer" => {
                    let buffer = required_attribute(&node, "name")?;
                    for child in node.children().filter(|child| child.has_tag_name("parameter")) {
                        let param = material.add_param(parse_parameter(&child)?);
                        material.add_buffer_member(buffer, param.name());
                    }
                }
                "sampler" => {
                    let name = required_attribute(&node, "name")?;
                    material.add_param(MaterialParam::new(name, ParamType::Texture));
                }
                "shader" => {
                    let name = required_attribute(&node, "name")?;
                    let source: String = node
                        .children()
                        .filter_map(|child| child.text())
                        .collect();
                    shaders.insert(name.to_string(), source);
                }
                "technique" => {}
                other => {
                    return Err(MaterialError::InvalidDocument(format!(
                        "unexpected <{other}> in material {}",
                        material.name()
                    )))
                }
            }
        }

        for node in root.children().filter(|node| node.has_tag_name("technique")) {
            let technique = parse_technique(&node, material.name(), &shaders)?;
            material.add_technique(technique);
        }
        trace!(
            "parsed material {} ({} parameter(s))",
            material.name(),
            material.params().len()
        );
        Ok(material)
    }
}

fn required_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str, MaterialError> {
    node.attribute(name).ok_or_else(|| {
        MaterialError::InvalidDocument(format!(
            "<{}> is missing the {name} attribute",
            node.tag_name().name()
        ))
    })
}

fn parse_parameter(node: &Node<'_, '_>) -> Result<MaterialParam, MaterialError> {
    let name = required_attribute(node, "name")?;
    let ty_name = required_attribute(node, "type")?;
    let ty = ParamType::parse(ty_name).ok_or_else(|| MaterialError::UnknownType {
        name: name.to_string(),
        ty: ty_name.to_string(),
    })?;
    let mut param = MaterialParam::new(name, ty);
    if let Some(semantic) = node.attribute("semantic") {
        let semantic = Semantic::from_name(semantic).ok_or_else(|| {
            MaterialError::InvalidDocument(format!("unknown semantic {semantic} on {name}"))
        })?;
        param = param.with_semantic(semantic);
    }
    if let Some(value) = node.attribute("value") {
        param = param.with_value(ParamValue::parse(ty, value)?)?;
    }
    Ok(param)
}

fn parse_technique(
    node: &Node<'_, '_>,
    material: &str,
    shaders: &HashMap<String, String>,
) -> Result<Technique, MaterialError> {
    let name = required_attribute(node, "name")?;
    let passes = node
        .children()
        .filter(|child| child.has_tag_name("pass"))
        .enumerate()
        .map(|(index, pass)| {
            let pass_name = pass
                .attribute("name")
                .map_or_else(|| format!("p{index}"), str::to_string);
            parse_pass(&pass, &format!("{material}/{name}/{pass_name}"), shaders)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Technique::new(name, passes))
}

fn parse_pass(
    node: &Node<'_, '_>,
    label: &str,
    shaders: &HashMap<String, String>,
) -> Result<MaterialPass, MaterialError> {
    let mut state = RenderState::default();
    let mut stages = Vec::new();
    for child in node.children().filter(|child| child.has_tag_name("state")) {
        let name = required_attribute(&child, "name")?;
        let value = required_attribute(&child, "value")?;
        match ShaderStage::from_state_name(name) {
            Some(stage) => {
                let (block, entry) = value.split_once(':').unwrap_or((value, "main"));
                let source = shaders
                    .get(block)
                    .ok_or_else(|| MaterialError::MissingShader(block.to_string()))?;
                stages.push(ShaderSource {
                    stage,
                    entry: entry.to_string(),
                    source: source.clone(),
                });
            }
            None => state.apply(name, value)?,
        }
    }
    if !stages.iter().any(|source| source.stage == ShaderStage::Vertex) {
        return Err(MaterialError::InvalidDocument(format!(
            "pass {label} has no vertex shader"
        )));
    }
    let program = reflect_program(label, stages)?;
    Ok(MaterialPass::new(label, program, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::CullMode;

    const DOCUMENT: &str = r#"
<material name="glass">
  <parameter name="tint" type="float3" value="0.2 0.4 0.6"/>
  <buffer name="Object">
    <parameter name="matModel" type="float4x4" semantic="matModel"/>
  </buffer>
  <sampler name="normalMap"/>
  <shader name="Glass"><![CDATA[
    in vec3 position;
    in vec3 normal;
    uniform mat4 matModel;
    uniform mat4 matViewProject;
    uniform vec3 tint;
    uniform sampler2D normalMap;
    void main() {}
  ]]></shader>
  <technique name="Specific">
    <pass name="front">
      <state name="vertex" value="Glass:vs_main"/>
      <state name="fragment" value="Glass:fs_main"/>
      <state name="cullMode" value="front"/>
      <state name="blendEnable" value="true"/>
    </pass>
  </technique>
</material>
"#;

    #[test]
    fn parses_parameters_samplers_and_passes() {
        let material = Material::from_xml(DOCUMENT).unwrap();
        assert_eq!(material.name(), "glass");
        assert_eq!(
            material.param("tint").unwrap().value(),
            ParamValue::Float3(glam::Vec3::new(0.2, 0.4, 0.6))
        );
        assert_eq!(
            material.param("matModel").unwrap().semantic(),
            Some(Semantic::ModelMatrix)
        );
        assert_eq!(material.buffer_members("Object"), ["matModel".to_string()]);
        assert_eq!(material.param("normalMap").unwrap().ty(), ParamType::Texture);

        let technique = material.technique("Specific").unwrap();
        let pass = &technique.passes()[0];
        assert_eq!(pass.name(), "glass/Specific/front");
        assert_eq!(pass.state().raster.cull, CullMode::Front);
        assert!(pass.state().blend.enable);
        assert_eq!(pass.program().stages[0].entry, "vs_main");
        assert_eq!(pass.program().uniforms.len(), 4);
        assert_eq!(pass.input_layout().stride, 24);
    }

    #[test]
    fn missing_shader_block_is_an_error() {
        let xml = r#"
<material name="m">
  <technique name="T"><pass><state name="vertex" value="Nope"/></pass></technique>
</material>"#;
        assert!(matches!(
            Material::from_xml(xml),
            Err(MaterialError::MissingShader(name)) if name == "Nope"
        ));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(
            Material::from_xml("<material"),
            Err(MaterialError::Xml(_))
        ));
        assert!(matches!(
            Material::from_xml("<scene/>"),
            Err(MaterialError::InvalidDocument(_))
        ));
        let bad_value = r#"<material name="m"><parameter name="a" type="float2" value="1"/></material>"#;
        assert!(matches!(
            Material::from_xml(bad_value),
            Err(MaterialError::InvalidValue { .. })
        ));
    }
}
