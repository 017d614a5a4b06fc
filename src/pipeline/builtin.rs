//! Materials the pipeline ships with.
//!
//! Shader bodies are placeholders for the device's compiler; only the
//! declarations matter to the binding layer.

pub const STANDARD: &str = r#"
<material name="standard">
  <parameter name="diffuseColor" type="float4" value="1 1 1 1"/>
  <parameter name="specular" type="float" value="0.5"/>
  <parameter name="roughness" type="float" value="0.5"/>
  <shader name="Standard"><![CDATA[
in vec3 position;
in vec3 normal;
uniform mat4 matModel;
uniform mat4 matViewProject;
uniform vec4 diffuseColor;
uniform float specular;
uniform float roughness;
void vs_main() {}
void fs_main() {}
]]></shader>
  <shader name="Depth"><![CDATA[
in vec3 position;
in vec3 normal;
uniform mat4 matModelViewProject;
void vs_main() {}
void fs_main() {}
]]></shader>
  <shader name="Forward"><![CDATA[
in vec3 position;
in vec3 normal;
uniform mat4 matModel;
uniform mat4 matViewProject;
uniform vec3 cameraPosition;
uniform vec4 diffuseColor;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="GBuffer">
    <pass name="p0">
      <state name="vertex" value="Standard:vs_main"/>
      <state name="fragment" value="Standard:fs_main"/>
    </pass>
  </technique>
  <technique name="Shadow">
    <pass name="p0">
      <state name="vertex" value="Depth:vs_main"/>
      <state name="fragment" value="Depth:fs_main"/>
      <state name="slopeScaleDepthBias" value="1.5"/>
      <state name="colorWriteMask" value="0"/>
    </pass>
  </technique>
  <technique name="ReflectiveShadow">
    <pass name="p0">
      <state name="vertex" value="Standard:vs_main"/>
      <state name="fragment" value="Standard:fs_main"/>
    </pass>
  </technique>
  <technique name="Forward">
    <pass name="p0">
      <state name="vertex" value="Forward:vs_main"/>
      <state name="fragment" value="Forward:fs_main"/>
    </pass>
  </technique>
  <technique name="Specific">
    <pass name="p0">
      <state name="vertex" value="Forward:vs_main"/>
      <state name="fragment" value="Forward:fs_main"/>
      <state name="depthWriteEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="srcalpha"/>
      <state name="blendDest" value="invsrcalpha"/>
    </pass>
  </technique>
</material>
"#;

pub const DEFERRED_LIGHTING: &str = r#"
<material name="deferred_lighting">
  <parameter name="lightColor" type="float3" value="1 1 1"/>
  <parameter name="lightDirection" type="float3" value="0 0 -1"/>
  <parameter name="lightPosition" type="float3" value="0 0 0"/>
  <parameter name="lightAttenuation" type="float3" value="1 0 0"/>
  <parameter name="lightRange" type="float" value="10"/>
  <parameter name="lightSpotAngle" type="float2" value="1 0"/>
  <parameter name="shadowFactor" type="float" value="0"/>
  <parameter name="shadowMatrix" type="float4x4"/>
  <parameter name="shadowMap" type="texture"/>
  <shader name="Light"><![CDATA[
in vec3 position;
in vec3 normal;
uniform mat4 matModelViewProject;
uniform mat4 matViewProjectInverse;
uniform vec2 viewportSize;
uniform sampler2D gbuffer0Map;
uniform sampler2D gbuffer1Map;
uniform sampler2D gbuffer2Map;
uniform sampler2D depthMap;
uniform vec3 lightColor;
uniform vec3 lightDirection;
uniform vec3 lightPosition;
uniform vec3 lightAttenuation;
uniform float lightRange;
uniform vec2 lightSpotAngle;
uniform float shadowFactor;
uniform mat4 shadowMatrix;
uniform sampler2DShadow shadowMap;
void fullscreen_vs() {}
void volume_vs() {}
void sun_fs() {}
void directional_fs() {}
void point_fs() {}
void spot_fs() {}
void ambient_fs() {}
]]></shader>
  <technique name="SunLight">
    <pass name="p0">
      <state name="vertex" value="Light:fullscreen_vs"/>
      <state name="fragment" value="Light:sun_fs"/>
      <state name="depthEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="one"/>
      <state name="blendDest" value="one"/>
    </pass>
  </technique>
  <technique name="DirectionalLight">
    <pass name="p0">
      <state name="vertex" value="Light:fullscreen_vs"/>
      <state name="fragment" value="Light:directional_fs"/>
      <state name="depthEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="one"/>
      <state name="blendDest" value="one"/>
    </pass>
  </technique>
  <technique name="PointLight">
    <pass name="p0">
      <state name="vertex" value="Light:volume_vs"/>
      <state name="fragment" value="Light:point_fs"/>
      <state name="cullMode" value="front"/>
      <state name="depthFunc" value="gequal"/>
      <state name="depthWriteEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="one"/>
      <state name="blendDest" value="one"/>
    </pass>
  </technique>
  <technique name="SpotLight">
    <pass name="p0">
      <state name="vertex" value="Light:volume_vs"/>
      <state name="fragment" value="Light:spot_fs"/>
      <state name="cullMode" value="front"/>
      <state name="depthFunc" value="gequal"/>
      <state name="depthWriteEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="one"/>
      <state name="blendDest" value="one"/>
    </pass>
  </technique>
  <technique name="AmbientLight">
    <pass name="p0">
      <state name="vertex" value="Light:fullscreen_vs"/>
      <state name="fragment" value="Light:ambient_fs"/>
      <state name="depthEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="one"/>
      <state name="blendDest" value="one"/>
    </pass>
  </technique>
</material>
"#;

pub const LINEARIZE_DEPTH: &str = r#"
<material name="linearize_depth">
  <shader name="Linearize"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D depthMap;
uniform float cameraNear;
uniform float cameraFar;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="LinearizeDepth">
    <pass name="p0">
      <state name="vertex" value="Linearize:vs_main"/>
      <state name="fragment" value="Linearize:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;

pub const DEFERRED_SHADING: &str = r#"
<material name="deferred_shading">
  <shader name="Compose"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D gbuffer0Map;
uniform sampler2D gbuffer3Map;
uniform sampler2D lightingMap;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="OpaqueShading">
    <pass name="p0">
      <state name="vertex" value="Compose:vs_main"/>
      <state name="fragment" value="Compose:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;

pub const SPECIFIC_COMPOSITE: &str = r#"
<material name="specific_composite">
  <shader name="Composite"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D transparentShadingMap;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="SpecificPost">
    <pass name="p0">
      <state name="vertex" value="Composite:vs_main"/>
      <state name="fragment" value="Composite:fs_main"/>
      <state name="depthEnable" value="false"/>
      <state name="blendEnable" value="true"/>
      <state name="blendSrc" value="srcalpha"/>
      <state name="blendDest" value="invsrcalpha"/>
    </pass>
  </technique>
</material>
"#;

pub const COPY: &str = r#"
<material name="copy">
  <shader name="Copy"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D sourceMap;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="Copy">
    <pass name="p0">
      <state name="vertex" value="Copy:vs_main"/>
      <state name="fragment" value="Copy:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;

pub const TONEMAP: &str = r#"
<material name="tonemap">
  <parameter name="exposure" type="float" value="1"/>
  <shader name="Tonemap"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D sourceMap;
uniform float exposure;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="PostProcess">
    <pass name="p0">
      <state name="vertex" value="Tonemap:vs_main"/>
      <state name="fragment" value="Tonemap:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;

pub const FXAA: &str = r#"
<material name="fxaa">
  <shader name="Fxaa"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D sourceMap;
uniform vec2 viewportSize;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="PostProcess">
    <pass name="p0">
      <state name="vertex" value="Fxaa:vs_main"/>
      <state name="fragment" value="Fxaa:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;
