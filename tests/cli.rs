use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const SCENE: &str = r#"<scene>
  <object>
    <name>MainCamera</name>
    <type>camera</type>
    <position>0 2 6</position>
    <rotation>-15 0 0</rotation>
  </object>
  <object>
    <name>Cube</name>
    <type>cube</type>
    <color>255 0 0</color>
  </object>
  <object>
    <name>Glass</name>
    <type>sphere</type>
    <queue>transparent</queue>
    <position>1.5 0 0</position>
  </object>
  <light>
    <name>Sun</name>
    <type>directional</type>
    <position>2 6 3</position>
    <direction>-2 -6 -3</direction>
    <shadow>hard</shadow>
  </light>
</scene>
"#;

const VIGNETTE: &str = r#"<material name="vignette">
  <parameter name="strength" type="float" value="0.4"/>
  <shader name="Vignette"><![CDATA[
in vec3 position;
in vec3 normal;
uniform sampler2D sourceMap;
uniform vec2 viewportSize;
uniform float strength;
void vs_main() {}
void fs_main() {}
]]></shader>
  <technique name="PostProcess">
    <pass name="p0">
      <state name="vertex" value="Vignette:vs_main"/>
      <state name="fragment" value="Vignette:fs_main"/>
      <state name="depthEnable" value="false"/>
    </pass>
  </technique>
</material>
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp file");
    tmp.write_all(contents.as_bytes()).expect("write temp file");
    tmp
}

#[test]
fn cli_renders_a_frame_and_releases_everything() {
    let scene = write_temp(SCENE);
    let mut cmd = Command::cargo_bin("crystal-render").expect("binary exists");
    cmd.arg(scene.path()).arg("--size").arg("800x600");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 3 objects (1 lights)"))
        .stdout(contains(" - Cube (cube)"))
        .stdout(contains(" - MainCamera (camera)"))
        .stdout(contains("Framebuffer formats: depth=D24S8"))
        .stdout(contains("Post-process chain: [tonemap]"))
        .stdout(contains(" - Shadow -> framebuffer #"))
        .stdout(contains(" - OpaqueGeometry -> framebuffer #"))
        .stdout(contains(" - LightAccumulation -> framebuffer #"))
        .stdout(contains(" - SpecificShading -> framebuffer #"))
        .stdout(contains(" - Present -> screen"))
        .stdout(contains("Live resources after shutdown: 0"));
}

#[test]
fn cli_uses_material_post_process_and_resizes() {
    let scene = write_temp(SCENE);
    let material = write_temp(VIGNETTE);
    let mut cmd = Command::cargo_bin("crystal-render").expect("binary exists");
    cmd.arg(scene.path())
        .arg("--material")
        .arg(material.path())
        .arg("--post")
        .arg("vignette")
        .arg("--post")
        .arg("fxaa")
        .arg("--no-shadows")
        .arg("--resize")
        .arg("640x480");
    cmd.assert()
        .success()
        .stdout(contains("Loaded material vignette (1 technique(s))"))
        .stdout(contains("Post-process chain: [vignette, fxaa]"))
        .stdout(contains("Resized to 640x480"))
        .stdout(contains("Live resources after shutdown: 0"))
        .stdout(contains(" - Shadow ->").not());
}

#[test]
fn cli_rejects_unknown_post_process() {
    let scene = write_temp(SCENE);
    let mut cmd = Command::cargo_bin("crystal-render").expect("binary exists");
    cmd.arg(scene.path()).arg("--post").arg("bloom");
    cmd.assert()
        .failure()
        .stderr(contains("unknown post-process \"bloom\""));
}

#[test]
fn cli_prints_usage_without_arguments() {
    let mut cmd = Command::cargo_bin("crystal-render").expect("binary exists");
    cmd.assert()
        .failure()
        .stderr(contains("Usage: crystal-render <scene.xml>"));
}
