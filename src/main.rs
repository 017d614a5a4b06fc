use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;

use crystal_render::app::{camera_from_objects, load_materials, print_frame};
use crystal_render::{
    post_process_from_name, Device, MaterialLibrary, MaterialPostProcess, PipelineSettings,
    PostProcess, RecordingDevice, RenderPipeline, Scene,
};

const USAGE: &str = "Usage: crystal-render <scene.xml> [--material FILE]... [--size WxH] \
                     [--resize WxH] [--post NAME]... [--no-shadows]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path))?;
    let mut scene = Scene::from_xml(&xml).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.lights.len()
    );
    for object in &scene.objects {
        println!(" - {} ({})", object.name, object.object_type);
    }

    let mut materials = load_materials(&options.materials)?;
    let post_process = build_post_process(&options.post, &mut materials)?;

    let (width, height) = options.size;
    let settings = PipelineSettings {
        width,
        height,
        shadows: options.shadows,
        post_process: Vec::new(),
        ..PipelineSettings::default()
    };
    let recording = Arc::new(RecordingDevice::default());
    let device: Arc<dyn Device> = recording.clone();
    let mut pipeline = RenderPipeline::new(Arc::clone(&device), settings)?;
    for effect in post_process {
        pipeline.add_post_process(effect)?;
    }
    pipeline.setup().context("failed to set up the render pipeline")?;
    if let Some(formats) = pipeline.framebuffers().formats() {
        println!("Framebuffer formats: {formats}");
    }
    println!("Post-process chain: [{}]", pipeline.post_process_names().join(", "));

    pipeline.prepare_scene(&mut scene)?;
    let mut camera = camera_from_objects(&scene.objects, width as f32 / height as f32);
    recording.take_commands();
    pipeline.render(&scene, &mut materials, &camera)?;
    print_frame(&recording.take_commands());

    if let Some((width, height)) = options.resize {
        pipeline.set_resolution(width, height)?;
        camera.set_ratio(width as f32 / height as f32);
        camera.set_viewport(Default::default());
        info!("re-rendering at {width}x{height}");
        pipeline.render(&scene, &mut materials, &camera)?;
        println!("Resized to {width}x{height}");
        print_frame(&recording.take_commands());
    }

    scene.close(device.as_ref());
    materials.close(device.as_ref());
    pipeline.close();
    println!("Live resources after shutdown: {}", recording.live_count());
    Ok(())
}

/// Resolves `--post` names against loaded materials first, then the built-ins.
/// Without any `--post` the default chain is used.
fn build_post_process(
    names: &[String],
    materials: &mut MaterialLibrary,
) -> Result<Vec<Box<dyn PostProcess>>> {
    let names = if names.is_empty() {
        PipelineSettings::default().post_process
    } else {
        names.to_vec()
    };
    names
        .iter()
        .map(|name| -> Result<Box<dyn PostProcess>> {
            match materials.remove(name) {
                Some(material) => Ok(Box::new(MaterialPostProcess::from_material(material)?)),
                None => Ok(post_process_from_name(name)?),
            }
        })
        .collect()
}

struct CliOptions {
    path: String,
    materials: Vec<String>,
    size: (u32, u32),
    resize: Option<(u32, u32)>,
    post: Vec<String>,
    shadows: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            path,
            materials: Vec::new(),
            size: (1280, 720),
            resize: None,
            post: Vec::new(),
            shadows: true,
        };
        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow!("{arg} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--material" => options.materials.push(value()?),
                "--post" => options.post.push(value()?),
                "--size" => options.size = parse_size(&value()?)?,
                "--resize" => options.resize = Some(parse_size(&value()?)?),
                "--no-shadows" => options.shadows = false,
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once(|c: char| c.eq_ignore_ascii_case(&'x'))
        .ok_or_else(|| anyhow!("expected WxH, got {value:?}"))?;
    let width = width.trim().parse().with_context(|| format!("invalid width in {value:?}"))?;
    let height = height
        .trim()
        .parse()
        .with_context(|| format!("invalid height in {value:?}"))?;
    Ok((width, height))
}
