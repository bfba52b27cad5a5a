//! Command-line driver for the passbake render-pass target allocator.

use std::path::PathBuf;
use std::process::ExitCode;

use glam::Vec3;
use passbake::config::{FrameConfig, PassKind};
use passbake::gpu::pipeline_helpers::InputKind;
use passbake::gpu::{
    Command, RecordingBackend, RenderBackend, RenderContext, Technique,
    VertexLayout, WgpuBackend,
};
use passbake::renderer::{Camera, FrameInputs};
use passbake::{PassEngine, PassbakeError};

struct Args {
    config: PathBuf,
    size: (u32, u32),
    frames: u32,
    gpu: bool,
    schema: bool,
}

const USAGE: &str =
    "Usage: passbake <frame.toml> [--gpu] [--size WxH] [--frames N] [--schema]";

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: PathBuf::new(),
        size: (1280, 720),
        frames: 1,
        gpu: false,
        schema: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--gpu" => args.gpu = true,
            "--schema" => args.schema = true,
            "--size" => {
                let value = it.next().ok_or("--size needs WxH")?;
                let (w, h) = value
                    .split_once('x')
                    .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
                    .ok_or_else(|| format!("bad size '{value}'"))?;
                args.size = (w, h);
            }
            "--frames" => {
                let value = it.next().ok_or("--frames needs a count")?;
                args.frames =
                    value.parse().map_err(|_| format!("bad frame count '{value}'"))?;
            }
            path if !path.starts_with("--") => args.config = PathBuf::from(path),
            other => return Err(format!("unknown flag '{other}'")),
        }
    }
    if args.config.as_os_str().is_empty() && !args.schema {
        return Err(USAGE.to_owned());
    }
    Ok(args)
}

fn frame_inputs(size: (u32, u32)) -> FrameInputs {
    let mut inputs = FrameInputs::new();
    let aspect = size.0 as f32 / size.1.max(1) as f32;
    inputs.set_camera(
        "main_camera",
        Camera::look_at(
            Vec3::new(0.0, 2.0, 6.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_4,
            aspect,
            0.1,
            100.0,
        ),
    );
    inputs
}

fn report<B: RenderBackend>(engine: &PassEngine<B>) {
    if let Some(table) = engine.table() {
        log::info!("{}", table.summary());
    }
    log::info!(
        "{} physical targets, {} KiB, {} state objects, {} pipelines",
        engine.registry().len(),
        engine.registry().memory_bytes() / 1024,
        engine.states().len(),
        engine.states().pipeline_count()
    );
}

fn dry_run(config: FrameConfig, args: &Args) -> Result<(), PassbakeError> {
    let mut engine = PassEngine::new(RecordingBackend::new(), config, args.size)?;
    report(&engine);
    let inputs = frame_inputs(args.size);
    for _ in 0..args.frames {
        let _ = engine.render(&inputs);
    }
    let draws = engine
        .backend()
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Draw(_)))
        .count();
    log::info!("{} frames recorded, {draws} draws", engine.frames());
    Ok(())
}

fn fragment_entry(technique: &str) -> &'static str {
    match technique {
        "threshold" => "fs_threshold",
        "blur" => "fs_blur",
        "composite" => "fs_composite",
        _ => "fs_copy",
    }
}

fn register_techniques(backend: &mut WgpuBackend, config: &FrameConfig) {
    let shader = backend
        .context()
        .device
        .create_shader_module(wgpu::include_wgsl!("../assets/shaders/passes.wgsl"));
    for pass in &config.passes {
        let units = pass.inputs.iter().map(|i| i.unit + 1).max().unwrap_or(0);
        let inputs = vec![InputKind::Float; units as usize];
        let technique = match pass.kind {
            PassKind::Scene => Technique {
                shader: shader.clone(),
                vertex_entry: "vs_scene".to_owned(),
                fragment_entry: "fs_scene".to_owned(),
                inputs,
                vertex_layouts: vec![VertexLayout {
                    stride: 24,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3]
                        .to_vec(),
                }],
            },
            PassKind::Fullscreen => Technique {
                fragment_entry: fragment_entry(&pass.technique).to_owned(),
                ..Technique::fullscreen(shader.clone(), inputs)
            },
        };
        backend.register_technique(&pass.technique, technique);
    }
}

fn gpu_run(config: FrameConfig, args: &Args) -> Result<(), PassbakeError> {
    let context = pollster::block_on(RenderContext::new_headless())
        .map_err(|e| PassbakeError::Device(e.to_string()))?;
    let mut backend = WgpuBackend::new(context, args.size);
    register_techniques(&mut backend, &config);

    let mut engine = PassEngine::new(backend, config, args.size)?;
    report(&engine);
    let inputs = frame_inputs(args.size);
    for _ in 0..args.frames {
        engine.backend_mut().begin_frame(None);
        let _ = engine.render(&inputs);
        engine.backend_mut().end_frame();
    }
    if let Err(e) = engine.backend().context().device.poll(wgpu::PollType::Wait) {
        log::warn!("device poll failed: {e}");
    }
    log::info!("{} frames rendered", engine.frames());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            log::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if args.schema {
        match serde_json::to_string_pretty(&FrameConfig::json_schema()) {
            Ok(schema) => log::info!("{schema}"),
            Err(e) => log::error!("schema serialization failed: {e}"),
        }
        if args.config.as_os_str().is_empty() {
            return ExitCode::SUCCESS;
        }
    }

    let result = FrameConfig::load(&args.config).and_then(|config| {
        if args.gpu {
            gpu_run(config, &args)
        } else {
            dry_run(config, &args)
        }
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}: {e}", args.config.display());
            ExitCode::FAILURE
        }
    }
}
