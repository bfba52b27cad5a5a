//! Per-frame walk over a baked [`PassTable`].
//!
//! Every handle was resolved at bake time, so a frame is a flat sequence of
//! bind and draw calls. Nothing here allocates or creates GPU objects.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use super::pass_table::{PassDescriptor, PassDraw, PassTable};
use crate::gpu::{PassConstants, RenderBackend};

/// A named view the scene passes can render from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub proj: Mat4,
}

impl Camera {
    /// Right-handed perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        fovy: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            proj: Mat4::perspective_rh(fovy, aspect, znear, zfar),
        }
    }

    /// Combined view-projection.
    #[must_use]
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

/// Per-frame data the executor reads but does not own.
#[derive(Debug, Clone, Default)]
pub struct FrameInputs {
    cameras: FxHashMap<String, Camera>,
}

impl FrameInputs {
    /// No cameras.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the camera called `name`.
    pub fn set_camera(&mut self, name: &str, camera: Camera) {
        if let Some(existing) = self.cameras.get_mut(name) {
            *existing = camera;
        } else {
            let _ = self.cameras.insert(name.to_owned(), camera);
        }
    }

    /// The camera called `name`.
    #[must_use]
    pub fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.get(name)
    }
}

/// Constants for one pass: the named camera for scene passes, a pixel-space
/// orthographic projection for full-screen passes, plus the kernel and
/// parameters resolved at bake time.
#[must_use]
pub fn pass_constants(pass: &PassDescriptor, inputs: &FrameInputs) -> PassConstants {
    let (w, h) = (pass.size.0 as f32, pass.size.1 as f32);
    let view_proj = match &pass.draw {
        PassDraw::Scene { camera, .. } => camera
            .as_deref()
            .and_then(|name| inputs.camera(name))
            .map_or(Mat4::IDENTITY, Camera::view_proj),
        PassDraw::Fullscreen => Mat4::orthographic_rh(0.0, w, h, 0.0, 0.0, 1.0),
    };
    PassConstants {
        view_proj: view_proj.to_cols_array_2d(),
        viewport: [
            pass.viewport.x,
            pass.viewport.y,
            pass.viewport.width,
            pass.viewport.height,
        ],
        texel: [1.0 / w, 1.0 / h, w, h],
        kernel: pass.kernel.info,
        taps: pass.kernel.taps,
        parameters: pass.parameters,
    }
}

/// Submits baked passes to a backend.
#[derive(Debug, Default)]
pub struct FrameExecutor {
    frames: u64,
}

impl FrameExecutor {
    /// A fresh executor.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: 0 }
    }

    /// Submit every pass of `table` in order. Returns the number of passes
    /// drawn.
    pub fn execute<B: RenderBackend + ?Sized>(
        &mut self,
        table: &PassTable,
        inputs: &FrameInputs,
        backend: &mut B,
    ) -> usize {
        for pass in &table.passes {
            backend.bind_targets(
                &pass.colour,
                pass.depth_handle(),
                &pass.clear,
                pass.viewport,
            );
            for input in &pass.inputs {
                backend.bind_texture(input.handle, input.sampler, input.unit);
            }
            backend.bind_pipeline(pass.pipeline);
            backend.set_constants(&pass_constants(pass, inputs));
            backend.draw(pass.draw_kind());
        }
        self.frames += 1;
        table.passes.len()
    }

    /// Frames executed so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::BLOOM_TOML;
    use crate::config::FrameConfig;
    use crate::gpu::{Command, GpuHandle, RecordedDraw, RecordingBackend, SceneFlags};
    use crate::renderer::allocator::VirtualTargets;
    use crate::renderer::bake::bake;
    use crate::renderer::registry::TargetRegistry;
    use crate::renderer::state_cache::StateCache;

    fn bloom_table(backend: &mut RecordingBackend) -> PassTable {
        let config = FrameConfig::from_toml_str(BLOOM_TOML).unwrap();
        let mut registry =
            TargetRegistry::from_config(&config.targets, (1280, 720), backend)
                .unwrap();
        let mut states = StateCache::from_config(&config, backend).unwrap();
        let mut virtuals = VirtualTargets::new();
        bake(
            &config,
            &mut registry,
            &mut virtuals,
            &mut states,
            backend,
            1,
        )
        .unwrap()
    }

    #[test]
    fn commands_follow_bind_order() {
        let mut backend = RecordingBackend::new();
        let table = bloom_table(&mut backend);
        let mut executor = FrameExecutor::new();
        let drawn = executor.execute(&table, &FrameInputs::new(), &mut backend);
        assert_eq!(drawn, 5);
        assert_eq!(executor.frames(), 1);

        let commands = backend.take_commands();
        // 5 passes x (targets, pipeline, constants, draw) + 5 inputs.
        assert_eq!(commands.len(), 5 * 4 + 5);

        let composite = &table.passes[4];
        let tail = &commands[commands.len() - 6..];
        assert!(matches!(
            &tail[0],
            Command::BindTargets { colour, depth: None, .. }
                if colour == &vec![GpuHandle::BACK_BUFFER_COLOUR]
        ));
        assert_eq!(
            tail[1],
            Command::BindTexture {
                texture: composite.inputs[0].handle,
                sampler: composite.inputs[0].sampler,
                unit: 0,
            }
        );
        assert!(matches!(tail[2], Command::BindTexture { unit: 1, .. }));
        assert_eq!(tail[3], Command::BindPipeline(composite.pipeline));
        assert!(matches!(tail[4], Command::SetConstants(_)));
        assert_eq!(tail[5], Command::Draw(RecordedDraw::Fullscreen));
    }

    #[test]
    fn scene_pass_draws_filtered_geometry_from_its_camera() {
        let mut backend = RecordingBackend::new();
        let table = bloom_table(&mut backend);
        let camera = Camera::look_at(
            Vec3::new(0.0, 2.0, 5.0),
            Vec3::ZERO,
            1.0,
            16.0 / 9.0,
            0.1,
            100.0,
        );
        let mut inputs = FrameInputs::new();
        inputs.set_camera("main_camera", camera);

        let _ = FrameExecutor::new().execute(&table, &inputs, &mut backend);
        let commands = backend.take_commands();
        assert_eq!(
            commands[3],
            Command::Draw(RecordedDraw::Scene {
                flags: SceneFlags::OPAQUE | SceneFlags::FORWARD_LIT,
                camera: Some("main_camera".to_owned()),
            })
        );
        match commands[2] {
            Command::SetConstants(c) => {
                assert_eq!(c.view_proj, camera.view_proj().to_cols_array_2d());
                assert_eq!(c.texel[2..], [1280.0, 720.0]);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fullscreen_constants_map_pixels_to_clip_space() {
        let mut backend = RecordingBackend::new();
        let table = bloom_table(&mut backend);
        let bright = table.pass("bright_pass").unwrap();
        let constants = pass_constants(bright, &FrameInputs::new());
        let m = Mat4::from_cols_array_2d(&constants.view_proj);
        let corner = m.project_point3(Vec3::new(640.0, 360.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y + 1.0).abs() < 1e-5);
        assert_eq!(constants.texel, [1.0 / 640.0, 1.0 / 360.0, 640.0, 360.0]);
    }

    #[test]
    fn missing_camera_falls_back_to_identity() {
        let mut backend = RecordingBackend::new();
        let table = bloom_table(&mut backend);
        let constants = pass_constants(&table.passes[0], &FrameInputs::new());
        assert_eq!(constants.view_proj, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn authored_constants_reach_the_upload() {
        let mut backend = RecordingBackend::new();
        let table = bloom_table(&mut backend);
        let bright = pass_constants(table.pass("bright_pass").unwrap(), &FrameInputs::new());
        assert_eq!(bright.parameters[0], [0.8, 1.0, 0.0, 0.0]);
        assert_eq!(bright.kernel, [0.0; 4]);

        let blur_y = pass_constants(table.pass("blur_y").unwrap(), &FrameInputs::new());
        assert_eq!(blur_y.kernel, [0.0, 1.0, 5.0, 0.0]);
        assert_eq!(blur_y.taps[1][0], 1.0);
        assert!((blur_y.taps[1][1] - 0.194_594_6).abs() < 1e-6);
    }
}
