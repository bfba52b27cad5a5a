//! A backend that records instead of rendering.
//!
//! Hands out sequential handles, keeps every live object's description, and
//! logs the executor's command stream so bakes and frames can be inspected
//! without a GPU. Creation failures can be injected per format.

use rustc_hash::{FxHashMap, FxHashSet};

use super::backend::{
    BackendError, ClearValues, DrawKind, GpuHandle, PassConstants,
    PipelineDesc, PixelRect, RenderBackend, SceneFlags, TargetDesc,
};
use crate::config::{RenderState, TargetFormat};

/// A recorded draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedDraw {
    /// Full-screen triangle.
    Fullscreen,
    /// Scene geometry.
    Scene {
        /// Geometry filter.
        flags: SceneFlags,
        /// Camera name.
        camera: Option<String>,
    },
}

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `bind_targets`.
    BindTargets {
        /// Colour outputs.
        colour: Vec<GpuHandle>,
        /// Depth output.
        depth: Option<GpuHandle>,
        /// Clear values.
        clear: ClearValues,
        /// Viewport in texels.
        viewport: PixelRect,
    },
    /// `bind_texture`.
    BindTexture {
        /// Sampled target.
        texture: GpuHandle,
        /// Sampler state.
        sampler: GpuHandle,
        /// Texture unit.
        unit: u32,
    },
    /// `bind_pipeline`.
    BindPipeline(GpuHandle),
    /// `set_constants`.
    SetConstants(PassConstants),
    /// `draw`.
    Draw(RecordedDraw),
}

/// A live state or pipeline object.
#[derive(Debug, Clone, PartialEq)]
pub enum StateRecord {
    /// Fixed-function state.
    State(RenderState),
    /// Pipeline state object.
    Pipeline(PipelineDesc),
}

/// Headless [`RenderBackend`] that records everything it is asked to do.
#[derive(Debug)]
pub struct RecordingBackend {
    next_handle: u32,
    targets: FxHashMap<GpuHandle, TargetDesc>,
    states: FxHashMap<GpuHandle, StateRecord>,
    commands: Vec<Command>,
    failing_formats: FxHashSet<TargetFormat>,
    max_dimension: u32,
    targets_created: usize,
    targets_destroyed: usize,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// An empty backend accepting targets up to 16384 texels per side.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            targets: FxHashMap::default(),
            states: FxHashMap::default(),
            commands: Vec::new(),
            failing_formats: FxHashSet::default(),
            max_dimension: 16384,
            targets_created: 0,
            targets_destroyed: 0,
        }
    }

    /// Make every future `create_target` of `format` fail.
    pub fn fail_format(&mut self, format: TargetFormat) {
        let _ = self.failing_formats.insert(format);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&mut self) {
        self.failing_formats.clear();
    }

    /// Description of a live target.
    #[must_use]
    pub fn target(&self, handle: GpuHandle) -> Option<&TargetDesc> {
        self.targets.get(&handle)
    }

    /// Number of live targets.
    #[must_use]
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Number of live state and pipeline objects.
    #[must_use]
    pub fn live_states(&self) -> usize {
        self.states.len()
    }

    /// Description of a live state or pipeline object.
    #[must_use]
    pub fn state(&self, handle: GpuHandle) -> Option<&StateRecord> {
        self.states.get(&handle)
    }

    /// Targets created over the backend's lifetime.
    #[must_use]
    pub fn targets_created(&self) -> usize {
        self.targets_created
    }

    /// Targets destroyed over the backend's lifetime.
    #[must_use]
    pub fn targets_destroyed(&self) -> usize {
        self.targets_destroyed
    }

    /// Commands recorded since the last [`take_commands`](Self::take_commands).
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the recorded commands.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn allocate(&mut self) -> GpuHandle {
        let handle = GpuHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl RenderBackend for RecordingBackend {
    fn create_target(
        &mut self,
        desc: &TargetDesc,
    ) -> Result<GpuHandle, BackendError> {
        if self.failing_formats.contains(&desc.format) {
            return Err(BackendError::UnsupportedFormat(desc.format));
        }
        if desc.width == 0
            || desc.height == 0
            || desc.width > self.max_dimension
            || desc.height > self.max_dimension
        {
            return Err(BackendError::InvalidDescriptor(format!(
                "{}: {}x{} outside 1..={}",
                desc.label, desc.width, desc.height, self.max_dimension
            )));
        }
        let handle = self.allocate();
        let _ = self.targets.insert(handle, desc.clone());
        self.targets_created += 1;
        Ok(handle)
    }

    fn destroy_target(&mut self, handle: GpuHandle) {
        if handle.is_back_buffer() {
            return;
        }
        if self.targets.remove(&handle).is_some() {
            self.targets_destroyed += 1;
        } else {
            log::warn!("destroy of unknown target {handle}");
        }
    }

    fn create_state(
        &mut self,
        state: &RenderState,
    ) -> Result<GpuHandle, BackendError> {
        let handle = self.allocate();
        let _ = self.states.insert(handle, StateRecord::State(*state));
        Ok(handle)
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
    ) -> Result<GpuHandle, BackendError> {
        for state in [desc.raster, desc.blend, desc.depth_stencil] {
            if !self.states.contains_key(&state) {
                return Err(BackendError::StaleHandle(state));
            }
        }
        let handle = self.allocate();
        let _ = self
            .states
            .insert(handle, StateRecord::Pipeline(desc.clone()));
        Ok(handle)
    }

    fn destroy_state(&mut self, handle: GpuHandle) {
        if self.states.remove(&handle).is_none() {
            log::warn!("destroy of unknown state {handle}");
        }
    }

    fn bind_targets(
        &mut self,
        colour: &[GpuHandle],
        depth: Option<GpuHandle>,
        clear: &ClearValues,
        viewport: PixelRect,
    ) {
        self.commands.push(Command::BindTargets {
            colour: colour.to_vec(),
            depth,
            clear: *clear,
            viewport,
        });
    }

    fn bind_texture(
        &mut self,
        texture: GpuHandle,
        sampler: GpuHandle,
        unit: u32,
    ) {
        self.commands.push(Command::BindTexture {
            texture,
            sampler,
            unit,
        });
    }

    fn bind_pipeline(&mut self, pipeline: GpuHandle) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    fn set_constants(&mut self, constants: &PassConstants) {
        self.commands.push(Command::SetConstants(*constants));
    }

    fn draw(&mut self, draw: DrawKind<'_>) {
        let recorded = match draw {
            DrawKind::Fullscreen => RecordedDraw::Fullscreen,
            DrawKind::Scene { flags, camera } => RecordedDraw::Scene {
                flags,
                camera: camera.map(str::to_owned),
            },
        };
        self.commands.push(Command::Draw(recorded));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(format: TargetFormat) -> TargetDesc {
        TargetDesc {
            label: "t".to_owned(),
            width: 64,
            height: 64,
            format,
            mip_count: 1,
            sample_count: 1,
        }
    }

    #[test]
    fn create_and_destroy_track_live_targets() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_target(&desc(TargetFormat::Rgba8)).unwrap();
        let b = backend.create_target(&desc(TargetFormat::Rgba8)).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_targets(), 2);
        backend.destroy_target(a);
        backend.destroy_target(GpuHandle::BACK_BUFFER_COLOUR);
        assert_eq!(backend.live_targets(), 1);
        assert_eq!(backend.targets_destroyed(), 1);
    }

    #[test]
    fn injected_format_failure() {
        let mut backend = RecordingBackend::new();
        backend.fail_format(TargetFormat::Rgba32f);
        assert_eq!(
            backend.create_target(&desc(TargetFormat::Rgba32f)),
            Err(BackendError::UnsupportedFormat(TargetFormat::Rgba32f))
        );
        backend.clear_failures();
        assert!(backend.create_target(&desc(TargetFormat::Rgba32f)).is_ok());
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut backend = RecordingBackend::new();
        let mut zero = desc(TargetFormat::Rgba8);
        zero.width = 0;
        assert!(matches!(
            backend.create_target(&zero),
            Err(BackendError::InvalidDescriptor(_))
        ));
    }
}
