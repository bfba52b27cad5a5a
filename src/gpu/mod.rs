//! GPU seam and its implementations.
//!
//! [`RenderBackend`] is what baking and frame execution talk to.
//! [`RecordingBackend`] records calls without a device; [`WgpuBackend`]
//! renders them.

/// Backend trait and the plain-data types crossing it.
pub mod backend;
/// Device-free backend that records every call.
pub mod headless;
/// Shared wgpu boilerplate: layout entries and render-state conversion.
pub mod pipeline_helpers;
/// wgpu device and queue initialization.
pub mod render_context;
/// Render-target textures.
pub mod texture;
/// wgpu implementation of the backend.
pub mod wgpu_backend;

pub use backend::{
    BackendError, ClearValues, DrawKind, GpuHandle, PassConstants,
    PipelineDesc, PixelRect, RenderBackend, SceneFlags, TargetDesc,
    MAX_FILTER_TAPS, PARAMETER_SLOTS,
};
pub use headless::{Command, RecordedDraw, RecordingBackend, StateRecord};
pub use render_context::{RenderContext, RenderContextError};
pub use wgpu_backend::{ScenePainter, Technique, VertexLayout, WgpuBackend};
