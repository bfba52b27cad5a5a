//! The seam between baking/execution and the GPU.
//!
//! The allocator only ever creates and destroys auxiliary targets through
//! this trait; binding and drawing belong to the frame executor.

use std::fmt;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::config::{RenderState, SceneFilter, TargetFormat};

/// Opaque GPU resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(u32);

impl GpuHandle {
    /// Sentinel for "no resource".
    pub const INVALID: Self = Self(u32::MAX);
    /// The presentation colour buffer of the current frame.
    pub const BACK_BUFFER_COLOUR: Self = Self(u32::MAX - 1);
    /// The presentation depth buffer.
    pub const BACK_BUFFER_DEPTH: Self = Self(u32::MAX - 2);

    /// Wrap a backend-assigned index.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw backend index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this handle refers to a resource.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Whether this is one of the reserved back-buffer handles.
    #[must_use]
    pub const fn is_back_buffer(self) -> bool {
        self.0 == Self::BACK_BUFFER_COLOUR.0 || self.0 == Self::BACK_BUFFER_DEPTH.0
    }
}

impl fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INVALID => write!(f, "<invalid>"),
            Self::BACK_BUFFER_COLOUR => write!(f, "<back-buffer colour>"),
            Self::BACK_BUFFER_DEPTH => write!(f, "<back-buffer depth>"),
            Self(raw) => write!(f, "#{raw}"),
        }
    }
}

/// GPU resource creation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The device cannot create textures of this format/usage.
    UnsupportedFormat(TargetFormat),
    /// Dimensions, mip or sample counts outside device limits.
    InvalidDescriptor(String),
    /// A pipeline references a technique the backend does not know.
    UnknownTechnique(String),
    /// A handle passed to the backend does not refer to a live object.
    StaleHandle(GpuHandle),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(format) => {
                write!(f, "unsupported target format {format:?}")
            }
            Self::InvalidDescriptor(msg) => {
                write!(f, "invalid descriptor: {msg}")
            }
            Self::UnknownTechnique(name) => {
                write!(f, "unknown technique '{name}'")
            }
            Self::StaleHandle(handle) => write!(f, "stale handle {handle}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Fully resolved creation parameters for one physical target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    /// Debug label.
    pub label: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TargetFormat,
    /// Mip levels (at least 1).
    pub mip_count: u32,
    /// MSAA samples (at least 1).
    pub sample_count: u32,
}

/// Everything needed to build one pipeline state object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    /// Technique (shader program) name.
    pub technique: String,
    /// Rasterizer state handle.
    pub raster: GpuHandle,
    /// Blend state handle.
    pub blend: GpuHandle,
    /// Depth-stencil state handle.
    pub depth_stencil: GpuHandle,
    /// Colour attachment formats, in attachment order.
    pub colour_formats: Vec<TargetFormat>,
    /// Depth attachment format.
    pub depth_format: Option<TargetFormat>,
    /// Attachment sample count.
    pub sample_count: u32,
    /// Scene pipelines take vertex input; full-screen ones do not.
    pub scene: bool,
}

/// Clear values applied when a pass binds its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearValues {
    /// Colour clear; `None` loads existing contents.
    pub colour: Option<[f32; 4]>,
    /// Depth clear.
    pub depth: Option<f32>,
    /// Stencil clear.
    pub stencil: Option<u32>,
}

/// Viewport in texels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl PixelRect {
    /// Scale a normalized `[x, y, w, h]` rect to a `width` × `height`
    /// target.
    #[must_use]
    pub fn from_normalized(rect: [f32; 4], width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x: rect[0] * w,
            y: rect[1] * h,
            width: rect[2] * w,
            height: rect[3] * h,
        }
    }
}

bitflags! {
    /// Scene geometry filters for scene draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneFlags: u32 {
        /// Opaque geometry.
        const OPAQUE = 1 << 0;
        /// Geometry lit in the forward path.
        const FORWARD_LIT = 1 << 1;
        /// Shadow casters.
        const SHADOW_MAP = 1 << 2;
        /// Transparent geometry.
        const ALPHA_BLENDED = 1 << 3;
    }
}

impl SceneFlags {
    /// Combine authored filters.
    #[must_use]
    pub fn from_filters(filters: &[SceneFilter]) -> Self {
        filters.iter().fold(Self::empty(), |acc, f| {
            acc | match f {
                SceneFilter::Opaque => Self::OPAQUE,
                SceneFilter::ForwardLit => Self::FORWARD_LIT,
                SceneFilter::ShadowMap => Self::SHADOW_MAP,
                SceneFilter::AlphaBlended => Self::ALPHA_BLENDED,
            }
        })
    }
}

/// Filter taps a pass can upload.
pub const MAX_FILTER_TAPS: usize = 16;

/// `vec4` slots of authored technique parameters.
pub const PARAMETER_SLOTS: usize = 4;

/// Per-pass constants. The camera and size fields are recomputed every
/// frame; the kernel and parameters are copied from the bake.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    /// Column-major view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Viewport `[x, y, width, height]` in texels.
    pub viewport: [f32; 4],
    /// `[1 / width, 1 / height, width, height]` of the outputs.
    pub texel: [f32; 4],
    /// `[direction.x, direction.y, tap count, 0]` of the filter kernel.
    pub kernel: [f32; 4],
    /// `[offset, weight, 0, 0]` per filter tap.
    pub taps: [[f32; 4]; MAX_FILTER_TAPS],
    /// Technique parameters, four per slot.
    pub parameters: [[f32; 4]; PARAMETER_SLOTS],
}

/// The draw issued by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind<'a> {
    /// One full-screen triangle.
    Fullscreen,
    /// Scene geometry matching `flags`, seen from `camera`.
    Scene {
        /// Geometry filter.
        flags: SceneFlags,
        /// Camera name.
        camera: Option<&'a str>,
    },
}

/// GPU abstraction consumed by the bake and the frame executor.
pub trait RenderBackend {
    /// Create a render target.
    fn create_target(
        &mut self,
        desc: &TargetDesc,
    ) -> Result<GpuHandle, BackendError>;

    /// Destroy a render target. Reserved back-buffer handles are ignored.
    fn destroy_target(&mut self, handle: GpuHandle);

    /// Create a sampler/raster/blend/depth-stencil state object.
    fn create_state(
        &mut self,
        state: &RenderState,
    ) -> Result<GpuHandle, BackendError>;

    /// Create a pipeline state object.
    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
    ) -> Result<GpuHandle, BackendError>;

    /// Destroy a state or pipeline object.
    fn destroy_state(&mut self, handle: GpuHandle);

    /// Bind colour and depth outputs, clearing per `clear`.
    fn bind_targets(
        &mut self,
        colour: &[GpuHandle],
        depth: Option<GpuHandle>,
        clear: &ClearValues,
        viewport: PixelRect,
    );

    /// Bind a sampled input at a texture unit.
    fn bind_texture(&mut self, texture: GpuHandle, sampler: GpuHandle, unit: u32);

    /// Bind a pipeline state object.
    fn bind_pipeline(&mut self, pipeline: GpuHandle);

    /// Upload the constants for the next draw.
    fn set_constants(&mut self, constants: &PassConstants);

    /// Issue the pass's draw.
    fn draw(&mut self, draw: DrawKind<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_handles() {
        assert!(!GpuHandle::INVALID.is_valid());
        assert!(GpuHandle::BACK_BUFFER_COLOUR.is_valid());
        assert!(GpuHandle::BACK_BUFFER_DEPTH.is_back_buffer());
        assert!(!GpuHandle::from_raw(3).is_back_buffer());
        assert_eq!(GpuHandle::from_raw(3).to_string(), "#3");
    }

    #[test]
    fn normalized_viewport_scales_to_texels() {
        let rect = PixelRect::from_normalized([0.5, 0.0, 0.5, 1.0], 640, 360);
        assert_eq!(rect.x, 320.0);
        assert_eq!(rect.width, 320.0);
        assert_eq!(rect.height, 360.0);
    }

    #[test]
    fn scene_filters_combine() {
        let flags = SceneFlags::from_filters(&[
            SceneFilter::Opaque,
            SceneFilter::ForwardLit,
        ]);
        assert!(flags.contains(SceneFlags::OPAQUE | SceneFlags::FORWARD_LIT));
        assert!(!flags.contains(SceneFlags::SHADOW_MAP));
    }
}
