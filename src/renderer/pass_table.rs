//! The bake output: one frame-ready record per enabled pass.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use super::registry::TargetId;
use crate::gpu::{
    ClearValues, DrawKind, GpuHandle, PixelRect, SceneFlags, MAX_FILTER_TAPS,
    PARAMETER_SLOTS,
};

/// An output of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    /// Logical target.
    pub target: TargetId,
    /// Target name.
    pub name: String,
    /// Resolved buffer.
    pub handle: GpuHandle,
}

/// A sampled input of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    /// Logical target.
    pub target: TargetId,
    /// Target name.
    pub name: String,
    /// Resolved buffer.
    pub handle: GpuHandle,
    /// Sampler state.
    pub sampler: GpuHandle,
    /// Texture unit.
    pub unit: u32,
}

/// What a baked pass draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassDraw {
    /// One full-screen triangle.
    Fullscreen,
    /// Filtered scene geometry.
    Scene {
        /// Geometry filter.
        flags: SceneFlags,
        /// Camera name, looked up every frame.
        camera: Option<String>,
    },
}

/// A filter kernel laid out the way the pass constants carry it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KernelConstants {
    /// `[direction.x, direction.y, tap count, 0]`; all zero without a
    /// kernel.
    pub info: [f32; 4],
    /// `[offset, weight, 0, 0]` per tap.
    pub taps: [[f32; 4]; MAX_FILTER_TAPS],
}

/// One resolved pass. Immutable once baked.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    /// Pass name.
    pub name: String,
    /// Technique the pipeline was built from.
    pub technique: String,
    /// Colour outputs, in attachment order.
    pub outputs: Vec<OutputBinding>,
    /// Handles of `outputs`, ready to bind.
    pub colour: Vec<GpuHandle>,
    /// Depth output.
    pub depth: Option<OutputBinding>,
    /// Sampled inputs.
    pub inputs: Vec<TextureBinding>,
    /// Pipeline state object.
    pub pipeline: GpuHandle,
    /// Clear values.
    pub clear: ClearValues,
    /// Viewport in texels of the outputs.
    pub viewport: PixelRect,
    /// Resolved size shared by every output.
    pub size: (u32, u32),
    /// Draw issued after binding.
    pub draw: PassDraw,
    /// Filter kernel constants.
    pub kernel: KernelConstants,
    /// Technique parameters, four per slot.
    pub parameters: [[f32; 4]; PARAMETER_SLOTS],
}

impl PassDescriptor {
    /// The draw as passed to the backend.
    #[must_use]
    pub fn draw_kind(&self) -> DrawKind<'_> {
        match &self.draw {
            PassDraw::Fullscreen => DrawKind::Fullscreen,
            PassDraw::Scene { flags, camera } => DrawKind::Scene {
                flags: *flags,
                camera: camera.as_deref(),
            },
        }
    }

    /// Whether this pass draws scene geometry.
    #[must_use]
    pub const fn is_scene(&self) -> bool {
        matches!(self.draw, PassDraw::Scene { .. })
    }

    /// Depth handle, if the pass has a depth output.
    #[must_use]
    pub fn depth_handle(&self) -> Option<GpuHandle> {
        self.depth.as_ref().map(|d| d.handle)
    }

    /// Every output, colour first.
    pub fn all_outputs(&self) -> impl Iterator<Item = &OutputBinding> {
        self.outputs.iter().chain(self.depth.as_ref())
    }

    /// The first input whose buffer is also written by this pass.
    #[must_use]
    pub fn aliased_input(&self) -> Option<&TextureBinding> {
        self.inputs.iter().find(|input| {
            self.all_outputs().any(|output| output.handle == input.handle)
        })
    }
}

/// The baked schedule, replaced wholesale on every bake.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassTable {
    /// Passes, in execution order.
    pub passes: Vec<PassDescriptor>,
    /// Bake counter; increases with every successful bake.
    pub generation: u64,
    /// Back-buffer size the table was baked for.
    pub screen: (u32, u32),
    /// Auxiliary clones created by this bake.
    pub auxiliary_created: usize,
    /// Auxiliary clones in the pool after this bake.
    pub auxiliary_total: usize,
    /// Estimated target memory after this bake.
    pub memory_bytes: u64,
}

impl PassTable {
    /// Number of baked passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether no pass was baked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// The pass called `name`.
    #[must_use]
    pub fn pass(&self, name: &str) -> Option<&PassDescriptor> {
        self.passes.iter().find(|p| p.name == name)
    }

    /// Outputs and inputs of every pass with handles replaced by the order
    /// in which each buffer first appears. Two bakes alias identically iff
    /// their patterns are equal.
    #[must_use]
    pub fn aliasing_pattern(&self) -> Vec<Vec<usize>> {
        let mut ordinals: FxHashMap<GpuHandle, usize> = FxHashMap::default();
        self.passes
            .iter()
            .map(|pass| {
                pass.all_outputs()
                    .map(|o| o.handle)
                    .chain(pass.inputs.iter().map(|i| i.handle))
                    .map(|handle| {
                        let next = ordinals.len();
                        *ordinals.entry(handle).or_insert(next)
                    })
                    .collect()
            })
            .collect()
    }

    /// Human-readable listing of every pass's resolved buffers.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "generation {} at {}x{}: {} passes, {} auxiliary ({} new), {:.1} MiB\n",
            self.generation,
            self.screen.0,
            self.screen.1,
            self.passes.len(),
            self.auxiliary_total,
            self.auxiliary_created,
            self.memory_bytes as f64 / (1024.0 * 1024.0)
        );
        for pass in &self.passes {
            let _ = write!(out, "  {} [{}x{}]", pass.name, pass.size.0, pass.size.1);
            for output in pass.all_outputs() {
                let _ = write!(out, " out {}={}", output.name, output.handle);
            }
            for input in &pass.inputs {
                let _ = write!(
                    out,
                    " in{} {}={}",
                    input.unit, input.name, input.handle
                );
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(name: &str, raw: u32) -> OutputBinding {
        OutputBinding {
            target: TargetId::from_name(name),
            name: name.to_owned(),
            handle: GpuHandle::from_raw(raw),
        }
    }

    fn input(name: &str, raw: u32, unit: u32) -> TextureBinding {
        TextureBinding {
            target: TargetId::from_name(name),
            name: name.to_owned(),
            handle: GpuHandle::from_raw(raw),
            sampler: GpuHandle::from_raw(100),
            unit,
        }
    }

    fn pass(
        name: &str,
        out: OutputBinding,
        inputs: Vec<TextureBinding>,
    ) -> PassDescriptor {
        PassDescriptor {
            name: name.to_owned(),
            technique: "t".to_owned(),
            colour: vec![out.handle],
            outputs: vec![out],
            depth: None,
            inputs,
            pipeline: GpuHandle::from_raw(200),
            clear: ClearValues::default(),
            viewport: PixelRect::default(),
            size: (8, 8),
            draw: PassDraw::Fullscreen,
            kernel: KernelConstants::default(),
            parameters: [[0.0; 4]; PARAMETER_SLOTS],
        }
    }

    #[test]
    fn aliasing_pattern_ignores_handle_identity() {
        let a = PassTable {
            passes: vec![
                pass("x", output("b", 1), vec![]),
                pass("y", output("b", 2), vec![input("b", 1, 0)]),
            ],
            ..PassTable::default()
        };
        let b = PassTable {
            passes: vec![
                pass("x", output("b", 7), vec![]),
                pass("y", output("b", 9), vec![input("b", 7, 0)]),
            ],
            ..PassTable::default()
        };
        assert_eq!(a.aliasing_pattern(), vec![vec![0], vec![1, 0]]);
        assert_eq!(a.aliasing_pattern(), b.aliasing_pattern());
    }

    #[test]
    fn aliased_input_is_detected() {
        let ok = pass("ok", output("b", 1), vec![input("b", 2, 0)]);
        assert!(ok.aliased_input().is_none());
        let bad = pass("bad", output("b", 1), vec![input("b", 1, 0)]);
        assert_eq!(bad.aliased_input().map(|i| i.unit), Some(0));
    }

    #[test]
    fn summary_lists_bindings() {
        let table = PassTable {
            passes: vec![pass("blur", output("bloom", 3), vec![input("bloom", 4, 0)])],
            generation: 2,
            screen: (16, 16),
            ..PassTable::default()
        };
        let text = table.summary();
        assert!(text.starts_with("generation 2 at 16x16: 1 passes"));
        assert!(text.contains("blur [8x8] out bloom=#3 in0 bloom=#4"));
    }
}
