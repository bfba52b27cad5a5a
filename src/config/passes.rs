use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::kernels::FilterDirection;

/// What a pass draws.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// A single full-screen triangle.
    #[default]
    Fullscreen,
    /// Scene geometry filtered by `render_flags`.
    Scene,
}

/// Scene geometry filters for [`PassKind::Scene`] passes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SceneFilter {
    Opaque,
    ForwardLit,
    ShadowMap,
    AlphaBlended,
}

fn default_state() -> String {
    "default".to_owned()
}

const fn full_viewport() -> [f32; 4] {
    [0.0, 0.0, 1.0, 1.0]
}

const fn enabled() -> bool {
    true
}

/// A sampled input of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InputDecl {
    /// Target name to sample.
    pub texture: String,
    /// Texture unit the input is bound at.
    pub unit: u32,
    /// Sampler state name.
    #[serde(default = "default_state")]
    pub sampler: String,
}

/// One authored pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PassDecl {
    /// Pass name, used in diagnostics.
    pub name: String,
    /// Full-screen or scene pass.
    #[serde(default)]
    pub kind: PassKind,
    /// Scene filters (scene passes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub render_flags: Vec<SceneFilter>,
    /// Camera name resolved per frame (scene passes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    /// Colour outputs, in attachment order.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Depth output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_target: Option<String>,
    /// Sampled inputs.
    #[serde(default)]
    pub inputs: Vec<InputDecl>,
    /// Technique (shader program) name.
    pub technique: String,
    /// Rasterizer state name.
    #[serde(default = "default_state")]
    pub raster_state: String,
    /// Blend state name.
    #[serde(default = "default_state")]
    pub blend_state: String,
    /// Depth-stencil state name.
    #[serde(default = "default_state")]
    pub depth_stencil_state: String,
    /// Colour clear value; outputs are loaded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_colour: Option<[f32; 4]>,
    /// Depth clear value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_depth: Option<f32>,
    /// Stencil clear value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_stencil: Option<u32>,
    /// Normalized `[x, y, width, height]` of the outputs' resolved size.
    #[serde(default = "full_viewport")]
    pub viewport: [f32; 4],
    /// Disabled passes are skipped by the bake.
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Write canonical buffers directly, never aliasing.
    #[serde(default)]
    pub direct_write: bool,
    /// Filter kernel uploaded with the pass constants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_kernel: Option<String>,
    /// Direction the filter kernel steps in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_direction: Option<FilterDirection>,
    /// Technique parameters uploaded with the pass constants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<f32>,
}

impl PassDecl {
    /// A full-screen pass with no inputs or outputs yet.
    #[must_use]
    pub fn fullscreen(
        name: impl Into<String>,
        technique: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PassKind::Fullscreen,
            render_flags: Vec::new(),
            camera: None,
            targets: Vec::new(),
            depth_target: None,
            inputs: Vec::new(),
            technique: technique.into(),
            raster_state: default_state(),
            blend_state: default_state(),
            depth_stencil_state: default_state(),
            clear_colour: None,
            clear_depth: None,
            clear_stencil: None,
            viewport: full_viewport(),
            enabled: true,
            direct_write: false,
            filter_kernel: None,
            filter_direction: None,
            parameters: Vec::new(),
        }
    }

    /// A scene pass drawn from `camera`.
    #[must_use]
    pub fn scene(
        name: impl Into<String>,
        technique: impl Into<String>,
        camera: impl Into<String>,
    ) -> Self {
        Self {
            kind: PassKind::Scene,
            camera: Some(camera.into()),
            render_flags: vec![SceneFilter::Opaque],
            ..Self::fullscreen(name, technique)
        }
    }

    /// Add a colour output.
    #[must_use]
    pub fn output(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Set the depth output.
    #[must_use]
    pub fn depth(mut self, target: impl Into<String>) -> Self {
        self.depth_target = Some(target.into());
        self
    }

    /// Sample `texture` at `unit` with the default sampler.
    #[must_use]
    pub fn input(mut self, texture: impl Into<String>, unit: u32) -> Self {
        self.inputs.push(InputDecl {
            texture: texture.into(),
            unit,
            sampler: default_state(),
        });
        self
    }

    /// Clear colour outputs to `colour`.
    #[must_use]
    pub fn clear(mut self, colour: [f32; 4]) -> Self {
        self.clear_colour = Some(colour);
        self
    }

    /// Set the normalized viewport.
    #[must_use]
    pub fn viewport(mut self, viewport: [f32; 4]) -> Self {
        self.viewport = viewport;
        self
    }

    /// Write canonical buffers directly.
    #[must_use]
    pub fn direct(mut self) -> Self {
        self.direct_write = true;
        self
    }

    /// Step `kernel` along `direction`.
    #[must_use]
    pub fn filter(
        mut self,
        kernel: impl Into<String>,
        direction: FilterDirection,
    ) -> Self {
        self.filter_kernel = Some(kernel.into());
        self.filter_direction = Some(direction);
        self
    }

    /// Set the technique parameters.
    #[must_use]
    pub fn parameters(mut self, values: &[f32]) -> Self {
        self.parameters = values.to_vec();
        self
    }

    /// Disable the pass.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
