//! Pipeline state descriptions.
//!
//! Each state kind has a content type (hashable, passed to the backend) and
//! a named declaration that flattens the content next to its name.

use std::hash::{Hash, Hasher};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::util::hash::hash_f32;

/// Texture filtering.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Nearest texel.
    Point,
    /// Bilinear with linear mip blending.
    #[default]
    Linear,
    /// Anisotropic (uses `max_anisotropy`).
    Anisotropic,
}

/// Texture addressing outside `[0, 1]`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    /// Repeat.
    #[default]
    Wrap,
    /// Clamp to the edge texel.
    Clamp,
    /// Mirrored repeat.
    Mirror,
}

/// Comparison function for depth, stencil and shadow samplers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CompareFunc {
    /// Never passes.
    Never,
    /// `<`
    #[default]
    Less,
    /// `==`
    Equal,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Sampler state content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplerState {
    /// Min/mag/mip filter.
    pub filter: FilterMode,
    /// U addressing.
    pub address_u: AddressMode,
    /// V addressing.
    pub address_v: AddressMode,
    /// W addressing.
    pub address_w: AddressMode,
    /// Anisotropy clamp, only used with [`FilterMode::Anisotropic`].
    pub max_anisotropy: u16,
    /// Minimum LOD.
    pub min_lod: f32,
    /// Maximum LOD.
    pub max_lod: f32,
    /// Comparison sampler function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare: Option<CompareFunc>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            filter: FilterMode::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            max_anisotropy: 1,
            min_lod: 0.0,
            max_lod: 32.0,
            compare: None,
        }
    }
}

impl Hash for SamplerState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.max_anisotropy.hash(state);
        hash_f32(self.min_lod, state);
        hash_f32(self.max_lod, state);
        self.compare.hash(state);
    }
}

/// Polygon fill.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    Solid,
    /// Edges only.
    Wireframe,
}

/// Face culling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

/// Rasterizer state content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RasterState {
    /// Fill mode.
    pub fill: FillMode,
    /// Cull mode.
    pub cull: CullMode,
    /// Counter-clockwise front faces.
    pub front_ccw: bool,
    /// Constant depth bias.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub slope_scale_depth_bias: f32,
    /// Clip against the near/far planes.
    pub depth_clip: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            fill: FillMode::Solid,
            cull: CullMode::Back,
            front_ccw: false,
            depth_bias: 0,
            slope_scale_depth_bias: 0.0,
            depth_clip: true,
        }
    }
}

impl Hash for RasterState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fill.hash(state);
        self.cull.hash(state);
        self.front_ccw.hash(state);
        self.depth_bias.hash(state);
        hash_f32(self.slope_scale_depth_bias, state);
        self.depth_clip.hash(state);
    }
}

/// Blend factor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColour,
    InvSrcColour,
    SrcAlpha,
    InvSrcAlpha,
    DstColour,
    InvDstColour,
    DstAlpha,
    InvDstAlpha,
}

/// Blend operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Blend state content.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(default)]
pub struct BlendState {
    /// Blending enabled; when false the other factors are ignored.
    pub enabled: bool,
    /// Colour source factor.
    pub src: BlendFactor,
    /// Colour destination factor.
    pub dst: BlendFactor,
    /// Colour operation.
    pub op: BlendOp,
    /// Alpha source factor.
    pub src_alpha: BlendFactor,
    /// Alpha destination factor.
    pub dst_alpha: BlendFactor,
    /// Alpha operation.
    pub op_alpha: BlendOp,
    /// RGBA write mask, bit 0 = red.
    pub write_mask: u8,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            op_alpha: BlendOp::Add,
            write_mask: 0xf,
        }
    }
}

/// Stencil operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

/// Depth-stencil state content.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(default)]
pub struct DepthStencilState {
    /// Depth test enabled.
    pub depth_test: bool,
    /// Depth writes enabled.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_func: CompareFunc,
    /// Stencil test enabled.
    pub stencil_enable: bool,
    /// Stencil comparison.
    pub stencil_func: CompareFunc,
    /// Operation when both stencil and depth pass.
    pub stencil_pass_op: StencilOp,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_func: CompareFunc::Less,
            stencil_enable: false,
            stencil_func: CompareFunc::Always,
            stencil_pass_op: StencilOp::Keep,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

/// Any pipeline state content, as handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Hash)]
pub enum RenderState {
    /// Sampler.
    Sampler(SamplerState),
    /// Rasterizer.
    Raster(RasterState),
    /// Blend.
    Blend(BlendState),
    /// Depth-stencil.
    DepthStencil(DepthStencilState),
}

impl RenderState {
    /// The kind of this state.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Sampler(_) => StateKind::Sampler,
            Self::Raster(_) => StateKind::Raster,
            Self::Blend(_) => StateKind::Blend,
            Self::DepthStencil(_) => StateKind::DepthStencil,
        }
    }

    /// The default state of a kind.
    #[must_use]
    pub fn default_of(kind: StateKind) -> Self {
        match kind {
            StateKind::Sampler => Self::Sampler(SamplerState::default()),
            StateKind::Raster => Self::Raster(RasterState::default()),
            StateKind::Blend => Self::Blend(BlendState::default()),
            StateKind::DepthStencil => {
                Self::DepthStencil(DepthStencilState::default())
            }
        }
    }
}

/// Discriminates the four state kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// Sampler.
    Sampler,
    /// Rasterizer.
    Raster,
    /// Blend.
    Blend,
    /// Depth-stencil.
    DepthStencil,
}

impl StateKind {
    /// All kinds, in registration order.
    pub const ALL: [Self; 4] =
        [Self::Sampler, Self::Raster, Self::Blend, Self::DepthStencil];

    /// Human-readable kind name for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sampler => "sampler",
            Self::Raster => "raster",
            Self::Blend => "blend",
            Self::DepthStencil => "depth-stencil",
        }
    }
}

/// Named sampler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplerStateDecl {
    /// Name referenced by pass inputs.
    pub name: String,
    /// Content.
    #[serde(flatten)]
    pub state: SamplerState,
}

/// Named rasterizer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RasterStateDecl {
    /// Name referenced by passes.
    pub name: String,
    /// Content.
    #[serde(flatten)]
    pub state: RasterState,
}

/// Named blend state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlendStateDecl {
    /// Name referenced by passes.
    pub name: String,
    /// Content.
    #[serde(flatten)]
    pub state: BlendState,
}

/// Named depth-stencil state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DepthStencilStateDecl {
    /// Name referenced by passes.
    pub name: String,
    /// Content.
    #[serde(flatten)]
    pub state: DepthStencilState,
}
