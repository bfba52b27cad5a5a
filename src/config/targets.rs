use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Texel format of a render target.
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
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// 8-bit unorm RGBA.
    Rgba8,
    /// 8-bit unorm BGRA.
    Bgra8,
    /// 32-bit float RGBA.
    Rgba32f,
    /// 16-bit float RGBA.
    Rgba16f,
    /// 32-bit float single channel.
    R32f,
    /// 16-bit float single channel.
    R16f,
    /// 32-bit unsigned integer single channel.
    R32u,
    /// 24-bit depth with 8-bit stencil.
    D24s8,
}

impl TargetFormat {
    /// Bits per texel.
    #[must_use]
    pub const fn block_bits(self) -> u32 {
        match self {
            Self::Rgba8 | Self::Bgra8 | Self::R32f | Self::R32u | Self::D24s8 => {
                32
            }
            Self::Rgba32f => 128,
            Self::Rgba16f => 64,
            Self::R16f => 16,
        }
    }

    /// Whether this is a depth-stencil format.
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::D24s8)
    }

    /// The wgpu texture format backing this target format.
    #[must_use]
    pub const fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            Self::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
            Self::Rgba32f => wgpu::TextureFormat::Rgba32Float,
            Self::Rgba16f => wgpu::TextureFormat::Rgba16Float,
            Self::R32f => wgpu::TextureFormat::R32Float,
            Self::R16f => wgpu::TextureFormat::R16Float,
            Self::R32u => wgpu::TextureFormat::R32Uint,
            Self::D24s8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

/// Size of a target relative to the back buffer.
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
#[serde(rename_all = "lowercase")]
pub enum ScreenRatio {
    /// Same size as the back buffer.
    Equal,
    /// 1/2 of the back buffer.
    Half,
    /// 1/4 of the back buffer.
    Quarter,
    /// 1/8 of the back buffer.
    Eighth,
    /// 1/16 of the back buffer.
    Sixteenth,
}

impl ScreenRatio {
    /// Integer divisor applied to both back-buffer dimensions.
    #[must_use]
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Equal => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }
}

/// Either explicit texel dimensions or a screen-relative ratio. Exactly one
/// is authoritative.
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
#[serde(untagged)]
pub enum TargetSize {
    /// Explicit `[width, height]` in texels.
    Fixed([u32; 2]),
    /// Scale of the back buffer, re-resolved on every resize.
    Ratio(ScreenRatio),
}

impl TargetSize {
    /// Resolve to texel dimensions for the given back-buffer size. Ratio
    /// sizes never collapse below one texel.
    #[must_use]
    pub fn resolve(self, screen: (u32, u32)) -> (u32, u32) {
        match self {
            Self::Fixed([w, h]) => (w, h),
            Self::Ratio(ratio) => {
                let d = ratio.divisor();
                ((screen.0 / d).max(1), (screen.1 / d).max(1))
            }
        }
    }

    /// Whether this size tracks the back buffer.
    #[must_use]
    pub const fn is_ratio(self) -> bool {
        matches!(self, Self::Ratio(_))
    }
}

const fn one() -> u32 {
    1
}

/// One authored render target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TargetDecl {
    /// Unique name; hashed into the target id.
    pub name: String,
    /// Explicit dimensions or back-buffer ratio.
    pub size: TargetSize,
    /// Texel format.
    pub format: TargetFormat,
    /// Allocate a full mip chain.
    #[serde(default)]
    pub mips: bool,
    /// MSAA sample count (1, 2, 4 or 8).
    #[serde(default = "one")]
    pub samples: u32,
    /// The canonical buffer joins the auxiliary pool so chains of passes
    /// can ping-pong through it.
    #[serde(default)]
    pub pingpong: bool,
    /// Target whose contents seed the first read of this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_from: Option<String>,
    /// Terminal target with no downstream readers; never aliased.
    #[serde(default)]
    pub write_only: bool,
}

impl TargetDecl {
    /// A single-sampled, mip-less target.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        size: TargetSize,
        format: TargetFormat,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            format,
            mips: false,
            samples: 1,
            pingpong: false,
            read_from: None,
            write_only: false,
        }
    }

    /// Mark as a ping-pong target.
    #[must_use]
    pub fn pingpong(mut self) -> Self {
        self.pingpong = true;
        self
    }

    /// Seed the first read from another target.
    #[must_use]
    pub fn read_from(mut self, source: impl Into<String>) -> Self {
        self.read_from = Some(source.into());
        self
    }

    /// Mark as write-only.
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Set the MSAA sample count.
    #[must_use]
    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Allocate a full mip chain.
    #[must_use]
    pub fn mips(mut self) -> Self {
        self.mips = true;
        self
    }
}
