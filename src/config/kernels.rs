use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named separable filter: one weight and one texel offset per tap.
///
/// Taps run from the centre outwards; a non-zero offset is sampled on both
/// sides of the centre. Missing weights or offsets count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterKernelDecl {
    /// Kernel name passes refer to.
    pub name: String,
    /// Weight per tap.
    #[serde(default)]
    pub weights: Vec<f32>,
    /// Offset per tap, in texels along the filter direction.
    #[serde(default)]
    pub offsets: Vec<f32>,
}

impl FilterKernelDecl {
    /// A kernel from matching weight and offset lists.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        weights: &[f32],
        offsets: &[f32],
    ) -> Self {
        Self {
            name: name.into(),
            weights: weights.to_vec(),
            offsets: offsets.to_vec(),
        }
    }

    /// Number of taps: the longer of the two lists.
    #[must_use]
    pub fn taps(&self) -> usize {
        self.weights.len().max(self.offsets.len())
    }

    /// `(offset, weight)` of tap `i`.
    #[must_use]
    pub fn tap(&self, i: usize) -> (f32, f32) {
        (
            self.offsets.get(i).copied().unwrap_or(0.0),
            self.weights.get(i).copied().unwrap_or(0.0),
        )
    }
}

/// Named filter directions.
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
pub enum DirectionPreset {
    /// `[1, 0]`.
    Horizontal,
    /// `[0, 1]`.
    Vertical,
}

/// Direction a pass steps its filter kernel in: a preset name or an
/// explicit `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FilterDirection {
    /// `"horizontal"` or `"vertical"`.
    Preset(DirectionPreset),
    /// Any direction, in texels per tap offset.
    Vector([f32; 2]),
}

impl FilterDirection {
    /// The direction as a vector.
    #[must_use]
    pub const fn vector(self) -> [f32; 2] {
        match self {
            Self::Preset(DirectionPreset::Horizontal) => [1.0, 0.0],
            Self::Preset(DirectionPreset::Vertical) => [0.0, 1.0],
            Self::Vector(v) => v,
        }
    }
}
