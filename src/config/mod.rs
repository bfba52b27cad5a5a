//! Declarative frame configuration with TOML support.
//!
//! A frame is an ordered list of passes over a set of named render targets,
//! plus named pipeline states the passes refer to. Every section uses
//! `#[serde(default)]` so partial files (e.g. only `[[passes]]` over the
//! built-in back buffer) load correctly.

mod kernels;
mod passes;
mod states;
mod targets;

use std::collections::BTreeMap;
use std::path::Path;

pub use kernels::{DirectionPreset, FilterDirection, FilterKernelDecl};
pub use passes::{InputDecl, PassDecl, PassKind, SceneFilter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use states::{
    AddressMode, BlendFactor, BlendOp, BlendState, BlendStateDecl,
    CompareFunc, CullMode, DepthStencilState, DepthStencilStateDecl,
    FillMode, FilterMode, RasterState, RasterStateDecl, RenderState,
    SamplerState, SamplerStateDecl, StateKind, StencilOp,
};
pub use targets::{ScreenRatio, TargetDecl, TargetFormat, TargetSize};

use crate::error::PassbakeError;

/// Top-level frame configuration.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct FrameConfig {
    /// View set to bake; every pass runs when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_set: Option<String>,
    /// Render targets, in declaration order.
    pub targets: Vec<TargetDecl>,
    /// Named sampler states.
    pub sampler_states: Vec<SamplerStateDecl>,
    /// Named rasterizer states.
    pub raster_states: Vec<RasterStateDecl>,
    /// Named blend states.
    pub blend_states: Vec<BlendStateDecl>,
    /// Named depth-stencil states.
    pub depth_stencil_states: Vec<DepthStencilStateDecl>,
    /// Named filter kernels.
    pub filter_kernels: Vec<FilterKernelDecl>,
    /// Passes, executed in this order.
    pub passes: Vec<PassDecl>,
    /// Named subsets of `passes`, each run in its own listed order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub view_sets: BTreeMap<String, Vec<String>>,
}

impl FrameConfig {
    /// Generate JSON Schema describing the configuration format.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(FrameConfig)
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::ConfigParse`] if the text is not a valid
    /// configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, PassbakeError> {
        toml::from_str(content)
            .map_err(|e| PassbakeError::ConfigParse(e.to_string()))
    }

    /// Load a configuration from a TOML file. Missing sections use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Io`] if the file cannot be read, or
    /// [`PassbakeError::ConfigParse`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, PassbakeError> {
        let content =
            std::fs::read_to_string(path).map_err(PassbakeError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty-printed TOML.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::ConfigParse`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, PassbakeError> {
        toml::to_string_pretty(self)
            .map_err(|e| PassbakeError::ConfigParse(e.to_string()))
    }

    /// Save the configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError`] on serialization or I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), PassbakeError> {
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PassbakeError::Io)?;
        }
        std::fs::write(path, content).map_err(PassbakeError::Io)
    }

    /// Look up a target declaration by name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&TargetDecl> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Look up a pass declaration by name.
    #[must_use]
    pub fn pass(&self, name: &str) -> Option<&PassDecl> {
        self.passes.iter().find(|p| p.name == name)
    }

    /// Look up a filter kernel by name.
    #[must_use]
    pub fn filter_kernel(&self, name: &str) -> Option<&FilterKernelDecl> {
        self.filter_kernels.iter().find(|k| k.name == name)
    }
}
