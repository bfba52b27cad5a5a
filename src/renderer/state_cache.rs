//! Pipeline state object cache.
//!
//! Named states are resolved to backend handles once per load. Identical
//! content is created once and shared, keyed by its content hash; a
//! `default` state of each kind always exists. Pipelines are memoised the
//! same way so baking the same chain twice creates nothing new.

use rustc_hash::FxHashMap;

use super::error::BakeError;
use crate::config::{FrameConfig, RenderState, StateKind};
use crate::gpu::{GpuHandle, PipelineDesc, RenderBackend};
use crate::util::hash::{content_hash, hash_name};

/// Name every state kind falls back to.
pub const DEFAULT_STATE: &str = "default";

/// Resolves state names to shared backend handles.
#[derive(Debug, Default)]
pub struct StateCache {
    named: FxHashMap<(StateKind, u64), GpuHandle>,
    by_content: FxHashMap<u64, GpuHandle>,
    pipelines: FxHashMap<u64, GpuHandle>,
}

impl StateCache {
    /// Create every declared state plus the per-kind defaults. A declared
    /// state named `default` replaces the built-in one. Nothing stays
    /// allocated on failure.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::StateCreation`] if the backend rejects a state.
    pub fn from_config<B: RenderBackend + ?Sized>(
        config: &FrameConfig,
        backend: &mut B,
    ) -> Result<Self, BakeError> {
        let mut cache = Self::default();
        let result = cache.register_all(config, backend);
        if let Err(e) = result {
            cache.destroy_all(backend);
            return Err(e);
        }
        log::debug!(
            "state cache: {} named states, {} unique objects",
            cache.named.len(),
            cache.by_content.len()
        );
        Ok(cache)
    }

    fn register_all<B: RenderBackend + ?Sized>(
        &mut self,
        config: &FrameConfig,
        backend: &mut B,
    ) -> Result<(), BakeError> {
        for kind in StateKind::ALL {
            let _ = self.register(DEFAULT_STATE, &RenderState::default_of(kind), backend)?;
        }
        for decl in &config.sampler_states {
            let _ = self.register(&decl.name, &RenderState::Sampler(decl.state), backend)?;
        }
        for decl in &config.raster_states {
            let _ = self.register(&decl.name, &RenderState::Raster(decl.state), backend)?;
        }
        for decl in &config.blend_states {
            let _ = self.register(&decl.name, &RenderState::Blend(decl.state), backend)?;
        }
        for decl in &config.depth_stencil_states {
            let _ = self.register(
                &decl.name,
                &RenderState::DepthStencil(decl.state),
                backend,
            )?;
        }
        Ok(())
    }

    /// Bind `name` to the object for `state`, creating it if no identical
    /// state exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::StateCreation`] if the backend rejects the state.
    pub fn register<B: RenderBackend + ?Sized>(
        &mut self,
        name: &str,
        state: &RenderState,
        backend: &mut B,
    ) -> Result<GpuHandle, BakeError> {
        let handle = self.get_or_create(name, state, backend)?;
        let _ = self.named.insert((state.kind(), hash_name(name)), handle);
        Ok(handle)
    }

    /// The object for `state`, created on first request.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::StateCreation`] if the backend rejects the state.
    pub fn get_or_create<B: RenderBackend + ?Sized>(
        &mut self,
        label: &str,
        state: &RenderState,
        backend: &mut B,
    ) -> Result<GpuHandle, BakeError> {
        let hash = content_hash(state);
        if let Some(&handle) = self.by_content.get(&hash) {
            return Ok(handle);
        }
        let handle = backend.create_state(state).map_err(|source| {
            BakeError::StateCreation {
                name: label.to_owned(),
                source,
            }
        })?;
        let _ = self.by_content.insert(hash, handle);
        Ok(handle)
    }

    /// Handle of the `kind` state called `name`.
    #[must_use]
    pub fn lookup(&self, kind: StateKind, name: &str) -> Option<GpuHandle> {
        self.named.get(&(kind, hash_name(name))).copied()
    }

    /// The pipeline for `desc`, created on first request.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::StateCreation`] if the backend rejects the
    /// pipeline.
    pub fn pipeline<B: RenderBackend + ?Sized>(
        &mut self,
        desc: &PipelineDesc,
        backend: &mut B,
    ) -> Result<GpuHandle, BakeError> {
        let hash = content_hash(desc);
        if let Some(&handle) = self.pipelines.get(&hash) {
            return Ok(handle);
        }
        let handle = backend.create_pipeline(desc).map_err(|source| {
            BakeError::StateCreation {
                name: desc.technique.clone(),
                source,
            }
        })?;
        log::debug!("created pipeline {handle} for '{}'", desc.technique);
        let _ = self.pipelines.insert(hash, handle);
        Ok(handle)
    }

    /// Number of unique state objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_content.len()
    }

    /// Whether no state objects exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_content.is_empty()
    }

    /// Number of pipeline objects.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Destroy every pipeline and state object.
    pub fn destroy_all<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, handle) in self.pipelines.drain() {
            backend.destroy_state(handle);
        }
        for (_, handle) in self.by_content.drain() {
            backend.destroy_state(handle);
        }
        self.named.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::BLOOM_TOML;
    use crate::config::{AddressMode, SamplerState, SamplerStateDecl, TargetFormat};
    use crate::gpu::RecordingBackend;

    fn bloom_cache(backend: &mut RecordingBackend) -> StateCache {
        let config = FrameConfig::from_toml_str(BLOOM_TOML).unwrap();
        StateCache::from_config(&config, backend).unwrap()
    }

    #[test]
    fn defaults_exist_for_every_kind() {
        let mut backend = RecordingBackend::new();
        let cache =
            StateCache::from_config(&FrameConfig::default(), &mut backend)
                .unwrap();
        for kind in StateKind::ALL {
            assert!(cache.lookup(kind, DEFAULT_STATE).is_some());
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(backend.live_states(), 4);
    }

    #[test]
    fn identical_content_shares_one_handle() {
        let mut backend = RecordingBackend::new();
        let cache = bloom_cache(&mut backend);
        let a = cache.lookup(StateKind::Sampler, "clamp_linear").unwrap();
        let b = cache.lookup(StateKind::Sampler, "post_sampler").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, cache.lookup(StateKind::Sampler, DEFAULT_STATE).unwrap());
        // 4 defaults + clamp sampler + no_cull + additive + depth_less
        assert_eq!(cache.len(), 8);
        assert_eq!(backend.live_states(), 8);
    }

    #[test]
    fn lookup_is_per_kind() {
        let mut backend = RecordingBackend::new();
        let cache = bloom_cache(&mut backend);
        assert!(cache.lookup(StateKind::Raster, "no_cull").is_some());
        assert!(cache.lookup(StateKind::Blend, "no_cull").is_none());
        assert!(cache.lookup(StateKind::Sampler, "missing").is_none());
    }

    #[test]
    fn declared_default_overrides_builtin() {
        let mut backend = RecordingBackend::new();
        let config = FrameConfig {
            sampler_states: vec![SamplerStateDecl {
                name: DEFAULT_STATE.to_owned(),
                state: SamplerState {
                    address_u: AddressMode::Clamp,
                    ..SamplerState::default()
                },
            }],
            ..FrameConfig::default()
        };
        let cache = StateCache::from_config(&config, &mut backend).unwrap();
        let handle = cache.lookup(StateKind::Sampler, DEFAULT_STATE).unwrap();
        match backend.state(handle) {
            Some(crate::gpu::StateRecord::State(RenderState::Sampler(s))) => {
                assert_eq!(s.address_u, AddressMode::Clamp);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pipelines_are_memoised() {
        let mut backend = RecordingBackend::new();
        let mut cache = bloom_cache(&mut backend);
        let desc = PipelineDesc {
            technique: "blur".to_owned(),
            raster: cache.lookup(StateKind::Raster, DEFAULT_STATE).unwrap(),
            blend: cache.lookup(StateKind::Blend, DEFAULT_STATE).unwrap(),
            depth_stencil: cache
                .lookup(StateKind::DepthStencil, DEFAULT_STATE)
                .unwrap(),
            colour_formats: vec![TargetFormat::Rgba16f],
            depth_format: None,
            sample_count: 1,
            scene: false,
        };
        let a = cache.pipeline(&desc, &mut backend).unwrap();
        let b = cache.pipeline(&desc, &mut backend).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.pipeline_count(), 1);

        let other = PipelineDesc {
            colour_formats: vec![TargetFormat::Rgba8],
            ..desc
        };
        assert_ne!(cache.pipeline(&other, &mut backend).unwrap(), a);

        let before = backend.live_states();
        cache.destroy_all(&mut backend);
        assert_eq!(backend.live_states(), before - 10);
        assert!(cache.is_empty());
    }
}
