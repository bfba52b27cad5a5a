//! The pass engine: one frame configuration baked against one backend.
//!
//! `PassEngine` owns the physical targets, the state cache and the virtual
//! targets, re-bakes whenever something they depend on changes, and
//! publishes each successful bake so [`render`](PassEngine::render) (or an
//! executor on another thread holding the [`ScheduleReader`]) picks it up.

use std::sync::Arc;

use crate::config::{FrameConfig, TargetFormat};
use crate::error::PassbakeError;
use crate::gpu::RenderBackend;
use crate::renderer::{
    bake, schedule_channel, BakeError, FrameExecutor, FrameInputs, PassTable,
    ScheduleReader, SchedulePublisher, StateCache, TargetId, TargetRegistry,
    VirtualTargets,
};

/// Everything one configuration creates on the backend.
struct Baked {
    registry: TargetRegistry,
    states: StateCache,
    virtuals: VirtualTargets,
    table: PassTable,
}

/// Create the resources of `config` and bake it. Nothing survives a failure.
fn build<B: RenderBackend + ?Sized>(
    config: &FrameConfig,
    screen: (u32, u32),
    backend: &mut B,
    generation: u64,
) -> Result<Baked, BakeError> {
    let mut registry = TargetRegistry::from_config(&config.targets, screen, backend)?;
    let mut states = match StateCache::from_config(config, backend) {
        Ok(states) => states,
        Err(e) => {
            registry.destroy_all(backend);
            return Err(e);
        }
    };
    let mut virtuals = VirtualTargets::new();
    match bake(
        config,
        &mut registry,
        &mut virtuals,
        &mut states,
        backend,
        generation,
    ) {
        Ok(table) => Ok(Baked {
            registry,
            states,
            virtuals,
            table,
        }),
        Err(e) => {
            states.destroy_all(backend);
            registry.destroy_all(backend);
            Err(e)
        }
    }
}

/// Owns a backend and the baked schedule of one frame configuration.
pub struct PassEngine<B: RenderBackend> {
    backend: B,
    config: FrameConfig,
    registry: TargetRegistry,
    states: StateCache,
    virtuals: VirtualTargets,
    publisher: SchedulePublisher,
    reader: Option<ScheduleReader>,
    executor: FrameExecutor,
    generation: u64,
    shut_down: bool,
}

impl<B: RenderBackend> PassEngine<B> {
    /// Create every target and state of `config` at `screen` size, bake the
    /// pass chain and publish it.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Bake`] if the configuration is invalid or
    /// does not bake; no backend resources are left behind.
    pub fn new(
        mut backend: B,
        config: FrameConfig,
        screen: (u32, u32),
    ) -> Result<Self, PassbakeError> {
        let Baked {
            registry,
            states,
            virtuals,
            table,
        } = build(&config, screen, &mut backend, 1)?;
        let (mut publisher, reader) = schedule_channel();
        let _ = publisher.publish(table);
        log::info!(
            "engine ready at {}x{}: {} targets, {} states",
            screen.0,
            screen.1,
            registry.len(),
            states.len()
        );
        Ok(Self {
            backend,
            config,
            registry,
            states,
            virtuals,
            publisher,
            reader: Some(reader),
            executor: FrameExecutor::new(),
            generation: 1,
            shut_down: false,
        })
    }

    /// Replace the configuration. The new targets and states are built and
    /// baked beside the old ones; only on success are the old ones destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Bake`] on failure, in which case the previous
    /// configuration and schedule stay in effect.
    pub fn reload(&mut self, config: FrameConfig) -> Result<(), PassbakeError> {
        let generation = self.generation + 1;
        let screen = self.registry.screen();
        let baked = match build(&config, screen, &mut self.backend, generation) {
            Ok(baked) => baked,
            Err(e) => {
                log::error!("reload failed, keeping generation {}: {e}", self.generation);
                return Err(e.into());
            }
        };

        self.states.destroy_all(&mut self.backend);
        self.registry.destroy_all(&mut self.backend);
        self.registry = baked.registry;
        self.states = baked.states;
        self.virtuals = baked.virtuals;
        self.config = config;
        self.generation = generation;
        let _ = self.publisher.publish(baked.table);
        log::info!("reloaded as generation {generation}");
        Ok(())
    }

    /// Bake only the passes of view set `name`, or every pass for `None`.
    /// Goes through [`reload`](Self::reload), so resources are rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Bake`] if the set is unknown or does not
    /// bake; the previous set stays active.
    pub fn set_view_set(&mut self, name: Option<&str>) -> Result<(), PassbakeError> {
        let mut config = self.config.clone();
        config.view_set = name.map(str::to_owned);
        self.reload(config)
    }

    /// Recreate screen-relative targets at `width` × `height` and re-bake.
    /// Zero-sized requests (minimised windows) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Bake`] if a target cannot be recreated or
    /// the chain no longer bakes. The stale schedule is withdrawn, so
    /// nothing renders until a later resize or reload succeeds.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), PassbakeError> {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {width}x{height}");
            return Ok(());
        }
        if self.registry.screen() == (width, height) && self.publisher.current().is_some() {
            return Ok(());
        }

        if let Err(e) = self.registry.resize((width, height), &mut self.backend) {
            self.publisher.retract();
            log::error!("resize to {width}x{height} failed: {e}");
            return Err(e.into());
        }
        self.rebake()
    }

    /// Change the format of a declared target and re-bake.
    ///
    /// # Errors
    ///
    /// Returns [`PassbakeError::Bake`] if the target is unknown, is a
    /// presentation target, cannot be recreated, or the chain no longer
    /// bakes. A stale schedule is withdrawn.
    pub fn change_format(
        &mut self,
        target: &str,
        format: TargetFormat,
    ) -> Result<(), PassbakeError> {
        let id = TargetId::from_name(target);
        if let Err(e) = self.registry.change_format(id, format, &mut self.backend) {
            if self.registry.find(id).is_some_and(|t| !t.handle.is_valid()) {
                self.publisher.retract();
            }
            return Err(e.into());
        }
        if let Some(decl) = self.config.targets.iter_mut().find(|t| t.name == target) {
            decl.format = format;
        }
        self.rebake()
    }

    fn rebake(&mut self) -> Result<(), PassbakeError> {
        let generation = self.generation + 1;
        match bake(
            &self.config,
            &mut self.registry,
            &mut self.virtuals,
            &mut self.states,
            &mut self.backend,
            generation,
        ) {
            Ok(table) => {
                self.generation = generation;
                let _ = self.publisher.publish(table);
                Ok(())
            }
            Err(e) => {
                self.publisher.retract();
                log::error!("re-bake failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Execute the latest published schedule. Returns the number of passes
    /// drawn; zero when nothing is published.
    pub fn render(&mut self, inputs: &FrameInputs) -> usize {
        if self.shut_down {
            return 0;
        }
        let table = match self.reader.as_mut() {
            Some(reader) => reader.latest(),
            None => self.publisher.current().map(Arc::as_ref),
        };
        table.map_or(0, |table| {
            self.executor.execute(table, inputs, &mut self.backend)
        })
    }

    /// Destroy every target, state and pipeline and withdraw the schedule.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.publisher.retract();
        self.states.destroy_all(&mut self.backend);
        self.registry.destroy_all(&mut self.backend);
        self.virtuals.clear();
        self.shut_down = true;
        log::info!("engine shut down after {} frames", self.executor.frames());
    }

    /// Hand the reading end of the schedule to an executor elsewhere.
    /// Afterwards [`render`](Self::render) reads the publisher's copy.
    pub fn take_reader(&mut self) -> Option<ScheduleReader> {
        self.reader.take()
    }

    /// The most recently published table.
    #[must_use]
    pub fn table(&self) -> Option<&Arc<PassTable>> {
        self.publisher.current()
    }

    /// Bake generation of the current table.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// The physical targets.
    #[must_use]
    pub const fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// The state object cache.
    #[must_use]
    pub const fn states(&self) -> &StateCache {
        &self.states
    }

    /// The backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably (e.g. to register techniques or begin a frame).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Frames rendered so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.executor.frames()
    }
}

impl<B: RenderBackend> Drop for PassEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
