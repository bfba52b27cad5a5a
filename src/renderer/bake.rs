//! Resolve authored passes into a [`PassTable`].
//!
//! One forward sweep: for every enabled pass of the active view set, bind
//! its inputs from the READ slots, bind its outputs through the allocator,
//! check the result, fetch its pipeline, then swap. Any failure aborts the
//! whole bake.

use rustc_hash::FxHashSet;

use super::allocator::{BakeSession, VirtualTargets};
use super::error::BakeError;
use super::pass_table::{
    KernelConstants, OutputBinding, PassDescriptor, PassDraw, PassTable,
    TextureBinding,
};
use super::registry::{TargetId, TargetRegistry};
use super::state_cache::StateCache;
use crate::config::{FrameConfig, PassDecl, PassKind, StateKind};
use crate::gpu::{
    ClearValues, GpuHandle, PipelineDesc, PixelRect, RenderBackend,
    SceneFlags, MAX_FILTER_TAPS, PARAMETER_SLOTS,
};

/// Most colour outputs a pass may bind at once.
pub const MAX_COLOUR_OUTPUTS: usize = 8;

/// Most texture units a pass may bind; units run from 0 to this minus one.
pub const MAX_INPUTS: usize = 8;

/// The passes `config` bakes, in order: the active view set's list, or
/// every pass when no view set is active.
///
/// # Errors
///
/// Returns [`BakeError::InvalidViewSet`] if the active set is not declared
/// or lists an unknown pass.
pub fn scheduled_passes(
    config: &FrameConfig,
) -> Result<Vec<&PassDecl>, BakeError> {
    let Some(set) = config.view_set.as_deref() else {
        return Ok(config.passes.iter().collect());
    };
    let invalid_set = |reason: String| BakeError::InvalidViewSet {
        set: set.to_owned(),
        reason,
    };
    let names = config
        .view_sets
        .get(set)
        .ok_or_else(|| invalid_set("not declared".to_owned()))?;
    names
        .iter()
        .map(|name| {
            config
                .pass(name)
                .ok_or_else(|| invalid_set(format!("unknown pass '{name}'")))
        })
        .collect()
}

/// Bake the scheduled passes of `config` in order against `registry`.
///
/// Clones created before a failure stay in the registry's pool and are
/// reused by the next bake.
///
/// # Errors
///
/// Returns the first [`BakeError`] any pass hits; no table is produced.
pub fn bake<B: RenderBackend + ?Sized>(
    config: &FrameConfig,
    registry: &mut TargetRegistry,
    virtuals: &mut VirtualTargets,
    states: &mut StateCache,
    backend: &mut B,
    generation: u64,
) -> Result<PassTable, BakeError> {
    let passes = scheduled_passes(config)?;
    let screen = registry.screen();
    let mut session = virtuals.begin(registry);
    let mut baked = Vec::with_capacity(passes.len());

    for decl in passes {
        if !decl.enabled {
            log::warn!("skipping disabled pass '{}'", decl.name);
            continue;
        }
        let pass = bake_pass(config, decl, &mut session, states, backend)?;
        log::debug!(
            "baked '{}': {} outputs, {} inputs, pipeline {}",
            pass.name,
            pass.outputs.len() + usize::from(pass.depth.is_some()),
            pass.inputs.len(),
            pass.pipeline
        );
        baked.push(pass);
    }

    let auxiliary_created = session.clones_created();
    drop(session);

    let table = PassTable {
        passes: baked,
        generation,
        screen,
        auxiliary_created,
        auxiliary_total: registry.clone_count(),
        memory_bytes: registry.memory_bytes(),
    };
    log::info!(
        "bake {generation}: {} passes, {} auxiliary targets ({} new), {} KiB",
        table.len(),
        table.auxiliary_total,
        table.auxiliary_created,
        table.memory_bytes / 1024
    );
    Ok(table)
}

fn bake_pass<B: RenderBackend + ?Sized>(
    config: &FrameConfig,
    decl: &PassDecl,
    session: &mut BakeSession<'_>,
    states: &mut StateCache,
    backend: &mut B,
) -> Result<PassDescriptor, BakeError> {
    validate_pass(decl, session.registry())?;
    let kernel = resolve_kernel(config, decl)?;
    let parameters = pack_parameters(decl)?;

    let sampled: Vec<TargetId> = decl
        .inputs
        .iter()
        .map(|input| TargetId::from_name(&input.texture))
        .collect();
    session.begin_pass(&decl.name, &sampled);

    let inputs = resolve_inputs(decl, session, states)?;

    let mut outputs = Vec::with_capacity(decl.targets.len());
    for name in &decl.targets {
        outputs.push(resolve_output(decl, name, session, backend)?);
    }
    let depth = decl
        .depth_target
        .as_deref()
        .map(|name| resolve_output(decl, name, session, backend))
        .transpose()?;

    let size = check_dimensions(decl, &outputs, depth.as_ref(), session.registry())?;

    let mut pass = PassDescriptor {
        name: decl.name.clone(),
        technique: decl.technique.clone(),
        colour: outputs.iter().map(|o| o.handle).collect(),
        outputs,
        depth,
        inputs,
        pipeline: GpuHandle::INVALID,
        clear: ClearValues {
            colour: decl.clear_colour,
            depth: decl.clear_depth,
            stencil: decl.clear_stencil,
        },
        viewport: PixelRect::from_normalized(decl.viewport, size.0, size.1),
        size,
        draw: match decl.kind {
            PassKind::Fullscreen => PassDraw::Fullscreen,
            PassKind::Scene => PassDraw::Scene {
                flags: SceneFlags::from_filters(&decl.render_flags),
                camera: decl.camera.clone(),
            },
        },
        kernel,
        parameters,
    };

    if let Some(input) = pass.aliased_input() {
        return Err(BakeError::ReadWriteHazard {
            pass: decl.name.clone(),
            target: input.name.clone(),
        });
    }

    pass.pipeline = build_pipeline(decl, &pass, session.registry(), states, backend)?;
    session.end_pass();
    Ok(pass)
}

fn invalid(decl: &PassDecl, reason: impl Into<String>) -> BakeError {
    BakeError::InvalidPass {
        pass: decl.name.clone(),
        reason: reason.into(),
    }
}

fn validate_pass(
    decl: &PassDecl,
    registry: &TargetRegistry,
) -> Result<(), BakeError> {
    if decl.targets.is_empty() && decl.depth_target.is_none() {
        return Err(invalid(decl, "no outputs"));
    }
    if decl.targets.len() > MAX_COLOUR_OUTPUTS {
        return Err(invalid(
            decl,
            format!(
                "{} colour outputs, at most {MAX_COLOUR_OUTPUTS} allowed",
                decl.targets.len()
            ),
        ));
    }

    let mut seen = FxHashSet::default();
    for name in decl.targets.iter().chain(decl.depth_target.as_ref()) {
        let Some(target) = registry.by_name(name) else {
            return Err(BakeError::UnknownTarget {
                pass: decl.name.clone(),
                target: name.clone(),
            });
        };
        if !seen.insert(name.as_str()) {
            return Err(invalid(decl, format!("'{name}' is written twice")));
        }
        let is_depth_slot = decl.depth_target.as_ref() == Some(name);
        if target.format.is_depth() != is_depth_slot {
            return Err(invalid(
                decl,
                format!("'{name}' has format {:?}", target.format),
            ));
        }
    }

    validate_viewport(decl)?;
    validate_inputs(decl, registry)
}

/// The normalized viewport must be a non-empty rect inside `[0, 1]`.
fn validate_viewport(decl: &PassDecl) -> Result<(), BakeError> {
    let [x, y, w, h] = decl.viewport;
    let inside = decl.viewport.iter().all(|v| v.is_finite())
        && x >= 0.0
        && y >= 0.0
        && w > 0.0
        && h > 0.0
        && x + w <= 1.0 + f32::EPSILON
        && y + h <= 1.0 + f32::EPSILON;
    if inside {
        Ok(())
    } else {
        Err(invalid(
            decl,
            format!(
                "viewport {:?} is not a non-empty rect inside [0, 1]",
                decl.viewport
            ),
        ))
    }
}

fn validate_inputs(
    decl: &PassDecl,
    registry: &TargetRegistry,
) -> Result<(), BakeError> {
    let mut units = FxHashSet::default();
    for input in &decl.inputs {
        if !usize::try_from(input.unit).is_ok_and(|unit| unit < MAX_INPUTS) {
            return Err(invalid(
                decl,
                format!(
                    "texture unit {} out of range, at most {} units",
                    input.unit, MAX_INPUTS
                ),
            ));
        }
        let Some(target) = registry.by_name(&input.texture) else {
            return Err(BakeError::UnknownTarget {
                pass: decl.name.clone(),
                target: input.texture.clone(),
            });
        };
        if target.is_write_only() {
            return Err(invalid(
                decl,
                format!("samples write-only target '{}'", input.texture),
            ));
        }
        if !units.insert(input.unit) {
            return Err(invalid(
                decl,
                format!("texture unit {} bound twice", input.unit),
            ));
        }
    }
    Ok(())
}

/// Lay out the pass's filter kernel for the constants block.
fn resolve_kernel(
    config: &FrameConfig,
    decl: &PassDecl,
) -> Result<KernelConstants, BakeError> {
    let (name, direction) = match (&decl.filter_kernel, decl.filter_direction) {
        (None, None) => return Ok(KernelConstants::default()),
        (Some(name), Some(direction)) => (name, direction),
        (Some(_), None) => {
            return Err(invalid(decl, "filter_kernel without filter_direction"));
        }
        (None, Some(_)) => {
            return Err(invalid(decl, "filter_direction without filter_kernel"));
        }
    };
    let kernel = config
        .filter_kernel(name)
        .ok_or_else(|| invalid(decl, format!("unknown filter kernel '{name}'")))?;
    let taps = kernel.taps();
    if taps == 0 || taps > MAX_FILTER_TAPS {
        return Err(invalid(
            decl,
            format!(
                "filter kernel '{name}' has {taps} taps, 1 to {MAX_FILTER_TAPS} allowed"
            ),
        ));
    }
    let [dx, dy] = direction.vector();
    if !(dx.is_finite() && dy.is_finite()) {
        return Err(invalid(decl, "filter_direction is not finite"));
    }

    let mut constants = KernelConstants {
        info: [dx, dy, taps as f32, 0.0],
        ..KernelConstants::default()
    };
    for (i, slot) in constants.taps.iter_mut().take(taps).enumerate() {
        let (offset, weight) = kernel.tap(i);
        *slot = [offset, weight, 0.0, 0.0];
    }
    Ok(constants)
}

/// Pack the pass's parameters four to a slot.
fn pack_parameters(
    decl: &PassDecl,
) -> Result<[[f32; 4]; PARAMETER_SLOTS], BakeError> {
    let capacity = PARAMETER_SLOTS * 4;
    if decl.parameters.len() > capacity {
        return Err(invalid(
            decl,
            format!(
                "{} parameters, at most {capacity} allowed",
                decl.parameters.len()
            ),
        ));
    }
    let mut packed = [[0.0; 4]; PARAMETER_SLOTS];
    for (i, &value) in decl.parameters.iter().enumerate() {
        if !value.is_finite() {
            return Err(invalid(decl, format!("parameter {i} is not finite")));
        }
        packed[i / 4][i % 4] = value;
    }
    Ok(packed)
}

fn resolve_inputs(
    decl: &PassDecl,
    session: &mut BakeSession<'_>,
    states: &StateCache,
) -> Result<Vec<TextureBinding>, BakeError> {
    decl.inputs
        .iter()
        .map(|input| {
            let target = TargetId::from_name(&input.texture);
            let index = session.resolve_read(target)?;
            let sampler = states
                .lookup(StateKind::Sampler, &input.sampler)
                .ok_or_else(|| BakeError::UnknownState {
                    pass: decl.name.clone(),
                    kind: StateKind::Sampler,
                    name: input.sampler.clone(),
                })?;
            Ok(TextureBinding {
                target,
                name: input.texture.clone(),
                handle: session.registry().get(index).handle,
                sampler,
                unit: input.unit,
            })
        })
        .collect()
}

fn resolve_output<B: RenderBackend + ?Sized>(
    decl: &PassDecl,
    name: &str,
    session: &mut BakeSession<'_>,
    backend: &mut B,
) -> Result<OutputBinding, BakeError> {
    let target = TargetId::from_name(name);
    let index = if decl.direct_write {
        session.write_direct(target)?
    } else {
        session.resolve_write(target, backend)?
    };
    Ok(OutputBinding {
        target,
        name: name.to_owned(),
        handle: session.registry().get(index).handle,
    })
}

fn check_dimensions(
    decl: &PassDecl,
    outputs: &[OutputBinding],
    depth: Option<&OutputBinding>,
    registry: &TargetRegistry,
) -> Result<(u32, u32), BakeError> {
    let size_of = |output: &OutputBinding| {
        registry
            .find(output.target)
            .map_or((0, 0), |t| (t.width, t.height))
    };
    let mut all = outputs.iter().chain(depth);
    let Some(first) = all.next() else {
        return Err(invalid(decl, "no outputs"));
    };
    let size = size_of(first);
    for other in all {
        let other_size = size_of(other);
        if other_size != size {
            return Err(BakeError::DimensionMismatch {
                pass: decl.name.clone(),
                target: first.name.clone(),
                size,
                other: other.name.clone(),
                other_size,
            });
        }
    }
    Ok(size)
}

fn lookup_state(
    decl: &PassDecl,
    states: &StateCache,
    kind: StateKind,
    name: &str,
) -> Result<GpuHandle, BakeError> {
    states
        .lookup(kind, name)
        .ok_or_else(|| BakeError::UnknownState {
            pass: decl.name.clone(),
            kind,
            name: name.to_owned(),
        })
}

fn build_pipeline<B: RenderBackend + ?Sized>(
    decl: &PassDecl,
    pass: &PassDescriptor,
    registry: &TargetRegistry,
    states: &mut StateCache,
    backend: &mut B,
) -> Result<GpuHandle, BakeError> {
    let format_of = |output: &OutputBinding| {
        registry.find(output.target).map(|t| (t.format, t.sample_count))
    };
    let colour_formats = pass
        .outputs
        .iter()
        .filter_map(|o| format_of(o).map(|(format, _)| format))
        .collect();
    let depth_format = pass
        .depth
        .as_ref()
        .and_then(format_of)
        .map(|(format, _)| format);
    let sample_count = pass
        .all_outputs()
        .next()
        .and_then(format_of)
        .map_or(1, |(_, samples)| samples);

    let desc = PipelineDesc {
        technique: decl.technique.clone(),
        raster: lookup_state(decl, states, StateKind::Raster, &decl.raster_state)?,
        blend: lookup_state(decl, states, StateKind::Blend, &decl.blend_state)?,
        depth_stencil: lookup_state(
            decl,
            states,
            StateKind::DepthStencil,
            &decl.depth_stencil_state,
        )?,
        colour_formats,
        depth_format,
        sample_count,
        scene: pass.is_scene(),
    };
    states.pipeline(&desc, backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::BLOOM_TOML;
    use crate::config::{
        FilterDirection, FilterKernelDecl, FrameConfig, ScreenRatio, TargetDecl,
        TargetFormat, TargetSize,
    };
    use crate::gpu::RecordingBackend;
    use crate::renderer::registry::MAIN_COLOUR;

    struct Fixture {
        backend: RecordingBackend,
        registry: TargetRegistry,
        virtuals: VirtualTargets,
        states: StateCache,
        config: FrameConfig,
    }

    impl Fixture {
        fn new(config: FrameConfig) -> Self {
            let mut backend = RecordingBackend::new();
            let registry = TargetRegistry::from_config(
                &config.targets,
                (1280, 720),
                &mut backend,
            )
            .unwrap();
            let states = StateCache::from_config(&config, &mut backend).unwrap();
            Self {
                backend,
                registry,
                virtuals: VirtualTargets::new(),
                states,
                config,
            }
        }

        fn bloom() -> Self {
            Self::new(FrameConfig::from_toml_str(BLOOM_TOML).unwrap())
        }

        fn bake(&mut self) -> Result<PassTable, BakeError> {
            bake(
                &self.config,
                &mut self.registry,
                &mut self.virtuals,
                &mut self.states,
                &mut self.backend,
                1,
            )
        }

        fn handle(&self, name: &str) -> GpuHandle {
            self.registry.by_name(name).unwrap().handle
        }
    }

    fn fixed(name: &str) -> TargetDecl {
        TargetDecl::new(name, TargetSize::Fixed([64, 64]), TargetFormat::Rgba8)
    }

    #[test]
    fn bloom_chain_ping_pongs_through_one_clone() {
        let mut fx = Fixture::bloom();
        let table = fx.bake().unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.auxiliary_created, 1);
        assert_eq!(fx.registry.clone_count(), 1);

        let scene = fx.handle("scene_colour");
        let bloom = fx.handle("bloom");

        let main = table.pass("main").unwrap();
        assert_eq!(main.colour, vec![scene]);
        assert_eq!(main.depth_handle(), Some(fx.handle("scene_depth")));
        assert!(main.is_scene());

        let bright = table.pass("bright_pass").unwrap();
        assert_eq!(bright.inputs[0].handle, scene);
        assert_eq!(bright.colour, vec![bloom]);
        assert_eq!(bright.size, (640, 360));

        let blur_x = table.pass("blur_x").unwrap();
        assert_eq!(blur_x.inputs[0].handle, bloom);
        let aux = blur_x.colour[0];
        assert_ne!(aux, bloom);

        let blur_y = table.pass("blur_y").unwrap();
        assert_eq!(blur_y.inputs[0].handle, aux);
        assert_eq!(blur_y.colour, vec![bloom]);

        let composite = table.pass("composite").unwrap();
        assert_eq!(composite.colour, vec![GpuHandle::BACK_BUFFER_COLOUR]);
        assert_eq!(composite.inputs[0].handle, scene);
        assert_eq!(composite.inputs[1].handle, bloom);
        assert_eq!(composite.size, (1280, 720));

        // clamp_linear and post_sampler share one sampler object.
        assert_eq!(bright.inputs[0].sampler, blur_x.inputs[0].sampler);
        // Both blur directions run the same pipeline.
        assert_eq!(blur_x.pipeline, blur_y.pipeline);
    }

    #[test]
    fn later_writer_reuses_freed_buffer() {
        let config = FrameConfig {
            targets: vec![fixed("a").write_only(), fixed("b"), fixed("c")],
            passes: vec![
                PassDecl::fullscreen("p1", "fill").output("b"),
                PassDecl::fullscreen("p2", "copy").output("c").input("b", 0),
                PassDecl::fullscreen("p3", "copy").output("b").input("c", 0),
                PassDecl::fullscreen("p4", "copy").output("a").input("b", 0),
            ],
            ..FrameConfig::default()
        };
        let mut fx = Fixture::new(config);
        let table = fx.bake().unwrap();
        let p1 = table.pass("p1").unwrap().colour[0];
        let p3 = table.pass("p3").unwrap().colour[0];
        assert_eq!(p1, p3);
        assert_eq!(table.pass("p4").unwrap().inputs[0].handle, p3);
        assert_eq!(table.auxiliary_created, 0);
    }

    #[test]
    fn rebaking_repeats_the_aliasing_pattern() {
        let mut fx = Fixture::bloom();
        let first = fx.bake().unwrap();
        let created = fx.backend.targets_created();
        let pipelines = fx.states.pipeline_count();
        let second = fx.bake().unwrap();
        assert_eq!(second.auxiliary_created, 0);
        assert_eq!(fx.backend.targets_created(), created);
        assert_eq!(fx.states.pipeline_count(), pipelines);
        assert_eq!(first.aliasing_pattern(), second.aliasing_pattern());
        assert_eq!(first.passes, second.passes);
    }

    #[test]
    fn no_pass_aliases_its_inputs() {
        let mut fx = Fixture::bloom();
        let table = fx.bake().unwrap();
        for pass in &table.passes {
            assert!(pass.aliased_input().is_none(), "{}", pass.name);
        }
    }

    #[test]
    fn sampling_before_any_producer_fails() {
        let config = FrameConfig {
            targets: vec![fixed("b")],
            passes: vec![PassDecl::fullscreen("early", "copy")
                .output(MAIN_COLOUR)
                .input("b", 0)],
            ..FrameConfig::default()
        };
        let mut fx = Fixture::new(config);
        assert_eq!(
            fx.bake(),
            Err(BakeError::UnresolvedRead {
                pass: "early".to_owned(),
                target: "b".to_owned(),
            })
        );
    }

    #[test]
    fn unknown_names_are_reported() {
        let mut fx = Fixture::bloom();
        fx.config.passes[1].targets[0] = "blom".to_owned();
        assert!(matches!(
            fx.bake(),
            Err(BakeError::UnknownTarget { ref pass, ref target })
                if pass == "bright_pass" && target == "blom"
        ));

        let mut fx = Fixture::bloom();
        fx.config.passes[2].raster_state = "wireframe".to_owned();
        assert!(matches!(
            fx.bake(),
            Err(BakeError::UnknownState { kind: StateKind::Raster, .. })
        ));

        let mut fx = Fixture::bloom();
        fx.config.passes[2].inputs[0].sampler = "nearest".to_owned();
        assert!(matches!(
            fx.bake(),
            Err(BakeError::UnknownState { kind: StateKind::Sampler, .. })
        ));
    }

    #[test]
    fn mismatched_output_sizes_fail() {
        let config = FrameConfig {
            targets: vec![
                TargetDecl::new(
                    "full",
                    TargetSize::Ratio(ScreenRatio::Equal),
                    TargetFormat::Rgba8,
                ),
                TargetDecl::new(
                    "half",
                    TargetSize::Ratio(ScreenRatio::Half),
                    TargetFormat::Rgba8,
                ),
            ],
            passes: vec![PassDecl::fullscreen("mrt", "gbuffer")
                .output("full")
                .output("half")],
            ..FrameConfig::default()
        };
        let mut fx = Fixture::new(config);
        assert_eq!(
            fx.bake(),
            Err(BakeError::DimensionMismatch {
                pass: "mrt".to_owned(),
                target: "full".to_owned(),
                size: (1280, 720),
                other: "half".to_owned(),
                other_size: (640, 360),
            })
        );
    }

    #[test]
    fn disabled_pass_is_skipped() {
        let mut fx = Fixture::bloom();
        fx.config.passes[3].enabled = false;
        let table = fx.bake().unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.pass("blur_y").is_none());
        // Composite now sees blur_x's output.
        let blur_x = table.pass("blur_x").unwrap().colour[0];
        assert_eq!(table.pass("composite").unwrap().inputs[1].handle, blur_x);
    }

    #[test]
    fn direct_write_into_sampled_buffer_is_a_hazard() {
        let mut fx = Fixture::bloom();
        fx.config.passes[2].direct_write = true;
        assert!(matches!(
            fx.bake(),
            Err(BakeError::ReadWriteHazard { ref pass, .. }) if pass == "blur_x"
        ));
    }

    #[test]
    fn malformed_passes_are_rejected() {
        let mut fx = Fixture::bloom();
        fx.config.passes[4].inputs[1].unit = 0;
        assert!(matches!(fx.bake(), Err(BakeError::InvalidPass { .. })));

        let mut fx = Fixture::bloom();
        fx.config.passes[1].inputs[0].texture = MAIN_COLOUR.to_owned();
        assert!(matches!(fx.bake(), Err(BakeError::InvalidPass { .. })));

        let mut fx = Fixture::bloom();
        fx.config.passes[0].depth_target = Some("scene_colour".to_owned());
        assert!(matches!(fx.bake(), Err(BakeError::InvalidPass { .. })));

        let mut fx = Fixture::bloom();
        fx.config.passes[1].targets = vec!["bloom".to_owned(); 9];
        assert!(matches!(fx.bake(), Err(BakeError::InvalidPass { .. })));
    }

    #[test]
    fn viewport_and_pipeline_follow_outputs() {
        let mut fx = Fixture::bloom();
        fx.config.passes[1].viewport = [0.0, 0.0, 0.5, 0.5];
        let table = fx.bake().unwrap();
        let bright = table.pass("bright_pass").unwrap();
        assert_eq!(bright.viewport.width, 320.0);
        assert_eq!(bright.viewport.height, 180.0);

        let main = table.pass("main").unwrap();
        match fx.backend.state(main.pipeline) {
            Some(crate::gpu::StateRecord::Pipeline(desc)) => {
                assert_eq!(desc.technique, "forward_lit");
                assert_eq!(desc.colour_formats, vec![TargetFormat::Rgba16f]);
                assert_eq!(desc.depth_format, Some(TargetFormat::D24s8));
                assert!(desc.scene);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(main.clear.depth, Some(1.0));
    }

    #[test]
    fn viewport_must_lie_inside_the_outputs() {
        for viewport in [
            [0.5, -1.0, 2.0, f32::NAN],
            [0.0, 0.0, 1.5, 1.0],
            [0.5, 0.0, 0.75, 1.0],
            [0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, f32::INFINITY],
        ] {
            let mut fx = Fixture::bloom();
            fx.config.passes[1].viewport = viewport;
            assert!(
                matches!(
                    fx.bake(),
                    Err(BakeError::InvalidPass { ref pass, .. }) if pass == "bright_pass"
                ),
                "{viewport:?}"
            );
        }

        let mut fx = Fixture::bloom();
        fx.config.passes[1].viewport = [0.5, 0.5, 0.5, 0.5];
        let table = fx.bake().unwrap();
        let rect = table.pass("bright_pass").unwrap().viewport;
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (320.0, 180.0, 320.0, 180.0));
    }

    #[test]
    fn texture_units_stay_below_the_limit() {
        let unit_limit = u32::try_from(MAX_INPUTS).unwrap();
        for unit in [unit_limit, 4_000_000_000] {
            let mut fx = Fixture::bloom();
            fx.config.passes[4].inputs[1].unit = unit;
            assert!(
                matches!(
                    fx.bake(),
                    Err(BakeError::InvalidPass { ref pass, .. }) if pass == "composite"
                ),
                "unit {unit}"
            );
        }

        let mut fx = Fixture::bloom();
        fx.config.passes[4].inputs[1].unit = unit_limit - 1;
        let table = fx.bake().unwrap();
        assert_eq!(table.pass("composite").unwrap().inputs[1].unit, unit_limit - 1);
    }

    #[test]
    fn kernels_and_parameters_land_in_the_descriptor() {
        let mut fx = Fixture::bloom();
        let table = fx.bake().unwrap();

        let blur_x = table.pass("blur_x").unwrap();
        assert_eq!(blur_x.kernel.info, [1.0, 0.0, 5.0, 0.0]);
        assert_eq!(blur_x.kernel.taps[0][0], 0.0);
        assert!((blur_x.kernel.taps[0][1] - 0.227_027).abs() < 1e-6);
        assert_eq!(blur_x.kernel.taps[4][0], 4.0);
        assert!((blur_x.kernel.taps[4][1] - 0.016_216).abs() < 1e-6);
        assert_eq!(blur_x.kernel.taps[5], [0.0; 4]);

        let blur_y = table.pass("blur_y").unwrap();
        assert_eq!(blur_y.kernel.info, [0.0, 1.0, 5.0, 0.0]);
        assert_eq!(blur_y.kernel.taps, blur_x.kernel.taps);

        let bright = table.pass("bright_pass").unwrap();
        assert_eq!(bright.parameters[0], [0.8, 1.0, 0.0, 0.0]);
        assert_eq!(bright.kernel, KernelConstants::default());

        let composite = table.pass("composite").unwrap();
        assert_eq!(composite.parameters, [[0.0; 4]; PARAMETER_SLOTS]);
    }

    #[test]
    fn parameters_pack_four_to_a_slot() {
        let values: Vec<f32> = (0..9u8).map(f32::from).collect();
        let decl = PassDecl::fullscreen("p", "fill").parameters(&values);
        let packed = pack_parameters(&decl).unwrap();
        assert_eq!(packed[0], [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(packed[2], [8.0, 0.0, 0.0, 0.0]);
        assert_eq!(packed[3], [0.0; 4]);
    }

    #[test]
    fn malformed_kernels_and_parameters_are_rejected() {
        let cases: [fn(&mut FrameConfig); 6] = [
            |c| c.passes[2].filter_kernel = Some("box".to_owned()),
            |c| c.passes[2].filter_direction = None,
            |c| c.passes[1].filter_direction = Some(FilterDirection::Vector([1.0, f32::NAN])),
            |c| {
                c.filter_kernels
                    .push(FilterKernelDecl::new("wide", &[0.05; 17], &[]));
                c.passes[2].filter_kernel = Some("wide".to_owned());
            },
            |c| c.passes[1].parameters = vec![1.0; 17],
            |c| c.passes[1].parameters = vec![0.5, f32::NAN],
        ];
        for (i, corrupt) in cases.iter().enumerate() {
            let mut fx = Fixture::bloom();
            corrupt(&mut fx.config);
            assert!(
                matches!(fx.bake(), Err(BakeError::InvalidPass { .. })),
                "case {i}"
            );
        }
    }

    #[test]
    fn view_set_selects_and_orders_passes() {
        let mut fx = Fixture::bloom();
        fx.config.view_set = Some("no_bloom".to_owned());
        let table = fx.bake().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.passes[1].name, "composite");
        // Without a producer, bloom reads its seed: the lit scene.
        let scene = fx.handle("scene_colour");
        assert_eq!(table.passes[1].inputs[1].handle, scene);

        // Sets run in their listed order; bright_pass samples the seed's
        // canonical buffer before main has written it.
        let _ = fx.config.view_sets.insert(
            "threshold_first".to_owned(),
            ["bright_pass", "main", "composite"].map(str::to_owned).to_vec(),
        );
        fx.config.view_set = Some("threshold_first".to_owned());
        let table = fx.bake().unwrap();
        let names: Vec<&str> = table.passes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["bright_pass", "main", "composite"]);
        assert_eq!(table.passes[0].inputs[0].handle, scene);

        fx.config.view_set = Some("missing".to_owned());
        assert!(matches!(
            fx.bake(),
            Err(BakeError::InvalidViewSet { ref set, .. }) if set == "missing"
        ));

        let _ = fx.config.view_sets.insert("typo".to_owned(), vec!["mian".to_owned()]);
        fx.config.view_set = Some("typo".to_owned());
        assert!(matches!(
            fx.bake(),
            Err(BakeError::InvalidViewSet { ref reason, .. }) if reason.contains("mian")
        ));
    }

    /// `n` same-shape targets written by `m` passes in sequence. Each pass
    /// samples the previous pass's output, or with `self_read` the
    /// target it is about to overwrite.
    fn chain(n: usize, m: usize, self_read: bool) -> FrameConfig {
        let name = move |i: usize| format!("t{}", i % n);
        let passes = (0..m)
            .map(|i| {
                let pass = PassDecl::fullscreen(format!("p{i}"), "copy").output(name(i));
                let source = if self_read {
                    i.checked_sub(n).map(|_| name(i))
                } else {
                    i.checked_sub(1).map(name)
                };
                match source {
                    Some(texture) => pass.input(texture, 0),
                    None => pass,
                }
            })
            .collect();
        FrameConfig {
            targets: (0..n).map(|i| fixed(&name(i))).collect(),
            passes,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn auxiliary_pool_stays_bounded() {
        for n in 1..=4 {
            for m in 1..=12 {
                for self_read in [false, true] {
                    let mut fx = Fixture::new(chain(n, m, self_read));
                    let first = fx.bake().unwrap();
                    let clones = fx.registry.clone_count();
                    assert!(
                        clones <= n.min(m) + 1,
                        "n={n} m={m} self_read={self_read}: {clones} clones"
                    );
                    assert!(first.passes.iter().all(|p| p.aliased_input().is_none()));

                    let second = fx.bake().unwrap();
                    assert_eq!(second.auxiliary_created, 0);
                    assert_eq!(fx.registry.clone_count(), clones);
                    assert_eq!(first.aliasing_pattern(), second.aliasing_pattern());
                }
            }
        }
    }
}
