//! [`RenderBackend`] on wgpu.
//!
//! Targets are plain textures; states become samplers or are kept as
//! content until a pipeline needs them. Binding calls only record what the
//! next draw needs: each draw opens one render pass on the frame encoder,
//! sets the pipeline, the per-pass constants (one 256-byte slot of a shared
//! uniform buffer) and a cached input bind group, then draws.
//!
//! The presentation targets are an offscreen colour/depth pair sized by
//! [`WgpuBackend::resize`]; a caller may substitute its own colour view for
//! one frame via [`WgpuBackend::begin_frame`]. That view must be
//! `Rgba8Unorm`, the presentation colour format.

use rustc_hash::FxHashMap;

use super::backend::{
    BackendError, ClearValues, DrawKind, GpuHandle, PassConstants,
    PipelineDesc, PixelRect, RenderBackend, SceneFlags, TargetDesc,
};
use super::pipeline_helpers::{
    colour_target, create_sampler, depth_stencil, dynamic_uniform_buffer,
    input_entries, primitive_state, InputKind,
};
use super::render_context::RenderContext;
use super::texture::RenderTarget;
use crate::config::{
    BlendState, DepthStencilState, RasterState, RenderState, TargetFormat,
};
use crate::renderer::{MAX_COLOUR_OUTPUTS, MAX_INPUTS};
use crate::util::hash::hash_name;

const CONSTANT_SLOTS: u32 = 64;
// Two 256-byte offset alignments per slot.
const CONSTANT_STRIDE: u64 = 512;
const SUPPORTED_SAMPLE_COUNTS: [u32; 2] = [1, 4];

/// Vertex buffer layout a scene technique consumes.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    /// Bytes between consecutive elements.
    pub stride: u64,
    /// Per-vertex or per-instance stepping.
    pub step_mode: wgpu::VertexStepMode,
    /// Attributes within one element.
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// A shader program passes reference by name.
///
/// Bind group 0 holds [`PassConstants`] (binding 0, dynamic offset); bind
/// group 1 holds the inputs, texture at `2 * unit` and sampler at
/// `2 * unit + 1`.
#[derive(Debug)]
pub struct Technique {
    /// Compiled shader module.
    pub shader: wgpu::ShaderModule,
    /// Vertex entry point.
    pub vertex_entry: String,
    /// Fragment entry point.
    pub fragment_entry: String,
    /// How each texture unit is sampled, in unit order.
    pub inputs: Vec<InputKind>,
    /// Vertex buffers, used by scene passes only.
    pub vertex_layouts: Vec<VertexLayout>,
}

impl Technique {
    /// A full-screen technique with `vs_main` / `fs_main` entry points.
    #[must_use]
    pub fn fullscreen(shader: wgpu::ShaderModule, inputs: Vec<InputKind>) -> Self {
        Self {
            shader,
            vertex_entry: "vs_main".to_owned(),
            fragment_entry: "fs_main".to_owned(),
            inputs,
            vertex_layouts: Vec::new(),
        }
    }
}

/// Draws scene geometry inside scene passes. The pipeline, constants and
/// inputs are already bound when `paint` runs.
pub trait ScenePainter {
    /// Record draws for geometry matching `flags` seen from `camera`.
    fn paint(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        flags: SceneFlags,
        camera: Option<&str>,
    );
}

struct TechniqueEntry {
    technique: Technique,
    input_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

enum StateObject {
    Sampler(wgpu::Sampler),
    Raster(RasterState),
    Blend(BlendState),
    DepthStencil(DepthStencilState),
    Pipeline {
        pipeline: wgpu::RenderPipeline,
        technique: String,
    },
}

type InputSlots = [(GpuHandle, GpuHandle); MAX_INPUTS];

const NO_INPUTS: InputSlots = [(GpuHandle::INVALID, GpuHandle::INVALID); MAX_INPUTS];

#[derive(Clone, Copy)]
struct PendingPass {
    colour: [GpuHandle; MAX_COLOUR_OUTPUTS],
    colour_len: usize,
    depth: Option<GpuHandle>,
    clear: ClearValues,
    viewport: PixelRect,
    textures: InputSlots,
    pipeline: GpuHandle,
    constants_slot: u32,
}

impl PendingPass {
    const EMPTY: Self = Self {
        colour: [GpuHandle::INVALID; MAX_COLOUR_OUTPUTS],
        colour_len: 0,
        depth: None,
        clear: ClearValues {
            colour: None,
            depth: None,
            stencil: None,
        },
        viewport: PixelRect {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        },
        textures: NO_INPUTS,
        pipeline: GpuHandle::INVALID,
        constants_slot: 0,
    };
}

struct TargetStore {
    targets: FxHashMap<GpuHandle, RenderTarget>,
    back_colour: RenderTarget,
    back_depth: RenderTarget,
    external_colour: Option<wgpu::TextureView>,
}

impl TargetStore {
    fn attachment(&self, handle: GpuHandle) -> Option<&wgpu::TextureView> {
        match handle {
            GpuHandle::BACK_BUFFER_COLOUR => Some(
                self.external_colour
                    .as_ref()
                    .unwrap_or(&self.back_colour.attachment),
            ),
            GpuHandle::BACK_BUFFER_DEPTH => Some(&self.back_depth.attachment),
            _ => self.targets.get(&handle).map(|t| &t.attachment),
        }
    }

    fn sampled(&self, handle: GpuHandle) -> Option<&wgpu::TextureView> {
        self.targets.get(&handle).map(|t| &t.view)
    }

    fn has_stencil(&self, handle: GpuHandle) -> bool {
        match handle {
            GpuHandle::BACK_BUFFER_DEPTH => self.back_depth.has_stencil(),
            _ => self.targets.get(&handle).is_some_and(RenderTarget::has_stencil),
        }
    }
}

fn presentation_desc(label: &str, format: TargetFormat, size: (u32, u32)) -> TargetDesc {
    TargetDesc {
        label: label.to_owned(),
        width: size.0.max(1),
        height: size.1.max(1),
        format,
        mip_count: 1,
        sample_count: 1,
    }
}

/// Convert an authored clear colour.
#[must_use]
pub fn clear_colour(colour: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(colour[0]),
        g: f64::from(colour[1]),
        b: f64::from(colour[2]),
        a: f64::from(colour[3]),
    }
}

fn load_op<T>(clear: Option<T>) -> wgpu::LoadOp<T> {
    clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear)
}

/// wgpu implementation of [`RenderBackend`].
pub struct WgpuBackend {
    context: RenderContext,
    next_handle: u32,
    store: TargetStore,
    states: FxHashMap<GpuHandle, StateObject>,
    techniques: FxHashMap<String, TechniqueEntry>,
    constants_layout: wgpu::BindGroupLayout,
    constants_buffer: wgpu::Buffer,
    constants_group: wgpu::BindGroup,
    next_slot: u32,
    bind_groups: FxHashMap<(u64, InputSlots), wgpu::BindGroup>,
    encoder: Option<wgpu::CommandEncoder>,
    pending: PendingPass,
    painter: Option<Box<dyn ScenePainter>>,
}

impl WgpuBackend {
    /// A backend rendering with `context`, presenting at `size`.
    #[must_use]
    pub fn new(context: RenderContext, size: (u32, u32)) -> Self {
        let device = &context.device;
        let constants_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Pass Constants Layout"),
                entries: &[dynamic_uniform_buffer(0)],
            });
        let constants_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass Constants"),
            size: u64::from(CONSTANT_SLOTS) * CONSTANT_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let constants_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass Constants"),
            layout: &constants_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &constants_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(
                        size_of::<PassConstants>() as u64,
                    ),
                }),
            }],
        });
        let store = TargetStore {
            targets: FxHashMap::default(),
            back_colour: RenderTarget::new(
                device,
                &presentation_desc("main_colour", TargetFormat::Rgba8, size),
            ),
            back_depth: RenderTarget::new(
                device,
                &presentation_desc("main_depth", TargetFormat::D24s8, size),
            ),
            external_colour: None,
        };
        Self {
            context,
            next_handle: 0,
            store,
            states: FxHashMap::default(),
            techniques: FxHashMap::default(),
            constants_layout,
            constants_buffer,
            constants_group,
            next_slot: 0,
            bind_groups: FxHashMap::default(),
            encoder: None,
            pending: PendingPass::EMPTY,
            painter: None,
        }
    }

    /// Make `technique` available to pipelines under `name`.
    pub fn register_technique(&mut self, name: &str, technique: Technique) {
        let device = &self.context.device;
        let input_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries: &input_entries(&technique.inputs),
            });
        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[&self.constants_layout, &input_layout],
                push_constant_ranges: &[],
            });
        let replaced = self.techniques.insert(
            name.to_owned(),
            TechniqueEntry {
                technique,
                input_layout,
                pipeline_layout,
            },
        );
        if replaced.is_some() {
            log::debug!("technique '{name}' replaced");
        }
    }

    /// Install the painter scene passes draw with.
    pub fn set_scene_painter(&mut self, painter: Box<dyn ScenePainter>) {
        self.painter = Some(painter);
    }

    /// Recreate the offscreen presentation targets at `size`.
    pub fn resize(&mut self, size: (u32, u32)) {
        let device = &self.context.device;
        self.store.back_colour = RenderTarget::new(
            device,
            &presentation_desc("main_colour", TargetFormat::Rgba8, size),
        );
        self.store.back_depth = RenderTarget::new(
            device,
            &presentation_desc("main_depth", TargetFormat::D24s8, size),
        );
    }

    /// Start recording a frame, presenting into `colour` when given.
    pub fn begin_frame(&mut self, colour: Option<wgpu::TextureView>) {
        self.store.external_colour = colour;
        self.next_slot = 0;
        if self.encoder.is_none() {
            self.encoder = Some(self.context.create_encoder());
        }
    }

    /// Submit everything recorded since [`begin_frame`](Self::begin_frame).
    pub fn end_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.submit(encoder);
        }
        self.store.external_colour = None;
    }

    /// The offscreen presentation colour target.
    #[must_use]
    pub const fn back_buffer(&self) -> &RenderTarget {
        &self.store.back_colour
    }

    /// The device and queue.
    #[must_use]
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    fn allocate(&mut self) -> GpuHandle {
        let handle = GpuHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn content<T: Copy>(
        &self,
        handle: GpuHandle,
        pick: impl Fn(&StateObject) -> Option<T>,
    ) -> Result<T, BackendError> {
        self.states
            .get(&handle)
            .and_then(pick)
            .ok_or(BackendError::StaleHandle(handle))
    }

    fn forget_bindings_of(&mut self, handle: GpuHandle) {
        self.bind_groups.retain(|(_, slots), _| {
            !slots.iter().any(|&(texture, sampler)| {
                texture == handle || sampler == handle
            })
        });
    }
}

fn input_group(
    device: &wgpu::Device,
    entry: &TechniqueEntry,
    store: &TargetStore,
    states: &FxHashMap<GpuHandle, StateObject>,
    slots: &InputSlots,
) -> Option<wgpu::BindGroup> {
    let units = entry.technique.inputs.len().min(MAX_INPUTS);
    let mut entries = Vec::with_capacity(units * 2);
    for (unit, &(texture, sampler)) in (0u32..).zip(slots.iter().take(units)) {
        let view = store.sampled(texture)?;
        let Some(StateObject::Sampler(sampler)) = states.get(&sampler) else {
            return None;
        };
        entries.push(wgpu::BindGroupEntry {
            binding: unit * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: unit * 2 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Pass Inputs"),
        layout: &entry.input_layout,
        entries: &entries,
    }))
}

impl RenderBackend for WgpuBackend {
    fn create_target(
        &mut self,
        desc: &TargetDesc,
    ) -> Result<GpuHandle, BackendError> {
        let max = self.context.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::InvalidDescriptor(format!(
                "{}: {}x{} outside 1..={max}",
                desc.label, desc.width, desc.height
            )));
        }
        if !SUPPORTED_SAMPLE_COUNTS.contains(&desc.sample_count) {
            return Err(BackendError::InvalidDescriptor(format!(
                "{}: {} samples unsupported",
                desc.label, desc.sample_count
            )));
        }
        if desc.sample_count > 1
            && matches!(desc.format, TargetFormat::Rgba32f | TargetFormat::R32u)
        {
            return Err(BackendError::UnsupportedFormat(desc.format));
        }
        let target = RenderTarget::new(&self.context.device, desc);
        let handle = self.allocate();
        let _ = self.store.targets.insert(handle, target);
        Ok(handle)
    }

    fn destroy_target(&mut self, handle: GpuHandle) {
        if handle.is_back_buffer() {
            return;
        }
        if let Some(target) = self.store.targets.remove(&handle) {
            target.texture.destroy();
            self.forget_bindings_of(handle);
        } else {
            log::warn!("destroy of unknown target {handle}");
        }
    }

    fn create_state(
        &mut self,
        state: &RenderState,
    ) -> Result<GpuHandle, BackendError> {
        let object = match state {
            RenderState::Sampler(sampler) => StateObject::Sampler(create_sampler(
                &self.context.device,
                "Pass Sampler",
                sampler,
            )),
            RenderState::Raster(raster) => StateObject::Raster(*raster),
            RenderState::Blend(blend) => StateObject::Blend(*blend),
            RenderState::DepthStencil(ds) => StateObject::DepthStencil(*ds),
        };
        let handle = self.allocate();
        let _ = self.states.insert(handle, object);
        Ok(handle)
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
    ) -> Result<GpuHandle, BackendError> {
        let raster = self.content(desc.raster, |s| match s {
            StateObject::Raster(r) => Some(*r),
            _ => None,
        })?;
        let blend = self.content(desc.blend, |s| match s {
            StateObject::Blend(b) => Some(*b),
            _ => None,
        })?;
        let ds = self.content(desc.depth_stencil, |s| match s {
            StateObject::DepthStencil(d) => Some(*d),
            _ => None,
        })?;
        let entry = self
            .techniques
            .get(&desc.technique)
            .ok_or_else(|| BackendError::UnknownTechnique(desc.technique.clone()))?;
        let technique = &entry.technique;

        let colour_targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .colour_formats
            .iter()
            .map(|format| Some(colour_target(format.to_wgpu(), &blend)))
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = if desc.scene {
            technique
                .vertex_layouts
                .iter()
                .map(|layout| wgpu::VertexBufferLayout {
                    array_stride: layout.stride,
                    step_mode: layout.step_mode,
                    attributes: &layout.attributes,
                })
                .collect()
        } else {
            Vec::new()
        };

        let pipeline = self.context.device.create_render_pipeline(
            &wgpu::RenderPipelineDescriptor {
                label: Some(desc.technique.as_str()),
                layout: Some(&entry.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &technique.shader,
                    entry_point: Some(technique.vertex_entry.as_str()),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &technique.shader,
                    entry_point: Some(technique.fragment_entry.as_str()),
                    targets: &colour_targets,
                    compilation_options: Default::default(),
                }),
                primitive: primitive_state(&raster),
                depth_stencil: desc
                    .depth_format
                    .map(|format| depth_stencil(format.to_wgpu(), &ds, &raster)),
                multisample: wgpu::MultisampleState {
                    count: desc.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            },
        );
        let handle = self.allocate();
        let _ = self.states.insert(
            handle,
            StateObject::Pipeline {
                pipeline,
                technique: desc.technique.clone(),
            },
        );
        Ok(handle)
    }

    fn destroy_state(&mut self, handle: GpuHandle) {
        match self.states.remove(&handle) {
            Some(StateObject::Sampler(_)) => self.forget_bindings_of(handle),
            Some(_) => {}
            None => log::warn!("destroy of unknown state {handle}"),
        }
    }

    fn bind_targets(
        &mut self,
        colour: &[GpuHandle],
        depth: Option<GpuHandle>,
        clear: &ClearValues,
        viewport: PixelRect,
    ) {
        let mut pending = PendingPass::EMPTY;
        let len = colour.len().min(MAX_COLOUR_OUTPUTS);
        pending.colour[..len].copy_from_slice(&colour[..len]);
        pending.colour_len = len;
        pending.depth = depth;
        pending.clear = *clear;
        pending.viewport = viewport;
        self.pending = pending;
    }

    fn bind_texture(
        &mut self,
        texture: GpuHandle,
        sampler: GpuHandle,
        unit: u32,
    ) {
        match self.pending.textures.get_mut(unit as usize) {
            Some(slot) => *slot = (texture, sampler),
            None => log::warn!("texture unit {unit} out of range"),
        }
    }

    fn bind_pipeline(&mut self, pipeline: GpuHandle) {
        self.pending.pipeline = pipeline;
    }

    fn set_constants(&mut self, constants: &PassConstants) {
        let slot = if self.next_slot < CONSTANT_SLOTS {
            self.next_slot += 1;
            self.next_slot - 1
        } else {
            log::warn!("more than {CONSTANT_SLOTS} passes in one frame");
            CONSTANT_SLOTS - 1
        };
        self.context.queue.write_buffer(
            &self.constants_buffer,
            u64::from(slot) * CONSTANT_STRIDE,
            bytemuck::bytes_of(constants),
        );
        self.pending.constants_slot = slot;
    }

    fn draw(&mut self, draw: DrawKind<'_>) {
        let pending = self.pending;
        let Some(StateObject::Pipeline {
            pipeline,
            technique,
        }) = self.states.get(&pending.pipeline)
        else {
            log::warn!("draw without a pipeline bound");
            return;
        };
        let Some(entry) = self.techniques.get(technique) else {
            log::warn!("technique '{technique}' unregistered");
            return;
        };

        let key = (hash_name(technique), pending.textures);
        if !self.bind_groups.contains_key(&key) {
            let Some(group) = input_group(
                &self.context.device,
                entry,
                &self.store,
                &self.states,
                &pending.textures,
            ) else {
                log::warn!("inputs of '{technique}' reference stale handles");
                return;
            };
            let _ = self.bind_groups.insert(key, group);
        }
        let Some(inputs) = self.bind_groups.get(&key) else {
            return;
        };

        let store = &self.store;
        let colour: [Option<wgpu::RenderPassColorAttachment<'_>>; MAX_COLOUR_OUTPUTS] =
            std::array::from_fn(|i| {
                let view = store.attachment(pending.colour[i])?;
                (i < pending.colour_len).then(|| wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: load_op(pending.clear.colour.map(clear_colour)),
                        store: wgpu::StoreOp::Store,
                    },
                })
            });
        if colour[..pending.colour_len].iter().any(Option::is_none) {
            log::warn!("outputs of '{technique}' reference stale handles");
            return;
        }
        let depth_stencil_attachment = pending.depth.and_then(|handle| {
            let view = store.attachment(handle)?;
            Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: load_op(pending.clear.depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: store.has_stencil(handle).then(|| wgpu::Operations {
                    load: load_op(pending.clear.stencil),
                    store: wgpu::StoreOp::Store,
                }),
            })
        });

        let context = &self.context;
        let encoder = self.encoder.get_or_insert_with(|| context.create_encoder());
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(technique.as_str()),
            color_attachments: &colour[..pending.colour_len],
            depth_stencil_attachment,
            ..Default::default()
        });
        let rect = pending.viewport;
        pass.set_viewport(rect.x, rect.y, rect.width, rect.height, 0.0, 1.0);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(
            0,
            &self.constants_group,
            &[pending.constants_slot * CONSTANT_STRIDE as u32],
        );
        pass.set_bind_group(1, inputs, &[]);
        match draw {
            DrawKind::Fullscreen => pass.draw(0..3, 0..1),
            DrawKind::Scene { flags, camera } => {
                if let Some(painter) = self.painter.as_mut() {
                    painter.paint(&mut pass, flags, camera);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_colour_widens_components() {
        let c = clear_colour([0.25, 0.5, 1.0, 0.0]);
        assert_eq!((c.r, c.g, c.b, c.a), (0.25, 0.5, 1.0, 0.0));
    }

    #[test]
    fn missing_clear_loads() {
        assert!(matches!(load_op::<f32>(None), wgpu::LoadOp::Load));
        assert!(matches!(load_op(Some(1.0_f32)), wgpu::LoadOp::Clear(d) if d == 1.0));
    }

    #[test]
    fn constants_fit_one_slot() {
        assert!(size_of::<PassConstants>() as u64 <= CONSTANT_STRIDE);
        assert_eq!(CONSTANT_STRIDE % 256, 0);
        assert_eq!(size_of::<PassConstants>() % 16, 0);
    }
}
