//! wgpu boilerplate shared by pass pipelines: bind group layout entries and
//! translation of authored render states into wgpu descriptors.

use crate::config::{
    AddressMode, BlendFactor, BlendOp, BlendState, CompareFunc, CullMode,
    DepthStencilState, FillMode, FilterMode, RasterState, SamplerState,
    StencilOp,
};

/// How a technique samples one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputKind {
    /// Filterable float texture with a filtering sampler.
    #[default]
    Float,
    /// Float texture read without filtering (e.g. 32-bit float targets).
    UnfilterableFloat,
    /// Depth texture.
    Depth,
}

/// Fragment-visible 2D texture binding of `kind`.
#[must_use]
pub fn texture_2d(binding: u32, kind: InputKind) -> wgpu::BindGroupLayoutEntry {
    let sample_type = match kind {
        InputKind::Float => wgpu::TextureSampleType::Float { filterable: true },
        InputKind::UnfilterableFloat => {
            wgpu::TextureSampleType::Float { filterable: false }
        }
        InputKind::Depth => wgpu::TextureSampleType::Depth,
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Fragment-visible sampler binding matching an input of `kind`.
#[must_use]
pub fn sampler(binding: u32, kind: InputKind) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        InputKind::Float => wgpu::SamplerBindingType::Filtering,
        InputKind::UnfilterableFloat | InputKind::Depth => {
            wgpu::SamplerBindingType::NonFiltering
        }
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

/// Vertex+fragment uniform buffer binding with a dynamic offset.
#[must_use]
pub fn dynamic_uniform_buffer(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Layout entries for a technique's inputs: texture at `2 * unit`, its
/// sampler at `2 * unit + 1`.
#[must_use]
pub fn input_entries(inputs: &[InputKind]) -> Vec<wgpu::BindGroupLayoutEntry> {
    inputs
        .iter()
        .zip(0u32..)
        .flat_map(|(&kind, unit)| {
            [texture_2d(unit * 2, kind), sampler(unit * 2 + 1, kind)]
        })
        .collect()
}

const fn address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

const fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

/// Create the sampler for an authored sampler state.
#[must_use]
pub fn create_sampler(
    device: &wgpu::Device,
    label: &str,
    state: &SamplerState,
) -> wgpu::Sampler {
    let (filter, anisotropy) = match state.filter {
        FilterMode::Point => (wgpu::FilterMode::Nearest, 1),
        FilterMode::Linear => (wgpu::FilterMode::Linear, 1),
        FilterMode::Anisotropic => {
            (wgpu::FilterMode::Linear, state.max_anisotropy.clamp(1, 16))
        }
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address(state.address_u),
        address_mode_v: address(state.address_v),
        address_mode_w: address(state.address_w),
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        lod_min_clamp: state.min_lod,
        lod_max_clamp: state.max_lod,
        compare: state.compare.map(compare),
        anisotropy_clamp: anisotropy,
        border_color: None,
    })
}

/// Primitive state for an authored raster state.
#[must_use]
pub const fn primitive_state(raster: &RasterState) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: if raster.front_ccw {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        },
        cull_mode: match raster.cull {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        unclipped_depth: !raster.depth_clip,
        polygon_mode: match raster.fill {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe => wgpu::PolygonMode::Line,
        },
        conservative: false,
    }
}

const fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColour => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColour => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColour => wgpu::BlendFactor::Dst,
        BlendFactor::InvDstColour => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

const fn blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    }
}

/// Colour target state for one attachment of `format`.
#[must_use]
pub fn colour_target(
    format: wgpu::TextureFormat,
    blend: &BlendState,
) -> wgpu::ColorTargetState {
    let component = |src, dst, op| wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation: blend_op(op),
    };
    wgpu::ColorTargetState {
        format,
        blend: blend.enabled.then(|| wgpu::BlendState {
            color: component(blend.src, blend.dst, blend.op),
            alpha: component(blend.src_alpha, blend.dst_alpha, blend.op_alpha),
        }),
        write_mask: wgpu::ColorWrites::from_bits_truncate(u32::from(
            blend.write_mask & 0xf,
        )),
    }
}

const fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilOp::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
    }
}

/// Depth-stencil state for a `format` attachment.
#[must_use]
pub fn depth_stencil(
    format: wgpu::TextureFormat,
    state: &DepthStencilState,
    raster: &RasterState,
) -> wgpu::DepthStencilState {
    let face = if state.stencil_enable {
        wgpu::StencilFaceState {
            compare: compare(state.stencil_func),
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: stencil_op(state.stencil_pass_op),
        }
    } else {
        wgpu::StencilFaceState::IGNORE
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: state.depth_test && state.depth_write,
        depth_compare: if state.depth_test {
            compare(state.depth_func)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: u32::from(state.stencil_read_mask),
            write_mask: u32::from(state.stencil_write_mask),
        },
        bias: wgpu::DepthBiasState {
            constant: raster.depth_bias,
            slope_scale: raster.slope_scale_depth_bias,
            clamp: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_interleave_textures_and_samplers() {
        let entries = input_entries(&[InputKind::Float, InputKind::Depth]);
        let bindings: Vec<u32> = entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3]);
        assert!(matches!(
            entries[3].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        ));
    }

    #[test]
    fn disabled_blend_writes_through() {
        let target = colour_target(
            wgpu::TextureFormat::Rgba8Unorm,
            &BlendState::default(),
        );
        assert!(target.blend.is_none());
        assert_eq!(target.write_mask, wgpu::ColorWrites::ALL);
    }

    #[test]
    fn raster_state_maps_cull_and_fill() {
        let primitive = primitive_state(&RasterState {
            cull: CullMode::None,
            fill: FillMode::Wireframe,
            ..RasterState::default()
        });
        assert_eq!(primitive.cull_mode, None);
        assert_eq!(primitive.polygon_mode, wgpu::PolygonMode::Line);
        assert!(!primitive.unclipped_depth);
    }

    #[test]
    fn depth_test_off_always_passes() {
        let ds = depth_stencil(
            wgpu::TextureFormat::Depth24PlusStencil8,
            &DepthStencilState {
                depth_write: true,
                ..DepthStencilState::default()
            },
            &RasterState::default(),
        );
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);
        assert!(!ds.depth_write_enabled);
    }
}
