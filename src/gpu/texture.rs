//! Render-target textures backing physical targets.

use super::backend::TargetDesc;

/// A render-target texture and the views passes bind.
///
/// Created with `RENDER_ATTACHMENT | TEXTURE_BINDING | COPY_SRC` so it can
/// be rendered into, sampled by later passes, and read back.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Full-texture view, sampled by later passes.
    pub view: wgpu::TextureView,
    /// View of mip 0 only, bound as an attachment.
    pub attachment: wgpu::TextureView,
    /// Texture format.
    pub format: wgpu::TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// MSAA samples.
    pub sample_count: u32,
}

impl RenderTarget {
    /// Create the texture described by `desc`.
    #[must_use]
    pub fn new(device: &wgpu::Device, desc: &TargetDesc) -> Self {
        let format = desc.format.to_wgpu();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_count.max(1),
            sample_count: desc.sample_count.max(1),
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        // Sampling a depth-stencil texture reads its depth aspect only.
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            aspect: if format.is_depth_stencil_format() {
                wgpu::TextureAspect::DepthOnly
            } else {
                wgpu::TextureAspect::All
            },
            ..Default::default()
        });
        let attachment = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        Self {
            texture,
            view,
            attachment,
            format,
            width: desc.width,
            height: desc.height,
            sample_count: desc.sample_count.max(1),
        }
    }

    /// Whether the texture has a stencil aspect.
    #[must_use]
    pub fn has_stencil(&self) -> bool {
        self.format.has_stencil_aspect()
    }
}
