use anyhow::ensure;
use wgpu::{Buffer, BufferUsages, Device, Queue, Texture, TextureFormat, TextureView};

use warpfield::recording::TransportState;
use warpfield::simulation::{ChannelLayout, GridDimensions};

/// Shift applied to sampling coordinates per unit of displacement
const DISPLACEMENT_SCALE: f32 = 0.05;

/// Checker tiles across the viewport
const CHECKER_COUNT: f32 = 24.0;

/// One texel per grid cell, one float channel per field channel.
///
/// 32-bit float formats are not filterable without an extra feature, so the
/// shader reads cells with `textureLoad` rather than a sampler.
pub fn texel_format(layout: ChannelLayout) -> TextureFormat {
    match layout {
        ChannelLayout::Rg => TextureFormat::Rg32Float,
        ChannelLayout::Rgba => TextureFormat::Rgba32Float,
    }
}

/// GPU copy of the displacement field, plus the uniforms that style it
pub struct FieldTexture {
    texture: Texture,
    pub view: TextureView,
    pub params_buffer: Buffer,
    dims: GridDimensions,
    layout: ChannelLayout,
}

/// Fragment shader uniforms (16 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderParams {
    pub transport: u32, // 0 = idle, 1 = recording, 2 = playing
    pub displacement_scale: f32,
    pub checker_count: f32,
    pub _padding: f32,
}

impl FieldTexture {
    pub fn new(device: &Device, dims: GridDimensions, layout: ChannelLayout) -> anyhow::Result<Self> {
        let max = device.limits().max_texture_dimension_2d;
        ensure!(
            dims.width <= max && dims.height <= max,
            "{}x{} grid exceeds the {} texel texture limit",
            dims.width,
            dims.height,
            max
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("field-texture"),
            size: extent(dims),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texel_format(layout),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render-params-buffer"),
            size: std::mem::size_of::<RenderParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "Allocated {}x{} {:?} field texture",
            dims.width,
            dims.height,
            texel_format(layout)
        );

        Ok(Self {
            texture,
            view,
            params_buffer,
            dims,
            layout,
        })
    }

    /// Whether this texture fits a field of the given shape
    pub fn matches(&self, dims: GridDimensions, layout: ChannelLayout) -> bool {
        self.dims == dims && self.layout == layout
    }

    /// Copy a row-major field frame into the texture. The field's cell layout
    /// is already the texel layout, so rows go up unpadded.
    pub fn upload(&self, queue: &Queue, data: &[f32]) {
        if data.len() != self.dims.frame_size(self.layout) {
            log::warn!(
                "Skipped field upload: {} values for a {}x{} texture",
                data.len(),
                self.dims.width,
                self.dims.height
            );
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row(self.dims, self.layout)),
                rows_per_image: Some(self.dims.height),
            },
            extent(self.dims),
        );
    }

    pub fn update_params(&self, queue: &Queue, state: TransportState) {
        let params = RenderParams {
            transport: match state {
                TransportState::Idle => 0,
                TransportState::Recording => 1,
                TransportState::Playing => 2,
            },
            displacement_scale: DISPLACEMENT_SCALE,
            checker_count: CHECKER_COUNT,
            _padding: 0.0,
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }
}

fn extent(dims: GridDimensions) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: dims.width,
        height: dims.height,
        depth_or_array_layers: 1,
    }
}

fn bytes_per_row(dims: GridDimensions, layout: ChannelLayout) -> u32 {
    dims.width * (layout.channels() * std::mem::size_of::<f32>()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_params_size() {
        assert_eq!(std::mem::size_of::<RenderParams>(), 16);
    }

    #[test]
    fn test_texel_matches_cell() {
        for layout in [ChannelLayout::Rg, ChannelLayout::Rgba] {
            let texel = texel_format(layout).block_copy_size(None);
            assert_eq!(texel, Some((layout.channels() * 4) as u32));
        }
    }

    #[test]
    fn test_rows_are_unpadded() {
        let dims = GridDimensions::new(120, 67);
        assert_eq!(bytes_per_row(dims, ChannelLayout::Rg), 960);
        assert_eq!(
            bytes_per_row(dims, ChannelLayout::Rgba) as usize * dims.height as usize,
            dims.frame_size(ChannelLayout::Rgba) * 4
        );
    }
}
