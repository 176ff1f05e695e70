//! GPU upload of the lensing table
//!
//! The table's (deflection, emission, distance) triples go into a 3D
//! texture with axis order (or, vphi, vr) -> (width, height, depth). wgpu
//! has no 3-channel float format, so triples are padded to `Rgba32Float`
//! at upload. The shader reads the texture with `textureLoad` on
//! floor-scaled integer indices — the exact CPU lookup, no sampler
//! filtering — so CPU and GPU sampling stay consistent.

use log::info;

use crate::gfx::lensing::LensingTable;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
};

/// Creates the bind group layout the lensing texture binds through.
///
/// Owned by the render engine so pipelines and re-uploaded tables share
/// one layout.
pub fn create_lensing_bind_group_layout(device: &wgpu::Device) -> BindGroupLayoutWithDesc {
    BindGroupLayoutBuilder::new()
        .next_binding_vertex(binding_types::texture_3d_unfiltered())
        .create(device, "Lensing Table Bind Group")
}

/// The lensing table as a GPU-resident 3D lookup texture.
pub struct LensingTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

impl LensingTexture {
    /// Uploads a loaded table.
    ///
    /// # Panics
    /// Panics if the table is empty; callers guard with
    /// [`LensingTable::is_empty`] and fall back to [`Self::placeholder`].
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &BindGroupLayoutWithDesc,
        table: &LensingTable,
    ) -> Self {
        assert!(!table.is_empty(), "cannot upload an empty lensing table");

        let (vr_res, vphi_res, or_res) = table.resolutions();
        let padded = pad_triples_to_rgba(table.data());

        let this = Self::from_rgba_data(
            device,
            queue,
            layout,
            &padded,
            or_res as u32,
            vphi_res as u32,
            vr_res as u32,
        );
        info!(
            "uploaded lensing table as {}x{}x{} 3D texture",
            or_res, vphi_res, vr_res
        );
        this
    }

    /// A 1x1x1 zero texture bound while no table is loaded, so the pipeline
    /// layout stays satisfied. The shader never reads it: the lensing flag
    /// in the global uniform is off.
    pub fn placeholder(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &BindGroupLayoutWithDesc,
    ) -> Self {
        Self::from_rgba_data(device, queue, layout, &[0.0; 4], 1, 1, 1)
    }

    fn from_rgba_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &BindGroupLayoutWithDesc,
        rgba: &[f32],
        width: u32,
        height: u32,
        depth: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lensing Table"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(rgba),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = BindGroupBuilder::new(layout)
            .texture(&view)
            .create(device, "Lensing Table Bind Group");

        Self {
            texture,
            view,
            bind_group,
        }
    }

    pub fn bind_groups(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Pads tightly packed float triples out to 4-component texels.
fn pad_triples_to_rgba(triples: &[f32]) -> Vec<f32> {
    let mut padded = Vec::with_capacity(triples.len() / 3 * 4);
    for triple in triples.chunks_exact(3) {
        padded.extend_from_slice(triple);
        padded.push(0.0);
    }
    padded
}
