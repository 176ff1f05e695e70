//! Per-node uniform bindings
//!
//! Every mesh node gets a model matrix and draw-flag uniform. Each node
//! carries two buffers — one for the primary lensing image and one for the
//! secondary — so the two-pass draw never rewrites a buffer mid-frame.

use cgmath::Matrix4;

use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

/// Per-object uniform content
///
/// MUST match the ObjectUniform struct in the shader exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUBOContent {
    model: [[f32; 4]; 4],
    /// x = use_black_hole, y = flip_normals, z = secondary image, w unused
    flags: [u32; 4],
}

impl ObjectUBOContent {
    pub fn new(
        model: Matrix4<f32>,
        use_black_hole: bool,
        flip_normals: bool,
        secondary: bool,
    ) -> Self {
        Self {
            model: model.into(),
            flags: [
                use_black_hole as u32,
                flip_normals as u32,
                secondary as u32,
                0,
            ],
        }
    }
}

type ObjectUBO = UniformBuffer<ObjectUBOContent>;

/// Creates the bind group layout shared by all object bindings.
///
/// Visible to both stages: the vertex stage reads the model matrix and
/// lensing flags, the fragment stage reads flip_normals.
pub fn create_object_bind_group_layout(device: &wgpu::Device) -> BindGroupLayoutWithDesc {
    BindGroupLayoutBuilder::new()
        .next_binding_rendering(binding_types::uniform())
        .create(device, "Object Bind Group")
}

/// GPU resources for one mesh node: primary and secondary image bindings.
pub struct ObjectBindings {
    primary_ubo: ObjectUBO,
    primary_bind_group: wgpu::BindGroup,
    secondary_ubo: ObjectUBO,
    secondary_bind_group: wgpu::BindGroup,
}

impl ObjectBindings {
    pub fn new(device: &wgpu::Device, layout: &BindGroupLayoutWithDesc) -> Self {
        let primary_ubo = ObjectUBO::new(device);
        let primary_bind_group = BindGroupBuilder::new(layout)
            .resource(primary_ubo.binding_resource())
            .create(device, "Object Bind Group (primary)");

        let secondary_ubo = ObjectUBO::new(device);
        let secondary_bind_group = BindGroupBuilder::new(layout)
            .resource(secondary_ubo.binding_resource())
            .create(device, "Object Bind Group (secondary)");

        Self {
            primary_ubo,
            primary_bind_group,
            secondary_ubo,
            secondary_bind_group,
        }
    }

    /// Writes this frame's model matrix and flags into both buffers.
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        model: Matrix4<f32>,
        use_black_hole: bool,
        flip_normals: bool,
    ) {
        self.primary_ubo.update_content(
            queue,
            ObjectUBOContent::new(model, use_black_hole, flip_normals, false),
        );
        self.secondary_ubo.update_content(
            queue,
            ObjectUBOContent::new(model, use_black_hole, flip_normals, true),
        );
    }

    pub fn primary(&self) -> &wgpu::BindGroup {
        &self.primary_bind_group
    }

    pub fn secondary(&self) -> &wgpu::BindGroup {
        &self.secondary_bind_group
    }
}
