//! Global uniform bindings for camera, lighting, and black-hole data
//!
//! One uniform buffer bound at slot 0 in every render pipeline carries the
//! per-frame global state: view/projection matrices, the aggregated light
//! arrays, and the black-hole parameters the lensing vertex stage needs.

use cgmath::SquareMatrix;
use log::debug;

use crate::gfx::scene::Scene;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

pub const MAX_DIR_LIGHTS: usize = 3;
pub const MAX_POINT_LIGHTS: usize = 3;

/// Global uniform buffer content structure
///
/// MUST match the Globals struct in the shader exactly. Directions and
/// positions carry their light's intensity in the w component so the
/// arrays stay 16-byte aligned without separate padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUBOContent {
    /// Camera eye position (homogeneous), for specular highlights.
    view_position: [f32; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],

    /// xyz = direction, w = intensity
    dir_lights: [[f32; 4]; MAX_DIR_LIGHTS],
    /// xyz = world position, w = intensity
    point_lights: [[f32; 4]; MAX_POINT_LIGHTS],

    /// xyz = hole world position, w = visual size
    black_hole_position: [f32; 4],
    /// vr_min, vr_max, or_min, or_max
    black_hole_ranges: [f32; 4],
    /// xyz = lensing observer position, w = 1.0 when a table is loaded
    observer: [f32; 4],
}

impl GlobalUBOContent {
    /// Builds the frame's global uniform content from the scene.
    ///
    /// Light aggregation: one hard-coded directional key light plus the
    /// scene's point lights in registration order, up to
    /// [`MAX_POINT_LIGHTS`]; extras are dropped (documented limitation).
    /// Valid only after the scene's transforms have been evaluated.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut dir_lights = [[0.0f32; 4]; MAX_DIR_LIGHTS];
        dir_lights[0] = [1.0, -2.0, -1.0, 0.3];

        let mut point_lights = [[0.0f32; 4]; MAX_POINT_LIGHTS];
        let mut point_light_index = 0;
        for (position, intensity) in scene.point_lights() {
            if point_light_index >= MAX_POINT_LIGHTS {
                debug!(
                    "more than {} point lights in scene; extras are not rendered",
                    MAX_POINT_LIGHTS
                );
                break;
            }
            point_lights[point_light_index] = [position.x, position.y, position.z, intensity];
            point_light_index += 1;
        }

        let eye = scene
            .active_camera_node()
            .map(|camera| camera.global_position())
            .unwrap_or(cgmath::Vector3::new(0.0, 0.0, 0.0));

        let hole = &scene.black_hole;
        let (vr_min, vr_max) = hole.table.vr_range();
        let (or_min, or_max) = hole.table.or_range();
        let observer = scene.lensing_observer;

        Self {
            view_position: [eye.x, eye.y, eye.z, 1.0],
            view: scene.view_matrix.into(),
            projection: scene.projection_matrix.into(),
            dir_lights,
            point_lights,
            black_hole_position: [hole.position.x, hole.position.y, hole.position.z, hole.size],
            black_hole_ranges: [vr_min, vr_max, or_min, or_max],
            observer: [
                observer.x,
                observer.y,
                observer.z,
                if hole.is_active() { 1.0 } else { 0.0 },
            ],
        }
    }
}

impl Default for GlobalUBOContent {
    fn default() -> Self {
        Self {
            view_position: [0.0; 4],
            view: cgmath::Matrix4::identity().into(),
            projection: cgmath::Matrix4::identity().into(),
            dir_lights: [[0.0; 4]; MAX_DIR_LIGHTS],
            point_lights: [[0.0; 4]; MAX_POINT_LIGHTS],
            black_hole_position: [0.0; 4],
            black_hole_ranges: [0.0; 4],
            observer: [0.0; 4],
        }
    }
}

/// Type alias for the global uniform buffer
pub type GlobalUBO = UniformBuffer<GlobalUBOContent>;

/// Updates the global uniform buffer from the scene's current state
///
/// Should be called once per frame, after transform evaluation and camera
/// matrix computation.
pub fn update_global_ubo(ubo: &mut GlobalUBO, queue: &wgpu::Queue, scene: &Scene) {
    ubo.update_content(queue, GlobalUBOContent::from_scene(scene));
}

/// Manages the bind group layout and bind group for global uniforms
///
/// Bound to slot 0 in all render pipelines.
pub struct GlobalBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
    bind_group: Option<wgpu::BindGroup>,
}

impl GlobalBindings {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(device, "Globals Bind Group");

        GlobalBindings {
            bind_group_layout,
            bind_group: None,
        }
    }

    /// Creates the bind group with the provided uniform buffer
    ///
    /// Must be called once after the uniform buffer exists and before
    /// rendering.
    pub fn create_bind_group(&mut self, device: &wgpu::Device, ubo: &GlobalUBO) {
        self.bind_group = Some(
            BindGroupBuilder::new(&self.bind_group_layout)
                .resource(ubo.binding_resource())
                .create(device, "Global Bind Group"),
        );
    }

    pub fn bind_group_layouts(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    /// # Panics
    /// Panics if `create_bind_group()` hasn't been called yet
    pub fn bind_groups(&self) -> &wgpu::BindGroup {
        self.bind_group
            .as_ref()
            .expect("Bind group has not been created yet!")
    }
}
