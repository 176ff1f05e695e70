//! WGPU-based rendering engine
//!
//! Owns the surface, device, pipelines, and per-frame GPU state, and turns
//! an evaluated scene into draw calls. Mesh nodes are visited in id order
//! (stable); the pipeline is switched only when the material kind changes,
//! and every lensed model is drawn twice — primary image, then the
//! secondary image with the reflected lensing frame.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use wgpu::{Device, TextureFormat};

use crate::gfx::lensing::LensingTable;
use crate::gfx::model::DrawModel;
use crate::gfx::resources::{
    global_bindings::{update_global_ubo, GlobalBindings, GlobalUBO},
    material::MaterialBindings,
    texture_resource::TextureResource,
};
use crate::gfx::scene::{NodeId, NodeKind, Scene};
use crate::wgpu_utils::binding_builder::BindGroupLayoutWithDesc;

use super::lensing_texture::{create_lensing_bind_group_layout, LensingTexture};
use super::object_bindings::{create_object_bind_group_layout, ObjectBindings};
use super::pipeline_manager::{PipelineConfig, PipelineManager};

/// Core rendering engine managing GPU resources and draw calls
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    format: TextureFormat,
    pub pipeline_manager: PipelineManager,
    global_ubo: GlobalUBO,
    global_bindings: GlobalBindings,

    object_layout: BindGroupLayoutWithDesc,
    object_bindings: HashMap<NodeId, ObjectBindings>,

    lensing_layout: BindGroupLayoutWithDesc,
    lensing_texture: LensingTexture,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// Initializes wgpu with default settings, creates the depth buffer,
    /// and registers the four material pipelines over the shared scene
    /// shader.
    ///
    /// # Panics
    /// Panics if unable to create a wgpu adapter or device
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> RenderEngine {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to request adapter!");

        let (device, queue) = {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("WGPU Device"),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: 4096,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                    memory_hints: wgpu::MemoryHints::default(),
                    trace: wgpu::Trace::Off,
                })
                .await
                .expect("Failed to request a device!")
        };

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .unwrap_or(surface_capabilities.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, "depth_texture");

        // Global uniform bindings for camera, lights, and black hole
        let global_ubo = GlobalUBO::new(&device);
        let mut global_bindings = GlobalBindings::new(&device);
        global_bindings.create_bind_group(&device, &global_ubo);

        let object_layout = create_object_bind_group_layout(&device);

        // Temporary material bindings to get the shared material layout
        let temp_material_bindings = MaterialBindings::new(&device);
        let material_bind_group_layout = temp_material_bindings.bind_group_layouts().clone();

        // A placeholder 3D texture keeps group 3 bound until a table loads
        let lensing_layout = create_lensing_bind_group_layout(&device);
        let lensing_texture = LensingTexture::placeholder(&device, &queue, &lensing_layout);

        let device_handle: Arc<Device> = device.into();
        let queue_handle: Arc<wgpu::Queue> = queue.into();
        let mut pipeline_manager = PipelineManager::new(device_handle.clone());

        pipeline_manager.load_shader("scene", include_str!("scene.wgsl"));

        let layouts = vec![
            global_bindings.bind_group_layouts().clone(),
            object_layout.layout.clone(),
            material_bind_group_layout,
            lensing_layout.layout.clone(),
        ];

        // One pipeline per material kind, all sharing the lensing vertex
        // stage. Culling is off: the skybox and claw interiors are visible
        // from both sides, as in the source scene.
        for (name, entry) in [
            ("Normal", "fs_normal"),
            ("TexCoord", "fs_tex_coord"),
            ("BlinnPhong", "fs_blinn_phong"),
            ("TexBlinnPhong", "fs_tex_blinn_phong"),
        ] {
            pipeline_manager.register_pipeline(
                name,
                PipelineConfig::default()
                    .with_label(name)
                    .with_shader("scene")
                    .with_fragment_entry(entry)
                    .with_depth_stencil(depth_texture.texture.clone())
                    .with_cull_mode(None)
                    .with_bind_group_layouts(layouts.clone())
                    .with_color_targets(vec![Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })]),
            );
        }

        if let Err(errors) = pipeline_manager.create_all_pipelines() {
            for error in errors {
                log::error!("{error}");
            }
        }

        RenderEngine {
            surface,
            device: device_handle,
            queue: queue_handle,
            config,
            depth_texture,
            format,
            pipeline_manager,
            global_ubo,
            global_bindings,
            object_layout,
            object_bindings: HashMap::new(),
            lensing_layout,
            lensing_texture,
        }
    }

    /// Uploads a loaded lensing table as the 3D lookup texture
    ///
    /// Call once after the table has loaded; an empty table leaves the
    /// placeholder bound (and the lensing flag off in the global UBO).
    pub fn upload_lensing_table(&mut self, table: &LensingTable) {
        if table.is_empty() {
            return;
        }
        self.lensing_texture =
            LensingTexture::new(&self.device, &self.queue, &self.lensing_layout, table);
    }

    /// Renders one frame of the scene
    ///
    /// Recomputes camera matrices once, syncs global and per-node uniform
    /// buffers, then draws every mesh node in id order. Only mesh nodes
    /// produce GPU work; other node kinds are no-ops for drawing.
    pub fn render_frame(&mut self, scene: &mut Scene, free_cam: bool) {
        scene.compute_camera_matrices(free_cam);
        update_global_ubo(&mut self.global_ubo, &self.queue, scene);

        self.sync_object_bindings(scene);

        let surface_texture = self
            .surface
            .get_current_texture()
            .expect("Failed to get surface texture!");
        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, self.global_bindings.bind_groups(), &[]);
            render_pass.set_bind_group(3, self.lensing_texture.bind_groups(), &[]);

            let lensing_loaded = scene.black_hole.is_active();
            let mut current_pipeline: Option<&'static str> = None;

            for (id, node) in scene.iter() {
                let NodeKind::Mesh { model, material } = &node.kind else {
                    continue;
                };
                let Some(model) = scene.models.get(*model) else {
                    continue;
                };
                let Some(bindings) = self.object_bindings.get(&id) else {
                    continue;
                };

                let material = scene.materials.get_material_or_default(material);
                let Some(material_bind_group) = material.get_bind_group() else {
                    debug!(
                        "skipping '{}': material '{}' has no GPU resources",
                        model.name, material.name
                    );
                    continue;
                };

                // Switch pipelines only when the material kind changes.
                let pipeline_name = material.kind.pipeline_name();
                if current_pipeline != Some(pipeline_name) {
                    let Some(pipeline) = self.pipeline_manager.pipeline(pipeline_name) else {
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    current_pipeline = Some(pipeline_name);
                }

                render_pass.set_bind_group(2, material_bind_group, &[]);

                render_pass.set_bind_group(1, bindings.primary(), &[]);
                render_pass.draw_model(model);

                // Secondary image pass, only while this model is lensed.
                if lensing_loaded && model.use_black_hole {
                    render_pass.set_bind_group(1, bindings.secondary(), &[]);
                    render_pass.draw_model(model);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }

    /// Writes each mesh node's model matrix and flags for this frame,
    /// creating bindings lazily and dropping bindings of removed nodes.
    fn sync_object_bindings(&mut self, scene: &Scene) {
        self.object_bindings.retain(|id, _| scene.contains(*id));

        for (id, node) in scene.iter() {
            let NodeKind::Mesh { model, .. } = &node.kind else {
                continue;
            };
            let Some(model) = scene.models.get(*model) else {
                continue;
            };

            let bindings = self
                .object_bindings
                .entry(id)
                .or_insert_with(|| ObjectBindings::new(&self.device, &self.object_layout));
            bindings.update(
                &self.queue,
                node.global_transform,
                model.use_black_hole,
                model.flip_normals,
            );
        }
    }

    /// Resizes the render engine surface and recreates the depth buffer
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    /// Returns current surface dimensions
    pub fn get_surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Returns reference to the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns reference to the wgpu command queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the surface texture format
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }
}
