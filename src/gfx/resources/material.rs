//! Material system
//!
//! Four material kinds map onto four render pipelines over one shared
//! vertex stage: the two debug kinds (normal, texcoord), Blinn-Phong, and
//! textured Blinn-Phong. Materials are stored in [`MaterialManager`] and
//! referenced by name; every material shares one bind group layout
//! (uniform + texture + sampler), with untextured kinds binding a 1x1
//! white pixel.

use std::collections::HashMap;

use wgpu::Device;

use crate::gfx::resources::texture_resource::TextureResource;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

/// Material ID for referencing materials
pub type MaterialId = String;

/// Shading model of a material, selecting the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    /// Debug: surface normal as color.
    Normal,
    /// Debug: texture coordinates as color.
    TexCoord,
    /// Blinn-Phong with per-channel ambient/diffuse/specular colors.
    BlinnPhong {
        ambient: [f32; 3],
        diffuse: [f32; 3],
        specular: [f32; 3],
        spec_intensity: f32,
    },
    /// Blinn-Phong over a texture, with scalar ambient/diffuse/specular
    /// weights.
    TexturedBlinnPhong {
        ambient: f32,
        diffuse: f32,
        specular: f32,
        spec_intensity: f32,
    },
}

impl MaterialKind {
    /// Name of the render pipeline this kind draws with.
    pub fn pipeline_name(&self) -> &'static str {
        match self {
            MaterialKind::Normal => "Normal",
            MaterialKind::TexCoord => "TexCoord",
            MaterialKind::BlinnPhong { .. } => "BlinnPhong",
            MaterialKind::TexturedBlinnPhong { .. } => "TexBlinnPhong",
        }
    }
}

/// GPU uniform data shared by all material kinds.
///
/// MUST match the MaterialUniform struct in the shader exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// rgb = ambient color, w = scalar ambient weight (textured kind)
    pub ambient: [f32; 4],
    /// rgb = diffuse color, w = scalar diffuse weight
    pub diffuse: [f32; 4],
    /// rgb = specular color, w = scalar specular weight
    pub specular: [f32; 4],
    /// x = specular intensity (shininess exponent)
    pub params: [f32; 4],
}

type MaterialUBO = UniformBuffer<MaterialUniform>;

/// Material bind group management
pub struct MaterialBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
    bind_group: Option<wgpu::BindGroup>,
}

impl MaterialBindings {
    pub fn new(device: &Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::uniform())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
            .create(device, "Material Bind Group");

        MaterialBindings {
            bind_group_layout,
            bind_group: None,
        }
    }

    pub fn create_bind_group(
        &mut self,
        device: &Device,
        ubo: &MaterialUBO,
        texture: &TextureResource,
    ) {
        self.bind_group = Some(
            BindGroupBuilder::new(&self.bind_group_layout)
                .resource(ubo.binding_resource())
                .texture(&texture.view)
                .sampler(&texture.sampler)
                .create(device, "Material Bind Group"),
        );
    }

    pub fn bind_group_layouts(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    pub fn bind_groups(&self) -> &wgpu::BindGroup {
        self.bind_group
            .as_ref()
            .expect("Bind group has not been created yet!")
    }
}

/// CPU-side pixels for a material texture, uploaded on the first GPU sync.
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Material definition
///
/// Contains shading parameters and GPU resources. Materials are stored
/// centrally in MaterialManager and shared between scene nodes.
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,

    texture_data: Option<TextureData>,

    // GPU resources - shared by all nodes using this material
    material_ubo: Option<MaterialUBO>,
    material_bindings: Option<MaterialBindings>,
    texture: Option<TextureResource>,
}

impl Material {
    pub fn new(name: &str, kind: MaterialKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            texture_data: None,
            material_ubo: None,
            material_bindings: None,
            texture: None,
        }
    }

    /// Builder pattern: attach raw RGBA8 pixels as this material's texture.
    pub fn with_texture(mut self, pixels: Vec<u8>, width: u32, height: u32) -> Self {
        self.texture_data = Some(TextureData {
            pixels,
            width,
            height,
        });
        self
    }

    fn uniform_content(&self) -> MaterialUniform {
        match &self.kind {
            MaterialKind::Normal | MaterialKind::TexCoord => MaterialUniform {
                ambient: [0.0; 4],
                diffuse: [0.0; 4],
                specular: [0.0; 4],
                params: [0.0; 4],
            },
            MaterialKind::BlinnPhong {
                ambient,
                diffuse,
                specular,
                spec_intensity,
            } => MaterialUniform {
                ambient: [ambient[0], ambient[1], ambient[2], 0.0],
                diffuse: [diffuse[0], diffuse[1], diffuse[2], 0.0],
                specular: [specular[0], specular[1], specular[2], 0.0],
                params: [*spec_intensity, 0.0, 0.0, 0.0],
            },
            MaterialKind::TexturedBlinnPhong {
                ambient,
                diffuse,
                specular,
                spec_intensity,
            } => MaterialUniform {
                ambient: [0.0, 0.0, 0.0, *ambient],
                diffuse: [0.0, 0.0, 0.0, *diffuse],
                specular: [0.0, 0.0, 0.0, *specular],
                params: [*spec_intensity, 0.0, 0.0, 0.0],
            },
        }
    }

    /// Updates GPU resources for this material
    ///
    /// Must be called after material parameters change to sync with GPU.
    pub fn update_gpu_resources(&mut self, device: &Device, queue: &wgpu::Queue) {
        if self.material_ubo.is_none() {
            self.material_ubo = Some(MaterialUBO::new(device));
        }

        if self.texture.is_none() {
            self.texture = Some(match &self.texture_data {
                Some(data) => TextureResource::create_from_rgba_data(
                    device,
                    queue,
                    &data.pixels,
                    data.width,
                    data.height,
                    &self.name,
                ),
                None => TextureResource::create_white_pixel(device, queue),
            });
        }

        if self.material_bindings.is_none() {
            let mut bindings = MaterialBindings::new(device);
            bindings.create_bind_group(
                device,
                self.material_ubo.as_ref().unwrap(),
                self.texture.as_ref().unwrap(),
            );
            self.material_bindings = Some(bindings);
        }

        let uniform_content = self.uniform_content();
        if let Some(ubo) = &mut self.material_ubo {
            ubo.update_content(queue, uniform_content);
        }
    }

    /// Gets the bind group for rendering
    pub fn get_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.material_bindings.as_ref().map(|b| b.bind_groups())
    }

    /// Gets the bind group layout for pipeline creation
    pub fn get_bind_group_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.material_bindings
            .as_ref()
            .map(|b| b.bind_group_layouts())
    }
}

/// Manages all materials in the engine
///
/// Centralized storage; scene nodes reference materials by name, enabling
/// GPU resource sharing between nodes.
pub struct MaterialManager {
    materials: HashMap<MaterialId, Material>,
    default_material_id: MaterialId,
}

impl MaterialManager {
    /// Creates a new material manager with a default material
    ///
    /// The default is the normal-debug kind, which needs no parameters and
    /// makes unassigned materials visually obvious.
    pub fn new() -> Self {
        let mut manager = Self {
            materials: HashMap::new(),
            default_material_id: "default".to_string(),
        };

        manager
            .materials
            .insert("default".to_string(), Material::new("default", MaterialKind::Normal));

        manager
    }

    /// Adds a material to the library
    pub fn add_material(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Gets a material by ID
    pub fn get_material(&self, id: &str) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Gets a mutable material by ID
    pub fn get_material_mut(&mut self, id: &str) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    /// Gets the default material
    pub fn get_default_material(&self) -> &Material {
        self.materials.get(&self.default_material_id).unwrap()
    }

    /// Gets material for a node with fallback to default
    ///
    /// The main method used during rendering: handles nodes whose assigned
    /// material doesn't exist.
    pub fn get_material_or_default(&self, material_id: &str) -> &Material {
        self.get_material(material_id)
            .unwrap_or_else(|| self.get_default_material())
    }

    /// Lists all material IDs
    pub fn list_materials(&self) -> Vec<&MaterialId> {
        self.materials.keys().collect()
    }

    /// Updates GPU resources for all materials
    pub fn update_all_gpu_resources(&mut self, device: &Device, queue: &wgpu::Queue) {
        for material in self.materials.values_mut() {
            material.update_gpu_resources(device, queue);
        }
    }

    /// Gets the material bind group layout for pipeline creation
    ///
    /// All materials share the same layout.
    pub fn get_bind_group_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.get_default_material().get_bind_group_layout()
    }
}

impl Default for MaterialManager {
    fn default() -> Self {
        Self::new()
    }
}
