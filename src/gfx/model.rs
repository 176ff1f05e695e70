//! Models and meshes
//!
//! A [`Model`] is a collection of meshes plus the per-model draw flags the
//! lensing pipeline cares about (`use_black_hole`, `flip_normals`). Models
//! are stored centrally in a [`ModelManager`] and referenced from scene
//! nodes by [`ModelId`], so many nodes can share one set of GPU buffers.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use anyhow::Context;
use cgmath::Vector3;
use log::warn;
use wgpu::Device;

use crate::gfx::geometry::GeometryData;
use crate::gfx::scene::vertex::Vertex3D;

/// Handle to a model owned by the model manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelId(u64);

impl ModelId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One mesh: CPU-side vertex/index data plus GPU buffers once uploaded.
pub struct Mesh {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
    /// Axis-aligned bounds, measured at construction.
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>) -> Self {
        let index_count = indices.len() as u32;
        let (min, max) = Self::measure(&vertices);

        Self {
            vertices,
            indices,
            vertex_buffer: None,
            index_buffer: None,
            index_count,
            min,
            max,
        }
    }

    /// Axis-aligned min/max over all vertex positions.
    fn measure(vertices: &[Vertex3D]) -> (Vector3<f32>, Vector3<f32>) {
        let mut min = Vector3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Vector3::new(f32::MIN, f32::MIN, f32::MIN);
        for v in vertices {
            min.x = min.x.min(v.position[0]);
            min.y = min.y.min(v.position[1]);
            min.z = min.z.min(v.position[2]);
            max.x = max.x.max(v.position[0]);
            max.y = max.y.max(v.position[1]);
            max.z = max.z.max(v.position[2]);
        }
        if vertices.is_empty() {
            (Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        } else {
            (min, max)
        }
    }

    /// Averaged per-vertex normals from face normals, for OBJ files that
    /// ship positions only.
    pub fn calculate_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
        let vertex_count = positions.len() / 3;
        let mut normals = vec![0.0f32; positions.len()];

        for triangle in indices.chunks(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let p = |i: usize| {
                Vector3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2])
            };
            let face_normal = (p(i1) - p(i0)).cross(p(i2) - p(i0));

            for &i in &[i0, i1, i2] {
                normals[i * 3] += face_normal.x;
                normals[i * 3 + 1] += face_normal.y;
                normals[i * 3 + 2] += face_normal.z;
            }
        }

        for i in 0..vertex_count {
            let n = Vector3::new(normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]);
            let length = cgmath::InnerSpace::magnitude(n);
            if length > 0.0 {
                normals[i * 3] = n.x / length;
                normals[i * 3 + 1] = n.y / length;
                normals[i * 3 + 2] = n.z / length;
            }
        }

        normals
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Creates the vertex/index buffers for this mesh.
    pub fn init_gpu_resources(&mut self, device: &Device) {
        let vertex_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            },
        );

        let index_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(&self.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        );

        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
    }
}

/// A drawable model: one or more meshes plus lensing draw flags.
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    /// Fragment stage negates normals (used for shapes viewed from inside,
    /// like the skybox sphere).
    pub flip_normals: bool,
    /// Whether the lensing vertex displacement applies to this model.
    pub use_black_hole: bool,
}

impl Model {
    pub fn new(name: &str, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.to_string(),
            meshes,
            flip_normals: false,
            use_black_hole: true,
        }
    }

    /// Builds a model from procedural geometry.
    pub fn from_geometry(name: &str, geometry: &GeometryData) -> Self {
        let (vertices, indices) = geometry.to_scene_format();
        Self::new(name, vec![Mesh::new(vertices, indices)])
    }

    /// Loads a model from an OBJ file.
    ///
    /// Geometry is triangulated with a single index per vertex; normals are
    /// computed from faces when the file carries none.
    pub fn from_obj_file(name: &str, path: &Path) -> anyhow::Result<Self> {
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("failed to load OBJ file {}", path.display()))?;

        Ok(Self::from_tobj_models(name, &models))
    }

    /// Loads a model from an in-memory OBJ stream (used by tests and
    /// embedded assets).
    pub fn from_obj_reader<R: std::io::BufRead>(name: &str, reader: &mut R) -> anyhow::Result<Self> {
        let (models, _materials) = tobj::load_obj_buf(
            reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            // Materials come from the material manager, not MTL files.
            |_path| Err(tobj::LoadError::OpenFileFailed),
        )
        .context("failed to parse OBJ stream")?;

        Ok(Self::from_tobj_models(name, &models))
    }

    fn from_tobj_models(name: &str, models: &[tobj::Model]) -> Self {
        let mut meshes = Vec::new();
        for m in models {
            let mesh = &m.mesh;

            let normals = if !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len()
            {
                mesh.normals.clone()
            } else {
                warn!("OBJ shape '{}' has no normals; computing from faces", m.name);
                Mesh::calculate_vertex_normals(&mesh.positions, &mesh.indices)
            };

            let vertex_count = mesh.positions.len() / 3;
            let vertices: Vec<Vertex3D> = (0..vertex_count)
                .map(|i| Vertex3D {
                    position: [
                        mesh.positions[i * 3],
                        mesh.positions[i * 3 + 1],
                        mesh.positions[i * 3 + 2],
                    ],
                    normal: [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
                    tex_coords: if mesh.texcoords.len() >= (i + 1) * 2 {
                        [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
                    } else {
                        [0.0, 0.0]
                    },
                })
                .collect();

            meshes.push(Mesh::new(vertices, mesh.indices.clone()));
        }

        Self::new(name, meshes)
    }

    /// Smallest corner over all meshes.
    pub fn min(&self) -> Vector3<f32> {
        let mut min = Vector3::new(0.0f32, 0.0f32, 0.0f32);
        for mesh in &self.meshes {
            min.x = min.x.min(mesh.min.x);
            min.y = min.y.min(mesh.min.y);
            min.z = min.z.min(mesh.min.z);
        }
        min
    }

    /// Largest corner over all meshes.
    pub fn max(&self) -> Vector3<f32> {
        let mut max = Vector3::new(0.0f32, 0.0f32, 0.0f32);
        for mesh in &self.meshes {
            max.x = max.x.max(mesh.max.x);
            max.y = max.y.max(mesh.max.y);
            max.z = max.z.max(mesh.max.z);
        }
        max
    }

    pub fn init_gpu_resources(&mut self, device: &Device) {
        for mesh in &mut self.meshes {
            mesh.init_gpu_resources(device);
        }
    }
}

/// Centralized model storage
///
/// Nodes reference models by [`ModelId`]; the manager owns the meshes and
/// their GPU buffers so shared models upload once.
pub struct ModelManager {
    models: HashMap<ModelId, Model>,
    next_id: u64,
}

impl ModelManager {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            next_id: 0,
        }
    }

    /// Adds a model and returns its handle.
    pub fn add(&mut self, model: Model) -> ModelId {
        let id = ModelId(self.next_id);
        self.next_id += 1;
        self.models.insert(id, model);
        id
    }

    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(&id)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.models.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Toggles lensing displacement on every model (the B key behavior).
    pub fn set_all_use_black_hole(&mut self, active: bool) {
        for model in self.models.values_mut() {
            model.use_black_hole = active;
        }
    }

    /// Uploads vertex/index buffers for every model.
    pub fn init_gpu_resources(&mut self, device: &Device) {
        for model in self.models.values_mut() {
            model.init_gpu_resources(device);
        }
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh(&mut self, mesh: &'a Mesh);
    fn draw_mesh_instanced(&mut self, mesh: &'a Mesh, instances: Range<u32>);
    fn draw_model(&mut self, model: &'a Model);
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh(&mut self, mesh: &'b Mesh) {
        self.draw_mesh_instanced(mesh, 0..1);
    }

    fn draw_mesh_instanced(&mut self, mesh: &'b Mesh, instances: Range<u32>) {
        let vertex_buffer = match &mesh.vertex_buffer {
            Some(buffer) => buffer,
            None => return, // Skip drawing if not uploaded
        };
        let index_buffer = match &mesh.index_buffer {
            Some(buffer) => buffer,
            None => return,
        };

        self.set_vertex_buffer(0, vertex_buffer.slice(..));
        self.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, instances);
    }

    fn draw_model(&mut self, model: &'b Model) {
        for mesh in &model.meshes {
            self.draw_mesh_instanced(mesh, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use cgmath::InnerSpace;

    #[test]
    fn test_mesh_bounds_measure() {
        let cube = Model::from_geometry("cube", &generate_cube());
        assert!((cube.min() - Vector3::new(-0.5, -0.5, -0.5)).magnitude() < 1e-6);
        assert!((cube.max() - Vector3::new(0.5, 0.5, 0.5)).magnitude() < 1e-6);
    }

    #[test]
    fn test_obj_stream_round_trip() {
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1
";
        let mut reader = std::io::Cursor::new(obj.as_bytes());
        let model = Model::from_obj_reader("triangle", &mut reader).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].vertex_count(), 3);
        assert_eq!(model.meshes[0].index_count(), 3);
        assert!((model.max() - Vector3::new(1.0, 1.0, 0.0)).magnitude() < 1e-6);
    }

    #[test]
    fn test_obj_without_normals_computes_them() {
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";
        let mut reader = std::io::Cursor::new(obj.as_bytes());
        let model = Model::from_obj_reader("triangle", &mut reader).unwrap();
        let normal = model.meshes[0].vertices[0].normal;
        // Counter-clockwise triangle in the XY plane faces +Z.
        assert!((Vector3::from(normal) - Vector3::new(0.0, 0.0, 1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_manager_assigns_distinct_ids() {
        let mut manager = ModelManager::new();
        let a = manager.add(Model::from_geometry("a", &generate_cube()));
        let b = manager.add(Model::from_geometry("b", &generate_cube()));
        assert_ne!(a, b);
        assert_eq!(manager.len(), 2);
        assert!(manager.get(a).is_some());
    }

    #[test]
    fn test_set_all_use_black_hole() {
        let mut manager = ModelManager::new();
        let id = manager.add(Model::from_geometry("a", &generate_cube()));
        assert!(manager.get(id).unwrap().use_black_hole);
        manager.set_all_use_black_hole(false);
        assert!(!manager.get(id).unwrap().use_black_hole);
    }
}
