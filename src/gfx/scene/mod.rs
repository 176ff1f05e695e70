//! Scene graph management
//!
//! The scene owns every node in an arena keyed by [`NodeId`]; parent/child
//! structure lives in side maps of ids, so links never carry ownership and
//! cycles are rejected on attach. Structural operations are in `graph.rs`,
//! transform evaluation in `transforms.rs`.
//!
//! The scene is also the aggregate root the renderer consumes: it owns the
//! model and material managers, the black hole (with its lensing table),
//! the active camera, and the derived view/projection matrices.

mod graph;
mod node;
mod transforms;
pub mod vertex;

pub use node::{Node, NodeId, NodeKind};

use std::collections::HashMap;

use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};

use crate::gfx::lensing::BlackHole;
use crate::gfx::model::ModelManager;
use crate::gfx::resources::material::MaterialManager;

/// Errors from structural scene-graph operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("node {0:?} already has a parent; detach it first")]
    AlreadyHasParent(NodeId),

    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle { parent: NodeId, child: NodeId },

    #[error("node {0:?} has no parent")]
    NoParent(NodeId),

    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),
}

/// Main scene containing nodes, models, materials, and the black hole
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    parent: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    lights: Vec<NodeId>,
    active_camera: Option<NodeId>,
    next_id: u64,

    pub models: ModelManager,
    pub materials: MaterialManager,
    pub black_hole: BlackHole,

    /// View matrix derived from the active camera; retains its previous
    /// value when no camera is set.
    pub view_matrix: Matrix4<f32>,
    pub projection_matrix: Matrix4<f32>,
    /// Observer position the lensing lookup uses. Tracks the camera while
    /// attached; frozen while free cam is on.
    pub lensing_observer: Vector3<f32>,
}

impl Scene {
    /// Creates a new empty scene. The id counter starts at zero and is
    /// owned by this scene alone.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            parent: HashMap::new(),
            children: HashMap::new(),
            lights: Vec::new(),
            active_camera: None,
            next_id: 0,
            models: ModelManager::new(),
            materials: MaterialManager::new(),
            black_hole: BlackHole::default(),
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
            lensing_observer: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    /// Adds a node to the scene as a root and returns its id.
    pub fn spawn(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;

        if node.is_point_light() {
            self.lights.push(id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Gets a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Gets a mutable reference to a node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Returns true if the scene contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the number of nodes in the scene.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the scene has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over all (id, node) pairs, in id order.
    ///
    /// Id order is insertion order, which gives draw code a stable
    /// traversal independent of hash-map iteration.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids.into_iter().map(|id| (id, &self.nodes[&id]))
    }

    /// The parent of a node, if any.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(&id).copied()
    }

    /// The children of a node, in attach order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All root nodes (nodes with no parent), in id order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !self.parent.contains_key(id))
            .collect();
        roots.sort();
        roots
    }

    /// Ids of all point-light nodes, in registration order.
    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }

    /// Global positions and intensities of all point lights, in
    /// registration order. Valid only after [`Scene::evaluate_all`].
    pub fn point_lights(&self) -> impl Iterator<Item = (Vector3<f32>, f32)> + '_ {
        self.lights.iter().filter_map(|id| {
            let node = self.nodes.get(id)?;
            match node.kind {
                NodeKind::PointLight { intensity } => Some((node.global_position(), intensity)),
                _ => None,
            }
        })
    }

    /// Sets the active camera. The node must exist and be camera-kind.
    pub fn set_active_camera(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.nodes.get(&id).ok_or(SceneError::NodeNotFound(id))?;
        if !node.is_camera() {
            return Err(SceneError::NotACamera(id));
        }
        self.active_camera = Some(id);
        Ok(())
    }

    /// The active camera id, if set.
    pub fn active_camera(&self) -> Option<NodeId> {
        self.active_camera
    }

    /// The active camera node, if set and still alive.
    pub fn active_camera_node(&self) -> Option<&Node> {
        self.active_camera.and_then(|id| self.nodes.get(&id))
    }

    /// Updates the active camera's aspect ratio (on window resize).
    pub fn set_camera_aspect(&mut self, aspect: f32) {
        if let Some(id) = self.active_camera {
            if let Some(node) = self.nodes.get_mut(&id) {
                if let NodeKind::Camera { aspect: a, .. } = &mut node.kind {
                    *a = aspect;
                }
            }
        }
    }

    /// Derives view and projection matrices from the active camera.
    ///
    /// View is a look-at from the camera's evaluated global position toward
    /// position + facing with world up (0, 1, 0); projection comes from the
    /// camera node's stored fovy/aspect/near/far. When no active camera is
    /// set this is a no-op and both matrices retain their previous values.
    ///
    /// The lensing observer follows the camera unless `free_cam` is on, in
    /// which case it stays frozen at its last attached position.
    pub fn compute_camera_matrices(&mut self, free_cam: bool) {
        let Some(camera) = self.active_camera_node() else {
            return;
        };

        let eye = camera.global_position();
        let target = eye + camera.facing();
        let projection = camera.projection_matrix();

        let up = Vector3::unit_y();
        self.view_matrix = Matrix4::look_at_rh(
            Point3::new(eye.x, eye.y, eye.z),
            Point3::new(target.x, target.y, target.z),
            up,
        );
        if let Some(projection) = projection {
            self.projection_matrix = projection;
        }

        if !free_cam {
            self.lensing_observer = eye;
        }
    }

    /// Initializes GPU resources for all models and materials
    ///
    /// Must be called after the GPU context is available and before
    /// rendering.
    pub fn init_gpu_resources(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.models.init_gpu_resources(device);
        self.materials.update_all_gpu_resources(device, queue);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn test_spawn_assigns_sequential_ids() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::empty());
        let b = scene.spawn(Node::empty());
        assert_ne!(a, b);
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
    }

    #[test]
    fn test_light_registry_populated_on_spawn() {
        let mut scene = Scene::new();
        scene.spawn(Node::empty());
        let light = scene.spawn(Node::point_light(5.0));
        scene.spawn(Node::empty());
        assert_eq!(scene.lights(), &[light]);
    }

    #[test]
    fn test_active_camera_must_be_camera_kind() {
        let mut scene = Scene::new();
        let plain = scene.spawn(Node::empty());
        assert_eq!(
            scene.set_active_camera(plain),
            Err(SceneError::NotACamera(plain))
        );

        let cam = scene.spawn(Node::camera(45.0, 1.0, 0.01, 400.0));
        assert!(scene.set_active_camera(cam).is_ok());
        assert_eq!(scene.active_camera(), Some(cam));
    }

    #[test]
    fn test_iter_is_id_ordered() {
        let mut scene = Scene::new();
        let ids: Vec<NodeId> = (0..8).map(|_| scene.spawn(Node::empty())).collect();
        let seen: Vec<NodeId> = scene.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, seen);
    }

    #[test]
    fn test_camera_matrices_noop_without_camera() {
        let mut scene = Scene::new();
        let before_view = scene.view_matrix;
        let before_proj = scene.projection_matrix;
        scene.compute_camera_matrices(false);
        assert_eq!(scene.view_matrix, before_view);
        assert_eq!(scene.projection_matrix, before_proj);
    }

    #[test]
    fn test_free_cam_freezes_lensing_observer() {
        let mut scene = Scene::new();
        let cam = scene.spawn(
            Node::camera(45.0, 1.0, 0.01, 400.0)
                .with_translation(Vector3::new(0.0, 1.5, 5.0)),
        );
        scene.set_active_camera(cam).unwrap();
        scene.evaluate_all();
        scene.compute_camera_matrices(false);
        assert!((scene.lensing_observer - Vector3::new(0.0, 1.5, 5.0)).magnitude() < 1e-5);

        // Move the camera with free cam on: the observer must not follow.
        scene.node_mut(cam).unwrap().translation = Vector3::new(10.0, 1.5, 5.0);
        scene.evaluate_all();
        scene.compute_camera_matrices(true);
        assert!((scene.lensing_observer - Vector3::new(0.0, 1.5, 5.0)).magnitude() < 1e-5);

        // Reattaching resumes tracking.
        scene.compute_camera_matrices(false);
        assert!((scene.lensing_observer - Vector3::new(10.0, 1.5, 5.0)).magnitude() < 1e-5);
    }
}
