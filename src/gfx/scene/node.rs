//! Scene node definition

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3};

use crate::gfx::model::ModelId;
use crate::gfx::resources::material::MaterialId;

/// Handle to a node stored in the scene arena.
///
/// Handles are lightweight and can be copied freely. Ids are assigned by the
/// owning [`Scene`](super::Scene) from a per-scene counter and are never
/// reused within that scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Returns the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Creates a handle from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

/// What a node contributes to the frame beyond its transform.
///
/// Kinds are a closed set dispatched by tag: the renderer draws `Mesh`
/// nodes, light aggregation reads `PointLight` nodes, and the camera
/// matrices derive from the active `Camera` node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Pure transform node (grouping / animation pivots).
    Empty,
    /// Drawable node referencing a model and a material by handle/name.
    Mesh {
        model: ModelId,
        material: MaterialId,
    },
    /// Point light with an intensity in world units.
    PointLight { intensity: f32 },
    /// Perspective camera. `fovy` is in degrees, as handed to the
    /// projection helper.
    Camera {
        fovy: f32,
        aspect: f32,
        z_near: f32,
        z_far: f32,
    },
}

/// A node in the scene graph.
///
/// Local placement is translation + Euler rotation + scale. The rotation is
/// composed in the fixed order Y, then Z, then X; the claw joint animation
/// depends on that exact order.
///
/// `global_transform` is only valid immediately after
/// [`Scene::evaluate_all`](super::Scene::evaluate_all); any mutation of the
/// local fields leaves it stale until the next evaluation pass.
#[derive(Debug, Clone)]
pub struct Node {
    pub translation: Vector3<f32>,
    /// Euler angles in radians, applied Y then Z then X.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// World placement as of the last evaluation pass.
    pub global_transform: Matrix4<f32>,
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node of the given kind with an identity local transform.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            global_transform: Matrix4::identity(),
            kind,
        }
    }

    /// Creates a pure transform node.
    pub fn empty() -> Self {
        Self::new(NodeKind::Empty)
    }

    /// Creates a drawable node.
    pub fn mesh(model: ModelId, material: &str) -> Self {
        Self::new(NodeKind::Mesh {
            model,
            material: material.to_string(),
        })
    }

    /// Creates a point light node.
    pub fn point_light(intensity: f32) -> Self {
        Self::new(NodeKind::PointLight { intensity })
    }

    /// Creates a perspective camera node. `fovy` is in degrees.
    pub fn camera(fovy: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self::new(NodeKind::Camera {
            fovy,
            aspect,
            z_near,
            z_far,
        })
    }

    /// Sets the translation (builder pattern).
    pub fn with_translation(mut self, translation: Vector3<f32>) -> Self {
        self.translation = translation;
        self
    }

    /// Sets the rotation (Euler radians, applied Y, Z, X).
    pub fn with_rotation(mut self, rotation: Vector3<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the scale.
    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Sets a uniform scale.
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vector3::new(scale, scale, scale))
    }

    /// Local transform: T * Ry * Rz * Rx * S.
    pub fn local_transform(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.translation)
            * self.rotation_matrix()
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Rotation-only matrix in the node's fixed Y, Z, X order.
    ///
    /// This is the isolated (identity-stack) evaluation used for camera
    /// orientation queries; it deliberately ignores ancestors, translation,
    /// and scale.
    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_y(Rad(self.rotation.y))
            * Matrix4::from_angle_z(Rad(self.rotation.z))
            * Matrix4::from_angle_x(Rad(self.rotation.x))
    }

    /// Direction the node faces: local -Z rotated by the node's rotation.
    pub fn facing(&self) -> Vector3<f32> {
        (self.rotation_matrix() * Vector3::new(0.0, 0.0, -1.0).extend(0.0)).truncate()
    }

    /// Strafe direction: cross of facing and the given up vector.
    pub fn strafe(&self, up: Vector3<f32>) -> Vector3<f32> {
        self.facing().cross(up)
    }

    /// World position from the last evaluation pass.
    pub fn global_position(&self) -> Vector3<f32> {
        (self.global_transform * Vector3::new(0.0, 0.0, 0.0).extend(1.0)).truncate()
    }

    /// Projection matrix for camera nodes, `None` for other kinds.
    pub fn projection_matrix(&self) -> Option<Matrix4<f32>> {
        match self.kind {
            NodeKind::Camera {
                fovy,
                aspect,
                z_near,
                z_far,
            } => Some(cgmath::perspective(cgmath::Deg(fovy), aspect, z_near, z_far)),
            _ => None,
        }
    }

    /// Returns true for camera-kind nodes.
    pub fn is_camera(&self) -> bool {
        matches!(self.kind, NodeKind::Camera { .. })
    }

    /// Returns true for point-light-kind nodes.
    pub fn is_point_light(&self) -> bool {
        matches!(self.kind, NodeKind::PointLight { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;
    use std::f32::consts::FRAC_PI_2;

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_local_transform_is_identity() {
        let node = Node::empty();
        assert_eq!(node.local_transform(), Matrix4::identity());
    }

    #[test]
    fn test_rotation_order_y_then_z_then_x() {
        let node = Node::empty().with_rotation(Vector3::new(0.3, 0.7, 1.1));
        let expected = Matrix4::from_angle_y(Rad(0.7))
            * Matrix4::from_angle_z(Rad(1.1))
            * Matrix4::from_angle_x(Rad(0.3));
        let got = node.rotation_matrix();
        for col in 0..4 {
            for row in 0..4 {
                assert!((got[col][row] - expected[col][row]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_facing_default_is_negative_z() {
        let node = Node::camera(45.0, 1.0, 0.01, 400.0);
        assert_close(node.facing(), Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_facing_after_yaw() {
        // Yaw of -90 degrees turns -Z toward -X.
        let node = Node::empty().with_rotation(Vector3::new(0.0, -FRAC_PI_2, 0.0));
        assert_close(node.facing(), Vector3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_strafe_is_perpendicular_to_facing() {
        let node = Node::empty().with_rotation(Vector3::new(0.2, 1.3, 0.0));
        let strafe = node.strafe(Vector3::unit_y());
        assert!(node.facing().dot(strafe).abs() < 1e-6);
    }

    #[test]
    fn test_projection_matrix_only_for_cameras() {
        assert!(Node::empty().projection_matrix().is_none());
        assert!(Node::camera(45.0, 1.5, 0.01, 400.0).projection_matrix().is_some());
    }
}
