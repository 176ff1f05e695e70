//! Global transform evaluation for the scene

use cgmath::{Matrix4, SquareMatrix, Vector3};

use super::{NodeId, Scene};

impl Scene {
    /// Recompute the global transform of every node reachable from a root.
    ///
    /// Each root is evaluated with its own fresh identity stack; within a
    /// root, evaluation is strictly parent-before-child (pre-order
    /// depth-first), and siblings never observe each other's matrices. The
    /// order between independent roots is id order but carries no meaning.
    pub fn evaluate_all(&mut self) {
        for root in self.roots() {
            self.evaluate_recursive(root, Matrix4::identity());
        }
    }

    fn evaluate_recursive(&mut self, id: NodeId, parent_transform: Matrix4<f32>) {
        let transform = match self.nodes.get_mut(&id) {
            Some(node) => {
                let global = parent_transform * node.local_transform();
                node.global_transform = global;
                global
            }
            None => return,
        };

        // Collect child ids first to avoid holding a borrow across recursion.
        let children: Vec<NodeId> = self
            .children
            .get(&id)
            .map(|c| c.to_vec())
            .unwrap_or_default();

        for child in children {
            self.evaluate_recursive(child, transform);
        }
    }

    /// The global position of a node as of the last evaluation pass.
    pub fn global_position(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.nodes.get(&id).map(|n| n.global_position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::Node;
    use cgmath::InnerSpace;

    fn assert_mat4_eq(a: Matrix4<f32>, b: Matrix4<f32>) {
        for col in 0..4 {
            for row in 0..4 {
                assert!(
                    (a[col][row] - b[col][row]).abs() < 1e-5,
                    "matrix mismatch at col={col}, row={row}: {a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_identity_root_evaluates_to_identity() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        scene.evaluate_all();
        assert_mat4_eq(
            scene.node(root).unwrap().global_transform,
            Matrix4::identity(),
        );
    }

    #[test]
    fn test_three_level_translation_chain() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty().with_translation(Vector3::new(1.0, 0.0, 0.0)));
        let child = scene.spawn(Node::empty().with_translation(Vector3::new(0.0, 2.0, 0.0)));
        let grandchild = scene.spawn(Node::empty().with_translation(Vector3::new(0.0, 0.0, 3.0)));
        scene.attach(root, child).unwrap();
        scene.attach(child, grandchild).unwrap();

        scene.evaluate_all();

        assert!(
            (scene.global_position(child).unwrap() - Vector3::new(1.0, 2.0, 0.0)).magnitude()
                < 1e-5
        );
        assert!(
            (scene.global_position(grandchild).unwrap() - Vector3::new(1.0, 2.0, 3.0)).magnitude()
                < 1e-5
        );
    }

    #[test]
    fn test_child_global_is_parent_global_times_local() {
        let mut scene = Scene::new();
        let root = scene.spawn(
            Node::empty()
                .with_translation(Vector3::new(0.5, 1.0, -2.0))
                .with_rotation(Vector3::new(0.1, 0.6, 0.0))
                .with_uniform_scale(2.0),
        );
        let child = scene.spawn(
            Node::empty()
                .with_translation(Vector3::new(0.0, 3.0, 0.0))
                .with_rotation(Vector3::new(0.0, 0.0, 0.4)),
        );
        scene.attach(root, child).unwrap();

        scene.evaluate_all();

        let parent_global = scene.node(root).unwrap().global_transform;
        let child_local = scene.node(child).unwrap().local_transform();
        assert_mat4_eq(
            scene.node(child).unwrap().global_transform,
            parent_global * child_local,
        );
    }

    #[test]
    fn test_siblings_do_not_leak_transforms() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        let a = scene.spawn(Node::empty().with_translation(Vector3::new(10.0, 0.0, 0.0)));
        let b = scene.spawn(Node::empty().with_translation(Vector3::new(0.0, 1.0, 0.0)));
        scene.attach(root, a).unwrap();
        scene.attach(root, b).unwrap();

        scene.evaluate_all();

        // b's transform must compose with the root only, not with a's.
        assert!(
            (scene.global_position(b).unwrap() - Vector3::new(0.0, 1.0, 0.0)).magnitude() < 1e-5
        );
    }

    #[test]
    fn test_parentless_childless_node_is_its_local_transform() {
        let mut scene = Scene::new();
        let lone = scene.spawn(
            Node::empty()
                .with_translation(Vector3::new(4.0, 5.0, 6.0))
                .with_uniform_scale(0.5),
        );
        scene.evaluate_all();
        let node = scene.node(lone).unwrap();
        assert_mat4_eq(node.global_transform, node.local_transform());
    }

    #[test]
    fn test_rotated_parent_moves_child() {
        use std::f32::consts::FRAC_PI_2;
        let mut scene = Scene::new();
        // Parent yawed 90 degrees: child at local +X ends up at world -Z.
        let root = scene.spawn(Node::empty().with_rotation(Vector3::new(0.0, FRAC_PI_2, 0.0)));
        let child = scene.spawn(Node::empty().with_translation(Vector3::new(2.0, 0.0, 0.0)));
        scene.attach(root, child).unwrap();

        scene.evaluate_all();

        assert!(
            (scene.global_position(child).unwrap() - Vector3::new(0.0, 0.0, -2.0)).magnitude()
                < 1e-5
        );
    }

    #[test]
    fn test_stale_until_next_evaluation() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty().with_translation(Vector3::new(1.0, 0.0, 0.0)));
        scene.evaluate_all();
        assert!(
            (scene.global_position(root).unwrap() - Vector3::new(1.0, 0.0, 0.0)).magnitude() < 1e-5
        );

        scene.node_mut(root).unwrap().translation = Vector3::new(9.0, 0.0, 0.0);
        // Not re-evaluated yet: global still reports the old position.
        assert!(
            (scene.global_position(root).unwrap() - Vector3::new(1.0, 0.0, 0.0)).magnitude() < 1e-5
        );

        scene.evaluate_all();
        assert!(
            (scene.global_position(root).unwrap() - Vector3::new(9.0, 0.0, 0.0)).magnitude() < 1e-5
        );
    }
}
