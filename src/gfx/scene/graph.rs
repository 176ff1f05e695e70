//! Graph operations for the scene (attach, detach, reparent, remove)

use log::debug;

use super::{NodeId, Scene, SceneError};

impl Scene {
    /// Connect `child` under `parent`.
    ///
    /// Fails fast if the child is already parented elsewhere (a node may not
    /// appear under two parents) or if the edge would create a cycle.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(SceneError::NodeNotFound(child));
        }
        if self.parent.contains_key(&child) {
            return Err(SceneError::AlreadyHasParent(child));
        }
        if self.would_create_cycle(parent, child) {
            return Err(SceneError::WouldCreateCycle { parent, child });
        }

        self.children.entry(parent).or_default().push(child);
        self.parent.insert(child, parent);
        Ok(())
    }

    /// Spawn a node directly under an existing parent.
    pub fn spawn_child(
        &mut self,
        parent: NodeId,
        node: super::Node,
    ) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = self.spawn(node);
        self.children.entry(parent).or_default().push(id);
        self.parent.insert(id, parent);
        Ok(id)
    }

    /// Disconnect a node from its parent, making it a root.
    pub fn detach(&mut self, child: NodeId) -> Result<(), SceneError> {
        let parent = self
            .parent
            .remove(&child)
            .ok_or(SceneError::NoParent(child))?;

        if let Some(children) = self.children.get_mut(&parent) {
            children.retain(|c| *c != child);
        }
        Ok(())
    }

    /// Move a node under a new parent, detaching it from its current parent
    /// first if it has one.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&child) {
            return Err(SceneError::NodeNotFound(child));
        }
        if self.parent.contains_key(&child) {
            self.detach(child)?;
        }
        self.attach(new_parent, child)
    }

    /// Remove a node and all of its descendants.
    ///
    /// Also clears the light registry entries and the active-camera
    /// reference for every removed node.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&id) {
            return Err(SceneError::NodeNotFound(id));
        }

        // Collect the subtree breadth-first.
        let mut to_remove = vec![id];
        let mut i = 0;
        while i < to_remove.len() {
            if let Some(children) = self.children.get(&to_remove[i]) {
                to_remove.extend_from_slice(children);
            }
            i += 1;
        }

        // Unlink the subtree root from its parent, if any.
        if let Some(parent) = self.parent.remove(&id) {
            if let Some(children) = self.children.get_mut(&parent) {
                children.retain(|c| *c != id);
            }
        }

        for node_id in &to_remove {
            self.nodes.remove(node_id);
            self.children.remove(node_id);
            self.parent.remove(node_id);
            if self.active_camera == Some(*node_id) {
                self.active_camera = None;
            }
        }
        self.lights.retain(|l| !to_remove.contains(l));

        debug!("removed {} node(s) from scene", to_remove.len());
        Ok(())
    }

    /// Check if connecting `parent` to `child` would create a cycle, i.e.
    /// `child` is an ancestor of `parent` (or is `parent` itself).
    pub(crate) fn would_create_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return true;
            }
            current = self.parent.get(&id).copied();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::Node;

    #[test]
    fn test_attach_and_children_order() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        let a = scene.spawn(Node::empty());
        let b = scene.spawn(Node::empty());
        scene.attach(root, a).unwrap();
        scene.attach(root, b).unwrap();

        assert_eq!(scene.children_of(root), &[a, b]);
        assert_eq!(scene.parent_of(a), Some(root));
        assert_eq!(scene.roots(), vec![root]);
    }

    #[test]
    fn test_spawn_child_links_both_ways() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        let child = scene.spawn_child(root, Node::empty()).unwrap();
        assert_eq!(scene.parent_of(child), Some(root));
        assert_eq!(scene.children_of(root), &[child]);

        let missing = NodeId::from_raw(999);
        assert_eq!(
            scene.spawn_child(missing, Node::empty()).unwrap_err(),
            SceneError::NodeNotFound(missing)
        );
    }

    #[test]
    fn test_attach_already_parented_fails_fast() {
        let mut scene = Scene::new();
        let p1 = scene.spawn(Node::empty());
        let p2 = scene.spawn(Node::empty());
        let child = scene.spawn(Node::empty());
        scene.attach(p1, child).unwrap();

        assert_eq!(
            scene.attach(p2, child),
            Err(SceneError::AlreadyHasParent(child))
        );
        // The original link is untouched.
        assert_eq!(scene.children_of(p1), &[child]);
        assert_eq!(scene.children_of(p2), &[] as &[NodeId]);
    }

    #[test]
    fn test_reparent_removes_from_prior_parent_exactly_once() {
        let mut scene = Scene::new();
        let p1 = scene.spawn(Node::empty());
        let p2 = scene.spawn(Node::empty());
        let child = scene.spawn(Node::empty());
        scene.attach(p1, child).unwrap();

        scene.reparent(child, p2).unwrap();

        assert_eq!(scene.children_of(p1), &[] as &[NodeId]);
        assert_eq!(scene.children_of(p2), &[child]);
        assert_eq!(scene.parent_of(child), Some(p2));
    }

    #[test]
    fn test_attach_cycle_rejected() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::empty());
        let b = scene.spawn(Node::empty());
        let c = scene.spawn(Node::empty());
        scene.attach(a, b).unwrap();
        scene.attach(b, c).unwrap();

        assert_eq!(
            scene.attach(c, a),
            Err(SceneError::WouldCreateCycle { parent: c, child: a })
        );
        assert_eq!(
            scene.attach(a, a),
            Err(SceneError::WouldCreateCycle { parent: a, child: a })
        );
    }

    #[test]
    fn test_detach_makes_root() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        let child = scene.spawn(Node::empty());
        scene.attach(root, child).unwrap();

        scene.detach(child).unwrap();
        assert_eq!(scene.parent_of(child), None);
        assert!(scene.roots().contains(&child));

        assert_eq!(scene.detach(child), Err(SceneError::NoParent(child)));
    }

    #[test]
    fn test_remove_node_takes_descendants_and_registries() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::empty());
        let mid = scene.spawn(Node::empty());
        let light = scene.spawn(Node::point_light(2.0));
        let cam = scene.spawn(Node::camera(45.0, 1.0, 0.01, 400.0));
        scene.attach(root, mid).unwrap();
        scene.attach(mid, light).unwrap();
        scene.attach(mid, cam).unwrap();
        scene.set_active_camera(cam).unwrap();

        scene.remove_node(mid).unwrap();

        assert_eq!(scene.len(), 1);
        assert!(scene.contains(root));
        assert!(!scene.contains(light));
        assert!(scene.lights().is_empty());
        assert_eq!(scene.active_camera(), None);
        assert_eq!(scene.children_of(root), &[] as &[NodeId]);
    }
}
