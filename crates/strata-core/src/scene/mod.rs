// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal transform hierarchy.
//!
//! The scene is an arena of [`Node`]s addressed by [`NodeId`]. World matrices
//! are recomputed top-down by [`Scene::update_world_matrices`]. A node may carry
//! a `virtual_parent_transform`, which replaces its parent's world matrix during
//! that update. Pose-driven nodes (controllers, pointer rays) use it to follow
//! the host pose while keeping their children relative to it.

mod camera;
mod drawable;

pub use self::camera::Camera;
pub use self::drawable::{BoundingSphere, DrawContext, Drawable};

use crate::math::{Mat4, Quaternion, Vec3};

/// Index of a node in its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A transform node with an optional drawable.
#[derive(Debug)]
pub struct Node {
    /// Debug name.
    pub name: String,
    /// Local translation.
    pub position: Vec3,
    /// Local rotation.
    pub rotation: Quaternion,
    /// Local scale.
    pub scale: Vec3,
    /// Invisible nodes are skipped together with their subtree.
    pub visible: bool,
    /// Restricts the node to one presentation pass. `None` renders in every pass.
    pub pass: Option<u32>,
    /// Replaces the parent world matrix when set.
    pub virtual_parent_transform: Option<Mat4>,
    /// What the node draws, if anything.
    pub drawable: Option<Box<dyn Drawable>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Mat4,
}

impl Node {
    /// An empty, visible node at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            rotation: Quaternion::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            pass: None,
            virtual_parent_transform: None,
            drawable: None,
            parent: None,
            children: Vec::new(),
            world: Mat4::IDENTITY,
        }
    }

    /// Builder-style drawable assignment.
    pub fn with_drawable(mut self, drawable: Box<dyn Drawable>) -> Self {
        self.drawable = Some(drawable);
        self
    }

    /// Builder-style translation.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// `T * R * S` from the local fields.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World matrix as of the last [`Scene::update_world_matrices`].
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed scene graph.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node under `parent`, or as a root with `None`.
    ///
    /// An unknown parent is reported and the node becomes a root.
    pub fn spawn(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        match parent.filter(|p| p.0 < self.nodes.len()) {
            Some(p) => {
                node.parent = Some(p);
                self.nodes[p.0].children.push(id);
            }
            None => {
                if let Some(p) = parent {
                    log::warn!("Unknown parent {:?} for node '{}', inserting as root", p, node.name);
                }
                node.parent = None;
                self.roots.push(id);
            }
        }
        self.nodes.push(node);
        id
    }

    /// Returns a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Returns a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the scene has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recomputes every world matrix, parents first.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&id| (id, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            let base = node.virtual_parent_transform.unwrap_or(parent_world);
            node.world = base * node.local_matrix();
            let world = node.world;
            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }

    /// Pre-order traversal. When `visit` returns `false` the node's subtree is skipped.
    pub fn traverse(&self, mut visit: impl FnMut(NodeId, &Node) -> bool) {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if visit(id, node) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }
}
