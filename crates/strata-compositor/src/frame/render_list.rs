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

//! Per-frame draw list: visibility, culling and bucketed sorting.

use crate::layer::{LayerId, LayerRegistry};
use std::cmp::Ordering;
use std::collections::HashSet;
use strata_core::graphics::PipelineState;
use strata_core::math::{Mat4, Vec4};
use strata_core::scene::{BoundingSphere, Camera, Node, NodeId, Scene};

/// What a [`RenderItem`] draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderSource {
    /// A drawable scene node.
    Node(NodeId),
    /// The clip primitive of a composition layer.
    LayerClip(LayerId),
}

/// One entry of the render list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// What to draw.
    pub source: RenderSource,
    /// World transform of the geometry.
    pub world: Mat4,
    /// Pipeline state at build time.
    pub state: PipelineState,
    /// Explicit order inside a bucket.
    pub render_order: i32,
    /// Program grouping key.
    pub program_key: u64,
    /// NDC depth of the origin, `0` unless computed.
    pub depth: f32,
    /// Traversal index, the final tiebreak.
    pub sequence: usize,
}

/// Inputs of [`build_render_list`].
#[derive(Debug, Clone, Copy)]
pub struct RenderListOptions {
    /// Presentation pass; nodes bound to another pass are skipped.
    pub pass: u32,
    /// Cull against the camera frustum.
    pub frustum_cull: bool,
    /// Bucket and sort the list.
    pub sort: bool,
}

/// Collects visible geometry from `scene` and the clip primitives of `layers`.
///
/// When sorting, items are split into opaque, depth-tested transparent and
/// UI buckets, concatenated in that order.
pub fn build_render_list(
    scene: &Scene,
    layers: &LayerRegistry,
    camera: &Camera,
    options: RenderListOptions,
) -> Vec<RenderItem> {
    let mut items = Vec::new();

    scene.traverse(|id, node| {
        if !renders_in_pass(node, options.pass) {
            return false;
        }
        let Some(drawable) = node.drawable.as_ref() else {
            return true;
        };
        let world = *node.world_matrix();
        if options.frustum_cull && drawable.frustum_culled() {
            if let Some(bounds) = drawable.bounds() {
                if !in_frustum(camera, &world, &bounds) {
                    return true;
                }
            }
        }
        items.push(RenderItem {
            source: RenderSource::Node(id),
            world,
            state: drawable.pipeline_state(),
            render_order: drawable.render_order(),
            program_key: drawable.program_key(),
            depth: 0.0,
            sequence: items.len(),
        });
        true
    });

    for layer in layers.iter() {
        let core = layer.core();
        let clip = layer.clip();
        let Some(id) = core.id() else { continue };
        if !(core.is_rendered() && clip.is_visible()) {
            continue;
        }
        let world = *core.world_matrix() * clip.local_matrix();
        if options.frustum_cull && !in_frustum(camera, &world, &clip.bounds()) {
            continue;
        }
        items.push(RenderItem {
            source: RenderSource::LayerClip(id),
            world,
            state: clip.pipeline_state(),
            render_order: 0,
            program_key: clip.program_key(),
            depth: 0.0,
            sequence: items.len(),
        });
    }

    if options.sort {
        sort_render_list(&mut items, camera);
    }
    items
}

/// Nodes reached by the render traversal for `pass`.
///
/// A node is excluded, along with its whole subtree, when it is hidden or
/// bound to another pass.
pub fn rendered_nodes(scene: &Scene, pass: u32) -> HashSet<NodeId> {
    let mut reached = HashSet::new();
    scene.traverse(|id, node| {
        if !renders_in_pass(node, pass) {
            return false;
        }
        reached.insert(id);
        true
    });
    reached
}

fn renders_in_pass(node: &Node, pass: u32) -> bool {
    node.visible && !node.pass.is_some_and(|p| p != pass)
}

fn in_frustum(camera: &Camera, world: &Mat4, bounds: &BoundingSphere) -> bool {
    let center = (*world * Vec4::from_vec3(bounds.center, 1.0)).truncate();
    camera.intersects_sphere(center, bounds.radius * world.max_scale())
}

/// Buckets and sorts `items` in place.
pub fn sort_render_list(items: &mut Vec<RenderItem>, camera: &Camera) {
    let mut opaque = Vec::new();
    let mut transparent = Vec::new();
    let mut ui = Vec::new();

    for mut item in items.drain(..) {
        item.depth = if item.render_order == 0 && item.state.depth_test {
            camera.depth_of(item.world.translation())
        } else {
            0.0
        };

        if !item.state.transparent {
            opaque.push(item);
        } else if item.state.depth_test {
            transparent.push(item);
        } else {
            ui.push(item);
        }
    }

    opaque.sort_by(compare_opaque);
    transparent.sort_by(compare_transparent);
    ui.sort_by(compare_ui);

    items.extend(opaque);
    items.extend(transparent);
    items.extend(ui);
}

fn compare_opaque(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then(a.program_key.cmp(&b.program_key))
        .then(a.depth.total_cmp(&b.depth))
        .then(a.sequence.cmp(&b.sequence))
}

/// Back to front.
fn compare_transparent(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then(b.depth.total_cmp(&a.depth))
        .then(a.sequence.cmp(&b.sequence))
}

fn compare_ui(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then(a.program_key.cmp(&b.program_key))
        .then(a.sequence.cmp(&b.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::graphics::{BlendState, GraphicsContext, ResourceError};
    use strata_core::math::Vec3;
    use strata_core::scene::{DrawContext, Drawable, Node};

    #[derive(Debug)]
    struct Stub {
        state: PipelineState,
        order: i32,
    }

    impl Drawable for Stub {
        fn pipeline_state(&self) -> PipelineState {
            self.state
        }

        fn render_order(&self) -> i32 {
            self.order
        }

        fn bounds(&self) -> Option<BoundingSphere> {
            Some(BoundingSphere { center: Vec3::ZERO, radius: 0.5 })
        }

        fn draw(&mut self, _: &mut dyn GraphicsContext, _: &DrawContext<'_>) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    fn opaque() -> PipelineState {
        PipelineState::default()
    }

    fn transparent() -> PipelineState {
        PipelineState {
            transparent: true,
            blend: Some(BlendState::ALPHA),
            ..PipelineState::default()
        }
    }

    fn ui() -> PipelineState {
        PipelineState {
            depth_test: false,
            ..transparent()
        }
    }

    fn spawn(scene: &mut Scene, name: &str, z: f32, state: PipelineState, order: i32) -> NodeId {
        let node = Node::new(name)
            .with_position(Vec3::new(0.0, 0.0, z))
            .with_drawable(Box::new(Stub { state, order }));
        scene.spawn(node, None)
    }

    fn camera() -> Camera {
        let mut camera = Camera::default();
        camera.update_matrices();
        camera
    }

    fn sources(items: &[RenderItem]) -> Vec<RenderSource> {
        items.iter().map(|item| item.source).collect()
    }

    const SORTED: RenderListOptions = RenderListOptions {
        pass: 0,
        frustum_cull: false,
        sort: true,
    };

    #[test]
    fn test_buckets_are_opaque_then_transparent_then_ui() {
        let mut scene = Scene::new();
        let hud = spawn(&mut scene, "hud", -1.0, ui(), 0);
        let glass = spawn(&mut scene, "glass", -2.0, transparent(), 0);
        let wall = spawn(&mut scene, "wall", -3.0, opaque(), 0);
        scene.update_world_matrices();

        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), SORTED);
        assert_eq!(
            sources(&list),
            vec![RenderSource::Node(wall), RenderSource::Node(glass), RenderSource::Node(hud)]
        );
    }

    #[test]
    fn test_transparent_sorts_back_to_front_and_opaque_front_to_back() {
        let mut scene = Scene::new();
        let near_glass = spawn(&mut scene, "near", -1.0, transparent(), 0);
        let far_glass = spawn(&mut scene, "far", -10.0, transparent(), 0);
        let far_wall = spawn(&mut scene, "far_wall", -10.0, opaque(), 0);
        let near_wall = spawn(&mut scene, "near_wall", -1.0, opaque(), 0);
        scene.update_world_matrices();

        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), SORTED);
        assert_eq!(
            sources(&list),
            vec![
                RenderSource::Node(near_wall),
                RenderSource::Node(far_wall),
                RenderSource::Node(far_glass),
                RenderSource::Node(near_glass),
            ]
        );
    }

    #[test]
    fn test_equal_keys_keep_traversal_order() {
        let mut scene = Scene::new();
        let ids: Vec<NodeId> = (0..4)
            .map(|i| spawn(&mut scene, &format!("ui_{i}"), -1.0, ui(), 2))
            .collect();
        scene.update_world_matrices();

        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), SORTED);
        assert_eq!(sources(&list), ids.into_iter().map(RenderSource::Node).collect::<Vec<_>>());
    }

    #[test]
    fn test_resorting_a_sorted_list_is_stable() {
        let mut scene = Scene::new();
        for (i, z) in [-3.0, -1.0, -2.0, -1.0].into_iter().enumerate() {
            spawn(&mut scene, &format!("wall_{i}"), z, opaque(), 0);
            spawn(&mut scene, &format!("glass_{i}"), z, transparent(), 0);
            spawn(&mut scene, &format!("hud_{i}"), z, ui(), i as i32 % 2);
        }
        scene.update_world_matrices();
        let camera = camera();

        let mut list = build_render_list(&scene, &LayerRegistry::new(), &camera, SORTED);
        let first = sources(&list);
        sort_render_list(&mut list, &camera);
        assert_eq!(sources(&list), first);
    }

    #[test]
    fn test_explicit_order_skips_depth() {
        let mut scene = Scene::new();
        spawn(&mut scene, "ordered", -5.0, transparent(), 1);
        scene.update_world_matrices();

        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), SORTED);
        assert_eq!(list[0].depth, 0.0);
    }

    #[test]
    fn test_hidden_parent_and_foreign_pass_prune_subtrees() {
        let mut scene = Scene::new();
        let hidden = spawn(&mut scene, "hidden", -1.0, opaque(), 0);
        let child = scene.spawn(
            Node::new("child").with_drawable(Box::new(Stub { state: opaque(), order: 0 })),
            Some(hidden),
        );
        if let Some(node) = scene.node_mut(hidden) {
            node.visible = false;
        }
        let other_pass = spawn(&mut scene, "other_pass", -1.0, opaque(), 0);
        if let Some(node) = scene.node_mut(other_pass) {
            node.pass = Some(3);
        }
        let shown = spawn(&mut scene, "shown", -1.0, opaque(), 0);
        scene.update_world_matrices();

        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), SORTED);
        assert_eq!(sources(&list), vec![RenderSource::Node(shown)]);
        assert!(!sources(&list).contains(&RenderSource::Node(child)));
    }

    #[test]
    fn test_frustum_cull_drops_geometry_behind_camera() {
        let mut scene = Scene::new();
        let front = spawn(&mut scene, "front", -5.0, opaque(), 0);
        spawn(&mut scene, "behind", 5.0, opaque(), 0);
        scene.update_world_matrices();

        let options = RenderListOptions { frustum_cull: true, ..SORTED };
        let list = build_render_list(&scene, &LayerRegistry::new(), &camera(), options);
        assert_eq!(sources(&list), vec![RenderSource::Node(front)]);
    }

    #[test]
    fn test_rendered_nodes_exclude_whole_subtrees() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::new("root"), None);
        let panel = scene.spawn(Node::new("panel"), Some(root));
        let overlay = scene.spawn(Node::new("overlay"), None);
        if let Some(node) = scene.node_mut(overlay) {
            node.pass = Some(1);
        }

        let reached = rendered_nodes(&scene, 0);
        assert!(reached.contains(&panel));
        assert!(!reached.contains(&overlay));
        assert!(rendered_nodes(&scene, 1).contains(&overlay));

        if let Some(node) = scene.node_mut(root) {
            node.visible = false;
        }
        let reached = rendered_nodes(&scene, 0);
        assert!(!reached.contains(&root));
        assert!(!reached.contains(&panel));
    }
}
