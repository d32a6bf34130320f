use ordered_float::OrderedFloat;

use crate::{
    geometry::{FloatType, WorldBox},
    scene::{Scene, TriangleIdx},
};

use super::{BvhNode, BvhSettings, TriangleBvh};

/// Split candidates are placed at `k * SPLIT_STEP` of the extent, for k in `1..SPLIT_CANDIDATES + 1`
const SPLIT_STEP: FloatType = 0.05;
const SPLIT_CANDIDATES: usize = 19;

#[derive(Clone, Debug)]
struct BvhObject {
    index: TriangleIdx,
    bounds: WorldBox,
}

impl TriangleBvh {
    #[tracing::instrument(skip_all, fields(triangles = scene.triangles.len()))]
    pub fn build(scene: &Scene, settings: &BvhSettings) -> TriangleBvh {
        let objects = scene
            .triangles
            .indices()
            .map(|index| BvhObject {
                index,
                bounds: scene.triangle(index).bounding_box(),
            })
            .collect();

        let bounds = scene.bounding_box();
        let root = if settings.max_depth <= 1 {
            leaf(bounds, objects)
        } else {
            split_node(bounds, objects, 1, settings)
        };

        let bvh = TriangleBvh {
            root,
            triangle_count: scene.triangles.len(),
        };
        tracing::debug!("BVH built: {}", bvh.statistics());
        bvh
    }
}

fn leaf(bounds: WorldBox, objects: Vec<BvhObject>) -> BvhNode {
    BvhNode::Leaf {
        bounds,
        triangles: objects.into_iter().map(|o| o.index).collect(),
    }
}

fn build_recursive(
    bounds: WorldBox,
    objects: Vec<BvhObject>,
    depth: u32,
    settings: &BvhSettings,
) -> BvhNode {
    if depth >= settings.max_depth {
        leaf(bounds, objects)
    } else {
        split_node(bounds, objects, depth, settings)
    }
}

/// Splits the node in two by the best of the candidate planes along its longest axis.
/// Objects overlapping both halves go to both children.
fn split_node(
    bounds: WorldBox,
    objects: Vec<BvhObject>,
    depth: u32,
    settings: &BvhSettings,
) -> BvhNode {
    let axis = bounds.longest_axis();
    let axis_min = bounds.min[axis.index()];
    let extent = bounds.size()[axis.index()];
    let target = objects.len() as FloatType / 2.0;

    let halves = |k: usize| bounds.split_at(axis, axis_min + extent * SPLIT_STEP * k as FloatType);
    let count = |b: &WorldBox| objects.iter().filter(|o| o.bounds.overlaps(b)).count();

    let best_k = (1..=SPLIT_CANDIDATES)
        .min_by_key(|&k| {
            let (low, high) = halves(k);
            let score = (count(&low) as FloatType - target).abs()
                + (count(&high) as FloatType - target).abs();
            OrderedFloat(score)
        })
        .unwrap_or(SPLIT_CANDIDATES / 2 + 1);

    let (low_bounds, high_bounds) = halves(best_k);
    let parent_count = objects.len();
    let low_objects: Vec<_> = objects
        .iter()
        .filter(|o| o.bounds.overlaps(&low_bounds))
        .cloned()
        .collect();
    let high_objects: Vec<_> = objects
        .into_iter()
        .filter(|o| o.bounds.overlaps(&high_bounds))
        .collect();

    let child = |child_bounds: WorldBox, child_objects: Vec<BvhObject>| {
        let len = child_objects.len();
        if len <= settings.max_leaf_objects || len == parent_count {
            leaf(child_bounds, child_objects)
        } else {
            build_recursive(child_bounds, child_objects, depth + 1, settings)
        }
    };

    BvhNode::Inner {
        bounds,
        axis,
        children: Box::new([
            child(low_bounds, low_objects),
            child(high_bounds, high_objects),
        ]),
    }
}
