mod building;
mod printing;

pub use printing::{BvhStatistics, Summary};

use bon::bon;

use crate::{
    geometry::{Axis, WorldBox},
    scene::TriangleIdx,
    settings::SettingsError,
};

/// Largest allowed tree depth.
/// Traversal keeps at most two entries per level on its stack, this keeps it within capacity.
pub const MAX_BVH_DEPTH: u32 = 31;

/// Binary hierarchy over the triangles of a scene.
/// Child boxes are the parent box cut by the split plane, triangles crossing the plane are
/// referenced from both sides.
#[derive(Clone, Debug)]
pub struct TriangleBvh {
    root: BvhNode,
    triangle_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BvhNode {
    Inner {
        bounds: WorldBox,
        axis: Axis,
        children: Box<[BvhNode; 2]>,
    },
    Leaf {
        bounds: WorldBox,
        triangles: Vec<TriangleIdx>,
    },
}

impl BvhNode {
    pub fn bounds(&self) -> &WorldBox {
        match self {
            BvhNode::Inner { bounds, .. } | BvhNode::Leaf { bounds, .. } => bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BvhSettings {
    pub max_depth: u32,
    pub max_leaf_objects: usize,
}

#[bon]
impl BvhSettings {
    #[builder]
    pub fn new(
        #[builder(default = 16)] max_depth: u32,
        #[builder(default = 16)] max_leaf_objects: usize,
    ) -> Result<Self, SettingsError> {
        if max_depth == 0 || max_depth > MAX_BVH_DEPTH {
            return Err(SettingsError::BvhDepth {
                depth: max_depth,
                max: MAX_BVH_DEPTH,
            });
        }
        if max_leaf_objects == 0 {
            return Err(SettingsError::EmptyLeaves);
        }
        Ok(BvhSettings {
            max_depth,
            max_leaf_objects,
        })
    }
}

impl Default for BvhSettings {
    fn default() -> Self {
        BvhSettings {
            max_depth: 16,
            max_leaf_objects: 16,
        }
    }
}

impl TriangleBvh {
    pub fn root(&self) -> &BvhNode {
        &self.root
    }

    pub fn bounding_box(&self) -> &WorldBox {
        self.root.bounds()
    }

    /// Number of distinct triangles the tree was built over.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Depth-first pre-order walk over all nodes, with their depth (root is 1).
    pub fn walk(&self) -> impl Iterator<Item = (u32, &BvhNode)> {
        let mut stack = vec![(1, &self.root)];
        std::iter::from_fn(move || {
            let (depth, node) = stack.pop()?;
            if let BvhNode::Inner { children, .. } = node {
                stack.push((depth + 1, &children[1]));
                stack.push((depth + 1, &children[0]));
            }
            Some((depth, node))
        })
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&WorldBox, &[TriangleIdx])> {
        self.walk().filter_map(|(_, node)| match node {
            BvhNode::Leaf { bounds, triangles } => Some((bounds, triangles.as_slice())),
            BvhNode::Inner { .. } => None,
        })
    }
}
