use std::fmt::{self, Display};

use super::{BvhNode, TriangleBvh};

/// Running min/max/mean of a sampled count.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f32,
}

impl Summary {
    fn add(&mut self, value: usize) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value as f32 - self.mean) / (self.count as f32);
    }
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            count: 0,
            min: usize::MAX,
            max: 0,
            mean: 0.0,
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "-")
        } else {
            write!(f, "{} - {}; avg {:.1}", self.min, self.max, self.mean)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    pub inner_nodes: usize,
    /// Depth of the leaves, root is depth 1
    pub leaf_depth: Summary,
    /// Triangle references per leaf
    pub leaf_fill: Summary,
    pub max_depth: u32,
    /// Total triangle references divided by the triangle count
    pub duplication: f32,
}

impl Display for BvhStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inner nodes, {} leaves; leaf depth {}; leaf fill {}; duplication {:.2}",
            self.inner_nodes, self.leaf_depth.count, self.leaf_depth, self.leaf_fill, self.duplication
        )
    }
}

impl TriangleBvh {
    pub fn statistics(&self) -> BvhStatistics {
        let mut inner_nodes = 0;
        let mut leaf_depth = Summary::default();
        let mut leaf_fill = Summary::default();
        let mut max_depth = 0;
        let mut references = 0;

        for (depth, node) in self.walk() {
            max_depth = max_depth.max(depth);
            match node {
                BvhNode::Inner { .. } => inner_nodes += 1,
                BvhNode::Leaf { triangles, .. } => {
                    leaf_depth.add(depth as usize);
                    leaf_fill.add(triangles.len());
                    references += triangles.len();
                }
            }
        }

        BvhStatistics {
            inner_nodes,
            leaf_depth,
            leaf_fill,
            max_depth,
            duplication: if self.triangle_count == 0 {
                0.0
            } else {
                references as f32 / self.triangle_count as f32
            },
        }
    }

    /// Indented text dump of the tree structure.
    pub fn dump(&self) -> impl Display + '_ {
        TreeDump(self)
    }
}

struct TreeDump<'a>(&'a TriangleBvh);

impl Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, node) in self.0.walk() {
            let indent = "  ".repeat(depth as usize - 1);
            let b = node.bounds();
            match node {
                BvhNode::Inner { axis, .. } => write!(f, "{indent}- I {axis:?}")?,
                BvhNode::Leaf { triangles, .. } => write!(f, "{indent}- L {}", triangles.len())?,
            }
            writeln!(f, ": {:?}-{:?}", b.min, b.max)?;
        }
        Ok(())
    }
}
