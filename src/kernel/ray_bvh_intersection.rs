use std::ops::Range;

use arrayvec::ArrayVec;

use crate::{
    geometry::{FloatType, Ray, TriangleHit, WorldPoint, WorldVector, ray_box_interval, ray_triangle},
    packing::{GroupTables, NodeIdx, NodeKind, SceneTables},
    scene::{Material, TriangleRecord},
};

/// Capacity of the traversal stack, more than two entries per level of the deepest tree.
pub const TRAVERSAL_STACK_CAPACITY: usize = 64;

/// Bounded stack of inner nodes waiting to be visited, with their ray entry distances.
#[derive(Clone, Debug, Default)]
pub struct TraversalStack {
    entries: ArrayVec<(NodeIdx, FloatType), TRAVERSAL_STACK_CAPACITY>,
}

impl TraversalStack {
    pub fn new() -> TraversalStack {
        TraversalStack::default()
    }

    /// Panics on overflow, which only a malformed tree can cause.
    pub fn push(&mut self, node: NodeIdx, entry: FloatType) {
        if self.entries.try_push((node, entry)).is_err() {
            panic!("BVH traversal stack overflow ({TRAVERSAL_STACK_CAPACITY} entries)");
        }
    }

    pub fn pop(&mut self) -> Option<(NodeIdx, FloatType)> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Nearest surface hit by a ray.
#[derive(Copy, Clone, Debug)]
pub struct Intersection<'a> {
    pub t: FloatType,
    pub point: WorldPoint,
    /// Unit normal as stored in the scene, not oriented towards the ray.
    pub normal: WorldVector,
    pub material: &'a Material,
}

struct Nearest<'a> {
    t: FloatType,
    hit: Option<(TriangleHit, &'a TriangleRecord)>,
}

impl GroupTables {
    /// Finds the nearest hit closer than `max_t`.
    pub fn intersect(&self, ray: &Ray, max_t: FloatType) -> Option<Intersection<'_>> {
        let mut nearest = Nearest { t: max_t, hit: None };
        let mut stack = TraversalStack::new();

        match &self.root().kind {
            NodeKind::Leaf { triangles } => {
                self.intersect_leaf(ray, triangles.clone(), &mut nearest)
            }
            NodeKind::Inner { .. } => stack.push(NodeIdx::from_usize(0), 0.0),
        }

        while let Some((index, entry)) = stack.pop() {
            if entry > nearest.t {
                // Everything below the node is farther than the best hit so far
                continue;
            }
            let node = &self.nodes[index];
            let NodeKind::Inner { children, .. } = &node.kind else {
                continue;
            };

            let mut inner: ArrayVec<(NodeIdx, FloatType), 2> = ArrayVec::new();
            for (child, bounds) in children.iter().zip(&node.child_bounds) {
                let Some((entry, _)) = ray_box_interval(ray, bounds) else {
                    continue;
                };
                if entry > nearest.t {
                    continue;
                }
                match &self.nodes[*child].kind {
                    NodeKind::Leaf { triangles } => {
                        self.intersect_leaf(ray, triangles.clone(), &mut nearest)
                    }
                    NodeKind::Inner { .. } => inner.push((*child, entry)),
                }
            }

            // Nearer child goes on top
            if inner.len() == 2 && inner[0].1 < inner[1].1 {
                inner.swap(0, 1);
            }
            for (child, entry) in inner {
                stack.push(child, entry);
            }
        }

        let (hit, record) = nearest.hit?;
        Some(Intersection {
            t: hit.t,
            point: hit.point,
            normal: hit.normal,
            material: &self.materials[record.material],
        })
    }

    fn intersect_leaf<'a>(&'a self, ray: &Ray, triangles: Range<usize>, nearest: &mut Nearest<'a>) {
        for record in &self.leaf_triangles[triangles] {
            let triangle = self.triangle(record);
            let normals = self.triangle_normals(record);
            if let Some(hit) = ray_triangle(ray, &triangle, normals.as_ref()) {
                if hit.t < nearest.t {
                    nearest.t = hit.t;
                    nearest.hit = Some((hit, record));
                }
            }
        }
    }

    /// Reference implementation testing every triangle.
    pub fn intersect_linear(&self, ray: &Ray, max_t: FloatType) -> Option<Intersection<'_>> {
        let mut nearest = Nearest { t: max_t, hit: None };
        for record in &self.triangles {
            let triangle = self.triangle(record);
            let normals = self.triangle_normals(record);
            if let Some(hit) = ray_triangle(ray, &triangle, normals.as_ref()) {
                if hit.t < nearest.t {
                    nearest.t = hit.t;
                    nearest.hit = Some((hit, record));
                }
            }
        }

        let (hit, record) = nearest.hit?;
        Some(Intersection {
            t: hit.t,
            point: hit.point,
            normal: hit.normal,
            material: &self.materials[record.material],
        })
    }
}

impl SceneTables {
    /// Nearest hit over all object groups.
    pub fn intersect(&self, ray: &Ray) -> Option<Intersection<'_>> {
        let mut nearest: Option<Intersection<'_>> = None;
        for group in &self.groups {
            let max_t = nearest.map_or(FloatType::INFINITY, |n| n.t);
            if let Some(hit) = group.intersect(ray, max_t) {
                nearest = Some(hit);
            }
        }
        nearest
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{
            Triangle,
            test::{nonzero_world_vector_strategy, world_point_strategy},
        },
        packing::{PackedGroup, pack_group},
        scene::{
            Scene, cornell_box,
            test::{soup_scene, triangle_strategy},
            triangle_bvh::{BvhSettings, TriangleBvh},
        },
    };
    use assert2::{assert, let_assert};
    use proptest::collection::vec;
    use test_strategy::proptest;

    fn tables(scene: &Scene, settings: &BvhSettings) -> SceneTables {
        let bvh = TriangleBvh::build(scene, settings);
        let packed: PackedGroup = pack_group(scene, &bvh).unwrap();
        SceneTables::decode(&[packed]).unwrap()
    }

    fn assert_same_hit(a: Option<Intersection>, b: Option<Intersection>) {
        match (a, b) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                assert!((a.t - b.t).abs() <= 1e-4 * a.t.max(1.0));
            }
            (a, b) => panic!("Hit mismatch: {a:?} vs {b:?}"),
        }
    }

    #[proptest(cases = 64)]
    fn bvh_matches_linear_scan(
        #[strategy(vec(triangle_strategy(), 0..100))] triangles: Vec<Triangle<WorldPoint>>,
        #[strategy(vec((world_point_strategy(), nonzero_world_vector_strategy()), 16))] rays: Vec<(
            WorldPoint,
            WorldVector,
        )>,
    ) {
        let scene = soup_scene(&triangles);
        let settings = BvhSettings::builder().max_leaf_objects(4).build().unwrap();
        let tables = tables(&scene, &settings);
        let group = &tables.groups[0];

        for (origin, direction) in rays {
            let ray = Ray::new(origin, direction);
            assert_same_hit(group.intersect(&ray, FloatType::INFINITY), group.intersect_linear(&ray, FloatType::INFINITY));
        }
    }

    #[test]
    fn cornell_box_rays() {
        let scene = cornell_box::scene().unwrap();
        let tables = tables(&scene, &BvhSettings::default());
        let group = &tables.groups[0];

        // Straight up from the floor center hits the light
        let ray = Ray::new(WorldPoint::new(0.0, 0.01, 0.0), WorldVector::y());
        let_assert!(Some(hit) = tables.intersect(&ray));
        assert!(hit.material.is_emissive());
        assert!((hit.t - 1.97).abs() < 1e-4);
        assert!(hit.normal.y.abs() > 0.999);

        for i in 0..200 {
            let angle = i as f32 * 0.1;
            let direction = WorldVector::new(angle.cos(), (angle * 0.37).sin(), angle.sin());
            let ray = Ray::new(WorldPoint::new(0.1, 1.0, 0.2), direction);
            assert_same_hit(group.intersect(&ray, FloatType::INFINITY), group.intersect_linear(&ray, FloatType::INFINITY));
        }
    }

    #[test]
    fn max_distance() {
        let scene = cornell_box::scene().unwrap();
        let tables = tables(&scene, &BvhSettings::default());
        let ray = Ray::new(WorldPoint::new(0.0, 0.01, 0.0), WorldVector::y());
        assert!(tables.groups[0].intersect(&ray, 1.0).is_none());
    }

    #[test]
    fn root_leaf() {
        let scene = cornell_box::scene().unwrap();
        let settings = BvhSettings::builder().max_depth(1).build().unwrap();
        let tables = tables(&scene, &settings);
        let_assert!(NodeKind::Leaf { .. } = &tables.groups[0].root().kind);

        let ray = Ray::new(WorldPoint::new(0.0, 1.0, 0.0), -WorldVector::y());
        let_assert!(Some(hit) = tables.intersect(&ray));
        assert!((hit.t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_scene_misses() {
        let tables = tables(&soup_scene(&[]), &BvhSettings::default());
        let ray = Ray::new(WorldPoint::origin(), WorldVector::x());
        assert!(tables.intersect(&ray).is_none());
    }

    #[test]
    fn nearest_over_groups() {
        let near = soup_scene(&[Triangle::new(
            WorldPoint::new(-1.0, -1.0, 1.0),
            WorldPoint::new(1.0, -1.0, 1.0),
            WorldPoint::new(0.0, 1.0, 1.0),
        )]);
        let far = soup_scene(&[Triangle::new(
            WorldPoint::new(-1.0, -1.0, 3.0),
            WorldPoint::new(1.0, -1.0, 3.0),
            WorldPoint::new(0.0, 1.0, 3.0),
        )]);
        let pack = |scene: &Scene| {
            pack_group(scene, &TriangleBvh::build(scene, &BvhSettings::default())).unwrap()
        };
        let tables = SceneTables::decode(&[pack(&far), pack(&near)]).unwrap();

        let ray = Ray::new(WorldPoint::origin(), WorldVector::z());
        let_assert!(Some(hit) = tables.intersect(&ray));
        assert!((hit.t - 1.0).abs() < 1e-5);
    }

    #[test]
    #[should_panic]
    fn stack_overflow_panics() {
        let mut stack = TraversalStack::new();
        for _ in 0..=TRAVERSAL_STACK_CAPACITY {
            stack.push(NodeIdx::from_usize(0), 0.0);
        }
    }

    #[test]
    fn stack_is_lifo() {
        let mut stack = TraversalStack::new();
        stack.push(NodeIdx::from_usize(1), 1.0);
        stack.push(NodeIdx::from_usize(2), 2.0);
        assert!(stack.len() == 2);
        assert!(stack.pop() == Some((NodeIdx::from_usize(2), 2.0)));
        assert!(stack.pop() == Some((NodeIdx::from_usize(1), 1.0)));
        assert!(stack.is_empty());
    }
}
