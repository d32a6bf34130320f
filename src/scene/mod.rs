pub mod cornell_box;
mod material;
pub mod triangle_bvh;

pub use material::{
    Illumination, MATERIAL_RECORD_LEN, MIRROR_EXPONENT, Material, PHONG_LIGHT_EXPONENT,
};

use index_vec::IndexVec;
use indexmap::IndexMap;
use nalgebra::Rotation3;
use thiserror::Error;

use crate::geometry::{FloatType, Triangle, WorldBox, WorldPoint, WorldVector};

/// Relative padding of the scene bounds, keeps geometry on the outer faces strictly inside.
const BOUNDS_PADDING: FloatType = 1e-4;

index_vec::define_index_type! {
    pub struct VertexIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    pub struct TriangleIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    pub struct MaterialIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriangleRecord {
    pub vertices: Triangle<VertexIdx>,
    pub material: MaterialIdx,
}

/// Indexed triangle soup with per-triangle materials.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub vertices: IndexVec<VertexIdx, WorldPoint>,
    /// Per-vertex shading normals, same length as `vertices` if present.
    pub normals: Option<IndexVec<VertexIdx, WorldVector>>,
    pub triangles: IndexVec<TriangleIdx, TriangleRecord>,
    pub materials: IndexVec<MaterialIdx, Material>,
}

impl Scene {
    pub fn triangle(&self, index: TriangleIdx) -> Triangle<WorldPoint> {
        self.triangles[index].vertices.map(|v| self.vertices[*v])
    }

    pub fn triangle_normals(&self, index: TriangleIdx) -> Option<Triangle<WorldVector>> {
        let normals = self.normals.as_ref()?;
        Some(self.triangles[index].vertices.map(|v| normals[*v]))
    }

    pub fn material(&self, index: TriangleIdx) -> &Material {
        &self.materials[self.triangles[index].material]
    }

    /// Bounds of all referenced vertices, slightly padded.
    /// Empty scene gives a degenerate box at the origin.
    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::from_points(
            self.triangles
                .iter()
                .flat_map(|t| t.vertices.iter())
                .map(|v| &self.vertices[*v]),
        )
        .map(|b| b.padded(BOUNDS_PADDING))
        .unwrap_or_default()
    }

    pub fn emissive_triangle_count(&self) -> usize {
        self.triangles
            .iter()
            .filter(|t| self.materials[t.material].is_emissive())
            .count()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("Triangle {triangle} references vertex {vertex}, but there are only {count} vertices")]
    VertexOutOfRange {
        triangle: usize,
        vertex: usize,
        count: usize,
    },

    #[error("Triangle {triangle} references material {material}, but there are only {count} materials")]
    MaterialOutOfRange {
        triangle: usize,
        material: usize,
        count: usize,
    },

    #[error("Vertex normals must be given either for all vertices or for none")]
    PartialNormals,
}

/// Incrementally assembles a `Scene`.
/// Materials are registered by name; registering the same name twice replaces the material.
#[derive(Clone, Debug, Default)]
pub struct SceneBuilder {
    vertices: IndexVec<VertexIdx, WorldPoint>,
    normals: IndexVec<VertexIdx, Option<WorldVector>>,
    triangles: IndexVec<TriangleIdx, TriangleRecord>,
    materials: IndexMap<String, Material>,
}

impl SceneBuilder {
    pub fn new() -> SceneBuilder {
        SceneBuilder::default()
    }

    pub fn material(&mut self, name: impl Into<String>, material: Material) -> MaterialIdx {
        let (index, _) = self.materials.insert_full(name.into(), material);
        MaterialIdx::from_usize(index)
    }

    pub fn vertex(&mut self, position: WorldPoint) -> VertexIdx {
        self.normals.push(None);
        self.vertices.push(position)
    }

    pub fn vertex_with_normal(&mut self, position: WorldPoint, normal: WorldVector) -> VertexIdx {
        self.normals.push(Some(normal.normalize()));
        self.vertices.push(position)
    }

    pub fn triangle(&mut self, vertices: [VertexIdx; 3], material: MaterialIdx) -> TriangleIdx {
        let [a, b, c] = vertices;
        self.triangles.push(TriangleRecord {
            vertices: Triangle::new(a, b, c),
            material,
        })
    }

    /// Adds a planar quad `a b c d` (in winding order) as two triangles.
    pub fn quad(&mut self, corners: [WorldPoint; 4], material: MaterialIdx) {
        let [a, b, c, d] = corners.map(|p| self.vertex(p));
        self.triangle([a, b, c], material);
        self.triangle([a, c, d], material);
    }

    /// Adds a box with the given center and size, rotated by `angle` radians around +Y.
    pub fn cuboid(
        &mut self,
        center: WorldPoint,
        size: WorldVector,
        angle: FloatType,
        material: MaterialIdx,
    ) {
        let rotation = Rotation3::from_axis_angle(&WorldVector::y_axis(), angle);
        let half = size / 2.0;
        let corner = |x: FloatType, y: FloatType, z: FloatType| {
            center + rotation * WorldVector::new(x * half.x, y * half.y, z * half.z)
        };

        let faces = [
            [(-1.0, -1.0, 1.0), (1.0, -1.0, 1.0), (1.0, 1.0, 1.0), (-1.0, 1.0, 1.0)],
            [(1.0, -1.0, -1.0), (-1.0, -1.0, -1.0), (-1.0, 1.0, -1.0), (1.0, 1.0, -1.0)],
            [(1.0, -1.0, 1.0), (1.0, -1.0, -1.0), (1.0, 1.0, -1.0), (1.0, 1.0, 1.0)],
            [(-1.0, -1.0, -1.0), (-1.0, -1.0, 1.0), (-1.0, 1.0, 1.0), (-1.0, 1.0, -1.0)],
            [(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0), (1.0, 1.0, -1.0), (-1.0, 1.0, -1.0)],
            [(-1.0, -1.0, -1.0), (1.0, -1.0, -1.0), (1.0, -1.0, 1.0), (-1.0, -1.0, 1.0)],
        ];
        for face in faces {
            self.quad(face.map(|(x, y, z)| corner(x, y, z)), material);
        }
    }

    pub fn build(self) -> Result<Scene, SceneError> {
        for (i, t) in self.triangles.iter_enumerated() {
            if let Some(v) = t.vertices.iter().find(|v| v.index() >= self.vertices.len()) {
                return Err(SceneError::VertexOutOfRange {
                    triangle: i.index(),
                    vertex: v.index(),
                    count: self.vertices.len(),
                });
            }
            if t.material.index() >= self.materials.len() {
                return Err(SceneError::MaterialOutOfRange {
                    triangle: i.index(),
                    material: t.material.index(),
                    count: self.materials.len(),
                });
            }
        }

        let normals = if self.normals.iter().all(Option::is_none) {
            None
        } else {
            Some(
                self.normals
                    .into_iter()
                    .collect::<Option<IndexVec<VertexIdx, WorldVector>>>()
                    .ok_or(SceneError::PartialNormals)?,
            )
        };

        Ok(Scene {
            vertices: self.vertices,
            normals,
            triangles: self.triangles,
            materials: self.materials.into_values().collect(),
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::geometry::{Color, test::world_point_strategy};
    use assert2::{assert, let_assert};
    use proptest::prelude::*;

    /// Scene with one diffuse material and independent vertices for every triangle.
    pub fn soup_scene(triangles: &[Triangle<WorldPoint>]) -> Scene {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", Material::diffuse(Color::repeat(0.5)));
        for t in triangles {
            let v = [t[0], t[1], t[2]].map(|p| builder.vertex(p));
            builder.triangle(v, m);
        }
        builder.build().unwrap()
    }

    pub fn triangle_strategy() -> impl Strategy<Value = Triangle<WorldPoint>> {
        (world_point_strategy(), world_point_strategy(), world_point_strategy())
            .prop_map(|(a, b, c)| Triangle::new(a, b, c))
    }

    fn white() -> Material {
        Material::diffuse(Color::repeat(0.8))
    }

    #[test]
    fn build_quad() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", white());
        builder.quad(
            [
                WorldPoint::new(0.0, 0.0, 0.0),
                WorldPoint::new(1.0, 0.0, 0.0),
                WorldPoint::new(1.0, 1.0, 0.0),
                WorldPoint::new(0.0, 1.0, 0.0),
            ],
            m,
        );
        let_assert!(Ok(scene) = builder.build());
        assert!(scene.vertices.len() == 4);
        assert!(scene.triangles.len() == 2);
        assert!(scene.normals.is_none());
        let area: f32 = scene
            .triangles
            .indices()
            .map(|i| scene.triangle(i).area())
            .sum();
        assert!((area - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cuboid_is_closed() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", white());
        builder.cuboid(
            WorldPoint::new(1.0, 2.0, 3.0),
            WorldVector::new(2.0, 2.0, 2.0),
            0.3,
            m,
        );
        let scene = builder.build().unwrap();
        assert!(scene.triangles.len() == 12);

        let area: f32 = scene
            .triangles
            .indices()
            .map(|i| scene.triangle(i).area())
            .sum();
        assert!((area - 24.0).abs() < 1e-4);
    }

    #[test]
    fn same_material_name_is_replaced() {
        let mut builder = SceneBuilder::new();
        let a = builder.material("m", white());
        let b = builder.material("m", Material::mirror());
        assert!(a == b);
        let v = [WorldPoint::origin(); 3].map(|p| builder.vertex(p));
        builder.triangle(v, a);
        let scene = builder.build().unwrap();
        assert!(scene.materials.len() == 1);
        assert!(scene.materials[a].is_mirror());
    }

    #[test]
    fn vertex_out_of_range() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", white());
        let a = builder.vertex(WorldPoint::origin());
        builder.triangle([a, a, VertexIdx::from_usize(5)], m);
        let_assert!(Err(SceneError::VertexOutOfRange { vertex: 5, .. }) = builder.build());
    }

    #[test]
    fn material_out_of_range() {
        let mut builder = SceneBuilder::new();
        let a = builder.vertex(WorldPoint::origin());
        builder.triangle([a, a, a], MaterialIdx::from_usize(0));
        let_assert!(Err(SceneError::MaterialOutOfRange { .. }) = builder.build());
    }

    #[test]
    fn partial_normals() {
        let mut builder = SceneBuilder::new();
        builder.vertex(WorldPoint::origin());
        builder.vertex_with_normal(WorldPoint::origin(), WorldVector::z());
        assert!(builder.build().err() == Some(SceneError::PartialNormals));
    }

    #[test]
    fn full_normals() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", white());
        let v = [0.0, 1.0, 2.0].map(|x| {
            builder.vertex_with_normal(WorldPoint::new(x, x * x, 0.0), WorldVector::new(0.0, 0.0, 2.0))
        });
        builder.triangle(v, m);
        let scene = builder.build().unwrap();
        let_assert!(Some(normals) = scene.triangle_normals(TriangleIdx::from_usize(0)));
        assert!(normals[1] == WorldVector::z());
    }

    #[test]
    fn bounding_box_is_padded() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("white", white());
        builder.cuboid(WorldPoint::origin(), WorldVector::repeat(2.0), 0.0, m);
        let scene = builder.build().unwrap();
        let b = scene.bounding_box();
        assert!(b.min.x < -1.0);
        assert!(b.max.y > 1.0);
        assert!(b.max.y < 1.01);
    }

    #[test]
    fn empty_scene_bounds() {
        assert!(Scene::default().bounding_box() == WorldBox::default());
    }
}
