//! Serialization of scenes and BVHs into flat `f32` buffers, and validating decoding back
//! into typed tables.

pub mod layout;
mod meta;
mod tables;

pub use meta::{META_RECORD_LEN, MetaRecord};
pub use tables::{
    BufferError, EmissiveRange, FlatNode, GroupTables, Light, NodeIdx, NodeKind, SceneTables,
};

use std::ops::Range;

use itertools::Itertools as _;
use thiserror::Error;

use crate::{
    geometry::FloatType,
    scene::{
        MATERIAL_RECORD_LEN, Scene, TriangleIdx, TriangleRecord,
        triangle_bvh::{BvhNode, TriangleBvh},
    },
};

use layout::{
    ALIGNMENT, MAX_EXACT_INTEGER, NONE, TRIANGLE_RECORD_LEN, bvh_node, padding, scene_header,
};

#[derive(Debug, Error, PartialEq)]
pub enum PackError {
    #[error("{buffer} buffer would have {len} floats, offsets above {MAX_EXACT_INTEGER} are not exact")]
    BufferTooLarge { buffer: &'static str, len: usize },

    #[error("Illumination code {0} of material {1} is not exactly representable")]
    IllumCode(u32, usize),

    #[error("BVH was built over {bvh} triangles, but the scene has {scene}")]
    BvhMismatch { bvh: usize, scene: usize },
}

/// One object group: triangle/material buffer and the BVH buffer over it.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedGroup {
    pub scene: Vec<FloatType>,
    pub bvh: Vec<FloatType>,
}

impl PackedGroup {
    pub fn scene_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.scene)
    }

    pub fn bvh_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bvh)
    }

    /// Both buffers as bytes, in the order (scene, bvh).
    pub fn as_bytes(&self) -> [&[u8]; 2] {
        [self.scene_bytes(), self.bvh_bytes()]
    }
}

fn triangle_record(record: &TriangleRecord) -> [FloatType; TRIANGLE_RECORD_LEN] {
    [
        (record.vertices[0].index() + 1) as FloatType,
        (record.vertices[1].index() + 1) as FloatType,
        (record.vertices[2].index() + 1) as FloatType,
        record.material.index() as FloatType,
    ]
}

fn check_len(buffer: &'static str, len: usize) -> Result<(), PackError> {
    if len > MAX_EXACT_INTEGER {
        Err(PackError::BufferTooLarge { buffer, len })
    } else {
        Ok(())
    }
}

/// Serializes a scene and its BVH.
#[tracing::instrument(skip_all, fields(triangles = scene.triangles.len()))]
pub fn pack_group(scene: &Scene, bvh: &TriangleBvh) -> Result<PackedGroup, PackError> {
    if bvh.triangle_count() != scene.triangles.len() {
        return Err(PackError::BvhMismatch {
            bvh: bvh.triangle_count(),
            scene: scene.triangles.len(),
        });
    }
    for (i, material) in scene.materials.iter().enumerate() {
        let code = material.illum.code();
        if code as usize > MAX_EXACT_INTEGER {
            return Err(PackError::IllumCode(code, i));
        }
    }

    let packed = PackedGroup {
        scene: pack_scene(scene)?,
        bvh: pack_bvh(scene, bvh)?,
    };
    tracing::debug!(
        scene_floats = packed.scene.len(),
        bvh_floats = packed.bvh.len(),
        "Packed object group"
    );
    Ok(packed)
}

/// Triangle indices ordered with emissive ones first, grouped by material,
/// and the ranges (in positions of the returned order) of the emissive groups.
fn emissive_first_order(scene: &Scene) -> (Vec<TriangleIdx>, Vec<Range<usize>>) {
    let emissive_rank = |index: TriangleIdx| {
        let material = scene.triangles[index].material;
        if scene.materials[material].is_emissive() {
            material.index()
        } else {
            usize::MAX
        }
    };

    let mut order: Vec<_> = scene.triangles.indices().collect();
    order.sort_by_key(|&i| emissive_rank(i));

    let mut ranges = Vec::new();
    let mut start = 0;
    for (rank, chunk) in &order.iter().chunk_by(|&&i| emissive_rank(i)) {
        let len = chunk.count();
        if rank != usize::MAX {
            ranges.push(start..start + len);
        }
        start += len;
    }

    if ranges.len() > scene_header::MAX_EMISSIVE_RANGES {
        tracing::warn!(
            emissive_materials = ranges.len(),
            "More than {} emissive materials, merging the rest into the last region",
            scene_header::MAX_EMISSIVE_RANGES
        );
        let end = ranges.last().map_or(0, |r| r.end);
        ranges.truncate(scene_header::MAX_EMISSIVE_RANGES);
        if let Some(last) = ranges.last_mut() {
            last.end = end;
        }
    }

    (order, ranges)
}

fn pack_scene(scene: &Scene) -> Result<Vec<FloatType>, PackError> {
    let vertex_count = scene.vertices.len();
    let vertex_start = scene_header::LEN;
    let index_start = vertex_start + 3 * vertex_count;
    let material_start = index_start + TRIANGLE_RECORD_LEN * scene.triangles.len();
    let normal_start = material_start + MATERIAL_RECORD_LEN * scene.materials.len();
    let normal_count = scene.normals.as_ref().map_or(0, |n| n.len());
    let len = normal_start + 3 * normal_count;
    check_len("Scene", len + padding(len))?;

    let (order, emissive_ranges) = emissive_first_order(scene);

    let mut buffer = Vec::with_capacity(len + padding(len));
    buffer.extend_from_slice(&[0.0; scene_header::LEN]);
    buffer[scene_header::NUM_VERTICES] = vertex_count as FloatType;
    buffer[scene_header::NUM_MATERIALS] = scene.materials.len() as FloatType;
    buffer[scene_header::VERTEX_START] = vertex_start as FloatType;
    buffer[scene_header::INDEX_START] = index_start as FloatType;
    buffer[scene_header::MATERIAL_START] = material_start as FloatType;
    if normal_count > 0 {
        buffer[scene_header::NORMAL_START] = normal_start as FloatType;
        buffer[scene_header::NORMAL_COUNT] = normal_count as FloatType;
    } else {
        buffer[scene_header::NORMAL_START] = NONE;
    }
    for slot in 0..scene_header::MAX_EMISSIVE_RANGES {
        let (start, end) = match emissive_ranges.get(slot) {
            Some(r) => (
                (index_start + TRIANGLE_RECORD_LEN * r.start) as FloatType,
                (index_start + TRIANGLE_RECORD_LEN * r.end) as FloatType,
            ),
            None => (NONE, NONE),
        };
        buffer[scene_header::EMISSIVE_RANGES + 2 * slot] = start;
        buffer[scene_header::EMISSIVE_RANGES + 2 * slot + 1] = end;
    }

    buffer.extend(scene.vertices.iter().flat_map(|v| [v.x, v.y, v.z]));
    buffer.extend(
        order
            .iter()
            .flat_map(|i| triangle_record(&scene.triangles[*i])),
    );
    buffer.extend(scene.materials.iter().flat_map(|m| m.to_record()));
    if let Some(normals) = &scene.normals {
        buffer.extend(normals.iter().flat_map(|n| [n.x, n.y, n.z]));
    }
    debug_assert!(buffer.len() == len);

    buffer.resize(len + padding(len), 0.0);
    Ok(buffer)
}

fn pack_bvh(scene: &Scene, bvh: &TriangleBvh) -> Result<Vec<FloatType>, PackError> {
    let mut buffer = Vec::new();
    pack_node(scene, bvh.root(), &mut buffer);
    let len = buffer.len();
    check_len("BVH", len + padding(len))?;
    buffer.resize(len + padding(len), 0.0);
    debug_assert!(buffer.len() % ALIGNMENT == 0);
    Ok(buffer)
}

/// Appends the node and its subtree in pre-order, returns its offset.
fn pack_node(scene: &Scene, node: &BvhNode, buffer: &mut Vec<FloatType>) -> usize {
    let offset = buffer.len();
    match node {
        BvhNode::Leaf { bounds, triangles } => {
            buffer.extend_from_slice(&[1.0, NONE, NONE, NONE, triangles.len() as FloatType]);
            buffer.extend_from_slice(&bounds.to_array());
            buffer.extend_from_slice(&bounds.to_array());
            buffer.extend(
                triangles
                    .iter()
                    .flat_map(|i| triangle_record(&scene.triangles[*i])),
            );
        }
        BvhNode::Inner {
            axis, children, ..
        } => {
            buffer.extend_from_slice(&[0.0, axis.index() as FloatType, NONE, NONE, NONE]);
            buffer.extend_from_slice(&children[0].bounds().to_array());
            buffer.extend_from_slice(&children[1].bounds().to_array());

            let left = pack_node(scene, &children[0], buffer);
            buffer[offset + bvh_node::LEFT] = left as FloatType;
            let right = pack_node(scene, &children[1], buffer);
            buffer[offset + bvh_node::RIGHT] = right as FloatType;
        }
    }
    offset
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{Color, WorldPoint, WorldVector},
        scene::{Material, MaterialIdx, SceneBuilder, cornell_box, triangle_bvh::BvhSettings},
    };
    use assert2::{assert, let_assert};

    fn pack(scene: &Scene) -> PackedGroup {
        let bvh = TriangleBvh::build(scene, &BvhSettings::default());
        pack_group(scene, &bvh).unwrap()
    }

    fn single_triangle_scene(material: Material) -> Scene {
        let mut builder = SceneBuilder::new();
        let m = builder.material("m", material);
        let v = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ]
        .map(|p| builder.vertex(p));
        builder.triangle(v, m);
        builder.build().unwrap()
    }

    #[test]
    fn scene_header() {
        let scene = single_triangle_scene(Material::diffuse(Color::repeat(0.5)));
        let packed = pack(&scene);
        let s = &packed.scene;

        assert!(s[..8] == [3.0, 1.0, 16.0, 25.0, 29.0, -1.0, 0.0, 0.0]);
        assert!(s[8..16] == [-1.0; 8]);
        // Vertices
        assert!(s[16..25] == [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        // 1-based indices and material
        assert!(s[25..29] == [1.0, 2.0, 3.0, 0.0]);
        assert!(s[29..44] == scene.materials[MaterialIdx::from_usize(0)].to_record());
        assert!(s.len() == 48);
        assert!(s[44..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn aligned_length_gets_no_padding() {
        let mut builder = SceneBuilder::new();
        builder.material("m", Material::diffuse(Color::repeat(0.5)));
        // 16 header + 3 * 11 vertices + 15 material = 64
        for i in 0..11 {
            builder.vertex(WorldPoint::new(i as f32, 0.0, 0.0));
        }
        let scene = builder.build().unwrap();
        let packed = pack_scene(&scene).unwrap();
        assert!(packed.len() == 64);
    }

    #[test]
    fn emissive_triangles_come_first() {
        let mut builder = SceneBuilder::new();
        let white = builder.material("white", Material::diffuse(Color::repeat(0.5)));
        let light = builder.material("light", Material::emitter(Color::repeat(5.0)));
        let p = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ];
        for m in [white, white, light, white, light] {
            let v = p.map(|p| builder.vertex(p));
            builder.triangle(v, m);
        }
        let scene = builder.build().unwrap();
        let packed = pack(&scene);
        let s = &packed.scene;

        let index_start = s[scene_header::INDEX_START] as usize;
        assert!(s[8] as usize == index_start);
        assert!(s[9] as usize == index_start + 2 * TRIANGLE_RECORD_LEN);
        assert!(s[10..16] == [-1.0; 6]);
        for record in s[index_start..index_start + 8].chunks(TRIANGLE_RECORD_LEN) {
            assert!(record[3] == light.index() as f32);
        }
    }

    #[test]
    fn more_than_four_emissive_materials_are_merged() {
        let mut builder = SceneBuilder::new();
        let p = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ];
        for i in 0..6 {
            let m = builder.material(format!("light{i}"), Material::emitter(Color::repeat(1.0)));
            let v = p.map(|p| builder.vertex(p));
            builder.triangle(v, m);
        }
        let scene = builder.build().unwrap();
        let s = pack(&scene).scene;

        let index_start = s[scene_header::INDEX_START];
        let r = TRIANGLE_RECORD_LEN as f32;
        assert!(s[8..14] == [index_start, index_start + r, index_start + r, index_start + 2.0 * r, index_start + 2.0 * r, index_start + 3.0 * r]);
        assert!(s[14..16] == [index_start + 3.0 * r, index_start + 6.0 * r]);
    }

    #[test]
    fn normals_are_appended() {
        let mut builder = SceneBuilder::new();
        let m = builder.material("m", Material::diffuse(Color::repeat(0.5)));
        let v = [
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        ]
        .map(|p| builder.vertex_with_normal(p, WorldVector::z()));
        builder.triangle(v, m);
        let scene = builder.build().unwrap();
        let s = pack(&scene).scene;

        assert!(s[scene_header::NORMAL_START] == 44.0);
        assert!(s[scene_header::NORMAL_COUNT] == 3.0);
        assert!(s[44..53] == [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert!(s.len() == 64);
    }

    #[test]
    fn bvh_records() {
        let scene = single_triangle_scene(Material::diffuse(Color::repeat(0.5)));
        let bvh = TriangleBvh::build(&scene, &BvhSettings::default());
        let packed = pack_group(&scene, &bvh).unwrap();
        let b = &packed.bvh;

        let_assert!(BvhNode::Inner { axis, children, .. } = bvh.root());
        // Root
        assert!(b[bvh_node::IS_LEAF] == 0.0);
        assert!(b[bvh_node::AXIS] == axis.index() as f32);
        assert!(b[bvh_node::LEFT] == bvh_node::LEN as f32);
        assert!(b[bvh_node::TRIANGLE_COUNT] == -1.0);
        assert!(b[bvh_node::LEFT_BOX..bvh_node::RIGHT_BOX] == children[0].bounds().to_array());
        assert!(b[bvh_node::RIGHT_BOX..bvh_node::LEN] == children[1].bounds().to_array());

        // Left child is a leaf right after the root
        let left = bvh_node::LEN;
        let right = b[bvh_node::RIGHT] as usize;
        let left_count = b[left + bvh_node::TRIANGLE_COUNT] as usize;
        assert!(b[left + bvh_node::IS_LEAF] == 1.0);
        assert!(b[left + bvh_node::AXIS] == -1.0);
        assert!(b[left + bvh_node::LEFT] == -1.0);
        assert!(right == left + bvh_node::LEN + TRIANGLE_RECORD_LEN * left_count);
        assert!(b[left + bvh_node::LEFT_BOX..left + bvh_node::RIGHT_BOX] == b[left + bvh_node::RIGHT_BOX..left + bvh_node::LEN]);
        if left_count == 1 {
            assert!(b[left + bvh_node::LEN..left + bvh_node::LEN + 4] == [1.0, 2.0, 3.0, 0.0]);
        }
        assert!(b.len() % ALIGNMENT == 0);
    }

    #[test]
    fn bvh_mismatch() {
        let scene = cornell_box::scene().unwrap();
        let other = single_triangle_scene(Material::mirror());
        let bvh = TriangleBvh::build(&other, &BvhSettings::default());
        let_assert!(Err(PackError::BvhMismatch { bvh: 1, .. }) = pack_group(&scene, &bvh));
    }

    #[test]
    fn bytes() {
        let packed = pack(&cornell_box::scene().unwrap());
        let [scene, bvh] = packed.as_bytes();
        assert!(scene.len() == 4 * packed.scene.len());
        assert!(bvh.len() == 4 * packed.bvh.len());
        assert!(scene[..4] == packed.scene[0].to_ne_bytes());
    }
}
