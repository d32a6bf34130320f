use std::ops::Range;

use arrayvec::ArrayVec;
use index_vec::IndexVec;
use thiserror::Error;

use crate::{
    geometry::{Axis, FloatType, Triangle, WorldBox, WorldPoint, WorldVector},
    scene::{
        MATERIAL_RECORD_LEN, Material, MaterialIdx, TriangleIdx, TriangleRecord, VertexIdx,
        triangle_bvh::MAX_BVH_DEPTH,
    },
    settings::SettingsError,
};

use super::{
    PackedGroup,
    layout::{ALIGNMENT, MAX_EXACT_INTEGER, NONE, TRIANGLE_RECORD_LEN, bvh_node, scene_header},
};

#[derive(Debug, Error, PartialEq)]
pub enum BufferError {
    #[error("{buffer} buffer has {len} floats, at least {needed} are needed")]
    Truncated {
        buffer: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("{buffer} buffer length {len} is not a multiple of {ALIGNMENT}")]
    Misaligned { buffer: &'static str, len: usize },

    #[error("Value {value} at offset {offset} of the {buffer} buffer is not a valid integer")]
    NotAnInteger {
        buffer: &'static str,
        offset: usize,
        value: FloatType,
    },

    #[error("Header field {field} has inconsistent value {value}")]
    Header { field: &'static str, value: usize },

    #[error("Triangle record at offset {offset} references vertex {vertex} of {count}")]
    VertexIndex {
        offset: usize,
        vertex: usize,
        count: usize,
    },

    #[error("Triangle record at offset {offset} references material {material} of {count}")]
    MaterialIndex {
        offset: usize,
        material: usize,
        count: usize,
    },

    #[error("Material {0} has an invalid illumination code")]
    InvalidMaterial(usize),

    #[error("Emissive range {start}..{end} does not cover whole triangle records")]
    EmissiveRange { start: usize, end: usize },

    #[error("BVH node offset {offset} is out of bounds or not after its parent")]
    NodeOffset { offset: usize },

    #[error("BVH node at offset {offset} has invalid leaf flag {value}")]
    NodeKind { offset: usize, value: FloatType },

    #[error("BVH node at offset {offset} has invalid split axis {axis}")]
    NodeAxis { offset: usize, axis: usize },

    #[error("BVH is deeper than {MAX_BVH_DEPTH} levels")]
    TooDeep,

    #[error("Metadata field {field} has invalid value {value}")]
    MetaField { field: &'static str, value: FloatType },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Inner { axis: Axis, children: [NodeIdx; 2] },
    /// Range into `GroupTables::leaf_triangles`
    Leaf { triangles: Range<usize> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlatNode {
    pub kind: NodeKind,
    /// Boxes of the two children. Leaves have their own box in both slots.
    pub child_bounds: [WorldBox; 2],
}

/// Contiguous run of emissive triangles in the decoded triangle table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EmissiveRange {
    pub start: TriangleIdx,
    pub end: TriangleIdx,
}

impl EmissiveRange {
    pub fn len(&self) -> usize {
        self.end.index() - self.start.index()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated, typed view of one packed object group.
/// Triangles are in the packed order, emissive ones first.
#[derive(Clone, Debug)]
pub struct GroupTables {
    pub vertices: IndexVec<VertexIdx, WorldPoint>,
    pub normals: Option<IndexVec<VertexIdx, WorldVector>>,
    pub triangles: IndexVec<TriangleIdx, TriangleRecord>,
    pub materials: IndexVec<MaterialIdx, Material>,
    pub emissive_ranges: ArrayVec<EmissiveRange, { scene_header::MAX_EMISSIVE_RANGES }>,
    /// Pre-order, root first.
    pub nodes: IndexVec<NodeIdx, FlatNode>,
    pub leaf_triangles: Vec<TriangleRecord>,
}

impl GroupTables {
    pub fn triangle(&self, record: &TriangleRecord) -> Triangle<WorldPoint> {
        record.vertices.map(|v| self.vertices[*v])
    }

    pub fn triangle_normals(&self, record: &TriangleRecord) -> Option<Triangle<WorldVector>> {
        let normals = self.normals.as_ref()?;
        Some(record.vertices.map(|v| normals[*v]))
    }

    pub fn root(&self) -> &FlatNode {
        &self.nodes[NodeIdx::from_usize(0)]
    }

    pub fn emissive_triangle_count(&self) -> usize {
        self.emissive_ranges.iter().map(EmissiveRange::len).sum()
    }

    /// Emissive triangle number `index`, counting through the emissive ranges in order.
    pub fn emissive_triangle(&self, mut index: usize) -> Option<&TriangleRecord> {
        for range in &self.emissive_ranges {
            if index < range.len() {
                return Some(&self.triangles[range.start + index]);
            }
            index -= range.len();
        }
        None
    }
}

/// An emissive triangle picked for light sampling.
#[derive(Copy, Clone, Debug)]
pub struct Light<'a> {
    pub triangle: Triangle<WorldPoint>,
    pub material: &'a Material,
}

/// All object groups of a render, with the emissive triangles indexed across groups.
#[derive(Clone, Debug)]
pub struct SceneTables {
    pub groups: Vec<GroupTables>,
    /// Number of emissive triangles in all groups before the given one, plus the total.
    light_offsets: Vec<usize>,
}

impl SceneTables {
    #[tracing::instrument(skip_all, fields(groups = groups.len()))]
    pub fn decode(groups: &[PackedGroup]) -> Result<SceneTables, BufferError> {
        let groups = groups
            .iter()
            .map(|group| {
                let mut tables = decode_scene(&group.scene)?;
                decode_bvh(&group.bvh, &mut tables)?;
                Ok(tables)
            })
            .collect::<Result<Vec<_>, BufferError>>()?;

        let mut light_offsets = Vec::with_capacity(groups.len() + 1);
        let mut total = 0;
        light_offsets.push(0);
        for group in &groups {
            total += group.emissive_triangle_count();
            light_offsets.push(total);
        }

        tracing::debug!(
            triangles = groups.iter().map(|g| g.triangles.len()).sum::<usize>(),
            nodes = groups.iter().map(|g| g.nodes.len()).sum::<usize>(),
            lights = total,
            "Decoded scene tables"
        );

        Ok(SceneTables {
            groups,
            light_offsets,
        })
    }

    pub fn light_count(&self) -> usize {
        self.light_offsets.last().copied().unwrap_or(0)
    }

    /// Emissive triangle number `index` over all groups.
    pub fn light(&self, index: usize) -> Option<Light<'_>> {
        let group = self.light_offsets.partition_point(|&offset| offset <= index);
        let tables = self.groups.get(group.checked_sub(1)?)?;
        let record = tables.emissive_triangle(index - self.light_offsets[group - 1])?;
        Some(Light {
            triangle: tables.triangle(record),
            material: &tables.materials[record.material],
        })
    }
}

/// Reads the value at `offset` as a non-negative exact integer.
fn integer(buffer: &[FloatType], name: &'static str, offset: usize) -> Result<usize, BufferError> {
    let value = buffer[offset];
    if value >= 0.0 && value.fract() == 0.0 && value <= MAX_EXACT_INTEGER as FloatType {
        Ok(value as usize)
    } else {
        Err(BufferError::NotAnInteger {
            buffer: name,
            offset,
            value,
        })
    }
}

/// Reads an offset that may be `NONE`.
fn optional_integer(
    buffer: &[FloatType],
    name: &'static str,
    offset: usize,
) -> Result<Option<usize>, BufferError> {
    if buffer[offset] == NONE {
        Ok(None)
    } else {
        integer(buffer, name, offset).map(Some)
    }
}

fn check_buffer_len(buffer: &[FloatType], name: &'static str, needed: usize) -> Result<(), BufferError> {
    if buffer.len() < needed {
        return Err(BufferError::Truncated {
            buffer: name,
            len: buffer.len(),
            needed,
        });
    }
    if buffer.len() % ALIGNMENT != 0 {
        return Err(BufferError::Misaligned {
            buffer: name,
            len: buffer.len(),
        });
    }
    Ok(())
}

fn header_field(field: &'static str, value: usize, valid: bool) -> Result<(), BufferError> {
    if valid {
        Ok(())
    } else {
        Err(BufferError::Header { field, value })
    }
}

/// Decodes one `[i0, i1, i2, material]` record with 1-based vertex indices.
fn triangle_record(
    buffer: &[FloatType],
    name: &'static str,
    offset: usize,
    vertex_count: usize,
    material_count: usize,
) -> Result<TriangleRecord, BufferError> {
    let vertex = |i: usize| -> Result<VertexIdx, BufferError> {
        let vertex = integer(buffer, name, offset + i)?;
        if vertex == 0 || vertex > vertex_count {
            return Err(BufferError::VertexIndex {
                offset,
                vertex,
                count: vertex_count,
            });
        }
        Ok(VertexIdx::from_usize(vertex - 1))
    };
    let material = integer(buffer, name, offset + 3)?;
    if material >= material_count {
        return Err(BufferError::MaterialIndex {
            offset,
            material,
            count: material_count,
        });
    }

    Ok(TriangleRecord {
        vertices: Triangle::new(vertex(0)?, vertex(1)?, vertex(2)?),
        material: MaterialIdx::from_usize(material),
    })
}

fn decode_scene(buffer: &[FloatType]) -> Result<GroupTables, BufferError> {
    const NAME: &str = "scene";
    check_buffer_len(buffer, NAME, scene_header::LEN)?;

    let vertex_count = integer(buffer, NAME, scene_header::NUM_VERTICES)?;
    let material_count = integer(buffer, NAME, scene_header::NUM_MATERIALS)?;
    let vertex_start = integer(buffer, NAME, scene_header::VERTEX_START)?;
    let index_start = integer(buffer, NAME, scene_header::INDEX_START)?;
    let material_start = integer(buffer, NAME, scene_header::MATERIAL_START)?;
    let normal_start = optional_integer(buffer, NAME, scene_header::NORMAL_START)?;
    let normal_count = integer(buffer, NAME, scene_header::NORMAL_COUNT)?;

    header_field("vertex_start", vertex_start, vertex_start >= scene_header::LEN)?;
    header_field(
        "index_start",
        index_start,
        index_start == vertex_start + 3 * vertex_count,
    )?;
    header_field(
        "material_start",
        material_start,
        material_start >= index_start && (material_start - index_start) % TRIANGLE_RECORD_LEN == 0,
    )?;
    let triangle_count = (material_start - index_start) / TRIANGLE_RECORD_LEN;
    let material_end = material_start + MATERIAL_RECORD_LEN * material_count;

    let end = match normal_start {
        Some(normal_start) => {
            header_field("normal_start", normal_start, normal_start == material_end)?;
            header_field("normal_count", normal_count, normal_count == vertex_count)?;
            normal_start + 3 * normal_count
        }
        None => {
            header_field("normal_count", normal_count, normal_count == 0)?;
            material_end
        }
    };
    check_buffer_len(buffer, NAME, end)?;

    let vector = |offset: usize| WorldVector::from_column_slice(&buffer[offset..offset + 3]);

    let vertices: IndexVec<VertexIdx, WorldPoint> = (0..vertex_count)
        .map(|i| WorldPoint::from(vector(vertex_start + 3 * i)))
        .collect();
    let normals: Option<IndexVec<VertexIdx, WorldVector>> =
        normal_start.map(|start| (0..normal_count).map(|i| vector(start + 3 * i)).collect());
    let triangles: IndexVec<TriangleIdx, TriangleRecord> = (0..triangle_count)
        .map(|i| {
            triangle_record(
                buffer,
                NAME,
                index_start + TRIANGLE_RECORD_LEN * i,
                vertex_count,
                material_count,
            )
        })
        .collect::<Result<_, _>>()?;
    let materials: IndexVec<MaterialIdx, Material> = (0..material_count)
        .map(|i| {
            let start = material_start + MATERIAL_RECORD_LEN * i;
            <&[FloatType; MATERIAL_RECORD_LEN]>::try_from(&buffer[start..start + MATERIAL_RECORD_LEN])
                .ok()
                .and_then(Material::from_record)
                .ok_or(BufferError::InvalidMaterial(i))
        })
        .collect::<Result<_, _>>()?;

    let mut emissive_ranges = ArrayVec::new();
    for slot in 0..scene_header::MAX_EMISSIVE_RANGES {
        let start_offset = scene_header::EMISSIVE_RANGES + 2 * slot;
        let start = optional_integer(buffer, NAME, start_offset)?;
        let end = optional_integer(buffer, NAME, start_offset + 1)?;
        let (start, end) = match (start, end) {
            (None, None) => continue,
            (Some(start), Some(end)) => (start, end),
            (start, end) => {
                return Err(BufferError::EmissiveRange {
                    start: start.unwrap_or(0),
                    end: end.unwrap_or(0),
                });
            }
        };
        let record_aligned = |x: usize| {
            x >= index_start && x <= material_start && (x - index_start) % TRIANGLE_RECORD_LEN == 0
        };
        if !(record_aligned(start) && record_aligned(end) && start <= end) {
            return Err(BufferError::EmissiveRange { start, end });
        }
        emissive_ranges.push(EmissiveRange {
            start: TriangleIdx::from_usize((start - index_start) / TRIANGLE_RECORD_LEN),
            end: TriangleIdx::from_usize((end - index_start) / TRIANGLE_RECORD_LEN),
        });
    }

    Ok(GroupTables {
        vertices,
        normals,
        triangles,
        materials,
        emissive_ranges,
        nodes: IndexVec::new(),
        leaf_triangles: Vec::new(),
    })
}

fn decode_bvh(buffer: &[FloatType], tables: &mut GroupTables) -> Result<(), BufferError> {
    check_buffer_len(buffer, "BVH", bvh_node::LEN)?;
    tables.nodes.clear();
    tables.leaf_triangles.clear();
    decode_node(buffer, 0, 1, tables)?;
    Ok(())
}

/// Decodes the node at `offset` and its subtree.
/// Returns the index of the node and the offset just past its subtree.
/// Nodes must be laid out in pre-order: the left child directly follows its parent
/// and the right child directly follows the left subtree. Every node is therefore
/// decoded exactly once.
fn decode_node(
    buffer: &[FloatType],
    offset: usize,
    depth: u32,
    tables: &mut GroupTables,
) -> Result<(NodeIdx, usize), BufferError> {
    const NAME: &str = "BVH";
    if depth > MAX_BVH_DEPTH {
        return Err(BufferError::TooDeep);
    }
    if offset + bvh_node::LEN > buffer.len() {
        return Err(BufferError::NodeOffset { offset });
    }

    let bounds = |start: usize| {
        let mut values = [0.0; 6];
        values.copy_from_slice(&buffer[start..start + 6]);
        WorldBox::from_array(values)
    };
    let child_bounds = [
        bounds(offset + bvh_node::LEFT_BOX),
        bounds(offset + bvh_node::RIGHT_BOX),
    ];

    match buffer[offset + bvh_node::IS_LEAF] {
        1.0 => {
            let count = integer(buffer, NAME, offset + bvh_node::TRIANGLE_COUNT)?;
            let records_start = offset + bvh_node::LEN;
            if records_start + TRIANGLE_RECORD_LEN * count > buffer.len() {
                return Err(BufferError::Truncated {
                    buffer: NAME,
                    len: buffer.len(),
                    needed: records_start + TRIANGLE_RECORD_LEN * count,
                });
            }

            let first = tables.leaf_triangles.len();
            for i in 0..count {
                let record = triangle_record(
                    buffer,
                    NAME,
                    records_start + TRIANGLE_RECORD_LEN * i,
                    tables.vertices.len(),
                    tables.materials.len(),
                )?;
                tables.leaf_triangles.push(record);
            }

            let index = tables.nodes.push(FlatNode {
                kind: NodeKind::Leaf {
                    triangles: first..first + count,
                },
                child_bounds,
            });
            Ok((index, records_start + TRIANGLE_RECORD_LEN * count))
        }
        0.0 => {
            let axis_index = integer(buffer, NAME, offset + bvh_node::AXIS)?;
            let axis = Axis::from_index(axis_index).ok_or(BufferError::NodeAxis {
                offset,
                axis: axis_index,
            })?;
            let child_offset = |field: usize, expected: usize| -> Result<usize, BufferError> {
                let child = integer(buffer, NAME, offset + field)?;
                if child == expected {
                    Ok(child)
                } else {
                    Err(BufferError::NodeOffset { offset: child })
                }
            };
            let left_offset = child_offset(bvh_node::LEFT, offset + bvh_node::LEN)?;

            // Placeholder children, patched once the subtrees are decoded
            let index = tables.nodes.push(FlatNode {
                kind: NodeKind::Leaf { triangles: 0..0 },
                child_bounds,
            });
            let (left, left_end) = decode_node(buffer, left_offset, depth + 1, tables)?;
            let right_offset = child_offset(bvh_node::RIGHT, left_end)?;
            let (right, end) = decode_node(buffer, right_offset, depth + 1, tables)?;
            tables.nodes[index].kind = NodeKind::Inner {
                axis,
                children: [left, right],
            };
            Ok((index, end))
        }
        value => Err(BufferError::NodeKind { offset, value }),
    }
}
