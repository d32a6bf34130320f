//! Offsets and sizes of the flat buffers.
//!
//! All values are stored as `f32`; integers (counts, offsets, indices) must be
//! exactly representable, so they are limited to `MAX_EXACT_INTEGER`.

/// Every buffer is zero padded to a multiple of this many floats.
pub const ALIGNMENT: usize = 16;

/// Largest integer that survives the round trip through `f32`.
pub const MAX_EXACT_INTEGER: usize = 1 << 24;

/// Value of unused offsets and ranges.
pub const NONE: f32 = -1.0;

pub mod scene_header {
    pub const LEN: usize = 16;

    pub const NUM_VERTICES: usize = 0;
    pub const NUM_MATERIALS: usize = 1;
    pub const VERTEX_START: usize = 2;
    pub const INDEX_START: usize = 3;
    pub const MATERIAL_START: usize = 4;
    pub const NORMAL_START: usize = 5;
    pub const NORMAL_COUNT: usize = 6;
    /// Four `[start, end)` pairs of absolute float offsets of emissive triangle records.
    pub const EMISSIVE_RANGES: usize = 8;
    pub const MAX_EMISSIVE_RANGES: usize = 4;
}

/// `[i0, i1, i2, material]`, vertex indices are 1-based.
pub const TRIANGLE_RECORD_LEN: usize = 4;

pub mod bvh_node {
    pub const IS_LEAF: usize = 0;
    pub const AXIS: usize = 1;
    pub const LEFT: usize = 2;
    pub const RIGHT: usize = 3;
    pub const TRIANGLE_COUNT: usize = 4;
    pub const LEFT_BOX: usize = 5;
    pub const RIGHT_BOX: usize = 11;
    /// Length of the fixed part, leaves continue with their triangle records.
    pub const LEN: usize = 17;
}

/// Number of padding floats needed to bring `len` to the alignment.
pub fn padding(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use test_case::test_case;

    #[test_case(0, 0)]
    #[test_case(1, 15)]
    #[test_case(16, 0)]
    #[test_case(17, 15)]
    #[test_case(31, 1)]
    fn padding_to_alignment(len: usize, expected: usize) {
        assert!(padding(len) == expected);
    }

    #[test]
    fn node_layout_is_contiguous() {
        assert!(bvh_node::LEFT_BOX == bvh_node::TRIANGLE_COUNT + 1);
        assert!(bvh_node::RIGHT_BOX == bvh_node::LEFT_BOX + 6);
        assert!(bvh_node::LEN == bvh_node::RIGHT_BOX + 6);
        assert!(
            scene_header::EMISSIVE_RANGES + 2 * scene_header::MAX_EMISSIVE_RANGES
                == scene_header::LEN
        );
    }
}
