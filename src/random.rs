//! Stateless integer hash PRNG.
//!
//! Every random decision in the kernel is a pure function of a 32 bit seed, so a pixel
//! sample can be reproduced exactly from its pixel index and frame counter.

use crate::geometry::FloatType;

const MASK_31: u32 = 0x7fff_ffff;

/// Scale turning the top 24 bits of a masked hash into `[0, 1)`.
const UNIT_SCALE: FloatType = 1.0 / (1u32 << 24) as FloatType;

fn mix(n: u32) -> u32 {
    let n = (n << 13) ^ n;
    n.wrapping_mul(n.wrapping_mul(n).wrapping_mul(15731).wrapping_add(789221))
        .wrapping_add(1376312589)
}

fn to_unit(masked: u32) -> FloatType {
    (masked >> 7) as FloatType * UNIT_SCALE
}

/// 31 bit integer hash.
pub fn hash_u32(n: u32) -> u32 {
    mix(n) & MASK_31
}

/// Uniform float in `[0, 1)`.
pub fn hash_f32(n: u32) -> FloatType {
    to_unit(hash_u32(n))
}

/// Two uniform floats in `[0, 1)`, decorrelated by a second multiplication.
pub fn hash_vec2(n: u32) -> (FloatType, FloatType) {
    let n = mix(n);
    let a = n.wrapping_mul(n) & MASK_31;
    let b = n.wrapping_mul(n.wrapping_mul(16807)) & MASK_31;
    (to_unit(a), to_unit(b))
}

/// Sequence of random draws for a single path.
/// The seed is re-hashed with a draw-specific offset before every draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleStream {
    state: u32,
}

impl SampleStream {
    pub fn new(seed: u32) -> SampleStream {
        SampleStream {
            state: hash_u32(hash_u32(seed)),
        }
    }

    /// Stream for one camera sample of a pixel.
    pub fn for_sample(pixel_index: u32, frame: u32, sample: u32) -> SampleStream {
        let pixel_seed = hash_u32(pixel_index.wrapping_mul(16787).wrapping_add(frame));
        SampleStream::new(
            pixel_seed
                .wrapping_add(sample)
                .wrapping_add(pixel_index.wrapping_mul(67))
                .wrapping_add(frame),
        )
    }

    fn advance(&mut self, offset: u32) -> u32 {
        self.state = hash_u32(self.state.wrapping_add(offset));
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        self.advance(1)
    }

    pub fn next_f32(&mut self) -> FloatType {
        hash_f32(self.advance(7))
    }

    pub fn next_vec2(&mut self) -> (FloatType, FloatType) {
        hash_vec2(self.advance(11))
    }

    /// Uniform index in `0..count`, `count` must be nonzero.
    pub fn next_index(&mut self, count: usize) -> usize {
        let i = (self.next_f32() * count as FloatType) as usize;
        i.min(count - 1)
    }
}
