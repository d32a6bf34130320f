//! CPU dispatch of the kernel over an image, and frame accumulation.

mod accumulator;
mod machinery;

pub use accumulator::{Accumulator, color_to_image};
pub use machinery::{FrameProgress, TILE_ROWS, render_frame};
