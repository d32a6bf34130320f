pub mod camera;
pub mod geometry;
pub mod kernel;
pub mod packing;
pub mod random;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use camera::Camera;
pub use kernel::{Kernel, KernelContext, Rgb};
pub use packing::{PackedGroup, SceneTables, pack_group};
pub use renderer::{Accumulator, render_frame};
pub use scene::{Scene, SceneBuilder};
pub use settings::RenderSettings;
