mod assemble;
mod window;

pub use assemble::{DatasetAssembler, FeatureSource};
pub use window::concat_frames;
