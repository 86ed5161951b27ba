mod presets;
pub mod vgg;
pub mod weights;

pub use vgg::*;
pub use weights::Vgg16Bn;
