mod block;
mod presets;
pub mod resnet;
pub mod weights;

pub use resnet::*;
pub use weights::*;
