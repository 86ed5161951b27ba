mod ladder;
pub mod up_block;

pub use ladder::*;
pub use up_block::{UpBlock, UpBlockConfig};
