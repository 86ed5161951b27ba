//! Pretrained backbones feeding the decoder.
//!
//! Both networks expose their intermediate feature maps through typed
//! structs ([`resnet::ResNetFeatures`], [`vgg::VggFeatures`]) instead of
//! index lists.

pub mod resnet;
pub mod vgg;
