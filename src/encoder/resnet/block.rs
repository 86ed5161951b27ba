use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

fn kaiming() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    }
}

/// ResNet basic residual block.
/// Derived from torchvision.models.resnet.BasicBlock
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = input.clone();

        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        let out = match &self.downsample {
            Some(downsample) => out + downsample.forward(identity),
            None => out + identity,
        };

        self.relu.forward(out)
    }
}

#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl BasicBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BasicBlock<B> {
        // conv3x3, carries the stride
        let conv1 = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(kaiming())
            .init(device);

        // conv3x3
        let conv2 = Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(kaiming())
            .init(device);

        let downsample = (self.stride != 1 || self.in_channels != self.out_channels).then(|| {
            DownsampleConfig::new(self.in_channels, self.out_channels, self.stride).init(device)
        });

        BasicBlock {
            conv1,
            bn1: BatchNormConfig::new(self.out_channels).init(device),
            relu: Relu::new(),
            conv2,
            bn2: BatchNormConfig::new(self.out_channels).init(device),
            downsample,
        }
    }
}

/// 1x1 projection matching the identity path to the block output.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

#[derive(Config, Debug)]
pub struct DownsampleConfig {
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl DownsampleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Downsample<B> {
        Downsample {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(0, 0))
                .with_bias(false)
                .with_initializer(kaiming())
                .init(device),
            bn: BatchNormConfig::new(self.out_channels).init(device),
        }
    }
}

/// One ResNet stage: a sequence of residual blocks.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    blocks: Vec<BasicBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(input, |out, block| block.forward(out))
    }

    /// Whether the first convolution of the stage receives gradients.
    #[cfg(test)]
    pub(crate) fn requires_grad(&self) -> bool {
        self.blocks
            .first()
            .is_some_and(|block| block.conv1.weight.val().is_require_grad())
    }
}

#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    num_blocks: usize,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl LayerBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LayerBlock<B> {
        let blocks = (0..self.num_blocks)
            .map(|b| {
                // Only the first block downsamples
                let config = if b == 0 {
                    BasicBlockConfig::new(self.in_channels, self.out_channels, self.stride)
                } else {
                    BasicBlockConfig::new(self.out_channels, self.out_channels, 1)
                };
                config.init(device)
            })
            .collect();

        LayerBlock { blocks }
    }
}
