use core::f64::consts::SQRT_2;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use super::block::{LayerBlock, LayerBlockConfig};

/// ResNet feature extractor without the classification head.
/// Derived from [torchvision.models.resnet.ResNet][resnet].
///
/// The stem is kept apart from the max-pool so its un-pooled output can be
/// reused as a skip connection.
///
/// [resnet]: https://github.com/pytorch/vision/blob/main/torchvision/models/resnet.py
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
    pub(crate) layer1: LayerBlock<B>,
    pub(crate) layer2: LayerBlock<B>,
    pub(crate) layer3: LayerBlock<B>,
    pub(crate) layer4: LayerBlock<B>,
}

/// Feature maps of every ResNet stage, from shallow to deep.
#[derive(Debug, Clone)]
pub struct ResNetFeatures<B: Backend> {
    /// conv1 + bn1 + relu, 1/2 scale, 64 channels.
    pub stem: Tensor<B, 4>,
    /// 1/4 scale, 64 channels.
    pub layer1: Tensor<B, 4>,
    /// 1/8 scale, 128 channels.
    pub layer2: Tensor<B, 4>,
    /// 1/16 scale, 256 channels.
    pub layer3: Tensor<B, 4>,
    /// 1/32 scale, 512 channels.
    pub layer4: Tensor<B, 4>,
}

impl<B: Backend> ResNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> ResNetFeatures<B> {
        // Stem
        let x = self.conv1.forward(x);
        let x = self.bn1.forward(x);
        let stem = self.relu.forward(x);
        let x = self.maxpool.forward(stem.clone());

        // Residual blocks
        let layer1 = self.layer1.forward(x);
        let layer2 = self.layer2.forward(layer1.clone());
        let layer3 = self.layer3.forward(layer2.clone());
        let layer4 = self.layer4.forward(layer3.clone());

        ResNetFeatures {
            stem,
            layer1,
            layer2,
            layer3,
            layer4,
        }
    }

    /// Stop gradients through residual stages 1 to 3. The stem and stage 4
    /// stay trainable.
    pub fn freeze_stages(mut self) -> Self {
        self.layer1 = self.layer1.no_grad();
        self.layer2 = self.layer2.no_grad();
        self.layer3 = self.layer3.no_grad();
        self
    }
}

/// [ResNet](ResNet) configuration.
pub struct ResNetConfig {
    conv1: Conv2dConfig,
    bn1: BatchNormConfig,
    maxpool: MaxPool2dConfig,
    layer1: LayerBlockConfig,
    layer2: LayerBlockConfig,
    layer3: LayerBlockConfig,
    layer4: LayerBlockConfig,
}

impl ResNetConfig {
    /// Create a new instance of the ResNet [config](ResNetConfig) built from basic blocks.
    pub fn new(blocks: [usize; 4]) -> Self {
        // 7x7 conv, 64, /2
        let conv1 = Conv2dConfig::new([3, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false);
        let bn1 = BatchNormConfig::new(64);

        // 3x3 maxpool, /2
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1));

        Self {
            conv1,
            bn1,
            maxpool,
            layer1: LayerBlockConfig::new(blocks[0], 64, 64, 1),
            layer2: LayerBlockConfig::new(blocks[1], 64, 128, 2),
            layer3: LayerBlockConfig::new(blocks[2], 128, 256, 2),
            layer4: LayerBlockConfig::new(blocks[3], 256, 512, 2),
        }
    }

    /// Initialize a new [ResNet](ResNet) module.
    pub fn init<B: Backend>(self, device: &Device<B>) -> ResNet<B> {
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2, // recommended value for ReLU
            fan_out_only: true,
        };

        ResNet {
            conv1: self.conv1.with_initializer(initializer).init(device),
            bn1: self.bn1.init(device),
            relu: Relu::new(),
            maxpool: self.maxpool.init(),
            layer1: self.layer1.init(device),
            layer2: self.layer2.init(device),
            layer3: self.layer3.init(device),
            layer4: self.layer4.init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::Distribution,
    };
    use rstest::rstest;

    use super::*;
    use crate::encoder::resnet::{ResNet18, WeightsMeta};

    type TestBackend = NdArray<f32>;

    #[rstest]
    #[case(64, 64, [32, 16, 8, 4, 2])]
    #[case(96, 64, [48, 24, 12, 6, 3])]
    // Stride-2 stages round up
    #[case(40, 40, [20, 10, 5, 3, 2])]
    fn resnet18_features_halve_per_stage(
        #[case] height: usize,
        #[case] width: usize,
        #[case] heights: [usize; 5],
    ) {
        let device = Default::default();
        let model: ResNet<TestBackend> = ResNet18::Random.weights().to_config().init(&device);

        let input =
            Tensor::random([1, 3, height, width], Distribution::Normal(0.0, 1.0), &device);
        let features = model.forward(input);

        assert_eq!(features.stem.dims()[..3], [1, 64, heights[0]]);
        assert_eq!(features.layer1.dims()[..3], [1, 64, heights[1]]);
        assert_eq!(features.layer2.dims()[..3], [1, 128, heights[2]]);
        assert_eq!(features.layer3.dims()[..3], [1, 256, heights[3]]);
        assert_eq!(features.layer4.dims()[..3], [1, 512, heights[4]]);
    }

    #[test]
    fn freeze_stages_leaves_last_stage_trainable() {
        let device = Default::default();
        let model: ResNet<Autodiff<TestBackend>> =
            ResNet18::Random.weights().to_config().init(&device);

        assert!(model.layer1.requires_grad());

        let model = model.freeze_stages();
        assert!(!model.layer1.requires_grad());
        assert!(!model.layer2.requires_grad());
        assert!(!model.layer3.requires_grad());
        assert!(model.layer4.requires_grad());
        assert!(model.conv1.weight.val().is_require_grad());
    }
}
