use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// `(convolutions, output channels)` of each VGG-16 stage.
pub(crate) const VGG16_STAGES: [(usize, usize); 5] =
    [(2, 64), (2, 128), (3, 256), (3, 512), (3, 512)];

/// VGG-16 with batch normalization, feature layers only.
/// Derived from torchvision.models.vgg.vgg16_bn
///
/// The flat `features` stack is split into five named stages, each ending in
/// a 2x2 max-pool. Stage outputs are taken before their pool.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    pub(crate) stage1: VggStage<B>,
    pub(crate) stage2: VggStage<B>,
    pub(crate) stage3: VggStage<B>,
    pub(crate) stage4: VggStage<B>,
    pub(crate) stage5: VggStage<B>,
}

/// Feature maps of every VGG stage, from shallow to deep.
#[derive(Debug, Clone)]
pub struct VggFeatures<B: Backend> {
    /// Full scale, 64 channels.
    pub stage1: Tensor<B, 4>,
    /// 1/2 scale, 128 channels.
    pub stage2: Tensor<B, 4>,
    /// 1/4 scale, 256 channels.
    pub stage3: Tensor<B, 4>,
    /// 1/8 scale, 512 channels.
    pub stage4: Tensor<B, 4>,
    /// 1/16 scale, 512 channels.
    pub stage5: Tensor<B, 4>,
    /// `stage5` after its max-pool, 1/32 scale.
    pub pooled: Tensor<B, 4>,
}

impl<B: Backend> Vgg<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> VggFeatures<B> {
        let (stage1, x) = self.stage1.forward(x);
        let (stage2, x) = self.stage2.forward(x);
        let (stage3, x) = self.stage3.forward(x);
        let (stage4, x) = self.stage4.forward(x);
        let (stage5, pooled) = self.stage5.forward(x);

        VggFeatures {
            stage1,
            stage2,
            stage3,
            stage4,
            stage5,
            pooled,
        }
    }

    /// Stop gradients through stages 1 to 4, i.e. the first 32 layers of the
    /// torchvision feature stack.
    pub fn freeze_stages(mut self) -> Self {
        self.stage1 = self.stage1.no_grad();
        self.stage2 = self.stage2.no_grad();
        self.stage3 = self.stage3.no_grad();
        self.stage4 = self.stage4.no_grad();
        self
    }
}

/// Convolutions of one resolution followed by a max-pool.
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    convs: Vec<ConvBnRelu<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> VggStage<B> {
    /// Returns the activation before the pool and the pooled tensor.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let x = self.convs.iter().fold(x, |x, conv| conv.forward(x));
        let pooled = self.pool.forward(x.clone());
        (x, pooled)
    }

    #[cfg(test)]
    pub(crate) fn requires_grad(&self) -> bool {
        self.convs
            .first()
            .is_some_and(|unit| unit.conv.weight.val().is_require_grad())
    }
}

#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.bn.forward(self.conv.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct VggConfig {
    #[config(default = 3)]
    in_channels: usize,
}

impl VggConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg<B> {
        let mut in_channels = self.in_channels;
        let [stage1, stage2, stage3, stage4, stage5] = VGG16_STAGES.map(|(convs, channels)| {
            let stage = init_stage(in_channels, convs, channels, device);
            in_channels = channels;
            stage
        });

        Vgg {
            stage1,
            stage2,
            stage3,
            stage4,
            stage5,
        }
    }
}

fn init_stage<B: Backend>(
    in_channels: usize,
    convs: usize,
    channels: usize,
    device: &B::Device,
) -> VggStage<B> {
    let initializer = Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    };

    let convs = (0..convs)
        .map(|i| {
            let in_channels = if i == 0 { in_channels } else { channels };
            // torchvision keeps the conv bias even in front of batch norm
            let conv = Conv2dConfig::new([in_channels, channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_initializer(initializer.clone())
                .init(device);
            ConvBnRelu {
                conv,
                bn: BatchNormConfig::new(channels).init(device),
                relu: Relu::new(),
            }
        })
        .collect();

    VggStage {
        convs,
        pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
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

    type TestBackend = NdArray<f32>;

    #[rstest]
    #[case(64, [64, 32, 16, 8, 4, 2])]
    // Pools round down
    #[case(48, [48, 24, 12, 6, 3, 1])]
    fn vgg16_bn_stage_shapes(#[case] size: usize, #[case] sides: [usize; 6]) {
        let device = Default::default();
        let model = VggConfig::new().init::<TestBackend>(&device);

        let input = Tensor::random([1, 3, size, size], Distribution::Normal(0.0, 1.0), &device);
        let features = model.forward(input);

        assert_eq!(features.stage1.dims(), [1, 64, sides[0], sides[0]]);
        assert_eq!(features.stage2.dims(), [1, 128, sides[1], sides[1]]);
        assert_eq!(features.stage3.dims(), [1, 256, sides[2], sides[2]]);
        assert_eq!(features.stage4.dims(), [1, 512, sides[3], sides[3]]);
        assert_eq!(features.stage5.dims(), [1, 512, sides[4], sides[4]]);
        assert_eq!(features.pooled.dims(), [1, 512, sides[5], sides[5]]);
    }

    #[test]
    fn freeze_stages_leaves_last_stage_trainable() {
        let device = Default::default();
        let model = VggConfig::new()
            .init::<Autodiff<TestBackend>>(&device)
            .freeze_stages();

        assert!(!model.stage1.requires_grad());
        assert!(!model.stage2.requires_grad());
        assert!(!model.stage3.requires_grad());
        assert!(!model.stage4.requires_grad());
        assert!(model.stage5.requires_grad());
    }
}
