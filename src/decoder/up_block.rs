use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// 5x5 convolution, optional batch norm, ReLU. Preserves height and width.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    conv: Conv2d<B>,
    batchnorm: Option<BatchNorm<B, 2>>,
    relu: Relu,
}

impl<B: Backend> UpBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.conv.forward(x);

        if let Some(ref batchnorm) = self.batchnorm {
            x = batchnorm.forward(x);
        }

        self.relu.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct UpBlockConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = true)]
    include_batch_norm: bool,
}

impl UpBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpBlock<B> {
        UpBlock {
            // Batch norm absorbs the bias
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [5, 5])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .with_bias(!self.include_batch_norm)
                .init(device),
            batchnorm: self
                .include_batch_norm
                .then(|| BatchNormConfig::new(self.out_channels).init(device)),
            relu: Relu::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};
    use rstest::rstest;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn preserves_spatial_dims(#[case] include_batch_norm: bool) {
        let device = Default::default();
        let block = UpBlockConfig::new(6, 4)
            .with_include_batch_norm(include_batch_norm)
            .init::<TestBackend>(&device);

        let input = Tensor::random([2, 6, 9, 13], Distribution::Normal(0.0, 1.0), &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 4, 9, 13]);
    }

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    fn bias_only_without_batch_norm(#[case] include_batch_norm: bool, #[case] has_bias: bool) {
        let device = Default::default();
        let block = UpBlockConfig::new(3, 8)
            .with_include_batch_norm(include_batch_norm)
            .init::<TestBackend>(&device);

        assert_eq!(block.conv.bias.is_some(), has_bias);
        assert_eq!(block.batchnorm.is_some(), include_batch_norm);
    }

    #[test]
    fn output_is_non_negative() {
        let device = Default::default();
        let block = UpBlockConfig::new(2, 3)
            .with_include_batch_norm(false)
            .init::<TestBackend>(&device);

        let input = Tensor::random([1, 2, 7, 7], Distribution::Normal(0.0, 1.0), &device);
        let min = block.forward(input).min().into_scalar();

        assert!(min >= 0.0);
    }
}
