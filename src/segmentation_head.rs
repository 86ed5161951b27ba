use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

/// Final projection to the output map, squashed into (0, 1).
#[derive(Module, Debug)]
pub struct SegmentationHead<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> SegmentationHead<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        sigmoid(self.conv.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct SegmentationHeadConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "[5, 5]")]
    kernel_size: [usize; 2],
}

impl SegmentationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationHead<B> {
        SegmentationHead {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
                .with_padding(PaddingConfig2d::Same)
                .init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};

    use super::*;

    #[test]
    fn maps_channels_and_bounds_values() {
        let device = Default::default();
        let head = SegmentationHeadConfig::new(32, 1).init::<NdArray<f32>>(&device);

        let input = Tensor::random([2, 32, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        let output = head.forward(input);

        assert_eq!(output.dims(), [2, 1, 8, 8]);
        assert!(output.clone().min().into_scalar() > 0.0);
        assert!(output.max().into_scalar() < 1.0);
    }
}
