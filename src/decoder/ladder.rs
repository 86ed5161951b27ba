use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::{
    encoder::{resnet::ResNetFeatures, vgg::VggFeatures},
    error::{VrcNetError, VrcNetResult},
};

use super::up_block::{UpBlock, UpBlockConfig};

/// Keep the top-left `[height, width]` window of `x`.
pub fn crop_to<B: Backend>(
    x: Tensor<B, 4>,
    [height, width]: [usize; 2],
    stage: &'static str,
) -> VrcNetResult<Tensor<B, 4>> {
    let [_, _, h, w] = x.dims();
    if h < height || w < width {
        return Err(VrcNetError::ShapeMismatch {
            stage,
            expected: [height, width],
            actual: [h, w],
        });
    }

    if h == height && w == width {
        return Ok(x);
    }
    Ok(x.narrow(2, 0, height).narrow(3, 0, width))
}

fn upsample_to<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    interpolate(x, size, InterpolateOptions::new(InterpolateMode::Nearest))
}

fn spatial<B: Backend>(x: &Tensor<B, 4>) -> [usize; 2] {
    let [_, _, h, w] = x.dims();
    [h, w]
}

/// Five upsample-and-fuse stages from 1/32 scale back to full resolution.
///
/// Each stage resizes the running tensor to the matching VGG stage, then
/// concatenates the VGG skip and, except for the last stage, the ResNet skip.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    up4: UpBlock<B>,
    up3: UpBlock<B>,
    up2: UpBlock<B>,
    up1: UpBlock<B>,
    up0: UpBlock<B>,
}

impl<B: Backend> Decoder<B> {
    pub fn forward(
        &self,
        mid: Tensor<B, 4>,
        resnet: ResNetFeatures<B>,
        vgg: VggFeatures<B>,
    ) -> VrcNetResult<Tensor<B, 4>> {
        let x = Self::fuse(&self.up4, mid, vgg.stage5, Some(resnet.layer3), "up4")?;
        let x = Self::fuse(&self.up3, x, vgg.stage4, Some(resnet.layer2), "up3")?;
        let x = Self::fuse(&self.up2, x, vgg.stage3, Some(resnet.layer1), "up2")?;
        let x = Self::fuse(&self.up1, x, vgg.stage2, Some(resnet.stem), "up1")?;

        // The full-resolution stage only borrows its size from VGG stage 1
        let x = upsample_to(x, spatial(&vgg.stage1));
        Ok(self.up0.forward(x))
    }

    fn fuse(
        block: &UpBlock<B>,
        x: Tensor<B, 4>,
        vgg_skip: Tensor<B, 4>,
        resnet_skip: Option<Tensor<B, 4>>,
        stage: &'static str,
    ) -> VrcNetResult<Tensor<B, 4>> {
        let size = spatial(&vgg_skip);
        let x = upsample_to(x, size);

        let mut tensors = vec![x, vgg_skip];
        if let Some(skip) = resnet_skip {
            tensors.push(crop_to(skip, size, stage)?);
        }

        Ok(block.forward(Tensor::cat(tensors, 1)))
    }
}

#[derive(Config, Debug)]
pub struct DecoderConfig {
    /// `[in, out]` channels of up4 through up0.
    #[config(default = "[[1792, 512], [1152, 256], [576, 128], [320, 64], [64, 32]]")]
    channels: [[usize; 2]; 5],
    #[config(default = true)]
    use_batchnorm: bool,
}

impl DecoderConfig {
    pub fn out_channels(&self) -> usize {
        self.channels[4][1]
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Decoder<B> {
        let [up4, up3, up2, up1, up0] = self.channels.map(|[in_channels, out_channels]| {
            UpBlockConfig::new(in_channels, out_channels)
                .with_include_batch_norm(self.use_batchnorm)
                .init(device)
        });

        Decoder {
            up4,
            up3,
            up2,
            up1,
            up0,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn zeros(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::zeros(shape, &Default::default())
    }

    #[test]
    fn crop_keeps_top_left_window() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1, Int>::arange(0..16, &device)
            .float()
            .reshape([1, 1, 4, 4]);

        let cropped = crop_to(x, [2, 3], "test").unwrap();

        assert_eq!(cropped.dims(), [1, 1, 2, 3]);
        cropped.into_data().assert_eq(
            &TensorData::from([[[[0.0f32, 1.0, 2.0], [4.0, 5.0, 6.0]]]]),
            false,
        );
    }

    #[test]
    fn crop_rejects_smaller_skip() {
        let result = crop_to(zeros([1, 8, 3, 5]), [4, 4], "up3");

        match result {
            Err(VrcNetError::ShapeMismatch {
                stage,
                expected,
                actual,
            }) => {
                assert_eq!(stage, "up3");
                assert_eq!(expected, [4, 4]);
                assert_eq!(actual, [3, 5]);
            }
            other => panic!("expected a shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn ladder_restores_input_resolution() {
        let device = Default::default();
        let decoder = DecoderConfig::new().init::<TestBackend>(&device);

        // 64x64 input; layer3 is one pixel larger and gets cropped.
        let resnet = ResNetFeatures {
            stem: zeros([1, 64, 32, 32]),
            layer1: zeros([1, 64, 16, 16]),
            layer2: zeros([1, 128, 8, 8]),
            layer3: zeros([1, 256, 5, 5]),
            layer4: zeros([1, 512, 2, 2]),
        };
        let vgg = VggFeatures {
            stage1: zeros([1, 64, 64, 64]),
            stage2: zeros([1, 128, 32, 32]),
            stage3: zeros([1, 256, 16, 16]),
            stage4: zeros([1, 512, 8, 8]),
            stage5: zeros([1, 512, 4, 4]),
            pooled: zeros([1, 512, 2, 2]),
        };

        let output = decoder.forward(zeros([1, 1024, 2, 2]), resnet, vgg).unwrap();

        assert_eq!(output.dims(), [1, 32, 64, 64]);
    }
}
