use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::ElementConversion,
};

use crate::{
    decoder::{crop_to, Decoder, DecoderConfig},
    encoder::{
        resnet::{ResNet, ResNet18},
        vgg::{Vgg, Vgg16Bn},
    },
    error::{VrcNetError, VrcNetResult},
    segmentation_head::{SegmentationHead, SegmentationHeadConfig},
};

/// Total downsampling factor of both backbones.
///
/// Sides of exactly 32 leave `mid_conv` with a 1-pixel map, which the
/// ndarray backend's 5x5 convolution panics on; use 64 or more there.
pub const INPUT_ALIGNMENT: usize = 32;

/// What to do with inputs whose height or width is not a multiple of
/// [`INPUT_ALIGNMENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum InputPolicy {
    /// Zero-pad bottom and right, then crop the output back.
    #[default]
    Pad,
    /// Fail with [`VrcNetError::InvalidInputShape`].
    Reject,
}

/// Encoder-decoder fusing ResNet-18 and VGG-16-BN features into a
/// single-channel probability map.
#[derive(Module, Debug)]
pub struct VrcNet<B: Backend> {
    first_conv: Conv2d<B>,
    relu: Relu,
    resnet: ResNet<B>,
    vgg: Vgg<B>,
    mid_conv: Conv2d<B>,
    decoder: Decoder<B>,
    head: SegmentationHead<B>,
    input_policy: Ignored<InputPolicy>,
}

impl<B: Backend> VrcNet<B> {
    /// `[N, 1, H, W]` -> `[N, out_channels, H, W]`, every value in (0, 1).
    pub fn forward(&self, x: Tensor<B, 4>) -> VrcNetResult<Tensor<B, 4>> {
        let dims = x.dims();
        let [_, channels, height, width] = dims;
        if channels != 1 || dims.contains(&0) {
            return Err(VrcNetError::InvalidInputShape {
                expected: "[batch, 1, height, width] with non-zero sizes".to_owned(),
                actual: dims,
            });
        }

        let pad_h = height.next_multiple_of(INPUT_ALIGNMENT) - height;
        let pad_w = width.next_multiple_of(INPUT_ALIGNMENT) - width;
        if pad_h == 0 && pad_w == 0 {
            return self.forward_aligned(x);
        }

        match self.input_policy.0 {
            InputPolicy::Reject => Err(VrcNetError::InvalidInputShape {
                expected: format!("height and width divisible by {INPUT_ALIGNMENT}"),
                actual: dims,
            }),
            InputPolicy::Pad => {
                tracing::debug!(height, width, pad_h, pad_w, "padding unaligned input");
                let x = x.pad((0, pad_w, 0, pad_h), B::FloatElem::from_elem(0.0));
                let output = self.forward_aligned(x)?;
                Ok(output.narrow(2, 0, height).narrow(3, 0, width))
            }
        }
    }

    fn forward_aligned(&self, x: Tensor<B, 4>) -> VrcNetResult<Tensor<B, 4>> {
        // Lift to the 3 channels both backbones were trained on
        let x = self.relu.forward(self.first_conv.forward(x));

        let vgg = self.vgg.forward(x.clone());
        let resnet = self.resnet.forward(x);

        let [_, _, h, w] = vgg.pooled.dims();
        let deepest = crop_to(resnet.layer4.clone(), [h, w], "mid")?;
        let mid = Tensor::cat(vec![deepest, vgg.pooled.clone()], 1);
        let mid = self.relu.forward(self.mid_conv.forward(mid));

        let x = self.decoder.forward(mid, resnet, vgg)?;
        Ok(self.head.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct VrcNetConfig {
    /// Channels of the output map.
    #[config(default = 1)]
    out_channels: usize,
    /// Stop gradients through ResNet stages 1-3 and VGG stages 1-4.
    #[config(default = false)]
    freeze_layers: bool,
    #[config(default = "InputPolicy::Pad")]
    input_policy: InputPolicy,
    #[config(default = "ResNet18::ImageNet1kV1")]
    resnet: ResNet18,
    #[config(default = "Vgg16Bn::ImageNet1kV1")]
    vgg: Vgg16Bn,
}

impl VrcNetConfig {
    /// Build the network with backbones taken from the configured weight presets.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VrcNetResult<VrcNet<B>> {
        let resnet = self.resnet.init(device)?;
        let vgg = self.vgg.init(device)?;
        Ok(self.init_with_backbones(resnet, vgg, device))
    }

    /// Build the network around backbones the caller already initialized.
    pub fn init_with_backbones<B: Backend>(
        &self,
        resnet: ResNet<B>,
        vgg: Vgg<B>,
        device: &B::Device,
    ) -> VrcNet<B> {
        let (resnet, vgg) = if self.freeze_layers {
            tracing::info!("freezing ResNet stages 1-3 and VGG stages 1-4");
            (resnet.freeze_stages(), vgg.freeze_stages())
        } else {
            (resnet, vgg)
        };

        let decoder = DecoderConfig::new();
        let model = VrcNet {
            first_conv: Conv2dConfig::new([1, 3], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            relu: Relu::new(),
            resnet,
            vgg,
            mid_conv: Conv2dConfig::new([1024, 1024], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            decoder: decoder.init(device),
            head: SegmentationHeadConfig::new(decoder.out_channels(), self.out_channels)
                .init(device),
            input_policy: Ignored(self.input_policy),
        };

        tracing::debug!(num_params = model.num_params(), "initialized VRCNet");
        model
    }
}
