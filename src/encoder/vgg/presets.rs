use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Device},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::error::{VrcNetError, VrcNetResult};

use super::{
    vgg::{Vgg, VggConfig, VggRecord},
    weights::{key_remaps, Vgg16Bn},
};

impl Vgg16Bn {
    /// Build the backbone, fetching pretrained weights when the preset names a checkpoint.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> VrcNetResult<Vgg<B>> {
        let model = VggConfig::new().init(device);

        match self.url() {
            Some(url) => fetch_and_load(model, url, device),
            None => Ok(model),
        }
    }
}

#[cfg(feature = "pretrained")]
fn fetch_and_load<B: Backend>(
    model: Vgg<B>,
    url: &str,
    device: &Device<B>,
) -> VrcNetResult<Vgg<B>> {
    let weights = crate::download(url)?;
    model.load_pytorch(weights, device)
}

#[cfg(not(feature = "pretrained"))]
fn fetch_and_load<B: Backend>(
    _model: Vgg<B>,
    url: &str,
    _device: &Device<B>,
) -> VrcNetResult<Vgg<B>> {
    Err(VrcNetError::WeightLoadingFailed {
        reason: format!("{url} requires the `pretrained` feature"),
    })
}

impl<B: Backend> Vgg<B> {
    /// Load a torchvision `vgg16_bn` checkpoint. Classifier weights are ignored.
    pub fn load_pytorch<P: AsRef<Path>>(
        self,
        torch_weights: P,
        device: &Device<B>,
    ) -> VrcNetResult<Self> {
        let path = torch_weights.as_ref();
        if !path.exists() {
            return Err(VrcNetError::WeightLoadingFailed {
                reason: format!("{} does not exist", path.display()),
            });
        }

        let load_args = key_remaps()
            .iter()
            .fold(LoadArgs::new(path.into()), |args, (pattern, replacement)| {
                args.with_key_remap(pattern, replacement)
            });
        let record: VggRecord<B> =
            PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

        tracing::debug!(path = %path.display(), "loaded VGG weights");
        Ok(self.load_record(record))
    }
}
