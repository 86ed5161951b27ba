use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Device},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::error::{VrcNetError, VrcNetResult};

use super::{weights::*, ResNet, ResNetRecord};

impl ResNet18 {
    /// Build the backbone, fetching pretrained weights when the preset names a checkpoint.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> VrcNetResult<ResNet<B>> {
        let structure = self.weights();
        let model = structure.to_config().init(device);

        match structure.url {
            Some(url) => fetch_and_load(model, url, device),
            None => Ok(model),
        }
    }
}

#[cfg(feature = "pretrained")]
fn fetch_and_load<B: Backend>(
    model: ResNet<B>,
    url: &str,
    device: &Device<B>,
) -> VrcNetResult<ResNet<B>> {
    let weights = crate::download(url)?;
    model.load_pytorch(weights, device)
}

#[cfg(not(feature = "pretrained"))]
fn fetch_and_load<B: Backend>(
    _model: ResNet<B>,
    url: &str,
    _device: &Device<B>,
) -> VrcNetResult<ResNet<B>> {
    Err(VrcNetError::WeightLoadingFailed {
        reason: format!("{url} requires the `pretrained` feature"),
    })
}

impl<B: Backend> ResNet<B> {
    /// Load a torchvision ResNet checkpoint. Classifier weights are ignored.
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
            .into_iter()
            .fold(LoadArgs::new(path.into()), |args, (pattern, replacement)| {
                args.with_key_remap(pattern, replacement)
            });
        let record: ResNetRecord<B> =
            PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

        tracing::debug!(path = %path.display(), "loaded ResNet weights");
        Ok(self.load_record(record))
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn missing_checkpoint_is_reported() {
        let device = Default::default();
        let model = ResNet18::Random.init::<NdArray<f32>>(&device).unwrap();

        let result = model.load_pytorch("does/not/exist.pth", &device);
        assert!(matches!(
            result,
            Err(VrcNetError::WeightLoadingFailed { .. })
        ));
    }
}
