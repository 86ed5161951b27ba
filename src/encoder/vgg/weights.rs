use super::vgg::VGG16_STAGES;

/// VGG-16-BN weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Vgg16Bn {
    /// Freshly initialized parameters.
    Random,
    /// Top-1 accuracy: 73.360%.
    /// Top-5 accuracy: 91.516%.
    ImageNet1kV1,
}

impl Vgg16Bn {
    pub(super) fn url(&self) -> Option<&'static str> {
        match self {
            Vgg16Bn::Random => None,
            Vgg16Bn::ImageNet1kV1 => {
                Some("https://download.pytorch.org/models/vgg16_bn-6c64b313.pth")
            }
        }
    }
}

/// Position of a parameterized layer in the flat torchvision `features` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TorchLayer {
    pub stage: usize,
    pub unit: usize,
    /// Index of the convolution; its batch norm follows at `conv + 1`
    /// and its ReLU at `conv + 2`.
    pub conv: usize,
}

/// Walk the torchvision layout: every unit spans conv, bn and relu, every
/// stage ends with one max-pool.
pub(crate) fn torch_layers() -> Vec<TorchLayer> {
    let mut index = 0;
    let mut layers = Vec::new();
    for (stage, (convs, _)) in VGG16_STAGES.iter().enumerate() {
        for unit in 0..*convs {
            layers.push(TorchLayer {
                stage: stage + 1,
                unit,
                conv: index,
            });
            index += 3;
        }
        index += 1;
    }
    layers
}

/// Key remaps from `features.{i}.*` to `stage{s}.convs.{u}.{conv,bn}.*`.
pub(crate) fn key_remaps() -> Vec<(String, String)> {
    torch_layers()
        .into_iter()
        .flat_map(|layer| {
            let prefix = format!("stage{}.convs.{}", layer.stage, layer.unit);
            [
                (
                    format!("^features\\.{}\\.(.+)$", layer.conv),
                    format!("{prefix}.conv.$1"),
                ),
                (
                    format!("^features\\.{}\\.(.+)$", layer.conv + 1),
                    format!("{prefix}.bn.$1"),
                ),
            ]
        })
        .collect()
}
