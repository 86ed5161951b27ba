use super::ResNetConfig;

/// ResNet structure metadata.
pub struct ResNetStructure {
    pub(super) shape: [usize; 4],
    pub(super) url: Option<&'static str>,
}

impl ResNetStructure {
    pub fn to_config(&self) -> ResNetConfig {
        ResNetConfig::new(self.shape)
    }
}

pub trait WeightsMeta {
    fn weights(&self) -> ResNetStructure;
}

/// ResNet-18 weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResNet18 {
    /// Freshly initialized parameters.
    Random,
    /// These weights reproduce closely the results of the original paper.
    /// Top-1 accuracy: 69.758%.
    /// Top-5 accuracy: 89.078%.
    ImageNet1kV1,
}

impl WeightsMeta for ResNet18 {
    fn weights(&self) -> ResNetStructure {
        let url = match *self {
            ResNet18::Random => None,
            ResNet18::ImageNet1kV1 => {
                Some("https://download.pytorch.org/models/resnet18-f37072fd.pth")
            }
        };
        ResNetStructure {
            shape: [2, 2, 2, 2],
            url,
        }
    }
}

/// Key remaps from torchvision's `nn.Sequential` indices to named fields,
/// applied in order.
pub(crate) fn key_remaps() -> [(&'static str, &'static str); 3] {
    [
        // *.downsample.0.* -> *.downsample.conv.*
        ("(.+)\\.downsample\\.0\\.(.+)", "$1.downsample.conv.$2"),
        // *.downsample.1.* -> *.downsample.bn.*
        ("(.+)\\.downsample\\.1\\.(.+)", "$1.downsample.bn.$2"),
        // layer[i].[j].* -> layer[i].blocks.[j].*
        ("(layer[1-4])\\.([0-9]+)\\.(.+)", "$1.blocks.$2.$3"),
    ]
}
