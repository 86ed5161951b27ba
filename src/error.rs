use thiserror::Error;

/// Errors surfaced by model construction and the forward pass.
#[derive(Error, Debug)]
pub enum VrcNetError {
    /// The input tensor cannot be fed to the network.
    #[error("Invalid input tensor shape: expected {expected}, got {actual:?}")]
    InvalidInputShape {
        /// What the network accepts.
        expected: String,
        /// The offending `[batch, channels, height, width]`.
        actual: [usize; 4],
    },

    /// A skip tensor is smaller than the decoder tensor it is fused with.
    #[error("Shape mismatch at {stage}: need at least {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Name of the fusion point.
        stage: &'static str,
        /// Required `[height, width]`.
        expected: [usize; 2],
        /// Actual `[height, width]` of the skip tensor.
        actual: [usize; 2],
    },

    /// Loading backbone weights failed.
    #[error("Failed to load weights: {reason}")]
    WeightLoadingFailed {
        /// The reason for the failure.
        reason: String,
    },

    /// Fetching or caching a checkpoint failed.
    #[error("Could not download {url}")]
    Download {
        /// The checkpoint URL.
        url: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl From<burn::record::RecorderError> for VrcNetError {
    fn from(err: burn::record::RecorderError) -> Self {
        Self::WeightLoadingFailed {
            reason: format!("{err:?}"),
        }
    }
}

/// A specialized `Result` type for VRCNet operations.
pub type VrcNetResult<T> = Result<T, VrcNetError>;
