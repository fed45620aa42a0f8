use std::path::PathBuf;

/// Failure taxonomy for the capture/detect/report pipeline.
///
/// Capture and model-loading failures surface to the immediate caller;
/// failures inside a long-running cycle are converted to a failed
/// `AnalysisResult` at the run-mode boundary instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("screen capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("model unavailable ({path}): {reason}")]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Io(std::io::Error::other(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
