/// Result alias for fallible vibereel operations.
pub type VibeResult<T> = Result<T, VibeError>;

/// Errors returned by vibereel.
///
/// Only conditions that leave the encoders or the output container in an unknown state surface
/// as errors from a render. Per-track decode failures and a missing background image are
/// absorbed where they happen and never reach the caller as a `VibeError`.
#[derive(thiserror::Error, Debug)]
pub enum VibeError {
    /// Bad configuration, project file contents or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unreadable audio, image or font input.
    #[error("decode error: {0}")]
    Decode(String),

    /// A video/audio encoder or the muxer failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// The render pipeline could not proceed (thread pool, raster setup).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A project or report could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(String),

    /// The render was cancelled through its cancel token.
    #[error("render cancelled")]
    Cancelled,

    /// IO or dependency failure carried with its context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VibeError {
    /// Shorthand for [`VibeError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for [`VibeError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Shorthand for [`VibeError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Shorthand for [`VibeError::Evaluation`].
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Shorthand for [`VibeError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
