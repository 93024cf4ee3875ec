/// Convenience result type used across cutline.
pub type CutlineResult<T> = Result<T, CutlineError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Cancellation is deliberately absent: a cancelled export is a terminal status, not a failure.
#[derive(thiserror::Error, Debug)]
pub enum CutlineError {
    /// Invalid user-provided or timeline data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A media resource failed to load or decode in time. Never fatal to a driver.
    #[error("resource load error: {0}")]
    ResourceLoad(String),

    /// Missing render surface or encode capability. Fatal for an export.
    #[error("setup error: {0}")]
    Setup(String),

    /// A single layer failed to draw within one frame.
    #[error("render error: {0}")]
    Render(String),

    /// The encode sink rejected data or failed to finalize.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CutlineError {
    /// Build a [`CutlineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CutlineError::ResourceLoad`] value.
    pub fn resource_load(msg: impl Into<String>) -> Self {
        Self::ResourceLoad(msg.into())
    }

    /// Build a [`CutlineError::Setup`] value.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Build a [`CutlineError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`CutlineError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Return `true` for errors that must abort an export.
    pub fn is_fatal_for_export(&self) -> bool {
        matches!(self, Self::Setup(_) | Self::Encode(_) | Self::Other(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
