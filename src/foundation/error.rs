/// Convenience result type used across depthpeel.
pub type PeelResult<T> = Result<T, PeelError>;

/// Top-level error taxonomy used by the peeling engine.
///
/// Every variant is fatal for the call that produced it: nothing is retried or silently degraded
/// to a different peeling method.
#[derive(thiserror::Error, Debug)]
pub enum PeelError {
    /// Invalid configuration (unknown method identifier, zero layer count, bad background).
    #[error("configuration error: {0}")]
    Config(String),

    /// Viewport or target size is zero or does not match the active viewport.
    #[error("viewport error: {0}")]
    Viewport(String),

    /// A render target could not be allocated within the device limits.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// A lifecycle method was called out of order (`display` before `init`, after `dispose`, ...).
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// A pass tried to read a target that is bound for writing in the same pass.
    #[error("read/write hazard: {0}")]
    Hazard(String),

    /// The host draw callback failed during a pass.
    #[error("draw callback failed: {0:#}")]
    Draw(anyhow::Error),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PeelError {
    /// Build a [`PeelError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`PeelError::Viewport`] value.
    pub fn viewport(msg: impl Into<String>) -> Self {
        Self::Viewport(msg.into())
    }

    /// Build a [`PeelError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`PeelError::Lifecycle`] value.
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Build a [`PeelError::Hazard`] value.
    pub fn hazard(msg: impl Into<String>) -> Self {
        Self::Hazard(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
