/// Convenience result type used across laminate.
pub type LaminateResult<T> = Result<T, LaminateError>;

/// Top-level error taxonomy for fallible setup APIs.
///
/// Per-frame passes never return errors; snapshot and texture operations report resource
/// unavailability as `None` instead.
#[derive(thiserror::Error, Debug)]
pub enum LaminateError {
    /// Malformed layer trees, builder misuse, or invalid configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Graphics backend initialization or execution failures.
    #[error("backend error: {0}")]
    Backend(String),

    /// Errors when serializing or deserializing configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LaminateError {
    /// Build a [`LaminateError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`LaminateError::Backend`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Build a [`LaminateError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
