/// Convenience result type used across montage.
pub type OperationResult<T> = Result<T, OperationError>;

/// Top-level error taxonomy surfaced by registry dispatch and export jobs.
#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    /// An operation id was registered twice.
    #[error("duplicate operation: '{0}' is already registered")]
    DuplicateOperation(String),

    /// No operation is registered under the requested id.
    #[error("unknown operation: '{0}'")]
    UnknownOperation(String),

    /// The operation exists but does not apply to the asset's kind.
    #[error("unsupported asset kind: operation '{op}' cannot run on {kind} assets")]
    UnsupportedAssetKind {
        /// Operation id that was dispatched.
        op: String,
        /// Kind of the rejected asset, as displayed.
        kind: String,
    },

    /// Missing required keys, mistyped values or out-of-range parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A source could not be opened or lacks the tracks it claims.
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),

    /// A spatial transform would produce a degenerate render size.
    #[error("transform invalid: {0}")]
    TransformInvalid(String),

    /// The backend failed while rendering, encoding or muxing.
    #[error("encode failed: {0}")]
    EncodeFailed(String),

    /// The job observed an external cancellation signal.
    #[error("cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperationError {
    /// Build an [`OperationError::UnsupportedAssetKind`] value.
    pub fn unsupported_kind(op: impl Into<String>, kind: impl std::fmt::Display) -> Self {
        Self::UnsupportedAssetKind {
            op: op.into(),
            kind: kind.to_string(),
        }
    }

    /// Build an [`OperationError::InvalidParameters`] value.
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// Build an [`OperationError::SourceUnreadable`] value.
    pub fn source_unreadable(msg: impl Into<String>) -> Self {
        Self::SourceUnreadable(msg.into())
    }

    /// Build an [`OperationError::TransformInvalid`] value.
    pub fn transform_invalid(msg: impl Into<String>) -> Self {
        Self::TransformInvalid(msg.into())
    }

    /// Build an [`OperationError::EncodeFailed`] value.
    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    /// True for [`OperationError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
