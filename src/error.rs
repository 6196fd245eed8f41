//! Error types for casekit.
//!
//! Every failure surfaced by the layered store and the layout planner is a
//! variant of [`CaseError`]. Persistence failures originate as
//! [`StorageError`] and convert automatically.

use thiserror::Error;

use crate::storage::StorageError;

/// Top-level error type for casekit.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("No store defines '{id}'")]
    UndefinedKey {
        id: String,
    },

    #[error("Value '{value}' for '{id}' is not a valid {expected}")]
    TypeMismatch {
        id: String,
        value: String,
        expected: String,
    },

    #[error("Value '{value}' for '{id}' is not one of [{valid}]")]
    InvalidValue {
        id: String,
        value: String,
        valid: String,
    },

    #[error("Case is read-only; cannot {op}")]
    ReadOnlyViolation {
        op: String,
    },

    #[error("Cannot resolve size specification '{spec}': {reason}")]
    UnresolvableSizeSpec {
        spec: String,
        reason: String,
    },

    #[error("Launcher '{launcher}' reserves {launcher_nodes} nodes but the layout needs {computed_nodes}")]
    LayoutInconsistency {
        launcher: String,
        launcher_nodes: u32,
        computed_nodes: u32,
    },

    #[error("Refusing to reload: {files} have unflushed changes")]
    DirtyReloadRejected {
        files: String,
    },

    #[error("Could not fully resolve '{id}': '{residual}' still holds references")]
    Unresolved {
        id: String,
        residual: String,
    },

    #[error("Case has no '{kind}' store")]
    MissingStore {
        kind: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CaseError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates an undefined-key error.
    #[must_use]
    pub fn undefined(id: impl Into<String>) -> Self {
        Self::UndefinedKey { id: id.into() }
    }

    /// Creates a size-specification error.
    #[must_use]
    pub fn size_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableSizeSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if no store defines the requested key.
    #[must_use]
    pub const fn is_undefined_key(&self) -> bool {
        matches!(self, Self::UndefinedKey { .. })
    }

    /// Returns true if a value failed type or valid-value validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::InvalidValue { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Returns true if the layout planner rejected its inputs.
    #[must_use]
    pub const fn is_layout(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableSizeSpec { .. } | Self::LayoutInconsistency { .. }
        )
    }

    /// Returns true if this is a read-only contract violation.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnlyViolation { .. })
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Only lock contention on a case directory clears up by itself.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias for casekit operations.
pub type CaseResult<T> = Result<T, CaseError>;
