//! Case configuration.

use crate::error::{CaseError, CaseResult};
use crate::resolve::DEFAULT_RESOLVE_DEPTH;

/// Options controlling how a case is opened and read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseConfig {
    /// Refuse read-write scopes and full flushes.
    pub read_only: bool,
    /// Report values that still hold references as errors instead of
    /// returning the partial text.
    pub strict_resolution: bool,
    /// Maximum resolution passes per value.
    pub resolve_depth: usize,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            strict_resolution: false,
            resolve_depth: DEFAULT_RESOLVE_DEPTH,
        }
    }
}

impl CaseConfig {
    const MAX_RESOLVE_DEPTH: usize = 1024;

    /// Read-only configuration with default resolution settings.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `InvalidConfig` when `resolve_depth` is 0 or above 1024.
    pub fn validate(self) -> CaseResult<Self> {
        if self.resolve_depth == 0 {
            return Err(CaseError::invalid_config("resolve_depth must be at least 1"));
        }
        if self.resolve_depth > Self::MAX_RESOLVE_DEPTH {
            return Err(CaseError::invalid_config(format!(
                "resolve_depth must be at most {} (got {})",
                Self::MAX_RESOLVE_DEPTH,
                self.resolve_depth
            )));
        }
        Ok(self)
    }
}
