//! Store kinds and their precedence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaseError;

/// Logical kind of a store within a case.
///
/// The declaration order is the lookup precedence: typed stores first,
/// then the untyped auxiliary stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Case,
    Run,
    Build,
    MachPes,
    Batch,
    Test,
    MachSpecific,
    Archive,
}

impl StoreKind {
    /// Typed stores in precedence order.
    pub const TYPED: [Self; 6] = [
        Self::Case,
        Self::Run,
        Self::Build,
        Self::MachPes,
        Self::Batch,
        Self::Test,
    ];

    /// Untyped auxiliary stores in precedence order.
    pub const GENERIC: [Self; 2] = [Self::MachSpecific, Self::Archive];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::Run => "run",
            Self::Build => "build",
            Self::MachPes => "mach_pes",
            Self::Batch => "batch",
            Self::Test => "test",
            Self::MachSpecific => "mach_specific",
            Self::Archive => "archive",
        }
    }

    /// File name of the store inside a case directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Case => "env_case.store",
            Self::Run => "env_run.store",
            Self::Build => "env_build.store",
            Self::MachPes => "env_mach_pes.store",
            Self::Batch => "env_batch.store",
            Self::Test => "env_test.store",
            Self::MachSpecific => "env_mach_specific.store",
            Self::Archive => "env_archive.store",
        }
    }

    /// Returns true for stores that declare entry types.
    #[must_use]
    pub const fn is_typed(self) -> bool {
        !matches!(self, Self::MachSpecific | Self::Archive)
    }

    /// Returns true for stores that only exist when their file does.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Test)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TYPED
            .into_iter()
            .chain(Self::GENERIC)
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| CaseError::invalid_config(format!("unknown store kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        let mut all: Vec<StoreKind> = StoreKind::TYPED.into_iter().chain(StoreKind::GENERIC).collect();
        let declared = all.clone();
        all.sort();
        assert_eq!(all, declared);
        assert!(StoreKind::Case < StoreKind::MachPes);
    }

    #[test]
    fn test_kind_properties() {
        assert!(StoreKind::Batch.is_typed());
        assert!(!StoreKind::Archive.is_typed());
        assert!(StoreKind::Test.is_optional());
        assert_eq!(StoreKind::MachPes.file_name(), "env_mach_pes.store");
        assert_eq!("mach_pes".parse::<StoreKind>().unwrap(), StoreKind::MachPes);
        assert!("env".parse::<StoreKind>().is_err());
    }
}
