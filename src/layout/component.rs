//! Component classes of a coupled run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaseError;

/// Tag identifying one logical subsystem of a coupled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentClass {
    /// Coupler. Present in every run.
    Cpl,
    Atm,
    Lnd,
    Ice,
    Ocn,
    Rof,
    Glc,
    Wav,
    Iac,
    /// Externally driven component, limited to one instance.
    Esp,
}

impl ComponentClass {
    /// Every class in canonical order.
    pub const ALL: [Self; 10] = [
        Self::Cpl,
        Self::Atm,
        Self::Lnd,
        Self::Ice,
        Self::Ocn,
        Self::Rof,
        Self::Glc,
        Self::Wav,
        Self::Iac,
        Self::Esp,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpl => "CPL",
            Self::Atm => "ATM",
            Self::Lnd => "LND",
            Self::Ice => "ICE",
            Self::Ocn => "OCN",
            Self::Rof => "ROF",
            Self::Glc => "GLC",
            Self::Wav => "WAV",
            Self::Iac => "IAC",
            Self::Esp => "ESP",
        }
    }

    #[must_use]
    pub const fn is_coupler(self) -> bool {
        matches!(self, Self::Cpl)
    }

    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(self, Self::Esp)
    }

    /// Parses a comma- or whitespace-separated class list such as
    /// `"CPL,ATM,OCN"`.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unknown class tag.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, CaseError> {
        text.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect()
    }

    /// Renders a class list in the form stored under `COMP_CLASSES`.
    #[must_use]
    pub fn join(classes: &[Self]) -> String {
        classes
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentClass {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| CaseError::invalid_config(format!("unknown component class '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for class in ComponentClass::ALL {
            assert_eq!(class.as_str().parse::<ComponentClass>().unwrap(), class);
        }
        assert_eq!("ocn".parse::<ComponentClass>().unwrap(), ComponentClass::Ocn);
        assert!("XYZ".parse::<ComponentClass>().is_err());
    }

    #[test]
    fn test_parse_list() {
        let classes = ComponentClass::parse_list("CPL, ATM,OCN").unwrap();
        assert_eq!(
            classes,
            vec![ComponentClass::Cpl, ComponentClass::Atm, ComponentClass::Ocn]
        );
        assert_eq!(ComponentClass::join(&classes), "CPL,ATM,OCN");
        assert!(ComponentClass::parse_list("CPL,FOO").is_err());
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&ComponentClass::Esp).unwrap();
        assert_eq!(json, "\"ESP\"");
    }
}
