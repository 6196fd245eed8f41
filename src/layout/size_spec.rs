//! Compact size specifications.
//!
//! ```text
//! <T>x<N>   T digits   → every component T tasks, N threads
//!           T mnemonic → tasks from the template row named T, N threads
//! <N>                  → every component N tasks, threads from the template
//! <mnemonic> or empty  → full template lookup
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{CaseError, CaseResult};
use crate::patterns::cached_regex;

const SHAPE_PATTERN: &str = r"^(.+)x([0-9]+)$";
const COUNT_PATTERN: &str = r"^[0-9]+$";
const MNEMONIC_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_]*$";

/// Parsed size specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// Take everything from the template, optionally a named row.
    Template { mnemonic: Option<String> },
    /// Force every component's task count; threads from the template.
    ForcedTasks { tasks: u32 },
    /// Force tasks and threads for every component.
    Uniform { tasks: u32, threads: u32 },
    /// Tasks from the named template row, threads forced.
    MnemonicThreads { mnemonic: String, threads: u32 },
}

impl SizeSpec {
    /// Parses an optional specification; `None` and blank text mean
    /// [`SizeSpec::Template`] without a mnemonic.
    ///
    /// # Errors
    /// `UnresolvableSizeSpec` for malformed tokens and zero counts.
    pub fn parse(text: Option<&str>) -> CaseResult<Self> {
        let Some(raw) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Self::Template { mnemonic: None });
        };

        if let Some(caps) = cached_regex(SHAPE_PATTERN)?.captures(raw) {
            let lhs = &caps[1];
            let threads = parse_count(raw, &caps[2], "thread count")?;
            if cached_regex(COUNT_PATTERN)?.is_match(lhs) {
                let tasks = parse_count(raw, lhs, "task count")?;
                return Ok(Self::Uniform { tasks, threads });
            }
            if cached_regex(MNEMONIC_PATTERN)?.is_match(lhs) {
                return Ok(Self::MnemonicThreads {
                    mnemonic: lhs.to_string(),
                    threads,
                });
            }
            return Err(CaseError::size_spec(raw, format!("'{lhs}' is neither a count nor a mnemonic")));
        }

        if cached_regex(COUNT_PATTERN)?.is_match(raw) {
            let tasks = parse_count(raw, raw, "task count")?;
            return Ok(Self::ForcedTasks { tasks });
        }

        if cached_regex(MNEMONIC_PATTERN)?.is_match(raw) {
            return Ok(Self::Template {
                mnemonic: Some(raw.to_string()),
            });
        }

        Err(CaseError::size_spec(raw, "unrecognized token"))
    }

    /// Forced task count, if any.
    #[must_use]
    pub const fn forced_tasks(&self) -> Option<u32> {
        match self {
            Self::ForcedTasks { tasks } | Self::Uniform { tasks, .. } => Some(*tasks),
            _ => None,
        }
    }

    /// Forced thread count, if any.
    #[must_use]
    pub const fn forced_threads(&self) -> Option<u32> {
        match self {
            Self::Uniform { threads, .. } | Self::MnemonicThreads { threads, .. } => Some(*threads),
            _ => None,
        }
    }

    /// Returns true if any count is forced, which pins every root to zero.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        !matches!(self, Self::Template { .. })
    }

    /// Template row name this specification selects.
    #[must_use]
    pub fn mnemonic(&self) -> Option<&str> {
        match self {
            Self::Template { mnemonic } => mnemonic.as_deref(),
            Self::MnemonicThreads { mnemonic, .. } => Some(mnemonic),
            _ => None,
        }
    }

    /// Returns true if the planner must consult the templates.
    #[must_use]
    pub const fn needs_template(&self) -> bool {
        !matches!(self, Self::Uniform { .. })
    }
}

fn parse_count(spec: &str, digits: &str, what: &str) -> CaseResult<u32> {
    let value = digits
        .parse::<u32>()
        .map_err(|_| CaseError::size_spec(spec, format!("{what} '{digits}' is out of range")))?;
    if value == 0 {
        return Err(CaseError::size_spec(spec, format!("{what} must be positive")));
    }
    Ok(value)
}

impl FromStr for SizeSpec {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(Some(s))
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template { mnemonic: None } => Ok(()),
            Self::Template { mnemonic: Some(m) } => f.write_str(m),
            Self::ForcedTasks { tasks } => write!(f, "{tasks}"),
            Self::Uniform { tasks, threads } => write!(f, "{tasks}x{threads}"),
            Self::MnemonicThreads { mnemonic, threads } => write!(f, "{mnemonic}x{threads}"),
        }
    }
}
