//! Variable resolution across stores.
//!
//! Values may reference other entries as `${ID}` or `$ID`, and the process
//! environment as `$ENV{NAME}`. Resolution makes repeated passes: in each
//! pass the environment is substituted, then every typed store in
//! precedence order replaces the references it owns. Passes stop when no
//! references remain, when a pass changes nothing, or at the depth bound.
//! There is no cycle detection; a self-reference simply stays unresolved.

use crate::error::CaseResult;
use crate::patterns::cached_regex;
use crate::store::EntryStore;

/// Default number of resolution passes.
pub const DEFAULT_RESOLVE_DEPTH: usize = 10;

// A bare reference cannot start with a digit, so "$5" stays literal text.
const REFERENCE_PATTERN: &str = r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)";
const ENV_PATTERN: &str = r"\$ENV\{([A-Za-z0-9_]+)\}";

/// Outcome of resolving one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Text after substitution (possibly partial).
    pub text: String,
    /// True if no references remain.
    pub complete: bool,
    /// Number of passes performed.
    pub depth: usize,
}

impl Resolution {
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Returns the ids referenced by `text`, in order of appearance.
pub fn references(text: &str) -> CaseResult<Vec<String>> {
    let re = cached_regex(REFERENCE_PATTERN)?;
    Ok(re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Returns true if `text` still holds entry or environment references.
pub fn has_references(text: &str) -> CaseResult<bool> {
    if !text.contains('$') {
        return Ok(false);
    }
    Ok(cached_regex(REFERENCE_PATTERN)?.is_match(text))
}

/// Replaces every reference that `lookup` knows; leaves the rest intact.
pub fn substitute_references<F>(text: &str, lookup: F) -> CaseResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains('$') {
        return Ok(text.to_string());
    }
    let re = cached_regex(REFERENCE_PATTERN)?;
    Ok(re
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| lookup(m.as_str()))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned())
}

/// Replaces `$ENV{NAME}` with the variable's value when it is set.
pub fn substitute_env(text: &str) -> CaseResult<String> {
    if !text.contains("$ENV{") {
        return Ok(text.to_string());
    }
    let re = cached_regex(ENV_PATTERN)?;
    Ok(re
        .replace_all(text, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}

/// Resolves `raw` against `stores` in the order given.
pub fn resolve_in(stores: &[Box<dyn EntryStore>], raw: &str, max_depth: usize) -> CaseResult<Resolution> {
    let mut text = raw.to_string();
    let mut depth = 0;

    while depth < max_depth && has_references(&text)? {
        let before = text.clone();
        text = substitute_env(&text)?;
        for store in stores {
            text = store.substitute(&text)?;
        }
        depth += 1;
        if text == before {
            break;
        }
    }

    let complete = !has_references(&text)?;
    if !complete {
        tracing::debug!(raw, partial = %text, depth, "value not fully resolved");
    }
    Ok(Resolution {
        text,
        complete,
        depth,
    })
}
