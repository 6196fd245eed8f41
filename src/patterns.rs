//! Shared compiled-regex cache.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::error::{CaseError, CaseResult};

const REGEX_CACHE_MAX: usize = 512;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Compiles `pattern` once and hands out cheap clones afterwards.
pub(crate) fn cached_regex(pattern: &str) -> CaseResult<Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| CaseError::invalid_config("regex cache lock poisoned"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern)
        .map_err(|e| CaseError::invalid_config(format!("invalid regex '{pattern}': {e}")))?;

    let mut guard = cache
        .write()
        .map_err(|_| CaseError::invalid_config("regex cache lock poisoned"))?;
    if guard.len() >= REGEX_CACHE_MAX {
        guard.clear();
    }
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_returns_equivalent_regex() {
        let a = cached_regex("^f[0-9]+").unwrap();
        let b = cached_regex("^f[0-9]+").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(b.is_match("f09_g16"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = cached_regex("(unclosed").unwrap_err();
        assert!(err.is_validation());
    }
}
