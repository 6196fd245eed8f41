//! PE layout templates.
//!
//! A template row proposes per-component task, thread and root counts for
//! runs matching its grid, compset, machine and MPI library. Counts may be
//! negative, meaning whole nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};
use crate::layout::ComponentClass;
use crate::patterns::cached_regex;

/// Key used to select a template row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateQuery {
    pub grid: String,
    pub compset: String,
    pub machine: String,
    pub compiler: String,
    pub mpilib: String,
    /// Named row requested through the size specification.
    pub mnemonic: Option<String>,
}

/// Per-component counts proposed by a template row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeLayout {
    #[serde(default)]
    pub ntasks: BTreeMap<ComponentClass, i64>,
    #[serde(default)]
    pub nthrds: BTreeMap<ComponentClass, i64>,
    #[serde(default)]
    pub rootpe: BTreeMap<ComponentClass, i64>,
    #[serde(default)]
    pub pstrid: BTreeMap<ComponentClass, i64>,
    /// Extra settings applied to the case verbatim.
    #[serde(default)]
    pub other: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Source of PE layout templates.
pub trait PeTemplates {
    /// Returns the best layout for `query`, or `None` if nothing matches.
    ///
    /// # Errors
    /// Implementations report malformed template data as `InvalidConfig`.
    fn find_layout(&self, query: &TemplateQuery) -> CaseResult<Option<PeLayout>>;
}

/// One selectable template row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRow {
    /// Regex searched in the grid name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    /// Regex searched in the compset name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpilib: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    pub layout: PeLayout,
}

impl TemplateRow {
    /// Returns the row's specificity if it matches `query`.
    fn score(&self, query: &TemplateQuery) -> CaseResult<Option<usize>> {
        if self.mnemonic != query.mnemonic {
            return Ok(None);
        }
        let mut score = usize::from(self.mnemonic.is_some());

        for (pattern, subject) in [(&self.grid, &query.grid), (&self.compset, &query.compset)] {
            if let Some(p) = pattern {
                if !cached_regex(p)?.is_match(subject) {
                    return Ok(None);
                }
                score += 1;
            }
        }
        for (wanted, actual) in [(&self.machine, &query.machine), (&self.mpilib, &query.mpilib)] {
            if let Some(w) = wanted {
                if w != actual {
                    return Ok(None);
                }
                score += 1;
            }
        }
        Ok(Some(score))
    }
}

/// Template rows held in memory, typically loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTemplates {
    #[serde(default)]
    pub rows: Vec<TemplateRow>,
}

impl StaticTemplates {
    #[must_use]
    pub fn new(rows: Vec<TemplateRow>) -> Self {
        Self { rows }
    }

    /// Parses rows from JSON of the form `{"rows": [...]}`.
    ///
    /// # Errors
    /// `InvalidConfig` if the JSON does not describe template rows.
    pub fn from_json(json: &str) -> CaseResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CaseError::invalid_config(format!("invalid template file: {e}")))
    }

    pub fn push(&mut self, row: TemplateRow) {
        self.rows.push(row);
    }
}

impl PeTemplates for StaticTemplates {
    fn find_layout(&self, query: &TemplateQuery) -> CaseResult<Option<PeLayout>> {
        let mut best: Option<(usize, &TemplateRow)> = None;
        for row in &self.rows {
            let Some(score) = row.score(query)? else {
                continue;
            };
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, row));
            }
        }

        if let Some((score, row)) = best {
            tracing::debug!(
                grid = %query.grid,
                compset = %query.compset,
                machine = %query.machine,
                score,
                comment = row.layout.comment.as_deref().unwrap_or(""),
                "selected pe template"
            );
        }
        Ok(best.map(|(_, row)| row.layout.clone()))
    }
}
