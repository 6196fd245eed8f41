//! Configuration entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::ValueType;

/// One typed key in a store.
///
/// An entry holds a default value and, optionally, values qualified by an
/// attribute. Entries flagged `per_component` keep one value per component
/// class and answer composite ids such as `NTASKS_ATM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub per_component: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entry {
    /// Creates an entry with no value.
    #[must_use]
    pub fn new(id: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: id.into(),
            value_type,
            value: None,
            values: BTreeMap::new(),
            per_component: false,
            valid_values: Vec::new(),
            group: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_attribute_value(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_valid_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the entry as holding one value per component class.
    #[must_use]
    pub fn per_component(mut self) -> Self {
        self.per_component = true;
        self
    }

    /// Raw text for `attribute`, falling back to the default value.
    #[must_use]
    pub fn raw(&self, attribute: Option<&str>) -> Option<&str> {
        attribute
            .and_then(|a| self.values.get(a))
            .or(self.value.as_ref())
            .map(String::as_str)
    }

    /// Every raw value this entry holds: the default first, then the
    /// attribute-qualified values in attribute order.
    #[must_use]
    pub fn raw_all(&self, attribute: Option<&str>) -> Vec<&str> {
        if attribute.is_some() {
            return self.raw(attribute).into_iter().collect();
        }
        self.value
            .iter()
            .chain(self.values.values())
            .map(String::as_str)
            .collect()
    }

    /// Stores raw text for `attribute`, or the default value when `None`.
    ///
    /// Setting the default of a per-component entry also overwrites every
    /// component's own value.
    pub fn set_raw(&mut self, attribute: Option<&str>, raw: impl Into<String>) {
        let raw = raw.into();
        match attribute {
            Some(a) => {
                self.values.insert(a.to_string(), raw);
            }
            None => {
                if self.per_component {
                    for v in self.values.values_mut() {
                        v.clone_from(&raw);
                    }
                }
                self.value = Some(raw);
            }
        }
    }

    /// Returns true if `raw` is allowed by the valid-value list.
    ///
    /// Values that still contain references are accepted; they are
    /// checked once resolved.
    #[must_use]
    pub fn allows(&self, raw: &str) -> bool {
        self.valid_values.is_empty()
            || raw.contains('$')
            || self.valid_values.iter().any(|v| v == raw)
    }

    /// Returns true if this entry belongs to `subgroup`.
    ///
    /// A `None` subgroup matches every entry.
    #[must_use]
    pub fn in_group(&self, subgroup: Option<&str>) -> bool {
        subgroup.map_or(true, |g| self.group.as_deref() == Some(g))
    }
}
