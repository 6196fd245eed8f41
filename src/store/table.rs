//! Entry lookup shared by typed and untyped stores.

use crate::entry::Entry;
use crate::error::{CaseError, CaseResult};
use crate::layout::ComponentClass;

/// Ordered entries of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EntryTable {
    entries: Vec<Entry>,
}

impl EntryTable {
    pub(crate) fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Maps `id` to the entry id that owns it, plus the component
    /// attribute for composite ids like `NTASKS_ATM`.
    pub(crate) fn locate(&self, id: &str) -> Option<(String, Option<String>)> {
        if self.entries.iter().any(|e| e.id == id) {
            return Some((id.to_string(), None));
        }
        let (base, suffix) = id.rsplit_once('_')?;
        let class = suffix.parse::<ComponentClass>().ok()?;
        self.entries
            .iter()
            .any(|e| e.id == base && e.per_component)
            .then(|| (base.to_string(), Some(class.as_str().to_string())))
    }

    pub(crate) fn entry(&self, id: &str) -> Option<&Entry> {
        let (base, _) = self.locate(id)?;
        self.entries.iter().find(|e| e.id == base)
    }

    pub(crate) fn get_raw(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Option<String> {
        let (base, class) = self.locate(id)?;
        let attribute = attribute.or(class.as_deref());
        self.entries
            .iter()
            .filter(|e| e.id == base && e.in_group(subgroup))
            .find_map(|e| e.raw(attribute))
            .map(str::to_string)
    }

    pub(crate) fn get_raw_all(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Vec<String> {
        let Some((base, class)) = self.locate(id) else {
            return Vec::new();
        };
        let attribute = attribute.or(class.as_deref());
        self.entries
            .iter()
            .filter(|e| e.id == base && e.in_group(subgroup))
            .flat_map(|e| e.raw_all(attribute))
            .map(str::to_string)
            .collect()
    }

    /// Sets `raw` on every entry matching `id` in `subgroup`.
    ///
    /// Returns `Ok(false)` if this table does not own the id. When
    /// `validate` is set, all matching entries are checked before any of
    /// them changes.
    pub(crate) fn set_raw(
        &mut self,
        id: &str,
        raw: &str,
        subgroup: Option<&str>,
        validate: bool,
    ) -> CaseResult<bool> {
        let Some((base, class)) = self.locate(id) else {
            return Ok(false);
        };

        let mut matched = false;
        for entry in self.entries.iter().filter(|e| e.id == base && e.in_group(subgroup)) {
            matched = true;
            if !validate || raw.contains('$') {
                continue;
            }
            if !entry.value_type.accepts(raw) {
                return Err(CaseError::TypeMismatch {
                    id: id.to_string(),
                    value: raw.to_string(),
                    expected: entry.value_type.name().to_string(),
                });
            }
            if !entry.allows(raw) {
                return Err(CaseError::InvalidValue {
                    id: id.to_string(),
                    value: raw.to_string(),
                    valid: entry.valid_values.join(","),
                });
            }
        }
        if !matched {
            return Ok(false);
        }

        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.id == base && e.in_group(subgroup))
        {
            entry.set_raw(class.as_deref(), raw);
        }
        Ok(true)
    }

    pub(crate) fn set_valid_values(&mut self, id: &str, values: &[String]) -> bool {
        let Some((base, _)) = self.locate(id) else {
            return false;
        };
        for entry in self.entries.iter_mut().filter(|e| e.id == base) {
            entry.valid_values = values.to_vec();
        }
        true
    }

    /// Appends `entry` unless an entry with the same id and group exists.
    pub(crate) fn add(&mut self, entry: Entry) -> bool {
        if self
            .entries
            .iter()
            .any(|e| e.id == entry.id && e.group == entry.group)
        {
            return false;
        }
        self.entries.push(entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn pes_table() -> EntryTable {
        EntryTable::new(vec![
            Entry::new("NTASKS", ValueType::Int).per_component().with_value("1"),
            Entry::new("TOTALPES", ValueType::Int).with_value("1"),
            Entry::new("JOB_QUEUE", ValueType::Char)
                .with_group("case.run")
                .with_value("regular"),
            Entry::new("JOB_QUEUE", ValueType::Char)
                .with_group("case.st_archive")
                .with_value("xfer"),
        ])
    }

    #[test]
    fn test_composite_ids() {
        let mut table = pes_table();
        assert_eq!(
            table.locate("NTASKS_ATM"),
            Some(("NTASKS".to_string(), Some("ATM".to_string())))
        );
        assert!(table.locate("TOTALPES_ATM").is_none());
        assert!(table.locate("NTASKS_FOO").is_none());

        assert!(table.set_raw("NTASKS_ATM", "64", None, true).unwrap());
        assert_eq!(table.get_raw("NTASKS_ATM", None, None), Some("64".to_string()));
        assert_eq!(table.get_raw("NTASKS_OCN", None, None), Some("1".to_string()));
    }

    #[test]
    fn test_type_checked_before_mutation() {
        let mut table = pes_table();
        let err = table.set_raw("TOTALPES", "many", None, true).unwrap_err();
        assert!(matches!(err, CaseError::TypeMismatch { .. }));
        assert_eq!(table.get_raw("TOTALPES", None, None), Some("1".to_string()));

        assert!(table.set_raw("TOTALPES", "many", None, false).unwrap());
    }

    #[test]
    fn test_subgroups() {
        let mut table = pes_table();
        assert_eq!(
            table.get_raw_all("JOB_QUEUE", None, None),
            vec!["regular".to_string(), "xfer".to_string()]
        );
        assert_eq!(
            table.get_raw("JOB_QUEUE", None, Some("case.st_archive")),
            Some("xfer".to_string())
        );

        table.set_raw("JOB_QUEUE", "debug", Some("case.run"), true).unwrap();
        assert_eq!(
            table.get_raw_all("JOB_QUEUE", None, None),
            vec!["debug".to_string(), "xfer".to_string()]
        );
        assert!(!table.set_raw("JOB_QUEUE", "x", Some("case.nope"), true).unwrap());
    }

    #[test]
    fn test_add_if_absent() {
        let mut table = pes_table();
        assert!(!table.add(Entry::new("TOTALPES", ValueType::Int)));
        assert!(table.add(Entry::new("PES_PER_NODE", ValueType::Int)));
        assert_eq!(table.entries().len(), 5);
    }
}
