//! Entry stores.
//!
//! An entry store is one ordered id → [`Entry`] mapping tagged with its
//! [`StoreKind`] and backing path. Typed stores ([`EnvStore`]) validate
//! writes against each entry's declared type; untyped auxiliary stores
//! ([`GenericStore`]) accept any text and return strings.

mod kind;
mod table;

use std::fmt;
use std::path::{Path, PathBuf};

pub use kind::StoreKind;

use crate::entry::Entry;
use crate::error::CaseResult;
use crate::resolve;
use crate::storage::StoreDocument;
use crate::value::ValueType;
use table::EntryTable;

/// Storage trait for one layer of a case.
///
/// Implementations are plain in-memory tables; persistence happens through
/// a [`crate::storage::StoreBackend`] when the owning case flushes.
pub trait EntryStore: Send + Sync + fmt::Debug {
    /// Logical kind of this store.
    fn kind(&self) -> StoreKind;

    /// Path of the backing document.
    fn path(&self) -> &Path;

    /// Points the store at a new backing document.
    fn set_path(&mut self, path: PathBuf);

    /// Returns true if this store defines `id` (directly or as a
    /// per-component composite id).
    fn owns(&self, id: &str) -> bool;

    /// Raw, unresolved text for `id`.
    fn get_raw(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Option<String>;

    /// Every raw value held for `id` across subgroups and attributes.
    fn get_raw_all(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Vec<String>;

    /// Declared type of `id`, or `None` for untyped stores.
    fn value_type(&self, id: &str) -> Option<ValueType>;

    /// Definition of `id`.
    fn entry(&self, id: &str) -> Option<&Entry>;

    /// All entries in store order.
    fn entries(&self) -> &[Entry];

    /// Stores `raw` under `id`.
    ///
    /// Returns `Ok(false)` if the store does not own `id`.
    ///
    /// # Errors
    /// `TypeMismatch` or `InvalidValue` when validation is on and fails.
    fn set_raw(&mut self, id: &str, raw: &str, subgroup: Option<&str>, ignore_type: bool) -> CaseResult<bool>;

    /// Replaces the valid-value list of `id`. Returns false if not owned.
    fn set_valid_values(&mut self, id: &str, values: &[String]) -> bool;

    /// Adds `entry` if no entry with the same id and group exists.
    fn add_entry(&mut self, entry: Entry) -> bool;

    /// Creates a deep copy.
    fn clone_box(&self) -> Box<dyn EntryStore>;

    /// Serializable snapshot of the store.
    fn to_document(&self) -> StoreDocument {
        StoreDocument::new(self.kind(), self.entries().to_vec())
    }

    /// Replaces the references this store owns in `text` (one pass).
    fn substitute(&self, text: &str) -> CaseResult<String> {
        resolve::substitute_references(text, |id| self.get_raw(id, None, None))
    }
}

impl Clone for Box<dyn EntryStore> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Typed store backed by one of the `env_*` documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvStore {
    kind: StoreKind,
    path: PathBuf,
    table: EntryTable,
}

impl EnvStore {
    #[must_use]
    pub fn new(kind: StoreKind, path: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Self {
            kind,
            path: path.into(),
            table: EntryTable::new(entries),
        }
    }
}

impl EntryStore for EnvStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn owns(&self, id: &str) -> bool {
        self.table.locate(id).is_some()
    }

    fn get_raw(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Option<String> {
        self.table.get_raw(id, attribute, subgroup)
    }

    fn get_raw_all(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Vec<String> {
        self.table.get_raw_all(id, attribute, subgroup)
    }

    fn value_type(&self, id: &str) -> Option<ValueType> {
        self.table.entry(id).map(|e| e.value_type)
    }

    fn entry(&self, id: &str) -> Option<&Entry> {
        self.table.entry(id)
    }

    fn entries(&self) -> &[Entry] {
        self.table.entries()
    }

    fn set_raw(&mut self, id: &str, raw: &str, subgroup: Option<&str>, ignore_type: bool) -> CaseResult<bool> {
        self.table.set_raw(id, raw, subgroup, !ignore_type)
    }

    fn set_valid_values(&mut self, id: &str, values: &[String]) -> bool {
        self.table.set_valid_values(id, values)
    }

    fn add_entry(&mut self, entry: Entry) -> bool {
        self.table.add(entry)
    }

    fn clone_box(&self) -> Box<dyn EntryStore> {
        Box::new(self.clone())
    }
}

/// Untyped auxiliary store (machine-specific settings, archive rules).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericStore {
    kind: StoreKind,
    path: PathBuf,
    table: EntryTable,
}

impl GenericStore {
    #[must_use]
    pub fn new(kind: StoreKind, path: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Self {
            kind,
            path: path.into(),
            table: EntryTable::new(entries),
        }
    }
}

impl EntryStore for GenericStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn owns(&self, id: &str) -> bool {
        self.table.locate(id).is_some()
    }

    fn get_raw(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Option<String> {
        self.table.get_raw(id, attribute, subgroup)
    }

    fn get_raw_all(&self, id: &str, attribute: Option<&str>, subgroup: Option<&str>) -> Vec<String> {
        self.table.get_raw_all(id, attribute, subgroup)
    }

    fn value_type(&self, _id: &str) -> Option<ValueType> {
        None
    }

    fn entry(&self, id: &str) -> Option<&Entry> {
        self.table.entry(id)
    }

    fn entries(&self) -> &[Entry] {
        self.table.entries()
    }

    fn set_raw(&mut self, id: &str, raw: &str, subgroup: Option<&str>, _ignore_type: bool) -> CaseResult<bool> {
        self.table.set_raw(id, raw, subgroup, false)
    }

    fn set_valid_values(&mut self, id: &str, values: &[String]) -> bool {
        self.table.set_valid_values(id, values)
    }

    fn add_entry(&mut self, entry: Entry) -> bool {
        self.table.add(entry)
    }

    fn clone_box(&self) -> Box<dyn EntryStore> {
        Box::new(self.clone())
    }
}

/// Builds the store matching `doc.kind`.
#[must_use]
pub fn store_from_document(path: PathBuf, doc: StoreDocument) -> Box<dyn EntryStore> {
    if doc.kind.is_typed() {
        Box::new(EnvStore::new(doc.kind, path, doc.entries))
    } else {
        Box::new(GenericStore::new(doc.kind, path, doc.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check: trait must be object-safe.
    fn _assert_entry_store_object_safe(_: &dyn EntryStore) {}

    #[test]
    fn test_typed_store_validates() {
        let mut store = EnvStore::new(
            StoreKind::Run,
            "/case/env_run.store",
            vec![Entry::new("RESUBMIT", ValueType::Int).with_value("0")],
        );
        assert!(store.set_raw("RESUBMIT", "abc", None, false).is_err());
        assert!(store.set_raw("RESUBMIT", "3", None, false).unwrap());
        assert!(!store.set_raw("STOP_N", "5", None, false).unwrap());
        assert_eq!(store.value_type("RESUBMIT"), Some(ValueType::Int));
    }

    #[test]
    fn test_generic_store_is_untyped() {
        let mut store = GenericStore::new(
            StoreKind::MachSpecific,
            "/case/env_mach_specific.store",
            vec![Entry::new("OMP_STACKSIZE", ValueType::Int).with_value("256")],
        );
        assert!(store.set_raw("OMP_STACKSIZE", "256M", None, false).unwrap());
        assert_eq!(store.value_type("OMP_STACKSIZE"), None);
    }

    #[test]
    fn test_clone_box_is_deep() {
        let original: Box<dyn EntryStore> = Box::new(EnvStore::new(
            StoreKind::Case,
            "/case/env_case.store",
            vec![Entry::new("CASE", ValueType::Char).with_value("a")],
        ));
        let mut copy = original.clone();
        copy.set_raw("CASE", "b", None, false).unwrap();
        copy.set_path(PathBuf::from("/other/env_case.store"));

        assert_eq!(original.get_raw("CASE", None, None).as_deref(), Some("a"));
        assert_eq!(original.path(), Path::new("/case/env_case.store"));
    }

    #[test]
    fn test_substitute_one_pass() {
        let store = EnvStore::new(
            StoreKind::Case,
            "/case/env_case.store",
            vec![Entry::new("CASE", ValueType::Char).with_value("demo")],
        );
        assert_eq!(store.substitute("run.$CASE").unwrap(), "run.demo");
    }

    #[test]
    fn test_store_from_document_kind() {
        let typed = store_from_document(PathBuf::from("a"), StoreDocument::empty(StoreKind::Batch));
        let untyped = store_from_document(PathBuf::from("b"), StoreDocument::empty(StoreKind::Archive));
        assert_eq!(typed.kind(), StoreKind::Batch);
        assert_eq!(untyped.kind(), StoreKind::Archive);
    }
}
