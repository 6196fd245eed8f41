//! The layered store.
//!
//! A [`Case`] is an ordered list of typed entry stores followed by the
//! untyped auxiliary stores, queried and mutated as one namespace. Reads
//! scan the stores in precedence order and the first store holding a key
//! wins. Writes go to the first store that owns the key and mark that store
//! dirty; nothing reaches the backend until a flush.
//!
//! Mutation happens only through a [`CaseTxn`] obtained from
//! [`Case::begin`], so the read-only/read-write contract is enforced by the
//! borrow checker rather than at runtime.

mod config;
mod defaults;
mod txn;

pub use config::CaseConfig;
pub use defaults::{ConfigDefaults, StaticDefaults};
pub use txn::{CaseTxn, ConfigureRequest};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::entry::Entry;
use crate::error::{CaseError, CaseResult};
use crate::layout::{ComponentClass, MachineDescriptor, ResourcePlan, ResourceRequest, SparePolicy};
use crate::resolve::{resolve_in, Resolution};
use crate::storage::StoreBackend;
use crate::store::{store_from_document, EntryStore, EnvStore, GenericStore, StoreKind};
use crate::value::{Value, ValueType};

/// Options for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOptions<'a> {
    /// Attribute-qualified value to read (e.g. a component class).
    pub attribute: Option<&'a str>,
    /// Restrict the read to entries of this group.
    pub subgroup: Option<&'a str>,
    /// Resolve references and convert to the declared type.
    pub resolve: bool,
}

impl Default for GetOptions<'_> {
    fn default() -> Self {
        Self {
            attribute: None,
            subgroup: None,
            resolve: true,
        }
    }
}

impl<'a> GetOptions<'a> {
    /// Unresolved text, no type conversion.
    #[must_use]
    pub fn raw() -> Self {
        Self {
            resolve: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: &'a str) -> Self {
        self.attribute = Some(attribute);
        self
    }

    #[must_use]
    pub fn subgroup(mut self, subgroup: &'a str) -> Self {
        self.subgroup = Some(subgroup);
        self
    }
}

/// Options for writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions<'a> {
    /// Only update entries of this group; `None` updates every group.
    pub subgroup: Option<&'a str>,
    /// Skip type and valid-value checks.
    pub ignore_type: bool,
    /// Park values nobody owns as pending lookups instead of failing.
    pub allow_undefined: bool,
}

impl SetOptions<'_> {
    #[must_use]
    pub fn allow_undefined() -> Self {
        Self {
            allow_undefined: true,
            ..Self::default()
        }
    }
}

/// Layered configuration store for one case directory.
#[derive(Debug, Clone)]
pub struct Case {
    root: PathBuf,
    stores: Vec<Box<dyn EntryStore>>,
    generic: Vec<Box<dyn EntryStore>>,
    dirty: BTreeSet<StoreKind>,
    lookups: BTreeMap<String, Value>,
    backend: Arc<dyn StoreBackend>,
    config: CaseConfig,
}

impl Case {
    /// Creates an empty case rooted at `root`.
    ///
    /// Every required store starts empty and clean; the test store is
    /// absent until [`CaseTxn::enable_test_store`] is called.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation.
    pub fn create(
        root: impl Into<PathBuf>,
        backend: Arc<dyn StoreBackend>,
        config: CaseConfig,
    ) -> CaseResult<Self> {
        let config = config.validate()?;
        let root = root.into();

        let stores = StoreKind::TYPED
            .into_iter()
            .filter(|k| !k.is_optional())
            .map(|k| Box::new(EnvStore::new(k, root.join(k.file_name()), Vec::new())) as Box<dyn EntryStore>)
            .collect();
        let generic = StoreKind::GENERIC
            .into_iter()
            .map(|k| Box::new(GenericStore::new(k, root.join(k.file_name()), Vec::new())) as Box<dyn EntryStore>)
            .collect();

        tracing::debug!(root = %root.display(), "created case");
        Ok(Self {
            root,
            stores,
            generic,
            dirty: BTreeSet::new(),
            lookups: BTreeMap::new(),
            backend,
            config,
        })
    }

    /// Opens an existing case from `backend`.
    ///
    /// # Errors
    /// - `MissingStore` if a required store document is absent
    /// - `Storage` for backend failures
    pub fn open(
        root: impl Into<PathBuf>,
        backend: Arc<dyn StoreBackend>,
        config: CaseConfig,
    ) -> CaseResult<Self> {
        let mut case = Self::create(root, backend, config)?;
        case.load()?;
        Ok(case)
    }

    fn load(&mut self) -> CaseResult<()> {
        let mut stores = Vec::with_capacity(StoreKind::TYPED.len());
        for kind in StoreKind::TYPED {
            let path = self.root.join(kind.file_name());
            if kind.is_optional() && !self.backend.exists(&path)? {
                continue;
            }
            stores.push(self.read_store(kind, path)?);
        }

        let mut generic = Vec::with_capacity(StoreKind::GENERIC.len());
        for kind in StoreKind::GENERIC {
            let path = self.root.join(kind.file_name());
            if self.backend.exists(&path)? {
                generic.push(self.read_store(kind, path)?);
            } else {
                generic.push(Box::new(GenericStore::new(kind, path, Vec::new())) as Box<dyn EntryStore>);
            }
        }

        self.stores = stores;
        self.generic = generic;
        tracing::debug!(root = %self.root.display(), stores = self.stores.len(), "loaded case");
        Ok(())
    }

    fn read_store(&self, kind: StoreKind, path: PathBuf) -> CaseResult<Box<dyn EntryStore>> {
        let doc = self.backend.read(&path).map_err(|e| {
            if e.is_not_found() {
                CaseError::MissingStore {
                    kind: kind.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        if doc.kind != kind {
            return Err(CaseError::invalid_config(format!(
                "{} holds a '{}' store, expected '{kind}'",
                path.display(),
                doc.kind
            )));
        }
        Ok(store_from_document(path, doc))
    }

    /// Re-reads every store from the backend.
    ///
    /// # Errors
    /// `DirtyReloadRejected` while any store has unflushed changes.
    pub fn reload(&mut self) -> CaseResult<()> {
        if !self.dirty.is_empty() {
            let files = self
                .dirty
                .iter()
                .map(|k| k.file_name())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CaseError::DirtyReloadRejected { files });
        }
        self.load()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    fn all_stores(&self) -> impl Iterator<Item = &Box<dyn EntryStore>> {
        self.stores.iter().chain(self.generic.iter())
    }

    /// The store of `kind`, if present.
    #[must_use]
    pub fn store(&self, kind: StoreKind) -> Option<&dyn EntryStore> {
        self.all_stores().find(|s| s.kind() == kind).map(|s| &**s)
    }

    /// Kind of the first store that owns `id`.
    #[must_use]
    pub fn owner(&self, id: &str) -> Option<StoreKind> {
        self.all_stores().find(|s| s.owns(id)).map(|s| s.kind())
    }

    /// Reads `id`, resolved and converted to its declared type.
    ///
    /// # Errors
    /// `TypeMismatch` if the resolved text does not parse as the declared
    /// type; `Unresolved` in strict mode when references remain.
    pub fn get(&self, id: &str) -> CaseResult<Option<Value>> {
        self.get_with(id, GetOptions::default())
    }

    /// Reads `id` with explicit options.
    ///
    /// # Errors
    /// See [`Case::get`].
    pub fn get_with(&self, id: &str, opts: GetOptions<'_>) -> CaseResult<Option<Value>> {
        for store in self.all_stores() {
            if let Some(raw) = store.get_raw(id, opts.attribute, opts.subgroup) {
                return self.finish(id, raw, store.value_type(id), opts.resolve).map(Some);
            }
        }
        Ok(None)
    }

    /// Every value the first store holding `id` has for it.
    ///
    /// Values are not merged across stores.
    ///
    /// # Errors
    /// See [`Case::get`].
    pub fn get_all(&self, id: &str, opts: GetOptions<'_>) -> CaseResult<Vec<Value>> {
        for store in self.all_stores() {
            let raws = store.get_raw_all(id, opts.attribute, opts.subgroup);
            if !raws.is_empty() {
                let ty = store.value_type(id);
                return raws
                    .into_iter()
                    .map(|raw| self.finish(id, raw, ty, opts.resolve))
                    .collect();
            }
        }
        Ok(Vec::new())
    }

    fn finish(&self, id: &str, raw: String, ty: Option<ValueType>, resolve: bool) -> CaseResult<Value> {
        if !resolve {
            return Ok(Value::String(raw));
        }

        let Resolution { text, complete, .. } = self.resolve(&raw)?;
        if !complete {
            if self.config.strict_resolution {
                return Err(CaseError::Unresolved {
                    id: id.to_string(),
                    residual: text,
                });
            }
            tracing::warn!(id, partial = %text, "value only partially resolved");
            return Ok(Value::String(text));
        }

        match ty {
            None | Some(ValueType::String | ValueType::Char) => Ok(Value::String(text)),
            Some(t) => t.convert(&text).ok_or_else(|| CaseError::TypeMismatch {
                id: id.to_string(),
                value: text.clone(),
                expected: t.name().to_string(),
            }),
        }
    }

    /// Resolves references in arbitrary text against this case.
    ///
    /// # Errors
    /// Only internal regex failures.
    pub fn resolve(&self, raw: &str) -> CaseResult<Resolution> {
        resolve_in(&self.stores, raw, self.config.resolve_depth)
    }

    /// Unresolved text of `id`.
    #[must_use]
    pub fn get_raw(&self, id: &str) -> Option<String> {
        self.all_stores().find_map(|s| s.get_raw(id, None, None))
    }

    /// Resolved value of `id` rendered as store text.
    ///
    /// # Errors
    /// See [`Case::get`].
    pub fn get_string(&self, id: &str) -> CaseResult<Option<String>> {
        Ok(self.get(id)?.map(|v| v.to_string()))
    }

    /// Resolved integer value of `id`.
    ///
    /// # Errors
    /// `TypeMismatch` if `id` does not hold an integer.
    pub fn get_int(&self, id: &str) -> CaseResult<Option<i64>> {
        match self.get(id)? {
            None => Ok(None),
            Some(Value::Int(v)) => Ok(Some(v)),
            Some(other) => Err(CaseError::TypeMismatch {
                id: id.to_string(),
                value: other.to_string(),
                expected: ValueType::Int.name().to_string(),
            }),
        }
    }

    /// Resolved logical value of `id`.
    ///
    /// # Errors
    /// `TypeMismatch` if `id` does not hold a logical.
    pub fn get_bool(&self, id: &str) -> CaseResult<Option<bool>> {
        match self.get(id)? {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(v)),
            Some(other) => Err(CaseError::TypeMismatch {
                id: id.to_string(),
                value: other.to_string(),
                expected: ValueType::Bool.name().to_string(),
            }),
        }
    }

    /// Declared type of `id` in the first typed store that owns it.
    #[must_use]
    pub fn get_type(&self, id: &str) -> Option<ValueType> {
        self.stores.iter().find(|s| s.owns(id)).and_then(|s| s.value_type(id))
    }

    /// Definition of `id` and the store holding it.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<(StoreKind, &Entry)> {
        self.all_stores()
            .find_map(|s| s.entry(id).map(|e| (s.kind(), e)))
    }

    /// Allowed values of `id`; empty when unrestricted.
    #[must_use]
    pub fn valid_values(&self, id: &str) -> Option<&[String]> {
        self.entry(id).map(|(_, e)| e.valid_values.as_slice())
    }

    #[must_use]
    pub fn description(&self, id: &str) -> Option<&str> {
        self.entry(id).and_then(|(_, e)| e.description.as_deref())
    }

    /// Every typed-store id with its resolved value, in precedence order.
    ///
    /// Ids whose value is missing or fails conversion are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (String, Value)> + '_ {
        let mut seen = BTreeSet::new();
        self.stores
            .iter()
            .flat_map(|s| s.entries().iter())
            .filter(move |e| seen.insert(e.id.clone()))
            .filter_map(|e| {
                self.get(&e.id)
                    .ok()
                    .flatten()
                    .map(|v| (e.id.clone(), v))
            })
    }

    /// Component classes recorded under `COMP_CLASSES`.
    ///
    /// # Errors
    /// `InvalidConfig` for an unknown class tag.
    pub fn component_classes(&self) -> CaseResult<Vec<ComponentClass>> {
        match self.get_string("COMP_CLASSES")? {
            Some(text) => ComponentClass::parse_list(&text),
            None => Ok(Vec::new()),
        }
    }

    /// Returns true if any store has unflushed changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Stores with unflushed changes, in precedence order.
    #[must_use]
    pub fn dirty_stores(&self) -> Vec<StoreKind> {
        self.dirty.iter().copied().collect()
    }

    /// Values waiting for a store that owns their key.
    #[must_use]
    pub fn pending_lookups(&self) -> &BTreeMap<String, Value> {
        &self.lookups
    }

    /// Parks a value until a store owns `id`.
    ///
    /// The first value parked for an id wins; later ones are ignored.
    pub fn set_lookup_value(&mut self, id: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(existing) = self.lookups.get(id) {
            tracing::warn!(id, %existing, ignored = %value, "lookup already set");
            return;
        }
        tracing::debug!(id, %value, "setting lookup");
        self.lookups.insert(id.to_string(), value);
    }

    /// Opens a read-write scope.
    ///
    /// # Errors
    /// `ReadOnlyViolation` if the case was opened read-only.
    pub fn begin(&mut self) -> CaseResult<CaseTxn<'_>> {
        if self.config.read_only {
            return Err(CaseError::ReadOnlyViolation {
                op: "open a read-write scope".to_string(),
            });
        }
        Ok(CaseTxn::new(self))
    }

    /// Writes dirty stores (or every store) to the backend and clears the
    /// dirty set. A second flush without changes writes nothing.
    ///
    /// Returns the number of stores written.
    ///
    /// # Errors
    /// - `ReadOnlyViolation` for `flush_all` on a read-only case
    /// - `Storage` if a write fails; stores not yet written stay dirty
    pub fn flush(&mut self, flush_all: bool) -> CaseResult<usize> {
        if flush_all {
            if self.config.read_only {
                return Err(CaseError::ReadOnlyViolation {
                    op: "rewrite every store".to_string(),
                });
            }
            self.mark_all_dirty();
        }

        let mut written = 0;
        for store in self.stores.iter().chain(self.generic.iter()) {
            let kind = store.kind();
            if !self.dirty.contains(&kind) {
                continue;
            }
            self.backend.write(store.path(), &store.to_document())?;
            self.dirty.remove(&kind);
            written += 1;
        }
        if written > 0 {
            tracing::debug!(root = %self.root.display(), written, "flushed case");
        }
        Ok(written)
    }

    /// Deep copy for a derived case at `new_root`.
    ///
    /// Every store is retargeted to the new root and marked dirty, and
    /// `CASE`, `CASEROOT`, `CONTINUE_RUN` and `RESUBMIT` are reset.
    ///
    /// # Errors
    /// Validation errors from the reset values.
    pub fn copy(&self, new_name: &str, new_root: impl Into<PathBuf>) -> CaseResult<Self> {
        self.copy_with_roots(new_name, new_root, None, None)
    }

    /// [`Case::copy`] that also repoints `CIMEROOT` and `SRCROOT`.
    ///
    /// # Errors
    /// Validation errors from the reset values.
    pub fn copy_with_roots(
        &self,
        new_name: &str,
        new_root: impl Into<PathBuf>,
        cimeroot: Option<&str>,
        srcroot: Option<&str>,
    ) -> CaseResult<Self> {
        let mut case = self.clone();
        case.root = new_root.into();
        let root = case.root.clone();
        for store in case.stores.iter_mut().chain(case.generic.iter_mut()) {
            store.set_path(root.join(store.kind().file_name()));
        }

        let park = SetOptions::allow_undefined();
        if let Some(dir) = cimeroot {
            case.set_value("CIMEROOT", &Value::from(dir), park)?;
        }
        if let Some(dir) = srcroot {
            case.set_value("SRCROOT", &Value::from(dir), park)?;
        }
        case.set_value("CASE", &Value::from(new_name), park)?;
        case.set_value("CASEROOT", &Value::from(root.display().to_string()), park)?;
        case.set_value("CONTINUE_RUN", &Value::Bool(false), park)?;
        case.set_value("RESUBMIT", &Value::Int(0), park)?;
        case.mark_all_dirty();

        tracing::info!(from = %self.root.display(), to = %root.display(), name = new_name, "copied case");
        Ok(case)
    }

    /// Recomputes the resource plan from the stored layout keys.
    ///
    /// Spare-node settings stored in the case (`FORCE_SPARE_NODES`,
    /// `ALLOCATE_SPARE_NODES`) override the machine's policy.
    ///
    /// # Errors
    /// `InvalidConfig` if `COMP_CLASSES` is empty, plus planner errors.
    pub fn resource_plan(&self, machine: &dyn MachineDescriptor) -> CaseResult<ResourcePlan> {
        let classes = self.component_classes()?;
        if classes.is_empty() {
            return Err(CaseError::invalid_config("COMP_CLASSES is not set"));
        }

        let ncouplers = self.count_or("NINST_CPL", 1)?;
        let requests = classes
            .iter()
            .map(|&class| {
                Ok(ResourceRequest {
                    class,
                    ntasks: self.get_int(&format!("NTASKS_{class}"))?.unwrap_or(1),
                    nthrds: self.get_int(&format!("NTHRDS_{class}"))?.unwrap_or(1),
                    rootpe: self.get_int(&format!("ROOTPE_{class}"))?.unwrap_or(0),
                    pstrid: self.get_int(&format!("PSTRID_{class}"))?.unwrap_or(1),
                    ninst: self.count_or(&format!("NINST_{class}"), 1)?,
                })
            })
            .collect::<CaseResult<Vec<_>>>()?;

        let spare = self.spare_policy(machine.spare_policy())?;
        ResourcePlan::from_requests(&requests, BTreeMap::new(), ncouplers, machine, spare)
    }

    fn count_or(&self, id: &str, default: u32) -> CaseResult<u32> {
        match self.get_int(id)? {
            Some(v) if v >= 1 => u32::try_from(v)
                .map_err(|_| CaseError::invalid_config(format!("{id} = {v} is out of range"))),
            _ => Ok(default),
        }
    }

    fn spare_policy(&self, mut policy: SparePolicy) -> CaseResult<SparePolicy> {
        if let Some(forced) = self.get_int("FORCE_SPARE_NODES")? {
            if forced >= 0 {
                policy.force = Some(u32::try_from(forced).map_err(|_| {
                    CaseError::invalid_config(format!("FORCE_SPARE_NODES = {forced} is out of range"))
                })?);
            }
        }
        if let Some(allocate) = self.get_bool("ALLOCATE_SPARE_NODES")? {
            policy.allocate = allocate;
        }
        Ok(policy)
    }

    // Mutation primitives used by `CaseTxn` and `copy`.

    /// Writes `value` into the first store owning `id`.
    ///
    /// Returns `Ok(false)` if no store owns it.
    pub(crate) fn assign(
        &mut self,
        id: &str,
        value: &Value,
        subgroup: Option<&str>,
        ignore_type: bool,
    ) -> CaseResult<bool> {
        let raw = value.to_raw();
        for store in self.stores.iter_mut().chain(self.generic.iter_mut()) {
            if store.set_raw(id, &raw, subgroup, ignore_type)? {
                let kind = store.kind();
                self.dirty.insert(kind);
                tracing::debug!(id, value = %raw, store = %kind, "set value");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn set_value(&mut self, id: &str, value: &Value, opts: SetOptions<'_>) -> CaseResult<bool> {
        if self.assign(id, value, opts.subgroup, opts.ignore_type)? {
            return Ok(true);
        }
        if opts.allow_undefined {
            tracing::debug!(id, %value, "no store owns key; parked as lookup");
            self.lookups.insert(id.to_string(), value.clone());
            return Ok(false);
        }
        Err(CaseError::undefined(id))
    }

    pub(crate) fn store_mut(&mut self, kind: StoreKind) -> CaseResult<&mut Box<dyn EntryStore>> {
        self.stores
            .iter_mut()
            .chain(self.generic.iter_mut())
            .find(|s| s.kind() == kind)
            .ok_or_else(|| CaseError::MissingStore {
                kind: kind.to_string(),
            })
    }

    pub(crate) fn mark_dirty(&mut self, kind: StoreKind) -> CaseResult<()> {
        if self.store(kind).is_none() {
            return Err(CaseError::MissingStore {
                kind: kind.to_string(),
            });
        }
        tracing::debug!(store = %kind, "scheduled rewrite");
        self.dirty.insert(kind);
        Ok(())
    }

    fn mark_all_dirty(&mut self) {
        let kinds: Vec<StoreKind> = self.all_stores().map(|s| s.kind()).collect();
        self.dirty.extend(kinds);
    }

    pub(crate) fn add_test_store(&mut self) -> bool {
        if self.store(StoreKind::Test).is_some() {
            return false;
        }
        let kind = StoreKind::Test;
        let store = EnvStore::new(kind, self.root.join(kind.file_name()), Vec::new());
        let at = self
            .stores
            .iter()
            .position(|s| s.kind() > kind)
            .unwrap_or(self.stores.len());
        self.stores.insert(at, Box::new(store));
        self.dirty.insert(kind);
        true
    }

    pub(crate) fn drain_lookups(&mut self) -> CaseResult<usize> {
        let ids: Vec<String> = self.lookups.keys().cloned().collect();
        let mut drained = 0;
        for id in ids {
            let Some(value) = self.lookups.get(&id).cloned() else {
                continue;
            };
            if self.assign(&id, &value, None, false)? {
                self.lookups.remove(&id);
                drained += 1;
            }
        }
        if drained > 0 {
            tracing::debug!(drained, remaining = self.lookups.len(), "drained lookups");
        }
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn case_with(entries: &[(StoreKind, Entry)]) -> Case {
        let backend = Arc::new(MemoryBackend::new());
        let mut case = Case::create("/cases/demo", backend, CaseConfig::default()).unwrap();
        for (kind, entry) in entries {
            case.store_mut(*kind).unwrap().add_entry(entry.clone());
        }
        case
    }

    #[test]
    fn test_precedence_first_store_wins() {
        let case = case_with(&[
            (StoreKind::Run, Entry::new("STOP_N", ValueType::Int).with_value("5")),
            (StoreKind::Case, Entry::new("STOP_N", ValueType::Int).with_value("7")),
        ]);
        assert_eq!(case.get("STOP_N").unwrap(), Some(Value::Int(7)));
        assert_eq!(case.owner("STOP_N"), Some(StoreKind::Case));
    }

    #[test]
    fn test_get_resolves_and_converts() {
        let case = case_with(&[
            (StoreKind::Case, Entry::new("BASE", ValueType::Int).with_value("4")),
            (StoreKind::Run, Entry::new("COUNT", ValueType::Int).with_value("$BASE")),
            (StoreKind::Run, Entry::new("LABEL", ValueType::Char).with_value("n=${COUNT}")),
        ]);
        assert_eq!(case.get("COUNT").unwrap(), Some(Value::Int(4)));
        assert_eq!(case.get_string("LABEL").unwrap().as_deref(), Some("n=4"));
        assert_eq!(
            case.get_with("LABEL", GetOptions::raw()).unwrap(),
            Some(Value::from("n=${COUNT}"))
        );
        assert_eq!(case.get("MISSING").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_on_read() {
        let case = case_with(&[(StoreKind::Run, Entry::new("STOP_N", ValueType::Int).with_value("lots"))]);
        assert!(matches!(case.get("STOP_N").unwrap_err(), CaseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_partial_resolution_modes() {
        let entry = Entry::new("RUNDIR", ValueType::Char).with_value("${SCRATCH}/run");
        let case = case_with(&[(StoreKind::Run, entry.clone())]);
        assert_eq!(case.get_string("RUNDIR").unwrap().as_deref(), Some("${SCRATCH}/run"));

        let mut strict = case_with(&[(StoreKind::Run, entry)]);
        strict.config.strict_resolution = true;
        assert!(matches!(strict.get("RUNDIR").unwrap_err(), CaseError::Unresolved { .. }));
    }

    #[test]
    fn test_strict_get_accepts_literal_dollar() {
        let mut case = case_with(&[(
            StoreKind::Run,
            Entry::new("CHARGE_NOTE", ValueType::Char).with_value("costs $5"),
        )]);
        case.config.strict_resolution = true;
        assert_eq!(case.get_string("CHARGE_NOTE").unwrap().as_deref(), Some("costs $5"));
    }

    #[test]
    fn test_generic_store_values_are_strings() {
        let case = case_with(&[(
            StoreKind::MachSpecific,
            Entry::new("OMP_STACKSIZE", ValueType::Int).with_value("64"),
        )]);
        assert_eq!(case.get("OMP_STACKSIZE").unwrap(), Some(Value::from("64")));
        assert_eq!(case.get_type("OMP_STACKSIZE"), None);
    }

    #[test]
    fn test_get_all_does_not_merge_stores() {
        let case = case_with(&[
            (StoreKind::Batch, Entry::new("JOB_QUEUE", ValueType::Char).with_group("case.run").with_value("regular")),
            (StoreKind::Batch, Entry::new("JOB_QUEUE", ValueType::Char).with_group("case.st_archive").with_value("xfer")),
            (StoreKind::Archive, Entry::new("JOB_QUEUE", ValueType::Char).with_value("other")),
        ]);
        let all = case.get_all("JOB_QUEUE", GetOptions::default()).unwrap();
        assert_eq!(all, vec![Value::from("regular"), Value::from("xfer")]);

        let archive = case
            .get_with("JOB_QUEUE", GetOptions::default().subgroup("case.st_archive"))
            .unwrap();
        assert_eq!(archive, Some(Value::from("xfer")));
    }

    #[test]
    fn test_iter_skips_shadowed_and_empty() {
        let case = case_with(&[
            (StoreKind::Case, Entry::new("CASE", ValueType::Char).with_value("demo")),
            (StoreKind::Case, Entry::new("GRID", ValueType::Char)),
            (StoreKind::Run, Entry::new("CASE", ValueType::Char).with_value("shadowed")),
        ]);
        let items: Vec<(String, Value)> = case.iter().collect();
        assert_eq!(items, vec![("CASE".to_string(), Value::from("demo"))]);
    }

    #[test]
    fn test_lookup_first_value_wins() {
        let mut case = case_with(&[]);
        case.set_lookup_value("COMPSET", "B1850");
        case.set_lookup_value("COMPSET", "F2000");
        assert_eq!(case.pending_lookups()["COMPSET"], Value::from("B1850"));
    }

    #[test]
    fn test_drain_lookups_keeps_unowned() {
        let mut case = case_with(&[(StoreKind::Case, Entry::new("COMPSET", ValueType::Char))]);
        case.set_lookup_value("COMPSET", "B1850");
        case.set_lookup_value("NOT_YET", 3);

        assert_eq!(case.drain_lookups().unwrap(), 1);
        assert_eq!(case.get_string("COMPSET").unwrap().as_deref(), Some("B1850"));
        assert!(case.pending_lookups().contains_key("NOT_YET"));
        assert_eq!(case.dirty_stores(), vec![StoreKind::Case]);
    }

    #[test]
    fn test_test_store_slots_into_precedence() {
        let mut case = case_with(&[]);
        assert!(case.store(StoreKind::Test).is_none());
        assert!(case.add_test_store());
        assert!(!case.add_test_store());

        let kinds: Vec<StoreKind> = case.stores.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, StoreKind::TYPED.to_vec());
    }

    #[test]
    fn test_resource_plan_requires_classes() {
        let case = case_with(&[]);
        let err = case.resource_plan(&crate::layout::MachineSpec::default()).unwrap_err();
        assert!(err.is_validation());
    }
}
