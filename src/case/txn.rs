//! Read-write scope over a case.

use std::ops::Deref;

use super::{Case, ConfigDefaults, SetOptions};
use crate::entry::Entry;
use crate::error::{CaseError, CaseResult};
use crate::layout::{
    compute_layout, io_collapse, ComponentClass, LayoutRequest, MachineDescriptor, PeTemplates,
    ResourcePlan, SizeSpec, TemplateQuery,
};
use crate::store::StoreKind;
use crate::value::Value;

/// Inputs to [`CaseTxn::configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRequest {
    /// Component set name, recorded as `COMPSET`.
    pub compset: String,
    /// Grid name, recorded as `GRID`.
    pub grid: String,
    /// Ordered component classes; must include `CPL`.
    pub classes: Vec<ComponentClass>,
    /// Compact size specification (`64x2`, `128`, `M`, ...).
    pub size_spec: Option<String>,
    /// Overrides the machine's default compiler.
    pub compiler: Option<String>,
    /// Overrides the machine's default MPI library.
    pub mpilib: Option<String>,
    /// Instances per non-coupler component.
    pub ninst: u32,
    /// Coupler instances.
    pub ncouplers: u32,
}

impl ConfigureRequest {
    #[must_use]
    pub fn new(compset: impl Into<String>, grid: impl Into<String>, classes: Vec<ComponentClass>) -> Self {
        Self {
            compset: compset.into(),
            grid: grid.into(),
            classes,
            size_spec: None,
            compiler: None,
            mpilib: None,
            ninst: 1,
            ncouplers: 1,
        }
    }

    #[must_use]
    pub fn with_size_spec(mut self, spec: impl Into<String>) -> Self {
        self.size_spec = Some(spec.into());
        self
    }
}

/// Read-write scope over a [`Case`].
///
/// Every mutation of a case goes through this type. [`CaseTxn::commit`]
/// flushes dirty stores and reports failures; dropping an uncommitted
/// scope flushes on a best-effort basis and only logs failures.
///
/// Reads are available through `Deref<Target = Case>`.
#[derive(Debug)]
pub struct CaseTxn<'a> {
    case: &'a mut Case,
    finished: bool,
}

impl<'a> CaseTxn<'a> {
    pub(crate) fn new(case: &'a mut Case) -> Self {
        Self {
            case,
            finished: false,
        }
    }

    /// Sets `id` in the first store that owns it.
    ///
    /// # Errors
    /// - `UndefinedKey` if no store owns `id`
    /// - `TypeMismatch` / `InvalidValue` if validation fails
    pub fn set(&mut self, id: &str, value: impl Into<Value>) -> CaseResult<()> {
        self.case
            .set_value(id, &value.into(), SetOptions::default())
            .map(|_| ())
    }

    /// Sets `id` with explicit options.
    ///
    /// Returns false when the value was parked as a pending lookup.
    ///
    /// # Errors
    /// See [`CaseTxn::set`].
    pub fn set_with(&mut self, id: &str, value: impl Into<Value>, opts: SetOptions<'_>) -> CaseResult<bool> {
        self.case.set_value(id, &value.into(), opts)
    }

    /// Replaces the allowed values of `id`.
    ///
    /// # Errors
    /// `UndefinedKey` if no store owns `id`.
    pub fn set_valid_values(&mut self, id: &str, values: &[&str]) -> CaseResult<()> {
        let values: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        let mut owner = None;
        for store in self.case.stores.iter_mut().chain(self.case.generic.iter_mut()) {
            if store.set_valid_values(id, &values) {
                owner = Some(store.kind());
                break;
            }
        }
        let kind = owner.ok_or_else(|| CaseError::undefined(id))?;
        self.case.mark_dirty(kind)
    }

    /// Writes `id` into an untyped store, creating the entry if needed.
    ///
    /// # Errors
    /// `InvalidConfig` if `kind` is a typed store.
    pub fn set_generic(&mut self, kind: StoreKind, id: &str, value: impl Into<Value>) -> CaseResult<()> {
        if kind.is_typed() {
            return Err(CaseError::invalid_config(format!(
                "'{kind}' is a typed store; use set for '{id}'"
            )));
        }
        let raw = value.into().to_raw();
        let store = self.case.store_mut(kind)?;
        if !store.set_raw(id, &raw, None, true)? {
            store.add_entry(Entry::new(id, crate::value::ValueType::Char).with_value(raw));
        }
        self.case.mark_dirty(kind)
    }

    /// Adds `entry` to `kind` unless it is already defined there.
    ///
    /// # Errors
    /// `MissingStore` if the case has no `kind` store.
    pub fn add_entry(&mut self, kind: StoreKind, entry: Entry) -> CaseResult<bool> {
        let added = self.case.store_mut(kind)?.add_entry(entry);
        if added {
            self.case.mark_dirty(kind)?;
        }
        Ok(added)
    }

    /// Creates the optional test store. Returns false if it already exists.
    pub fn enable_test_store(&mut self) -> bool {
        self.case.add_test_store()
    }

    /// Marks `kind` for rewriting at the next flush.
    ///
    /// # Errors
    /// `MissingStore` if the case has no `kind` store.
    pub fn schedule_rewrite(&mut self, kind: StoreKind) -> CaseResult<()> {
        self.case.mark_dirty(kind)
    }

    /// See [`Case::set_lookup_value`].
    pub fn set_lookup_value(&mut self, id: &str, value: impl Into<Value>) {
        self.case.set_lookup_value(id, value);
    }

    /// Moves pending lookups into the stores that now own them.
    ///
    /// Returns the number of lookups applied.
    ///
    /// # Errors
    /// Validation errors from the stored values.
    pub fn drain_lookups(&mut self) -> CaseResult<usize> {
        self.case.drain_lookups()
    }

    /// Writes `plan` into the case as per-component keys.
    ///
    /// Template `other` settings are applied first; unowned ones are parked
    /// as lookups. A single-task plan downgrades parallel I/O types to
    /// serial ones.
    ///
    /// # Errors
    /// `UndefinedKey` if the layout keys are not defined.
    pub fn apply_plan(&mut self, plan: &ResourcePlan) -> CaseResult<()> {
        for (id, value) in &plan.other {
            self.set_with(id, value.as_str(), SetOptions::allow_undefined())?;
        }

        for a in &plan.assignments {
            let class = a.class;
            self.set(&format!("NTASKS_{class}"), a.ntasks)?;
            self.set(&format!("NTHRDS_{class}"), a.nthrds)?;
            self.set(&format!("ROOTPE_{class}"), a.rootpe)?;
            self.set(&format!("NINST_{class}"), a.ninst)?;
            self.set(&format!("PSTRID_{class}"), a.pstrid)?;
        }

        if self.case.owner("TOTALPES").is_some() {
            self.set("TOTALPES", plan.total_tasks())?;
        }

        if plan.is_single_task() {
            for a in &plan.assignments {
                let key = format!("PIO_TYPENAME_{}", a.class);
                let Some(current) = self.case.get_string(&key)? else {
                    continue;
                };
                if let Some(serial) = io_collapse(&current) {
                    tracing::info!(key = %key, from = %current, to = serial, "single task run; using serial I/O");
                    self.set(&key, serial)?;
                }
            }
        }
        Ok(())
    }

    /// Configures the case for a compset, grid and machine.
    ///
    /// Adds default entries, records the run identity, drains pending
    /// lookups, computes the layout and writes it back. Returns the plan.
    ///
    /// # Errors
    /// Size-specification, template, layout and validation errors.
    pub fn configure(
        &mut self,
        request: &ConfigureRequest,
        defaults: &dyn ConfigDefaults,
        templates: &dyn PeTemplates,
        machine: &dyn MachineDescriptor,
    ) -> CaseResult<ResourcePlan> {
        let size_spec = SizeSpec::parse(request.size_spec.as_deref())?;

        let kinds: Vec<StoreKind> = self
            .case
            .stores
            .iter()
            .chain(self.case.generic.iter())
            .map(|s| s.kind())
            .collect();
        let mut added = 0usize;
        for kind in kinds {
            for entry in defaults.entries(kind) {
                if self.add_entry(kind, entry)? {
                    added += 1;
                }
            }
        }
        tracing::debug!(added, "added default entries");

        let root = self.case.root().display().to_string();
        if self.case.get_raw("CASEROOT").is_none() {
            self.set_with("CASEROOT", root, SetOptions::allow_undefined())?;
        }
        self.set("COMPSET", request.compset.as_str())?;
        self.set("GRID", request.grid.as_str())?;
        self.set("COMP_CLASSES", ComponentClass::join(&request.classes))?;

        let compiler = request
            .compiler
            .clone()
            .unwrap_or_else(|| machine.default_compiler().to_string());
        let mpilib = request
            .mpilib
            .clone()
            .unwrap_or_else(|| machine.default_mpilib().to_string());
        self.set("MACH", machine.name())?;
        self.set("COMPILER", compiler.as_str())?;
        self.set("MPILIB", mpilib.as_str())?;

        let park = SetOptions::allow_undefined();
        self.set_with("PES_PER_NODE", machine.pes_per_node(), park)?;
        self.set_with("MAX_TASKS_PER_NODE", machine.max_tasks_per_node(), park)?;
        self.set_with("MAX_MPITASKS_PER_NODE", machine.max_mpitasks_per_node(), park)?;

        self.drain_lookups()?;

        let layout_request = LayoutRequest {
            classes: request.classes.clone(),
            size_spec,
            ninst: request.ninst,
            ncouplers: request.ncouplers,
            query: TemplateQuery {
                grid: request.grid.clone(),
                compset: request.compset.clone(),
                machine: machine.name().to_string(),
                compiler,
                mpilib,
                mnemonic: None,
            },
        };
        let plan = compute_layout(&layout_request, templates, machine)?;
        self.apply_plan(&plan)?;

        tracing::info!(
            compset = %request.compset,
            grid = %request.grid,
            machine = machine.name(),
            total_tasks = plan.total_tasks(),
            "configured case"
        );
        Ok(plan)
    }

    /// Flushes now without ending the scope. See [`Case::flush`].
    ///
    /// # Errors
    /// Storage errors from the backend.
    pub fn flush(&mut self, flush_all: bool) -> CaseResult<usize> {
        self.case.flush(flush_all)
    }

    /// Ends the scope, flushing dirty stores.
    ///
    /// Returns the number of stores written.
    ///
    /// # Errors
    /// Storage errors from the backend; unwritten stores stay dirty.
    pub fn commit(mut self) -> CaseResult<usize> {
        self.finished = true;
        self.case.flush(false)
    }
}

impl Deref for CaseTxn<'_> {
    type Target = Case;

    fn deref(&self) -> &Case {
        self.case
    }
}

impl Drop for CaseTxn<'_> {
    fn drop(&mut self) {
        if self.finished || !self.case.is_dirty() {
            return;
        }
        if let Err(e) = self.case.flush(false) {
            tracing::error!(error = %e, root = %self.case.root().display(), "flush on scope exit failed");
        }
    }
}
