//! Layout computation and node arithmetic.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};
use crate::layout::{
    ComponentClass, MachineDescriptor, PeLayout, PeTemplates, SizeSpec, SparePolicy, TemplateQuery,
};

/// I/O strategies that need more than one task.
const PARALLEL_IO_TYPES: [&str; 2] = ["pnetcdf", "netcdf4p"];

/// Serial replacement for parallel I/O strategies.
pub const SERIAL_IO_TYPE: &str = "netcdf";

/// Returns the serial replacement for a parallel I/O strategy.
#[must_use]
pub fn io_collapse(typename: &str) -> Option<&'static str> {
    PARALLEL_IO_TYPES
        .contains(&typename.trim())
        .then_some(SERIAL_IO_TYPE)
}

/// Inputs to [`compute_layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRequest {
    /// Ordered component classes; must include `CPL`.
    pub classes: Vec<ComponentClass>,
    pub size_spec: SizeSpec,
    /// Instances per non-coupler component.
    pub ninst: u32,
    /// Coupler instances.
    pub ncouplers: u32,
    pub query: TemplateQuery,
}

impl LayoutRequest {
    #[must_use]
    pub fn new(classes: Vec<ComponentClass>, size_spec: SizeSpec) -> Self {
        Self {
            classes,
            size_spec,
            ninst: 1,
            ncouplers: 1,
            query: TemplateQuery::default(),
        }
    }

    /// Checks the class list and instance counts.
    ///
    /// # Errors
    /// `InvalidConfig` if `CPL` is missing, a class repeats, or a count is zero.
    pub fn validate(&self) -> CaseResult<()> {
        validate_classes(&self.classes)?;
        if self.ninst == 0 {
            return Err(CaseError::invalid_config("ninst must be at least 1"));
        }
        if self.ncouplers == 0 {
            return Err(CaseError::invalid_config("ncouplers must be at least 1"));
        }
        Ok(())
    }
}

fn validate_classes(classes: &[ComponentClass]) -> CaseResult<()> {
    if !classes.contains(&ComponentClass::Cpl) {
        return Err(CaseError::invalid_config("component classes must include CPL"));
    }
    for (i, class) in classes.iter().enumerate() {
        if classes[..i].contains(class) {
            return Err(CaseError::invalid_config(format!("component class {class} listed twice")));
        }
    }
    Ok(())
}

/// Requested counts for one component before normalization.
///
/// Negative tasks or roots count whole nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub class: ComponentClass,
    pub ntasks: i64,
    pub nthrds: i64,
    pub rootpe: i64,
    pub pstrid: i64,
    pub ninst: u32,
}

impl ResourceRequest {
    /// Request with every count at its default.
    #[must_use]
    pub const fn defaults(class: ComponentClass) -> Self {
        Self {
            class,
            ntasks: 1,
            nthrds: 1,
            rootpe: 0,
            pstrid: 1,
            ninst: 1,
        }
    }

    /// Processor footprint `(tasks + root) * threads`, in PEs.
    #[must_use]
    pub const fn footprint(&self, pes_per_node: u32) -> i64 {
        let raw = (self.ntasks + self.rootpe).saturating_mul(self.nthrds);
        if raw < 0 {
            raw.saturating_neg().saturating_mul(pes_per_node as i64)
        } else {
            raw
        }
    }

    /// Converts to concrete counts: nodes become PEs, non-positive task,
    /// thread and stride counts become 1.
    ///
    /// # Errors
    /// `InvalidConfig` if a count does not fit the rank space.
    pub fn normalize(&self, pes_per_node: u32) -> CaseResult<ComponentLayout> {
        let class = self.class;
        let ntasks = match self.ntasks {
            n if n < 0 => nodes_to_pes(class, "NTASKS", n, pes_per_node)?,
            0 => {
                tracing::warn!(%class, "requested zero tasks; using 1");
                1
            }
            n => to_u32(class, "NTASKS", n)?,
        };
        let nthrds = if self.nthrds < 1 {
            tracing::warn!(%class, nthrds = self.nthrds, "non-positive thread count; using 1");
            1
        } else {
            to_u32(class, "NTHRDS", self.nthrds)?
        };
        let rootpe = if self.rootpe < 0 {
            nodes_to_pes(class, "ROOTPE", self.rootpe, pes_per_node)?
        } else {
            to_u32(class, "ROOTPE", self.rootpe)?
        };
        let pstrid = if self.pstrid < 1 { 1 } else { to_u32(class, "PSTRID", self.pstrid)? };

        Ok(ComponentLayout {
            class,
            ntasks,
            nthrds,
            rootpe,
            ninst: self.ninst.max(1),
            pstrid,
        })
    }
}

fn to_u32(class: ComponentClass, key: &str, value: i64) -> CaseResult<u32> {
    u32::try_from(value)
        .map_err(|_| CaseError::invalid_config(format!("{key}_{class} = {value} is out of range")))
}

fn nodes_to_pes(class: ComponentClass, key: &str, value: i64, pes_per_node: u32) -> CaseResult<u32> {
    let pes = value.saturating_neg().saturating_mul(i64::from(pes_per_node));
    to_u32(class, key, pes)
}

/// Concrete assignment for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLayout {
    pub class: ComponentClass,
    pub ntasks: u32,
    pub nthrds: u32,
    pub rootpe: u32,
    pub ninst: u32,
    pub pstrid: u32,
}

impl ComponentLayout {
    /// Highest rank this component occupies, plus one.
    #[must_use]
    pub fn rank_extent(&self) -> u64 {
        u64::from(self.rootpe) + u64::from(self.ntasks.saturating_sub(1)) * u64::from(self.pstrid) + 1
    }
}

/// Node-level arithmetic derived from the assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePlan {
    pub total_tasks: u32,
    /// Largest thread count of any component.
    pub thread_count: u32,
    pub tasks_per_node: u32,
    pub tasks_per_numa: u32,
    pub smt_factor: u32,
    pub threads_per_core: u32,
    pub cores_per_task: u32,
    pub spare_nodes: u32,
    /// Nodes to request, spares included.
    pub num_nodes: u32,
}

impl NodePlan {
    /// Recomputes node arithmetic for `assignments` on `machine`.
    ///
    /// # Errors
    /// - `InvalidConfig` for an empty layout or zero packing constants
    /// - `LayoutInconsistency` if a node-exclusive launcher disagrees with
    ///   the computed node count
    pub fn derive(
        assignments: &[ComponentLayout],
        ncouplers: u32,
        machine: &dyn MachineDescriptor,
        spare: SparePolicy,
    ) -> CaseResult<Self> {
        if assignments.is_empty() {
            return Err(CaseError::invalid_config("layout has no components"));
        }
        let pes_per_node = machine.pes_per_node();
        let max_tasks_per_node = machine.max_tasks_per_node();
        let max_mpitasks_per_node = machine.max_mpitasks_per_node();
        if pes_per_node == 0 || max_tasks_per_node == 0 || max_mpitasks_per_node == 0 {
            return Err(CaseError::invalid_config(format!(
                "machine {} has a zero packing constant",
                machine.name()
            )));
        }

        let mut extent = assignments.iter().map(ComponentLayout::rank_extent).max().unwrap_or(1);
        if ncouplers > 1 {
            extent = extent.saturating_mul(u64::from(ncouplers));
        }
        let total_tasks = u32::try_from(extent)
            .map_err(|_| CaseError::invalid_config(format!("total tasks {extent} is out of range")))?;
        let thread_count = assignments.iter().map(|a| a.nthrds).max().unwrap_or(1).max(1);

        let tasks_per_node = (max_tasks_per_node / thread_count)
            .min(max_mpitasks_per_node)
            .min(total_tasks)
            .max(1);
        let tasks_per_numa = tasks_per_node.div_ceil(2);
        let smt_factor = (max_tasks_per_node / pes_per_node).max(1);
        let threads_per_core = if u64::from(tasks_per_node) * u64::from(thread_count) <= u64::from(pes_per_node) {
            1
        } else {
            smt_factor
        };
        let cores_per_task = (thread_count / threads_per_core).max(1);

        let computed = (u64::from(total_tasks) * u64::from(thread_count)).div_ceil(u64::from(max_tasks_per_node));
        let computed = u32::try_from(computed)
            .map_err(|_| CaseError::invalid_config(format!("node count {computed} is out of range")))?;

        if let Some(report) = machine.launcher(assignments) {
            if let Some(launcher_nodes) = report.exclusive_nodes {
                if launcher_nodes != computed {
                    return Err(CaseError::LayoutInconsistency {
                        launcher: report.executable,
                        launcher_nodes,
                        computed_nodes: computed,
                    });
                }
            }
        }

        let spare_nodes = spare.spare_nodes(computed);
        Ok(Self {
            total_tasks,
            thread_count,
            tasks_per_node,
            tasks_per_numa,
            smt_factor,
            threads_per_core,
            cores_per_task,
            spare_nodes,
            num_nodes: computed.saturating_add(spare_nodes),
        })
    }

    /// Nodes needed before spares are added.
    #[must_use]
    pub const fn nodes_before_spare(&self) -> u32 {
        self.num_nodes - self.spare_nodes
    }
}

/// Complete layout for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// One assignment per class, in request order.
    pub assignments: Vec<ComponentLayout>,
    /// Extra settings proposed by the template.
    pub other: BTreeMap<String, String>,
    /// Largest component footprint times the coupler count.
    pub pesize: u64,
    pub ncouplers: u32,
    pub nodes: NodePlan,
}

impl ResourcePlan {
    /// Builds a plan from per-component requests.
    ///
    /// # Errors
    /// See [`ResourceRequest::normalize`] and [`NodePlan::derive`].
    pub fn from_requests(
        requests: &[ResourceRequest],
        other: BTreeMap<String, String>,
        ncouplers: u32,
        machine: &dyn MachineDescriptor,
        spare: SparePolicy,
    ) -> CaseResult<Self> {
        let ncouplers = ncouplers.max(1);
        let pes_per_node = machine.pes_per_node();

        let footprint = requests
            .iter()
            .map(|r| r.footprint(pes_per_node))
            .fold(1i64, i64::max);
        let pesize = u64::try_from(footprint)
            .unwrap_or(1)
            .saturating_mul(u64::from(ncouplers));

        let assignments = requests
            .iter()
            .map(|r| r.normalize(pes_per_node))
            .collect::<CaseResult<Vec<_>>>()?;
        let nodes = NodePlan::derive(&assignments, ncouplers, machine, spare)?;

        Ok(Self {
            assignments,
            other,
            pesize,
            ncouplers,
            nodes,
        })
    }

    #[must_use]
    pub fn assignment(&self, class: ComponentClass) -> Option<&ComponentLayout> {
        self.assignments.iter().find(|a| a.class == class)
    }

    #[must_use]
    pub const fn total_tasks(&self) -> u32 {
        self.nodes.total_tasks
    }

    /// Returns true if the run has a single task, so parallel I/O must
    /// fall back to serial.
    #[must_use]
    pub const fn is_single_task(&self) -> bool {
        self.nodes.total_tasks == 1
    }

    /// Human-readable report of the plan.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let n = &self.nodes;
        let _ = writeln!(
            out,
            "total tasks {}, max threads {}, pesize {}",
            n.total_tasks, n.thread_count, self.pesize
        );
        for a in &self.assignments {
            let _ = writeln!(
                out,
                "  {:<4} ntasks {:>6}  nthrds {:>3}  rootpe {:>6}  ninst {:>3}  pstrid {:>2}",
                a.class.as_str(),
                a.ntasks,
                a.nthrds,
                a.rootpe,
                a.ninst,
                a.pstrid
            );
        }
        let _ = write!(
            out,
            "nodes {} ({} spare), tasks/node {}, tasks/numa {}, threads/core {}, cores/task {}",
            n.num_nodes, n.spare_nodes, n.tasks_per_node, n.tasks_per_numa, n.threads_per_core, n.cores_per_task
        );
        out
    }
}

/// Computes the layout for `request`.
///
/// Forced counts from the size specification override the template and
/// pin every root to zero. Unspecified counts default to one task, one
/// thread, root zero.
///
/// # Errors
/// - `InvalidConfig` for a bad class list or instance count
/// - `UnresolvableSizeSpec` when no template row matches
/// - `LayoutInconsistency` from the node arithmetic
pub fn compute_layout(
    request: &LayoutRequest,
    templates: &dyn PeTemplates,
    machine: &dyn MachineDescriptor,
) -> CaseResult<ResourcePlan> {
    request.validate()?;
    let spec = &request.size_spec;

    let template = if spec.needs_template() {
        let mut query = request.query.clone();
        query.mnemonic = spec.mnemonic().map(str::to_string);
        let found = templates.find_layout(&query)?;
        if found.is_none() && !matches!(spec, SizeSpec::ForcedTasks { .. }) {
            let row = query.mnemonic.as_deref().unwrap_or("default");
            return Err(CaseError::size_spec(
                spec.to_string(),
                format!(
                    "no '{row}' template row for grid {} compset {} on {}",
                    query.grid, query.compset, query.machine
                ),
            ));
        }
        found
    } else {
        None
    };

    let requests: Vec<ResourceRequest> = request
        .classes
        .iter()
        .map(|&class| request_for(class, spec, template.as_ref(), request))
        .collect();

    // Extra settings ride along only with a full template lookup.
    let other = match (spec, template) {
        (SizeSpec::Template { .. }, Some(t)) => t.other,
        _ => BTreeMap::new(),
    };
    let plan = ResourcePlan::from_requests(
        &requests,
        other,
        request.ncouplers,
        machine,
        machine.spare_policy(),
    )?;

    tracing::info!(
        machine = machine.name(),
        spec = %spec,
        total_tasks = plan.nodes.total_tasks,
        num_nodes = plan.nodes.num_nodes,
        pesize = plan.pesize,
        "computed layout"
    );
    Ok(plan)
}

fn request_for(
    class: ComponentClass,
    spec: &SizeSpec,
    template: Option<&PeLayout>,
    request: &LayoutRequest,
) -> ResourceRequest {
    let mut req = ResourceRequest::defaults(class);

    req.ntasks = spec
        .forced_tasks()
        .map(i64::from)
        .or_else(|| template.and_then(|t| t.ntasks.get(&class).copied()))
        .unwrap_or(1);
    req.nthrds = spec
        .forced_threads()
        .map(i64::from)
        .or_else(|| template.and_then(|t| t.nthrds.get(&class).copied()))
        .unwrap_or(1);
    if !spec.is_forced() {
        req.rootpe = template
            .and_then(|t| t.rootpe.get(&class).copied())
            .unwrap_or(0);
        req.pstrid = template
            .and_then(|t| t.pstrid.get(&class).copied())
            .unwrap_or(1);
    }
    req.ninst = if class.is_coupler() {
        request.ncouplers
    } else if class.is_external() {
        1
    } else {
        request.ninst
    };
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LauncherProbe, MachineSpec, StaticTemplates, TemplateRow};

    fn machine() -> MachineSpec {
        MachineSpec {
            name: "testbox".to_string(),
            pes_per_node: 32,
            max_tasks_per_node: 32,
            ..MachineSpec::default()
        }
    }

    fn classes() -> Vec<ComponentClass> {
        vec![ComponentClass::Cpl, ComponentClass::Atm, ComponentClass::Ocn]
    }

    fn templates() -> StaticTemplates {
        let mut layout = PeLayout::default();
        layout.ntasks.insert(ComponentClass::Atm, -2);
        layout.ntasks.insert(ComponentClass::Ocn, 16);
        layout.rootpe.insert(ComponentClass::Ocn, 64);
        layout.nthrds.insert(ComponentClass::Atm, 4);
        layout.other.insert("PIO_STRIDE".to_string(), "4".to_string());
        StaticTemplates::new(vec![TemplateRow {
            layout,
            ..TemplateRow::default()
        }])
    }

    #[test]
    fn test_uniform_spec() {
        let request = LayoutRequest::new(classes(), "64x2".parse().unwrap());
        let plan = compute_layout(&request, &StaticTemplates::default(), &machine()).unwrap();

        for a in &plan.assignments {
            assert_eq!((a.ntasks, a.nthrds, a.rootpe), (64, 2, 0));
        }
        assert_eq!(plan.pesize, 128);
        assert_eq!(plan.nodes.total_tasks, 64);
        assert_eq!(plan.nodes.nodes_before_spare(), 4);
        assert_eq!(plan.nodes.tasks_per_node, 16);
        assert_eq!(plan.nodes.tasks_per_numa, 8);
        assert_eq!(plan.nodes.threads_per_core, 1);
        assert_eq!(plan.nodes.cores_per_task, 2);
    }

    #[test]
    fn test_template_layout_with_nodes() {
        let request = LayoutRequest::new(classes(), SizeSpec::Template { mnemonic: None });
        let plan = compute_layout(&request, &templates(), &machine()).unwrap();

        let atm = plan.assignment(ComponentClass::Atm).unwrap();
        assert_eq!((atm.ntasks, atm.nthrds, atm.rootpe), (64, 4, 0));
        let ocn = plan.assignment(ComponentClass::Ocn).unwrap();
        assert_eq!((ocn.ntasks, ocn.rootpe), (16, 64));
        let cpl = plan.assignment(ComponentClass::Cpl).unwrap();
        assert_eq!((cpl.ntasks, cpl.nthrds, cpl.rootpe), (1, 1, 0));

        // ATM footprint (-2 + 0) * 4 = -8 → 8 nodes of 32
        assert_eq!(plan.pesize, 256);
        assert_eq!(plan.nodes.total_tasks, 80);
        assert_eq!(plan.other["PIO_STRIDE"], "4");
    }

    #[test]
    fn test_forced_tasks_keep_template_threads() {
        let request = LayoutRequest::new(classes(), "8".parse().unwrap());
        let plan = compute_layout(&request, &templates(), &machine()).unwrap();

        let atm = plan.assignment(ComponentClass::Atm).unwrap();
        assert_eq!((atm.ntasks, atm.nthrds, atm.rootpe), (8, 4, 0));
        let ocn = plan.assignment(ComponentClass::Ocn).unwrap();
        assert_eq!(ocn.rootpe, 0);
        assert!(plan.other.is_empty());
    }

    #[test]
    fn test_mnemonic_threads_take_row_tasks() {
        let mut layout = PeLayout::default();
        layout.ntasks.insert(ComponentClass::Atm, 96);
        layout.rootpe.insert(ComponentClass::Atm, 8);
        layout.nthrds.insert(ComponentClass::Atm, 7);
        layout.other.insert("PIO_STRIDE".to_string(), "4".to_string());
        let templates = StaticTemplates::new(vec![TemplateRow {
            mnemonic: Some("L".to_string()),
            layout,
            ..TemplateRow::default()
        }]);

        let request = LayoutRequest::new(classes(), "Lx2".parse().unwrap());
        let plan = compute_layout(&request, &templates, &machine()).unwrap();

        let atm = plan.assignment(ComponentClass::Atm).unwrap();
        assert_eq!((atm.ntasks, atm.nthrds, atm.rootpe), (96, 2, 0));
        let cpl = plan.assignment(ComponentClass::Cpl).unwrap();
        assert_eq!((cpl.ntasks, cpl.nthrds, cpl.rootpe), (1, 2, 0));
        assert!(plan.assignments.iter().all(|a| a.rootpe == 0 && a.nthrds == 2));
        assert!(plan.other.is_empty());
    }

    #[test]
    fn test_missing_mnemonic_row() {
        let request = LayoutRequest::new(classes(), "XLx2".parse().unwrap());
        let err = compute_layout(&request, &templates(), &machine()).unwrap_err();
        assert!(matches!(err, CaseError::UnresolvableSizeSpec { .. }));
    }

    #[test]
    fn test_launcher_disagreement() {
        let machine = MachineSpec {
            launcher: Some(LauncherProbe {
                executable: "aprun".to_string(),
                exclusive_nodes: Some(6),
            }),
            ..machine()
        };
        let request = LayoutRequest::new(classes(), "128x2".parse().unwrap());
        let err = compute_layout(&request, &StaticTemplates::default(), &machine).unwrap_err();
        match err {
            CaseError::LayoutInconsistency {
                launcher_nodes,
                computed_nodes,
                ..
            } => assert_eq!((launcher_nodes, computed_nodes), (6, 8)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spares_and_instances() {
        let machine = MachineSpec {
            spare: SparePolicy {
                force: None,
                allocate: true,
            },
            ..machine()
        };
        let mut request = LayoutRequest::new(
            vec![ComponentClass::Cpl, ComponentClass::Atm, ComponentClass::Esp],
            "32x1".parse().unwrap(),
        );
        request.ninst = 3;
        request.ncouplers = 2;
        let plan = compute_layout(&request, &StaticTemplates::default(), &machine).unwrap();

        assert_eq!(plan.assignment(ComponentClass::Cpl).unwrap().ninst, 2);
        assert_eq!(plan.assignment(ComponentClass::Atm).unwrap().ninst, 3);
        assert_eq!(plan.assignment(ComponentClass::Esp).unwrap().ninst, 1);
        assert_eq!(plan.pesize, 64);
        assert_eq!(plan.nodes.total_tasks, 64);
        assert_eq!(plan.nodes.spare_nodes, 1);
        assert_eq!(plan.nodes.num_nodes, 3);
    }

    #[test]
    fn test_class_list_validation() {
        let request = LayoutRequest::new(vec![ComponentClass::Atm], "4".parse().unwrap());
        assert!(compute_layout(&request, &templates(), &machine()).unwrap_err().is_validation());

        let request = LayoutRequest::new(
            vec![ComponentClass::Cpl, ComponentClass::Atm, ComponentClass::Atm],
            "4".parse().unwrap(),
        );
        assert!(compute_layout(&request, &templates(), &machine()).is_err());
    }

    #[test]
    fn test_normalize_clamps() {
        let req = ResourceRequest {
            ntasks: 0,
            nthrds: -3,
            rootpe: -1,
            pstrid: 0,
            ..ResourceRequest::defaults(ComponentClass::Ice)
        };
        let layout = req.normalize(36).unwrap();
        assert_eq!((layout.ntasks, layout.nthrds, layout.rootpe, layout.pstrid), (1, 1, 36, 1));
    }

    #[test]
    fn test_smt_packing() {
        let machine = MachineSpec {
            pes_per_node: 16,
            max_tasks_per_node: 64,
            ..machine()
        };
        let request = LayoutRequest::new(classes(), "64x4".parse().unwrap());
        let plan = compute_layout(&request, &StaticTemplates::default(), &machine).unwrap();

        assert_eq!(plan.nodes.tasks_per_node, 16);
        assert_eq!(plan.nodes.smt_factor, 4);
        assert_eq!(plan.nodes.threads_per_core, 4);
        assert_eq!(plan.nodes.cores_per_task, 1);
        assert_eq!(plan.nodes.num_nodes, 4);
    }

    #[test]
    fn test_io_collapse() {
        assert_eq!(io_collapse("pnetcdf"), Some("netcdf"));
        assert_eq!(io_collapse("netcdf4p"), Some("netcdf"));
        assert_eq!(io_collapse("netcdf"), None);
        assert_eq!(io_collapse("netcdf4c"), None);
    }

    #[test]
    fn test_summary_lists_components() {
        let request = LayoutRequest::new(classes(), "4x1".parse().unwrap());
        let plan = compute_layout(&request, &StaticTemplates::default(), &machine()).unwrap();
        let summary = plan.summary();
        assert!(summary.contains("CPL"));
        assert!(summary.contains("OCN"));
        assert!(summary.contains("total tasks 4"));
    }
}
