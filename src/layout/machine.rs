//! Machine descriptions consumed by the planner.

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};
use crate::layout::ComponentLayout;

/// Spare-node reservation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparePolicy {
    /// Exact number of spare nodes; overrides `allocate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<u32>,
    /// Reserve about ten percent extra nodes.
    #[serde(default)]
    pub allocate: bool,
}

impl SparePolicy {
    const MIN_ALLOCATED: u32 = 1;
    const MAX_ALLOCATED: u32 = 10;

    /// Spare nodes to add on top of `nodes`.
    #[must_use]
    pub fn spare_nodes(self, nodes: u32) -> u32 {
        if let Some(forced) = self.force {
            return forced;
        }
        if self.allocate {
            return nodes
                .div_ceil(10)
                .clamp(Self::MIN_ALLOCATED, Self::MAX_ALLOCATED);
        }
        0
    }
}

/// Launcher facts reported by a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherProbe {
    /// Launcher executable, e.g. `aprun` or `mpiexec`.
    pub executable: String,
    /// Node count the launcher reserves when it allocates whole nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_nodes: Option<u32>,
}

/// Machine packing constants and defaults.
pub trait MachineDescriptor {
    fn name(&self) -> &str;

    /// Physical cores per node.
    fn pes_per_node(&self) -> u32;

    /// Hardware threads per node.
    fn max_tasks_per_node(&self) -> u32;

    /// MPI ranks allowed per node.
    fn max_mpitasks_per_node(&self) -> u32 {
        self.pes_per_node()
    }

    fn spare_policy(&self) -> SparePolicy {
        SparePolicy::default()
    }

    fn default_compiler(&self) -> &str;

    fn default_mpilib(&self) -> &str;

    /// Launcher that would start `assignments`, if the machine reports one.
    fn launcher(&self, _assignments: &[ComponentLayout]) -> Option<LauncherProbe> {
        None
    }
}

/// Plain machine description, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub pes_per_node: u32,
    pub max_tasks_per_node: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_mpitasks_per_node: Option<u32>,
    #[serde(default)]
    pub spare: SparePolicy,
    pub compiler: String,
    pub mpilib: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<LauncherProbe>,
}

impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            name: "generic".to_string(),
            pes_per_node: 32,
            max_tasks_per_node: 32,
            max_mpitasks_per_node: None,
            spare: SparePolicy::default(),
            compiler: "gnu".to_string(),
            mpilib: "mpich".to_string(),
            launcher: None,
        }
    }
}

impl MachineSpec {
    /// Parses and validates a machine description.
    ///
    /// # Errors
    /// `InvalidConfig` for unparsable JSON or failed validation.
    pub fn from_json(json: &str) -> CaseResult<Self> {
        let spec: Self = serde_json::from_str(json)
            .map_err(|e| CaseError::invalid_config(format!("invalid machine file: {e}")))?;
        spec.validate()
    }

    /// Validates packing constants.
    ///
    /// # Errors
    /// `InvalidConfig` when a constant is zero or the name is empty.
    pub fn validate(self) -> CaseResult<Self> {
        if self.name.trim().is_empty() {
            return Err(CaseError::invalid_config("machine name cannot be empty"));
        }
        if self.pes_per_node == 0 {
            return Err(CaseError::invalid_config(format!(
                "pes_per_node must be positive for machine {}",
                self.name
            )));
        }
        if self.max_tasks_per_node == 0 {
            return Err(CaseError::invalid_config(format!(
                "max_tasks_per_node must be positive for machine {}",
                self.name
            )));
        }
        if self.max_mpitasks_per_node == Some(0) {
            return Err(CaseError::invalid_config(format!(
                "max_mpitasks_per_node must be positive for machine {}",
                self.name
            )));
        }
        Ok(self)
    }
}

impl MachineDescriptor for MachineSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn pes_per_node(&self) -> u32 {
        self.pes_per_node
    }

    fn max_tasks_per_node(&self) -> u32 {
        self.max_tasks_per_node
    }

    fn max_mpitasks_per_node(&self) -> u32 {
        self.max_mpitasks_per_node.unwrap_or(self.pes_per_node)
    }

    fn spare_policy(&self) -> SparePolicy {
        self.spare
    }

    fn default_compiler(&self) -> &str {
        &self.compiler
    }

    fn default_mpilib(&self) -> &str {
        &self.mpilib
    }

    fn launcher(&self, _assignments: &[ComponentLayout]) -> Option<LauncherProbe> {
        self.launcher.clone()
    }
}
