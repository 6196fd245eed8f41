//! Entry definitions copied into a case when it is configured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{CaseError, CaseResult};
use crate::store::StoreKind;
use crate::value::ValueType;

/// Source of default entries for each store.
pub trait ConfigDefaults {
    /// Entries to add to `kind` if absent.
    fn entries(&self, kind: StoreKind) -> Vec<Entry>;
}

/// Default entries held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDefaults {
    #[serde(default)]
    pub stores: BTreeMap<StoreKind, Vec<Entry>>,
}

impl StaticDefaults {
    /// Parses defaults from JSON of the form `{"stores": {"run": [...]}}`.
    ///
    /// # Errors
    /// `InvalidConfig` if the JSON does not describe entries.
    pub fn from_json(json: &str) -> CaseResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CaseError::invalid_config(format!("invalid defaults file: {e}")))
    }

    pub fn insert(&mut self, kind: StoreKind, entry: Entry) {
        self.stores.entry(kind).or_default().push(entry);
    }

    /// Baseline definitions every case needs for configuration and layout.
    #[must_use]
    pub fn standard() -> Self {
        let mut d = Self::default();

        for id in ["CASE", "CASEROOT", "COMPSET", "GRID", "COMP_CLASSES", "MACH", "SRCROOT", "CIMEROOT"] {
            d.insert(StoreKind::Case, Entry::new(id, ValueType::Char));
        }

        d.insert(
            StoreKind::Run,
            Entry::new("RUNDIR", ValueType::Char)
                .with_value("${CASEROOT}/run")
                .with_description("Directory the model runs in"),
        );
        d.insert(
            StoreKind::Run,
            Entry::new("CONTINUE_RUN", ValueType::Bool)
                .with_value("FALSE")
                .with_valid_values(["TRUE", "FALSE"]),
        );
        d.insert(StoreKind::Run, Entry::new("RESUBMIT", ValueType::Int).with_value("0"));
        d.insert(
            StoreKind::Run,
            Entry::new("STOP_OPTION", ValueType::Char)
                .with_value("ndays")
                .with_valid_values(["nsteps", "ndays", "nmonths", "nyears"]),
        );
        d.insert(StoreKind::Run, Entry::new("STOP_N", ValueType::Int).with_value("5"));
        d.insert(
            StoreKind::Run,
            Entry::new("PIO_TYPENAME", ValueType::Char)
                .per_component()
                .with_value("pnetcdf")
                .with_valid_values(["netcdf", "pnetcdf", "netcdf4p", "netcdf4c"])
                .with_description("I/O library used by each component"),
        );

        d.insert(StoreKind::Build, Entry::new("COMPILER", ValueType::Char));
        d.insert(StoreKind::Build, Entry::new("MPILIB", ValueType::Char));
        d.insert(
            StoreKind::Build,
            Entry::new("EXEROOT", ValueType::Char).with_value("${CASEROOT}/bld"),
        );
        d.insert(
            StoreKind::Build,
            Entry::new("BUILD_COMPLETE", ValueType::Bool).with_value("FALSE"),
        );

        for (id, default) in [("NTASKS", "1"), ("NTHRDS", "1"), ("ROOTPE", "0"), ("NINST", "1"), ("PSTRID", "1")] {
            d.insert(
                StoreKind::MachPes,
                Entry::new(id, ValueType::Int).per_component().with_value(default),
            );
        }
        d.insert(StoreKind::MachPes, Entry::new("TOTALPES", ValueType::Int).with_value("1"));
        for id in ["PES_PER_NODE", "MAX_TASKS_PER_NODE", "MAX_MPITASKS_PER_NODE"] {
            d.insert(StoreKind::MachPes, Entry::new(id, ValueType::Int));
        }
        d.insert(
            StoreKind::MachPes,
            Entry::new("ALLOCATE_SPARE_NODES", ValueType::Bool).with_value("FALSE"),
        );
        d.insert(
            StoreKind::MachPes,
            Entry::new("FORCE_SPARE_NODES", ValueType::Int)
                .with_value("-999")
                .with_description("Exact spare node count; negative means unset"),
        );

        for job in ["case.run", "case.st_archive"] {
            d.insert(StoreKind::Batch, Entry::new("JOB_QUEUE", ValueType::Char).with_group(job));
            d.insert(
                StoreKind::Batch,
                Entry::new("JOB_WALLCLOCK_TIME", ValueType::Char).with_group(job),
            );
        }

        d
    }
}

impl ConfigDefaults for StaticDefaults {
    fn entries(&self, kind: StoreKind) -> Vec<Entry> {
        self.stores.get(&kind).cloned().unwrap_or_default()
    }
}
