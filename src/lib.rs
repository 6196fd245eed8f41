//! # casekit - layered case configuration and resource layout
//!
//! casekit manages the configuration of a simulation case: a directory of
//! typed key/value stores that are read as a single namespace, a reference
//! resolver for values that mention other keys, and a planner that turns a
//! compact size specification into per-component task/thread layouts and
//! node counts.
//!
//! ## Core Concepts
//!
//! - **Case**: Ordered stores queried as one namespace; first store wins
//! - **Entry**: A typed key with optional per-component values and valid values
//! - **Resolution**: Bounded `$VAR` / `${VAR}` / `$ENV{VAR}` substitution
//! - **ResourcePlan**: Per-component assignments plus node arithmetic
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use casekit::{Case, CaseConfig, ComponentClass, ConfigureRequest, MachineSpec};
//! use casekit::{FileBackend, FileBackendConfig, StaticDefaults, StaticTemplates};
//!
//! let backend = Arc::new(FileBackend::new(FileBackendConfig::default())?);
//! let mut case = Case::create("/scratch/cases/b1850", backend, CaseConfig::default())?;
//!
//! let mut txn = case.begin()?;
//! let request = ConfigureRequest::new("B1850", "f19_g16", vec![ComponentClass::Cpl, ComponentClass::Atm])
//!     .with_size_spec("64x2");
//! let plan = txn.configure(&request, &StaticDefaults::standard(), &StaticTemplates::default(), &MachineSpec::default())?;
//! println!("{}", plan.summary());
//! txn.commit()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod case;
pub mod entry;
pub mod error;
pub mod layout;
pub mod resolve;
pub mod storage;
pub mod store;
pub mod value;

mod patterns;

pub use case::{
    Case, CaseConfig, CaseTxn, ConfigDefaults, ConfigureRequest, GetOptions, SetOptions,
    StaticDefaults,
};
pub use entry::Entry;
pub use error::{CaseError, CaseResult};
pub use layout::{
    compute_layout, io_collapse, ComponentClass, ComponentLayout, LauncherProbe, LayoutRequest,
    MachineDescriptor, MachineSpec, NodePlan, PeLayout, PeTemplates, ResourcePlan,
    ResourceRequest, SizeSpec, SparePolicy, StaticTemplates, TemplateQuery, TemplateRow,
};
pub use resolve::{resolve_in, Resolution, DEFAULT_RESOLVE_DEPTH};
pub use storage::{MemoryBackend, StorageError, StoreBackend, StoreDocument};
pub use store::{EntryStore, EnvStore, GenericStore, StoreKind};
pub use value::{Value, ValueType};

#[cfg(feature = "persistent")]
pub use storage::{FileBackend, FileBackendConfig, FileLock};
