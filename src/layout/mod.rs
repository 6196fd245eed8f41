//! Resource-layout planner.
//!
//! Turns a component list, a compact [`SizeSpec`] and a machine's packing
//! constants into per-component task/thread/root assignments plus the node
//! arithmetic needed to request them.

mod component;
mod machine;
mod plan;
mod size_spec;
mod template;

pub use component::ComponentClass;
pub use machine::{LauncherProbe, MachineDescriptor, MachineSpec, SparePolicy};
pub use plan::{
    compute_layout, io_collapse, ComponentLayout, LayoutRequest, NodePlan, ResourcePlan,
    ResourceRequest, SERIAL_IO_TYPE,
};
pub use size_spec::SizeSpec;
pub use template::{PeLayout, PeTemplates, StaticTemplates, TemplateQuery, TemplateRow};
