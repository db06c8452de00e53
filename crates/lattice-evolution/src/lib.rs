//! # lattice-evolution
//!
//! Work-orders: AUTOMATION entities that track self-modifying change
//! proposals through a fixed status graph. Transitions are recorded as
//! observations, which are the sole source of truth for the evolution
//! metrics. The scope guard bounds a work-order's permitted filesystem
//! effects.

pub mod machine;
pub mod metrics;
pub mod scope;
pub mod status;
pub mod work_order;

pub use machine::WorkOrderMachine;
pub use metrics::EvolutionMetrics;
pub use scope::{check_scope, ScopeCheck};
pub use status::WorkOrderStatus;
pub use work_order::WorkOrderPayload;
