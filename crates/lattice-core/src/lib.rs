//! # lattice-core
//!
//! Foundation crate for the Lattice knowledge graph.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod graph;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::LatticeConfig;
pub use errors::{LatticeError, LatticeResult};
pub use graph::{Edge, EdgeEvent, EventRelation, Layer, Node, Observation, Relation};
