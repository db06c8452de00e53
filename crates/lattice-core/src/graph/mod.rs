//! The graph data model: nodes, edges, causal events, observations,
//! version snapshots, and the query filters over them.

pub mod edge;
pub mod event;
pub mod filter;
pub mod node;
pub mod observation;
pub mod version;

pub use edge::{Edge, EdgeFilter, Relation};
pub use event::{EdgeEvent, EventRelation};
pub use filter::{NameMatch, NodeFilter};
pub use node::{node_types, Layer, Node};
pub use observation::{observation_types, Observation};
pub use version::NodeVersion;
