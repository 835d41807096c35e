//! Topology graph: typed pipeline nodes, their links, and the topology
//! container that owns them.

pub mod config;
pub mod factory;
pub mod node;
pub mod topology;

pub use config::TopologyConfig;
pub use factory::TopologyFactory;
pub use node::{Node, NodeType, TopoId};
pub use topology::Topology;
