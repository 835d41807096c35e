use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::trace;

use crate::config::TopologyConfig;
use crate::node::{Node, NodeType, TopoId};
use crate::topology::Topology;

/// Creates topologies and nodes, and owns the id counters behind them.
///
/// One factory is meant to live for the whole process (the platform owns
/// it). Topology ids start at 1 and are never reused, even after the
/// topology is released.
#[derive(Debug)]
pub struct TopologyFactory {
    process_id: u32,
    output_collections: bool,
    next_topology_id: AtomicU64,
    next_node_seq: AtomicU32,
}

impl TopologyFactory {
    pub fn new(config: &TopologyConfig) -> Self {
        Self {
            process_id: std::process::id(),
            output_collections: config.output_collections,
            next_topology_id: AtomicU64::new(1),
            next_node_seq: AtomicU32::new(1),
        }
    }

    pub fn create_topology(&self) -> Topology {
        let id = self.next_topology_id.fetch_add(1, Ordering::Relaxed);
        trace!("Created topology {}", id);
        Topology::new(id, self.output_collections)
    }

    pub fn create_node(&self, node_type: NodeType) -> Node {
        let id = self.next_node_id();
        trace!("Created {} node {:#x}", node_type, id);
        Node::new(id, node_type)
    }

    /// Number of topologies created so far.
    pub fn topologies_created(&self) -> u64 {
        self.next_topology_id.load(Ordering::Relaxed) - 1
    }

    fn next_node_id(&self) -> TopoId {
        loop {
            // The counter may wrap; zero is never handed out.
            let seq = self.next_node_seq.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return (u64::from(self.process_id) << 32) | u64::from(seq);
            }
        }
    }
}

impl Default for TopologyFactory {
    fn default() -> Self {
        Self::new(&TopologyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_ids_are_sequential_from_one() {
        let factory = TopologyFactory::default();
        let t1 = factory.create_topology();
        let t2 = factory.create_topology();
        assert_eq!(t1.id(), 1);
        assert_eq!(t2.id(), 2);

        drop(t1);
        let t3 = factory.create_topology();
        assert_eq!(t3.id(), 3);

        drop(t2);
        drop(t3);
        assert_eq!(factory.create_topology().id(), 4);
        assert_eq!(factory.topologies_created(), 4);
    }

    #[test]
    fn node_ids_carry_process_id() {
        let factory = TopologyFactory::default();
        let a = factory.create_node(NodeType::Output);
        let b = factory.create_node(NodeType::Tee);

        assert_eq!(a.id() >> 32, u64::from(std::process::id()));
        assert_ne!(a.id() & 0xffff_ffff, 0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.node_type(), NodeType::Output);
    }

    #[test]
    fn node_counter_skips_zero() {
        let factory = TopologyFactory::default();
        factory.next_node_seq.store(u32::MAX, Ordering::Relaxed);
        let last = factory.create_node(NodeType::Tee);
        let wrapped = factory.create_node(NodeType::Tee);
        assert_eq!(last.id() & 0xffff_ffff, u64::from(u32::MAX));
        assert_eq!(wrapped.id() & 0xffff_ffff, 1);
    }

    #[test]
    fn output_collection_support_follows_config() {
        let factory = TopologyFactory::new(&TopologyConfig { output_collections: false });
        assert!(factory.create_topology().output_node_collection().is_err());
    }
}
